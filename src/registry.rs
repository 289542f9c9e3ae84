//! Endpoint registry
//!
//! Maps each storage endpoint string to a lazily-created connection,
//! created on first reference and retained for the process lifetime.
//! The "default" alias resolves to the configured default endpoint,
//! whose connection is established eagerly at construction.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

use crate::error::Result;
use crate::transport::{Connection, ConnectionFactory};

/// Endpoint alias resolving to the configured default storage address
pub const DEFAULT_ENDPOINT: &str = "default";

pub struct EndpointRegistry {
    connections: DashMap<String, Arc<dyn Connection>>,
    factory: Box<dyn ConnectionFactory>,
    default_endpoint: String,
}

impl EndpointRegistry {
    /// Create a registry and eagerly connect the default endpoint.
    ///
    /// Failure to connect the default is a configuration error surfaced at
    /// startup, never mid-call.
    pub fn new(default_endpoint: &str, factory: Box<dyn ConnectionFactory>) -> Result<Self> {
        let connections: DashMap<String, Arc<dyn Connection>> = DashMap::new();
        let conn = factory.connect(default_endpoint)?;
        connections.insert(default_endpoint.to_string(), conn);
        Ok(Self {
            connections,
            factory,
            default_endpoint: default_endpoint.to_string(),
        })
    }

    /// Resolve an endpoint alias to its address
    pub fn url_for<'a>(&'a self, endpoint: &'a str) -> &'a str {
        if endpoint == DEFAULT_ENDPOINT {
            &self.default_endpoint
        } else {
            endpoint
        }
    }

    /// Look up the connection for an endpoint, creating it on first use.
    ///
    /// The dashmap entry holds the shard lock across creation, so two
    /// concurrent first references to the same endpoint produce exactly
    /// one connection.
    pub fn resolve(&self, endpoint: &str) -> Result<Arc<dyn Connection>> {
        let key = self.url_for(endpoint);
        match self.connections.entry(key.to_string()) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                debug!("connecting new endpoint: {}", key);
                let conn = self.factory.connect(key)?;
                Ok(entry.insert(conn).clone())
            }
        }
    }
}
