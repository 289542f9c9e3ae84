//! Storage adapter public surface and file data channel
//!
//! Every operation takes `(endpoint, path, identity, ...)` where the
//! identity is the `"uid:gid"` pair of the end user the call executes on
//! behalf of. The adapter resolves the endpoint to a cached connection,
//! prepends the configured namespace root to the path, encodes the
//! identity into opaque query arguments, and performs either a direct
//! file call or an admin proc command.

use std::pin::Pin;
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use async_stream::stream;
use bytes::Bytes;
use futures::Stream;
use tracing::{debug, info, warn};

use crate::config::StorageConfig;
use crate::error::Result;
use crate::identity::{opaque_args, Identity};
use crate::proc::ProcRequest;
use crate::registry::EndpointRegistry;
use crate::response::{quoted_value, StatxRecord};
use crate::transport::http::HttpFactory;
use crate::transport::{Connection, ConnectionFactory};

/// Size and modification time of a file
#[derive(Debug, Clone, Copy)]
pub struct FileStat {
    pub size: u64,
    pub mtime: SystemTime,
}

/// Extended stat information obtained via the admin channel
#[derive(Debug, Clone)]
pub struct ExtendedFileStat {
    /// Backend inode, kept opaque
    pub inode: String,
    /// The caller-supplied path, not the resolved one
    pub path: String,
    pub owner: Identity,
    pub size: u64,
    pub mtime: SystemTime,
}

/// Per-write options, all additive query parameters
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteOptions {
    /// Request the backend's atomic upload path
    pub atomic: bool,
    /// Space to book for the write; defaults to the content length
    pub booking_size: Option<u64>,
    /// Suppress automatic version-history creation, for ephemeral
    /// lock-marker files that should not accumulate versions
    pub skip_versioning: bool,
}

/// Stream of file content chunks
///
/// Failures are delivered in-stream: a consumer bridging this directly
/// to an outbound response body observes errors at iteration time.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Storage adapter for a remote EOS/XRootD cluster
///
/// The endpoint registry is the only state retained across calls; every
/// operation is otherwise independent and safe to run concurrently.
pub struct StorageAdapter {
    registry: EndpointRegistry,
    home_path: String,
    chunk_size: u64,
}

impl StorageAdapter {
    /// Create an adapter speaking to the EOS HTTP gateway
    pub fn new(config: &StorageConfig) -> Result<Self> {
        Self::with_factory(config, Box::new(HttpFactory))
    }

    /// Create an adapter with a custom transport factory
    pub fn with_factory(
        config: &StorageConfig,
        factory: Box<dyn ConnectionFactory>,
    ) -> Result<Self> {
        let registry = EndpointRegistry::new(&config.endpoint, factory)?;
        Ok(Self {
            registry,
            home_path: config.home_path.clone(),
            chunk_size: config.chunk_size,
        })
    }

    /// Map a caller path into the target namespace. Pure concatenation;
    /// the backend's own namespace enforces path semantics.
    fn full_path(&self, path: &str) -> String {
        format!("{}{}", self.home_path, path)
    }

    /// Build a direct file URL with the identity arguments appended
    fn file_url(&self, endpoint: &str, path: &str, args: &str) -> String {
        format!(
            "{}/{}{}",
            self.registry.url_for(endpoint),
            self.full_path(path),
            args
        )
    }

    /// Stat a file on behalf of the given identity
    pub async fn stat(&self, endpoint: &str, path: &str, identity: &str) -> Result<FileStat> {
        let identity = Identity::parse(identity)?;
        let conn = self.registry.resolve(endpoint)?;
        let url = self.file_url(endpoint, path, &opaque_args(&identity, false, 0));
        let start = Instant::now();
        let stat = conn.stat(&url).await?;
        info!(
            "stat: path={} elapsed_ms={:.1}",
            self.full_path(path),
            start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(FileStat {
            size: stat.size,
            mtime: stat.mtime,
        })
    }

    /// Get extended stat info (inode, owner, size, mtime) via an opaque
    /// query on behalf of the given identity
    pub async fn stat_extended(
        &self,
        endpoint: &str,
        path: &str,
        identity: &str,
    ) -> Result<ExtendedFileStat> {
        let parsed = Identity::parse(identity)?;
        let conn = self.registry.resolve(endpoint)?;
        let mut url = self.file_url(endpoint, path, &opaque_args(&parsed, false, 0));
        url.push_str("&mgm.pcmd=stat");
        let start = Instant::now();
        let payload = conn.query_stat(&url).await?;
        info!(
            "stat_extended: path={} elapsed_ms={:.1}",
            self.full_path(path),
            start.elapsed().as_secs_f64() * 1000.0
        );
        let record = StatxRecord::parse(&payload)?;
        Ok(ExtendedFileStat {
            inode: record.inode,
            path: path.to_string(),
            owner: record.owner,
            size: record.size,
            mtime: record.mtime,
        })
    }

    /// Read a file as a stream of chunks on behalf of the given identity.
    ///
    /// The stream is finite and non-restartable. If the remote open
    /// fails, the stream's sole element is the error.
    pub fn read(&self, endpoint: &str, path: &str, identity: &str) -> ByteStream {
        debug!("read: path={}", path);
        let setup: Result<(Arc<dyn Connection>, String)> = (|| {
            let parsed = Identity::parse(identity)?;
            let conn = self.registry.resolve(endpoint)?;
            let url = self.file_url(endpoint, path, &opaque_args(&parsed, false, 0));
            Ok((conn, url))
        })();
        let (conn, url) = match setup {
            Ok(ok) => ok,
            Err(e) => {
                let item: Result<Bytes> = Err(e);
                return Box::pin(stream! {
                    yield item;
                });
            }
        };
        let chunk_size = self.chunk_size;
        let path = path.to_string();

        Box::pin(stream! {
            let start = Instant::now();
            let mut handle = match conn.open_read(&url).await {
                Ok(handle) => handle,
                Err(e) => {
                    // ENOENT is a common case, keep the logs clean
                    if e.is_not_found() {
                        info!("file not found on read: path={}", path);
                    } else {
                        warn!("error opening file for read: path={} error={}", path, e);
                    }
                    yield Err(e);
                    return;
                }
            };
            info!(
                "file open for read: path={} elapsed_ms={:.1}",
                path,
                start.elapsed().as_secs_f64() * 1000.0
            );
            let size = match handle.stat().await {
                Ok(stat) => stat.size,
                Err(e) => {
                    let _ = handle.close().await;
                    yield Err(e);
                    return;
                }
            };
            if size == 0 {
                // A zero-length file yields an empty stream, never a
                // zero-sized read request
                let _ = handle.close().await;
                return;
            }
            // Never ask for more than the remaining bytes of a tiny file
            let chunk_size = chunk_size.min(size - 1).max(1);
            let mut offset = 0u64;
            loop {
                match handle.read_chunk(offset, chunk_size).await {
                    Ok(chunk) if chunk.is_empty() => break,
                    Ok(chunk) => {
                        offset += chunk.len() as u64;
                        yield Ok(chunk);
                    }
                    Err(e) => {
                        let _ = handle.close().await;
                        yield Err(e);
                        return;
                    }
                }
            }
            if let Err(e) = handle.close().await {
                warn!("error closing file after read: path={} error={}", path, e);
            }
        })
    }

    /// Write a file on behalf of the given identity.
    ///
    /// The entire content is written and any pre-existing file at the
    /// path is superseded. The booking size defaults to the content
    /// length when not set in `options`.
    pub async fn write(
        &self,
        endpoint: &str,
        path: &str,
        identity: &str,
        content: &[u8],
        options: &WriteOptions,
    ) -> Result<()> {
        let parsed = Identity::parse(identity)?;
        let conn = self.registry.resolve(endpoint)?;
        let size = content.len() as u64;
        debug!("write: path={} size={}", path, size);

        let booking = options.booking_size.unwrap_or(size);
        let mut args = opaque_args(&parsed, options.atomic, booking);
        if options.skip_versioning {
            args.push_str("&sys.versioning=0");
        }
        let url = self.file_url(endpoint, path, &args);

        let start = Instant::now();
        let mut handle = conn.open_write(&url).await.map_err(|e| {
            warn!("error opening file for write: path={} error={}", path, e);
            e
        })?;
        info!(
            "file open for write: path={} elapsed_ms={:.1}",
            path,
            start.elapsed().as_secs_f64() * 1000.0
        );
        // First failure aborts the sequence; the handle is released on drop.
        handle.write(0, content).await.map_err(|e| {
            warn!("error writing file: path={} error={}", path, e);
            e
        })?;
        // The backend may pad short writes; truncate pins the final length
        handle.truncate(size).await.map_err(|e| {
            warn!("error truncating file: path={} error={}", path, e);
            e
        })?;
        handle.close().await.map_err(|e| {
            warn!("error closing file after write: path={} error={}", path, e);
            e
        })
    }

    /// Set the extended attribute `key` to `value`
    pub async fn set_xattr(
        &self,
        endpoint: &str,
        path: &str,
        identity: &str,
        key: &str,
        value: &str,
    ) -> Result<()> {
        let parsed = Identity::parse(identity)?;
        let conn = self.registry.resolve(endpoint)?;
        ProcRequest::new("attr", Some("set"))
            .arg("mgm.attr.key", key)
            .arg("mgm.attr.value", value)
            .arg("mgm.path", self.full_path(path))
            .run(conn.as_ref(), self.registry.url_for(endpoint), &parsed)
            .await?;
        Ok(())
    }

    /// Get the extended attribute `key`.
    ///
    /// An absent attribute is not an error: the backend's unexpected
    /// reply is logged and `None` comes back.
    pub async fn get_xattr(
        &self,
        endpoint: &str,
        path: &str,
        identity: &str,
        key: &str,
    ) -> Result<Option<String>> {
        let parsed = Identity::parse(identity)?;
        let conn = self.registry.resolve(endpoint)?;
        let stdout = ProcRequest::new("attr", Some("get"))
            .arg("mgm.attr.key", key)
            .arg("mgm.path", self.full_path(path))
            .run(conn.as_ref(), self.registry.url_for(endpoint), &parsed)
            .await?;
        match quoted_value(&stdout) {
            Some(value) => Ok(Some(value.to_string())),
            None => {
                warn!(
                    "failed to get xattr: path={} key={} res={}",
                    path, key, stdout
                );
                Ok(None)
            }
        }
    }

    /// Remove the extended attribute `key`
    pub async fn remove_xattr(
        &self,
        endpoint: &str,
        path: &str,
        identity: &str,
        key: &str,
    ) -> Result<()> {
        let parsed = Identity::parse(identity)?;
        let conn = self.registry.resolve(endpoint)?;
        ProcRequest::new("attr", Some("rm"))
            .arg("mgm.attr.key", key)
            .arg("mgm.path", self.full_path(path))
            .run(conn.as_ref(), self.registry.url_for(endpoint), &parsed)
            .await?;
        Ok(())
    }

    /// Rename a file from `old_path` to `new_path`
    pub async fn rename(
        &self,
        endpoint: &str,
        old_path: &str,
        new_path: &str,
        identity: &str,
    ) -> Result<()> {
        let parsed = Identity::parse(identity)?;
        let conn = self.registry.resolve(endpoint)?;
        ProcRequest::new("file", Some("rename"))
            .arg("mgm.path", self.full_path(old_path))
            .arg("mgm.file.source", self.full_path(old_path))
            .arg("mgm.file.target", self.full_path(new_path))
            .run(conn.as_ref(), self.registry.url_for(endpoint), &parsed)
            .await?;
        Ok(())
    }

    /// Remove a file.
    ///
    /// With `force`, the call runs under the root identity and bypasses
    /// the recycle bin. Forced removal requires elevated rights the
    /// calling user does not have; callers must only request it for
    /// system-managed transient files such as lock markers, never for
    /// user content.
    pub async fn remove(
        &self,
        endpoint: &str,
        path: &str,
        identity: &str,
        force: bool,
    ) -> Result<()> {
        let parsed = if force {
            Identity::ROOT
        } else {
            Identity::parse(identity)?
        };
        let conn = self.registry.resolve(endpoint)?;
        let mut request = ProcRequest::new("rm", None).arg("mgm.path", self.full_path(path));
        if force {
            request = request.arg("mgm.option", "f");
        }
        request
            .run(conn.as_ref(), self.registry.url_for(endpoint), &parsed)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::error::StorageError;

    #[test]
    fn test_write_options_default() {
        let options = WriteOptions::default();
        assert!(!options.atomic);
        assert!(options.booking_size.is_none());
        assert!(!options.skip_versioning);
    }

    #[test]
    fn test_error_variant_for_bad_identity() {
        // Identity validation happens before any network access
        let err = Identity::parse("not-an-identity").unwrap_err();
        assert!(matches!(err, StorageError::InvalidIdentity(_)));
    }
}
