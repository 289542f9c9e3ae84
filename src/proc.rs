//! Admin command channel
//!
//! Operations the storage layer does not expose through direct file I/O
//! (attribute management, rename, forced delete) go through the MGM's
//! `/proc/user/` interface: a specially-formed URL is opened for read,
//! one line of response text comes back, and the handle is released.

use std::time::Instant;

use tracing::{debug, info};

use crate::error::Result;
use crate::identity::{opaque_args, Identity};
use crate::response::ProcResponse;
use crate::transport::Connection;

/// One proc command: name, optional subcommand, extra query fields
pub(crate) struct ProcRequest<'a> {
    pub cmd: &'a str,
    pub subcmd: Option<&'a str>,
    pub args: Vec<(&'a str, String)>,
}

impl<'a> ProcRequest<'a> {
    pub fn new(cmd: &'a str, subcmd: Option<&'a str>) -> Self {
        Self {
            cmd,
            subcmd,
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, key: &'a str, value: impl Into<String>) -> Self {
        self.args.push((key, value.into()));
        self
    }

    fn url(&self, endpoint_url: &str, identity: &Identity) -> String {
        let mut url = format!(
            "{}//proc/user/{}&mgm.cmd={}",
            endpoint_url,
            opaque_args(identity, false, 0),
            self.cmd
        );
        if let Some(subcmd) = self.subcmd {
            url.push_str(&format!("&mgm.subcmd={}", subcmd));
        }
        for (key, value) in &self.args {
            url.push_str(&format!("&{}={}", key, value));
        }
        url
    }

    /// Execute the command on the given connection and return its stdout
    /// payload. The handle is closed unconditionally after the single
    /// line read; a non-zero return code surfaces as `AdminCommand`.
    pub async fn run(
        self,
        conn: &dyn Connection,
        endpoint_url: &str,
        identity: &Identity,
    ) -> Result<String> {
        let url = self.url(endpoint_url, identity);
        let start = Instant::now();
        let mut handle = conn.open_read(&url).await?;
        let line = handle.read_line().await;
        let _ = handle.close().await;
        info!(
            "proc command: cmd={}{} elapsed_ms={:.1}",
            self.cmd,
            self.subcmd.map(|s| format!("/{}", s)).unwrap_or_default(),
            start.elapsed().as_secs_f64() * 1000.0
        );
        let response = ProcResponse::parse(&line?).map_err(|e| {
            debug!("proc command failed: cmd={} error={}", self.cmd, e);
            e
        })?;
        Ok(response.stdout)
    }
}
