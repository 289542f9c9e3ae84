//! Backend transport seam
//!
//! The adapter talks to the storage cluster through these traits, which
//! mirror the remote client surface it needs: per-endpoint connections,
//! single-use file handles for streamed reads and staged writes, and the
//! opaque-query call used by extended stat. The production implementation
//! speaks to the EOS HTTP gateway; tests substitute an in-memory one
//! through [`ConnectionFactory`].

pub mod http;

use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Size and modification time as reported by the backend
#[derive(Debug, Clone, Copy)]
pub struct RemoteStat {
    pub size: u64,
    pub mtime: SystemTime,
}

/// A reusable handle bound to one endpoint
///
/// Created once per distinct endpoint string and retained for the process
/// lifetime. Must tolerate concurrent independent calls; the file handles
/// it hands out are single-use and never shared.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Stat a remote URL
    async fn stat(&self, url: &str) -> Result<RemoteStat>;

    /// Issue an opaque query against a remote URL and return the raw
    /// textual payload. Channel-level failures are errors; application-level
    /// failures may still be embedded in the payload.
    async fn query_stat(&self, url: &str) -> Result<String>;

    /// Open a remote URL for reading
    async fn open_read(&self, url: &str) -> Result<Box<dyn ReadHandle>>;

    /// Open a remote URL for exclusive create-or-replace writing
    async fn open_write(&self, url: &str) -> Result<Box<dyn WriteHandle>>;
}

/// A single-use read handle
///
/// Lifecycle: opened by [`Connection::open_read`], then stat/read calls,
/// then exactly one `close`. Reads are sequential; a handle is never
/// reused concurrently.
#[async_trait]
pub trait ReadHandle: Send {
    /// Stat the open file
    async fn stat(&mut self) -> Result<RemoteStat>;

    /// Read up to `size` bytes at `offset`. An empty buffer signals EOF.
    async fn read_chunk(&mut self, offset: u64, size: u64) -> Result<Bytes>;

    /// Read one line of response text, newline-stripped (proc commands)
    async fn read_line(&mut self) -> Result<String>;

    /// Release the handle
    async fn close(&mut self) -> Result<()>;
}

/// A single-use write handle
///
/// Lifecycle: opened by [`Connection::open_write`], then write/truncate,
/// then exactly one `close`. Each step is an independent failure point.
/// Dropping a handle without closing it releases it and discards any
/// staged data.
#[async_trait]
pub trait WriteHandle: Send {
    /// Write `data` at `offset`
    async fn write(&mut self, offset: u64, data: &[u8]) -> Result<()>;

    /// Truncate the file to `size` bytes
    async fn truncate(&mut self, size: u64) -> Result<()>;

    /// Finalize and release the handle
    async fn close(&mut self) -> Result<()>;
}

/// Factory creating connections for the endpoint registry
///
/// `connect` is called at most once per distinct endpoint string, under
/// the registry's create-or-fetch critical section.
pub trait ConnectionFactory: Send + Sync {
    fn connect(&self, endpoint: &str) -> Result<Arc<dyn Connection>>;
}
