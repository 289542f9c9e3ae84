//! HTTP gateway transport
//!
//! Production transport speaking to the EOS MGM's embedded HTTP gateway,
//! which accepts the same opaque query arguments as the native protocol.
//! Reads stream the response body; writes are staged in the handle and
//! transmitted as a single PUT on close, matching the gateway's
//! whole-file upload semantics.

use std::pin::Pin;
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use reqwest::{Client, Response, StatusCode};
use tracing::trace;

use crate::error::{Result, StorageError};
use crate::transport::{Connection, ConnectionFactory, ReadHandle, RemoteStat, WriteHandle};

/// Factory producing [`HttpConnection`]s for the endpoint registry
#[derive(Debug, Default)]
pub struct HttpFactory;

impl ConnectionFactory for HttpFactory {
    fn connect(&self, endpoint: &str) -> Result<Arc<dyn Connection>> {
        let client = Client::builder()
            .build()
            .map_err(|e| StorageError::Connection(format!("{}: {}", endpoint, e)))?;
        Ok(Arc::new(HttpConnection { client }))
    }
}

/// Connection to one endpoint's HTTP gateway
pub struct HttpConnection {
    client: Client,
}

fn request_error(e: reqwest::Error) -> StorageError {
    if e.is_connect() || e.is_timeout() || e.is_builder() {
        StorageError::Connection(e.to_string())
    } else {
        StorageError::Io(e.to_string())
    }
}

/// Map a non-success response status to the adapter's error taxonomy
fn status_error(url: &str, status: StatusCode) -> StorageError {
    if status == StatusCode::NOT_FOUND {
        StorageError::NotFound(url.to_string())
    } else {
        StorageError::Io(format!("{}: HTTP {}", url, status))
    }
}

/// A missing Content-Length (chunked or compressed gateway reply) must
/// never be mistaken for an empty file.
fn require_length(url: &str, length: Option<u64>) -> Result<u64> {
    length.ok_or_else(|| {
        StorageError::Io(format!("{}: response carries no Content-Length", url))
    })
}

fn mtime_from_response(resp: &Response) -> SystemTime {
    resp.headers()
        .get(reqwest::header::LAST_MODIFIED)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| chrono::DateTime::parse_from_rfc2822(v).ok())
        .map(SystemTime::from)
        .unwrap_or(SystemTime::UNIX_EPOCH)
}

#[async_trait]
impl Connection for HttpConnection {
    async fn stat(&self, url: &str) -> Result<RemoteStat> {
        let resp = self
            .client
            .head(url)
            .send()
            .await
            .map_err(request_error)?;
        if !resp.status().is_success() {
            return Err(status_error(url, resp.status()));
        }
        let size = require_length(url, resp.content_length())?;
        Ok(RemoteStat {
            size,
            mtime: mtime_from_response(&resp),
        })
    }

    async fn query_stat(&self, url: &str) -> Result<String> {
        let resp = self.client.get(url).send().await.map_err(request_error)?;
        if !resp.status().is_success() {
            return Err(status_error(url, resp.status()));
        }
        resp.text().await.map_err(request_error)
    }

    async fn open_read(&self, url: &str) -> Result<Box<dyn ReadHandle>> {
        trace!("open_read: url={}", url);
        let resp = self.client.get(url).send().await.map_err(request_error)?;
        if !resp.status().is_success() {
            return Err(status_error(url, resp.status()));
        }
        let size = resp.content_length();
        let mtime = mtime_from_response(&resp);
        Ok(Box::new(HttpReadHandle {
            size,
            mtime,
            body: Box::pin(resp.bytes_stream()),
            buf: BytesMut::new(),
            eof: false,
        }))
    }

    async fn open_write(&self, url: &str) -> Result<Box<dyn WriteHandle>> {
        trace!("open_write: url={}", url);
        Ok(Box::new(HttpWriteHandle {
            client: self.client.clone(),
            url: url.to_string(),
            buf: Vec::new(),
            sent: false,
        }))
    }
}

struct HttpReadHandle {
    /// Content-Length of the response, when the gateway sent one
    size: Option<u64>,
    mtime: SystemTime,
    body: Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>,
    buf: BytesMut,
    eof: bool,
}

impl HttpReadHandle {
    /// Pull from the body stream until `wanted` bytes are buffered or EOF
    async fn fill(&mut self, wanted: usize) -> Result<()> {
        while !self.eof && self.buf.len() < wanted {
            match self.body.next().await {
                Some(Ok(chunk)) => self.buf.extend_from_slice(&chunk),
                Some(Err(e)) => return Err(request_error(e)),
                None => self.eof = true,
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ReadHandle for HttpReadHandle {
    async fn stat(&mut self) -> Result<RemoteStat> {
        let size = match self.size {
            Some(size) => size,
            None => {
                // Chunked or compressed replies carry no Content-Length.
                // Probe the body so an unknown size is never reported as
                // an empty file; the buffered amount is a lower bound,
                // reads still run to end of stream.
                self.fill(8192).await?;
                let size = self.buf.len() as u64;
                self.size = Some(size);
                size
            }
        };
        Ok(RemoteStat {
            size,
            mtime: self.mtime,
        })
    }

    async fn read_chunk(&mut self, _offset: u64, size: u64) -> Result<Bytes> {
        self.fill(size as usize).await?;
        let take = self.buf.len().min(size as usize);
        Ok(self.buf.split_to(take).freeze())
    }

    async fn read_line(&mut self) -> Result<String> {
        loop {
            if let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
                let line = self.buf.split_to(pos + 1);
                return Ok(String::from_utf8_lossy(&line[..pos]).into_owned());
            }
            if self.eof {
                let line = self.buf.split();
                return Ok(String::from_utf8_lossy(&line).into_owned());
            }
            let wanted = self.buf.len() + 8192;
            self.fill(wanted).await?;
        }
    }

    async fn close(&mut self) -> Result<()> {
        // Dropping the body stream aborts any remaining transfer.
        self.eof = true;
        Ok(())
    }
}

struct HttpWriteHandle {
    client: Client,
    url: String,
    buf: Vec<u8>,
    sent: bool,
}

#[async_trait]
impl WriteHandle for HttpWriteHandle {
    async fn write(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        if offset as usize != self.buf.len() {
            return Err(StorageError::Io(format!(
                "{}: non-sequential write at offset {} not supported by the HTTP gateway",
                self.url, offset
            )));
        }
        self.buf.extend_from_slice(data);
        Ok(())
    }

    async fn truncate(&mut self, size: u64) -> Result<()> {
        if size as usize > self.buf.len() {
            return Err(StorageError::Io(format!(
                "{}: cannot truncate beyond staged length",
                self.url
            )));
        }
        self.buf.truncate(size as usize);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.sent {
            return Ok(());
        }
        let body = std::mem::take(&mut self.buf);
        let resp = self
            .client
            .put(&self.url)
            .body(body)
            .send()
            .await
            .map_err(request_error)?;
        self.sent = true;
        if !resp.status().is_success() {
            return Err(status_error(&self.url, resp.status()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn handle(size: Option<u64>, chunks: Vec<&'static [u8]>) -> HttpReadHandle {
        let items: Vec<reqwest::Result<Bytes>> = chunks
            .into_iter()
            .map(|c| Ok(Bytes::from_static(c)))
            .collect();
        HttpReadHandle {
            size,
            mtime: SystemTime::UNIX_EPOCH,
            body: Box::pin(stream::iter(items)),
            buf: BytesMut::new(),
            eof: false,
        }
    }

    #[tokio::test]
    async fn test_stat_probes_body_when_length_unknown() {
        let mut h = handle(None, vec![b"some file data"]);
        let stat = h.stat().await.unwrap();
        assert_eq!(stat.size, 14);

        // The probe must not consume the body
        let mut data = Vec::new();
        loop {
            let chunk = h.read_chunk(data.len() as u64, 4).await.unwrap();
            if chunk.is_empty() {
                break;
            }
            data.extend_from_slice(&chunk);
        }
        assert_eq!(data, b"some file data");
    }

    #[tokio::test]
    async fn test_stat_unknown_length_empty_body_is_zero() {
        let mut h = handle(None, vec![]);
        assert_eq!(h.stat().await.unwrap().size, 0);
    }

    #[tokio::test]
    async fn test_stat_trusts_declared_length() {
        let mut h = handle(Some(5), vec![b"hello"]);
        assert_eq!(h.stat().await.unwrap().size, 5);
        // Nothing buffered ahead of the first read
        assert!(h.buf.is_empty());
    }

    #[tokio::test]
    async fn test_read_line_spans_chunks() {
        let mut h = handle(None, vec![b"stdout=a&st", b"derr=&rc=0\nrest"]);
        assert_eq!(h.read_line().await.unwrap(), "stdout=a&stderr=&rc=0");
    }

    #[test]
    fn test_require_length() {
        assert_eq!(require_length("u", Some(7)).unwrap(), 7);
        match require_length("https://mgm/f", None).unwrap_err() {
            StorageError::Io(msg) => assert!(msg.contains("Content-Length")),
            other => panic!("expected Io, got {:?}", other),
        }
    }
}
