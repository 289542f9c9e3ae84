//! Response parsers for the backend's semi-structured textual replies
//!
//! Two shapes come back from the storage layer: the proc-command triple
//! (`stdout=<text>&stderr=<text>&rc=<code>`) and the whitespace-delimited
//! record produced by the opaque stat query. Both are parsed here,
//! independently of the network layer.

use std::time::{Duration, SystemTime};

use crate::error::{Result, StorageError};
use crate::identity::Identity;

/// Parsed proc-command response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcResponse {
    /// The stdout payload, stripped of the `stdout=` prefix
    pub stdout: String,
}

impl ProcResponse {
    /// Parse one line of proc-command response text.
    ///
    /// Field order and presence are not guaranteed by the backend; only
    /// the exact three-field case carries a return code. Anything else is
    /// treated as success with the raw line as stdout.
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim_end_matches('\n');
        let fields: Vec<&str> = line.split('&').collect();
        if fields.len() != 3 {
            return Ok(ProcResponse {
                stdout: strip_field(fields[0], "stdout="),
            });
        }
        // rc codes may come back NUL-padded
        let code = value_of(fields[2]).trim_matches(|c: char| c == '\0' || c.is_whitespace());
        if code != "0" {
            return Err(StorageError::AdminCommand {
                code: code.to_string(),
                message: value_of(fields[1]).to_string(),
            });
        }
        Ok(ProcResponse {
            stdout: strip_field(fields[0], "stdout="),
        })
    }
}

/// Extract the quoted value from a `key="value"` attribute payload.
///
/// Returns `None` when the quoted form is absent, which covers backends
/// that do not have the attribute set.
pub fn quoted_value(payload: &str) -> Option<&str> {
    let mut parts = payload.split('"');
    parts.next()?;
    parts.next()
}

/// Everything after the first `=` of a field, or the whole field
fn value_of(field: &str) -> &str {
    match field.find('=') {
        Some(pos) => &field[pos + 1..],
        None => field,
    }
}

fn strip_field(field: &str, prefix: &str) -> String {
    match field.find(prefix) {
        Some(pos) => field[pos + prefix.len()..].to_string(),
        None => field.to_string(),
    }
}

/// Fixed token positions in the opaque stat record
const STATX_INODE: usize = 2;
const STATX_UID: usize = 5;
const STATX_GID: usize = 6;
const STATX_SIZE: usize = 8;
const STATX_MTIME: usize = 12;

/// Parsed opaque stat record
#[derive(Debug, Clone)]
pub struct StatxRecord {
    pub inode: String,
    pub owner: Identity,
    pub size: u64,
    pub mtime: SystemTime,
}

impl StatxRecord {
    /// Parse the whitespace-delimited record returned by the opaque stat
    /// query. A `retc=` field marks an application-level failure despite
    /// channel-level success.
    pub fn parse(payload: &str) -> Result<Self> {
        if payload.contains("retc=") {
            return Err(StorageError::Io(payload.trim_end_matches('\n').to_string()));
        }
        let tokens: Vec<&str> = payload.split_whitespace().collect();
        if tokens.len() <= STATX_MTIME {
            return Err(StorageError::Io(format!(
                "Malformed stat record: {}",
                payload.trim_end_matches('\n')
            )));
        }
        let malformed = || StorageError::Io(format!("Malformed stat record: {}", payload.trim()));
        let uid = tokens[STATX_UID].parse::<u32>().map_err(|_| malformed())?;
        let gid = tokens[STATX_GID].parse::<u32>().map_err(|_| malformed())?;
        let size = tokens[STATX_SIZE].parse::<u64>().map_err(|_| malformed())?;
        // mtime arrives as seconds, possibly with a fractional part
        let secs = tokens[STATX_MTIME]
            .split('.')
            .next()
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(malformed)?;
        Ok(StatxRecord {
            inode: tokens[STATX_INODE].to_string(),
            owner: Identity { uid, gid },
            size,
            mtime: SystemTime::UNIX_EPOCH + Duration::from_secs(secs),
        })
    }
}
