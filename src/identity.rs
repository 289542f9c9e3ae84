//! Caller identity parsing and opaque-argument encoding
//!
//! Every request against the backend carries the uid/gid pair of the end
//! user it runs on behalf of, encoded as EOS opaque query arguments. The
//! backend enforces impersonation and quota bookkeeping from these.

use std::fmt;

use crate::error::{Result, StorageError};

/// Application tag attached to every request, used by the backend for
/// accounting and log correlation.
pub const APP_TAG: &str = "wopi";

/// A resolved numeric user/group pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub uid: u32,
    pub gid: u32,
}

impl Identity {
    /// Privileged identity used for forced removal of system-managed files
    pub const ROOT: Identity = Identity { uid: 0, gid: 0 };

    /// Parse an identity from its `"<uid>:<gid>"` wire form
    ///
    /// Exactly two colon-separated non-negative integers are accepted;
    /// anything else is an `InvalidIdentity` error.
    pub fn parse(s: &str) -> Result<Self> {
        let mut parts = s.split(':');
        let (uid, gid) = match (parts.next(), parts.next(), parts.next()) {
            (Some(uid), Some(gid), None) => (uid, gid),
            _ => return Err(StorageError::InvalidIdentity(s.to_string())),
        };
        let uid = uid
            .parse::<u32>()
            .map_err(|_| StorageError::InvalidIdentity(s.to_string()))?;
        let gid = gid
            .parse::<u32>()
            .map_err(|_| StorageError::InvalidIdentity(s.to_string()))?;
        Ok(Identity { uid, gid })
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.uid, self.gid)
    }
}

/// Encode the identity plus per-call options into the opaque query
/// fragment appended to every file and proc URL.
pub(crate) fn opaque_args(identity: &Identity, atomic: bool, booking_size: u64) -> String {
    let mut args = format!(
        "?eos.ruid={}&eos.rgid={}&eos.app={}",
        identity.uid, identity.gid, APP_TAG
    );
    if atomic {
        args.push_str("&eos.atomic=1");
    }
    if booking_size > 0 {
        args.push_str(&format!("&eos.bookingsize={}", booking_size));
    }
    args
}
