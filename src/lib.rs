//! eos-adapter: EOS/XRootD storage backend adapter for WOPI document servers
//!
//! This library lets an application-layer document-editing server perform
//! file operations against a remote, multi-tenant EOS cluster while
//! impersonating the end user each operation executes on behalf of.
//!
//! # Architecture
//!
//! - **Adapter**: the public surface. Each operation takes an endpoint,
//!   a path and a `"uid:gid"` identity, and returns a typed result.
//! - **Endpoint Registry**: one lazily-created connection per distinct
//!   endpoint string, retained for the process lifetime.
//! - **Transport**: trait seam over the backend protocol; the production
//!   implementation speaks to the EOS HTTP gateway.
//! - **Admin channel**: rename, attribute management and forced delete
//!   go through the MGM's `/proc/user/` command interface.
//!
//! # Example
//!
//! ```no_run
//! use eos_adapter::{StorageAdapter, StorageConfig, WriteOptions};
//!
//! # async fn example() -> eos_adapter::Result<()> {
//! let config = StorageConfig::from_str(
//!     "endpoint: \"https://eosmgm.example.org:8443\"\nhome_path: /eos/wopi\n",
//! ).expect("config");
//! let adapter = StorageAdapter::new(&config)?;
//!
//! adapter
//!     .write("default", "/docs/report.docx", "1000:1000", b"content", &WriteOptions::default())
//!     .await?;
//! let stat = adapter.stat("default", "/docs/report.docx", "1000:1000").await?;
//! assert_eq!(stat.size, 7);
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod config;
pub mod error;
pub mod identity;
mod proc;
pub mod registry;
pub mod response;
pub mod transport;

pub use adapter::{ByteStream, ExtendedFileStat, FileStat, StorageAdapter, WriteOptions};
pub use config::StorageConfig;
pub use error::{Result, StorageError};
pub use identity::Identity;
