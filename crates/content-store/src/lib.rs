//! Content storage for GFHS
//!
//! This crate owns the raw bytes of hosted files. Bytes are addressed only by
//! an opaque key (the file id); names, namespaces and size/MIME metadata live
//! in the daemon's database.
//!
//! # Features
//!
//! - Multiple storage backends: S3-compatible, local filesystem, in-memory
//! - Whole-object puts: a concurrent reader sees either the previous object or
//!   the new one, never a partially written one
//! - Per-key reader/writer locks for callers that must keep bytes and external
//!   metadata in step
//!
//! # Example
//!
//! ```rust,no_run
//! use content_store::{ContentStore, ContentStoreConfig};
//! use std::path::PathBuf;
//!
//! # async fn example() -> Result<(), content_store::ContentStoreError> {
//! let store = ContentStore::new(ContentStoreConfig::Local {
//!     path: PathBuf::from("/tmp/gfhs-content"),
//! })
//! .await?;
//!
//! let _guard = store.locks().write("0123456789abcdef0123456789abcdef").await;
//! store.put("0123456789abcdef0123456789abcdef", "hello".into()).await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod locks;
mod storage;

pub use error::{ContentStoreError, Result};
pub use locks::KeyedLocks;
pub use storage::{ContentStore, ContentStoreConfig};
