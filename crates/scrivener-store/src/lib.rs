//! Scrivener Storage Layer
//!
//! Implements the `ObjectStore` and `JobStore` traits from `scrivener-domain`.
//!
//! # Architecture
//!
//! - `FsObjectStore`: objects as files under a root directory (keys map to relative paths)
//! - `MemoryObjectStore`: objects in a map, for tests and ephemeral runs
//! - `MemoryJobStore`: job status records in a map; nothing survives a restart
//!
//! # Examples
//!
//! ```
//! use scrivener_store::MemoryObjectStore;
//! use scrivener_domain::ObjectStore;
//!
//! let store = MemoryObjectStore::new();
//! store.put("input/doc.txt", b"Payment is due in 30 days.", "text/plain").unwrap();
//! assert_eq!(store.get("input/doc.txt").unwrap(), b"Payment is due in 30 days.");
//! ```

#![warn(missing_docs)]

mod job;
mod object;

pub use job::MemoryJobStore;
pub use object::{FsObjectStore, MemoryObjectStore};

use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Object or record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Key cannot be mapped to a storage location
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// A record with the same id already exists
    #[error("Duplicate record: {0}")]
    Duplicate(String),

    /// Internal lock was poisoned by a panicking writer
    #[error("Store lock poisoned")]
    Poisoned,
}
