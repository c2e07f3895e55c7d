//! Namespaced key/blob storage
//!
//! A `KeyValueBlobStore` maps string keys to opaque byte blobs inside a
//! single namespace fixed at construction. Writes are all-or-nothing: a
//! `get` returns either the complete bytes of an earlier `put` or nothing.
//!
//! Two backends are provided: `FileBlobStore` keeps one directory per
//! namespace and survives restarts, `MemoryBlobStore` lives for the
//! lifetime of its shared backend.

pub mod error;
pub mod file;
pub mod memory;
pub mod store;

pub use error::{Result, StoreError};
pub use file::FileBlobStore;
pub use memory::MemoryBlobStore;
pub use store::KeyValueBlobStore;
