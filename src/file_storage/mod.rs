//! # File Storage Facade
//!
//! Size-capped upload, download, removal and listing of objects, plus
//! bucket management, over a hosted object store.

pub mod backend;
pub mod errors;
pub mod memory;
pub mod service;

pub use backend::{checksum, BucketInfo, ObjectInfo, ObjectStore};
pub use errors::{StorageError, StorageResult};
pub use memory::MemoryObjectStore;
pub use service::{StorageService, DEFAULT_UPLOAD_LIMIT};
