//! Object-storage operations consumed by the transfer engines.
//!
//! The engines only ever talk to the [`ObjectStore`] trait; `S3Store` is the
//! production backend and `MemoryStore` backs tests and local runs.

mod memory;
mod s3;
mod traits;

pub use memory::MemoryStore;
pub use s3::S3Store;
pub use traits::ObjectStore;

/// Smallest part the storage engine accepts in a multipart upload, except
/// for the final part. Wire chunks are sized independently of this, which
/// is why undersized tails must be buffered rather than uploaded.
pub const MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Errors from storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("object not found: s3://{bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("storage request failed: {message}")]
    Network { message: String, retryable: bool },

    #[error("unexpected storage response: {0}")]
    InvalidResponse(String),
}

impl StorageError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StorageError::Network { retryable: true, .. })
    }
}
