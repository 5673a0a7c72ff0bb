use async_trait::async_trait;
use meshbridge_protocol::PartEtag;

use crate::StorageError;

/// Low-level object-storage operations, implemented by each backend.
///
/// Ranged reads use inclusive byte offsets to match the HTTP `Range`
/// header the S3 backend sends.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Returns the object's size in bytes, or `None` if it does not exist.
    async fn head_object(&self, bucket: &str, key: &str) -> Result<Option<u64>, StorageError>;

    /// Writes an object in a single PUT.
    async fn put_object(&self, bucket: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Reads an entire object.
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Reads `bytes=start-end` (inclusive), clamped to the object's size.
    async fn get_range(
        &self,
        bucket: &str,
        key: &str,
        start: u64,
        end: u64,
    ) -> Result<Vec<u8>, StorageError>;

    /// Starts a multipart upload and returns its upload id.
    async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<String, StorageError>;

    /// Uploads one numbered part and returns its ETag.
    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        data: Vec<u8>,
    ) -> Result<String, StorageError>;

    /// Completes a multipart upload from the ordered part list.
    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[PartEtag],
    ) -> Result<(), StorageError>;

    /// Deletes an object. Deleting a missing object is not an error.
    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), StorageError>;
}
