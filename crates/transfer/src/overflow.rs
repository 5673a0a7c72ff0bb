//! Part overflow buffer.
//!
//! Wire chunks and storage parts are sized independently, so a chunk's
//! tail can be smaller than the minimum multipart part size. Those bytes
//! are persisted as a side object between invocations and prepended to
//! the next chunk's data. The key includes the upload id so concurrent
//! retries of the same message never collide on the buffer.

use meshbridge_store::{ObjectStore, StorageError};

/// Side-object key for a transfer's overflow bytes.
pub fn overflow_key(key: &str, upload_id: &str) -> String {
    format!("{key}.{upload_id}.overflow")
}

/// Loads pending overflow bytes, empty when none were persisted.
pub(crate) async fn load(
    store: &dyn ObjectStore,
    bucket: &str,
    key: &str,
    upload_id: &str,
) -> Result<Vec<u8>, StorageError> {
    let side_key = overflow_key(key, upload_id);
    match store.get_object(bucket, &side_key).await {
        Ok(data) => Ok(data),
        Err(StorageError::NotFound { .. }) => Ok(Vec::new()),
        Err(e) => Err(e),
    }
}

/// Persists overflow bytes for the next invocation (or clears them when
/// there is nothing to carry).
pub(crate) async fn save(
    store: &dyn ObjectStore,
    bucket: &str,
    key: &str,
    upload_id: &str,
    data: &[u8],
) -> Result<(), StorageError> {
    let side_key = overflow_key(key, upload_id);
    if data.is_empty() {
        store.delete_object(bucket, &side_key).await
    } else {
        store.put_object(bucket, &side_key, data).await
    }
}

/// Removes the side object once the transfer completes.
pub(crate) async fn clear(
    store: &dyn ObjectStore,
    bucket: &str,
    key: &str,
    upload_id: &str,
) -> Result<(), StorageError> {
    store.delete_object(bucket, &overflow_key(key, upload_id)).await
}
