//! In-memory backend for tests and local runs.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use meshbridge_protocol::PartEtag;

use crate::{ObjectStore, StorageError};

#[derive(Default)]
struct Inner {
    objects: HashMap<(String, String), Vec<u8>>,
    uploads: HashMap<String, PendingUpload>,
    next_upload: u64,
    uploads_created: u32,
    uploads_completed: u32,
    single_puts: u32,
}

struct PendingUpload {
    bucket: String,
    key: String,
    parts: BTreeMap<i32, (String, Vec<u8>)>,
}

/// [`ObjectStore`] backed by process memory.
///
/// Also counts single PUTs and multipart lifecycle calls so engine tests
/// can assert how an object was written, not just what it contains.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seeds an object (test setup).
    pub fn insert(&self, bucket: &str, key: &str, data: Vec<u8>) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .objects
            .insert((bucket.to_string(), key.to_string()), data);
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        let inner = self.inner.lock().unwrap();
        inner
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub fn object_count(&self) -> usize {
        self.inner.lock().unwrap().objects.len()
    }

    pub fn single_puts(&self) -> u32 {
        self.inner.lock().unwrap().single_puts
    }

    pub fn uploads_created(&self) -> u32 {
        self.inner.lock().unwrap().uploads_created
    }

    pub fn uploads_completed(&self) -> u32 {
        self.inner.lock().unwrap().uploads_completed
    }

    /// Number of parts staged on a still-open upload.
    pub fn staged_parts(&self, upload_id: &str) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.uploads.get(upload_id).map_or(0, |u| u.parts.len())
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn head_object(&self, bucket: &str, key: &str) -> Result<Option<u64>, StorageError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|d| d.len() as u64))
    }

    async fn put_object(&self, bucket: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().unwrap();
        inner.single_puts += 1;
        inner
            .objects
            .insert((bucket.to_string(), key.to_string()), data.to_vec());
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let inner = self.inner.lock().unwrap();
        inner
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }

    async fn get_range(
        &self,
        bucket: &str,
        key: &str,
        start: u64,
        end: u64,
    ) -> Result<Vec<u8>, StorageError> {
        let inner = self.inner.lock().unwrap();
        let data = inner
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .ok_or_else(|| StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })?;
        let len = data.len() as u64;
        if start >= len {
            return Ok(Vec::new());
        }
        let end = end.min(len - 1);
        Ok(data[start as usize..=end as usize].to_vec())
    }

    async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<String, StorageError> {
        let mut inner = self.inner.lock().unwrap();
        inner.next_upload += 1;
        inner.uploads_created += 1;
        let upload_id = format!("upload-{}", inner.next_upload);
        inner.uploads.insert(
            upload_id.clone(),
            PendingUpload {
                bucket: bucket.to_string(),
                key: key.to_string(),
                parts: BTreeMap::new(),
            },
        );
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        data: Vec<u8>,
    ) -> Result<String, StorageError> {
        let mut inner = self.inner.lock().unwrap();
        let upload = inner
            .uploads
            .get_mut(upload_id)
            .ok_or_else(|| StorageError::InvalidResponse(format!("unknown upload {upload_id}")))?;
        if upload.bucket != bucket || upload.key != key {
            return Err(StorageError::InvalidResponse(format!(
                "upload {upload_id} does not belong to {bucket}/{key}"
            )));
        }
        let etag = format!("\"etag-{part_number}-{}\"", data.len());
        upload.parts.insert(part_number, (etag.clone(), data));
        Ok(etag)
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[PartEtag],
    ) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().unwrap();
        let upload = inner
            .uploads
            .remove(upload_id)
            .ok_or_else(|| StorageError::InvalidResponse(format!("unknown upload {upload_id}")))?;
        let mut assembled = Vec::new();
        for part in parts {
            let (etag, data) = upload.parts.get(&part.part_number).ok_or_else(|| {
                StorageError::InvalidResponse(format!("part {} never uploaded", part.part_number))
            })?;
            if etag != &part.etag {
                return Err(StorageError::InvalidResponse(format!(
                    "ETag mismatch on part {}",
                    part.part_number
                )));
            }
            assembled.extend_from_slice(data);
        }
        inner.uploads_completed += 1;
        inner
            .objects
            .insert((bucket.to_string(), key.to_string()), assembled);
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .objects
            .remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }
}
