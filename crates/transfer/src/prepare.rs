//! Builds the initial outbound state for a send.
//!
//! Runs once per transfer, before the first chunk: guards against a
//! concurrent transfer for the same mailbox, sizes the source object and
//! plans the chunking.

use tracing::info;
use uuid::Uuid;

use meshbridge_protocol::OutboundState;
use meshbridge_registry::{ExecutionRegistry, SingletonError, check as singleton_check};
use meshbridge_store::{ObjectStore, StorageError};

use crate::planner::{self, PlanError};

/// Parameters of a requested send.
#[derive(Debug, Clone)]
pub struct SendRequest {
    pub src_mailbox: String,
    pub dest_mailbox: String,
    pub workflow_id: String,
    /// Workflow name in the execution registry, used for the singleton
    /// check. Distinct from `workflow_id`, which is the wire-level
    /// routing id.
    pub workflow_name: String,
    pub bucket: String,
    pub key: String,
    pub chunk_size: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum PrepareError {
    #[error(transparent)]
    Singleton(#[from] SingletonError),

    #[error("source object is empty or missing: s3://{bucket}/{key}")]
    EmptySource { bucket: String, key: String },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Plan(#[from] PlanError),
}

/// Validates a send request and returns the state for its first chunk.
pub async fn prepare_send(
    store: &dyn ObjectStore,
    registry: &dyn ExecutionRegistry,
    request: SendRequest,
) -> Result<OutboundState, PrepareError> {
    singleton_check(registry, &request.src_mailbox, &request.workflow_name).await?;

    let size = store
        .head_object(&request.bucket, &request.key)
        .await?
        .filter(|s| *s > 0)
        .ok_or_else(|| PrepareError::EmptySource {
            bucket: request.bucket.clone(),
            key: request.key.clone(),
        })?;

    let plan = planner::plan(size, request.chunk_size)?;
    info!(
        src = %request.src_mailbox,
        dest = %request.dest_mailbox,
        key = %request.key,
        size,
        chunks = plan.chunk_count,
        "send prepared"
    );

    Ok(OutboundState {
        src_mailbox: request.src_mailbox,
        dest_mailbox: request.dest_mailbox,
        workflow_id: request.workflow_id,
        bucket: request.bucket,
        key: request.key,
        chunked: plan.chunked,
        chunk_number: 1,
        total_chunks: plan.chunk_count,
        chunk_size: request.chunk_size,
        current_byte_position: 0,
        compress_ratio: 1,
        will_compress: false,
        message_id: None,
        complete: false,
        internal_id: Uuid::new_v4().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshbridge_registry::MemoryRegistry;
    use meshbridge_store::MemoryStore;

    fn request() -> SendRequest {
        SendRequest {
            src_mailbox: "MESH-UI-01".into(),
            dest_mailbox: "MESH-UI-02".into(),
            workflow_id: "API-DOCS".into(),
            workflow_name: "send-file".into(),
            bucket: "transfers".into(),
            key: "outbound/data.csv".into(),
            chunk_size: 10,
        }
    }

    fn registry() -> MemoryRegistry {
        MemoryRegistry::new()
            .with_workflow("send-file", "wf-1")
            .with_execution("wf-1", "exec-1", r#"{"mailbox": "MESH-UI-01"}"#)
    }

    #[tokio::test]
    async fn prepares_chunked_state_from_object_size() {
        let store = MemoryStore::new();
        store.insert("transfers", "outbound/data.csv", b"x".repeat(35));

        let state = prepare_send(&store, &registry(), request()).await.unwrap();

        assert_eq!(state.total_chunks, 4);
        assert!(state.chunked);
        assert_eq!(state.chunk_number, 1);
        assert_eq!(state.current_byte_position, 0);
        assert!(state.message_id.is_none());
        assert!(!state.complete);
        assert!(!state.internal_id.is_empty());
    }

    #[tokio::test]
    async fn small_file_is_unchunked() {
        let store = MemoryStore::new();
        store.insert("transfers", "outbound/data.csv", b"x".repeat(7));
        let state = prepare_send(&store, &registry(), request()).await.unwrap();
        assert_eq!(state.total_chunks, 1);
        assert!(!state.chunked);
    }

    #[tokio::test]
    async fn concurrent_transfer_is_rejected_before_storage() {
        let store = MemoryStore::new();
        let registry = registry().with_execution("wf-1", "exec-2", r#"{"mailbox": "MESH-UI-01"}"#);
        let err = prepare_send(&store, &registry, request()).await.unwrap_err();
        assert!(matches!(
            err,
            PrepareError::Singleton(SingletonError::AlreadyRunning { .. })
        ));
    }

    #[tokio::test]
    async fn missing_object_is_empty_source() {
        let store = MemoryStore::new();
        let err = prepare_send(&store, &registry(), request()).await.unwrap_err();
        assert!(matches!(err, PrepareError::EmptySource { .. }));
    }

    #[tokio::test]
    async fn zero_byte_object_is_empty_source() {
        let store = MemoryStore::new();
        store.insert("transfers", "outbound/data.csv", Vec::new());
        let err = prepare_send(&store, &registry(), request()).await.unwrap_err();
        assert!(matches!(err, PrepareError::EmptySource { .. }));
    }
}
