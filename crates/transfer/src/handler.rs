//! Invocation-level entry points.
//!
//! Each function turns one engine step into a continuation record the
//! external scheduler can route on: 200 to keep going (or finish, when
//! the body's `complete` flag is set), 4xx/5xx to stop.

use tracing::error;

use meshbridge_mailbox::{MailboxApi, MailboxConfig};
use meshbridge_protocol::{ContinuationRecord, InboundState, OutboundState};
use meshbridge_registry::{ExecutionRegistry, SingletonError};
use meshbridge_store::{ObjectStore, StorageError};
use uuid::Uuid;

use crate::prepare::{PrepareError, SendRequest, prepare_send};
use crate::{InboundEngine, OutboundEngine, TransferError};

/// Retry hint on a 429, in seconds. A fixed value, not a backoff: the
/// blocking transfer's duration is unknowable from here.
pub const RETRY_AFTER_SECS: u64 = 1800;

/// Runs one inbound step and wraps the outcome as a continuation record.
pub async fn run_inbound(
    engine: &InboundEngine,
    mailbox: &mut dyn MailboxApi,
    config: &MailboxConfig,
    record: ContinuationRecord<InboundState>,
) -> ContinuationRecord<InboundState> {
    let mut state = record.body;
    ensure_internal_id(&mut state.internal_id);
    match engine.step(mailbox, config, state.clone()).await {
        Ok(next) => {
            ContinuationRecord::new(200, next).with_header("Content-Type", "application/json")
        }
        Err(err) => failure_record(state, err),
    }
}

/// Runs one outbound step and wraps the outcome as a continuation record.
pub async fn run_outbound(
    engine: &OutboundEngine,
    mailbox: &mut dyn MailboxApi,
    record: ContinuationRecord<OutboundState>,
) -> ContinuationRecord<OutboundState> {
    let mut state = record.body;
    ensure_internal_id(&mut state.internal_id);
    match engine.step(mailbox, state.clone()).await {
        Ok(next) => {
            ContinuationRecord::new(200, next).with_header("Content-Type", "application/json")
        }
        Err(err) => failure_record(state, err),
    }
}

/// Prepares a send and reports the outcome as a continuation record. A
/// rejected singleton check maps to 429 with a retry hint rather than an
/// error status, because the request is valid and merely early.
pub async fn prepare_send_record(
    store: &dyn ObjectStore,
    registry: &dyn ExecutionRegistry,
    request: SendRequest,
) -> ContinuationRecord<serde_json::Value> {
    match prepare_send(store, registry, request).await {
        Ok(state) => match serde_json::to_value(&state) {
            Ok(body) => {
                ContinuationRecord::new(200, body).with_header("Content-Type", "application/json")
            }
            Err(e) => error_record(500, &e.to_string()),
        },
        Err(PrepareError::Singleton(SingletonError::AlreadyRunning { mailbox, running })) => {
            error_record(
                429,
                &format!("mailbox {mailbox} already has an active transfer ({running} running)"),
            )
            .with_header("Retry-After", RETRY_AFTER_SECS.to_string())
        }
        Err(err @ PrepareError::EmptySource { .. })
        | Err(err @ PrepareError::Storage(StorageError::NotFound { .. })) => {
            error_record(404, &err.to_string())
        }
        Err(err) => {
            error!(error = %err, "send preparation failed");
            error_record(500, &err.to_string())
        }
    }
}

/// Tracing correlation id for the transfer, minted on first contact.
fn ensure_internal_id(internal_id: &mut String) {
    if internal_id.is_empty() {
        *internal_id = Uuid::new_v4().to_string();
    }
}

fn failure_record<T>(state: T, err: TransferError) -> ContinuationRecord<T> {
    let status = status_for(&err);
    error!(error = %err, status, "transfer step failed");
    ContinuationRecord::new(status, state).with_header("Content-Type", "application/json")
}

fn error_record(status: u16, message: &str) -> ContinuationRecord<serde_json::Value> {
    ContinuationRecord::new(status, serde_json::json!({ "error": message }))
        .with_header("Content-Type", "application/json")
}

fn status_for(err: &TransferError) -> u16 {
    match err {
        TransferError::EmptySource { .. } => 404,
        TransferError::Storage(StorageError::NotFound { .. }) => 404,
        TransferError::Mailbox(meshbridge_mailbox::MailboxError::MessageGone { .. }) => 410,
        _ => 500,
    }
}
