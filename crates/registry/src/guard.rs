//! Advisory mutual exclusion per mailbox.
//!
//! The check is read-then-decide with no lock: a transfer started between
//! the enumeration and the caller's own start can slip through. That race
//! window is accepted; the alternative is a distributed lock service.

use tracing::{debug, warn};

use crate::{ExecutionRegistry, RegistryError};

/// Outcome of a failed singleton check.
#[derive(Debug, thiserror::Error)]
pub enum SingletonError {
    /// The workflow name could not be resolved. Fails closed: an
    /// unresolvable workflow must not silently permit concurrency.
    #[error("workflow {0:?} not found in execution registry")]
    UnknownWorkflow(String),

    #[error("mailbox {mailbox:?} already has an active transfer ({running} running)")]
    AlreadyRunning { mailbox: String, running: usize },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Verifies that at most one running execution of `workflow_name` carries
/// `mailbox`. The caller is itself already running, so exactly one match
/// passes; more than one fails.
pub async fn check(
    registry: &dyn ExecutionRegistry,
    mailbox: &str,
    workflow_name: &str,
) -> Result<(), SingletonError> {
    let workflow_id = registry
        .resolve_workflow(workflow_name)
        .await?
        .ok_or_else(|| SingletonError::UnknownWorkflow(workflow_name.to_string()))?;

    let executions = registry.running_executions(&workflow_id).await?;
    let mut running = 0usize;
    for execution_id in &executions {
        let input = registry.execution_input(execution_id).await?;
        if mailbox_of(&input).as_deref() == Some(mailbox) {
            running += 1;
        }
    }
    debug!(mailbox = %mailbox, workflow = %workflow_name, running, "singleton check");

    if running > 1 {
        warn!(mailbox = %mailbox, running, "concurrent transfer detected");
        return Err(SingletonError::AlreadyRunning {
            mailbox: mailbox.to_string(),
            running,
        });
    }
    Ok(())
}

/// Extracts the mailbox an execution was started with from its input JSON.
fn mailbox_of(input: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(input).ok()?;
    value
        .get("mailbox")
        .and_then(|m| m.as_str())
        .or_else(|| {
            value
                .get("body")
                .and_then(|b| b.get("mailbox"))
                .and_then(|m| m.as_str())
        })
        .map(str::to_string)
}
