use async_trait::async_trait;

use crate::RegistryError;

/// Read-only view of the workflow-execution registry.
#[async_trait]
pub trait ExecutionRegistry: Send + Sync {
    /// Resolves a workflow name to its registry identifier, or `None` when
    /// no workflow carries that name.
    async fn resolve_workflow(&self, name: &str) -> Result<Option<String>, RegistryError>;

    /// Lists identifiers of currently-running executions of a workflow.
    async fn running_executions(&self, workflow_id: &str) -> Result<Vec<String>, RegistryError>;

    /// Returns the original start input of an execution (JSON).
    async fn execution_input(&self, execution_id: &str) -> Result<String, RegistryError>;
}
