//! In-memory registry for tests.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::{ExecutionRegistry, RegistryError};

/// Fixed-content [`ExecutionRegistry`], populated up front by builders.
#[derive(Default)]
pub struct MemoryRegistry {
    workflows: HashMap<String, String>,
    executions: HashMap<String, Vec<String>>,
    inputs: HashMap<String, String>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_workflow(mut self, name: &str, workflow_id: &str) -> Self {
        self.workflows
            .insert(name.to_string(), workflow_id.to_string());
        self
    }

    pub fn with_execution(mut self, workflow_id: &str, execution_id: &str, input: &str) -> Self {
        self.executions
            .entry(workflow_id.to_string())
            .or_default()
            .push(execution_id.to_string());
        self.inputs
            .insert(execution_id.to_string(), input.to_string());
        self
    }
}

#[async_trait]
impl ExecutionRegistry for MemoryRegistry {
    async fn resolve_workflow(&self, name: &str) -> Result<Option<String>, RegistryError> {
        Ok(self.workflows.get(name).cloned())
    }

    async fn running_executions(&self, workflow_id: &str) -> Result<Vec<String>, RegistryError> {
        Ok(self.executions.get(workflow_id).cloned().unwrap_or_default())
    }

    async fn execution_input(&self, execution_id: &str) -> Result<String, RegistryError> {
        self.inputs
            .get(execution_id)
            .cloned()
            .ok_or_else(|| RegistryError::InvalidResponse(format!("unknown execution {execution_id}")))
    }
}
