//! AWS Step Functions backend for [`ExecutionRegistry`].

use async_trait::async_trait;
use aws_sdk_sfn::Client as SfnClient;
use aws_sdk_sfn::types::ExecutionStatus;

use crate::{ExecutionRegistry, RegistryError};

/// [`ExecutionRegistry`] implementation on the AWS SDK.
pub struct SfnRegistry {
    client: SfnClient,
}

impl SfnRegistry {
    /// Builds a registry from the default credential chain and region.
    pub async fn new() -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self {
            client: SfnClient::new(&config),
        }
    }

    /// Wraps an existing client (for custom endpoints and tests).
    pub fn from_client(client: SfnClient) -> Self {
        Self { client }
    }
}

fn network_err(err: impl std::fmt::Display) -> RegistryError {
    RegistryError::Network(err.to_string())
}

#[async_trait]
impl ExecutionRegistry for SfnRegistry {
    async fn resolve_workflow(&self, name: &str) -> Result<Option<String>, RegistryError> {
        let mut next_token: Option<String> = None;
        loop {
            let mut request = self.client.list_state_machines();
            if let Some(token) = &next_token {
                request = request.next_token(token);
            }
            let page = request.send().await.map_err(network_err)?;
            for machine in page.state_machines() {
                if machine.name() == name {
                    return Ok(Some(machine.state_machine_arn().to_string()));
                }
            }
            next_token = page.next_token().map(str::to_string);
            if next_token.is_none() {
                return Ok(None);
            }
        }
    }

    async fn running_executions(&self, workflow_id: &str) -> Result<Vec<String>, RegistryError> {
        let mut executions = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let mut request = self
                .client
                .list_executions()
                .state_machine_arn(workflow_id)
                .status_filter(ExecutionStatus::Running);
            if let Some(token) = &next_token {
                request = request.next_token(token);
            }
            let page = request.send().await.map_err(network_err)?;
            executions.extend(
                page.executions()
                    .iter()
                    .map(|e| e.execution_arn().to_string()),
            );
            next_token = page.next_token().map(str::to_string);
            if next_token.is_none() {
                return Ok(executions);
            }
        }
    }

    async fn execution_input(&self, execution_id: &str) -> Result<String, RegistryError> {
        let output = self
            .client
            .describe_execution()
            .execution_arn(execution_id)
            .send()
            .await
            .map_err(network_err)?;
        output
            .input()
            .map(str::to_string)
            .ok_or_else(|| RegistryError::InvalidResponse("execution has no input".into()))
    }
}
