//! Workflow-execution registry and the advisory per-mailbox singleton guard.

mod guard;
mod memory;
mod sfn;
mod traits;

pub use guard::{SingletonError, check};
pub use memory::MemoryRegistry;
pub use sfn::SfnRegistry;
pub use traits::ExecutionRegistry;

/// Errors from registry lookups.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("registry request failed: {0}")]
    Network(String),

    #[error("unexpected registry response: {0}")]
    InvalidResponse(String),
}
