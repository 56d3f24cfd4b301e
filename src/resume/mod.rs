//! Resume coordination: the single serialization point through which every
//! resume attempt passes.

pub mod coordinator;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::HilError;

pub use coordinator::{ResumeCoordinator, ResumeOutcome, ResumeSource};

/// Output ports a resumed human-input node can route to.
pub const DEFAULT_PORT: &str = "source";
pub const PORT_APPROVED: &str = "approved";
pub const PORT_REJECTED: &str = "rejected";

/// The graph-walking engine's continuation hook. The engine owns node
/// scheduling; the coordinator only tells it where to pick the walk back up
/// and what the paused node produced.
#[async_trait]
pub trait GraphResumer: Send + Sync {
    async fn continue_from(
        &self,
        execution_id: &str,
        node_id: &str,
        port: &str,
        output: Value,
    ) -> Result<(), HilError>;
}

/// Resumer for hosts that only consume execution snapshots and events.
#[derive(Default)]
pub struct NoopResumer;

#[async_trait]
impl GraphResumer for NoopResumer {
    async fn continue_from(
        &self,
        execution_id: &str,
        node_id: &str,
        port: &str,
        _output: Value,
    ) -> Result<(), HilError> {
        tracing::debug!(
            execution_id = %execution_id,
            node_id = %node_id,
            port = %port,
            "no graph resumer installed"
        );
        Ok(())
    }
}
