//! PauseRecord — the durable marker for an execution halted at a node.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Pause lifecycle. `Active → Resumed` or `Active → Cancelled`, exactly once.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PauseStatus {
    Active,
    Resumed,
    Cancelled,
}

impl PauseStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PauseStatus::Active)
    }
}

/// What must resolve before the execution may continue.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ResumeConditions {
    pub interaction_id: String,
}

/// Marks an execution halted at a specific node awaiting a resume condition.
/// At most one `Active` record exists per (execution_id, node_id) pair.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct PauseRecord {
    pub id: String,
    pub execution_id: String,
    pub node_id: String,
    pub pause_reason: String,
    pub resume_conditions: ResumeConditions,
    pub status: PauseStatus,
    #[serde(default)]
    pub resume_reason: Option<String>,
    #[serde(default)]
    pub resume_data: Option<Value>,
    pub paused_at: i64,
    #[serde(default)]
    pub resumed_at: Option<i64>,
    /// Reference to the interaction; the interaction row is independently
    /// owned by the interaction store.
    pub interaction_id: String,
}

impl PauseRecord {
    pub fn waiting_for_human(
        id: String,
        execution_id: String,
        node_id: String,
        interaction_id: String,
        paused_at: i64,
    ) -> Self {
        Self {
            id,
            execution_id,
            node_id,
            pause_reason: "waiting_for_human".to_string(),
            resume_conditions: ResumeConditions {
                interaction_id: interaction_id.clone(),
            },
            status: PauseStatus::Active,
            resume_reason: None,
            resume_data: None,
            paused_at,
            resumed_at: None,
            interaction_id,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == PauseStatus::Active
    }
}
