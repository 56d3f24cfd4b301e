//! Execution status at the pause/resume boundary.
//!
//! The graph-walking engine owns executions; this module defines the status
//! surface the pause/resume engine reads and writes, with
//! `WaitingForHuman` as a first-class state alongside running/terminal.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Execution status as visible at the pause/resume boundary.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ExecutionState {
    Running,
    WaitingForHuman {
        node_id: String,
        interaction_id: String,
    },
    Succeeded,
    Failed {
        error: String,
        #[serde(default)]
        interaction_id: Option<String>,
    },
    Cancelled,
}

impl ExecutionState {
    pub fn is_waiting(&self) -> bool {
        matches!(self, ExecutionState::WaitingForHuman { .. })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionState::Succeeded | ExecutionState::Failed { .. } | ExecutionState::Cancelled
        )
    }
}

/// Point-in-time view of an execution, returned from the resume API.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ExecutionSnapshot {
    pub execution_id: String,
    pub workflow_id: String,
    pub state: ExecutionState,
    pub updated_at: i64,
}

/// Execution-scoped context handed to node executors by the engine.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    pub workflow_id: String,
    pub execution_id: String,
    /// Variables visible to template rendering.
    pub variables: HashMap<String, Value>,
}

impl ExecutionContext {
    pub fn new(workflow_id: impl Into<String>, execution_id: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            execution_id: execution_id.into(),
            variables: HashMap::new(),
        }
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: Value) -> Self {
        self.variables.insert(name.into(), value);
        self
    }
}
