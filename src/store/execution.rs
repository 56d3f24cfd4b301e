//! Execution-status store at the pause/resume boundary.
//!
//! The graph engine owns executions; this store tracks the status surface
//! the pause/resume engine transitions: into `WaitingForHuman` when a pause
//! activates, and out of it exactly once when the pause resolves.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::domain::execution::{ExecutionSnapshot, ExecutionState};
use crate::error::{StoreError, StoreResult};

#[async_trait]
pub trait ExecutionStore: Send + Sync {
    async fn upsert(&self, snapshot: ExecutionSnapshot) -> StoreResult<()>;

    async fn get(&self, execution_id: &str) -> StoreResult<Option<ExecutionSnapshot>>;

    /// Transition into `WaitingForHuman` from `Running` (or create the row).
    async fn set_waiting(
        &self,
        execution_id: &str,
        workflow_id: &str,
        node_id: &str,
        interaction_id: &str,
        now: i64,
    ) -> StoreResult<ExecutionSnapshot>;

    /// Conditionally transition out of `WaitingForHuman` into `next`.
    /// Returns the updated snapshot, or `None` when the execution is not
    /// waiting. Which pause may leave is decided by the pause store's
    /// conditional transition, not here.
    async fn leave_waiting(
        &self,
        execution_id: &str,
        next: ExecutionState,
        now: i64,
    ) -> StoreResult<Option<ExecutionSnapshot>>;
}

#[derive(Default)]
pub struct MemoryExecutionStore {
    rows: DashMap<String, ExecutionSnapshot>,
}

impl MemoryExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExecutionStore for MemoryExecutionStore {
    async fn upsert(&self, snapshot: ExecutionSnapshot) -> StoreResult<()> {
        self.rows.insert(snapshot.execution_id.clone(), snapshot);
        Ok(())
    }

    async fn get(&self, execution_id: &str) -> StoreResult<Option<ExecutionSnapshot>> {
        Ok(self.rows.get(execution_id).map(|row| row.value().clone()))
    }

    async fn set_waiting(
        &self,
        execution_id: &str,
        workflow_id: &str,
        node_id: &str,
        interaction_id: &str,
        now: i64,
    ) -> StoreResult<ExecutionSnapshot> {
        let mut row = self
            .rows
            .entry(execution_id.to_string())
            .or_insert_with(|| ExecutionSnapshot {
                execution_id: execution_id.to_string(),
                workflow_id: workflow_id.to_string(),
                state: ExecutionState::Running,
                updated_at: now,
            });
        if row.state.is_terminal() {
            return Err(StoreError::Conflict(format!(
                "execution '{}' is already terminal",
                execution_id
            )));
        }
        row.state = ExecutionState::WaitingForHuman {
            node_id: node_id.to_string(),
            interaction_id: interaction_id.to_string(),
        };
        row.updated_at = now;
        Ok(row.clone())
    }

    async fn leave_waiting(
        &self,
        execution_id: &str,
        next: ExecutionState,
        now: i64,
    ) -> StoreResult<Option<ExecutionSnapshot>> {
        let Some(mut row) = self.rows.get_mut(execution_id) else {
            return Err(StoreError::NotFound(format!("execution '{}'", execution_id)));
        };
        if !row.state.is_waiting() {
            return Ok(None);
        }
        row.state = next;
        row.updated_at = now;
        Ok(Some(row.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_waiting_creates_row() {
        let store = MemoryExecutionStore::new();
        let snapshot = store
            .set_waiting("exec-1", "wf-1", "approval", "int-1", 1_000)
            .await
            .unwrap();
        assert!(snapshot.state.is_waiting());
    }

    #[tokio::test]
    async fn test_leave_waiting_is_exactly_once() {
        let store = MemoryExecutionStore::new();
        store
            .set_waiting("exec-1", "wf-1", "approval", "int-1", 1_000)
            .await
            .unwrap();

        let resumed = store
            .leave_waiting("exec-1", ExecutionState::Running, 1_010)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resumed.state, ExecutionState::Running);

        let again = store
            .leave_waiting("exec-1", ExecutionState::Running, 1_011)
            .await
            .unwrap();
        assert!(again.is_none());
    }

    #[tokio::test]
    async fn test_set_waiting_rejects_terminal_execution() {
        let store = MemoryExecutionStore::new();
        store
            .upsert(ExecutionSnapshot {
                execution_id: "exec-1".into(),
                workflow_id: "wf-1".into(),
                state: ExecutionState::Cancelled,
                updated_at: 900,
            })
            .await
            .unwrap();
        let err = store
            .set_waiting("exec-1", "wf-1", "approval", "int-1", 1_000)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }
}
