//! Pause store: the active-pause index and the conditional transitions that
//! resume or cancel a pause exactly once.

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::domain::pause::{PauseRecord, PauseStatus};
use crate::error::{StoreError, StoreResult};

#[async_trait]
pub trait PauseStore: Send + Sync {
    /// Create an active pause. Fails with [`StoreError::Conflict`] when an
    /// active record already exists for the same (execution_id, node_id).
    async fn create(&self, record: PauseRecord) -> StoreResult<()>;

    async fn get(&self, id: &str) -> StoreResult<Option<PauseRecord>>;

    async fn get_active(
        &self,
        execution_id: &str,
        node_id: &str,
    ) -> StoreResult<Option<PauseRecord>>;

    async fn list_active_for_execution(
        &self,
        execution_id: &str,
    ) -> StoreResult<Vec<PauseRecord>>;

    /// Conditionally transition `Active → Resumed`. Returns the updated
    /// record, or `None` when another source already won the race.
    async fn resume_if_active(
        &self,
        id: &str,
        resume_reason: &str,
        resume_data: Option<Value>,
        now: i64,
    ) -> StoreResult<Option<PauseRecord>>;

    /// Conditionally transition `Active → Cancelled`.
    async fn cancel_if_active(
        &self,
        id: &str,
        reason: &str,
        now: i64,
    ) -> StoreResult<Option<PauseRecord>>;
}

fn active_key(execution_id: &str, node_id: &str) -> String {
    format!("{}::{}", execution_id, node_id)
}

fn apply_transition(
    row: &mut PauseRecord,
    status: PauseStatus,
    reason: &str,
    resume_data: Option<Value>,
    now: i64,
) -> Option<PauseRecord> {
    if row.status != PauseStatus::Active {
        return None;
    }
    row.status = status;
    row.resume_reason = Some(reason.to_string());
    row.resume_data = resume_data;
    row.resumed_at = Some(now);
    Some(row.clone())
}

// ================================
// In-memory store
// ================================

#[derive(Default)]
pub struct MemoryPauseStore {
    rows: DashMap<String, PauseRecord>,
    /// (execution_id, node_id) → pause id, for records still active. The
    /// entry claim on insert is what enforces the single-active invariant.
    active: DashMap<String, String>,
}

impl MemoryPauseStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn transition(
        &self,
        id: &str,
        status: PauseStatus,
        reason: &str,
        resume_data: Option<Value>,
        now: i64,
    ) -> StoreResult<Option<PauseRecord>> {
        let updated = {
            let Some(mut row) = self.rows.get_mut(id) else {
                return Err(StoreError::NotFound(format!("pause record '{}'", id)));
            };
            apply_transition(&mut row, status, reason, resume_data, now)
        };
        if let Some(row) = &updated {
            self.active
                .remove(&active_key(&row.execution_id, &row.node_id));
        }
        Ok(updated)
    }
}

#[async_trait]
impl PauseStore for MemoryPauseStore {
    async fn create(&self, record: PauseRecord) -> StoreResult<()> {
        let key = active_key(&record.execution_id, &record.node_id);
        match self.active.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(StoreError::Conflict(format!(
                    "execution '{}' already has an active pause at node '{}'",
                    record.execution_id, record.node_id
                )))
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(record.id.clone());
            }
        }
        self.rows.insert(record.id.clone(), record);
        Ok(())
    }

    async fn get(&self, id: &str) -> StoreResult<Option<PauseRecord>> {
        Ok(self.rows.get(id).map(|row| row.value().clone()))
    }

    async fn get_active(
        &self,
        execution_id: &str,
        node_id: &str,
    ) -> StoreResult<Option<PauseRecord>> {
        let Some(id) = self
            .active
            .get(&active_key(execution_id, node_id))
            .map(|entry| entry.value().clone())
        else {
            return Ok(None);
        };
        Ok(self.rows.get(&id).filter(|row| row.is_active()).map(|row| row.value().clone()))
    }

    async fn list_active_for_execution(
        &self,
        execution_id: &str,
    ) -> StoreResult<Vec<PauseRecord>> {
        Ok(self
            .rows
            .iter()
            .filter(|row| row.is_active() && row.execution_id == execution_id)
            .map(|row| row.value().clone())
            .collect())
    }

    async fn resume_if_active(
        &self,
        id: &str,
        resume_reason: &str,
        resume_data: Option<Value>,
        now: i64,
    ) -> StoreResult<Option<PauseRecord>> {
        self.transition(id, PauseStatus::Resumed, resume_reason, resume_data, now)
    }

    async fn cancel_if_active(
        &self,
        id: &str,
        reason: &str,
        now: i64,
    ) -> StoreResult<Option<PauseRecord>> {
        self.transition(id, PauseStatus::Cancelled, reason, None, now)
    }
}

// ================================
// File-backed store
// ================================

/// File-backed pause store, one JSON file per record. The in-memory map is
/// authoritative for the conditional guards; mutations persist after the
/// guard has been decided.
pub struct FilePauseStore {
    dir: PathBuf,
    inner: MemoryPauseStore,
}

impl FilePauseStore {
    pub fn open(dir: impl AsRef<Path>) -> StoreResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        let inner = MemoryPauseStore::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = std::fs::read(&path)?;
            let row: PauseRecord = serde_json::from_slice(&bytes)?;
            if row.is_active() {
                inner.active.insert(
                    active_key(&row.execution_id, &row.node_id),
                    row.id.clone(),
                );
            }
            inner.rows.insert(row.id.clone(), row);
        }
        Ok(Self { dir, inner })
    }

    async fn persist(&self, row: &PauseRecord) -> StoreResult<()> {
        let bytes = serde_json::to_vec(row)?;
        tokio::fs::write(self.dir.join(format!("{}.json", row.id)), bytes)
            .await
            .map_err(StoreError::from)
    }
}

#[async_trait]
impl PauseStore for FilePauseStore {
    async fn create(&self, record: PauseRecord) -> StoreResult<()> {
        self.inner.create(record.clone()).await?;
        self.persist(&record).await
    }

    async fn get(&self, id: &str) -> StoreResult<Option<PauseRecord>> {
        self.inner.get(id).await
    }

    async fn get_active(
        &self,
        execution_id: &str,
        node_id: &str,
    ) -> StoreResult<Option<PauseRecord>> {
        self.inner.get_active(execution_id, node_id).await
    }

    async fn list_active_for_execution(
        &self,
        execution_id: &str,
    ) -> StoreResult<Vec<PauseRecord>> {
        self.inner.list_active_for_execution(execution_id).await
    }

    async fn resume_if_active(
        &self,
        id: &str,
        resume_reason: &str,
        resume_data: Option<Value>,
        now: i64,
    ) -> StoreResult<Option<PauseRecord>> {
        let updated = self
            .inner
            .resume_if_active(id, resume_reason, resume_data, now)
            .await?;
        if let Some(row) = &updated {
            self.persist(row).await?;
        }
        Ok(updated)
    }

    async fn cancel_if_active(
        &self,
        id: &str,
        reason: &str,
        now: i64,
    ) -> StoreResult<Option<PauseRecord>> {
        let updated = self.inner.cancel_if_active(id, reason, now).await?;
        if let Some(row) = &updated {
            self.persist(row).await?;
        }
        Ok(updated)
    }
}
