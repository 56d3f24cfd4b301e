//! Interaction store: CRUD plus the conditional transitions that resolve a
//! pending interaction exactly once.

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::domain::interaction::{Interaction, InteractionStatus};
use crate::error::{StoreError, StoreResult};

#[async_trait]
pub trait InteractionStore: Send + Sync {
    async fn create(&self, interaction: Interaction) -> StoreResult<()>;

    async fn get(&self, id: &str) -> StoreResult<Option<Interaction>>;

    /// Conditionally transition `Pending → status`, guarded on the row still
    /// being pending. Returns the updated row, or `None` when another caller
    /// already resolved it. `status` must be terminal.
    async fn resolve_if_pending(
        &self,
        id: &str,
        status: InteractionStatus,
        response_data: Option<Value>,
        now: i64,
    ) -> StoreResult<Option<Interaction>>;

    /// Conditionally set `warning_sent`, guarded on it being unset and the
    /// row still pending. Returns whether this caller won the flag.
    async fn mark_warning_sent(&self, id: &str) -> StoreResult<bool>;

    async fn list_pending(&self) -> StoreResult<Vec<Interaction>>;

    /// Pending interactions whose deadline falls within `(now, now + window_secs]`.
    async fn list_expiring_within(&self, now: i64, window_secs: i64)
        -> StoreResult<Vec<Interaction>>;

    /// Pending interactions whose deadline has already elapsed.
    async fn list_expired(&self, now: i64) -> StoreResult<Vec<Interaction>>;
}

fn check_terminal(status: InteractionStatus) -> StoreResult<()> {
    if !status.is_terminal() {
        return Err(StoreError::Conflict(format!(
            "cannot resolve an interaction to non-terminal status {:?}",
            status
        )));
    }
    Ok(())
}

/// Applies the pending-guarded transition to a row in place. Returns the
/// updated row, or `None` when the guard fails.
fn apply_resolution(
    row: &mut Interaction,
    status: InteractionStatus,
    response_data: Option<Value>,
    now: i64,
) -> Option<Interaction> {
    if row.status != InteractionStatus::Pending {
        return None;
    }
    row.status = status;
    row.response_data = response_data;
    row.responded_at = Some(now);
    Some(row.clone())
}

// ================================
// In-memory store
// ================================

#[derive(Default)]
pub struct MemoryInteractionStore {
    rows: DashMap<String, Interaction>,
}

impl MemoryInteractionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InteractionStore for MemoryInteractionStore {
    async fn create(&self, interaction: Interaction) -> StoreResult<()> {
        match self.rows.entry(interaction.id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(StoreError::Conflict(format!(
                "interaction '{}' already exists",
                interaction.id
            ))),
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(interaction);
                Ok(())
            }
        }
    }

    async fn get(&self, id: &str) -> StoreResult<Option<Interaction>> {
        Ok(self.rows.get(id).map(|row| row.value().clone()))
    }

    async fn resolve_if_pending(
        &self,
        id: &str,
        status: InteractionStatus,
        response_data: Option<Value>,
        now: i64,
    ) -> StoreResult<Option<Interaction>> {
        check_terminal(status)?;
        let Some(mut row) = self.rows.get_mut(id) else {
            return Err(StoreError::NotFound(format!("interaction '{}'", id)));
        };
        Ok(apply_resolution(&mut row, status, response_data, now))
    }

    async fn mark_warning_sent(&self, id: &str) -> StoreResult<bool> {
        let Some(mut row) = self.rows.get_mut(id) else {
            return Err(StoreError::NotFound(format!("interaction '{}'", id)));
        };
        if row.warning_sent || row.status != InteractionStatus::Pending {
            return Ok(false);
        }
        row.warning_sent = true;
        Ok(true)
    }

    async fn list_pending(&self) -> StoreResult<Vec<Interaction>> {
        Ok(self
            .rows
            .iter()
            .filter(|row| row.is_pending())
            .map(|row| row.value().clone())
            .collect())
    }

    async fn list_expiring_within(
        &self,
        now: i64,
        window_secs: i64,
    ) -> StoreResult<Vec<Interaction>> {
        Ok(self
            .rows
            .iter()
            .filter(|row| row.is_pending() && row.expires_within(now, window_secs))
            .map(|row| row.value().clone())
            .collect())
    }

    async fn list_expired(&self, now: i64) -> StoreResult<Vec<Interaction>> {
        Ok(self
            .rows
            .iter()
            .filter(|row| row.is_pending() && row.is_expired(now))
            .map(|row| row.value().clone())
            .collect())
    }
}

// ================================
// File-backed store
// ================================

/// File-backed interaction store: one JSON file per row under a directory.
/// The in-memory map is authoritative for the conditional guards; each
/// mutation is persisted after its guard has been decided.
pub struct FileInteractionStore {
    dir: PathBuf,
    cache: DashMap<String, Interaction>,
}

impl FileInteractionStore {
    pub fn open(dir: impl AsRef<Path>) -> StoreResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        let cache = DashMap::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = std::fs::read(&path)?;
            let row: Interaction = serde_json::from_slice(&bytes)?;
            cache.insert(row.id.clone(), row);
        }
        Ok(Self { dir, cache })
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    async fn persist(&self, row: &Interaction) -> StoreResult<()> {
        let bytes = serde_json::to_vec(row)?;
        tokio::fs::write(self.path_for(&row.id), bytes)
            .await
            .map_err(StoreError::from)
    }
}

#[async_trait]
impl InteractionStore for FileInteractionStore {
    async fn create(&self, interaction: Interaction) -> StoreResult<()> {
        match self.cache.entry(interaction.id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(StoreError::Conflict(format!(
                    "interaction '{}' already exists",
                    interaction.id
                )))
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(interaction.clone());
            }
        }
        self.persist(&interaction).await
    }

    async fn get(&self, id: &str) -> StoreResult<Option<Interaction>> {
        Ok(self.cache.get(id).map(|row| row.value().clone()))
    }

    async fn resolve_if_pending(
        &self,
        id: &str,
        status: InteractionStatus,
        response_data: Option<Value>,
        now: i64,
    ) -> StoreResult<Option<Interaction>> {
        check_terminal(status)?;
        let updated = {
            let Some(mut row) = self.cache.get_mut(id) else {
                return Err(StoreError::NotFound(format!("interaction '{}'", id)));
            };
            apply_resolution(&mut row, status, response_data, now)
        };
        match updated {
            Some(row) => {
                self.persist(&row).await?;
                Ok(Some(row))
            }
            None => Ok(None),
        }
    }

    async fn mark_warning_sent(&self, id: &str) -> StoreResult<bool> {
        let updated = {
            let Some(mut row) = self.cache.get_mut(id) else {
                return Err(StoreError::NotFound(format!("interaction '{}'", id)));
            };
            if row.warning_sent || row.status != InteractionStatus::Pending {
                None
            } else {
                row.warning_sent = true;
                Some(row.clone())
            }
        };
        match updated {
            Some(row) => {
                self.persist(&row).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_pending(&self) -> StoreResult<Vec<Interaction>> {
        Ok(self
            .cache
            .iter()
            .filter(|row| row.is_pending())
            .map(|row| row.value().clone())
            .collect())
    }

    async fn list_expiring_within(
        &self,
        now: i64,
        window_secs: i64,
    ) -> StoreResult<Vec<Interaction>> {
        Ok(self
            .cache
            .iter()
            .filter(|row| row.is_pending() && row.expires_within(now, window_secs))
            .map(|row| row.value().clone())
            .collect())
    }

    async fn list_expired(&self, now: i64) -> StoreResult<Vec<Interaction>> {
        Ok(self
            .cache
            .iter()
            .filter(|row| row.is_pending() && row.is_expired(now))
            .map(|row| row.value().clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::interaction::{ChannelType, InteractionType, RequestData};
    use serde_json::json;

    fn sample(id: &str, timeout_at: i64) -> Interaction {
        Interaction {
            id: id.to_string(),
            workflow_id: "wf-1".to_string(),
            execution_id: "exec-1".to_string(),
            node_id: "approval".to_string(),
            interaction_type: InteractionType::Approval,
            channel_type: ChannelType::Slack,
            status: InteractionStatus::Pending,
            request_data: RequestData {
                recipient: "#releases".to_string(),
                correlation_id: "corr-1".to_string(),
                ..Default::default()
            },
            response_data: None,
            timeout_at,
            warning_sent: false,
            created_at: 1_000,
            responded_at: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = MemoryInteractionStore::new();
        store.create(sample("int-1", 2_000)).await.unwrap();
        let row = store.get("int-1").await.unwrap().unwrap();
        assert!(row.is_pending());
        assert!(matches!(
            store.create(sample("int-1", 2_000)).await,
            Err(StoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_resolve_if_pending_is_exactly_once() {
        let store = MemoryInteractionStore::new();
        store.create(sample("int-1", 2_000)).await.unwrap();

        let first = store
            .resolve_if_pending(
                "int-1",
                InteractionStatus::Responded,
                Some(json!({"text": "approve"})),
                1_010,
            )
            .await
            .unwrap();
        assert_eq!(first.unwrap().status, InteractionStatus::Responded);

        let second = store
            .resolve_if_pending("int-1", InteractionStatus::Timeout, None, 2_001)
            .await
            .unwrap();
        assert!(second.is_none());

        let row = store.get("int-1").await.unwrap().unwrap();
        assert_eq!(row.status, InteractionStatus::Responded);
        assert_eq!(row.responded_at, Some(1_010));
    }

    #[tokio::test]
    async fn test_resolve_rejects_non_terminal_target() {
        let store = MemoryInteractionStore::new();
        store.create(sample("int-1", 2_000)).await.unwrap();
        let err = store
            .resolve_if_pending("int-1", InteractionStatus::Pending, None, 1_010)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_concurrent_resolution_single_winner() {
        use std::sync::Arc;
        let store = Arc::new(MemoryInteractionStore::new());
        store.create(sample("int-1", 2_000)).await.unwrap();

        let a = {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .resolve_if_pending("int-1", InteractionStatus::Responded, None, 1_010)
                    .await
                    .unwrap()
            })
        };
        let b = {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .resolve_if_pending("int-1", InteractionStatus::Timeout, None, 1_010)
                    .await
                    .unwrap()
            })
        };
        let (a, b) = (a.await.unwrap(), b.await.unwrap());
        assert!(a.is_some() ^ b.is_some());
    }

    #[tokio::test]
    async fn test_mark_warning_sent_once() {
        let store = MemoryInteractionStore::new();
        store.create(sample("int-1", 2_000)).await.unwrap();
        assert!(store.mark_warning_sent("int-1").await.unwrap());
        assert!(!store.mark_warning_sent("int-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_expiry_queries() {
        let store = MemoryInteractionStore::new();
        store.create(sample("soon", 1_500)).await.unwrap();
        store.create(sample("later", 5_000)).await.unwrap();
        store.create(sample("past", 900)).await.unwrap();

        let expiring = store.list_expiring_within(1_000, 600).await.unwrap();
        assert_eq!(expiring.len(), 1);
        assert_eq!(expiring[0].id, "soon");

        let expired = store.list_expired(1_000).await.unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, "past");

        store
            .resolve_if_pending("past", InteractionStatus::Timeout, None, 1_000)
            .await
            .unwrap();
        assert!(store.list_expired(1_000).await.unwrap().is_empty());
        assert_eq!(store.list_pending().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_file_store_round_trip_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileInteractionStore::open(dir.path()).unwrap();
        store.create(sample("int-1", 2_000)).await.unwrap();
        store
            .resolve_if_pending("int-1", InteractionStatus::Responded, None, 1_010)
            .await
            .unwrap()
            .unwrap();

        let reopened = FileInteractionStore::open(dir.path()).unwrap();
        let row = reopened.get("int-1").await.unwrap().unwrap();
        assert_eq!(row.status, InteractionStatus::Responded);
        let second = reopened
            .resolve_if_pending("int-1", InteractionStatus::Timeout, None, 2_001)
            .await
            .unwrap();
        assert!(second.is_none());
    }
}
