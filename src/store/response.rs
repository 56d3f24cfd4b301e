//! Incoming-response store: dedup-keyed inserts and the single transition
//! from `Unprocessed` to a terminal processing status.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::domain::response::{IncomingResponse, ProcessingStatus};
use crate::error::{StoreError, StoreResult};

#[async_trait]
pub trait ResponseStore: Send + Sync {
    /// Insert a new delivery. Returns `false` when a row with the same
    /// dedup_key already exists (webhook redelivery); the caller must then
    /// skip processing entirely.
    async fn insert(&self, response: IncomingResponse) -> StoreResult<bool>;

    async fn get(&self, id: &str) -> StoreResult<Option<IncomingResponse>>;

    async fn find_by_dedup_key(&self, dedup_key: &str)
        -> StoreResult<Option<IncomingResponse>>;

    /// Conditionally transition `Unprocessed → status` with the
    /// classification outcome. Returns the updated row, or `None` when the
    /// row was already finished.
    async fn finish(
        &self,
        id: &str,
        status: ProcessingStatus,
        matched_interaction_id: Option<String>,
        relevance_score: Option<f64>,
        reasoning: String,
    ) -> StoreResult<Option<IncomingResponse>>;
}

#[derive(Default)]
pub struct MemoryResponseStore {
    rows: DashMap<String, IncomingResponse>,
    dedup: DashMap<String, String>,
}

impl MemoryResponseStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResponseStore for MemoryResponseStore {
    async fn insert(&self, response: IncomingResponse) -> StoreResult<bool> {
        match self.dedup.entry(response.dedup_key.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => return Ok(false),
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(response.id.clone());
            }
        }
        self.rows.insert(response.id.clone(), response);
        Ok(true)
    }

    async fn get(&self, id: &str) -> StoreResult<Option<IncomingResponse>> {
        Ok(self.rows.get(id).map(|row| row.value().clone()))
    }

    async fn find_by_dedup_key(
        &self,
        dedup_key: &str,
    ) -> StoreResult<Option<IncomingResponse>> {
        let Some(id) = self.dedup.get(dedup_key).map(|entry| entry.value().clone()) else {
            return Ok(None);
        };
        Ok(self.rows.get(&id).map(|row| row.value().clone()))
    }

    async fn finish(
        &self,
        id: &str,
        status: ProcessingStatus,
        matched_interaction_id: Option<String>,
        relevance_score: Option<f64>,
        reasoning: String,
    ) -> StoreResult<Option<IncomingResponse>> {
        if !status.is_terminal() {
            return Err(StoreError::Conflict(
                "cannot finish a response to unprocessed".to_string(),
            ));
        }
        let Some(mut row) = self.rows.get_mut(id) else {
            return Err(StoreError::NotFound(format!("incoming response '{}'", id)));
        };
        if row.status != ProcessingStatus::Unprocessed {
            return Ok(None);
        }
        row.status = status;
        row.matched_interaction_id = matched_interaction_id;
        row.relevance_score = relevance_score;
        row.reasoning = Some(reasoning);
        Ok(Some(row.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::interaction::ChannelType;
    use serde_json::json;
    use std::collections::HashMap;

    fn sample(id: &str, dedup_key: &str) -> IncomingResponse {
        IncomingResponse {
            id: id.to_string(),
            source_channel: ChannelType::Webhook,
            raw_payload: json!({"text": "approve"}),
            headers: HashMap::new(),
            dedup_key: dedup_key.to_string(),
            received_at: 1_010,
            status: ProcessingStatus::Unprocessed,
            matched_interaction_id: None,
            relevance_score: None,
            reasoning: None,
        }
    }

    #[tokio::test]
    async fn test_dedup_key_uniqueness() {
        let store = MemoryResponseStore::new();
        assert!(store.insert(sample("r1", "webhook:evt-1")).await.unwrap());
        assert!(!store.insert(sample("r2", "webhook:evt-1")).await.unwrap());
        assert!(store.insert(sample("r3", "webhook:evt-2")).await.unwrap());

        let original = store.find_by_dedup_key("webhook:evt-1").await.unwrap().unwrap();
        assert_eq!(original.id, "r1");
        assert!(store.get("r2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_finish_exactly_once() {
        let store = MemoryResponseStore::new();
        store.insert(sample("r1", "webhook:evt-1")).await.unwrap();

        let first = store
            .finish(
                "r1",
                ProcessingStatus::Matched,
                Some("int-1".to_string()),
                Some(0.9),
                "correlation match".to_string(),
            )
            .await
            .unwrap();
        assert!(first.is_some());

        let second = store
            .finish(
                "r1",
                ProcessingStatus::FilteredOut,
                None,
                Some(0.1),
                "late attempt".to_string(),
            )
            .await
            .unwrap();
        assert!(second.is_none());

        let row = store.get("r1").await.unwrap().unwrap();
        assert_eq!(row.status, ProcessingStatus::Matched);
        assert_eq!(row.matched_interaction_id.as_deref(), Some("int-1"));
        assert_eq!(row.relevance_score, Some(0.9));
    }
}
