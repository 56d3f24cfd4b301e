//! In-app channel: notifications delivered to a per-recipient mailbox that
//! the host application's UI drains.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

use super::{Channel, CorrelationMetadata};

#[derive(Debug, Clone, PartialEq)]
pub struct InAppMessage {
    pub text: String,
    pub interaction_id: String,
    pub correlation_id: String,
}

#[derive(Default)]
pub struct InAppChannel {
    mailboxes: Mutex<HashMap<String, Vec<InAppMessage>>>,
}

impl InAppChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain all undelivered messages for a recipient.
    pub fn take(&self, recipient: &str) -> Vec<InAppMessage> {
        self.mailboxes
            .lock()
            .remove(recipient)
            .unwrap_or_default()
    }

    pub fn pending_count(&self, recipient: &str) -> usize {
        self.mailboxes
            .lock()
            .get(recipient)
            .map(|m| m.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl Channel for InAppChannel {
    async fn send(
        &self,
        recipient: &str,
        rendered_text: &str,
        correlation: &CorrelationMetadata,
    ) -> bool {
        self.mailboxes
            .lock()
            .entry(recipient.to_string())
            .or_default()
            .push(InAppMessage {
                text: rendered_text.to_string(),
                interaction_id: correlation.interaction_id.clone(),
                correlation_id: correlation.correlation_id.clone(),
            });
        true
    }
}
