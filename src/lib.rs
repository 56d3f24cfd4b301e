//! # Handoff — Human-in-the-Loop Pause/Resume Engine
//!
//! `handoff` is the pause/resume subsystem of a workflow engine: the
//! mechanism by which a running execution halts at a human-input node,
//! durably persists its halted state, requests input through an external
//! channel, evaluates asynchronously-arriving responses for relevance
//! against the pending request, and resumes exactly once — whether resumed
//! by a genuine human reply, by a configured timeout, or by manual override.
//!
//! - **Exactly-once resume**: every resume attempt (classifier match,
//!   timeout expiry, manual override) passes through the
//!   [`ResumeCoordinator`](resume::ResumeCoordinator), which serializes the
//!   race with conditional status updates against the durable stores — no
//!   in-memory lock, so the property holds across service instances.
//! - **Relevance classification**: inbound deliveries are scored against the
//!   pending interactions in scope by a pluggable
//!   [`ClassifierStrategy`](classify::ClassifierStrategy) — a weighted
//!   heuristic by default, optionally wrapped by a model-backed scorer with
//!   a hard timeout and heuristic fallback.
//! - **Timeout handling**: a jittered polling
//!   [`TimeoutMonitor`](monitor::TimeoutMonitor) sends one pre-expiry
//!   warning per interaction and drives expired interactions through the
//!   shared resume path with the node's configured timeout action.
//! - **Channel dispatch**: outbound notifications render through a template
//!   engine and a per-channel-type registry; delivery failures are logged
//!   and never fail the pausing node.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use handoff::{ExecutionContext, HilService};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() {
//!     let service = HilService::builder().build();
//!     let execution = ExecutionContext::new("wf-1", "exec-1");
//!     let config = json!({
//!         "interaction_type": "approval",
//!         "channel_type": "slack",
//!         "timeout_secs": 3600,
//!         "recipient": "#releases",
//!         "message_template": "Deploy {{ version }}?"
//!     });
//!     let paused = service
//!         .execute_node("approval", &config, &execution)
//!         .await
//!         .unwrap();
//!     println!("waiting on interaction {}", paused.interaction_id);
//! }
//! ```

pub mod api;
pub mod channel;
pub mod classify;
pub mod core;
pub mod domain;
pub mod dsl;
pub mod error;
pub mod monitor;
pub mod nodes;
pub mod resume;
pub mod store;

pub use api::{HilService, HilServiceBuilder, PausedNode};
pub use channel::{Channel, ChannelDispatcher};
pub use classify::{
    Classification, ClassificationResult, ClassifierStrategy, HeuristicClassifier,
    IngestOutcome, ModelBackedClassifier, ModelScorer,
};
pub use crate::core::{
    create_event_channel, EventReceiver, EventSender, HilEvent, RuntimeContext,
};
pub use domain::{
    ChannelType, ExecutionContext, ExecutionSnapshot, ExecutionState, Interaction,
    InteractionStatus, InteractionType, PauseRecord, PauseStatus, WebhookEnvelope,
};
pub use dsl::{HumanInputNodeData, TimeoutAction};
pub use error::{HilError, StoreError};
pub use monitor::{TimeoutMonitor, TimeoutMonitorConfig};
pub use resume::{GraphResumer, ResumeCoordinator, ResumeOutcome, ResumeSource};
pub use store::{
    ExecutionStore, FileInteractionStore, FilePauseStore, InteractionStore,
    MemoryExecutionStore, MemoryInteractionStore, MemoryPauseStore, MemoryResponseStore,
    PauseStore, ResponseStore,
};
