//! Domain model: the durable records the pause/resume engine operates on.

pub mod execution;
pub mod interaction;
pub mod pause;
pub mod response;

pub use execution::{ExecutionContext, ExecutionSnapshot, ExecutionState};
pub use interaction::{
    ChannelType, Interaction, InteractionStatus, InteractionType, RequestData,
};
pub use pause::{PauseRecord, PauseStatus, ResumeConditions};
pub use response::{
    IncomingResponse, ProcessingStatus, ResponsePayload, WebhookEnvelope,
};
