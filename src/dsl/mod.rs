pub mod schema;

pub use schema::{
    FormFieldDefinition, FormFieldType, HumanInputNodeData, NodeExecutionStatus, NodeRunResult,
    TimeoutAction, MAX_TIMEOUT_SECS, MIN_TIMEOUT_SECS,
};
