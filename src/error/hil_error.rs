use thiserror::Error;

use super::StoreError;

/// Errors raised by human-input node execution, response processing, and
/// resume coordination.
#[derive(Debug, Error)]
pub enum HilError {
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Input validation error: {0}")]
    InputValidationError(String),
    #[error("Template error: {0}")]
    TemplateError(String),
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),
    #[error("Classification error: {0}")]
    ClassificationError(String),
    #[error("Interaction not found: {0}")]
    InteractionNotFound(String),
    #[error("Execution not found: {0}")]
    ExecutionNotFound(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Store error: {0}")]
    StoreError(#[from] StoreError),
    #[error("Engine error: {0}")]
    EngineError(String),
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<serde_json::Error> for HilError {
    fn from(e: serde_json::Error) -> Self {
        HilError::SerializationError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hil_error_display() {
        assert_eq!(
            HilError::ConfigError("bad timeout".into()).to_string(),
            "Configuration error: bad timeout"
        );
        assert_eq!(
            HilError::InputValidationError("missing field".into()).to_string(),
            "Input validation error: missing field"
        );
        assert_eq!(
            HilError::InteractionNotFound("int-1".into()).to_string(),
            "Interaction not found: int-1"
        );
        assert_eq!(
            HilError::MalformedPayload("not json".into()).to_string(),
            "Malformed payload: not json"
        );
    }

    #[test]
    fn test_hil_error_from_store_error() {
        let err: HilError = StoreError::Storage("disk full".into()).into();
        assert!(matches!(err, HilError::StoreError(_)));
        assert!(err.to_string().contains("disk full"));
    }
}
