//! Human-input node configuration schema and validation.
//!
//! The node `data` object is consumed from the workflow definition as JSON;
//! deserialization enforces enum membership, [`HumanInputNodeData::validate`]
//! enforces bounds and interaction-type-specific shape. A configuration that
//! fails validation creates no interaction and no pause record.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::domain::interaction::{ChannelType, InteractionType};
use crate::error::HilError;

/// Inclusive bounds for `timeout_secs`.
pub const MIN_TIMEOUT_SECS: u64 = 60;
pub const MAX_TIMEOUT_SECS: u64 = 86_400;

/// Behavior when an interaction's deadline elapses without a response.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutAction {
    #[default]
    Fail,
    Continue,
    DefaultResponse,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FormFieldType {
    Text,
    Number,
    Boolean,
    Select,
}

/// One field of an `input` interaction's form.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct FormFieldDefinition {
    pub variable: String,
    #[serde(default)]
    pub label: String,
    #[serde(default = "default_field_type")]
    pub field_type: FormFieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default_value: Option<Value>,
    #[serde(default)]
    pub max_length: Option<usize>,
    #[serde(default)]
    pub min_value: Option<f64>,
    #[serde(default)]
    pub max_value: Option<f64>,
    #[serde(default)]
    pub options: Option<Vec<String>>,
}

fn default_field_type() -> FormFieldType {
    FormFieldType::Text
}

impl FormFieldDefinition {
    /// Validate a submitted value against this field definition.
    pub fn validate_value(&self, value: &Value) -> Result<(), String> {
        match self.field_type {
            FormFieldType::Text => {
                let Some(s) = value.as_str() else {
                    return Err(format!("field '{}' expects a string", self.variable));
                };
                if let Some(max) = self.max_length {
                    if s.chars().count() > max {
                        return Err(format!("field '{}' exceeds max_length", self.variable));
                    }
                }
            }
            FormFieldType::Number => {
                let Some(n) = value.as_f64() else {
                    return Err(format!("field '{}' expects a number", self.variable));
                };
                if let Some(min) = self.min_value {
                    if n < min {
                        return Err(format!("field '{}' is below min_value", self.variable));
                    }
                }
                if let Some(max) = self.max_value {
                    if n > max {
                        return Err(format!("field '{}' is above max_value", self.variable));
                    }
                }
            }
            FormFieldType::Boolean => {
                if !value.is_boolean() {
                    return Err(format!("field '{}' expects a boolean", self.variable));
                }
            }
            FormFieldType::Select => {
                let Some(s) = value.as_str() else {
                    return Err(format!("field '{}' expects a string option", self.variable));
                };
                if let Some(options) = &self.options {
                    if !options.iter().any(|o| o == s) {
                        return Err(format!(
                            "field '{}' value is not one of the configured options",
                            self.variable
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Validate structured form data against the field definitions. Required
/// fields without a submitted value or a default are rejected.
pub fn validate_form_data(
    fields: &[FormFieldDefinition],
    data: &HashMap<String, Value>,
) -> Result<(), String> {
    for field in fields {
        match data.get(&field.variable) {
            Some(value) => field.validate_value(value)?,
            None if field.required && field.default_value.is_none() => {
                return Err(format!("required field '{}' is missing", field.variable));
            }
            None => {}
        }
    }
    Ok(())
}

/// Configuration of a human-input node, consumed from the workflow
/// definition.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct HumanInputNodeData {
    pub interaction_type: InteractionType,
    pub channel_type: ChannelType,
    pub timeout_secs: u64,
    #[serde(default)]
    pub timeout_action: TimeoutAction,
    #[serde(default)]
    pub timeout_default: Option<Value>,
    pub recipient: String,
    #[serde(default)]
    pub message_template: Option<String>,
    #[serde(default)]
    pub form_fields: Vec<FormFieldDefinition>,
    #[serde(default)]
    pub options: Vec<String>,
    /// Channel-specific delivery config, passed through to the channel.
    #[serde(default)]
    pub delivery: HashMap<String, Value>,
}

impl HumanInputNodeData {
    pub fn validate(&self) -> Result<(), HilError> {
        if self.timeout_secs < MIN_TIMEOUT_SECS || self.timeout_secs > MAX_TIMEOUT_SECS {
            return Err(HilError::ConfigError(format!(
                "timeout_secs must be within [{}, {}], got {}",
                MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS, self.timeout_secs
            )));
        }
        if self.recipient.trim().is_empty() {
            return Err(HilError::ConfigError(
                "recipient must not be empty".to_string(),
            ));
        }
        match self.interaction_type {
            InteractionType::Input => {
                if self.form_fields.is_empty() {
                    return Err(HilError::ConfigError(
                        "input interactions require at least one form field".to_string(),
                    ));
                }
                if let Some(field) = self.form_fields.iter().find(|f| f.variable.trim().is_empty())
                {
                    return Err(HilError::ConfigError(format!(
                        "form field with empty variable name (label '{}')",
                        field.label
                    )));
                }
            }
            InteractionType::Selection => {
                if self.options.len() < 2 {
                    return Err(HilError::ConfigError(
                        "selection interactions require at least two options".to_string(),
                    ));
                }
            }
            InteractionType::Approval | InteractionType::Review => {}
        }
        if self.timeout_action == TimeoutAction::DefaultResponse && self.timeout_default.is_none() {
            return Err(HilError::ConfigError(
                "timeout_action default_response requires timeout_default".to_string(),
            ));
        }
        Ok(())
    }
}

// ================================
// Node run result
// ================================

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NodeExecutionStatus {
    Succeeded,
    Failed,
    Paused,
}

/// Result returned by a node executor to the graph engine.
#[derive(Debug, Clone)]
pub struct NodeRunResult {
    pub status: NodeExecutionStatus,
    pub outputs: HashMap<String, Value>,
    pub metadata: HashMap<String, Value>,
    pub edge_source_handle: String,
    pub error: Option<String>,
}

impl Default for NodeRunResult {
    fn default() -> Self {
        NodeRunResult {
            status: NodeExecutionStatus::Succeeded,
            outputs: HashMap::new(),
            metadata: HashMap::new(),
            edge_source_handle: "source".to_string(),
            error: None,
        }
    }
}
