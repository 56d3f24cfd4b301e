//! Message template rendering for outbound channel notifications.

use std::collections::HashMap;

use minijinja::{Environment, UndefinedBehavior};
use serde_json::Value;

use crate::error::HilError;

/// Template engine for channel messages, wrapping Minijinja with lenient
/// undefined handling: unresolved placeholders render empty and are reported
/// as warnings, never as failures.
pub struct MessageRenderer {
    env: Environment<'static>,
}

impl MessageRenderer {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Lenient);

        env.add_filter("default", minijinja_default_filter);
        env.add_filter("upper", minijinja_upper_filter);
        env.add_filter("lower", minijinja_lower_filter);
        env.add_filter("trim", minijinja_trim_filter);

        MessageRenderer { env }
    }

    /// Render `template` with `variables`. Placeholders without a matching
    /// variable are collected and returned alongside the rendered text.
    pub fn render(
        &self,
        template: &str,
        variables: &HashMap<String, Value>,
    ) -> Result<(String, Vec<String>), HilError> {
        let tmpl = self
            .env
            .template_from_str(template)
            .map_err(|e| HilError::TemplateError(format!("Template compile error: {}", e)))?;

        let unresolved: Vec<String> = tmpl
            .undeclared_variables(false)
            .into_iter()
            .filter(|name| !variables.contains_key(name))
            .collect();

        let ctx = convert_to_minijinja_value(variables);
        let rendered = tmpl
            .render(ctx)
            .map_err(|e| HilError::TemplateError(format!("Template render error: {}", e)))?;
        Ok((rendered, unresolved))
    }
}

impl Default for MessageRenderer {
    fn default() -> Self {
        Self::new()
    }
}

fn convert_to_minijinja_value(variables: &HashMap<String, Value>) -> minijinja::Value {
    let json_value = serde_json::to_value(variables).unwrap_or(Value::Object(Default::default()));
    minijinja::Value::from_serialize(&json_value)
}

fn minijinja_default_filter(
    value: minijinja::Value,
    default: Option<minijinja::Value>,
) -> minijinja::Value {
    if value.is_undefined() || value.is_none() {
        default.unwrap_or(minijinja::Value::from(""))
    } else {
        value
    }
}

fn minijinja_upper_filter(value: String) -> String {
    value.to_uppercase()
}

fn minijinja_lower_filter(value: String) -> String {
    value.to_lowercase()
}

fn minijinja_trim_filter(value: String) -> String {
    value.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_simple_template() {
        let renderer = MessageRenderer::new();
        let mut vars = HashMap::new();
        vars.insert("version".to_string(), json!("1.4.2"));

        let (rendered, unresolved) = renderer
            .render("Deploy {{ version }} to production?", &vars)
            .unwrap();
        assert_eq!(rendered, "Deploy 1.4.2 to production?");
        assert!(unresolved.is_empty());
    }

    #[test]
    fn test_unresolved_placeholder_is_reported_not_fatal() {
        let renderer = MessageRenderer::new();
        let vars = HashMap::new();

        let (rendered, unresolved) = renderer
            .render("Approve {{ ticket }} please", &vars)
            .unwrap();
        assert_eq!(rendered, "Approve  please");
        assert_eq!(unresolved, vec!["ticket".to_string()]);
    }

    #[test]
    fn test_filters() {
        let renderer = MessageRenderer::new();
        let mut vars = HashMap::new();
        vars.insert("env".to_string(), json!("staging"));

        let (rendered, _) = renderer
            .render("{{ env | upper }} / {{ missing | default('n/a') }}", &vars)
            .unwrap();
        assert_eq!(rendered, "STAGING / n/a");
    }

    #[test]
    fn test_nested_context() {
        let renderer = MessageRenderer::new();
        let mut vars = HashMap::new();
        vars.insert("interaction".to_string(), json!({"id": "int-1"}));

        let (rendered, _) = renderer
            .render("ref: {{ interaction.id }}", &vars)
            .unwrap();
        assert_eq!(rendered, "ref: int-1");
    }
}
