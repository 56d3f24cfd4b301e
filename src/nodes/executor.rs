use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

use crate::core::runtime_context::RuntimeContext;
use crate::domain::execution::ExecutionContext;
use crate::dsl::schema::NodeRunResult;
use crate::error::HilError;

/// Trait for node execution. Each node type implements this.
#[async_trait]
pub trait NodeExecutor: Send + Sync {
    /// Execute the node, returning a NodeRunResult
    async fn execute(
        &self,
        node_id: &str,
        config: &Value,
        execution: &ExecutionContext,
        context: &RuntimeContext,
    ) -> Result<NodeRunResult, HilError>;
}

/// Registry of node executors by node type string. The surrounding graph
/// engine resolves each node's executor here; this crate registers only the
/// human-input executor, hosts add their own.
#[derive(Default)]
pub struct NodeExecutorRegistry {
    executors: HashMap<String, Box<dyn NodeExecutor>>,
}

impl NodeExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, node_type: &str, executor: Box<dyn NodeExecutor>) {
        self.executors.insert(node_type.to_string(), executor);
    }

    pub fn get(&self, node_type: &str) -> Option<&dyn NodeExecutor> {
        self.executors.get(node_type).map(|e| e.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::schema::NodeExecutionStatus;

    struct EchoExecutor;

    #[async_trait]
    impl NodeExecutor for EchoExecutor {
        async fn execute(
            &self,
            node_id: &str,
            _config: &Value,
            _execution: &ExecutionContext,
            _context: &RuntimeContext,
        ) -> Result<NodeRunResult, HilError> {
            let mut outputs = HashMap::new();
            outputs.insert("node".to_string(), Value::String(node_id.to_string()));
            Ok(NodeRunResult {
                outputs,
                ..Default::default()
            })
        }
    }

    #[tokio::test]
    async fn test_registry_lookup_and_execute() {
        let mut registry = NodeExecutorRegistry::new();
        registry.register("echo", Box::new(EchoExecutor));
        assert!(registry.get("missing").is_none());

        let executor = registry.get("echo").unwrap();
        let result = executor
            .execute(
                "n1",
                &Value::Null,
                &ExecutionContext::default(),
                &RuntimeContext::default(),
            )
            .await
            .unwrap();
        assert_eq!(result.status, NodeExecutionStatus::Succeeded);
        assert_eq!(result.outputs["node"], Value::String("n1".into()));
    }
}
