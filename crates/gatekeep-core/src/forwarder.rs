use async_trait::async_trait;
use serde_json::Value;

/// Single-method capability replacing per-tool adapter classes: one
/// trait, a registry maps `tool` names to implementations, no
/// inheritance. Any raised error is treated by the pipeline as a tool
/// fault (`allowed_but_tool_error`), never as a policy concern.
#[async_trait]
pub trait ToolForwarder: Send + Sync {
    async fn forward(&self, tool: &str, action: &str, params: &Value) -> Result<Value, ToolForwardError>;
}

#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ToolForwardError {
    pub message: String,
}

impl ToolForwardError {
    pub fn new(message: impl Into<String>) -> Self {
        ToolForwardError {
            message: message.into(),
        }
    }
}

/// Maps `tool` names to a registered forwarder. The pipeline is
/// agnostic to what's behind each entry.
#[derive(Default)]
pub struct ToolRegistry {
    tools: std::collections::HashMap<String, Box<dyn ToolForwarder>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, tool: impl Into<String>, forwarder: Box<dyn ToolForwarder>) -> Self {
        self.tools.insert(tool.into(), forwarder);
        self
    }
}

#[async_trait]
impl ToolForwarder for ToolRegistry {
    async fn forward(&self, tool: &str, action: &str, params: &Value) -> Result<Value, ToolForwardError> {
        match self.tools.get(tool) {
            Some(forwarder) => forwarder.forward(tool, action, params).await,
            None => Err(ToolForwardError::new(format!("no forwarder registered for tool '{tool}'"))),
        }
    }
}
