use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{GatewayError, Result};

/// A lookup the model may request by name.
///
/// `call` returns `Ok(text)` for every outcome the model should reason
/// about, including "no data" and provider diagnostics. `Err` is reserved for
/// calls that could not be carried out at all (malformed arguments); the
/// agent turns those into a textual error result as well.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;

    fn parameters(&self) -> Option<Value> {
        None
    }

    async fn call(&self, input: Value) -> Result<String>;
}

/// Schema view of a tool, as handed to the language model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDescription {
    pub name: String,
    pub description: String,
    pub parameters: Option<Value>,
}

/// Decode a tool's typed argument struct from the model's JSON arguments.
pub fn parse_arguments<T: DeserializeOwned>(tool: &str, input: Value) -> Result<T> {
    serde_json::from_value(input).map_err(|err| GatewayError::ToolInvocation {
        name: tool.to_string(),
        source: Box::new(err),
    })
}

/// Name-keyed tool table. Built once at startup, then shared read-only.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    by_name: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: Tool + 'static>(&mut self, tool: T) -> Result<()> {
        let name = tool.name().to_string();
        if self.by_name.contains_key(&name) {
            return Err(GatewayError::Config(format!(
                "tool `{name}` registered twice"
            )));
        }
        self.by_name.insert(name, self.tools.len());
        self.tools.push(Arc::new(tool));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.by_name.get(name).map(|idx| Arc::clone(&self.tools[*idx]))
    }

    /// Registration order is kept so the model sees a stable tool list.
    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    pub fn describe(&self) -> Vec<ToolDescription> {
        self.tools
            .iter()
            .map(|tool| ToolDescription {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters(),
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub async fn call(&self, name: &str, input: Value) -> Result<String> {
        let tool = self
            .get(name)
            .ok_or_else(|| GatewayError::ToolNotFound(name.to_string()))?;
        tool.call(input).await
    }
}
