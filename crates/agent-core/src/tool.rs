//! Tool System
//!
//! Executable capabilities the model may request by name. Tools are
//! registered once at startup; the registry is read-only afterwards and
//! safely shared across concurrent invocations.

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use crate::error::{AgentError, Result};
use crate::message::ToolCallRequest;

/// Parameter definition for a tool's argument schema
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParameterSpec {
    /// Parameter name
    pub name: String,

    /// JSON Schema type (string, number, integer, boolean)
    #[serde(rename = "type")]
    pub param_type: String,

    /// Human-readable description
    pub description: String,

    /// Whether this parameter is required
    #[serde(default)]
    pub required: bool,

    /// Enum of allowed values
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
}

impl ParameterSpec {
    pub fn required(
        name: impl Into<String>,
        param_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            param_type: param_type.into(),
            description: description.into(),
            required: true,
            enum_values: None,
        }
    }

    pub fn with_enum(mut self, values: Vec<Value>) -> Self {
        self.enum_values = Some(values);
        self
    }
}

/// Advertised tool schema: name, description and argument contract
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Unique tool identifier
    pub name: String,

    /// Human-readable description (shown to the model)
    pub description: String,

    /// Parameter definitions
    pub parameters: Vec<ParameterSpec>,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
        }
    }

    pub fn parameter(mut self, parameter: ParameterSpec) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Render the argument contract as a JSON Schema object
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for param in &self.parameters {
            let mut prop = Map::new();
            prop.insert("type".into(), json!(param.param_type));
            prop.insert("description".into(), json!(param.description));
            if let Some(values) = &param.enum_values {
                prop.insert("enum".into(), json!(values));
            }
            properties.insert(param.name.clone(), Value::Object(prop));
            if param.required {
                required.push(Value::String(param.name.clone()));
            }
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// Tool trait - implement to add new capabilities
#[async_trait]
pub trait Tool: Send + Sync {
    /// The tool's advertised schema
    fn spec(&self) -> ToolSpec;

    /// Execute with the supplied arguments, producing a text result
    async fn execute(&self, arguments: &Map<String, Value>) -> Result<String>;

    /// Validate arguments before execution
    fn validate(&self, arguments: &Map<String, Value>) -> Result<()> {
        let spec = self.spec();

        for param in &spec.parameters {
            let value = arguments.get(&param.name);

            if param.required && value.is_none() {
                return Err(AgentError::ToolValidation(format!(
                    "missing required parameter '{}'",
                    param.name
                )));
            }

            if let (Some(value), Some(allowed)) = (value, &param.enum_values) {
                if !allowed.contains(value) {
                    return Err(AgentError::ToolValidation(format!(
                        "parameter '{}' has unrecognized value {}",
                        param.name, value
                    )));
                }
            }
        }

        Ok(())
    }
}

type FnToolHandler =
    Box<dyn Fn(Map<String, Value>) -> BoxFuture<'static, Result<String>> + Send + Sync>;

/// Adapter turning an async closure into a [`Tool`]
pub struct FnTool {
    spec: ToolSpec,
    handler: FnToolHandler,
}

impl FnTool {
    pub fn new<F, Fut>(spec: ToolSpec, handler: F) -> Self
    where
        F: Fn(Map<String, Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String>> + Send + 'static,
    {
        Self {
            spec,
            handler: Box::new(move |arguments| Box::pin(handler(arguments))),
        }
    }
}

#[async_trait]
impl Tool for FnTool {
    fn spec(&self) -> ToolSpec {
        self.spec.clone()
    }

    async fn execute(&self, arguments: &Map<String, Value>) -> Result<String> {
        (self.handler)(arguments.clone()).await
    }
}

/// Registry for available tools
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a new tool
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        let spec = tool.spec();
        self.tools.insert(spec.name, Arc::new(tool));
    }

    /// Register a shared tool
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let spec = tool.spec();
        self.tools.insert(spec.name, tool);
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Execute one tool call request: look up, validate, run.
    ///
    /// Errors here are local-recovery errors; the tool execution node turns
    /// them into error-bearing tool results rather than aborting the turn.
    pub async fn execute(&self, call: &ToolCallRequest) -> Result<String> {
        let tool = self
            .get(&call.name)
            .ok_or_else(|| AgentError::ToolNotFound(call.name.clone()))?;

        tool.validate(&call.arguments)?;
        tool.execute(&call.arguments).await
    }

    /// All advertised tool schemas
    pub fn specs(&self) -> Vec<ToolSpec> {
        let mut specs: Vec<ToolSpec> = self.tools.values().map(|t| t.spec()).collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    /// Registered tool names
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
