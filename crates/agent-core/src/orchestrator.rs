//! Orchestration State Machine
//!
//! Drives the model-invocation / tool-execution cycle until a terminal node
//! produces the schema-conformant final response. Two interchangeable
//! termination strategies are supported: binding the response schema as a
//! pseudo-tool on the single model, or a dedicated structured follow-up call.

use std::sync::Arc;

use futures::future;
use serde_json::Value;

use crate::error::{AgentError, Result};
use crate::message::{ConversationState, Message, ToolCallRequest};
use crate::provider::{AssistantReply, ModelProvider, ToolChoice};
use crate::schema::ResponseSchema;
use crate::tool::ToolRegistry;

/// How the final structured response is produced
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseStrategy {
    /// Single model with the schema bound as a pseudo-tool under forced
    /// tool choice; the final object is built from the schema call's
    /// arguments with no extra backend call
    SchemaTool,

    /// The loop model runs unconstrained; once it stops calling tools, a
    /// second structured-output call formats the final object
    StructuredFollowup,
}

/// Orchestrator states
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AgentState {
    InvokingModel,
    ExecutingTools,
    FormattingResponse,
    Done,
}

/// Next node selected by the routing function
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    ExecuteTools,
    FormatResponse,
}

/// Pure routing decision over the latest assistant message.
///
/// Under [`ResponseStrategy::SchemaTool`] the schema call terminates the
/// loop only when it is the sole request in the turn; a schema call issued
/// alongside other tools (or repeated) routes to tool execution so pending
/// side-effect calls are never dropped.
pub fn route(latest: &Message, strategy: ResponseStrategy, schema_name: &str) -> Route {
    let calls = latest.tool_calls();
    match strategy {
        ResponseStrategy::SchemaTool => {
            if calls.len() == 1 && calls[0].name == schema_name {
                Route::FormatResponse
            } else {
                Route::ExecuteTools
            }
        }
        ResponseStrategy::StructuredFollowup => {
            if calls.is_empty() {
                Route::FormatResponse
            } else {
                Route::ExecuteTools
            }
        }
    }
}

/// Orchestrator configuration
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// Termination strategy
    pub strategy: ResponseStrategy,

    /// Optional turn cap; the core imposes no bound on its own
    pub max_turns: Option<usize>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            strategy: ResponseStrategy::SchemaTool,
            max_turns: None,
        }
    }
}

/// The agent orchestrator.
///
/// Provider, registry and schema are injected at construction and shared
/// read-only; each invocation owns its own [`ConversationState`], so
/// concurrent invocations need no locking.
pub struct Agent {
    provider: Arc<dyn ModelProvider>,
    tools: Arc<ToolRegistry>,
    schema: Arc<ResponseSchema>,
    config: AgentConfig,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("schema", &self.schema.name())
            .field("tools", &self.tools.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Agent {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        tools: Arc<ToolRegistry>,
        schema: Arc<ResponseSchema>,
        config: AgentConfig,
    ) -> Self {
        Self {
            provider,
            tools,
            schema,
            config,
        }
    }

    pub fn builder() -> AgentBuilder {
        AgentBuilder::new()
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Run one invocation, returning the schema-conformant final object
    pub async fn run(&self, initial_human_text: impl Into<String>) -> Result<Value> {
        let state = self.run_conversation(initial_human_text).await?;
        state
            .into_final_response()
            .ok_or_else(|| AgentError::Config("terminal state reached without a final response".into()))
    }

    /// Run one invocation, returning the finished conversation state with
    /// the full log and the final response populated
    pub async fn run_conversation(
        &self,
        initial_human_text: impl Into<String>,
    ) -> Result<ConversationState> {
        let mut state = ConversationState::new(initial_human_text);
        let mut machine = AgentState::InvokingModel;
        let mut last_tool_output: Option<String> = None;
        let mut turns = 0usize;

        loop {
            match machine {
                AgentState::InvokingModel => {
                    turns += 1;
                    if let Some(max) = self.config.max_turns {
                        if turns > max {
                            return Err(AgentError::MaxTurns(max));
                        }
                    }

                    let reply = self.invoke_model(&state).await?;
                    let message = reply.into_message();
                    machine = match route(&message, self.config.strategy, self.schema.name()) {
                        Route::ExecuteTools => AgentState::ExecutingTools,
                        Route::FormatResponse => AgentState::FormattingResponse,
                    };
                    tracing::debug!(
                        invocation = %state.id(),
                        turn = turns,
                        calls = message.tool_calls().len(),
                        next = ?machine,
                        "model turn complete"
                    );
                    state.push(message);
                }
                AgentState::ExecutingTools => {
                    if let Some(output) = self.execute_tools(&mut state).await {
                        last_tool_output = Some(output);
                    }
                    machine = AgentState::InvokingModel;
                }
                AgentState::FormattingResponse => {
                    let response = self
                        .format_response(&state, last_tool_output.as_deref())
                        .await?;
                    state.set_final_response(response);
                    machine = AgentState::Done;
                }
                AgentState::Done => {
                    tracing::debug!(invocation = %state.id(), turns, "invocation complete");
                    return Ok(state);
                }
            }
        }
    }

    /// Model invocation node: one backend call, one assistant message.
    ///
    /// Under the schema-as-tool strategy the schema is advertised as an
    /// extra capability and the backend is held to a required tool choice;
    /// a reply with no calls then violates the backend contract.
    async fn invoke_model(&self, state: &ConversationState) -> Result<AssistantReply> {
        debug_assert!(
            matches!(
                state.last(),
                Some(Message::Human { .. }) | Some(Message::ToolResult { .. })
            ),
            "model invocation requires the log to end with a human or tool result message"
        );

        let mut specs = self.tools.specs();
        let tool_choice = match self.config.strategy {
            ResponseStrategy::SchemaTool => {
                specs.push(self.schema.as_tool_spec());
                ToolChoice::Required
            }
            ResponseStrategy::StructuredFollowup => ToolChoice::Auto,
        };

        let reply = self
            .provider
            .invoke(state.messages(), &specs, tool_choice)
            .await?;

        if tool_choice == ToolChoice::Required && reply.tool_calls.is_empty() {
            return Err(AgentError::ForcedToolChoice(
                "backend returned no tool calls for a required tool choice".into(),
            ));
        }

        Ok(reply)
    }

    /// Tool execution node: dispatch every request in the latest assistant
    /// message, append one result per request in request order.
    ///
    /// Executions run concurrently; `join_all` yields results in input
    /// order regardless of completion order. Returns the content of the
    /// last appended tool result, handed to the formatting node so it never
    /// indexes into the log.
    async fn execute_tools(&self, state: &mut ConversationState) -> Option<String> {
        let calls: Vec<ToolCallRequest> = state
            .last()
            .map(|m| m.tool_calls().to_vec())
            .unwrap_or_default();

        if calls.is_empty() {
            return None;
        }

        let results = future::join_all(calls.iter().map(|call| self.dispatch(call))).await;

        let mut last_output = None;
        for message in results {
            last_output = Some(message.text().to_string());
            state.push(message);
        }
        last_output
    }

    /// Dispatch one call, converting every failure into an error-bearing
    /// tool result so the model can recover on the next turn.
    async fn dispatch(&self, call: &ToolCallRequest) -> Message {
        if self.config.strategy == ResponseStrategy::SchemaTool && call.name == self.schema.name() {
            // Schema call mixed into a tool turn: answer it with guidance
            // instead of silently dropping the request.
            return Message::tool_error(
                &call.id,
                &call.name,
                format!(
                    "'{}' is the final response tool; call it on its own once all other tool calls have completed",
                    call.name
                ),
            );
        }

        match self.tools.execute(call).await {
            Ok(output) => {
                tracing::debug!(tool = %call.name, call_id = %call.id, "tool executed");
                Message::tool_result(&call.id, &call.name, output)
            }
            Err(e) => {
                tracing::warn!(tool = %call.name, call_id = %call.id, error = %e, "tool call failed");
                Message::tool_error(&call.id, &call.name, e.to_string())
            }
        }
    }

    /// Response formatting node, terminal in both strategies.
    async fn format_response(
        &self,
        state: &ConversationState,
        last_tool_output: Option<&str>,
    ) -> Result<Value> {
        match self.config.strategy {
            ResponseStrategy::SchemaTool => {
                // Routing guarantees the latest assistant message holds
                // exactly the schema call.
                let call = state
                    .last()
                    .and_then(|m| m.tool_calls().first())
                    .ok_or_else(|| {
                        AgentError::SchemaConformance("no schema tool call to format".into())
                    })?;
                self.schema.from_arguments(call.arguments.clone())
            }
            ResponseStrategy::StructuredFollowup => {
                // Reduced context: the latest tool result alone carries the
                // information the formatter needs. When no tool ever ran,
                // the assistant's own text is the only content bearing the
                // answer.
                let seed = match last_tool_output {
                    Some(output) => output.to_string(),
                    None => state.last().map(|m| m.text().to_string()).unwrap_or_default(),
                };

                let value = self
                    .provider
                    .invoke_structured(&[Message::human(seed)], &self.schema)
                    .await?;
                self.schema
                    .validate(&value)
                    .map_err(|e| AgentError::StructuredContract(e.to_string()))?;
                Ok(value)
            }
        }
    }
}

/// Builder for [`Agent`]
pub struct AgentBuilder {
    provider: Option<Arc<dyn ModelProvider>>,
    tools: ToolRegistry,
    schema: Option<ResponseSchema>,
    config: AgentConfig,
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            tools: ToolRegistry::new(),
            schema: None,
            config: AgentConfig::default(),
        }
    }

    pub fn provider(mut self, provider: Arc<dyn ModelProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn tool<T: crate::tool::Tool + 'static>(mut self, tool: T) -> Self {
        self.tools.register(tool);
        self
    }

    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn schema(mut self, schema: ResponseSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn strategy(mut self, strategy: ResponseStrategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    pub fn max_turns(mut self, max: usize) -> Self {
        self.config.max_turns = Some(max);
        self
    }

    pub fn build(self) -> Result<Agent> {
        let provider = self
            .provider
            .ok_or_else(|| AgentError::Config("provider is required".into()))?;
        let schema = self
            .schema
            .ok_or_else(|| AgentError::Config("response schema is required".into()))?;

        Ok(Agent::new(
            provider,
            Arc::new(self.tools),
            Arc::new(schema),
            self.config,
        ))
    }
}
