//! # agent-core
//!
//! Agent orchestration state machine that guarantees a schema-conformant
//! final response instead of free-form text.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                          Agent                                │
//! │  ┌──────────────┐   route   ┌──────────────┐                  │
//! │  │   Invoking   │──────────▶│  Formatting  │──▶ done          │
//! │  │    Model     │           │   Response   │                  │
//! │  └──────▲───────┘           └──────────────┘                  │
//! │         │        ┌──────────────┐                             │
//! │         └────────│  Executing   │◀── route                    │
//! │                  │    Tools     │                             │
//! │                  └──────────────┘                             │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `ModelProvider` trait abstracts the model backend; the registry and
//! response schema are read-only after construction, so any number of
//! invocations can run concurrently, each owning its own conversation state.

pub mod error;
pub mod message;
pub mod orchestrator;
pub mod provider;
pub mod schema;
pub mod tool;

pub use error::{AgentError, Result};
pub use message::{ConversationState, InvocationId, Message, ToolCallRequest};
pub use orchestrator::{route, Agent, AgentBuilder, AgentConfig, AgentState, ResponseStrategy, Route};
pub use provider::{AssistantReply, ModelProvider, ToolChoice};
pub use schema::{FieldSpec, FieldType, ResponseSchema};
pub use tool::{FnTool, ParameterSpec, Tool, ToolRegistry, ToolSpec};
