//! # agent-runtime
//!
//! Model backends for the structured agent orchestrator.
//!
//! ## Backends
//!
//! - **OpenAI-compatible**: `/v1/chat/completions` with native tool calling
//!   and strict JSON-schema structured output. Works against OpenAI,
//!   Ollama's `/v1` endpoint, or vLLM.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_runtime::openai::OpenAiProvider;
//!
//! let provider = OpenAiProvider::from_env()?;
//! let agent = Agent::builder()
//!     .provider(Arc::new(provider))
//!     .schema(schema)
//!     .build()?;
//! ```

pub mod openai;

pub use openai::{OpenAiConfig, OpenAiProvider};

// Re-export core types for convenience
pub use agent_core::{
    Agent, AgentError, ModelProvider, Message, ResponseSchema, ResponseStrategy, Result, Tool,
    ToolRegistry,
};
