//! OpenAI-compatible Model Backend
//!
//! Implementation of `ModelProvider` against a `/v1/chat/completions`
//! endpoint. Any OpenAI-compatible server works: OpenAI itself, Ollama's
//! `/v1` surface, or vLLM.

use std::time::Duration;

use agent_core::{
    error::{AgentError, Result},
    message::{Message, ToolCallRequest},
    provider::{AssistantReply, ModelProvider, ToolChoice},
    schema::ResponseSchema,
    tool::ToolSpec,
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

/// OpenAI-compatible backend configuration
#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    /// API host, e.g. `https://api.openai.com` or `http://localhost:11434`
    pub host: String,

    /// Bearer token
    pub api_key: String,

    /// Model identifier
    pub model: String,

    /// Sampling temperature
    pub temperature: Option<f32>,

    /// Completion token cap
    pub max_tokens: Option<u32>,

    /// System prompt prepended to every request
    pub system_prompt: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            host: "https://api.openai.com".into(),
            api_key: String::new(),
            model: "gpt-4o-mini".into(),
            temperature: None,
            max_tokens: None,
            system_prompt: None,
            timeout_secs: 120,
        }
    }
}

impl OpenAiConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(host) = std::env::var("OPENAI_HOST") {
            config.host = host;
        }
        if let Ok(model) = std::env::var("OPENAI_MODEL") {
            config.model = model;
        }
        config.api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
        config
    }
}

/// OpenAI-compatible model provider
pub struct OpenAiProvider {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AgentError::Config(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Create from `OPENAI_HOST` / `OPENAI_API_KEY` / `OPENAI_MODEL`
    pub fn from_env() -> Result<Self> {
        Self::new(OpenAiConfig::from_env())
    }

    /// Convert agent messages to the OpenAI wire format
    fn convert_messages(&self, messages: &[Message]) -> Vec<Value> {
        let mut converted = Vec::new();

        if let Some(system) = &self.config.system_prompt {
            converted.push(json!({"role": "system", "content": system}));
        }

        for message in messages {
            match message {
                Message::Human { content } => {
                    converted.push(json!({"role": "user", "content": content}));
                }
                Message::Assistant {
                    content,
                    tool_calls,
                } => {
                    let mut entry = json!({"role": "assistant", "content": content});
                    if !tool_calls.is_empty() {
                        let calls: Vec<Value> = tool_calls
                            .iter()
                            .map(|call| {
                                json!({
                                    "id": call.id,
                                    "type": "function",
                                    "function": {
                                        "name": call.name,
                                        "arguments": Value::Object(call.arguments.clone()).to_string(),
                                    }
                                })
                            })
                            .collect();
                        entry["tool_calls"] = json!(calls);
                    }
                    converted.push(entry);
                }
                Message::ToolResult {
                    call_id,
                    content,
                    is_error,
                    ..
                } => {
                    let content = if *is_error {
                        format!("Error: {content}")
                    } else {
                        content.clone()
                    };
                    converted.push(json!({
                        "role": "tool",
                        "tool_call_id": call_id,
                        "content": content,
                    }));
                }
            }
        }

        converted
    }

    /// Convert advertised tool specs to the OpenAI wire format
    fn convert_tools(tools: &[ToolSpec]) -> Vec<Value> {
        tools
            .iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.to_json_schema(),
                    }
                })
            })
            .collect()
    }

    /// Parse a chat completion into an assistant reply.
    ///
    /// A tool call whose arguments are not a JSON object is a parse error;
    /// it never surfaces as a call with silently-empty arguments.
    fn parse_reply(response: &Value) -> Result<AssistantReply> {
        let message = response
            .pointer("/choices/0/message")
            .ok_or_else(|| AgentError::Parse("response has no choices".into()))?;

        let content = message
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let mut tool_calls = Vec::new();
        if let Some(calls) = message.get("tool_calls").and_then(Value::as_array) {
            for call in calls {
                let id = call
                    .get("id")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
                let name = call
                    .pointer("/function/name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| AgentError::Parse("tool call without a name".into()))?
                    .to_string();
                let raw_arguments = call
                    .pointer("/function/arguments")
                    .and_then(Value::as_str)
                    .unwrap_or("{}");

                let arguments: Value = serde_json::from_str(raw_arguments).map_err(|e| {
                    AgentError::Parse(format!("tool call '{name}' has malformed arguments: {e}"))
                })?;
                let arguments = match arguments {
                    Value::Object(map) => map,
                    other => {
                        return Err(AgentError::Parse(format!(
                            "tool call '{name}' arguments must be an object, got {other}"
                        )));
                    }
                };

                tool_calls.push(ToolCallRequest::new(id, name, arguments));
            }
        }

        Ok(AssistantReply {
            content,
            tool_calls,
        })
    }

    async fn post(&self, payload: Value) -> Result<Value> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.host.trim_end_matches('/')
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&payload)
            .send()
            .await
            .map_err(|e| AgentError::Backend(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(AgentError::Backend(format!("request failed: {status}")));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| AgentError::Parse(e.to_string()))?;

        if let Some(error) = body.get("error") {
            tracing::warn!(%error, "chat completion returned an error payload");
            return Err(AgentError::Backend(error.to_string()));
        }

        Ok(body)
    }

    fn base_payload(&self, messages: &[Message]) -> Value {
        let mut payload = json!({
            "model": self.config.model,
            "messages": self.convert_messages(messages),
        });
        if let Some(temperature) = self.config.temperature {
            payload["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = self.config.max_tokens {
            payload["max_tokens"] = json!(max_tokens);
        }
        payload
    }
}

#[async_trait]
impl ModelProvider for OpenAiProvider {
    async fn invoke(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
        tool_choice: ToolChoice,
    ) -> Result<AssistantReply> {
        let mut payload = self.base_payload(messages);

        if !tools.is_empty() {
            payload["tools"] = json!(Self::convert_tools(tools));
            payload["tool_choice"] = match tool_choice {
                ToolChoice::Auto => json!("auto"),
                ToolChoice::Required => json!("required"),
            };
        }

        let response = self.post(payload).await?;
        Self::parse_reply(&response)
    }

    async fn invoke_structured(
        &self,
        messages: &[Message],
        schema: &ResponseSchema,
    ) -> Result<Value> {
        let mut payload = self.base_payload(messages);
        payload["response_format"] = json!({
            "type": "json_schema",
            "json_schema": {
                "name": schema.name,
                "strict": true,
                "schema": schema.to_json_schema(),
            }
        });

        let response = self.post(payload).await?;
        let content = response
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                AgentError::StructuredContract("structured call returned no content".into())
            })?;

        let value: Value = serde_json::from_str(content).map_err(|e| {
            AgentError::StructuredContract(format!("structured call returned non-JSON: {e}"))
        })?;
        schema
            .validate(&value)
            .map_err(|e| AgentError::StructuredContract(e.to_string()))?;

        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::schema::FieldType;
    use agent_core::tool::ParameterSpec;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(host: String) -> OpenAiProvider {
        OpenAiProvider::new(OpenAiConfig {
            host,
            api_key: "test-key".into(),
            model: "test-model".into(),
            ..OpenAiConfig::default()
        })
        .unwrap()
    }

    fn weather_schema() -> ResponseSchema {
        ResponseSchema::new("weather_response", "Final weather report")
            .field("temperature", FieldType::Number, "Temperature in degrees")
            .field("wind_direction", FieldType::String, "Compass direction")
            .field("wind_speed", FieldType::Number, "Wind speed")
    }

    fn weather_tool_spec() -> ToolSpec {
        ToolSpec::new("get_weather", "Get current weather for a city")
            .parameter(ParameterSpec::required("city", "string", "City code"))
    }

    #[test]
    fn test_config_defaults() {
        let config = OpenAiConfig::default();
        assert_eq!(config.host, "https://api.openai.com");
        assert_eq!(config.timeout_secs, 120);
        assert!(config.system_prompt.is_none());
    }

    #[test]
    fn test_message_conversion() {
        let provider = provider_for("http://localhost".into());
        let messages = vec![
            Message::human("what's the weather?"),
            Message::assistant_with_calls(
                "",
                vec![ToolCallRequest::new(
                    "call_1",
                    "get_weather",
                    [("city".to_string(), json!("sf"))].into_iter().collect(),
                )],
            ),
            Message::tool_result("call_1", "get_weather", "75 and sunny"),
            Message::tool_error("call_2", "get_weather", "unknown city"),
        ];

        let converted = provider.convert_messages(&messages);
        assert_eq!(converted.len(), 4);
        assert_eq!(converted[0]["role"], "user");
        assert_eq!(converted[1]["tool_calls"][0]["function"]["name"], "get_weather");
        assert_eq!(converted[2]["role"], "tool");
        assert_eq!(converted[2]["tool_call_id"], "call_1");
        assert_eq!(converted[3]["content"], "Error: unknown city");
    }

    #[test]
    fn test_system_prompt_prepended() {
        let provider = OpenAiProvider::new(OpenAiConfig {
            system_prompt: Some("You are terse.".into()),
            ..OpenAiConfig::default()
        })
        .unwrap();

        let converted = provider.convert_messages(&[Message::human("hi")]);
        assert_eq!(converted[0]["role"], "system");
        assert_eq!(converted[1]["role"], "user");
    }

    #[test]
    fn test_parse_reply_rejects_malformed_arguments() {
        let response = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "get_weather", "arguments": "{not json"}
                    }]
                }
            }]
        });

        let err = OpenAiProvider::parse_reply(&response).unwrap_err();
        assert!(matches!(err, AgentError::Parse(_)));
    }

    #[tokio::test]
    async fn test_invoke_parses_tool_calls() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({"tool_choice": "required"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": null,
                        "tool_calls": [{
                            "id": "call_1",
                            "type": "function",
                            "function": {
                                "name": "get_weather",
                                "arguments": "{\"city\":\"sf\"}"
                            }
                        }]
                    },
                    "finish_reason": "tool_calls"
                }]
            })))
            .mount(&server)
            .await;

        let provider = provider_for(server.uri());
        let reply = provider
            .invoke(
                &[Message::human("weather in sf?")],
                &[weather_tool_spec()],
                ToolChoice::Required,
            )
            .await
            .unwrap();

        assert_eq!(reply.tool_calls.len(), 1);
        assert_eq!(reply.tool_calls[0].id, "call_1");
        assert_eq!(reply.tool_calls[0].name, "get_weather");
        assert_eq!(reply.tool_calls[0].arguments["city"], json!("sf"));
    }

    #[tokio::test]
    async fn test_invoke_text_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{
                    "message": {"role": "assistant", "content": "75 and sunny"},
                    "finish_reason": "stop"
                }]
            })))
            .mount(&server)
            .await;

        let provider = provider_for(server.uri());
        let reply = provider
            .invoke(&[Message::human("weather?")], &[], ToolChoice::Auto)
            .await
            .unwrap();

        assert_eq!(reply.content, "75 and sunny");
        assert!(reply.tool_calls.is_empty());
    }

    #[tokio::test]
    async fn test_invoke_structured_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(
                json!({"response_format": {"type": "json_schema"}}),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": "{\"temperature\":75.0,\"wind_direction\":\"SE\",\"wind_speed\":4.83}"
                    },
                    "finish_reason": "stop"
                }]
            })))
            .mount(&server)
            .await;

        let provider = provider_for(server.uri());
        let value = provider
            .invoke_structured(&[Message::human("75 and sunny, SE wind")], &weather_schema())
            .await
            .unwrap();

        assert_eq!(value["temperature"], json!(75.0));
        assert_eq!(value["wind_speed"], json!(4.83));
    }

    #[tokio::test]
    async fn test_invoke_structured_contract_violation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": "{\"temperature\":\"hot\"}"
                    },
                    "finish_reason": "stop"
                }]
            })))
            .mount(&server)
            .await;

        let provider = provider_for(server.uri());
        let err = provider
            .invoke_structured(&[Message::human("weather")], &weather_schema())
            .await
            .unwrap_err();

        assert!(matches!(err, AgentError::StructuredContract(_)));
    }

    #[tokio::test]
    async fn test_server_error_is_backend_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let provider = provider_for(server.uri());
        let err = provider
            .invoke(&[Message::human("hi")], &[], ToolChoice::Auto)
            .await
            .unwrap_err();

        assert!(matches!(err, AgentError::Backend(_)));
        assert!(err.is_fatal());
    }
}
