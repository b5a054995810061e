// SPDX-License-Identifier: MIT

//! Anthropic Model - Claude Messages API implementation

use super::{model_view, Message, Model, ModelRequest, ModelResponse, Part, Role, ToolCall, ToolChoice};
use crate::adk::error::ModelError;
use crate::adk::tool::Tool;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::env;
use std::sync::Arc;

/// Anthropic Claude model implementation
pub struct AnthropicModel {
    client: Client,
    api_key: String,
    model_name: String,
    base_url: String,
}

impl AnthropicModel {
    /// Create a new AnthropicModel
    ///
    /// Requires `ANTHROPIC_API_KEY` environment variable to be set.
    /// Optionally uses `ANTHROPIC_BASE_URL` for custom endpoints.
    pub fn new(model_name: String) -> Result<Self, ModelError> {
        let api_key = env::var("ANTHROPIC_API_KEY")
            .map_err(|_| ModelError::config("ANTHROPIC_API_KEY must be set"))?;
        let base_url = env::var("ANTHROPIC_BASE_URL")
            .unwrap_or_else(|_| "https://api.anthropic.com/v1".to_string());

        Ok(Self {
            client: Client::new(),
            api_key,
            model_name,
            base_url,
        })
    }

    /// Convert a history message to Anthropic message format
    fn message_to_anthropic(message: &Message) -> Option<serde_json::Value> {
        // Tool results travel in user turns
        let role = match message.role {
            Role::Assistant => "assistant",
            Role::User | Role::Tool => "user",
        };

        let mut content = Vec::new();

        for part in &message.parts {
            match part {
                Part::Text { text } => {
                    if !text.is_empty() {
                        content.push(json!({
                            "type": "text",
                            "text": text
                        }));
                    }
                }
                Part::ToolCall {
                    call_id,
                    name,
                    args,
                } => {
                    content.push(json!({
                        "type": "tool_use",
                        "id": call_id,
                        "name": name,
                        "input": args
                    }));
                }
                Part::ToolResult {
                    call_id, output, ..
                } => {
                    content.push(json!({
                        "type": "tool_result",
                        "tool_use_id": call_id,
                        "content": output.to_model_json().to_string()
                    }));
                }
                Part::ApprovalResponse { .. } => {}
            }
        }

        if content.is_empty() {
            return None;
        }

        Some(json!({
            "role": role,
            "content": content
        }))
    }

    /// Convert tools to Anthropic tool format
    fn tools_to_anthropic_format(tools: &[Arc<dyn Tool>]) -> Vec<serde_json::Value> {
        tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name(),
                    "description": t.description(),
                    "input_schema": t.schema()
                })
            })
            .collect()
    }

    fn tool_choice_to_anthropic(choice: &ToolChoice) -> serde_json::Value {
        match choice {
            ToolChoice::Auto => json!({ "type": "auto" }),
            ToolChoice::None => json!({ "type": "none" }),
            ToolChoice::Required => json!({ "type": "any" }),
            ToolChoice::Tool(name) => json!({ "type": "tool", "name": name }),
        }
    }

    /// Parse Anthropic response into a ModelResponse
    fn parse_anthropic_response(response: &serde_json::Value) -> Result<ModelResponse, ModelError> {
        let content_blocks = response["content"]
            .as_array()
            .ok_or_else(|| ModelError::invalid_response("No content in Anthropic response"))?;

        let mut parsed = ModelResponse::default();

        for block in content_blocks {
            match block["type"].as_str() {
                Some("text") => {
                    if let Some(text) = block["text"].as_str() {
                        parsed.text.push_str(text);
                    }
                }
                Some("tool_use") => {
                    let name = block["name"]
                        .as_str()
                        .ok_or_else(|| ModelError::invalid_response("tool_use block without name"))?
                        .to_string();
                    parsed.tool_calls.push(ToolCall {
                        call_id: block["id"].as_str().unwrap_or_default().to_string(),
                        name,
                        args: block["input"].clone(),
                    });
                }
                _ => {}
            }
        }

        if let Some(stop_reason) = response["stop_reason"].as_str() {
            log::debug!("Anthropic stop reason: {}", stop_reason);
        }

        Ok(parsed)
    }
}

#[async_trait]
impl Model for AnthropicModel {
    async fn generate(&self, request: &ModelRequest<'_>) -> Result<ModelResponse, ModelError> {
        let url = format!("{}/messages", self.base_url);

        let messages: Vec<serde_json::Value> = model_view(request.messages)
            .iter()
            .filter_map(Self::message_to_anthropic)
            .collect();

        let config = request.config;
        let mut body = json!({
            "model": self.model_name,
            "messages": messages,
            "max_tokens": config.and_then(|c| c.max_output_tokens).unwrap_or(4096)
        });

        if !request.system_prompt.is_empty() {
            body["system"] = json!(request.system_prompt);
        }

        if let Some(cfg) = config {
            if let Some(temp) = cfg.temperature {
                body["temperature"] = json!(temp);
            }
            if let Some(top_p) = cfg.top_p {
                body["top_p"] = json!(top_p);
            }
            if let Some(top_k) = cfg.top_k {
                body["top_k"] = json!(top_k);
            }
        }

        if !request.tools.is_empty() {
            body["tools"] = json!(Self::tools_to_anthropic_format(request.tools));
            body["tool_choice"] = Self::tool_choice_to_anthropic(request.tool_choice);
        }

        log::debug!(
            "Anthropic request body: {}",
            serde_json::to_string_pretty(&body).unwrap_or_default()
        );

        let resp = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await?;
            return Err(ModelError::from_status(
                status.as_u16(),
                format!("Anthropic API error: {}", text),
            ));
        }

        let resp_json: serde_json::Value = resp.json().await?;
        log::debug!("Anthropic response: {}", resp_json);

        Self::parse_anthropic_response(&resp_json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::model::ToolOutput;
    use serde_json::json;

    #[test]
    fn test_user_message() {
        let msg = AnthropicModel::message_to_anthropic(&Message::user("Hello")).unwrap();
        assert_eq!(msg["role"], "user");
        assert_eq!(msg["content"][0]["type"], "text");
        assert_eq!(msg["content"][0]["text"], "Hello");
    }

    #[test]
    fn test_assistant_tool_use_keeps_call_id() {
        let message = Message {
            role: Role::Assistant,
            parts: vec![Part::ToolCall {
                call_id: "toolu_01".to_string(),
                name: "search".to_string(),
                args: json!({"query": "rust"}),
            }],
        };

        let msg = AnthropicModel::message_to_anthropic(&message).unwrap();
        assert_eq!(msg["role"], "assistant");
        assert_eq!(msg["content"][0]["type"], "tool_use");
        assert_eq!(msg["content"][0]["id"], "toolu_01");
        assert_eq!(msg["content"][0]["name"], "search");
    }

    #[test]
    fn test_tool_results_are_sent_as_user_turns() {
        let message = Message {
            role: Role::Tool,
            parts: vec![Part::ToolResult {
                call_id: "toolu_01".to_string(),
                name: "search".to_string(),
                args: json!({}),
                output: ToolOutput::Error("boom".to_string()),
            }],
        };

        let msg = AnthropicModel::message_to_anthropic(&message).unwrap();
        assert_eq!(msg["role"], "user");
        assert_eq!(msg["content"][0]["type"], "tool_result");
        assert_eq!(msg["content"][0]["tool_use_id"], "toolu_01");
        assert_eq!(msg["content"][0]["content"], r#"{"error":"boom"}"#);
    }

    #[test]
    fn test_tool_choice_mapping() {
        assert_eq!(
            AnthropicModel::tool_choice_to_anthropic(&ToolChoice::Required),
            json!({"type": "any"})
        );
        assert_eq!(
            AnthropicModel::tool_choice_to_anthropic(&ToolChoice::Tool("publish".to_string())),
            json!({"type": "tool", "name": "publish"})
        );
    }

    #[test]
    fn test_parse_text_and_tool_use_response() {
        let response = json!({
            "content": [
                { "type": "text", "text": "Let me look that up." },
                {
                    "type": "tool_use",
                    "id": "toolu_123",
                    "name": "get_weather",
                    "input": {"city": "London"}
                }
            ],
            "stop_reason": "tool_use"
        });

        let parsed = AnthropicModel::parse_anthropic_response(&response).unwrap();
        assert_eq!(parsed.text, "Let me look that up.");
        assert_eq!(parsed.tool_calls.len(), 1);
        assert_eq!(parsed.tool_calls[0].call_id, "toolu_123");
        assert_eq!(parsed.tool_calls[0].name, "get_weather");
        assert_eq!(parsed.tool_calls[0].args["city"], "London");
    }

    #[test]
    fn test_parse_response_without_content_fails() {
        let err = AnthropicModel::parse_anthropic_response(&json!({})).unwrap_err();
        assert_eq!(err.kind, crate::adk::error::ModelErrorKind::InvalidResponse);
    }
}
