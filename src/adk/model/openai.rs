// SPDX-License-Identifier: MIT

//! OpenAI Model - Chat Completions API implementation

use super::{model_view, Message, Model, ModelRequest, ModelResponse, Part, Role, ToolCall, ToolChoice};
use crate::adk::error::ModelError;
use crate::adk::tool::Tool;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::env;
use std::sync::Arc;

/// OpenAI chat model implementation
pub struct OpenAIModel {
    client: Client,
    api_key: String,
    model_name: String,
    base_url: String,
}

impl OpenAIModel {
    /// Create a new OpenAIModel
    ///
    /// Requires `OPENAI_API_KEY` environment variable to be set.
    /// Optionally uses `OPENAI_BASE_URL` for custom endpoints.
    pub fn new(model_name: String) -> Result<Self, ModelError> {
        let api_key = env::var("OPENAI_API_KEY")
            .map_err(|_| ModelError::config("OPENAI_API_KEY must be set"))?;
        let base_url =
            env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".to_string());

        Ok(Self {
            client: Client::new(),
            api_key,
            model_name,
            base_url,
        })
    }

    /// Convert a history message to OpenAI messages.
    ///
    /// A tool message fans out into one `tool` message per result.
    fn message_to_openai(message: &Message) -> Vec<serde_json::Value> {
        if message.role == Role::Tool {
            return message
                .parts
                .iter()
                .filter_map(|part| match part {
                    Part::ToolResult {
                        call_id, output, ..
                    } => Some(json!({
                        "role": "tool",
                        "tool_call_id": call_id,
                        "content": output.to_model_json().to_string()
                    })),
                    _ => None,
                })
                .collect();
        }

        let role = match message.role {
            Role::Assistant => "assistant",
            _ => "user",
        };

        let mut tool_calls = Vec::new();
        let mut text_content = String::new();

        for part in &message.parts {
            match part {
                Part::Text { text } => text_content.push_str(text),
                Part::ToolCall {
                    call_id,
                    name,
                    args,
                } => {
                    tool_calls.push(json!({
                        "id": call_id,
                        "type": "function",
                        "function": {
                            "name": name,
                            "arguments": args.to_string()
                        }
                    }));
                }
                Part::ToolResult { .. } | Part::ApprovalResponse { .. } => {}
            }
        }

        if !tool_calls.is_empty() {
            vec![json!({
                "role": role,
                "content": if text_content.is_empty() { serde_json::Value::Null } else { json!(text_content) },
                "tool_calls": tool_calls
            })]
        } else if text_content.is_empty() {
            vec![]
        } else {
            vec![json!({
                "role": role,
                "content": text_content
            })]
        }
    }

    /// Convert tools to OpenAI function format
    fn tools_to_openai_format(tools: &[Arc<dyn Tool>]) -> Vec<serde_json::Value> {
        tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name(),
                        "description": t.description(),
                        "parameters": t.schema()
                    }
                })
            })
            .collect()
    }

    fn tool_choice_to_openai(choice: &ToolChoice) -> serde_json::Value {
        match choice {
            ToolChoice::Auto => json!("auto"),
            ToolChoice::None => json!("none"),
            ToolChoice::Required => json!("required"),
            ToolChoice::Tool(name) => json!({
                "type": "function",
                "function": { "name": name }
            }),
        }
    }

    /// Parse OpenAI response into a ModelResponse
    fn parse_openai_response(response: &serde_json::Value) -> Result<ModelResponse, ModelError> {
        let choice = response["choices"]
            .as_array()
            .and_then(|c| c.first())
            .ok_or_else(|| ModelError::invalid_response("No choices in OpenAI response"))?;

        let message = &choice["message"];
        let mut parsed = ModelResponse::default();

        if let Some(content) = message["content"].as_str() {
            parsed.text.push_str(content);
        }

        if let Some(tool_calls) = message["tool_calls"].as_array() {
            for tc in tool_calls {
                let name = tc["function"]["name"]
                    .as_str()
                    .ok_or_else(|| ModelError::invalid_response("tool call without name"))?
                    .to_string();
                let args_str = tc["function"]["arguments"].as_str().unwrap_or("{}");
                let args: serde_json::Value = serde_json::from_str(args_str).map_err(|e| {
                    ModelError::invalid_response(format!("Invalid arguments for {}: {}", name, e))
                })?;

                parsed.tool_calls.push(ToolCall {
                    call_id: tc["id"].as_str().unwrap_or_default().to_string(),
                    name,
                    args,
                });
            }
        }

        Ok(parsed)
    }
}

#[async_trait]
impl Model for OpenAIModel {
    async fn generate(&self, request: &ModelRequest<'_>) -> Result<ModelResponse, ModelError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut messages = Vec::new();
        if !request.system_prompt.is_empty() {
            messages.push(json!({
                "role": "system",
                "content": request.system_prompt
            }));
        }
        for message in model_view(request.messages) {
            messages.extend(Self::message_to_openai(&message));
        }

        let mut body = json!({
            "model": self.model_name,
            "messages": messages
        });

        if let Some(cfg) = request.config {
            if let Some(temp) = cfg.temperature {
                body["temperature"] = json!(temp);
            }
            if let Some(max_tokens) = cfg.max_output_tokens {
                body["max_tokens"] = json!(max_tokens);
            }
            if let Some(top_p) = cfg.top_p {
                body["top_p"] = json!(top_p);
            }
        }

        if !request.tools.is_empty() {
            body["tools"] = json!(Self::tools_to_openai_format(request.tools));
            body["tool_choice"] = Self::tool_choice_to_openai(request.tool_choice);
        }

        log::debug!(
            "OpenAI request body: {}",
            serde_json::to_string_pretty(&body).unwrap_or_default()
        );

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await?;
            return Err(ModelError::from_status(
                status.as_u16(),
                format!("OpenAI API error: {}", text),
            ));
        }

        let resp_json: serde_json::Value = resp.json().await?;
        log::debug!("OpenAI response: {}", resp_json);

        Self::parse_openai_response(&resp_json)
    }
}
