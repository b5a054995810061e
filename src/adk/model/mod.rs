// SPDX-License-Identifier: MIT

//! Model module - defines the model provider trait and the history types
//!
//! The history is an append-only log of role-tagged messages. It is owned
//! by the caller; the runtime reads it and returns the messages a round
//! appends. Provider implementations are in their own submodules:
//! - [anthropic] - Anthropic's Claude API
//! - [openai] - OpenAI's Chat Completions API

pub mod anthropic;
pub mod openai;

use crate::adk::error::ModelError;
use crate::adk::tool::Tool;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Configuration for model generation
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct GenerationConfig {
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

/// A message in the conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part::Text { text: text.into() }],
        }
    }

    /// A user message carrying one approval decision
    pub fn approval(call_id: impl Into<String>, approved: bool, reason: Option<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part::ApprovalResponse {
                call_id: call_id.into(),
                approved,
                reason,
            }],
        }
    }

    /// Concatenated text parts
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    pub fn tool_calls(&self) -> impl Iterator<Item = ToolCall> + '_ {
        self.parts.iter().filter_map(|p| match p {
            Part::ToolCall {
                call_id,
                name,
                args,
            } => Some(ToolCall {
                call_id: call_id.clone(),
                name: name.clone(),
                args: args.clone(),
            }),
            _ => None,
        })
    }
}

/// Parts of a message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Part {
    /// Plain text from the user or the model
    Text { text: String },
    /// Tool call requested by the model
    ToolCall {
        call_id: String,
        name: String,
        args: Value,
    },
    /// Outcome of a tool call. A later result for the same call id
    /// supersedes an earlier `PendingApproval` or `Deferred` one.
    ToolResult {
        call_id: String,
        name: String,
        args: Value,
        output: ToolOutput,
    },
    /// Human decision on a call that is pending approval
    ApprovalResponse {
        call_id: String,
        approved: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

/// What happened to a tool call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum ToolOutput {
    Success(Value),
    /// The tool failed; the text is shown to the model on a later turn
    Error(String),
    PendingApproval,
    /// Held back until the earlier calls of its round are resolved
    Deferred,
    Denied {
        reason: String,
    },
}

impl ToolOutput {
    pub fn is_pending(&self) -> bool {
        matches!(self, ToolOutput::PendingApproval)
    }

    /// No final outcome recorded yet
    pub fn is_unresolved(&self) -> bool {
        matches!(self, ToolOutput::PendingApproval | ToolOutput::Deferred)
    }

    /// JSON the model sees for this outcome
    pub fn to_model_json(&self) -> Value {
        match self {
            ToolOutput::Success(v) => v.clone(),
            ToolOutput::Error(e) => serde_json::json!({ "error": e }),
            ToolOutput::PendingApproval => serde_json::json!({ "status": "pending_approval" }),
            ToolOutput::Deferred => serde_json::json!({ "status": "deferred" }),
            ToolOutput::Denied { reason } => {
                serde_json::json!({ "denied": true, "reason": reason })
            }
        }
    }
}

/// A tool call emitted by the model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    pub call_id: String,
    pub name: String,
    pub args: Value,
}

/// How the model may use the offered tools
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    #[default]
    Auto,
    None,
    Required,
    Tool(String),
}

/// Everything a provider needs for one model call
pub struct ModelRequest<'a> {
    pub system_prompt: &'a str,
    pub messages: &'a [Message],
    pub tools: &'a [Arc<dyn Tool>],
    pub tool_choice: &'a ToolChoice,
    pub config: Option<&'a GenerationConfig>,
}

/// Final shape of a model call, streaming or not
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelResponse {
    pub text: String,
    /// Emission order is preserved
    pub tool_calls: Vec<ToolCall>,
}

/// Core trait for LLM model implementations
#[async_trait]
pub trait Model: Send + Sync {
    async fn generate(&self, request: &ModelRequest<'_>) -> Result<ModelResponse, ModelError>;
}

/// Project the append-only history into what a provider should see.
///
/// Each tool result stays at its original position but carries the latest
/// outcome recorded for its call id. Approval responses and the messages
/// that only carry superseding results are dropped.
pub fn model_view(history: &[Message]) -> Vec<Message> {
    let mut latest: HashMap<&str, &ToolOutput> = HashMap::new();
    let mut first_seen: HashMap<&str, (usize, usize)> = HashMap::new();
    for (mi, msg) in history.iter().enumerate() {
        for (pi, part) in msg.parts.iter().enumerate() {
            if let Part::ToolResult {
                call_id, output, ..
            } = part
            {
                latest.insert(call_id.as_str(), output);
                first_seen.entry(call_id.as_str()).or_insert((mi, pi));
            }
        }
    }

    history
        .iter()
        .enumerate()
        .filter_map(|(mi, msg)| {
            let parts: Vec<Part> = msg
                .parts
                .iter()
                .enumerate()
                .filter_map(|(pi, part)| match part {
                    Part::ApprovalResponse { .. } => None,
                    Part::ToolResult {
                        call_id,
                        name,
                        args,
                        ..
                    } => {
                        if first_seen.get(call_id.as_str()) != Some(&(mi, pi)) {
                            return None;
                        }
                        let output = latest.get(call_id.as_str()).map(|o| (*o).clone())?;
                        Some(Part::ToolResult {
                            call_id: call_id.clone(),
                            name: name.clone(),
                            args: args.clone(),
                            output,
                        })
                    }
                    other => Some(other.clone()),
                })
                .collect();
            if parts.is_empty() {
                None
            } else {
                Some(Message {
                    role: msg.role,
                    parts,
                })
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result(call_id: &str, output: ToolOutput) -> Part {
        Part::ToolResult {
            call_id: call_id.to_string(),
            name: "publish".to_string(),
            args: json!({}),
            output,
        }
    }

    #[test]
    fn test_message_text_concatenates_text_parts() {
        let msg = Message {
            role: Role::Assistant,
            parts: vec![
                Part::Text {
                    text: "Hello, ".to_string(),
                },
                Part::ToolCall {
                    call_id: "c1".to_string(),
                    name: "search".to_string(),
                    args: json!({}),
                },
                Part::Text {
                    text: "world".to_string(),
                },
            ],
        };
        assert_eq!(msg.text(), "Hello, world");
        assert_eq!(msg.tool_calls().count(), 1);
    }

    #[test]
    fn test_part_serialization_shape() {
        let part = result("c1", ToolOutput::PendingApproval);
        let json = serde_json::to_value(&part).unwrap();
        assert_eq!(json["type"], "tool_result");
        assert_eq!(json["call_id"], "c1");
        assert_eq!(json["output"]["status"], "pending_approval");

        let back: Part = serde_json::from_value(json).unwrap();
        assert_eq!(back, part);
    }

    #[test]
    fn test_model_view_replaces_pending_with_latest_outcome() {
        let history = vec![
            Message::user("publish it"),
            Message {
                role: Role::Assistant,
                parts: vec![Part::ToolCall {
                    call_id: "c1".to_string(),
                    name: "publish".to_string(),
                    args: json!({}),
                }],
            },
            Message {
                role: Role::Tool,
                parts: vec![result("c1", ToolOutput::PendingApproval)],
            },
            Message::approval("c1", true, None),
            Message {
                role: Role::Tool,
                parts: vec![result("c1", ToolOutput::Success(json!({"ok": true})))],
            },
        ];

        let view = model_view(&history);
        assert_eq!(view.len(), 3);
        assert_eq!(view[2].role, Role::Tool);
        match &view[2].parts[0] {
            Part::ToolResult { output, .. } => {
                assert_eq!(output, &ToolOutput::Success(json!({"ok": true})))
            }
            _ => panic!("Expected ToolResult part"),
        }
    }

    #[test]
    fn test_tool_output_model_json() {
        assert_eq!(
            ToolOutput::Error("boom".to_string()).to_model_json(),
            json!({"error": "boom"})
        );
        assert_eq!(
            ToolOutput::Denied {
                reason: "no".to_string()
            }
            .to_model_json(),
            json!({"denied": true, "reason": "no"})
        );
        assert_eq!(ToolOutput::Deferred.to_model_json(), json!({"status": "deferred"}));
        assert!(ToolOutput::Deferred.is_unresolved());
        assert!(!ToolOutput::Deferred.is_pending());
    }
}
