// SPDX-License-Identifier: MIT

//! Stateful agent - one workflow round per call
//!
//! Each call re-derives the workflow context from the supplied history,
//! resolves approval decisions, asks the model for the active state's turn,
//! runs the emitted tool calls through the approval gate and re-derives the
//! context over the extended history. Nothing is kept between calls.

use super::executor::{results_message, ToolExecutor};
use super::{AgentEvent, AgentResult, EventSink, GenerateParams, ToolResultEntry};
use crate::adk::error::AgentError;
use crate::adk::model::{Message, Model, ModelRequest, ModelResponse, Part, Role, ToolCall};
use crate::workflow::deriver::derive_context;
use crate::workflow::registry::WorkflowRegistry;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Runs registered workflows against a model provider
pub struct StatefulAgent<'r> {
    registry: &'r WorkflowRegistry,
    model: Arc<dyn Model>,
}

impl<'r> StatefulAgent<'r> {
    pub fn new(registry: &'r WorkflowRegistry, model: Arc<dyn Model>) -> Self {
        Self { registry, model }
    }

    pub fn registry(&self) -> &'r WorkflowRegistry {
        self.registry
    }

    /// Run one round
    pub async fn generate(&self, params: GenerateParams) -> Result<AgentResult, AgentError> {
        self.run(params, EventSink::none()).await
    }

    /// Run one round, reporting progress on `tx`
    pub async fn generate_stream(
        &self,
        params: GenerateParams,
        tx: mpsc::Sender<AgentEvent>,
    ) -> Result<AgentResult, AgentError> {
        let events = EventSink::new(&tx);
        let result = self.run(params, events).await;
        match &result {
            Ok(r) => {
                events
                    .emit(AgentEvent::Finish {
                        current_state: r.context.current_state.clone(),
                        step_number: r.context.step_number,
                        is_complete: r.is_complete,
                    })
                    .await
            }
            Err(e) => events.emit(AgentEvent::Error(e.to_string())).await,
        }
        result
    }

    async fn run(
        &self,
        params: GenerateParams,
        events: EventSink<'_>,
    ) -> Result<AgentResult, AgentError> {
        let GenerateParams {
            workflow_id,
            messages,
            prompt,
            config,
            cancel,
        } = params;

        let entry = self.registry.get_workflow(&workflow_id)?;
        let definition = entry.definition.as_ref();

        if cancel.as_ref().is_some_and(|t| t.is_cancelled()) {
            return Err(AgentError::Canceled {
                resolved: Vec::new(),
            });
        }

        let mut working = messages;
        let base_len = working.len();
        if let Some(prompt) = prompt {
            working.push(Message::user(prompt));
        }

        let before = derive_context(definition, &working);
        let state = definition
            .state(&before.current_state)
            .ok_or_else(|| AgentError::UnknownState {
                workflow: definition.id.clone(),
                state: before.current_state.clone(),
            })?;

        let executor = ToolExecutor::new(&entry.tools, &state.tools);
        let resolutions = executor.resolve_approvals(&working, &events).await?;
        // Tools in here already ran; failures below hand them back to the caller
        let resolved: Vec<Message> = results_message(&resolutions).into_iter().collect();
        working.extend(resolved.iter().cloned());

        let round = before.step_number + 1;
        let system_prompt = state.render_prompt(&definition.id, &before.current_state, round);
        let active_tools = entry.tools.subset(&state.tools);
        log::info!(
            "[{}] round {} in state '{}' with {} tools",
            definition.id,
            round,
            before.current_state,
            active_tools.len()
        );

        let request = ModelRequest {
            system_prompt: &system_prompt,
            messages: &working,
            tools: &active_tools,
            tool_choice: &state.tool_choice,
            config: config.as_ref(),
        };
        let outcome = match &cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => None,
                r = self.model.generate(&request) => Some(r),
            },
            None => Some(self.model.generate(&request).await),
        };
        let response = match outcome {
            Some(Ok(response)) => response,
            Some(Err(source)) => {
                log::error!("[{}] round {} model call failed: {}", definition.id, round, source);
                return Err(AgentError::ModelProvider { source, resolved });
            }
            None => {
                log::warn!("[{}] round {} canceled", definition.id, round);
                return Err(AgentError::Canceled { resolved });
            }
        };
        log::info!(
            "[{}] model returned {} chars and {} tool calls",
            definition.id,
            response.text.len(),
            response.tool_calls.len()
        );

        let ModelResponse { text, tool_calls } = response;
        let tool_calls = assign_call_ids(tool_calls);
        if !text.is_empty() {
            events.emit(AgentEvent::Text(text.clone())).await;
        }
        working.push(assistant_message(&text, &tool_calls));

        let executed = executor.run_calls(&tool_calls, &events).await;
        if let Some(message) = results_message(&executed) {
            working.push(message);
        }

        let context = derive_context(definition, &working);
        for record in context.state_history.iter().skip(before.state_history.len()) {
            log::info!(
                "[{}] transition {} -> {} on {}",
                definition.id,
                record.from_state,
                record.to_state,
                record.triggered_by
            );
            events.emit(AgentEvent::Transition(record.clone())).await;
        }

        let tool_results: Vec<ToolResultEntry> = resolutions
            .into_iter()
            .chain(executed)
            .map(ToolResultEntry::from)
            .collect();

        Ok(AgentResult {
            text,
            tool_calls,
            tool_results,
            is_complete: context.is_complete,
            context,
            response_messages: working.split_off(base_len),
        })
    }
}

/// Providers that omit call ids get fresh ones so results can be matched
fn assign_call_ids(calls: Vec<ToolCall>) -> Vec<ToolCall> {
    calls
        .into_iter()
        .map(|mut call| {
            if call.call_id.is_empty() {
                call.call_id = Uuid::new_v4().to_string();
            }
            call
        })
        .collect()
}

fn assistant_message(text: &str, calls: &[ToolCall]) -> Message {
    let mut parts = Vec::with_capacity(calls.len() + 1);
    if !text.is_empty() {
        parts.push(Part::Text {
            text: text.to_string(),
        });
    }
    parts.extend(calls.iter().map(|c| Part::ToolCall {
        call_id: c.call_id.clone(),
        name: c.name.clone(),
        args: c.args.clone(),
    }));
    Message {
        role: Role::Assistant,
        parts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_assign_call_ids_fills_only_missing() {
        let calls = assign_call_ids(vec![
            ToolCall {
                call_id: "keep".to_string(),
                name: "a".to_string(),
                args: json!({}),
            },
            ToolCall {
                call_id: String::new(),
                name: "b".to_string(),
                args: json!({}),
            },
        ]);
        assert_eq!(calls[0].call_id, "keep");
        assert!(Uuid::parse_str(&calls[1].call_id).is_ok());
    }

    #[test]
    fn test_assistant_message_skips_empty_text() {
        let message = assistant_message("", &[]);
        assert_eq!(message.role, Role::Assistant);
        assert!(message.parts.is_empty());

        let message = assistant_message(
            "calling",
            &[ToolCall {
                call_id: "c1".to_string(),
                name: "a".to_string(),
                args: json!({}),
            }],
        );
        assert_eq!(message.parts.len(), 2);
        assert_eq!(message.tool_calls().count(), 1);
    }
}
