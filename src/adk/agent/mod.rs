// SPDX-License-Identifier: MIT

//! Agent module - the stateful workflow runtime
//!
//! - `StatefulAgent` - runs one round of a registered workflow per call
//! - `executor` - tool execution and the approval gate
//!
//! A round's outcome is returned as an `AgentResult`; the streaming entry
//! point additionally reports progress as `AgentEvent`s.

pub mod executor;
mod stateful;

pub use stateful::StatefulAgent;

use crate::adk::model::{GenerationConfig, Message, ToolCall, ToolOutput};
use crate::workflow::deriver::{TransitionRecord, WorkflowContext};
use crate::workflow::history::PendingApproval;
use executor::ExecutedCall;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AgentEvent {
    /// Text the model produced this round
    Text(String),
    ToolCall {
        call_id: String,
        name: String,
        args: Value,
    },
    ToolResult(ToolResultEntry),
    /// A gated call is waiting for a decision
    ApprovalRequested(PendingApproval),
    Transition(TransitionRecord),
    Finish {
        current_state: String,
        step_number: u32,
        is_complete: bool,
    },
    Error(String),
}

/// Optional event channel; sends are best effort
#[derive(Clone, Copy)]
pub struct EventSink<'a>(Option<&'a mpsc::Sender<AgentEvent>>);

impl<'a> EventSink<'a> {
    pub fn new(tx: &'a mpsc::Sender<AgentEvent>) -> Self {
        Self(Some(tx))
    }

    pub fn none() -> Self {
        Self(None)
    }

    pub async fn emit(&self, event: AgentEvent) {
        if let Some(tx) = self.0 {
            if let Err(e) = tx.send(event).await {
                log::debug!("Event receiver closed, dropping {:?}", e.0);
            }
        }
    }
}

/// Input of one `generate()` call
#[derive(Debug, Clone, Default)]
pub struct GenerateParams {
    pub workflow_id: String,
    /// Caller-owned history, including any approval decisions
    pub messages: Vec<Message>,
    /// Appended as a user message before the round runs
    pub prompt: Option<String>,
    pub config: Option<GenerationConfig>,
    pub cancel: Option<CancellationToken>,
}

impl GenerateParams {
    pub fn new(workflow_id: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            ..Default::default()
        }
    }

    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn with_config(mut self, config: GenerationConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// One entry of `AgentResult::tool_results`.
///
/// Exactly one of `result`, `error`, `pending_approval`, `deferred` or
/// `denied` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResultEntry {
    pub call_id: String,
    pub tool_name: String,
    pub args: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub pending_approval: bool,
    /// Held back behind an earlier call of the same round
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deferred: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub denied: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<ExecutedCall> for ToolResultEntry {
    fn from(executed: ExecutedCall) -> Self {
        let ExecutedCall { call, output } = executed;
        let mut entry = ToolResultEntry {
            call_id: call.call_id,
            tool_name: call.name,
            args: call.args,
            result: None,
            error: None,
            pending_approval: false,
            deferred: false,
            denied: false,
            reason: None,
        };
        match output {
            ToolOutput::Success(value) => entry.result = Some(value),
            ToolOutput::Error(message) => entry.error = Some(message),
            ToolOutput::PendingApproval => entry.pending_approval = true,
            ToolOutput::Deferred => entry.deferred = true,
            ToolOutput::Denied { reason } => {
                entry.denied = true;
                entry.reason = Some(reason);
            }
        }
        entry
    }
}

/// Outcome of one round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentResult {
    pub text: String,
    /// Calls the model emitted, in emission order
    pub tool_calls: Vec<ToolCall>,
    /// Approval resolutions first, then this round's calls, each group in
    /// emission order
    pub tool_results: Vec<ToolResultEntry>,
    pub context: WorkflowContext,
    pub is_complete: bool,
    /// Messages the round appended; the caller persists these
    pub response_messages: Vec<Message>,
}

impl AgentResult {
    /// Calls from this round that are waiting for a decision
    pub fn pending_approvals(&self) -> Vec<PendingApproval> {
        self.tool_results
            .iter()
            .filter(|r| r.pending_approval)
            .map(|r| PendingApproval {
                call_id: r.call_id.clone(),
                tool_name: r.tool_name.clone(),
                args: r.args.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn executed(output: ToolOutput) -> ExecutedCall {
        ExecutedCall {
            call: ToolCall {
                call_id: "c1".to_string(),
                name: "publish".to_string(),
                args: json!({"title": "t"}),
            },
            output,
        }
    }

    #[test]
    fn test_tool_result_entry_shapes() {
        let ok = serde_json::to_value(ToolResultEntry::from(executed(ToolOutput::Success(
            json!({"url": "u"}),
        ))))
        .unwrap();
        assert_eq!(
            ok,
            json!({"callId": "c1", "toolName": "publish", "args": {"title": "t"}, "result": {"url": "u"}})
        );

        let pending =
            serde_json::to_value(ToolResultEntry::from(executed(ToolOutput::PendingApproval)))
                .unwrap();
        assert_eq!(pending["pendingApproval"], true);
        assert!(pending.get("result").is_none());

        let denied = serde_json::to_value(ToolResultEntry::from(executed(ToolOutput::Denied {
            reason: "no".to_string(),
        })))
        .unwrap();
        assert_eq!(denied["denied"], true);
        assert_eq!(denied["reason"], "no");
        assert!(denied.get("pendingApproval").is_none());

        let deferred =
            serde_json::to_value(ToolResultEntry::from(executed(ToolOutput::Deferred))).unwrap();
        assert_eq!(deferred["deferred"], true);
        assert!(deferred.get("denied").is_none());
    }

    #[test]
    fn test_generate_params_builder() {
        let params = GenerateParams::new("research")
            .with_prompt("find sources")
            .with_messages(vec![Message::user("hi")]);
        assert_eq!(params.workflow_id, "research");
        assert_eq!(params.prompt.as_deref(), Some("find sources"));
        assert_eq!(params.messages.len(), 1);
        assert!(params.cancel.is_none());
    }

    #[tokio::test]
    async fn test_event_sink_without_channel_is_silent() {
        EventSink::none().emit(AgentEvent::Text("x".to_string())).await;

        let (tx, mut rx) = mpsc::channel(4);
        EventSink::new(&tx)
            .emit(AgentEvent::Error("boom".to_string()))
            .await;
        assert!(matches!(rx.recv().await, Some(AgentEvent::Error(e)) if e == "boom"));
    }

    #[tokio::test]
    async fn test_event_sink_survives_closed_receiver() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sink = EventSink::new(&tx);
        sink.emit(AgentEvent::Text("first".to_string())).await;
        sink.emit(AgentEvent::Text("second".to_string())).await;
        assert!(tx.is_closed());
    }
}
