// SPDX-License-Identifier: MIT

//! Tool executor and approval gate
//!
//! Calls run one at a time in emission order. A call to a gated tool is not
//! executed: it is recorded as `PendingApproval` and stays that way in the
//! caller's history until a decision for its call id arrives. Calls after it
//! in the same round wait too, so a later call never runs before an earlier
//! one is resolved.

use super::{AgentEvent, EventSink};
use crate::adk::error::AgentError;
use crate::adk::model::{Message, Part, Role, ToolCall, ToolOutput};
use crate::adk::tool::{Tool, ToolSet};
use crate::workflow::history::{split_rounds, unresolved_batches, ApprovalDecision, PendingApproval};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Reason recorded when a denial carries none
pub const DEFAULT_DENIAL_REASON: &str = "Denied by user";

/// A call together with what happened to it
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedCall {
    pub call: ToolCall,
    pub output: ToolOutput,
}

impl ExecutedCall {
    pub fn to_part(&self) -> Part {
        Part::ToolResult {
            call_id: self.call.call_id.clone(),
            name: self.call.name.clone(),
            args: self.call.args.clone(),
            output: self.output.clone(),
        }
    }
}

/// Tool-role message carrying `executed`, if there is anything to carry
pub fn results_message(executed: &[ExecutedCall]) -> Option<Message> {
    if executed.is_empty() {
        return None;
    }
    Some(Message {
        role: Role::Tool,
        parts: executed.iter().map(ExecutedCall::to_part).collect(),
    })
}

/// Decisions recorded for calls that are still waiting for one.
///
/// Decisions in the pending input are checked: each must name a call whose
/// latest result is `PendingApproval` at that point, and no call may have
/// two open decisions. A decision followed by a result for its call has
/// been applied and is dropped. Open decisions from earlier rounds carry
/// forward until the calls ahead of theirs are resolved.
pub fn open_decisions(history: &[Message]) -> Result<HashMap<String, ApprovalDecision>, AgentError> {
    let pending_from = history.len() - split_rounds(history).1.len();
    let mut latest: HashMap<&str, &ToolOutput> = HashMap::new();
    let mut open: HashMap<String, ApprovalDecision> = HashMap::new();

    for (index, message) in history.iter().enumerate() {
        for part in &message.parts {
            match part {
                Part::ToolResult {
                    call_id, output, ..
                } => {
                    latest.insert(call_id.as_str(), output);
                    if !output.is_unresolved() {
                        open.remove(call_id.as_str());
                    }
                }
                Part::ApprovalResponse {
                    call_id,
                    approved,
                    reason,
                } if message.role == Role::User => {
                    let awaiting = latest.get(call_id.as_str()).is_some_and(|o| o.is_pending());
                    if !awaiting || open.contains_key(call_id) {
                        if index >= pending_from {
                            log::error!(
                                "Approval decision for {} does not match a pending call",
                                call_id
                            );
                            return Err(AgentError::approval_missing(call_id));
                        }
                        continue;
                    }
                    open.insert(
                        call_id.clone(),
                        ApprovalDecision {
                            call_id: call_id.clone(),
                            approved: *approved,
                            reason: reason.clone(),
                        },
                    );
                }
                _ => {}
            }
        }
    }

    Ok(open)
}

/// Runs tools for one round
pub struct ToolExecutor<'a> {
    /// Every tool the workflow owns; held-back calls resolve against these
    tools: &'a ToolSet,
    /// Tools offered in the current state
    active: HashSet<&'a str>,
}

impl<'a> ToolExecutor<'a> {
    pub fn new(tools: &'a ToolSet, active: &'a [String]) -> Self {
        Self {
            tools,
            active: active.iter().map(String::as_str).collect(),
        }
    }

    /// Gate and execute the calls the model emitted this round.
    ///
    /// Once a call is parked for approval, every later call is parked as
    /// well: gated ones as `PendingApproval`, the others as `Deferred`.
    /// Calls to unavailable tools still fail immediately since nothing runs.
    pub async fn run_calls(&self, calls: &[ToolCall], events: &EventSink<'_>) -> Vec<ExecutedCall> {
        let mut executed = Vec::with_capacity(calls.len());
        let mut blocked = false;

        for call in calls {
            events
                .emit(AgentEvent::ToolCall {
                    call_id: call.call_id.clone(),
                    name: call.name.clone(),
                    args: call.args.clone(),
                })
                .await;

            let tool = self
                .tools
                .get(&call.name)
                .filter(|_| self.active.contains(call.name.as_str()));

            let output = match tool {
                Some(t) if t.needs_approval() => {
                    log::info!(
                        "Tool {} ({}) requires approval; not executed",
                        call.name,
                        call.call_id
                    );
                    blocked = true;
                    events
                        .emit(AgentEvent::ApprovalRequested(PendingApproval {
                            call_id: call.call_id.clone(),
                            tool_name: call.name.clone(),
                            args: call.args.clone(),
                        }))
                        .await;
                    ToolOutput::PendingApproval
                }
                Some(_) if blocked => {
                    log::info!(
                        "Tool {} ({}) deferred behind an earlier pending call",
                        call.name,
                        call.call_id
                    );
                    ToolOutput::Deferred
                }
                other => execute(other, call).await,
            };

            let done = ExecutedCall {
                call: call.clone(),
                output,
            };
            events.emit(AgentEvent::ToolResult(done.clone().into())).await;
            executed.push(done);
        }

        executed
    }

    /// Resolve held-back calls from earlier rounds.
    ///
    /// Each round's unresolved calls are walked front to back. An approved
    /// call executes, a denied one records `Denied`, a deferred one executes
    /// once everything before it is resolved. The walk stops at the first
    /// call still waiting for a decision; decisions for calls behind it stay
    /// open in the history. Invalid decisions fail the round before anything
    /// runs.
    pub async fn resolve_approvals(
        &self,
        history: &[Message],
        events: &EventSink<'_>,
    ) -> Result<Vec<ExecutedCall>, AgentError> {
        let decisions = open_decisions(history)?;
        let mut resolved = Vec::new();

        for batch in unresolved_batches(history) {
            for held in batch {
                let call = held.call;
                let output = if !held.awaiting_approval {
                    log::info!("Running deferred call {} ({})", call.name, call.call_id);
                    execute(self.tools.get(&call.name), &call).await
                } else {
                    let Some(decision) = decisions.get(&call.call_id) else {
                        log::debug!("Call {} still awaits a decision", call.call_id);
                        break;
                    };
                    if decision.approved {
                        log::info!("Approval granted for {} ({})", call.name, call.call_id);
                        execute(self.tools.get(&call.name), &call).await
                    } else {
                        let reason = decision
                            .reason
                            .clone()
                            .unwrap_or_else(|| DEFAULT_DENIAL_REASON.to_string());
                        log::info!(
                            "Approval denied for {} ({}): {}",
                            call.name,
                            call.call_id,
                            reason
                        );
                        ToolOutput::Denied { reason }
                    }
                };

                let done = ExecutedCall { call, output };
                events.emit(AgentEvent::ToolResult(done.clone().into())).await;
                resolved.push(done);
            }
        }

        Ok(resolved)
    }
}

/// Run one tool, converting every failure into an error output
async fn execute(tool: Option<&Arc<dyn Tool>>, call: &ToolCall) -> ToolOutput {
    log::info!("Tool call: {} {:?}", call.name, call.args);

    let Some(tool) = tool else {
        log::error!("Tool {} not found", call.name);
        return ToolOutput::Error(format!("Tool {} not found", call.name));
    };

    match tool.execute(call.args.clone()).await {
        Ok(value) => {
            log::info!(
                "Tool {} response: {}",
                call.name,
                serde_json::to_string(&value).unwrap_or_default()
            );
            ToolOutput::Success(value)
        }
        Err(e) => {
            log::error!("Tool {} failed: {}", call.name, e);
            ToolOutput::Error(e.to_string())
        }
    }
}
