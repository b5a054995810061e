// SPDX-License-Identifier: MIT

//! Reading rounds and approval state out of the append-only history
//!
//! A completed round is one assistant message, the tool message that
//! carries results for its calls, and every message since the previous
//! round (user text, approval decisions, approval resolutions). Messages
//! after the last completed round are the pending input of the next round.
//!
//! Calls after a gated call in the same round are held back: gated ones as
//! `PendingApproval`, the rest as `Deferred`. A round's unresolved calls
//! form one batch that is resolved strictly front to back.

use crate::adk::model::{Message, Part, Role, ToolCall, ToolOutput};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// One completed round
#[derive(Debug, Clone, Copy)]
pub struct Round<'a> {
    /// Zero-based position among completed rounds
    pub index: usize,
    /// Everything recorded before this round
    pub prior: &'a [Message],
    pub messages: &'a [Message],
    pub assistant: &'a Message,
}

impl Round<'_> {
    /// What the transition evaluator needs to know about this round
    pub fn outcome(&self) -> RoundOutcome {
        let tool_calls: Vec<ToolCall> = self.assistant.tool_calls().collect();
        let own_calls: HashSet<&str> = tool_calls.iter().map(|c| c.call_id.as_str()).collect();
        let mut awaiting = awaiting_approval(self.prior);

        let approvals = self
            .messages
            .iter()
            .flat_map(|m| m.parts.iter())
            .filter_map(|part| match part {
                Part::ToolResult {
                    call_id,
                    name,
                    output,
                    ..
                } if !own_calls.contains(call_id.as_str()) => {
                    let approved = match output {
                        ToolOutput::PendingApproval | ToolOutput::Deferred => return None,
                        ToolOutput::Denied { .. } => false,
                        ToolOutput::Success(_) | ToolOutput::Error(_) => true,
                    };
                    // Deferred calls run without a decision
                    if !awaiting.remove(call_id.as_str()) {
                        return None;
                    }
                    Some(ApprovalOutcome {
                        call_id: call_id.clone(),
                        tool: name.clone(),
                        approved,
                    })
                }
                _ => None,
            })
            .collect();

        RoundOutcome {
            text: self.assistant.text(),
            tool_calls,
            approvals,
        }
    }
}

/// Transient summary of one round
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoundOutcome {
    pub text: String,
    /// Calls the model emitted, in emission order
    pub tool_calls: Vec<ToolCall>,
    /// Pending calls from earlier rounds resolved in this round
    pub approvals: Vec<ApprovalOutcome>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalOutcome {
    pub call_id: String,
    pub tool: String,
    pub approved: bool,
}

/// A gated tool call awaiting a yes/no decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingApproval {
    pub call_id: String,
    pub tool_name: String,
    pub args: Value,
}

/// A call from an earlier round with no final outcome yet
#[derive(Debug, Clone, PartialEq)]
pub struct UnresolvedCall {
    pub call: ToolCall,
    /// False for `Deferred` calls, which wait only on the calls before them
    pub awaiting_approval: bool,
}

/// A decision found in the pending input
#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalDecision {
    pub call_id: String,
    pub approved: bool,
    pub reason: Option<String>,
}

/// Split `history` into completed rounds and the trailing pending input
pub fn split_rounds(history: &[Message]) -> (Vec<Round<'_>>, &[Message]) {
    let mut rounds = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < history.len() {
        if history[i].role != Role::Assistant {
            i += 1;
            continue;
        }

        let assistant = &history[i];
        let mut end = i + 1;
        if history
            .get(end)
            .is_some_and(|next| carries_results_for(next, assistant))
        {
            end += 1;
        }

        rounds.push(Round {
            index: rounds.len(),
            prior: &history[..start],
            messages: &history[start..end],
            assistant,
        });
        start = end;
        i = end;
    }

    (rounds, &history[start..])
}

fn carries_results_for(message: &Message, assistant: &Message) -> bool {
    if message.role != Role::Tool {
        return false;
    }
    let calls: HashSet<String> = assistant.tool_calls().map(|c| c.call_id).collect();
    message.parts.iter().any(|p| {
        matches!(p, Part::ToolResult { call_id, .. } if calls.contains(call_id))
    })
}

/// Number of completed rounds
pub fn completed_rounds(history: &[Message]) -> usize {
    split_rounds(history).0.len()
}

/// Call ids whose latest recorded outcome is `PendingApproval`
fn awaiting_approval(history: &[Message]) -> HashSet<&str> {
    let mut awaiting = HashSet::new();
    for part in history.iter().flat_map(|m| m.parts.iter()) {
        if let Part::ToolResult {
            call_id, output, ..
        } = part
        {
            if output.is_pending() {
                awaiting.insert(call_id.as_str());
            } else {
                awaiting.remove(call_id.as_str());
            }
        }
    }
    awaiting
}

/// Unresolved calls grouped by the round that emitted them.
///
/// Groups come in history order and keep emission order inside. The first
/// call of a group is the one blocking the rest.
pub fn unresolved_batches(history: &[Message]) -> Vec<Vec<UnresolvedCall>> {
    let mut order: Vec<(usize, &str)> = Vec::new();
    let mut latest: HashMap<&str, (&str, &Value, &ToolOutput)> = HashMap::new();

    for (index, message) in history.iter().enumerate() {
        for part in &message.parts {
            if let Part::ToolResult {
                call_id,
                name,
                args,
                output,
            } = part
            {
                if latest
                    .insert(call_id.as_str(), (name.as_str(), args, output))
                    .is_none()
                {
                    order.push((index, call_id.as_str()));
                }
            }
        }
    }

    let mut batches: Vec<(usize, Vec<UnresolvedCall>)> = Vec::new();
    for (batch, call_id) in order {
        let Some(&(name, args, output)) = latest.get(call_id) else {
            continue;
        };
        if !output.is_unresolved() {
            continue;
        }
        let entry = UnresolvedCall {
            call: ToolCall {
                call_id: call_id.to_string(),
                name: name.to_string(),
                args: args.clone(),
            },
            awaiting_approval: output.is_pending(),
        };
        match batches.last_mut() {
            Some((b, calls)) if *b == batch => calls.push(entry),
            _ => batches.push((batch, vec![entry])),
        }
    }

    batches.into_iter().map(|(_, calls)| calls).collect()
}

/// Calls whose latest recorded outcome is `PendingApproval`, in emission order
pub fn pending_approvals(history: &[Message]) -> Vec<PendingApproval> {
    unresolved_batches(history)
        .into_iter()
        .flatten()
        .filter(|c| c.awaiting_approval)
        .map(|c| PendingApproval {
            call_id: c.call.call_id,
            tool_name: c.call.name,
            args: c.call.args,
        })
        .collect()
}

/// Approval decisions carried by the pending input, in arrival order
pub fn approval_decisions(pending_input: &[Message]) -> Vec<ApprovalDecision> {
    pending_input
        .iter()
        .filter(|m| m.role == Role::User)
        .flat_map(|m| m.parts.iter())
        .filter_map(|part| match part {
            Part::ApprovalResponse {
                call_id,
                approved,
                reason,
            } => Some(ApprovalDecision {
                call_id: call_id.clone(),
                approved: *approved,
                reason: reason.clone(),
            }),
            _ => None,
        })
        .collect()
}
