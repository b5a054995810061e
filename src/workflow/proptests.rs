// SPDX-License-Identifier: MIT

//! Property-based tests for state derivation

use crate::adk::model::{Message, Part, Role, ToolOutput};
use crate::workflow::deriver::{build_state_history, derive_state, format_state_history};
use crate::workflow::history::completed_rounds;
use crate::workflow::types::{StateConfig, StateTransition, Trigger, WorkflowDefinition};
use proptest::prelude::*;
use serde_json::json;
use std::collections::BTreeMap;

// ============================================================================
// Fixtures
// ============================================================================

fn workflow() -> WorkflowDefinition {
    let mut states = BTreeMap::new();
    for name in ["start", "middle", "review"] {
        states.insert(name.to_string(), StateConfig::default());
    }
    states.insert(
        "done".to_string(),
        StateConfig {
            terminal: true,
            ..Default::default()
        },
    );
    WorkflowDefinition {
        id: "prop".to_string(),
        description: String::new(),
        initial_state: "start".to_string(),
        states,
        transitions: vec![
            StateTransition::new("start", Trigger::tool_invoked("advance"), "middle"),
            StateTransition::new("middle", Trigger::tool_invoked("gate"), "review"),
            StateTransition::new("review", Trigger::tool_approved("gate"), "done"),
            StateTransition::new("review", Trigger::tool_denied("gate"), "middle"),
            StateTransition::new("any", Trigger::tool_invoked("reset"), "start"),
        ],
    }
}

/// One generated round: an optional user line, the assistant's calls, and
/// whether to resolve the previous round's pending call
#[derive(Debug, Clone)]
struct RoundSpec {
    user_text: Option<String>,
    calls: Vec<&'static str>,
    decision: Option<bool>,
}

fn arb_round() -> impl Strategy<Value = RoundSpec> {
    (
        proptest::option::of("[a-z ]{1,12}"),
        proptest::collection::vec(
            prop_oneof![Just("advance"), Just("gate"), Just("reset"), Just("noop")],
            0..3,
        ),
        proptest::option::of(any::<bool>()),
    )
        .prop_map(|(user_text, calls, decision)| RoundSpec {
            user_text,
            calls,
            decision,
        })
}

fn arb_history() -> impl Strategy<Value = (Vec<Message>, usize)> {
    proptest::collection::vec(arb_round(), 0..12).prop_map(|rounds| {
        let count = rounds.len();
        (build_history(rounds), count)
    })
}

fn build_history(rounds: Vec<RoundSpec>) -> Vec<Message> {
    let mut history = Vec::new();
    let mut pending: Vec<String> = Vec::new();
    let mut next_id = 0;

    for round in rounds {
        if let Some(text) = round.user_text {
            history.push(Message::user(text));
        }
        if let Some(approved) = round.decision {
            let resolved: Vec<Part> = pending
                .drain(..)
                .map(|call_id| {
                    history.push(Message::approval(call_id.clone(), approved, None));
                    Part::ToolResult {
                        call_id,
                        name: "gate".to_string(),
                        args: json!({}),
                        output: if approved {
                            ToolOutput::Success(json!("ok"))
                        } else {
                            ToolOutput::Denied {
                                reason: "no".to_string(),
                            }
                        },
                    }
                })
                .collect();
            if !resolved.is_empty() {
                history.push(Message {
                    role: Role::Tool,
                    parts: resolved,
                });
            }
        }

        let mut calls = Vec::new();
        let mut results = Vec::new();
        for name in round.calls {
            next_id += 1;
            let call_id = format!("call-{}", next_id);
            calls.push(Part::ToolCall {
                call_id: call_id.clone(),
                name: name.to_string(),
                args: json!({}),
            });
            let output = if name == "gate" {
                pending.push(call_id.clone());
                ToolOutput::PendingApproval
            } else {
                ToolOutput::Success(json!(null))
            };
            results.push(Part::ToolResult {
                call_id,
                name: name.to_string(),
                args: json!({}),
                output,
            });
        }

        let mut parts = vec![Part::Text {
            text: "ok".to_string(),
        }];
        parts.extend(calls);
        history.push(Message {
            role: Role::Assistant,
            parts,
        });
        if !results.is_empty() {
            history.push(Message {
                role: Role::Tool,
                parts: results,
            });
        }
    }

    history
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_derivation_is_deterministic((history, _) in arb_history()) {
        let def = workflow();
        prop_assert_eq!(derive_state(&def, &history), derive_state(&def, &history));
        let first = format_state_history(&build_state_history(&def, &history));
        let second = format_state_history(&build_state_history(&def, &history));
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_step_number_counts_rounds((history, rounds) in arb_history()) {
        let state = derive_state(&workflow(), &history);
        prop_assert_eq!(state.step_number as usize, rounds);
        prop_assert_eq!(completed_rounds(&history), rounds);
    }

    #[test]
    fn prop_completion_is_monotonic((history, _) in arb_history()) {
        let def = workflow();
        let mut seen_complete = false;
        for k in 0..=history.len() {
            let state = derive_state(&def, &history[..k]);
            if seen_complete {
                prop_assert!(state.is_complete, "completion lost at prefix {}", k);
                prop_assert_eq!(state.current_state.as_str(), "done");
            }
            seen_complete |= state.is_complete;
        }
    }

    #[test]
    fn prop_transition_log_replays_to_current_state((history, _) in arb_history()) {
        let def = workflow();
        let log = build_state_history(&def, &history);
        let state = derive_state(&def, &history);
        let mut current = def.initial_state.clone();
        for record in &log {
            prop_assert_eq!(&record.from_state, &current);
            prop_assert!(record.at_step <= state.step_number);
            current = record.to_state.clone();
        }
        prop_assert_eq!(current, state.current_state);
    }
}
