// SPDX-License-Identifier: MIT

//! Transition evaluation
//!
//! Candidates are the transitions whose `from` names the current state,
//! followed by the wildcard (`any`) ones, each group in declaration order.
//! The first candidate whose trigger matches the round fires; at most one
//! transition fires per round.

use crate::workflow::history::RoundOutcome;
use crate::workflow::types::{StateMatcher, StateTransition, Trigger, WorkflowDefinition};

/// Transitions that could fire from `state`, in evaluation order
pub fn candidates<'a>(transitions: &'a [StateTransition], state: &str) -> Vec<&'a StateTransition> {
    let exact = transitions.iter().filter(|t| t.from.is_exact(state));
    let wildcard = transitions
        .iter()
        .filter(|t| matches!(t.from, StateMatcher::Any));
    exact.chain(wildcard).collect()
}

/// The transition that fires for `outcome` from `state`, if any
pub fn evaluate<'a>(
    definition: &'a WorkflowDefinition,
    state: &str,
    outcome: &RoundOutcome,
) -> Option<&'a StateTransition> {
    candidates(&definition.transitions, state)
        .into_iter()
        .find(|t| trigger_matches(&t.trigger, outcome))
}

pub fn trigger_matches(trigger: &Trigger, outcome: &RoundOutcome) -> bool {
    match trigger {
        Trigger::ToolInvoked { tool, when } => outcome.tool_calls.iter().any(|call| {
            call.name == *tool && when.as_ref().map_or(true, |p| p.matches(&call.args))
        }),
        Trigger::ToolApproved { tool } => outcome
            .approvals
            .iter()
            .any(|a| a.tool == *tool && a.approved),
        Trigger::ToolDenied { tool } => outcome
            .approvals
            .iter()
            .any(|a| a.tool == *tool && !a.approved),
        Trigger::TextMatches { pattern } => pattern.is_match(&outcome.text),
        Trigger::Always => true,
    }
}
