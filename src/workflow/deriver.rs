// SPDX-License-Identifier: MIT

//! State derivation by replay
//!
//! The current state of a conversation is never stored. It is recomputed
//! from the definition and the caller's history every time it is needed:
//! start at the initial state, walk the completed rounds in order and apply
//! the transition each round fires.

use crate::adk::model::Message;
use crate::workflow::history::split_rounds;
use crate::workflow::transition;
use crate::workflow::types::{StateTransition, WorkflowDefinition};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Current position of a conversation in its workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedState {
    pub current_state: String,
    /// Completed rounds, whether or not a transition fired
    pub step_number: u32,
    pub is_complete: bool,
}

/// One fired transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRecord {
    pub from_state: String,
    pub to_state: String,
    pub triggered_by: String,
    /// Step number of the round that fired it
    pub at_step: u32,
}

impl fmt::Display for TransitionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "step {}: {} -> {} ({})",
            self.at_step, self.from_state, self.to_state, self.triggered_by
        )
    }
}

/// Derived state plus the transition log that led to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowContext {
    pub current_state: String,
    pub state_history: Vec<TransitionRecord>,
    pub step_number: u32,
    pub is_complete: bool,
}

impl WorkflowContext {
    pub fn state(&self) -> DerivedState {
        DerivedState {
            current_state: self.current_state.clone(),
            step_number: self.step_number,
            is_complete: self.is_complete,
        }
    }
}

/// Replay `history` against `definition`
pub fn derive_context(definition: &WorkflowDefinition, history: &[Message]) -> WorkflowContext {
    let mut current = definition.initial_state.clone();
    let mut is_complete = definition.is_terminal(&current);
    let mut step: u32 = 0;
    let mut state_history = Vec::new();

    let (rounds, _pending) = split_rounds(history);
    for round in rounds {
        step += 1;
        // Terminal states are absorbing
        if is_complete {
            continue;
        }

        let outcome = round.outcome();
        if let Some(fired) = transition::evaluate(definition, &current, &outcome) {
            log::debug!(
                "[{}] step {}: {} -> {} on {}",
                definition.id,
                step,
                current,
                fired.to,
                fired.trigger
            );
            state_history.push(TransitionRecord {
                from_state: current.clone(),
                to_state: fired.to.clone(),
                triggered_by: fired.trigger.to_string(),
                at_step: step,
            });
            current = fired.to.clone();
            is_complete = definition.is_terminal(&current);
        }
    }

    WorkflowContext {
        current_state: current,
        state_history,
        step_number: step,
        is_complete,
    }
}

/// Current state, step number and completion flag for `history`
pub fn derive_state(definition: &WorkflowDefinition, history: &[Message]) -> DerivedState {
    derive_context(definition, history).state()
}

/// Ordered log of every transition `history` fired
pub fn build_state_history(
    definition: &WorkflowDefinition,
    history: &[Message],
) -> Vec<TransitionRecord> {
    derive_context(definition, history).state_history
}

/// One line per transition, for display
pub fn format_state_history(records: &[TransitionRecord]) -> String {
    records
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Outgoing transitions of `state` in evaluation order
pub fn get_available_transitions<'a>(
    definition: &'a WorkflowDefinition,
    state: &str,
) -> Vec<&'a StateTransition> {
    transition::candidates(&definition.transitions, state)
}
