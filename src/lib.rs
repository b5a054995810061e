// SPDX-License-Identifier: MIT

//! Stateful agent orchestration.
//!
//! Drives a multi-turn, tool-calling conversation through a declared
//! workflow. The current workflow state is never stored: it is replayed
//! from the caller-owned history on every call.

pub mod adk;
pub mod builtin;
pub mod workflow;

pub use adk::agent::{AgentResult, GenerateParams, StatefulAgent};
pub use adk::error::{AgentError, AuthoringError};
pub use workflow::deriver::{build_state_history, derive_state, get_available_transitions};
pub use workflow::registry::WorkflowRegistry;
