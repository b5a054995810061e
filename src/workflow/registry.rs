// SPDX-License-Identifier: MIT

//! Workflow registry
//!
//! Maps workflow ids to a definition and the tools it may use. Every
//! definition is validated when it is registered, so authoring mistakes
//! fail at startup rather than in the middle of a conversation. The
//! process-wide instance is installed once and never mutated afterwards;
//! tests build their own instances.

use crate::adk::error::{AgentError, AuthoringError};
use crate::adk::model::ToolChoice;
use crate::adk::tool::ToolSet;
use crate::workflow::types::{StateMatcher, WorkflowDefinition, WILDCARD_STATE};
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::sync::Arc;

static GLOBAL: OnceCell<WorkflowRegistry> = OnceCell::new();

/// A registered workflow
#[derive(Clone, Debug)]
pub struct WorkflowEntry {
    pub definition: Arc<WorkflowDefinition>,
    pub tools: ToolSet,
}

#[derive(Clone, Debug, Default)]
pub struct WorkflowRegistry {
    workflows: HashMap<String, WorkflowEntry>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and add a workflow
    pub fn register(
        &mut self,
        id: impl Into<String>,
        definition: WorkflowDefinition,
        tools: ToolSet,
    ) -> Result<(), AuthoringError> {
        let id = id.into();
        if definition.id != id {
            return Err(AuthoringError::IdMismatch {
                registered: id,
                declared: definition.id,
            });
        }
        if self.workflows.contains_key(&id) {
            return Err(AuthoringError::DuplicateWorkflow(id));
        }
        validate(&definition, &tools)?;

        log::info!(
            "Registered workflow '{}' ({} states, {} transitions, {} tools)",
            id,
            definition.states.len(),
            definition.transitions.len(),
            tools.len()
        );
        self.workflows.insert(
            id,
            WorkflowEntry {
                definition: Arc::new(definition),
                tools,
            },
        );
        Ok(())
    }

    pub fn get_workflow(&self, id: &str) -> Result<&WorkflowEntry, AgentError> {
        self.workflows
            .get(id)
            .ok_or_else(|| AgentError::workflow_not_found(id))
    }

    pub fn is_valid_workflow(&self, id: &str) -> bool {
        self.workflows.contains_key(id)
    }

    /// Registered ids, sorted
    pub fn get_available_workflows(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.workflows.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

/// Install the process-wide registry. Returns the registry back if one
/// was already installed.
pub fn init_global(registry: WorkflowRegistry) -> Result<&'static WorkflowRegistry, WorkflowRegistry> {
    GLOBAL
        .try_insert(registry)
        .map_err(|(_, rejected)| rejected)
}

/// The process-wide registry, if installed
pub fn global() -> Option<&'static WorkflowRegistry> {
    GLOBAL.get()
}

/// Check a definition against itself and the tools it was given
pub fn validate(definition: &WorkflowDefinition, tools: &ToolSet) -> Result<(), AuthoringError> {
    let workflow = || definition.id.clone();

    if definition.states.is_empty() {
        return Err(AuthoringError::NoStates(workflow()));
    }
    if definition.states.contains_key(WILDCARD_STATE) {
        return Err(AuthoringError::ReservedStateName {
            workflow: workflow(),
            state: WILDCARD_STATE.to_string(),
        });
    }
    if !definition.states.contains_key(&definition.initial_state) {
        return Err(AuthoringError::UnknownInitialState {
            workflow: workflow(),
            state: definition.initial_state.clone(),
        });
    }
    if let Some(tool) = tools.first_duplicate() {
        return Err(AuthoringError::DuplicateTool {
            workflow: workflow(),
            tool: tool.to_string(),
        });
    }

    for (name, state) in &definition.states {
        for tool in &state.tools {
            if !tools.contains(tool) {
                return Err(AuthoringError::UnknownTool {
                    workflow: workflow(),
                    context: format!("state {}", name),
                    tool: tool.clone(),
                });
            }
        }
        if let ToolChoice::Tool(forced) = &state.tool_choice {
            if !state.tools.contains(forced) {
                return Err(AuthoringError::ForcedToolNotActive {
                    workflow: workflow(),
                    state: name.clone(),
                    tool: forced.clone(),
                });
            }
        }
    }

    for (index, transition) in definition.transitions.iter().enumerate() {
        if let StateMatcher::Named(from) = &transition.from {
            if !definition.states.contains_key(from) {
                return Err(AuthoringError::UndeclaredState {
                    workflow: workflow(),
                    index,
                    state: from.clone(),
                });
            }
        }
        if !definition.states.contains_key(&transition.to) {
            return Err(AuthoringError::UndeclaredState {
                workflow: workflow(),
                index,
                state: transition.to.clone(),
            });
        }
        if let Some(tool) = transition.trigger.tool() {
            if !tools.contains(tool) {
                return Err(AuthoringError::UnknownTool {
                    workflow: workflow(),
                    context: format!("transition #{}", index),
                    tool: tool.to_string(),
                });
            }
        }
    }

    Ok(())
}
