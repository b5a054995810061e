// SPDX-License-Identifier: MIT

//! Workflow loader - YAML file loading and parsing
//!
//! Parsing checks shape only: argument predicates and text patterns are
//! compiled here, while cross references (states, tools) are checked when
//! the definition is registered.

use super::types::WorkflowDefinition;
use crate::adk::error::LoadError;
use std::fs;
use std::path::Path;

/// Loads workflow definitions from YAML files
pub struct WorkflowLoader;

impl WorkflowLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load a workflow definition from a YAML file
    pub fn load_workflow<P: AsRef<Path>>(&self, path: P) -> Result<WorkflowDefinition, LoadError> {
        let path = path.as_ref();
        log::debug!("Loading workflow from {}", path.display());
        let content = fs::read_to_string(path)?;
        Self::parse_yaml(&content)
    }

    /// Parse a workflow definition from a YAML string
    pub fn parse_yaml(content: &str) -> Result<WorkflowDefinition, LoadError> {
        let def: WorkflowDefinition = serde_yaml::from_str(content)?;
        Ok(def)
    }
}

impl Default for WorkflowLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::model::ToolChoice;
    use crate::workflow::types::{StateMatcher, Trigger};

    #[test]
    fn test_parse_workflow() {
        let yaml = r#"
id: review
description: "A test workflow"
initial_state: draft

states:
  draft:
    prompt: "You are drafting for {{workflow}}."
    tools: [submit]
  reviewing:
    prompt: "Review the draft."
    tools: [publish]
    tool_choice: required
  done:
    terminal: true

transitions:
  - from: draft
    on: { type: tool_invoked, tool: submit }
    to: reviewing
  - from: reviewing
    on: { type: tool_approved, tool: publish }
    to: done
"#;
        let def = WorkflowLoader::parse_yaml(yaml).unwrap();
        assert_eq!(def.id, "review");
        assert_eq!(def.initial_state, "draft");
        assert_eq!(def.states.len(), 3);
        assert_eq!(def.states["reviewing"].tool_choice, ToolChoice::Required);
        assert!(def.states["done"].terminal);
        assert_eq!(def.transitions.len(), 2);
        assert_eq!(def.transitions[0].to, "reviewing");
        assert_eq!(def.transitions[1].trigger, Trigger::tool_approved("publish"));
    }

    #[test]
    fn test_parse_wildcard_and_predicate() {
        let yaml = r#"
id: wild
initial_state: a
states:
  a: {}
  b: {}
transitions:
  - from: any
    on:
      type: tool_invoked
      tool: restart
      when: "reason == 'user asked' and not force == true"
    to: a
  - from: a
    on: { type: always }
    to: b
"#;
        let def = WorkflowLoader::parse_yaml(yaml).unwrap();
        assert_eq!(def.transitions[0].from, StateMatcher::Any);
        assert_eq!(def.transitions[1].from, StateMatcher::Named("a".to_string()));
        assert!(def.description.is_empty());
    }

    #[test]
    fn test_transition_order_is_preserved() {
        let yaml = r#"
id: order
initial_state: a
states: { a: {}, b: {}, c: {} }
transitions:
  - { from: a, on: { type: always }, to: c }
  - { from: a, on: { type: always }, to: b }
"#;
        let def = WorkflowLoader::parse_yaml(yaml).unwrap();
        let targets: Vec<&str> = def.transitions.iter().map(|t| t.to.as_str()).collect();
        assert_eq!(targets, vec!["c", "b"]);
    }

    #[test]
    fn test_invalid_predicate_returns_error() {
        let yaml = r#"
id: bad
initial_state: a
states: { a: {} }
transitions:
  - from: a
    on: { type: tool_invoked, tool: x, when: "x ==" }
    to: a
"#;
        assert!(matches!(
            WorkflowLoader::parse_yaml(yaml),
            Err(LoadError::Yaml(_))
        ));
    }

    #[test]
    fn test_invalid_yaml_returns_error() {
        let yaml = r#"
id:
  - invalid structure
"#;
        let result = WorkflowLoader::parse_yaml(yaml);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = WorkflowLoader::new().load_workflow("/nonexistent/workflow.yaml");
        assert!(matches!(result, Err(LoadError::Io(_))));
    }
}
