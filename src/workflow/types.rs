// SPDX-License-Identifier: MIT

//! Workflow definition types
//!
//! A definition is a static graph: named states with their prompt and tool
//! policy, an initial state, and transitions in declaration order. These
//! types deserialize straight from the workflow YAML files.

use crate::adk::error::ConditionError;
use crate::adk::model::ToolChoice;
use crate::workflow::condition::{self, Expression};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Name reserved for transitions that apply from every state
pub const WILDCARD_STATE: &str = "any";

/// Top-level workflow definition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowDefinition {
    pub id: String,
    #[serde(default)]
    pub description: String,
    pub initial_state: String,
    pub states: BTreeMap<String, StateConfig>,
    /// Declaration order is evaluation order
    #[serde(default)]
    pub transitions: Vec<StateTransition>,
}

impl WorkflowDefinition {
    pub fn state(&self, name: &str) -> Option<&StateConfig> {
        self.states.get(name)
    }

    pub fn is_terminal(&self, name: &str) -> bool {
        self.states.get(name).is_some_and(|s| s.terminal)
    }
}

/// Per-state configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct StateConfig {
    /// System prompt template; `{{workflow}}`, `{{state}}` and `{{step}}`
    /// are substituted per round
    #[serde(default)]
    pub prompt: String,
    /// Names of the tools offered to the model in this state
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub tool_choice: ToolChoice,
    #[serde(default)]
    pub terminal: bool,
}

impl StateConfig {
    pub fn render_prompt(&self, workflow: &str, state: &str, step: u32) -> String {
        self.prompt
            .replace("{{workflow}}", workflow)
            .replace("{{state}}", state)
            .replace("{{step}}", &step.to_string())
    }
}

/// A declared edge of the state graph
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateTransition {
    pub from: StateMatcher,
    #[serde(rename = "on")]
    pub trigger: Trigger,
    pub to: String,
}

impl StateTransition {
    pub fn new(from: impl Into<String>, trigger: Trigger, to: impl Into<String>) -> Self {
        Self {
            from: StateMatcher::from(from.into()),
            trigger,
            to: to.into(),
        }
    }
}

impl fmt::Display for StateTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} on {}", self.from, self.to, self.trigger)
    }
}

/// Source side of a transition: one state, or every state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StateMatcher {
    Any,
    Named(String),
}

impl StateMatcher {
    pub fn is_exact(&self, state: &str) -> bool {
        matches!(self, StateMatcher::Named(name) if name == state)
    }
}

impl From<String> for StateMatcher {
    fn from(s: String) -> Self {
        if s == WILDCARD_STATE {
            StateMatcher::Any
        } else {
            StateMatcher::Named(s)
        }
    }
}

impl From<StateMatcher> for String {
    fn from(m: StateMatcher) -> Self {
        match m {
            StateMatcher::Any => WILDCARD_STATE.to_string(),
            StateMatcher::Named(name) => name,
        }
    }
}

impl fmt::Display for StateMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateMatcher::Any => f.write_str(WILDCARD_STATE),
            StateMatcher::Named(name) => f.write_str(name),
        }
    }
}

/// Predicate over a round's outcome
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
    /// Any call to `tool` in the round, optionally filtered on its arguments
    ToolInvoked {
        tool: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        when: Option<ArgPredicate>,
    },
    /// A pending call to `tool` was approved in the round
    ToolApproved { tool: String },
    /// A pending call to `tool` was denied in the round
    ToolDenied { tool: String },
    /// The round's text matches `pattern`
    TextMatches { pattern: TextPattern },
    /// Matches unconditionally; declare last
    Always,
}

impl Trigger {
    pub fn tool_invoked(tool: impl Into<String>) -> Self {
        Trigger::ToolInvoked {
            tool: tool.into(),
            when: None,
        }
    }

    pub fn tool_approved(tool: impl Into<String>) -> Self {
        Trigger::ToolApproved { tool: tool.into() }
    }

    pub fn tool_denied(tool: impl Into<String>) -> Self {
        Trigger::ToolDenied { tool: tool.into() }
    }

    /// Tool name the trigger refers to, if any
    pub fn tool(&self) -> Option<&str> {
        match self {
            Trigger::ToolInvoked { tool, .. }
            | Trigger::ToolApproved { tool }
            | Trigger::ToolDenied { tool } => Some(tool),
            Trigger::TextMatches { .. } | Trigger::Always => None,
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::ToolInvoked { tool, when: None } => write!(f, "tool_invoked({})", tool),
            Trigger::ToolInvoked {
                tool,
                when: Some(pred),
            } => write!(f, "tool_invoked({} when {})", tool, pred),
            Trigger::ToolApproved { tool } => write!(f, "tool_approved({})", tool),
            Trigger::ToolDenied { tool } => write!(f, "tool_denied({})", tool),
            Trigger::TextMatches { pattern } => write!(f, "text_matches(/{}/)", pattern),
            Trigger::Always => f.write_str("always"),
        }
    }
}

/// Parsed argument predicate, kept with its source text
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArgPredicate {
    source: String,
    expr: Expression,
}

impl ArgPredicate {
    pub fn parse(source: &str) -> Result<Self, ConditionError> {
        Ok(Self {
            source: source.trim().to_string(),
            expr: condition::parse(source)?,
        })
    }

    pub fn matches(&self, args: &Value) -> bool {
        condition::evaluate(&self.expr, args)
    }
}

impl PartialEq for ArgPredicate {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl TryFrom<String> for ArgPredicate {
    type Error = ConditionError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<ArgPredicate> for String {
    fn from(p: ArgPredicate) -> Self {
        p.source
    }
}

impl fmt::Display for ArgPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Compiled regular expression for `text_matches`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TextPattern(Regex);

impl TextPattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(TextPattern)
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.0.is_match(text)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl PartialEq for TextPattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl TryFrom<String> for TextPattern {
    type Error = regex::Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(&s)
    }
}

impl From<TextPattern> for String {
    fn from(p: TextPattern) -> Self {
        p.0.as_str().to_string()
    }
}

impl fmt::Display for TextPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_state_matcher_wildcard() {
        assert_eq!(StateMatcher::from("any".to_string()), StateMatcher::Any);
        assert!(StateMatcher::from("draft".to_string()).is_exact("draft"));
        assert!(!StateMatcher::Any.is_exact("draft"));
    }

    #[test]
    fn test_trigger_deserialize_variants() {
        let yaml = r#"
- type: tool_invoked
  tool: submit_for_review
  when: "pages > 2"
- type: tool_approved
  tool: publish
- type: text_matches
  pattern: "(?i)done"
- type: always
"#;
        let triggers: Vec<Trigger> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(triggers.len(), 4);
        match &triggers[0] {
            Trigger::ToolInvoked {
                tool,
                when: Some(pred),
            } => {
                assert_eq!(tool, "submit_for_review");
                assert!(pred.matches(&json!({"pages": 3})));
                assert!(!pred.matches(&json!({"pages": 1})));
            }
            other => panic!("Expected ToolInvoked, got {:?}", other),
        }
        assert_eq!(triggers[1], Trigger::tool_approved("publish"));
        match &triggers[2] {
            Trigger::TextMatches { pattern } => assert!(pattern.is_match("All DONE.")),
            other => panic!("Expected TextMatches, got {:?}", other),
        }
        assert_eq!(triggers[3], Trigger::Always);
    }

    #[test]
    fn test_invalid_predicate_and_pattern_fail_to_deserialize() {
        let bad_pred = "type: tool_invoked\ntool: x\nwhen: \"pages >\"\n";
        assert!(serde_yaml::from_str::<Trigger>(bad_pred).is_err());

        let bad_regex = "type: text_matches\npattern: \"(unclosed\"\n";
        assert!(serde_yaml::from_str::<Trigger>(bad_regex).is_err());
    }

    #[test]
    fn test_transition_display() {
        let t = StateTransition::new("any", Trigger::tool_denied("publish"), "draft");
        assert_eq!(t.to_string(), "any -> draft on tool_denied(publish)");
    }

    #[test]
    fn test_render_prompt() {
        let cfg = StateConfig {
            prompt: "You are in {{state}} of {{workflow}} (round {{step}}).".to_string(),
            ..Default::default()
        };
        assert_eq!(
            cfg.render_prompt("research", "draft", 3),
            "You are in draft of research (round 3)."
        );
    }

    #[test]
    fn test_state_config_defaults() {
        let cfg: StateConfig = serde_yaml::from_str("prompt: hi").unwrap();
        assert_eq!(cfg.tool_choice, ToolChoice::Auto);
        assert!(cfg.tools.is_empty());
        assert!(!cfg.terminal);
    }
}
