// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;

/// Trait for tools that can be called by agents.
///
/// # Optimization Notes
/// - `name()` and `description()` return `&str` to avoid allocation on every call
/// - `schema()` returns `&Value` to avoid cloning the schema on every access
/// - Implementations should store these values in struct fields
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the tool name (must be unique within a workflow's tool set)
    fn name(&self) -> &str;

    /// Returns a human-readable description of what the tool does
    fn description(&self) -> &str;

    /// Returns the JSON schema for the tool's input parameters
    fn schema(&self) -> &Value;

    /// Whether a call must be confirmed by a human before it executes
    fn needs_approval(&self) -> bool {
        false
    }

    /// Execute the tool with the given input and return the result
    async fn execute(&self, input: Value) -> Result<Value, Box<dyn Error + Send + Sync>>;
}

type ToolFn =
    dyn Fn(Value) -> BoxFuture<'static, Result<Value, Box<dyn Error + Send + Sync>>> + Send + Sync;

/// A tool backed by an async closure
pub struct FnTool {
    name: String,
    description: String,
    schema: Value,
    needs_approval: bool,
    handler: Box<ToolFn>,
}

impl FnTool {
    pub fn new<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: Value,
        handler: F,
    ) -> Self
    where
        F: Fn(Value) -> BoxFuture<'static, Result<Value, Box<dyn Error + Send + Sync>>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            schema,
            needs_approval: false,
            handler: Box::new(handler),
        }
    }

    /// Gate every call behind an approval decision
    pub fn with_approval(mut self) -> Self {
        self.needs_approval = true;
        self
    }
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn schema(&self) -> &Value {
        &self.schema
    }

    fn needs_approval(&self) -> bool {
        self.needs_approval
    }

    async fn execute(&self, input: Value) -> Result<Value, Box<dyn Error + Send + Sync>> {
        (self.handler)(input).await
    }
}

/// The tools a workflow may use, in registration order
#[derive(Clone, Default)]
pub struct ToolSet {
    tools: Vec<Arc<dyn Tool>>,
    /// HashMap for O(1) tool lookups
    index: HashMap<String, usize>,
}

impl ToolSet {
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> Self {
        let index = tools
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name().to_string(), i))
            .collect();
        Self { tools, index }
    }

    /// O(1) tool lookup by name
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Name of the first tool that shares its name with an earlier one
    pub fn first_duplicate(&self) -> Option<&str> {
        if self.index.len() == self.tools.len() {
            return None;
        }
        self.tools
            .iter()
            .enumerate()
            .find(|(i, t)| self.index.get(t.name()) != Some(i))
            .map(|(_, t)| t.name())
    }

    /// Tools whose names appear in `names`, in the order given
    pub fn subset(&self, names: &[String]) -> Vec<Arc<dyn Tool>> {
        names
            .iter()
            .filter_map(|name| self.get(name).cloned())
            .collect()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.iter().map(|t| t.name())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
