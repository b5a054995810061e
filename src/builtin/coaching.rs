// SPDX-License-Identifier: MIT

//! Coaching workflow: intake -> planning -> check_in -> wrap_up

use crate::adk::error::LoadError;
use crate::adk::tool::{FnTool, Tool, ToolSet};
use crate::workflow::loader::WorkflowLoader;
use crate::workflow::types::WorkflowDefinition;
use futures::FutureExt;
use once_cell::sync::Lazy;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::error::Error;
use std::sync::Arc;

pub const WORKFLOW_ID: &str = "coaching";

const WORKFLOW_YAML: &str = include_str!("../../workflows/coaching.yaml");

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SetGoalArgs {
    /// What the user wants to achieve
    pub goal: String,
    /// Target date, free form
    #[serde(default)]
    pub deadline: Option<String>,
    /// True when replacing an earlier goal
    #[serde(default)]
    pub revise: bool,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct LogProgressArgs {
    /// What happened since the last check-in
    pub note: String,
    /// Estimated completion, 0 to 100
    pub percent: u8,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct EndSessionArgs {
    /// Two or three sentence recap of the session
    pub summary: String,
}

fn schema_of<T: JsonSchema>() -> Value {
    serde_json::to_value(schema_for!(T)).unwrap_or_else(|_| json!({ "type": "object" }))
}

static SET_GOAL_SCHEMA: Lazy<Value> = Lazy::new(schema_of::<SetGoalArgs>);
static LOG_PROGRESS_SCHEMA: Lazy<Value> = Lazy::new(schema_of::<LogProgressArgs>);
static END_SESSION_SCHEMA: Lazy<Value> = Lazy::new(schema_of::<EndSessionArgs>);

fn set_goal() -> FnTool {
    FnTool::new(
        "setGoal",
        "Records the user's goal, or replaces it when revise is true.",
        SET_GOAL_SCHEMA.clone(),
        |args| {
            async move {
                let args: SetGoalArgs = serde_json::from_value(args)?;
                if args.goal.trim().is_empty() {
                    return Err("goal must not be empty".into());
                }
                Ok::<_, Box<dyn Error + Send + Sync>>(json!({
                    "status": if args.revise { "revised" } else { "set" },
                    "goal": args.goal,
                    "deadline": args.deadline,
                }))
            }
            .boxed()
        },
    )
}

fn log_progress() -> FnTool {
    FnTool::new(
        "logProgress",
        "Logs progress toward the current goal.",
        LOG_PROGRESS_SCHEMA.clone(),
        |args| {
            async move {
                let args: LogProgressArgs = serde_json::from_value(args)?;
                if args.percent > 100 {
                    return Err(format!("percent must be at most 100, got {}", args.percent).into());
                }
                Ok::<_, Box<dyn Error + Send + Sync>>(json!({
                    "logged": true,
                    "percent": args.percent,
                    "note": args.note,
                }))
            }
            .boxed()
        },
    )
}

fn end_session() -> FnTool {
    FnTool::new(
        "endSession",
        "Closes the coaching session. Requires the user's approval.",
        END_SESSION_SCHEMA.clone(),
        |args| {
            async move {
                let args: EndSessionArgs = serde_json::from_value(args)?;
                Ok::<_, Box<dyn Error + Send + Sync>>(json!({
                    "closed": true,
                    "summary": args.summary,
                }))
            }
            .boxed()
        },
    )
    .with_approval()
}

pub fn definition() -> Result<WorkflowDefinition, LoadError> {
    WorkflowLoader::parse_yaml(WORKFLOW_YAML)
}

pub fn tools() -> ToolSet {
    let tools: Vec<Arc<dyn Tool>> = vec![
        Arc::new(set_goal()),
        Arc::new(log_progress()),
        Arc::new(end_session()),
    ];
    ToolSet::new(tools)
}
