// SPDX-License-Identifier: MIT

//! Research workflow: draft -> reviewing -> complete
//!
//! `searchSources` queries the Brave Search API, `submitForReview` hands
//! the draft over, and `publish` is gated behind human approval.

use crate::adk::error::LoadError;
use crate::adk::tool::{FnTool, Tool, ToolSet};
use crate::workflow::loader::WorkflowLoader;
use crate::workflow::types::WorkflowDefinition;
use async_trait::async_trait;
use futures::FutureExt;
use once_cell::sync::Lazy;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::env;
use std::error::Error;
use std::sync::Arc;

pub const WORKFLOW_ID: &str = "research";

const WORKFLOW_YAML: &str = include_str!("../../workflows/research.yaml");

const BRAVE_SEARCH_URL: &str = "https://api.search.brave.com/res/v1/web/search";

// --- Static schemas ---

static SEARCH_SOURCES_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "query": {
                "type": "string",
                "description": "The search query"
            },
            "count": {
                "type": "integer",
                "description": "Number of results to return (default 5, max 20)"
            },
            "freshness": {
                "type": "string",
                "description": "Freshness filter: pd (past day), pw (past week), pm (past month), py (past year)"
            }
        },
        "required": ["query"]
    })
});

static SUBMIT_FOR_REVIEW_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "summary": {
                "type": "string",
                "description": "Short summary of the draft"
            },
            "sources": {
                "type": "array",
                "items": { "type": "string" },
                "description": "URLs of the sources the draft cites"
            }
        },
        "required": ["summary"]
    })
});

static PUBLISH_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "title": { "type": "string" },
            "body": { "type": "string", "description": "Final text to publish" }
        },
        "required": ["title", "body"]
    })
});

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchSourcesArgs {
    pub query: String,
    #[serde(default)]
    pub count: Option<u32>,
    #[serde(default)]
    pub freshness: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub url: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchSourcesResult {
    pub sources: Vec<Source>,
    pub query: String,
}

/// Web search over the Brave Search API
pub struct SearchSourcesTool {
    client: Client,
    /// Checked when the tool runs, so a missing key fails the call and not startup
    api_key: Option<String>,
}

impl SearchSourcesTool {
    pub fn from_env() -> Self {
        Self::with_api_key(env::var("BRAVE_API_KEY").ok())
    }

    pub fn with_api_key(api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
        }
    }
}

#[async_trait]
impl Tool for SearchSourcesTool {
    fn name(&self) -> &str {
        "searchSources"
    }

    fn description(&self) -> &str {
        "Searches the web for sources using the Brave Search API. Returns titles, URLs, and descriptions."
    }

    fn schema(&self) -> &Value {
        &SEARCH_SOURCES_SCHEMA
    }

    async fn execute(&self, input: Value) -> Result<Value, Box<dyn Error + Send + Sync>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or("BRAVE_API_KEY must be set")?;
        let args: SearchSourcesArgs = serde_json::from_value(input)?;

        let count = args.count.unwrap_or(5).min(20);

        let mut url = reqwest::Url::parse(BRAVE_SEARCH_URL)?;
        url.query_pairs_mut()
            .append_pair("q", &args.query)
            .append_pair("count", &count.to_string());

        if let Some(freshness) = &args.freshness {
            url.query_pairs_mut().append_pair("freshness", freshness);
        }

        let resp = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .header("X-Subscription-Token", api_key)
            .send()
            .await?;

        if !resp.status().is_success() {
            let text = resp.text().await?;
            return Err(format!("Brave API error: {}", text).into());
        }

        let body: Value = resp.json().await?;
        let results_json = body
            .get("web")
            .and_then(|w| w.get("results"))
            .ok_or("Invalid response format: missing web.results")?;

        let sources: Vec<Source> = serde_json::from_value(results_json.clone())?;
        log::debug!("searchSources '{}' returned {} sources", args.query, sources.len());

        Ok(serde_json::to_value(SearchSourcesResult {
            sources,
            query: args.query,
        })?)
    }
}

fn submit_for_review() -> FnTool {
    FnTool::new(
        "submitForReview",
        "Submits the current draft for review.",
        SUBMIT_FOR_REVIEW_SCHEMA.clone(),
        |args| {
            async move {
                let summary = args
                    .get("summary")
                    .and_then(Value::as_str)
                    .ok_or("summary is required")?;
                let sources = args
                    .get("sources")
                    .and_then(Value::as_array)
                    .map_or(0, Vec::len);
                Ok::<_, Box<dyn Error + Send + Sync>>(json!({
                    "status": "submitted",
                    "summary": summary,
                    "sourceCount": sources,
                }))
            }
            .boxed()
        },
    )
}

fn publish() -> FnTool {
    FnTool::new(
        "publish",
        "Publishes the final research text. Requires human approval.",
        PUBLISH_SCHEMA.clone(),
        |args| {
            async move {
                let title = args
                    .get("title")
                    .and_then(Value::as_str)
                    .ok_or("title is required")?;
                Ok::<_, Box<dyn Error + Send + Sync>>(json!({
                    "published": true,
                    "title": title,
                    "slug": slugify(title),
                }))
            }
            .boxed()
        },
    )
    .with_approval()
}

fn slugify(title: &str) -> String {
    title
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

pub fn definition() -> Result<WorkflowDefinition, LoadError> {
    WorkflowLoader::parse_yaml(WORKFLOW_YAML)
}

pub fn tools() -> ToolSet {
    let tools: Vec<Arc<dyn Tool>> = vec![
        Arc::new(SearchSourcesTool::from_env()),
        Arc::new(submit_for_review()),
        Arc::new(publish()),
    ];
    ToolSet::new(tools)
}
