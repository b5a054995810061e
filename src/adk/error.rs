// SPDX-License-Identifier: MIT

//! Typed error handling for stateful-agent
//!
//! `AgentError` is what `generate()` surfaces to the caller. Tool failures
//! never appear here: they are downgraded into tool-result entries.

use crate::adk::model::Message;
use std::time::Duration;
use thiserror::Error;

/// Top-level error type returned by the runtime
#[derive(Debug, Error)]
pub enum AgentError {
    /// Unknown workflow id requested from a registry
    #[error("Workflow '{id}' not found")]
    WorkflowNotFound { id: String },

    /// Upstream model call failed; the round was aborted.
    ///
    /// `resolved` holds approval resolutions that already executed before
    /// the call; append them to the history before retrying.
    #[error("Model provider error: {source}")]
    ModelProvider {
        #[source]
        source: ModelError,
        resolved: Vec<Message>,
    },

    /// An approval decision references a call that is not pending
    #[error("Approval decision references call '{call_id}' which is not pending approval")]
    ApprovalRequiredButMissing { call_id: String },

    /// The caller's cancellation signal fired; `resolved` as for `ModelProvider`
    #[error("Generation canceled")]
    Canceled { resolved: Vec<Message> },

    /// Derived state is not declared by the definition
    #[error("State '{state}' is not declared by workflow '{workflow}'")]
    UnknownState { workflow: String, state: String },

    /// Definition failed validation
    #[error(transparent)]
    Authoring(#[from] AuthoringError),
}

impl AgentError {
    pub fn workflow_not_found(id: impl Into<String>) -> Self {
        Self::WorkflowNotFound { id: id.into() }
    }

    pub fn approval_missing(call_id: impl Into<String>) -> Self {
        Self::ApprovalRequiredButMissing {
            call_id: call_id.into(),
        }
    }

    /// Messages the caller must persist even though the round failed
    pub fn resolved_messages(&self) -> &[Message] {
        match self {
            Self::ModelProvider { resolved, .. } | Self::Canceled { resolved } => resolved,
            _ => &[],
        }
    }
}

impl From<ModelError> for AgentError {
    fn from(source: ModelError) -> Self {
        Self::ModelProvider {
            source,
            resolved: Vec::new(),
        }
    }
}

/// Workflow authoring errors, detected when a definition is registered
#[derive(Debug, Error, PartialEq)]
pub enum AuthoringError {
    /// Registration id does not match the definition id
    #[error("Workflow registered as '{registered}' but declares id '{declared}'")]
    IdMismatch { registered: String, declared: String },

    /// Two definitions registered under one id
    #[error("Workflow '{0}' is already registered")]
    DuplicateWorkflow(String),

    /// Definition has no states
    #[error("Workflow '{0}' declares no states")]
    NoStates(String),

    /// Initial state is not among the declared states
    #[error("Workflow '{workflow}': initial state '{state}' is not declared")]
    UnknownInitialState { workflow: String, state: String },

    /// A transition references a state that is not declared
    #[error("Workflow '{workflow}': transition #{index} references undeclared state '{state}'")]
    UndeclaredState {
        workflow: String,
        index: usize,
        state: String,
    },

    /// A state uses the wildcard name
    #[error("Workflow '{workflow}': '{state}' is reserved for wildcard transitions")]
    ReservedStateName { workflow: String, state: String },

    /// A state or trigger references a tool missing from the tool set
    #[error("Workflow '{workflow}': tool '{tool}' referenced by '{context}' is not provided")]
    UnknownTool {
        workflow: String,
        context: String,
        tool: String,
    },

    /// Two tools share a name
    #[error("Workflow '{workflow}': duplicate tool '{tool}'")]
    DuplicateTool { workflow: String, tool: String },

    /// A forced tool choice names a tool outside the state's tool subset
    #[error("Workflow '{workflow}': state '{state}' forces tool '{tool}' which it does not expose")]
    ForcedToolNotActive {
        workflow: String,
        state: String,
        tool: String,
    },
}

/// Model/LLM-specific errors
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct ModelError {
    pub kind: ModelErrorKind,
    pub message: String,
    pub retry_after: Option<Duration>,
}

impl ModelError {
    pub fn new(kind: ModelErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn with_retry_after(mut self, duration: Duration) -> Self {
        self.retry_after = Some(duration);
        self
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ModelErrorKind::Network, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(ModelErrorKind::Auth, message)
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ModelErrorKind::InvalidResponse, message)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ModelErrorKind::Config, message)
    }

    /// Classify an HTTP status returned by a provider
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let kind = match status {
            401 | 403 => ModelErrorKind::Auth,
            429 => ModelErrorKind::RateLimited,
            400..=499 => ModelErrorKind::InvalidRequest,
            500..=599 => ModelErrorKind::Server,
            _ => ModelErrorKind::Unknown,
        };
        Self::new(kind, body)
    }
}

impl From<reqwest::Error> for ModelError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::invalid_response(err.to_string())
        } else {
            Self::network(err.to_string())
        }
    }
}

/// Error classification for provider failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelErrorKind {
    /// Connection failures, timeouts
    Network,
    /// 401/403
    Auth,
    /// 429
    RateLimited,
    /// 5xx
    Server,
    /// Other 4xx
    InvalidRequest,
    /// Response body could not be interpreted
    InvalidResponse,
    /// Missing API key or similar local misconfiguration
    Config,
    Unknown,
}

impl std::fmt::Display for ModelErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ModelErrorKind::Network => "network error",
            ModelErrorKind::Auth => "authentication failed",
            ModelErrorKind::RateLimited => "rate limited",
            ModelErrorKind::Server => "server error",
            ModelErrorKind::InvalidRequest => "invalid request",
            ModelErrorKind::InvalidResponse => "invalid response",
            ModelErrorKind::Config => "configuration error",
            ModelErrorKind::Unknown => "unknown error",
        };
        f.write_str(label)
    }
}

/// Condition expression parse errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConditionError {
    #[error("Could not parse condition: {0}")]
    InvalidCondition(String),

    #[error("Could not parse literal: {0}")]
    InvalidLiteral(String),
}

/// Errors raised while loading workflow definitions from YAML
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_classification() {
        assert_eq!(ModelError::from_status(401, "").kind, ModelErrorKind::Auth);
        assert_eq!(ModelError::from_status(403, "").kind, ModelErrorKind::Auth);
        assert_eq!(
            ModelError::from_status(429, "").kind,
            ModelErrorKind::RateLimited
        );
        assert_eq!(
            ModelError::from_status(400, "").kind,
            ModelErrorKind::InvalidRequest
        );
        assert_eq!(ModelError::from_status(503, "").kind, ModelErrorKind::Server);
    }

    #[test]
    fn test_model_error_display() {
        let err = ModelError::auth("bad key");
        assert_eq!(err.to_string(), "authentication failed: bad key");
    }

    #[test]
    fn test_agent_error_wraps_model_error() {
        let err: AgentError = ModelError::network("timeout").into();
        assert!(matches!(err, AgentError::ModelProvider { .. }));
        assert!(err.resolved_messages().is_empty());
        assert_eq!(
            err.to_string(),
            "Model provider error: network error: timeout"
        );
    }

    #[test]
    fn test_canceled_keeps_resolved_messages() {
        let err = AgentError::Canceled {
            resolved: vec![Message::user("kept")],
        };
        assert_eq!(err.to_string(), "Generation canceled");
        assert_eq!(err.resolved_messages().len(), 1);
        assert!(AgentError::approval_missing("c").resolved_messages().is_empty());
    }

    #[test]
    fn test_approval_missing_message() {
        let err = AgentError::approval_missing("call_9");
        assert!(err.to_string().contains("call_9"));
    }
}
