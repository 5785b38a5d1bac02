//! Core error types.

use crate::callback::CallbackKind;
use thiserror::Error;

/// Boxed error carried by technical failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure raised by a guard, condition, process or object copy.
#[derive(Debug, Error)]
pub enum EvalError {
    /// Expected, caller-correctable failure.
    #[error("{0}")]
    Business(String),

    /// Unexpected failure.
    #[error(transparent)]
    Technical(BoxError),
}

impl EvalError {
    pub fn business(reason: impl Into<String>) -> Self {
        EvalError::Business(reason.into())
    }

    pub fn technical(source: impl Into<BoxError>) -> Self {
        EvalError::Technical(source.into())
    }
}

/// How a [`FlowError`] should be treated by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Expected condition the caller can correct.
    Business,
    /// Unexpected failure, wraps the underlying cause.
    Technical,
    /// Workflow construction broke a membership rule.
    Argument,
}

/// Errors from the workflow engine.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("{reason}")]
    MissingArgument { reason: String },

    #[error("workflow not found: {workflow}")]
    WorkflowNotFound { workflow: String },

    #[error("workflow id not found: {id}")]
    WorkflowIdNotFound { id: u64 },

    #[error("workflow already exists with a different definition: {workflow}")]
    WorkflowExists { workflow: String },

    #[error("workflow '{workflow}' is not valid: {reason}")]
    InvalidWorkflow { workflow: String, reason: String },

    #[error("action '{action}' is not a valid one from status '{status}' in workflow '{workflow}'")]
    InvalidAction {
        action: String,
        status: String,
        workflow: String,
    },

    #[error("invalid workflow definition: {reason}")]
    InvalidDefinition { reason: String },

    #[error("{kind} '{callback}' rejected the transition: {reason}")]
    Rejected {
        kind: CallbackKind,
        callback: String,
        reason: String,
    },

    #[error("status '{status}' belongs to workflow '{owner}', expected '{workflow}'")]
    ForeignStatus {
        status: String,
        owner: String,
        workflow: String,
    },

    #[error("malformed action '{action}': {reason}")]
    MalformedAction { action: String, reason: String },

    #[error("{kind} '{callback}' failed: {source}")]
    CallbackFailed {
        kind: CallbackKind,
        callback: String,
        #[source]
        source: BoxError,
    },

    #[error("{kind} '{callback}' panicked: {message}")]
    CallbackPanicked {
        kind: CallbackKind,
        callback: String,
        message: String,
    },

    #[error("failed to copy the workflow object: {source}")]
    CloneFailed {
        #[source]
        source: EvalError,
    },

    #[error("conditional action '{action}' has no route for outcome {outcome}")]
    UnroutedOutcome { action: String, outcome: i32 },

    #[error("no {kind} registered under '{name}'")]
    UnknownCallback { kind: CallbackKind, name: String },

    #[error("storage error: {0}")]
    Storage(#[source] BoxError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl FlowError {
    /// Classifies this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FlowError::MissingArgument { .. }
            | FlowError::WorkflowNotFound { .. }
            | FlowError::WorkflowIdNotFound { .. }
            | FlowError::WorkflowExists { .. }
            | FlowError::InvalidWorkflow { .. }
            | FlowError::InvalidAction { .. }
            | FlowError::InvalidDefinition { .. }
            | FlowError::Rejected { .. }
            | FlowError::Json(_)
            | FlowError::Yaml(_) => ErrorKind::Business,
            FlowError::ForeignStatus { .. } | FlowError::MalformedAction { .. } => {
                ErrorKind::Argument
            }
            FlowError::CallbackFailed { .. }
            | FlowError::CallbackPanicked { .. }
            | FlowError::CloneFailed { .. }
            | FlowError::UnroutedOutcome { .. }
            | FlowError::UnknownCallback { .. }
            | FlowError::Storage(_) => ErrorKind::Technical,
        }
    }

    pub fn is_business(&self) -> bool {
        self.kind() == ErrorKind::Business
    }

    pub fn is_technical(&self) -> bool {
        self.kind() == ErrorKind::Technical
    }

    /// Returns a stable error code for logs and tooling.
    pub fn error_code(&self) -> &'static str {
        match self {
            FlowError::MissingArgument { .. } => "BAD_REQUEST",
            FlowError::WorkflowNotFound { .. } => "WORKFLOW_NOT_FOUND",
            FlowError::WorkflowIdNotFound { .. } => "WORKFLOW_NOT_FOUND",
            FlowError::WorkflowExists { .. } => "WORKFLOW_EXISTS",
            FlowError::InvalidWorkflow { .. } => "INVALID_WORKFLOW",
            FlowError::InvalidAction { .. } => "INVALID_ACTION",
            FlowError::InvalidDefinition { .. } => "BAD_REQUEST",
            FlowError::Rejected { .. } => "REJECTED",
            FlowError::ForeignStatus { .. } => "ILLEGAL_ARGUMENT",
            FlowError::MalformedAction { .. } => "ILLEGAL_ARGUMENT",
            FlowError::CallbackFailed { .. } => "CALLBACK_FAILED",
            FlowError::CallbackPanicked { .. } => "CALLBACK_FAILED",
            FlowError::CloneFailed { .. } => "CLONE_FAILED",
            FlowError::UnroutedOutcome { .. } => "UNROUTED_OUTCOME",
            FlowError::UnknownCallback { .. } => "UNKNOWN_CALLBACK",
            FlowError::Storage(_) => "STORAGE_ERROR",
            FlowError::Json(_) => "BAD_REQUEST",
            FlowError::Yaml(_) => "BAD_REQUEST",
        }
    }
}
