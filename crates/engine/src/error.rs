//! Error taxonomy of the engine.
//!
//! Context store calls raise [`ContextError`] synchronously. Binding, evaluation,
//! invocation and dispatch failures are recorded on the owning exertion's trace
//! while dispatching; [`ExertError`] unifies them for callers that prefer `?`.

use std::fmt;

use exert_types::{ExecState, FailureCategory};
use thiserror::Error;

/// Boxed cause carried by errors that wrap foreign failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Data-model failure detected by the context store. The attempted mutation is not applied.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },
    #[error("attribute '{0}' is not declared")]
    UnknownAttribute(String),
    #[error("malformed association '{association}' on '{path}': {reason}")]
    InvalidAssociation {
        path: String,
        association: String,
        reason: String,
    },
    #[error("attribute '{attribute}' expects {expected} component value(s), found {found}")]
    ArityMismatch {
        attribute: String,
        expected: usize,
        found: usize,
    },
    #[error("cannot link '{path}': existing path '{existing}' overlaps the link namespace")]
    LinkConflict { path: String, existing: String },
    #[error("link cycle detected while resolving '{path}'")]
    LinkCycle { path: String },
    #[error("linked context behind '{path}' has been dropped")]
    DanglingLink { path: String },
    #[error("persistence failure at '{path}': {source}")]
    Persistence {
        path: String,
        #[source]
        source: BoxError,
    },
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
}

/// A deferred value's compute function failed.
#[derive(Debug, Error)]
#[error("evaluation of '{name}' failed: {source}")]
pub struct EvaluationError {
    /// Entry name, or the path being resolved when the entry is anonymous.
    pub name: String,
    #[source]
    pub source: BoxError,
}

impl EvaluationError {
    pub fn new(name: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }
}

/// Capability resolution failed.
#[derive(Debug, Error)]
pub enum BindingError {
    #[error("ambiguous binding for '{exertion}': multiple process signatures ({})", signatures.join(", "))]
    Ambiguous { exertion: String, signatures: Vec<String> },
    #[error("'{exertion}' has no active process signature")]
    NoProcessSignature { exertion: String },
    #[error("no implementation registered for capability '{capability}' (selector '{selector}')")]
    NotFound { capability: String, selector: String },
    #[error("fidelity '{0}' is not declared")]
    UnknownFidelity(String),
    #[error("fidelity '{fidelity}' has no alternative '{alternative}'")]
    UnknownAlternative { fidelity: String, alternative: String },
    #[error("signature '{signature}' declares a deployment but no deployer is configured")]
    DeploymentUnavailable { signature: String },
    #[error("deployment of '{signature}' failed: {source}")]
    Deployment {
        signature: String,
        #[source]
        source: BoxError,
    },
}

/// Whether a caller may retry after an invocation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Possibly transient; the task ends FAILED.
    Transient,
    /// Unrecoverable; the task ends ERROR.
    Fatal,
}

impl FailureKind {
    /// Terminal state a task reaches when an invocation fails with this kind.
    pub fn terminal_state(self) -> ExecState {
        match self {
            FailureKind::Transient => ExecState::Failed,
            FailureKind::Fatal => ExecState::Error,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Transient => f.write_str("transient"),
            FailureKind::Fatal => f.write_str("fatal"),
        }
    }
}

/// The call boundary reported a failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind} invocation failure: {message}")]
pub struct InvocationFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl InvocationFailure {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Transient,
            message: message.into(),
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Fatal,
            message: message.into(),
        }
    }
}

/// An exertion could not complete its state-machine transition.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("'{exertion}' is {state}; reset it before dispatching again")]
    NotInitial { exertion: String, state: ExecState },
    #[error("'{exertion}' is blocked: upstream '{upstream}' did not complete")]
    Blocked { exertion: String, upstream: String },
    #[error("child '{child}' of '{exertion}' ended {state}")]
    ChildFailed {
        exertion: String,
        child: String,
        state: ExecState,
    },
    #[error("'{exertion}' was cancelled before completion")]
    Cancelled { exertion: String },
    #[error("duplicate child name '{0}'")]
    DuplicateChild(String),
    #[error("pipe references unknown child '{0}'")]
    UnknownChild(String),
    #[error("child '{0}' cannot pipe into itself")]
    SelfPipe(String),
    #[error("cycle detected in pipes involving: {}", .0.join(", "))]
    PipeCycle(Vec<String>),
}

/// Umbrella error for callers composing engine operations with `?`.
#[derive(Debug, Error)]
pub enum ExertError {
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
    #[error(transparent)]
    Binding(#[from] BindingError),
    #[error(transparent)]
    Invocation(#[from] InvocationFailure),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl ExertError {
    /// Trace bucket this error is recorded under.
    pub fn category(&self) -> FailureCategory {
        match self {
            ExertError::Context(ContextError::Evaluation(_)) | ExertError::Evaluation(_) => FailureCategory::Evaluation,
            ExertError::Context(_) => FailureCategory::DataModel,
            ExertError::Binding(_) => FailureCategory::Binding,
            ExertError::Invocation(_) => FailureCategory::Invocation,
            ExertError::Dispatch(_) => FailureCategory::Dispatch,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_kind_selects_terminal_state() {
        assert_eq!(InvocationFailure::transient("timeout").kind.terminal_state(), ExecState::Failed);
        assert_eq!(InvocationFailure::fatal("bad input").kind.terminal_state(), ExecState::Error);
    }

    #[test]
    fn ambiguous_binding_lists_signatures() {
        let error = BindingError::Ambiguous {
            exertion: "t".into(),
            signatures: vec!["add".into(), "sum".into()],
        };
        assert_eq!(error.to_string(), "ambiguous binding for 't': multiple process signatures (add, sum)");
    }

    #[test]
    fn umbrella_error_reports_category() {
        let evaluation = EvaluationError::new("e", anyhow::anyhow!("boom"));
        assert_eq!(ExertError::from(ContextError::from(evaluation)).category(), FailureCategory::Evaluation);
        let conflict = ContextError::LinkConflict {
            path: "a".into(),
            existing: "a/b".into(),
        };
        assert_eq!(ExertError::from(conflict).category(), FailureCategory::DataModel);
    }
}
