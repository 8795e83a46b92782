use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Error taxonomy bucket of a recorded failure.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    DataModel,
    Binding,
    Evaluation,
    Invocation,
    Dispatch,
}

/// One recorded failure in an exertion's exception trace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TraceEntry {
    /// Name of the exertion the failure is attributed to.
    pub exertion: String,
    pub category: FailureCategory,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl TraceEntry {
    pub fn new(exertion: impl Into<String>, category: FailureCategory, message: impl Into<String>) -> Self {
        Self {
            exertion: exertion.into(),
            category,
            message: message.into(),
            at: Utc::now(),
        }
    }
}
