use serde::{Deserialize, Serialize};

/// Role a signature plays when a task is bound.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    #[default]
    Process,
    Pre,
    Post,
    Service,
    AppendData,
    AppendControl,
    Builder,
}

impl OperationKind {
    /// Execution rank inside a task; lower ranks run first.
    ///
    /// Builders assemble the data context, appends contribute to it, then the
    /// pre/process/post chain runs.
    pub fn rank(&self) -> u8 {
        match self {
            OperationKind::Builder => 0,
            OperationKind::AppendData => 1,
            OperationKind::AppendControl => 2,
            OperationKind::Pre => 3,
            OperationKind::Process | OperationKind::Service => 4,
            OperationKind::Post => 5,
        }
    }

    /// `Process` and `Service` both fill the single process role of a task.
    pub fn is_process(&self) -> bool {
        matches!(self, OperationKind::Process | OperationKind::Service)
    }
}
