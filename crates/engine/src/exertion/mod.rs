//! The exertion tree: tasks, jobs and blocks sharing one core.

mod block;
mod job;
mod task;

pub use block::{Block, BlockItem};
pub use job::{Job, Pipe};
pub use task::{SignatureSlot, Task};

use exert_types::{ControlStrategy, ExecState, FailureCategory, TraceEntry};
use tracing::warn;

use crate::{context::Context, ids::SharedIds};

/// State shared by every kind of exertion.
#[derive(Debug)]
pub struct ExertionCore {
    id: String,
    name: String,
    state: ExecState,
    strategy: ControlStrategy,
    context: Context,
    control_context: Context,
    trace: Vec<TraceEntry>,
}

impl ExertionCore {
    pub(crate) fn new(ids: &SharedIds, prefix: &str, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: ids.next_id(prefix),
            context: Context::new(ids, name.clone()),
            control_context: Context::new(ids, format!("{name} control")),
            name,
            state: ExecState::Initial,
            strategy: ControlStrategy::default(),
            trace: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ExecState {
        self.state
    }

    pub fn strategy(&self) -> &ControlStrategy {
        &self.strategy
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Context receiving `append_control` results.
    pub fn control_context(&self) -> &Context {
        &self.control_context
    }

    /// Failures recorded while dispatching, oldest first.
    pub fn trace(&self) -> &[TraceEntry] {
        &self.trace
    }

    pub(crate) fn set_strategy(&mut self, strategy: ControlStrategy) {
        self.strategy = strategy;
    }

    pub(crate) fn set_context(&mut self, context: Context) {
        self.context = context;
    }

    /// Moves to `next` when the state machine allows it.
    pub(crate) fn transition(&mut self, next: ExecState) -> bool {
        if !self.state.can_transition_to(next) {
            warn!(exertion = %self.name, from = %self.state, to = %next, "rejected state transition");
            return false;
        }
        self.state = next;
        true
    }

    pub(crate) fn record(&mut self, category: FailureCategory, message: impl Into<String>) {
        self.trace.push(TraceEntry::new(self.name.clone(), category, message));
    }

    pub(crate) fn extend_trace(&mut self, entries: impl IntoIterator<Item = TraceEntry>) {
        self.trace.extend(entries);
    }

    fn reset(&mut self) {
        self.state = ExecState::Initial;
        self.trace.clear();
    }
}

/// A dispatchable unit of work.
#[derive(Debug)]
pub enum Exertion {
    Task(Task),
    Job(Job),
    Block(Block),
}

impl Exertion {
    pub fn core(&self) -> &ExertionCore {
        match self {
            Exertion::Task(task) => &task.core,
            Exertion::Job(job) => &job.core,
            Exertion::Block(block) => &block.core,
        }
    }

    pub(crate) fn core_mut(&mut self) -> &mut ExertionCore {
        match self {
            Exertion::Task(task) => &mut task.core,
            Exertion::Job(job) => &mut job.core,
            Exertion::Block(block) => &mut block.core,
        }
    }

    pub fn id(&self) -> &str {
        self.core().id()
    }

    pub fn name(&self) -> &str {
        self.core().name()
    }

    pub fn state(&self) -> ExecState {
        self.core().state()
    }

    pub fn context(&self) -> &Context {
        self.core().context()
    }

    pub fn control_context(&self) -> &Context {
        self.core().control_context()
    }

    pub fn strategy(&self) -> &ControlStrategy {
        self.core().strategy()
    }

    pub fn trace(&self) -> &[TraceEntry] {
        self.core().trace()
    }

    pub fn is_critical(&self) -> bool {
        self.strategy().critical
    }

    /// Short label of the exertion kind, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Exertion::Task(_) => "task",
            Exertion::Job(_) => "job",
            Exertion::Block(_) => "block",
        }
    }

    pub fn as_task(&self) -> Option<&Task> {
        match self {
            Exertion::Task(task) => Some(task),
            _ => None,
        }
    }

    pub fn as_task_mut(&mut self) -> Option<&mut Task> {
        match self {
            Exertion::Task(task) => Some(task),
            _ => None,
        }
    }

    pub fn as_job(&self) -> Option<&Job> {
        match self {
            Exertion::Job(job) => Some(job),
            _ => None,
        }
    }

    pub fn as_block(&self) -> Option<&Block> {
        match self {
            Exertion::Block(block) => Some(block),
            _ => None,
        }
    }

    /// Returns the whole tree to `Initial` with empty traces so it can be dispatched again.
    ///
    /// Contexts keep their data.
    pub fn reset(&mut self) {
        self.core_mut().reset();
        match self {
            Exertion::Task(_) => {}
            Exertion::Job(job) => job.children.iter_mut().for_each(Exertion::reset),
            Exertion::Block(block) => block.items.iter_mut().for_each(BlockItem::reset),
        }
    }
}

impl From<Task> for Exertion {
    fn from(task: Task) -> Self {
        Exertion::Task(task)
    }
}

impl From<Job> for Exertion {
    fn from(job: Job) -> Self {
        Exertion::Job(job)
    }
}

impl From<Block> for Exertion {
    fn from(block: Block) -> Self {
        Exertion::Block(block)
    }
}
