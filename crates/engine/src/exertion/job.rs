use exert_types::ControlStrategy;
use serde::{Deserialize, Serialize};

use super::{Exertion, ExertionCore};
use crate::{context::Context, error::ContextError, ids::SharedIds};

/// Data dependency: `dest_unit` starts only after `source_unit` is done, with the value at
/// `source_path` copied to `dest_path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipe {
    pub source_unit: String,
    pub source_path: String,
    pub dest_unit: String,
    pub dest_path: String,
}

impl Pipe {
    pub fn new(
        source_unit: impl Into<String>,
        source_path: impl Into<String>,
        dest_unit: impl Into<String>,
        dest_path: impl Into<String>,
    ) -> Self {
        Self {
            source_unit: source_unit.into(),
            source_path: source_path.into(),
            dest_unit: dest_unit.into(),
            dest_path: dest_path.into(),
        }
    }
}

/// Composite of child exertions connected by pipes.
///
/// Each child's context is linked into the job context under the child's name, so
/// `job.context().get_value("child/path")` reads the child's data.
#[derive(Debug)]
pub struct Job {
    pub(crate) core: ExertionCore,
    pub(crate) children: Vec<Exertion>,
    pipes: Vec<Pipe>,
}

impl Job {
    pub fn new(ids: &SharedIds, name: impl Into<String>) -> Self {
        Self {
            core: ExertionCore::new(ids, "job", name),
            children: Vec::new(),
            pipes: Vec::new(),
        }
    }

    pub fn with_strategy(mut self, strategy: ControlStrategy) -> Self {
        self.core.set_strategy(strategy);
        self
    }

    pub fn add_child(&mut self, child: impl Into<Exertion>) -> Result<(), ContextError> {
        let child = child.into();
        if !child.context().ptr_eq(self.core.context()) {
            self.core.context().link(child.name(), child.context(), "")?;
        }
        self.children.push(child);
        Ok(())
    }

    pub fn with_child(mut self, child: impl Into<Exertion>) -> Result<Self, ContextError> {
        self.add_child(child)?;
        Ok(self)
    }

    pub fn add_pipe(&mut self, pipe: Pipe) {
        self.pipes.push(pipe);
    }

    pub fn with_pipe(mut self, pipe: Pipe) -> Self {
        self.add_pipe(pipe);
        self
    }

    pub fn core(&self) -> &ExertionCore {
        &self.core
    }

    pub fn context(&self) -> &Context {
        self.core.context()
    }

    pub fn children(&self) -> &[Exertion] {
        &self.children
    }

    pub fn child(&self, name: &str) -> Option<&Exertion> {
        self.children.iter().find(|child| child.name() == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Exertion> {
        self.children.iter_mut().find(|child| child.name() == name)
    }

    pub fn pipes(&self) -> &[Pipe] {
        &self.pipes
    }
}
