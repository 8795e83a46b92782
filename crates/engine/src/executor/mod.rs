//! Dispatching exertions.
//!
//! The [`Dispatcher`] drives an exertion tree through the state machine
//! `Initial -> Running -> {Done, Failed, Error}`. Tasks are bound through the lookup
//! port and invoked through the invocation port; jobs schedule their children by pipe
//! dependencies, sequentially or in parallel waves; blocks run their items in order
//! against a shared context. Failures are recorded on the exertion's trace rather than
//! returned, so a composite can finish its remaining children.

mod block;
mod job;
mod planning;
mod session;
mod task;

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use exert_types::ExecState;
use exert_util::EngineConfig;
use tracing::{debug, info};

pub use planning::{order_children, parallel_waves};
pub use session::{DispatchEvent, DispatchRequest, SessionControl, dispatch_blocking, drive_exertion};

use crate::{
    error::DispatchError,
    exertion::{Exertion, ExertionCore},
    provider::{DeploymentPort, InvocationPort, LocalInvoker, LookupPort},
};

/// Receives every state change of every exertion in a dispatched tree.
pub trait DispatchObserver: Send + Sync {
    fn state_changed(&self, exertion: &str, kind: &'static str, state: ExecState);
}

/// Cancellation flag and optional observer shared by one dispatch.
///
/// Cancelling stops composites from starting further children; work already running
/// is not interrupted.
#[derive(Clone, Default)]
pub struct DispatchControl {
    cancelled: Arc<AtomicBool>,
    observer: Option<Arc<dyn DispatchObserver>>,
}

impl DispatchControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_observer(mut self, observer: Arc<dyn DispatchObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn notify(&self, core: &ExertionCore, kind: &'static str) {
        if let Some(observer) = &self.observer {
            observer.state_changed(core.name(), kind, core.state());
        }
    }
}

/// Binds and runs exertion trees.
pub struct Dispatcher {
    lookup: Arc<dyn LookupPort>,
    invoker: Arc<dyn InvocationPort>,
    deployer: Option<Arc<dyn DeploymentPort>>,
    config: EngineConfig,
}

impl Dispatcher {
    pub fn new(lookup: Arc<dyn LookupPort>) -> Self {
        Self {
            lookup,
            invoker: Arc::new(LocalInvoker),
            deployer: None,
            config: EngineConfig::default(),
        }
    }

    pub fn with_invoker(mut self, invoker: Arc<dyn InvocationPort>) -> Self {
        self.invoker = invoker;
        self
    }

    pub fn with_deployer(mut self, deployer: Arc<dyn DeploymentPort>) -> Self {
        self.deployer = Some(deployer);
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Dispatches `exertion` in place and returns its terminal state.
    ///
    /// Only an `Initial` exertion can be dispatched; call [`Exertion::reset`] to run a
    /// finished tree again.
    pub fn dispatch(&self, exertion: &mut Exertion) -> Result<ExecState, DispatchError> {
        self.dispatch_with(exertion, &DispatchControl::default())
    }

    pub fn dispatch_with(&self, exertion: &mut Exertion, control: &DispatchControl) -> Result<ExecState, DispatchError> {
        if exertion.state() != ExecState::Initial {
            return Err(DispatchError::NotInitial {
                exertion: exertion.name().to_string(),
                state: exertion.state(),
            });
        }
        info!(exertion = %exertion.name(), kind = exertion.kind(), "dispatch started");
        self.run(exertion, control);
        info!(
            exertion = %exertion.name(),
            state = %exertion.state(),
            failures = exertion.trace().len(),
            "dispatch finished"
        );
        Ok(exertion.state())
    }

    /// Consuming form of [`Dispatcher::dispatch`].
    pub fn exert(&self, mut exertion: Exertion) -> Result<Exertion, DispatchError> {
        self.dispatch(&mut exertion)?;
        Ok(exertion)
    }

    pub(crate) fn run(&self, exertion: &mut Exertion, control: &DispatchControl) {
        match exertion {
            Exertion::Task(task) => self.run_task(task, control),
            Exertion::Job(job) => self.run_job(job, control),
            Exertion::Block(block) => self.run_block(block, control),
        }
    }

    fn enter(&self, core: &mut ExertionCore, kind: &'static str, control: &DispatchControl) {
        core.context().set_max_link_depth(self.config.max_link_depth);
        core.control_context().set_max_link_depth(self.config.max_link_depth);
        if core.transition(ExecState::Running) {
            debug!(exertion = %core.name(), kind, "running");
            control.notify(core, kind);
        }
    }

    fn finish(&self, core: &mut ExertionCore, kind: &'static str, state: ExecState, control: &DispatchControl) {
        if core.transition(state) {
            debug!(exertion = %core.name(), kind, state = %state, "finished");
            control.notify(core, kind);
        }
    }
}

#[cfg(test)]
mod tests;
