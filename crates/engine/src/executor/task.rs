//! Binding and invoking a single task.

use exert_types::{DeploymentSpec, ExecState, OperationKind};
use tracing::{debug, warn};

use super::{DispatchControl, Dispatcher};
use crate::{
    context::{Context, Lookup, Value},
    error::{BindingError, ContextError, ExertError, InvocationFailure},
    exertion::Task,
    signature::Signature,
};

/// Why a task stopped, and the state it ends in.
struct TaskFailure {
    state: ExecState,
    error: ExertError,
}

impl From<BindingError> for TaskFailure {
    fn from(error: BindingError) -> Self {
        Self {
            state: ExecState::Error,
            error: error.into(),
        }
    }
}

impl From<ContextError> for TaskFailure {
    fn from(error: ContextError) -> Self {
        Self {
            state: ExecState::Error,
            error: error.into(),
        }
    }
}

impl From<InvocationFailure> for TaskFailure {
    fn from(failure: InvocationFailure) -> Self {
        Self {
            state: failure.kind.terminal_state(),
            error: failure.into(),
        }
    }
}

impl Dispatcher {
    pub(crate) fn run_task(&self, task: &mut Task, control: &DispatchControl) {
        self.enter(&mut task.core, "task", control);

        let state = match self.bind_and_invoke(task) {
            Ok(()) => ExecState::Done,
            Err(TaskFailure { state, error }) => {
                warn!(task = %task.core.name(), state = %state, error = %error, "task failed");
                task.core.record(error.category(), error.to_string());
                state
            }
        };
        self.finish(&mut task.core, "task", state, control);

        let observed = Lookup::Found(Value::Context(task.context().clone()));
        for fidelity in task.fidelities_mut() {
            fidelity.morph(&observed);
        }
    }

    /// Runs the active signatures in role order: builders and appends, then pre,
    /// process and post.
    fn bind_and_invoke(&self, task: &mut Task) -> Result<(), TaskFailure> {
        task.process_signature()?;
        let mut signatures = task.active_signatures()?;
        signatures.sort_by_key(|signature| signature.kind.rank());
        let deployment_id = task.deployment_id();

        for signature in &signatures {
            if let Some(spec) = &signature.deployment {
                self.ensure_deployment(signature, spec, deployment_id.as_deref().unwrap_or(&spec.name))?;
            }
            let handle = self.lookup.resolve(signature)?;
            let input = self.prepare_input(task, signature);
            debug!(
                task = %task.core.name(),
                signature = %signature.name,
                kind = ?signature.kind,
                capability = %handle.capability,
                "invoking"
            );
            let result = self.invoker.invoke(&handle, input)?;
            self.merge_result(task, signature, &result)?;
        }
        Ok(())
    }

    fn ensure_deployment(&self, signature: &Signature, spec: &DeploymentSpec, deployment_id: &str) -> Result<(), BindingError> {
        let Some(deployer) = &self.deployer else {
            return Err(BindingError::DeploymentUnavailable {
                signature: signature.name.clone(),
            });
        };
        debug!(signature = %signature.name, deployment = %deployment_id, "ensuring deployment");
        deployer.ensure(deployment_id, spec).map_err(|error| BindingError::Deployment {
            signature: signature.name.clone(),
            source: error.into(),
        })
    }

    /// The operation's input: declared in paths evaluated into a subcontext, or a copy of
    /// the whole task context with its entries evaluated. Paths that fail to evaluate are
    /// traced and left out.
    fn prepare_input(&self, task: &mut Task, signature: &Signature) -> Context {
        let context = task.context().clone();
        let input = if signature.in_paths().is_empty() {
            let copy = context.detached_copy();
            for path in context.local_entry_paths() {
                let Err(error) = context.get_value(&path) else {
                    continue;
                };
                let failure = ExertError::from(error);
                warn!(task = %task.core.name(), path = %path, error = %failure, "input entry skipped");
                task.core.record(failure.category(), failure.to_string());
                if let Err(error) = copy.remove_path(&path) {
                    debug!(task = %task.core.name(), path = %path, error = %error, "failed entry could not be dropped");
                }
            }
            copy
        } else {
            let (subcontext, failures) = context.get_evaluated_subcontext(signature.in_paths());
            for failure in failures {
                let failure = ExertError::from(failure);
                warn!(task = %task.core.name(), error = %failure, "input path skipped");
                task.core.record(failure.category(), failure.to_string());
            }
            subcontext
        };
        if let Some(return_path) = &signature.return_path {
            input.set_return_path(return_path.clone());
        }
        input
    }

    /// Merges the declared out paths of `result` (or all of it) into the target context.
    fn merge_result(&self, task: &Task, signature: &Signature, result: &Context) -> Result<(), ContextError> {
        let merged = if signature.out_paths().is_empty() {
            result.clone()
        } else {
            result.get_directional_subcontext(signature.out_paths())?
        };
        let target = match signature.kind {
            OperationKind::AppendControl => task.core.control_context().clone(),
            _ => signature
                .return_path
                .as_ref()
                .and_then(|return_path| return_path.data_context.clone())
                .unwrap_or_else(|| task.context().clone()),
        };
        target.append(&merged);
        Ok(())
    }
}
