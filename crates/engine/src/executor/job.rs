//! Scheduling a job's children.

use std::thread;

use exert_types::{DEFAULT_RETURN_PATH, Direction, ExecState, FailureCategory, Flow};
use tracing::{debug, info, warn};

use super::{
    DispatchControl, Dispatcher,
    planning::{order_children, parallel_waves},
};
use crate::{
    context::Lookup,
    error::{ContextError, DispatchError, ExertError},
    exertion::{Exertion, Job, Pipe},
};

impl Dispatcher {
    pub(crate) fn run_job(&self, job: &mut Job, control: &DispatchControl) {
        self.enter(&mut job.core, "job", control);

        let flow = job.core.strategy().flow.unwrap_or(self.config.default_flow);
        let waves = {
            let names: Vec<&str> = job.children.iter().map(Exertion::name).collect();
            match flow {
                Flow::Sequential => order_children(&names, job.pipes())
                    .map(|order| order.into_iter().map(|index| vec![index]).collect::<Vec<_>>()),
                Flow::Parallel => parallel_waves(&names, job.pipes()),
            }
        };
        let waves = match waves {
            Ok(waves) => waves,
            Err(error) => {
                warn!(job = %job.core.name(), error = %error, "job could not be planned");
                job.core.record(FailureCategory::Dispatch, error.to_string());
                self.finish(&mut job.core, "job", ExecState::Error, control);
                return;
            }
        };

        let pipes = job.pipes().to_vec();
        let mut state = ExecState::Done;
        for wave in waves {
            if control.is_cancelled() {
                let error = DispatchError::Cancelled {
                    exertion: job.core.name().to_string(),
                };
                info!(job = %job.core.name(), "job cancelled");
                job.core.record(FailureCategory::Dispatch, error.to_string());
                state = state.worst(ExecState::Failed);
                break;
            }

            let mut runnable = Vec::with_capacity(wave.len());
            for index in &wave {
                match apply_pipes(&job.children, *index, &pipes) {
                    Ok(()) => runnable.push(*index),
                    Err(error) => self.block_child(&mut job.children[*index], error, control),
                }
            }
            self.run_wave(&mut job.children, &runnable, flow, control);

            let mut halted = false;
            for index in &wave {
                let child = &job.children[*index];
                job.core.extend_trace(child.trace().iter().cloned());
                let child_state = child.state();
                if !child_state.is_failure() {
                    continue;
                }
                if child.is_critical() {
                    let error = DispatchError::ChildFailed {
                        exertion: job.core.name().to_string(),
                        child: child.name().to_string(),
                        state: child_state,
                    };
                    job.core.record(FailureCategory::Dispatch, error.to_string());
                    state = state.worst(child_state);
                    halted = true;
                } else {
                    debug!(job = %job.core.name(), child = %child.name(), state = %child_state, "non-critical child failed");
                }
            }
            if halted {
                break;
            }
        }

        self.finish(&mut job.core, "job", state, control);
    }

    fn run_wave(&self, children: &mut [Exertion], runnable: &[usize], flow: Flow, control: &DispatchControl) {
        if flow == Flow::Sequential || runnable.len() < 2 {
            for index in runnable {
                self.run(&mut children[*index], control);
            }
            return;
        }

        let mut selected: Vec<&mut Exertion> = children
            .iter_mut()
            .enumerate()
            .filter(|(index, _)| runnable.contains(index))
            .map(|(_, child)| child)
            .collect();
        let width = self.config.max_parallelism.max(1);
        for chunk in selected.chunks_mut(width) {
            if control.is_cancelled() {
                break;
            }
            thread::scope(|scope| {
                for child in chunk.iter_mut() {
                    scope.spawn(move || self.run(child, control));
                }
            });
        }
    }

    /// Moves a child whose pipes cannot be satisfied straight to `Failed`.
    fn block_child(&self, child: &mut Exertion, error: ExertError, control: &DispatchControl) {
        let kind = child.kind();
        let core = child.core_mut();
        warn!(child = %core.name(), error = %error, "child blocked");
        self.enter(core, kind, control);
        core.record(error.category(), error.to_string());
        self.finish(core, kind, ExecState::Failed, control);
    }
}

/// Copies every pipe feeding `dest` from its finished source into the destination context.
fn apply_pipes(children: &[Exertion], dest: usize, pipes: &[Pipe]) -> Result<(), ExertError> {
    let target = &children[dest];
    for pipe in pipes.iter().filter(|pipe| pipe.dest_unit == target.name()) {
        let Some(source) = children.iter().find(|child| child.name() == pipe.source_unit) else {
            return Err(DispatchError::UnknownChild(pipe.source_unit.clone()).into());
        };
        if source.state() != ExecState::Done {
            return Err(DispatchError::Blocked {
                exertion: target.name().to_string(),
                upstream: source.name().to_string(),
            }
            .into());
        }
        let source_path = if pipe.source_path.is_empty() {
            DEFAULT_RETURN_PATH
        } else {
            pipe.source_path.as_str()
        };
        match source.context().get_value(source_path)? {
            Lookup::Found(value) => {
                target.context().put_in_value(&pipe.dest_path, value)?;
            }
            Lookup::FoundNone => {
                target.context().write(&pipe.dest_path, None, Some(Direction::In))?;
            }
            Lookup::NotFound => {
                return Err(ContextError::InvalidPath {
                    path: source_path.to_string(),
                    reason: format!("pipe source '{}' produced no value", source.name()),
                }
                .into());
            }
        }
        debug!(
            from = %pipe.source_unit,
            source_path,
            to = %pipe.dest_unit,
            dest_path = %pipe.dest_path,
            "pipe applied"
        );
    }
    Ok(())
}
