//! Running a block's items against its shared context.

use exert_types::{ExecState, FailureCategory, TraceEntry};
use tracing::{debug, info, warn};

use super::{DispatchControl, Dispatcher};
use crate::{
    condition::Condition,
    context::{Context, Lookup},
    error::{ContextError, DispatchError, ExertError},
    exertion::{Block, BlockItem, Exertion},
};

impl Dispatcher {
    pub(crate) fn run_block(&self, block: &mut Block, control: &DispatchControl) {
        self.enter(&mut block.core, "block", control);

        let context = block.core.context().clone();
        let mut trace = Vec::new();
        let mut state = ExecState::Done;
        for item in &mut block.items {
            if control.is_cancelled() {
                let error = DispatchError::Cancelled {
                    exertion: block.core.name().to_string(),
                };
                info!(block = %block.core.name(), "block cancelled");
                trace.push(TraceEntry::new(block.core.name(), FailureCategory::Dispatch, error.to_string()));
                state = state.worst(ExecState::Failed);
                break;
            }
            let Some((unit_state, critical)) = self.run_item(&context, item, control, &mut trace) else {
                continue;
            };
            if unit_state.is_failure() && critical {
                state = state.worst(unit_state);
                break;
            }
        }

        block.core.extend_trace(trace);
        self.finish(&mut block.core, "block", state, control);
    }

    /// Runs one item; `None` when no unit ran. Returns the state of the last unit run and
    /// whether that unit is critical.
    fn run_item(
        &self,
        context: &Context,
        item: &mut BlockItem,
        control: &DispatchControl,
        trace: &mut Vec<TraceEntry>,
    ) -> Option<(ExecState, bool)> {
        match item {
            BlockItem::Unit(unit) => Some(self.run_unit(context, unit, control, trace)),
            BlockItem::Opt { condition, unit } => {
                if holds(condition, context, unit.name(), trace) {
                    Some(self.run_unit(context, unit, control, trace))
                } else {
                    debug!(unit = %unit.name(), "optional item skipped");
                    None
                }
            }
            BlockItem::Alt(arms) => {
                for (condition, unit) in arms.iter_mut() {
                    if holds(condition, context, unit.name(), trace) {
                        return Some(self.run_unit(context, unit, control, trace));
                    }
                }
                debug!("no alternative matched");
                None
            }
            BlockItem::Loop {
                condition,
                max_iterations,
                unit,
            } => {
                let bound = max_iterations.unwrap_or(self.config.max_loop_iterations);
                let mut iterations = 0u32;
                let mut last = None;
                while iterations < bound && !control.is_cancelled() {
                    if !holds(condition, context, unit.name(), trace) {
                        break;
                    }
                    if iterations > 0 {
                        unit.reset();
                    }
                    let outcome = self.run_unit(context, unit, control, trace);
                    iterations += 1;
                    last = Some(outcome);
                    if outcome.0.is_failure() {
                        break;
                    }
                }
                let completed = last.is_some_and(|(state, _)| !state.is_failure());
                if completed && !control.is_cancelled() && exhausted(condition, context, iterations, bound) {
                    warn!(unit = %unit.name(), bound, "loop stopped at its iteration bound");
                }
                debug!(unit = %unit.name(), iterations, "loop finished");
                last
            }
        }
    }

    fn run_unit(
        &self,
        context: &Context,
        unit: &mut Exertion,
        control: &DispatchControl,
        trace: &mut Vec<TraceEntry>,
    ) -> (ExecState, bool) {
        let critical = unit.is_critical();
        if let Err(error) = inherit(context, unit.context()) {
            let error = ExertError::from(error);
            warn!(unit = %unit.name(), error = %error, "unit context could not be prepared");
            trace.push(TraceEntry::new(unit.name(), error.category(), error.to_string()));
            return (ExecState::Error, critical);
        }
        self.run(unit, control);
        trace.extend(unit.trace().iter().cloned());
        if unit.state() == ExecState::Done {
            context.append(unit.context());
        }
        (unit.state(), critical)
    }
}

/// True when a loop used up its `bound` while its guard still admits another pass.
pub(super) fn exhausted(condition: &Condition, context: &Context, iterations: u32, bound: u32) -> bool {
    iterations == bound && condition.evaluate(context).unwrap_or(false)
}

/// Evaluates a guard; an evaluation failure is traced and reads as `false`.
fn holds(condition: &Condition, context: &Context, unit: &str, trace: &mut Vec<TraceEntry>) -> bool {
    match condition.evaluate(context) {
        Ok(holds) => holds,
        Err(error) => {
            warn!(unit, error = %error, "condition could not be evaluated");
            trace.push(TraceEntry::new(unit, FailureCategory::Evaluation, error.to_string()));
            false
        }
    }
}

/// Copies the paths of `shared` that `unit` lacks, keeping their directions.
fn inherit(shared: &Context, unit: &Context) -> Result<(), ContextError> {
    if shared.ptr_eq(unit) {
        return Ok(());
    }
    for path in shared.get_paths()? {
        if unit.contains(&path)? {
            continue;
        }
        let direction = shared.direction_of(&path)?;
        match shared.get(&path)? {
            Lookup::Found(value) => {
                unit.write(&path, Some(value), direction)?;
            }
            Lookup::FoundNone => {
                unit.write(&path, None, direction)?;
            }
            Lookup::NotFound => {}
        }
    }
    Ok(())
}
