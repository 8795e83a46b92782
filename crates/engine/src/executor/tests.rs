use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use anyhow::anyhow;
use exert_types::{DeploymentSpec, Direction, ExecState, FailureCategory, OperationKind};
use exert_util::EngineConfig;
use parking_lot::Mutex;

use super::*;
use crate::{
    condition::Condition,
    context::{Context, Entry, Lookup},
    error::{ContextError, InvocationFailure},
    exertion::{Block, Job, Pipe, Task},
    fidelity::Fidelity,
    ids::{SharedIds, sequential_ids},
    provider::{CapabilityRegistry, Provider, provider_fn},
    signature::{ReturnPath, Signature},
};

fn number(context: &Context, path: &str) -> anyhow::Result<f64> {
    context
        .get_value(path)?
        .as_f64()
        .ok_or_else(|| anyhow!("'{path}' is not a number"))
}

fn arithmetic() -> Arc<dyn Provider> {
    provider_fn(|selector, context| {
        let x = number(context, "a/x")?;
        let y = number(context, "a/y")?;
        let result = match selector {
            "add" => x + y,
            "multiply" => x * y,
            other => return Err(InvocationFailure::fatal(format!("unknown selector '{other}'")).into()),
        };
        context.put_out_value("a/sum", result)?;
        Ok(())
    })
}

fn registry() -> CapabilityRegistry {
    let registry = CapabilityRegistry::new();
    registry.register_instance("Arithmetic", arithmetic());
    registry.register_instance(
        "Flaky",
        provider_fn(|selector, _| match selector {
            "fatal" => Err(InvocationFailure::fatal("malformed input").into()),
            _ => Err(anyhow!("service unreachable")),
        }),
    );
    registry.register_instance(
        "Counter",
        provider_fn(|_, context| {
            let count = number(context, "count")?;
            context.put_out_value("count", count + 1.0)?;
            Ok(())
        }),
    );
    registry.register_instance(
        "Pipes",
        provider_fn(|selector, context| {
            match selector {
                "produce" => {
                    context.put_out_value("result", 21)?;
                }
                _ => {
                    let input = number(context, "input")?;
                    context.put_out_value("doubled", input * 2.0)?;
                }
            }
            Ok(())
        }),
    );
    registry
}

fn dispatcher() -> Dispatcher {
    Dispatcher::new(Arc::new(registry()))
}

fn adder(ids: &SharedIds, name: &str, x: i64, y: i64) -> Task {
    let task = Task::new(ids, name, Signature::new("add", "Arithmetic"));
    task.context().put_in_value("a/x", x).unwrap();
    task.context().put_in_value("a/y", y).unwrap();
    task
}

fn failing(ids: &SharedIds, name: &str, selector: &str) -> Task {
    Task::new(ids, name, Signature::new(selector, "Flaky"))
}

fn counter(ids: &SharedIds, name: &str) -> Task {
    Task::new(ids, name, Signature::new("increment", "Counter"))
}

#[test]
fn task_computes_sum_into_output_path() {
    let ids = sequential_ids();
    let mut exertion = Exertion::from(adder(&ids, "add", 5, 7));

    let state = dispatcher().dispatch(&mut exertion).unwrap();

    assert_eq!(state, ExecState::Done);
    assert_eq!(exertion.context().get_value("a/sum").unwrap().as_f64(), Some(12.0));
    assert_eq!(exertion.context().direction_of("a/sum").unwrap(), Some(Direction::Out));
    assert!(exertion.trace().is_empty());
}

#[test]
fn provider_writes_through_declared_return_path() {
    let ids = sequential_ids();
    let registry = registry();
    registry.register_instance(
        "Summer",
        provider_fn(|_, context| {
            let sum = number(context, "a/x")? + number(context, "a/y")?;
            context.set_return_value(sum)?;
            Ok(())
        }),
    );
    let shared = Context::new(&ids, "c");
    shared.put_in_value("a/x", 5).unwrap();
    shared.put_in_value("a/y", 7).unwrap();
    let signature = Signature::new("sum", "Summer").with_return_path(ReturnPath::new("a/sum"));
    let task = Task::new(&ids, "sum", signature).with_context(shared.clone());

    let exertion = Dispatcher::new(Arc::new(registry)).exert(task.into()).unwrap();

    assert_eq!(exertion.state(), ExecState::Done);
    assert_eq!(shared.get_value("a/sum").unwrap().as_f64(), Some(12.0));
    assert!(!shared.get_in_paths().contains(&"a/sum".to_string()));
}

#[test]
fn failing_input_entry_is_traced_as_evaluation() {
    let ids = sequential_ids();
    let task = adder(&ids, "add", 2, 3);
    task.context()
        .put_entry("broken", Entry::computed("broken", |_| anyhow::bail!("sensor offline")))
        .unwrap();

    let exertion = dispatcher().exert(task.into()).unwrap();

    assert_eq!(exertion.state(), ExecState::Done);
    assert_eq!(exertion.context().get_value("a/sum").unwrap().as_f64(), Some(5.0));
    assert_eq!(exertion.trace().len(), 1);
    assert_eq!(exertion.trace()[0].category, FailureCategory::Evaluation);
    assert!(exertion.trace()[0].message.contains("sensor offline"));
}

#[test]
fn configured_link_depth_reaches_dispatched_contexts() {
    let ids = sequential_ids();
    let middle = Context::new(&ids, "middle");
    let leaf = Context::new(&ids, "leaf");
    leaf.put_value("x", 3).unwrap();
    middle.link("next", &leaf, "").unwrap();
    let linked_adder = || {
        let task = adder(&ids, "add", 1, 2);
        task.context().link("next", &middle, "").unwrap();
        Exertion::from(task)
    };

    let relaxed = dispatcher().exert(linked_adder()).unwrap();
    assert_eq!(relaxed.context().get_value("next/next/x").unwrap().as_i64(), Some(3));

    let config = EngineConfig {
        max_link_depth: 1,
        ..EngineConfig::default()
    };
    let strict = dispatcher().with_config(config).exert(linked_adder()).unwrap();

    assert_eq!(strict.state(), ExecState::Done);
    assert_eq!(strict.context().max_link_depth(), 1);
    assert!(matches!(
        strict.context().get_value("next/next/x"),
        Err(ContextError::LinkCycle { .. })
    ));
}

#[test]
fn declared_paths_limit_input_and_output() {
    let ids = sequential_ids();
    let return_path = ReturnPath::new("a/sum").with_in_paths(["a/x", "a/y"]).with_out_paths(["a/sum"]);
    let task = Task::new(&ids, "add", Signature::new("add", "Arithmetic").with_return_path(return_path));
    task.context().put_in_value("a/x", 2).unwrap();
    task.context().put_in_value("a/y", 3).unwrap();
    task.context().put_value("unrelated", "kept").unwrap();

    let exertion = dispatcher().exert(task.into()).unwrap();

    assert_eq!(exertion.state(), ExecState::Done);
    assert_eq!(exertion.context().get_value("a/sum").unwrap().as_f64(), Some(5.0));
    assert_eq!(exertion.context().get_value("unrelated").unwrap().as_str(), Some("kept"));
}

#[test]
fn data_context_receives_result() {
    let ids = sequential_ids();
    let shared = Context::new(&ids, "shared");
    let return_path = ReturnPath::new("a/sum").with_data_context(&shared);
    let task = Task::new(&ids, "add", Signature::new("add", "Arithmetic").with_return_path(return_path));
    task.context().put_in_value("a/x", 1).unwrap();
    task.context().put_in_value("a/y", 1).unwrap();

    let exertion = dispatcher().exert(task.into()).unwrap();

    assert_eq!(exertion.state(), ExecState::Done);
    assert_eq!(shared.get_value("a/sum").unwrap().as_f64(), Some(2.0));
    assert!(exertion.context().get_value("a/sum").unwrap().is_absent());
}

#[test]
fn two_process_signatures_end_in_error() {
    let ids = sequential_ids();
    let task = adder(&ids, "t", 1, 2).with_signature(Signature::new("multiply", "Arithmetic"));

    let exertion = dispatcher().exert(task.into()).unwrap();

    assert_eq!(exertion.state(), ExecState::Error);
    assert_eq!(exertion.trace().len(), 1);
    assert_eq!(exertion.trace()[0].category, FailureCategory::Binding);
    assert!(exertion.context().get_value("a/sum").unwrap().is_absent());
}

#[test]
fn unknown_capability_is_a_binding_error() {
    let ids = sequential_ids();
    let task = Task::new(&ids, "t", Signature::new("sum", "Missing"));
    let exertion = dispatcher().exert(task.into()).unwrap();
    assert_eq!(exertion.state(), ExecState::Error);
    assert_eq!(exertion.trace()[0].category, FailureCategory::Binding);
}

#[test]
fn transient_failure_fails_and_fatal_failure_errors() {
    let ids = sequential_ids();
    let dispatcher = dispatcher();

    let transient = dispatcher.exert(failing(&ids, "t1", "call").into()).unwrap();
    assert_eq!(transient.state(), ExecState::Failed);
    assert_eq!(transient.trace()[0].category, FailureCategory::Invocation);
    assert!(transient.trace()[0].message.contains("service unreachable"));

    let fatal = dispatcher.exert(failing(&ids, "t2", "fatal").into()).unwrap();
    assert_eq!(fatal.state(), ExecState::Error);
}

#[test]
fn pre_and_post_run_around_process() {
    let ids = sequential_ids();
    let registry = registry();
    let order = Arc::new(Mutex::new(Vec::new()));
    let seen = order.clone();
    registry.register_instance(
        "Audit",
        provider_fn(move |selector, _| {
            seen.lock().push(selector.to_string());
            Ok(())
        }),
    );
    let task = adder(&ids, "t", 1, 2)
        .with_signature(Signature::new("after", "Audit").with_kind(OperationKind::Post))
        .with_signature(Signature::new("before", "Audit").with_kind(OperationKind::Pre));

    let exertion = Dispatcher::new(Arc::new(registry)).exert(task.into()).unwrap();

    assert_eq!(exertion.state(), ExecState::Done);
    assert_eq!(*order.lock(), vec!["before".to_string(), "after".to_string()]);
}

#[test]
fn append_control_writes_control_context() {
    let ids = sequential_ids();
    let registry = registry();
    registry.register_instance(
        "Policy",
        provider_fn(|_, context| {
            context.put_value("retries", 3)?;
            Ok(())
        }),
    );
    let task = adder(&ids, "t", 1, 2).with_signature(Signature::new("limits", "Policy").with_kind(OperationKind::AppendControl));

    let exertion = Dispatcher::new(Arc::new(registry)).exert(task.into()).unwrap();

    assert_eq!(exertion.control_context().get_value("retries").unwrap().as_i64(), Some(3));
}

struct RecordingDeployer {
    ensured: Mutex<Vec<String>>,
}

impl crate::provider::DeploymentPort for RecordingDeployer {
    fn ensure(&self, deployment_id: &str, _spec: &DeploymentSpec) -> anyhow::Result<()> {
        self.ensured.lock().push(deployment_id.to_string());
        Ok(())
    }
}

#[test]
fn deployments_need_a_deployer() {
    let ids = sequential_ids();
    let signature = Signature::new("add", "Arithmetic").with_deployment(DeploymentSpec::new("math"));
    let inputs = adder(&ids, "inputs", 1, 2).context().clone();
    let task = Task::new(&ids, "t", signature.clone()).with_context(inputs.clone());

    let exertion = dispatcher().exert(task.into()).unwrap();
    assert_eq!(exertion.state(), ExecState::Error);
    assert_eq!(exertion.trace()[0].category, FailureCategory::Binding);

    let deployer = Arc::new(RecordingDeployer {
        ensured: Mutex::new(Vec::new()),
    });
    let task = Task::new(&ids, "t", signature).with_context(inputs);
    let exertion = dispatcher().with_deployer(deployer.clone()).exert(task.into()).unwrap();
    assert_eq!(exertion.state(), ExecState::Done);
    assert_eq!(*deployer.ensured.lock(), vec!["math".to_string()]);
}

#[test]
fn only_initial_exertions_dispatch() {
    let ids = sequential_ids();
    let dispatcher = dispatcher();
    let mut exertion = Exertion::from(adder(&ids, "t", 1, 1));
    dispatcher.dispatch(&mut exertion).unwrap();

    let error = dispatcher.dispatch(&mut exertion).unwrap_err();
    assert!(matches!(error, DispatchError::NotInitial { state: ExecState::Done, .. }));

    exertion.reset();
    assert_eq!(dispatcher.dispatch(&mut exertion).unwrap(), ExecState::Done);
}

#[test]
fn pipes_order_children_and_carry_values() {
    let ids = sequential_ids();
    let consumer = Task::new(&ids, "consumer", Signature::new("double", "Pipes"));
    let producer = Task::new(&ids, "producer", Signature::new("produce", "Pipes"));
    let job = Job::new(&ids, "job")
        .with_child(consumer)
        .unwrap()
        .with_child(producer)
        .unwrap()
        .with_pipe(Pipe::new("producer", "result", "consumer", "input"));

    let job = dispatcher().exert(job.into()).unwrap();

    assert_eq!(job.state(), ExecState::Done);
    assert_eq!(job.context().get_value("consumer/doubled").unwrap().as_f64(), Some(42.0));
    assert_eq!(job.context().direction_of("consumer/input").unwrap(), Some(Direction::In));
}

#[test]
fn parallel_children_all_complete() {
    let ids = sequential_ids();
    let mut job = Job::new(&ids, "job").with_strategy(exert_types::ControlStrategy::parallel());
    for index in 0..5 {
        job.add_child(adder(&ids, &format!("t{index}"), index, 1)).unwrap();
    }
    let config = EngineConfig {
        max_parallelism: 2,
        ..EngineConfig::default()
    };

    let job = dispatcher().with_config(config).exert(job.into()).unwrap();

    assert_eq!(job.state(), ExecState::Done);
    for index in 0..5 {
        let sum = job.context().get_value(&format!("t{index}/a/sum")).unwrap();
        assert_eq!(sum.as_f64(), Some(index as f64 + 1.0));
    }
}

#[test]
fn non_critical_failure_leaves_siblings_running() {
    let ids = sequential_ids();
    let flaky = failing(&ids, "flaky", "call").with_strategy(exert_types::ControlStrategy::non_critical());
    let job = Job::new(&ids, "job")
        .with_child(adder(&ids, "first", 1, 2))
        .unwrap()
        .with_child(flaky)
        .unwrap()
        .with_child(adder(&ids, "third", 3, 4))
        .unwrap();

    let job = dispatcher().exert(job.into()).unwrap();
    let Exertion::Job(job) = job else {
        panic!("expected a job");
    };

    assert_eq!(job.core().state(), ExecState::Done);
    assert_eq!(job.child("first").unwrap().state(), ExecState::Done);
    assert_eq!(job.child("flaky").unwrap().state(), ExecState::Failed);
    assert_eq!(job.child("third").unwrap().state(), ExecState::Done);
    let attributed = job.core().trace().iter().filter(|entry| entry.exertion == "flaky").count();
    assert_eq!(attributed, 1);
}

#[test]
fn critical_failure_stops_remaining_children() {
    let ids = sequential_ids();
    let job = Job::new(&ids, "job")
        .with_child(failing(&ids, "broken", "fatal"))
        .unwrap()
        .with_child(adder(&ids, "after", 1, 2))
        .unwrap();

    let job = dispatcher().exert(job.into()).unwrap();
    let Exertion::Job(job) = job else {
        panic!("expected a job");
    };

    assert_eq!(job.core().state(), ExecState::Error);
    assert_eq!(job.child("after").unwrap().state(), ExecState::Initial);
    assert!(
        job.core()
            .trace()
            .iter()
            .any(|entry| entry.exertion == "job" && entry.category == FailureCategory::Dispatch)
    );
}

#[test]
fn failed_upstream_blocks_piped_child() {
    let ids = sequential_ids();
    let upstream = failing(&ids, "upstream", "call").with_strategy(exert_types::ControlStrategy::non_critical());
    let downstream = Task::new(&ids, "downstream", Signature::new("double", "Pipes"))
        .with_strategy(exert_types::ControlStrategy::non_critical());
    let job = Job::new(&ids, "job")
        .with_child(upstream)
        .unwrap()
        .with_child(downstream)
        .unwrap()
        .with_pipe(Pipe::new("upstream", "result", "downstream", "input"));

    let job = dispatcher().exert(job.into()).unwrap();
    let Exertion::Job(job) = job else {
        panic!("expected a job");
    };

    assert_eq!(job.child("downstream").unwrap().state(), ExecState::Failed);
    let blocked = &job.child("downstream").unwrap().trace()[0];
    assert_eq!(blocked.category, FailureCategory::Dispatch);
    assert!(blocked.message.contains("blocked"));
}

#[test]
fn pipe_cycles_end_in_error() {
    let ids = sequential_ids();
    let job = Job::new(&ids, "job")
        .with_child(adder(&ids, "a", 1, 1))
        .unwrap()
        .with_child(adder(&ids, "b", 1, 1))
        .unwrap()
        .with_pipe(Pipe::new("a", "a/sum", "b", "a/x"))
        .with_pipe(Pipe::new("b", "a/sum", "a", "a/x"));

    let job = dispatcher().exert(job.into()).unwrap();

    assert_eq!(job.state(), ExecState::Error);
    assert!(job.trace()[0].message.contains("cycle"));
}

#[test]
fn cancelled_dispatch_starts_no_children() {
    let ids = sequential_ids();
    let mut job = Exertion::from(Job::new(&ids, "job").with_child(adder(&ids, "t", 1, 2)).unwrap());
    let control = DispatchControl::new();
    control.cancel();

    let state = dispatcher().dispatch_with(&mut job, &control).unwrap();

    assert_eq!(state, ExecState::Failed);
    assert_eq!(job.as_job().unwrap().child("t").unwrap().state(), ExecState::Initial);
}

struct Transitions(Mutex<Vec<(String, ExecState)>>);

impl DispatchObserver for Transitions {
    fn state_changed(&self, exertion: &str, _kind: &'static str, state: ExecState) {
        self.0.lock().push((exertion.to_string(), state));
    }
}

#[test]
fn observer_sees_every_transition() {
    let ids = sequential_ids();
    let mut job = Exertion::from(Job::new(&ids, "job").with_child(adder(&ids, "t", 1, 2)).unwrap());
    let transitions = Arc::new(Transitions(Mutex::new(Vec::new())));
    let control = DispatchControl::new().with_observer(transitions.clone());

    dispatcher().dispatch_with(&mut job, &control).unwrap();

    let seen = transitions.0.lock().clone();
    assert_eq!(
        seen,
        vec![
            ("job".to_string(), ExecState::Running),
            ("t".to_string(), ExecState::Running),
            ("t".to_string(), ExecState::Done),
            ("job".to_string(), ExecState::Done),
        ]
    );
}

#[test]
fn loop_runs_while_condition_holds() {
    let ids = sequential_ids();
    let block = Block::new(&ids, "block").with_loop(Condition::expr("count < 3"), Some(10), counter(&ids, "increment"));
    block.context().put_value("count", 0).unwrap();

    let block = dispatcher().exert(block.into()).unwrap();

    assert_eq!(block.state(), ExecState::Done);
    assert_eq!(block.context().get_value("count").unwrap().as_f64(), Some(3.0));
}

#[test]
fn loop_stops_at_its_bound() {
    let ids = sequential_ids();
    let block = Block::new(&ids, "block").with_loop(Condition::Always, None, counter(&ids, "increment"));
    block.context().put_value("count", 0).unwrap();
    let config = EngineConfig {
        max_loop_iterations: 4,
        ..EngineConfig::default()
    };

    let block = dispatcher().with_config(config).exert(block.into()).unwrap();

    assert_eq!(block.state(), ExecState::Done);
    assert_eq!(block.context().get_value("count").unwrap().as_f64(), Some(4.0));
}

#[test]
fn loop_bound_is_exhausted_only_while_guard_holds() {
    let ids = sequential_ids();
    let context = Context::new(&ids, "block");
    context.put_value("count", 3).unwrap();
    let guard = Condition::expr("count < 3");

    assert!(!block::exhausted(&guard, &context, 3, 3));
    assert!(!block::exhausted(&Condition::Always, &context, 2, 3));
    assert!(block::exhausted(&Condition::Always, &context, 3, 3));

    let block = Block::new(&ids, "block").with_loop(guard, Some(3), counter(&ids, "increment"));
    block.context().put_value("count", 0).unwrap();
    let block = dispatcher().exert(block.into()).unwrap();
    assert_eq!(block.state(), ExecState::Done);
    assert_eq!(block.context().get_value("count").unwrap().as_f64(), Some(3.0));
}

#[test]
fn optional_and_alternative_items_follow_conditions() {
    let ids = sequential_ids();
    let block = Block::new(&ids, "block")
        .with_opt(Condition::expr("enabled"), counter(&ids, "skipped"))
        .with_alt(vec![
            (Condition::expr("mode == 'fast'"), counter(&ids, "fast").into()),
            (Condition::Always, adder(&ids, "slow", 2, 2).into()),
        ]);
    block.context().put_value("enabled", false).unwrap();
    block.context().put_value("mode", "slow").unwrap();

    let block = dispatcher().exert(block.into()).unwrap();
    let Exertion::Block(block) = block else {
        panic!("expected a block");
    };

    assert_eq!(block.core().state(), ExecState::Done);
    let states: Vec<ExecState> = block
        .items()
        .iter()
        .flat_map(|item| item.units())
        .map(Exertion::state)
        .collect();
    assert_eq!(states, vec![ExecState::Initial, ExecState::Initial, ExecState::Done]);
    assert_eq!(block.context().get_value("a/sum").unwrap().as_f64(), Some(4.0));
}

#[test]
fn unit_sees_block_context() {
    let ids = sequential_ids();
    let block = Block::new(&ids, "block").with_unit(Task::new(&ids, "add", Signature::new("add", "Arithmetic")));
    block.context().put_in_value("a/x", 10).unwrap();
    block.context().put_in_value("a/y", 5).unwrap();

    let block = dispatcher().exert(block.into()).unwrap();

    assert_eq!(block.state(), ExecState::Done);
    assert_eq!(block.context().get_value("a/sum").unwrap().as_f64(), Some(15.0));
}

#[test]
fn guard_failure_is_traced_and_skips_item() {
    let ids = sequential_ids();
    let block = Block::new(&ids, "block").with_opt(
        Condition::check(|_| anyhow::bail!("sensor offline")),
        counter(&ids, "guarded"),
    );

    let block = dispatcher().exert(block.into()).unwrap();

    assert_eq!(block.state(), ExecState::Done);
    assert_eq!(block.trace().len(), 1);
    assert_eq!(block.trace()[0].category, FailureCategory::Evaluation);
}

#[test]
fn critical_unit_failure_stops_block() {
    let ids = sequential_ids();
    let block = Block::new(&ids, "block")
        .with_unit(failing(&ids, "broken", "call"))
        .with_unit(counter(&ids, "never"));
    block.context().put_value("count", 0).unwrap();

    let block = dispatcher().exert(block.into()).unwrap();

    assert_eq!(block.state(), ExecState::Failed);
    assert_eq!(block.context().get_value("count").unwrap().as_f64(), Some(0.0));
}

#[test]
fn morphing_fidelity_switches_after_observing_result() {
    let ids = sequential_ids();
    let calls = Arc::new(AtomicUsize::new(0));
    let counted = calls.clone();
    let registry = registry();
    registry.register_instance(
        "Estimator",
        provider_fn(move |selector, context| {
            counted.fetch_add(1, Ordering::SeqCst);
            let error = if selector == "quick" { 0.4 } else { 0.01 };
            context.put_out_value("error", error)?;
            Ok(())
        }),
    );
    let fidelity = Fidelity::new(
        "estimate",
        vec![Signature::new("quick", "Estimator"), Signature::new("precise", "Estimator")],
    )
    .with_morpher(|_, observed: &Lookup| {
        let error = observed.as_context()?.get_value("error").ok()?.as_f64()?;
        (error > 0.1).then_some(1)
    });
    let dispatcher = Dispatcher::new(Arc::new(registry));

    let mut exertion = Exertion::from(Task::from_fidelity(&ids, "estimate", fidelity));
    dispatcher.dispatch(&mut exertion).unwrap();
    let task = exertion.as_task().unwrap();
    assert_eq!(task.fidelity("estimate").unwrap().selected_index(), 1);
    assert_eq!(task.context().get_value("error").unwrap().as_f64(), Some(0.4));

    exertion.reset();
    dispatcher.dispatch(&mut exertion).unwrap();
    assert_eq!(exertion.context().get_value("error").unwrap().as_f64(), Some(0.01));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}
