//! # Exert Engine
//!
//! The exert engine stores data in path-addressed contexts and dispatches trees of
//! exertions (tasks, jobs and blocks) whose operations are bound at run time through
//! a capability registry.
//!
//! ## Key Features
//!
//! - **Context store**: `/`-separated paths, direction tags, composite attributes, links
//!   between contexts and lazily computed entries
//! - **Late binding**: signatures name a capability type and a selector; the lookup port
//!   resolves them to providers when the task runs
//! - **Fidelities**: swappable alternatives for a signature role, optionally re-selected
//!   after every use
//! - **Dispatch**: sequential or parallel jobs with pipes, guarded and looping blocks, and
//!   an exception trace on every exertion
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use exert_engine::{CapabilityRegistry, Dispatcher, Exertion, Signature, Task, provider_fn, sequential_ids};
//! use exert_types::ExecState;
//!
//! let registry = CapabilityRegistry::new();
//! registry.register_instance(
//!     "Adder",
//!     provider_fn(|_, context| {
//!         let x = context.get_value("a/x")?.as_f64().unwrap_or_default();
//!         let y = context.get_value("a/y")?.as_f64().unwrap_or_default();
//!         context.put_out_value("a/sum", x + y)?;
//!         Ok(())
//!     }),
//! );
//!
//! let ids = sequential_ids();
//! let task = Task::new(&ids, "sum", Signature::new("sum", "Adder"));
//! task.context().put_in_value("a/x", 5)?;
//! task.context().put_in_value("a/y", 7)?;
//!
//! let dispatcher = Dispatcher::new(Arc::new(registry));
//! let task = dispatcher.exert(Exertion::from(task))?;
//! assert_eq!(task.state(), ExecState::Done);
//! assert_eq!(task.context().get_value("a/sum")?.as_f64(), Some(12.0));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! - **`context`**: the context store, entries, attributes and links
//! - **`signature`** / **`fidelity`**: operation descriptors and their alternatives
//! - **`provider`**: ports to external collaborators and the capability registry
//! - **`exertion`**: the task/job/block tree
//! - **`executor`**: the dispatcher and the async dispatch session
//! - **`condition`**: guards for block items

pub mod condition;
pub mod context;
pub mod error;
pub mod executor;
pub mod exertion;
pub mod fidelity;
pub mod ids;
pub mod provider;
pub mod signature;

// Re-export commonly used types for convenience
pub use condition::{Condition, eval_condition};
pub use context::{Context, ContextBuilder, Entry, EntryRole, Link, Lookup, Value};
pub use error::{BindingError, ContextError, DispatchError, EvaluationError, ExertError, FailureKind, InvocationFailure};
pub use executor::{
    DispatchControl, DispatchEvent, DispatchObserver, DispatchRequest, Dispatcher, SessionControl, dispatch_blocking,
    drive_exertion,
};
pub use exertion::{Block, BlockItem, Exertion, ExertionCore, Job, Pipe, SignatureSlot, Task};
pub use fidelity::Fidelity;
pub use ids::{IdGenerator, SequentialIds, SharedIds, sequential_ids};
pub use provider::{
    CapabilityRegistry, DeploymentPort, InvocationPort, LocalInvoker, LookupPort, MemoryStore, NullProvider, ParserPort,
    PersistencePort, Provider, ProviderHandle, Reference, provider_fn,
};
pub use signature::{ReturnPath, Signature};
