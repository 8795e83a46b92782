//! Strongly typed vocabulary shared by the exertion engine and the collaborators it talks to.
//!
//! Everything here is plain data: it serializes with serde so lookup, deployment and
//! persistence collaborators can exchange it without depending on the engine itself.

pub mod deployment;
pub mod direction;
pub mod kind;
pub mod path;
pub mod state;
pub mod strategy;
pub mod trace;

pub use deployment::{DeploymentSpec, deployment_id};
pub use direction::{Direction, ParseDirectionError};
pub use kind::OperationKind;
pub use path::{APS, CLOSURE_PATH, CPS, DEFAULT_RETURN_PATH, SELF};
pub use state::ExecState;
pub use strategy::{Access, ControlStrategy, Flow};
pub use trace::{FailureCategory, TraceEntry};
