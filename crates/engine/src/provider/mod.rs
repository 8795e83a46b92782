//! Ports to the collaborators the core binds against, plus in-process implementations.
//!
//! Modules:
//! - `registry`: capability registry answering the lookup port from factories
//! - `store`: in-memory persistence port
//! - `null`: provider that returns its input unchanged

mod null;
mod registry;
mod store;

use std::{fmt, sync::Arc};

use exert_types::DeploymentSpec;
use serde::{Deserialize, Serialize};

pub use null::NullProvider;
pub use registry::{CapabilityRegistry, ProviderFactory};
pub use store::MemoryStore;

use crate::{
    context::{Context, Value},
    error::{BindingError, InvocationFailure},
    exertion::Exertion,
    signature::Signature,
};

/// Concrete implementation of one or more selectors.
pub trait Provider: Send + Sync {
    /// Runs `selector` against `context` and returns the result context.
    fn exec(&self, selector: &str, context: Context) -> Result<Context, InvocationFailure>;
}

/// Bindable implementation reference returned by the lookup port.
#[derive(Clone)]
pub struct ProviderHandle {
    /// Capability type the signature was resolved under.
    pub capability: String,
    pub selector: String,
    pub provider: Arc<dyn Provider>,
}

impl fmt::Debug for ProviderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderHandle")
            .field("capability", &self.capability)
            .field("selector", &self.selector)
            .finish()
    }
}

/// Resolves a signature's capability to an implementation.
pub trait LookupPort: Send + Sync {
    fn resolve(&self, signature: &Signature) -> Result<ProviderHandle, BindingError>;
}

/// The call boundary; possibly remote.
pub trait InvocationPort: Send + Sync {
    fn invoke(&self, handle: &ProviderHandle, context: Context) -> Result<Context, InvocationFailure>;
}

/// Makes sure a signature's deployment requirements are provisioned before lookup.
pub trait DeploymentPort: Send + Sync {
    fn ensure(&self, deployment_id: &str, spec: &DeploymentSpec) -> anyhow::Result<()>;
}

/// Opaque store key of a persisted value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference(pub String);

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// External store backing persistent entries.
pub trait PersistencePort: Send + Sync {
    fn store(&self, value: &Value) -> anyhow::Result<Reference>;
    fn load(&self, reference: &Reference) -> anyhow::Result<Value>;
}

/// Front end turning source text into an exertion tree.
pub trait ParserPort: Send + Sync {
    fn parse(&self, source: &str) -> anyhow::Result<Exertion>;
}

/// Invokes providers in-process.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalInvoker;

impl InvocationPort for LocalInvoker {
    fn invoke(&self, handle: &ProviderHandle, context: Context) -> Result<Context, InvocationFailure> {
        handle.provider.exec(&handle.selector, context)
    }
}

struct FnProvider<F> {
    operation: F,
}

impl<F> Provider for FnProvider<F>
where
    F: Fn(&str, &Context) -> anyhow::Result<()> + Send + Sync,
{
    fn exec(&self, selector: &str, context: Context) -> Result<Context, InvocationFailure> {
        match (self.operation)(selector, &context) {
            Ok(()) => Ok(context),
            Err(error) => Err(match error.downcast::<InvocationFailure>() {
                Ok(failure) => failure,
                Err(other) => InvocationFailure::transient(format!("{other:#}")),
            }),
        }
    }
}

/// Wraps a closure that works on the input context in place as a provider.
///
/// Returning an [`InvocationFailure`] (through `anyhow`) keeps its kind; any other
/// error is reported as a transient failure.
pub fn provider_fn<F>(operation: F) -> Arc<dyn Provider>
where
    F: Fn(&str, &Context) -> anyhow::Result<()> + Send + Sync + 'static,
{
    Arc::new(FnProvider { operation })
}
