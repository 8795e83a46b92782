use std::{collections::HashMap, sync::Arc};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use super::{LookupPort, Provider, ProviderHandle};
use crate::{error::BindingError, signature::Signature};

/// Builds a provider for a capability type.
pub type ProviderFactory = Arc<dyn Fn() -> Arc<dyn Provider> + Send + Sync>;

/// Lookup port backed by capability-type factories populated at startup.
///
/// A signature resolves under its capability type first, then under each of its match
/// types. Each factory runs at most once; the instance is cached and shared.
#[derive(Default)]
pub struct CapabilityRegistry {
    factories: RwLock<HashMap<String, ProviderFactory>>,
    instances: Mutex<HashMap<String, Arc<dyn Provider>>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `factory` for `capability`, replacing any earlier registration.
    pub fn register<F>(&self, capability: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn Provider> + Send + Sync + 'static,
    {
        let capability = capability.into();
        self.instances.lock().remove(&capability);
        info!(capability = %capability, "registered capability factory");
        self.factories.write().insert(capability, Arc::new(factory));
    }

    /// Registers an already built provider for `capability`.
    pub fn register_instance(&self, capability: impl Into<String>, provider: Arc<dyn Provider>) {
        let capability = capability.into();
        self.factories.write().remove(&capability);
        info!(capability = %capability, "registered capability instance");
        self.instances.lock().insert(capability, provider);
    }

    pub fn contains(&self, capability: &str) -> bool {
        self.factories.read().contains_key(capability) || self.instances.lock().contains_key(capability)
    }

    /// Registered capability types, sorted.
    pub fn capabilities(&self) -> Vec<String> {
        let mut capabilities: Vec<String> = self.factories.read().keys().cloned().collect();
        capabilities.extend(self.instances.lock().keys().cloned());
        capabilities.sort();
        capabilities.dedup();
        capabilities
    }

    fn instance(&self, capability: &str) -> Option<Arc<dyn Provider>> {
        if let Some(provider) = self.instances.lock().get(capability) {
            return Some(provider.clone());
        }
        let factory = self.factories.read().get(capability).cloned()?;
        let provider = factory();
        debug!(capability, "instantiated provider");
        let mut instances = self.instances.lock();
        Some(instances.entry(capability.to_string()).or_insert(provider).clone())
    }
}

impl LookupPort for CapabilityRegistry {
    fn resolve(&self, signature: &Signature) -> Result<ProviderHandle, BindingError> {
        for capability in signature.candidate_types() {
            if let Some(provider) = self.instance(capability) {
                debug!(
                    signature = %signature.name,
                    capability,
                    selector = %signature.selector,
                    "resolved signature"
                );
                return Ok(ProviderHandle {
                    capability: capability.to_string(),
                    selector: signature.selector.clone(),
                    provider,
                });
            }
        }
        Err(BindingError::NotFound {
            capability: signature.capability.clone(),
            selector: signature.selector.clone(),
        })
    }
}
