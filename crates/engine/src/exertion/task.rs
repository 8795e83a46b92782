use exert_types::{ControlStrategy, deployment_id};
use indexmap::IndexMap;

use super::ExertionCore;
use crate::{context::Context, error::BindingError, fidelity::Fidelity, ids::SharedIds, signature::Signature};

/// Where a task takes one of its signatures from.
#[derive(Debug, Clone)]
pub enum SignatureSlot {
    Fixed(Signature),
    /// The selected alternative of the named fidelity.
    Role(String),
}

/// Atomic unit of work bound to one or more signatures.
#[derive(Debug)]
pub struct Task {
    pub(crate) core: ExertionCore,
    slots: Vec<SignatureSlot>,
    fidelities: IndexMap<String, Fidelity<Signature>>,
}

impl Task {
    pub fn new(ids: &SharedIds, name: impl Into<String>, signature: Signature) -> Self {
        Self {
            core: ExertionCore::new(ids, "task", name),
            slots: vec![SignatureSlot::Fixed(signature)],
            fidelities: IndexMap::new(),
        }
    }

    /// Task whose signature role is answered by `fidelity`.
    pub fn from_fidelity(ids: &SharedIds, name: impl Into<String>, fidelity: Fidelity<Signature>) -> Self {
        let mut task = Self {
            core: ExertionCore::new(ids, "task", name),
            slots: Vec::new(),
            fidelities: IndexMap::new(),
        };
        task.push_fidelity(fidelity);
        task
    }

    pub fn with_signature(mut self, signature: Signature) -> Self {
        self.slots.push(SignatureSlot::Fixed(signature));
        self
    }

    pub fn with_fidelity(mut self, fidelity: Fidelity<Signature>) -> Self {
        self.push_fidelity(fidelity);
        self
    }

    fn push_fidelity(&mut self, fidelity: Fidelity<Signature>) {
        let name = fidelity.name().to_string();
        if self.fidelities.insert(name.clone(), fidelity).is_none() {
            self.slots.push(SignatureSlot::Role(name));
        }
    }

    /// Uses `context` as the task's data context.
    pub fn with_context(mut self, context: Context) -> Self {
        self.core.set_context(context);
        self
    }

    pub fn with_strategy(mut self, strategy: ControlStrategy) -> Self {
        self.core.set_strategy(strategy);
        self
    }

    pub fn core(&self) -> &ExertionCore {
        &self.core
    }

    pub fn context(&self) -> &Context {
        self.core.context()
    }

    pub fn slots(&self) -> &[SignatureSlot] {
        &self.slots
    }

    pub fn fidelity(&self, name: &str) -> Option<&Fidelity<Signature>> {
        self.fidelities.get(name)
    }

    pub(crate) fn fidelities_mut(&mut self) -> impl Iterator<Item = &mut Fidelity<Signature>> {
        self.fidelities.values_mut()
    }

    /// Switches which alternative answers the fidelity's role.
    pub fn select_fidelity(&mut self, fidelity: &str, index: usize) -> Result<(), BindingError> {
        self.fidelities
            .get_mut(fidelity)
            .ok_or_else(|| BindingError::UnknownFidelity(fidelity.to_string()))?
            .select(index)
    }

    pub fn select_fidelity_named(&mut self, fidelity: &str, signature: &str) -> Result<(), BindingError> {
        self.fidelities
            .get_mut(fidelity)
            .ok_or_else(|| BindingError::UnknownFidelity(fidelity.to_string()))?
            .select_named(signature)
    }

    /// Signatures bound right now, fidelity roles resolved to their selection.
    pub fn active_signatures(&self) -> Result<Vec<Signature>, BindingError> {
        self.slots
            .iter()
            .map(|slot| match slot {
                SignatureSlot::Fixed(signature) => Ok(signature.clone()),
                SignatureSlot::Role(name) => self
                    .fidelities
                    .get(name)
                    .ok_or_else(|| BindingError::UnknownFidelity(name.clone()))?
                    .selected()
                    .cloned()
                    .ok_or_else(|| BindingError::UnknownAlternative {
                        fidelity: name.clone(),
                        alternative: "<none>".to_string(),
                    }),
            })
            .collect()
    }

    /// The single active process signature.
    pub fn process_signature(&self) -> Result<Signature, BindingError> {
        let signatures = self.active_signatures()?;
        let mut process = signatures.into_iter().filter(|signature| signature.kind.is_process());
        let Some(first) = process.next() else {
            return Err(BindingError::NoProcessSignature {
                exertion: self.core.name().to_string(),
            });
        };
        let rest: Vec<Signature> = process.collect();
        if !rest.is_empty() {
            let mut names = vec![first.name];
            names.extend(rest.into_iter().map(|signature| signature.name));
            return Err(BindingError::Ambiguous {
                exertion: self.core.name().to_string(),
                signatures: names,
            });
        }
        Ok(first)
    }

    /// Identifier of the deployment the active signatures require, if any.
    pub fn deployment_id(&self) -> Option<String> {
        let signatures = self.active_signatures().ok()?;
        let names: Vec<&str> = signatures
            .iter()
            .filter_map(|signature| signature.deployment.as_ref().map(|deployment| deployment.name.as_str()))
            .collect();
        if names.is_empty() { None } else { Some(deployment_id(names)) }
    }
}
