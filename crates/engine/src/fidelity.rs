//! Runtime-selectable alternatives for one role.

use std::{fmt, sync::Arc};

use tracing::debug;

use crate::{context::Lookup, error::BindingError, signature::Signature};

/// Callback run after each use of a fidelity with the observed result; returning an
/// index changes the selection for later uses.
pub type Morpher<T> = Arc<dyn Fn(&Fidelity<T>, &Lookup) -> Option<usize> + Send + Sync>;

/// Named, ordered alternatives with a current selection.
#[derive(Clone)]
pub struct Fidelity<T> {
    name: String,
    alternatives: Vec<T>,
    selected: usize,
    morpher: Option<Morpher<T>>,
}

impl<T> Fidelity<T> {
    pub fn new(name: impl Into<String>, alternatives: Vec<T>) -> Self {
        Self {
            name: name.into(),
            alternatives,
            selected: 0,
            morpher: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn alternatives(&self) -> &[T] {
        &self.alternatives
    }

    pub fn len(&self) -> usize {
        self.alternatives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alternatives.is_empty()
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn selected(&self) -> Option<&T> {
        self.alternatives.get(self.selected)
    }

    pub fn select(&mut self, index: usize) -> Result<(), BindingError> {
        if index >= self.alternatives.len() {
            return Err(BindingError::UnknownAlternative {
                fidelity: self.name.clone(),
                alternative: index.to_string(),
            });
        }
        self.selected = index;
        Ok(())
    }

    /// Selects `index` and installs `morpher` for adaptive reselection.
    pub fn select_morphing<F>(&mut self, index: usize, morpher: F) -> Result<(), BindingError>
    where
        F: Fn(&Fidelity<T>, &Lookup) -> Option<usize> + Send + Sync + 'static,
    {
        self.select(index)?;
        self.morpher = Some(Arc::new(morpher));
        Ok(())
    }

    pub fn with_morpher<F>(mut self, morpher: F) -> Self
    where
        F: Fn(&Fidelity<T>, &Lookup) -> Option<usize> + Send + Sync + 'static,
    {
        self.morpher = Some(Arc::new(morpher));
        self
    }

    pub fn is_morphing(&self) -> bool {
        self.morpher.is_some()
    }

    /// Runs the morpher against `observed`. Returns true when the selection changed.
    pub fn morph(&mut self, observed: &Lookup) -> bool {
        let Some(morpher) = self.morpher.clone() else {
            return false;
        };
        match morpher(self, observed) {
            Some(next) if next != self.selected && next < self.alternatives.len() => {
                debug!(fidelity = %self.name, from = self.selected, to = next, "fidelity morphed");
                self.selected = next;
                true
            }
            _ => false,
        }
    }
}

impl Fidelity<Signature> {
    /// Selects the alternative whose signature is named `name`.
    pub fn select_named(&mut self, name: &str) -> Result<(), BindingError> {
        let index = self
            .alternatives
            .iter()
            .position(|signature| signature.name == name)
            .ok_or_else(|| BindingError::UnknownAlternative {
                fidelity: self.name.clone(),
                alternative: name.to_string(),
            })?;
        self.selected = index;
        Ok(())
    }
}

impl<T: fmt::Debug> fmt::Debug for Fidelity<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fidelity")
            .field("name", &self.name)
            .field("alternatives", &self.alternatives)
            .field("selected", &self.selected)
            .field("morphing", &self.morpher.is_some())
            .finish()
    }
}
