//! Named value slots, optionally computed on demand or kept in an external store.

use std::{collections::HashSet, fmt, sync::Arc};

use exert_types::{Direction, path::strip_prefix};
use parking_lot::Mutex;
use tracing::debug;

use super::{Context, value::{Lookup, Value}};
use crate::{
    error::{BoxError, EvaluationError},
    fidelity::Fidelity,
    provider::{PersistencePort, Reference},
};

/// Deferred computation of an entry, evaluated against the requesting context.
pub type ComputeFn = Arc<dyn Fn(&Context) -> anyhow::Result<Option<Value>> + Send + Sync>;

/// Data-flow role an entry takes when it is placed into a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntryRole {
    #[default]
    Plain,
    Input,
    Output,
    Inout,
}

impl EntryRole {
    pub fn direction(self) -> Option<Direction> {
        match self {
            EntryRole::Plain => None,
            EntryRole::Input => Some(Direction::In),
            EntryRole::Output => Some(Direction::Out),
            EntryRole::Inout => Some(Direction::Inout),
        }
    }
}

enum Source {
    Stored,
    Computed(ComputeFn),
    Persistent(Arc<dyn PersistencePort>),
    Fidelity(Mutex<Fidelity<Value>>),
}

#[derive(Default)]
struct EntryState {
    value: Option<Value>,
    valid: bool,
    reference: Option<Reference>,
}

/// A named value slot.
///
/// A computed entry caches its result until [`Entry::invalidate`] is called, which the
/// owning context does whenever a path the entry depends on is written. Entries without
/// declared dependencies are invalidated by any write to their context.
pub struct Entry {
    name: String,
    role: EntryRole,
    depends_on: Vec<String>,
    source: Source,
    state: Mutex<EntryState>,
}

impl Entry {
    /// Plain entry holding `value`; `None` stores the none sentinel.
    pub fn new(name: impl Into<String>, value: Option<Value>) -> Self {
        Self::with_source(
            name,
            Source::Stored,
            EntryState {
                value,
                valid: true,
                reference: None,
            },
        )
    }

    /// Entry whose value is produced by `compute` on first read.
    pub fn computed<F>(name: impl Into<String>, compute: F) -> Self
    where
        F: Fn(&Context) -> anyhow::Result<Option<Value>> + Send + Sync + 'static,
    {
        Self::with_source(name, Source::Computed(Arc::new(compute)), EntryState::default())
    }

    /// Entry whose value lives in `store`; writes are redirected there.
    pub fn persistent(name: impl Into<String>, store: Arc<dyn PersistencePort>) -> Self {
        Self::with_source(name, Source::Persistent(store), EntryState::default())
    }

    /// Entry answering with the selected alternative of `fidelity`.
    pub fn from_fidelity(name: impl Into<String>, fidelity: Fidelity<Value>) -> Self {
        Self::with_source(name, Source::Fidelity(Mutex::new(fidelity)), EntryState::default())
    }

    fn with_source(name: impl Into<String>, source: Source, state: EntryState) -> Self {
        Self {
            name: name.into(),
            role: EntryRole::Plain,
            depends_on: Vec::new(),
            source,
            state: Mutex::new(state),
        }
    }

    pub fn with_role(mut self, role: EntryRole) -> Self {
        self.role = role;
        self
    }

    /// Restricts invalidation to writes at or around `paths`.
    pub fn depends_on<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> EntryRole {
        self.role
    }

    pub fn is_persistent(&self) -> bool {
        matches!(self.source, Source::Persistent(_))
    }

    pub fn is_computed(&self) -> bool {
        matches!(self.source, Source::Computed(_))
    }

    /// False once invalidated and until the next evaluation.
    pub fn is_valid(&self) -> bool {
        self.state.lock().valid
    }

    /// Store reference of a persistent entry, once written.
    pub fn reference(&self) -> Option<Reference> {
        self.state.lock().reference.clone()
    }

    /// True when a write at `path` must invalidate this entry.
    pub fn depends_on_path(&self, path: &str) -> bool {
        if !self.is_computed() {
            return false;
        }
        self.depends_on.is_empty()
            || self
                .depends_on
                .iter()
                .any(|dependency| strip_prefix(path, dependency).is_some() || strip_prefix(dependency, path).is_some())
    }

    /// Resolves this entry one level; nested entries and models are left to the caller.
    pub fn evaluate(&self, scope: &Context) -> Result<Lookup, EvaluationError> {
        self.resolve(scope, true)
    }

    /// Like [`Entry::evaluate`], but a computed entry neither reads nor fills its cache.
    ///
    /// Used when a context other than the owner asks, since the owner's invalidation
    /// cannot see writes made to that context.
    pub fn evaluate_uncached(&self, scope: &Context) -> Result<Lookup, EvaluationError> {
        self.resolve(scope, false)
    }

    fn resolve(&self, scope: &Context, cache: bool) -> Result<Lookup, EvaluationError> {
        match &self.source {
            Source::Stored => Ok(Lookup::from(self.state.lock().value.clone())),
            Source::Computed(compute) if !cache => {
                debug!(entry = %self.name, scope = %scope.name(), "computing entry for a foreign scope");
                let computed = compute(scope).map_err(|error| EvaluationError::new(&self.name, error))?;
                Ok(Lookup::from(normalize(computed)))
            }
            Source::Computed(compute) => {
                {
                    let state = self.state.lock();
                    if state.valid {
                        return Ok(Lookup::from(state.value.clone()));
                    }
                }
                debug!(entry = %self.name, scope = %scope.name(), "computing entry");
                let computed = compute(scope).map_err(|error| EvaluationError::new(&self.name, error))?;
                let computed = normalize(computed);
                let mut state = self.state.lock();
                state.value = computed.clone();
                state.valid = true;
                Ok(Lookup::from(computed))
            }
            Source::Persistent(store) => {
                let Some(reference) = self.reference() else {
                    return Ok(Lookup::FoundNone);
                };
                let loaded = store
                    .load(&reference)
                    .map_err(|error| EvaluationError::new(&self.name, error))?;
                Ok(Lookup::from(normalize(Some(loaded))))
            }
            Source::Fidelity(fidelity) => {
                let mut fidelity = fidelity.lock();
                let selected = fidelity.selected().cloned();
                let Some(selected) = selected else {
                    let cause: BoxError = format!("fidelity '{}' has no alternatives", fidelity.name()).into();
                    return Err(EvaluationError::new(&self.name, cause));
                };
                let observed = Lookup::Found(selected);
                fidelity.morph(&observed);
                Ok(observed)
            }
        }
    }

    /// Selects the alternative answering a fidelity-backed entry.
    pub fn select(&self, index: usize) -> Result<(), crate::error::BindingError> {
        match &self.source {
            Source::Fidelity(fidelity) => fidelity.lock().select(index),
            _ => Err(crate::error::BindingError::UnknownFidelity(self.name.clone())),
        }
    }

    /// Index of the selected alternative of a fidelity-backed entry.
    pub fn selected_index(&self) -> Option<usize> {
        match &self.source {
            Source::Fidelity(fidelity) => Some(fidelity.lock().selected_index()),
            _ => None,
        }
    }

    /// Writes `value` into a persistent entry's store, or replaces a plain entry's value.
    pub(crate) fn assign(&self, value: Option<Value>) -> Result<(), BoxError> {
        let value = normalize(value);
        match &self.source {
            Source::Persistent(store) => {
                let reference = match &value {
                    Some(value) => Some(store.store(value)?),
                    None => None,
                };
                self.state.lock().reference = reference;
                Ok(())
            }
            _ => {
                let mut state = self.state.lock();
                state.value = value;
                state.valid = true;
                Ok(())
            }
        }
    }

    /// Marks a cached value stale, cascading into nested entries and contexts.
    pub fn invalidate(&self) {
        let mut visited = HashSet::new();
        self.invalidate_with(&mut visited);
    }

    pub(crate) fn invalidate_with(&self, visited: &mut HashSet<usize>) {
        if !visited.insert(self as *const Entry as usize) {
            return;
        }
        let cached = {
            let mut state = self.state.lock();
            if self.is_computed() {
                state.valid = false;
            }
            state.value.clone()
        };
        match cached {
            Some(Value::Entry(nested)) => nested.invalidate_with(visited),
            Some(Value::Context(nested)) => nested.invalidate_entries_with(visited),
            _ => {}
        }
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.source {
            Source::Stored => "stored",
            Source::Computed(_) => "computed",
            Source::Persistent(_) => "persistent",
            Source::Fidelity(_) => "fidelity",
        };
        f.debug_struct("Entry")
            .field("name", &self.name)
            .field("role", &self.role)
            .field("kind", &kind)
            .finish()
    }
}

fn normalize(value: Option<Value>) -> Option<Value> {
    match value {
        Some(Value::Json(serde_json::Value::Null)) => None,
        other => other,
    }
}
