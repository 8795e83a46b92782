//! Path-addressed, directionally tagged, attribute-indexed data container.
//!
//! A [`Context`] is a cheap handle (`Arc`) over shared state guarded by a read/write lock,
//! so tasks running in parallel may read and write the same context. Every mutating call
//! (`put_*`, `mark`, `append`, `link`) validates first and then applies its change under a
//! single write lock; there is no locking across contexts.
//!
//! Paths are `/`-separated. A path starting with a link's path descends into the linked
//! context with the remaining suffix resolved there.

mod attributes;
mod entry;
mod link;
mod value;

use std::{
    collections::HashSet,
    fmt,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use exert_types::{CLOSURE_PATH, DEFAULT_RETURN_PATH, Direction, SELF, path::strip_prefix};
use exert_util::EngineConfig;
use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::debug;

pub use attributes::{CONTEXT_PARAMETER, DIRECTION_ATTRIBUTE};
pub use entry::{ComputeFn, Entry, EntryRole};
pub use link::Link;
pub use value::{Lookup, Value};

use attributes::{AttributeIndex, parse_composite};
use link::Mapping;
use value::Slot;

use crate::{
    error::{ContextError, EvaluationError},
    ids::SharedIds,
    signature::ReturnPath,
};

/// Hop limit used when no configuration is supplied.
pub const DEFAULT_MAX_LINK_DEPTH: usize = 32;

/// Shared handle to a context.
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

pub(crate) struct ContextInner {
    id: String,
    name: String,
    ids: SharedIds,
    scope: Option<Context>,
    max_link_depth: AtomicUsize,
    state: RwLock<ContextState>,
}

#[derive(Default)]
struct ContextState {
    slots: IndexMap<String, Slot>,
    attributes: AttributeIndex,
    return_path: Option<ReturnPath>,
    model: bool,
}

/// Builder for contexts that need a scope, a return path or a custom hop limit.
pub struct ContextBuilder {
    ids: SharedIds,
    name: String,
    scope: Option<Context>,
    max_link_depth: usize,
    return_path: Option<ReturnPath>,
    model: bool,
}

impl ContextBuilder {
    /// Parent consulted by [`Context::get_value`] when a path resolves to nothing.
    pub fn scope(mut self, scope: &Context) -> Self {
        self.scope = Some(scope.clone());
        self
    }

    pub fn max_link_depth(mut self, depth: usize) -> Self {
        self.max_link_depth = depth;
        self
    }

    pub fn config(self, config: &EngineConfig) -> Self {
        self.max_link_depth(config.max_link_depth)
    }

    pub fn return_path(mut self, return_path: ReturnPath) -> Self {
        self.return_path = Some(return_path);
        self
    }

    /// A model context evaluates to its return value when read through another context.
    pub fn model(mut self) -> Self {
        self.model = true;
        self
    }

    pub fn build(self) -> Context {
        let id = self.ids.next_id("ctx");
        Context {
            inner: Arc::new(ContextInner {
                id,
                name: self.name,
                ids: self.ids,
                scope: self.scope,
                max_link_depth: AtomicUsize::new(self.max_link_depth),
                state: RwLock::new(ContextState {
                    return_path: self.return_path,
                    model: self.model,
                    ..ContextState::default()
                }),
            }),
        }
    }
}

impl Context {
    pub fn new(ids: &SharedIds, name: impl Into<String>) -> Self {
        Self::builder(ids, name).build()
    }

    pub fn builder(ids: &SharedIds, name: impl Into<String>) -> ContextBuilder {
        ContextBuilder {
            ids: ids.clone(),
            name: name.into(),
            scope: None,
            max_link_depth: DEFAULT_MAX_LINK_DEPTH,
            return_path: None,
            model: false,
        }
    }

    /// Empty context sharing this one's id generator and hop limit.
    pub fn child(&self, name: impl Into<String>) -> Context {
        Self::builder(&self.inner.ids, name)
            .max_link_depth(self.max_link_depth())
            .build()
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Hop limit applied to link resolution starting in this context.
    pub fn max_link_depth(&self) -> usize {
        self.inner.max_link_depth.load(Ordering::Relaxed)
    }

    pub fn set_max_link_depth(&self, depth: usize) {
        self.inner.max_link_depth.store(depth, Ordering::Relaxed);
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn ids(&self) -> &SharedIds {
        &self.inner.ids
    }

    pub fn scope(&self) -> Option<&Context> {
        self.inner.scope.as_ref()
    }

    pub fn ptr_eq(&self, other: &Context) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn address(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }

    pub fn is_model(&self) -> bool {
        self.inner.state.read().model
    }

    pub fn set_model(&self, model: bool) {
        self.inner.state.write().model = model;
    }

    pub fn return_path(&self) -> Option<ReturnPath> {
        self.inner.state.read().return_path.clone()
    }

    pub fn set_return_path(&self, return_path: ReturnPath) {
        self.inner.state.write().return_path = Some(return_path);
    }

    /// Number of local slots, links included.
    pub fn len(&self) -> usize {
        self.inner.state.read().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw value at `path`, following links but not evaluating entries or models.
    pub fn get(&self, path: &str) -> Result<Lookup, ContextError> {
        if path == SELF {
            return Ok(Lookup::Found(Value::Context(self.clone())));
        }
        let Mapping { context, key } = self.locate(path)?;
        if key.is_empty() {
            return Ok(Lookup::Found(Value::Context(context)));
        }
        let state = context.inner.state.read();
        Ok(state.slots.get(&key).map(Slot::to_lookup).unwrap_or(Lookup::NotFound))
    }

    pub fn contains(&self, path: &str) -> Result<bool, ContextError> {
        Ok(!matches!(self.get(path)?, Lookup::NotFound))
    }

    /// Writes `value` at `path`, returning what was there before.
    ///
    /// Writes under a link land in the linked context. JSON `null` stores the none sentinel.
    pub fn put_value(&self, path: &str, value: impl Into<Value>) -> Result<Lookup, ContextError> {
        self.write(path, Some(value.into()), None)
    }

    /// Stores the none sentinel at `path`.
    pub fn put_none(&self, path: &str) -> Result<Lookup, ContextError> {
        self.write(path, None, None)
    }

    pub fn put_in_value(&self, path: &str, value: impl Into<Value>) -> Result<Lookup, ContextError> {
        self.write(path, Some(value.into()), Some(Direction::In))
    }

    pub fn put_out_value(&self, path: &str, value: impl Into<Value>) -> Result<Lookup, ContextError> {
        self.write(path, Some(value.into()), Some(Direction::Out))
    }

    pub fn put_inout_value(&self, path: &str, value: impl Into<Value>) -> Result<Lookup, ContextError> {
        self.write(path, Some(value.into()), Some(Direction::Inout))
    }

    /// Places `entry` at `path`; the entry's role decides the path's direction.
    pub fn put_entry(&self, path: &str, entry: Entry) -> Result<Arc<Entry>, ContextError> {
        let entry = Arc::new(entry);
        self.write(path, Some(Value::Entry(entry.clone())), None)?;
        Ok(entry)
    }

    pub(crate) fn write(
        &self,
        path: &str,
        value: Option<Value>,
        direction: Option<Direction>,
    ) -> Result<Lookup, ContextError> {
        validate_path(path)?;
        let Mapping { context, key } = self.locate(path)?;
        if key.is_empty() {
            return Err(ContextError::InvalidPath {
                path: path.to_string(),
                reason: "path addresses the root of a linked context".to_string(),
            });
        }
        let direction = direction.or_else(|| match &value {
            Some(Value::Entry(entry)) => entry.role().direction(),
            _ => None,
        });
        context.write_local(&key, value, direction)
    }

    fn write_local(&self, key: &str, value: Option<Value>, direction: Option<Direction>) -> Result<Lookup, ContextError> {
        let persistent = {
            let state = self.inner.state.read();
            match state.slots.get(key) {
                Some(Slot::Value(Value::Entry(entry))) if entry.is_persistent() && !matches!(value, Some(Value::Entry(_))) => {
                    Some(entry.clone())
                }
                _ => None,
            }
        };

        let previous = if let Some(entry) = persistent {
            entry.assign(value).map_err(|source| ContextError::Persistence {
                path: key.to_string(),
                source,
            })?;
            if let Some(direction) = direction {
                self.inner.state.write().attributes.set_direction(key, direction);
            }
            Lookup::Found(Value::Entry(entry))
        } else {
            let mut state = self.inner.state.write();
            let previous = state.slots.get(key).map(Slot::to_lookup).unwrap_or(Lookup::NotFound);
            state.slots.insert(key.to_string(), Slot::from_value(value));
            if let Some(direction) = direction {
                state.attributes.set_direction(key, direction);
            }
            previous
        };

        self.invalidate_dependents(&[key]);
        Ok(previous)
    }

    fn invalidate_dependents(&self, paths: &[&str]) {
        let stale: Vec<Arc<Entry>> = {
            let state = self.inner.state.read();
            state
                .slots
                .iter()
                .filter(|(slot_path, _)| !paths.contains(&slot_path.as_str()))
                .filter_map(|(_, slot)| match slot {
                    Slot::Value(Value::Entry(entry)) if paths.iter().any(|path| entry.depends_on_path(path)) => Some(entry.clone()),
                    _ => None,
                })
                .collect()
        };
        for entry in stale {
            entry.invalidate();
        }
    }

    /// Invalidates every computed entry held by this context.
    pub fn invalidate_entries(&self) {
        let mut visited = HashSet::new();
        self.invalidate_entries_with(&mut visited);
    }

    pub(crate) fn invalidate_entries_with(&self, visited: &mut HashSet<usize>) {
        if !visited.insert(self.address()) {
            return;
        }
        let nested: Vec<Value> = {
            let state = self.inner.state.read();
            state
                .slots
                .values()
                .filter_map(|slot| match slot {
                    Slot::Value(value @ (Value::Entry(_) | Value::Context(_))) => Some(value.clone()),
                    _ => None,
                })
                .collect()
        };
        for value in nested {
            match value {
                Value::Entry(entry) => entry.invalidate_with(visited),
                Value::Context(context) => context.invalidate_entries_with(visited),
                Value::Json(_) => {}
            }
        }
    }

    /// Declares a simple attribute so paths can be marked with `attribute|value`.
    pub fn set_attribute(&self, attribute: &str) -> Result<(), ContextError> {
        let attribute = attribute.trim();
        if attribute.is_empty() || attribute.contains(exert_types::APS) {
            return Err(ContextError::InvalidAssociation {
                path: String::new(),
                association: attribute.to_string(),
                reason: "attribute names must be non-empty and contain no separator".to_string(),
            });
        }
        self.inner.state.write().attributes.declare(attribute);
        Ok(())
    }

    /// Declares a composite attribute from a descriptor `name|c1|c2|...`.
    pub fn set_composite_attribute(&self, descriptor: &str) -> Result<(), ContextError> {
        let (name, components) = parse_composite(descriptor)?;
        self.inner.state.write().attributes.declare_composite(&name, components);
        Ok(())
    }

    pub fn is_attribute(&self, attribute: &str) -> bool {
        self.inner.state.read().attributes.is_declared(attribute)
    }

    /// Attaches an association to `path`.
    ///
    /// `association` is a direction shorthand (`in`, `out`, `inout`) or an
    /// `attribute|v1|...` tuple whose arity matches the declared attribute. A malformed
    /// association leaves the index untouched.
    pub fn mark(&self, path: &str, association: &str) -> Result<(), ContextError> {
        validate_path(path)?;
        let Mapping { context, key } = self.locate(path)?;
        let mut state = context.inner.state.write();
        let assignments = state.attributes.plan(&key, association)?;
        state.attributes.apply(&key, &assignments);
        Ok(())
    }

    /// Value of `attribute` on `path`; composite values come back `|`-joined.
    pub fn get_attribute_value(&self, path: &str, attribute: &str) -> Result<Option<String>, ContextError> {
        let Mapping { context, key } = self.locate(path)?;
        let state = context.inner.state.read();
        Ok(state.attributes.value(&key, attribute))
    }

    /// Local paths marked with `association`, sorted.
    pub fn marked_paths(&self, association: &str) -> Result<Vec<String>, ContextError> {
        let state = self.inner.state.read();
        let assignments = state.attributes.plan("", association)?;
        Ok(state.attributes.paths_matching(&assignments))
    }

    /// Every `attribute|value` association recorded for `path`.
    pub fn associations(&self, path: &str) -> Result<Vec<String>, ContextError> {
        let Mapping { context, key } = self.locate(path)?;
        let state = context.inner.state.read();
        Ok(state.attributes.associations(&key))
    }

    pub fn direction_of(&self, path: &str) -> Result<Option<Direction>, ContextError> {
        let Mapping { context, key } = self.locate(path)?;
        let state = context.inner.state.read();
        Ok(state.attributes.direction(&key))
    }

    /// Paths tagged `in` or `inout`, sorted.
    pub fn get_in_paths(&self) -> Vec<String> {
        self.inner.state.read().attributes.paths_with_direction(|direction| direction.is_input())
    }

    /// Paths tagged `out` or `inout`, sorted.
    pub fn get_out_paths(&self) -> Vec<String> {
        self.inner.state.read().attributes.paths_with_direction(|direction| direction.is_output())
    }

    /// Evaluated values of the input paths.
    pub fn in_values(&self) -> Result<Vec<(String, Lookup)>, ContextError> {
        self.get_in_paths()
            .into_iter()
            .map(|path| self.get_value(&path).map(|lookup| (path, lookup)))
            .collect()
    }

    /// Evaluated values of the output paths.
    pub fn out_values(&self) -> Result<Vec<(String, Lookup)>, ContextError> {
        self.get_out_paths()
            .into_iter()
            .map(|path| self.get_value(&path).map(|lookup| (path, lookup)))
            .collect()
    }

    /// All paths, sorted; linked contexts contribute their paths under the link path.
    pub fn get_paths(&self) -> Result<Vec<String>, ContextError> {
        let mut visiting = HashSet::new();
        let mut paths = self.collect_paths(&mut visiting, 0)?;
        paths.sort();
        paths.dedup();
        Ok(paths)
    }

    /// Embeds `target` at `path`: reads and writes under `path` go to `target` at `offset`.
    ///
    /// Fails when an existing path already lives at or under `path`, or when the target
    /// can reach this context through its own links. Linking into a path that is itself
    /// linked resolves to the ultimate target.
    pub fn link(&self, path: &str, target: &Context, offset: &str) -> Result<(), ContextError> {
        validate_path(path)?;
        if let Some(existing) = self.get_paths()?.into_iter().find(|existing| strip_prefix(existing, path).is_some()) {
            return Err(ContextError::LinkConflict {
                path: path.to_string(),
                existing,
            });
        }

        let Mapping { context, key } = target.locate(offset)?;
        if context.reaches(self) {
            return Err(ContextError::LinkCycle { path: path.to_string() });
        }

        let mut state = self.inner.state.write();
        if let Some(existing) = state.slots.keys().find(|existing| strip_prefix(existing, path).is_some()) {
            return Err(ContextError::LinkConflict {
                path: path.to_string(),
                existing: existing.clone(),
            });
        }
        debug!(context = %self.name(), path, target = %context.name(), offset = %key, "linked context");
        state.slots.insert(path.to_string(), Slot::Link(Link::new(&context, key)));
        Ok(())
    }

    /// Link registered exactly at `path` in this context.
    pub fn get_link(&self, path: &str) -> Option<Link> {
        match self.inner.state.read().slots.get(path) {
            Some(Slot::Link(link)) => Some(link.clone()),
            _ => None,
        }
    }

    pub fn remove_link(&self, path: &str) -> Result<Link, ContextError> {
        let mut state = self.inner.state.write();
        match state.slots.get(path) {
            Some(Slot::Link(_)) => {}
            _ => {
                return Err(ContextError::InvalidPath {
                    path: path.to_string(),
                    reason: "no link is registered at this path".to_string(),
                });
            }
        }
        match state.slots.shift_remove(path) {
            Some(Slot::Link(link)) => Ok(link),
            _ => Err(ContextError::InvalidPath {
                path: path.to_string(),
                reason: "no link is registered at this path".to_string(),
            }),
        }
    }

    /// Paths of the links registered in this context, sorted.
    pub fn local_link_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .inner
            .state
            .read()
            .slots
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Link(_)))
            .map(|(path, _)| path.clone())
            .collect();
        paths.sort();
        paths
    }

    /// Local paths holding entries, in insertion order. Linked contexts are not visited.
    pub fn local_entry_paths(&self) -> Vec<String> {
        self.inner
            .state
            .read()
            .slots
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Value(Value::Entry(_))))
            .map(|(path, _)| path.clone())
            .collect()
    }

    /// True when `path` resolves through at least one link.
    pub fn is_linked(&self, path: &str) -> Result<bool, ContextError> {
        Ok(!self.locate(path)?.context.ptr_eq(self))
    }

    /// Context and local key `path` finally maps to after following links.
    pub fn context_mapping(&self, path: &str) -> Result<(Context, String), ContextError> {
        let Mapping { context, key } = self.locate(path)?;
        Ok((context, key))
    }

    /// Removes the value (or link) at `path` together with its attributes.
    pub fn remove_path(&self, path: &str) -> Result<Lookup, ContextError> {
        let Mapping { context, key } = self.locate(path)?;
        let removed = {
            let mut state = context.inner.state.write();
            state.attributes.remove_path(&key);
            state.slots.shift_remove(&key)
        };
        let lookup = removed.as_ref().map(Slot::to_lookup).unwrap_or(Lookup::NotFound);
        if removed.is_some() {
            context.invalidate_dependents(&[key.as_str()]);
        }
        Ok(lookup)
    }

    /// Merges every slot of `other` into this context, keeping `other`'s directions.
    ///
    /// The transient closure marker is dropped afterwards.
    pub fn append(&self, other: &Context) {
        if self.ptr_eq(other) {
            return;
        }
        let (slots, directions) = {
            let state = other.inner.state.read();
            (state.slots.clone(), state.attributes.directions())
        };
        let written: Vec<String> = slots.keys().filter(|path| path.as_str() != CLOSURE_PATH).cloned().collect();
        {
            let mut state = self.inner.state.write();
            for (path, slot) in slots {
                if path != CLOSURE_PATH {
                    state.slots.insert(path, slot);
                }
            }
            for (path, direction) in directions {
                if path != CLOSURE_PATH {
                    state.attributes.set_direction(&path, direction);
                }
            }
            state.slots.shift_remove(CLOSURE_PATH);
            state.attributes.remove_path(CLOSURE_PATH);
        }
        let written: Vec<&str> = written.iter().map(String::as_str).collect();
        self.invalidate_dependents(&written);
    }

    /// Independent copy of this context's slots, directions and return path.
    pub fn detached_copy(&self) -> Context {
        let copy = self.child(self.name());
        copy.append(self);
        if let Some(return_path) = self.return_path() {
            copy.set_return_path(return_path);
        }
        copy
    }

    /// New context holding only `paths`, each keeping its direction.
    ///
    /// Missing paths are skipped.
    pub fn get_directional_subcontext<S: AsRef<str>>(&self, paths: &[S]) -> Result<Context, ContextError> {
        let subcontext = self.child(format!("{} subcontext", self.name()));
        for path in paths {
            let path = path.as_ref();
            let lookup = self.get(path)?;
            let direction = self.direction_of(path)?;
            copy_into(&subcontext, path, lookup, direction)?;
        }
        Ok(subcontext)
    }

    /// Like [`Context::get_directional_subcontext`] but with evaluated values.
    ///
    /// A path whose evaluation fails is left out and its error returned alongside.
    pub fn get_evaluated_subcontext<S: AsRef<str>>(&self, paths: &[S]) -> (Context, Vec<ContextError>) {
        let subcontext = self.child(format!("{} subcontext", self.name()));
        let mut failures = Vec::new();
        for path in paths {
            let path = path.as_ref();
            let copied = self.get_value(path).and_then(|lookup| {
                let direction = self.direction_of(path)?;
                copy_into(&subcontext, path, lookup, direction)
            });
            if let Err(error) = copied {
                failures.push(error);
            }
        }
        (subcontext, failures)
    }

    /// Paths at or below `prefix` copied into a new context.
    pub fn get_subcontext(&self, prefix: &str) -> Result<Context, ContextError> {
        let paths: Vec<String> = self
            .get_paths()?
            .into_iter()
            .filter(|path| strip_prefix(path, prefix).is_some())
            .collect();
        self.get_directional_subcontext(&paths)
    }

    /// Evaluated value at `path`.
    ///
    /// Entries are computed and model contexts yield their return value, both against this
    /// context. When nothing is found the immutable scope chain is consulted.
    pub fn get_value(&self, path: &str) -> Result<Lookup, ContextError> {
        let resolved = self.evaluate_at(path, self)?;
        if resolved.is_found() {
            return Ok(resolved);
        }
        let mut scope = self.scope().cloned();
        while let Some(parent) = scope {
            let lookup = parent.evaluate_at(path, self)?;
            if lookup.is_found() {
                return Ok(lookup);
            }
            scope = parent.scope().cloned();
        }
        Ok(resolved)
    }

    /// Writes `arguments` into this context, then evaluates `path`.
    pub fn get_value_with(&self, path: &str, arguments: &[(&str, Value)]) -> Result<Lookup, ContextError> {
        for (argument_path, value) in arguments {
            self.put_value(argument_path, value.clone())?;
        }
        self.get_value(path)
    }

    fn evaluate_at(&self, path: &str, requester: &Context) -> Result<Lookup, ContextError> {
        let raw = self.get(path)?;
        self.evaluate(raw, requester, path)
    }

    fn evaluate(&self, lookup: Lookup, requester: &Context, path: &str) -> Result<Lookup, ContextError> {
        let mut current = lookup;
        let limit = self.max_link_depth();
        for _ in 0..=limit {
            current = match current {
                Lookup::Found(Value::Entry(entry)) if requester.ptr_eq(self) => entry.evaluate(requester)?,
                Lookup::Found(Value::Entry(entry)) => entry.evaluate_uncached(requester)?,
                Lookup::Found(Value::Context(model)) if model.is_model() && !model.ptr_eq(requester) => {
                    return model.get_return_value().map(|lookup| match lookup {
                        Lookup::NotFound => Lookup::Found(Value::Context(model.clone())),
                        other => other,
                    });
                }
                other => return Ok(other),
            };
        }
        let cause = anyhow::anyhow!("nested entries did not settle after {limit} evaluations");
        Err(EvaluationError::new(path, cause).into())
    }

    /// Result designated by the return path.
    ///
    /// `_self_` yields the context itself, declared out paths yield their directional
    /// subcontext, otherwise the value at the return path. Without a return path nothing
    /// is found.
    pub fn get_return_value(&self) -> Result<Lookup, ContextError> {
        let Some(return_path) = self.return_path() else {
            return Ok(Lookup::NotFound);
        };
        if return_path.path == SELF {
            return Ok(Lookup::Found(Value::Context(self.clone())));
        }
        if !return_path.out_paths.is_empty() {
            return self
                .get_directional_subcontext(&return_path.out_paths)
                .map(|subcontext| Lookup::Found(Value::Context(subcontext)));
        }
        self.get_value(&return_path.path)
    }

    /// Writes `value` at the return path (declared or `context/result`), applying its direction.
    pub fn set_return_value(&self, value: impl Into<Value>) -> Result<Lookup, ContextError> {
        let return_path = self.return_path().unwrap_or_else(|| ReturnPath::new(DEFAULT_RETURN_PATH));
        if return_path.path == SELF {
            return Err(ContextError::InvalidPath {
                path: SELF.to_string(),
                reason: "the context itself cannot be overwritten".to_string(),
            });
        }
        self.write(&return_path.path, Some(value.into()), return_path.direction)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("slots", &self.len())
            .finish()
    }
}

fn validate_path(path: &str) -> Result<(), ContextError> {
    let reason = if path.trim().is_empty() {
        "path is empty"
    } else if path == SELF {
        "the self token is not a slot path"
    } else if path.split(exert_types::CPS).any(str::is_empty) {
        "path contains an empty segment"
    } else {
        return Ok(());
    };
    Err(ContextError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    })
}

fn copy_into(target: &Context, path: &str, lookup: Lookup, direction: Option<Direction>) -> Result<(), ContextError> {
    match lookup {
        Lookup::NotFound => Ok(()),
        Lookup::FoundNone => target.write(path, None, direction).map(|_| ()),
        Lookup::Found(value) => target.write(path, Some(value), direction).map(|_| ()),
    }
}
