//! Links embed one context inside another and the path walk that follows them.

use std::{
    collections::HashSet,
    fmt,
    sync::{Arc, Weak},
};

use exert_types::path::{join, strip_prefix};
use tracing::trace;

use super::{Context, ContextInner, value::Slot};
use crate::error::ContextError;

/// Weak reference to a context plus the access path inside it.
#[derive(Clone)]
pub struct Link {
    target: Weak<ContextInner>,
    offset: String,
}

impl Link {
    pub(crate) fn new(target: &Context, offset: impl Into<String>) -> Self {
        Self {
            target: Arc::downgrade(&target.inner),
            offset: offset.into(),
        }
    }

    /// Linked context, if it is still alive.
    pub fn target(&self) -> Option<Context> {
        self.target.upgrade().map(|inner| Context { inner })
    }

    /// Path inside the target that the link path maps to; empty for the target's root.
    pub fn offset(&self) -> &str {
        &self.offset
    }

    pub fn points_to(&self, context: &Context) -> bool {
        std::ptr::eq(self.target.as_ptr(), Arc::as_ptr(&context.inner))
    }
}

impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let target = self.target().map(|context| context.name().to_string());
        f.debug_struct("Link")
            .field("target", &target)
            .field("offset", &self.offset)
            .finish()
    }
}

/// Context and local key a path ultimately maps to. An empty key addresses the context itself.
#[derive(Debug, Clone)]
pub(crate) struct Mapping {
    pub(crate) context: Context,
    pub(crate) key: String,
}

impl Context {
    /// Follows links until `path` maps onto a local key of some context.
    ///
    /// Every hop is recorded; revisiting a (context, key) pair or exceeding the configured
    /// hop limit fails with [`ContextError::LinkCycle`].
    pub(crate) fn locate(&self, path: &str) -> Result<Mapping, ContextError> {
        let mut context = self.clone();
        let mut key = path.to_string();
        let mut visited: HashSet<(usize, String)> = HashSet::new();
        let mut hops = 0usize;

        loop {
            let Some((link, rest)) = context.link_step(&key) else {
                return Ok(Mapping { context, key });
            };
            if hops >= self.max_link_depth() || !visited.insert((context.address(), key.clone())) {
                return Err(ContextError::LinkCycle { path: path.to_string() });
            }
            hops += 1;
            let target = link.target().ok_or_else(|| ContextError::DanglingLink { path: path.to_string() })?;
            key = join(link.offset(), &rest);
            trace!(path, hop = hops, target = %target.name(), key = %key, "followed link");
            context = target;
        }
    }

    /// The link that `key` passes through in this context, with the suffix left to resolve.
    fn link_step(&self, key: &str) -> Option<(Link, String)> {
        let state = self.inner.state.read();
        match state.slots.get(key) {
            Some(Slot::Link(link)) => return Some((link.clone(), String::new())),
            Some(_) => return None,
            None => {}
        }
        state
            .slots
            .iter()
            .filter_map(|(link_path, slot)| match slot {
                Slot::Link(link) => strip_prefix(key, link_path)
                    .filter(|rest| !rest.is_empty())
                    .map(|rest| (link_path.len(), link.clone(), rest.to_string())),
                _ => None,
            })
            .max_by_key(|(length, _, _)| *length)
            .map(|(_, link, rest)| (link, rest))
    }

    /// True when `other` is this context or can be reached from it by following links.
    pub(crate) fn reaches(&self, other: &Context) -> bool {
        let mut pending = vec![self.clone()];
        let mut seen = HashSet::new();
        while let Some(context) = pending.pop() {
            if context.ptr_eq(other) {
                return true;
            }
            if !seen.insert(context.address()) {
                continue;
            }
            let state = context.inner.state.read();
            pending.extend(state.slots.values().filter_map(|slot| match slot {
                Slot::Link(link) => link.target(),
                _ => None,
            }));
        }
        false
    }

    /// Collects this context's paths plus linked paths under their link prefix.
    pub(crate) fn collect_paths(&self, visiting: &mut HashSet<usize>, depth: usize) -> Result<Vec<String>, ContextError> {
        if depth > self.max_link_depth() || !visiting.insert(self.address()) {
            return Err(ContextError::LinkCycle {
                path: self.name().to_string(),
            });
        }

        let (mut paths, links) = {
            let state = self.inner.state.read();
            let mut own = Vec::new();
            let mut links = Vec::new();
            for (path, slot) in &state.slots {
                match slot {
                    Slot::Link(link) => links.push((path.clone(), link.clone())),
                    _ => own.push(path.clone()),
                }
            }
            (own, links)
        };

        for (link_path, link) in links {
            let target = link
                .target()
                .ok_or_else(|| ContextError::DanglingLink { path: link_path.clone() })?;
            for linked in target.collect_paths(visiting, depth + 1)? {
                if let Some(rest) = strip_prefix(&linked, link.offset())
                    && !rest.is_empty()
                {
                    paths.push(join(&link_path, rest));
                }
            }
        }

        visiting.remove(&self.address());
        Ok(paths)
    }
}
