//! Attribute index of a context: simple attributes map paths to a value, composite
//! attributes bundle a fixed tuple of simple ones.

use exert_types::{APS, Direction, path::tokenize_association};
use indexmap::IndexMap;

use crate::error::ContextError;

/// Attribute recording the data-flow direction of a path.
pub const DIRECTION_ATTRIBUTE: &str = "direction";

/// Predeclared composite attribute `cp|direction|path|cid|vc`.
pub const CONTEXT_PARAMETER: &str = "cp";

const CONTEXT_PARAMETER_COMPONENTS: [&str; 4] = [DIRECTION_ATTRIBUTE, "path", "cid", "vc"];

/// Assignments produced by validating an association, applied in one step.
pub(crate) type Assignments = Vec<(String, String)>;

#[derive(Debug, Clone)]
pub(crate) struct AttributeIndex {
    values: IndexMap<String, IndexMap<String, String>>,
    composites: IndexMap<String, Vec<String>>,
}

impl Default for AttributeIndex {
    fn default() -> Self {
        let mut index = Self {
            values: IndexMap::new(),
            composites: IndexMap::new(),
        };
        index.declare_composite(
            CONTEXT_PARAMETER,
            CONTEXT_PARAMETER_COMPONENTS.iter().map(|component| component.to_string()).collect(),
        );
        index
    }
}

impl AttributeIndex {
    pub(crate) fn declare(&mut self, attribute: &str) {
        self.values.entry(attribute.to_string()).or_default();
    }

    pub(crate) fn declare_composite(&mut self, attribute: &str, components: Vec<String>) {
        for component in &components {
            self.declare(component);
        }
        self.composites.insert(attribute.to_string(), components);
    }

    pub(crate) fn is_declared(&self, attribute: &str) -> bool {
        self.values.contains_key(attribute) || self.composites.contains_key(attribute)
    }

    /// Validates `association` for `path` without touching the index.
    ///
    /// A bare direction (`in`, `out`, `inout`) expands to `cp|<direction>|||`. Empty
    /// components of a composite tuple are accepted and left unassigned.
    pub(crate) fn plan(&self, path: &str, association: &str) -> Result<Assignments, ContextError> {
        let invalid = |reason: &str| ContextError::InvalidAssociation {
            path: path.to_string(),
            association: association.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = association.trim();
        let expanded: String;
        let tuple = if trimmed.contains(APS) {
            trimmed
        } else {
            let direction = trimmed
                .parse::<Direction>()
                .map_err(|_| invalid("expected a direction or an attribute|value tuple"))?;
            expanded = format!("{CONTEXT_PARAMETER}{APS}{direction}{APS}{APS}{APS}");
            expanded.as_str()
        };

        let tokens = tokenize_association(tuple);
        let Some((attribute, values)) = tokens.split_first() else {
            return Err(invalid("empty association"));
        };
        let attribute = attribute.trim();
        if attribute.is_empty() {
            return Err(invalid("missing attribute name"));
        }

        let assignments: Assignments = if let Some(components) = self.composites.get(attribute) {
            if values.len() != components.len() {
                return Err(ContextError::ArityMismatch {
                    attribute: attribute.to_string(),
                    expected: components.len(),
                    found: values.len(),
                });
            }
            components
                .iter()
                .zip(values.iter())
                .filter(|(_, value)| !value.trim().is_empty())
                .map(|(component, value)| (component.clone(), value.trim().to_string()))
                .collect()
        } else if self.values.contains_key(attribute) {
            if values.len() != 1 {
                return Err(ContextError::ArityMismatch {
                    attribute: attribute.to_string(),
                    expected: 1,
                    found: values.len(),
                });
            }
            vec![(attribute.to_string(), values[0].trim().to_string())]
        } else {
            return Err(ContextError::UnknownAttribute(attribute.to_string()));
        };

        assignments
            .into_iter()
            .map(|(attribute, value)| {
                if attribute == DIRECTION_ATTRIBUTE {
                    let direction = value.parse::<Direction>().map_err(|error| invalid(&error.to_string()))?;
                    Ok((attribute, direction.as_str().to_string()))
                } else {
                    Ok((attribute, value))
                }
            })
            .collect()
    }

    pub(crate) fn apply(&mut self, path: &str, assignments: &Assignments) {
        for (attribute, value) in assignments {
            self.values
                .entry(attribute.clone())
                .or_default()
                .insert(path.to_string(), value.clone());
        }
    }

    /// Value of `attribute` on `path`; composite values are joined with `|`.
    pub(crate) fn value(&self, path: &str, attribute: &str) -> Option<String> {
        if let Some(components) = self.composites.get(attribute) {
            let parts: Vec<&str> = components
                .iter()
                .map(|component| self.simple_value(path, component).unwrap_or(""))
                .collect();
            if parts.iter().all(|part| part.is_empty()) {
                return None;
            }
            let separator = APS.to_string();
            return Some(parts.join(separator.as_str()));
        }
        self.simple_value(path, attribute).map(str::to_string)
    }

    fn simple_value(&self, path: &str, attribute: &str) -> Option<&str> {
        self.values.get(attribute)?.get(path).map(String::as_str)
    }

    /// Paths carrying every assignment in `assignments`, sorted.
    pub(crate) fn paths_matching(&self, assignments: &Assignments) -> Vec<String> {
        let Some((first_attribute, first_value)) = assignments.first() else {
            return Vec::new();
        };
        let mut paths: Vec<String> = self
            .values
            .get(first_attribute)
            .into_iter()
            .flat_map(|by_path| by_path.iter())
            .filter(|(_, value)| *value == first_value)
            .map(|(path, _)| path.clone())
            .filter(|path| {
                assignments
                    .iter()
                    .all(|(attribute, value)| self.simple_value(path, attribute) == Some(value.as_str()))
            })
            .collect();
        paths.sort();
        paths
    }

    /// `attribute|value` pairs recorded for `path`.
    pub(crate) fn associations(&self, path: &str) -> Vec<String> {
        self.values
            .iter()
            .filter_map(|(attribute, by_path)| by_path.get(path).map(|value| format!("{attribute}{APS}{value}")))
            .collect()
    }

    pub(crate) fn direction(&self, path: &str) -> Option<Direction> {
        self.simple_value(path, DIRECTION_ATTRIBUTE)?.parse().ok()
    }

    pub(crate) fn set_direction(&mut self, path: &str, direction: Direction) {
        self.values
            .entry(DIRECTION_ATTRIBUTE.to_string())
            .or_default()
            .insert(path.to_string(), direction.as_str().to_string());
    }

    pub(crate) fn directions(&self) -> Vec<(String, Direction)> {
        self.values
            .get(DIRECTION_ATTRIBUTE)
            .into_iter()
            .flat_map(|by_path| by_path.iter())
            .filter_map(|(path, raw)| raw.parse().ok().map(|direction| (path.clone(), direction)))
            .collect()
    }

    pub(crate) fn paths_with_direction(&self, predicate: impl Fn(Direction) -> bool) -> Vec<String> {
        let mut paths: Vec<String> = self
            .directions()
            .into_iter()
            .filter(|(_, direction)| predicate(*direction))
            .map(|(path, _)| path)
            .collect();
        paths.sort();
        paths
    }

    pub(crate) fn remove_path(&mut self, path: &str) {
        for by_path in self.values.values_mut() {
            by_path.shift_remove(path);
        }
    }
}

/// Parses a composite descriptor `name|c1|c2|...`.
pub(crate) fn parse_composite(descriptor: &str) -> Result<(String, Vec<String>), ContextError> {
    let tokens = tokenize_association(descriptor.trim());
    let invalid = |reason: &str| ContextError::InvalidAssociation {
        path: String::new(),
        association: descriptor.to_string(),
        reason: reason.to_string(),
    };
    let Some((name, components)) = tokens.split_first() else {
        return Err(invalid("empty descriptor"));
    };
    let name = name.trim();
    if name.is_empty() {
        return Err(invalid("missing attribute name"));
    }
    let components: Vec<String> = components.iter().map(|component| component.trim().to_string()).collect();
    if components.is_empty() || components.iter().any(String::is_empty) {
        return Err(invalid("composite attributes need at least one named component"));
    }
    Ok((name.to_string(), components))
}
