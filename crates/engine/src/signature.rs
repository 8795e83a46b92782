//! Declarative operation descriptors.

use exert_types::{DEFAULT_RETURN_PATH, DeploymentSpec, Direction, OperationKind, SELF};

use crate::context::Context;

/// Where an operation's result goes and which paths form its inputs and outputs.
#[derive(Debug, Clone)]
pub struct ReturnPath {
    /// Path in the invoking context receiving the result, or `_self_`.
    pub path: String,
    pub direction: Option<Direction>,
    /// Paths of the task context passed to the operation; empty passes everything.
    pub in_paths: Vec<String>,
    /// Paths of the result merged back; empty merges the whole result.
    pub out_paths: Vec<String>,
    /// Context receiving the merged result instead of the task's own.
    pub data_context: Option<Context>,
}

impl ReturnPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            direction: None,
            in_paths: Vec::new(),
            out_paths: Vec::new(),
            data_context: None,
        }
    }

    /// Return path designating the context itself.
    pub fn self_ref() -> Self {
        Self::new(SELF)
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    pub fn with_in_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.in_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_out_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.out_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_data_context(mut self, context: &Context) -> Self {
        self.data_context = Some(context.clone());
        self
    }
}

impl Default for ReturnPath {
    fn default() -> Self {
        Self::new(DEFAULT_RETURN_PATH)
    }
}

/// Descriptor of one operation: what to call, on which capability, in which role.
#[derive(Debug, Clone)]
pub struct Signature {
    pub name: String,
    pub selector: String,
    /// Capability type the lookup port resolves.
    pub capability: String,
    pub kind: OperationKind,
    pub return_path: Option<ReturnPath>,
    pub deployment: Option<DeploymentSpec>,
    /// Further capability types accepted when `capability` has no implementation.
    pub match_types: Vec<String>,
    /// Preferred provider instance name, passed through to the lookup port.
    pub provider_name: Option<String>,
}

impl Signature {
    /// Process signature named after its selector.
    pub fn new(selector: impl Into<String>, capability: impl Into<String>) -> Self {
        let selector = selector.into();
        Self {
            name: selector.clone(),
            selector,
            capability: capability.into(),
            kind: OperationKind::Process,
            return_path: None,
            deployment: None,
            match_types: Vec::new(),
            provider_name: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_kind(mut self, kind: OperationKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_return_path(mut self, return_path: ReturnPath) -> Self {
        self.return_path = Some(return_path);
        self
    }

    pub fn with_deployment(mut self, deployment: DeploymentSpec) -> Self {
        self.deployment = Some(deployment);
        self
    }

    pub fn with_match_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.match_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_provider_name(mut self, provider_name: impl Into<String>) -> Self {
        self.provider_name = Some(provider_name.into());
        self
    }

    /// Capability types tried by the lookup port, in order.
    pub fn candidate_types(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.capability.as_str()).chain(self.match_types.iter().map(String::as_str))
    }

    pub fn in_paths(&self) -> &[String] {
        self.return_path.as_ref().map(|path| path.in_paths.as_slice()).unwrap_or_default()
    }

    pub fn out_paths(&self) -> &[String] {
        self.return_path.as_ref().map(|path| path.out_paths.as_slice()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_types_start_with_capability() {
        let signature = Signature::new("sum", "Adder").with_match_types(["Arithmetic", "Calculator"]);
        let candidates: Vec<&str> = signature.candidate_types().collect();
        assert_eq!(candidates, vec!["Adder", "Arithmetic", "Calculator"]);
    }

    #[test]
    fn declared_paths_default_to_empty() {
        let signature = Signature::new("sum", "Adder");
        assert!(signature.in_paths().is_empty());
        let signature = signature.with_return_path(ReturnPath::new("a/sum").with_in_paths(["a/x", "a/y"]));
        assert_eq!(signature.in_paths(), ["a/x".to_string(), "a/y".to_string()]);
        assert!(signature.out_paths().is_empty());
    }
}
