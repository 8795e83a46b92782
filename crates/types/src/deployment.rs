use serde::{Deserialize, Serialize};

/// Provisioning requirements a signature declares before it can be looked up.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct DeploymentSpec {
    /// Service name to provision under.
    pub name: String,
    /// Number of instances requested.
    #[serde(default = "default_multiplicity")]
    pub multiplicity: u32,
    /// Opaque requirement strings understood by the deployment collaborator.
    #[serde(default)]
    pub requirements: Vec<String>,
    /// Whether the collaborator may provision on demand.
    #[serde(default = "default_provisionable")]
    pub provisionable: bool,
}

impl DeploymentSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            multiplicity: default_multiplicity(),
            requirements: Vec::new(),
            provisionable: default_provisionable(),
        }
    }
}

fn default_multiplicity() -> u32 {
    1
}

fn default_provisionable() -> bool {
    true
}

/// Deterministic deployment identifier for a set of capability types.
///
/// Types are de-duplicated, sorted and joined with `;` so that the same set of
/// signatures always maps to the same deployment.
pub fn deployment_id<'a>(capability_types: impl IntoIterator<Item = &'a str>) -> String {
    let mut items: Vec<&str> = capability_types.into_iter().collect();
    items.sort_unstable();
    items.dedup();
    items.join(";")
}
