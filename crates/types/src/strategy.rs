use serde::{Deserialize, Serialize};

/// How the caller waits on an exertion.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    #[default]
    Sync,
    Async,
}

/// How the children of a composite are scheduled.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Flow {
    #[default]
    Sequential,
    Parallel,
}

/// Per-unit execution policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ControlStrategy {
    #[serde(default)]
    pub access: Access,
    /// `None` defers to the engine configuration.
    #[serde(default)]
    pub flow: Option<Flow>,
    /// Emit dispatch events for this unit.
    #[serde(default)]
    pub monitored: bool,
    /// Block the caller until the unit is terminal.
    #[serde(default = "default_true")]
    pub wait: bool,
    /// A failing critical unit fails its parent; a non-critical one is recorded and skipped over.
    #[serde(default = "default_true")]
    pub critical: bool,
}

impl Default for ControlStrategy {
    fn default() -> Self {
        Self {
            access: Access::Sync,
            flow: None,
            monitored: false,
            wait: true,
            critical: true,
        }
    }
}

impl ControlStrategy {
    pub fn parallel() -> Self {
        Self {
            flow: Some(Flow::Parallel),
            ..Self::default()
        }
    }

    pub fn non_critical() -> Self {
        Self {
            critical: false,
            ..Self::default()
        }
    }

    pub fn with_flow(mut self, flow: Flow) -> Self {
        self.flow = Some(flow);
        self
    }

    pub fn with_monitoring(mut self, monitored: bool) -> Self {
        self.monitored = monitored;
        self
    }

    pub fn with_critical(mut self, critical: bool) -> Self {
        self.critical = critical;
        self
    }
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let strategy: ControlStrategy = serde_yaml::from_str("flow: parallel").unwrap();
        assert_eq!(strategy.flow, Some(Flow::Parallel));
        assert!(strategy.critical);
        assert!(strategy.wait);
        assert_eq!(strategy.access, Access::Sync);
    }
}
