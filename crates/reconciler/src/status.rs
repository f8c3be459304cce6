//! Externally observable unit status.

use std::fmt;

/// Coarse unit status reported after every reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitStatus {
    /// A reconciliation step is in progress.
    Maintenance(String),
    /// Service running and responsive over its control interface.
    Active(String),
    /// Installed but not running, or not yet responsive.
    Waiting(String),
    /// Validation or installation failed; stays until a new configuration
    /// event corrects the condition.
    Blocked(String),
}

impl UnitStatus {
    pub fn message(&self) -> &str {
        match self {
            UnitStatus::Maintenance(m)
            | UnitStatus::Active(m)
            | UnitStatus::Waiting(m)
            | UnitStatus::Blocked(m) => m,
        }
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitStatus::Maintenance(m) => write!(f, "maintenance: {m}"),
            UnitStatus::Active(m) => write!(f, "active: {m}"),
            UnitStatus::Waiting(m) => write!(f, "waiting: {m}"),
            UnitStatus::Blocked(m) => write!(f, "blocked: {m}"),
        }
    }
}
