use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a polled task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not polled; has no due time
    Inactive,
    /// Polled on its cadence; eligible for claim once due
    Active,
    /// Claimed by a processor; awaiting an outcome or reclaim
    InFlight,
}

impl TaskStatus {
    /// Database / wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::Active => "active",
            Self::InFlight => "in_flight",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inactive" => Ok(Self::Inactive),
            "active" => Ok(Self::Active),
            "in_flight" => Ok(Self::InFlight),
            _ => Err(format!("Invalid task status: {s}")),
        }
    }
}
