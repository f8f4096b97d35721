//! Release state as reported by the deployment backend.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a release revision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseStatus {
    #[default]
    Unknown,
    Pending,
    Deployed,
    Failed,
    Superseded,
    Uninstalled,
    Uninstalling,
}

impl ReleaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseStatus::Unknown => "unknown",
            ReleaseStatus::Pending => "pending",
            ReleaseStatus::Deployed => "deployed",
            ReleaseStatus::Failed => "failed",
            ReleaseStatus::Superseded => "superseded",
            ReleaseStatus::Uninstalled => "uninstalled",
            ReleaseStatus::Uninstalling => "uninstalling",
        }
    }
}

impl fmt::Display for ReleaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single revision of a release.
///
/// Only the deployment backend creates or mutates these; the engine reads
/// them back. `Default` is the zero value handed out when no state exists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseState {
    pub name: String,
    pub namespace: String,
    /// Revision number, starting at 1 and never reused for a name.
    pub revision: u32,
    pub status: ReleaseStatus,
    /// Full chart path, e.g. `redis-ha-4.4.4`.
    pub chart: String,
    pub app_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_deployed_at: Option<DateTime<Utc>>,
}

impl ReleaseState {
    pub fn is_zero(&self) -> bool {
        self == &ReleaseState::default()
    }
}
