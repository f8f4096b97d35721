//! keel.toml schema.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::compose::HistoryDriver;
use crate::repository::LockPolicy;

/// Process-wide settings loaded once at bootstrap.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeelSettings {
    #[serde(default)]
    pub cluster: ClusterSettings,

    #[serde(default)]
    pub repositories: RepositorySettings,

    #[serde(default)]
    pub release: ReleaseSettings,
}

/// Ambient cluster defaults used when a request leaves a field empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSettings {
    /// Kubeconfig context name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,

    /// Namespace used when the request does not name one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Release history storage driver (secret, configmap, memory, sql)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositorySettings {
    /// Repository index file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,

    /// Where downloaded repository indexes are cached
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_timeout_secs: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_poll_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseSettings {
    /// Fallback timeout for backend operations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl KeelSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(driver) = &self.cluster.driver {
            driver.parse::<HistoryDriver>()?;
        }

        if let Some(namespace) = &self.cluster.namespace
            && namespace.trim().is_empty()
        {
            anyhow::bail!("cluster.namespace must not be blank");
        }

        if self.repositories.lock_timeout_secs == Some(0) {
            anyhow::bail!("repositories.lock_timeout_secs must be greater than zero");
        }
        if self.repositories.lock_poll_secs == Some(0) {
            anyhow::bail!("repositories.lock_poll_secs must be greater than zero");
        }
        let policy = self.lock_policy();
        if policy.poll_interval > policy.timeout {
            anyhow::bail!(
                "repositories.lock_poll_secs ({}) exceeds lock_timeout_secs ({})",
                policy.poll_interval.as_secs(),
                policy.timeout.as_secs()
            );
        }

        if self.release.timeout_secs == Some(0) {
            anyhow::bail!("release.timeout_secs must be greater than zero");
        }

        Ok(())
    }

    /// Lock policy for the repository registrar, falling back to 30s/1s.
    pub fn lock_policy(&self) -> LockPolicy {
        let defaults = LockPolicy::default();
        LockPolicy {
            timeout: self
                .repositories
                .lock_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            poll_interval: self
                .repositories
                .lock_poll_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.poll_interval),
        }
    }

    pub fn release_timeout(&self) -> Option<Duration> {
        self.release.timeout_secs.map(Duration::from_secs)
    }
}
