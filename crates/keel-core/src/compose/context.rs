//! Per-request deployment context.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Backend that stores release history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryDriver {
    #[default]
    Secret,
    ConfigMap,
    Memory,
    Sql,
}

impl HistoryDriver {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryDriver::Secret => "secret",
            HistoryDriver::ConfigMap => "configmap",
            HistoryDriver::Memory => "memory",
            HistoryDriver::Sql => "sql",
        }
    }
}

impl FromStr for HistoryDriver {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "secret" | "secrets" => Ok(HistoryDriver::Secret),
            "configmap" | "configmaps" => Ok(HistoryDriver::ConfigMap),
            "memory" => Ok(HistoryDriver::Memory),
            "sql" => Ok(HistoryDriver::Sql),
            other => anyhow::bail!(
                "Unknown history driver '{}'. Expected one of: secret, configmap, memory, sql",
                other
            ),
        }
    }
}

impl fmt::Display for HistoryDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of the remote cluster and the credential overrides used to reach it.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ClusterTarget {
    /// Kubeconfig context; `None` means the kubeconfig's current context.
    pub context: Option<String>,
    pub api_server: Option<String>,
    pub bearer_token: Option<String>,
    pub client_certificate: Option<std::path::PathBuf>,
    pub client_key: Option<std::path::PathBuf>,
}

impl fmt::Debug for ClusterTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterTarget")
            .field("context", &self.context)
            .field("api_server", &self.api_server)
            .field(
                "bearer_token",
                &self.bearer_token.as_ref().map(|_| "<redacted>"),
            )
            .field("client_certificate", &self.client_certificate)
            .field("client_key", &self.client_key)
            .finish()
    }
}

/// Everything the deployment backend needs to act for one request.
///
/// Built by [`compose`](super::compose) at the start of a call and dropped at
/// its end. Fields are read-only once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentContext {
    cluster: ClusterTarget,
    namespace: String,
    history_driver: HistoryDriver,
}

impl DeploymentContext {
    pub(crate) fn new(
        cluster: ClusterTarget,
        namespace: String,
        history_driver: HistoryDriver,
    ) -> Self {
        Self {
            cluster,
            namespace,
            history_driver,
        }
    }

    pub fn cluster(&self) -> &ClusterTarget {
        &self.cluster
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn history_driver(&self) -> HistoryDriver {
        self.history_driver
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_driver_parses_helm_spellings() {
        assert_eq!("".parse::<HistoryDriver>().unwrap(), HistoryDriver::Secret);
        assert_eq!(
            "ConfigMaps".parse::<HistoryDriver>().unwrap(),
            HistoryDriver::ConfigMap
        );
        assert_eq!("sql".parse::<HistoryDriver>().unwrap(), HistoryDriver::Sql);
        assert!("etcd".parse::<HistoryDriver>().is_err());
    }

    #[test]
    fn test_cluster_target_debug_hides_token() {
        let target = ClusterTarget {
            bearer_token: Some("s3cr3t".to_string()),
            ..Default::default()
        };
        let rendered = format!("{:?}", target);
        assert!(!rendered.contains("s3cr3t"));
        assert!(rendered.contains("<redacted>"));
    }
}
