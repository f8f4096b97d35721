//! Caller-supplied cluster flags and the ambient defaults they fall back to.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::KeelSettings;
use crate::error::EngineError;

use super::HistoryDriver;

pub const DEFAULT_NAMESPACE: &str = "default";

pub const ENV_NAMESPACE: &str = "KEEL_NAMESPACE";
pub const ENV_CONTEXT: &str = "KEEL_KUBECONTEXT";
pub const ENV_DRIVER: &str = "KEEL_DRIVER";

/// Cluster flags shared by every release operation.
///
/// Empty strings mean "not supplied", matching what a decoded request body
/// carries for omitted fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterFlags {
    #[serde(default)]
    pub kube_context: String,
    #[serde(default)]
    pub kube_token: String,
    #[serde(default)]
    pub kube_apiserver: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_certificate: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_key: Option<PathBuf>,
    #[serde(default)]
    pub namespace: String,
}

impl ClusterFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.kube_context = context.into();
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.kube_token = token.into();
        self
    }

    pub fn with_api_server(mut self, api_server: impl Into<String>) -> Self {
        self.kube_apiserver = api_server.into();
        self
    }

    pub fn with_client_certificate(mut self, cert: PathBuf, key: PathBuf) -> Self {
        self.client_certificate = Some(cert);
        self.client_key = Some(key);
        self
    }
}

/// Process-level defaults, resolved once at bootstrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmbientDefaults {
    pub context: Option<String>,
    pub namespace: String,
    pub history_driver: HistoryDriver,
}

impl Default for AmbientDefaults {
    fn default() -> Self {
        Self {
            context: None,
            namespace: DEFAULT_NAMESPACE.to_string(),
            history_driver: HistoryDriver::default(),
        }
    }
}

impl AmbientDefaults {
    pub fn from_settings(settings: &KeelSettings) -> Result<Self, EngineError> {
        let mut defaults = Self::default();
        if let Some(context) = non_blank(settings.cluster.context.as_deref()) {
            defaults.context = Some(context);
        }
        if let Some(namespace) = non_blank(settings.cluster.namespace.as_deref()) {
            defaults.namespace = namespace;
        }
        if let Some(driver) = settings.cluster.driver.as_deref() {
            defaults.history_driver = parse_driver(driver)?;
        }
        Ok(defaults)
    }

    /// Overlay environment values on top of the settings file.
    ///
    /// `lookup` is usually `|key| std::env::var(key).ok()`; tests pass a map.
    pub fn overlay_env<F>(mut self, lookup: F) -> Result<Self, EngineError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(context) = non_blank(lookup(ENV_CONTEXT).as_deref()) {
            self.context = Some(context);
        }
        if let Some(namespace) = non_blank(lookup(ENV_NAMESPACE).as_deref()) {
            self.namespace = namespace;
        }
        if let Some(driver) = non_blank(lookup(ENV_DRIVER).as_deref()) {
            self.history_driver = parse_driver(&driver)?;
        }
        Ok(self)
    }
}

fn parse_driver(value: &str) -> Result<HistoryDriver, EngineError> {
    value
        .parse()
        .map_err(|e: anyhow::Error| EngineError::Configuration(e.to_string()))
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
