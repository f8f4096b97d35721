//! Typed per-operation requests.
//!
//! Requests are assembled once at the boundary; shape problems (values that
//! are not a mapping, unparseable version constraints) surface as
//! validation errors before the engine is involved.

use std::time::Duration;

use semver::VersionReq;
use serde_json::{Map, Value};

use crate::error::EngineError;

/// Used when a request carries no timeout, or a non-positive one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Flags for install and upgrade.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReleaseFlags {
    pub dry_run: bool,
    /// Upgrade only: install when the release has no history.
    pub install_on_upgrade_miss: bool,
    pub chart_version: Option<VersionReq>,
    pub timeout: Option<Duration>,
    pub disable_hooks: bool,
}

/// An install or upgrade request.
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseRequest {
    pub release_name: String,
    pub chart_reference: String,
    /// Always a JSON object.
    pub values: Value,
    pub flags: ReleaseFlags,
}

impl ReleaseRequest {
    pub fn builder(
        release_name: impl Into<String>,
        chart_reference: impl Into<String>,
    ) -> ReleaseRequestBuilder {
        ReleaseRequestBuilder {
            release_name: release_name.into(),
            chart_reference: chart_reference.into(),
            values: Value::Null,
            dry_run: false,
            install_on_upgrade_miss: false,
            chart_version: None,
            timeout_secs: None,
            disable_hooks: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReleaseRequestBuilder {
    release_name: String,
    chart_reference: String,
    values: Value,
    dry_run: bool,
    install_on_upgrade_miss: bool,
    chart_version: Option<String>,
    timeout_secs: Option<i64>,
    disable_hooks: bool,
}

impl ReleaseRequestBuilder {
    pub fn values(mut self, values: Value) -> Self {
        self.values = values;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn install_on_upgrade_miss(mut self, install: bool) -> Self {
        self.install_on_upgrade_miss = install;
        self
    }

    /// Semver constraint such as `^4.4` or `=4.4.4`; empty means latest.
    pub fn chart_version(mut self, version: impl Into<String>) -> Self {
        self.chart_version = Some(version.into());
        self
    }

    /// Seconds as received from the caller; zero or negative means default.
    pub fn timeout_secs(mut self, secs: i64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn disable_hooks(mut self, disable: bool) -> Self {
        self.disable_hooks = disable;
        self
    }

    pub fn build(self) -> Result<ReleaseRequest, EngineError> {
        let chart_reference = self.chart_reference.trim().to_string();
        if chart_reference.is_empty() {
            return Err(EngineError::Validation(
                "no chart reference provided".to_string(),
            ));
        }
        if chart_reference.chars().any(char::is_whitespace) {
            return Err(EngineError::Validation(format!(
                "chart reference '{}' must not contain whitespace",
                chart_reference
            )));
        }

        let values = match self.values {
            Value::Null => Value::Object(Map::new()),
            Value::Object(map) => Value::Object(map),
            other => {
                return Err(EngineError::Validation(format!(
                    "values must be a mapping, got {}",
                    json_type_name(&other)
                )));
            }
        };

        let chart_version = match self.chart_version.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(VersionReq::parse(raw).map_err(|e| {
                EngineError::Validation(format!("invalid chart version '{}': {}", raw, e))
            })?),
        };

        Ok(ReleaseRequest {
            release_name: self.release_name,
            chart_reference,
            values,
            flags: ReleaseFlags {
                dry_run: self.dry_run,
                install_on_upgrade_miss: self.install_on_upgrade_miss,
                chart_version,
                timeout: positive_secs(self.timeout_secs),
                disable_hooks: self.disable_hooks,
            },
        })
    }
}

/// An uninstall request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UninstallRequest {
    pub release_name: String,
    pub keep_history: bool,
    pub disable_hooks: bool,
    pub dry_run: bool,
    pub timeout: Option<Duration>,
}

impl UninstallRequest {
    pub fn new(release_name: impl Into<String>) -> Self {
        Self {
            release_name: release_name.into(),
            keep_history: false,
            disable_hooks: false,
            dry_run: false,
            timeout: None,
        }
    }

    pub fn with_keep_history(mut self, keep: bool) -> Self {
        self.keep_history = keep;
        self
    }

    pub fn with_disable_hooks(mut self, disable: bool) -> Self {
        self.disable_hooks = disable;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_timeout_secs(mut self, secs: i64) -> Self {
        self.timeout = positive_secs(Some(secs));
        self
    }
}

/// Which namespaces a listing covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NamespaceScope {
    /// The context's namespace
    #[default]
    Current,
    AllNamespaces,
}

/// Listing filter. With no status flag set the backend applies its own
/// default (deployed releases only).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListFilter {
    pub scope: NamespaceScope,
    pub deployed: bool,
    pub failed: bool,
    pub pending: bool,
    pub uninstalled: bool,
    pub uninstalling: bool,
}

impl ListFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all_namespaces(mut self) -> Self {
        self.scope = NamespaceScope::AllNamespaces;
        self
    }

    pub fn with_deployed(mut self) -> Self {
        self.deployed = true;
        self
    }

    pub fn with_failed(mut self) -> Self {
        self.failed = true;
        self
    }

    pub fn with_pending(mut self) -> Self {
        self.pending = true;
        self
    }

    pub fn with_uninstalled(mut self) -> Self {
        self.uninstalled = true;
        self
    }

    pub fn with_uninstalling(mut self) -> Self {
        self.uninstalling = true;
        self
    }

    pub fn has_status_filter(&self) -> bool {
        self.deployed || self.failed || self.pending || self.uninstalled || self.uninstalling
    }
}

fn positive_secs(secs: Option<i64>) -> Option<Duration> {
    secs.filter(|s| *s > 0).map(|s| Duration::from_secs(s as u64))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}
