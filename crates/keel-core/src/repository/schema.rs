//! Repository index file schema.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

pub const INDEX_API_VERSION: &str = "v1";

/// A named chart repository and how to reach it.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryEntry {
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_file: Option<PathBuf>,
    #[serde(default)]
    pub insecure_skip_tls_verify: bool,
}

impl fmt::Debug for RepositoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryEntry")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("cert_file", &self.cert_file)
            .field("key_file", &self.key_file)
            .field("ca_file", &self.ca_file)
            .field("insecure_skip_tls_verify", &self.insecure_skip_tls_verify)
            .finish()
    }
}

impl RepositoryEntry {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_client_certificate(mut self, cert_file: PathBuf, key_file: PathBuf) -> Self {
        self.cert_file = Some(cert_file);
        self.key_file = Some(key_file);
        self
    }

    pub fn with_ca_file(mut self, ca_file: PathBuf) -> Self {
        self.ca_file = Some(ca_file);
        self
    }

    pub fn with_insecure_skip_tls_verify(mut self, insecure: bool) -> Self {
        self.insecure_skip_tls_verify = insecure;
        self
    }

    /// Shape checks that need no I/O.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.name.trim().is_empty() {
            return Err(EngineError::Validation(
                "repository name must not be empty".to_string(),
            ));
        }
        if self.name.contains('/') || self.name.chars().any(char::is_whitespace) {
            return Err(EngineError::Validation(format!(
                "repository name '{}' must not contain '/' or whitespace",
                self.name
            )));
        }

        let url = url::Url::parse(&self.url).map_err(|e| {
            EngineError::Validation(format!("invalid repository URL '{}': {}", self.url, e))
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(EngineError::Validation(format!(
                "repository URL '{}' must use http or https",
                self.url
            )));
        }

        if self.cert_file.is_some() != self.key_file.is_some() {
            return Err(EngineError::Validation(
                "cert_file and key_file must be supplied together".to_string(),
            ));
        }
        Ok(())
    }
}

/// The on-disk list of repositories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryIndexFile {
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub repositories: Vec<RepositoryEntry>,
}

fn default_api_version() -> String {
    INDEX_API_VERSION.to_string()
}

impl Default for RepositoryIndexFile {
    fn default() -> Self {
        Self {
            api_version: default_api_version(),
            generated: None,
            repositories: Vec::new(),
        }
    }
}

impl RepositoryIndexFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&RepositoryEntry> {
        self.repositories.iter().find(|entry| entry.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Replace the entry with the same name in place, or append.
    pub fn upsert(&mut self, entry: RepositoryEntry) {
        match self.repositories.iter_mut().find(|e| e.name == entry.name) {
            Some(existing) => *existing = entry,
            None => self.repositories.push(entry),
        }
    }

    pub fn len(&self) -> usize {
        self.repositories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_replaces_in_place() {
        let mut index = RepositoryIndexFile::new();
        index.upsert(RepositoryEntry::new("stable", "https://charts.example.com/stable"));
        index.upsert(RepositoryEntry::new("influxdata", "https://helm.influxdata.com/"));
        index.upsert(
            RepositoryEntry::new("stable", "https://charts.example.com/stable")
                .with_username("ops"),
        );

        assert_eq!(index.len(), 2);
        assert_eq!(index.repositories[0].name, "stable");
        assert_eq!(index.repositories[0].username.as_deref(), Some("ops"));
    }

    #[test]
    fn test_entry_yaml_keys() {
        let entry = RepositoryEntry::new("influxdata", "https://helm.influxdata.com/")
            .with_ca_file(PathBuf::from("/etc/ssl/ca.pem"))
            .with_insecure_skip_tls_verify(true);

        let yaml = serde_yaml::to_string(&entry).unwrap();

        assert!(yaml.contains("caFile: /etc/ssl/ca.pem"));
        assert!(yaml.contains("insecureSkipTlsVerify: true"));
        assert!(!yaml.contains("username"));
    }

    #[test]
    fn test_validate() {
        assert!(RepositoryEntry::new("influxdata", "https://helm.influxdata.com/")
            .validate()
            .is_ok());
        assert!(RepositoryEntry::new("", "https://x").validate().is_err());
        assert!(RepositoryEntry::new("a/b", "https://x").validate().is_err());
        assert!(RepositoryEntry::new("x", "ftp://x").validate().is_err());
        assert!(RepositoryEntry::new("x", "not a url").validate().is_err());

        let mut half_tls = RepositoryEntry::new("x", "https://x");
        half_tls.cert_file = Some(PathBuf::from("/tls/cert.pem"));
        assert!(half_tls.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_password() {
        let entry = RepositoryEntry::new("x", "https://x").with_credentials("u", "hunter2");
        assert!(!format!("{:?}", entry).contains("hunter2"));
    }
}
