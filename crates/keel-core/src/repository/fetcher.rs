//! Repository reachability check.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::lock::CancelToken;
use super::schema::RepositoryEntry;

/// How often an in-flight download looks at its cancel token.
const CANCEL_POLL: Duration = Duration::from_millis(50);

/// Fetches a repository's chart index to prove the repository is usable.
///
/// Implementations should give up promptly once `cancel` fires.
pub trait IndexFetcher: Send + Sync {
    fn fetch_index(&self, entry: &RepositoryEntry, cancel: &CancelToken) -> anyhow::Result<()>;
}

/// Error returned by a fetch abandoned through its cancel token.
#[derive(Debug, thiserror::Error)]
#[error("index fetch cancelled")]
pub struct FetchCancelled;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartIndex {
    #[serde(default)]
    api_version: String,
    #[serde(default)]
    entries: Option<serde_yaml::Mapping>,
}

/// Downloads `<url>/index.yaml` over HTTP(S) using the entry's credentials
/// and TLS settings.
///
/// Client keys must be PKCS#8 PEM (`BEGIN PRIVATE KEY`). A PKCS#1 key
/// (`BEGIN RSA PRIVATE KEY`) can be converted with
/// `openssl pkcs8 -topk8 -nocrypt`.
#[derive(Debug, Clone)]
pub struct HttpIndexFetcher {
    cache_dir: Option<PathBuf>,
    timeout: Duration,
}

impl Default for HttpIndexFetcher {
    fn default() -> Self {
        Self {
            cache_dir: None,
            timeout: Duration::from_secs(120),
        }
    }
}

impl HttpIndexFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep a copy of each downloaded index as `<cache_dir>/<name>-index.yaml`.
    pub fn with_cache_dir(mut self, cache_dir: PathBuf) -> Self {
        self.cache_dir = Some(cache_dir);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn index_url(repo_url: &str) -> anyhow::Result<Url> {
        let mut base = Url::parse(repo_url)
            .with_context(|| format!("Invalid repository URL: {}", repo_url))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.join("index.yaml")
            .with_context(|| format!("Invalid repository URL: {}", repo_url))
    }

    pub fn cache_path(cache_dir: &Path, repo_name: &str) -> PathBuf {
        cache_dir.join(format!("{}-index.yaml", repo_name))
    }

    fn client(&self, entry: &RepositoryEntry) -> anyhow::Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("keel/", env!("CARGO_PKG_VERSION")))
            .timeout(self.timeout)
            .danger_accept_invalid_certs(entry.insecure_skip_tls_verify);

        if let Some(ca_file) = &entry.ca_file {
            let pem = std::fs::read(ca_file)
                .with_context(|| format!("Failed to read CA file: {}", ca_file.display()))?;
            let cert = reqwest::Certificate::from_pem(&pem)
                .with_context(|| format!("Invalid CA file: {}", ca_file.display()))?;
            builder = builder.add_root_certificate(cert);
        }

        if let (Some(cert_file), Some(key_file)) = (&entry.cert_file, &entry.key_file) {
            let cert = std::fs::read(cert_file).with_context(|| {
                format!("Failed to read certificate file: {}", cert_file.display())
            })?;
            let key = std::fs::read(key_file)
                .with_context(|| format!("Failed to read key file: {}", key_file.display()))?;
            if String::from_utf8_lossy(&key).contains("BEGIN RSA PRIVATE KEY") {
                anyhow::bail!(
                    "Client key {} is PKCS#1; convert it to PKCS#8 with `openssl pkcs8 -topk8 -nocrypt`",
                    key_file.display()
                );
            }
            let identity = reqwest::Identity::from_pkcs8_pem(&cert, &key)
                .context("Invalid client certificate or key")?;
            builder = builder.identity(identity);
        }

        builder.build().context("Failed to build HTTP client")
    }

    async fn download(&self, entry: &RepositoryEntry) -> anyhow::Result<String> {
        let url = Self::index_url(&entry.url)?;
        let client = self.client(entry)?;

        let mut request = client.get(url.clone());
        if let Some(username) = &entry.username {
            request = request.basic_auth(username, entry.password.as_ref());
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", url))?;

        if !response.status().is_success() {
            anyhow::bail!("Failed to fetch {}: HTTP {}", url, response.status());
        }

        response
            .text()
            .await
            .with_context(|| format!("Failed to read response from {}", url))
    }
}

impl IndexFetcher for HttpIndexFetcher {
    fn fetch_index(&self, entry: &RepositoryEntry, cancel: &CancelToken) -> anyhow::Result<()> {
        if cancel.is_cancelled() {
            return Err(FetchCancelled.into());
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to create tokio runtime")?;

        let body = runtime.block_on(async {
            tokio::select! {
                body = self.download(entry) => body,
                _ = cancelled(cancel) => Err(FetchCancelled.into()),
            }
        })?;

        let index: ChartIndex =
            serde_yaml::from_str(&body).context("Repository index is not valid YAML")?;
        if index.api_version.is_empty() {
            anyhow::bail!("Repository index has no apiVersion");
        }
        debug!(
            repository = %entry.name,
            charts = index.entries.as_ref().map(|e| e.len()).unwrap_or(0),
            "fetched repository index"
        );

        if let Some(cache_dir) = &self.cache_dir {
            std::fs::create_dir_all(cache_dir).with_context(|| {
                format!("Failed to create cache directory: {}", cache_dir.display())
            })?;
            let path = Self::cache_path(cache_dir, &entry.name);
            std::fs::write(&path, body)
                .with_context(|| format!("Failed to cache index: {}", path.display()))?;
        }

        Ok(())
    }
}

async fn cancelled(cancel: &CancelToken) {
    while !cancel.is_cancelled() {
        tokio::time::sleep(CANCEL_POLL).await;
    }
}
