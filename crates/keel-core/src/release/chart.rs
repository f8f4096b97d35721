//! Chart reference resolution.

use std::path::{Path, PathBuf};

use anyhow::Context;
use semver::VersionReq;
use serde::Deserialize;

use crate::compose::DeploymentContext;

/// A chart located and loaded from a reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartPackage {
    pub name: String,
    pub version: String,
    pub app_version: Option<String>,
    /// Chart directory or archive on local disk
    pub path: PathBuf,
}

impl ChartPackage {
    /// `name-version`, the form stored on a release.
    pub fn full_path(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }
}

/// Turns a chart reference into a loadable chart. May fetch over the network.
pub trait ChartResolver: Send + Sync {
    fn locate(
        &self,
        reference: &str,
        version: Option<&VersionReq>,
        ctx: &DeploymentContext,
    ) -> anyhow::Result<ChartPackage>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMetadata {
    name: String,
    version: String,
    #[serde(default)]
    app_version: Option<String>,
}

/// Resolves charts already on disk.
///
/// Accepts a path to a chart directory, or a `repo/chart` reference looked
/// up under `<charts_root>/<repo>/<chart>`.
#[derive(Debug, Clone)]
pub struct LocalChartResolver {
    charts_root: PathBuf,
}

impl LocalChartResolver {
    pub fn new(charts_root: PathBuf) -> Self {
        Self { charts_root }
    }

    pub fn charts_root(&self) -> &Path {
        &self.charts_root
    }

    fn chart_dir(&self, reference: &str) -> anyhow::Result<PathBuf> {
        let direct = Path::new(reference);
        if direct.join("Chart.yaml").is_file() {
            return Ok(direct.to_path_buf());
        }

        let (repo, chart) = reference
            .split_once('/')
            .filter(|(repo, chart)| !repo.is_empty() && !chart.is_empty() && !chart.contains('/'))
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "chart '{}' is neither a chart directory nor a repo/chart reference",
                    reference
                )
            })?;

        let dir = self.charts_root.join(repo).join(chart);
        if !dir.join("Chart.yaml").is_file() {
            anyhow::bail!(
                "chart '{}' not found in repository '{}' ({})",
                chart,
                repo,
                dir.display()
            );
        }
        Ok(dir)
    }
}

impl ChartResolver for LocalChartResolver {
    fn locate(
        &self,
        reference: &str,
        version: Option<&VersionReq>,
        _ctx: &DeploymentContext,
    ) -> anyhow::Result<ChartPackage> {
        let dir = self.chart_dir(reference)?;
        let manifest = dir.join("Chart.yaml");
        let content = std::fs::read_to_string(&manifest)
            .with_context(|| format!("Failed to read {}", manifest.display()))?;
        let metadata: ChartMetadata = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", manifest.display()))?;

        if let Some(constraint) = version {
            let found = semver::Version::parse(&metadata.version).with_context(|| {
                format!(
                    "chart '{}' has a non-semver version '{}'",
                    metadata.name, metadata.version
                )
            })?;
            if !constraint.matches(&found) {
                anyhow::bail!(
                    "chart '{}' version {} does not satisfy '{}'",
                    metadata.name,
                    found,
                    constraint
                );
            }
        }

        Ok(ChartPackage {
            name: metadata.name,
            version: metadata.version,
            app_version: metadata.app_version,
            path: dir,
        })
    }
}
