//! Deployment backend contract.
//!
//! The backend renders charts and talks to the cluster. The engine only
//! decides what to ask for and how to report the answer.

use std::time::Duration;

use serde_json::Value;

use crate::compose::DeploymentContext;
use crate::release::chart::ChartPackage;
use crate::release::request::ListFilter;
use crate::types::ReleaseState;

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("release: not found")]
    ReleaseNotFound,

    #[error("cluster unreachable: {0:#}")]
    Unreachable(anyhow::Error),

    #[error("{0:#}")]
    Failed(anyhow::Error),
}

/// A backend error plus whatever release object the backend had built when
/// it failed (e.g. a revision left in `failed`).
#[derive(Debug)]
pub struct BackendFailure {
    pub error: BackendError,
    pub partial: Option<ReleaseState>,
}

impl BackendFailure {
    pub fn with_partial(error: BackendError, partial: ReleaseState) -> Self {
        Self {
            error,
            partial: Some(partial),
        }
    }
}

impl From<BackendError> for BackendFailure {
    fn from(error: BackendError) -> Self {
        Self {
            error,
            partial: None,
        }
    }
}

/// Options forwarded to install and upgrade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyOptions {
    pub dry_run: bool,
    pub disable_hooks: bool,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Copy)]
pub struct ApplyRequest<'a> {
    pub release_name: &'a str,
    pub chart: &'a ChartPackage,
    pub values: &'a Value,
    pub options: &'a ApplyOptions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveOptions {
    pub keep_history: bool,
    pub disable_hooks: bool,
    pub dry_run: bool,
    pub timeout: Duration,
}

/// Release produced by an install or upgrade, with its rendered manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub release: ReleaseState,
    pub manifest: String,
}

pub trait DeploymentBackend: Send + Sync {
    fn apply_release(
        &self,
        ctx: &DeploymentContext,
        req: ApplyRequest<'_>,
    ) -> Result<Rendered, BackendFailure>;

    fn upgrade_release(
        &self,
        ctx: &DeploymentContext,
        req: ApplyRequest<'_>,
    ) -> Result<Rendered, BackendFailure>;

    fn remove_release(
        &self,
        ctx: &DeploymentContext,
        name: &str,
        options: &RemoveOptions,
    ) -> Result<ReleaseState, BackendFailure>;

    fn list_releases(
        &self,
        ctx: &DeploymentContext,
        filter: &ListFilter,
    ) -> Result<Vec<ReleaseState>, BackendError>;

    /// Most recent revisions first, at most `depth` of them.
    fn release_history(
        &self,
        ctx: &DeploymentContext,
        name: &str,
        depth: usize,
    ) -> Result<Vec<ReleaseState>, BackendError>;

    /// `revision == None` means the latest revision.
    fn release_status(
        &self,
        ctx: &DeploymentContext,
        name: &str,
        revision: Option<u32>,
    ) -> Result<ReleaseState, BackendError>;
}
