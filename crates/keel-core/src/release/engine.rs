//! Release operations against a deployment context.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, info_span, warn};

use crate::compose::DeploymentContext;
use crate::error::EngineError;
use crate::release::backend::{
    ApplyOptions, ApplyRequest, BackendError, BackendFailure, DeploymentBackend, RemoveOptions,
    Rendered,
};
use crate::release::chart::{ChartPackage, ChartResolver};
use crate::release::name::validate_release_name;
use crate::release::request::{
    DEFAULT_TIMEOUT, ListFilter, ReleaseFlags, ReleaseRequest, UninstallRequest,
};
use crate::types::ReleaseState;

/// Successful release operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseReport {
    pub state: ReleaseState,
    /// Rendered manifest, only for dry runs.
    pub manifest: Option<String>,
}

/// Failed release operation, with the last state the backend reported.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct OperationFailure {
    pub error: EngineError,
    pub partial: Option<ReleaseState>,
}

impl From<EngineError> for OperationFailure {
    fn from(error: EngineError) -> Self {
        Self {
            error,
            partial: None,
        }
    }
}

pub type OperationResult = Result<ReleaseReport, OperationFailure>;

/// Where an upgrade starts from, decided by a depth-1 history lookup.
#[derive(Debug)]
enum UpgradeState {
    NoHistory,
    HasHistory { latest: ReleaseState },
}

/// Executes install, upgrade, uninstall, list and status.
///
/// Holds no per-request state; clone it freely across threads.
#[derive(Clone)]
pub struct ReleaseEngine {
    backend: Arc<dyn DeploymentBackend>,
    charts: Arc<dyn ChartResolver>,
    default_timeout: Duration,
}

impl fmt::Debug for ReleaseEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReleaseEngine")
            .field("default_timeout", &self.default_timeout)
            .finish_non_exhaustive()
    }
}

impl ReleaseEngine {
    pub fn new(backend: Arc<dyn DeploymentBackend>, charts: Arc<dyn ChartResolver>) -> Self {
        Self {
            backend,
            charts,
            default_timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    pub fn install(&self, ctx: &DeploymentContext, req: &ReleaseRequest) -> OperationResult {
        let _span = info_span!(
            "install",
            release = %req.release_name,
            namespace = %ctx.namespace()
        )
        .entered();

        validate_release_name(&req.release_name)?;
        self.install_validated(ctx, req)
    }

    pub fn upgrade(&self, ctx: &DeploymentContext, req: &ReleaseRequest) -> OperationResult {
        let _span = info_span!(
            "upgrade",
            release = %req.release_name,
            namespace = %ctx.namespace()
        )
        .entered();

        validate_release_name(&req.release_name)?;

        match self.upgrade_state(ctx, &req.release_name)? {
            UpgradeState::NoHistory if req.flags.install_on_upgrade_miss => {
                info!("release has no history, installing instead");
                self.install_validated(ctx, req)
            }
            UpgradeState::NoHistory => Err(not_found(&req.release_name, ctx).into()),
            UpgradeState::HasHistory { latest } => {
                let chart = self.resolve_chart(ctx, req)?;
                let options = self.apply_options(&req.flags);
                let rendered = self
                    .backend
                    .upgrade_release(ctx, apply_request(req, &chart, &options))
                    .map_err(|failure| backend_failure("upgrade", &req.release_name, ctx, failure))?;

                if !req.flags.dry_run
                    && !is_next_revision(latest.revision, rendered.release.revision)
                {
                    warn!(
                        previous = latest.revision,
                        reported = rendered.release.revision,
                        "backend reported an unexpected revision"
                    );
                }
                info!(
                    revision = rendered.release.revision,
                    status = %rendered.release.status,
                    "release upgraded"
                );
                Ok(report(rendered, req.flags.dry_run))
            }
        }
    }

    pub fn uninstall(&self, ctx: &DeploymentContext, req: &UninstallRequest) -> OperationResult {
        let _span = info_span!(
            "uninstall",
            release = %req.release_name,
            namespace = %ctx.namespace()
        )
        .entered();

        validate_release_name(&req.release_name)?;

        let options = RemoveOptions {
            keep_history: req.keep_history,
            disable_hooks: req.disable_hooks,
            dry_run: req.dry_run,
            timeout: self.timeout_or_default(req.timeout),
        };

        let state = self
            .backend
            .remove_release(ctx, &req.release_name, &options)
            .map_err(|failure| backend_failure("uninstall", &req.release_name, ctx, failure))?;

        info!(status = %state.status, "release uninstalled");
        Ok(ReleaseReport {
            state,
            manifest: None,
        })
    }

    /// Releases matching `filter`. No match is an empty vector.
    pub fn list(
        &self,
        ctx: &DeploymentContext,
        filter: &ListFilter,
    ) -> Result<Vec<ReleaseState>, EngineError> {
        let _span = info_span!("list", namespace = %ctx.namespace()).entered();

        match self.backend.list_releases(ctx, filter) {
            Ok(releases) => {
                debug!(count = releases.len(), "listed releases");
                Ok(releases)
            }
            Err(BackendError::ReleaseNotFound) => Ok(Vec::new()),
            Err(BackendError::Unreachable(cause)) => Err(EngineError::transient("list", cause)),
            Err(BackendError::Failed(cause)) => Err(EngineError::internal("list", cause)),
        }
    }

    /// Status of `name` at `revision`; `None` or `Some(0)` means latest.
    pub fn status(
        &self,
        ctx: &DeploymentContext,
        name: &str,
        revision: Option<u32>,
    ) -> OperationResult {
        let _span = info_span!("status", release = %name, namespace = %ctx.namespace()).entered();

        validate_release_name(name)?;

        let revision = revision.filter(|r| *r > 0);
        let state = self
            .backend
            .release_status(ctx, name, revision)
            .map_err(|error| backend_failure("status", name, ctx, error.into()))?;

        Ok(ReleaseReport {
            state,
            manifest: None,
        })
    }

    fn install_validated(&self, ctx: &DeploymentContext, req: &ReleaseRequest) -> OperationResult {
        let chart = self.resolve_chart(ctx, req)?;
        let options = self.apply_options(&req.flags);
        let rendered = self
            .backend
            .apply_release(ctx, apply_request(req, &chart, &options))
            .map_err(|failure| backend_failure("install", &req.release_name, ctx, failure))?;

        if !req.flags.dry_run && rendered.release.revision != 1 {
            warn!(
                reported = rendered.release.revision,
                "backend reported a revision other than 1 for a new release"
            );
        }
        info!(
            revision = rendered.release.revision,
            status = %rendered.release.status,
            "release installed"
        );
        Ok(report(rendered, req.flags.dry_run))
    }

    fn upgrade_state(
        &self,
        ctx: &DeploymentContext,
        name: &str,
    ) -> Result<UpgradeState, EngineError> {
        match self.backend.release_history(ctx, name, 1) {
            Ok(history) => Ok(match history.into_iter().next() {
                Some(latest) => UpgradeState::HasHistory { latest },
                None => UpgradeState::NoHistory,
            }),
            Err(BackendError::ReleaseNotFound) => Ok(UpgradeState::NoHistory),
            Err(other) => Err(EngineError::internal(
                format!("upgrade {}: history lookup failed", name),
                other,
            )),
        }
    }

    fn resolve_chart(
        &self,
        ctx: &DeploymentContext,
        req: &ReleaseRequest,
    ) -> Result<ChartPackage, EngineError> {
        let chart = self
            .charts
            .locate(
                &req.chart_reference,
                req.flags.chart_version.as_ref(),
                ctx,
            )
            .map_err(|cause| EngineError::ChartResolution {
                reference: req.chart_reference.clone(),
                cause,
            })?;
        debug!(chart = %chart.full_path(), "resolved chart");
        Ok(chart)
    }

    fn apply_options(&self, flags: &ReleaseFlags) -> ApplyOptions {
        ApplyOptions {
            dry_run: flags.dry_run,
            disable_hooks: flags.disable_hooks,
            timeout: self.timeout_or_default(flags.timeout),
        }
    }

    fn timeout_or_default(&self, timeout: Option<Duration>) -> Duration {
        timeout
            .filter(|t| !t.is_zero())
            .unwrap_or(self.default_timeout)
    }
}

fn apply_request<'a>(
    req: &'a ReleaseRequest,
    chart: &'a ChartPackage,
    options: &'a ApplyOptions,
) -> ApplyRequest<'a> {
    ApplyRequest {
        release_name: &req.release_name,
        chart,
        values: &req.values,
        options,
    }
}

/// Whether `reported` follows `previous`. Always true when `previous` has no
/// successor.
fn is_next_revision(previous: u32, reported: u32) -> bool {
    previous.checked_add(1).is_none_or(|next| next == reported)
}

fn report(rendered: Rendered, dry_run: bool) -> ReleaseReport {
    ReleaseReport {
        state: rendered.release,
        manifest: dry_run.then_some(rendered.manifest),
    }
}

fn not_found(name: &str, ctx: &DeploymentContext) -> EngineError {
    EngineError::NotFound(format!(
        "release '{}' in namespace '{}'",
        name,
        ctx.namespace()
    ))
}

fn backend_failure(
    operation: &str,
    name: &str,
    ctx: &DeploymentContext,
    failure: BackendFailure,
) -> OperationFailure {
    let context = format!("{} {}", operation, name);
    let error = match failure.error {
        BackendError::ReleaseNotFound => {
            return OperationFailure {
                error: not_found(name, ctx),
                partial: None,
            };
        }
        BackendError::Unreachable(cause) => EngineError::transient(context, cause),
        BackendError::Failed(cause) => EngineError::internal(context, cause),
    };

    warn!(
        error = %error,
        partial_status = ?failure.partial.as_ref().map(|s| s.status),
        "{} failed",
        operation
    );
    OperationFailure {
        error,
        partial: failure.partial,
    }
}
