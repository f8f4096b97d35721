#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use semver::VersionReq;

use keel_core::compose::{AmbientDefaults, ClusterFlags, DeploymentContext, compose};
use keel_core::release::{
    ApplyOptions, ApplyRequest, BackendError, BackendFailure, ChartPackage, ChartResolver,
    DeploymentBackend, ListFilter, NamespaceScope, ReleaseEngine, RemoveOptions, Rendered,
};
use keel_core::repository::{CancelToken, FetchCancelled, IndexFetcher, RepositoryEntry};
use keel_core::types::{ReleaseState, ReleaseStatus};

pub fn context(namespace: &str) -> DeploymentContext {
    compose(
        &ClusterFlags::new().with_namespace(namespace),
        &AmbientDefaults::default(),
    )
    .unwrap()
}

/// How the next apply or upgrade call should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailMode {
    /// Fail after recording a revision in `failed` state.
    Partial,
    Unreachable,
}

/// In-memory cluster keyed by `namespace/name`, revisions oldest first.
#[derive(Default)]
pub struct FakeBackend {
    releases: Mutex<HashMap<String, Vec<ReleaseState>>>,
    calls: AtomicUsize,
    fail_next: Mutex<Option<FailMode>>,
    history_broken: AtomicBool,
    last_apply: Mutex<Option<ApplyOptions>>,
    last_remove: Mutex<Option<RemoveOptions>>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail_next(&self, mode: FailMode) {
        *self.fail_next.lock().unwrap() = Some(mode);
    }

    pub fn break_history(&self) {
        self.history_broken.store(true, Ordering::SeqCst);
    }

    pub fn revisions(&self, namespace: &str, name: &str) -> Vec<ReleaseState> {
        self.releases
            .lock()
            .unwrap()
            .get(&key(namespace, name))
            .cloned()
            .unwrap_or_default()
    }

    /// Options passed to the most recent apply or upgrade call.
    pub fn last_apply(&self) -> Option<ApplyOptions> {
        self.last_apply.lock().unwrap().clone()
    }

    /// Options passed to the most recent remove call.
    pub fn last_remove(&self) -> Option<RemoveOptions> {
        self.last_remove.lock().unwrap().clone()
    }

    fn touch(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn take_failure(&self) -> Option<FailMode> {
        self.fail_next.lock().unwrap().take()
    }

    fn record(
        &self,
        ctx: &DeploymentContext,
        req: &ApplyRequest<'_>,
        revision: u32,
    ) -> Result<Rendered, BackendFailure> {
        *self.last_apply.lock().unwrap() = Some(req.options.clone());
        let mut state = ReleaseState {
            name: req.release_name.to_string(),
            namespace: ctx.namespace().to_string(),
            revision,
            status: ReleaseStatus::Deployed,
            chart: req.chart.full_path(),
            app_version: req.chart.app_version.clone().unwrap_or_default(),
            first_deployed_at: None,
        };
        let manifest = format!(
            "# Source: {}/templates/deployment.yaml\nvalues: {}\n",
            req.chart.name, req.values
        );

        match self.take_failure() {
            Some(FailMode::Unreachable) => {
                let cause = anyhow::anyhow!("dial tcp: connection refused");
                return Err(BackendError::Unreachable(cause).into());
            }
            Some(FailMode::Partial) => {
                state.status = ReleaseStatus::Failed;
                if !req.options.dry_run {
                    self.push(state.clone());
                }
                return Err(BackendFailure::with_partial(
                    BackendError::Failed(anyhow::anyhow!("post-install hook timed out")),
                    state,
                ));
            }
            None => {}
        }

        if req.options.dry_run {
            state.status = ReleaseStatus::Pending;
        } else {
            self.push(state.clone());
        }
        Ok(Rendered {
            release: state,
            manifest,
        })
    }

    fn push(&self, state: ReleaseState) {
        let mut releases = self.releases.lock().unwrap();
        let history = releases.entry(key(&state.namespace, &state.name)).or_default();
        if let Some(previous) = history.last_mut()
            && previous.status == ReleaseStatus::Deployed
        {
            previous.status = ReleaseStatus::Superseded;
        }
        history.push(state);
    }

    fn next_revision(&self, ctx: &DeploymentContext, name: &str) -> u32 {
        self.revisions(ctx.namespace(), name)
            .last()
            .map(|r| r.revision + 1)
            .unwrap_or(1)
    }
}

fn key(namespace: &str, name: &str) -> String {
    format!("{}/{}", namespace, name)
}

impl DeploymentBackend for FakeBackend {
    fn apply_release(
        &self,
        ctx: &DeploymentContext,
        req: ApplyRequest<'_>,
    ) -> Result<Rendered, BackendFailure> {
        self.touch();
        if let Some(latest) = self.revisions(ctx.namespace(), req.release_name).last()
            && latest.status != ReleaseStatus::Uninstalled
        {
            return Err(BackendError::Failed(anyhow::anyhow!(
                "cannot re-use a name that is still in use"
            ))
            .into());
        }
        let revision = self.next_revision(ctx, req.release_name);
        self.record(ctx, &req, revision)
    }

    fn upgrade_release(
        &self,
        ctx: &DeploymentContext,
        req: ApplyRequest<'_>,
    ) -> Result<Rendered, BackendFailure> {
        self.touch();
        if self.revisions(ctx.namespace(), req.release_name).is_empty() {
            return Err(BackendError::ReleaseNotFound.into());
        }
        let revision = self.next_revision(ctx, req.release_name);
        self.record(ctx, &req, revision)
    }

    fn remove_release(
        &self,
        ctx: &DeploymentContext,
        name: &str,
        options: &RemoveOptions,
    ) -> Result<ReleaseState, BackendFailure> {
        self.touch();
        *self.last_remove.lock().unwrap() = Some(options.clone());
        let mut releases = self.releases.lock().unwrap();
        let k = key(ctx.namespace(), name);
        let Some(mut latest) = releases.get(&k).and_then(|h| h.last().cloned()) else {
            return Err(BackendError::ReleaseNotFound.into());
        };
        latest.status = ReleaseStatus::Uninstalled;
        if options.dry_run {
            return Ok(latest);
        }
        if options.keep_history {
            if let Some(last) = releases.get_mut(&k).and_then(|h| h.last_mut()) {
                last.status = ReleaseStatus::Uninstalled;
            }
        } else {
            releases.remove(&k);
        }
        Ok(latest)
    }

    fn list_releases(
        &self,
        ctx: &DeploymentContext,
        filter: &ListFilter,
    ) -> Result<Vec<ReleaseState>, BackendError> {
        self.touch();
        let releases = self.releases.lock().unwrap();
        let mut found: Vec<ReleaseState> = releases
            .values()
            .filter_map(|history| history.last())
            .filter(|state| {
                filter.scope == NamespaceScope::AllNamespaces || state.namespace == ctx.namespace()
            })
            .filter(|state| {
                if !filter.has_status_filter() {
                    return state.status == ReleaseStatus::Deployed;
                }
                match state.status {
                    ReleaseStatus::Deployed => filter.deployed,
                    ReleaseStatus::Failed => filter.failed,
                    ReleaseStatus::Pending => filter.pending,
                    ReleaseStatus::Uninstalled => filter.uninstalled,
                    ReleaseStatus::Uninstalling => filter.uninstalling,
                    _ => false,
                }
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(found)
    }

    fn release_history(
        &self,
        ctx: &DeploymentContext,
        name: &str,
        depth: usize,
    ) -> Result<Vec<ReleaseState>, BackendError> {
        self.touch();
        if self.history_broken.load(Ordering::SeqCst) {
            return Err(BackendError::Failed(anyhow::anyhow!("storage driver error")));
        }
        let history = self.revisions(ctx.namespace(), name);
        if history.is_empty() {
            return Err(BackendError::ReleaseNotFound);
        }
        Ok(history.into_iter().rev().take(depth).collect())
    }

    fn release_status(
        &self,
        ctx: &DeploymentContext,
        name: &str,
        revision: Option<u32>,
    ) -> Result<ReleaseState, BackendError> {
        self.touch();
        let history = self.revisions(ctx.namespace(), name);
        let found = match revision {
            Some(revision) => history.into_iter().find(|s| s.revision == revision),
            None => history.into_iter().last(),
        };
        found.ok_or(BackendError::ReleaseNotFound)
    }
}

/// Knows `stable/redis-ha` at 4.4.4 and nothing else.
#[derive(Default)]
pub struct FakeCharts {
    calls: AtomicUsize,
}

impl FakeCharts {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ChartResolver for FakeCharts {
    fn locate(
        &self,
        reference: &str,
        version: Option<&VersionReq>,
        _ctx: &DeploymentContext,
    ) -> anyhow::Result<ChartPackage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if reference != "stable/redis-ha" {
            anyhow::bail!("chart '{}' not found", reference);
        }
        let found = semver::Version::new(4, 4, 4);
        if let Some(req) = version
            && !req.matches(&found)
        {
            anyhow::bail!("no version of redis-ha satisfies '{}'", req);
        }
        Ok(ChartPackage {
            name: "redis-ha".to_string(),
            version: found.to_string(),
            app_version: Some("5.0.6".to_string()),
            path: PathBuf::from("/charts/stable/redis-ha"),
        })
    }
}

pub fn engine() -> (ReleaseEngine, Arc<FakeBackend>, Arc<FakeCharts>) {
    let backend = FakeBackend::new();
    let charts = FakeCharts::new();
    let engine = ReleaseEngine::new(backend.clone(), charts.clone());
    (engine, backend, charts)
}

/// Fetcher that answers without touching the network.
#[derive(Default)]
pub struct FakeFetcher {
    calls: AtomicUsize,
    unreachable: AtomicBool,
    delay: Mutex<Duration>,
}

impl FakeFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn unreachable() -> Arc<Self> {
        let fetcher = Self::default();
        fetcher.unreachable.store(true, Ordering::SeqCst);
        Arc::new(fetcher)
    }

    pub fn with_delay(delay: Duration) -> Arc<Self> {
        let fetcher = Self::default();
        *fetcher.delay.lock().unwrap() = delay;
        Arc::new(fetcher)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl IndexFetcher for FakeFetcher {
    fn fetch_index(&self, entry: &RepositoryEntry, cancel: &CancelToken) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() && cancel.sleep(delay) {
            return Err(FetchCancelled.into());
        }
        if self.unreachable.load(Ordering::SeqCst) {
            anyhow::bail!("Failed to fetch {}/index.yaml: connection refused", entry.url);
        }
        Ok(())
    }
}
