//! Keel Core Library
//!
//! Per-request deployment context composition, release lifecycle operations
//! against a pluggable deployment backend, and a file-backed chart
//! repository index shared safely between processes.

pub mod compose;
pub mod config;
pub mod error;
pub mod projector;
pub mod release;
pub mod repository;
pub mod types;

/// Re-exports of commonly used types
pub mod prelude {
    // Context
    pub use crate::compose::{
        AmbientDefaults, ClusterFlags, ClusterTarget, DeploymentContext, HistoryDriver, compose,
    };

    // Settings
    pub use crate::config::{KeelSettings, SettingsStore};

    // Errors
    pub use crate::error::{EngineError, ErrorKind};

    // Releases
    pub use crate::release::{
        ChartResolver, DeploymentBackend, ListFilter, LocalChartResolver, OperationFailure,
        OperationResult, ReleaseEngine, ReleaseReport, ReleaseRequest, UninstallRequest,
    };
    pub use crate::types::{ReleaseState, ReleaseStatus};

    // Repositories
    pub use crate::repository::{
        CancelToken, HttpIndexFetcher, IndexFetcher, LockPolicy, RepositoryEntry,
        RepositoryRegistrar,
    };

    // Responses
    pub use crate::projector::{Outcome, project, project_list, project_repository};
}
