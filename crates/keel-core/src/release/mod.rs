//! Release operations: install, upgrade, uninstall, list and status.

pub mod backend;
pub mod chart;
pub mod engine;
pub mod name;
pub mod request;

pub use backend::{
    ApplyOptions, ApplyRequest, BackendError, BackendFailure, DeploymentBackend, RemoveOptions,
    Rendered,
};
pub use chart::{ChartPackage, ChartResolver, LocalChartResolver};
pub use engine::{OperationFailure, OperationResult, ReleaseEngine, ReleaseReport};
pub use name::{MAX_RELEASE_NAME_LEN, validate_release_name};
pub use request::{
    DEFAULT_TIMEOUT, ListFilter, NamespaceScope, ReleaseFlags, ReleaseRequest,
    ReleaseRequestBuilder, UninstallRequest,
};
