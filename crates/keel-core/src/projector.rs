//! Uniform response shapes for callers that serialize results.

use serde::Serialize;

use crate::error::{EngineError, ErrorKind};
use crate::release::OperationResult;
use crate::repository::RepositoryEntry;
use crate::types::{ReleaseState, ReleaseStatus};

/// Result of a single release operation, flattened for transport.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Outcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ReleaseStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release: Option<ReleaseState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        self.error_kind.is_none()
    }

    pub fn is_not_found(&self) -> bool {
        self.error_kind == Some(ErrorKind::NotFound)
    }
}

/// Project a release operation result.
///
/// A failure that carries a partial state still reports that state's status
/// next to the error.
pub fn project(result: &OperationResult) -> Outcome {
    match result {
        Ok(report) => Outcome {
            status: Some(report.state.status),
            release: Some(report.state.clone()),
            manifest: report.manifest.clone(),
            ..Default::default()
        },
        Err(failure) => {
            let partial = failure.partial.as_ref().filter(|state| !state.is_zero());
            Outcome {
                status: partial.map(|state| state.status),
                release: partial.cloned(),
                manifest: None,
                ..error_fields(&failure.error)
            }
        }
    }
}

fn error_fields(error: &EngineError) -> Outcome {
    Outcome {
        error_kind: Some(error.kind()),
        error: Some(error.to_string()),
        ..Default::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ListOutcome {
    pub releases: Vec<ReleaseState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn project_list(result: &Result<Vec<ReleaseState>, EngineError>) -> ListOutcome {
    match result {
        Ok(releases) => ListOutcome {
            releases: releases.clone(),
            ..Default::default()
        },
        Err(error) => ListOutcome {
            releases: Vec::new(),
            error_kind: Some(error.kind()),
            error: Some(error.to_string()),
        },
    }
}

/// Repository entry as shown to callers. The password never leaves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryView {
    pub name: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub has_password: bool,
    pub insecure_skip_tls_verify: bool,
}

impl From<&RepositoryEntry> for RepositoryView {
    fn from(entry: &RepositoryEntry) -> Self {
        Self {
            name: entry.name.clone(),
            url: entry.url.clone(),
            username: entry.username.clone(),
            has_password: entry.password.is_some(),
            insecure_skip_tls_verify: entry.insecure_skip_tls_verify,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepositoryOutcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<RepositoryView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn project_repository(result: &Result<RepositoryEntry, EngineError>) -> RepositoryOutcome {
    match result {
        Ok(entry) => RepositoryOutcome {
            repository: Some(entry.into()),
            ..Default::default()
        },
        Err(error) => RepositoryOutcome {
            repository: None,
            error_kind: Some(error.kind()),
            error: Some(error.to_string()),
        },
    }
}
