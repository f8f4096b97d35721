//! Deployment context composition.
//!
//! Turns request flags plus the process defaults into a [`DeploymentContext`].
//! No I/O happens here and no global state is read.

pub mod context;
pub mod flags;

pub use context::{ClusterTarget, DeploymentContext, HistoryDriver};
pub use flags::{AmbientDefaults, ClusterFlags, DEFAULT_NAMESPACE};

use crate::error::EngineError;

/// Build the context for one request.
///
/// An explicitly supplied namespace or context always wins over the ambient
/// default.
pub fn compose(
    flags: &ClusterFlags,
    defaults: &AmbientDefaults,
) -> Result<DeploymentContext, EngineError> {
    let bearer_token = validate_token(&flags.kube_token)?;
    let api_server = validate_api_server(&flags.kube_apiserver)?;

    match (&flags.client_certificate, &flags.client_key) {
        (Some(_), None) | (None, Some(_)) => {
            return Err(EngineError::Configuration(
                "client certificate and client key must be supplied together".to_string(),
            ));
        }
        (Some(_), Some(_)) if bearer_token.is_some() => {
            return Err(EngineError::Configuration(
                "bearer token conflicts with client certificate authentication".to_string(),
            ));
        }
        _ => {}
    }

    let context = if flags.kube_context.is_empty() {
        defaults.context.clone()
    } else {
        Some(flags.kube_context.clone())
    };

    let namespace = if flags.namespace.is_empty() {
        defaults.namespace.clone()
    } else {
        flags.namespace.clone()
    };

    let cluster = ClusterTarget {
        context,
        api_server,
        bearer_token,
        client_certificate: flags.client_certificate.clone(),
        client_key: flags.client_key.clone(),
    };

    Ok(DeploymentContext::new(
        cluster,
        namespace,
        defaults.history_driver,
    ))
}

fn validate_token(token: &str) -> Result<Option<String>, EngineError> {
    if token.is_empty() {
        return Ok(None);
    }
    if token.chars().any(char::is_whitespace) {
        return Err(EngineError::Configuration(
            "bearer token must not contain whitespace".to_string(),
        ));
    }
    Ok(Some(token.to_string()))
}

fn validate_api_server(api_server: &str) -> Result<Option<String>, EngineError> {
    if api_server.is_empty() {
        return Ok(None);
    }
    let parsed = url::Url::parse(api_server).map_err(|e| {
        EngineError::Configuration(format!("invalid API server '{}': {}", api_server, e))
    })?;
    if parsed.scheme() != "https" && parsed.scheme() != "http" {
        return Err(EngineError::Configuration(format!(
            "API server '{}' must use http or https",
            api_server
        )));
    }
    Ok(Some(api_server.to_string()))
}
