//! Release name rules.

use crate::error::EngineError;

/// Release names end up inside cluster resource names, so they are capped
/// below the 63-character DNS label limit.
pub const MAX_RELEASE_NAME_LEN: usize = 53;

/// Check `name` against `^[a-z0-9]([a-z0-9-]*[a-z0-9])?$` and the length cap.
pub fn validate_release_name(name: &str) -> Result<(), EngineError> {
    if name.is_empty() {
        return Err(EngineError::Validation(
            "no release name provided".to_string(),
        ));
    }

    if name.len() > MAX_RELEASE_NAME_LEN {
        return Err(EngineError::Validation(format!(
            "release name '{}' exceeds {} characters",
            name, MAX_RELEASE_NAME_LEN
        )));
    }

    let allowed = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit();
    let valid = name.chars().all(|c| allowed(c) || c == '-')
        && name.chars().next().is_some_and(allowed)
        && name.chars().last().is_some_and(allowed);

    if !valid {
        return Err(EngineError::Validation(format!(
            "invalid release name '{}': must consist of lowercase alphanumeric characters or '-', and start and end with an alphanumeric character",
            name
        )));
    }

    Ok(())
}
