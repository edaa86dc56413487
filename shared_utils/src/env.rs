use thiserror::Error;

/// An environment variable required by the application is not set.
#[derive(Debug, Error)]
#[error("Missing environment variable: {0}")]
pub struct MissingEnvVarError(pub String);

/// Reads an environment variable, returning a structured error if it's missing.
///
/// # Arguments
/// * `name` - The name of the environment variable to read.
pub fn get_env_var(name: &str) -> Result<String, MissingEnvVarError> {
    std::env::var(name).map_err(|_| MissingEnvVarError(name.to_string()))
}

/// Like [`get_env_var`], but treats an empty or whitespace-only value as missing.
pub fn get_non_empty_env_var(name: &str) -> Result<String, MissingEnvVarError> {
    get_env_var(name).and_then(|v| {
        if v.trim().is_empty() {
            Err(MissingEnvVarError(name.to_string()))
        } else {
            Ok(v)
        }
    })
}

/// Reads an optional override, returning `None` when it's unset or blank.
pub fn optional_env_var(name: &str) -> Option<String> {
    get_non_empty_env_var(name).ok()
}
