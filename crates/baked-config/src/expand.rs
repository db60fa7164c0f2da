//! Variable expansion for `baked.toml` string values.
//!
//! Paths additionally get `~` expanded to the home directory.

use crate::ConfigError;

/// Expand `${VAR}` and `${VAR:-default}` references in a config value.
///
/// Bare `$VAR` is left alone so literal dollar signs survive.
pub(crate) fn expand_vars(value: &str, field: &str) -> Result<String, ConfigError> {
    if !value.contains("${") {
        return Ok(value.to_owned());
    }

    shellexpand::env_with_context(value, |name| -> Result<Option<String>, UnsetVar> {
        std::env::var(name).map(Some).map_err(|_| UnsetVar(name.to_owned()))
    })
    .map(std::borrow::Cow::into_owned)
    .map_err(|e| ConfigError::EnvVar {
        field: field.to_owned(),
        message: format!("${{{}}} not set", e.cause.0),
    })
}

/// Expand variables and a leading `~` in a path value.
pub(crate) fn expand_path(value: &str, field: &str) -> Result<String, ConfigError> {
    let expanded = expand_vars(value, field)?;
    Ok(shellexpand::tilde(&expanded).into_owned())
}

/// Variable referenced without a default and not present in the environment.
struct UnsetVar(String);
