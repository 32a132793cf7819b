use crate::normalize::{DEFAULT_SCHEME, normalize};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "onboarding.yaml";
pub const ENV_PREFIX: &str = "ONBOARDING";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration build error: {0}")]
    Build(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Deployment-level overrides applied to every onboarding flow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AppConfig {
    /// Server address provided by the deployment. When set, the user cannot
    /// change the address.
    #[serde(default)]
    pub override_server_url: Option<String>,
    /// Path that replaces whatever path the user typed.
    #[serde(default)]
    pub override_server_path: Option<String>,
}

impl AppConfig {
    pub fn server_url_locked(&self) -> bool {
        self.override_server_url
            .as_deref()
            .is_some_and(|url| !url.trim().is_empty())
    }

    pub fn path_override(&self) -> Option<&str> {
        self.override_server_path
            .as_deref()
            .filter(|path| !path.is_empty())
    }

    /// The address to validate: the deployment override when locked, the user's text otherwise.
    pub fn effective_server_address<'a>(&'a self, user_input: &'a str) -> &'a str {
        match self.override_server_url.as_deref() {
            Some(url) if self.server_url_locked() => url,
            _ => user_input,
        }
    }

    /// # Errors
    ///
    /// [`ConfigError::Validation`] when an override cannot be used.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = self.path_override()
            && !path.starts_with('/')
        {
            return Err(ConfigError::Validation(format!(
                "override_server_path must start with '/': {path}"
            )));
        }
        if self.server_url_locked()
            && let Some(url) = self.override_server_url.as_deref()
        {
            let canonical = normalize(url, self.path_override())
                .map_err(|e| ConfigError::Validation(format!("override_server_url: {e}")))?;
            if canonical.scheme() != DEFAULT_SCHEME {
                return Err(ConfigError::Validation(format!(
                    "override_server_url must use https: {url}"
                )));
            }
        }
        Ok(())
    }
}

/// Load configuration from an optional `onboarding.yaml` + environment overrides.
///
/// Environment variables use the `ONBOARDING` prefix and `__` as separator,
/// e.g. `ONBOARDING__OVERRIDE_SERVER_PATH=/dav`.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    use config::{Config, Environment, File};
    let cfg = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false))
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?;
    finish(cfg)
}

/// Like [`load_config`] but the file at `path` must exist.
pub fn load_config_from(path: impl AsRef<Path>) -> Result<AppConfig, ConfigError> {
    use config::{Config, Environment, File};
    let cfg = Config::builder()
        .add_source(File::from(path.as_ref()))
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?;
    finish(cfg)
}

fn finish(cfg: config::Config) -> Result<AppConfig, ConfigError> {
    let app: AppConfig = cfg.try_deserialize()?;
    app.validate()?;
    Ok(app)
}
