use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::config::schema::Config;
use crate::error::ConfigError;

pub const CONFIG_ENV: &str = "NARRATOR_CONFIG";
pub const AUTH_TOKEN_ENV: &str = "NARRATOR_AUTH_TOKEN";

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut config: Config = serde_yaml::from_str(&content)?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config)?;

    log::info!("Loaded config from {}", path.display());
    Ok(config)
}

/// Parses and validates without consulting the environment.
pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_yaml::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

/// Resolves the config path: `NARRATOR_CONFIG`, else
/// `<config dir>/narrator/config.yaml` if it exists.
pub fn find_config_path() -> Result<PathBuf, ConfigError> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return Ok(PathBuf::from(path));
    }

    let candidate = dirs::config_dir()
        .map(|d| d.join("narrator").join("config.yaml"))
        .unwrap_or_else(|| PathBuf::from("config.yaml"));
    if candidate.exists() {
        Ok(candidate)
    } else {
        Err(ConfigError::NotFound(candidate))
    }
}

fn apply_env_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(token) = lookup(AUTH_TOKEN_ENV).filter(|t| !t.is_empty()) {
        config.auth.token = token;
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        message: message.into(),
    }
}

fn validate_engines<'a>(
    kind: &str,
    names: impl Iterator<Item = (&'a str, &'a str, bool)>,
) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    let mut defaults = 0;
    for (name, endpoint, is_default) in names {
        if name.trim().is_empty() {
            return Err(invalid(format!("{} with an empty name", kind)));
        }
        if !seen.insert(name) {
            return Err(invalid(format!("Duplicate {} name '{}'", kind, name)));
        }
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(invalid(format!(
                "{} '{}' endpoint must be an http(s) URL, got '{}'",
                kind, name, endpoint
            )));
        }
        if is_default {
            defaults += 1;
        }
    }

    if seen.is_empty() {
        return Err(invalid(format!("At least one {} must be configured", kind)));
    }
    if defaults > 1 {
        return Err(invalid(format!("More than one default {}", kind)));
    }
    Ok(())
}

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.auth.token.trim().is_empty() {
        return Err(invalid(format!(
            "auth.token is empty (set it in the config or via {})",
            AUTH_TOKEN_ENV
        )));
    }

    for (event, prompt) in &config.prompts.event_prompts {
        if prompt.template.trim().is_empty() {
            return Err(invalid(format!("Event prompt '{}' has an empty template", event)));
        }
    }

    validate_engines(
        "text generator",
        config
            .engines
            .text_generators
            .iter()
            .map(|e| (e.name.as_str(), e.endpoint.as_str(), e.default)),
    )?;
    validate_engines(
        "speech synthesizer",
        config
            .engines
            .speech_synthesizers
            .iter()
            .map(|e| (e.name.as_str(), e.endpoint.as_str(), e.default)),
    )?;

    Ok(())
}
