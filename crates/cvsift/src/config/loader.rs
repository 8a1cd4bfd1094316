use std::path::Path;

use log::{info, warn};

use crate::config::schema::{Config, FALLBACK_PROMPT};
use crate::error::ConfigError;

/// Environment variable holding a comma-separated credential list. Takes
/// precedence over `api_keys` in the config file.
pub const API_KEYS_ENV: &str = "CVSIFT_API_KEYS";

/// Optional endpoint/model overrides.
pub const API_URL_ENV: &str = "CVSIFT_API_URL";
pub const MODEL_ENV: &str = "CVSIFT_MODEL";

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let mut config: Config = serde_json::from_str(content)?;

    apply_env_overrides(&mut config);
    validate_config(&config)?;

    Ok(config)
}

/// Builds a config purely from defaults and environment variables, for
/// deployments without a config file.
pub fn load_config_from_env() -> Result<Config, ConfigError> {
    let mut config = Config::default();
    apply_env_overrides(&mut config);
    validate_config(&config)?;
    Ok(config)
}

fn apply_env_overrides(config: &mut Config) {
    if let Ok(keys) = std::env::var(API_KEYS_ENV) {
        let keys: Vec<String> = keys
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(String::from)
            .collect();
        if !keys.is_empty() {
            config.api_keys = keys;
        }
    }

    if let Ok(url) = std::env::var(API_URL_ENV) {
        if !url.trim().is_empty() {
            config.api_url = url.trim().to_string();
        }
    }

    if let Ok(model) = std::env::var(MODEL_ENV) {
        if !model.trim().is_empty() {
            config.model = model.trim().to_string();
        }
    }

    if config.api_keys.is_empty() {
        warn!("No API keys configured; batch submission will fail until {API_KEYS_ENV} is set");
    }
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.api_url.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "api_url must not be empty".to_string(),
        });
    }

    if config.model.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "model must not be empty".to_string(),
        });
    }

    if config.max_workers == 0 {
        return Err(ConfigError::Validation {
            message: "max_workers must be at least 1".to_string(),
        });
    }

    if config.ocr.dpi == 0 {
        return Err(ConfigError::Validation {
            message: "ocr.dpi must be at least 1".to_string(),
        });
    }

    Ok(())
}

/// Resolves the system prompt: the configured prompt file when present,
/// otherwise the built-in fallback.
pub fn load_prompt(config: &Config) -> Result<String, ConfigError> {
    match &config.prompt_path {
        Some(path) => {
            let prompt =
                std::fs::read_to_string(path).map_err(|e| ConfigError::ReadPrompt {
                    path: path.into(),
                    source: e,
                })?;
            info!("Loaded prompt from: {}", path);
            Ok(prompt)
        }
        None => Ok(FALLBACK_PROMPT.to_string()),
    }
}
