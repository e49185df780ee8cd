//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::WalletApiConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable overriding `auth.user_api_key`.
pub const USER_KEY_ENV_VAR: &str = "WALLET_API_USER_KEY";

/// Environment variable overriding `auth.admin_api_key`.
pub const ADMIN_KEY_ENV_VAR: &str = "WALLET_API_ADMIN_KEY";

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration from a TOML file.
///
/// A missing file yields the defaults; secrets may be supplied through the
/// environment instead of the file.
pub fn load_config(path: &Path) -> Result<WalletApiConfig, ConfigError> {
    let mut config = if path.exists() {
        let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
        parse_config(&content)?
    } else {
        tracing::warn!(path = ?path, "Config file not found, using defaults");
        WalletApiConfig::default()
    };

    apply_env_overrides(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Parse TOML text into a configuration without validating it.
pub fn parse_config(content: &str) -> Result<WalletApiConfig, ConfigError> {
    toml::from_str(content).map_err(ConfigError::Parse)
}

fn apply_env_overrides(config: &mut WalletApiConfig) {
    if let Ok(key) = std::env::var(USER_KEY_ENV_VAR) {
        config.auth.user_api_key = key;
    }
    if let Ok(key) = std::env::var(ADMIN_KEY_ENV_VAR) {
        config.auth.admin_api_key = key;
    }
}
