//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, page size within RPC limits)
//! - Reject unusable auth keys and node URLs
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: WalletApiConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;

use crate::config::schema::{WalletApiConfig, RPC_MAX_PAGE_SIZE};

/// Smallest Argon2 memory cost accepted (the algorithm's floor is 8 KiB per lane).
const MIN_KDF_MEMORY_KIB: u32 = 8;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    /// What is wrong with it.
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &WalletApiConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<std::net::SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::new("listener.request_timeout_secs", "must be greater than 0"));
    }
    if config.listener.max_body_size == 0 {
        errors.push(ValidationError::new("listener.max_body_size", "must be greater than 0"));
    }

    if config.wallet.keystore_path.trim().is_empty() {
        errors.push(ValidationError::new("wallet.keystore_path", "must not be empty"));
    }
    if config.wallet.kdf_parallelism == 0 {
        errors.push(ValidationError::new("wallet.kdf_parallelism", "must be greater than 0"));
    }
    if config.wallet.kdf_iterations == 0 {
        errors.push(ValidationError::new("wallet.kdf_iterations", "must be greater than 0"));
    }
    if config.wallet.kdf_memory_kib < MIN_KDF_MEMORY_KIB * config.wallet.kdf_parallelism.max(1) {
        errors.push(ValidationError::new(
            "wallet.kdf_memory_kib",
            format!("must be at least {} KiB per lane", MIN_KDF_MEMORY_KIB),
        ));
    }
    if config.wallet.max_page_size == 0 || config.wallet.max_page_size > RPC_MAX_PAGE_SIZE {
        errors.push(ValidationError::new(
            "wallet.max_page_size",
            format!("must be in [1, {}]", RPC_MAX_PAGE_SIZE),
        ));
    }

    match url::Url::parse(&config.node.url) {
        Ok(url) if url.scheme() == "ws" || url.scheme() == "wss" => {}
        Ok(url) => errors.push(ValidationError::new(
            "node.url",
            format!("scheme '{}' is not ws or wss", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new("node.url", e.to_string())),
    }
    if config.node.connect_timeout_secs == 0 {
        errors.push(ValidationError::new("node.connect_timeout_secs", "must be greater than 0"));
    }
    if config.node.request_timeout_secs == 0 {
        errors.push(ValidationError::new("node.request_timeout_secs", "must be greater than 0"));
    }
    if config.node.retry_max_delay_ms < config.node.retry_delay_ms {
        errors.push(ValidationError::new(
            "node.retry_max_delay_ms",
            "must not be smaller than node.retry_delay_ms",
        ));
    }

    if config.auth.user_api_key.is_empty() {
        errors.push(ValidationError::new("auth.user_api_key", "must not be empty"));
    }
    if config.auth.admin_api_key.is_empty() {
        errors.push(ValidationError::new("auth.admin_api_key", "must not be empty"));
    }
    if !config.auth.user_api_key.is_empty() && config.auth.user_api_key == config.auth.admin_api_key {
        errors.push(ValidationError::new(
            "auth.admin_api_key",
            "must differ from auth.user_api_key",
        ));
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<std::net::SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "is not a socket address",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
