//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the wallet service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Largest page the node RPC will serve in a single call.
pub const RPC_MAX_PAGE_SIZE: u32 = 1024;

/// Root configuration for the wallet service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct WalletApiConfig {
    /// Listener configuration (bind address, TLS, limits).
    pub listener: ListenerConfig,

    /// Keystore location and key-derivation cost.
    pub wallet: WalletConfig,

    /// Remote node connection settings.
    pub node: NodeConfig,

    /// Bearer keys for the `User` and `Admin` policies.
    pub auth: AuthConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:5000").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,

    /// Maximum accepted request body in bytes.
    pub max_body_size: usize,

    /// Request timeout (total time for request/response) in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:5000".to_string(),
            tls: None,
            max_body_size: 64 * 1024,
            request_timeout_secs: 60,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Keystore configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WalletConfig {
    /// Path of the encrypted keystore file.
    pub keystore_path: String,

    /// Argon2id memory cost in KiB.
    pub kdf_memory_kib: u32,

    /// Argon2id iterations.
    pub kdf_iterations: u32,

    /// Argon2id lanes.
    pub kdf_parallelism: u32,

    /// Upper bound for `pageSize` in paged queries.
    pub max_page_size: u32,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            keystore_path: "wallet/keystore.json".to_string(),
            kdf_memory_kib: 64 * 1024,
            kdf_iterations: 3,
            kdf_parallelism: 1,
            max_page_size: RPC_MAX_PAGE_SIZE,
        }
    }
}

/// Node connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NodeConfig {
    /// WebSocket JSON-RPC endpoint of the node.
    pub url: String,

    /// Dial timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Per-call RPC timeout in seconds.
    pub request_timeout_secs: u64,

    /// Base delay before the single submission retry, in milliseconds.
    pub retry_delay_ms: u64,

    /// Cap for the retry delay, in milliseconds.
    pub retry_max_delay_ms: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:35998".to_string(),
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
            retry_delay_ms: 250,
            retry_max_delay_ms: 2000,
        }
    }
}

/// Bearer-key authorization configuration.
///
/// The admin key satisfies both policies; the user key only `User`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct AuthConfig {
    /// Key accepted for the `User` policy.
    pub user_api_key: String,

    /// Key accepted for the `Admin` policy.
    pub admin_api_key: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            // WARNING: These are placeholders! Change them in production.
            user_api_key: "CHANGE_ME_USER_KEY".to_string(),
            admin_api_key: "CHANGE_ME_ADMIN_KEY".to_string(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let config: WalletApiConfig = toml::from_str(
            r#"
            [node]
            url = "ws://10.0.0.2:35998"
            "#,
        )
        .unwrap();

        assert_eq!(config.node.url, "ws://10.0.0.2:35998");
        assert_eq!(config.node.request_timeout_secs, 30);
        assert_eq!(config.wallet.max_page_size, RPC_MAX_PAGE_SIZE);
        assert_eq!(config.observability.log_format, LogFormat::Pretty);
        assert!(config.listener.tls.is_none());
    }

    #[test]
    fn test_log_format_parses_lowercase() {
        let config: ObservabilityConfig = toml::from_str(r#"log_format = "json""#).unwrap();
        assert_eq!(config.log_format, LogFormat::Json);
    }
}
