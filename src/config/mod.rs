//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) + WALLET_API_* environment
//!     → loader.rs (parse, deserialize, env overrides)
//!     → validation.rs (semantic checks)
//!     → WalletApiConfig (validated, immutable)
//!     → handed to subsystems at startup
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → atomic swap of the auth keys
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; only `[auth]` is hot-swappable
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::{
    AuthConfig, ListenerConfig, LogFormat, NodeConfig, ObservabilityConfig, TlsConfig,
    WalletApiConfig, WalletConfig,
};
