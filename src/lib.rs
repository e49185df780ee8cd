//! Wallet API: a key-holding wallet service in front of a Zenon-style node.
//!
//! # Architecture Overview
//!
//! ```text
//!     HTTP client
//!         │
//!         ▼
//!     ┌────────────┐   ┌────────────┐   ┌─────────────────────┐
//!     │    http    │──▶│   wallet   │──▶│ keystore / vault    │
//!     │ auth+valid │   │   state    │   │ (Unlocked only)     │
//!     └─────┬──────┘   └─────┬──────┘   └─────────────────────┘
//!           │                │ accounts
//!           ▼                ▼
//!     ┌────────────────────────────┐   ┌────────────┐
//!     │  transaction pipeline      │──▶│    node    │──▶ node (WS JSON-RPC)
//!     │  head → sign → submit      │   │ connection │
//!     └────────────────────────────┘   └────────────┘
//!
//!     cross-cutting: config, observability, lifecycle, resilience
//! ```

// Core subsystems
pub mod config;
pub mod error;
pub mod http;
pub mod node;
pub mod transaction;
pub mod wallet;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::WalletApiConfig;
pub use error::{WalletError, WalletResult};
pub use http::{AppState, HttpServer};
pub use lifecycle::Shutdown;
