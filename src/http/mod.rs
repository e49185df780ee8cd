//! HTTP API subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, tower layers, request ID)
//!     → auth.rs (User / Admin bearer policy)
//!     → validation.rs (ValidJson / ValidQuery extractors)
//!     → handlers.rs (wallet, account and transaction operations)
//!     → models.rs (response bodies) or WalletError (JSON error body)
//! ```

pub mod auth;
pub mod handlers;
pub mod models;
pub mod server;
pub mod validation;

pub use auth::Policy;
pub use server::{AppState, HttpServer};
pub use validation::ValidationContext;
