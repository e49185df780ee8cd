//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Open wallet → Node client → HTTP listener
//!
//! Shutdown (shutdown.rs):
//!     Trigger latches → Stop accepting → Drain requests → Lock wallet → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - A corrupt keystore aborts startup
//! - The wallet is locked on the way out so key material is zeroed

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
