//! Resilience helpers for node I/O.
//!
//! # Design Decisions
//! - Every node call has a deadline (see `node::client`)
//! - Submissions are retried at most once, after a jittered pause

pub mod backoff;

pub use backoff::Backoff;
