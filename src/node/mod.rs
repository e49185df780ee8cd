//! Node connectivity.
//!
//! # Data Flow
//! ```text
//! TransactionPipeline / handlers
//!     → connection.rs (lazy dial, status, single retry on dead session)
//!     → client.rs (NodeTransport / NodeSession traits)
//!     → WsTransport (JSON-RPC 2.0 over WebSocket)
//! ```

pub mod client;
pub mod connection;
pub mod types;

pub use client::{NodeSession, NodeTransport, WsTransport};
pub use connection::NodeConnection;
pub use types::{BlockPage, ChainHead, ConnectionStatus, NodeError, NodeResult};
