//! Node-facing types and error definitions.

use alloy::primitives::B256;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::transaction::block::AccountBlock;

/// Lifecycle of the shared node connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ConnectionStatus {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
    Failed = 3,
}

impl ConnectionStatus {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Connected,
            3 => Self::Failed,
            _ => Self::Disconnected,
        }
    }
}

/// Latest block of an account chain. Height 0 with a zero hash means the
/// chain is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainHead {
    pub height: u64,
    pub hash: B256,
}

/// One page of an account's blocks as reported by the node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlockPage {
    pub count: u64,
    #[serde(default)]
    pub list: Vec<AccountBlock>,
}

/// Errors that can occur while talking to the node.
#[derive(Debug, Error)]
pub enum NodeError {
    /// Dial or socket failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Request timed out.
    #[error("Node request timed out after {0} seconds")]
    Timeout(u64),

    #[error("Node connection closed")]
    ConnectionClosed,

    #[error("Not connected to node")]
    NotConnected,

    /// Malformed or unexpected response.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Block referenced an outdated previous hash or height.
    #[error("Stale chain head: {0}")]
    StaleHead(String),

    /// Node refused the block for another reason.
    #[error("Block rejected: {0}")]
    Rejected(String),
}

impl NodeError {
    /// Whether the session that produced this error is no longer usable.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Timeout(_) | Self::ConnectionClosed | Self::NotConnected
        )
    }

    /// Classify a JSON-RPC error message returned for a submission.
    pub fn from_rpc_message(message: &str) -> Self {
        let lower = message.to_ascii_lowercase();
        if lower.contains("previous") || lower.contains("height") {
            Self::StaleHead(message.to_string())
        } else {
            Self::Rejected(message.to_string())
        }
    }
}

/// Result type for node operations.
pub type NodeResult<T> = Result<T, NodeError>;
