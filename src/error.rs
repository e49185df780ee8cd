//! Caller-facing error taxonomy and its HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::node::NodeError;
use crate::transaction::amount::AmountError;
use crate::wallet::keystore::KeystoreError;

/// Errors surfaced by wallet and transaction operations.
#[derive(Debug, Error)]
pub enum WalletError {
    /// Bad password or missing credentials.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Key material was requested while the wallet is not unlocked.
    #[error("Wallet is locked")]
    WalletLocked,

    /// An account handle from an earlier unlocked session was used.
    #[error("Account handle belongs to a previous wallet session")]
    StaleSession,

    /// Authorization policy denied the caller.
    #[error("Forbidden")]
    Forbidden,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// State transition not allowed, or the node kept rejecting the chain head.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Node unavailable: {0}")]
    NodeUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using WalletError.
pub type WalletResult<T> = Result<T, WalletError>;

impl WalletError {
    pub fn invalid<S: Into<String>>(msg: S) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn conflict<S: Into<String>>(msg: S) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) | Self::WalletLocked => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) | Self::StaleSession => StatusCode::CONFLICT,
            Self::NodeUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<KeystoreError> for WalletError {
    fn from(err: KeystoreError) -> Self {
        match err {
            KeystoreError::InvalidPassword => Self::Unauthorized("invalid password".to_string()),
            KeystoreError::InvalidMnemonic(msg) => Self::InvalidArgument(format!("invalid mnemonic: {}", msg)),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<NodeError> for WalletError {
    fn from(err: NodeError) -> Self {
        match err {
            NodeError::StaleHead(msg) => Self::Conflict(format!("stale chain head: {}", msg)),
            NodeError::Rejected(msg) => Self::Conflict(format!("node rejected block: {}", msg)),
            other => Self::NodeUnavailable(other.to_string()),
        }
    }
}

impl From<AmountError> for WalletError {
    fn from(err: AmountError) -> Self {
        Self::InvalidArgument(err.to_string())
    }
}

impl IntoResponse for WalletError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }
        let body = serde_json::json!({
            "error": self.to_string(),
            "code": status.as_u16()
        });
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(WalletError::WalletLocked.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(WalletError::StaleSession.status_code(), StatusCode::CONFLICT);
        assert_eq!(WalletError::invalid("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            WalletError::NodeUnavailable("down".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_node_error_conversion() {
        let err: WalletError = NodeError::StaleHead("previous hash mismatch".into()).into();
        assert!(matches!(err, WalletError::Conflict(_)));

        let err: WalletError = NodeError::Timeout(5).into();
        assert!(matches!(err, WalletError::NodeUnavailable(_)));
    }

    #[test]
    fn test_bad_password_is_unauthorized() {
        let err: WalletError = KeystoreError::InvalidPassword.into();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }
}
