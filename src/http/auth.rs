//! Bearer-key authorization.
//!
//! Two policies: `User` accepts the user or the admin key, `Admin` accepts
//! only the admin key. A missing or unknown key is 401; a user key on an
//! admin route is 403.

use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;

use crate::config::AuthConfig;
use crate::error::WalletError;
use crate::http::server::AppState;

/// Authorization policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    User,
    Admin,
}

/// Caller role established from the presented key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

/// Decide whether `token` satisfies `policy` under `keys`.
pub fn authorize(keys: &AuthConfig, token: Option<&str>, policy: Policy) -> Result<Role, WalletError> {
    let token = token.ok_or_else(|| WalletError::Unauthorized("missing bearer token".to_string()))?;

    let role = if constant_time_eq(token.as_bytes(), keys.admin_api_key.as_bytes()) {
        Role::Admin
    } else if constant_time_eq(token.as_bytes(), keys.user_api_key.as_bytes()) {
        Role::User
    } else {
        return Err(WalletError::Unauthorized("invalid API key".to_string()));
    };

    match (policy, role) {
        (Policy::Admin, Role::User) => Err(WalletError::Forbidden),
        _ => Ok(role),
    }
}

pub async fn require_user(State(state): State<AppState>, request: Request, next: Next) -> Result<Response, WalletError> {
    enforce(&state, Policy::User, request, next).await
}

pub async fn require_admin(State(state): State<AppState>, request: Request, next: Next) -> Result<Response, WalletError> {
    enforce(&state, Policy::Admin, request, next).await
}

async fn enforce(state: &AppState, policy: Policy, request: Request, next: Next) -> Result<Response, WalletError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    let verdict = {
        let keys = state.auth.load();
        authorize(&keys, token, policy)
    };
    let role = verdict.map_err(|e| {
        tracing::warn!(path = %request.uri().path(), policy = ?policy, error = %e, "Request not authorized");
        e
    })?;

    tracing::debug!(
        method = %request.method(),
        path = %request.uri().path(),
        role = role.as_str(),
        "Request authorized"
    );
    Ok(next.run(request).await)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
