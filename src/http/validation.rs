//! Request validation.
//!
//! Bodies and query strings are checked before they reach the wallet or
//! the node. Failures become 400 with a per-field error map.

use std::collections::BTreeMap;

use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;

use crate::config::WalletApiConfig;
use crate::error::WalletError;
use crate::http::server::AppState;

/// Limits request validation needs from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationContext {
    pub max_page_size: u32,
}

impl ValidationContext {
    pub fn from_config(config: &WalletApiConfig) -> Self {
        Self {
            max_page_size: config.wallet.max_page_size,
        }
    }
}

/// Field-level validation errors.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: BTreeMap<&'static str, Vec<String>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.entry(field).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.errors.keys().copied()
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl IntoResponse for ValidationErrors {
    fn into_response(self) -> Response {
        tracing::debug!(fields = ?self.errors.keys().collect::<Vec<_>>(), "Request failed validation");
        let body = serde_json::json!({
            "error": "One or more validation errors occurred",
            "code": StatusCode::BAD_REQUEST.as_u16(),
            "errors": self.errors,
        });
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}

/// Semantic checks on a deserialized request.
pub trait Validate {
    fn validate(&self, ctx: &ValidationContext) -> Result<(), ValidationErrors>;
}

/// JSON body that has passed `Validate`.
#[derive(Debug)]
pub struct ValidJson<T>(pub T);

impl<T> FromRequest<AppState> for ValidJson<T>
where
    T: DeserializeOwned + Validate + Send,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| WalletError::invalid(rejection.body_text()).into_response())?;
        value
            .validate(&state.validation)
            .map_err(IntoResponse::into_response)?;
        Ok(Self(value))
    }
}

/// Query string that has passed `Validate`.
#[derive(Debug)]
pub struct ValidQuery<T>(pub T);

impl<T> FromRequestParts<AppState> for ValidQuery<T>
where
    T: DeserializeOwned + Validate + Send,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| WalletError::invalid(rejection.body_text()).into_response())?;
        value
            .validate(&state.validation)
            .map_err(IntoResponse::into_response)?;
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_collect_per_field() {
        let mut errors = ValidationErrors::new();
        assert!(errors.clone().into_result().is_ok());

        errors.add("pageSize", "too big");
        errors.add("pageSize", "odd");
        errors.add("address", "bad");
        assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["address", "pageSize"]);
        assert!(errors.into_result().is_err());
    }

    #[test]
    fn test_errors_render_as_bad_request() {
        let mut errors = ValidationErrors::new();
        errors.add("password", "required");
        let response = errors.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
