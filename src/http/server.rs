//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with every wallet endpoint
//! - Apply authorization policies per route group
//! - Wire up middleware (tracing, timeout, body limit, request ID, metrics)
//! - Serve plain TCP or TLS until shutdown

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::extract::{MatchedPath, Request};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::{AuthConfig, ListenerConfig, TlsConfig, WalletApiConfig};
use crate::http::validation::ValidationContext;
use crate::http::{auth, handlers};
use crate::lifecycle::Shutdown;
use crate::node::{NodeConnection, NodeTransport};
use crate::observability::metrics;
use crate::resilience::Backoff;
use crate::transaction::TransactionPipeline;
use crate::wallet::{AccountResolver, WalletState};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub wallet: Arc<WalletState>,
    pub accounts: AccountResolver,
    pub node: Arc<NodeConnection>,
    pub pipeline: TransactionPipeline,
    pub auth: Arc<ArcSwap<AuthConfig>>,
    pub validation: ValidationContext,
}

impl AppState {
    /// Wire the wallet and a node transport into shared state.
    pub fn new(config: &WalletApiConfig, wallet: Arc<WalletState>, transport: Arc<dyn NodeTransport>) -> Self {
        let node = Arc::new(NodeConnection::new(transport, &config.node));
        let accounts = AccountResolver::new(wallet.clone());
        let pipeline = TransactionPipeline::new(
            accounts.clone(),
            node.clone(),
            Backoff::from_config(&config.node),
        );

        Self {
            wallet,
            accounts,
            node,
            pipeline,
            auth: Arc::new(ArcSwap::from_pointee(config.auth.clone())),
            validation: ValidationContext::from_config(config),
        }
    }
}

/// HTTP server for the wallet API.
pub struct HttpServer {
    router: Router,
    listener: ListenerConfig,
    auth: Arc<ArcSwap<AuthConfig>>,
}

impl HttpServer {
    pub fn new(config: &WalletApiConfig, state: AppState) -> Self {
        let auth = state.auth.clone();
        let router = Self::build_router(&config.listener, state);
        Self {
            router,
            listener: config.listener.clone(),
            auth,
        }
    }

    /// The fully layered router, for serving or in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Handle for swapping API keys at runtime.
    pub fn auth_handle(&self) -> Arc<ArcSwap<AuthConfig>> {
        self.auth.clone()
    }

    #[allow(deprecated)]
    fn build_router(config: &ListenerConfig, state: AppState) -> Router {
        let user = Router::new()
            .route("/status", get(handlers::status))
            .route("/lock", post(handlers::lock))
            .route("/unlock", post(handlers::unlock))
            .route("/accounts", get(handlers::accounts))
            .route("/{accountIndex}/fuse", post(handlers::fuse))
            .route("/{accountIndex}/send", post(handlers::send))
            .route("/{accountIndex}/received", get(handlers::received))
            .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_user));

        let admin = Router::new()
            .route("/init", post(handlers::init))
            .route("/restore", post(handlers::restore))
            .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_admin));

        user.merge(admin)
            .with_state(state)
            .layer(middleware::from_fn(track_metrics))
            .layer(RequestBodyLimitLayer::new(config.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Serve until `shutdown` fires.
    pub async fn run(self, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr: SocketAddr = self.listener.bind_address.parse().map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid bind address '{}': {}", self.listener.bind_address, e),
            )
        })?;

        match self.listener.tls.clone() {
            Some(tls) => self.serve_tls(addr, tls, shutdown).await?,
            None => {
                let listener = TcpListener::bind(addr).await?;
                tracing::info!(address = %listener.local_addr()?, "HTTP server starting");

                axum::serve(listener, self.router)
                    .with_graceful_shutdown(async move { shutdown.wait().await })
                    .await?;
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    async fn serve_tls(self, addr: SocketAddr, tls: TlsConfig, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let rustls = load_tls_config(Path::new(&tls.cert_path), Path::new(&tls.key_path)).await?;
        let handle = axum_server::Handle::new();

        let graceful = handle.clone();
        tokio::spawn(async move {
            shutdown.wait().await;
            graceful.graceful_shutdown(Some(Duration::from_secs(10)));
        });

        tracing::info!(address = %addr, "HTTPS server starting");
        axum_server::bind_rustls(addr, rustls)
            .handle(handle)
            .serve(self.router.into_make_service())
            .await
    }
}

/// Load TLS certificate and key from PEM files.
pub async fn load_tls_config(cert_path: &Path, key_path: &Path) -> Result<RustlsConfig, std::io::Error> {
    for (what, path) in [("Certificate", cert_path), ("Private key", key_path)] {
        if !path.exists() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} file not found: {}", what, path.display()),
            ));
        }
    }
    RustlsConfig::from_pem_file(cert_path, key_path).await
}

async fn track_metrics(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(request).await;
    metrics::record_request(&method, &route, response.status().as_u16(), start);
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_tls_files() {
        let err = load_tls_config(Path::new("/nonexistent/cert.pem"), Path::new("/nonexistent/key.pem"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }
}
