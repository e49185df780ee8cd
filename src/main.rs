use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use wallet_api::config::loader::load_config;
use wallet_api::config::watcher::ConfigWatcher;
use wallet_api::lifecycle::signals::wait_for_signal;
use wallet_api::node::WsTransport;
use wallet_api::observability::{logging, metrics};
use wallet_api::wallet::WalletState;
use wallet_api::{AppState, HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "wallet-api", version, about = "HTTP wallet service for a Zenon-style node")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "wallet-api.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match load_config(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("wallet-api: {}", e);
            std::process::exit(2);
        }
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "wallet-api starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        node_url = %config.node.url,
        keystore = %config.wallet.keystore_path,
        tls = config.listener.tls.is_some(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let wallet = match WalletState::open(&config.wallet) {
        Ok(wallet) => Arc::new(wallet),
        Err(e) => {
            tracing::error!(error = %e, keystore = %config.wallet.keystore_path, "Cannot open keystore, refusing to start");
            return Err(e.into());
        }
    };

    let transport = Arc::new(WsTransport::new(&config.node));
    let state = AppState::new(&config, wallet.clone(), transport);
    let server = HttpServer::new(&config, state);

    let _watcher = match ConfigWatcher::new(&args.config, server.auth_handle()).run() {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            tracing::warn!(error = %e, "Config hot reload disabled");
            None
        }
    };

    let shutdown = Shutdown::new();
    tokio::spawn(wait_for_signal(shutdown.clone()));

    let served = server.run(shutdown).await;

    wallet.lock().await;
    tracing::info!("Wallet locked, shutdown complete");

    served?;
    Ok(())
}
