//! Shared utilities for integration testing.
#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use alloy::primitives::{keccak256, Address};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

use wallet_api::config::WalletApiConfig;
use wallet_api::node::{BlockPage, ChainHead, NodeError, NodeResult, NodeSession, NodeTransport};
use wallet_api::transaction::AccountBlock;
use wallet_api::wallet::WalletState;
use wallet_api::AppState;

pub const TEST_MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon \
    abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon \
    abandon abandon abandon art";

pub const PASSWORD: &str = "correct horse battery staple";
pub const USER_KEY: &str = "test-user-key";
pub const ADMIN_KEY: &str = "test-admin-key";

/// Config with a fresh keystore location, cheap KDF and fast retries.
pub fn test_config(name: &str) -> WalletApiConfig {
    let dir = std::env::temp_dir().join(format!("wallet-api-it-{}-{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);

    let mut config = WalletApiConfig::default();
    config.wallet.keystore_path = dir.join("keystore.json").to_string_lossy().into_owned();
    config.wallet.kdf_memory_kib = 64;
    config.wallet.kdf_iterations = 1;
    config.wallet.kdf_parallelism = 1;
    config.node.connect_timeout_secs = 2;
    config.node.request_timeout_secs = 2;
    config.node.retry_delay_ms = 10;
    config.node.retry_max_delay_ms = 20;
    config.auth.user_api_key = USER_KEY.to_string();
    config.auth.admin_api_key = ADMIN_KEY.to_string();
    config
}

/// Shared state over an uninitialized wallet and the given transport.
pub fn build_state(config: &WalletApiConfig, transport: Arc<dyn NodeTransport>) -> AppState {
    let wallet = Arc::new(WalletState::open(&config.wallet).expect("open wallet"));
    AppState::new(config, wallet, transport)
}

/// Shared state with the test mnemonic restored and unlocked.
pub async fn unlocked_state(name: &str, node: &MockNode) -> AppState {
    let config = test_config(name);
    let state = build_state(&config, Arc::new(node.clone()));
    state
        .wallet
        .restore(PASSWORD.to_string(), TEST_MNEMONIC.to_string())
        .await
        .expect("restore wallet");
    state
}

#[derive(Default)]
struct MockState {
    dials: AtomicUsize,
    publishes: AtomicUsize,
    offline: AtomicBool,
    epoch: AtomicU64,
    stale_publishes: AtomicUsize,
    drop_next_publish: AtomicBool,
    fail_frontier: AtomicBool,
    frontier_calls: AtomicUsize,
    publish_delay_ms: AtomicU64,
    heads: Mutex<HashMap<Address, ChainHead>>,
    accepted: Mutex<Vec<AccountBlock>>,
}

/// In-process node double.
///
/// Validates blocks against per-account chain heads the way a node would:
/// a block must sit at `head.height + 1` on top of `head.hash`.
#[derive(Clone, Default)]
pub struct MockNode {
    state: Arc<MockState>,
}

impl MockNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dial_count(&self) -> usize {
        self.state.dials.load(Ordering::SeqCst)
    }

    pub fn publish_count(&self) -> usize {
        self.state.publishes.load(Ordering::SeqCst)
    }

    /// Refuse dials and fail calls on existing sessions.
    pub fn set_offline(&self, offline: bool) {
        self.state.offline.store(offline, Ordering::SeqCst);
    }

    /// Close every open session.
    pub fn kill_connections(&self) {
        self.state.epoch.fetch_add(1, Ordering::SeqCst);
    }

    /// Let someone else extend the chain right before each of the next `n`
    /// publishes, so they reference a stale head.
    pub fn advance_head_before_publish(&self, n: usize) {
        self.state.stale_publishes.store(n, Ordering::SeqCst);
    }

    /// Drop the connection while the next block is in flight.
    pub fn drop_next_publish(&self) {
        self.state.drop_next_publish.store(true, Ordering::SeqCst);
    }

    /// Fail every chain head query as if the socket had died.
    pub fn fail_frontier(&self, fail: bool) {
        self.state.fail_frontier.store(fail, Ordering::SeqCst);
    }

    pub fn frontier_count(&self) -> usize {
        self.state.frontier_calls.load(Ordering::SeqCst)
    }

    /// Hold each publish for `delay` before the node processes it.
    pub fn set_publish_delay(&self, delay: std::time::Duration) {
        self.state.publish_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set_head(&self, address: Address, head: ChainHead) {
        self.state.heads.lock().unwrap().insert(address, head);
    }

    pub fn head(&self, address: Address) -> ChainHead {
        self.state.heads.lock().unwrap().get(&address).copied().unwrap_or_default()
    }

    pub fn accepted(&self) -> Vec<AccountBlock> {
        self.state.accepted.lock().unwrap().clone()
    }
}

#[async_trait]
impl NodeTransport for MockNode {
    async fn dial(&self) -> NodeResult<Arc<dyn NodeSession>> {
        self.state.dials.fetch_add(1, Ordering::SeqCst);
        if self.state.offline.load(Ordering::SeqCst) {
            return Err(NodeError::Transport("connection refused".to_string()));
        }
        Ok(Arc::new(MockSession {
            node: self.clone(),
            epoch: self.state.epoch.load(Ordering::SeqCst),
        }))
    }

    fn endpoint(&self) -> String {
        "mock://node".to_string()
    }
}

struct MockSession {
    node: MockNode,
    epoch: u64,
}

impl MockSession {
    fn check_open(&self) -> NodeResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(NodeError::ConnectionClosed)
        }
    }
}

#[async_trait]
impl NodeSession for MockSession {
    async fn frontier(&self, address: Address) -> NodeResult<ChainHead> {
        self.check_open()?;
        let state = &self.node.state;
        state.frontier_calls.fetch_add(1, Ordering::SeqCst);
        if state.fail_frontier.load(Ordering::SeqCst) {
            return Err(NodeError::ConnectionClosed);
        }
        Ok(self.node.head(address))
    }

    async fn publish(&self, block: &AccountBlock) -> NodeResult<AccountBlock> {
        self.check_open()?;
        let state = &self.node.state;
        state.publishes.fetch_add(1, Ordering::SeqCst);

        let delay = state.publish_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
        }

        if state.drop_next_publish.swap(false, Ordering::SeqCst) {
            self.node.kill_connections();
            return Err(NodeError::ConnectionClosed);
        }

        let mut heads = state.heads.lock().unwrap();
        let head = heads.entry(block.producer()).or_default();

        let pending_stale = state.stale_publishes.load(Ordering::SeqCst);
        if pending_stale > 0 {
            state.stale_publishes.store(pending_stale - 1, Ordering::SeqCst);
            let foreign = keccak256(head.hash);
            *head = ChainHead {
                height: head.height + 1,
                hash: foreign,
            };
        }

        if block.previous_hash() != head.hash || block.height() != head.height + 1 {
            return Err(NodeError::from_rpc_message(&format!(
                "previous hash {} does not match frontier {}",
                block.previous_hash(),
                head.hash
            )));
        }
        if !block.verify() {
            return Err(NodeError::Rejected("invalid signature".to_string()));
        }

        *head = block.as_head();
        let accepted = block.clone().with_confirmation(keccak256(block.hash()));
        state.accepted.lock().unwrap().push(accepted.clone());
        Ok(accepted)
    }

    async fn account_blocks(&self, address: Address, page_index: u32, page_size: u32) -> NodeResult<BlockPage> {
        self.check_open()?;
        let blocks: Vec<AccountBlock> = self
            .node
            .accepted()
            .into_iter()
            .filter(|b| b.producer() == address || b.to_address() == address)
            .collect();
        let count = blocks.len() as u64;
        let list = blocks
            .into_iter()
            .skip(page_index as usize * page_size as usize)
            .take(page_size as usize)
            .collect();
        Ok(BlockPage { count, list })
    }

    fn is_open(&self) -> bool {
        let state = &self.node.state;
        !state.offline.load(Ordering::SeqCst) && state.epoch.load(Ordering::SeqCst) == self.epoch
    }
}

/// Minimal JSON-RPC node over WebSocket. Every chain is empty; published
/// blocks are echoed back. With `stale_first`, the first publish fails with
/// a previous-hash error.
///
/// Returns the `ws://` URL and a counter of publish calls.
pub async fn start_ws_node(stale_first: bool) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    let publishes = Arc::new(AtomicUsize::new(0));
    let counter = publishes.clone();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let counter = counter.clone();
            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };
                while let Some(Ok(msg)) = ws.next().await {
                    let Message::Text(text) = msg else { continue };
                    let request: Value = match serde_json::from_str(text.as_str()) {
                        Ok(value) => value,
                        Err(_) => continue,
                    };
                    let id = request["id"].clone();
                    let response = match request["method"].as_str() {
                        Some("ledger.publishRawTransaction") => {
                            let n = counter.fetch_add(1, Ordering::SeqCst);
                            if stale_first && n == 0 {
                                json!({
                                    "jsonrpc": "2.0",
                                    "id": id,
                                    "error": {"code": -32000, "message": "block previous hash does not match frontier"}
                                })
                            } else {
                                json!({"jsonrpc": "2.0", "id": id, "result": request["params"][0]})
                            }
                        }
                        Some("ledger.getAccountBlocksByPage") => {
                            json!({"jsonrpc": "2.0", "id": id, "result": {"count": 0, "list": []}})
                        }
                        _ => json!({"jsonrpc": "2.0", "id": id, "result": null}),
                    };
                    if ws.send(Message::text(response.to_string())).await.is_err() {
                        break;
                    }
                }
            });
        }
    });

    (format!("ws://{}", addr), publishes)
}

/// WebSocket node that accepts requests and never answers them.
///
/// Returns the `ws://` URL, a counter of accepted connections and a counter
/// of connections the client has since closed.
pub async fn start_silent_ws_node() -> (String, Arc<AtomicUsize>, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));
    let closed = Arc::new(AtomicUsize::new(0));
    let (accepts, closes) = (accepted.clone(), closed.clone());

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            accepts.fetch_add(1, Ordering::SeqCst);
            let closes = closes.clone();
            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };
                while let Some(Ok(_)) = ws.next().await {}
                closes.fetch_add(1, Ordering::SeqCst);
            });
        }
    });

    (format!("ws://{}", addr), accepted, closed)
}
