//! Node client: transport abstraction and the WebSocket JSON-RPC transport.
//!
//! # Responsibilities
//! - Dial the node and hand out a session
//! - Correlate JSON-RPC requests and responses by id
//! - Map RPC failures to `NodeError` (stale head vs. other rejections)

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::config::NodeConfig;
use crate::node::types::{BlockPage, ChainHead, NodeError, NodeResult};
use crate::transaction::block::AccountBlock;

/// Something that can open sessions to a node.
#[async_trait]
pub trait NodeTransport: Send + Sync {
    /// Establish a new session.
    async fn dial(&self) -> NodeResult<Arc<dyn NodeSession>>;

    /// Human-readable endpoint, for logs.
    fn endpoint(&self) -> String;
}

/// An established node session.
#[async_trait]
pub trait NodeSession: Send + Sync {
    /// Latest block of `address`'s chain.
    async fn frontier(&self, address: Address) -> NodeResult<ChainHead>;

    /// Broadcast a signed block; returns the block as accepted by the node.
    async fn publish(&self, block: &AccountBlock) -> NodeResult<AccountBlock>;

    /// Page through the blocks of `address`.
    async fn account_blocks(&self, address: Address, page_index: u32, page_size: u32) -> NodeResult<BlockPage>;

    /// False once the underlying socket is gone.
    fn is_open(&self) -> bool;
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Pending = DashMap<u64, oneshot::Sender<Result<Value, RpcError>>>;

#[derive(Debug, Deserialize)]
struct RpcError {
    #[serde(default)]
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    id: Option<u64>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

/// JSON-RPC 2.0 over WebSocket.
#[derive(Debug, Clone)]
pub struct WsTransport {
    url: String,
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl WsTransport {
    pub fn new(config: &NodeConfig) -> Self {
        Self {
            url: config.url.clone(),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }
}

#[async_trait]
impl NodeTransport for WsTransport {
    async fn dial(&self) -> NodeResult<Arc<dyn NodeSession>> {
        tracing::info!(url = %self.url, "Connecting to node");

        let (stream, _response) = timeout(self.connect_timeout, connect_async(self.url.as_str()))
            .await
            .map_err(|_| NodeError::Timeout(self.connect_timeout.as_secs()))?
            .map_err(|e| NodeError::Transport(e.to_string()))?;

        let (write, read) = stream.split();
        let pending = Arc::new(DashMap::new());
        let open = Arc::new(AtomicBool::new(true));
        let reader = tokio::spawn(read_loop(read, pending.clone(), open.clone()));

        let session = Arc::new(WsSession {
            writer: Mutex::new(write),
            pending,
            next_id: AtomicU64::new(1),
            open,
            reader,
            request_timeout: self.request_timeout,
        });

        tracing::info!(url = %self.url, "Connected to node");
        Ok(session)
    }

    fn endpoint(&self) -> String {
        self.url.clone()
    }
}

struct WsSession {
    writer: Mutex<SplitSink<WsStream, Message>>,
    pending: Arc<Pending>,
    next_id: AtomicU64,
    open: Arc<AtomicBool>,
    reader: JoinHandle<()>,
    request_timeout: Duration,
}

impl WsSession {
    /// Stop reading and mark the session dead. The socket closes once the
    /// last handle on the session is dropped.
    fn shut(&self) {
        self.open.store(false, Ordering::SeqCst);
        self.reader.abort();
        self.pending.clear();
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> NodeResult<T> {
        if !self.is_open() {
            return Err(NodeError::ConnectionClosed);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);

        let request = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let sent = self.writer.lock().await.send(Message::text(request.to_string())).await;
        if let Err(e) = sent {
            self.pending.remove(&id);
            self.open.store(false, Ordering::SeqCst);
            return Err(NodeError::Transport(e.to_string()));
        }

        let outcome = match timeout(self.request_timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => return Err(NodeError::ConnectionClosed),
            Err(_) => {
                self.pending.remove(&id);
                self.shut();
                tracing::warn!(method, id, "Node request timed out, dropping session");
                return Err(NodeError::Timeout(self.request_timeout.as_secs()));
            }
        };

        match outcome {
            Ok(value) => serde_json::from_value(value)
                .map_err(|e| NodeError::Protocol(format!("{}: {}", method, e))),
            Err(rpc) => {
                tracing::debug!(method, code = rpc.code, message = %rpc.message, "Node returned an error");
                Err(NodeError::from_rpc_message(&rpc.message))
            }
        }
    }
}

#[async_trait]
impl NodeSession for WsSession {
    async fn frontier(&self, address: Address) -> NodeResult<ChainHead> {
        let head: Option<ChainHead> = self
            .call("ledger.getFrontierAccountBlock", json!([address]))
            .await?;
        Ok(head.unwrap_or_default())
    }

    async fn publish(&self, block: &AccountBlock) -> NodeResult<AccountBlock> {
        let accepted: Option<AccountBlock> = self
            .call("ledger.publishRawTransaction", json!([block]))
            .await?;
        Ok(accepted.unwrap_or_else(|| block.clone()))
    }

    async fn account_blocks(&self, address: Address, page_index: u32, page_size: u32) -> NodeResult<BlockPage> {
        let page: Option<BlockPage> = self
            .call("ledger.getAccountBlocksByPage", json!([address, page_index, page_size]))
            .await?;
        Ok(page.unwrap_or_default())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

impl Drop for WsSession {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Route responses to their waiters until the socket closes, then fail
/// everything still pending.
async fn read_loop(mut read: SplitStream<WsStream>, pending: Arc<Pending>, open: Arc<AtomicBool>) {
    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Text(text)) => match serde_json::from_str::<RpcResponse>(text.as_str()) {
                Ok(response) => {
                    let Some(id) = response.id else {
                        tracing::debug!("Ignoring node notification");
                        continue;
                    };
                    let Some((_, waiter)) = pending.remove(&id) else {
                        tracing::debug!(id, "Response for unknown request");
                        continue;
                    };
                    let outcome = match response.error {
                        Some(error) => Err(error),
                        None => Ok(response.result.unwrap_or(Value::Null)),
                    };
                    let _ = waiter.send(outcome);
                }
                Err(e) => tracing::warn!(error = %e, "Failed to parse node response"),
            },
            Ok(Message::Close(_)) => {
                tracing::info!("Node closed the connection");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(error = %e, "Node socket read error");
                break;
            }
        }
    }

    open.store(false, Ordering::SeqCst);
    // Dropping the senders wakes every waiter with ConnectionClosed.
    pending.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_response_parsing() {
        let ok: RpcResponse =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":3,"result":{"height":4}}"#).unwrap();
        assert_eq!(ok.id, Some(3));
        assert!(ok.error.is_none());

        let err: RpcResponse = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":4,"error":{"code":-32000,"message":"invalid previous hash"}}"#,
        )
        .unwrap();
        let error = err.error.unwrap();
        assert!(matches!(NodeError::from_rpc_message(&error.message), NodeError::StaleHead(_)));
    }

    #[tokio::test]
    async fn test_dial_unreachable_node_fails() {
        let transport = WsTransport::new(&NodeConfig {
            url: "ws://127.0.0.1:1".to_string(),
            connect_timeout_secs: 2,
            ..NodeConfig::default()
        });
        let err = transport.dial().await.err().unwrap();
        assert!(err.is_transport());
        assert_eq!(transport.endpoint(), "ws://127.0.0.1:1");
    }
}
