//! Shared, lazily established node connection.
//!
//! # Responsibilities
//! - Dial on first use and reuse the session afterwards
//! - Collapse concurrent connect attempts into a single dial
//! - Track status (Disconnected / Connecting / Connected / Failed)
//! - Drop a session that failed at the transport level; reads re-dial once,
//!   submissions leave the retry decision to the pipeline

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use arc_swap::ArcSwapOption;
use tokio::sync::Mutex;
use tokio::time::timeout;

use crate::config::NodeConfig;
use crate::node::client::{NodeSession, NodeTransport};
use crate::node::types::{BlockPage, ChainHead, ConnectionStatus, NodeError, NodeResult};
use crate::observability::metrics;
use crate::transaction::block::AccountBlock;

struct SessionSlot(Arc<dyn NodeSession>);

/// The one node connection of the process.
pub struct NodeConnection {
    transport: Arc<dyn NodeTransport>,
    session: ArcSwapOption<SessionSlot>,
    status: AtomicU8,
    dial_lock: Mutex<()>,
    connect_timeout: Duration,
}

impl NodeConnection {
    pub fn new(transport: Arc<dyn NodeTransport>, config: &NodeConfig) -> Self {
        Self {
            transport,
            session: ArcSwapOption::empty(),
            status: AtomicU8::new(ConnectionStatus::Disconnected as u8),
            dial_lock: Mutex::new(()),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
        }
    }

    /// Connection status. A session whose reader has stopped counts as
    /// disconnected even before anyone tries to use it.
    pub fn status(&self) -> ConnectionStatus {
        match ConnectionStatus::from_u8(self.status.load(Ordering::SeqCst)) {
            ConnectionStatus::Connected if self.live_session().is_none() => ConnectionStatus::Disconnected,
            status => status,
        }
    }

    pub fn endpoint(&self) -> String {
        self.transport.endpoint()
    }

    /// Return the live session, dialing if there is none.
    ///
    /// Callers arriving while a dial is in flight wait for it and share its
    /// result instead of dialing again.
    pub async fn ensure_connected(&self) -> NodeResult<Arc<dyn NodeSession>> {
        if let Some(session) = self.live_session() {
            return Ok(session);
        }

        let _guard = self.dial_lock.lock().await;
        if let Some(session) = self.live_session() {
            return Ok(session);
        }

        self.set_status(ConnectionStatus::Connecting);
        let dialed = match timeout(self.connect_timeout, self.transport.dial()).await {
            Ok(result) => result,
            Err(_) => Err(NodeError::Timeout(self.connect_timeout.as_secs())),
        };

        match dialed {
            Ok(session) => {
                self.session.store(Some(Arc::new(SessionSlot(session.clone()))));
                self.set_status(ConnectionStatus::Connected);
                metrics::record_node_dial("connected");
                tracing::info!(endpoint = %self.transport.endpoint(), "Node connection established");
                Ok(session)
            }
            Err(e) => {
                self.session.store(None);
                self.set_status(ConnectionStatus::Failed);
                metrics::record_node_dial("failed");
                tracing::warn!(endpoint = %self.transport.endpoint(), error = %e, "Node connection failed");
                Err(e)
            }
        }
    }

    /// Current head of `address`'s chain. Single attempt; the pipeline owns
    /// the retry for submissions.
    pub async fn query_chain_head(&self, address: Address) -> NodeResult<ChainHead> {
        self.once(|session| async move { session.frontier(address).await })
            .await
    }

    /// One page of `address`'s blocks, re-dialing once on a dead session.
    pub async fn account_blocks(&self, address: Address, page_index: u32, page_size: u32) -> NodeResult<BlockPage> {
        let query = |session: Arc<dyn NodeSession>| async move {
            session.account_blocks(address, page_index, page_size).await
        };
        match self.once(query).await {
            Err(e) if e.is_transport() => {
                tracing::debug!(error = %e, "Node query failed, reconnecting once");
                self.once(query).await
            }
            other => other,
        }
    }

    /// Broadcast a signed block. Not retried here; the caller decides.
    pub async fn submit(&self, block: &AccountBlock) -> NodeResult<AccountBlock> {
        self.once(|session| async move { session.publish(block).await })
            .await
    }

    /// Forget `session` if it is still the current one.
    pub fn invalidate(&self, session: &Arc<dyn NodeSession>) {
        let current = self.session.load();
        if let Some(slot) = &*current {
            if Arc::ptr_eq(&slot.0, session) {
                self.session.store(None);
                self.set_status(ConnectionStatus::Failed);
                tracing::warn!(endpoint = %self.transport.endpoint(), "Node session dropped");
            }
        }
    }

    /// Run `op` on the current session, dropping the session if it fails
    /// at the transport level.
    async fn once<T, F, Fut>(&self, op: F) -> NodeResult<T>
    where
        F: FnOnce(Arc<dyn NodeSession>) -> Fut,
        Fut: std::future::Future<Output = NodeResult<T>>,
    {
        let session = self.ensure_connected().await?;
        let result = op(session.clone()).await;
        if let Err(e) = &result {
            if e.is_transport() {
                self.invalidate(&session);
            }
        }
        result
    }

    fn live_session(&self) -> Option<Arc<dyn NodeSession>> {
        let slot = self.session.load_full()?;
        if slot.0.is_open() {
            Some(slot.0.clone())
        } else {
            None
        }
    }

    fn set_status(&self, status: ConnectionStatus) {
        self.status.store(status as u8, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for NodeConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeConnection")
            .field("endpoint", &self.transport.endpoint())
            .field("status", &self.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize};

    use alloy::primitives::B256;
    use async_trait::async_trait;

    struct FakeSession {
        open: AtomicBool,
        broken: bool,
        frontier_calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl NodeSession for FakeSession {
        async fn frontier(&self, _address: Address) -> NodeResult<ChainHead> {
            self.frontier_calls.fetch_add(1, Ordering::SeqCst);
            if self.open.load(Ordering::SeqCst) && !self.broken {
                Ok(ChainHead {
                    height: 3,
                    hash: B256::repeat_byte(3),
                })
            } else {
                Err(NodeError::ConnectionClosed)
            }
        }

        async fn publish(&self, block: &AccountBlock) -> NodeResult<AccountBlock> {
            Ok(block.clone())
        }

        async fn account_blocks(&self, _address: Address, _page_index: u32, _page_size: u32) -> NodeResult<BlockPage> {
            if self.broken {
                return Err(NodeError::ConnectionClosed);
            }
            Ok(BlockPage::default())
        }

        fn is_open(&self) -> bool {
            self.open.load(Ordering::SeqCst)
        }
    }

    #[derive(Default)]
    struct CountingTransport {
        dials: AtomicUsize,
        offline: AtomicBool,
        // Sessions dialed while set look open but fail every call.
        broken: AtomicBool,
        frontier_calls: Arc<AtomicUsize>,
        last: std::sync::Mutex<Option<Arc<FakeSession>>>,
    }

    #[async_trait]
    impl NodeTransport for CountingTransport {
        async fn dial(&self) -> NodeResult<Arc<dyn NodeSession>> {
            self.dials.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            if self.offline.load(Ordering::SeqCst) {
                return Err(NodeError::Transport("connection refused".into()));
            }
            let session = Arc::new(FakeSession {
                open: AtomicBool::new(true),
                broken: self.broken.load(Ordering::SeqCst),
                frontier_calls: self.frontier_calls.clone(),
            });
            *self.last.lock().unwrap() = Some(session.clone());
            Ok(session)
        }

        fn endpoint(&self) -> String {
            "fake".to_string()
        }
    }

    fn connection(transport: Arc<CountingTransport>) -> NodeConnection {
        NodeConnection::new(transport, &NodeConfig::default())
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_dial() {
        let transport = Arc::new(CountingTransport::default());
        let conn = Arc::new(connection(transport.clone()));
        assert_eq!(conn.status(), ConnectionStatus::Disconnected);

        let a = tokio::spawn({
            let conn = conn.clone();
            async move { conn.ensure_connected().await.map(|_| ()) }
        });
        let b = tokio::spawn({
            let conn = conn.clone();
            async move { conn.ensure_connected().await.map(|_| ()) }
        });
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        assert_eq!(transport.dials.load(Ordering::SeqCst), 1);
        assert_eq!(conn.status(), ConnectionStatus::Connected);
    }

    #[tokio::test]
    async fn test_failed_dial_reports_failed() {
        let transport = Arc::new(CountingTransport::default());
        transport.offline.store(true, Ordering::SeqCst);
        let conn = connection(transport.clone());

        let err = conn.query_chain_head(Address::ZERO).await.unwrap_err();
        assert!(err.is_transport());
        assert_eq!(conn.status(), ConnectionStatus::Failed);

        transport.offline.store(false, Ordering::SeqCst);
        assert_eq!(conn.query_chain_head(Address::ZERO).await.unwrap().height, 3);
        assert_eq!(conn.status(), ConnectionStatus::Connected);
    }

    #[tokio::test]
    async fn test_dead_session_is_redialed_once() {
        let transport = Arc::new(CountingTransport::default());
        let conn = connection(transport.clone());
        conn.ensure_connected().await.unwrap();

        let first = transport.last.lock().unwrap().clone().unwrap();
        first.open.store(false, Ordering::SeqCst);

        assert_eq!(conn.query_chain_head(Address::ZERO).await.unwrap().height, 3);
        assert_eq!(transport.dials.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_chain_head_query_is_single_attempt() {
        let transport = Arc::new(CountingTransport::default());
        transport.broken.store(true, Ordering::SeqCst);
        let conn = connection(transport.clone());

        let err = conn.query_chain_head(Address::ZERO).await.unwrap_err();
        assert!(err.is_transport());
        assert_eq!(transport.dials.load(Ordering::SeqCst), 1);
        assert_eq!(transport.frontier_calls.load(Ordering::SeqCst), 1);
        assert_eq!(conn.status(), ConnectionStatus::Failed);
    }

    #[tokio::test]
    async fn test_block_page_query_redials_once() {
        let transport = Arc::new(CountingTransport::default());
        transport.broken.store(true, Ordering::SeqCst);
        let conn = connection(transport.clone());

        assert!(conn.account_blocks(Address::ZERO, 0, 10).await.is_err());
        assert_eq!(transport.dials.load(Ordering::SeqCst), 2);

        transport.broken.store(false, Ordering::SeqCst);
        conn.account_blocks(Address::ZERO, 0, 10).await.unwrap();
        assert_eq!(transport.dials.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_status_follows_closed_session() {
        let transport = Arc::new(CountingTransport::default());
        let conn = connection(transport.clone());
        conn.ensure_connected().await.unwrap();
        assert_eq!(conn.status(), ConnectionStatus::Connected);

        // The reader saw the socket close; nobody has queried since.
        let session = transport.last.lock().unwrap().clone().unwrap();
        session.open.store(false, Ordering::SeqCst);
        assert_eq!(conn.status(), ConnectionStatus::Disconnected);

        conn.ensure_connected().await.unwrap();
        assert_eq!(conn.status(), ConnectionStatus::Connected);
    }
}
