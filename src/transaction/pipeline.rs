//! Build, sign and submit account blocks.
//!
//! # Flow
//! ```text
//! operation → validate + scale amount
//!           → ensure node connection
//!           → resolve account (wallet must be unlocked)
//!           → [per-producer lock]
//!               query head → template → sign → submit
//!               on stale head / dropped session: retry once
//!           → accepted block
//! ```

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::error::{WalletError, WalletResult};
use crate::node::{BlockPage, NodeConnection, NodeError};
use crate::observability::metrics;
use crate::resilience::Backoff;
use crate::transaction::amount::DecimalAmount;
use crate::transaction::block::{AccountBlock, AccountBlockTemplate, BlockKind, Token, COIN_DECIMALS};
use crate::wallet::{Account, AccountIndex, AccountResolver};

/// Smallest plasma fusion, in QSR base units (10 QSR).
pub const FUSE_MIN_QSR_AMOUNT: u64 = 10 * 10u64.pow(COIN_DECIMALS as u32);

/// A transaction requested by a caller.
#[derive(Debug, Clone)]
pub enum Operation {
    /// Stake QSR to generate plasma for `beneficiary`.
    Fuse {
        beneficiary: Address,
        amount: DecimalAmount,
    },
    /// Transfer `amount` of `token` to `to`.
    Send {
        to: Address,
        token: Token,
        amount: DecimalAmount,
    },
}

impl Operation {
    pub fn kind(&self) -> BlockKind {
        match self {
            Self::Fuse { .. } => BlockKind::Fuse,
            Self::Send { .. } => BlockKind::Send,
        }
    }

    /// Validate and scale, without touching the wallet or the node.
    fn prepare(&self) -> WalletResult<Prepared> {
        match self {
            Self::Fuse { beneficiary, amount } => {
                let scaled = amount.scale(Token::Qsr.decimals())?;
                if scaled < U256::from(FUSE_MIN_QSR_AMOUNT) {
                    return Err(WalletError::invalid(format!(
                        "fuse amount must be at least 10 QSR, got {}",
                        amount
                    )));
                }
                Ok(Prepared {
                    kind: BlockKind::Fuse,
                    to: *beneficiary,
                    token: Token::Qsr,
                    amount: scaled,
                })
            }
            Self::Send { to, token, amount } => Ok(Prepared {
                kind: BlockKind::Send,
                to: *to,
                token: *token,
                amount: amount.scale(token.decimals())?,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Prepared {
    kind: BlockKind,
    to: Address,
    token: Token,
    amount: U256,
}

/// Turns operations into accepted blocks.
#[derive(Clone)]
pub struct TransactionPipeline {
    resolver: AccountResolver,
    node: Arc<NodeConnection>,
    chain_locks: Arc<DashMap<Address, Arc<Mutex<()>>>>,
    backoff: Backoff,
}

impl TransactionPipeline {
    pub fn new(resolver: AccountResolver, node: Arc<NodeConnection>, backoff: Backoff) -> Self {
        Self {
            resolver,
            node,
            chain_locks: Arc::new(DashMap::new()),
            backoff,
        }
    }

    /// Build, sign and submit `operation` from account `index`.
    ///
    /// Submissions from the same producer are serialized. Once started, a
    /// submission runs to completion even if the caller goes away.
    pub async fn build_and_submit(&self, index: AccountIndex, operation: Operation) -> WalletResult<AccountBlock> {
        let prepared = operation.prepare()?;

        self.node.ensure_connected().await?;
        let account = self.resolver.get_account(index).await?;

        let pipeline = self.clone();
        let result = tokio::spawn(async move { pipeline.submit_serialized(account, prepared).await })
            .await
            .map_err(|e| WalletError::Internal(format!("submission task failed: {}", e)))?;

        metrics::record_submission(
            prepared.kind.as_str(),
            match &result {
                Ok(_) => "accepted",
                Err(WalletError::Conflict(_)) => "conflict",
                Err(_) => "failed",
            },
        );
        result
    }

    /// Blocks of account `index` as reported by the node.
    pub async fn received(&self, index: AccountIndex, page_index: u32, page_size: u32) -> WalletResult<BlockPage> {
        let account = self.resolver.get_account(index).await?;
        Ok(self
            .node
            .account_blocks(account.address(), page_index, page_size)
            .await?)
    }

    async fn submit_serialized(&self, account: Account, prepared: Prepared) -> WalletResult<AccountBlock> {
        let lock = self
            .chain_locks
            .entry(account.address())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _chain = lock.lock().await;

        match self.attempt(&account, prepared).await {
            Ok(block) => Ok(block),
            Err(e) if retryable(&e) => {
                if e.is_transport() {
                    tokio::time::sleep(self.backoff.delay(1)).await;
                }
                tracing::info!(
                    index = %account.index(),
                    producer = %account.address(),
                    error = %e,
                    "Submission failed, retrying once with a fresh chain head"
                );
                Ok(self.attempt(&account, prepared).await?)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn attempt(&self, account: &Account, prepared: Prepared) -> Result<AccountBlock, AttemptError> {
        let head = self.node.query_chain_head(account.address()).await?;
        let template = AccountBlockTemplate::new(
            prepared.kind,
            account.address(),
            head,
            prepared.to,
            prepared.token,
            prepared.amount,
        );
        let signed = template.sign(account).await?;
        let accepted = self.node.submit(&signed).await?;

        tracing::info!(
            kind = prepared.kind.as_str(),
            producer = %accepted.producer(),
            height = accepted.height(),
            hash = %accepted.hash(),
            "Block accepted"
        );
        Ok(accepted)
    }
}

impl std::fmt::Debug for TransactionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionPipeline")
            .field("node", &self.node)
            .field("active_producers", &self.chain_locks.len())
            .finish()
    }
}

/// Keeps node failures distinguishable until the retry decision is made.
#[derive(Debug)]
enum AttemptError {
    Node(NodeError),
    Wallet(WalletError),
}

impl AttemptError {
    fn is_transport(&self) -> bool {
        matches!(self, Self::Node(e) if e.is_transport())
    }
}

impl std::fmt::Display for AttemptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Node(e) => std::fmt::Display::fmt(e, f),
            Self::Wallet(e) => std::fmt::Display::fmt(e, f),
        }
    }
}

impl From<NodeError> for AttemptError {
    fn from(err: NodeError) -> Self {
        Self::Node(err)
    }
}

impl From<WalletError> for AttemptError {
    fn from(err: WalletError) -> Self {
        Self::Wallet(err)
    }
}

impl From<AttemptError> for WalletError {
    fn from(err: AttemptError) -> Self {
        match err {
            AttemptError::Node(e) => e.into(),
            AttemptError::Wallet(e) => e,
        }
    }
}

fn retryable(err: &AttemptError) -> bool {
    match err {
        AttemptError::Node(NodeError::StaleHead(_)) => true,
        AttemptError::Node(e) => e.is_transport(),
        AttemptError::Wallet(_) => false,
    }
}
