//! Account handles and index resolution.

use std::str::FromStr;
use std::sync::Arc;

use alloy::primitives::{Address, B256};
use alloy::signers::Signature;
use serde::Serialize;

use crate::error::{WalletError, WalletResult};
use crate::wallet::state::WalletState;

/// Index of an account below the wallet seed (hardened derivation range).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct AccountIndex(u32);

impl AccountIndex {
    /// Account 0, whose address identifies the wallet.
    pub const BASE: AccountIndex = AccountIndex(0);

    /// Highest index reachable with hardened derivation.
    pub const MAX: u32 = (1 << 31) - 1;

    /// Validate a raw index: negative is an invalid argument, beyond the
    /// hardened range there is no such account.
    pub fn new(raw: i64) -> WalletResult<Self> {
        if raw < 0 {
            return Err(WalletError::invalid(format!("account index must not be negative, got {}", raw)));
        }
        if raw > Self::MAX as i64 {
            return Err(WalletError::NotFound(format!("account index {} does not exist", raw)));
        }
        Ok(Self(raw as u32))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl FromStr for AccountIndex {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw: i64 = s
            .trim()
            .parse()
            .map_err(|_| WalletError::invalid(format!("account index '{}' is not an integer", s)))?;
        Self::new(raw)
    }
}

impl std::fmt::Display for AccountIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A usable account of the current unlocked session.
///
/// The handle carries no key material. Signing goes back through the wallet,
/// which refuses once the session that issued the handle has ended.
#[derive(Clone)]
pub struct Account {
    wallet: Arc<WalletState>,
    index: AccountIndex,
    address: Address,
    generation: u64,
}

impl Account {
    pub(crate) fn new(wallet: Arc<WalletState>, index: AccountIndex, address: Address, generation: u64) -> Self {
        Self {
            wallet,
            index,
            address,
            generation,
        }
    }

    pub fn index(&self) -> AccountIndex {
        self.index
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Session generation this handle was issued in.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Sign a digest. Fails with `WalletLocked` or `StaleSession` when the
    /// issuing session is gone.
    pub async fn sign_hash(&self, hash: B256) -> WalletResult<Signature> {
        self.wallet.sign_hash(self.index, self.generation, &hash).await
    }
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("index", &self.index)
            .field("address", &self.address)
            .field("generation", &self.generation)
            .finish()
    }
}

/// One page of derived account addresses.
#[derive(Debug, Clone, Serialize)]
pub struct AccountPage {
    pub count: u64,
    pub list: Vec<AccountEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountEntry {
    pub index: AccountIndex,
    pub address: Address,
}

/// Resolves account indices against the wallet.
#[derive(Clone)]
pub struct AccountResolver {
    wallet: Arc<WalletState>,
}

impl AccountResolver {
    pub fn new(wallet: Arc<WalletState>) -> Self {
        Self { wallet }
    }

    /// Derive the account at `index`; requires an unlocked wallet.
    pub async fn get_account(&self, index: AccountIndex) -> WalletResult<Account> {
        let session = self.wallet.require_unlocked().await?;
        let address = session.vault().derive_account(index)?;
        let generation = session.generation();
        drop(session);

        tracing::debug!(index = %index, address = %address, "Account resolved");
        Ok(Account::new(self.wallet.clone(), index, address, generation))
    }

    /// Derive a page of account addresses: indices
    /// `page_index * page_size .. page_index * page_size + page_size`,
    /// clipped to the hardened range.
    ///
    /// Derivation runs on the blocking pool without holding the wallet lock.
    pub async fn list_accounts(&self, page_index: u32, page_size: u32) -> WalletResult<AccountPage> {
        let root = self.wallet.require_unlocked().await?.vault().account_root()?;

        let start = page_index as u64 * page_size as u64;
        let end = (start + page_size as u64).min(AccountIndex::MAX as u64 + 1);

        let list = tokio::task::spawn_blocking(move || -> WalletResult<Vec<AccountEntry>> {
            let mut list = Vec::with_capacity(end.saturating_sub(start) as usize);
            for raw in start..end {
                let index = AccountIndex::new(raw as i64)?;
                list.push(AccountEntry {
                    index,
                    address: root.address(index)?,
                });
            }
            Ok(list)
        })
        .await
        .map_err(|e| WalletError::Internal(format!("account listing failed: {}", e)))??;

        Ok(AccountPage {
            count: list.len() as u64,
            list,
        })
    }
}
