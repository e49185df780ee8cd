//! Wallet lifecycle state machine.
//!
//! ```text
//! Uninitialized --init/restore--> Unlocked
//! Locked        --unlock/restore-> Unlocked
//! Unlocked      --lock----------> Locked
//! ```
//!
//! All transitions take the write half of one `RwLock`, so at most one
//! mutation is in flight. Readers (account derivation, signing) share the
//! read half while the state is stable.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use alloy::primitives::{Address, B256};
use alloy::signers::Signature;
use serde::Serialize;
use tokio::sync::{RwLock, RwLockReadGuard};
use zeroize::Zeroizing;

use crate::config::WalletConfig;
use crate::error::{WalletError, WalletResult};
use crate::observability::metrics;
use crate::wallet::account::AccountIndex;
use crate::wallet::keystore::{KdfParams, KeystoreError, KeystoreFile};
use crate::wallet::vault::KeyVault;

/// Observable wallet state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletStatus {
    Uninitialized,
    Locked,
    Unlocked,
}

impl WalletStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Locked => "locked",
            Self::Unlocked => "unlocked",
        }
    }
}

/// Status snapshot: state plus the base address when a keystore exists.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletInfo {
    pub status: WalletStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_address: Option<Address>,
}

/// Decrypted material of the current unlocked session.
#[derive(Debug)]
pub struct UnlockedSession {
    keystore: KeystoreFile,
    vault: KeyVault,
    generation: u64,
}

impl UnlockedSession {
    pub fn vault(&self) -> &KeyVault {
        &self.vault
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn base_address(&self) -> Address {
        self.keystore.base_address
    }
}

#[derive(Debug)]
enum Session {
    Uninitialized,
    Locked { keystore: KeystoreFile },
    Unlocked(UnlockedSession),
}

impl Session {
    fn status(&self) -> WalletStatus {
        match self {
            Self::Uninitialized => WalletStatus::Uninitialized,
            Self::Locked { .. } => WalletStatus::Locked,
            Self::Unlocked(_) => WalletStatus::Unlocked,
        }
    }
}

/// Process-wide wallet state, shared as `Arc<WalletState>`.
pub struct WalletState {
    keystore_path: PathBuf,
    kdf: KdfParams,
    session: RwLock<Session>,
    generation: AtomicU64,
}

impl WalletState {
    /// Open the wallet: Locked when a keystore exists, otherwise
    /// Uninitialized. A corrupt keystore is an error the caller should treat
    /// as fatal.
    pub fn open(config: &WalletConfig) -> Result<Self, KeystoreError> {
        let keystore_path = PathBuf::from(&config.keystore_path);
        let session = match KeystoreFile::load(&keystore_path)? {
            Some(keystore) => {
                tracing::info!(
                    path = %keystore_path.display(),
                    base_address = %keystore.base_address,
                    "Keystore found, wallet is locked"
                );
                Session::Locked { keystore }
            }
            None => {
                tracing::info!(path = %keystore_path.display(), "No keystore, wallet is uninitialized");
                Session::Uninitialized
            }
        };

        Ok(Self {
            keystore_path,
            kdf: KdfParams::from_config(config),
            session: RwLock::new(session),
            generation: AtomicU64::new(0),
        })
    }

    pub async fn status(&self) -> WalletStatus {
        self.session.read().await.status()
    }

    pub async fn info(&self) -> WalletInfo {
        let session = self.session.read().await;
        let base_address = match &*session {
            Session::Uninitialized => None,
            Session::Locked { keystore } => Some(keystore.base_address),
            Session::Unlocked(unlocked) => Some(unlocked.base_address()),
        };
        WalletInfo {
            status: session.status(),
            base_address,
        }
    }

    /// Create a new wallet from a random mnemonic. Returns the phrase, which
    /// is never stored in plaintext anywhere else.
    pub async fn init(&self, password: String) -> WalletResult<Zeroizing<String>> {
        let mut session = self.session.write().await;
        if !matches!(*session, Session::Uninitialized) {
            return Err(WalletError::conflict("wallet is already initialized"));
        }

        let path = self.keystore_path.clone();
        let kdf = self.kdf;
        let password = Zeroizing::new(password);
        let (vault, keystore) = run_blocking(move || {
            let vault = KeyVault::generate()?;
            let keystore = seal_vault(&vault, &password, kdf)?;
            keystore.save(&path)?;
            Ok((vault, keystore))
        })
        .await?;

        let phrase = Zeroizing::new(vault.phrase().to_owned());
        let from = session.status();
        *session = self.start_session(keystore, vault);
        metrics::record_state_transition(from.as_str(), "unlocked");
        tracing::info!(base_address = %self.base_of(&session), "Wallet initialized");
        Ok(phrase)
    }

    /// Replace the key material with one derived from `mnemonic` and unlock.
    ///
    /// Allowed from Uninitialized and Locked. An unlocked wallet must be
    /// locked first.
    pub async fn restore(&self, password: String, mnemonic: String) -> WalletResult<()> {
        let mut session = self.session.write().await;
        if matches!(*session, Session::Unlocked(_)) {
            return Err(WalletError::conflict("wallet is unlocked; lock it before restoring"));
        }

        let path = self.keystore_path.clone();
        let kdf = self.kdf;
        let password = Zeroizing::new(password);
        let mnemonic = Zeroizing::new(mnemonic);
        let (vault, keystore) = run_blocking(move || {
            let vault = KeyVault::from_mnemonic(&mnemonic)?;
            let keystore = seal_vault(&vault, &password, kdf)?;
            keystore.save(&path)?;
            Ok((vault, keystore))
        })
        .await?;

        let from = session.status();
        *session = self.start_session(keystore, vault);
        metrics::record_state_transition(from.as_str(), "unlocked");
        tracing::info!(base_address = %self.base_of(&session), "Wallet restored");
        Ok(())
    }

    /// Decrypt the keystore into memory.
    ///
    /// Unlocking an unlocked wallet with the right password is a no-op that
    /// keeps the current session; a wrong password is still rejected.
    pub async fn unlock(&self, password: String) -> WalletResult<()> {
        let mut session = self.session.write().await;
        let keystore = match &*session {
            Session::Uninitialized => {
                return Err(WalletError::conflict("wallet is not initialized"));
            }
            Session::Locked { keystore } => keystore.clone(),
            Session::Unlocked(unlocked) => {
                let keystore = unlocked.keystore.clone();
                let password = Zeroizing::new(password);
                run_blocking(move || keystore.open(&password).map(|_| ())).await?;
                tracing::debug!("Unlock requested on unlocked wallet, keeping session");
                return Ok(());
            }
        };

        let password = Zeroizing::new(password);
        let (vault, keystore) = run_blocking(move || {
            let phrase = keystore.open(&password)?;
            let vault = KeyVault::from_mnemonic(&phrase)?;
            Ok((vault, keystore))
        })
        .await
        .map_err(|e| {
            if matches!(e, WalletError::Unauthorized(_)) {
                metrics::record_state_transition("locked", "unlock_rejected");
                tracing::warn!("Unlock rejected: invalid password");
            }
            e
        })?;

        *session = self.start_session(keystore, vault);
        metrics::record_state_transition("locked", "unlocked");
        tracing::info!("Wallet unlocked");
        Ok(())
    }

    /// Wipe decrypted material and go back to Locked. Always succeeds.
    pub async fn lock(&self) {
        let mut session = self.session.write().await;
        let previous = std::mem::replace(&mut *session, Session::Uninitialized);
        *session = match previous {
            Session::Unlocked(mut unlocked) => {
                unlocked.vault.wipe();
                metrics::record_state_transition("unlocked", "locked");
                tracing::info!(generation = unlocked.generation, "Wallet locked");
                Session::Locked {
                    keystore: unlocked.keystore,
                }
            }
            other => other,
        };
    }

    /// Read access to the unlocked session, or `WalletLocked`.
    pub async fn require_unlocked(&self) -> WalletResult<RwLockReadGuard<'_, UnlockedSession>> {
        let session = self.session.read().await;
        RwLockReadGuard::try_map(session, |s| match s {
            Session::Unlocked(unlocked) => Some(unlocked),
            _ => None,
        })
        .map_err(|_| WalletError::WalletLocked)
    }

    /// Sign on behalf of an account handle issued in session `generation`.
    pub(crate) async fn sign_hash(
        &self,
        index: AccountIndex,
        generation: u64,
        hash: &B256,
    ) -> WalletResult<Signature> {
        let session = self.require_unlocked().await?;
        if session.generation != generation {
            return Err(WalletError::StaleSession);
        }
        Ok(session.vault.sign_hash(index, hash)?)
    }

    /// Generation of the current unlocked session, if any.
    pub async fn current_generation(&self) -> Option<u64> {
        match &*self.session.read().await {
            Session::Unlocked(unlocked) => Some(unlocked.generation),
            _ => None,
        }
    }

    fn start_session(&self, keystore: KeystoreFile, vault: KeyVault) -> Session {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        Session::Unlocked(UnlockedSession {
            keystore,
            vault,
            generation,
        })
    }

    fn base_of(&self, session: &Session) -> Address {
        match session {
            Session::Locked { keystore } => keystore.base_address,
            Session::Unlocked(unlocked) => unlocked.base_address(),
            Session::Uninitialized => Address::ZERO,
        }
    }
}

impl std::fmt::Debug for WalletState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletState")
            .field("keystore_path", &self.keystore_path)
            .field("generation", &self.generation.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

fn seal_vault(vault: &KeyVault, password: &str, kdf: KdfParams) -> Result<KeystoreFile, KeystoreError> {
    let base_address = vault.derive_account(AccountIndex::BASE)?;
    KeystoreFile::seal(vault.phrase(), password, base_address, kdf)
}

/// Run KDF and derivation work off the async workers.
async fn run_blocking<T, F>(f: F) -> WalletResult<T>
where
    F: FnOnce() -> Result<T, KeystoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| WalletError::Internal(format!("key task failed: {}", e)))?
        .map_err(WalletError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::wallet::account::AccountResolver;

    const MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon \
        abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon \
        abandon abandon abandon art";

    fn test_config(name: &str) -> WalletConfig {
        let dir = std::env::temp_dir().join(format!("wallet-api-state-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        WalletConfig {
            keystore_path: dir.join("keystore.json").to_string_lossy().into_owned(),
            kdf_memory_kib: 64,
            kdf_iterations: 1,
            kdf_parallelism: 1,
            ..WalletConfig::default()
        }
    }

    fn index(i: i64) -> AccountIndex {
        AccountIndex::new(i).unwrap()
    }

    #[tokio::test]
    async fn test_restore_lock_unlock_keeps_address() {
        let wallet = Arc::new(WalletState::open(&test_config("cycle")).unwrap());
        let resolver = AccountResolver::new(wallet.clone());
        assert_eq!(wallet.status().await, WalletStatus::Uninitialized);

        wallet.restore("pw".into(), MNEMONIC.into()).await.unwrap();
        assert_eq!(wallet.status().await, WalletStatus::Unlocked);
        let a0 = resolver.get_account(index(0)).await.unwrap().address();

        wallet.lock().await;
        assert!(matches!(
            resolver.get_account(index(0)).await,
            Err(WalletError::WalletLocked)
        ));

        wallet.unlock("pw".into()).await.unwrap();
        assert_eq!(resolver.get_account(index(0)).await.unwrap().address(), a0);
    }

    #[tokio::test]
    async fn test_lock_is_idempotent() {
        let wallet = WalletState::open(&test_config("idempotent")).unwrap();
        wallet.lock().await;
        assert_eq!(wallet.status().await, WalletStatus::Uninitialized);

        wallet.restore("pw".into(), MNEMONIC.into()).await.unwrap();
        wallet.lock().await;
        wallet.lock().await;
        assert_eq!(wallet.status().await, WalletStatus::Locked);
    }

    #[tokio::test]
    async fn test_handle_from_previous_session_is_stale() {
        let wallet = Arc::new(WalletState::open(&test_config("stale")).unwrap());
        let resolver = AccountResolver::new(wallet.clone());
        wallet.restore("pw".into(), MNEMONIC.into()).await.unwrap();

        let account = resolver.get_account(index(2)).await.unwrap();
        assert!(account.sign_hash(B256::ZERO).await.is_ok());

        wallet.lock().await;
        assert!(matches!(
            account.sign_hash(B256::ZERO).await,
            Err(WalletError::WalletLocked)
        ));

        wallet.unlock("pw".into()).await.unwrap();
        assert!(matches!(
            account.sign_hash(B256::ZERO).await,
            Err(WalletError::StaleSession)
        ));
    }

    #[tokio::test]
    async fn test_transition_guards() {
        let wallet = WalletState::open(&test_config("guards")).unwrap();
        assert!(matches!(wallet.unlock("pw".into()).await, Err(WalletError::Conflict(_))));

        wallet.restore("pw".into(), MNEMONIC.into()).await.unwrap();
        assert!(matches!(
            wallet.restore("pw".into(), MNEMONIC.into()).await,
            Err(WalletError::Conflict(_))
        ));
        assert!(matches!(wallet.init("pw".into()).await, Err(WalletError::Conflict(_))));

        let generation = wallet.current_generation().await;
        wallet.unlock("pw".into()).await.unwrap();
        assert_eq!(wallet.current_generation().await, generation);
        assert!(matches!(
            wallet.unlock("wrong".into()).await,
            Err(WalletError::Unauthorized(_))
        ));

        wallet.lock().await;
        assert!(matches!(
            wallet.unlock("wrong".into()).await,
            Err(WalletError::Unauthorized(_))
        ));
        assert_eq!(wallet.status().await, WalletStatus::Locked);
    }

    #[tokio::test]
    async fn test_init_persists_and_reopens_locked() {
        let config = test_config("init");
        let wallet = WalletState::open(&config).unwrap();
        let phrase = wallet.init("pw".into()).await.unwrap();
        assert_eq!(phrase.split_whitespace().count(), 24);
        let base = wallet.info().await.base_address;
        assert!(base.is_some());

        let reopened = WalletState::open(&config).unwrap();
        let info = reopened.info().await;
        assert_eq!(info.status, WalletStatus::Locked);
        assert_eq!(info.base_address, base);
        reopened.unlock("pw".into()).await.unwrap();
    }

    #[test]
    fn test_corrupt_keystore_fails_open() {
        let config = test_config("corrupt");
        let path = PathBuf::from(&config.keystore_path);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"garbage").unwrap();
        assert!(matches!(WalletState::open(&config), Err(KeystoreError::Corrupt(_))));
    }
}
