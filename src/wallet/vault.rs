//! In-memory key material for an unlocked wallet.
//!
//! # Security
//! - The mnemonic lives in a zeroizing buffer and is wiped on lock or drop
//! - The seed is stretched once per session; accounts are children of the
//!   cached `m/44'/73404'` node
//! - Only signers that actually signed are cached, and only a few of them
//! - Nothing in here is ever logged or serialized

use std::sync::Arc;

use alloy::primitives::{Address, B256};
use alloy::signers::local::coins_bip39::{English, Mnemonic};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::{Signature, SignerSync};
use coins_bip32::ecdsa::SigningKey;
use coins_bip32::prelude::{Parent, XPriv};
use coins_bip32::BIP32_HARDEN;
use dashmap::DashMap;
use zeroize::{Zeroize, Zeroizing};

use crate::wallet::account::AccountIndex;
use crate::wallet::keystore::KeystoreError;

/// SLIP-44 coin type used in the derivation path.
pub const COIN_TYPE: u32 = 73404;

/// Word count of freshly generated mnemonics.
pub const GENERATED_WORD_COUNT: usize = 24;

/// Signers kept around for repeated signing from the same accounts.
pub const MAX_CACHED_SIGNERS: usize = 32;

const VALID_WORD_COUNTS: [usize; 5] = [12, 15, 18, 21, 24];

/// Derivation path of an account: `m/44'/73404'/{index}'`.
pub fn derivation_path(index: AccountIndex) -> String {
    format!("m/44'/{}'/{}'", COIN_TYPE, index.value())
}

/// Extended key at `m/44'/73404'`. Every account is one hardened child
/// derivation away, with no seed stretching involved.
pub struct AccountRoot(XPriv);

impl AccountRoot {
    fn from_phrase(phrase: &str) -> Result<Self, KeystoreError> {
        let mnemonic = Mnemonic::<English>::new_from_phrase(phrase)
            .map_err(|e| KeystoreError::InvalidMnemonic(e.to_string()))?;
        let master = mnemonic
            .master_key(None)
            .map_err(|e| KeystoreError::Derivation(e.to_string()))?;
        let node = master
            .derive_child(44 | BIP32_HARDEN)
            .and_then(|purpose| purpose.derive_child(COIN_TYPE | BIP32_HARDEN))
            .map_err(|e| KeystoreError::Derivation(e.to_string()))?;
        Ok(Self(node))
    }

    /// Private key of account `index`.
    pub fn signer(&self, index: AccountIndex) -> Result<PrivateKeySigner, KeystoreError> {
        let child = self
            .0
            .derive_child(index.value() | BIP32_HARDEN)
            .map_err(|e| KeystoreError::Derivation(e.to_string()))?;
        let key: &SigningKey = child.as_ref();
        let bytes: Zeroizing<[u8; 32]> = Zeroizing::new(key.to_bytes().into());
        PrivateKeySigner::from_slice(bytes.as_slice()).map_err(|e| KeystoreError::Derivation(e.to_string()))
    }

    /// Address of account `index`.
    pub fn address(&self, index: AccountIndex) -> Result<Address, KeystoreError> {
        Ok(self.signer(index)?.address())
    }
}

/// Seed material of an unlocked wallet.
pub struct KeyVault {
    phrase: Zeroizing<String>,
    root: Option<Arc<AccountRoot>>,
    signers: DashMap<u32, PrivateKeySigner>,
}

impl KeyVault {
    /// Build a vault from a mnemonic phrase.
    ///
    /// Whitespace is normalized and the account root is derived eagerly,
    /// so an unusable phrase is rejected here rather than on first use.
    /// Runs the BIP-39 seed stretch; call it off the async runtime.
    pub fn from_mnemonic(phrase: &str) -> Result<Self, KeystoreError> {
        let words = phrase.split_whitespace().count();
        if !VALID_WORD_COUNTS.contains(&words) {
            return Err(KeystoreError::InvalidMnemonic(format!(
                "expected 12, 15, 18, 21 or 24 words, got {}",
                words
            )));
        }
        let normalized = Zeroizing::new(phrase.split_whitespace().collect::<Vec<_>>().join(" "));
        let root = AccountRoot::from_phrase(&normalized)?;

        Ok(Self {
            phrase: normalized,
            root: Some(Arc::new(root)),
            signers: DashMap::new(),
        })
    }

    /// Create a vault around a freshly generated random mnemonic.
    pub fn generate() -> Result<Self, KeystoreError> {
        let mut rng = rand::thread_rng();
        let mnemonic = Mnemonic::<English>::new_with_count(&mut rng, GENERATED_WORD_COUNT)
            .map_err(|e| KeystoreError::Derivation(e.to_string()))?;
        let phrase = Zeroizing::new(mnemonic.to_phrase());
        Self::from_mnemonic(&phrase)
    }

    /// The normalized mnemonic, for sealing into the keystore.
    pub(crate) fn phrase(&self) -> &str {
        &self.phrase
    }

    /// Shared handle on the account root, for deriving many addresses
    /// without holding the wallet lock.
    pub fn account_root(&self) -> Result<Arc<AccountRoot>, KeystoreError> {
        self.root
            .clone()
            .ok_or_else(|| KeystoreError::Derivation("key material has been wiped".to_string()))
    }

    /// Deterministically derive the address of `index`. Nothing is cached.
    pub fn derive_account(&self, index: AccountIndex) -> Result<Address, KeystoreError> {
        if let Some(signer) = self.signers.get(&index.value()) {
            return Ok(signer.address());
        }
        self.account_root()?.address(index)
    }

    /// Sign a 32-byte digest with the key of `index`.
    pub fn sign_hash(&self, index: AccountIndex, hash: &B256) -> Result<Signature, KeystoreError> {
        if let Some(signer) = self.signers.get(&index.value()) {
            return sign(signer.value(), hash);
        }

        let signer = self.account_root()?.signer(index)?;
        let signature = sign(&signer, hash)?;
        if self.signers.len() >= MAX_CACHED_SIGNERS {
            self.signers.clear();
        }
        self.signers.insert(index.value(), signer);
        Ok(signature)
    }

    /// Number of signers currently cached.
    pub fn cached_signers(&self) -> usize {
        self.signers.len()
    }

    /// Drop every derived key and zero the mnemonic buffer.
    pub fn wipe(&mut self) {
        self.signers.clear();
        self.root = None;
        self.phrase.zeroize();
    }
}

fn sign(signer: &PrivateKeySigner, hash: &B256) -> Result<Signature, KeystoreError> {
    signer
        .sign_hash_sync(hash)
        .map_err(|e| KeystoreError::Derivation(format!("signing failed: {}", e)))
}

impl Drop for KeyVault {
    fn drop(&mut self) {
        self.wipe();
    }
}

impl std::fmt::Debug for KeyVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyVault")
            .field("cached_signers", &self.signers.len())
            .finish_non_exhaustive()
    }
}
