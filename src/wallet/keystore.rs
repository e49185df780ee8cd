//! Encrypted keystore file.
//!
//! The mnemonic is sealed with ChaCha20-Poly1305 under a key stretched from the
//! password with Argon2id. The base address (account 0) is bound as associated
//! data so it cannot be swapped without breaking authentication.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use alloy::hex;
use alloy::primitives::Address;
use argon2::{Algorithm, Argon2, Params, Version};
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::config::WalletConfig;

/// Current on-disk format version.
pub const KEYSTORE_VERSION: u32 = 1;

const SALT_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

/// Errors raised by the keystore and key derivation.
#[derive(Debug, Error)]
pub enum KeystoreError {
    #[error("Invalid password")]
    InvalidPassword,

    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    #[error("Keystore file is corrupt: {0}")]
    Corrupt(String),

    #[error("Key derivation failed: {0}")]
    Derivation(String),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Argon2id cost parameters, stored alongside the ciphertext.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub m_cost: u32,
    /// Iterations.
    pub t_cost: u32,
    /// Lanes.
    pub p_cost: u32,
}

impl KdfParams {
    pub fn from_config(config: &WalletConfig) -> Self {
        Self {
            m_cost: config.kdf_memory_kib,
            t_cost: config.kdf_iterations,
            p_cost: config.kdf_parallelism,
        }
    }

    fn derive_key(&self, password: &str, salt: &[u8]) -> Result<Zeroizing<[u8; KEY_LEN]>, KeystoreError> {
        let params = Params::new(self.m_cost, self.t_cost, self.p_cost, Some(KEY_LEN))
            .map_err(|e| KeystoreError::Encryption(format!("invalid KDF parameters: {}", e)))?;
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
            .hash_password_into(password.as_bytes(), salt, &mut key[..])
            .map_err(|e| KeystoreError::Encryption(e.to_string()))?;
        Ok(key)
    }
}

/// Keystore file format (stored on disk).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeystoreFile {
    /// Version for migration.
    pub version: u32,
    /// Address of account 0, readable while locked.
    pub base_address: Address,
    /// Argon2id parameters used for this file.
    pub kdf: KdfParams,
    /// Hex-encoded Argon2id salt.
    pub salt: String,
    /// Hex-encoded AEAD nonce.
    pub nonce: String,
    /// Hex-encoded sealed mnemonic.
    pub ciphertext: String,
}

impl KeystoreFile {
    /// Encrypt a mnemonic under a password.
    pub fn seal(
        mnemonic: &str,
        password: &str,
        base_address: Address,
        kdf: KdfParams,
    ) -> Result<Self, KeystoreError> {
        let mut salt = [0u8; SALT_LEN];
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut salt);
        OsRng.fill_bytes(&mut nonce);

        let key = kdf.derive_key(password, &salt)?;
        let cipher = ChaCha20Poly1305::new_from_slice(&key[..])
            .map_err(|e| KeystoreError::Encryption(e.to_string()))?;
        let ciphertext = cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: mnemonic.as_bytes(),
                    aad: base_address.as_slice(),
                },
            )
            .map_err(|_| KeystoreError::Encryption("sealing failed".to_string()))?;

        Ok(Self {
            version: KEYSTORE_VERSION,
            base_address,
            kdf,
            salt: hex::encode(salt),
            nonce: hex::encode(nonce),
            ciphertext: hex::encode(ciphertext),
        })
    }

    /// Decrypt the mnemonic. A wrong password fails AEAD authentication.
    pub fn open(&self, password: &str) -> Result<Zeroizing<String>, KeystoreError> {
        let (salt, nonce, ciphertext) = self.decode()?;

        let key = self.kdf.derive_key(password, &salt)?;
        let cipher = ChaCha20Poly1305::new_from_slice(&key[..])
            .map_err(|e| KeystoreError::Encryption(e.to_string()))?;
        let plaintext = Zeroizing::new(
            cipher
                .decrypt(
                    Nonce::from_slice(&nonce),
                    Payload {
                        msg: &ciphertext,
                        aad: self.base_address.as_slice(),
                    },
                )
                .map_err(|_| KeystoreError::InvalidPassword)?,
        );

        let phrase = std::str::from_utf8(&plaintext)
            .map_err(|_| KeystoreError::Corrupt("mnemonic is not valid UTF-8".to_string()))?;
        Ok(Zeroizing::new(phrase.to_owned()))
    }

    /// Read a keystore file. `Ok(None)` when no file exists yet.
    pub fn load(path: &Path) -> Result<Option<Self>, KeystoreError> {
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read(path)?;
        let file: KeystoreFile =
            serde_json::from_slice(&data).map_err(|e| KeystoreError::Corrupt(e.to_string()))?;
        file.decode()?;
        Ok(Some(file))
    }

    /// Persist atomically: temp file, fsync, rename over the old store.
    pub fn save(&self, path: &Path) -> Result<(), KeystoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(self)
            .map_err(|e| KeystoreError::Encryption(e.to_string()))?;

        let tmp_path = path.with_extension("tmp");
        {
            let mut options = OpenOptions::new();
            options.write(true).create(true).truncate(true);
            #[cfg(unix)]
            {
                use std::os::unix::fs::OpenOptionsExt;
                options.mode(0o600);
            }
            let mut file = options.open(&tmp_path)?;
            file.write_all(&data)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    fn decode(&self) -> Result<(Vec<u8>, Vec<u8>, Vec<u8>), KeystoreError> {
        if self.version != KEYSTORE_VERSION {
            return Err(KeystoreError::Corrupt(format!("unsupported version {}", self.version)));
        }
        let salt = hex::decode(&self.salt).map_err(|e| KeystoreError::Corrupt(format!("salt: {}", e)))?;
        let nonce = hex::decode(&self.nonce).map_err(|e| KeystoreError::Corrupt(format!("nonce: {}", e)))?;
        let ciphertext = hex::decode(&self.ciphertext)
            .map_err(|e| KeystoreError::Corrupt(format!("ciphertext: {}", e)))?;

        if salt.len() != SALT_LEN {
            return Err(KeystoreError::Corrupt("salt has wrong length".to_string()));
        }
        if nonce.len() != NONCE_LEN {
            return Err(KeystoreError::Corrupt("nonce has wrong length".to_string()));
        }
        if ciphertext.is_empty() {
            return Err(KeystoreError::Corrupt("ciphertext is empty".to_string()));
        }
        Ok((salt, nonce, ciphertext))
    }
}
