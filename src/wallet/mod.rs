//! Wallet subsystem.
//!
//! # Data Flow
//! ```text
//! keystore.json (encrypted mnemonic)
//!     → keystore.rs (Argon2id + ChaCha20-Poly1305)
//!     → state.rs (Uninitialized / Locked / Unlocked)
//!     → vault.rs (decrypted mnemonic, account root, recent signers; Unlocked only)
//!     → account.rs (index → Account handle bound to a session generation)
//! ```
//!
//! # Design Decisions
//! - One `WalletState` per process, passed around as `Arc<WalletState>`
//! - Key material never leaves `WalletState`; handles sign through it
//! - Lock zeroes the mnemonic and drops every derived key

pub mod account;
pub mod keystore;
pub mod state;
pub mod vault;

pub use account::{Account, AccountEntry, AccountIndex, AccountPage, AccountResolver};
pub use keystore::{KdfParams, KeystoreError, KeystoreFile};
pub use state::{WalletInfo, WalletState, WalletStatus};
pub use vault::KeyVault;
