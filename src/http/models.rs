//! Request and response bodies.

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};

use crate::error::{WalletError, WalletResult};
use crate::http::validation::{Validate, ValidationContext, ValidationErrors};
use crate::node::ConnectionStatus;
use crate::transaction::block::{Token, COIN_DECIMALS};
use crate::transaction::DecimalAmount;
use crate::wallet::{WalletInfo, WalletStatus};

const MNEMONIC_WORD_COUNTS: [usize; 5] = [12, 15, 18, 21, 24];

#[derive(Debug, Deserialize)]
pub struct InitWalletRequest {
    pub password: String,
}

impl Validate for InitWalletRequest {
    fn validate(&self, _ctx: &ValidationContext) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_password(&self.password, &mut errors);
        errors.into_result()
    }
}

#[derive(Debug, Deserialize)]
pub struct UnlockWalletRequest {
    pub password: String,
}

impl Validate for UnlockWalletRequest {
    fn validate(&self, _ctx: &ValidationContext) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_password(&self.password, &mut errors);
        errors.into_result()
    }
}

#[derive(Debug, Deserialize)]
pub struct RestoreWalletRequest {
    pub password: String,
    pub mnemonic: String,
}

impl Validate for RestoreWalletRequest {
    fn validate(&self, _ctx: &ValidationContext) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_password(&self.password, &mut errors);

        let words = self.mnemonic.split_whitespace().count();
        if words == 0 {
            errors.add("mnemonic", "Mnemonic is required");
        } else if !MNEMONIC_WORD_COUNTS.contains(&words) {
            errors.add("mnemonic", format!("Mnemonic must have 12, 15, 18, 21 or 24 words, got {}", words));
        }
        errors.into_result()
    }
}

/// Body of `POST /{accountIndex}/fuse`.
#[derive(Debug, Deserialize)]
pub struct FusePlasmaRequest {
    /// Beneficiary of the plasma.
    pub address: String,
    pub amount: DecimalAmount,
}

impl Validate for FusePlasmaRequest {
    fn validate(&self, _ctx: &ValidationContext) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_address(&self.address, &mut errors);
        check_amount(&self.amount, &mut errors);
        errors.into_result()
    }
}

/// Body of `POST /{accountIndex}/send`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    pub address: String,
    pub amount: DecimalAmount,
    pub token_standard: String,
}

impl Validate for SendRequest {
    fn validate(&self, _ctx: &ValidationContext) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_address(&self.address, &mut errors);
        check_amount(&self.amount, &mut errors);
        if let Err(e) = self.token_standard.parse::<Token>() {
            errors.add("tokenStandard", e);
        }
        errors.into_result()
    }
}

/// Paging query: `?pageIndex=0&pageSize=1024`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    #[serde(default)]
    pub page_index: i64,
    pub page_size: Option<i64>,
}

impl PageRequest {
    /// Validated `(page_index, page_size)`; a missing size means the maximum.
    pub fn resolve(&self, ctx: &ValidationContext) -> (u32, u32) {
        let size = self.page_size.unwrap_or(ctx.max_page_size as i64);
        (self.page_index as u32, size as u32)
    }
}

impl Validate for PageRequest {
    fn validate(&self, ctx: &ValidationContext) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.page_index < 0 || self.page_index > u32::MAX as i64 {
            errors.add("pageIndex", format!("Page index must be between 0 and {}", u32::MAX));
        }
        if let Some(size) = self.page_size {
            if size < 1 || size > ctx.max_page_size as i64 {
                errors.add("pageSize", format!("Page size must be between 1 and {}", ctx.max_page_size));
            }
        }
        errors.into_result()
    }
}

/// Body of `GET /status`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: WalletStatus,
    pub initialized: bool,
    pub unlocked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_address: Option<Address>,
    pub node: ConnectionStatus,
    pub node_url: String,
}

impl StatusResponse {
    pub fn new(info: WalletInfo, node: ConnectionStatus, node_url: String) -> Self {
        Self {
            status: info.status,
            initialized: info.status != WalletStatus::Uninitialized,
            unlocked: info.status == WalletStatus::Unlocked,
            base_address: info.base_address,
            node,
            node_url,
        }
    }
}

/// Body of `POST /init`. Shown once; the caller must write it down.
#[derive(Debug, Serialize)]
pub struct InitWalletResponse {
    pub mnemonic: String,
}

pub fn parse_address(raw: &str) -> WalletResult<Address> {
    raw.trim()
        .parse()
        .map_err(|_| WalletError::invalid(format!("'{}' is not a valid address", raw)))
}

fn check_password(password: &str, errors: &mut ValidationErrors) {
    if password.is_empty() {
        errors.add("password", "Password is required");
    }
}

fn check_address(address: &str, errors: &mut ValidationErrors) {
    if address.trim().is_empty() {
        errors.add("address", "Address is required");
    } else if parse_address(address).is_err() {
        errors.add("address", "Address is not a valid 20-byte hex address");
    }
}

fn check_amount(amount: &DecimalAmount, errors: &mut ValidationErrors) {
    if let Err(e) = amount.scale(COIN_DECIMALS) {
        errors.add("amount", e.to_string());
    }
}
