//! Account-block templates and signed blocks.

use std::fmt;
use std::str::FromStr;

use alloy::primitives::{keccak256, Address, Bytes, B256, U256};
use alloy::signers::Signature;
use serde::{Deserialize, Serialize};

use crate::error::{WalletError, WalletResult};
use crate::node::ChainHead;
use crate::wallet::Account;

/// Decimal places of the native tokens.
pub const COIN_DECIMALS: u8 = 8;

/// Tokens the wallet knows how to scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Token {
    Znn,
    Qsr,
}

impl Token {
    pub const ZNN_STANDARD: &'static str = "zts1znnxxxxxxxxxxxxx9z4ulx";
    pub const QSR_STANDARD: &'static str = "zts1qsrxxxxxxxxxxxxxmrhjll";

    pub fn standard(self) -> &'static str {
        match self {
            Self::Znn => Self::ZNN_STANDARD,
            Self::Qsr => Self::QSR_STANDARD,
        }
    }

    pub fn decimals(self) -> u8 {
        COIN_DECIMALS
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Znn => "ZNN",
            Self::Qsr => "QSR",
        }
    }
}

impl FromStr for Token {
    type Err = String;

    /// Accepts the token standard or, case-insensitively, the symbol.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == Self::ZNN_STANDARD || s.eq_ignore_ascii_case("znn") {
            Ok(Self::Znn)
        } else if s == Self::QSR_STANDARD || s.eq_ignore_ascii_case("qsr") {
            Ok(Self::Qsr)
        } else {
            Err(format!("unknown token standard '{}'", s))
        }
    }
}

impl TryFrom<String> for Token {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Token> for String {
    fn from(token: Token) -> Self {
        token.standard().to_string()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.standard())
    }
}

/// Block types produced by this wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Send,
    Fuse,
}

impl BlockKind {
    fn tag(self) -> u8 {
        match self {
            Self::Send => 2,
            Self::Fuse => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Send => "send",
            Self::Fuse => "fuse",
        }
    }
}

/// Unsigned block built against a known chain head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountBlockTemplate {
    kind: BlockKind,
    producer: Address,
    height: u64,
    previous_hash: B256,
    to_address: Address,
    token: Token,
    amount: U256,
}

impl AccountBlockTemplate {
    /// Build the next block on top of `head`.
    pub fn new(
        kind: BlockKind,
        producer: Address,
        head: ChainHead,
        to_address: Address,
        token: Token,
        amount: U256,
    ) -> Self {
        Self {
            kind,
            producer,
            height: head.height + 1,
            previous_hash: head.hash,
            to_address,
            token,
            amount,
        }
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn previous_hash(&self) -> B256 {
        self.previous_hash
    }

    /// Digest over the canonical encoding of every field.
    pub fn hash(&self) -> B256 {
        let standard = self.token.standard().as_bytes();
        let mut buf = Vec::with_capacity(1 + 20 + 8 + 32 + 20 + standard.len() + 32);
        buf.push(self.kind.tag());
        buf.extend_from_slice(self.producer.as_slice());
        buf.extend_from_slice(&self.height.to_be_bytes());
        buf.extend_from_slice(self.previous_hash.as_slice());
        buf.extend_from_slice(self.to_address.as_slice());
        buf.extend_from_slice(standard);
        buf.extend_from_slice(&self.amount.to_be_bytes::<32>());
        keccak256(&buf)
    }

    /// Sign with `account`. The template is consumed; a signed block is
    /// immutable.
    pub async fn sign(self, account: &Account) -> WalletResult<AccountBlock> {
        if account.address() != self.producer {
            return Err(WalletError::Internal(format!(
                "account {} cannot sign for producer {}",
                account.address(),
                self.producer
            )));
        }
        let hash = self.hash();
        let signature = account.sign_hash(hash).await?;

        Ok(AccountBlock {
            kind: self.kind,
            producer: self.producer,
            height: self.height,
            previous_hash: self.previous_hash,
            to_address: self.to_address,
            token_standard: self.token,
            amount: self.amount,
            hash,
            signature: Bytes::from(signature.as_bytes().to_vec()),
            confirmed_hash: None,
        })
    }
}

/// Signed account block in its wire shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountBlock {
    #[serde(rename = "blockType")]
    kind: BlockKind,
    #[serde(rename = "address")]
    producer: Address,
    height: u64,
    previous_hash: B256,
    to_address: Address,
    token_standard: Token,
    #[serde(with = "decimal_u256")]
    amount: U256,
    hash: B256,
    signature: Bytes,
    /// Assigned by the node once the block is confirmed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    confirmed_hash: Option<B256>,
}

impl AccountBlock {
    pub fn kind(&self) -> BlockKind {
        self.kind
    }

    pub fn producer(&self) -> Address {
        self.producer
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn previous_hash(&self) -> B256 {
        self.previous_hash
    }

    pub fn to_address(&self) -> Address {
        self.to_address
    }

    pub fn token(&self) -> Token {
        self.token_standard
    }

    pub fn amount(&self) -> U256 {
        self.amount
    }

    pub fn hash(&self) -> B256 {
        self.hash
    }

    pub fn confirmed_hash(&self) -> Option<B256> {
        self.confirmed_hash
    }

    /// The head this block establishes for its producer.
    pub fn as_head(&self) -> ChainHead {
        ChainHead {
            height: self.height,
            hash: self.hash,
        }
    }

    /// Copy with a node-assigned confirmation.
    pub fn with_confirmation(mut self, confirmed_hash: B256) -> Self {
        self.confirmed_hash = Some(confirmed_hash);
        self
    }

    /// Check that the hash matches the content and the signature was made
    /// by the producer.
    pub fn verify(&self) -> bool {
        let template = AccountBlockTemplate {
            kind: self.kind,
            producer: self.producer,
            height: self.height,
            previous_hash: self.previous_hash,
            to_address: self.to_address,
            token: self.token_standard,
            amount: self.amount,
        };
        if template.hash() != self.hash {
            return false;
        }
        Signature::try_from(self.signature.as_ref())
            .ok()
            .and_then(|sig| sig.recover_address_from_prehash(&self.hash).ok())
            .is_some_and(|signer| signer == self.producer)
    }
}

/// U256 as a base-10 string on the wire.
mod decimal_u256 {
    use alloy::primitives::U256;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let s = String::deserialize(deserializer)?;
        U256::from_str_radix(&s, 10).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn head() -> ChainHead {
        ChainHead {
            height: 7,
            hash: B256::repeat_byte(0xab),
        }
    }

    #[test]
    fn test_token_parsing() {
        assert_eq!(Token::ZNN_STANDARD.parse::<Token>().unwrap(), Token::Znn);
        assert_eq!("qsr".parse::<Token>().unwrap(), Token::Qsr);
        assert!("zts1unknown".parse::<Token>().is_err());

        let json = serde_json::to_string(&Token::Qsr).unwrap();
        assert_eq!(json, format!("\"{}\"", Token::QSR_STANDARD));
    }

    #[test]
    fn test_template_links_to_head() {
        let template = AccountBlockTemplate::new(
            BlockKind::Fuse,
            Address::repeat_byte(1),
            head(),
            Address::repeat_byte(2),
            Token::Qsr,
            U256::from(1_000u64),
        );
        assert_eq!(template.height(), 8);
        assert_eq!(template.previous_hash(), head().hash);
    }

    #[test]
    fn test_hash_covers_every_field() {
        let base = AccountBlockTemplate::new(
            BlockKind::Send,
            Address::repeat_byte(1),
            head(),
            Address::repeat_byte(2),
            Token::Znn,
            U256::from(5u64),
        );
        let mut other = base.clone();
        other.amount = U256::from(6u64);
        assert_ne!(base.hash(), other.hash());

        let mut other = base.clone();
        other.token = Token::Qsr;
        assert_ne!(base.hash(), other.hash());

        let mut other = base.clone();
        other.kind = BlockKind::Fuse;
        assert_ne!(base.hash(), other.hash());

        assert_eq!(base.hash(), base.clone().hash());
    }

    #[test]
    fn test_block_wire_shape() {
        let block = AccountBlock {
            kind: BlockKind::Fuse,
            producer: Address::repeat_byte(1),
            height: 1,
            previous_hash: B256::ZERO,
            to_address: Address::repeat_byte(2),
            token_standard: Token::Qsr,
            amount: U256::from(1_050_000_000u64),
            hash: B256::ZERO,
            signature: Bytes::new(),
            confirmed_hash: None,
        };
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["blockType"], "fuse");
        assert_eq!(json["amount"], "1050000000");
        assert_eq!(json["tokenStandard"], Token::QSR_STANDARD);
        assert!(json.get("confirmedHash").is_none());

        let back: AccountBlock = serde_json::from_value(json).unwrap();
        assert_eq!(back, block);
    }
}
