//! Transaction construction and submission.
//!
//! - `amount`: exact decimal → base-unit scaling
//! - `block`: tokens, templates, signed blocks
//! - `pipeline`: resolve → head → sign → submit, with one retry

pub mod amount;
pub mod block;
pub mod pipeline;

pub use amount::{AmountError, DecimalAmount};
pub use block::{AccountBlock, AccountBlockTemplate, BlockKind, Token};
pub use pipeline::{Operation, TransactionPipeline, FUSE_MIN_QSR_AMOUNT};
