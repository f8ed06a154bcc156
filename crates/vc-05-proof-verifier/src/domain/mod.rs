//! # Domain Layer
//!
//! Chain data types (headers, transactions, receipts, Bitcoin primitives,
//! IPFS content ids), log filters, validator history and per-chain state.

pub mod btc;
pub mod chain;
pub mod ecdsa;
pub mod errors;
pub mod filter;
pub mod header;
pub mod ipfs;
pub mod receipt;
pub mod transaction;
pub mod validators;

pub use chain::ChainSpec;
pub use ecdsa::{recover_address, sign_hash, RecoverableSignature};
pub use errors::VerificationError;
pub use filter::{BlockScope, BlockTag, LogFilter, LogView, TopicPattern};
pub use header::EthHeader;
pub use receipt::{DecodedReceipt, LogRecord};
pub use transaction::{DecodedTransaction, LegacyTransaction};
pub use validators::{ValidatorDiff, ValidatorHistory};
