//! # VC-02 Token Model
//!
//! Immutable token trees for JSON-RPC payloads and proof data.
//!
//! **Component ID:** 02
//! **Dependencies:** vc-01-byte-codec
//!
//! ## Design
//!
//! A [`Document`] is an arena: every token lives in one `Vec` owned by the
//! document and is addressed by index. [`Token`] handles borrow the
//! document, so no token can outlive the tree it came from.
//!
//! ```text
//! vc-02-token-model/
//! ├── document.rs   # Document, Token, TokenKind, typed accessors
//! ├── json.rs       # serde_json parse (DeserializeSeed) + Serialize
//! ├── binary.rs     # compact binary format
//! ├── builder.rs    # DocumentBuilder
//! └── errors.rs     # TokenError
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod binary;
pub mod builder;
pub mod document;
pub mod errors;
pub mod json;

pub use builder::DocumentBuilder;
pub use document::{Document, Token, TokenId, TokenKind};
pub use errors::TokenError;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
