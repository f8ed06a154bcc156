//! # Document Arena
//!
//! A [`Document`] owns every token of a parsed tree in a flat `Vec`. A
//! [`Token`] is a `Copy` handle (document reference + index) used to
//! navigate; it cannot outlive its document.

use crate::errors::TokenError;
use std::fmt;
use vc_01_byte_codec::{
    be_to_u256, be_to_u64, hex_to_array, hex_to_bytes, strip_hex_prefix, Address, Hash, U256,
};

/// Index of a token inside its document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenId(pub(crate) usize);

/// Kind tag of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// JSON `null`
    Null,
    /// `true` / `false`
    Bool,
    /// Integer number
    Integer,
    /// Raw bytes (binary format only; JSON renders them as hex)
    Bytes,
    /// UTF-8 string
    String,
    /// Ordered list of tokens
    Array,
    /// Ordered key/value entries
    Object,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::Null => "null",
            TokenKind::Bool => "bool",
            TokenKind::Integer => "integer",
            TokenKind::Bytes => "bytes",
            TokenKind::String => "string",
            TokenKind::Array => "array",
            TokenKind::Object => "object",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Node {
    Null,
    Bool(bool),
    Integer(i128),
    Bytes(Vec<u8>),
    Str(String),
    Array(Vec<TokenId>),
    Object(Vec<(String, TokenId)>),
}

impl Node {
    fn kind(&self) -> TokenKind {
        match self {
            Node::Null => TokenKind::Null,
            Node::Bool(_) => TokenKind::Bool,
            Node::Integer(_) => TokenKind::Integer,
            Node::Bytes(_) => TokenKind::Bytes,
            Node::Str(_) => TokenKind::String,
            Node::Array(_) => TokenKind::Array,
            Node::Object(_) => TokenKind::Object,
        }
    }
}

/// Immutable token tree.
#[derive(Debug, Clone)]
pub struct Document {
    pub(crate) nodes: Vec<Node>,
    pub(crate) root: TokenId,
}

impl Document {
    pub(crate) fn from_parts(nodes: Vec<Node>, root: TokenId) -> Self {
        Self { nodes, root }
    }

    /// Root token.
    pub fn root(&self) -> Token<'_> {
        Token {
            doc: self,
            id: self.root,
        }
    }

    /// Number of tokens stored in the arena.
    pub fn token_count(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn node(&self, id: TokenId) -> &Node {
        &self.nodes[id.0]
    }
}

/// Borrowed handle to one token of a [`Document`].
#[derive(Clone, Copy)]
pub struct Token<'d> {
    doc: &'d Document,
    id: TokenId,
}

impl<'d> Token<'d> {
    fn child(&self, id: TokenId) -> Token<'d> {
        Token { doc: self.doc, id }
    }

    pub(crate) fn node(&self) -> &'d Node {
        self.doc.node(self.id)
    }

    fn mismatch(&self, expected: TokenKind) -> TokenError {
        TokenError::TypeMismatch {
            expected,
            found: self.kind(),
        }
    }

    /// Kind tag.
    pub fn kind(&self) -> TokenKind {
        self.node().kind()
    }

    /// `true` for JSON `null`.
    pub fn is_null(&self) -> bool {
        matches!(self.node(), Node::Null)
    }

    /// Object entry by exact key match.
    pub fn get(&self, key: &str) -> Option<Token<'d>> {
        match self.node() {
            Node::Object(entries) => entries
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, id)| self.child(*id)),
            _ => None,
        }
    }

    /// Object entry that must exist.
    pub fn field(&self, key: &str) -> Result<Token<'d>, TokenError> {
        match self.node() {
            Node::Object(_) => self
                .get(key)
                .ok_or_else(|| TokenError::MissingKey(key.to_string())),
            _ => Err(self.mismatch(TokenKind::Object)),
        }
    }

    /// Array item by position.
    pub fn at(&self, index: usize) -> Option<Token<'d>> {
        match self.node() {
            Node::Array(items) => items.get(index).map(|id| self.child(*id)),
            _ => None,
        }
    }

    /// Array item that must exist.
    pub fn item(&self, index: usize) -> Result<Token<'d>, TokenError> {
        match self.node() {
            Node::Array(items) => items
                .get(index)
                .map(|id| self.child(*id))
                .ok_or(TokenError::IndexOutOfRange {
                    index,
                    len: items.len(),
                }),
            _ => Err(self.mismatch(TokenKind::Array)),
        }
    }

    /// Number of children (array items or object entries); 0 for scalars.
    pub fn len(&self) -> usize {
        match self.node() {
            Node::Array(items) => items.len(),
            Node::Object(entries) => entries.len(),
            _ => 0,
        }
    }

    /// `true` when [`len`](Self::len) is zero.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Array items (empty for any other kind).
    pub fn iter(&self) -> impl Iterator<Item = Token<'d>> + 'd {
        let doc = self.doc;
        let items: &'d [TokenId] = match self.node() {
            Node::Array(items) => items,
            _ => &[],
        };
        items.iter().map(move |id| Token { doc, id: *id })
    }

    /// Object entries in first-seen key order (empty for any other kind).
    pub fn entries(&self) -> impl Iterator<Item = (&'d str, Token<'d>)> + 'd {
        let doc = self.doc;
        let entries: &'d [(String, TokenId)] = match self.node() {
            Node::Object(entries) => entries,
            _ => &[],
        };
        entries
            .iter()
            .map(move |(k, id)| (k.as_str(), Token { doc, id: *id }))
    }

    /// Array items, failing if the token is not an array.
    pub fn as_array(&self) -> Result<Vec<Token<'d>>, TokenError> {
        match self.node() {
            Node::Array(_) => Ok(self.iter().collect()),
            _ => Err(self.mismatch(TokenKind::Array)),
        }
    }

    /// Boolean value.
    pub fn as_bool(&self) -> Result<bool, TokenError> {
        match self.node() {
            Node::Bool(v) => Ok(*v),
            _ => Err(self.mismatch(TokenKind::Bool)),
        }
    }

    /// Signed integer value.
    pub fn as_i64(&self) -> Result<i64, TokenError> {
        match self.node() {
            Node::Integer(v) => i64::try_from(*v).map_err(|_| overflow(16, 8)),
            _ => Err(self.mismatch(TokenKind::Integer)),
        }
    }

    /// Unsigned integer from an integer token or a `0x` quantity string.
    pub fn as_u64(&self) -> Result<u64, TokenError> {
        match self.node() {
            Node::Integer(v) => u64::try_from(*v).map_err(|_| overflow(16, 8)),
            Node::Str(s) if is_hex_string(s) => Ok(be_to_u64(&hex_to_bytes(s, None)?)?),
            _ => Err(self.mismatch(TokenKind::Integer)),
        }
    }

    /// 256-bit unsigned integer from an integer token or a `0x` quantity.
    pub fn as_u256(&self) -> Result<U256, TokenError> {
        match self.node() {
            Node::Integer(v) => u64::try_from(*v)
                .map(U256::from)
                .map_err(|_| overflow(16, 8)),
            Node::Str(s) if is_hex_string(s) => Ok(be_to_u256(&hex_to_bytes(s, None)?)?),
            _ => Err(self.mismatch(TokenKind::Integer)),
        }
    }

    /// String value.
    pub fn as_str(&self) -> Result<&'d str, TokenError> {
        match self.node() {
            Node::Str(s) => Ok(s),
            _ => Err(self.mismatch(TokenKind::String)),
        }
    }

    /// Raw bytes from a bytes token or a `0x` hex string.
    pub fn as_bytes(&self) -> Result<Vec<u8>, TokenError> {
        match self.node() {
            Node::Bytes(b) => Ok(b.clone()),
            Node::Str(s) if is_hex_string(s) => Ok(hex_to_bytes(s, None)?),
            _ => Err(self.mismatch(TokenKind::Bytes)),
        }
    }

    /// Exactly 32 bytes.
    pub fn as_hash(&self) -> Result<Hash, TokenError> {
        self.as_fixed::<32>()
    }

    /// Exactly 20 bytes.
    pub fn as_address(&self) -> Result<Address, TokenError> {
        self.as_fixed::<20>()
    }

    fn as_fixed<const N: usize>(&self) -> Result<[u8; N], TokenError> {
        match self.node() {
            Node::Bytes(b) => b.as_slice().try_into().map_err(|_| {
                TokenError::Codec(vc_01_byte_codec::CodecError::InvalidLength {
                    expected: N,
                    actual: b.len(),
                })
            }),
            Node::Str(s) if is_hex_string(s) => Ok(hex_to_array::<N>(s)?),
            _ => Err(self.mismatch(TokenKind::Bytes)),
        }
    }

    /// Copy this subtree into a fresh document.
    pub fn to_document(&self) -> Document {
        let mut builder = crate::builder::DocumentBuilder::new();
        let root = builder.import(*self);
        builder.finish(root)
    }
}

fn is_hex_string(s: &str) -> bool {
    strip_hex_prefix(s).len() != s.len()
}

fn overflow(len: usize, max: usize) -> TokenError {
    TokenError::Codec(vc_01_byte_codec::CodecError::IntegerOverflow { len, max })
}

impl PartialEq for Token<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self.node(), other.node()) {
            (Node::Array(a), Node::Array(b)) => {
                a.len() == b.len() && self.iter().zip(other.iter()).all(|(x, y)| x == y)
            }
            (Node::Object(a), Node::Object(b)) => {
                a.len() == b.len()
                    && self
                        .entries()
                        .zip(other.entries())
                        .all(|((ka, va), (kb, vb))| ka == kb && va == vb)
            }
            (a, b) => a == b,
        }
    }
}

impl fmt::Debug for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => write!(f, "<{}>", self.kind()),
        }
    }
}
