//! # Compact Binary Format
//!
//! Each token starts with one header byte `kind << 5 | len`:
//!
//! | `len` | meaning |
//! |-------|---------|
//! | 0..=27 | inline length |
//! | 28..=31 | `len - 27` big-endian length bytes follow (1..=4) |
//!
//! The length is the payload size for bytes, strings and integers, the item
//! count for arrays and the entry count for objects. Object entries are a
//! string token (the key) followed by the value. Integers are minimal
//! two's-complement big-endian, zero being empty. Bools carry their value in
//! `len`.

use crate::document::{Document, Node, Token, TokenId};
use crate::errors::TokenError;

const KIND_BYTES: u8 = 0;
const KIND_STRING: u8 = 1;
const KIND_ARRAY: u8 = 2;
const KIND_OBJECT: u8 = 3;
const KIND_BOOL: u8 = 4;
const KIND_INTEGER: u8 = 5;
const KIND_NULL: u8 = 6;

const INLINE_MAX: usize = 27;
const MAX_DEPTH: usize = 128;

/// Encode a token subtree.
pub fn encode(token: &Token<'_>) -> Vec<u8> {
    let mut out = Vec::new();
    encode_into(token, &mut out);
    out
}

fn encode_into(token: &Token<'_>, out: &mut Vec<u8>) {
    match token.node() {
        Node::Null => write_header(out, KIND_NULL, 0),
        Node::Bool(v) => write_header(out, KIND_BOOL, usize::from(*v)),
        Node::Integer(v) => {
            let bytes = integer_bytes(*v);
            write_header(out, KIND_INTEGER, bytes.len());
            out.extend_from_slice(&bytes);
        }
        Node::Bytes(b) => {
            write_header(out, KIND_BYTES, b.len());
            out.extend_from_slice(b);
        }
        Node::Str(s) => write_string(out, s),
        Node::Array(_) => {
            write_header(out, KIND_ARRAY, token.len());
            for item in token.iter() {
                encode_into(&item, out);
            }
        }
        Node::Object(_) => {
            write_header(out, KIND_OBJECT, token.len());
            for (key, value) in token.entries() {
                write_string(out, key);
                encode_into(&value, out);
            }
        }
    }
}

fn write_string(out: &mut Vec<u8>, s: &str) {
    write_header(out, KIND_STRING, s.len());
    out.extend_from_slice(s.as_bytes());
}

fn write_header(out: &mut Vec<u8>, kind: u8, len: usize) {
    if len <= INLINE_MAX {
        out.push(kind << 5 | len as u8);
        return;
    }
    let be = (len as u32).to_be_bytes();
    let skip = be.iter().take_while(|&&b| b == 0).count();
    let len_bytes = &be[skip..];
    out.push(kind << 5 | (INLINE_MAX + len_bytes.len()) as u8);
    out.extend_from_slice(len_bytes);
}

fn integer_bytes(value: i128) -> Vec<u8> {
    if value == 0 {
        return Vec::new();
    }
    let be = value.to_be_bytes();
    let mut start = 0;
    while start < be.len() - 1 {
        let redundant = (be[start] == 0x00 && be[start + 1] & 0x80 == 0)
            || (be[start] == 0xff && be[start + 1] & 0x80 != 0);
        if !redundant {
            break;
        }
        start += 1;
    }
    be[start..].to_vec()
}

fn integer_from_bytes(bytes: &[u8]) -> i128 {
    if bytes.is_empty() {
        return 0;
    }
    let fill = if bytes[0] & 0x80 != 0 { 0xff } else { 0x00 };
    let mut buf = [fill; 16];
    buf[16 - bytes.len()..].copy_from_slice(bytes);
    i128::from_be_bytes(buf)
}

impl Document {
    /// Parse a document from the compact binary format.
    pub fn parse_binary(input: &[u8]) -> Result<Document, TokenError> {
        let mut reader = Reader {
            input,
            pos: 0,
            nodes: Vec::new(),
        };
        let root = reader.read_token(0)?;
        if reader.pos != input.len() {
            return Err(TokenError::binary(reader.pos, "trailing bytes"));
        }
        Ok(Document::from_parts(reader.nodes, root))
    }

    /// Encode the whole document in the compact binary format.
    pub fn to_binary(&self) -> Vec<u8> {
        encode(&self.root())
    }
}

struct Reader<'a> {
    input: &'a [u8],
    pos: usize,
    nodes: Vec<Node>,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize, at: usize) -> Result<&'a [u8], TokenError> {
        let end = self
            .pos
            .checked_add(len)
            .ok_or_else(|| TokenError::binary(at, "length overflow"))?;
        let slice = self
            .input
            .get(self.pos..end)
            .ok_or_else(|| TokenError::binary(at, "length overruns input"))?;
        self.pos = end;
        Ok(slice)
    }

    fn read_header(&mut self) -> Result<(u8, usize, usize), TokenError> {
        let at = self.pos;
        let header = self.take(1, at)?[0];
        let kind = header >> 5;
        let small = usize::from(header & 0x1f);
        if small <= INLINE_MAX {
            return Ok((kind, small, at));
        }
        let len_bytes = self.take(small - INLINE_MAX, at)?;
        if len_bytes[0] == 0 {
            return Err(TokenError::binary(at, "leading zero in length"));
        }
        let len = len_bytes
            .iter()
            .fold(0usize, |acc, &b| (acc << 8) | usize::from(b));
        if len <= INLINE_MAX {
            return Err(TokenError::binary(at, "long form used for short length"));
        }
        Ok((kind, len, at))
    }

    fn push(&mut self, node: Node) -> TokenId {
        self.nodes.push(node);
        TokenId(self.nodes.len() - 1)
    }

    fn remaining(&self) -> usize {
        self.input.len() - self.pos
    }

    fn read_string(&mut self, len: usize, at: usize) -> Result<String, TokenError> {
        let raw = self.take(len, at)?;
        std::str::from_utf8(raw)
            .map(str::to_owned)
            .map_err(|_| TokenError::binary(at, "string is not UTF-8"))
    }

    fn read_token(&mut self, depth: usize) -> Result<TokenId, TokenError> {
        if depth > MAX_DEPTH {
            return Err(TokenError::binary(self.pos, "nesting too deep"));
        }
        let (kind, len, at) = self.read_header()?;
        match kind {
            KIND_NULL if len == 0 => Ok(self.push(Node::Null)),
            KIND_BOOL if len <= 1 => Ok(self.push(Node::Bool(len == 1))),
            KIND_INTEGER if len <= 16 => {
                let raw = self.take(len, at)?;
                Ok(self.push(Node::Integer(integer_from_bytes(raw))))
            }
            KIND_BYTES => {
                let raw = self.take(len, at)?.to_vec();
                Ok(self.push(Node::Bytes(raw)))
            }
            KIND_STRING => {
                let s = self.read_string(len, at)?;
                Ok(self.push(Node::Str(s)))
            }
            KIND_ARRAY => {
                if len > self.remaining() {
                    return Err(TokenError::binary(at, "item count overruns input"));
                }
                let slot = self.push(Node::Null);
                let mut items = Vec::with_capacity(len);
                for _ in 0..len {
                    items.push(self.read_token(depth + 1)?);
                }
                self.nodes[slot.0] = Node::Array(items);
                Ok(slot)
            }
            KIND_OBJECT => {
                if len.saturating_mul(2) > self.remaining() {
                    return Err(TokenError::binary(at, "entry count overruns input"));
                }
                let slot = self.push(Node::Null);
                let mut entries: Vec<(String, TokenId)> = Vec::with_capacity(len);
                for _ in 0..len {
                    let (key_kind, key_len, key_at) = self.read_header()?;
                    if key_kind != KIND_STRING {
                        return Err(TokenError::binary(key_at, "object key is not a string"));
                    }
                    let key = self.read_string(key_len, key_at)?;
                    let value = self.read_token(depth + 1)?;
                    match entries.iter_mut().find(|(k, _)| *k == key) {
                        Some(entry) => entry.1 = value,
                        None => entries.push((key, value)),
                    }
                }
                self.nodes[slot.0] = Node::Object(entries);
                Ok(slot)
            }
            _ => Err(TokenError::binary(at, "invalid kind or length")),
        }
    }
}
