//! # Nibbles
//!
//! Half-byte key paths and the hex-prefix encoding of the Yellow Paper,
//! Appendix C.
//!
//! | flag nibble | node | path length |
//! |-------------|------|-------------|
//! | 0 | extension | even |
//! | 1 | extension | odd |
//! | 2 | leaf | even |
//! | 3 | leaf | odd |

use crate::errors::TrieError;

/// Unpacked nibble path (each element 0..=15).
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Nibbles(Vec<u8>);

impl Nibbles {
    /// Unpack bytes into nibbles, high nibble first.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut nibbles = Vec::with_capacity(bytes.len() * 2);
        for byte in bytes {
            nibbles.push(byte >> 4);
            nibbles.push(byte & 0x0f);
        }
        Nibbles(nibbles)
    }

    /// Wrap already unpacked nibbles.
    pub fn from_nibbles(nibbles: &[u8]) -> Self {
        Nibbles(nibbles.to_vec())
    }

    /// Nibble slice.
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Number of nibbles.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `true` for the empty path.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Hex-prefix encode.
    pub fn encode_hex_prefix(&self, is_leaf: bool) -> Vec<u8> {
        encode_hex_prefix(&self.0, is_leaf)
    }

    /// Hex-prefix decode, returning the path and the leaf flag.
    ///
    /// Rejects empty input, flag nibbles above 3 and a non-zero padding
    /// nibble on even-length paths.
    pub fn decode_hex_prefix(encoded: &[u8]) -> Result<(Self, bool), TrieError> {
        let first = *encoded
            .first()
            .ok_or_else(|| TrieError::MalformedNode("empty hex-prefix path".into()))?;
        let flag = first >> 4;
        if flag > 3 {
            return Err(TrieError::MalformedNode(format!(
                "invalid hex-prefix flag {flag}"
            )));
        }
        let is_leaf = flag & 0x02 != 0;
        let odd = flag & 0x01 != 0;

        let mut nibbles = Vec::with_capacity(encoded.len() * 2);
        if odd {
            nibbles.push(first & 0x0f);
        } else if first & 0x0f != 0 {
            return Err(TrieError::MalformedNode(
                "non-zero padding in even hex-prefix path".into(),
            ));
        }
        for byte in &encoded[1..] {
            nibbles.push(byte >> 4);
            nibbles.push(byte & 0x0f);
        }
        Ok((Nibbles(nibbles), is_leaf))
    }
}

/// Hex-prefix encode a nibble slice.
pub fn encode_hex_prefix(nibbles: &[u8], is_leaf: bool) -> Vec<u8> {
    let odd = nibbles.len() % 2 == 1;
    let flag = if is_leaf { 2 } else { 0 } + u8::from(odd);
    let mut out = Vec::with_capacity(nibbles.len() / 2 + 1);
    let rest = if odd {
        out.push(flag << 4 | nibbles[0]);
        &nibbles[1..]
    } else {
        out.push(flag << 4);
        nibbles
    };
    for pair in rest.chunks(2) {
        out.push(pair[0] << 4 | pair.get(1).copied().unwrap_or(0));
    }
    out
}
