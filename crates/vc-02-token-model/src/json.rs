//! # JSON Codec
//!
//! Parsing drives a `serde_json` deserializer with a [`DeserializeSeed`]
//! that appends straight into the document arena, so no intermediate
//! `serde_json::Value` is built. Containers reserve their slot before their
//! children are parsed and are filled in once the children are known.

use crate::document::{Document, Node, Token, TokenId};
use crate::errors::TokenError;
use serde::de::{self, DeserializeSeed, MapAccess, SeqAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use std::fmt;
use vc_01_byte_codec::bytes_to_hex;

impl Document {
    /// Parse UTF-8 JSON text.
    ///
    /// Duplicate object keys keep their first position and take the last
    /// value. Non-integer numbers are rejected.
    pub fn parse_json(input: impl AsRef<[u8]>) -> Result<Document, TokenError> {
        let mut deserializer = serde_json::Deserializer::from_slice(input.as_ref());
        let mut nodes = Vec::new();
        let root = NodeSeed { nodes: &mut nodes }
            .deserialize(&mut deserializer)
            .map_err(|e| TokenError::InvalidJson(e.to_string()))?;
        deserializer
            .end()
            .map_err(|e| TokenError::InvalidJson(e.to_string()))?;
        Ok(Document::from_parts(nodes, root))
    }

    /// Serialize the whole document as compact JSON.
    pub fn to_json_string(&self) -> Result<String, TokenError> {
        self.root().to_json_string()
    }
}

impl Token<'_> {
    /// Serialize this token as compact JSON. Bytes render as `0x` hex.
    pub fn to_json_string(&self) -> Result<String, TokenError> {
        serde_json::to_string(self).map_err(|e| TokenError::InvalidJson(e.to_string()))
    }
}

struct NodeSeed<'a> {
    nodes: &'a mut Vec<Node>,
}

impl NodeSeed<'_> {
    fn push(self, node: Node) -> TokenId {
        self.nodes.push(node);
        TokenId(self.nodes.len() - 1)
    }
}

impl<'de> DeserializeSeed<'de> for NodeSeed<'_> {
    type Value = TokenId;

    fn deserialize<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for NodeSeed<'_> {
    type Value = TokenId;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON value")
    }

    fn visit_unit<E: de::Error>(self) -> Result<TokenId, E> {
        Ok(self.push(Node::Null))
    }

    fn visit_none<E: de::Error>(self) -> Result<TokenId, E> {
        Ok(self.push(Node::Null))
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<TokenId, E> {
        Ok(self.push(Node::Bool(v)))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<TokenId, E> {
        Ok(self.push(Node::Integer(i128::from(v))))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<TokenId, E> {
        Ok(self.push(Node::Integer(i128::from(v))))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<TokenId, E> {
        Err(E::invalid_type(de::Unexpected::Float(v), &"an integer"))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<TokenId, E> {
        Ok(self.push(Node::Str(v.to_owned())))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<TokenId, E> {
        Ok(self.push(Node::Str(v)))
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<TokenId, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let slot = self.nodes.len();
        self.nodes.push(Node::Null);
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(id) = seq.next_element_seed(NodeSeed {
            nodes: &mut *self.nodes,
        })? {
            items.push(id);
        }
        self.nodes[slot] = Node::Array(items);
        Ok(TokenId(slot))
    }

    fn visit_map<A>(self, mut map: A) -> Result<TokenId, A::Error>
    where
        A: MapAccess<'de>,
    {
        let slot = self.nodes.len();
        self.nodes.push(Node::Null);
        let mut entries: Vec<(String, TokenId)> = Vec::new();
        while let Some(key) = map.next_key::<String>()? {
            let value = map.next_value_seed(NodeSeed {
                nodes: &mut *self.nodes,
            })?;
            match entries.iter_mut().find(|(k, _)| *k == key) {
                Some(entry) => entry.1 = value,
                None => entries.push((key, value)),
            }
        }
        self.nodes[slot] = Node::Object(entries);
        Ok(TokenId(slot))
    }
}

impl Serialize for Token<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.node() {
            Node::Null => serializer.serialize_unit(),
            Node::Bool(v) => serializer.serialize_bool(*v),
            Node::Integer(v) => {
                if let Ok(small) = i64::try_from(*v) {
                    serializer.serialize_i64(small)
                } else if let Ok(unsigned) = u64::try_from(*v) {
                    serializer.serialize_u64(unsigned)
                } else {
                    serializer.serialize_i128(*v)
                }
            }
            Node::Bytes(b) => serializer.serialize_str(&bytes_to_hex(b)),
            Node::Str(s) => serializer.serialize_str(s),
            Node::Array(_) => {
                let mut seq = serializer.serialize_seq(Some(self.len()))?;
                for item in self.iter() {
                    seq.serialize_element(&item)?;
                }
                seq.end()
            }
            Node::Object(_) => {
                let mut map = serializer.serialize_map(Some(self.len()))?;
                for (key, value) in self.entries() {
                    map.serialize_entry(key, &value)?;
                }
                map.end()
            }
        }
    }
}
