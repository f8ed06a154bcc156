//! # Document Builder
//!
//! Programmatic construction of token trees (request envelopes, proof
//! fixtures). Children are created first and referenced by [`TokenId`].

use crate::document::{Document, Node, Token, TokenId};

/// Incremental document builder.
#[derive(Debug, Default)]
pub struct DocumentBuilder {
    nodes: Vec<Node>,
}

impl DocumentBuilder {
    /// Empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, node: Node) -> TokenId {
        self.nodes.push(node);
        TokenId(self.nodes.len() - 1)
    }

    /// `null` token.
    pub fn null(&mut self) -> TokenId {
        self.push(Node::Null)
    }

    /// Boolean token.
    pub fn bool(&mut self, value: bool) -> TokenId {
        self.push(Node::Bool(value))
    }

    /// Integer token.
    pub fn integer(&mut self, value: i128) -> TokenId {
        self.push(Node::Integer(value))
    }

    /// Raw bytes token.
    pub fn bytes(&mut self, value: Vec<u8>) -> TokenId {
        self.push(Node::Bytes(value))
    }

    /// String token.
    pub fn string(&mut self, value: impl Into<String>) -> TokenId {
        self.push(Node::Str(value.into()))
    }

    /// Array of previously created tokens.
    pub fn array(&mut self, items: Vec<TokenId>) -> TokenId {
        self.push(Node::Array(items))
    }

    /// Object of previously created tokens. A repeated key keeps its first
    /// position and takes the last value, as in JSON parsing.
    pub fn object<K: Into<String>>(&mut self, entries: Vec<(K, TokenId)>) -> TokenId {
        let mut merged: Vec<(String, TokenId)> = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            let key = key.into();
            match merged.iter_mut().find(|(k, _)| *k == key) {
                Some(entry) => entry.1 = value,
                None => merged.push((key, value)),
            }
        }
        self.push(Node::Object(merged))
    }

    /// Deep-copy a token (possibly from another document) into this builder.
    pub fn import(&mut self, token: Token<'_>) -> TokenId {
        match token.node() {
            Node::Array(_) => {
                let items = token.iter().map(|item| self.import(item)).collect();
                self.array(items)
            }
            Node::Object(_) => {
                let entries: Vec<(String, TokenId)> = token
                    .entries()
                    .map(|(key, value)| (key.to_string(), self.import(value)))
                    .collect();
                self.push(Node::Object(entries))
            }
            scalar => self.push(scalar.clone()),
        }
    }

    /// Finish with `root` as the document root.
    pub fn finish(self, root: TokenId) -> Document {
        Document::from_parts(self.nodes, root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_request_envelope() {
        let mut b = DocumentBuilder::new();
        let id = b.integer(1);
        let version = b.string("2.0");
        let method = b.string("eth_getBalance");
        let addr = b.string("0x00");
        let tag = b.string("latest");
        let params = b.array(vec![addr, tag]);
        let root = b.object(vec![
            ("id", id),
            ("jsonrpc", version),
            ("method", method),
            ("params", params),
        ]);
        let doc = b.finish(root);
        assert_eq!(
            doc.to_json_string().unwrap(),
            r#"{"id":1,"jsonrpc":"2.0","method":"eth_getBalance","params":["0x00","latest"]}"#
        );
    }

    #[test]
    fn test_object_duplicate_key() {
        let mut b = DocumentBuilder::new();
        let one = b.integer(1);
        let two = b.integer(2);
        let root = b.object(vec![("k", one), ("k", two)]);
        let doc = b.finish(root);
        assert_eq!(doc.root().len(), 1);
        assert_eq!(doc.root().get("k").unwrap().as_i64().unwrap(), 2);
    }

    #[test]
    fn test_import_from_other_document() {
        let source = Document::parse_json(r#"{"a":[1,{"b":null}]}"#).unwrap();
        let mut b = DocumentBuilder::new();
        let copied = b.import(source.root().get("a").unwrap());
        let wrapper = b.array(vec![copied]);
        let doc = b.finish(wrapper);
        assert_eq!(doc.to_json_string().unwrap(), r#"[[1,{"b":null}]]"#);
    }
}
