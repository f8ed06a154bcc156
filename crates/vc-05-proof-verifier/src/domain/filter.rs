//! # Log Filter Predicate
//!
//! Parsed form of an `eth_getLogs` / `eth_newFilter` options object.
//!
//! - `address`: a single address or a list (any of)
//! - `topics`: positional; `null` matches anything, a string must match
//!   exactly, an array matches any of its members
//! - `fromBlock`/`toBlock`: numbers or tags, or `blockHash` instead

use crate::domain::errors::VerificationError;
use vc_01_byte_codec::{bytes_to_hex, Address, Hash};
use vc_02_token_model::{Token, TokenKind};

/// Block reference in a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTag {
    /// Explicit block number
    Number(u64),
    /// Genesis
    Earliest,
    /// Chain head (`latest` or `pending`)
    Latest,
}

impl BlockTag {
    /// Parse a quantity or tag string.
    pub fn from_token(token: &Token<'_>) -> Result<Self, VerificationError> {
        match token.as_str() {
            Ok("earliest") => Ok(BlockTag::Earliest),
            Ok("latest") | Ok("pending") | Ok("safe") | Ok("finalized") => Ok(BlockTag::Latest),
            _ => token
                .as_u64()
                .map(BlockTag::Number)
                .map_err(|e| VerificationError::InvalidFilter(format!("block tag: {e}"))),
        }
    }

    fn lower_bound(self) -> Option<u64> {
        match self {
            BlockTag::Number(n) => Some(n),
            BlockTag::Earliest => Some(0),
            BlockTag::Latest => None,
        }
    }
}

/// Block constraint of a filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockScope {
    /// Inclusive range; `None` bounds are open.
    Range {
        /// Lowest block
        from: Option<u64>,
        /// Highest block
        to: Option<u64>,
    },
    /// Exactly one block.
    Hash(Hash),
}

/// Constraint on one topic position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicPattern {
    /// Anything (including a missing topic)
    Any,
    /// Any of the listed topics
    OneOf(Vec<Hash>),
}

/// Minimal view of a log for matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogView {
    /// Emitting contract
    pub address: Address,
    /// Topics
    pub topics: Vec<Hash>,
    /// Containing block number
    pub block_number: u64,
    /// Containing block hash
    pub block_hash: Hash,
}

/// Parsed log filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFilter {
    /// Accepted addresses (empty accepts all)
    pub addresses: Vec<Address>,
    /// Positional topic patterns
    pub topics: Vec<TopicPattern>,
    /// Block constraint
    pub scope: BlockScope,
}

impl Default for LogFilter {
    fn default() -> Self {
        Self {
            addresses: Vec::new(),
            topics: Vec::new(),
            scope: BlockScope::Range {
                from: None,
                to: None,
            },
        }
    }
}

impl LogFilter {
    /// Parse a filter options object.
    pub fn from_token(options: &Token<'_>) -> Result<Self, VerificationError> {
        if options.kind() != TokenKind::Object {
            return Err(VerificationError::InvalidFilter(
                "filter must be an object".into(),
            ));
        }
        let present = |key: &str| options.get(key).filter(|t| !t.is_null());

        let addresses = match present("address") {
            None => Vec::new(),
            Some(t) if t.kind() == TokenKind::Array => t
                .iter()
                .map(|a| a.as_address().map_err(invalid("address")))
                .collect::<Result<_, _>>()?,
            Some(t) => vec![t.as_address().map_err(invalid("address"))?],
        };

        let topics = match present("topics") {
            None => Vec::new(),
            Some(t) => t
                .as_array()
                .map_err(invalid("topics"))?
                .iter()
                .map(parse_topic)
                .collect::<Result<_, _>>()?,
        };

        let block_hash = present("blockHash");
        let from = present("fromBlock");
        let to = present("toBlock");
        let scope = match block_hash {
            Some(_) if from.is_some() || to.is_some() => {
                return Err(VerificationError::InvalidFilter(
                    "blockHash excludes fromBlock/toBlock".into(),
                ))
            }
            Some(hash) => BlockScope::Hash(hash.as_hash().map_err(invalid("blockHash"))?),
            None => {
                let from = from
                    .map(|t| BlockTag::from_token(&t))
                    .transpose()?
                    .and_then(BlockTag::lower_bound);
                let to = match to.map(|t| BlockTag::from_token(&t)).transpose()? {
                    Some(BlockTag::Number(n)) => Some(n),
                    Some(BlockTag::Earliest) => Some(0),
                    Some(BlockTag::Latest) | None => None,
                };
                if let (Some(from), Some(to)) = (from, to) {
                    if from > to {
                        return Err(VerificationError::InvalidFilter(format!(
                            "fromBlock {from} is after toBlock {to}"
                        )));
                    }
                }
                BlockScope::Range { from, to }
            }
        };

        Ok(Self {
            addresses,
            topics,
            scope,
        })
    }

    /// Check `log` against the filter.
    pub fn check(&self, log: &LogView) -> Result<(), VerificationError> {
        if !self.addresses.is_empty() && !self.addresses.contains(&log.address) {
            return Err(VerificationError::FilterMismatch(format!(
                "address {} not requested",
                bytes_to_hex(&log.address)
            )));
        }

        match &self.scope {
            BlockScope::Hash(hash) if *hash != log.block_hash => {
                return Err(VerificationError::FilterMismatch(format!(
                    "block {} not requested",
                    bytes_to_hex(&log.block_hash)
                )))
            }
            BlockScope::Range { from, to }
                if from.is_some_and(|f| log.block_number < f)
                    || to.is_some_and(|t| log.block_number > t) =>
            {
                return Err(VerificationError::FilterMismatch(format!(
                    "block {} outside requested range",
                    log.block_number
                )))
            }
            _ => {}
        }

        for (position, pattern) in self.topics.iter().enumerate() {
            let TopicPattern::OneOf(accepted) = pattern else {
                continue;
            };
            match log.topics.get(position) {
                Some(topic) if accepted.contains(topic) => {}
                _ => {
                    return Err(VerificationError::FilterMismatch(format!(
                        "topic {position} not requested"
                    )))
                }
            }
        }
        Ok(())
    }

    /// Whether `log` satisfies the filter.
    pub fn matches(&self, log: &LogView) -> bool {
        self.check(log).is_ok()
    }
}

fn parse_topic(token: &Token<'_>) -> Result<TopicPattern, VerificationError> {
    match token.kind() {
        TokenKind::Null => Ok(TopicPattern::Any),
        TokenKind::Array => {
            let options: Vec<Hash> = token
                .iter()
                .filter(|t| !t.is_null())
                .map(|t| t.as_hash().map_err(invalid("topics")))
                .collect::<Result<_, _>>()?;
            // An empty OR-list constrains nothing.
            if options.is_empty() {
                Ok(TopicPattern::Any)
            } else {
                Ok(TopicPattern::OneOf(options))
            }
        }
        _ => Ok(TopicPattern::OneOf(vec![token
            .as_hash()
            .map_err(invalid("topics"))?])),
    }
}

fn invalid(field: &'static str) -> impl Fn(vc_02_token_model::TokenError) -> VerificationError {
    move |e| VerificationError::InvalidFilter(format!("{field}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use vc_01_byte_codec::quantity_to_hex;
    use vc_02_token_model::Document;

    const ADDR_A: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const TOPIC_1: &str = "0x1111111111111111111111111111111111111111111111111111111111111111";
    const TOPIC_2: &str = "0x2222222222222222222222222222222222222222222222222222222222222222";
    const TOPIC_3: &str = "0x3333333333333333333333333333333333333333333333333333333333333333";

    fn filter(json: &str) -> LogFilter {
        let doc = Document::parse_json(json).unwrap();
        LogFilter::from_token(&doc.root()).unwrap()
    }

    fn log(address: u8, topics: &[u8], block_number: u64) -> LogView {
        LogView {
            address: [address; 20],
            topics: topics.iter().map(|t| [*t; 32]).collect(),
            block_number,
            block_hash: [0xbb; 32],
        }
    }

    #[test]
    fn test_address_single_and_list() {
        let single = filter(&format!(r#"{{"address":"{ADDR_A}"}}"#));
        assert!(single.matches(&log(0xaa, &[], 1)));
        assert!(!single.matches(&log(0xcc, &[], 1)));

        let list = filter(&format!(
            r#"{{"address":["{ADDR_A}","0xcccccccccccccccccccccccccccccccccccccccc"]}}"#
        ));
        assert!(list.matches(&log(0xcc, &[], 1)));
        assert!(!list.matches(&log(0xdd, &[], 1)));
    }

    #[test]
    fn test_block_range() {
        let f = filter(r#"{"fromBlock":"0x10","toBlock":"0x20"}"#);
        assert!(f.matches(&log(1, &[], 0x10)));
        assert!(f.matches(&log(1, &[], 0x20)));
        assert!(!f.matches(&log(1, &[], 0x0f)));
        assert!(!f.matches(&log(1, &[], 0x21)));
    }

    #[test]
    fn test_block_range_boundaries() {
        let f = filter(r#"{"fromBlock":"0x793422","toBlock":"0x793490"}"#);
        for inside in [0x793422, 0x793426, 0x793489, 0x793490] {
            assert!(f.matches(&log(1, &[], inside)), "{inside:#x} is in range");
        }
        for outside in [0x793421, 0x793491] {
            assert!(!f.matches(&log(1, &[], outside)), "{outside:#x} is out of range");
            let err = f.check(&log(1, &[], outside)).unwrap_err();
            assert!(err.to_string().contains("block"));
        }
    }

    #[test]
    fn test_tags_earliest_latest() {
        let f = filter(r#"{"fromBlock":"earliest","toBlock":"latest"}"#);
        assert_eq!(
            f.scope,
            BlockScope::Range {
                from: Some(0),
                to: None
            }
        );
        assert!(f.matches(&log(1, &[], u64::MAX)));
        let pending = filter(r#"{"fromBlock":"pending"}"#);
        assert!(pending.matches(&log(1, &[], 5)));
    }

    #[test]
    fn test_inverted_range_rejected() {
        let doc = Document::parse_json(r#"{"fromBlock":"0x20","toBlock":"0x10"}"#).unwrap();
        assert!(matches!(
            LogFilter::from_token(&doc.root()),
            Err(VerificationError::InvalidFilter(_))
        ));
    }

    #[test]
    fn test_block_hash_exclusive_with_range() {
        let hash = format!("0x{}", "bb".repeat(32));
        let f = filter(&format!(r#"{{"blockHash":"{hash}"}}"#));
        assert!(f.matches(&log(1, &[], 99)));
        let mut other = log(1, &[], 99);
        other.block_hash = [0xcc; 32];
        assert!(!f.matches(&other));

        let doc =
            Document::parse_json(format!(r#"{{"blockHash":"{hash}","fromBlock":"0x1"}}"#)).unwrap();
        assert!(LogFilter::from_token(&doc.root()).is_err());
    }

    #[test]
    fn test_topic_wildcard_and_exact() {
        let f = filter(&format!(r#"{{"topics":[null,"{TOPIC_2}"]}}"#));
        assert!(f.matches(&log(1, &[0x99, 0x22], 1)));
        assert!(f.matches(&log(1, &[0x11, 0x22, 0x33], 1)));
        assert!(!f.matches(&log(1, &[0x11, 0x11], 1)));
    }

    #[test]
    fn test_topic_or_list() {
        let f = filter(&format!(r#"{{"topics":[["{TOPIC_1}","{TOPIC_2}"]]}}"#));
        assert!(f.matches(&log(1, &[0x11], 1)));
        assert!(f.matches(&log(1, &[0x22], 1)));
        assert!(!f.matches(&log(1, &[0x33], 1)));
    }

    #[test]
    fn test_topic_or_list_after_wildcard() {
        let f = filter(&format!(r#"{{"topics":[null,["{TOPIC_1}","{TOPIC_3}"]]}}"#));
        assert!(f.matches(&log(1, &[0x99, 0x11], 1)));
        assert!(f.matches(&log(1, &[0x99, 0x33], 1)));
        assert!(!f.matches(&log(1, &[0x99, 0x22], 1)));
        assert!(!f.matches(&log(1, &[0x11], 1)));
        assert!(f.check(&log(1, &[0x99, 0x22], 1)).is_err());
    }

    #[test]
    fn test_pattern_longer_than_log_topics() {
        let f = filter(&format!(r#"{{"topics":["{TOPIC_1}",null,"{TOPIC_2}"]}}"#));
        assert!(!f.matches(&log(1, &[0x11], 1)));
        let trailing_null = filter(&format!(r#"{{"topics":["{TOPIC_1}",null]}}"#));
        assert!(trailing_null.matches(&log(1, &[0x11], 1)));
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let f = filter("{}");
        assert_eq!(f, LogFilter::default());
        assert!(f.matches(&log(7, &[1, 2, 3, 4], 12345)));
    }

    #[test]
    fn test_mismatch_reason_names_field() {
        let f = filter(&format!(r#"{{"address":"{ADDR_A}"}}"#));
        let err = f.check(&log(0xcc, &[], 1)).unwrap_err();
        assert!(err.to_string().contains("address"));
    }

    proptest! {
        #[test]
        fn test_range_is_inclusive(
            from in 0u64..1_000_000,
            len in 0u64..1_000,
            n in 0u64..1_002_000,
        ) {
            let to = from + len;
            let f = filter(&format!(
                r#"{{"fromBlock":"{}","toBlock":"{}"}}"#,
                quantity_to_hex(from),
                quantity_to_hex(to)
            ));
            prop_assert_eq!(f.matches(&log(1, &[], n)), from <= n && n <= to);
        }
    }
}
