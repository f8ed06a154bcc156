//! Test utilities for the proof verifier.
//!
//! Fixture builders that produce consistent headers, tries and proofs:
//! signed transactions, Clique-sealed headers, account and receipt proofs,
//! and mined regtest Bitcoin chains. Enable with the `test-utils` feature
//! flag.
//!
//! # Example
//!
//! ```rust,ignore
//! use vc_05_proof_verifier::test_utils::{account_fixture, eth_chain};
//!
//! let chain = eth_chain(1);
//! let fixture = account_fixture([0x5a; 20], 1234, 7, &[], &[]);
//! // fixture.proof_json is an `in3.proof` object for eth_getBalance
//! ```

use crate::config::{BtcParams, ChainConfig};
use crate::domain::btc::{merkle_branch, merkle_root, BtcHeader, BtcTransaction};
use crate::domain::chain::ChainSpec;
use crate::domain::ecdsa::{address_of, sign_hash};
use crate::domain::errors::VerificationError;
use crate::domain::header::{EthHeader, CLIQUE_SEAL, CLIQUE_VANITY};
use crate::domain::receipt::{DecodedReceipt, LogRecord};
use crate::domain::transaction::{DecodedTransaction, LegacyTransaction};
use crate::ports::{ProofContext, ProofPolicy, SubRequester};
use crate::verifiers::common::block_signature_message;
use crate::verifiers::VerifierRegistry;
use k256::ecdsa::SigningKey;
use parking_lot::Mutex;
use vc_01_byte_codec::rlp::{self, encode_u64};
use vc_01_byte_codec::{
    bytes_to_hex, keccak256, quantity_to_hex, u256_to_be_minimal, Address, Hash, U256,
};
use vc_02_token_model::Document;
use vc_04_merkle_trie::{ordered_trie, TrieBuilder, EMPTY_TRIE_ROOT};

static DEFAULT_POLICY: ProofPolicy = ProofPolicy {
    signers: Vec::new(),
    signature_count: 0,
    finality: 0,
    include_code: false,
    full_proof: false,
};

/// Compact target used by every mined fixture header.
pub const REGTEST_BITS: u32 = 0x207f_ffff;

/// Chain id used for the Bitcoin fixtures.
pub const BTC_CHAIN_ID: u64 = 0x99;

fn hex_array(items: &[Vec<u8>]) -> String {
    let quoted: Vec<String> = items
        .iter()
        .map(|item| format!("\"{}\"", bytes_to_hex(item)))
        .collect();
    format!("[{}]", quoted.join(","))
}

// =============================================================================
// CHAINS AND CONTEXTS
// =============================================================================

/// Proof-of-work Ethereum chain without validator tracking.
pub fn eth_chain(chain_id: u64) -> ChainSpec {
    ChainSpec::new(ChainConfig::ethereum(chain_id)).expect("ethereum config is valid")
}

/// Clique chain seeded with `validators` from block 0.
pub fn clique_chain(chain_id: u64, epoch: u64, validators: Vec<Address>) -> ChainSpec {
    ChainSpec::new(ChainConfig::clique(chain_id, epoch, validators)).expect("clique config is valid")
}

/// IPFS chain.
pub fn ipfs_chain() -> ChainSpec {
    ChainSpec::new(ChainConfig::ipfs(0x7d0)).expect("ipfs config is valid")
}

/// Context with the default (no signatures, no finality) policy.
pub fn context_for<'a>(
    chain: &'a ChainSpec,
    method: &'a str,
    params: &'a Document,
    result: &'a Document,
    proof: Option<&'a Document>,
) -> ProofContext<'a> {
    context_with_policy(chain, method, params, result, proof, &DEFAULT_POLICY)
}

/// Context with an explicit policy.
pub fn context_with_policy<'a>(
    chain: &'a ChainSpec,
    method: &'a str,
    params: &'a Document,
    result: &'a Document,
    proof: Option<&'a Document>,
    policy: &'a ProofPolicy,
) -> ProofContext<'a> {
    ProofContext {
        method,
        params: params.root(),
        result: result.root(),
        proof: proof.map(Document::root),
        chain,
        policy,
        sub: None,
    }
}

/// Sub-request channel that answers every request with one scripted
/// result, verified against `chain` with the default verifiers.
pub struct ScriptedSubRequester<'a> {
    chain: &'a ChainSpec,
    result_json: String,
    registry: VerifierRegistry,
    requests: Mutex<Vec<(String, String)>>,
}

impl<'a> ScriptedSubRequester<'a> {
    /// Answer with `result_json`.
    pub fn new(chain: &'a ChainSpec, result_json: String) -> Self {
        Self {
            chain,
            result_json,
            registry: VerifierRegistry::with_defaults(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Number of requests received.
    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    /// Requests received, as `(method, params)`.
    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().clone()
    }
}

impl SubRequester for ScriptedSubRequester<'_> {
    fn request(&self, method: &str, params_json: &str) -> Result<Document, VerificationError> {
        self.requests
            .lock()
            .push((method.to_string(), params_json.to_string()));
        let params = Document::parse_json(params_json)?;
        let result = Document::parse_json(&self.result_json)?;
        let ctx = ProofContext {
            method,
            params: params.root(),
            result: result.root(),
            proof: None,
            chain: self.chain,
            policy: &DEFAULT_POLICY,
            sub: None,
        };
        self.registry.verify(&ctx)?;
        Ok(result)
    }
}

// =============================================================================
// KEYS AND SIGNATURES
// =============================================================================

/// Deterministic key pair from a non-zero seed byte.
pub fn signer_key(seed: u8) -> (SigningKey, Address) {
    let key = SigningKey::from_slice(&[seed; 32]).expect("non-zero seed is a valid key");
    let address = address_of(key.verifying_key());
    (key, address)
}

/// Node signature entry for `in3.proof.signatures`.
pub fn sign_block(key: &SigningKey, block_hash: &Hash, number: u64) -> String {
    let signature = sign_hash(key, &block_signature_message(block_hash, number))
        .expect("signing a prehash succeeds");
    format!(
        r#"{{"blockHash":"{}","block":{number},"r":"{}","s":"{}","v":{}}}"#,
        bytes_to_hex(block_hash),
        bytes_to_hex(&signature.r),
        bytes_to_hex(&signature.s),
        u64::from(signature.v) + 27
    )
}

/// Signed EIP-155 transfer of 1 wei from a fixed key.
pub fn signed_legacy(chain_id: u64, nonce: u64) -> Vec<u8> {
    let key = SigningKey::from_slice(&[0x46; 32]).expect("fixed key is valid");
    let tx = LegacyTransaction {
        nonce,
        gas_price: U256::from(1_000_000_000u64),
        gas_limit: 21_000,
        to: Some([0x35; 20]),
        value: U256::one(),
        data: Vec::new(),
    };
    let signature = sign_hash(&key, &tx.signing_hash(chain_id)).expect("signing succeeds");
    tx.encode_signed(chain_id, &signature)
}

/// Signed EIP-1559 transaction with an empty access list.
pub fn signed_eip1559(
    key: &SigningKey,
    chain_id: u64,
    nonce: u64,
    to: Option<Address>,
    value: u64,
    data: Vec<u8>,
) -> Vec<u8> {
    let to: Vec<u8> = to.map(|a| a.to_vec()).unwrap_or_default();
    let mut items = vec![
        encode_u64(chain_id),
        encode_u64(nonce),
        encode_u64(1_000_000_000),
        encode_u64(30_000_000_000),
        encode_u64(50_000),
        rlp::encode_bytes(&to),
        encode_u64(value),
        rlp::encode_bytes(&data),
        rlp::encode_list(&[]),
    ];
    let mut preimage = vec![0x02];
    preimage.extend_from_slice(&rlp::encode_list(&items));
    let signature = sign_hash(key, &keccak256(&preimage)).expect("signing succeeds");

    items.push(encode_u64(u64::from(signature.v)));
    items.push(rlp::encode_bytes(strip_zeros(&signature.r)));
    items.push(rlp::encode_bytes(strip_zeros(&signature.s)));
    let mut raw = vec![0x02];
    raw.extend_from_slice(&rlp::encode_list(&items));
    raw
}

fn strip_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

// =============================================================================
// ETHEREUM HEADERS AND BLOCKS
// =============================================================================

/// Pre-London header with empty tries.
pub fn sample_header(number: u64) -> EthHeader {
    EthHeader {
        parent_hash: [0x01; 32],
        uncles_hash: keccak256(&[0xc0]),
        miner: [0u8; 20],
        state_root: EMPTY_TRIE_ROOT,
        transactions_root: EMPTY_TRIE_ROOT,
        receipts_root: EMPTY_TRIE_ROOT,
        logs_bloom: vec![0u8; 256],
        difficulty: U256::from(2u8),
        number,
        gas_limit: 8_000_000,
        gas_used: 0,
        timestamp: 1_600_000_000 + number * 15,
        extra_data: b"verity".to_vec(),
        mix_hash: [0u8; 32],
        nonce: [0u8; 8],
        base_fee: None,
        withdrawals_root: None,
        blob_gas_used: None,
        excess_blob_gas: None,
        parent_beacon_root: None,
        requests_hash: None,
    }
}

fn header_fields(header: &EthHeader) -> String {
    let mut fields = vec![
        format!(r#""hash":"{}""#, bytes_to_hex(&header.hash())),
        format!(r#""parentHash":"{}""#, bytes_to_hex(&header.parent_hash)),
        format!(r#""sha3Uncles":"{}""#, bytes_to_hex(&header.uncles_hash)),
        format!(r#""miner":"{}""#, bytes_to_hex(&header.miner)),
        format!(r#""stateRoot":"{}""#, bytes_to_hex(&header.state_root)),
        format!(r#""transactionsRoot":"{}""#, bytes_to_hex(&header.transactions_root)),
        format!(r#""receiptsRoot":"{}""#, bytes_to_hex(&header.receipts_root)),
        format!(r#""logsBloom":"{}""#, bytes_to_hex(&header.logs_bloom)),
        format!(r#""difficulty":"0x{:x}""#, header.difficulty),
        format!(r#""number":"{}""#, quantity_to_hex(header.number)),
        format!(r#""gasLimit":"{}""#, quantity_to_hex(header.gas_limit)),
        format!(r#""gasUsed":"{}""#, quantity_to_hex(header.gas_used)),
        format!(r#""timestamp":"{}""#, quantity_to_hex(header.timestamp)),
        format!(r#""extraData":"{}""#, bytes_to_hex(&header.extra_data)),
        format!(r#""mixHash":"{}""#, bytes_to_hex(&header.mix_hash)),
        format!(r#""nonce":"{}""#, bytes_to_hex(&header.nonce)),
    ];
    if let Some(fee) = &header.base_fee {
        fields.push(format!(r#""baseFeePerGas":"0x{fee:x}""#));
    }
    if let Some(root) = &header.withdrawals_root {
        fields.push(format!(r#""withdrawalsRoot":"{}""#, bytes_to_hex(root)));
    }
    if let Some(gas) = header.blob_gas_used {
        fields.push(format!(r#""blobGasUsed":"{}""#, quantity_to_hex(gas)));
    }
    if let Some(gas) = header.excess_blob_gas {
        fields.push(format!(r#""excessBlobGas":"{}""#, quantity_to_hex(gas)));
    }
    if let Some(root) = &header.parent_beacon_root {
        fields.push(format!(r#""parentBeaconBlockRoot":"{}""#, bytes_to_hex(root)));
    }
    if let Some(hash) = &header.requests_hash {
        fields.push(format!(r#""requestsHash":"{}""#, bytes_to_hex(hash)));
    }
    fields.join(",")
}

/// JSON-RPC header object, including `hash`.
pub fn header_json(header: &EthHeader) -> String {
    format!("{{{}}}", header_fields(header))
}

/// JSON-RPC block object listing `raw_txs` as hashes or full objects.
pub fn block_json(header: &EthHeader, raw_txs: &[Vec<u8>], full: bool) -> String {
    let transactions: Vec<String> = raw_txs
        .iter()
        .enumerate()
        .map(|(index, raw)| {
            if full {
                tx_json(raw, header, index as u64)
            } else {
                format!("\"{}\"", bytes_to_hex(&keccak256(raw)))
            }
        })
        .collect();
    format!(
        r#"{{{},"transactions":[{}],"uncles":[]}}"#,
        header_fields(header),
        transactions.join(",")
    )
}

/// Seal a header as a Clique validator. A non-empty `validators` list
/// turns it into an epoch header.
pub fn seal_clique_header(header: &mut EthHeader, key: &SigningKey, validators: &[Address]) {
    let mut extra = vec![0u8; CLIQUE_VANITY];
    for validator in validators {
        extra.extend_from_slice(validator);
    }
    extra.extend_from_slice(&[0u8; CLIQUE_SEAL]);
    header.miner = [0u8; 20];
    header.extra_data = extra;

    let seal_hash = header.clique_seal_hash().expect("extraData holds a seal");
    let signature = sign_hash(key, &seal_hash).expect("signing succeeds");
    let start = header.extra_data.len() - CLIQUE_SEAL;
    header.extra_data[start..].copy_from_slice(&signature.to_bytes());
}

/// JSON-RPC transaction object for `raw` at `index` of `header`'s block.
pub fn tx_json(raw: &[u8], header: &EthHeader, index: u64) -> String {
    let tx = DecodedTransaction::decode(raw).expect("fixture transaction decodes");
    let to = match &tx.to {
        Some(address) => format!("\"{}\"", bytes_to_hex(address)),
        None => "null".to_string(),
    };
    format!(
        r#"{{"hash":"{}","nonce":"{}","gas":"{}","value":"0x{:x}","input":"{}","to":{to},"from":"{}","blockHash":"{}","blockNumber":"{}","transactionIndex":"{}"}}"#,
        bytes_to_hex(&keccak256(raw)),
        quantity_to_hex(tx.nonce),
        quantity_to_hex(tx.gas_limit),
        tx.value,
        bytes_to_hex(&tx.input),
        bytes_to_hex(&tx.sender().expect("fixture signature recovers")),
        bytes_to_hex(&header.hash()),
        quantity_to_hex(header.number),
        quantity_to_hex(index),
    )
}

/// Block with legacy transactions and their transaction trie proof.
#[derive(Debug, Clone)]
pub struct TxFixture {
    /// Header committing to `transactions`
    pub header: EthHeader,
    /// Raw transactions in block order
    pub transactions: Vec<Vec<u8>>,
    /// `in3.proof` for the transaction at the requested index
    pub proof_json: String,
}

/// `count` transactions in block 100 and a proof for position `index`
/// (which may be past the end, giving an exclusion proof).
pub fn tx_proof_fixture(count: u64, index: u64) -> TxFixture {
    let transactions: Vec<Vec<u8>> = (0..count).map(|n| signed_legacy(1, n)).collect();
    let trie = ordered_trie(&transactions);
    let mut header = sample_header(100);
    header.transactions_root = trie.root_hash();
    let proof_json = format!(
        r#"{{"block":"{}","txIndex":"{}","merkleProof":{}}}"#,
        bytes_to_hex(&header.encode()),
        quantity_to_hex(index),
        hex_array(&trie.proof(&encode_u64(index)))
    );
    TxFixture {
        header,
        transactions,
        proof_json,
    }
}

// =============================================================================
// ACCOUNTS
// =============================================================================

/// State trie holding one account.
#[derive(Debug, Clone)]
pub struct AccountFixture {
    /// Header whose `stateRoot` is the fixture trie
    pub header: EthHeader,
    /// `in3.proof` with `block` and `accounts`
    pub proof_json: String,
    state: TrieBuilder,
}

impl AccountFixture {
    /// Proof that `address` is absent from the state trie.
    pub fn absent_proof_json(&self, address: Address) -> String {
        let entry = format!(
            r#"{{"address":"{}","accountProof":{},"balance":"0x0","nonce":"0x0","codeHash":"{}","storageHash":"{}","storageProof":[]}}"#,
            bytes_to_hex(&address),
            hex_array(&self.state.proof(&keccak256(&address))),
            bytes_to_hex(&keccak256(&[])),
            bytes_to_hex(&EMPTY_TRIE_ROOT),
        );
        format!(
            r#"{{"block":"{}","accounts":{{"{}":{entry}}}}}"#,
            bytes_to_hex(&self.header.encode()),
            bytes_to_hex(&address)
        )
    }
}

/// Account with the given state and storage slots, proven at block 100.
pub fn account_fixture(
    address: Address,
    balance: u64,
    nonce: u64,
    code: &[u8],
    storage: &[(u64, u64)],
) -> AccountFixture {
    let mut storage_trie = TrieBuilder::new();
    for (slot, value) in storage {
        storage_trie.insert(
            &keccak256(&storage_key(*slot)),
            rlp::encode_bytes(&u256_to_be_minimal(&U256::from(*value))),
        );
    }
    let storage_root = storage_trie.root_hash();
    let code_hash = keccak256(code);

    let account = rlp::encode_list(&[
        encode_u64(nonce),
        encode_u64(balance),
        rlp::encode_bytes(&storage_root),
        rlp::encode_bytes(&code_hash),
    ]);
    let mut state = TrieBuilder::new();
    state.insert(&keccak256(&address), account);

    let mut header = sample_header(100);
    header.state_root = state.root_hash();

    let storage_proofs: Vec<String> = storage
        .iter()
        .map(|(slot, value)| {
            format!(
                r#"{{"key":"{}","value":"{}","proof":{}}}"#,
                quantity_to_hex(*slot),
                quantity_to_hex(*value),
                hex_array(&storage_trie.proof(&keccak256(&storage_key(*slot))))
            )
        })
        .collect();
    let entry = format!(
        r#"{{"address":"{}","accountProof":{},"balance":"{}","nonce":"{}","codeHash":"{}","storageHash":"{}","storageProof":[{}]}}"#,
        bytes_to_hex(&address),
        hex_array(&state.proof(&keccak256(&address))),
        quantity_to_hex(balance),
        quantity_to_hex(nonce),
        bytes_to_hex(&code_hash),
        bytes_to_hex(&storage_root),
        storage_proofs.join(","),
    );
    let proof_json = format!(
        r#"{{"block":"{}","accounts":{{"{}":{entry}}}}}"#,
        bytes_to_hex(&header.encode()),
        bytes_to_hex(&address)
    );
    AccountFixture {
        header,
        proof_json,
        state,
    }
}

fn storage_key(slot: u64) -> [u8; 32] {
    let mut key = [0u8; 32];
    key[24..].copy_from_slice(&slot.to_be_bytes());
    key
}

// =============================================================================
// RECEIPTS AND LOGS
// =============================================================================

/// Address emitting the fixture logs.
pub const LOG_EMITTER: Address = [0xcc; 20];

struct ReceiptBlock {
    header: EthHeader,
    transactions: Vec<Vec<u8>>,
    receipts: Vec<DecodedReceipt>,
    tx_trie: TrieBuilder,
    receipt_trie: TrieBuilder,
}

impl ReceiptBlock {
    fn new(count: u64) -> Self {
        let transactions: Vec<Vec<u8>> = (0..count).map(|n| signed_legacy(1, n)).collect();
        let receipts: Vec<DecodedReceipt> = (0..count)
            .map(|n| DecodedReceipt {
                tx_type: 0,
                status: Some(1),
                state_root: None,
                cumulative_gas_used: 21_000 * (n + 1),
                logs_bloom: vec![0u8; 256],
                logs: vec![LogRecord {
                    address: LOG_EMITTER,
                    topics: vec![[n as u8 + 1; 32]],
                    data: vec![0x01],
                }],
            })
            .collect();
        let encoded: Vec<Vec<u8>> = receipts.iter().map(DecodedReceipt::encode).collect();
        let tx_trie = ordered_trie(&transactions);
        let receipt_trie = ordered_trie(&encoded);

        let mut header = sample_header(100);
        header.transactions_root = tx_trie.root_hash();
        header.receipts_root = receipt_trie.root_hash();
        header.gas_used = 21_000 * count;
        Self {
            header,
            transactions,
            receipts,
            tx_trie,
            receipt_trie,
        }
    }

    fn tx_hash(&self, index: usize) -> Hash {
        keccak256(&self.transactions[index])
    }

    fn log_json(&self, index: usize, log: &LogRecord, log_index: usize) -> String {
        let topics: Vec<String> = log
            .topics
            .iter()
            .map(|t| format!("\"{}\"", bytes_to_hex(t)))
            .collect();
        format!(
            r#"{{"address":"{}","topics":[{}],"data":"{}","blockNumber":"{}","blockHash":"{}","transactionHash":"{}","transactionIndex":"{}","logIndex":"{}","removed":false}}"#,
            bytes_to_hex(&log.address),
            topics.join(","),
            bytes_to_hex(&log.data),
            quantity_to_hex(self.header.number),
            bytes_to_hex(&self.header.hash()),
            bytes_to_hex(&self.tx_hash(index)),
            quantity_to_hex(index as u64),
            quantity_to_hex(log_index as u64),
        )
    }

    fn proofs(&self, index: usize) -> (String, String) {
        let key = encode_u64(index as u64);
        (
            hex_array(&self.receipt_trie.proof(&key)),
            hex_array(&self.tx_trie.proof(&key)),
        )
    }
}

/// Receipt of one transaction with its receipt and transaction proofs.
#[derive(Debug, Clone)]
pub struct ReceiptFixture {
    /// Header committing to the fixture tries
    pub header: EthHeader,
    /// Hash of the proven transaction
    pub tx_hash: Hash,
    /// JSON-RPC receipt object
    pub result_json: String,
    /// `in3.proof` with `block`, `txIndex`, `merkleProof`, `txProof`
    pub proof_json: String,
}

/// Receipt at `index` of a block with `count` transactions.
pub fn receipt_fixture(count: u64, index: usize) -> ReceiptFixture {
    let block = ReceiptBlock::new(count);
    let receipt = &block.receipts[index];
    let logs: Vec<String> = receipt
        .logs
        .iter()
        .enumerate()
        .map(|(i, log)| block.log_json(index, log, i))
        .collect();
    let result_json = format!(
        r#"{{"transactionHash":"{}","transactionIndex":"{}","blockHash":"{}","blockNumber":"{}","cumulativeGasUsed":"{}","gasUsed":"0x5208","status":"{}","logsBloom":"{}","logs":[{}]}}"#,
        bytes_to_hex(&block.tx_hash(index)),
        quantity_to_hex(index as u64),
        bytes_to_hex(&block.header.hash()),
        quantity_to_hex(block.header.number),
        quantity_to_hex(receipt.cumulative_gas_used),
        quantity_to_hex(receipt.status.unwrap_or(0)),
        bytes_to_hex(&receipt.logs_bloom),
        logs.join(","),
    );
    let (receipt_proof, tx_proof) = block.proofs(index);
    let proof_json = format!(
        r#"{{"block":"{}","txIndex":"{}","merkleProof":{receipt_proof},"txProof":{tx_proof}}}"#,
        bytes_to_hex(&block.header.encode()),
        quantity_to_hex(index as u64),
    );
    ReceiptFixture {
        header: block.header.clone(),
        tx_hash: block.tx_hash(index),
        result_json,
        proof_json,
    }
}

/// `eth_getLogs` result and `logProof`.
#[derive(Debug, Clone)]
pub struct LogsFixture {
    /// Emitting address of every log
    pub address: Address,
    /// JSON-RPC log array
    pub result_json: String,
    /// `in3.proof` with `logProof`
    pub proof_json: String,
}

/// The log of transaction 1 in a block of two transactions.
pub fn logs_fixture() -> LogsFixture {
    let block = ReceiptBlock::new(2);
    let index = 1;
    let log = block.log_json(index, &block.receipts[index].logs[0], 0);
    let (receipt_proof, tx_proof) = block.proofs(index);
    let tx_hash = bytes_to_hex(&block.tx_hash(index));
    let proof_json = format!(
        r#"{{"logProof":{{"{}":{{"number":{},"block":"{}","receipts":{{"{tx_hash}":{{"txHash":"{tx_hash}","txIndex":{index},"proof":{receipt_proof},"txProof":{tx_proof}}}}}}}}}}}"#,
        quantity_to_hex(block.header.number),
        block.header.number,
        bytes_to_hex(&block.header.encode()),
    );
    LogsFixture {
        address: LOG_EMITTER,
        result_json: format!("[{log}]"),
        proof_json,
    }
}

// =============================================================================
// BITCOIN
// =============================================================================

fn push_varint(out: &mut Vec<u8>, value: usize) {
    match value {
        0..=0xfc => out.push(value as u8),
        0xfd..=0xffff => {
            out.push(0xfd);
            out.extend_from_slice(&(value as u16).to_le_bytes());
        }
        _ => {
            out.push(0xfe);
            out.extend_from_slice(&(value as u32).to_le_bytes());
        }
    }
}

fn height_script(height: u64) -> Vec<u8> {
    let mut script = match height {
        0 => vec![0x00],
        1..=16 => vec![0x50 + height as u8],
        _ => {
            let mut digits: Vec<u8> = height.to_le_bytes().to_vec();
            while digits.last() == Some(&0) {
                digits.pop();
            }
            if digits.last().is_some_and(|b| b & 0x80 != 0) {
                digits.push(0);
            }
            let mut push = vec![digits.len() as u8];
            push.extend_from_slice(&digits);
            push
        }
    };
    script.extend_from_slice(b"verity");
    script
}

/// Coinbase committing to `height` (BIP34), optionally with a witness.
pub fn coinbase_tx(height: u64, segwit: bool) -> Vec<u8> {
    let mut tx = 1u32.to_le_bytes().to_vec();
    if segwit {
        tx.extend_from_slice(&[0x00, 0x01]);
    }
    push_varint(&mut tx, 1);
    tx.extend_from_slice(&[0u8; 32]);
    tx.extend_from_slice(&[0xff; 4]);
    let script = height_script(height);
    push_varint(&mut tx, script.len());
    tx.extend_from_slice(&script);
    tx.extend_from_slice(&[0xff; 4]);

    push_varint(&mut tx, 1);
    tx.extend_from_slice(&5_000_000_000u64.to_le_bytes());
    push_varint(&mut tx, 1);
    tx.push(0x51);

    if segwit {
        push_varint(&mut tx, 1);
        push_varint(&mut tx, 32);
        tx.extend_from_slice(&[0u8; 32]);
    }
    tx.extend_from_slice(&0u32.to_le_bytes());
    tx
}

/// Non-coinbase transaction spending output 0 of `[seed; 32]`.
pub fn spend_tx(seed: u8) -> Vec<u8> {
    let mut tx = 2u32.to_le_bytes().to_vec();
    push_varint(&mut tx, 1);
    tx.extend_from_slice(&[seed; 32]);
    tx.extend_from_slice(&0u32.to_le_bytes());
    push_varint(&mut tx, 0);
    tx.extend_from_slice(&[0xff; 4]);
    push_varint(&mut tx, 1);
    tx.extend_from_slice(&1_000u64.to_le_bytes());
    push_varint(&mut tx, 1);
    tx.push(0x51);
    tx.extend_from_slice(&0u32.to_le_bytes());
    tx
}

/// Header on `prev` whose nonce meets its target. Only practical for
/// regtest-sized targets.
pub fn mine_header(prev: Hash, merkle_root: Hash, bits: u32, time: u32) -> BtcHeader {
    let mut raw = [0u8; 80];
    raw[0..4].copy_from_slice(&0x2000_0000u32.to_le_bytes());
    raw[4..36].copy_from_slice(&prev);
    raw[36..68].copy_from_slice(&merkle_root);
    raw[68..72].copy_from_slice(&time.to_le_bytes());
    raw[72..76].copy_from_slice(&bits.to_le_bytes());
    (0..=u32::MAX)
        .find_map(|nonce| {
            raw[76..80].copy_from_slice(&nonce.to_le_bytes());
            let header = BtcHeader::parse(&raw).ok()?;
            header.check_pow().is_ok().then_some(header)
        })
        .expect("a nonce meets the target")
}

fn concat_hashes(hashes: &[Hash]) -> Vec<u8> {
    hashes.iter().flatten().copied().collect()
}

/// Mined regtest block with a coinbase and one spend, followed by
/// finality headers.
#[derive(Debug, Clone)]
pub struct BtcChainFixture {
    /// Height committed by the coinbase
    pub height: u64,
    /// Block header
    pub block: BtcHeader,
    /// Headers built on `block`
    pub finality: Vec<BtcHeader>,
    /// Raw transactions, coinbase first
    pub transactions: Vec<Vec<u8>>,
}

/// Block at `height` with `finals` finality headers.
pub fn btc_chain_fixture(height: u64, finals: usize) -> BtcChainFixture {
    let transactions = vec![coinbase_tx(height, false), spend_tx(7)];
    let txids: Vec<Hash> = transactions
        .iter()
        .map(|raw| BtcTransaction::parse(raw).expect("fixture transaction parses").txid())
        .collect();
    let time = 1_600_000_000u32;
    let block = mine_header([0x11; 32], merkle_root(&txids), REGTEST_BITS, time);
    let mut finality: Vec<BtcHeader> = Vec::with_capacity(finals);
    for i in 0..finals {
        let prev = finality.last().unwrap_or(&block).hash();
        finality.push(mine_header(
            prev,
            [i as u8 + 1; 32],
            REGTEST_BITS,
            time + 600 * (i as u32 + 1),
        ));
    }
    BtcChainFixture {
        height,
        block,
        finality,
        transactions,
    }
}

impl BtcChainFixture {
    fn txids(&self) -> Vec<Hash> {
        self.transactions
            .iter()
            .map(|raw| BtcTransaction::parse(raw).expect("fixture transaction parses").txid())
            .collect()
    }

    /// Difficulty period of the block.
    pub fn period(&self) -> u64 {
        self.height / BtcParams::regtest().retarget_interval
    }

    fn finality_hex(&self) -> String {
        let bytes: Vec<u8> = self.finality.iter().flat_map(|h| h.to_bytes()).collect();
        bytes_to_hex(&bytes)
    }

    fn coinbase_fields(&self) -> String {
        format!(
            r#""cbtx":"{}","cbtxMerkleProof":"{}""#,
            bytes_to_hex(&self.transactions[0]),
            bytes_to_hex(&concat_hashes(&merkle_branch(&self.txids(), 0)))
        )
    }

    /// Serialized block.
    pub fn block_bytes(&self) -> Vec<u8> {
        let mut out = self.block.to_bytes().to_vec();
        push_varint(&mut out, self.transactions.len());
        for tx in &self.transactions {
            out.extend_from_slice(tx);
        }
        out
    }

    /// Header proof: finality headers and coinbase.
    pub fn proof_json(&self) -> String {
        format!(r#"{{"final":"{}",{}}}"#, self.finality_hex(), self.coinbase_fields())
    }

    /// Finality headers only (the coinbase comes from the block itself).
    pub fn finality_only_proof_json(&self) -> String {
        format!(r#"{{"final":"{}"}}"#, self.finality_hex())
    }

    /// `getrawtransaction` proof for transaction `index`.
    pub fn tx_proof_json(&self, index: usize) -> String {
        format!(
            r#"{{"block":"{}","txIndex":{index},"merkleProof":"{}","final":"{}",{}}}"#,
            bytes_to_hex(&self.block.to_bytes()),
            bytes_to_hex(&concat_hashes(&merkle_branch(&self.txids(), index))),
            self.finality_hex(),
            self.coinbase_fields()
        )
    }

    /// `btc_proofTarget` result proving the block's period target.
    pub fn target_proof_json(&self) -> String {
        format!(
            r#"[{{"dap":{},"block":"{}","final":"{}",{}}}]"#,
            self.period(),
            bytes_to_hex(&self.block.to_bytes()),
            self.finality_hex(),
            self.coinbase_fields()
        )
    }
}

/// Regtest chain with the fixture's period target as a checkpoint.
pub fn btc_chain(fixture: &BtcChainFixture) -> ChainSpec {
    let params = BtcParams {
        checkpoints: vec![(fixture.period(), fixture.block.bits)],
        ..BtcParams::regtest()
    };
    ChainSpec::new(ChainConfig::bitcoin(BTC_CHAIN_ID, params)).expect("bitcoin config is valid")
}

/// Regtest chain with no known period targets.
pub fn btc_chain_without_checkpoints() -> ChainSpec {
    ChainSpec::new(ChainConfig::bitcoin(BTC_CHAIN_ID, BtcParams::regtest()))
        .expect("bitcoin config is valid")
}
