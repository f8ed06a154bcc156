//! Account and storage verification (`eth_getBalance`,
//! `eth_getTransactionCount`, `eth_getCode`, `eth_getStorageAt`).
//!
//! `in3.proof.accounts` maps addresses to EIP-1186 style entries:
//! `{address, accountProof, balance, nonce, codeHash, storageHash,
//! storageProof: [{key, value, proof}]}`. The account RLP is proven under
//! the header's `stateRoot` with key `keccak(address)`.

use crate::domain::errors::VerificationError;
use crate::domain::filter::BlockTag;
use crate::ports::{ProofContext, Verifier};
use crate::verifiers::common::{ensure, hex_list, proven_header};
use tracing::trace;
use vc_01_byte_codec::rlp::{self, RlpKind};
use vc_01_byte_codec::{
    be_to_u256, keccak256, Address, Hash, KECCAK_EMPTY, U256,
};
use vc_02_token_model::Token;
use vc_04_merkle_trie::{verify_proof, EMPTY_TRIE_ROOT};

/// Account state proven under a state root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvenAccount {
    /// Nonce
    pub nonce: U256,
    /// Balance
    pub balance: U256,
    /// Storage trie root
    pub storage_root: Hash,
    /// Code hash
    pub code_hash: Hash,
}

impl ProvenAccount {
    /// State of an account absent from the trie.
    pub fn empty() -> Self {
        Self {
            nonce: U256::zero(),
            balance: U256::zero(),
            storage_root: EMPTY_TRIE_ROOT,
            code_hash: KECCAK_EMPTY,
        }
    }

    fn decode(raw: &[u8]) -> Result<Self, VerificationError> {
        let fields = rlp::list_payloads(raw)?;
        match fields.as_slice() {
            [(RlpKind::Value, nonce), (RlpKind::Value, balance), (RlpKind::Value, storage), (RlpKind::Value, code)] => {
                Ok(Self {
                    nonce: be_to_u256(nonce)?,
                    balance: be_to_u256(balance)?,
                    storage_root: (*storage).try_into().map_err(|_| {
                        VerificationError::InvalidProofData("storageRoot must be 32 bytes".into())
                    })?,
                    code_hash: (*code).try_into().map_err(|_| {
                        VerificationError::InvalidProofData("codeHash must be 32 bytes".into())
                    })?,
                })
            }
            _ => Err(VerificationError::InvalidProofData(
                "account must be [nonce, balance, storageRoot, codeHash]".into(),
            )),
        }
    }
}

/// Prove the account an entry describes under `state_root`.
pub fn prove_account(
    state_root: &Hash,
    address: &Address,
    entry: &Token<'_>,
) -> Result<ProvenAccount, VerificationError> {
    let proof = hex_list(&entry.field("accountProof")?)?;
    let account = match verify_proof(state_root, &keccak256(address), &proof)? {
        Some(raw) => ProvenAccount::decode(&raw)?,
        None => ProvenAccount::empty(),
    };

    ensure(entry.field("nonce")?.as_u256()? == account.nonce, "nonce")?;
    ensure(entry.field("balance")?.as_u256()? == account.balance, "balance")?;
    ensure(
        entry.field("storageHash")?.as_hash()? == account.storage_root,
        "storageHash",
    )?;
    ensure(entry.field("codeHash")?.as_hash()? == account.code_hash, "codeHash")?;
    Ok(account)
}

/// Prove a storage slot under the account's storage root.
pub fn prove_storage(
    account: &ProvenAccount,
    slot: U256,
    entry: &Token<'_>,
) -> Result<U256, VerificationError> {
    let storage_proofs = entry.field("storageProof")?.as_array()?;
    let item = storage_proofs
        .iter()
        .find(|p| p.get("key").and_then(|k| k.as_u256().ok()) == Some(slot))
        .ok_or(VerificationError::MissingProof("storageProof"))?;

    let mut key = [0u8; 32];
    slot.to_big_endian(&mut key);
    let proof = hex_list(&item.field("proof")?)?;
    let value = match verify_proof(&account.storage_root, &keccak256(&key), &proof)? {
        Some(raw) => be_to_u256(rlp::decode_value(&raw)?)?,
        None => U256::zero(),
    };
    ensure(item.field("value")?.as_u256()? == value, "storage value")?;
    Ok(value)
}

fn find_entry<'a>(
    accounts: &Token<'a>,
    address: &Address,
) -> Result<Token<'a>, VerificationError> {
    for (_, entry) in accounts.entries() {
        if entry.field("address")?.as_address()? == *address {
            return Ok(entry);
        }
    }
    Err(VerificationError::MissingProof("accounts"))
}

/// Account state verifier.
#[derive(Debug, Default)]
pub struct EthAccountVerifier;

impl Verifier for EthAccountVerifier {
    fn name(&self) -> &'static str {
        "eth-account"
    }

    fn supports(&self, method: &str) -> bool {
        matches!(
            method,
            "eth_getBalance" | "eth_getTransactionCount" | "eth_getCode" | "eth_getStorageAt"
        )
    }

    fn verify(&self, ctx: &ProofContext<'_>) -> Result<(), VerificationError> {
        let address = ctx
            .param(0)
            .ok_or_else(|| VerificationError::InvalidProofData("missing address param".into()))?
            .as_address()?;
        let block_param_index = if ctx.method == "eth_getStorageAt" { 2 } else { 1 };

        let (header, trusted) = proven_header(ctx)?;
        if let Some(block) = ctx.param(block_param_index) {
            if let BlockTag::Number(n) = BlockTag::from_token(&block)? {
                ensure(n == header.number, "block number")?;
            }
        }

        let entry = find_entry(&ctx.proof_field("accounts")?, &address)?;
        let account = prove_account(&header.state_root, &address, &entry)?;

        match ctx.method {
            "eth_getBalance" => ensure(ctx.result.as_u256()? == account.balance, "balance")?,
            "eth_getTransactionCount" => ensure(ctx.result.as_u256()? == account.nonce, "nonce")?,
            "eth_getCode" => {
                ensure(keccak256(&ctx.result.as_bytes()?) == account.code_hash, "code")?
            }
            _ => {
                let slot = ctx
                    .param(1)
                    .ok_or_else(|| VerificationError::InvalidProofData("missing slot".into()))?
                    .as_u256()?;
                let value = prove_storage(&account, slot, &entry)?;
                ensure(ctx.result.as_u256()? == value, "storage value")?;
            }
        }
        trusted.commit(ctx)?;
        trace!(method = ctx.method, block = header.number, "[vc-05] Account proof verified");
        Ok(())
    }
}
