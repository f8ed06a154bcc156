//! # Verity Benchmarks
//!
//! Hot paths of a verified request:
//!
//! | Area | Operation |
//! |------|-----------|
//! | vc-02 Token Model | parse a JSON-RPC response |
//! | vc-04 Merkle Trie | walk an inclusion proof |
//! | vc-03 Node Registry | rank and select candidates |
//! | vc-05 Proof Verifier | recover a transaction sender |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use vc_01_byte_codec::keccak256;
use vc_02_token_model::Document;
use vc_03_node_registry::{Node, NodeRegistry, Nodelist, Outcome, RegistryConfig, Timestamp};
use vc_04_merkle_trie::{verify_proof, TrieBuilder};
use vc_05_proof_verifier::domain::DecodedTransaction;
use vc_05_proof_verifier::test_utils::{logs_fixture, signed_legacy};

// ============================================================================
// vc-02: JSON parsing
// ============================================================================

fn bench_token_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("vc-02-token-parse");
    let logs = logs_fixture();
    let response = format!(
        r#"{{"id":1,"jsonrpc":"2.0","result":{},"in3":{{"proof":{}}}}}"#,
        logs.result_json, logs.proof_json
    );
    group.throughput(Throughput::Bytes(response.len() as u64));
    group.bench_function("logs_response", |b| {
        b.iter(|| black_box(Document::parse_json(black_box(response.as_bytes())).is_ok()))
    });
    group.finish();
}

// ============================================================================
// vc-04: Proof verification
// ============================================================================

fn bench_trie_proof(c: &mut Criterion) {
    let mut group = c.benchmark_group("vc-04-trie-proof");
    for size in [16u64, 256, 4096] {
        let mut trie = TrieBuilder::new();
        for i in 0..size {
            trie.insert(&keccak256(&i.to_be_bytes()), i.to_be_bytes().to_vec());
        }
        let root = trie.root_hash();
        let key = keccak256(&(size / 2).to_be_bytes());
        let proof = trie.proof(&key);

        group.bench_with_input(BenchmarkId::new("verify_inclusion", size), &size, |b, _| {
            b.iter(|| black_box(verify_proof(&root, &key, &proof).is_ok()))
        });
    }
    group.finish();
}

// ============================================================================
// vc-03: Node selection
// ============================================================================

fn bench_node_selection(c: &mut Criterion) {
    let mut group = c.benchmark_group("vc-03-node-selection");
    for size in [8usize, 64, 512] {
        let mut registry = NodeRegistry::new(RegistryConfig::default()).expect("valid config");
        let nodes = (0..size)
            .map(|i| Node::new(format!("https://node-{i}"), [(i % 255) as u8 + 1; 20], 1))
            .collect();
        registry
            .register_chain(Nodelist::new(1, nodes))
            .expect("valid nodelist");
        for i in 0..size {
            let outcome = if i % 3 == 0 {
                Outcome::TransportFailure
            } else {
                Outcome::Success {
                    response_ms: 20 + i as u64,
                }
            };
            registry
                .record_outcome(1, &format!("https://node-{i}"), outcome, Timestamp::new(1_000))
                .expect("known node");
        }

        group.bench_with_input(BenchmarkId::new("select_3", size), &size, |b, _| {
            b.iter(|| {
                black_box(
                    registry
                        .select_candidates(1, 3, &[], Timestamp::new(1_005))
                        .map(|c| c.len()),
                )
            })
        });
    }
    group.finish();
}

// ============================================================================
// vc-05: Sender recovery
// ============================================================================

fn bench_sender_recovery(c: &mut Criterion) {
    let mut group = c.benchmark_group("vc-05-sender-recovery");
    let raw = signed_legacy(1, 0);
    group.bench_function("legacy_decode_and_recover", |b| {
        b.iter(|| {
            let tx = DecodedTransaction::decode(black_box(&raw)).expect("valid transaction");
            black_box(tx.sender().is_ok())
        })
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_token_parse,
    bench_trie_proof,
    bench_node_selection,
    bench_sender_recovery
);
criterion_main!(benches);
