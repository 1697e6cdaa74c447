// Import pipeline benchmarks.
//
// Covers sequential import of a linear chain, decoding alone, and a fork
// choice decision against a long competing branch.

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};

use strata_protocol::chain::ForkChoice;
use strata_protocol::config::EngineConfig;
use strata_protocol::storage::{
    AncestryEntry, AncestryIndex, BincodeCodec, Block, BlockBuilder, BlockCodec,
};
use strata_protocol::ChainEngine;

/// A linear chain of `n` blocks on top of genesis, pre-encoded.
fn encoded_chain(n: usize) -> Vec<Vec<u8>> {
    let mut parent = Block::genesis();
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let block = BlockBuilder::on(&parent)
            .unwrap()
            .transaction(format!("tx-{i}").into_bytes())
            .build();
        out.push(block.to_bytes().unwrap());
        parent = block;
    }
    out
}

fn bench_sequential_import(c: &mut Criterion) {
    let mut group = c.benchmark_group("import/sequential");
    group.sample_size(10);

    for n in [100usize, 1_000] {
        let chain = encoded_chain(n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &chain, |b, chain| {
            b.iter_batched(
                || ChainEngine::open_temporary(EngineConfig::default()).unwrap(),
                |engine| {
                    for raw in chain {
                        engine.import(raw).unwrap();
                    }
                },
                BatchSize::PerIteration,
            );
        });
    }

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let raw = encoded_chain(1).remove(0);
    c.bench_function("codec/decode", |b| {
        b.iter(|| BincodeCodec.decode(&raw).unwrap());
    });
}

fn bench_fork_choice(c: &mut Criterion) {
    let mut group = c.benchmark_group("fork_choice/resolve");

    for depth in [10u64, 100, 1_000] {
        // Two branches of `depth` blocks from a shared root.
        let mut index = AncestryIndex::new();
        let root = [0u8; 32];
        index
            .insert(root, AncestryEntry { number: 0, parent_hash: [0xFF; 32], difficulty: 1u64.into(), uncles: vec![] })
            .unwrap();

        let mut tip = root;
        let mut rival = root;
        for n in 1..=depth {
            let mut a = [0u8; 32];
            a[..8].copy_from_slice(&n.to_be_bytes());
            a[31] = 1;
            index
                .insert(a, AncestryEntry { number: n, parent_hash: tip, difficulty: 10u64.into(), uncles: vec![] })
                .unwrap();
            tip = a;

            if n < depth {
                let mut b = a;
                b[31] = 2;
                index
                    .insert(b, AncestryEntry { number: n, parent_hash: rival, difficulty: 10u64.into(), uncles: vec![] })
                    .unwrap();
                rival = b;
            }
        }

        let candidate = [0xCC; 32];
        let entry = AncestryEntry {
            number: depth,
            parent_hash: rival,
            difficulty: 20u64.into(),
            uncles: vec![],
        };
        let fork_choice = ForkChoice::default();

        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, _| {
            b.iter(|| fork_choice.resolve(&index, &tip, &candidate, &entry).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_sequential_import, bench_decode, bench_fork_choice);
criterion_main!(benches);
