//! # Hashlock Exchange Benchmarks
//!
//! | Area | Operation | Target |
//! |------|-----------|--------|
//! | Crypto | Secret + hashlock generation | < 10μs |
//! | Scripts | Redeem script + P2SH address | < 50μs |
//! | Timelocks | Schedule calculation | < 1μs |
//! | Coordinator | Initiate + execute on devnet | < 5ms |

use bitcoin::Network;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::Duration;
use swap_crypto::{generate_secret_and_hashlock, verify_secret};
use swap_engine::test_utils::{Devnet, GENESIS_TIME};
use swap_engine::{
    calculate_timelocks, generate_htlc_address, generate_htlc_script, parse_htlc_script,
    HtlcScriptParams, SwapApi, SwapConfig, SwapRequest,
};

// ============================================================================
// Crypto
// ============================================================================

fn bench_hashlock(c: &mut Criterion) {
    let mut group = c.benchmark_group("crypto-hashlock");

    group.bench_function("generate_secret_and_hashlock", |b| {
        b.iter(|| black_box(generate_secret_and_hashlock()))
    });

    let (secret, hashlock) = generate_secret_and_hashlock();
    group.bench_function("verify_secret", |b| {
        b.iter(|| black_box(verify_secret(secret.as_bytes(), &hashlock)))
    });

    group.finish();
}

// ============================================================================
// Scripts
// ============================================================================

fn bench_htlc_script(c: &mut Criterion) {
    let mut group = c.benchmark_group("htlc-script");

    let params = HtlcScriptParams {
        hashlock: [0x5a; 32],
        recipient: Devnet::key(0x33).public_key(),
        sender: Devnet::key(0x44).public_key(),
        locktime: (GENESIS_TIME + 3600) as u32,
    };
    let script = params.redeem_script();

    group.bench_function("generate_htlc_script", |b| {
        b.iter(|| {
            black_box(generate_htlc_script(
                &params.hashlock,
                &params.recipient,
                &params.sender,
                params.locktime,
            ))
        })
    });
    group.bench_function("generate_htlc_address", |b| {
        b.iter(|| black_box(generate_htlc_address(&params, Network::Regtest)))
    });
    group.bench_function("parse_htlc_script", |b| {
        b.iter(|| black_box(parse_htlc_script(&script)))
    });

    group.finish();
}

fn bench_timelocks(c: &mut Criterion) {
    let config = SwapConfig::default();
    c.bench_function("calculate_timelocks", |b| {
        b.iter(|| black_box(calculate_timelocks(black_box(GENESIS_TIME), 3600, &config)))
    });
}

// ============================================================================
// Coordinator
// ============================================================================

fn bench_swap_lifecycle(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    let mut group = c.benchmark_group("swap-lifecycle");
    group.measurement_time(Duration::from_secs(10));

    for batch in [1usize, 10, 50] {
        group.throughput(Throughput::Elements(batch as u64));
        group.bench_with_input(BenchmarkId::new("initiate_execute", batch), &batch, |b, &batch| {
            b.iter(|| {
                runtime.block_on(async {
                    let devnet = Devnet::new();
                    let coordinator = devnet.coordinator();
                    let recipient = devnet.bitcoin_user(0x33);
                    devnet
                        .ethereum
                        .mint(Devnet::evm_address(0x22), 10_000 * batch as u128);

                    for _ in 0..batch {
                        let swap = coordinator
                            .initiate_swap(SwapRequest {
                                from_chain: "ethereum".to_string(),
                                to_chain: "bitcoin".to_string(),
                                from_token: "ETH".to_string(),
                                to_token: "BTC".to_string(),
                                from_amount: "10000".to_string(),
                                user_address: Devnet::evm_user(0x22),
                                recipient_address: Some(recipient.clone()),
                                timelock: None,
                            })
                            .await;
                        if let Ok(swap) = swap {
                            black_box(coordinator.execute_swap(&swap.id).await.is_ok());
                        }
                    }
                })
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_hashlock,
    bench_htlc_script,
    bench_timelocks,
    bench_swap_lifecycle
);
criterion_main!(benches);
