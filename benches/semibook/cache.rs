use alloy_primitives::{Address, U256};
use criterion::{BenchmarkId, Criterion};
use semibook_rs::{Offer, SemibookState};
use std::hint::black_box;

fn offer(id: u32) -> Offer {
    // spread offers over 100 ticks so bins hold several offers each
    let tick = (id % 100) as i32 - 50;
    Offer::new(id, tick, U256::from(1_000_000u64), Address::ZERO, 100_000, 0, 0)
}

fn populated(count: u32) -> SemibookState {
    let mut state = SemibookState::new();
    for id in 1..=count {
        state.insert(offer(id), None);
    }
    state
}

/// Register all benchmarks for the cache storage engine.
pub fn register_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("Semibook - Cache");

    for &count in &[100u32, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::new("insert", count), &count, |b, &count| {
            b.iter(|| black_box(populated(count)));
        });

        group.bench_with_input(
            BenchmarkId::new("insert_bounded", count),
            &count,
            |b, &count| {
                b.iter(|| {
                    let mut state = SemibookState::new();
                    for id in 1..=count {
                        state.insert(offer(id), Some(50));
                    }
                    black_box(state)
                });
            },
        );

        group.bench_with_input(BenchmarkId::new("remove_all", count), &count, |b, &count| {
            b.iter_with_setup(
                || populated(count),
                |mut state| {
                    for id in 1..=count {
                        black_box(state.remove(id, false));
                    }
                    assert!(state.is_empty());
                },
            );
        });

        group.bench_with_input(BenchmarkId::new("iterate", count), &count, |b, &count| {
            let state = populated(count);
            b.iter(|| black_box(state.iter().fold(U256::ZERO, |sum, offer| sum + offer.gives)));
        });

        group.bench_with_input(BenchmarkId::new("snapshot", count), &count, |b, &count| {
            let state = populated(count);
            b.iter(|| black_box(state.clone()));
        });
    }

    group.finish();
}
