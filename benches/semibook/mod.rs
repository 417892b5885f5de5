use criterion::Criterion;

pub mod cache;

/// Register all semibook benchmarks.
pub fn register_benchmarks(c: &mut Criterion) {
    cache::register_benchmarks(c);
    tick_math::register_benchmarks(c);
}
