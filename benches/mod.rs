use criterion::{criterion_group, criterion_main};

mod semibook;

use semibook::register_benchmarks as register_semibook_benchmarks;

criterion_group!(benches, register_semibook_benchmarks);

criterion_main!(benches);
