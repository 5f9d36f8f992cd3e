// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use spindex_core::heap::MinMaxHeap;

fn bounded_candidate_buffer(c: &mut Criterion) {
    let mut group = c.benchmark_group("min_max_heap_bounded_buffer");
    for k in [4usize, 16, 64, 256].iter() {
        group.bench_with_input(BenchmarkId::new("k", k), k, |b, &k| {
            b.iter(|| {
                let mut h = MinMaxHeap::new(|a: &f64, b: &f64| a < b);
                for i in 0..(k * 8) {
                    let v = ((i * 2654435761) % 100_000) as f64;
                    h.push(black_box(v));
                    if h.len() > k {
                        h.pop_max();
                    }
                }
                h.len()
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bounded_candidate_buffer);
criterion_main!(benches);
