// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use spindex::distance::l2;
use spindex::{CoverTree, CoverTreeBuilder};

fn build_tree(n: usize) -> CoverTree<usize, fn(&[f64], &[f64]) -> f64> {
    let mut rng = SmallRng::seed_from_u64(7);
    let mut t: CoverTree<usize, fn(&[f64], &[f64]) -> f64> = CoverTreeBuilder::new().dims(8).dist(l2 as fn(&[f64], &[f64]) -> f64).build();
    for i in 0..n {
        let point: Vec<f64> = (0..8).map(|_| rng.gen_range(-1000.0..1000.0)).collect();
        t.insert(&point, i).unwrap();
    }
    t
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let t = build_tree(5_000);
    let mut rng = SmallRng::seed_from_u64(11);

    c.bench_function("cover tree 1nn", |b| {
        b.iter(|| {
            let centre: Vec<f64> = (0..8).map(|_| rng.gen_range(-1000.0..1000.0)).collect();
            t.query_1nn(black_box(&centre)).unwrap()
        })
    });

    c.bench_function("cover tree knn k=10", |b| {
        b.iter(|| {
            let centre: Vec<f64> = (0..8).map(|_| rng.gen_range(-1000.0..1000.0)).collect();
            t.query_knn(black_box(&centre), 10).unwrap().count()
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
