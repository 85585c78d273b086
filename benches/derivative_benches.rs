use SymDiffGraph::symbolic::derivative_wrapper::Derivative;
use criterion::{Criterion, criterion_group, criterion_main};
use nalgebra::DVector;
use rand::Rng;
use std::hint::black_box;

const N: usize = 100;

fn product_chain(n: usize) -> Derivative {
    let mut p = Derivative::Constant(1.0);
    for i in 0..n {
        p = p * Derivative::Variable(i);
    }
    p
}

fn random_point(n: usize) -> DVector<f64> {
    let mut rng = rand::rng();
    DVector::from_fn(n, |_, _| rng.random_range(0.5..1.5))
}

fn bench_build_and_differentiate(c: &mut Criterion) {
    // a fresh graph every time, otherwise the memo caches answer immediately
    c.bench_function("product of 100 variables, d/dx0", |b| {
        b.iter(|| {
            let p = product_chain(black_box(N));
            p.diff_partial(0)
        })
    });
}

fn bench_evaluate_partial(c: &mut Criterion) {
    let p = product_chain(N);
    let dp = p.diff_partial(0);
    let x = random_point(N);
    c.bench_function("evaluate d/dx0 of the product", |b| {
        b.iter(|| dp.call(black_box(&x)))
    });
}

fn bench_all_first_partials(c: &mut Criterion) {
    c.bench_function("gradient of the product", |b| {
        b.iter(|| {
            let p = product_chain(N);
            (0..N).map(|i| p.diff_partial(i)).count()
        })
    });
}

criterion_group!(
    benches,
    bench_build_and_differentiate,
    bench_evaluate_partial,
    bench_all_first_partials
);
criterion_main!(benches);
