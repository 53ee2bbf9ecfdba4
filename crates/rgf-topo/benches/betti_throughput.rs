use criterion::{criterion_group, criterion_main, Criterion};
use rgf_topo::complex::RipsComplex;
use rgf_topo::reduce::betti_numbers;

fn torus_cloud(n: usize) -> Vec<Vec<f64>> {
    (0..n)
        .map(|i| {
            let u = std::f64::consts::TAU * i as f64 / n as f64;
            let v = std::f64::consts::TAU * ((i * 7) % n) as f64 / n as f64;
            vec![
                (2.0 + v.cos()) * u.cos(),
                (2.0 + v.cos()) * u.sin(),
                v.sin(),
            ]
        })
        .collect()
}

fn bench_betti(c: &mut Criterion) {
    let points = torus_cloud(128);
    c.bench_function("betti_rips_128", |b| {
        b.iter(|| {
            let complex = RipsComplex::build(&points, 0.8).unwrap();
            let _ = betti_numbers(&complex);
        });
    });
}

criterion_group!(benches, bench_betti);
criterion_main!(benches);
