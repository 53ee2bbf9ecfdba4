use criterion::{criterion_group, criterion_main, Criterion};
use rgf_core::budget::Budget;
use rgf_mc::domain::{AxisRange, Domain};
use rgf_mc::integrand::MetricGaussian;
use rgf_mc::sampler::{estimate, SamplerOpts, SamplingPolicy};

fn bench_policies(c: &mut Criterion) {
    let gaussian = MetricGaussian::new(vec![1.0, 2.0]).unwrap();
    let domain = Domain::new(
        vec![
            AxisRange {
                name: "x".to_string(),
                lo: -3.0,
                hi: 3.0,
            },
            AxisRange {
                name: "y".to_string(),
                lo: -3.0,
                hi: 3.0,
            },
        ],
        128,
    )
    .unwrap();
    let budget = Budget::iterations(usize::MAX);

    for policy in [
        SamplingPolicy::Plain,
        SamplingPolicy::Importance,
        SamplingPolicy::Mcmc,
    ] {
        let opts = SamplerOpts {
            policy,
            samples: 4_096,
            ..SamplerOpts::default()
        };
        c.bench_function(&format!("estimate_4k_{}", policy.as_str()), |b| {
            b.iter(|| {
                let _ = estimate(&gaussian, &domain, &opts, 42, &budget).unwrap();
            });
        });
    }
}

criterion_group!(benches, bench_policies);
criterion_main!(benches);
