use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use svgd_rs::{
    init_particles, new_svgd, targets::Normal, JitterInit, Kernel, RbfKernel, SvgdSettings,
};

fn make_particles(n: usize, dim: usize) -> faer::Mat<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    init_particles(&mut JitterInit::default(), &mut rng, n, dim).unwrap()
}

fn criterion_benchmark(c: &mut Criterion) {
    let kernel = RbfKernel::default();
    for (n, dim) in [(100, 2), (500, 10)] {
        let particles = make_particles(n, dim);
        c.bench_function(&format!("rbf kernel {n}x{dim}"), |b| {
            b.iter(|| kernel.evaluate(black_box(particles.as_ref())).unwrap())
        });
    }

    for (n, dim) in [(100, 2), (200, 10)] {
        let particles = make_particles(n, dim);
        let mut svgd =
            new_svgd(SvgdSettings::default(), Normal::new(&vec![1.; dim], 1.).unwrap()).unwrap();
        c.bench_function(&format!("update 10 iterations {n}x{dim}"), |b| {
            b.iter_batched(
                || particles.clone(),
                |particles| {
                    svgd.reset_optimizer();
                    svgd.update(particles, 10).unwrap()
                },
                BatchSize::SmallInput,
            )
        });
    }
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
