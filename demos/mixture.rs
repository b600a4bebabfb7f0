//! Fit particles to a two component mixture and print a coarse histogram.

use anyhow::Result;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use svgd_rs::{
    init_particles, new_svgd,
    targets::{GaussianMixture, Normal},
    AdamOptions, JitterInit, SvgdSettings,
};

fn main() -> Result<()> {
    let target = GaussianMixture::new(
        vec![Normal::new(&[-2.], 0.5)?, Normal::new(&[2.], 1.)?],
        &[1., 2.],
    )?;
    let settings = SvgdSettings {
        adam: AdamOptions {
            learning_rate: 0.05,
            ..Default::default()
        },
        ..Default::default()
    };
    let mut svgd = new_svgd(settings, target)?;

    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let mut particles = init_particles(&mut JitterInit::new(4.), &mut rng, 100, 1)?;

    for round in 1..=5 {
        particles = svgd.update(particles, 200)?;
        println!("after {} iterations:", round * 200);

        let mut bins = [0usize; 16];
        for i in 0..particles.nrows() {
            let bin = ((particles[(i, 0)] + 4.) * 2.).floor();
            if (0. ..16.).contains(&bin) {
                bins[bin as usize] += 1;
            }
        }
        for (b, count) in bins.iter().enumerate() {
            let lo = b as f64 / 2. - 4.;
            println!("{lo:>5.1} | {}", "#".repeat(*count));
        }
    }
    Ok(())
}
