use anyhow::{bail, Result};
use faer::Mat;
use rand::Rng;
use rand_distr::{Distribution, Uniform};

/// Generate the starting position of a single particle.
pub trait InitParticles {
    fn init_particle<R: Rng + ?Sized>(&mut self, rng: &mut R, position: &mut [f64]) -> Result<()>;
}

/// Uniform jitter of half-width `scale` around an optional centre.
#[derive(Debug, Clone)]
pub struct JitterInit {
    center: Option<Box<[f64]>>,
    scale: f64,
}

impl JitterInit {
    pub fn new(scale: f64) -> Self {
        Self {
            center: None,
            scale,
        }
    }

    pub fn around(center: &[f64], scale: f64) -> Self {
        Self {
            center: Some(center.into()),
            scale,
        }
    }
}

impl Default for JitterInit {
    fn default() -> Self {
        Self::new(2.)
    }
}

impl InitParticles for JitterInit {
    fn init_particle<R: Rng + ?Sized>(&mut self, rng: &mut R, position: &mut [f64]) -> Result<()> {
        if !(self.scale.is_finite() && self.scale > 0.) {
            bail!("Jitter scale must be positive, got {}", self.scale);
        }
        let dist = Uniform::new(-self.scale, self.scale)?;
        match &self.center {
            Some(center) => {
                if center.len() != position.len() {
                    bail!(
                        "Centre has dimension {}, particles have dimension {}",
                        center.len(),
                        position.len()
                    );
                }
                position
                    .iter_mut()
                    .zip(center.iter())
                    .for_each(|(x, c)| *x = c + dist.sample(&mut *rng));
            }
            None => position.iter_mut().for_each(|x| *x = dist.sample(&mut *rng)),
        }
        Ok(())
    }
}

/// Draw `n` particles of dimension `dim`, one per row.
pub fn init_particles<I: InitParticles, R: Rng + ?Sized>(
    init: &mut I,
    rng: &mut R,
    n: usize,
    dim: usize,
) -> Result<Mat<f64>> {
    let mut position = vec![0f64; dim];
    let mut out = Mat::zeros(n, dim);
    for i in 0..n {
        init.init_particle(rng, &mut position)?;
        for (k, &x) in position.iter().enumerate() {
            out[(i, k)] = x;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn jitter_stays_in_range() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut init = JitterInit::around(&[10., -10.], 0.5);
        let x = init_particles(&mut init, &mut rng, 50, 2).unwrap();
        for i in 0..50 {
            assert!((x[(i, 0)] - 10.).abs() <= 0.5);
            assert!((x[(i, 1)] + 10.).abs() <= 0.5);
        }
    }

    #[test]
    fn seeded_init_is_reproducible() {
        let draw = || {
            let mut rng = ChaCha8Rng::seed_from_u64(7);
            init_particles(&mut JitterInit::default(), &mut rng, 5, 3).unwrap()
        };
        assert_eq!(draw(), draw());
    }

    #[test]
    fn bad_settings_fail() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(init_particles(&mut JitterInit::new(0.), &mut rng, 2, 1).is_err());
        assert!(init_particles(&mut JitterInit::around(&[0.], 1.), &mut rng, 2, 3).is_err());
    }
}
