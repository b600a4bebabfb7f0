use std::fmt::Debug;

use faer::{Mat, MatRef};

/// Gradient of the log density of the target distribution.
///
/// Only the score `∇ log p(x)` is needed, the density itself and its
/// normalization constant never enter the update.
pub trait GradientProvider {
    type Err: std::error::Error + Debug + Send + Sync + 'static;

    /// Write `∇ log p(position)` into `grad`.
    fn score(&mut self, position: &[f64], grad: &mut [f64]) -> Result<(), Self::Err>;

    /// Dimension of a single particle.
    fn dim(&self) -> usize;

    /// Score of every particle, one row per particle.
    fn log_prob_gradient(&mut self, particles: MatRef<'_, f64>) -> Result<Mat<f64>, Self::Err> {
        let (n, d) = (particles.nrows(), particles.ncols());
        let mut position = vec![0f64; d];
        let mut grad = vec![0f64; d];
        let mut out = Mat::zeros(n, d);
        for i in 0..n {
            position
                .iter_mut()
                .enumerate()
                .for_each(|(k, p)| *p = particles[(i, k)]);
            self.score(&position, &mut grad)?;
            grad.iter()
                .enumerate()
                .for_each(|(k, &g)| out[(i, k)] = g);
        }
        Ok(out)
    }
}

impl<G: GradientProvider + ?Sized> GradientProvider for &mut G {
    type Err = G::Err;

    fn score(&mut self, position: &[f64], grad: &mut [f64]) -> Result<(), Self::Err> {
        (**self).score(position, grad)
    }

    fn dim(&self) -> usize {
        (**self).dim()
    }
}
