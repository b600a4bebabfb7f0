//! Target densities with analytic scores.

use thiserror::Error;

use crate::{gradient::GradientProvider, math::logaddexp};

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TargetError {
    #[error("Position has dimension {found}, expected {expected}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("Invalid target parameters: {0}")]
    InvalidParameters(String),
}

/// Isotropic normal distribution `N(mu, sigma² I)`.
#[derive(Debug, Clone)]
pub struct Normal {
    mu: Box<[f64]>,
    sigma: f64,
}

impl Normal {
    pub fn new(mu: &[f64], sigma: f64) -> Result<Self, TargetError> {
        if mu.is_empty() {
            return Err(TargetError::InvalidParameters(
                "Mean must have at least one dimension".into(),
            ));
        }
        if !(sigma.is_finite() && sigma > 0.) {
            return Err(TargetError::InvalidParameters(format!(
                "Standard deviation must be positive, got {sigma}"
            )));
        }
        Ok(Self {
            mu: mu.into(),
            sigma,
        })
    }

    pub fn mu(&self) -> &[f64] {
        &self.mu
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    fn log_density(&self, position: &[f64]) -> f64 {
        let d = self.mu.len() as f64;
        let sq: f64 = position
            .iter()
            .zip(self.mu.iter())
            .map(|(x, mu)| (x - mu) * (x - mu))
            .sum();
        -0.5 * sq / (self.sigma * self.sigma)
            - d * (self.sigma.ln() + 0.5 * (2. * std::f64::consts::PI).ln())
    }
}

fn check_dim(expected: usize, position: &[f64], grad: &[f64]) -> Result<(), TargetError> {
    for found in [position.len(), grad.len()] {
        if found != expected {
            return Err(TargetError::DimensionMismatch { expected, found });
        }
    }
    Ok(())
}

impl GradientProvider for Normal {
    type Err = TargetError;

    fn score(&mut self, position: &[f64], grad: &mut [f64]) -> Result<(), TargetError> {
        check_dim(self.dim(), position, grad)?;
        let inv_var = (self.sigma * self.sigma).recip();
        position
            .iter()
            .zip(self.mu.iter())
            .zip(grad.iter_mut())
            .for_each(|((&x, &mu), grad)| {
                *grad = (mu - x) * inv_var;
            });
        Ok(())
    }

    fn dim(&self) -> usize {
        self.mu.len()
    }
}

/// Weighted mixture of isotropic normal distributions.
#[derive(Debug, Clone)]
pub struct GaussianMixture {
    components: Vec<Normal>,
    log_weights: Vec<f64>,
    log_dens: Vec<f64>,
}

impl GaussianMixture {
    /// Weights are normalized and need not sum to one.
    pub fn new(components: Vec<Normal>, weights: &[f64]) -> Result<Self, TargetError> {
        if components.is_empty() || components.len() != weights.len() {
            return Err(TargetError::InvalidParameters(format!(
                "Need one weight per component, got {} components and {} weights",
                components.len(),
                weights.len()
            )));
        }
        let dim = components[0].dim();
        if let Some(bad) = components.iter().find(|c| c.dim() != dim) {
            return Err(TargetError::DimensionMismatch {
                expected: dim,
                found: bad.dim(),
            });
        }
        if weights.iter().any(|w| !(w.is_finite() && *w > 0.)) {
            return Err(TargetError::InvalidParameters(
                "Mixture weights must be positive".into(),
            ));
        }
        let total: f64 = weights.iter().sum();
        let log_weights = weights.iter().map(|w| (w / total).ln()).collect();
        let log_dens = vec![0f64; components.len()];
        Ok(Self {
            components,
            log_weights,
            log_dens,
        })
    }

    pub fn components(&self) -> &[Normal] {
        &self.components
    }
}

impl GradientProvider for GaussianMixture {
    type Err = TargetError;

    fn score(&mut self, position: &[f64], grad: &mut [f64]) -> Result<(), TargetError> {
        check_dim(self.dim(), position, grad)?;

        let mut log_total = f64::NEG_INFINITY;
        for ((component, log_weight), log_dens) in self
            .components
            .iter()
            .zip(self.log_weights.iter())
            .zip(self.log_dens.iter_mut())
        {
            *log_dens = log_weight + component.log_density(position);
            log_total = logaddexp(log_total, *log_dens);
        }

        // Responsibility weighted sum of the component scores
        grad.fill(0.);
        for (component, log_dens) in self.components.iter().zip(self.log_dens.iter()) {
            let resp = (log_dens - log_total).exp();
            let inv_var = (component.sigma * component.sigma).recip();
            grad.iter_mut()
                .zip(position.iter().zip(component.mu.iter()))
                .for_each(|(g, (x, mu))| *g += resp * (mu - x) * inv_var);
        }
        Ok(())
    }

    fn dim(&self) -> usize {
        self.components[0].dim()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use pretty_assertions::assert_eq;

    #[test]
    fn normal_score() {
        let mut target = Normal::new(&[1., -2.], 2.).unwrap();
        let mut grad = [0.; 2];
        target.score(&[3., 0.], &mut grad).unwrap();
        assert_eq!(grad, [-0.5, -0.5]);
    }

    #[test]
    fn normal_rejects_bad_input() {
        assert!(Normal::new(&[], 1.).is_err());
        assert!(Normal::new(&[0.], 0.).is_err());
        let mut target = Normal::new(&[0.], 1.).unwrap();
        let mut grad = [0.; 2];
        assert!(matches!(
            target.score(&[0., 1.], &mut grad),
            Err(TargetError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn mixture_score_matches_finite_differences() {
        let components = vec![
            Normal::new(&[-2., 0.], 0.7).unwrap(),
            Normal::new(&[2., 1.], 1.3).unwrap(),
        ];
        let mut target = GaussianMixture::new(components, &[1., 3.]).unwrap();
        let log_p = |target: &GaussianMixture, x: &[f64]| -> f64 {
            target
                .components
                .iter()
                .zip(&target.log_weights)
                .map(|(c, lw)| (lw + c.log_density(x)).exp())
                .sum::<f64>()
                .ln()
        };

        let position = [0.3, -0.4];
        let mut grad = [0.; 2];
        target.score(&position, &mut grad).unwrap();

        let eps = 1e-6;
        for k in 0..2 {
            let mut plus = position;
            let mut minus = position;
            plus[k] += eps;
            minus[k] -= eps;
            let numeric = (log_p(&target, &plus) - log_p(&target, &minus)) / (2. * eps);
            assert_abs_diff_eq!(grad[k], numeric, epsilon = 1e-6);
        }
    }

    #[test]
    fn single_component_mixture_is_normal() {
        let normal = Normal::new(&[0.5], 1.5).unwrap();
        let mut mixture = GaussianMixture::new(vec![normal.clone()], &[2.]).unwrap();
        let mut normal = normal;
        let (mut a, mut b) = ([0.], [0.]);
        mixture.score(&[3.], &mut a).unwrap();
        normal.score(&[3.], &mut b).unwrap();
        assert_abs_diff_eq!(a[0], b[0], epsilon = 1e-12);
    }

    #[test]
    fn mixture_rejects_mismatched_weights() {
        let components = vec![Normal::new(&[0.], 1.).unwrap()];
        assert!(GaussianMixture::new(components.clone(), &[1., 1.]).is_err());
        assert!(GaussianMixture::new(components, &[-1.]).is_err());
        assert!(GaussianMixture::new(vec![], &[]).is_err());
    }
}
