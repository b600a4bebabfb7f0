//! Radial basis function kernel with an adaptive bandwidth.
//!
//! For particles `x_1, …, x_n` the kernel matrix is
//!
//! ```text
//! K[i][j] = exp(-D[i][j] / (2 h²)),    D[i][j] = |x_i - x_j|²
//! ```
//!
//! where the bandwidth `h` is chosen per evaluation by the median heuristic
//! `h = median(D) / ln(n + 1)`. The median is taken over all `n²` entries
//! of `D` (zero diagonal included) with midpoint interpolation. Within one
//! evaluation `h` is a constant; it does not contribute to any gradient.
//!
//! The kernel gradient is the repulsive term of the Stein update:
//!
//! ```text
//! G[i] = Σ_j K[i][j] (x_i - x_j) / h²
//! ```
//!
//! which is the negated derivative of the row sum `Σ_j K[i][j]` with respect
//! to `x_i`, holding every `x_j` fixed.
//!
//! Kernel values lie in `(0, 1]` mathematically. In `f64` an entry underflows
//! to exactly `0` once `D[i][j] / (2 h²)` exceeds roughly 745, so far apart
//! pairs may report `0`; the diagonal is always exactly `1`.

use faer::{Mat, MatRef};
use itertools::izip;

use crate::{
    distance::{row_major, squared_distances},
    error::{Quantity, Result, SvgdError},
    math::{all_finite, axpy, median_midpoint},
};

/// How the kernel bandwidth is chosen for each evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum BandwidthRule {
    /// `median(D) / ln(n + 1)` of the current particles.
    #[default]
    Median,
    /// A fixed, user supplied bandwidth.
    Fixed(f64),
}

impl BandwidthRule {
    pub(crate) fn validate(&self) -> Result<()> {
        match *self {
            BandwidthRule::Median => Ok(()),
            BandwidthRule::Fixed(h) if h.is_finite() && h > 0. => Ok(()),
            BandwidthRule::Fixed(h) => Err(SvgdError::InvalidSettings(format!(
                "Fixed bandwidth must be positive and finite, got {h}"
            ))),
        }
    }
}

/// Everything the engine needs from one kernel evaluation.
#[derive(Debug, Clone)]
pub struct KernelEval {
    /// `n × n` kernel matrix, entries in `[0, 1]` after underflow
    pub matrix: Mat<f64>,
    /// `n × d` repulsive gradient
    pub gradient: Mat<f64>,
    pub bandwidth: f64,
}

/// A positive definite kernel on particle positions.
pub trait Kernel {
    /// Kernel matrix and repulsive gradient for the current particles.
    fn evaluate(&self, particles: MatRef<'_, f64>) -> Result<KernelEval>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RbfKernel {
    rule: BandwidthRule,
}

impl RbfKernel {
    pub fn new(rule: BandwidthRule) -> Result<Self> {
        rule.validate()?;
        Ok(Self { rule })
    }

    pub fn rule(&self) -> BandwidthRule {
        self.rule
    }

    /// Bandwidth for a matrix of squared distances.
    ///
    /// Fails if there are fewer than two particles, or if the median distance
    /// is zero, as both would lead to a vanishing bandwidth.
    pub fn bandwidth(&self, distances: MatRef<'_, f64>) -> Result<f64> {
        let n = distances.nrows();
        if n < 2 {
            return Err(SvgdError::TooFewParticles { n, min: 2 });
        }
        if distances.ncols() != n {
            return Err(SvgdError::ShapeMismatch {
                expected: (n, n),
                found: (n, distances.ncols()),
            });
        }
        if let BandwidthRule::Fixed(h) = self.rule {
            return Ok(h);
        }

        let mut entries = row_major(distances);
        let median = median_midpoint(&mut entries).ok_or(SvgdError::NonFinite {
            quantity: Quantity::Distance,
            iteration: None,
        })?;
        if !median.is_finite() {
            return Err(SvgdError::NonFinite {
                quantity: Quantity::Bandwidth,
                iteration: None,
            });
        }
        if median <= 0. {
            return Err(SvgdError::DegenerateBandwidth { median });
        }

        let h = median / ((n + 1) as f64).ln();
        if !h.is_finite() {
            return Err(SvgdError::NonFinite {
                quantity: Quantity::Bandwidth,
                iteration: None,
            });
        }
        Ok(h)
    }

    /// `exp(-D / (2 h²))` for a given distance matrix and bandwidth.
    fn matrix_from_distances(distances: MatRef<'_, f64>, bandwidth: f64) -> Result<Mat<f64>> {
        let n = distances.nrows();
        let scale = -0.5 / (bandwidth * bandwidth);
        let matrix = Mat::from_fn(n, n, |i, j| (distances[(i, j)] * scale).exp());
        if !all_finite(&row_major(matrix.as_ref())) {
            return Err(SvgdError::NonFinite {
                quantity: Quantity::Kernel,
                iteration: None,
            });
        }
        Ok(matrix)
    }

    fn gradient_from_matrix(
        particles: MatRef<'_, f64>,
        matrix: MatRef<'_, f64>,
        bandwidth: f64,
    ) -> Result<Mat<f64>> {
        let (n, d) = (particles.nrows(), particles.ncols());
        let points = row_major(particles);
        let inv_h2 = (bandwidth * bandwidth).recip();

        let mut grad = vec![0f64; n * d];
        let mut diff = vec![0f64; d];
        for (i, grad_i) in grad.chunks_exact_mut(d).enumerate() {
            let xi = &points[i * d..(i + 1) * d];
            for (j, xj) in points.chunks_exact(d).enumerate() {
                if i == j {
                    continue;
                }
                izip!(diff.iter_mut(), xi, xj).for_each(|(out, a, b)| *out = a - b);
                axpy(&diff, grad_i, matrix[(i, j)] * inv_h2);
            }
        }

        if !all_finite(&grad) {
            return Err(SvgdError::NonFinite {
                quantity: Quantity::KernelGradient,
                iteration: None,
            });
        }
        Ok(Mat::from_fn(n, d, |i, k| grad[i * d + k]))
    }

    pub fn kernel_matrix(&self, particles: MatRef<'_, f64>) -> Result<Mat<f64>> {
        let distances = squared_distances(particles)?;
        let bandwidth = self.bandwidth(distances.as_ref())?;
        Self::matrix_from_distances(distances.as_ref(), bandwidth)
    }

    /// Repulsive gradient `Σ_j K[i][j] (x_i - x_j) / h²` for every particle.
    pub fn kernel_gradient(&self, particles: MatRef<'_, f64>) -> Result<Mat<f64>> {
        Ok(self.evaluate(particles)?.gradient)
    }
}

impl Kernel for RbfKernel {
    fn evaluate(&self, particles: MatRef<'_, f64>) -> Result<KernelEval> {
        let distances = squared_distances(particles)?;
        let bandwidth = self.bandwidth(distances.as_ref())?;
        let matrix = Self::matrix_from_distances(distances.as_ref(), bandwidth)?;
        let gradient = Self::gradient_from_matrix(particles, matrix.as_ref(), bandwidth)?;
        Ok(KernelEval {
            matrix,
            gradient,
            bandwidth,
        })
    }
}
