use std::sync::atomic::{AtomicBool, Ordering};

use faer::{Mat, MatRef};

use crate::{
    distance::row_major,
    error::{Quantity, Result, SvgdError},
    gradient::GradientProvider,
    kernel::Kernel,
    math::all_finite,
    optimizer::{abs_diff_sum, Optimizer},
};

/// Stein variational gradient descent on a fixed set of particles.
///
/// Particles are the rows of an `n × d` matrix. Every iteration computes
///
/// ```text
/// direction = -(K · ∇log p(X) + ∇K) / n
/// ```
///
/// and hands it to the optimizer. The SVGD direction itself is an ascent
/// direction; the sign flip lets a minimizing optimizer take the ascent step.
/// The diagonal of `K` is kept, so each particle's own score enters its
/// update with weight one.
///
/// The optimizer state survives between calls to [`Svgd::update`] and is
/// only replaced once a call has finished without error.
pub struct Svgd<K: Kernel, G: GradientProvider, O: Optimizer> {
    kernel: K,
    provider: G,
    optimizer: O,
    state: Option<((usize, usize), O::State)>,
}

fn check_finite(values: MatRef<'_, f64>, quantity: Quantity, iteration: u64) -> Result<()> {
    if all_finite(&row_major(values)) {
        Ok(())
    } else {
        Err(SvgdError::NonFinite {
            quantity,
            iteration: Some(iteration),
        })
    }
}

impl<K: Kernel, G: GradientProvider, O: Optimizer> Svgd<K, G, O> {
    pub fn new(kernel: K, provider: G, optimizer: O) -> Self {
        Self {
            kernel,
            provider,
            optimizer,
            state: None,
        }
    }

    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    pub fn provider(&self) -> &G {
        &self.provider
    }

    pub fn provider_mut(&mut self) -> &mut G {
        &mut self.provider
    }

    pub fn optimizer(&self) -> &O {
        &self.optimizer
    }

    /// Optimizer state left behind by the last successful update, if any.
    pub fn optimizer_state(&self) -> Option<&O::State> {
        self.state.as_ref().map(|(_, state)| state)
    }

    /// Forget the adaptive optimizer state, the next update starts fresh.
    pub fn reset_optimizer(&mut self) {
        self.state = None;
    }

    fn validate(&self, particles: MatRef<'_, f64>) -> Result<()> {
        let (n, d) = (particles.nrows(), particles.ncols());
        if n < 2 {
            return Err(SvgdError::TooFewParticles { n, min: 2 });
        }
        let dim = self.provider.dim();
        if d != dim {
            return Err(SvgdError::ShapeMismatch {
                expected: (n, dim),
                found: (n, d),
            });
        }
        Ok(())
    }

    fn direction_at(&mut self, particles: MatRef<'_, f64>, iteration: u64) -> Result<Mat<f64>> {
        let (n, d) = (particles.nrows(), particles.ncols());

        let eval = self
            .kernel
            .evaluate(particles)
            .map_err(|err| err.at_iteration(iteration))?;
        log::trace!("Iteration {iteration}: kernel bandwidth {}", eval.bandwidth);

        let score = self
            .provider
            .log_prob_gradient(particles)
            .map_err(|err| SvgdError::GradientFailure {
                iteration,
                source: Box::new(err),
            })?;
        if (score.nrows(), score.ncols()) != (n, d) {
            return Err(SvgdError::ShapeMismatch {
                expected: (n, d),
                found: (score.nrows(), score.ncols()),
            });
        }
        check_finite(score.as_ref(), Quantity::ScoreGradient, iteration)?;

        let driving = &eval.matrix * &score;
        let scale = -(n as f64).recip();
        let direction = Mat::from_fn(n, d, |i, k| {
            scale * (driving[(i, k)] + eval.gradient[(i, k)])
        });
        check_finite(direction.as_ref(), Quantity::Direction, iteration)?;
        Ok(direction)
    }

    /// The direction handed to the optimizer for the given particles.
    pub fn direction(&mut self, particles: MatRef<'_, f64>) -> Result<Mat<f64>> {
        self.validate(particles)?;
        self.direction_at(particles, 0)
    }

    /// Run exactly one iteration.
    pub fn step(&mut self, particles: Mat<f64>) -> Result<Mat<f64>> {
        self.update(particles, 1)
    }

    /// Move the particles for a fixed number of iterations.
    ///
    /// There is no convergence check, all `n_iterations` steps are taken.
    pub fn update(&mut self, particles: Mat<f64>, n_iterations: u64) -> Result<Mat<f64>> {
        self.run(particles, n_iterations, None)
    }

    /// Like [`Svgd::update`], but stop with [`SvgdError::Cancelled`] as soon as
    /// `cancel` is set. The flag is checked before every iteration.
    pub fn update_cancellable(
        &mut self,
        particles: Mat<f64>,
        n_iterations: u64,
        cancel: &AtomicBool,
    ) -> Result<Mat<f64>> {
        self.run(particles, n_iterations, Some(cancel))
    }

    fn run(
        &mut self,
        particles: Mat<f64>,
        n_iterations: u64,
        cancel: Option<&AtomicBool>,
    ) -> Result<Mat<f64>> {
        self.validate(particles.as_ref())?;
        let shape = (particles.nrows(), particles.ncols());
        log::debug!(
            "Running {n_iterations} iterations on {} particles of dimension {}",
            shape.0,
            shape.1
        );

        let previous = self.state.take();
        let initial = match &previous {
            Some((old_shape, state)) if *old_shape == shape => state.clone(),
            Some((old_shape, _)) => {
                log::warn!(
                    "Particle shape changed from {old_shape:?} to {shape:?}, resetting optimizer"
                );
                self.optimizer.init_state(shape.0, shape.1)
            }
            None => self.optimizer.init_state(shape.0, shape.1),
        };

        match self.iterate(particles, initial, n_iterations, cancel) {
            Ok((particles, state)) => {
                self.state = Some((shape, state));
                Ok(particles)
            }
            Err(err) => {
                self.state = previous;
                Err(err)
            }
        }
    }

    fn iterate(
        &mut self,
        mut particles: Mat<f64>,
        mut state: O::State,
        n_iterations: u64,
        cancel: Option<&AtomicBool>,
    ) -> Result<(Mat<f64>, O::State)> {
        for iteration in 0..n_iterations {
            if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                log::info!("Update cancelled before iteration {iteration}");
                return Err(SvgdError::Cancelled { iteration });
            }

            let direction = self.direction_at(particles.as_ref(), iteration)?;
            let previous = log::log_enabled!(log::Level::Trace).then(|| particles.clone());
            let (next, next_state) = self
                .optimizer
                .step(state, particles, direction.as_ref())?;
            check_finite(next.as_ref(), Quantity::Particles, iteration)?;
            if let Some(previous) = previous {
                log::trace!(
                    "Iteration {iteration}: total displacement {}",
                    abs_diff_sum(next.as_ref(), previous.as_ref())
                );
            }
            particles = next;
            state = next_state;
        }
        Ok((particles, state))
    }
}
