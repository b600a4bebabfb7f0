//! First order optimizers that turn an update direction into new positions.
//!
//! Optimizers do not hide mutable state inside themselves. Each call to
//! [`Optimizer::step`] takes the previous state by value and hands back the
//! new one next to the updated parameters, so independent runs can never
//! share moment estimates by accident and tests can inspect them directly.

use std::fmt::Debug;

use faer::{Mat, MatRef};

use crate::error::{Result, SvgdError};

pub trait Optimizer {
    /// Adaptive state carried from one step to the next.
    type State: Clone + Debug + Send;

    /// Fresh, zeroed state for parameters of the given shape.
    fn init_state(&self, nrows: usize, ncols: usize) -> Self::State;

    /// Take one descent step along `direction`.
    fn step(
        &self,
        state: Self::State,
        params: Mat<f64>,
        direction: MatRef<'_, f64>,
    ) -> Result<(Mat<f64>, Self::State)>;
}

fn check_shape(params: &Mat<f64>, direction: MatRef<'_, f64>) -> Result<()> {
    let expected = (params.nrows(), params.ncols());
    let found = (direction.nrows(), direction.ncols());
    if expected != found {
        return Err(SvgdError::ShapeMismatch { expected, found });
    }
    Ok(())
}

/// Settings for the Adam optimizer
#[derive(Debug, Clone, Copy)]
pub struct AdamOptions {
    /// Learning rate (default: 0.001)
    pub learning_rate: f64,
    /// First moment decay rate (default: 0.9)
    pub beta1: f64,
    /// Second moment decay rate (default: 0.999)
    pub beta2: f64,
    /// Small constant for numerical stability (default: 1e-7)
    pub epsilon: f64,
}

impl Default for AdamOptions {
    fn default() -> Self {
        Self {
            learning_rate: 0.001,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-7,
        }
    }
}

impl AdamOptions {
    pub fn validate(&self) -> Result<()> {
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.) {
            return Err(SvgdError::InvalidSettings(format!(
                "Learning rate must be positive, got {}",
                self.learning_rate
            )));
        }
        for (name, beta) in [("beta1", self.beta1), ("beta2", self.beta2)] {
            if !(0. ..1.).contains(&beta) {
                return Err(SvgdError::InvalidSettings(format!(
                    "{name} must be in [0, 1), got {beta}"
                )));
            }
        }
        if !(self.epsilon.is_finite() && self.epsilon >= 0.) {
            return Err(SvgdError::InvalidSettings(format!(
                "epsilon must be non-negative, got {}",
                self.epsilon
            )));
        }
        Ok(())
    }
}

/// Moment estimates of the Adam optimizer.
#[derive(Debug, Clone, PartialEq)]
pub struct AdamState {
    /// First moment estimate
    pub m: Mat<f64>,
    /// Second moment estimate
    pub v: Mat<f64>,
    /// Number of steps taken
    pub t: u64,
}

/// Adam with per-coordinate moment estimates.
#[derive(Debug, Clone, Copy)]
pub struct Adam {
    settings: AdamOptions,
}

impl Adam {
    pub fn new(settings: AdamOptions) -> Result<Self> {
        settings.validate()?;
        Ok(Self { settings })
    }

    pub fn with_learning_rate(learning_rate: f64) -> Result<Self> {
        Self::new(AdamOptions {
            learning_rate,
            ..Default::default()
        })
    }

    pub fn settings(&self) -> &AdamOptions {
        &self.settings
    }
}

impl Optimizer for Adam {
    type State = AdamState;

    fn init_state(&self, nrows: usize, ncols: usize) -> AdamState {
        AdamState {
            m: Mat::zeros(nrows, ncols),
            v: Mat::zeros(nrows, ncols),
            t: 0,
        }
    }

    fn step(
        &self,
        mut state: AdamState,
        mut params: Mat<f64>,
        direction: MatRef<'_, f64>,
    ) -> Result<(Mat<f64>, AdamState)> {
        check_shape(&params, direction)?;
        check_shape(&state.m, direction)?;

        let AdamOptions {
            learning_rate,
            beta1,
            beta2,
            epsilon,
        } = self.settings;

        state.t += 1;
        let t = i32::try_from(state.t).unwrap_or(i32::MAX);
        let m_correction = (1.0 - beta1.powi(t)).recip();
        let v_correction = (1.0 - beta2.powi(t)).recip();

        for k in 0..params.ncols() {
            for i in 0..params.nrows() {
                let gradient = direction[(i, k)];

                // Update biased moment estimates
                let m = beta1 * state.m[(i, k)] + (1.0 - beta1) * gradient;
                let v = beta2 * state.v[(i, k)] + (1.0 - beta2) * gradient * gradient;
                state.m[(i, k)] = m;
                state.v[(i, k)] = v;

                let m_hat = m * m_correction;
                let v_hat = v * v_correction;
                params[(i, k)] -= learning_rate * m_hat / (v_hat.sqrt() + epsilon);
            }
        }

        Ok((params, state))
    }
}

/// Plain gradient descent, `params -= learning_rate * direction`.
#[derive(Debug, Clone, Copy)]
pub struct Sgd {
    learning_rate: f64,
}

impl Sgd {
    pub fn new(learning_rate: f64) -> Result<Self> {
        if !(learning_rate.is_finite() && learning_rate > 0.) {
            return Err(SvgdError::InvalidSettings(format!(
                "Learning rate must be positive, got {learning_rate}"
            )));
        }
        Ok(Self { learning_rate })
    }
}

impl Optimizer for Sgd {
    type State = ();

    fn init_state(&self, _nrows: usize, _ncols: usize) {}

    fn step(
        &self,
        state: (),
        mut params: Mat<f64>,
        direction: MatRef<'_, f64>,
    ) -> Result<(Mat<f64>, ())> {
        check_shape(&params, direction)?;
        for k in 0..params.ncols() {
            for i in 0..params.nrows() {
                params[(i, k)] -= self.learning_rate * direction[(i, k)];
            }
        }
        Ok((params, state))
    }
}

/// Sum of `|a - b|` over all entries, used to compare parameter matrices.
pub(crate) fn abs_diff_sum(a: MatRef<'_, f64>, b: MatRef<'_, f64>) -> f64 {
    let mut total = 0.;
    for k in 0..a.ncols() {
        for i in 0..a.nrows() {
            total += (a[(i, k)] - b[(i, k)]).abs();
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use pretty_assertions::assert_eq;

    #[test]
    fn fresh_state_is_zeroed() {
        let adam = Adam::new(AdamOptions::default()).unwrap();
        let state = adam.init_state(3, 2);
        assert_eq!(state.t, 0);
        assert_eq!(state.m, Mat::<f64>::zeros(3, 2));
        assert_eq!(state.v, Mat::<f64>::zeros(3, 2));
    }

    #[test]
    fn first_adam_step_moves_by_learning_rate() {
        let adam = Adam::with_learning_rate(0.1).unwrap();
        let params = Mat::from_fn(2, 2, |i, k| (i + k) as f64);
        let direction = Mat::from_fn(2, 2, |i, k| if (i + k) % 2 == 0 { 3. } else { -0.5 });
        let state = adam.init_state(2, 2);

        let (updated, state) = adam
            .step(state, params.clone(), direction.as_ref())
            .unwrap();
        assert_eq!(state.t, 1);
        for i in 0..2 {
            for k in 0..2 {
                let expected = params[(i, k)] - 0.1 * direction[(i, k)].signum();
                assert_abs_diff_eq!(updated[(i, k)], expected, epsilon = 1e-6);
                assert_abs_diff_eq!(state.m[(i, k)], 0.1 * direction[(i, k)], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn independent_states_do_not_interfere() {
        let adam = Adam::with_learning_rate(0.01).unwrap();
        let params = Mat::from_fn(2, 1, |i, _| i as f64);
        let direction = Mat::from_fn(2, 1, |_, _| 1.);

        let (a1, s1) = adam
            .step(adam.init_state(2, 1), params.clone(), direction.as_ref())
            .unwrap();
        let (_, s2) = adam.step(s1, a1, direction.as_ref()).unwrap();
        let (b1, fresh) = adam
            .step(adam.init_state(2, 1), params.clone(), direction.as_ref())
            .unwrap();

        assert_eq!(s2.t, 2);
        assert_eq!(fresh.t, 1);
        assert!(abs_diff_sum(b1.as_ref(), params.as_ref()) > 0.);
    }

    #[test]
    fn sgd_step() {
        let sgd = Sgd::new(0.5).unwrap();
        let params = Mat::from_fn(2, 1, |i, _| i as f64);
        let direction = Mat::from_fn(2, 1, |_, _| 2.);
        let (updated, ()) = sgd.step((), params, direction.as_ref()).unwrap();
        assert_eq!(updated[(0, 0)], -1.);
        assert_eq!(updated[(1, 0)], 0.);
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        let sgd = Sgd::new(0.5).unwrap();
        let params = Mat::<f64>::zeros(2, 1);
        let direction = Mat::<f64>::zeros(3, 1);
        let err = sgd.step((), params, direction.as_ref()).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn invalid_settings() {
        assert!(Adam::with_learning_rate(0.).is_err());
        assert!(Adam::new(AdamOptions {
            beta1: 1.,
            ..Default::default()
        })
        .is_err());
        assert!(Sgd::new(-1.).is_err());
    }
}
