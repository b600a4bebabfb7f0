//! Pairwise squared distances between particles.
//!
//! Particles are the rows of an `n × d` matrix. Entry `(i, j)` of the result
//! is `|x_i - x_j|²`. Only the first operand is treated as variable: the
//! kernel gradient built on top of these distances differentiates entry
//! `(i, j)` with respect to `x_i` while `x_j` is held fixed, so motion of
//! particle `j` is never counted in the gradient of particle `i`.

use faer::{Mat, MatRef};
use rayon::prelude::*;

use crate::{
    error::{Quantity, Result, SvgdError},
    math::{all_finite, sq_dist},
};

/// Copy the particle matrix into a row-major buffer, one particle per chunk.
pub(crate) fn row_major(particles: MatRef<'_, f64>) -> Vec<f64> {
    let (n, d) = (particles.nrows(), particles.ncols());
    let mut out = Vec::with_capacity(n * d);
    for i in 0..n {
        for k in 0..d {
            out.push(particles[(i, k)]);
        }
    }
    out
}

/// Compute the `n × n` matrix of squared euclidean distances between rows.
pub fn squared_distances(particles: MatRef<'_, f64>) -> Result<Mat<f64>> {
    let n = particles.nrows();
    if n < 1 {
        return Err(SvgdError::TooFewParticles { n, min: 1 });
    }
    let d = particles.ncols();
    let points = row_major(particles);
    if !all_finite(&points) {
        return Err(SvgdError::NonFinite {
            quantity: Quantity::Particles,
            iteration: None,
        });
    }

    let rows: Vec<Vec<f64>> = (0..n)
        .into_par_iter()
        .map(|i| {
            let xi = &points[i * d..(i + 1) * d];
            (0..n)
                .map(|j| {
                    if i == j {
                        0.
                    } else {
                        sq_dist(xi, &points[j * d..(j + 1) * d])
                    }
                })
                .collect()
        })
        .collect();

    if !rows.iter().all(|row| all_finite(row)) {
        return Err(SvgdError::NonFinite {
            quantity: Quantity::Distance,
            iteration: None,
        });
    }

    Ok(Mat::from_fn(n, n, |i, j| rows[i][j]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn three_points_on_a_line() {
        let x = Mat::from_fn(3, 1, |i, _| [0., 1., 3.][i]);
        let dist = squared_distances(x.as_ref()).unwrap();
        let expected = [[0., 1., 9.], [1., 0., 4.], [9., 4., 0.]];
        for i in 0..3 {
            for j in 0..3 {
                assert_eq!(dist[(i, j)], expected[i][j]);
            }
        }
    }

    #[test]
    fn two_dimensional_points() {
        let coords = [[0., 0.], [3., 4.]];
        let x = Mat::from_fn(2, 2, |i, k| coords[i][k]);
        let dist = squared_distances(x.as_ref()).unwrap();
        assert_eq!(dist[(0, 1)], 25.);
        assert_eq!(dist[(1, 0)], 25.);
        assert_eq!(dist[(0, 0)], 0.);
    }

    #[test]
    fn single_particle_is_allowed() {
        let x = Mat::from_fn(1, 3, |_, k| k as f64);
        let dist = squared_distances(x.as_ref()).unwrap();
        assert_eq!((dist.nrows(), dist.ncols()), (1, 1));
        assert_eq!(dist[(0, 0)], 0.);
    }

    #[test]
    fn empty_particle_set_fails() {
        let x = Mat::<f64>::zeros(0, 2);
        let err = squared_distances(x.as_ref()).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn non_finite_particles_fail() {
        let x = Mat::from_fn(2, 1, |i, _| if i == 0 { f64::NAN } else { 1. });
        let err = squared_distances(x.as_ref()).unwrap_err();
        assert!(matches!(
            err,
            SvgdError::NonFinite {
                quantity: Quantity::Particles,
                ..
            }
        ));
    }

    proptest! {
        #[test]
        fn symmetric_and_non_negative(
            values in prop::collection::vec(-50f64..50f64, 2..40),
        ) {
            let d = 2;
            let n = values.len() / d;
            prop_assume!(n >= 1);
            let x = Mat::from_fn(n, d, |i, k| values[i * d + k]);
            let dist = squared_distances(x.as_ref()).unwrap();
            for i in 0..n {
                prop_assert_eq!(dist[(i, i)], 0.);
                for j in 0..n {
                    prop_assert!(dist[(i, j)] >= 0.);
                    prop_assert_eq!(dist[(i, j)], dist[(j, i)]);
                }
            }
        }
    }
}
