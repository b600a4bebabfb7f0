use itertools::izip;
use multiversion::multiversion;

#[inline]
pub(crate) fn logaddexp(a: f64, b: f64) -> f64 {
    if a == b {
        return a + 2f64.ln();
    }
    let diff = a - b;
    if diff > 0. {
        a + (-diff).exp().ln_1p()
    } else if diff < 0. {
        b + diff.exp().ln_1p()
    } else {
        // diff is NAN
        diff
    }
}

/// Squared euclidean distance between two points of equal dimension.
#[multiversion(targets("x86_64+avx+avx2+fma", "x86_64+sse4.1"))]
pub(crate) fn sq_dist(x: &[f64], y: &[f64]) -> f64 {
    assert!(x.len() == y.len());

    let (head_x, tail_x) = x.split_at(x.len() - x.len() % 4);
    let (head_y, tail_y) = y.split_at(head_x.len());

    let mut acc = [0f64; 4];
    head_x
        .chunks_exact(4)
        .zip(head_y.chunks_exact(4))
        .for_each(|(a, b)| {
            for k in 0..4 {
                let d = a[k] - b[k];
                acc[k] += d * d;
            }
        });

    let tail: f64 = tail_x
        .iter()
        .zip(tail_y)
        .map(|(a, b)| (a - b) * (a - b))
        .sum();

    acc.iter().sum::<f64>() + tail
}

/// `y += a * x`
#[multiversion(targets("x86_64+avx+avx2+fma", "x86_64+sse4.1"))]
pub(crate) fn axpy(x: &[f64], y: &mut [f64], a: f64) {
    assert!(x.len() == y.len());
    izip!(x, y).for_each(|(x, y)| {
        *y = x.mul_add(a, *y);
    });
}

pub(crate) fn all_finite(values: &[f64]) -> bool {
    let arch = pulp::Arch::new();
    arch.dispatch(|| values.iter().all(|x| x.is_finite()))
}

/// Median with midpoint interpolation for an even number of values.
///
/// Returns `None` for empty input or if any value is NaN. The input is
/// reordered.
pub(crate) fn median_midpoint(values: &mut [f64]) -> Option<f64> {
    let n = values.len();
    if n == 0 || values.iter().any(|x| x.is_nan()) {
        return None;
    }
    let mid = n / 2;
    let (lower, upper, _) = values.select_nth_unstable_by(mid, f64::total_cmp);
    let upper = *upper;
    if n % 2 == 1 {
        return Some(upper);
    }
    let lower = lower
        .iter()
        .copied()
        .max_by(f64::total_cmp)
        .unwrap_or(upper);
    Some(0.5 * (lower + upper))
}
