use std::fmt;

use thiserror::Error;

/// Derived quantities that are checked for finiteness during an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    Particles,
    Distance,
    Bandwidth,
    Kernel,
    KernelGradient,
    ScoreGradient,
    Direction,
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Quantity::Particles => "particle position",
            Quantity::Distance => "pairwise distance",
            Quantity::Bandwidth => "kernel bandwidth",
            Quantity::Kernel => "kernel value",
            Quantity::KernelGradient => "kernel gradient",
            Quantity::ScoreGradient => "score gradient",
            Quantity::Direction => "update direction",
        };
        f.write_str(name)
    }
}

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SvgdError {
    #[error("At least {min} particles are required, got {n}")]
    TooFewParticles { n: usize, min: usize },
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),
    #[error("Shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },
    #[error("Non-finite {quantity}{}", iteration_suffix(.iteration))]
    NonFinite {
        quantity: Quantity,
        iteration: Option<u64>,
    },
    #[error("Median pairwise distance is {median}, kernel bandwidth would vanish")]
    DegenerateBandwidth { median: f64 },
    #[error("Gradient of the log density could not be evaluated in iteration {iteration}")]
    GradientFailure {
        iteration: u64,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("Update cancelled before iteration {iteration}")]
    Cancelled { iteration: u64 },
}

impl SvgdError {
    /// The inputs or settings are unusable, independent of the numerics.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SvgdError::TooFewParticles { .. }
                | SvgdError::InvalidSettings(_)
                | SvgdError::ShapeMismatch { .. }
        )
    }

    /// Some computed quantity was not finite (or the bandwidth collapsed).
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            SvgdError::NonFinite { .. } | SvgdError::DegenerateBandwidth { .. }
        )
    }

    pub(crate) fn at_iteration(self, iteration: u64) -> Self {
        match self {
            SvgdError::NonFinite {
                quantity,
                iteration: None,
            } => SvgdError::NonFinite {
                quantity,
                iteration: Some(iteration),
            },
            err => err,
        }
    }
}

fn iteration_suffix(iteration: &Option<u64>) -> String {
    match iteration {
        Some(it) => format!(" in iteration {it}"),
        None => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, SvgdError>;
