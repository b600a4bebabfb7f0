//! Stein variational gradient descent.
//!
//! A fixed set of particles is transported towards a target distribution that
//! is only known through the gradient of its log density. Each iteration
//! combines a kernel-smoothed score term, which pulls particles towards high
//! density, with the gradient of an RBF kernel, which pushes them apart.

pub(crate) mod distance;
pub(crate) mod engine;
pub(crate) mod error;
pub(crate) mod gradient;
pub mod init;
pub(crate) mod kernel;
pub(crate) mod math;
pub(crate) mod optimizer;
pub(crate) mod settings;
pub mod targets;

pub use distance::squared_distances;
pub use engine::Svgd;
pub use error::{Quantity, Result, SvgdError};
pub use gradient::GradientProvider;
pub use init::{init_particles, InitParticles, JitterInit};
pub use kernel::{BandwidthRule, Kernel, KernelEval, RbfKernel};
pub use optimizer::{Adam, AdamOptions, AdamState, Optimizer, Sgd};
pub use settings::{new_svgd, SvgdSettings};
