//! Training support.
//!
//! [`Batch`] keeps one lattice per training sequence and turns a weight
//! snapshot into a log-likelihood and model expectations. [`Objective`]
//! wraps that as the regularized loss an optimizer minimizes, and
//! [`Trainer`] drives L-BFGS over it.

mod batch;
mod trainer;

pub use self::batch::{Batch, Objective};
pub use self::trainer::{LbfgsParams, LineSearchAlgorithm, Trainer};
