use std::io;

use thiserror::Error;

use crate::lattice::Phase;

/// Errors raised while building, evaluating or training a lattice.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    /// The observation sequence has no items.
    #[error("empty sequences are not allowed")]
    EmptySequence,

    /// The label set is empty.
    #[error("label set must contain at least one label")]
    NoLabels,

    /// Item and label sequences disagree in length.
    #[error("xseq and yseq must have the same length ({items} items, {labels} labels)")]
    LengthMismatch { items: usize, labels: usize },

    /// A label id is not part of the label set.
    #[error("label {label} is out of range for {num_labels} labels")]
    LabelOutOfRange { label: u32, num_labels: usize },

    /// An operation was invoked before the phase it depends on completed.
    ///
    /// This is a usage defect, never an expected runtime condition.
    #[error("{operation} requires phase {required:?}, but the lattice is at {actual:?}")]
    Phase {
        operation: &'static str,
        required: Phase,
        actual: Phase,
    },

    /// Potentials or the partition function left the representable range.
    #[error("numerical error: {0}")]
    Numerical(String),

    /// A feature index addresses past the end of the weight vector or accumulator.
    #[error("feature {feature} with label {label} is out of range for {len} weights")]
    FeatureOutOfRange { feature: u32, label: u32, len: usize },

    /// Two dense structures do not share the `[num_features][num_labels]` layout.
    #[error("shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    /// A configuration value failed validation.
    #[error("{0}")]
    InvalidInput(String),

    /// A configuration key is not recognised.
    #[error("unknown parameter: {0}")]
    UnknownParameter(String),

    /// The external optimizer stopped with an error.
    #[error("optimizer error: {0}")]
    Optimizer(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub(crate) fn invalid<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }
}
