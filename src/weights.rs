use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};

static NEXT_VERSION: AtomicU64 = AtomicU64::new(1);

fn next_version() -> u64 {
    NEXT_VERSION.fetch_add(1, Ordering::Relaxed)
}

/// Immutable snapshot of the global weight vector.
///
/// The vector is flat and addressed as `feature * num_labels + label`. This
/// layout is the contract shared with the optimizer and with saved models, so
/// it must not change.
///
/// Snapshots are cheap to clone and safe to share between threads. An
/// optimizer never mutates a snapshot in place: it [`publish`](Self::publish)es
/// a new one, which carries a fresh version number so lattices can tell their
/// potentials are stale.
#[derive(Debug, Clone)]
pub struct Weights {
    values: Arc<[f64]>,
    num_labels: usize,
    version: u64,
}

impl Weights {
    /// Create a snapshot from a flat weight vector.
    pub fn new(values: Vec<f64>, num_labels: usize) -> Result<Self> {
        if num_labels == 0 {
            return Err(Error::NoLabels);
        }
        if values.len() % num_labels != 0 {
            return Err(Error::invalid(format!(
                "weight vector length ({}) must be a multiple of the number of labels ({})",
                values.len(),
                num_labels
            )));
        }
        Ok(Self {
            values: values.into(),
            num_labels,
            version: next_version(),
        })
    }

    /// All-zero weights for `num_features` features over `num_labels` labels.
    pub fn zeros(num_features: usize, num_labels: usize) -> Result<Self> {
        Self::new(vec![0.0; num_features * num_labels], num_labels)
    }

    /// Publish a new snapshot with the same layout.
    pub fn publish(&self, values: &[f64]) -> Result<Self> {
        if values.len() != self.values.len() {
            return Err(Error::ShapeMismatch {
                expected: (self.num_features(), self.num_labels),
                actual: (values.len() / self.num_labels, self.num_labels),
            });
        }
        Ok(Self {
            values: values.into(),
            num_labels: self.num_labels,
            version: next_version(),
        })
    }

    /// Weight of `feature` paired with `label`.
    #[inline]
    pub fn get(&self, feature: u32, label: u32) -> Result<f64> {
        let index = feature as usize * self.num_labels + label as usize;
        if label as usize >= self.num_labels {
            return Err(Error::LabelOutOfRange {
                label,
                num_labels: self.num_labels,
            });
        }
        self.values
            .get(index)
            .copied()
            .ok_or(Error::FeatureOutOfRange {
                feature,
                label,
                len: self.values.len(),
            })
    }

    pub fn num_labels(&self) -> usize {
        self.num_labels
    }

    pub fn num_features(&self) -> usize {
        self.values.len() / self.num_labels
    }

    /// Version stamp, unique per published snapshot within the process.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }
}
