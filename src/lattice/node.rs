use crate::error::{Error, Result};
use crate::expectation::Expectation;
use crate::feature::FeatureIndex;
use crate::math::logsumexp;
use crate::weights::Weights;

/// One `(position, label)` cell of the lattice.
///
/// The forward score includes the node's own unigram potential; the backward
/// score does not. With that convention `forward + backward - log Z` is the
/// log marginal of the node.
#[derive(Debug, Clone)]
pub struct Node {
    position: usize,
    label: u32,
    /// Active unigram features
    features: Vec<u32>,
    /// Sum of unigram weights, log domain
    unigram: f64,
    forward: f64,
    backward: f64,
}

impl Node {
    pub(crate) fn new(position: usize, label: u32) -> Self {
        Self {
            position,
            label,
            features: Vec::new(),
            unigram: 0.0,
            forward: f64::NEG_INFINITY,
            backward: f64::NEG_INFINITY,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn label(&self) -> u32 {
        self.label
    }

    pub fn features(&self) -> &[u32] {
        &self.features
    }

    pub fn unigram_potential(&self) -> f64 {
        self.unigram
    }

    #[inline]
    pub(crate) fn forward(&self) -> f64 {
        self.forward
    }

    #[inline]
    pub(crate) fn backward(&self) -> f64 {
        self.backward
    }

    pub(crate) fn calc_features<F: FeatureIndex + ?Sized>(&mut self, index: &F, event: &F::Event) {
        self.features = index.unigram_features(event, self.position);
    }

    /// Set the unigram potential from the current weights.
    pub(crate) fn calc_potential(&mut self, weights: &Weights) -> Result<()> {
        let mut potential = 0.0;
        for &f in &self.features {
            potential += weights.get(f, self.label)?;
        }
        if !potential.is_finite() {
            return Err(Error::Numerical(format!(
                "unigram potential at ({}, {}) is not finite",
                self.position, self.label
            )));
        }
        self.unigram = potential;
        Ok(())
    }

    /// `incoming[i]` is the forward score of the i-th predecessor plus the
    /// bigram potential of the edge from it (a single start-edge potential at
    /// position 0).
    pub(crate) fn compute_forward(&mut self, incoming: &[f64]) {
        self.forward = logsumexp(incoming) + self.unigram;
    }

    /// `outgoing[j]` is the edge potential to the j-th successor plus that
    /// successor's unigram potential and backward score. Empty at the last
    /// position, where the backward score is `log 1`.
    pub(crate) fn compute_backward(&mut self, outgoing: &[f64]) {
        self.backward = if outgoing.is_empty() {
            0.0
        } else {
            logsumexp(outgoing)
        };
    }

    #[inline]
    pub(crate) fn log_marginal(&self, log_z: f64) -> f64 {
        self.forward + self.backward - log_z
    }

    pub(crate) fn accumulate_expectation(
        &self,
        acc: &mut Expectation,
        log_z: f64,
        scale: f64,
    ) -> Result<()> {
        if self.features.is_empty() {
            return Ok(());
        }
        let prob = self.log_marginal(log_z).exp() * scale;
        for &f in &self.features {
            acc.add(f, self.label, prob)?;
        }
        Ok(())
    }
}
