use super::node::Node;
use crate::error::{Error, Result};
use crate::expectation::Expectation;
use crate::feature::FeatureIndex;
use crate::weights::Weights;

/// Transition from a node at position `i - 1` into a node at position `i`.
///
/// Endpoints are indices into the lattice's node arena. The left endpoint is
/// `None` for the start edges of position 0, which come from the implicit
/// start state and never carry bigram features.
#[derive(Debug, Clone)]
pub struct Edge {
    left: Option<usize>,
    right: usize,
    /// Active bigram features, fixed once the lattice is built
    features: Vec<u32>,
    /// Log-domain bigram potential
    bigram: f64,
}

impl Edge {
    pub(crate) fn new(left: Option<usize>, right: usize) -> Self {
        Self {
            left,
            right,
            features: Vec::new(),
            bigram: 0.0,
        }
    }

    pub fn left(&self) -> Option<usize> {
        self.left
    }

    pub fn right(&self) -> usize {
        self.right
    }

    pub fn features(&self) -> &[u32] {
        &self.features
    }

    pub fn bigram_potential(&self) -> f64 {
        self.bigram
    }

    pub(crate) fn calc_features<F: FeatureIndex + ?Sized>(
        &mut self,
        index: &F,
        event: &F::Event,
        position: usize,
        nodes: &[Node],
    ) {
        self.features = match self.left {
            Some(left) if position > 0 => {
                index.bigram_features(event, nodes[left].label(), position)
            }
            _ => Vec::new(),
        };
    }

    /// Sum of `weights[f * num_labels + right.label]` over the active features.
    pub(crate) fn calc_potential(&mut self, nodes: &[Node], weights: &Weights) -> Result<()> {
        let label = nodes[self.right].label();
        let mut potential = 0.0;
        for &f in &self.features {
            potential += weights.get(f, label)?;
        }
        if !potential.is_finite() {
            return Err(Error::Numerical(format!(
                "bigram potential into node {} is not finite",
                self.right
            )));
        }
        self.bigram = potential;
        Ok(())
    }

    /// Log posterior probability of taking this transition.
    #[inline]
    pub(crate) fn log_marginal(&self, nodes: &[Node], log_z: f64) -> f64 {
        let right = &nodes[self.right];
        let alpha = self.left.map_or(0.0, |left| nodes[left].forward());
        alpha + self.bigram + right.unigram_potential() + right.backward() - log_z
    }

    pub(crate) fn accumulate_expectation(
        &self,
        nodes: &[Node],
        acc: &mut Expectation,
        log_z: f64,
        scale: f64,
    ) -> Result<()> {
        if self.features.is_empty() {
            return Ok(());
        }
        let label = nodes[self.right].label();
        let prob = self.log_marginal(nodes, log_z).exp() * scale;
        for &f in &self.features {
            acc.add(f, label, prob)?;
        }
        Ok(())
    }
}
