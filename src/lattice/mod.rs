//! The probabilistic lattice of a linear-chain CRF.
//!
//! A [`Lattice`] owns one [`Node`] per `(position, label)` and one [`Edge`]
//! per transition: `L` start edges into position 0 and `L * L` edges between
//! every pair of consecutive positions. Nodes live in a flat arena indexed by
//! `position * L + label`; edges refer to their endpoints by arena index.
//!
//! Inference runs through a fixed sequence of phases:
//!
//! ```text
//! Built -> Potentials -> Forward -> Backward -> Normalized -> Accumulated
//! ```
//!
//! Each operation checks that the phase it depends on has completed and
//! returns [`Error::Phase`] otherwise. Recomputing potentials always drops
//! the lattice back to [`Phase::Potentials`], so forward/backward scores
//! computed under older weights can never be read.

mod edge;
mod node;

pub use self::edge::Edge;
pub use self::node::Node;

use crate::error::{Error, Result};
use crate::expectation::Expectation;
use crate::feature::FeatureIndex;
use crate::math::logsumexp;
use crate::weights::Weights;

/// Relative tolerance for the agreement of the forward and backward partition functions.
const PARTITION_TOLERANCE: f64 = 1e-9;

/// Inference phase of a lattice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    /// Structure and feature sets are fixed.
    Built,
    /// Node and edge potentials reflect one weight snapshot.
    Potentials,
    /// Forward scores are available.
    Forward,
    /// Backward scores are available.
    Backward,
    /// The partition function is known; marginals can be read.
    Normalized,
    /// Model expectations were added to an accumulator.
    Accumulated,
}

/// Node/edge graph of one observation sequence.
#[derive(Debug, Clone)]
pub struct Lattice {
    num_labels: usize,
    num_items: usize,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    phase: Phase,
    /// Version of the weight snapshot the potentials were computed from
    weights_version: Option<u64>,
    log_z: f64,
    /// Largest feature id on any node or edge
    max_feature: Option<u32>,
    /// Work space, one entry per label
    row: Vec<f64>,
}

#[inline]
fn edge_offset(num_labels: usize, position: usize, prev: usize, label: usize) -> usize {
    if position == 0 {
        label
    } else {
        num_labels + (position - 1) * num_labels * num_labels + prev * num_labels + label
    }
}

impl Lattice {
    /// Build the lattice of `event` and fetch the active features of every
    /// node and edge from `index`.
    pub fn build<F: FeatureIndex + ?Sized>(
        index: &F,
        event: &F::Event,
        num_labels: usize,
    ) -> Result<Self> {
        if num_labels == 0 {
            return Err(Error::NoLabels);
        }
        let num_items = index.sequence_len(event);
        if num_items == 0 {
            return Err(Error::EmptySequence);
        }
        index.validate(event)?;
        let l = num_labels;

        let mut nodes = Vec::with_capacity(num_items * l);
        for t in 0..num_items {
            for y in 0..l {
                let mut node = Node::new(t, y as u32);
                node.calc_features(index, event);
                nodes.push(node);
            }
        }

        let mut edges = Vec::with_capacity(l + (num_items - 1) * l * l);
        for y in 0..l {
            let mut edge = Edge::new(None, y);
            edge.calc_features(index, event, 0, &nodes);
            edges.push(edge);
        }
        for t in 1..num_items {
            for i in 0..l {
                for j in 0..l {
                    let mut edge = Edge::new(Some((t - 1) * l + i), t * l + j);
                    edge.calc_features(index, event, t, &nodes);
                    edges.push(edge);
                }
            }
        }

        let max_feature = nodes
            .iter()
            .flat_map(|node| node.features())
            .chain(edges.iter().flat_map(|edge| edge.features()))
            .copied()
            .max();
        if let Some(feature) = max_feature {
            if feature as usize >= index.num_features() {
                return Err(Error::FeatureOutOfRange {
                    feature,
                    label: 0,
                    len: index.num_features() * l,
                });
            }
        }

        log::trace!("built lattice (items: {}, labels: {})", num_items, l);
        Ok(Self {
            num_labels,
            num_items,
            nodes,
            edges,
            phase: Phase::Built,
            weights_version: None,
            log_z: f64::NAN,
            max_feature,
            row: Vec::with_capacity(l),
        })
    }

    pub fn num_labels(&self) -> usize {
        self.num_labels
    }

    pub fn num_items(&self) -> usize {
        self.num_items
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node(&self, position: usize, label: u32) -> Option<&Node> {
        if position >= self.num_items || label as usize >= self.num_labels {
            return None;
        }
        self.nodes.get(position * self.num_labels + label as usize)
    }

    /// The edge into `(position, label)` from `prev` at `position - 1`;
    /// `prev` must be `None` exactly at position 0.
    pub fn edge(&self, position: usize, prev: Option<u32>, label: u32) -> Option<&Edge> {
        if position >= self.num_items || label as usize >= self.num_labels {
            return None;
        }
        let prev = match (position, prev) {
            (0, None) => 0,
            (p, Some(prev)) if p > 0 && (prev as usize) < self.num_labels => prev as usize,
            _ => return None,
        };
        self.edges
            .get(edge_offset(self.num_labels, position, prev, label as usize))
    }

    /// Fail before touching `acc` if it cannot hold every feature of this lattice.
    fn check_accumulator(&self, acc: &Expectation) -> Result<()> {
        if acc.num_labels() != self.num_labels {
            return Err(Error::ShapeMismatch {
                expected: (acc.num_features(), self.num_labels),
                actual: (acc.num_features(), acc.num_labels()),
            });
        }
        match self.max_feature {
            Some(feature) if feature as usize >= acc.num_features() => {
                Err(Error::FeatureOutOfRange {
                    feature,
                    label: 0,
                    len: acc.num_features() * acc.num_labels(),
                })
            }
            _ => Ok(()),
        }
    }

    fn require(&self, operation: &'static str, required: Phase) -> Result<()> {
        if self.phase < required {
            return Err(Error::Phase {
                operation,
                required,
                actual: self.phase,
            });
        }
        Ok(())
    }

    /// Compute every node and edge potential from `weights`.
    ///
    /// Invalidates forward, backward and partition results.
    pub fn compute_potentials(&mut self, weights: &Weights) -> Result<()> {
        if weights.num_labels() != self.num_labels {
            return Err(Error::ShapeMismatch {
                expected: (weights.num_features(), self.num_labels),
                actual: (weights.num_features(), weights.num_labels()),
            });
        }
        self.phase = Phase::Built;
        self.weights_version = None;

        for node in &mut self.nodes {
            node.calc_potential(weights)?;
        }
        for edge in &mut self.edges {
            edge.calc_potential(&self.nodes, weights)?;
        }

        self.weights_version = Some(weights.version());
        self.phase = Phase::Potentials;
        Ok(())
    }

    /// Recompute potentials unless they already reflect `weights`.
    ///
    /// Returns whether anything was recomputed.
    pub fn refresh(&mut self, weights: &Weights) -> Result<bool> {
        if self.phase >= Phase::Potentials && self.weights_version == Some(weights.version()) {
            return Ok(false);
        }
        self.compute_potentials(weights)?;
        Ok(true)
    }

    /// Forward pass, left to right.
    pub fn forward(&mut self) -> Result<()> {
        self.require("forward", Phase::Potentials)?;
        let l = self.num_labels;

        for j in 0..l {
            self.row.clear();
            self.row.push(self.edges[j].bigram_potential());
            self.nodes[j].compute_forward(&self.row);
        }

        for t in 1..self.num_items {
            for j in 0..l {
                self.row.clear();
                for i in 0..l {
                    let edge = &self.edges[edge_offset(l, t, i, j)];
                    let score = self.nodes[(t - 1) * l + i].forward() + edge.bigram_potential();
                    self.row.push(score);
                }
                self.nodes[t * l + j].compute_forward(&self.row);
            }
        }

        self.phase = Phase::Forward;
        Ok(())
    }

    /// Backward pass, right to left.
    pub fn backward(&mut self) -> Result<()> {
        self.require("backward", Phase::Forward)?;
        let l = self.num_labels;
        let last = self.num_items - 1;

        for j in 0..l {
            self.nodes[last * l + j].compute_backward(&[]);
        }

        for t in (0..last).rev() {
            for i in 0..l {
                self.row.clear();
                for j in 0..l {
                    let next = &self.nodes[(t + 1) * l + j];
                    let edge = &self.edges[edge_offset(l, t + 1, i, j)];
                    let score = edge.bigram_potential() + next.unigram_potential() + next.backward();
                    self.row.push(score);
                }
                self.nodes[t * l + i].compute_backward(&self.row);
            }
        }

        self.phase = Phase::Backward;
        Ok(())
    }

    /// Compute log Z from both passes and check that they agree.
    pub fn partition(&mut self) -> Result<f64> {
        self.require("partition", Phase::Backward)?;
        let l = self.num_labels;
        let last = self.num_items - 1;

        self.row.clear();
        for j in 0..l {
            let score = self.nodes[last * l + j].forward();
            self.row.push(score);
        }
        let from_forward = logsumexp(&self.row);

        self.row.clear();
        for j in 0..l {
            let node = &self.nodes[j];
            let score =
                self.edges[j].bigram_potential() + node.unigram_potential() + node.backward();
            self.row.push(score);
        }
        let from_backward = logsumexp(&self.row);

        if !from_forward.is_finite() || !from_backward.is_finite() {
            return Err(Error::Numerical(format!(
                "log partition function is not finite (forward: {}, backward: {})",
                from_forward, from_backward
            )));
        }
        let tolerance = PARTITION_TOLERANCE * from_forward.abs().max(1.0);
        if (from_forward - from_backward).abs() > tolerance {
            return Err(Error::Numerical(format!(
                "forward and backward partition functions disagree ({} vs {})",
                from_forward, from_backward
            )));
        }

        log::trace!("log Z = {} (items: {})", from_forward, self.num_items);
        self.log_z = from_forward;
        self.phase = Phase::Normalized;
        Ok(self.log_z)
    }

    /// Run forward, backward and partition; returns log Z.
    pub fn infer(&mut self) -> Result<f64> {
        self.forward()?;
        self.backward()?;
        self.partition()
    }

    /// Add the model expectation of every node and edge feature into `acc`.
    pub fn accumulate_expectation(&mut self, acc: &mut Expectation) -> Result<()> {
        self.accumulate_weighted(acc, 1.0)
    }

    /// Like [`accumulate_expectation`](Self::accumulate_expectation), scaling
    /// every contribution by `scale` (the instance weight).
    ///
    /// Allowed once per inference pass.
    pub fn accumulate_weighted(&mut self, acc: &mut Expectation, scale: f64) -> Result<()> {
        if self.phase != Phase::Normalized {
            return Err(Error::Phase {
                operation: "accumulate_expectation",
                required: Phase::Normalized,
                actual: self.phase,
            });
        }
        self.check_accumulator(acc)?;
        let log_z = self.log_z;
        for node in &self.nodes {
            node.accumulate_expectation(acc, log_z, scale)?;
        }
        for edge in &self.edges {
            edge.accumulate_expectation(&self.nodes, acc, log_z, scale)?;
        }
        self.phase = Phase::Accumulated;
        Ok(())
    }

    pub fn log_z(&self) -> Result<f64> {
        self.require("log_z", Phase::Normalized)?;
        Ok(self.log_z)
    }

    fn checked_node(&self, position: usize, label: u32) -> Result<&Node> {
        self.node(position, label).ok_or(Error::LabelOutOfRange {
            label,
            num_labels: self.num_labels,
        })
    }

    /// Forward score α of `(position, label)`.
    pub fn forward_score(&self, position: usize, label: u32) -> Result<f64> {
        self.require("forward_score", Phase::Forward)?;
        Ok(self.checked_node(position, label)?.forward())
    }

    /// Backward score β of `(position, label)`.
    pub fn backward_score(&self, position: usize, label: u32) -> Result<f64> {
        self.require("backward_score", Phase::Backward)?;
        Ok(self.checked_node(position, label)?.backward())
    }

    /// Posterior probability of `label` at `position`.
    pub fn node_marginal(&self, position: usize, label: u32) -> Result<f64> {
        self.require("node_marginal", Phase::Normalized)?;
        Ok(self
            .checked_node(position, label)?
            .log_marginal(self.log_z)
            .exp())
    }

    /// Posterior probability of the transition `prev -> label` into `position`.
    pub fn edge_marginal(&self, position: usize, prev: Option<u32>, label: u32) -> Result<f64> {
        self.require("edge_marginal", Phase::Normalized)?;
        let edge = self.edge(position, prev, label).ok_or_else(|| {
            Error::invalid(format!(
                "no edge into ({}, {}) from {:?}",
                position, label, prev
            ))
        })?;
        Ok(edge.log_marginal(&self.nodes, self.log_z).exp())
    }

    /// Per-position label distributions, `[position][label]`.
    pub fn marginals(&self) -> Result<Vec<Vec<f64>>> {
        self.require("marginals", Phase::Normalized)?;
        Ok(self
            .nodes
            .chunks(self.num_labels)
            .map(|row| {
                row.iter()
                    .map(|node| node.log_marginal(self.log_z).exp())
                    .collect()
            })
            .collect())
    }

    fn check_labels(&self, labels: &[u32]) -> Result<()> {
        if labels.len() != self.num_items {
            return Err(Error::LengthMismatch {
                items: self.num_items,
                labels: labels.len(),
            });
        }
        if let Some(&label) = labels.iter().find(|&&y| y as usize >= self.num_labels) {
            return Err(Error::LabelOutOfRange {
                label,
                num_labels: self.num_labels,
            });
        }
        Ok(())
    }

    /// Un-normalized log potential of one label path.
    pub fn path_score(&self, labels: &[u32]) -> Result<f64> {
        self.require("path_score", Phase::Potentials)?;
        self.check_labels(labels)?;
        let l = self.num_labels;
        let mut score = 0.0;
        for (t, &y) in labels.iter().enumerate() {
            let prev = if t == 0 { 0 } else { labels[t - 1] as usize };
            score += self.edges[edge_offset(l, t, prev, y as usize)].bigram_potential();
            score += self.nodes[t * l + y as usize].unigram_potential();
        }
        Ok(score)
    }

    /// Conditional log-likelihood of one label path.
    pub fn log_likelihood(&self, labels: &[u32]) -> Result<f64> {
        self.require("log_likelihood", Phase::Normalized)?;
        Ok(self.path_score(labels)? - self.log_z)
    }

    /// Add the empirical feature counts of `labels` into `acc`.
    pub fn observed_counts(&self, labels: &[u32], acc: &mut Expectation) -> Result<()> {
        self.observed_counts_weighted(labels, acc, 1.0)
    }

    pub fn observed_counts_weighted(
        &self,
        labels: &[u32],
        acc: &mut Expectation,
        scale: f64,
    ) -> Result<()> {
        self.check_labels(labels)?;
        self.check_accumulator(acc)?;
        let l = self.num_labels;
        for (t, &y) in labels.iter().enumerate() {
            for &f in self.nodes[t * l + y as usize].features() {
                acc.add(f, y, scale)?;
            }
            let prev = if t == 0 { 0 } else { labels[t - 1] as usize };
            for &f in self.edges[edge_offset(l, t, prev, y as usize)].features() {
                acc.add(f, y, scale)?;
            }
        }
        Ok(())
    }

    /// Most probable label path and its un-normalized score.
    pub fn viterbi(&self) -> Result<(Vec<u32>, f64)> {
        self.require("viterbi", Phase::Potentials)?;
        let l = self.num_labels;
        let t_len = self.num_items;
        let mut score = vec![0.0; t_len * l];
        let mut backward_edge = vec![0u32; t_len * l];

        // Compute the scores at (0, *)
        for j in 0..l {
            score[j] = self.edges[j].bigram_potential() + self.nodes[j].unigram_potential();
        }

        for t in 1..t_len {
            for j in 0..l {
                let mut max_score = f64::NEG_INFINITY;
                let mut argmax = 0;
                for i in 0..l {
                    // Transit from (t-1, i) to (t, j)
                    let s = score[(t - 1) * l + i]
                        + self.edges[edge_offset(l, t, i, j)].bigram_potential();
                    if max_score < s {
                        max_score = s;
                        argmax = i;
                    }
                }
                backward_edge[t * l + j] = argmax as u32;
                score[t * l + j] = max_score + self.nodes[t * l + j].unigram_potential();
            }
        }

        let mut labels = vec![0u32; t_len];
        let mut max_score = f64::NEG_INFINITY;
        for (j, &s) in score[(t_len - 1) * l..].iter().enumerate() {
            if max_score < s {
                max_score = s;
                labels[t_len - 1] = j as u32;
            }
        }

        // Tag labels by tracing the backward links
        for t in (0..t_len - 1).rev() {
            let next = labels[t + 1] as usize;
            labels[t] = backward_edge[(t + 1) * l + next];
        }

        Ok((labels, max_score))
    }
}
