use crate::dataset::Instance;
use crate::error::{Error, Result};
use crate::expectation::Expectation;
use crate::feature::FeatureIndex;
use crate::lattice::Lattice;
use crate::weights::Weights;

/// One training sequence: its lattice, gold labels and instance weight.
#[derive(Debug, Clone)]
struct Sequence {
    lattice: Lattice,
    labels: Vec<u32>,
    weight: f64,
}

/// The lattices of a training set, kept alive across optimizer iterations.
///
/// Structure and feature sets are fixed when the batch is built; each
/// evaluation only recomputes potentials from the new weight snapshot.
/// Empirical counts never change, so they are accumulated once up front.
#[derive(Debug, Clone)]
pub struct Batch {
    sequences: Vec<Sequence>,
    observed: Expectation,
    num_labels: usize,
    rejected: usize,
}

impl Batch {
    pub fn new(num_features: usize, num_labels: usize) -> Self {
        Self {
            sequences: Vec::new(),
            observed: Expectation::new(num_features, num_labels),
            num_labels,
            rejected: 0,
        }
    }

    /// Build a batch from `instances`.
    ///
    /// A malformed instance is logged and skipped; it does not abort the batch.
    pub fn build<F>(index: &F, instances: &[Instance], num_labels: usize) -> Self
    where
        F: FeatureIndex<Event = Instance> + ?Sized,
    {
        let mut batch = Self::new(index.num_features(), num_labels);
        for (i, inst) in instances.iter().enumerate() {
            if let Err(e) = batch.push(index, inst) {
                log::warn!("skipping instance {}: {}", i, e);
                batch.rejected += 1;
            }
        }
        batch
    }

    /// Add one labeled instance.
    pub fn push<F>(&mut self, index: &F, inst: &Instance) -> Result<()>
    where
        F: FeatureIndex<Event = Instance> + ?Sized,
    {
        let lattice = Lattice::build(index, inst, self.num_labels)?;
        let mut observed = Expectation::new(self.observed.num_features(), self.num_labels);
        lattice.observed_counts_weighted(&inst.labels, &mut observed, inst.weight)?;
        self.observed.merge(&observed)?;
        self.sequences.push(Sequence {
            lattice,
            labels: inst.labels.clone(),
            weight: inst.weight,
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    /// Number of instances skipped by [`build`](Self::build).
    pub fn rejected(&self) -> usize {
        self.rejected
    }

    pub fn num_labels(&self) -> usize {
        self.num_labels
    }

    pub fn num_features(&self) -> usize {
        self.observed.num_features()
    }

    /// Weighted empirical feature counts of the whole batch.
    pub fn observed(&self) -> &Expectation {
        &self.observed
    }

    /// Run inference on every sequence under `weights`.
    ///
    /// `expected` is reset and then receives the weighted model expectations
    /// of the batch. Returns the weighted conditional log-likelihood.
    pub fn evaluate(&mut self, weights: &Weights, expected: &mut Expectation) -> Result<f64> {
        expected.reset();
        let mut log_likelihood = 0.0;
        for seq in &mut self.sequences {
            seq.lattice.refresh(weights)?;
            seq.lattice.infer()?;
            log_likelihood += seq.lattice.log_likelihood(&seq.labels)? * seq.weight;
            seq.lattice.accumulate_weighted(expected, seq.weight)?;
        }
        Ok(log_likelihood)
    }
}

/// L2-regularized negative conditional log-likelihood of a batch.
///
/// This is the function the external optimizer minimizes. Each call
/// publishes the optimizer's point as a fresh weight snapshot.
#[derive(Debug)]
pub struct Objective {
    batch: Batch,
    snapshot: Weights,
    expected: Expectation,
    c2: f64,
}

impl Objective {
    pub fn new(batch: Batch, c2: f64) -> Result<Self> {
        if batch.is_empty() {
            return Err(Error::invalid("no valid training instances"));
        }
        let snapshot = Weights::zeros(batch.num_features(), batch.num_labels())?;
        let expected = Expectation::new(batch.num_features(), batch.num_labels());
        Ok(Self {
            batch,
            snapshot,
            expected,
            c2,
        })
    }

    /// Number of parameters, `num_features * num_labels`.
    pub fn dimension(&self) -> usize {
        self.batch.num_features() * self.batch.num_labels()
    }

    pub fn batch(&self) -> &Batch {
        &self.batch
    }

    /// Objective value at `x`; writes the gradient into `gx`.
    pub fn evaluate(&mut self, x: &[f64], gx: &mut [f64]) -> Result<f64> {
        self.snapshot = self.snapshot.publish(x)?;
        let log_likelihood = self.batch.evaluate(&self.snapshot, &mut self.expected)?;
        self.expected.gradient_into(self.batch.observed(), gx)?;

        let mut loss = -log_likelihood;
        // Factor of 2 comes from derivative of c2 * x[i]^2 -> 2 * c2 * x[i]
        if self.c2 > 0.0 {
            let two_c2 = self.c2 * 2.0;
            for (g, &w) in gx.iter_mut().zip(x) {
                *g += two_c2 * w;
                loss += self.c2 * w * w;
            }
        }
        if !loss.is_finite() {
            return Err(Error::Numerical(format!("objective is not finite: {}", loss)));
        }
        Ok(loss)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::AttributeIndex;

    fn instances() -> Vec<Instance> {
        let mut a = Instance::with_capacity(2);
        a.push(vec![0], 0);
        a.push(vec![1], 1);
        let mut b = Instance::with_capacity(1);
        b.push(vec![1], 1);
        b.set_weight(2.0);
        vec![a, b, Instance::with_capacity(0)]
    }

    #[test]
    fn test_batch_skips_malformed() {
        let index = AttributeIndex::new(2, 2);
        let batch = Batch::build(&index, &instances(), 2);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.rejected(), 1);
        // a: 2 state + 1 transition, b: 1 state at weight 2
        assert_eq!(batch.observed().total(), 5.0);
        assert_eq!(batch.observed().get(1, 1), Some(3.0));
    }

    #[test]
    fn test_batch_rejects_unknown_attribute() {
        let index = AttributeIndex::new(2, 2);
        let mut bad = Instance::with_capacity(1);
        bad.push(vec![3], 0);
        let mut batch = Batch::new(index.num_features(), 2);
        assert!(batch.push(&index, &bad).is_err());
        assert!(batch.is_empty());
        assert_eq!(batch.observed().total(), 0.0);
    }

    #[test]
    fn test_batch_evaluate_zero_weights() {
        let index = AttributeIndex::new(2, 2);
        let mut batch = Batch::build(&index, &instances(), 2);
        let weights = Weights::zeros(index.num_features(), 2).unwrap();
        let mut expected = Expectation::new(index.num_features(), 2);

        let ll = batch.evaluate(&weights, &mut expected).unwrap();
        // uniform model: every path of length n has probability 2^-n
        let uniform = -(2.0f64.ln() * 2.0) - 2.0 * 2.0f64.ln();
        assert!((ll - uniform).abs() < 1e-9);

        // each active unigram gets probability 1/2 per label
        assert!((expected.get(0, 0).unwrap() - 0.5).abs() < 1e-9);
        assert!((expected.get(1, 1).unwrap() - 1.5).abs() < 1e-9);

        // evaluating again resets the accumulator first
        batch.evaluate(&weights, &mut expected).unwrap();
        assert!((expected.get(1, 1).unwrap() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_objective_gradient_matches_finite_differences() {
        let index = AttributeIndex::new(2, 2);
        let batch = Batch::build(&index, &instances(), 2);
        let mut objective = Objective::new(batch, 0.5).unwrap();
        let n = objective.dimension();

        let x: Vec<f64> = (0..n).map(|i| (i as f64 * 0.37).sin()).collect();
        let mut gx = vec![0.0; n];
        objective.evaluate(&x, &mut gx).unwrap();

        let h = 1e-6;
        let mut scratch = vec![0.0; n];
        for i in 0..n {
            let mut plus = x.clone();
            plus[i] += h;
            let mut minus = x.clone();
            minus[i] -= h;
            let fp = objective.evaluate(&plus, &mut scratch).unwrap();
            let fm = objective.evaluate(&minus, &mut scratch).unwrap();
            let numeric = (fp - fm) / (2.0 * h);
            assert!(
                (numeric - gx[i]).abs() < 1e-5,
                "gradient mismatch at {}: analytic {}, numeric {}",
                i,
                gx[i],
                numeric
            );
        }
    }

    #[test]
    fn test_objective_rejects_empty_batch() {
        let batch = Batch::new(4, 2);
        assert!(Objective::new(batch, 1.0).is_err());
    }
}
