use ndarray::{Array2, ArrayView1, Zip};

use crate::error::{Error, Result};

/// Dense accumulator of expected (or observed) feature counts.
///
/// This is a `[num_features][num_labels]` matrix whose element `[f][y]`
/// holds the accumulated count of feature #f firing together with label #y.
/// The matrix is row-major, so [`to_vec`](Self::to_vec) yields the same flat
/// layout as [`Weights`](crate::Weights).
///
/// One accumulator usually spans a whole batch: reset it at the start of
/// every optimizer iteration and let every lattice add into it. Partial
/// accumulators built on different threads are combined with
/// [`merge`](Self::merge), which is a plain element-wise sum.
#[derive(Debug, Clone, PartialEq)]
pub struct Expectation {
    counts: Array2<f64>,
}

impl Expectation {
    pub fn new(num_features: usize, num_labels: usize) -> Self {
        Self {
            counts: Array2::zeros((num_features, num_labels)),
        }
    }

    pub fn num_features(&self) -> usize {
        self.counts.nrows()
    }

    pub fn num_labels(&self) -> usize {
        self.counts.ncols()
    }

    fn shape(&self) -> (usize, usize) {
        (self.num_features(), self.num_labels())
    }

    /// Zero every cell.
    pub fn reset(&mut self) {
        self.counts.fill(0.0);
    }

    /// Add `value` to cell `[feature][label]`.
    #[inline]
    pub fn add(&mut self, feature: u32, label: u32, value: f64) -> Result<()> {
        let len = self.counts.len();
        let cell = self
            .counts
            .get_mut((feature as usize, label as usize))
            .ok_or(Error::FeatureOutOfRange {
                feature,
                label,
                len,
            })?;
        *cell += value;
        Ok(())
    }

    /// Accumulated count at `[feature][label]`, `None` when out of range.
    pub fn get(&self, feature: u32, label: u32) -> Option<f64> {
        self.counts.get((feature as usize, label as usize)).copied()
    }

    /// Counts of one feature across all labels.
    pub fn row(&self, feature: u32) -> ArrayView1<'_, f64> {
        self.counts.row(feature as usize)
    }

    /// Sum another accumulator into this one.
    pub fn merge(&mut self, other: &Expectation) -> Result<()> {
        if self.shape() != other.shape() {
            return Err(Error::ShapeMismatch {
                expected: self.shape(),
                actual: other.shape(),
            });
        }
        self.counts += &other.counts;
        Ok(())
    }

    /// Sum of all cells.
    pub fn total(&self) -> f64 {
        self.counts.sum()
    }

    /// Flatten into the `feature * num_labels + label` layout.
    pub fn to_vec(&self) -> Vec<f64> {
        self.counts.iter().copied().collect()
    }

    /// Log-likelihood gradient contribution `expected - observed`, flattened.
    ///
    /// The optimizer minimizes the negative log-likelihood, whose gradient is
    /// exactly this difference.
    pub fn gradient(&self, observed: &Expectation) -> Result<Vec<f64>> {
        if self.shape() != observed.shape() {
            return Err(Error::ShapeMismatch {
                expected: self.shape(),
                actual: observed.shape(),
            });
        }
        let mut out = vec![0.0; self.counts.len()];
        self.gradient_into(observed, &mut out)?;
        Ok(out)
    }

    /// Like [`gradient`](Self::gradient), writing into a caller buffer.
    pub fn gradient_into(&self, observed: &Expectation, out: &mut [f64]) -> Result<()> {
        if self.shape() != observed.shape() || out.len() != self.counts.len() {
            return Err(Error::ShapeMismatch {
                expected: self.shape(),
                actual: observed.shape(),
            });
        }
        let mut view = ndarray::ArrayViewMut2::from_shape(self.shape(), out)
            .map_err(|e| Error::Numerical(e.to_string()))?;
        Zip::from(&mut view)
            .and(&self.counts)
            .and(&observed.counts)
            .for_each(|g, &e, &o| *g = e - o);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expectation_add_and_layout() {
        let mut acc = Expectation::new(3, 2);
        acc.add(1, 1, 0.25).unwrap();
        acc.add(1, 1, 0.5).unwrap();
        acc.add(2, 0, 1.0).unwrap();
        assert_eq!(acc.get(1, 1), Some(0.75));
        assert_eq!(acc.to_vec(), vec![0.0, 0.0, 0.0, 0.75, 1.0, 0.0]);
        assert_eq!(acc.total(), 1.75);

        acc.reset();
        assert_eq!(acc.total(), 0.0);
    }

    #[test]
    fn test_expectation_out_of_range() {
        let mut acc = Expectation::new(2, 2);
        assert!(matches!(
            acc.add(2, 0, 1.0),
            Err(Error::FeatureOutOfRange { feature: 2, .. })
        ));
        assert!(acc.add(0, 2, 1.0).is_err());
        assert_eq!(acc.get(5, 0), None);
    }

    #[test]
    fn test_expectation_merge_is_sum() {
        let mut a = Expectation::new(2, 2);
        let mut b = Expectation::new(2, 2);
        a.add(0, 0, 1.0).unwrap();
        b.add(0, 0, 2.0).unwrap();
        b.add(1, 1, 3.0).unwrap();

        let mut ab = a.clone();
        ab.merge(&b).unwrap();
        let mut ba = b.clone();
        ba.merge(&a).unwrap();
        assert_eq!(ab, ba);
        assert_eq!(ab.get(0, 0), Some(3.0));

        assert!(a.merge(&Expectation::new(3, 2)).is_err());
    }

    #[test]
    fn test_expectation_gradient() {
        let mut expected = Expectation::new(1, 2);
        let mut observed = Expectation::new(1, 2);
        expected.add(0, 0, 0.75).unwrap();
        expected.add(0, 1, 0.25).unwrap();
        observed.add(0, 0, 1.0).unwrap();
        assert_eq!(expected.gradient(&observed).unwrap(), vec![-0.25, 0.25]);
    }
}
