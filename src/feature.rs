use crate::dataset::Instance;
use crate::error::{Error, Result};

/// Source of active feature indices for lattice nodes and edges.
///
/// A feature index here is a predicate over the observation context; its
/// weight depends on the label it is paired with, and lives at
/// `feature * num_labels + label` in the flat weight vector.
///
/// Implementations must be deterministic: asking twice for the same
/// position returns the same set.
pub trait FeatureIndex {
    /// The observation sequence type this index understands.
    type Event: ?Sized;

    /// Number of distinct feature indices (rows of the weight matrix).
    fn num_features(&self) -> usize;

    /// Number of positions in `event`.
    fn sequence_len(&self, event: &Self::Event) -> usize;

    /// Unigram features active at `position`.
    fn unigram_features(&self, event: &Self::Event, position: usize) -> Vec<u32>;

    /// Bigram features active for a transition out of `prev_label` into `position`.
    ///
    /// The lattice never asks for `position == 0`: there is no previous
    /// label at the start of a sequence, and bigram features do not fire there.
    fn bigram_features(&self, event: &Self::Event, prev_label: u32, position: usize) -> Vec<u32>;

    /// Check that `event` only refers to features this index can map.
    ///
    /// Called once by [`Lattice::build`](crate::lattice::Lattice::build)
    /// before any feature is fetched.
    fn validate(&self, _event: &Self::Event) -> Result<()> {
        Ok(())
    }
}

/// Minimal feature index over attribute ids.
///
/// Every attribute id `a` is a unigram feature `a`. The transition predicate
/// "previous label is `p`" is the bigram feature `num_attrs + p`, so its
/// weight row holds one transition weight per target label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeIndex {
    num_attrs: usize,
    num_labels: usize,
}

impl AttributeIndex {
    pub fn new(num_attrs: usize, num_labels: usize) -> Self {
        Self {
            num_attrs,
            num_labels,
        }
    }

    pub fn num_attrs(&self) -> usize {
        self.num_attrs
    }

    pub fn num_labels(&self) -> usize {
        self.num_labels
    }

    /// Feature index of the transition predicate for `prev_label`.
    pub fn transition_feature(&self, prev_label: u32) -> u32 {
        (self.num_attrs + prev_label as usize) as u32
    }
}

impl FeatureIndex for AttributeIndex {
    type Event = Instance;

    fn num_features(&self) -> usize {
        self.num_attrs + self.num_labels
    }

    fn sequence_len(&self, event: &Instance) -> usize {
        event.len()
    }

    /// Attribute ids must stay below `num_attrs`; anything above would
    /// address a transition row.
    fn validate(&self, event: &Instance) -> Result<()> {
        let bad = event
            .items
            .iter()
            .flatten()
            .find(|&&aid| aid as usize >= self.num_attrs);
        match bad {
            Some(&aid) => Err(Error::invalid(format!(
                "attribute {} is out of range for {} attributes",
                aid, self.num_attrs
            ))),
            None => Ok(()),
        }
    }

    fn unigram_features(&self, event: &Instance, position: usize) -> Vec<u32> {
        event.items[position].clone()
    }

    fn bigram_features(&self, _event: &Instance, prev_label: u32, position: usize) -> Vec<u32> {
        if position == 0 {
            return Vec::new();
        }
        vec![self.transition_feature(prev_label)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_index_layout() {
        let index = AttributeIndex::new(3, 2);
        assert_eq!(index.num_features(), 5);
        assert_eq!(index.transition_feature(0), 3);
        assert_eq!(index.transition_feature(1), 4);

        let mut inst = Instance::with_capacity(2);
        inst.push(vec![0, 2], 0);
        inst.push(vec![1], 1);
        assert_eq!(index.sequence_len(&inst), 2);
        assert_eq!(index.unigram_features(&inst, 0), vec![0, 2]);
        assert_eq!(index.bigram_features(&inst, 1, 1), vec![4]);
        assert!(index.bigram_features(&inst, 1, 0).is_empty());
        assert!(index.validate(&inst).is_ok());
    }

    #[test]
    fn test_attribute_index_rejects_transition_ids() {
        let index = AttributeIndex::new(2, 2);
        let mut inst = Instance::with_capacity(2);
        inst.push(vec![0], 0);
        // 3 is the transition row of label 1, not an attribute
        inst.push(vec![1, 3], 1);
        assert!(matches!(index.validate(&inst), Err(Error::InvalidInput(_))));
    }
}
