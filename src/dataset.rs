/// An item is the set of attribute ids observed at one position
pub type Item = Vec<u32>;

/// An instance consists of a sequence of items and labels
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    /// Array of the item sequence
    pub items: Vec<Item>,
    /// Array of the label sequence, empty when the instance is only decoded
    pub labels: Vec<u32>,
    /// Instance weight, scales the instance's contribution to the objective
    pub weight: f64,
}

impl Instance {
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            items: Vec::with_capacity(cap),
            labels: Vec::with_capacity(cap),
            weight: 1.0,
        }
    }

    /// Build an unlabeled instance for decoding.
    pub fn unlabeled(items: Vec<Item>) -> Self {
        Self {
            items,
            labels: Vec::new(),
            weight: 1.0,
        }
    }

    pub fn push(&mut self, item: Item, label: u32) {
        self.items.push(item);
        self.labels.push(label);
    }

    pub fn set_weight(&mut self, weight: f64) {
        self.weight = weight;
    }

    /// Number of items in the sequence
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
