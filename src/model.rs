use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dictionary::Dictionary;
use crate::error::{Error, Result};
use crate::feature::{AttributeIndex, FeatureIndex};
use crate::tagger::Tagger;
use crate::weights::Weights;

/// A trained CRF model: label set, attribute set and the flat weight vector.
///
/// `weights` holds `(num_attrs + num_labels) * num_labels` entries addressed
/// as `feature * num_labels + label`, where features `0..num_attrs` are
/// attributes and feature `num_attrs + p` is the transition out of label `p`
/// (see [`AttributeIndex`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    labels: Dictionary,
    attrs: Dictionary,
    weights: Vec<f64>,
}

impl Model {
    pub fn new(labels: Dictionary, attrs: Dictionary, weights: Vec<f64>) -> Result<Self> {
        let model = Self {
            labels,
            attrs,
            weights,
        };
        model.validate()?;
        Ok(model)
    }

    fn validate(&self) -> Result<()> {
        if self.labels.is_empty() {
            return Err(Error::NoLabels);
        }
        let num_features = self.index().num_features();
        let expected = num_features * self.num_labels();
        if self.weights.len() != expected {
            return Err(Error::ShapeMismatch {
                expected: (num_features, self.num_labels()),
                actual: (self.weights.len() / self.num_labels(), self.num_labels()),
            });
        }
        Ok(())
    }

    /// Load a model from its JSON representation in memory
    pub fn from_slice(buf: &[u8]) -> Result<Self> {
        let model: Model = serde_json::from_slice(buf)?;
        model.validate()?;
        Ok(model)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let buf = fs::read(path)?;
        Self::from_slice(&buf)
    }

    pub fn to_vec(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_vec()?)?;
        Ok(())
    }

    /// Number of distinct output labels
    pub fn num_labels(&self) -> usize {
        self.labels.len()
    }

    /// Number of distinct attributes
    pub fn num_attrs(&self) -> usize {
        self.attrs.len()
    }

    pub fn to_label_id(&self, label: &str) -> Option<u32> {
        self.labels.get(label)
    }

    pub fn to_label(&self, lid: u32) -> Option<&str> {
        self.labels.name(lid)
    }

    pub fn to_attr_id(&self, attr: &str) -> Option<u32> {
        self.attrs.get(attr)
    }

    pub fn to_attr(&self, aid: u32) -> Option<&str> {
        self.attrs.name(aid)
    }

    pub fn index(&self) -> AttributeIndex {
        AttributeIndex::new(self.num_attrs(), self.num_labels())
    }

    /// Raw weights in `feature * num_labels + label` layout
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Weight of the state feature `(attr, label)`
    pub fn state_weight(&self, attr: &str, label: &str) -> Option<f64> {
        let aid = self.to_attr_id(attr)? as usize;
        let lid = self.to_label_id(label)? as usize;
        self.weights.get(aid * self.num_labels() + lid).copied()
    }

    /// Weight of the transition feature `prev -> label`
    pub fn transition_weight(&self, prev: &str, label: &str) -> Option<f64> {
        let pid = self.to_label_id(prev)?;
        let lid = self.to_label_id(label)? as usize;
        let fid = self.index().transition_feature(pid) as usize;
        self.weights.get(fid * self.num_labels() + lid).copied()
    }

    /// Weight snapshot for inference
    pub fn snapshot(&self) -> Result<Weights> {
        Weights::new(self.weights.clone(), self.num_labels())
    }

    /// Get a new tagger
    pub fn tagger(&self) -> Result<Tagger<'_>> {
        Tagger::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> Model {
        let labels = Dictionary::from(vec!["sunny".to_string(), "rainy".to_string()]);
        let attrs = Dictionary::from(vec!["walk".to_string(), "shop".to_string()]);
        // 2 attributes + 2 transition rows, 2 labels each
        let weights = vec![1.0, -1.0, 0.5, 0.0, 0.1, 0.2, 0.3, 0.4];
        Model::new(labels, attrs, weights).unwrap()
    }

    #[test]
    fn test_model_lookups() {
        let model = model();
        assert_eq!(model.num_labels(), 2);
        assert_eq!(model.num_attrs(), 2);
        assert_eq!(model.to_label_id("rainy"), Some(1));
        assert_eq!(model.to_label(0), Some("sunny"));
        assert_eq!(model.to_attr_id("shop"), Some(1));
        assert_eq!(model.to_attr(5), None);
        assert_eq!(model.state_weight("walk", "rainy"), Some(-1.0));
        assert_eq!(model.transition_weight("rainy", "sunny"), Some(0.3));
        assert_eq!(model.transition_weight("rainy", "cloudy"), None);
    }

    #[test]
    fn test_model_rejects_bad_shape() {
        let labels = Dictionary::from(vec!["a".to_string()]);
        let attrs = Dictionary::from(vec!["x".to_string()]);
        assert!(matches!(
            Model::new(labels.clone(), attrs.clone(), vec![0.0; 3]),
            Err(Error::ShapeMismatch { .. })
        ));
        assert!(Model::new(labels, attrs, vec![0.0; 2]).is_ok());
        assert!(matches!(
            Model::new(Dictionary::new(), Dictionary::new(), vec![]),
            Err(Error::NoLabels)
        ));
    }

    #[test]
    fn test_model_save_load() {
        let model = model();
        let file = tempfile::NamedTempFile::new().unwrap();
        model.save(file.path()).unwrap();
        let loaded = Model::load(file.path()).unwrap();
        assert_eq!(loaded, model);

        assert!(Model::from_slice(b"not json").is_err());
    }
}
