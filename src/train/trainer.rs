use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::dataset::Instance;
use crate::dictionary::Dictionary;
use crate::error::{Error, Result};
use crate::feature::{AttributeIndex, FeatureIndex};
use crate::model::Model;

mod lbfgs;

pub use self::lbfgs::{LbfgsParams, LineSearchAlgorithm};

/// CRF trainer.
///
/// Collects labeled sequences, then fits the weights by handing the batch
/// objective to an L-BFGS optimizer.
#[derive(Debug, Default)]
pub struct Trainer {
    /// Training instances
    instances: Vec<Instance>,
    /// Attribute dictionary
    attrs: Dictionary,
    /// Label dictionary
    labels: Dictionary,
    /// Training parameters
    params: LbfgsParams,
    /// Checked by the optimizer between iterations
    cancel: Arc<AtomicBool>,
}

impl Trainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn params(&self) -> &LbfgsParams {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut LbfgsParams {
        &mut self.params
    }

    /// Set a training parameter by name, e.g. `trainer.set("c2", "0.1")`.
    pub fn set(&mut self, name: &str, value: &str) -> Result<()> {
        self.params.set(name, value)
    }

    pub fn get(&self, name: &str) -> Result<String> {
        self.params.get(name)
    }

    /// Flag that stops training after the current iteration once set.
    ///
    /// The flag is shared, so it can be set from another thread while
    /// [`train`](Self::train) runs. It is cleared when that run returns,
    /// so a cancellation only affects one run.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn num_instances(&self) -> usize {
        self.instances.len()
    }

    pub fn num_labels(&self) -> usize {
        self.labels.len()
    }

    pub fn num_attrs(&self) -> usize {
        self.attrs.len()
    }

    /// Append training data
    pub fn append<I, S, L>(&mut self, xseq: &[I], yseq: &[L]) -> Result<()>
    where
        I: AsRef<[S]>,
        S: AsRef<str>,
        L: AsRef<str>,
    {
        self.append_with_weight(xseq, yseq, 1.0)
    }

    /// Append weighted training data
    pub fn append_with_weight<I, S, L>(&mut self, xseq: &[I], yseq: &[L], weight: f64) -> Result<()>
    where
        I: AsRef<[S]>,
        S: AsRef<str>,
        L: AsRef<str>,
    {
        if xseq.len() != yseq.len() {
            return Err(Error::LengthMismatch {
                items: xseq.len(),
                labels: yseq.len(),
            });
        }
        if xseq.is_empty() {
            return Err(Error::EmptySequence);
        }
        if !weight.is_finite() || weight < 0.0 {
            return Err(Error::invalid("instance weight must be finite and non-negative"));
        }

        let mut instance = Instance::with_capacity(xseq.len());
        instance.set_weight(weight);
        for (item, label) in xseq.iter().zip(yseq) {
            let attrs = item
                .as_ref()
                .iter()
                .map(|attr| self.attrs.get_or_insert(attr.as_ref()))
                .collect();
            let lid = self.labels.get_or_insert(label.as_ref());
            instance.push(attrs, lid);
        }

        self.instances.push(instance);
        Ok(())
    }

    /// Clear all training data
    pub fn clear(&mut self) {
        self.instances.clear();
        self.attrs.clear();
        self.labels.clear();
        self.cancel.store(false, Ordering::Relaxed);
    }

    /// Train a model on the appended data.
    pub fn train(&self) -> Result<Model> {
        if self.instances.is_empty() {
            return Err(Error::invalid("no training data"));
        }
        let index = AttributeIndex::new(self.attrs.len(), self.labels.len());
        log::info!(
            "training on {} instances (labels: {}, attributes: {}, features: {})",
            self.instances.len(),
            self.labels.len(),
            self.attrs.len(),
            index.num_features()
        );
        log::debug!("parameters: {:?}", self.params);

        let result = self.train_lbfgs(&index);
        self.cancel.store(false, Ordering::Relaxed);
        let weights = result?;
        Model::new(self.labels.clone(), self.attrs.clone(), weights)
    }

    /// Train a model and save it to `path`.
    pub fn train_to<P: AsRef<Path>>(&self, path: P) -> Result<Model> {
        let model = self.train()?;
        log::info!("saving model to {}", path.as_ref().display());
        model.save(path)?;
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trainer_basic() {
        let mut trainer = Trainer::new();
        let xseq = vec![vec!["walk", "shop"], vec!["walk"]];
        let yseq = vec!["sunny", "sunny"];

        trainer.append(&xseq, &yseq).unwrap();
        assert_eq!(trainer.num_instances(), 1);
        assert_eq!(trainer.num_attrs(), 2);
        assert_eq!(trainer.num_labels(), 1);

        trainer.clear();
        assert_eq!(trainer.num_instances(), 0);
    }

    #[test]
    fn test_trainer_rejects_malformed() {
        let mut trainer = Trainer::new();

        let empty_x: Vec<Vec<&str>> = vec![];
        let empty_y: Vec<&str> = vec![];
        assert!(matches!(
            trainer.append(&empty_x, &empty_y),
            Err(Error::EmptySequence)
        ));

        let xseq = vec![vec!["walk"]];
        assert!(matches!(
            trainer.append(&xseq, &["sunny", "rainy"]),
            Err(Error::LengthMismatch { .. })
        ));
        assert!(trainer.append_with_weight(&xseq, &["sunny"], -1.0).is_err());
        assert_eq!(trainer.num_instances(), 0);

        assert!(trainer.train().is_err());
    }

    #[test]
    fn test_trainer_params() {
        let mut trainer = Trainer::new();
        trainer.set("c1", "0.5").unwrap();
        trainer.set("c2", "2.0").unwrap();
        assert_eq!(trainer.params().c1(), 0.5);
        assert_eq!(trainer.params().c2(), 2.0);
        assert_eq!(trainer.get("c1").unwrap(), "0.5");
        assert!(trainer.params_mut().set_c1(-0.5).is_err());
    }
}
