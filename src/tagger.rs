use crate::dataset::Instance;
use crate::error::{Error, Result};
use crate::feature::AttributeIndex;
use crate::lattice::Lattice;
use crate::model::Model;
use crate::weights::Weights;

/// The tagger provides the functionality for predicting label sequences for input sequences using a model
#[derive(Debug, Clone)]
pub struct Tagger<'a> {
    model: &'a Model,
    index: AttributeIndex,
    weights: Weights,
}

impl<'a> Tagger<'a> {
    pub(crate) fn new(model: &'a Model) -> Result<Self> {
        Ok(Self {
            model,
            index: model.index(),
            weights: model.snapshot()?,
        })
    }

    /// Map attribute names to ids; attributes the model has never seen are dropped.
    fn encode<I, S>(&self, xseq: &[I]) -> Instance
    where
        I: AsRef<[S]>,
        S: AsRef<str>,
    {
        let items = xseq
            .iter()
            .map(|item| {
                item.as_ref()
                    .iter()
                    .filter_map(|attr| self.model.to_attr_id(attr.as_ref()))
                    .collect()
            })
            .collect();
        Instance::unlabeled(items)
    }

    fn lattice<I, S>(&self, xseq: &[I]) -> Result<Lattice>
    where
        I: AsRef<[S]>,
        S: AsRef<str>,
    {
        let instance = self.encode(xseq);
        let mut lattice = Lattice::build(&self.index, &instance, self.model.num_labels())?;
        lattice.compute_potentials(&self.weights)?;
        Ok(lattice)
    }

    /// Predict the label sequence for the item sequence.
    pub fn tag<I, S>(&self, xseq: &[I]) -> Result<Vec<&'a str>>
    where
        I: AsRef<[S]>,
        S: AsRef<str>,
    {
        if xseq.is_empty() {
            return Ok(Vec::new());
        }
        let lattice = self.lattice(xseq)?;
        let (label_ids, _score) = lattice.viterbi()?;
        label_ids
            .into_iter()
            .map(|id| {
                self.model.to_label(id).ok_or(Error::LabelOutOfRange {
                    label: id,
                    num_labels: self.model.num_labels(),
                })
            })
            .collect()
    }

    /// Posterior label distribution at every position, `[position][label id]`.
    pub fn marginals<I, S>(&self, xseq: &[I]) -> Result<Vec<Vec<f64>>>
    where
        I: AsRef<[S]>,
        S: AsRef<str>,
    {
        if xseq.is_empty() {
            return Ok(Vec::new());
        }
        let mut lattice = self.lattice(xseq)?;
        lattice.infer()?;
        lattice.marginals()
    }

    /// Conditional probability of the label sequence `yseq` given `xseq`.
    pub fn probability<I, S, L>(&self, xseq: &[I], yseq: &[L]) -> Result<f64>
    where
        I: AsRef<[S]>,
        S: AsRef<str>,
        L: AsRef<str>,
    {
        let labels = yseq
            .iter()
            .map(|y| {
                self.model
                    .to_label_id(y.as_ref())
                    .ok_or_else(|| Error::invalid(format!("unknown label: {}", y.as_ref())))
            })
            .collect::<Result<Vec<_>>>()?;
        let mut lattice = self.lattice(xseq)?;
        lattice.infer()?;
        Ok(lattice.log_likelihood(&labels)?.exp())
    }
}
