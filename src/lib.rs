//! Linear-chain Conditional Random Fields (CRF) on an explicit lattice
//!
//! Each sequence is unrolled into a lattice of label nodes and transition
//! edges. Inference runs log-domain forward-backward over the lattice and
//! yields the partition function, node and edge marginals, and model
//! expectations for the gradient of the conditional log-likelihood.
//!
//! # Examples
//!
//! ## Training
//!
//! ```no_run
//! use chaincrf::Trainer;
//!
//! let mut trainer = Trainer::new();
//! let xseq = vec![vec!["walk"], vec!["shop", "clean"]];
//! let yseq = vec!["sunny", "rainy"];
//! trainer.append(&xseq, &yseq)?;
//!
//! trainer.set("c2", "1.0")?;
//! trainer.train_to("model.json")?;
//! # Ok::<(), chaincrf::Error>(())
//! ```
//!
//! ## Prediction
//!
//! ```no_run
//! use chaincrf::Model;
//!
//! let model = Model::load("model.json")?;
//! let tagger = model.tagger()?;
//!
//! let xseq = vec![vec!["walk"], vec!["shop"]];
//! let result = tagger.tag(&xseq)?;
//! # Ok::<(), chaincrf::Error>(())
//! ```

mod dataset;
mod dictionary;
mod error;
mod expectation;
mod feature;
mod math;
mod model;
mod tagger;
mod weights;

/// Sequence lattice and forward-backward inference
pub mod lattice;
/// Training module containing the batch objective and the L-BFGS trainer
pub mod train;

pub use self::dataset::{Instance, Item};
pub use self::dictionary::Dictionary;
pub use self::error::{Error, Result};
pub use self::expectation::Expectation;
pub use self::feature::{AttributeIndex, FeatureIndex};
pub use self::lattice::{Edge, Lattice, Node, Phase};
pub use self::math::logsumexp;
pub use self::model::Model;
pub use self::tagger::Tagger;
pub use self::weights::Weights;

pub use self::train::Trainer;
