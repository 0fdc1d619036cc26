use std::str::FromStr;
use std::sync::atomic::Ordering;

use super::super::batch::{Batch, Objective};
use super::Trainer;
use crate::error::{Error, Result};
use crate::feature::{AttributeIndex, FeatureIndex};

/// Line search algorithm for L-BFGS optimization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineSearchAlgorithm {
    /// More-Thuente line search
    #[default]
    MoreThuente,
    /// Backtracking with Armijo condition
    BacktrackingArmijo,
    /// Backtracking with Wolfe condition
    BacktrackingWolfe,
    /// Backtracking with strong Wolfe condition
    BacktrackingStrongWolfe,
}

impl LineSearchAlgorithm {
    fn to_liblbfgs_str(self) -> &'static str {
        match self {
            Self::MoreThuente => "MoreThuente",
            Self::BacktrackingArmijo => "BacktrackingArmijo",
            Self::BacktrackingWolfe => "BacktrackingWolfe",
            Self::BacktrackingStrongWolfe => "BacktrackingStrongWolfe",
        }
    }
}

impl FromStr for LineSearchAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "MoreThuente" => Ok(Self::MoreThuente),
            "BacktrackingArmijo" => Ok(Self::BacktrackingArmijo),
            "BacktrackingWolfe" | "Backtracking" => Ok(Self::BacktrackingWolfe),
            "BacktrackingStrongWolfe" => Ok(Self::BacktrackingStrongWolfe),
            _ => Err(Error::invalid(format!("unknown line search algorithm: {}", s))),
        }
    }
}

/// L-BFGS training parameters.
#[derive(Debug, Clone)]
pub struct LbfgsParams {
    c1: f64,
    c2: f64,
    max_iterations: usize,
    epsilon: f64,
    period: usize,
    delta: f64,
    linesearch: LineSearchAlgorithm,
    max_linesearch: usize,
}

impl Default for LbfgsParams {
    fn default() -> Self {
        Self {
            c1: 0.0,
            c2: 1.0,
            max_iterations: usize::MAX,
            epsilon: 1e-5,
            period: 10,
            delta: 1e-5,
            linesearch: LineSearchAlgorithm::default(),
            max_linesearch: 20,
        }
    }
}

fn parse<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::invalid(format!("invalid value for {}: {}", name, value)))
}

impl LbfgsParams {
    pub fn c1(&self) -> f64 {
        self.c1
    }

    /// Coefficient of L1 regularization; a positive value switches to OWL-QN.
    pub fn set_c1(&mut self, c1: f64) -> Result<()> {
        if c1.is_nan() || c1 < 0.0 {
            return Err(Error::invalid("c1 must be non-negative"));
        }
        self.c1 = c1;
        Ok(())
    }

    pub fn c2(&self) -> f64 {
        self.c2
    }

    /// Coefficient of L2 regularization.
    pub fn set_c2(&mut self, c2: f64) -> Result<()> {
        if c2.is_nan() || c2 < 0.0 {
            return Err(Error::invalid("c2 must be non-negative"));
        }
        self.c2 = c2;
        Ok(())
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn set_max_iterations(&mut self, max_iterations: usize) -> Result<()> {
        if max_iterations < 1 {
            return Err(Error::invalid("max_iterations must be at least 1"));
        }
        self.max_iterations = max_iterations;
        Ok(())
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn set_epsilon(&mut self, epsilon: f64) -> Result<()> {
        if epsilon.is_nan() || epsilon < 0.0 {
            return Err(Error::invalid("epsilon must be non-negative"));
        }
        self.epsilon = epsilon;
        Ok(())
    }

    pub fn period(&self) -> usize {
        self.period
    }

    /// Set the period for delta-based convergence test.
    ///
    /// Setting period to 0 disables the delta-based convergence test
    /// (only gradient-based epsilon test is used).
    pub fn set_period(&mut self, period: usize) {
        self.period = period;
    }

    pub fn delta(&self) -> f64 {
        self.delta
    }

    pub fn set_delta(&mut self, delta: f64) -> Result<()> {
        if delta.is_nan() || delta < 0.0 {
            return Err(Error::invalid("delta must be non-negative"));
        }
        self.delta = delta;
        Ok(())
    }

    pub fn linesearch(&self) -> LineSearchAlgorithm {
        self.linesearch
    }

    pub fn set_linesearch(&mut self, linesearch: LineSearchAlgorithm) {
        self.linesearch = linesearch;
    }

    pub fn max_linesearch(&self) -> usize {
        self.max_linesearch
    }

    pub fn set_max_linesearch(&mut self, max_linesearch: usize) -> Result<()> {
        if max_linesearch == 0 {
            return Err(Error::invalid("max_linesearch must be positive"));
        }
        self.max_linesearch = max_linesearch;
        Ok(())
    }

    /// Set a parameter by name from its string value.
    pub fn set(&mut self, name: &str, value: &str) -> Result<()> {
        match name {
            "c1" => self.set_c1(parse(name, value)?),
            "c2" => self.set_c2(parse(name, value)?),
            "max_iterations" => self.set_max_iterations(parse(name, value)?),
            "epsilon" => self.set_epsilon(parse(name, value)?),
            "period" => {
                self.set_period(parse(name, value)?);
                Ok(())
            }
            "delta" => self.set_delta(parse(name, value)?),
            "linesearch" => {
                self.set_linesearch(value.parse()?);
                Ok(())
            }
            "max_linesearch" => self.set_max_linesearch(parse(name, value)?),
            _ => Err(Error::UnknownParameter(name.to_string())),
        }
    }

    /// Get a parameter value by name, formatted as a string.
    pub fn get(&self, name: &str) -> Result<String> {
        let value = match name {
            "c1" => self.c1.to_string(),
            "c2" => self.c2.to_string(),
            "max_iterations" => self.max_iterations.to_string(),
            "epsilon" => self.epsilon.to_string(),
            "period" => self.period.to_string(),
            "delta" => self.delta.to_string(),
            "linesearch" => self.linesearch.to_liblbfgs_str().to_string(),
            "max_linesearch" => self.max_linesearch.to_string(),
            _ => return Err(Error::UnknownParameter(name.to_string())),
        };
        Ok(value)
    }
}

impl Trainer {
    /// Fit the weights with L-BFGS and return them in `feature * num_labels + label` layout.
    pub(super) fn train_lbfgs(&self, index: &AttributeIndex) -> Result<Vec<f64>> {
        let num_labels = self.labels.len();
        let batch = Batch::build(index, &self.instances, num_labels);
        if batch.rejected() > 0 {
            log::warn!("{} instances rejected", batch.rejected());
        }
        let mut objective = Objective::new(batch, self.params.c2())?;
        let mut weights = vec![0.0; objective.dimension()];

        let c1 = self.params.c1();
        let cancel = self.cancel.clone();
        let mut failure: Option<Error> = None;

        // Objective function: negative log-likelihood + L2 regularization
        let evaluate = |x: &[f64], gx: &mut [f64]| -> anyhow::Result<f64> {
            match objective.evaluate(x, gx) {
                Ok(loss) => Ok(loss),
                Err(e) => {
                    let msg = e.to_string();
                    failure = Some(e);
                    Err(anyhow::anyhow!(msg))
                }
            }
        };

        let progress = |prgr: &liblbfgs::Progress| -> bool {
            log::info!(
                "iteration {}: loss = {:.6}, ||x|| = {:.6}, ||g|| = {:.6}",
                prgr.niter,
                prgr.fx,
                prgr.xnorm,
                prgr.gnorm
            );
            let cancelled = cancel.load(Ordering::Relaxed);
            if cancelled {
                log::info!("training cancelled after iteration {}", prgr.niter);
            }
            cancelled
        };

        let mut lbfgs = liblbfgs::lbfgs()
            .with_max_iterations(self.params.max_iterations())
            .with_epsilon(self.params.epsilon())
            .with_fx_delta(self.params.delta(), self.params.period())
            .with_max_linesearch(self.params.max_linesearch());

        // OWL-QN only supports backtracking line search
        if c1 > 0.0 {
            lbfgs = lbfgs
                .with_linesearch_algorithm("BacktrackingStrongWolfe")
                .with_orthantwise(c1, 0, weights.len());
        } else {
            lbfgs = lbfgs.with_linesearch_algorithm(self.params.linesearch().to_liblbfgs_str());
        }

        let result = lbfgs.minimize(&mut weights, evaluate, progress);

        if let Some(e) = failure {
            return Err(e);
        }
        match result {
            Ok(report) => log::info!("final loss: {:.6}", report.fx),
            // Rounding errors and line-search exhaustion near the optimum
            // leave the last accepted point in `weights`.
            Err(e) => log::warn!("L-BFGS stopped early: {}", e),
        }

        if weights.iter().any(|w| !w.is_finite()) {
            return Err(Error::Optimizer("optimizer produced non-finite weights".to_string()));
        }
        log::debug!(
            "trained {} weights over {} features",
            weights.len(),
            index.num_features()
        );
        Ok(weights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_set_get() {
        let mut params = LbfgsParams::default();
        params.set("c1", "0.5").unwrap();
        params.set("max_iterations", "100").unwrap();
        params.set("linesearch", "BacktrackingArmijo").unwrap();
        params.set("period", "0").unwrap();
        assert_eq!(params.c1(), 0.5);
        assert_eq!(params.get("max_iterations").unwrap(), "100");
        assert_eq!(params.get("linesearch").unwrap(), "BacktrackingArmijo");
        assert_eq!(params.period(), 0);
    }

    #[test]
    fn test_params_validation() {
        let mut params = LbfgsParams::default();
        assert!(params.set_c2(-1.0).is_err());
        assert!(params.set_c2(f64::NAN).is_err());
        assert!(params.set_max_iterations(0).is_err());
        assert!(params.set_max_linesearch(0).is_err());
        assert!(params.set("linesearch", "Newton").is_err());
        assert!(matches!(
            params.set("nope", "1"),
            Err(Error::UnknownParameter(_))
        ));
        assert!(params.get("nope").is_err());
    }
}
