//! Cost models for search effort (nodes visited) as a function of K and N.
//!
//! Every model is fitted on trials whose search budget equals the pool size
//! (`B == N`), i.e. searches allowed to visit the whole graph. Parameters are
//! constrained to be non-negative and start from all ones.
//!
//! | Model             | Selection                 | Form                        |
//! |-------------------|---------------------------|-----------------------------|
//! | `cost_vs_K`       | `B == N`, `N` fixed       | `F = A + B·K^X`             |
//! | `cost_vs_N`       | `B == N`, `K` fixed       | `F = A + B·ln(N)^X`         |
//! | `cost_vs_N_and_K` | `B == N`                  | `F = A + B·ln(N)^X·K^Y`     |

pub mod solver;

use std::collections::HashSet;
use std::fmt;

use tracing::info;

use crate::error::{AnalysisError, Result};
use crate::record::Build;

pub use solver::{Bounds, LeastSquaresSolver, LevenbergMarquardt, ResidualProblem, Solution};

/// One observation: pool size, requested K and the nodes visited.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub n: u64,
    pub k: u64,
    pub cost: f64,
}

/// A named cost model together with the slice of data it is fitted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CostModel {
    /// Cost against K for the build with pool size `n`.
    CostVsK { n: u64 },
    /// Cost against N at requested result count `k`.
    CostVsN { k: u64 },
    /// Cost against N and K jointly.
    CostVsNAndK,
}

impl CostModel {
    pub fn name(&self) -> &'static str {
        match self {
            CostModel::CostVsK { .. } => "cost_vs_K",
            CostModel::CostVsN { .. } => "cost_vs_N",
            CostModel::CostVsNAndK => "cost_vs_N_and_K",
        }
    }

    pub fn parameter_names(&self) -> &'static [&'static str] {
        match self {
            CostModel::CostVsK { .. } | CostModel::CostVsN { .. } => &["A", "B", "X"],
            CostModel::CostVsNAndK => &["A", "B", "X", "Y"],
        }
    }

    pub fn parameter_count(&self) -> usize {
        self.parameter_names().len()
    }

    /// Trials this model is fitted on.
    pub fn select_samples(&self, builds: &[Build]) -> Vec<Sample> {
        builds
            .iter()
            .filter(|build| match self {
                CostModel::CostVsK { n } => build.n == *n,
                _ => true,
            })
            .flat_map(|build| {
                build
                    .full_budget_trials()
                    .filter(move |trial| match self {
                        CostModel::CostVsN { k } => trial.k == *k,
                        _ => true,
                    })
                    .map(move |trial| Sample {
                        n: build.n,
                        k: trial.k,
                        cost: trial.visited as f64,
                    })
            })
            .collect()
    }

    /// Number of distinct values of this model's independent variables.
    ///
    /// Repeated measurements at one design point add no information about
    /// the curve's shape.
    pub fn design_points(&self, samples: &[Sample]) -> usize {
        match self {
            CostModel::CostVsK { .. } => samples.iter().map(|s| s.k).collect::<HashSet<_>>().len(),
            CostModel::CostVsN { .. } => samples.iter().map(|s| s.n).collect::<HashSet<_>>().len(),
            CostModel::CostVsNAndK => samples
                .iter()
                .map(|s| (s.n, s.k))
                .collect::<HashSet<_>>()
                .len(),
        }
    }

    /// Predicted cost for `sample` under `params`.
    pub fn predict(&self, params: &[f64], sample: &Sample) -> f64 {
        let mut gradient = [0.0; 4];
        self.evaluate(params, sample, &mut gradient)
    }

    /// Value and parameter gradient at `sample`.
    fn evaluate(&self, params: &[f64], sample: &Sample, gradient: &mut [f64]) -> f64 {
        let (a, b) = (params[0], params[1]);
        let k = sample.k as f64;
        let log_n = (sample.n as f64).ln();

        let (scale, log_terms): (f64, [f64; 2]) = match self {
            CostModel::CostVsK { .. } => {
                let (kx, ln_k) = power(k, params[2]);
                (kx, [ln_k, 0.0])
            }
            CostModel::CostVsN { .. } => {
                let (lx, ln_l) = power(log_n, params[2]);
                (lx, [ln_l, 0.0])
            }
            CostModel::CostVsNAndK => {
                let (lx, ln_l) = power(log_n, params[2]);
                let (ky, ln_k) = power(k, params[3]);
                (lx * ky, [ln_l, ln_k])
            }
        };

        gradient[0] = 1.0;
        gradient[1] = scale;
        for (slot, log_term) in gradient[2..self.parameter_count()].iter_mut().zip(log_terms) {
            *slot = b * scale * log_term;
        }
        a + b * scale
    }

    /// Fit this model on the trials of `builds`.
    pub fn fit<S: LeastSquaresSolver + ?Sized>(
        &self,
        builds: &[Build],
        solver: &S,
    ) -> Result<FitReport> {
        let samples = self.select_samples(builds);
        self.fit_samples(&samples, solver)
    }

    /// Fit this model on already selected samples.
    pub fn fit_samples<S: LeastSquaresSolver + ?Sized>(
        &self,
        samples: &[Sample],
        solver: &S,
    ) -> Result<FitReport> {
        let required = self.parameter_count();
        let distinct = self.design_points(samples);
        if distinct < required {
            return Err(AnalysisError::InsufficientData {
                model: self.to_string(),
                samples: distinct,
                required,
            });
        }

        let problem = FitProblem {
            model: *self,
            samples,
        };
        let initial = vec![1.0; required];
        let solution = solver.solve(&problem, &initial, &Bounds::non_negative(required))?;

        let rmse = (2.0 * solution.cost / samples.len() as f64).sqrt();
        info!(
            model = %self,
            samples = samples.len(),
            iterations = solution.iterations,
            rmse,
            "Fitted cost model"
        );

        Ok(FitReport {
            model: *self,
            parameters: self
                .parameter_names()
                .iter()
                .copied()
                .zip(solution.params)
                .collect(),
            samples: samples.len(),
            rmse,
            iterations: solution.iterations,
        })
    }
}

impl fmt::Display for CostModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CostModel::CostVsK { n } => write!(f, "{} (N={})", self.name(), n),
            CostModel::CostVsN { k } => write!(f, "{} (K={})", self.name(), k),
            CostModel::CostVsNAndK => f.write_str(self.name()),
        }
    }
}

/// `base^exp` and `ln(base)`, with the log taken as 0 for a zero base.
fn power(base: f64, exp: f64) -> (f64, f64) {
    let log = if base > 0.0 { base.ln() } else { 0.0 };
    (base.powf(exp), log)
}

/// Residuals `model(p, sample) - cost` over a sample set.
struct FitProblem<'a> {
    model: CostModel,
    samples: &'a [Sample],
}

impl ResidualProblem for FitProblem<'_> {
    fn parameter_count(&self) -> usize {
        self.model.parameter_count()
    }

    fn residual_count(&self) -> usize {
        self.samples.len()
    }

    fn residuals(&self, params: &[f64], out: &mut [f64]) {
        for (slot, sample) in out.iter_mut().zip(self.samples) {
            *slot = self.model.predict(params, sample) - sample.cost;
        }
    }

    fn jacobian_row(&self, params: &[f64], row: usize, out: &mut [f64]) {
        self.model.evaluate(params, &self.samples[row], out);
    }
}

/// Fitted parameters of a cost model.
#[derive(Debug, Clone, PartialEq)]
pub struct FitReport {
    pub model: CostModel,
    pub parameters: Vec<(&'static str, f64)>,
    pub samples: usize,
    /// Root mean squared residual
    pub rmse: f64,
    pub iterations: usize,
}

impl FitReport {
    pub fn parameter(&self, name: &str) -> Option<f64> {
        self.parameters
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, v)| *v)
    }

    pub fn values(&self) -> Vec<f64> {
        self.parameters.iter().map(|(_, v)| *v).collect()
    }
}

impl fmt::Display for FitReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.model)?;
        for (name, value) in &self.parameters {
            write!(f, " {}={:.6}", name, value)?;
        }
        write!(f, " (samples={}, rmse={:.3})", self.samples, self.rmse)
    }
}
