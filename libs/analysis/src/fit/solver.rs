//! Bounded nonlinear least squares.
//!
//! [`LeastSquaresSolver`] is the seam the cost models fit through; any
//! routine that minimizes a sum of squared residuals within box bounds will
//! do. [`LevenbergMarquardt`] is the bundled implementation: damped
//! Gauss-Newton steps projected onto the bounds.

use tracing::debug;

use crate::error::{AnalysisError, Result};

/// A residual vector `r(p)` and its Jacobian.
pub trait ResidualProblem {
    /// Number of free parameters.
    fn parameter_count(&self) -> usize;

    /// Number of residuals (observations).
    fn residual_count(&self) -> usize;

    /// Write `r(params)` into `out` (length `residual_count`).
    fn residuals(&self, params: &[f64], out: &mut [f64]);

    /// Write row `row` of the Jacobian `dr/dp` into `out` (length `parameter_count`).
    fn jacobian_row(&self, params: &[f64], row: usize, out: &mut [f64]);
}

/// Box constraints on the parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl Bounds {
    /// Every parameter constrained to `[0, inf)`.
    pub fn non_negative(count: usize) -> Self {
        Self {
            lower: vec![0.0; count],
            upper: vec![f64::INFINITY; count],
        }
    }

    /// Clamp `params` into the box, in place.
    pub fn project(&self, params: &mut [f64]) {
        for (i, p) in params.iter_mut().enumerate() {
            *p = p.clamp(self.lower[i], self.upper[i]);
        }
    }

    fn at_bound(&self, i: usize, value: f64, gradient: f64) -> bool {
        (value <= self.lower[i] && gradient > 0.0) || (value >= self.upper[i] && gradient < 0.0)
    }
}

/// Result of a successful minimization.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub params: Vec<f64>,
    /// Half the sum of squared residuals at `params`
    pub cost: f64,
    pub iterations: usize,
}

/// The fitting capability: minimize `0.5 * |r(p)|^2` within `bounds`
/// starting from `initial`.
pub trait LeastSquaresSolver {
    fn solve(
        &self,
        problem: &dyn ResidualProblem,
        initial: &[f64],
        bounds: &Bounds,
    ) -> Result<Solution>;
}

/// Projected Levenberg-Marquardt.
#[derive(Debug, Clone)]
pub struct LevenbergMarquardt {
    pub max_iterations: usize,
    /// Relative cost reduction below which the fit has converged
    pub ftol: f64,
    /// Relative step size below which the fit has converged
    pub xtol: f64,
    /// Projected gradient norm below which the fit has converged
    pub gtol: f64,
    pub initial_lambda: f64,
}

impl Default for LevenbergMarquardt {
    fn default() -> Self {
        Self {
            max_iterations: 5000,
            ftol: 1e-12,
            xtol: 1e-12,
            gtol: 1e-10,
            initial_lambda: 1e-3,
        }
    }
}

impl LevenbergMarquardt {
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_tolerances(mut self, ftol: f64, xtol: f64, gtol: f64) -> Self {
        self.ftol = ftol;
        self.xtol = xtol;
        self.gtol = gtol;
        self
    }
}

const MAX_LAMBDA: f64 = 1e16;
const MIN_LAMBDA: f64 = 1e-15;

fn half_squared_norm(r: &[f64]) -> f64 {
    0.5 * r.iter().map(|v| v * v).sum::<f64>()
}

impl LeastSquaresSolver for LevenbergMarquardt {
    fn solve(
        &self,
        problem: &dyn ResidualProblem,
        initial: &[f64],
        bounds: &Bounds,
    ) -> Result<Solution> {
        let p = problem.parameter_count();
        let m = problem.residual_count();

        let mut params = initial.to_vec();
        bounds.project(&mut params);

        let mut residuals = vec![0.0; m];
        problem.residuals(&params, &mut residuals);
        let mut cost = half_squared_norm(&residuals);
        if !cost.is_finite() {
            return Err(AnalysisError::Convergence {
                iterations: 0,
                reason: "residuals are not finite at the initial guess".to_string(),
            });
        }

        let mut lambda = self.initial_lambda;
        let mut row = vec![0.0; p];
        let mut candidate_residuals = vec![0.0; m];

        for iteration in 1..=self.max_iterations {
            // Normal equations: (J^T J) delta = -J^T r
            let mut jtj = vec![vec![0.0; p]; p];
            let mut gradient = vec![0.0; p];
            for i in 0..m {
                problem.jacobian_row(&params, i, &mut row);
                for a in 0..p {
                    gradient[a] += row[a] * residuals[i];
                    for b in 0..p {
                        jtj[a][b] += row[a] * row[b];
                    }
                }
            }

            // Parameters pinned at a bound by the descent direction stay fixed
            // for this iteration.
            let active: Vec<bool> = (0..p)
                .map(|i| bounds.at_bound(i, params[i], gradient[i]))
                .collect();
            let projected_gradient = gradient
                .iter()
                .zip(&active)
                .filter(|(_, pinned)| !**pinned)
                .map(|(g, _)| g.abs())
                .fold(0.0, f64::max);
            if projected_gradient <= self.gtol {
                return Ok(Solution {
                    params,
                    cost,
                    iterations: iteration,
                });
            }

            loop {
                let mut damped = jtj.clone();
                let mut rhs: Vec<f64> = gradient.iter().map(|g| -g).collect();
                for i in 0..p {
                    if active[i] {
                        for j in 0..p {
                            damped[i][j] = 0.0;
                            damped[j][i] = 0.0;
                        }
                        damped[i][i] = 1.0;
                        rhs[i] = 0.0;
                    } else {
                        damped[i][i] += lambda * jtj[i][i].max(1e-12);
                    }
                }

                let Some(step) = solve_linear_system(damped, rhs) else {
                    lambda *= 10.0;
                    if lambda > MAX_LAMBDA {
                        return Err(AnalysisError::Convergence {
                            iterations: iteration,
                            reason: "normal equations are singular".to_string(),
                        });
                    }
                    continue;
                };

                let mut candidate: Vec<f64> =
                    params.iter().zip(&step).map(|(x, d)| x + d).collect();
                bounds.project(&mut candidate);

                problem.residuals(&candidate, &mut candidate_residuals);
                let candidate_cost = half_squared_norm(&candidate_residuals);

                if candidate_cost.is_finite() && candidate_cost < cost {
                    let reduction = cost - candidate_cost;
                    let step_norm = params
                        .iter()
                        .zip(&candidate)
                        .map(|(a, b)| (a - b).powi(2))
                        .sum::<f64>()
                        .sqrt();
                    let param_norm = candidate.iter().map(|v| v * v).sum::<f64>().sqrt();

                    params = candidate;
                    std::mem::swap(&mut residuals, &mut candidate_residuals);
                    cost = candidate_cost;
                    lambda = (lambda / 10.0).max(MIN_LAMBDA);

                    if reduction <= self.ftol * cost.max(f64::MIN_POSITIVE)
                        || step_norm <= self.xtol * (param_norm + self.xtol)
                    {
                        debug!(iteration, cost, "Least squares converged");
                        return Ok(Solution {
                            params,
                            cost,
                            iterations: iteration,
                        });
                    }
                    break;
                }

                lambda *= 10.0;
                if lambda > MAX_LAMBDA {
                    // No damped step improves the cost: a stationary point
                    // within the bounds.
                    debug!(iteration, cost, "Least squares stalled at a minimum");
                    return Ok(Solution {
                        params,
                        cost,
                        iterations: iteration,
                    });
                }
            }
        }

        Err(AnalysisError::Convergence {
            iterations: self.max_iterations,
            reason: format!("iteration limit reached with cost {cost:.6e}"),
        })
    }
}

/// Solve `a x = b` by Gaussian elimination with partial pivoting.
///
/// Returns `None` when `a` is singular.
fn solve_linear_system(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < 1e-300 || !a[pivot][col].is_finite() {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for r in col + 1..n {
            let factor = a[r][col] / a[col][col];
            for c in col..n {
                a[r][c] -= factor * a[col][c];
            }
            b[r] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for r in (0..n).rev() {
        let tail: f64 = (r + 1..n).map(|c| a[r][c] * x[c]).sum();
        x[r] = (b[r] - tail) / a[r][r];
    }
    x.iter().all(|v| v.is_finite()).then_some(x)
}
