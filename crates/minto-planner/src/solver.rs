//! NLP solver interface
//!
//! The solver is an external collaborator behind [`NlpSolver`]: it
//! receives the assembled NLP and returns either concrete values for
//! every decision variable or a convergence failure. The transcription
//! layer never looks inside the solve.
//!
//! The built-in implementation is a first-order augmented Lagrangian
//! method: equality constraints carry explicit multiplier estimates,
//! inequality constraints use the Powell-Hestenes-Rockafellar shifted
//! penalty, and each subproblem is minimized with L-BFGS. It talks to
//! the problem only through the generic [`Nlp`] interface, so the
//! block-sparse Jacobian structure stays with the problem side.

use std::collections::VecDeque;

use log::{debug, info, warn};
use nalgebra::DVector;
use thiserror::Error;

use crate::nlp::{ConstraintKind, Nlp};

/// Solver errors
#[derive(Debug, Error)]
pub enum SolveError {
    #[error("solver did not converge after {iterations} iterations (constraint violation {violation:.3e})")]
    ConvergenceFailure {
        /// Total inner iterations spent
        iterations: usize,
        /// Worst constraint violation at the last iterate
        violation: f64,
        /// Last primal iterate, for diagnostics only
        last_iterate: Option<DVector<f64>>,
    },
    #[error("initial guess has {got} entries but the NLP declares {expected} variables")]
    DimensionMismatch { expected: usize, got: usize },
}

/// Statistics from a solve
#[derive(Debug, Clone, Copy, Default)]
pub struct SolveStatistics {
    /// Outer (multiplier-update) iterations
    pub outer_iterations: usize,
    /// Total inner (L-BFGS) iterations
    pub inner_iterations: usize,
    /// Objective value at the solution
    pub objective: f64,
    /// Worst constraint violation at the solution
    pub constraint_violation: f64,
    /// Infinity norm of the augmented Lagrangian gradient at the solution
    pub gradient_norm: f64,
}

/// A successful solve: values for every declared decision variable
#[derive(Debug, Clone)]
pub struct NlpSolution {
    pub variables: DVector<f64>,
    pub objective: f64,
    pub stats: SolveStatistics,
}

/// The solve boundary consumed by the transcription layer
pub trait NlpSolver {
    fn solve(&self, nlp: &Nlp) -> Result<NlpSolution, SolveError>;
}

/// Configuration for a solve
#[derive(Debug, Clone, Copy)]
pub struct SolveOptions {
    /// Acceptable worst constraint violation
    pub tolerance: f64,
    /// Acceptable augmented Lagrangian gradient norm (stationarity)
    pub gradient_tolerance: f64,
    /// Maximum outer (multiplier-update) iterations
    pub max_outer_iterations: usize,
    /// Maximum L-BFGS iterations per subproblem
    pub max_inner_iterations: usize,
    /// Initial quadratic penalty weight
    pub initial_penalty: f64,
    /// Penalty growth factor when feasibility stalls
    pub penalty_growth: f64,
    /// Penalty ceiling
    pub max_penalty: f64,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            gradient_tolerance: 1e-4,
            max_outer_iterations: 50,
            max_inner_iterations: 2000,
            initial_penalty: 10.0,
            penalty_growth: 10.0,
            max_penalty: 1e8,
        }
    }
}

/// First-order augmented Lagrangian NLP solver
#[derive(Debug, Clone, Default)]
pub struct AugmentedLagrangianSolver {
    pub options: SolveOptions,
}

impl AugmentedLagrangianSolver {
    pub fn new(options: SolveOptions) -> Self {
        Self { options }
    }
}

impl NlpSolver for AugmentedLagrangianSolver {
    fn solve(&self, nlp: &Nlp) -> Result<NlpSolution, SolveError> {
        let opts = &self.options;
        if nlp.initial_guess.len() != nlp.num_variables {
            return Err(SolveError::DimensionMismatch {
                expected: nlp.num_variables,
                got: nlp.initial_guess.len(),
            });
        }

        let mut x = nlp.initial_guess.clone();
        let mut multipliers: Vec<DVector<f64>> = nlp
            .constraints
            .iter()
            .map(|block| DVector::zeros(block.dim()))
            .collect();
        let mut penalty = opts.initial_penalty;
        let mut previous_violation = f64::INFINITY;
        let mut inner_total = 0;
        let mut violation = nlp.max_violation(&x);
        let mut gradient_norm = f64::INFINITY;

        for outer in 0..opts.max_outer_iterations {
            // Solve the subproblem loosely while far from feasible,
            // tightly once the constraints are nearly met.
            let inner_tolerance = opts
                .gradient_tolerance
                .max((0.1 * previous_violation).min(1e-2));

            let mut evaluator = AugmentedLagrangian {
                nlp,
                multipliers: &multipliers,
                penalty,
                residual: Vec::new(),
            };
            let result = lbfgs_minimize(
                &mut x,
                opts.max_inner_iterations,
                inner_tolerance,
                |point, grad| evaluator.value_and_gradient(point, grad),
            );
            inner_total += result.iterations;
            gradient_norm = result.gradient_norm;
            violation = nlp.max_violation(&x);

            debug!(
                "auglag outer {outer}: violation {violation:.3e}, gradient {gradient_norm:.3e}, penalty {penalty:.1e}"
            );

            if violation <= opts.tolerance && gradient_norm <= opts.gradient_tolerance {
                let objective = nlp.objective.eval(&x);
                info!(
                    "auglag converged: objective {objective:.6}, violation {violation:.3e}, {inner_total} inner iterations"
                );
                return Ok(NlpSolution {
                    variables: x,
                    objective,
                    stats: SolveStatistics {
                        outer_iterations: outer + 1,
                        inner_iterations: inner_total,
                        objective,
                        constraint_violation: violation,
                        gradient_norm,
                    },
                });
            }

            if violation <= 0.25 * previous_violation || violation <= opts.tolerance {
                update_multipliers(nlp, &x, &mut multipliers, penalty);
                previous_violation = violation;
            } else {
                penalty = (penalty * opts.penalty_growth).min(opts.max_penalty);
            }
        }

        warn!(
            "auglag gave up after {inner_total} inner iterations: violation {violation:.3e}, gradient {gradient_norm:.3e}"
        );
        Err(SolveError::ConvergenceFailure {
            iterations: inner_total,
            violation,
            last_iterate: Some(x),
        })
    }
}

/// Augmented Lagrangian value and gradient for fixed multipliers
struct AugmentedLagrangian<'a> {
    nlp: &'a Nlp,
    multipliers: &'a [DVector<f64>],
    penalty: f64,
    residual: Vec<f64>,
}

impl AugmentedLagrangian<'_> {
    fn value_and_gradient(&mut self, x: &DVector<f64>, grad: &mut DVector<f64>) -> f64 {
        grad.fill(0.0);
        let mut value = self.nlp.objective.eval(x);
        self.nlp.objective.gradient(x, grad);

        for (block, lambda) in self.nlp.constraints.iter().zip(self.multipliers) {
            let dim = block.dim();
            self.residual.resize(dim, 0.0);
            block.function.eval(x, &mut self.residual);

            // Turn residuals into the weights of the Jacobian-transpose
            // product in place.
            match block.kind {
                ConstraintKind::Equality => {
                    for row in 0..dim {
                        let c = self.residual[row];
                        value += lambda[row] * c + 0.5 * self.penalty * c * c;
                        self.residual[row] = lambda[row] + self.penalty * c;
                    }
                }
                ConstraintKind::Inequality => {
                    for row in 0..dim {
                        let shifted = lambda[row] + self.penalty * self.residual[row];
                        if shifted > 0.0 {
                            value +=
                                (shifted * shifted - lambda[row] * lambda[row]) / (2.0 * self.penalty);
                            self.residual[row] = shifted;
                        } else {
                            value -= lambda[row] * lambda[row] / (2.0 * self.penalty);
                            self.residual[row] = 0.0;
                        }
                    }
                }
            }

            block
                .function
                .jacobian_transpose_product(x, &self.residual, grad);
        }

        value
    }
}

/// First-order multiplier updates at the current iterate
fn update_multipliers(
    nlp: &Nlp,
    x: &DVector<f64>,
    multipliers: &mut [DVector<f64>],
    penalty: f64,
) {
    let mut residual = Vec::new();
    for (block, lambda) in nlp.constraints.iter().zip(multipliers) {
        let dim = block.dim();
        residual.resize(dim, 0.0);
        block.function.eval(x, &mut residual);
        for row in 0..dim {
            match block.kind {
                ConstraintKind::Equality => lambda[row] += penalty * residual[row],
                ConstraintKind::Inequality => {
                    lambda[row] = (lambda[row] + penalty * residual[row]).max(0.0);
                }
            }
        }
    }
}

struct InnerResult {
    iterations: usize,
    gradient_norm: f64,
}

/// Limited-memory BFGS with backtracking Armijo line search
fn lbfgs_minimize<F>(
    x: &mut DVector<f64>,
    max_iterations: usize,
    gradient_tolerance: f64,
    mut value_and_gradient: F,
) -> InnerResult
where
    F: FnMut(&DVector<f64>, &mut DVector<f64>) -> f64,
{
    const HISTORY: usize = 10;
    const ARMIJO: f64 = 1e-4;
    const MAX_BACKTRACKS: usize = 60;

    let n = x.len();
    let mut grad = DVector::zeros(n);
    let mut value = value_and_gradient(x, &mut grad);
    let mut history: VecDeque<(DVector<f64>, DVector<f64>, f64)> = VecDeque::new();

    for iteration in 0..max_iterations {
        let gradient_norm = grad.amax();
        if gradient_norm <= gradient_tolerance {
            return InnerResult {
                iterations: iteration,
                gradient_norm,
            };
        }

        // Two-loop recursion
        let mut direction = grad.clone();
        let mut alphas = vec![0.0; history.len()];
        for (idx, (s, y, rho)) in history.iter().enumerate().rev() {
            let alpha = rho * s.dot(&direction);
            direction.axpy(-alpha, y, 1.0);
            alphas[idx] = alpha;
        }
        if let Some((s, y, _)) = history.back() {
            direction *= s.dot(y) / y.dot(y);
        }
        for (idx, (s, y, rho)) in history.iter().enumerate() {
            let beta = rho * y.dot(&direction);
            direction.axpy(alphas[idx] - beta, s, 1.0);
        }
        direction = -direction;

        let mut directional = grad.dot(&direction);
        if directional >= 0.0 {
            // Curvature information went stale; fall back to steepest descent.
            history.clear();
            direction = -&grad;
            directional = -grad.norm_squared();
        }

        let mut step = if history.is_empty() {
            (1.0 / gradient_norm.max(1.0)).min(1.0)
        } else {
            1.0
        };

        let base = x.clone();
        let mut accepted = false;
        for _ in 0..MAX_BACKTRACKS {
            let candidate = &base + &direction * step;
            let mut candidate_grad = DVector::zeros(n);
            let candidate_value = value_and_gradient(&candidate, &mut candidate_grad);

            // NaN compares false, so a bad trial point just shrinks the step.
            if candidate_value <= value + ARMIJO * step * directional {
                let s = &candidate - &base;
                let y = &candidate_grad - &grad;
                let sy = s.dot(&y);
                if sy > 1e-10 * s.norm() * y.norm() {
                    history.push_back((s, y, 1.0 / sy));
                    if history.len() > HISTORY {
                        history.pop_front();
                    }
                }
                *x = candidate;
                grad = candidate_grad;
                value = candidate_value;
                accepted = true;
                break;
            }
            step *= 0.5;
        }

        if !accepted {
            if !history.is_empty() {
                // Retry the next round from steepest descent.
                history.clear();
                continue;
            }
            // No progress possible at this scale.
            return InnerResult {
                iterations: iteration + 1,
                gradient_norm: grad.amax(),
            };
        }
    }

    InnerResult {
        iterations: max_iterations,
        gradient_norm: grad.amax(),
    }
}
