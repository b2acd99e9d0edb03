//! Nonlinear program assembly
//!
//! The data handed across the solver boundary: decision variables, an
//! objective, constraint blocks tagged equality/inequality, and an
//! initial guess. A solver sees nothing else of the planning problem.
//!
//! Derivatives are exposed through Jacobian-transpose products rather
//! than assembled matrices, so the block-sparse structure of the
//! transcription (each defect touches one state pair, one control and
//! the shared time variable) never gets flattened into a dense Jacobian.

use nalgebra::DVector;

/// Constraint sense
///
/// `Equality` blocks require c(x) = 0; `Inequality` blocks require
/// g(x) ≤ 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Equality,
    Inequality,
}

/// A vector-valued constraint with analytic derivatives
pub trait ConstraintFunction {
    /// Number of rows in this block
    fn dim(&self) -> usize;

    /// Write the residual c(x) (or g(x)) into `out`, which has `dim()` rows
    fn eval(&self, x: &DVector<f64>, out: &mut [f64]);

    /// Accumulate `grad += Jᵀ·weights`, where J is this block's Jacobian
    fn jacobian_transpose_product(&self, x: &DVector<f64>, weights: &[f64], grad: &mut DVector<f64>);
}

/// A scalar objective with analytic gradient
pub trait ObjectiveFunction {
    fn eval(&self, x: &DVector<f64>) -> f64;

    /// Accumulate `grad += ∇f(x)`
    fn gradient(&self, x: &DVector<f64>, grad: &mut DVector<f64>);
}

/// One named constraint block of the NLP
pub struct ConstraintBlock {
    /// Name for diagnostics (e.g. `defect_17`, `force_bound_3`)
    pub name: String,
    pub kind: ConstraintKind,
    pub function: Box<dyn ConstraintFunction>,
}

impl ConstraintBlock {
    pub fn dim(&self) -> usize {
        self.function.dim()
    }
}

/// A fully assembled nonlinear program
///
/// Everything a solver needs; nothing may be added or resized after
/// assembly.
pub struct Nlp {
    pub num_variables: usize,
    pub objective: Box<dyn ObjectiveFunction>,
    pub constraints: Vec<ConstraintBlock>,
    pub initial_guess: DVector<f64>,
}

impl Nlp {
    /// Total number of scalar constraint rows across all blocks
    pub fn num_constraint_rows(&self) -> usize {
        self.constraints.iter().map(|b| b.dim()).sum()
    }

    /// Worst constraint violation at a point
    ///
    /// Equality rows contribute |c|, inequality rows contribute
    /// max(0, g). Zero means feasible.
    pub fn max_violation(&self, x: &DVector<f64>) -> f64 {
        let mut worst = 0.0_f64;
        let mut residual = Vec::new();
        for block in &self.constraints {
            residual.resize(block.dim(), 0.0);
            block.function.eval(x, &mut residual);
            for &row in residual.iter() {
                let violation = match block.kind {
                    ConstraintKind::Equality => row.abs(),
                    ConstraintKind::Inequality => row.max(0.0),
                };
                worst = worst.max(violation);
            }
        }
        worst
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SumConstraint;

    impl ConstraintFunction for SumConstraint {
        fn dim(&self) -> usize {
            1
        }

        fn eval(&self, x: &DVector<f64>, out: &mut [f64]) {
            out[0] = x[0] + x[1] - 1.0;
        }

        fn jacobian_transpose_product(
            &self,
            _x: &DVector<f64>,
            weights: &[f64],
            grad: &mut DVector<f64>,
        ) {
            grad[0] += weights[0];
            grad[1] += weights[0];
        }
    }

    struct ZeroObjective;

    impl ObjectiveFunction for ZeroObjective {
        fn eval(&self, _x: &DVector<f64>) -> f64 {
            0.0
        }

        fn gradient(&self, _x: &DVector<f64>, _grad: &mut DVector<f64>) {}
    }

    fn toy_nlp(kind: ConstraintKind) -> Nlp {
        Nlp {
            num_variables: 2,
            objective: Box::new(ZeroObjective),
            constraints: vec![ConstraintBlock {
                name: "sum".to_string(),
                kind,
                function: Box::new(SumConstraint),
            }],
            initial_guess: DVector::zeros(2),
        }
    }

    #[test]
    fn test_equality_violation_is_absolute() {
        let nlp = toy_nlp(ConstraintKind::Equality);
        let x = DVector::from_vec(vec![0.0, 0.0]);
        assert_eq!(nlp.max_violation(&x), 1.0);

        let feasible = DVector::from_vec(vec![0.25, 0.75]);
        assert_eq!(nlp.max_violation(&feasible), 0.0);
    }

    #[test]
    fn test_inequality_violation_one_sided() {
        let nlp = toy_nlp(ConstraintKind::Inequality);

        // x0 + x1 - 1 = -1 <= 0: satisfied
        let inside = DVector::from_vec(vec![0.0, 0.0]);
        assert_eq!(nlp.max_violation(&inside), 0.0);

        // x0 + x1 - 1 = 1 > 0: violated by 1
        let outside = DVector::from_vec(vec![1.0, 1.0]);
        assert_eq!(nlp.max_violation(&outside), 1.0);
    }

    #[test]
    fn test_constraint_row_count() {
        let nlp = toy_nlp(ConstraintKind::Equality);
        assert_eq!(nlp.num_constraint_rows(), 1);
    }
}
