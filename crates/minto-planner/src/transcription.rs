//! Multiple-shooting transcription
//!
//! Translates the continuous-time minimum-time problem into a finite
//! NLP:
//!
//! ```text
//! minimize    T
//! subject to  x_{i+1} = Φ(x_i, u_i, T/N)    i = 0..N-1   (defects)
//!             ‖u_i‖² ≤ F_max²               i = 0..N-1   (force bound)
//!             x_0 = 0                                    (start: origin, at rest)
//!             x_N = goal
//!             T ≥ 0
//! ```
//!
//! where Φ is one RK4 step of the point-mass dynamics with zero-order-hold
//! control. One state variable per knot, one control per interval, one
//! shared scalar for the free flight time; the step size is T/N, so every
//! defect row depends on T in addition to its own (x, u) pair.
//!
//! The force bound is written on the squared norm to keep it smooth for
//! gradient-based solving.

use nalgebra::DVector;

use minto_core::dynamics::PointMass;
use minto_core::math::{rk4_step, rk4_step_with_sensitivity};
use minto_core::{Vec3, Vec6};

use crate::config::{ConfigError, ProblemConfig};
use crate::nlp::{ConstraintBlock, ConstraintFunction, ConstraintKind, Nlp, ObjectiveFunction};
use crate::solver::{NlpSolver, SolveError};
use crate::trajectory::Trajectory;

/// Index map for the flat decision vector
///
/// Layout: `[x_0 .. x_N | u_0 .. u_{N-1} | T]` with 6 scalars per state
/// and 3 per control. Fixed once the interval count is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariableLayout {
    num_intervals: usize,
}

impl VariableLayout {
    pub fn new(num_intervals: usize) -> Self {
        Self { num_intervals }
    }

    pub fn num_intervals(&self) -> usize {
        self.num_intervals
    }

    /// Number of state knots (N + 1)
    pub fn num_knots(&self) -> usize {
        self.num_intervals + 1
    }

    /// Total number of scalar decision variables
    pub fn num_variables(&self) -> usize {
        6 * self.num_knots() + 3 * self.num_intervals + 1
    }

    /// First scalar index of state knot `k`
    pub fn state_start(&self, knot: usize) -> usize {
        debug_assert!(knot <= self.num_intervals);
        6 * knot
    }

    /// First scalar index of control `i`
    pub fn control_start(&self, interval: usize) -> usize {
        debug_assert!(interval < self.num_intervals);
        6 * self.num_knots() + 3 * interval
    }

    /// Scalar index of the free total-time variable
    pub fn time_index(&self) -> usize {
        6 * self.num_knots() + 3 * self.num_intervals
    }

    pub fn state(&self, x: &DVector<f64>, knot: usize) -> Vec6 {
        let s = self.state_start(knot);
        Vec6::new(x[s], x[s + 1], x[s + 2], x[s + 3], x[s + 4], x[s + 5])
    }

    pub fn control(&self, x: &DVector<f64>, interval: usize) -> Vec3 {
        let s = self.control_start(interval);
        Vec3::new(x[s], x[s + 1], x[s + 2])
    }

    pub fn total_time(&self, x: &DVector<f64>) -> f64 {
        x[self.time_index()]
    }
}

/// Defect (continuity) constraint for one interval:
/// `x_{i+1} - Φ(x_i, u_i, T/N) = 0`
struct DefectConstraint {
    model: PointMass,
    layout: VariableLayout,
    interval: usize,
}

impl ConstraintFunction for DefectConstraint {
    fn dim(&self) -> usize {
        6
    }

    fn eval(&self, x: &DVector<f64>, out: &mut [f64]) {
        let state = self.layout.state(x, self.interval);
        let control = self.layout.control(x, self.interval);
        let h = self.layout.total_time(x) / self.layout.num_intervals() as f64;

        let propagated = rk4_step(&self.model, &state, &control, h);
        let next = self.layout.state(x, self.interval + 1);
        for row in 0..6 {
            out[row] = next[row] - propagated[row];
        }
    }

    fn jacobian_transpose_product(
        &self,
        x: &DVector<f64>,
        weights: &[f64],
        grad: &mut DVector<f64>,
    ) {
        let state = self.layout.state(x, self.interval);
        let control = self.layout.control(x, self.interval);
        let n = self.layout.num_intervals() as f64;
        let h = self.layout.total_time(x) / n;

        let (_, sens) = rk4_step_with_sensitivity(&self.model, &state, &control, h);
        let w = Vec6::from_row_slice(weights);

        // ∂c/∂x_{i+1} = I
        let next_start = self.layout.state_start(self.interval + 1);
        for row in 0..6 {
            grad[next_start + row] += w[row];
        }

        // ∂c/∂x_i = -∂Φ/∂x
        let wrt_state = sens.wrt_state.transpose() * w;
        let state_start = self.layout.state_start(self.interval);
        for row in 0..6 {
            grad[state_start + row] -= wrt_state[row];
        }

        // ∂c/∂u_i = -∂Φ/∂u
        let wrt_control = sens.wrt_control.transpose() * w;
        let control_start = self.layout.control_start(self.interval);
        for row in 0..3 {
            grad[control_start + row] -= wrt_control[row];
        }

        // ∂c/∂T = -∂Φ/∂h · 1/N
        grad[self.layout.time_index()] -= sens.wrt_step.dot(&w) / n;
    }
}

/// Squared force-magnitude bound for one interval:
/// `‖u_i‖² - F_max² ≤ 0`
struct ForceBoundConstraint {
    layout: VariableLayout,
    interval: usize,
    max_force_squared: f64,
}

impl ConstraintFunction for ForceBoundConstraint {
    fn dim(&self) -> usize {
        1
    }

    fn eval(&self, x: &DVector<f64>, out: &mut [f64]) {
        let control = self.layout.control(x, self.interval);
        out[0] = control.norm_squared() - self.max_force_squared;
    }

    fn jacobian_transpose_product(
        &self,
        x: &DVector<f64>,
        weights: &[f64],
        grad: &mut DVector<f64>,
    ) {
        let control = self.layout.control(x, self.interval);
        let start = self.layout.control_start(self.interval);
        for row in 0..3 {
            grad[start + row] += 2.0 * control[row] * weights[0];
        }
    }
}

/// Pins one state knot to a fixed target: `x_k - target = 0`
struct BoundaryConstraint {
    layout: VariableLayout,
    knot: usize,
    target: Vec6,
}

impl ConstraintFunction for BoundaryConstraint {
    fn dim(&self) -> usize {
        6
    }

    fn eval(&self, x: &DVector<f64>, out: &mut [f64]) {
        let state = self.layout.state(x, self.knot);
        for row in 0..6 {
            out[row] = state[row] - self.target[row];
        }
    }

    fn jacobian_transpose_product(
        &self,
        _x: &DVector<f64>,
        weights: &[f64],
        grad: &mut DVector<f64>,
    ) {
        let start = self.layout.state_start(self.knot);
        for row in 0..6 {
            grad[start + row] += weights[row];
        }
    }
}

/// Keeps the free flight time non-negative: `-T ≤ 0`
struct TimePositivityConstraint {
    layout: VariableLayout,
}

impl ConstraintFunction for TimePositivityConstraint {
    fn dim(&self) -> usize {
        1
    }

    fn eval(&self, x: &DVector<f64>, out: &mut [f64]) {
        out[0] = -self.layout.total_time(x);
    }

    fn jacobian_transpose_product(
        &self,
        _x: &DVector<f64>,
        weights: &[f64],
        grad: &mut DVector<f64>,
    ) {
        grad[self.layout.time_index()] -= weights[0];
    }
}

/// Minimum-time objective: `f(x) = T`
struct MinimizeTime {
    layout: VariableLayout,
}

impl ObjectiveFunction for MinimizeTime {
    fn eval(&self, x: &DVector<f64>) -> f64 {
        self.layout.total_time(x)
    }

    fn gradient(&self, _x: &DVector<f64>, grad: &mut DVector<f64>) {
        grad[self.layout.time_index()] += 1.0;
    }
}

/// Assembles the NLP for one problem configuration
///
/// Construction validates the configuration (fail fast, before any
/// assembly); `build` then emits the complete NLP.
pub struct TranscriptionBuilder {
    config: ProblemConfig,
    model: PointMass,
}

impl TranscriptionBuilder {
    pub fn new(config: ProblemConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let model = PointMass::with_gravity(config.vehicle.mass, config.gravity);
        Ok(Self { config, model })
    }

    pub fn config(&self) -> &ProblemConfig {
        &self.config
    }

    /// Emit the fully specified NLP
    pub fn build(self) -> TranscribedProblem {
        let n = self.config.horizon.num_intervals;
        let layout = VariableLayout::new(n);
        let max_force = self.config.vehicle.max_force;

        let mut constraints = Vec::with_capacity(2 * n + 3);

        for interval in 0..n {
            constraints.push(ConstraintBlock {
                name: format!("defect_{interval}"),
                kind: ConstraintKind::Equality,
                function: Box::new(DefectConstraint {
                    model: self.model,
                    layout,
                    interval,
                }),
            });
        }

        for interval in 0..n {
            constraints.push(ConstraintBlock {
                name: format!("force_bound_{interval}"),
                kind: ConstraintKind::Inequality,
                function: Box::new(ForceBoundConstraint {
                    layout,
                    interval,
                    max_force_squared: max_force * max_force,
                }),
            });
        }

        // Start is pinned to the origin at rest
        constraints.push(ConstraintBlock {
            name: "initial_state".to_string(),
            kind: ConstraintKind::Equality,
            function: Box::new(BoundaryConstraint {
                layout,
                knot: 0,
                target: Vec6::zeros(),
            }),
        });

        constraints.push(ConstraintBlock {
            name: "terminal_state".to_string(),
            kind: ConstraintKind::Equality,
            function: Box::new(BoundaryConstraint {
                layout,
                knot: n,
                target: self.config.goal.to_vector(),
            }),
        });

        constraints.push(ConstraintBlock {
            name: "time_positive".to_string(),
            kind: ConstraintKind::Inequality,
            function: Box::new(TimePositivityConstraint { layout }),
        });

        // States and controls start at the solver default (zero); only
        // the free time variable needs a strictly positive seed.
        let mut initial_guess = DVector::zeros(layout.num_variables());
        initial_guess[layout.time_index()] = self.config.horizon.time_guess;

        let nlp = Nlp {
            num_variables: layout.num_variables(),
            objective: Box::new(MinimizeTime { layout }),
            constraints,
            initial_guess,
        };

        TranscribedProblem {
            nlp,
            layout,
            config: self.config,
            model: self.model,
        }
    }
}

/// An assembled, not-yet-solved problem
///
/// Consumed by `solve`; a new problem must be transcribed for a new
/// solve.
pub struct TranscribedProblem {
    nlp: Nlp,
    layout: VariableLayout,
    config: ProblemConfig,
    model: PointMass,
}

impl TranscribedProblem {
    pub fn nlp(&self) -> &Nlp {
        &self.nlp
    }

    pub fn layout(&self) -> VariableLayout {
        self.layout
    }

    pub fn config(&self) -> &ProblemConfig {
        &self.config
    }

    pub fn model(&self) -> &PointMass {
        &self.model
    }

    /// Hand the NLP to a solver and extract the resulting trajectory
    ///
    /// A convergence failure is surfaced verbatim; no retry is attempted
    /// here.
    pub fn solve<S: NlpSolver>(self, solver: &S) -> Result<Trajectory, SolveError> {
        let solution = solver.solve(&self.nlp)?;
        Ok(Trajectory::from_solution(&solution, self.layout))
    }
}
