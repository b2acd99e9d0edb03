//! Fixed-step RK4 integration
//!
//! Advances the vehicle state by one interval using classical 4-stage
//! Runge-Kutta with the control held constant over the interval
//! (zero-order hold):
//!
//! ```text
//! k1 = f(x, u)
//! k2 = f(x + h/2·k1, u)
//! k3 = f(x + h/2·k2, u)
//! k4 = f(x + h·k3, u)
//! x⁺ = x + h/6·(k1 + 2k2 + 2k3 + k4)
//! ```
//!
//! The step size h is a free quantity here, not a fixed sample period:
//! the transcription layer sets h = T/N with the total flight time T a
//! decision variable, so the step must also report its derivative with
//! respect to h.

use nalgebra::{Matrix6, Matrix6x3};

use crate::dynamics::DynamicsModel;
use crate::{Vec3, Vec6};

/// One RK4 step with zero-order-hold control
pub fn rk4_step<M: DynamicsModel>(model: &M, state: &Vec6, control: &Vec3, h: f64) -> Vec6 {
    let k1 = model.derivative(state, control);
    let k2 = model.derivative(&(state + k1 * (h / 2.0)), control);
    let k3 = model.derivative(&(state + k2 * (h / 2.0)), control);
    let k4 = model.derivative(&(state + k3 * h), control);

    state + (k1 + k2 * 2.0 + k3 * 2.0 + k4) * (h / 6.0)
}

/// Partial derivatives of one RK4 step
///
/// For Φ(x, u, h) = rk4_step(x, u, h):
/// - `wrt_state`: ∂Φ/∂x (6×6)
/// - `wrt_control`: ∂Φ/∂u (6×3)
/// - `wrt_step`: ∂Φ/∂h (6)
#[derive(Debug, Clone)]
pub struct StepSensitivity {
    pub wrt_state: Matrix6<f64>,
    pub wrt_control: Matrix6x3<f64>,
    pub wrt_step: Vec6,
}

/// One RK4 step together with its sensitivities
///
/// The tangents are chained through the four stages using the model's
/// closed-form Jacobians, so the result is exact for the discrete map
/// (not a finite-difference estimate). Each defect constraint built on
/// this touches only its own (x, u) pair plus the shared step size,
/// which keeps the overall constraint Jacobian block-sparse.
pub fn rk4_step_with_sensitivity<M: DynamicsModel>(
    model: &M,
    state: &Vec6,
    control: &Vec3,
    h: f64,
) -> (Vec6, StepSensitivity) {
    let x1 = *state;
    let k1 = model.derivative(&x1, control);
    let x2 = state + k1 * (h / 2.0);
    let k2 = model.derivative(&x2, control);
    let x3 = state + k2 * (h / 2.0);
    let k3 = model.derivative(&x3, control);
    let x4 = state + k3 * h;
    let k4 = model.derivative(&x4, control);

    let next = state + (k1 + k2 * 2.0 + k3 * 2.0 + k4) * (h / 6.0);

    let (a1, b1) = model.jacobian(&x1, control);
    let (a2, b2) = model.jacobian(&x2, control);
    let (a3, b3) = model.jacobian(&x3, control);
    let (a4, b4) = model.jacobian(&x4, control);

    let identity = Matrix6::identity();

    // Stage tangents with respect to the initial state
    let k1_x = a1;
    let k2_x = a2 * (identity + k1_x * (h / 2.0));
    let k3_x = a3 * (identity + k2_x * (h / 2.0));
    let k4_x = a4 * (identity + k3_x * h);
    let wrt_state = identity + (k1_x + k2_x * 2.0 + k3_x * 2.0 + k4_x) * (h / 6.0);

    // Stage tangents with respect to the (held) control
    let k1_u = b1;
    let k2_u = b2 + a2 * k1_u * (h / 2.0);
    let k3_u = b3 + a3 * k2_u * (h / 2.0);
    let k4_u = b4 + a4 * k3_u * h;
    let wrt_control = (k1_u + k2_u * 2.0 + k3_u * 2.0 + k4_u) * (h / 6.0);

    // Stage tangents with respect to the step size
    let k1_h = Vec6::zeros();
    let k2_h = a2 * (k1 * 0.5 + k1_h * (h / 2.0));
    let k3_h = a3 * (k2 * 0.5 + k2_h * (h / 2.0));
    let k4_h = a4 * (k3 + k3_h * h);
    let wrt_step =
        (k1 + k2 * 2.0 + k3 * 2.0 + k4) / 6.0 + (k1_h + k2_h * 2.0 + k3_h * 2.0 + k4_h) * (h / 6.0);

    (
        next,
        StepSensitivity {
            wrt_state,
            wrt_control,
            wrt_step,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::PointMass;
    use crate::GRAVITY;
    use approx::assert_relative_eq;

    /// Test model with velocity damping: v̇ = -k·v + F/m.
    ///
    /// Unlike the point mass this is not integrated exactly by RK4, so it
    /// exposes the O(h⁵) local truncation error.
    struct DampedPointMass {
        mass: f64,
        damping: f64,
    }

    impl DynamicsModel for DampedPointMass {
        fn derivative(&self, state: &Vec6, control: &Vec3) -> Vec6 {
            Vec6::new(
                state[3],
                state[4],
                state[5],
                control.x / self.mass - self.damping * state[3],
                control.y / self.mass - self.damping * state[4],
                control.z / self.mass - self.damping * state[5],
            )
        }

        fn jacobian(&self, _state: &Vec6, _control: &Vec3) -> (Matrix6<f64>, Matrix6x3<f64>) {
            let mut a = Matrix6::zeros();
            for i in 0..3 {
                a[(i, i + 3)] = 1.0;
                a[(i + 3, i + 3)] = -self.damping;
            }
            let mut b = Matrix6x3::zeros();
            for i in 0..3 {
                b[(i + 3, i)] = 1.0 / self.mass;
            }
            (a, b)
        }
    }

    /// Closed-form ballistic solution for constant force under gravity
    fn ballistic(model: &PointMass, state: &Vec6, control: &Vec3, t: f64) -> Vec6 {
        let accel = model.acceleration(control);
        let mut out = Vec6::zeros();
        for i in 0..3 {
            out[i] = state[i] + state[i + 3] * t + 0.5 * accel[i] * t * t;
            out[i + 3] = state[i + 3] + accel[i] * t;
        }
        out
    }

    #[test]
    fn test_rk4_exact_for_constant_force() {
        // Constant acceleration gives a quadratic-in-time solution, which
        // RK4 reproduces to rounding error even for a large step.
        let model = PointMass::new(1.3);
        let state = Vec6::new(1.0, -2.0, 5.0, 0.3, 0.7, -1.1);
        let control = Vec3::new(2.0, -1.0, 9.0);
        let h = 0.7;

        let stepped = rk4_step(&model, &state, &control, h);
        let exact = ballistic(&model, &state, &control, h);

        for i in 0..6 {
            assert_relative_eq!(stepped[i], exact[i], epsilon = 1e-12, max_relative = 1e-12);
        }
    }

    #[test]
    fn test_rk4_free_fall() {
        let model = PointMass::new(1.0);
        let state = Vec6::zeros();
        let stepped = rk4_step(&model, &state, &Vec3::zeros(), 0.5);

        assert_relative_eq!(stepped[2], -0.5 * GRAVITY * 0.25, epsilon = 1e-12);
        assert_relative_eq!(stepped[5], -GRAVITY * 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_rk4_local_error_is_fifth_order() {
        // Damped dynamics: v(t) = v0·e^(-kt). Halving the step must shrink
        // the one-step error by ~2⁵.
        let model = DampedPointMass {
            mass: 1.0,
            damping: 1.0,
        };
        let state = Vec6::new(0.0, 0.0, 0.0, 1.0, 0.0, 0.0);
        let control = Vec3::zeros();

        let exact_vx = |t: f64| (-t).exp();

        let h = 0.2;
        let err_h = (rk4_step(&model, &state, &control, h)[3] - exact_vx(h)).abs();
        let err_half = (rk4_step(&model, &state, &control, h / 2.0)[3] - exact_vx(h / 2.0)).abs();

        let ratio = err_h / err_half;
        assert!(
            ratio > 25.0 && ratio < 40.0,
            "expected ~2⁵ = 32 error reduction, got {ratio}"
        );
    }

    #[test]
    fn test_step_sensitivity_matches_finite_differences() {
        let model = DampedPointMass {
            mass: 1.4,
            damping: 0.6,
        };
        let state = Vec6::new(0.2, -0.4, 1.0, 0.8, -0.3, 0.5);
        let control = Vec3::new(1.5, -2.5, 0.5);
        let h = 0.13;

        let (_, sens) = rk4_step_with_sensitivity(&model, &state, &control, h);

        let eps = 1e-6;
        for j in 0..6 {
            let mut plus = state;
            let mut minus = state;
            plus[j] += eps;
            minus[j] -= eps;
            let fd = (rk4_step(&model, &plus, &control, h) - rk4_step(&model, &minus, &control, h))
                / (2.0 * eps);
            for i in 0..6 {
                assert_relative_eq!(sens.wrt_state[(i, j)], fd[i], epsilon = 1e-7);
            }
        }

        for j in 0..3 {
            let mut plus = control;
            let mut minus = control;
            plus[j] += eps;
            minus[j] -= eps;
            let fd = (rk4_step(&model, &state, &plus, h) - rk4_step(&model, &state, &minus, h))
                / (2.0 * eps);
            for i in 0..6 {
                assert_relative_eq!(sens.wrt_control[(i, j)], fd[i], epsilon = 1e-7);
            }
        }

        let fd = (rk4_step(&model, &state, &control, h + eps)
            - rk4_step(&model, &state, &control, h - eps))
            / (2.0 * eps);
        for i in 0..6 {
            assert_relative_eq!(sens.wrt_step[i], fd[i], epsilon = 1e-7);
        }
    }

    #[test]
    fn test_sensitivity_step_value_matches_plain_step() {
        let model = PointMass::new(2.0);
        let state = Vec6::new(1.0, 2.0, 3.0, -1.0, 0.5, 0.0);
        let control = Vec3::new(0.5, 0.5, 5.0);
        let h = 0.05;

        let plain = rk4_step(&model, &state, &control, h);
        let (with_sens, _) = rk4_step_with_sensitivity(&model, &state, &control, h);
        assert_eq!(plain, with_sens);
    }
}
