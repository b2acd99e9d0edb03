//! Point-mass translational dynamics
//!
//! Implements the thrust-limited point-mass vehicle model:
//!
//! ```text
//! ṗ = v
//! v̇ = F/m + [0, 0, -g]ᵀ
//! ```
//!
//! where:
//! - p: position (world frame, z-up)
//! - v: velocity
//! - F: applied force (the control input)
//! - m: vehicle mass
//! - g: gravitational acceleration

use nalgebra::{Matrix6, Matrix6x3};
use serde::{Deserialize, Serialize};

use crate::{Vec3, Vec6, GRAVITY};

/// Kinematic state of the vehicle at one time instant
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VehicleState {
    /// Position [m] (world frame)
    pub position: Vec3,
    /// Velocity [m/s] (world frame)
    pub velocity: Vec3,
}

impl Default for VehicleState {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            velocity: Vec3::zeros(),
        }
    }
}

impl VehicleState {
    pub fn new(position: Vec3, velocity: Vec3) -> Self {
        Self { position, velocity }
    }

    /// State at the world origin, at rest
    pub fn origin() -> Self {
        Self::default()
    }

    /// A resting state at the given position
    pub fn at_rest(position: Vec3) -> Self {
        Self {
            position,
            velocity: Vec3::zeros(),
        }
    }

    /// Pack into a flat vector: `(x, y, z, vx, vy, vz)`
    pub fn to_vector(&self) -> Vec6 {
        Vec6::new(
            self.position.x,
            self.position.y,
            self.position.z,
            self.velocity.x,
            self.velocity.y,
            self.velocity.z,
        )
    }

    /// Unpack from the flat `(x, y, z, vx, vy, vz)` layout
    pub fn from_vector(v: &Vec6) -> Self {
        Self {
            position: Vec3::new(v[0], v[1], v[2]),
            velocity: Vec3::new(v[3], v[4], v[5]),
        }
    }

    /// True when every component is a finite number
    pub fn is_finite(&self) -> bool {
        self.position.iter().all(|c| c.is_finite()) && self.velocity.iter().all(|c| c.is_finite())
    }
}

/// Continuous-time dynamics with closed-form derivatives
///
/// `derivative` is the state derivative f(x, u); `jacobian` returns
/// (∂f/∂x, ∂f/∂u) evaluated at the same point. Both must be pure so the
/// integrator can chain them through its stages.
pub trait DynamicsModel {
    /// State derivative f(x, u)
    fn derivative(&self, state: &Vec6, control: &Vec3) -> Vec6;

    /// Partial derivatives (∂f/∂x, ∂f/∂u) at (state, control)
    fn jacobian(&self, state: &Vec6, control: &Vec3) -> (Matrix6<f64>, Matrix6x3<f64>);
}

/// Thrust-limited point-mass vehicle
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PointMass {
    /// Vehicle mass [kg]
    pub mass: f64,
    /// Gravitational acceleration [m/s²] (positive down)
    pub gravity: f64,
}

impl PointMass {
    /// Create a point mass under standard gravity
    pub fn new(mass: f64) -> Self {
        Self {
            mass,
            gravity: GRAVITY,
        }
    }

    pub fn with_gravity(mass: f64, gravity: f64) -> Self {
        Self { mass, gravity }
    }

    /// Acceleration produced by an applied force
    pub fn acceleration(&self, force: &Vec3) -> Vec3 {
        force / self.mass + Vec3::new(0.0, 0.0, -self.gravity)
    }
}

impl Default for PointMass {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl DynamicsModel for PointMass {
    fn derivative(&self, state: &Vec6, control: &Vec3) -> Vec6 {
        let accel = self.acceleration(control);
        Vec6::new(state[3], state[4], state[5], accel.x, accel.y, accel.z)
    }

    fn jacobian(&self, _state: &Vec6, _control: &Vec3) -> (Matrix6<f64>, Matrix6x3<f64>) {
        // Affine dynamics: both partials are constant.
        let mut a = Matrix6::zeros();
        a[(0, 3)] = 1.0;
        a[(1, 4)] = 1.0;
        a[(2, 5)] = 1.0;

        let mut b = Matrix6x3::zeros();
        let inv_mass = 1.0 / self.mass;
        b[(3, 0)] = inv_mass;
        b[(4, 1)] = inv_mass;
        b[(5, 2)] = inv_mass;

        (a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_derivative_zero_force() {
        let model = PointMass::new(1.0);
        let state = Vec6::new(1.0, 2.0, 3.0, 0.5, -0.5, 2.0);
        let dx = model.derivative(&state, &Vec3::zeros());

        // Position rates equal the velocity components
        assert_eq!(dx[0], 0.5);
        assert_eq!(dx[1], -0.5);
        assert_eq!(dx[2], 2.0);

        // Free fall: only the z-velocity rate is driven, by -g exactly
        assert_eq!(dx[3], 0.0);
        assert_eq!(dx[4], 0.0);
        assert_eq!(dx[5], -GRAVITY);
    }

    #[test]
    fn test_derivative_scales_force_by_mass() {
        let model = PointMass::new(2.0);
        let state = Vec6::zeros();
        let dx = model.derivative(&state, &Vec3::new(4.0, -2.0, 0.0));

        assert_relative_eq!(dx[3], 2.0);
        assert_relative_eq!(dx[4], -1.0);
        assert_relative_eq!(dx[5], -GRAVITY);
    }

    #[test]
    fn test_jacobian_matches_finite_differences() {
        let model = PointMass::new(1.7);
        let state = Vec6::new(0.3, -1.2, 2.0, 0.4, 0.9, -0.1);
        let control = Vec3::new(1.0, -2.0, 3.0);
        let (a, b) = model.jacobian(&state, &control);

        let eps = 1e-6;
        for j in 0..6 {
            let mut plus = state;
            let mut minus = state;
            plus[j] += eps;
            minus[j] -= eps;
            let fd = (model.derivative(&plus, &control) - model.derivative(&minus, &control))
                / (2.0 * eps);
            for i in 0..6 {
                assert_relative_eq!(a[(i, j)], fd[i], epsilon = 1e-8);
            }
        }
        for j in 0..3 {
            let mut plus = control;
            let mut minus = control;
            plus[j] += eps;
            minus[j] -= eps;
            let fd = (model.derivative(&state, &plus) - model.derivative(&state, &minus))
                / (2.0 * eps);
            for i in 0..6 {
                assert_relative_eq!(b[(i, j)], fd[i], epsilon = 1e-8);
            }
        }
    }

    #[test]
    fn test_state_vector_roundtrip() {
        let state = VehicleState::new(Vec3::new(1.0, 2.0, 3.0), Vec3::new(-0.1, 0.2, -0.3));
        let recovered = VehicleState::from_vector(&state.to_vector());
        assert_eq!(recovered, state);
    }

    #[test]
    fn test_state_finiteness() {
        assert!(VehicleState::origin().is_finite());
        let bad = VehicleState::new(Vec3::new(f64::NAN, 0.0, 0.0), Vec3::zeros());
        assert!(!bad.is_finite());
    }
}
