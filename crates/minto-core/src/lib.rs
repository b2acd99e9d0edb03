//! # Minto Core
//!
//! Minimum-time trajectory optimization - core library.
//!
//! Implements the continuous-time vehicle model and the fixed-step
//! integration scheme used by the transcription layer in `minto-planner`:
//!
//! ```text
//! ṗ = v
//! v̇ = F/m + g
//! ```
//!
//! ## Modules
//!
//! - [`dynamics`]: Point-mass translational dynamics under gravity
//! - [`math`]: Numerical integrators and their step sensitivities

pub mod dynamics;
pub mod math;

// Common type aliases
use nalgebra::{Vector3, Vector6};

/// 3D vector type
pub type Vec3 = Vector3<f64>;

/// 6D state vector type (position stacked over velocity)
pub type Vec6 = Vector6<f64>;

/// Gravity constant [m/s²]
pub const GRAVITY: f64 = 9.81;
