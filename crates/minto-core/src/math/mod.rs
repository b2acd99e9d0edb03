//! Mathematical utilities
//!
//! Fixed-step integration of the vehicle dynamics, with the tangent
//! (sensitivity) propagation needed to embed an integration step inside
//! differentiable equality constraints.

pub mod integrator;

pub use integrator::*;
