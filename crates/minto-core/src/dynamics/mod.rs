//! Dynamic models
//!
//! Continuous-time models exposed through the [`DynamicsModel`] trait:
//! state derivative plus closed-form Jacobians, so the transcription
//! layer can embed the model in equality constraints without a symbolic
//! expression graph.

pub mod point_mass;

pub use point_mass::*;
