//! Problem configuration
//!
//! Parameters of one minimum-time planning problem. A configuration is
//! validated once, when the transcription builder is constructed, and is
//! immutable afterwards.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use minto_core::dynamics::VehicleState;
use minto_core::{Vec3, GRAVITY};

/// Configuration errors, detected before any NLP assembly
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("vehicle mass must be positive, got {0}")]
    NonPositiveMass(f64),
    #[error("maximum force must be positive, got {0}")]
    NonPositiveMaxForce(f64),
    #[error("number of discretization intervals must be positive")]
    ZeroIntervals,
    #[error("goal state has non-finite components")]
    MalformedGoal,
    #[error("time guess must be positive and finite, got {0}")]
    InvalidTimeGuess(f64),
    #[error("gravity must be finite and non-negative, got {0}")]
    InvalidGravity(f64),
}

/// Main problem configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemConfig {
    /// Vehicle parameters
    pub vehicle: VehicleConfig,
    /// Discretization parameters
    pub horizon: HorizonConfig,
    /// Goal state the trajectory must reach exactly
    pub goal: VehicleState,
    /// Gravitational acceleration [m/s²] (positive down)
    pub gravity: f64,
}

impl Default for ProblemConfig {
    fn default() -> Self {
        Self {
            vehicle: VehicleConfig::default(),
            horizon: HorizonConfig::default(),
            goal: VehicleState::at_rest(Vec3::new(5.0, 5.0, 5.0)),
            gravity: GRAVITY,
        }
    }
}

impl ProblemConfig {
    /// Check every precondition, failing fast on the first violation
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.vehicle.mass > 0.0) || !self.vehicle.mass.is_finite() {
            return Err(ConfigError::NonPositiveMass(self.vehicle.mass));
        }
        if !(self.vehicle.max_force > 0.0) || !self.vehicle.max_force.is_finite() {
            return Err(ConfigError::NonPositiveMaxForce(self.vehicle.max_force));
        }
        if self.horizon.num_intervals == 0 {
            return Err(ConfigError::ZeroIntervals);
        }
        if !self.goal.is_finite() {
            return Err(ConfigError::MalformedGoal);
        }
        if !(self.horizon.time_guess > 0.0) || !self.horizon.time_guess.is_finite() {
            return Err(ConfigError::InvalidTimeGuess(self.horizon.time_guess));
        }
        if !(self.gravity >= 0.0) || !self.gravity.is_finite() {
            return Err(ConfigError::InvalidGravity(self.gravity));
        }
        Ok(())
    }
}

/// Vehicle parameters
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VehicleConfig {
    /// Vehicle mass [kg]
    pub mass: f64,
    /// Maximum applied force magnitude [N]
    pub max_force: f64,
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            mass: 1.0,
            max_force: 10.0,
        }
    }
}

/// Discretization parameters
///
/// `num_intervals` trades dynamics accuracy against NLP size: variables
/// and constraints both grow linearly with it. It is fixed at build time
/// and never tuned automatically.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HorizonConfig {
    /// Number of discretization intervals (N)
    pub num_intervals: usize,
    /// Seed value for the free total-time variable [s]
    ///
    /// Only a solver starting point, not a bound.
    pub time_guess: f64,
}

impl Default for HorizonConfig {
    fn default() -> Self {
        Self {
            num_intervals: 120,
            time_guess: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ProblemConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_non_positive_mass() {
        let config = ProblemConfig {
            vehicle: VehicleConfig {
                mass: 0.0,
                ..VehicleConfig::default()
            },
            ..ProblemConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonPositiveMass(_))
        ));
    }

    #[test]
    fn test_rejects_non_positive_max_force() {
        let config = ProblemConfig {
            vehicle: VehicleConfig {
                max_force: -1.0,
                ..VehicleConfig::default()
            },
            ..ProblemConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonPositiveMaxForce(_))
        ));
    }

    #[test]
    fn test_rejects_zero_intervals() {
        let config = ProblemConfig {
            horizon: HorizonConfig {
                num_intervals: 0,
                ..HorizonConfig::default()
            },
            ..ProblemConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroIntervals)));
    }

    #[test]
    fn test_single_interval_is_valid() {
        let config = ProblemConfig {
            horizon: HorizonConfig {
                num_intervals: 1,
                ..HorizonConfig::default()
            },
            ..ProblemConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_non_finite_goal() {
        let config = ProblemConfig {
            goal: VehicleState::at_rest(Vec3::new(f64::INFINITY, 0.0, 0.0)),
            ..ProblemConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::MalformedGoal)));
    }

    #[test]
    fn test_rejects_bad_time_guess() {
        let config = ProblemConfig {
            horizon: HorizonConfig {
                time_guess: 0.0,
                ..HorizonConfig::default()
            },
            ..ProblemConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidTimeGuess(_))
        ));
    }
}
