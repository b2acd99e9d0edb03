//! One-shot planning facade
//!
//! Wires configuration, transcription, solving and extraction into a
//! single linear pass. Every stage consumes its input, so the planning
//! state machine (unbuilt → built → solved/failed) is enforced by
//! ownership: a solved problem cannot be re-solved and a failed solve
//! yields an error instead of a trajectory.

use thiserror::Error;

use crate::config::{ConfigError, ProblemConfig};
use crate::solver::{AugmentedLagrangianSolver, SolveError, SolveOptions};
use crate::transcription::TranscriptionBuilder;
use crate::trajectory::Trajectory;

/// Planner errors
#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("solver error: {0}")]
    Solve(#[from] SolveError),
}

/// Minimum-time trajectory planner
///
/// Convenience wrapper over the granular flow
/// `TranscriptionBuilder::new(..)?.build().solve(&solver)`; use the
/// granular form to inspect the NLP or to plug in a different solver.
#[derive(Debug, Clone, Default)]
pub struct MinimumTimePlanner {
    solver: AugmentedLagrangianSolver,
}

impl MinimumTimePlanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: SolveOptions) -> Self {
        Self {
            solver: AugmentedLagrangianSolver::new(options),
        }
    }

    /// Transcribe, solve and extract in one pass
    ///
    /// Each call builds a fresh problem instance; nothing is shared
    /// between calls.
    pub fn plan(&self, config: ProblemConfig) -> Result<Trajectory, PlannerError> {
        let problem = TranscriptionBuilder::new(config)?.build();
        let trajectory = problem.solve(&self.solver)?;
        Ok(trajectory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VehicleConfig;

    #[test]
    fn test_invalid_config_surfaces_as_config_error() {
        let config = ProblemConfig {
            vehicle: VehicleConfig {
                mass: -2.0,
                ..VehicleConfig::default()
            },
            ..ProblemConfig::default()
        };

        let result = MinimumTimePlanner::new().plan(config);
        assert!(matches!(result, Err(PlannerError::Config(_))));
    }
}
