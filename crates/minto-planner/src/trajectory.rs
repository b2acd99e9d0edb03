//! Solved trajectory representation
//!
//! Reconstructs the physically-indexed trajectory from an NLP solution:
//! the solved flight time T*, a uniform time grid, and the aligned state
//! and control sample sequences. A trajectory is immutable once
//! extracted; it can only be built from a successful solve, so there is
//! no "extract from failure" path to guard against.

use serde::Serialize;

use minto_core::dynamics::VehicleState;
use minto_core::Vec3;

use crate::solver::NlpSolution;
use crate::transcription::VariableLayout;

/// A minimum-time trajectory produced by one solve
///
/// States live on the N+1 knots `t_k = T*·k/N`; controls are held over
/// the N intervals and are stamped with the interval start times.
#[derive(Debug, Clone, Serialize)]
pub struct Trajectory {
    flight_time: f64,
    times: Vec<f64>,
    states: Vec<VehicleState>,
    control_times: Vec<f64>,
    controls: Vec<Vec3>,
}

impl Trajectory {
    /// Reconstruct the time-sampled trajectory from a solution
    pub(crate) fn from_solution(solution: &NlpSolution, layout: VariableLayout) -> Self {
        let n = layout.num_intervals();
        let flight_time = layout.total_time(&solution.variables);

        let times = (0..=n)
            .map(|k| flight_time * k as f64 / n as f64)
            .collect();
        let states = (0..=n)
            .map(|k| VehicleState::from_vector(&layout.state(&solution.variables, k)))
            .collect();
        let control_times = (0..n)
            .map(|k| flight_time * k as f64 / n as f64)
            .collect();
        let controls = (0..n).map(|k| layout.control(&solution.variables, k)).collect();

        Self {
            flight_time,
            times,
            states,
            control_times,
            controls,
        }
    }

    /// Solved total flight time T* [s]
    pub fn flight_time(&self) -> f64 {
        self.flight_time
    }

    /// Knot times, length N+1, spanning [0, T*]
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// State samples aligned with `times()`
    pub fn states(&self) -> &[VehicleState] {
        &self.states
    }

    /// Interval start times, length N
    pub fn control_times(&self) -> &[f64] {
        &self.control_times
    }

    /// Control samples aligned with `control_times()`
    pub fn controls(&self) -> &[Vec3] {
        &self.controls
    }

    pub fn num_intervals(&self) -> usize {
        self.controls.len()
    }

    /// State at an arbitrary time, clamped to [0, T*]
    ///
    /// Linear interpolation between the bracketing knots.
    pub fn state_at(&self, t: f64) -> VehicleState {
        let last = self.times.len() - 1;
        if t <= self.times[0] {
            return self.states[0];
        }
        if t >= self.times[last] {
            return self.states[last];
        }

        let idx = self
            .times
            .iter()
            .position(|&time| time > t)
            .unwrap_or(last)
            .saturating_sub(1);

        let t0 = self.times[idx];
        let t1 = self.times[idx + 1];
        let alpha = if (t1 - t0).abs() > 1e-12 {
            (t - t0) / (t1 - t0)
        } else {
            0.0
        };

        let s0 = &self.states[idx];
        let s1 = &self.states[idx + 1];
        VehicleState::new(
            s0.position.lerp(&s1.position, alpha),
            s0.velocity.lerp(&s1.velocity, alpha),
        )
    }

    /// Control at an arbitrary time (zero-order hold), clamped to [0, T*]
    pub fn control_at(&self, t: f64) -> Vec3 {
        let last = self.controls.len() - 1;
        if t <= self.control_times[0] {
            return self.controls[0];
        }
        if t >= self.times[self.controls.len()] {
            return self.controls[last];
        }

        let idx = self
            .control_times
            .iter()
            .position(|&time| time > t)
            .unwrap_or(self.controls.len())
            .saturating_sub(1)
            .min(last);

        self.controls[idx]
    }
}
