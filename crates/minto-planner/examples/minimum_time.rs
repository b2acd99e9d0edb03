//! Minimum-Time Flight Demonstration
//!
//! Solves the default scenario - a 1 kg vehicle with a 10 N force
//! budget flying from the origin to (5, 5, 5) and arriving at rest -
//! and prints the solved trajectory.

use minto_planner::{MinimumTimePlanner, ProblemConfig};

fn main() {
    let config = ProblemConfig::default();

    println!("=== Minimum-time point-mass flight ===\n");
    println!(
        "vehicle: {} kg, force budget {} N",
        config.vehicle.mass, config.vehicle.max_force
    );
    println!(
        "goal: ({:.1}, {:.1}, {:.1}) m at rest, {} intervals\n",
        config.goal.position.x,
        config.goal.position.y,
        config.goal.position.z,
        config.horizon.num_intervals
    );

    let planner = MinimumTimePlanner::new();
    let trajectory = match planner.plan(config) {
        Ok(trajectory) => trajectory,
        Err(error) => {
            eprintln!("planning failed: {error}");
            std::process::exit(1);
        }
    };

    println!("solved flight time: {:.3} s\n", trajectory.flight_time());
    println!(
        "{:>8}  {:>27}  {:>27}",
        "t [s]", "position [m]", "velocity [m/s]"
    );

    let last = trajectory.num_intervals();
    for (k, (&t, state)) in trajectory
        .times()
        .iter()
        .zip(trajectory.states())
        .enumerate()
    {
        if k % 10 != 0 && k != last {
            continue;
        }
        println!(
            "{t:8.3}  ({:7.3}, {:7.3}, {:7.3})  ({:7.3}, {:7.3}, {:7.3})",
            state.position.x,
            state.position.y,
            state.position.z,
            state.velocity.x,
            state.velocity.y,
            state.velocity.z,
        );
    }

    let peak_force = trajectory
        .controls()
        .iter()
        .map(|u| u.norm())
        .fold(0.0, f64::max);
    println!("\npeak commanded force: {peak_force:.3} N");
}
