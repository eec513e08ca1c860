//! Repeated trial rollouts from a single snapshot.
//!
//! Builds a three-link walker on a static floor next to a loose crate, saves
//! the world once, then replays several trials with different joint biases,
//! restoring before each one. Run with `RUST_LOG=info` to see snapshot logs.

use std::f32::consts::FRAC_PI_2;
use std::sync::Arc;

use robosim::prelude::*;

const DT: f32 = 1.0 / 240.0;
const TRIAL_STEPS: usize = 480;

fn walker() -> RobotDescription {
    RobotDescription::new(1.0, 0.05, 0.9)
        .with_link(Link::base(0.6))
        .with_link(Link::hinge(0, 1.0, Quat::from_rotation_z(-FRAC_PI_2), Vec3::Z, 0.4))
        .with_link(Link::hinge(0, 0.0, Quat::from_rotation_z(-FRAC_PI_2), Vec3::Z, 0.4))
}

fn main() {
    env_logger::init();

    let mut sim = RapierSimulation::new();
    let floor = Arc::new(PropDescription::new(Vec3::new(20.0, 0.5, 20.0), 0.0, 0.9));
    let crate_box = Arc::new(PropDescription::new(Vec3::splat(0.2), 0.5, 0.6));
    sim.add_prop(floor, Vec3::new(0.0, -0.5, 0.0), Quat::IDENTITY);
    sim.add_prop(crate_box, Vec3::new(1.5, 0.2, 0.0), Quat::IDENTITY);

    let robot = sim.add_robot(Arc::new(walker()), Vec3::new(0.0, 0.6, 0.0), Quat::IDENTITY);

    // Let the walker settle before checkpointing.
    for _ in 0..120 {
        sim.step(DT);
    }
    sim.save_state();
    let start = Pose::from_matrix(sim.link_transform(robot, 0)).translation;

    for (trial, bias) in [-0.4_f32, -0.2, 0.0, 0.2, 0.4].into_iter().enumerate() {
        sim.restore_state();
        for step in 0..TRIAL_STEPS {
            let phase = (step as f32 * DT * 4.0).sin();
            sim.add_joint_torques(robot, &[bias + 0.3 * phase, bias - 0.3 * phase]);
            sim.step(DT);
        }
        let end = Pose::from_matrix(sim.link_transform(robot, 0)).translation;
        log::info!(
            "trial {trial}: bias {bias:+.1} moved base {:.3} m (joints {:?})",
            (end - start).length(),
            sim.joint_positions(robot)
        );
    }
}
