//! # Simulation Capability
//!
//! [`Simulation`] is the contract every backend implements: add and remove
//! robots and props, query transforms and joint state, apply joint torques,
//! checkpoint and restore, and advance time.
//!
//! ## Handles
//!
//! Robots and props each have their own dense handle sequence. Adding returns
//! the previous count; removing handle `i` renumbers every later handle of the
//! same kind down by one. See [`Registry`](crate::registry::Registry).
//!
//! ## Preconditions
//!
//! Malformed descriptions, out-of-range handles, and torque vectors of the
//! wrong length are programming errors. Implementations panic on them rather
//! than returning errors.
//!
//! ## Example
//!
//! ```ignore
//! let mut sim = RapierSimulation::new();
//! let robot = sim.add_robot(walker.clone(), Vec3::new(0.0, 1.0, 0.0), Quat::IDENTITY);
//! sim.save_state();
//! for _ in 0..240 {
//!     sim.step(1.0 / 240.0);
//! }
//! let reached = sim.link_transform(robot, 0);
//! sim.restore_state();
//! ```

use std::sync::Arc;

use crate::math::{Mat4, Quat, Vec3};
use crate::prop::PropDescription;
use crate::robot::RobotDescription;

/// Operations any simulation backend supports.
pub trait Simulation {
    /// Build a robot at the given world pose and return its handle.
    ///
    /// # Panics
    ///
    /// Panics if the description fails [`RobotDescription::validate`].
    fn add_robot(&mut self, robot: Arc<RobotDescription>, position: Vec3, rotation: Quat) -> usize;

    /// Insert a prop at the given world pose and return its handle. A prop
    /// with zero mass is immovable.
    fn add_prop(&mut self, prop: Arc<PropDescription>, position: Vec3, rotation: Quat) -> usize;

    /// Destroy a robot. Later robot handles shift down by one.
    fn remove_robot(&mut self, robot_idx: usize);

    /// Destroy a prop. Later prop handles shift down by one.
    fn remove_prop(&mut self, prop_idx: usize);

    fn robot(&self, robot_idx: usize) -> Arc<RobotDescription>;

    fn prop(&self, prop_idx: usize) -> Arc<PropDescription>;

    fn robot_count(&self) -> usize;

    fn prop_count(&self) -> usize;

    /// Handle of the robot built from this exact description instance.
    fn find_robot_index(&self, robot: &RobotDescription) -> Option<usize>;

    /// Handle of the prop built from this exact description instance.
    fn find_prop_index(&self, prop: &PropDescription) -> Option<usize>;

    /// World transform of a link frame. Link 0 is the base.
    fn link_transform(&self, robot_idx: usize, link_idx: usize) -> Mat4;

    /// World transform of a prop's centre of mass frame.
    fn prop_transform(&self, prop_idx: usize) -> Mat4;

    /// One value per joint DOF over the non-base links, in link order.
    fn joint_positions(&self, robot_idx: usize) -> Vec<f32>;

    fn joint_velocities(&self, robot_idx: usize) -> Vec<f32>;

    /// Accumulate torques for the next step, one per joint DOF.
    ///
    /// # Panics
    ///
    /// Panics if `torques.len()` differs from the robot's DOF count.
    fn add_joint_torques(&mut self, robot_idx: usize, torques: &[f32]);

    /// Capture the whole world, replacing any held snapshot. A capture that
    /// fails leaves no snapshot held.
    fn save_state(&mut self);

    /// Reset the world to the held snapshot. No-op when none is held.
    fn restore_state(&mut self);

    /// Apply the default control law, advance by `dt` in a single substep,
    /// and refresh cached transforms.
    fn step(&mut self, dt: f32);
}
