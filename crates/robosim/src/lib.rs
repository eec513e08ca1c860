//! # Robosim — Articulated Robot Simulation
//!
//! Describe a robot as a tree of capsule links joined by hinges and fixed
//! joints, drop it into a physics world next to box props, drive its joints,
//! and checkpoint the world so trials can be replayed from the same state.
//!
//! Start with `use robosim::prelude::*`, build a
//! [`RobotDescription`](robot::RobotDescription), and add it to any
//! [`Simulation`](sim::Simulation) backend.
//! [`RapierSimulation`](rapier::RapierSimulation) is the physics backend;
//! [`KinematicSimulation`](kinematic::KinematicSimulation) is an engine-free
//! stand-in for tests.

pub mod config;
pub mod control;
pub mod kinematic;
pub mod math;
pub mod prelude;
pub mod prop;
pub mod registry;
pub mod robot;
pub mod sim;
pub mod snapshot;

#[cfg(feature = "rapier")]
pub mod rapier;
