//! Convenience re-exports: `use robosim::prelude::*` brings in the common items.

pub use crate::config::SimulationConfig;
pub use crate::control::JointPdController;
pub use crate::kinematic::KinematicSimulation;
pub use crate::math::{Mat4, Pose, Quat, Vec3, Vec4};
pub use crate::prop::PropDescription;
pub use crate::robot::{DescriptionError, JointType, Link, RobotDescription};
pub use crate::sim::Simulation;

#[cfg(feature = "rapier")]
pub use crate::rapier::RapierSimulation;
