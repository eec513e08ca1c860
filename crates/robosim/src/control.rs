//! # Default Joint Control
//!
//! [`JointPdController`] is the proportional-derivative law applied to every
//! hinge before each step. Targets alternate by jointed-link parity, so a
//! freshly built robot holds a zig-zag pose instead of collapsing under
//! gravity.

use std::f32::consts::FRAC_PI_2;

use serde::{Deserialize, Serialize};

use crate::robot::RobotDescription;

/// A clamped PD law driving each joint toward a parity-dependent target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointPdController {
    pub kp: f32,
    pub kd: f32,
    /// Output is clamped to `[-max_torque, max_torque]`.
    pub max_torque: f32,
    /// Target for jointed links with an even index.
    pub even_target: f32,
    /// Target for jointed links with an odd index.
    pub odd_target: f32,
}

impl Default for JointPdController {
    fn default() -> Self {
        Self {
            kp: 1.0,
            kd: 0.1,
            max_torque: 1.0,
            even_target: 0.0,
            odd_target: -FRAC_PI_2,
        }
    }
}

impl JointPdController {
    pub fn with_gains(mut self, kp: f32, kd: f32) -> Self {
        self.kp = kp;
        self.kd = kd;
        self
    }

    pub fn with_max_torque(mut self, max_torque: f32) -> Self {
        self.max_torque = max_torque;
        self
    }

    pub fn with_targets(mut self, even: f32, odd: f32) -> Self {
        self.even_target = even;
        self.odd_target = odd;
        self
    }

    /// Target angle for the jointed link at `jointed_index` (base excluded).
    pub fn target(&self, jointed_index: usize) -> f32 {
        if jointed_index % 2 == 0 {
            self.even_target
        } else {
            self.odd_target
        }
    }

    pub fn torque(&self, position: f32, velocity: f32, target: f32) -> f32 {
        (-self.kp * (position - target) - self.kd * velocity).clamp(-self.max_torque, self.max_torque)
    }

    /// One torque per DOF of `robot`, in joint-vector order.
    pub fn torques(&self, robot: &RobotDescription, positions: &[f32], velocities: &[f32]) -> Vec<f32> {
        robot
            .dof_links()
            .into_iter()
            .zip(positions.iter().zip(velocities))
            .map(|(jointed, (&pos, &vel))| self.torque(pos, vel, self.target(jointed)))
            .collect()
    }
}
