//! Simulation configuration shared by every backend.

use serde::{Deserialize, Serialize};

use crate::control::JointPdController;
use crate::math::Vec3;

/// World settings applied when a simulation is created.
///
/// ```ignore
/// let config = SimulationConfig::default()
///     .with_gravity(Vec3::new(0.0, -3.7, 0.0))
///     .without_default_control();
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub gravity: Vec3,
    /// Law applied to every hinge before each step. `None` leaves joints
    /// driven only by caller torques.
    pub default_control: Option<JointPdController>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -9.81, 0.0),
            default_control: Some(JointPdController::default()),
        }
    }
}

impl SimulationConfig {
    /// Default settings without gravity.
    pub fn zero_gravity() -> Self {
        Self::default().with_gravity(Vec3::ZERO)
    }

    pub fn with_gravity(mut self, gravity: Vec3) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn with_default_control(mut self, controller: JointPdController) -> Self {
        self.default_control = Some(controller);
        self
    }

    pub fn without_default_control(mut self) -> Self {
        self.default_control = None;
        self
    }
}
