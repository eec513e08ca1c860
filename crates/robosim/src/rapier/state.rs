//! World state capture for the rapier backend.

use rapier3d::prelude::*;
use serde::{Deserialize, Serialize};

use crate::snapshot::SnapshotError;

/// Every mutable rapier set that makes up the world.
///
/// Pipeline and integration parameters are not part of it: they carry no
/// state between steps.
#[derive(Clone, Serialize, Deserialize)]
pub(crate) struct PhysicsSets {
    pub islands: IslandManager,
    pub broad_phase: DefaultBroadPhase,
    pub narrow_phase: NarrowPhase,
    pub bodies: RigidBodySet,
    pub colliders: ColliderSet,
    pub impulse_joints: ImpulseJointSet,
    pub multibody_joints: MultibodyJointSet,
    pub ccd_solver: CCDSolver,
}

impl PhysicsSets {
    pub fn new() -> Self {
        Self {
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
        }
    }

    /// Encode the sets into a bincode buffer, then parse the buffer back into
    /// a structured copy ready to be written over the live world.
    ///
    /// `joint_angles` are the robots' tracked hinge angles, in robot order.
    pub fn capture(&self, joint_angles: Vec<Vec<f32>>) -> Result<WorldSnapshot, SnapshotError> {
        let encoded =
            bincode::serialize(self).map_err(|err| SnapshotError::Encode(err.to_string()))?;
        let sets = bincode::deserialize(&encoded)
            .map_err(|err| SnapshotError::Decode(err.to_string()))?;
        Ok(WorldSnapshot {
            encoded_len: encoded.len(),
            sets,
            joint_angles,
        })
    }
}

/// A parsed world capture.
pub(crate) struct WorldSnapshot {
    pub encoded_len: usize,
    pub sets: PhysicsSets,
    pub joint_angles: Vec<Vec<f32>>,
}

impl std::fmt::Debug for WorldSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorldSnapshot")
            .field("encoded_len", &self.encoded_len)
            .field("bodies", &self.sets.bodies.len())
            .field("colliders", &self.sets.colliders.len())
            .finish()
    }
}
