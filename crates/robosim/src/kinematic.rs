//! # Kinematic Simulation — Engine-Free Backend
//!
//! [`KinematicSimulation`] implements [`Simulation`] without a physics engine.
//! Each joint is integrated as a unit-inertia rotor driven by the applied
//! torques, bases and movable props fall ballistically under gravity, and
//! nothing collides. Link transforms come from the same joint-frame math the
//! rapier builder uses, so both backends agree on geometry.
//!
//! It is useful for testing controllers and bookkeeping without paying for
//! contact resolution.

use std::sync::Arc;

use crate::config::SimulationConfig;
use crate::math::{Mat4, Pose, Quat, Vec3};
use crate::prop::PropDescription;
use crate::registry::{Described, Registry};
use crate::robot::{JointType, RobotDescription};
use crate::sim::Simulation;
use crate::snapshot::SnapshotSlot;

/// Dynamic state of one robot.
#[derive(Debug, Clone, PartialEq)]
struct RobotState {
    base: Pose,
    base_velocity: Vec3,
    positions: Vec<f32>,
    velocities: Vec<f32>,
}

#[derive(Debug)]
struct KinematicRobot {
    description: Arc<RobotDescription>,
    state: RobotState,
    pending_torques: Vec<f32>,
    /// World pose of every link, refreshed after each state change.
    link_poses: Vec<Pose>,
}

impl KinematicRobot {
    fn refresh_link_poses(&mut self) {
        let robot = &self.description;
        self.link_poses.clear();
        self.link_poses.push(self.state.base);

        let mut dof = 0;
        for index in 1..robot.link_count() {
            let link = &robot.links[index];
            let angle = match link.joint_type {
                JointType::Hinge => {
                    dof += 1;
                    self.state.positions[dof - 1]
                }
                JointType::Free | JointType::Fixed => 0.0,
            };
            let parent = link.parent.unwrap_or(0);
            let pose = self.link_poses[parent] * robot.link_to_parent(index, angle);
            self.link_poses.push(pose);
        }
    }
}

impl Described for KinematicRobot {
    type Description = RobotDescription;

    fn description(&self) -> &Arc<RobotDescription> {
        &self.description
    }
}

#[derive(Debug, Clone, PartialEq)]
struct PropState {
    pose: Pose,
    velocity: Vec3,
}

#[derive(Debug)]
struct KinematicProp {
    description: Arc<PropDescription>,
    state: PropState,
}

impl Described for KinematicProp {
    type Description = PropDescription;

    fn description(&self) -> &Arc<PropDescription> {
        &self.description
    }
}

/// Per-entity states in registration order.
#[derive(Debug, Clone)]
struct KinematicSnapshot {
    robots: Vec<RobotState>,
    props: Vec<PropState>,
}

/// In-memory [`Simulation`] with joint-space integration and no contacts.
#[derive(Debug, Default)]
pub struct KinematicSimulation {
    config: SimulationConfig,
    robots: Registry<KinematicRobot>,
    props: Registry<KinematicProp>,
    snapshot: SnapshotSlot<KinematicSnapshot>,
}

impl KinematicSimulation {
    pub fn new() -> Self {
        Self::with_config(SimulationConfig::default())
    }

    pub fn with_config(config: SimulationConfig) -> Self {
        Self {
            config,
            robots: Registry::new(),
            props: Registry::new(),
            snapshot: SnapshotSlot::new(),
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }
}

impl Simulation for KinematicSimulation {
    fn add_robot(&mut self, robot: Arc<RobotDescription>, position: Vec3, rotation: Quat) -> usize {
        if let Err(err) = robot.validate() {
            panic!("invalid robot description: {err}");
        }
        let dofs = robot.dof_count();
        let mut entry = KinematicRobot {
            state: RobotState {
                base: Pose::new(position, rotation),
                base_velocity: Vec3::ZERO,
                positions: vec![0.0; dofs],
                velocities: vec![0.0; dofs],
            },
            pending_torques: vec![0.0; dofs],
            link_poses: Vec::with_capacity(robot.link_count()),
            description: robot,
        };
        entry.refresh_link_poses();
        let handle = self.robots.push(entry);
        log::debug!("kinematic: added robot {handle} ({dofs} dofs)");
        handle
    }

    fn add_prop(&mut self, prop: Arc<PropDescription>, position: Vec3, rotation: Quat) -> usize {
        let handle = self.props.push(KinematicProp {
            description: prop,
            state: PropState {
                pose: Pose::new(position, rotation),
                velocity: Vec3::ZERO,
            },
        });
        log::debug!("kinematic: added prop {handle}");
        handle
    }

    fn remove_robot(&mut self, robot_idx: usize) {
        self.robots.remove(robot_idx);
        log::debug!("kinematic: removed robot {robot_idx}");
    }

    fn remove_prop(&mut self, prop_idx: usize) {
        self.props.remove(prop_idx);
        log::debug!("kinematic: removed prop {prop_idx}");
    }

    fn robot(&self, robot_idx: usize) -> Arc<RobotDescription> {
        self.robots[robot_idx].description.clone()
    }

    fn prop(&self, prop_idx: usize) -> Arc<PropDescription> {
        self.props[prop_idx].description.clone()
    }

    fn robot_count(&self) -> usize {
        self.robots.len()
    }

    fn prop_count(&self) -> usize {
        self.props.len()
    }

    fn find_robot_index(&self, robot: &RobotDescription) -> Option<usize> {
        self.robots.find(robot)
    }

    fn find_prop_index(&self, prop: &PropDescription) -> Option<usize> {
        self.props.find(prop)
    }

    fn link_transform(&self, robot_idx: usize, link_idx: usize) -> Mat4 {
        self.robots[robot_idx].link_poses[link_idx].matrix()
    }

    fn prop_transform(&self, prop_idx: usize) -> Mat4 {
        self.props[prop_idx].state.pose.matrix()
    }

    fn joint_positions(&self, robot_idx: usize) -> Vec<f32> {
        self.robots[robot_idx].state.positions.clone()
    }

    fn joint_velocities(&self, robot_idx: usize) -> Vec<f32> {
        self.robots[robot_idx].state.velocities.clone()
    }

    fn add_joint_torques(&mut self, robot_idx: usize, torques: &[f32]) {
        let pending = &mut self.robots[robot_idx].pending_torques;
        assert_eq!(
            torques.len(),
            pending.len(),
            "torque vector length must match the robot's DOF count"
        );
        for (acc, torque) in pending.iter_mut().zip(torques) {
            *acc += torque;
        }
    }

    fn save_state(&mut self) {
        self.snapshot.store(Ok(KinematicSnapshot {
            robots: self.robots.iter().map(|r| r.state.clone()).collect(),
            props: self.props.iter().map(|p| p.state.clone()).collect(),
        }));
    }

    fn restore_state(&mut self) {
        let Some(snapshot) = self.snapshot.get() else {
            return;
        };
        for (robot, state) in self.robots.iter_mut().zip(&snapshot.robots) {
            robot.state.clone_from(state);
            robot.refresh_link_poses();
        }
        for (prop, state) in self.props.iter_mut().zip(&snapshot.props) {
            prop.state.clone_from(state);
        }
    }

    fn step(&mut self, dt: f32) {
        let gravity = self.config.gravity;
        let controller = self.config.default_control;

        for robot in self.robots.iter_mut() {
            if let Some(controller) = controller {
                let control = controller.torques(
                    &robot.description,
                    &robot.state.positions,
                    &robot.state.velocities,
                );
                for (acc, torque) in robot.pending_torques.iter_mut().zip(control) {
                    *acc += torque;
                }
            }

            let state = &mut robot.state;
            for ((pos, vel), torque) in state
                .positions
                .iter_mut()
                .zip(state.velocities.iter_mut())
                .zip(robot.pending_torques.iter_mut())
            {
                *vel += *torque * dt;
                *pos += *vel * dt;
                *torque = 0.0;
            }
            state.base_velocity += gravity * dt;
            state.base.translation += state.base_velocity * dt;
            robot.refresh_link_poses();
        }

        for prop in self.props.iter_mut() {
            if prop.description.is_static() {
                continue;
            }
            prop.state.velocity += gravity * dt;
            prop.state.pose.translation += prop.state.velocity * dt;
        }
        log::trace!("kinematic: stepped {dt}s");
    }
}
