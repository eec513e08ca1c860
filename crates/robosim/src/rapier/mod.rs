//! # Rapier Backend
//!
//! [`RapierSimulation`] implements [`Simulation`] on top of rapier3d. Each
//! robot is a multibody built by the `builder` module, each prop a single
//! rigid body with a box collider.
//!
//! ## Joint torques
//!
//! Rapier keeps multibody joint coordinates private, so joint torques are
//! applied as equal and opposite body torques about the world-space hinge
//! axis: `+τ` on the child link, `-τ` on its parent. Torques added between
//! steps accumulate and are consumed by the next [`step`](Simulation::step).
//!
//! ## Snapshots
//!
//! [`save_state`](Simulation::save_state) encodes every rapier set with
//! bincode and parses the buffer back into a structured copy. Restoring
//! overwrites the live sets with that copy. Rapier arenas keep handle
//! identity, so every registered entity stays valid across a restore.

mod builder;
mod state;

use std::f32::consts::{PI, TAU};
use std::sync::Arc;

use rapier3d::na::{Quaternion, UnitQuaternion};
use rapier3d::prelude::*;

use self::state::{PhysicsSets, WorldSnapshot};
use crate::config::SimulationConfig;
use crate::math::{Mat4, Pose, Quat, Vec3};
use crate::prop::PropDescription;
use crate::registry::{Described, Registry};
use crate::robot::{JointType, RobotDescription};
use crate::sim::Simulation;
use crate::snapshot::SnapshotSlot;

// ── Conversion helpers ──────────────────────────────────────────────────

pub(crate) fn vec_to_na(v: Vec3) -> Vector<Real> {
    vector![v.x, v.y, v.z]
}

pub(crate) fn quat_to_na(q: Quat) -> Rotation<Real> {
    UnitQuaternion::new_normalize(Quaternion::new(q.w, q.x, q.y, q.z))
}

pub(crate) fn quat_from_na(q: &Rotation<Real>) -> Quat {
    Quat::from_xyzw(q.i, q.j, q.k, q.w)
}

pub(crate) fn pose_to_iso(pose: Pose) -> Isometry<Real> {
    Isometry::from_parts(
        Translation::from(vec_to_na(pose.translation)),
        quat_to_na(pose.rotation),
    )
}

pub(crate) fn pose_from_iso(iso: &Isometry<Real>) -> Pose {
    let t = iso.translation.vector;
    Pose::new(Vec3::new(t.x, t.y, t.z), quat_from_na(&iso.rotation))
}

// ── Entities ────────────────────────────────────────────────────────────

#[derive(Debug)]
struct RapierRobot {
    description: Arc<RobotDescription>,
    /// One body per description link, in link order.
    link_bodies: Vec<RigidBodyHandle>,
    pending_torques: Vec<f32>,
    /// Continuous hinge angles in DOF order, unwrapped step by step.
    joint_angles: Vec<f32>,
}

impl Described for RapierRobot {
    type Description = RobotDescription;

    fn description(&self) -> &Arc<RobotDescription> {
        &self.description
    }
}

#[derive(Debug)]
struct RapierProp {
    description: Arc<PropDescription>,
    body: RigidBodyHandle,
}

impl Described for RapierProp {
    type Description = PropDescription;

    fn description(&self) -> &Arc<PropDescription> {
        &self.description
    }
}

// ── Joint readout ───────────────────────────────────────────────────────

/// Wrap an angle into (-π, π].
fn wrap_angle(angle: f32) -> f32 {
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI { wrapped + TAU } else { wrapped }
}

/// Angle and rate of the hinge on link `index`.
///
/// The angle is recovered from the link's pose relative to its parent: with
/// both joint frames removed, what remains is a pure rotation about X. It
/// wraps at ±π; [`track_joint_angles`] turns it into a continuous reading.
fn hinge_state(sets: &PhysicsSets, robot: &RapierRobot, index: usize) -> Option<(f32, f32)> {
    let link_id = sets
        .multibody_joints
        .rigid_body_link(robot.link_bodies[index])?;
    let multibody = sets.multibody_joints.get_multibody(link_id.multibody)?;
    let link = multibody.link(link_id.id)?;

    let (in_parent, in_child) = robot.description.joint_frames(index);
    let joint_rotation = quat_to_na(in_parent.rotation).inverse()
        * link.local_to_parent().rotation
        * quat_to_na(in_child.rotation);
    let angle = joint_rotation.scaled_axis().x;
    let rate = multibody.joint_velocity(link).get(0).copied().unwrap_or(0.0);
    Some((angle, rate))
}

/// Wrapped hinge readings in DOF order.
fn hinge_readings(sets: &PhysicsSets, robot: &RapierRobot) -> Vec<(f32, f32)> {
    robot
        .description
        .links
        .iter()
        .enumerate()
        .skip(1)
        .filter(|(_, link)| link.joint_type == JointType::Hinge)
        .map(|(index, _)| hinge_state(sets, robot, index).unwrap_or((0.0, 0.0)))
        .collect()
}

/// Joint positions and velocities in DOF order. Positions are the tracked
/// continuous angles.
fn joint_state(sets: &PhysicsSets, robot: &RapierRobot) -> (Vec<f32>, Vec<f32>) {
    let velocities = hinge_readings(sets, robot)
        .into_iter()
        .map(|(_, rate)| rate)
        .collect();
    (robot.joint_angles.clone(), velocities)
}

/// Advance each tracked angle by the shortest turn to the current reading.
fn track_joint_angles(sets: &PhysicsSets, robot: &mut RapierRobot) {
    let readings = hinge_readings(sets, robot);
    robot.joint_angles.resize(readings.len(), 0.0);
    for (tracked, (reading, _)) in robot.joint_angles.iter_mut().zip(readings) {
        *tracked += wrap_angle(reading - *tracked);
    }
}

/// Turn a robot's pending joint torques into body torques and clear them.
fn apply_pending_torques(bodies: &mut RigidBodySet, robot: &mut RapierRobot) {
    let description = &robot.description;
    let hinges = description
        .links
        .iter()
        .enumerate()
        .skip(1)
        .filter(|(_, link)| link.joint_type == JointType::Hinge);

    for ((index, link), &torque) in hinges.zip(&robot.pending_torques) {
        if torque == 0.0 {
            continue;
        }
        let child = robot.link_bodies[index];
        let parent = robot.link_bodies[link.parent.unwrap_or(0)];
        let Some(axis) = builder::hinge_axis(bodies, description, index, child) else {
            continue;
        };
        let torque = axis * torque;
        if let Some(body) = bodies.get_mut(child) {
            body.add_torque(torque, true);
        }
        if let Some(body) = bodies.get_mut(parent) {
            body.add_torque(-torque, true);
        }
    }
    robot.pending_torques.fill(0.0);
}

// ── Simulation ──────────────────────────────────────────────────────────

/// The production [`Simulation`] backend.
pub struct RapierSimulation {
    config: SimulationConfig,
    pipeline: PhysicsPipeline,
    params: IntegrationParameters,
    sets: PhysicsSets,
    robots: Registry<RapierRobot>,
    props: Registry<RapierProp>,
    snapshot: SnapshotSlot<WorldSnapshot>,
}

impl std::fmt::Debug for RapierSimulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RapierSimulation")
            .field("gravity", &self.config.gravity)
            .field("robots", &self.robots.len())
            .field("props", &self.props.len())
            .field("bodies", &self.sets.bodies.len())
            .field("snapshot", &self.snapshot.get())
            .finish()
    }
}

impl RapierSimulation {
    /// Create an empty world with default gravity (0, -9.81, 0) and the
    /// default joint controller.
    pub fn new() -> Self {
        Self::with_config(SimulationConfig::default())
    }

    pub fn with_config(config: SimulationConfig) -> Self {
        Self {
            config,
            pipeline: PhysicsPipeline::new(),
            params: IntegrationParameters::default(),
            sets: PhysicsSets::new(),
            robots: Registry::new(),
            props: Registry::new(),
            snapshot: SnapshotSlot::new(),
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Recompute every multibody's link poses from its joint coordinates,
    /// write them back to the link bodies, and update the tracked angles.
    fn refresh_kinematics(&mut self) {
        for robot in self.robots.iter_mut() {
            let root = self
                .sets
                .multibody_joints
                .rigid_body_link(robot.link_bodies[0])
                .copied();
            if let Some(root) = root {
                if let Some(multibody) =
                    self.sets.multibody_joints.get_multibody_mut(root.multibody)
                {
                    multibody.forward_kinematics(&self.sets.bodies, true);
                    multibody.update_rigid_bodies(&mut self.sets.bodies, false);
                }
            }
            track_joint_angles(&self.sets, robot);
        }
    }

    fn body_pose(&self, body: RigidBodyHandle) -> Pose {
        pose_from_iso(self.sets.bodies[body].position())
    }
}

impl Default for RapierSimulation {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulation for RapierSimulation {
    fn add_robot(&mut self, robot: Arc<RobotDescription>, position: Vec3, rotation: Quat) -> usize {
        if let Err(err) = robot.validate() {
            panic!("invalid robot description: {err}");
        }
        let link_bodies = builder::build_robot(&mut self.sets, &robot, Pose::new(position, rotation));
        let links = link_bodies.len();
        let mut entry = RapierRobot {
            pending_torques: vec![0.0; robot.dof_count()],
            joint_angles: vec![0.0; robot.dof_count()],
            description: robot,
            link_bodies,
        };
        track_joint_angles(&self.sets, &mut entry);
        let handle = self.robots.push(entry);
        log::debug!("rapier: added robot {handle} ({links} links)");
        handle
    }

    fn add_prop(&mut self, prop: Arc<PropDescription>, position: Vec3, rotation: Quat) -> usize {
        let body = builder::build_prop(&mut self.sets, &prop, Pose::new(position, rotation));
        let is_static = prop.is_static();
        let handle = self.props.push(RapierProp {
            description: prop,
            body,
        });
        log::debug!("rapier: added prop {handle} (static: {is_static})");
        handle
    }

    fn remove_robot(&mut self, robot_idx: usize) {
        let robot = self.robots.remove(robot_idx);
        // The articulation must be gone before any of its bodies.
        self.sets
            .multibody_joints
            .remove_multibody_articulations(robot.link_bodies[0], false);
        for &body in robot.link_bodies.iter().rev() {
            self.sets.bodies.remove(
                body,
                &mut self.sets.islands,
                &mut self.sets.colliders,
                &mut self.sets.impulse_joints,
                &mut self.sets.multibody_joints,
                true,
            );
        }
        log::debug!("rapier: removed robot {robot_idx}");
    }

    fn remove_prop(&mut self, prop_idx: usize) {
        let prop = self.props.remove(prop_idx);
        self.sets.bodies.remove(
            prop.body,
            &mut self.sets.islands,
            &mut self.sets.colliders,
            &mut self.sets.impulse_joints,
            &mut self.sets.multibody_joints,
            true,
        );
        log::debug!("rapier: removed prop {prop_idx}");
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
        self.body_pose(self.robots[robot_idx].link_bodies[link_idx])
            .matrix()
    }

    fn prop_transform(&self, prop_idx: usize) -> Mat4 {
        self.body_pose(self.props[prop_idx].body).matrix()
    }

    fn joint_positions(&self, robot_idx: usize) -> Vec<f32> {
        joint_state(&self.sets, &self.robots[robot_idx]).0
    }

    fn joint_velocities(&self, robot_idx: usize) -> Vec<f32> {
        joint_state(&self.sets, &self.robots[robot_idx]).1
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
        let joint_angles = self.robots.iter().map(|r| r.joint_angles.clone()).collect();
        let capture = self.sets.capture(joint_angles);
        if let Ok(snapshot) = &capture {
            log::info!(
                "rapier: captured world snapshot ({} bytes)",
                snapshot.encoded_len
            );
        }
        self.snapshot.store(capture);
    }

    fn restore_state(&mut self) {
        let Some(snapshot) = self.snapshot.get() else {
            return;
        };
        self.sets.clone_from(&snapshot.sets);
        for (robot, angles) in self.robots.iter_mut().zip(&snapshot.joint_angles) {
            if robot.joint_angles.len() == angles.len() {
                robot.joint_angles.clone_from(angles);
            }
        }
        self.refresh_kinematics();
    }

    fn step(&mut self, dt: f32) {
        debug_assert!(dt > 0.0, "step requires a positive dt");

        if let Some(controller) = self.config.default_control {
            for robot in self.robots.iter_mut() {
                let (positions, velocities) = joint_state(&self.sets, robot);
                let control = controller.torques(&robot.description, &positions, &velocities);
                for (acc, torque) in robot.pending_torques.iter_mut().zip(control) {
                    *acc += torque;
                }
            }
        }
        for robot in self.robots.iter_mut() {
            apply_pending_torques(&mut self.sets.bodies, robot);
        }

        // One integration call, no sub-stepping on our side.
        self.params.dt = dt;
        let gravity = vec_to_na(self.config.gravity);
        self.pipeline.step(
            &gravity,
            &self.params,
            &mut self.sets.islands,
            &mut self.sets.broad_phase,
            &mut self.sets.narrow_phase,
            &mut self.sets.bodies,
            &mut self.sets.colliders,
            &mut self.sets.impulse_joints,
            &mut self.sets.multibody_joints,
            &mut self.sets.ccd_solver,
            None,
            &(),
            &(),
        );

        for robot in self.robots.iter() {
            for &body in &robot.link_bodies {
                if let Some(body) = self.sets.bodies.get_mut(body) {
                    body.reset_torques(false);
                }
            }
        }
        self.refresh_kinematics();
        log::trace!("rapier: stepped {dt}s");
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::{FRAC_PI_2, PI};

    use super::*;
    use crate::control::JointPdController;
    use crate::robot::Link;

    const DT: f32 = 1.0 / 240.0;

    fn single() -> Arc<RobotDescription> {
        Arc::new(RobotDescription::new(1.0, 0.1, 0.8).with_link(Link::base(1.0)))
    }

    fn two_link() -> Arc<RobotDescription> {
        Arc::new(
            RobotDescription::new(1.0, 0.05, 0.8)
                .with_link(Link::base(1.0))
                .with_link(Link::hinge(0, 1.0, Quat::IDENTITY, Vec3::Z, 0.5)),
        )
    }

    /// Base with three limbs, one of them two segments long.
    fn spider() -> Arc<RobotDescription> {
        Arc::new(
            RobotDescription::new(1.0, 0.05, 0.8)
                .with_link(Link::base(1.0))
                .with_link(Link::hinge(0, 1.0, Quat::IDENTITY, Vec3::Z, 0.5))
                .with_link(Link::hinge(1, 1.0, Quat::IDENTITY, Vec3::Z, 0.5))
                .with_link(Link::fixed(0, 0.0, Quat::from_rotation_z(FRAC_PI_2), 0.4))
                .with_link(Link::hinge(0, 0.5, Quat::from_rotation_y(FRAC_PI_2), Vec3::Y, 0.6)),
        )
    }

    fn translation(m: Mat4) -> Vec3 {
        Pose::from_matrix(m).translation
    }

    #[test]
    fn base_matches_insertion_pose() {
        let mut sim = RapierSimulation::new();
        let position = Vec3::new(1.0, 2.0, -3.0);
        let rotation = Quat::from_rotation_y(0.4);
        let handle = sim.add_robot(spider(), position, rotation);

        let expected = Mat4::from_rotation_translation(rotation, position);
        assert!(sim.link_transform(handle, 0).abs_diff_eq(expected, 1e-5));
        for link in 0..5 {
            assert!(sim.link_transform(handle, link).is_finite());
        }
    }

    #[test]
    fn child_sits_at_parent_end() {
        let mut sim = RapierSimulation::new();
        let handle = sim.add_robot(two_link(), Vec3::new(0.0, 2.0, 0.0), Quat::IDENTITY);
        let child = translation(sim.link_transform(handle, 1));
        assert!((child - Vec3::new(0.75, 2.0, 0.0)).length() < 1e-4);
        let angles = sim.joint_positions(handle);
        assert!(angles[0].abs() < 1e-4);
    }

    #[test]
    fn dof_vectors_match_hinge_count() {
        let mut sim = RapierSimulation::new();
        let handle = sim.add_robot(spider(), Vec3::ZERO, Quat::IDENTITY);
        assert_eq!(sim.joint_positions(handle).len(), 3);
        assert_eq!(sim.joint_velocities(handle).len(), 3);

        let rigid = Arc::new(
            RobotDescription::new(1.0, 0.05, 0.8)
                .with_link(Link::base(1.0))
                .with_link(Link::fixed(0, 1.0, Quat::IDENTITY, 1.0)),
        );
        let handle = sim.add_robot(rigid, Vec3::new(0.0, 0.0, 5.0), Quat::IDENTITY);
        assert!(sim.joint_positions(handle).is_empty());
        assert!(sim.joint_velocities(handle).is_empty());
    }

    #[test]
    fn removal_renumbers_robots() {
        let mut sim = RapierSimulation::new();
        let robots = [two_link(), spider(), two_link()];
        for (i, robot) in robots.iter().enumerate() {
            sim.add_robot(robot.clone(), Vec3::new(3.0 * i as f32, 1.0, 0.0), Quat::IDENTITY);
        }
        let last_pose = sim.link_transform(2, 1);

        sim.remove_robot(0);
        assert_eq!(sim.robot_count(), 2);
        assert!(Arc::ptr_eq(&sim.robot(1), &robots[2]));
        assert_eq!(sim.link_transform(1, 1), last_pose);
        assert_eq!(sim.find_robot_index(&robots[0]), None);
        assert_eq!(sim.find_robot_index(&robots[1]), Some(0));
    }

    #[test]
    fn find_uses_identity() {
        let mut sim = RapierSimulation::new();
        let robot = two_link();
        sim.add_robot(robot.clone(), Vec3::ZERO, Quat::IDENTITY);
        let twin = RobotDescription::clone(&robot);
        assert_eq!(sim.find_robot_index(&twin), None);
        assert_eq!(sim.find_robot_index(&robot), Some(0));
    }

    #[test]
    fn base_only_robot_falls_freely() {
        let mut sim = RapierSimulation::new();
        let handle = sim.add_robot(single(), Vec3::new(0.0, 5.0, 0.0), Quat::IDENTITY);
        assert!(sim.joint_positions(handle).is_empty());

        let dt = 1.0 / 60.0;
        sim.step(dt);
        let pose = Pose::from_matrix(sim.link_transform(handle, 0));
        let drop = 5.0 - pose.translation.y;
        let g = 9.81;
        assert!(drop > 0.5 * g * dt * dt - 1e-5);
        assert!(drop < g * dt * dt + 1e-5);
        assert!(pose.translation.x.abs() < 1e-6);
        assert!(pose.translation.z.abs() < 1e-6);
        assert!(pose.rotation.dot(Quat::IDENTITY).abs() > 1.0 - 1e-6);
    }

    #[test]
    fn default_control_is_idle_on_target() {
        let mut sim = RapierSimulation::with_config(SimulationConfig::zero_gravity());
        let robot = two_link();
        let handle = sim.add_robot(robot.clone(), Vec3::ZERO, Quat::IDENTITY);

        let torques = JointPdController::default().torques(
            &robot,
            &sim.joint_positions(handle),
            &sim.joint_velocities(handle),
        );
        assert_eq!(torques.len(), 1);
        assert!(torques[0].abs() < 1e-4);

        sim.step(DT);
        assert!(sim.joint_velocities(handle)[0].abs() < 1e-3);
    }

    #[test]
    fn joint_torque_spins_hinge() {
        let config = SimulationConfig::zero_gravity().without_default_control();
        let mut sim = RapierSimulation::with_config(config);
        let handle = sim.add_robot(two_link(), Vec3::ZERO, Quat::IDENTITY);
        sim.add_joint_torques(handle, &[0.5]);
        sim.add_joint_torques(handle, &[0.5]);
        sim.step(DT);
        let first = sim.joint_velocities(handle)[0];
        assert!(first > 0.0);

        // The torque was consumed; the hinge coasts.
        sim.step(DT);
        let second = sim.joint_velocities(handle)[0];
        assert!((second - first).abs() < 0.5 * first);
    }

    #[test]
    #[should_panic]
    fn malformed_description_panics() {
        let mut sim = RapierSimulation::new();
        let robot = RobotDescription::new(1.0, 0.1, 0.5)
            .with_link(Link::hinge(0, 0.5, Quat::IDENTITY, Vec3::Z, 1.0));
        sim.add_robot(Arc::new(robot), Vec3::ZERO, Quat::IDENTITY);
    }

    #[test]
    fn snapshot_round_trip() {
        let mut sim = RapierSimulation::new();
        let handle = sim.add_robot(spider(), Vec3::new(0.0, 3.0, 0.0), Quat::IDENTITY);
        for _ in 0..5 {
            sim.step(DT);
        }

        let positions = sim.joint_positions(handle);
        let velocities = sim.joint_velocities(handle);
        let transforms: Vec<_> = (0..5).map(|l| sim.link_transform(handle, l)).collect();

        sim.save_state();
        for _ in 0..20 {
            sim.step(DT);
        }
        assert!(translation(sim.link_transform(handle, 0)).y < translation(transforms[0]).y);
        sim.restore_state();

        for (a, b) in sim.joint_positions(handle).iter().zip(&positions) {
            assert!((a - b).abs() < 1e-5);
        }
        for (a, b) in sim.joint_velocities(handle).iter().zip(&velocities) {
            assert!((a - b).abs() < 1e-5);
        }
        for (link, expected) in transforms.iter().enumerate() {
            assert!(sim.link_transform(handle, link).abs_diff_eq(*expected, 1e-5));
        }
    }

    #[test]
    fn restore_is_repeatable() {
        let mut sim = RapierSimulation::new();
        let handle = sim.add_robot(two_link(), Vec3::new(0.0, 3.0, 0.0), Quat::IDENTITY);
        sim.save_state();

        let mut finals = Vec::new();
        for _ in 0..2 {
            sim.restore_state();
            for _ in 0..30 {
                sim.step(DT);
            }
            finals.push(sim.link_transform(handle, 1));
        }
        assert!(finals[0].abs_diff_eq(finals[1], 1e-5));
    }

    #[test]
    fn restore_without_save_is_noop() {
        let mut sim = RapierSimulation::new();
        let handle = sim.add_robot(spider(), Vec3::new(0.0, 3.0, 0.0), Quat::IDENTITY);
        sim.step(DT);
        let before: Vec<_> = (0..5).map(|l| sim.link_transform(handle, l)).collect();
        let joints = sim.joint_positions(handle);

        sim.restore_state();
        let after: Vec<_> = (0..5).map(|l| sim.link_transform(handle, l)).collect();
        assert_eq!(before, after);
        assert_eq!(joints, sim.joint_positions(handle));
    }

    #[test]
    fn props_rest_on_static_ground() {
        let mut sim = RapierSimulation::new();
        let ground = Arc::new(PropDescription::new(Vec3::new(5.0, 0.5, 5.0), 0.0, 0.9));
        let crate_box = Arc::new(PropDescription::new(Vec3::splat(0.25), 1.0, 0.6));
        let g = sim.add_prop(ground.clone(), Vec3::ZERO, Quat::IDENTITY);
        let c = sim.add_prop(crate_box.clone(), Vec3::new(0.0, 2.0, 0.0), Quat::IDENTITY);
        let r = sim.add_robot(single(), Vec3::new(2.0, 1.5, 0.0), Quat::IDENTITY);

        for _ in 0..480 {
            sim.step(DT);
        }
        assert!(sim.prop_transform(g).abs_diff_eq(Mat4::IDENTITY, 1e-6));
        let crate_y = translation(sim.prop_transform(c)).y;
        assert!(crate_y > 0.6 && crate_y < 0.9);
        let robot_y = translation(sim.link_transform(r, 0)).y;
        assert!(robot_y > 0.5 && robot_y < 0.8);

        assert_eq!(sim.find_prop_index(&crate_box), Some(1));
        sim.remove_prop(0);
        assert_eq!(sim.prop_count(), 1);
        assert!(Arc::ptr_eq(&sim.prop(0), &crate_box));
    }

    #[test]
    fn wrap_angle_stays_in_half_open_range() {
        assert!((wrap_angle(PI + 0.1) - (-PI + 0.1)).abs() < 1e-5);
        assert!((wrap_angle(-PI - 0.1) - (PI - 0.1)).abs() < 1e-5);
        assert!((wrap_angle(-PI) - PI).abs() < 1e-5);
        assert!((wrap_angle(0.3) - 0.3).abs() < 1e-6);
    }

    #[test]
    fn stepping_continues_after_robot_removal() {
        for warm_up in [0, 3] {
            let mut sim = RapierSimulation::new();
            let first = two_link();
            let second = spider();
            sim.add_robot(first, Vec3::new(0.0, 2.0, 0.0), Quat::IDENTITY);
            sim.add_robot(second.clone(), Vec3::new(3.0, 2.0, 0.0), Quat::IDENTITY);
            for _ in 0..warm_up {
                sim.step(DT);
            }

            sim.remove_robot(0);
            let before = translation(sim.link_transform(0, 0)).y;
            for _ in 0..10 {
                sim.step(DT);
            }

            assert_eq!(sim.find_robot_index(&second), Some(0));
            assert!(translation(sim.link_transform(0, 0)).y < before);
            assert_eq!(sim.joint_positions(0).len(), 3);
            for link in 0..5 {
                assert!(sim.link_transform(0, link).is_finite());
            }
        }
    }

    #[test]
    fn removed_robot_can_be_replaced() {
        let mut sim = RapierSimulation::new();
        sim.add_robot(spider(), Vec3::new(0.0, 2.0, 0.0), Quat::IDENTITY);
        sim.add_robot(two_link(), Vec3::new(3.0, 2.0, 0.0), Quat::IDENTITY);
        sim.step(DT);
        sim.remove_robot(1);
        sim.remove_robot(0);
        let handle = sim.add_robot(two_link(), Vec3::new(0.0, 2.0, 0.0), Quat::IDENTITY);
        for _ in 0..5 {
            sim.step(DT);
        }
        assert_eq!(handle, 0);
        assert!(sim.link_transform(handle, 1).is_finite());
    }

    #[test]
    fn stepping_continues_after_prop_removal() {
        let mut sim = RapierSimulation::new();
        let ground = Arc::new(PropDescription::new(Vec3::new(5.0, 0.5, 5.0), 0.0, 0.9));
        let crate_box = Arc::new(PropDescription::new(Vec3::splat(0.25), 1.0, 0.6));
        sim.add_prop(crate_box.clone(), Vec3::new(1.0, 2.0, 0.0), Quat::IDENTITY);
        sim.add_prop(ground, Vec3::ZERO, Quat::IDENTITY);
        sim.add_prop(crate_box.clone(), Vec3::new(-1.0, 2.0, 0.0), Quat::IDENTITY);
        sim.add_robot(two_link(), Vec3::new(0.0, 1.5, 0.0), Quat::IDENTITY);
        for _ in 0..60 {
            sim.step(DT);
        }

        // The ground goes; everything left keeps falling.
        sim.remove_prop(1);
        let before = translation(sim.prop_transform(1)).y;
        for _ in 0..60 {
            sim.step(DT);
        }
        assert_eq!(sim.prop_count(), 2);
        assert!(translation(sim.prop_transform(1)).y < before - 0.05);
        assert!(translation(sim.link_transform(0, 0)).y < 0.5);
    }

    #[test]
    fn snapshot_replays_contacts_exactly() {
        let mut sim = RapierSimulation::new();
        let ground = Arc::new(PropDescription::new(Vec3::new(5.0, 0.5, 5.0), 0.0, 0.9));
        let crate_box = Arc::new(PropDescription::new(Vec3::splat(0.25), 1.0, 0.6));
        sim.add_prop(ground, Vec3::ZERO, Quat::IDENTITY);
        let c = sim.add_prop(crate_box, Vec3::new(-1.5, 1.0, 0.0), Quat::from_rotation_z(0.3));
        let r = sim.add_robot(spider(), Vec3::new(0.0, 1.0, 0.5), Quat::IDENTITY);
        for _ in 0..120 {
            sim.step(DT);
        }
        sim.save_state();

        let mut runs = Vec::new();
        for _ in 0..2 {
            sim.restore_state();
            for _ in 0..60 {
                sim.step(DT);
            }
            let links: Vec<_> = (0..5).map(|l| sim.link_transform(r, l)).collect();
            runs.push((sim.prop_transform(c), links, sim.joint_positions(r)));
        }

        let (crate_a, links_a, joints_a) = &runs[0];
        let (crate_b, links_b, joints_b) = &runs[1];
        assert!(crate_a.abs_diff_eq(*crate_b, 1e-5));
        for (a, b) in links_a.iter().zip(links_b) {
            assert!(a.abs_diff_eq(*b, 1e-5));
        }
        for (a, b) in joints_a.iter().zip(joints_b) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn hinge_angle_is_continuous_past_half_turn() {
        let config = SimulationConfig::zero_gravity().without_default_control();
        let mut sim = RapierSimulation::with_config(config);
        let handle = sim.add_robot(two_link(), Vec3::ZERO, Quat::IDENTITY);

        let mut previous = sim.joint_positions(handle)[0];
        let mut steps = 0;
        while previous.abs() < 1.5 * PI && steps < 4800 {
            sim.add_joint_torques(handle, &[0.05]);
            sim.step(DT);
            let angle = sim.joint_positions(handle)[0];
            assert!((angle - previous).abs() < 0.5, "angle jumped {previous} -> {angle}");
            previous = angle;
            steps += 1;
        }
        assert!(previous.abs() > 1.5 * PI);

        // The tracked angle survives a snapshot.
        sim.save_state();
        for _ in 0..30 {
            sim.step(DT);
        }
        sim.restore_state();
        assert!((sim.joint_positions(handle)[0] - previous).abs() < 1e-5);
    }
}
