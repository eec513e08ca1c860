//! # Tree-to-Multibody Builder
//!
//! Turns a [`RobotDescription`] into one rapier multibody. Every link becomes
//! a dynamic rigid body carrying a single X-aligned capsule collider; every
//! non-base link is attached to its parent body with a multibody joint whose
//! frames come from [`RobotDescription::joint_frames`].
//!
//! Links are inserted in description order, and rapier appends each new
//! child to the end of the parent's multibody, so internal link `k` is always
//! description link `k`.

use rapier3d::prelude::*;

use super::state::PhysicsSets;
use super::{pose_to_iso, quat_to_na};
use crate::math::Pose;
use crate::prop::PropDescription;
use crate::robot::{JointType, RobotDescription};

/// Robot links collide with other robots and props.
pub(crate) const ROBOT_GROUPS: InteractionGroups =
    InteractionGroups::new(Group::GROUP_1, Group::GROUP_1.union(Group::GROUP_2));

/// Props collide with robots and other props.
pub(crate) const PROP_GROUPS: InteractionGroups =
    InteractionGroups::new(Group::GROUP_2, Group::GROUP_1.union(Group::GROUP_2));

/// Insert a robot at `placement` and return one body handle per link.
///
/// The description must already be validated.
pub(crate) fn build_robot(
    sets: &mut PhysicsSets,
    robot: &RobotDescription,
    placement: Pose,
) -> Vec<RigidBodyHandle> {
    let mut link_bodies: Vec<RigidBodyHandle> = Vec::with_capacity(robot.link_count());
    let mut world_poses: Vec<Pose> = Vec::with_capacity(robot.link_count());

    for (index, link) in robot.links.iter().enumerate() {
        // Start every body at its zero-angle pose.
        let pose = match link.parent {
            None => placement,
            Some(parent) => world_poses[parent] * robot.link_to_parent(index, 0.0),
        };
        world_poses.push(pose);

        let body = RigidBodyBuilder::dynamic()
            .position(pose_to_iso(pose))
            .linear_damping(0.0)
            .angular_damping(0.0)
            .can_sleep(false)
            .build();
        let handle = sets.bodies.insert(body);

        let collider = ColliderBuilder::capsule_x(0.5 * link.length, robot.link_radius)
            .mass(robot.link_mass(index))
            .friction(robot.friction)
            .collision_groups(ROBOT_GROUPS)
            .build();
        sets.colliders
            .insert_with_parent(collider, handle, &mut sets.bodies);

        if let Some(parent) = link.parent {
            let locked_axes = match link.joint_type {
                JointType::Hinge => JointAxesMask::LOCKED_REVOLUTE_AXES,
                JointType::Fixed | JointType::Free => JointAxesMask::LOCKED_FIXED_AXES,
            };
            let (in_parent, in_child) = robot.joint_frames(index);
            let joint = GenericJointBuilder::new(locked_axes)
                .local_frame1(pose_to_iso(in_parent))
                .local_frame2(pose_to_iso(in_child))
                .contacts_enabled(false)
                .build();
            if sets
                .multibody_joints
                .insert(link_bodies[parent], handle, joint, true)
                .is_none()
            {
                log::warn!("rapier: link {index} could not join its parent {parent}");
            }
        }
        link_bodies.push(handle);
    }

    // A base-only robot has no multibody; its single body is already placed.
    let root = sets.multibody_joints.rigid_body_link(link_bodies[0]).copied();
    if let Some(root) = root {
        if let Some(multibody) = sets.multibody_joints.get_multibody_mut(root.multibody) {
            multibody.set_self_contacts_enabled(false);
            multibody.forward_kinematics(&sets.bodies, true);
            // After forward kinematics, which settles the free root's DOFs.
            multibody.damping_mut().fill(0.0);
            multibody.update_rigid_bodies(&mut sets.bodies, true);
        }
    }

    link_bodies
}

/// Insert a box prop at `placement`. A massless prop is a fixed body.
pub(crate) fn build_prop(
    sets: &mut PhysicsSets,
    prop: &PropDescription,
    placement: Pose,
) -> RigidBodyHandle {
    let builder = if prop.is_static() {
        RigidBodyBuilder::fixed()
    } else {
        RigidBodyBuilder::dynamic()
    };
    let body = builder.position(pose_to_iso(placement)).build();
    let handle = sets.bodies.insert(body);

    let half = prop.half_extents;
    let mut collider = ColliderBuilder::cuboid(half.x, half.y, half.z)
        .friction(prop.friction)
        .collision_groups(PROP_GROUPS);
    if !prop.is_static() {
        collider = collider.mass(prop.mass());
    }
    sets.colliders
        .insert_with_parent(collider.build(), handle, &mut sets.bodies);
    handle
}

/// World-space hinge axis of link `index`, read from the link's body.
pub(crate) fn hinge_axis(
    bodies: &RigidBodySet,
    robot: &RobotDescription,
    index: usize,
    body: RigidBodyHandle,
) -> Option<Vector<Real>> {
    let (_, in_child) = robot.joint_frames(index);
    let rotation = bodies.get(body)?.position().rotation * quat_to_na(in_child.rotation);
    Some(rotation * Vector::<Real>::x())
}
