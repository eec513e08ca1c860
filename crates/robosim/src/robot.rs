//! # Robot Descriptions — Link Trees
//!
//! A [`RobotDescription`] is an ordered list of [`Link`]s forming a kinematic
//! tree rooted at link 0 (the base). Every link is a capsule lying along its
//! own local X axis, centred on the link frame origin.
//!
//! ## Joint frames
//!
//! A child attaches to its parent at a pivot `(joint_position - 0.5) *
//! parent.length` along the parent's X axis, so 0 is the parent's start, 1 its
//! end, and 0.5 its centre. The joint frame is rotated by `joint_rotation`
//! relative to the parent, and the child's centre sits `0.5 * length` further
//! along the child's own X axis. A hinge rotates about `joint_axis`, expressed
//! in the joint frame.
//!
//! ```ignore
//! let robot = RobotDescription::new(1.0, 0.05, 0.9)
//!     .with_link(Link::base(1.0))
//!     .with_link(Link::hinge(0, 1.0, Quat::IDENTITY, Vec3::Z, 0.5));
//! robot.validate()?;
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::math::{Pose, Quat, Vec3};

/// How a link attaches to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JointType {
    /// Unconstrained 6-DOF attachment to the world. Only valid for the base.
    Free,
    /// One rotational DOF about the joint axis.
    Hinge,
    /// Rigid attachment, no DOF.
    Fixed,
}

/// One segment of a robot's kinematic tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    /// Index of the parent link, `None` for the base.
    pub parent: Option<usize>,
    pub joint_type: JointType,
    /// Fractional offset along the parent's length, in `[0, 1]`.
    pub joint_position: f32,
    /// Rotation of the joint frame relative to the parent link's frame.
    pub joint_rotation: Quat,
    /// Hinge axis in the joint frame. Ignored for non-hinge joints.
    pub joint_axis: Vec3,
    pub length: f32,
}

impl Link {
    pub fn new(
        parent: Option<usize>,
        joint_type: JointType,
        joint_position: f32,
        joint_rotation: Quat,
        joint_axis: Vec3,
        length: f32,
    ) -> Self {
        Self {
            parent,
            joint_type,
            joint_position,
            joint_rotation,
            joint_axis,
            length,
        }
    }

    /// A free-floating base link.
    pub fn base(length: f32) -> Self {
        Self::new(None, JointType::Free, 0.0, Quat::IDENTITY, Vec3::X, length)
    }

    pub fn hinge(
        parent: usize,
        joint_position: f32,
        joint_rotation: Quat,
        joint_axis: Vec3,
        length: f32,
    ) -> Self {
        Self::new(
            Some(parent),
            JointType::Hinge,
            joint_position,
            joint_rotation,
            joint_axis,
            length,
        )
    }

    pub fn fixed(parent: usize, joint_position: f32, joint_rotation: Quat, length: f32) -> Self {
        Self::new(
            Some(parent),
            JointType::Fixed,
            joint_position,
            joint_rotation,
            Vec3::X,
            length,
        )
    }

    /// Number of joint degrees of freedom this link contributes.
    pub fn dof_count(&self) -> usize {
        match self.joint_type {
            JointType::Hinge => 1,
            JointType::Free | JointType::Fixed => 0,
        }
    }

    /// Rotation taking the local X axis onto the hinge axis.
    ///
    /// Joints always rotate about X in their own frame; this maps that frame
    /// onto the declared axis. Identity for non-hinge joints.
    pub fn axis_alignment(&self) -> Quat {
        match self.joint_type {
            JointType::Hinge => {
                let axis = self.joint_axis.try_normalize().unwrap_or(Vec3::X);
                Quat::from_rotation_arc(Vec3::X, axis)
            }
            JointType::Free | JointType::Fixed => Quat::IDENTITY,
        }
    }
}

/// An immutable robot: shared material properties plus the link tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotDescription {
    /// Mass per unit of link length.
    pub link_density: f32,
    /// Capsule radius shared by every link.
    pub link_radius: f32,
    pub friction: f32,
    /// Link 0 is the base.
    pub links: Vec<Link>,
}

impl RobotDescription {
    pub fn new(link_density: f32, link_radius: f32, friction: f32) -> Self {
        Self {
            link_density,
            link_radius,
            friction,
            links: Vec::new(),
        }
    }

    /// Append a link (builder pattern).
    pub fn with_link(mut self, link: Link) -> Self {
        self.links.push(link);
        self
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn link_mass(&self, index: usize) -> f32 {
        self.links[index].length * self.link_density
    }

    /// Total joint DOF over all non-base links.
    pub fn dof_count(&self) -> usize {
        self.links.iter().skip(1).map(Link::dof_count).sum()
    }

    /// For each DOF, the index of the owning link among the jointed links
    /// (base excluded, so link 1 is jointed link 0).
    pub fn dof_links(&self) -> Vec<usize> {
        self.links
            .iter()
            .skip(1)
            .enumerate()
            .flat_map(|(jointed, link)| std::iter::repeat_n(jointed, link.dof_count()))
            .collect()
    }

    /// Pivot of link `index` in its parent's frame. Zero for the base.
    pub fn parent_pivot(&self, index: usize) -> Vec3 {
        let link = &self.links[index];
        let parent_length = link.parent.map_or(0.0, |parent| self.links[parent].length);
        Vec3::new((link.joint_position - 0.5) * parent_length, 0.0, 0.0)
    }

    /// Offset from a link's pivot to its centre, in the link's frame.
    pub fn center_offset(&self, index: usize) -> Vec3 {
        Vec3::new(0.5 * self.links[index].length, 0.0, 0.0)
    }

    /// The joint frames of link `index`: the first in the parent's frame,
    /// the second in the link's own frame. The joint rotates about X of both.
    pub fn joint_frames(&self, index: usize) -> (Pose, Pose) {
        let link = &self.links[index];
        let alignment = link.axis_alignment();
        let in_parent = Pose::new(self.parent_pivot(index), link.joint_rotation * alignment);
        let in_child = Pose::new(-self.center_offset(index), alignment);
        (in_parent, in_child)
    }

    /// Pose of link `index` in its parent's frame for a given joint angle.
    /// The angle is ignored for non-hinge joints.
    pub fn link_to_parent(&self, index: usize, angle: f32) -> Pose {
        let (in_parent, in_child) = self.joint_frames(index);
        let angle = match self.links[index].joint_type {
            JointType::Hinge => angle,
            JointType::Free | JointType::Fixed => 0.0,
        };
        in_parent * Pose::from_rotation(Quat::from_rotation_x(angle)) * in_child.inverse()
    }

    /// Check the structural rules every builder relies on.
    pub fn validate(&self) -> Result<(), DescriptionError> {
        let Some(base) = self.links.first() else {
            return Err(DescriptionError::NoLinks);
        };
        if base.parent.is_some() {
            return Err(DescriptionError::BaseHasParent);
        }
        if base.joint_type != JointType::Free {
            return Err(DescriptionError::BaseNotFree(base.joint_type));
        }
        if !(self.link_radius.is_finite() && self.link_radius > 0.0) {
            return Err(DescriptionError::InvalidRadius(self.link_radius));
        }

        for (index, link) in self.links.iter().enumerate() {
            if !(link.length.is_finite() && link.length > 0.0) {
                return Err(DescriptionError::InvalidLength {
                    link: index,
                    length: link.length,
                });
            }
            if index == 0 {
                continue;
            }
            let Some(parent) = link.parent else {
                return Err(DescriptionError::MissingParent { link: index });
            };
            if parent >= index {
                return Err(DescriptionError::ParentNotBefore {
                    link: index,
                    parent,
                });
            }
            if link.joint_type == JointType::Free {
                return Err(DescriptionError::FreeJointOnChild { link: index });
            }
            if !(0.0..=1.0).contains(&link.joint_position) {
                return Err(DescriptionError::JointPositionOutOfRange {
                    link: index,
                    joint_position: link.joint_position,
                });
            }
        }
        Ok(())
    }
}

/// A structural problem in a [`RobotDescription`].
#[derive(Debug, Clone, PartialEq)]
pub enum DescriptionError {
    NoLinks,
    BaseHasParent,
    BaseNotFree(JointType),
    InvalidRadius(f32),
    InvalidLength { link: usize, length: f32 },
    MissingParent { link: usize },
    ParentNotBefore { link: usize, parent: usize },
    FreeJointOnChild { link: usize },
    JointPositionOutOfRange { link: usize, joint_position: f32 },
}

impl fmt::Display for DescriptionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoLinks => write!(f, "robot has no links"),
            Self::BaseHasParent => write!(f, "base link must not have a parent"),
            Self::BaseNotFree(joint) => write!(f, "base link joint must be Free, got {joint:?}"),
            Self::InvalidRadius(radius) => write!(f, "link radius must be positive, got {radius}"),
            Self::InvalidLength { link, length } => {
                write!(f, "link {link} length must be positive, got {length}")
            }
            Self::MissingParent { link } => write!(f, "link {link} has no parent"),
            Self::ParentNotBefore { link, parent } => {
                write!(f, "link {link} references parent {parent}, which does not precede it")
            }
            Self::FreeJointOnChild { link } => {
                write!(f, "link {link} uses a Free joint, which is only valid for the base")
            }
            Self::JointPositionOutOfRange {
                link,
                joint_position,
            } => write!(
                f,
                "link {link} joint position {joint_position} is outside [0, 1]"
            ),
        }
    }
}

impl std::error::Error for DescriptionError {}
