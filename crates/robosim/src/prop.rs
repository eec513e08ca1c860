//! Prop descriptions: passive boxes placed alongside robots.

use serde::{Deserialize, Serialize};

use crate::math::Vec3;

/// An immutable box-shaped prop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropDescription {
    pub half_extents: Vec3,
    /// Mass per unit volume. Zero makes the prop immovable.
    pub density: f32,
    pub friction: f32,
}

impl PropDescription {
    pub fn new(half_extents: Vec3, density: f32, friction: f32) -> Self {
        Self {
            half_extents,
            density,
            friction,
        }
    }

    /// Box volume times density.
    pub fn mass(&self) -> f32 {
        8.0 * self.half_extents.x * self.half_extents.y * self.half_extents.z * self.density
    }

    /// A prop without mass has zero inverse mass and never moves.
    pub fn is_static(&self) -> bool {
        self.mass() == 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mass_from_full_extents() {
        let prop = PropDescription::new(Vec3::new(0.5, 1.0, 2.0), 3.0, 0.5);
        assert!((prop.mass() - 24.0).abs() < 1e-5);
        assert!(!prop.is_static());
    }

    #[test]
    fn zero_density_is_static() {
        let ground = PropDescription::new(Vec3::new(10.0, 0.5, 10.0), 0.0, 0.9);
        assert!(ground.is_static());
    }
}
