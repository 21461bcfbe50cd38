//! Bounding-box and placement helpers on top of [`glam`].
//!
//! `glam` supplies the vectors and matrices; what it lacks is an
//! axis-aligned box that can start empty and a rotation-free transform
//! that serialises the way glTF nodes store it.

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// An inverted box that any `expand` call will replace.
    pub const EMPTY: Aabb = Aabb {
        min: Vec3::INFINITY,
        max: Vec3::NEG_INFINITY,
    };

    pub fn from_points<I: IntoIterator<Item = Vec3>>(points: I) -> Aabb {
        points.into_iter().fold(Aabb::EMPTY, |b, p| b.expand(p))
    }

    pub fn is_empty(&self) -> bool {
        self.min.cmpgt(self.max).any()
    }

    pub fn expand(self, p: Vec3) -> Aabb {
        Aabb {
            min: self.min.min(p),
            max: self.max.max(p),
        }
    }

    pub fn union(self, o: Aabb) -> Aabb {
        if o.is_empty() {
            return self;
        }
        if self.is_empty() {
            return o;
        }
        Aabb {
            min: self.min.min(o.min),
            max: self.max.max(o.max),
        }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        if self.is_empty() {
            Vec3::ZERO
        } else {
            self.max - self.min
        }
    }

    /// Box after scaling then translating every corner.
    pub fn transformed(&self, translation: Vec3, scale: Vec3) -> Aabb {
        if self.is_empty() {
            return *self;
        }
        let a = self.min * scale + translation;
        let b = self.max * scale + translation;
        Aabb {
            min: a.min(b),
            max: a.max(b),
        }
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Aabb::EMPTY
    }
}

/// Translation plus per-axis scale. No rotation: nothing in the scene is rotated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub translation: Vec3,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn apply(&self, p: Vec3) -> Vec3 {
        p * self.scale + self.translation
    }

    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_translation(self.translation) * Mat4::from_scale(self.scale)
    }

    /// Matrix for normals: inverse-transpose of the upper 3×3.
    pub fn normal_matrix(&self) -> Mat4 {
        Mat4::from_scale(self.scale.recip())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aabb_center_and_size() {
        let b = Aabb::from_points([Vec3::new(-1.0, 2.0, 0.0), Vec3::new(3.0, 4.0, 1.0)]);
        assert_eq!(b.center(), Vec3::new(1.0, 3.0, 0.5));
        assert_eq!(b.size(), Vec3::new(4.0, 2.0, 1.0));
    }

    #[test]
    fn empty_box_has_zero_size_and_unions_cleanly() {
        assert!(Aabb::EMPTY.is_empty());
        assert_eq!(Aabb::EMPTY.size(), Vec3::ZERO);
        let b = Aabb::from_points([Vec3::ONE]);
        assert_eq!(Aabb::EMPTY.union(b), b);
    }

    #[test]
    fn negative_scale_keeps_min_below_max() {
        let b = Aabb::from_points([Vec3::ZERO, Vec3::ONE]);
        let t = b.transformed(Vec3::ZERO, Vec3::new(-2.0, 1.0, 1.0));
        assert_eq!(t.min.x, -2.0);
        assert_eq!(t.max.x, 0.0);
    }

    #[test]
    fn matrix_agrees_with_apply() {
        let t = Transform { translation: Vec3::new(1.0, -2.0, 3.0), scale: Vec3::new(2.0, 0.5, 4.0) };
        let p = Vec3::new(0.25, 8.0, -1.0);
        assert!(t.to_mat4().transform_point3(p).abs_diff_eq(t.apply(p), 1e-5));
    }
}
