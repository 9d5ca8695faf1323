//! Axis-aligned bounding boxes.

use glam::{Mat4, Vec3};
use serde::Serialize;

/// Smallest axis-aligned box enclosing a set of points.
///
/// An empty box has `min = +inf` and `max = -inf`, so expanding it by any
/// point yields a box of zero size around that point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl BoundingBox {
    pub const EMPTY: Self = Self {
        min: Vec3::INFINITY,
        max: Vec3::NEG_INFINITY,
    };

    #[inline]
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Box centred on `center` with the given full extents.
    pub fn from_center_size(center: Vec3, size: Vec3) -> Self {
        let half = size * 0.5;
        Self::new(center - half, center + half)
    }

    pub fn from_points<I>(points: I) -> Self
    where
        I: IntoIterator<Item = Vec3>,
    {
        points.into_iter().fold(Self::EMPTY, |mut acc, p| {
            acc.expand_to_include(p);
            acc
        })
    }

    /// True when no point has been added (any axis has `min > max`).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.cmpgt(self.max).any()
    }

    /// True when the box cannot be used as a divisor: empty, non-finite, or
    /// flat along at least one axis.
    pub fn is_degenerate(&self) -> bool {
        if self.is_empty() || !self.min.is_finite() || !self.max.is_finite() {
            return true;
        }
        self.size().cmple(Vec3::ZERO).any()
    }

    #[inline]
    pub fn center(&self) -> Vec3 {
        if self.is_empty() {
            return Vec3::ZERO;
        }
        (self.min + self.max) * 0.5
    }

    #[inline]
    pub fn size(&self) -> Vec3 {
        if self.is_empty() {
            return Vec3::ZERO;
        }
        self.max - self.min
    }

    #[inline]
    pub fn expand_to_include(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    pub fn union(&self, other: &Self) -> Self {
        Self::new(self.min.min(other.min), self.max.max(other.max))
    }

    pub fn contains(&self, p: Vec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }

    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }

    /// Box enclosing the eight transformed corners. Empty stays empty.
    pub fn transformed(&self, m: &Mat4) -> Self {
        if self.is_empty() {
            return Self::EMPTY;
        }
        Self::from_points(self.corners().into_iter().map(|c| m.transform_point3(c)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_box_reports_zero_size() {
        let b = BoundingBox::EMPTY;
        assert!(b.is_empty());
        assert!(b.is_degenerate());
        assert_eq!(b.size(), Vec3::ZERO);
        assert_eq!(b.center(), Vec3::ZERO);
    }

    #[test]
    fn from_points_tracks_extremes() {
        let b = BoundingBox::from_points([
            Vec3::new(1.0, -2.0, 3.0),
            Vec3::new(-1.0, 4.0, 0.5),
            Vec3::new(0.0, 0.0, -3.0),
        ]);
        assert_eq!(b.min, Vec3::new(-1.0, -2.0, -3.0));
        assert_eq!(b.max, Vec3::new(1.0, 4.0, 3.0));
        assert_eq!(b.center(), Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(b.size(), Vec3::new(2.0, 6.0, 6.0));
    }

    #[test]
    fn flat_box_is_degenerate() {
        let b = BoundingBox::new(Vec3::new(0.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 1.0));
        assert!(!b.is_empty());
        assert!(b.is_degenerate());
    }

    #[test]
    fn transformed_box_encloses_rotated_corners() {
        let b = BoundingBox::from_center_size(Vec3::ZERO, Vec3::new(2.0, 2.0, 2.0));
        let m = Mat4::from_rotation_y(std::f32::consts::FRAC_PI_4);
        let t = b.transformed(&m);
        let half_diag = 2.0f32.sqrt();
        assert!((t.max.x - half_diag).abs() < 1e-5);
        assert!((t.max.y - 1.0).abs() < 1e-5);
        assert!(t.contains(Vec3::ZERO));
    }
}
