//! Mesh primitives and their local-space ray intersection.

use crate::bounds::BoundingBox;
use glam::Vec3;

const EPS: f32 = 1e-7;

/// Geometry in the owning node's local frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    /// Box centred on the origin.
    Cuboid { width: f32, height: f32, depth: f32 },
    /// Sphere centred on the origin.
    Sphere { radius: f32 },
    /// Rectangle in the local XY plane, centred on the origin.
    Plane { width: f32, height: f32 },
    /// Triangle soup; every three positions form one triangle.
    Triangles { positions: Vec<Vec3> },
}

impl Geometry {
    pub fn local_bounds(&self) -> BoundingBox {
        match self {
            Geometry::Cuboid { width, height, depth } => {
                BoundingBox::from_center_size(Vec3::ZERO, Vec3::new(*width, *height, *depth))
            }
            Geometry::Sphere { radius } => BoundingBox::new(Vec3::splat(-radius), Vec3::splat(*radius)),
            Geometry::Plane { width, height } => {
                BoundingBox::from_center_size(Vec3::ZERO, Vec3::new(*width, *height, 0.0))
            }
            Geometry::Triangles { positions } => BoundingBox::from_points(positions.iter().copied()),
        }
    }

    pub fn triangle_count(&self) -> usize {
        match self {
            Geometry::Triangles { positions } => positions.len() / 3,
            _ => 0,
        }
    }

    /// Nearest non-negative ray parameter `t` where `origin + t * dir` meets
    /// the surface. `dir` need not be normalised.
    pub fn intersect_ray(&self, origin: Vec3, dir: Vec3) -> Option<f32> {
        match self {
            Geometry::Cuboid { .. } => ray_box(origin, dir, &self.local_bounds()),
            Geometry::Sphere { radius } => ray_sphere(origin, dir, *radius),
            Geometry::Plane { width, height } => {
                if dir.z.abs() < EPS {
                    return None;
                }
                let t = -origin.z / dir.z;
                if t < 0.0 {
                    return None;
                }
                let p = origin + dir * t;
                (p.x.abs() <= width * 0.5 && p.y.abs() <= height * 0.5).then_some(t)
            }
            Geometry::Triangles { positions } => positions
                .chunks_exact(3)
                .filter_map(|tri| ray_triangle(origin, dir, tri[0], tri[1], tri[2]))
                .min_by(|a, b| a.total_cmp(b)),
        }
    }
}

/// Slab test; returns the entry parameter, or 0 when the origin is inside.
fn ray_box(origin: Vec3, dir: Vec3, b: &BoundingBox) -> Option<f32> {
    let mut t_min = 0.0f32;
    let mut t_max = f32::INFINITY;

    for axis in 0..3 {
        let (o, d) = (origin[axis], dir[axis]);
        let (lo, hi) = (b.min[axis], b.max[axis]);

        if d.abs() < EPS {
            if o < lo || o > hi {
                return None;
            }
            continue;
        }

        let inv = 1.0 / d;
        let mut t1 = (lo - o) * inv;
        let mut t2 = (hi - o) * inv;
        if t1 > t2 {
            std::mem::swap(&mut t1, &mut t2);
        }

        t_min = t_min.max(t1);
        t_max = t_max.min(t2);
        if t_max < t_min {
            return None;
        }
    }

    Some(t_min)
}

fn ray_sphere(origin: Vec3, dir: Vec3, radius: f32) -> Option<f32> {
    let a = dir.length_squared();
    if a < EPS {
        return None;
    }
    let b = 2.0 * origin.dot(dir);
    let c = origin.length_squared() - radius * radius;
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return None;
    }
    let sq = disc.sqrt();
    let t0 = (-b - sq) / (2.0 * a);
    let t1 = (-b + sq) / (2.0 * a);
    if t0 >= 0.0 {
        Some(t0)
    } else if t1 >= 0.0 {
        Some(t1)
    } else {
        None
    }
}

/// Möller–Trumbore, double-sided.
fn ray_triangle(origin: Vec3, dir: Vec3, a: Vec3, b: Vec3, c: Vec3) -> Option<f32> {
    let e1 = b - a;
    let e2 = c - a;
    let p = dir.cross(e2);
    let det = e1.dot(p);
    if det.abs() < EPS {
        return None;
    }
    let inv_det = 1.0 / det;
    let s = origin - a;
    let u = s.dot(p) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = s.cross(e1);
    let v = dir.dot(q) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = e2.dot(q) * inv_det;
    (t >= 0.0).then_some(t)
}

/// Surface parameters handed to the renderer untouched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    /// 0xRRGGBB
    pub color: u32,
    pub roughness: f32,
    pub metalness: f32,
    pub opacity: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            color: 0xcccccc,
            roughness: 1.0,
            metalness: 0.0,
            opacity: 1.0,
        }
    }
}

impl Material {
    pub fn solid(color: u32) -> Self {
        Self {
            color,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub geometry: Geometry,
    pub material: Material,
}

impl Mesh {
    pub fn new(geometry: Geometry, material: Material) -> Self {
        Self { geometry, material }
    }
}
