//! Raycast hit-testing against a node subtree.

use crate::{
    camera::Ray,
    error::SceneError,
    scene::{NodeId, SceneGraph},
};
use glam::Vec3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intersection {
    /// Mesh node that was hit.
    pub node: NodeId,
    /// World-space distance from the ray origin.
    pub distance: f32,
    pub point: Vec3,
}

/// Intersects `ray` with every mesh under `root` (inclusive).
///
/// The ray is taken into each mesh's local frame, so non-uniform scale on
/// any ancestor is honoured. Results are sorted nearest first; an empty
/// vector means no hit.
pub fn intersect_subtree(
    scene: &SceneGraph,
    root: NodeId,
    ray: &Ray,
) -> Result<Vec<Intersection>, SceneError> {
    let mut hits = Vec::new();

    for id in scene.descendants(root)? {
        let Some(mesh) = scene.node(id)?.mesh() else {
            continue;
        };

        let world = scene.world_matrix(id)?;
        if world.determinant().abs() < f32::EPSILON {
            continue;
        }
        let inv = world.inverse();
        let local_origin = inv.transform_point3(ray.origin);
        let local_dir = inv.transform_vector3(ray.direction);

        let Some(t) = mesh.geometry.intersect_ray(local_origin, local_dir) else {
            continue;
        };

        let point = world.transform_point3(local_origin + local_dir * t);
        hits.push(Intersection {
            node: id,
            distance: (point - ray.origin).length(),
            point,
        });
    }

    hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    Ok(hits)
}

/// Nearest hit under `root`, if any.
pub fn nearest_hit(
    scene: &SceneGraph,
    root: NodeId,
    ray: &Ray,
) -> Result<Option<Intersection>, SceneError> {
    Ok(intersect_subtree(scene, root, ray)?.into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        geometry::{Geometry, Material, Mesh},
        scene::NodeKind,
        transform::Transform,
    };

    fn sphere_at(scene: &mut SceneGraph, parent: NodeId, x: f32) -> NodeId {
        let id = scene.spawn_mesh(
            "sphere",
            Mesh::new(Geometry::Sphere { radius: 0.5 }, Material::default()),
            Transform::from_position(Vec3::new(x, 0.0, 0.0)),
        );
        scene.attach(parent, id).unwrap();
        id
    }

    #[test]
    fn hits_are_sorted_nearest_first() {
        let mut scene = SceneGraph::new();
        let group = scene.spawn("group", NodeKind::Group);
        let far = sphere_at(&mut scene, group, 10.0);
        let near = sphere_at(&mut scene, group, 5.0);

        let ray = Ray::new(Vec3::ZERO, Vec3::X).unwrap();
        let hits = intersect_subtree(&scene, group, &ray).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].node, near);
        assert_eq!(hits[1].node, far);
        assert!((hits[0].distance - 4.5).abs() < 1e-4);
    }

    #[test]
    fn scaled_parent_distance_is_world_space() {
        let mut scene = SceneGraph::new();
        let group = scene.spawn("group", NodeKind::Group);
        scene.transform_mut(group).unwrap().scale = Vec3::new(2.0, 1.0, 1.0);
        sphere_at(&mut scene, group, 5.0);

        // Sphere centre lands at x = 10, stretched to a half-width of 1.
        let ray = Ray::new(Vec3::ZERO, Vec3::X).unwrap();
        let hit = nearest_hit(&scene, group, &ray).unwrap().unwrap();
        assert!((hit.distance - 9.0).abs() < 1e-4);
        assert!(hit.point.abs_diff_eq(Vec3::new(9.0, 0.0, 0.0), 1e-4));
    }

    #[test]
    fn miss_returns_empty() {
        let mut scene = SceneGraph::new();
        let group = scene.spawn("group", NodeKind::Group);
        sphere_at(&mut scene, group, 5.0);
        let ray = Ray::new(Vec3::new(0.0, 3.0, 0.0), Vec3::X).unwrap();
        assert!(intersect_subtree(&scene, group, &ray).unwrap().is_empty());
    }
}
