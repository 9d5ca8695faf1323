//! Arena scene graph with opaque, generation-checked node handles.
//!
//! Nodes are created detached. `add` puts a node into the scene as a root,
//! `attach` parents it under another node. World transforms are always
//! recomputed from the current local transforms; nothing is cached.

use crate::{
    bounds::BoundingBox,
    error::SceneError,
    geometry::Mesh,
    transform::Transform,
};
use glam::{Mat4, Vec3};
use serde::Serialize;

/// Handle to a node. Stale handles (after `dispose`) are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Light {
    Ambient { color: u32, intensity: f32 },
    Directional { color: u32, intensity: f32, cast_shadow: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Group,
    Mesh(Mesh),
    Light(Light),
}

#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub transform: Transform,
    pub kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn mesh(&self) -> Option<&Mesh> {
        match &self.kind {
            NodeKind::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

#[derive(Debug, Default)]
pub struct SceneGraph {
    slots: Vec<Slot>,
    free: Vec<u32>,
    roots: Vec<NodeId>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a detached node.
    pub fn spawn(&mut self, name: impl Into<String>, kind: NodeKind) -> NodeId {
        let node = Node {
            name: name.into(),
            transform: Transform::IDENTITY,
            kind,
            parent: None,
            children: Vec::new(),
        };

        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            NodeId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                node: Some(node),
            });
            NodeId { index, generation: 0 }
        }
    }

    pub fn spawn_mesh(&mut self, name: impl Into<String>, mesh: Mesh, transform: Transform) -> NodeId {
        let id = self.spawn(name, NodeKind::Mesh(mesh));
        if let Some(node) = self.node_mut_unchecked(id) {
            node.transform = transform;
        }
        id
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_ok()
    }

    pub fn node(&self, id: NodeId) -> Result<&Node, SceneError> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
            .ok_or(SceneError::UnknownNode(id))
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, SceneError> {
        self.node_mut_unchecked(id).ok_or(SceneError::UnknownNode(id))
    }

    fn node_mut_unchecked(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    /// Adds a node to the scene as a root. Detaches it from any parent first.
    pub fn add(&mut self, id: NodeId) -> Result<(), SceneError> {
        self.detach(id)?;
        self.roots.push(id);
        Ok(())
    }

    /// Removes a root from the scene without disposing it.
    pub fn remove(&mut self, id: NodeId) -> Result<(), SceneError> {
        self.node(id)?;
        self.roots.retain(|r| *r != id);
        Ok(())
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Parents `child` under `parent`, detaching it from wherever it was.
    pub fn attach(&mut self, parent: NodeId, child: NodeId) -> Result<(), SceneError> {
        self.node(child)?;
        if self.ancestors_inclusive(parent)?.contains(&child) {
            return Err(SceneError::Cycle { parent, child });
        }

        self.detach(child)?;
        self.node_mut(child)?.parent = Some(parent);
        self.node_mut(parent)?.children.push(child);
        Ok(())
    }

    fn detach(&mut self, id: NodeId) -> Result<(), SceneError> {
        let parent = self.node_mut(id)?.parent.take();
        if let Some(parent) = parent {
            if let Ok(p) = self.node_mut(parent) {
                p.children.retain(|c| *c != id);
            }
        }
        self.roots.retain(|r| *r != id);
        Ok(())
    }

    fn ancestors_inclusive(&self, id: NodeId) -> Result<Vec<NodeId>, SceneError> {
        let mut chain = vec![id];
        let mut cursor = self.node(id)?.parent;
        while let Some(p) = cursor {
            chain.push(p);
            cursor = self.node(p)?.parent;
        }
        Ok(chain)
    }

    /// True when the node's top ancestor is a scene root.
    pub fn is_in_scene(&self, id: NodeId) -> bool {
        self.ancestors_inclusive(id)
            .ok()
            .and_then(|chain| chain.last().copied())
            .is_some_and(|top| self.roots.contains(&top))
    }

    pub fn transform(&self, id: NodeId) -> Result<&Transform, SceneError> {
        Ok(&self.node(id)?.transform)
    }

    pub fn transform_mut(&mut self, id: NodeId) -> Result<&mut Transform, SceneError> {
        Ok(&mut self.node_mut(id)?.transform)
    }

    pub fn set_transform(&mut self, id: NodeId, transform: Transform) -> Result<(), SceneError> {
        self.node_mut(id)?.transform = transform;
        Ok(())
    }

    pub fn world_matrix(&self, id: NodeId) -> Result<Mat4, SceneError> {
        let mut m = Mat4::IDENTITY;
        for node in self.ancestors_inclusive(id)? {
            m = self.node(node)?.transform.matrix() * m;
        }
        Ok(m)
    }

    pub fn world_position(&self, id: NodeId) -> Result<Vec3, SceneError> {
        Ok(self.world_matrix(id)?.transform_point3(Vec3::ZERO))
    }

    /// Depth-first, pre-order list of `id` and all its descendants.
    pub fn descendants(&self, id: NodeId) -> Result<Vec<NodeId>, SceneError> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            let node = self.node(next)?;
            out.push(next);
            stack.extend(node.children.iter().rev().copied());
        }
        Ok(out)
    }

    pub fn traverse<F>(&self, id: NodeId, mut f: F) -> Result<(), SceneError>
    where
        F: FnMut(NodeId, &Node),
    {
        for node in self.descendants(id)? {
            f(node, self.node(node)?);
        }
        Ok(())
    }

    pub fn traverse_mut<F>(&mut self, id: NodeId, mut f: F) -> Result<(), SceneError>
    where
        F: FnMut(&mut Node),
    {
        for node in self.descendants(id)? {
            f(self.node_mut(node)?);
        }
        Ok(())
    }

    /// World-space box of every mesh under `id`, each mesh's local box
    /// transformed by its world matrix.
    pub fn world_bounds(&self, id: NodeId) -> Result<BoundingBox, SceneError> {
        let mut bounds = BoundingBox::EMPTY;
        for node_id in self.descendants(id)? {
            if let Some(mesh) = self.node(node_id)?.mesh() {
                let world = self.world_matrix(node_id)?;
                bounds = bounds.union(&mesh.geometry.local_bounds().transformed(&world));
            }
        }
        Ok(bounds)
    }

    /// Meshes reachable from the scene roots.
    pub fn visible_meshes(&self) -> Vec<NodeId> {
        self.roots
            .iter()
            .filter_map(|root| self.descendants(*root).ok())
            .flatten()
            .filter(|id| self.node(*id).is_ok_and(|n| n.mesh().is_some()))
            .collect()
    }

    /// Detaches and frees `id` and its subtree. Returns the number of meshes
    /// released. Handles to the freed nodes become stale.
    pub fn dispose(&mut self, id: NodeId) -> Result<usize, SceneError> {
        let doomed = self.descendants(id)?;
        self.detach(id)?;

        let mut meshes = 0;
        for node in doomed {
            let slot = &mut self.slots[node.index as usize];
            if let Some(n) = slot.node.take() {
                if n.mesh().is_some() {
                    meshes += 1;
                }
            }
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(node.index);
        }
        Ok(meshes)
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.node.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Geometry, Material};

    fn unit_box(scene: &mut SceneGraph, name: &str) -> NodeId {
        scene.spawn_mesh(
            name,
            Mesh::new(
                Geometry::Cuboid { width: 1.0, height: 1.0, depth: 1.0 },
                Material::default(),
            ),
            Transform::IDENTITY,
        )
    }

    #[test]
    fn child_follows_parent_transform() {
        let mut scene = SceneGraph::new();
        let parent = scene.spawn("parent", NodeKind::Group);
        let child = unit_box(&mut scene, "child");
        scene.add(parent).unwrap();
        scene.attach(parent, child).unwrap();

        scene.transform_mut(child).unwrap().position = Vec3::new(1.0, 0.0, 0.0);
        scene.transform_mut(parent).unwrap().rotation.y = std::f32::consts::FRAC_PI_2;

        let p = scene.world_position(child).unwrap();
        assert!(p.abs_diff_eq(Vec3::new(0.0, 0.0, -1.0), 1e-5));
        assert!(scene.is_in_scene(child));
    }

    #[test]
    fn world_bounds_include_scale() {
        let mut scene = SceneGraph::new();
        let root = scene.spawn("root", NodeKind::Group);
        let a = unit_box(&mut scene, "a");
        scene.attach(root, a).unwrap();
        scene.transform_mut(root).unwrap().scale = Vec3::new(2.0, 3.0, 4.0);

        let b = scene.world_bounds(root).unwrap();
        assert!(b.size().abs_diff_eq(Vec3::new(2.0, 3.0, 4.0), 1e-5));
    }

    #[test]
    fn dispose_invalidates_handles_and_reuses_slots() {
        let mut scene = SceneGraph::new();
        let root = scene.spawn("root", NodeKind::Group);
        let a = unit_box(&mut scene, "a");
        let b = unit_box(&mut scene, "b");
        scene.attach(root, a).unwrap();
        scene.attach(a, b).unwrap();
        scene.add(root).unwrap();

        assert_eq!(scene.dispose(root).unwrap(), 2);
        assert!(scene.roots().is_empty());
        assert!(!scene.contains(a));
        assert_eq!(scene.transform(b), Err(SceneError::UnknownNode(b)));

        let fresh = scene.spawn("fresh", NodeKind::Group);
        assert!(scene.contains(fresh));
        assert!(!scene.contains(root));
        assert_eq!(scene.len(), 1);
    }

    #[test]
    fn attach_rejects_cycles() {
        let mut scene = SceneGraph::new();
        let a = scene.spawn("a", NodeKind::Group);
        let b = scene.spawn("b", NodeKind::Group);
        scene.attach(a, b).unwrap();
        assert!(matches!(scene.attach(b, a), Err(SceneError::Cycle { .. })));
    }

    #[test]
    fn remove_keeps_node_alive_but_hidden() {
        let mut scene = SceneGraph::new();
        let a = unit_box(&mut scene, "a");
        scene.add(a).unwrap();
        assert_eq!(scene.visible_meshes(), vec![a]);
        scene.remove(a).unwrap();
        assert!(scene.visible_meshes().is_empty());
        assert!(scene.contains(a));
    }
}
