//! Transform hierarchy stored as an arena of nodes addressed by [`NodeId`].
//!
//! Every node except the root has exactly one parent, recorded by index, and
//! the arena only grows, so ids stay valid for the lifetime of the graph.

use glam::Mat4;
use log::trace;

use super::transform::Transform;
use crate::error::{ConfigError, ResourceError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
struct Node {
    name: String,
    local: Transform,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    world: Mat4,
    dirty: bool,
}

#[derive(Debug, Clone)]
pub struct SceneGraph {
    nodes: Vec<Node>,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                name: "root".to_string(),
                local: Transform::IDENTITY,
                parent: None,
                children: Vec::new(),
                world: Mat4::IDENTITY,
                dirty: false,
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        // The root always exists.
        false
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.0 < self.nodes.len()
    }

    fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes
            .get(id.0)
            .ok_or_else(|| ResourceError::InvalidNode(id.0).into())
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(id.0)
            .ok_or_else(|| ResourceError::InvalidNode(id.0).into())
    }

    /// Insert a new node under `parent`.
    pub fn add_node(&mut self, parent: NodeId, name: &str, local: Transform) -> Result<NodeId> {
        self.node(parent)?;
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            name: name.to_string(),
            local,
            parent: Some(parent),
            children: Vec::new(),
            world: Mat4::IDENTITY,
            dirty: true,
        });
        self.nodes[parent.0].children.push(id);
        trace!("added node {:?} '{}' under {:?}", id, name, parent);
        Ok(id)
    }

    /// Move `node` (with its subtree) under `new_parent`.
    ///
    /// Rejected when `new_parent` is `node` itself or one of its descendants.
    pub fn reparent(&mut self, node: NodeId, new_parent: NodeId) -> Result<()> {
        self.node(new_parent)?;
        let old_parent = self.node(node)?.parent.ok_or(ConfigError::RootReparent)?;
        if self.is_ancestor_or_self(node, new_parent) {
            return Err(ConfigError::CyclicParent {
                node: node.0,
                parent: new_parent.0,
            }
            .into());
        }
        self.nodes[old_parent.0].children.retain(|c| *c != node);
        self.nodes[new_parent.0].children.push(node);
        let n = &mut self.nodes[node.0];
        n.parent = Some(new_parent);
        n.dirty = true;
        Ok(())
    }

    fn is_ancestor_or_self(&self, ancestor: NodeId, mut node: NodeId) -> bool {
        loop {
            if node == ancestor {
                return true;
            }
            match self.nodes[node.0].parent {
                Some(p) => node = p,
                None => return false,
            }
        }
    }

    pub fn name(&self, id: NodeId) -> Result<&str> {
        Ok(&self.node(id)?.name)
    }

    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>> {
        Ok(self.node(id)?.parent)
    }

    pub fn children(&self, id: NodeId) -> Result<&[NodeId]> {
        Ok(&self.node(id)?.children)
    }

    pub fn local_transform(&self, id: NodeId) -> Result<&Transform> {
        Ok(&self.node(id)?.local)
    }

    pub fn set_local_transform(&mut self, id: NodeId, local: Transform) -> Result<()> {
        let node = self.node_mut(id)?;
        node.local = local;
        node.dirty = true;
        Ok(())
    }

    /// Edit a node's local transform in place. The node is marked dirty.
    pub fn update_local<F: FnOnce(&mut Transform)>(&mut self, id: NodeId, f: F) -> Result<()> {
        let node = self.node_mut(id)?;
        f(&mut node.local);
        node.dirty = true;
        Ok(())
    }

    pub fn local_matrix(&self, id: NodeId) -> Result<Mat4> {
        Ok(self.node(id)?.local.local_matrix())
    }

    /// World matrix of `id`.
    ///
    /// Returns the cached matrix when neither the node nor any ancestor changed
    /// since the last update; otherwise recomputes it from the local transforms
    /// along the ancestor chain without touching the cache.
    pub fn world_matrix(&self, id: NodeId) -> Result<Mat4> {
        self.node(id)?;
        if !self.chain_dirty(id) {
            return Ok(self.nodes[id.0].world);
        }
        let mut world = Mat4::IDENTITY;
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let node = &self.nodes[current.0];
            world = node.local.local_matrix() * world;
            cursor = node.parent;
        }
        Ok(world)
    }

    fn chain_dirty(&self, mut id: NodeId) -> bool {
        loop {
            let node = &self.nodes[id.0];
            if node.dirty {
                return true;
            }
            match node.parent {
                Some(p) => id = p,
                None => return false,
            }
        }
    }

    /// Recompute every world matrix top-down from the root.
    pub fn update_world_matrices(&mut self) {
        // The root's world is its local matrix.
        let root = self.root();
        let _ = self.update_subtree(root, Mat4::IDENTITY);
    }

    /// Recompute the world matrices of `id` and its descendants given the
    /// world matrix of `id`'s parent. Depth-first, iterative.
    pub fn update_subtree(&mut self, id: NodeId, parent_world: Mat4) -> Result<()> {
        self.node(id)?;
        let mut stack = vec![(id, parent_world)];
        while let Some((current, parent_world)) = stack.pop() {
            let node = &mut self.nodes[current.0];
            node.world = parent_world * node.local.local_matrix();
            node.dirty = false;
            let world = node.world;
            // Reverse so children are visited in insertion order.
            for child in node.children.iter().rev() {
                stack.push((*child, world));
            }
        }
        Ok(())
    }

    /// Depth-first (pre-order) traversal from the root.
    pub fn depth_first(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root()];
        while let Some(id) = stack.pop() {
            order.push(id);
            for child in self.nodes[id.0].children.iter().rev() {
                stack.push(*child);
            }
        }
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transform::EulerOrder;
    use glam::{Quat, Vec3};

    fn sample_graph() -> (SceneGraph, NodeId, NodeId, NodeId) {
        let mut graph = SceneGraph::new();
        let group = graph
            .add_node(
                graph.root(),
                "group",
                Transform::new(Vec3::new(0.0, 1.0, 0.0), Quat::from_rotation_y(1.0), Vec3::new(1.0, 2.0, 1.0)),
            )
            .unwrap();
        let a = graph
            .add_node(group, "cube1", Transform::from_position(Vec3::new(-2.0, 0.0, 0.0)))
            .unwrap();
        let b = graph
            .add_node(
                a,
                "cube2",
                Transform::from_euler(Vec3::new(0.5, 0.0, 0.3), EulerOrder::YXZ, Vec3::new(0.3, 0.7, 0.0)),
            )
            .unwrap();
        (graph, group, a, b)
    }

    #[test]
    fn world_is_parent_world_times_local() {
        let (mut graph, group, a, b) = sample_graph();
        graph.update_world_matrices();
        for (parent, child) in [(graph.root(), group), (group, a), (a, b)] {
            let expected = graph.world_matrix(parent).unwrap() * graph.local_matrix(child).unwrap();
            assert!(graph.world_matrix(child).unwrap().abs_diff_eq(expected, 1e-5));
        }
    }

    #[test]
    fn reads_after_mutation_are_never_stale() {
        let (mut graph, group, _a, b) = sample_graph();
        graph.update_world_matrices();
        let before = graph.world_matrix(b).unwrap();
        graph
            .update_local(group, |t| t.translate(Vec3::new(3.0, 0.0, 0.0)))
            .unwrap();

        // Not updated yet, but the read must still reflect the change.
        let lazy = graph.world_matrix(b).unwrap();
        graph.update_world_matrices();
        let eager = graph.world_matrix(b).unwrap();
        assert!(lazy.abs_diff_eq(eager, 1e-5));
        assert!((eager.w_axis.x - before.w_axis.x - 3.0).abs() < 1e-5);
    }

    #[test]
    fn reparent_under_descendant_is_rejected() {
        let (mut graph, group, a, b) = sample_graph();
        assert!(graph.reparent(group, b).is_err());
        assert!(graph.reparent(a, a).is_err());
        assert!(graph.reparent(graph.root(), a).is_err());

        graph.reparent(b, graph.root()).unwrap();
        assert_eq!(graph.parent(b).unwrap(), Some(graph.root()));
        assert!(graph.children(a).unwrap().is_empty());
    }

    #[test]
    fn unknown_node_is_a_resource_error() {
        let graph = SceneGraph::new();
        assert!(graph.world_matrix(NodeId(42)).is_err());
    }

    #[test]
    fn depth_first_visits_parents_before_children() {
        let (graph, group, a, b) = sample_graph();
        assert_eq!(graph.depth_first(), vec![graph.root(), group, a, b]);
    }
}
