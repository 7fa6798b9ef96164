use crate::tween::TweenId;
use glam::{Mat4, Quat, Vec3};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// Typed per-node side data. Every field the interaction/visibility layer needs
/// lives here instead of in an untyped metadata bag.
#[derive(Debug, Clone)]
pub struct NodeMeta {
    /// Committed visibility 0..1. Set immediately when a fade starts.
    pub visibility: f32,
    /// Visibility the node was declared with; group selection restores this.
    pub base_visibility: f32,
    /// Cached committed value while a non-persisted nudge is active.
    pub real_visibility: Option<f32>,
    /// Root of the model this node belongs to.
    pub main_parent: Option<NodeId>,
    pub link_name: String,
    pub group_name: String,
    /// Idle-animation tweens paused on hover, resumed on leave.
    pub idle_handles: Vec<TweenId>,
    /// Palette index active when the node was created.
    pub theme_tag: usize,
    pub pickable: bool,
}

impl Default for NodeMeta {
    fn default() -> Self {
        Self {
            visibility: 1.0,
            base_visibility: 1.0,
            real_visibility: None,
            main_parent: None,
            link_name: String::new(),
            group_name: String::new(),
            idle_handles: Vec::new(),
            theme_tag: 0,
            pickable: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Index into the mesh bank, if the node draws anything.
    pub mesh: Option<usize>,
    pub meta: NodeMeta,
    /// Alpha actually drawn this frame; tweens write this, `meta.visibility`
    /// holds the committed target.
    pub rendered_visibility: f32,
    /// Hover highlight strength 0..1.
    pub overlay_alpha: f32,
    /// Uniform click-bounce factor applied on top of `scale`.
    pub squash: f32,
    pub tint: Vec3,
    /// Screen-space text drawn at the node's projected position.
    pub label: Option<String>,
    /// Local-space bounding sphere radius for picking.
    pub bound_radius: f32,
}

impl Node {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            parent: None,
            children: Vec::new(),
            mesh: None,
            meta: NodeMeta::default(),
            rendered_visibility: 1.0,
            overlay_alpha: 0.0,
            squash: 1.0,
            tint: Vec3::ONE,
            label: None,
            bound_radius: 0.0,
        }
    }

    pub fn local_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale * self.squash, self.rotation, self.translation)
    }
}

/// Arena-indexed scene tree. Nodes are never freed individually; teardown drops
/// the whole graph, so `NodeId`s stay valid for the life of the stage.
#[derive(Debug, Default)]
pub struct SceneGraph {
    nodes: Vec<Node>,
    root: Option<NodeId>,
}

impl SceneGraph {
    pub fn new() -> Self {
        let mut graph = Self { nodes: Vec::new(), root: None };
        let root = graph.insert("stage_root", None);
        graph.root = Some(root);
        graph
    }

    pub fn root(&self) -> NodeId {
        // Set in `new`, never cleared.
        self.root.unwrap_or(NodeId(0))
    }

    pub fn insert(&mut self, name: impl Into<String>, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        let mut node = Node::new(name);
        node.parent = parent;
        self.nodes.push(node);
        if let Some(parent) = parent {
            if let Some(parent_node) = self.nodes.get_mut(parent.0) {
                parent_node.children.push(id);
            }
        }
        id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.nodes.iter().position(|node| node.name == name).map(NodeId)
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
    }

    /// World matrix by walking parents. The chain is guarded against malformed
    /// parent links so a corrupt tree cannot loop.
    pub fn world_matrix(&self, id: NodeId) -> Mat4 {
        let mut chain = Vec::new();
        let mut visited = HashSet::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if !visited.insert(current) {
                break;
            }
            let Some(node) = self.node(current) else { break };
            chain.push(node.local_matrix());
            cursor = node.parent;
        }
        let mut world = Mat4::IDENTITY;
        for local in chain.into_iter().rev() {
            world *= local;
        }
        world
    }

    pub fn world_position(&self, id: NodeId) -> Vec3 {
        self.world_matrix(id).transform_point3(Vec3::ZERO)
    }

    /// Subtree ids in preorder, iterative with a visited guard.
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        let mut visited = HashSet::new();
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            let Some(node) = self.node(current) else { continue };
            out.push(current);
            for &child in node.children.iter().rev() {
                stack.push(child);
            }
        }
        out
    }

    /// Moves `child` under `new_parent`, fixing both child lists.
    pub fn reparent(&mut self, child: NodeId, new_parent: NodeId) {
        if child == new_parent {
            return;
        }
        if let Some(old_parent) = self.node(child).and_then(|n| n.parent) {
            if let Some(old) = self.node_mut(old_parent) {
                old.children.retain(|&c| c != child);
            }
        }
        if let Some(node) = self.node_mut(child) {
            node.parent = Some(new_parent);
        }
        if let Some(parent) = self.node_mut(new_parent) {
            if !parent.children.contains(&child) {
                parent.children.push(child);
            }
        }
    }

    /// Tags the whole subtree with link/group names and a main-parent
    /// back-reference. The root of the subtree references itself.
    pub fn tag_subtree(&mut self, root: NodeId, link_name: &str, group_name: &str, theme_tag: usize) {
        for id in self.subtree(root) {
            if let Some(node) = self.node_mut(id) {
                node.meta.link_name = link_name.to_string();
                node.meta.group_name = group_name.to_string();
                node.meta.main_parent = Some(root);
                node.meta.theme_tag = theme_tag;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtree_preorder_and_guarded() {
        let mut graph = SceneGraph::new();
        let root = graph.root();
        let a = graph.insert("a", Some(root));
        let b = graph.insert("b", Some(a));
        let c = graph.insert("c", Some(a));
        let order = graph.subtree(a);
        assert_eq!(order, vec![a, b, c]);

        // Deliberately corrupt the tree with a cycle; traversal must terminate.
        graph.node_mut(b).unwrap().children.push(a);
        let order = graph.subtree(a);
        assert_eq!(order.len(), 3);
    }

    #[test]
    fn world_matrix_composes_parent_chain() {
        let mut graph = SceneGraph::new();
        let root = graph.root();
        let parent = graph.insert("parent", Some(root));
        let child = graph.insert("child", Some(parent));
        graph.node_mut(parent).unwrap().translation = Vec3::new(1.0, 2.0, 3.0);
        graph.node_mut(child).unwrap().translation = Vec3::new(0.0, 1.0, 0.0);
        let world = graph.world_position(child);
        assert!((world - Vec3::new(1.0, 3.0, 3.0)).length() < 1e-5);
    }

    #[test]
    fn reparent_updates_both_sides() {
        let mut graph = SceneGraph::new();
        let root = graph.root();
        let a = graph.insert("a", Some(root));
        let b = graph.insert("b", Some(root));
        let child = graph.insert("child", Some(a));
        graph.reparent(child, b);
        assert!(!graph.node(a).unwrap().children.contains(&child));
        assert!(graph.node(b).unwrap().children.contains(&child));
        assert_eq!(graph.node(child).unwrap().parent, Some(b));
    }

    #[test]
    fn tag_subtree_sets_main_parent() {
        let mut graph = SceneGraph::new();
        let root = graph.root();
        let model = graph.insert("model", Some(root));
        let part = graph.insert("part", Some(model));
        graph.tag_subtree(model, "css", "programming", 2);
        let meta = &graph.node(part).unwrap().meta;
        assert_eq!(meta.link_name, "css");
        assert_eq!(meta.group_name, "programming");
        assert_eq!(meta.main_parent, Some(model));
        assert_eq!(meta.theme_tag, 2);
    }
}
