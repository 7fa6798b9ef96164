use crate::content::{CommitAction, CommitSpec, StageContent};
use crate::mesh::MeshData;
use crate::registry::NodeRegistry;
use crate::scene_graph::{NodeId, SceneGraph};
use crate::tween::TweenScheduler;
use crate::visibility::set_visibility;
use glam::{Quat, Vec3};
use std::collections::{BTreeMap, HashSet};

pub const CONTAINER_NAME: &str = "commitModel";
const COMMIT_RADIUS: f32 = 0.05;
const EDGE_THICKNESS: f32 = 0.012;
/// Child commits sit one step above their parent before the offset.
pub const PARENT_STEP: Vec3 = Vec3::new(0.0, 0.6, 0.0);

pub const DONE_LABEL: &str = "DONE!";

/// Positions for every commit, derived from the parent chain. Iterative with a
/// visited guard: a cycle or a missing parent resolves against the origin
/// instead of recursing forever.
pub fn resolve_positions(commits: &BTreeMap<String, CommitSpec>) -> BTreeMap<String, Vec3> {
    let mut resolved: BTreeMap<String, Vec3> = BTreeMap::new();
    for start in commits.keys() {
        if resolved.contains_key(start) {
            continue;
        }
        let mut chain: Vec<String> = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut cursor = start.clone();
        let mut base = Vec3::ZERO;
        loop {
            if let Some(&known) = resolved.get(&cursor) {
                base = known;
                break;
            }
            if !visited.insert(cursor.clone()) {
                eprintln!("[commits] parent cycle at '{cursor}', using origin");
                break;
            }
            let Some(spec) = commits.get(&cursor) else {
                eprintln!("[commits] unknown parent '{cursor}', using origin");
                break;
            };
            chain.push(cursor.clone());
            if spec.parent.is_empty() {
                base = spec.position.map(Vec3::from_array).unwrap_or(Vec3::ZERO);
                break;
            }
            cursor = spec.parent.clone();
        }
        while let Some(id) = chain.pop() {
            let spec = &commits[&id];
            let position = if spec.parent.is_empty() {
                spec.position.map(Vec3::from_array).unwrap_or(Vec3::ZERO)
            } else {
                base + PARENT_STEP + spec.offset.map(Vec3::from_array).unwrap_or(Vec3::ZERO)
            };
            resolved.insert(id, position);
            base = position;
        }
    }
    resolved
}

/// The commit diorama: one sphere per commit with its message as a label, one
/// edge per parent link, all under a `commitModel` container, plus the
/// advance-button state.
#[derive(Debug)]
pub struct CommitGraph {
    pub container: NodeId,
    commit_nodes: BTreeMap<String, NodeId>,
    actions: Vec<CommitAction>,
    next_action: usize,
}

impl CommitGraph {
    pub fn build(
        content: &StageContent,
        graph: &mut SceneGraph,
        registry: &mut NodeRegistry,
        meshes: &mut Vec<MeshData>,
        tweens: &mut TweenScheduler,
        theme_tag: usize,
    ) -> Self {
        let stage_root = graph.root();
        let container = graph.insert(CONTAINER_NAME, Some(stage_root));
        if let Some(node) = graph.node_mut(container) {
            node.translation = Vec3::new(0.0, 0.01, 0.0);
            node.scale = Vec3::splat(1.5);
            node.rotation = Quat::from_rotation_y(90f32.to_radians());
        }
        registry.add_node(graph, CONTAINER_NAME, container);

        let positions = resolve_positions(&content.commits);
        let sphere_mesh = meshes.len();
        meshes.push(MeshData::sphere(COMMIT_RADIUS, 12, 16));

        let mut commit_nodes = BTreeMap::new();
        for (id, spec) in &content.commits {
            let node_id = graph.insert(id.as_str(), Some(container));
            let position = positions.get(id).copied().unwrap_or(Vec3::ZERO);
            if let Some(node) = graph.node_mut(node_id) {
                node.translation = position;
                node.mesh = Some(sphere_mesh);
                node.bound_radius = COMMIT_RADIUS;
                node.label = Some(spec.message.clone());
            }
            if !spec.parent.is_empty() {
                if let Some(&parent_pos) = positions.get(&spec.parent) {
                    let edge_mesh = meshes.len();
                    meshes.push(MeshData::segment(parent_pos - position, Vec3::ZERO, EDGE_THICKNESS));
                    let edge = graph.insert(format!("{id}_edge"), Some(node_id));
                    if let Some(node) = graph.node_mut(edge) {
                        node.mesh = Some(edge_mesh);
                    }
                }
            }
            registry.add_node(graph, id, node_id);
            commit_nodes.insert(id.clone(), node_id);
        }

        graph.tag_subtree(container, CONTAINER_NAME, &content.group_of(CONTAINER_NAME), theme_tag);

        // Starting visibility, instant; the reveal tweens come later from the
        // advance button.
        for (id, spec) in &content.commits {
            if let (Some(&node_id), Some(base)) = (commit_nodes.get(id), spec.visibility) {
                for sub in graph.subtree(node_id) {
                    if let Some(node) = graph.node_mut(sub) {
                        node.meta.base_visibility = base;
                    }
                }
                set_visibility(graph, tweens, node_id, base, true, 0.0);
            }
        }

        Self { container, commit_nodes, actions: content.commit_actions.clone(), next_action: 0 }
    }

    pub fn node(&self, commit_id: &str) -> Option<NodeId> {
        self.commit_nodes.get(commit_id).copied()
    }

    /// Label for the advance button: the next action's name, or DONE! once the
    /// list is exhausted.
    pub fn button_label(&self) -> &str {
        self.actions.get(self.next_action).map(|a| a.name.as_str()).unwrap_or(DONE_LABEL)
    }

    pub fn is_done(&self) -> bool {
        self.next_action >= self.actions.len()
    }

    /// Runs the next action: reveals its commits with a fade and advances the
    /// counter. A click past the end is a no-op.
    pub fn advance(&mut self, graph: &mut SceneGraph, tweens: &mut TweenScheduler, fade: f32) {
        let Some(action) = self.actions.get(self.next_action) else { return };
        eprintln!("[commits] action '{}'", action.name);
        for commit_id in &action.nodes {
            if let Some(&node_id) = self.commit_nodes.get(commit_id) {
                set_visibility(graph, tweens, node_id, 1.0, true, fade);
            }
        }
        self.next_action += 1;
    }

    /// Back to the initial state: counter at zero, action commits re-hidden to
    /// their declared starting visibility.
    pub fn reset(&mut self, graph: &mut SceneGraph, tweens: &mut TweenScheduler) {
        self.next_action = 0;
        for action in &self.actions {
            for commit_id in &action.nodes {
                if let Some(&node_id) = self.commit_nodes.get(commit_id) {
                    let base =
                        graph.node(node_id).map(|n| n.meta.base_visibility).unwrap_or(0.0);
                    set_visibility(graph, tweens, node_id, base, true, 0.0);
                }
            }
        }
    }

    /// Theme hook: retints every diorama node.
    pub fn recolor(&self, graph: &mut SceneGraph, color: Vec3) {
        for id in graph.subtree(self.container) {
            if let Some(node) = graph.node_mut(id) {
                node.tint = color;
            }
        }
    }
}
