use crate::scene_graph::{NodeId, SceneGraph};
use std::collections::BTreeMap;

/// Link-name directory for the stage. Registration never overwrites: a
/// colliding name gets a synthetic unique key and the node is renamed to match,
/// so the entry count only ever grows.
#[derive(Debug, Default)]
pub struct NodeRegistry {
    entries: BTreeMap<String, NodeId>,
    collision_counter: u64,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `id` under `name`, minting `name__N` on collision. Returns the
    /// key actually used; the caller's node is renamed through `graph` when the
    /// key had to change.
    pub fn add_node(&mut self, graph: &mut SceneGraph, name: &str, id: NodeId) -> String {
        let key = if self.entries.contains_key(name) {
            let synthetic = loop {
                self.collision_counter += 1;
                let candidate = format!("{name}__{}", self.collision_counter);
                if !self.entries.contains_key(&candidate) {
                    break candidate;
                }
            };
            eprintln!("[registry] name '{name}' already taken, registered as '{synthetic}'");
            if let Some(node) = graph.node_mut(id) {
                node.name = synthetic.clone();
            }
            synthetic
        } else {
            name.to_string()
        };
        self.entries.insert(key.clone(), id);
        key
    }

    pub fn get(&self, name: &str) -> Option<NodeId> {
        self.entries.get(name).copied()
    }

    /// Explicit eviction, used when a sub-node is promoted to its own link
    /// name and the old key must stop resolving.
    pub fn evict(&mut self, name: &str) -> Option<NodeId> {
        self.entries.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, NodeId)> {
        self.entries.iter().map(|(k, &v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collision_mints_synthetic_key_and_renames() {
        let mut graph = SceneGraph::new();
        let root = graph.root();
        let mut registry = NodeRegistry::new();
        let a = graph.insert("git", Some(root));
        let b = graph.insert("git", Some(root));

        assert_eq!(registry.add_node(&mut graph, "git", a), "git");
        let key = registry.add_node(&mut graph, "git", b);
        assert_ne!(key, "git");
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("git"), Some(a));
        assert_eq!(registry.get(&key), Some(b));
        assert_eq!(graph.node(b).unwrap().name, key);
    }

    #[test]
    fn repeated_collisions_stay_unique() {
        let mut graph = SceneGraph::new();
        let root = graph.root();
        let mut registry = NodeRegistry::new();
        let mut keys = std::collections::HashSet::new();
        for _ in 0..8 {
            let id = graph.insert("node", Some(root));
            let key = registry.add_node(&mut graph, "node", id);
            assert!(keys.insert(key), "synthetic keys must never repeat");
        }
        assert_eq!(registry.len(), 8);
    }

    #[test]
    fn evict_removes_only_named_entry() {
        let mut graph = SceneGraph::new();
        let root = graph.root();
        let mut registry = NodeRegistry::new();
        let a = graph.insert("logos", Some(root));
        let b = graph.insert("js", Some(root));
        registry.add_node(&mut graph, "logos", a);
        registry.add_node(&mut graph, "js", b);
        assert_eq!(registry.evict("logos"), Some(a));
        assert!(!registry.contains("logos"));
        assert_eq!(registry.get("js"), Some(b));
    }
}
