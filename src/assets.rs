use crate::content::{MeshOverride, ModelSpec, StageContent};
use crate::mesh::{GltfImport, MeshData};
use crate::registry::NodeRegistry;
use crate::scene_graph::{NodeId, SceneGraph};
use crate::tween::{Axis, Channel, Easing, Repeat, Tween, TweenScheduler};
use anyhow::{Context, Result};
use glam::{Quat, Vec3};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Where model files come from. The default reads gltf from disk; tests inject
/// synthetic imports instead of shipping binary fixtures.
pub trait MeshSource {
    fn load(&self, file: &str) -> Result<GltfImport>;
}

pub struct FileMeshSource {
    root: PathBuf,
}

impl FileMeshSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl MeshSource for FileMeshSource {
    fn load(&self, file: &str) -> Result<GltfImport> {
        let path = self.root.join(file);
        crate::mesh::load_gltf(&path).with_context(|| format!("Loading model {file}"))
    }
}

#[derive(Debug, Default)]
pub struct LoadOutcome {
    pub loaded: Vec<String>,
    pub dropped: Vec<String>,
    /// Animation clip names found per link name.
    pub animations: BTreeMap<String, Vec<String>>,
}

/// Loads every declared model. One failed entry is logged and dropped; the
/// batch always completes.
pub fn load_models(
    content: &StageContent,
    source: &dyn MeshSource,
    graph: &mut SceneGraph,
    registry: &mut NodeRegistry,
    meshes: &mut Vec<MeshData>,
    tweens: &mut TweenScheduler,
    theme_tag: usize,
) -> LoadOutcome {
    let mut outcome = LoadOutcome::default();
    for spec in &content.models {
        match source.load(&spec.file) {
            Ok(import) => {
                let root = instantiate_model(spec, &import, content, graph, registry, meshes, theme_tag);
                if !import.animations.is_empty() {
                    outcome.animations.insert(spec.link_name.clone(), import.animations.clone());
                }
                if spec.link_name == "robot" {
                    start_gait_bob(graph, tweens, root, &import.animations);
                }
                outcome.loaded.push(spec.link_name.clone());
            }
            Err(err) => {
                eprintln!("[assets] {} unavailable: {err:?}", spec.file);
                outcome.dropped.push(spec.link_name.clone());
            }
        }
    }
    outcome
}

fn instantiate_model(
    spec: &ModelSpec,
    import: &GltfImport,
    content: &StageContent,
    graph: &mut SceneGraph,
    registry: &mut NodeRegistry,
    meshes: &mut Vec<MeshData>,
    theme_tag: usize,
) -> NodeId {
    let stage_root = graph.root();
    let root = graph.insert(&spec.link_name, Some(stage_root));

    let mesh_base = meshes.len();
    meshes.extend(import.meshes.iter().cloned());

    // Imported hierarchy hangs under the new root; gltf indices map 1:1 onto
    // the freshly inserted node ids.
    let mut mapping = Vec::with_capacity(import.nodes.len());
    for gltf_node in &import.nodes {
        let parent = match gltf_node.parent {
            Some(index) => *mapping.get(index).unwrap_or(&root),
            None => root,
        };
        let id = graph.insert(&gltf_node.name, Some(parent));
        mapping.push(id);
        if let Some(node) = graph.node_mut(id) {
            node.translation = gltf_node.translation;
            node.rotation = gltf_node.rotation;
            node.scale = gltf_node.scale;
            if let Some(mesh) = gltf_node.mesh {
                let bank_index = mesh_base + mesh;
                node.mesh = Some(bank_index);
                node.bound_radius = meshes[bank_index].bound_radius();
            }
        }
    }

    // The authored root orientation is discarded before the declared
    // transform goes on.
    if let Some(node) = graph.node_mut(root) {
        node.rotation = Quat::IDENTITY;
        if let Some(position) = spec.position {
            node.translation = Vec3::from_array(position);
        }
        if let Some(rotation) = spec.rotation_deg {
            node.rotation = Quat::from_euler(
                glam::EulerRot::XYZ,
                rotation[0].to_radians(),
                rotation[1].to_radians(),
                rotation[2].to_radians(),
            );
        }
        if let Some(scale) = spec.scale {
            node.scale = Vec3::from_array(scale);
        }
    }

    registry.add_node(graph, &spec.link_name, root);
    let group = content.group_of(&spec.link_name);
    graph.tag_subtree(root, &spec.link_name, &group, theme_tag);

    let base = spec.visibility.unwrap_or(1.0);
    for id in graph.subtree(root) {
        if let Some(node) = graph.node_mut(id) {
            node.meta.base_visibility = base;
        }
    }
    root
}

/// The robot ships with a walk clip whose keyframes aren't retargeted here
/// (the renderer has no skinning). Its presence gates a stand-in looping gait
/// bob on the root; a robot without any clip stays still.
fn start_gait_bob(
    graph: &SceneGraph,
    tweens: &mut TweenScheduler,
    root: NodeId,
    animations: &[String],
) {
    let clip = animations
        .iter()
        .find(|name| name.to_ascii_lowercase().contains("walk"))
        .or_else(|| animations.first());
    let Some(clip) = clip else { return };
    let Some(node) = graph.node(root) else { return };
    eprintln!("[assets] robot: clip '{clip}' present, starting the gait bob");
    let base_y = node.translation.y;
    tweens.start(
        Tween::scalar(Channel::Translation(root, Axis::Y), base_y, base_y + 0.04, 0.4)
            .with_easing(Easing::QuadInOut)
            .with_repeat(Repeat::PingPongLoop),
    );
}

/// Promotes declared sub-nodes to their own link names. The node is renamed,
/// its subtree re-tagged, any registry entry under the old node name evicted,
/// and the declared visibility recorded as its base.
pub fn apply_overrides(
    content: &StageContent,
    graph: &mut SceneGraph,
    registry: &mut NodeRegistry,
) {
    for spec in &content.overrides {
        let Some(id) = graph.find_by_name(&spec.node_name) else {
            eprintln!("[assets] override target '{}' not found, skipping", spec.node_name);
            continue;
        };
        promote(spec, id, content, graph, registry);
    }
}

fn promote(
    spec: &MeshOverride,
    id: NodeId,
    content: &StageContent,
    graph: &mut SceneGraph,
    registry: &mut NodeRegistry,
) {
    registry.evict(&spec.node_name);
    if let Some(node) = graph.node_mut(id) {
        node.name = spec.link_name.clone();
    }
    registry.add_node(graph, &spec.link_name, id);
    let group = content.group_of(&spec.link_name);
    let theme_tag = graph.node(id).map(|n| n.meta.theme_tag).unwrap_or(0);
    graph.tag_subtree(id, &spec.link_name, &group, theme_tag);
    if let Some(base) = spec.visibility {
        for sub in graph.subtree(id) {
            if let Some(node) = graph.node_mut(sub) {
                node.meta.base_visibility = base;
            }
        }
    }
}

/// Test-only mesh source kept in the library so integration tests can build
/// a stage without binary fixtures.
pub mod testing {
    use super::*;
    use crate::mesh::GltfNode;

    /// Synthetic source: every requested file becomes a two-node import with a
    /// small sphere mesh, unless the file is listed as broken.
    pub struct StubSource {
        pub broken: Vec<String>,
    }

    impl StubSource {
        pub fn new() -> Self {
            Self { broken: Vec::new() }
        }
    }

    impl MeshSource for StubSource {
        fn load(&self, file: &str) -> Result<GltfImport> {
            if self.broken.iter().any(|b| b == file) {
                anyhow::bail!("stub failure for {file}");
            }
            let stem = file.trim_end_matches(".gltf");
            // The logos import carries the authored node the js override
            // points at.
            let detail_name = if stem == "logos" {
                "JAVASCRIPT_5".to_string()
            } else {
                format!("{stem}_detail")
            };
            Ok(GltfImport {
                nodes: vec![
                    GltfNode {
                        name: format!("{stem}_root"),
                        parent: None,
                        translation: Vec3::ZERO,
                        rotation: Quat::from_rotation_y(1.0),
                        scale: Vec3::ONE,
                        mesh: Some(0),
                    },
                    GltfNode {
                        name: detail_name,
                        parent: Some(0),
                        translation: Vec3::Y,
                        rotation: Quat::IDENTITY,
                        scale: Vec3::ONE,
                        mesh: Some(0),
                    },
                ],
                meshes: vec![MeshData::sphere(0.5, 4, 6)],
                animations: if stem == "robot" { vec!["walk".to_string()] } else { Vec::new() },
            })
        }
    }
}
