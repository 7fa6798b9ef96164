use crate::camera::StageCamera;
use crate::scene_graph::{NodeId, SceneGraph};
use crate::tooltip::TooltipLayer;
use crate::tween::{Channel, Tween, TweenScheduler};
use crate::animation;
use glam::Vec2;
use winit::dpi::PhysicalSize;

const HOVER_OVERLAY_ALPHA: f32 = 0.9;
const OVERLAY_FADE_SECONDS: f32 = 0.15;

/// Closest pickable node under the cursor, by ray vs. world bounding sphere.
pub fn pick(
    graph: &SceneGraph,
    camera: &StageCamera,
    screen: Vec2,
    viewport: PhysicalSize<u32>,
) -> Option<NodeId> {
    let (origin, dir) = camera.screen_ray(screen, viewport)?;
    let mut best: Option<(f32, NodeId)> = None;
    for id in graph.ids() {
        let Some(node) = graph.node(id) else { continue };
        if node.bound_radius <= 0.0 || !node.meta.pickable || node.rendered_visibility <= 0.01 {
            continue;
        }
        let world = graph.world_matrix(id);
        let center = world.transform_point3(glam::Vec3::ZERO);
        let scale = world.to_scale_rotation_translation().0;
        let radius = node.bound_radius * scale.abs().max_element();

        let to_center = center - origin;
        let along = to_center.dot(dir);
        if along < 0.0 {
            continue;
        }
        let closest_sq = to_center.length_squared() - along * along;
        if closest_sq > radius * radius {
            continue;
        }
        if best.map(|(t, _)| along < t).unwrap_or(true) {
            best = Some((along, id));
        }
    }
    best.map(|(_, id)| id)
}

/// Hover edge detection over model roots. Enter reveals the tooltip, raises
/// the highlight overlay and pauses the idle cycles; leave undoes all three.
#[derive(Debug, Default)]
pub struct HoverState {
    current: Option<NodeId>,
}

impl HoverState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<NodeId> {
        self.current
    }

    pub fn update(
        &mut self,
        graph: &mut SceneGraph,
        tweens: &mut TweenScheduler,
        tooltips: &mut TooltipLayer,
        hovered_root: Option<NodeId>,
    ) {
        if hovered_root == self.current {
            return;
        }
        if let Some(previous) = self.current.take() {
            leave(graph, tweens, tooltips, previous);
        }
        if let Some(root) = hovered_root {
            enter(graph, tweens, tooltips, root);
            self.current = Some(root);
        }
    }

    /// Drops the hover without a new target (cursor left the window, model
    /// hidden by selection).
    pub fn clear(
        &mut self,
        graph: &mut SceneGraph,
        tweens: &mut TweenScheduler,
        tooltips: &mut TooltipLayer,
    ) {
        self.update(graph, tweens, tooltips, None);
    }
}

fn enter(
    graph: &mut SceneGraph,
    tweens: &mut TweenScheduler,
    tooltips: &mut TooltipLayer,
    root: NodeId,
) {
    let link = graph.node(root).map(|n| n.meta.link_name.clone()).unwrap_or_default();
    tooltips.reveal(graph, tweens, &link);
    animation::pause_idle(graph, tweens, root);
    let from = graph.node(root).map(|n| n.overlay_alpha).unwrap_or(0.0);
    tweens.start(Tween::scalar(
        Channel::OverlayAlpha(root),
        from,
        HOVER_OVERLAY_ALPHA,
        OVERLAY_FADE_SECONDS,
    ));
}

fn leave(
    graph: &mut SceneGraph,
    tweens: &mut TweenScheduler,
    tooltips: &mut TooltipLayer,
    root: NodeId,
) {
    let link = graph.node(root).map(|n| n.meta.link_name.clone()).unwrap_or_default();
    tooltips.hide(graph, tweens, &link);
    animation::resume_idle(graph, tweens, root);
    let from = graph.node(root).map(|n| n.overlay_alpha).unwrap_or(0.0);
    tweens.start(Tween::scalar(Channel::OverlayAlpha(root), from, 0.0, OVERLAY_FADE_SECONDS));
}

/// Click feedback on a model root.
pub fn click_bounce(tweens: &mut TweenScheduler, root: NodeId) {
    animation::bounce(tweens, root);
}

/// Main parent for any picked node, falling back to the node itself.
pub fn main_parent(graph: &SceneGraph, id: NodeId) -> NodeId {
    graph.node(id).and_then(|n| n.meta.main_parent).unwrap_or(id)
}

/// Whether a hovered root is still worth highlighting; selection can hide a
/// model out from under the cursor.
pub fn hover_still_valid(graph: &SceneGraph, root: NodeId) -> bool {
    graph.node(root).map(|n| n.meta.visibility > 0.0).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::PoseData;
    use crate::registry::NodeRegistry;
    use crate::tooltip::TooltipLayer;
    use glam::Vec3;

    fn camera() -> StageCamera {
        StageCamera::from_pose(&PoseData {
            target: [0.0, 2.0, 0.0],
            yaw_deg: 180.0,
            pitch_deg: 90.0,
            radius: 6.0,
        })
    }

    fn pickable_sphere(graph: &mut SceneGraph, name: &str, at: Vec3, radius: f32) -> NodeId {
        let root = graph.root();
        let id = graph.insert(name, Some(root));
        let node = graph.node_mut(id).unwrap();
        node.translation = at;
        node.bound_radius = radius;
        node.meta.pickable = true;
        id
    }

    #[test]
    fn pick_hits_sphere_under_cursor() {
        let mut graph = SceneGraph::new();
        let target = pickable_sphere(&mut graph, "css", Vec3::new(0.0, 2.0, 0.0), 0.5);
        let camera = camera();
        let viewport = PhysicalSize::new(1280, 720);
        let screen = camera.project_point(Vec3::new(0.0, 2.0, 0.0), viewport).unwrap();
        assert_eq!(pick(&graph, &camera, screen, viewport), Some(target));
        // Far corner misses.
        assert_eq!(pick(&graph, &camera, Vec2::new(5.0, 5.0), viewport), None);
    }

    #[test]
    fn pick_prefers_the_closer_hit() {
        let mut graph = SceneGraph::new();
        let camera = camera();
        let viewport = PhysicalSize::new(1280, 720);
        // Two spheres on the same ray; the camera looks from +z toward -z...
        let eye = camera.position();
        let toward = (Vec3::new(0.0, 2.0, 0.0) - eye).normalize();
        let near = pickable_sphere(&mut graph, "near", eye + toward * 2.0, 0.3);
        let _far = pickable_sphere(&mut graph, "far", eye + toward * 5.0, 0.3);
        let screen = camera.project_point(eye + toward * 2.0, viewport).unwrap();
        assert_eq!(pick(&graph, &camera, screen, viewport), Some(near));
    }

    #[test]
    fn invisible_nodes_are_not_pickable() {
        let mut graph = SceneGraph::new();
        let id = pickable_sphere(&mut graph, "css", Vec3::new(0.0, 2.0, 0.0), 0.5);
        graph.node_mut(id).unwrap().rendered_visibility = 0.0;
        let camera = camera();
        let viewport = PhysicalSize::new(1280, 720);
        let screen = camera.project_point(Vec3::new(0.0, 2.0, 0.0), viewport).unwrap();
        assert_eq!(pick(&graph, &camera, screen, viewport), None);
    }

    #[test]
    fn hover_edges_fire_once_per_target() {
        let mut graph = SceneGraph::new();
        let id = pickable_sphere(&mut graph, "css", Vec3::new(0.0, 2.0, 0.0), 0.5);
        graph.node_mut(id).unwrap().meta.link_name = "css".to_string();
        let mut tweens = TweenScheduler::new();
        let mut tooltips = TooltipLayer::default();
        let mut hover = HoverState::new();

        hover.update(&mut graph, &mut tweens, &mut tooltips, Some(id));
        assert_eq!(hover.current(), Some(id));
        let overlay_tweens = tweens.live_count();
        // Same target again: no new tweens.
        hover.update(&mut graph, &mut tweens, &mut tooltips, Some(id));
        assert_eq!(tweens.live_count(), overlay_tweens);

        hover.clear(&mut graph, &mut tweens, &mut tooltips);
        assert_eq!(hover.current(), None);
    }

    #[test]
    fn main_parent_falls_back_to_self() {
        let mut graph = SceneGraph::new();
        let root = graph.root();
        let model = graph.insert("model", Some(root));
        let part = graph.insert("part", Some(model));
        graph.tag_subtree(model, "model", "common", 0);
        assert_eq!(main_parent(&graph, part), model);
        let loose = graph.insert("loose", Some(root));
        assert_eq!(main_parent(&graph, loose), loose);
    }
}
