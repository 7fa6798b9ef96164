use crate::camera::StageCamera;
use crate::content::StageContent;
use crate::registry::NodeRegistry;
use crate::scene_graph::{NodeId, SceneGraph};
use crate::tween::{Channel, Tween, TweenScheduler, TweenUpdate};
use crate::visibility::{restore_visibility, set_visibility};
use glam::Vec2;
use winit::dpi::PhysicalSize;

/// Pixel offset above the anchor at the reference distance.
const BASE_OFFSET_PX: Vec2 = Vec2::new(0.0, -42.0);
const REFERENCE_DISTANCE: f32 = 5.0;

#[derive(Debug, Clone)]
pub struct TooltipInstance {
    pub link_name: String,
    pub text: String,
    anchor: NodeId,
    model_root: NodeId,
    pub alpha: f32,
    pub screen: Option<Vec2>,
}

/// Live tooltips, realized once from descriptors whose anchors resolve.
/// Instances live until teardown; reveal/hide only animates alpha.
#[derive(Debug, Default)]
pub struct TooltipLayer {
    tooltips: Vec<TooltipInstance>,
    fade_seconds: f32,
    hover_floor: f32,
}

impl TooltipLayer {
    pub fn realize(
        content: &StageContent,
        graph: &SceneGraph,
        registry: &NodeRegistry,
        fade_seconds: f32,
        hover_floor: f32,
    ) -> Self {
        let mut tooltips = Vec::new();
        for spec in &content.tooltips {
            let Some(model_root) = registry.get(&spec.link_name) else {
                eprintln!("[tooltip] '{}' has no model, skipping", spec.link_name);
                continue;
            };
            let anchor = graph.find_by_name(&spec.anchor_node).unwrap_or(model_root);
            tooltips.push(TooltipInstance {
                link_name: spec.link_name.clone(),
                text: spec.text.clone(),
                anchor,
                model_root,
                alpha: 0.0,
                screen: None,
            });
        }
        Self { tooltips, fade_seconds, hover_floor }
    }

    pub fn len(&self) -> usize {
        self.tooltips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tooltips.is_empty()
    }

    pub fn get(&self, link_name: &str) -> Option<&TooltipInstance> {
        self.tooltips.iter().find(|t| t.link_name == link_name)
    }

    /// Fades the tooltip in and, when the model is nearly hidden, nudges it up
    /// to the hover floor without persisting.
    pub fn reveal(
        &mut self,
        graph: &mut SceneGraph,
        tweens: &mut TweenScheduler,
        link_name: &str,
    ) {
        let Some(index) = self.tooltips.iter().position(|t| t.link_name == link_name) else {
            return;
        };
        let from = self.tooltips[index].alpha;
        tweens.start(Tween::scalar(Channel::TooltipAlpha(index), from, 1.0, self.fade_seconds));
        let root = self.tooltips[index].model_root;
        let committed = graph.node(root).map(|n| n.meta.visibility).unwrap_or(1.0);
        if committed < self.hover_floor {
            set_visibility(graph, tweens, root, self.hover_floor, false, self.fade_seconds);
        }
    }

    /// Fades the tooltip out and restores any nudged visibility.
    pub fn hide(&mut self, graph: &mut SceneGraph, tweens: &mut TweenScheduler, link_name: &str) {
        let Some(index) = self.tooltips.iter().position(|t| t.link_name == link_name) else {
            return;
        };
        let from = self.tooltips[index].alpha;
        tweens.start(Tween::scalar(Channel::TooltipAlpha(index), from, 0.0, self.fade_seconds));
        let root = self.tooltips[index].model_root;
        restore_visibility(graph, tweens, root, self.fade_seconds);
    }

    pub fn apply_update(&mut self, update: &TweenUpdate) {
        if let Channel::TooltipAlpha(index) = update.channel {
            if let Some(tooltip) = self.tooltips.get_mut(index) {
                tooltip.alpha = update.scalar().clamp(0.0, 1.0);
            }
        }
    }

    /// Re-anchors every tooltip: project the anchor to the screen and apply a
    /// pixel offset that grows as the camera gets closer.
    pub fn reanchor(&mut self, graph: &SceneGraph, camera: &StageCamera, viewport: PhysicalSize<u32>) {
        let eye = camera.position();
        for tooltip in &mut self.tooltips {
            let world = graph.world_position(tooltip.anchor);
            tooltip.screen = camera.project_point(world, viewport).map(|screen| {
                let distance = eye.distance(world).max(0.1);
                screen + BASE_OFFSET_PX * (REFERENCE_DISTANCE / distance)
            });
        }
    }

    /// Tooltips worth drawing this frame.
    pub fn visible(&self) -> impl Iterator<Item = &TooltipInstance> {
        self.tooltips.iter().filter(|t| t.alpha > 0.01 && t.screen.is_some())
    }
}
