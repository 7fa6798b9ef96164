use crate::scene_graph::{NodeId, SceneGraph};
use crate::tween::{Channel, Tween, TweenScheduler};

/// Point markers never go fully opaque; a requested 1.0 is clamped to this.
pub const MARKER_PREFIX: &str = "marker_";
pub const MARKER_MAX_ALPHA: f32 = 0.1;

/// Fades a whole subtree to `level`. The committed value (`meta.visibility`)
/// and pickability flip immediately; only the rendered alpha animates. With
/// `persist == false` the previous committed value is cached so a later
/// restore can undo the nudge.
pub fn set_visibility(
    graph: &mut SceneGraph,
    tweens: &mut TweenScheduler,
    root: NodeId,
    level: f32,
    persist: bool,
    duration: f32,
) {
    for id in graph.subtree(root) {
        let Some(node) = graph.node_mut(id) else { continue };
        let mut target = level.clamp(0.0, 1.0);
        if node.name.starts_with(MARKER_PREFIX) && target >= 1.0 {
            target = MARKER_MAX_ALPHA;
        }
        if persist {
            node.meta.real_visibility = None;
        } else if node.meta.real_visibility.is_none() {
            node.meta.real_visibility = Some(node.meta.visibility);
        }
        node.meta.visibility = target;
        node.meta.pickable = target > 0.0;
        if duration <= 0.0 {
            node.rendered_visibility = target;
            tweens.cancel_channel(Channel::Visibility(id));
        } else {
            let from = node.rendered_visibility;
            tweens.start(Tween::scalar(Channel::Visibility(id), from, target, duration));
        }
    }
}

/// Undoes a non-persisted nudge: each subtree node returns to its cached
/// committed value (nodes without a cache keep their current value).
pub fn restore_visibility(
    graph: &mut SceneGraph,
    tweens: &mut TweenScheduler,
    root: NodeId,
    duration: f32,
) {
    for id in graph.subtree(root) {
        let Some(node) = graph.node_mut(id) else { continue };
        let Some(real) = node.meta.real_visibility.take() else { continue };
        node.meta.visibility = real;
        node.meta.pickable = real > 0.0;
        if duration <= 0.0 {
            node.rendered_visibility = real;
            tweens.cancel_channel(Channel::Visibility(id));
        } else {
            let from = node.rendered_visibility;
            tweens.start(Tween::scalar(Channel::Visibility(id), from, real, duration));
        }
    }
}
