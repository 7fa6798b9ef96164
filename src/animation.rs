use crate::scene_graph::{NodeId, SceneGraph};
use crate::tween::{Axis, Channel, Easing, Repeat, Tween, TweenScheduler};
use glam::Quat;
use rand::Rng;

pub const BOUNCE_SCALE: f32 = 0.9;
pub const BOUNCE_SECONDS: f32 = 0.12;

/// Attaches the decorative idle motion to a model root: a vertical bob and a
/// slow yaw sway, both ping-pong loops with randomized amplitude and period so
/// the models drift out of phase. Handles are stored on the node for
/// hover pause/resume.
pub fn start_idle_cycles(
    graph: &mut SceneGraph,
    tweens: &mut TweenScheduler,
    rng: &mut impl Rng,
    id: NodeId,
) {
    let Some(node) = graph.node(id) else { return };
    let base_y = node.translation.y;
    let (_, base_yaw, _) = node.rotation.to_euler(glam::EulerRot::XYZ);

    let bob_amplitude = rng.gen_range(0.05..0.2);
    let bob_period = rng.gen_range(1.5..3.0);
    let sway_amplitude = rng.gen_range(0.1..0.35);
    let sway_period = rng.gen_range(2.0..4.5);

    let bob = tweens.start(
        Tween::scalar(Channel::Translation(id, Axis::Y), base_y, base_y + bob_amplitude, bob_period)
            .with_easing(Easing::QuadInOut)
            .with_repeat(Repeat::PingPongLoop),
    );
    let sway = tweens.start(
        Tween::scalar(Channel::Rotation(id, Axis::Y), base_yaw, base_yaw + sway_amplitude, sway_period)
            .with_easing(Easing::QuadInOut)
            .with_repeat(Repeat::PingPongLoop),
    );
    if let Some(node) = graph.node_mut(id) {
        node.meta.idle_handles = vec![bob, sway];
    }
}

/// Hover pause. Handles stay on the node and keep their elapsed time, so the
/// cycle resumes mid-swing instead of snapping back.
pub fn pause_idle(graph: &SceneGraph, tweens: &mut TweenScheduler, id: NodeId) {
    if let Some(node) = graph.node(id) {
        for &handle in &node.meta.idle_handles {
            tweens.pause(handle);
        }
    }
}

pub fn resume_idle(graph: &SceneGraph, tweens: &mut TweenScheduler, id: NodeId) {
    if let Some(node) = graph.node(id) {
        for &handle in &node.meta.idle_handles {
            tweens.resume(handle);
        }
    }
}

/// Click feedback: squash to 0.9x and back.
pub fn bounce(tweens: &mut TweenScheduler, id: NodeId) {
    tweens.start(
        Tween::scalar(Channel::Scale(id), 1.0, BOUNCE_SCALE, BOUNCE_SECONDS)
            .with_repeat(Repeat::MirrorOnce),
    );
}

/// Yaws the node so its +Z side faces the camera. Pitch/roll are left alone.
pub fn face_camera(graph: &mut SceneGraph, id: NodeId, camera_position: glam::Vec3) {
    let world = graph.world_position(id);
    let to_camera = camera_position - world;
    if to_camera.length_squared() < 1e-8 {
        return;
    }
    let yaw = to_camera.x.atan2(to_camera.z);
    if let Some(node) = graph.node_mut(id) {
        node.rotation = Quat::from_rotation_y(yaw);
    }
}
