use crate::scene_graph::NodeId;
use glam::Vec3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn pick(self, v: Vec3) -> f32 {
        match self {
            Axis::X => v.x,
            Axis::Y => v.y,
            Axis::Z => v.z,
        }
    }

    pub fn write(self, v: &mut Vec3, value: f32) {
        match self {
            Axis::X => v.x = value,
            Axis::Y => v.y = value,
            Axis::Z => v.z = value,
        }
    }
}

/// What a tween drives. One live tween per channel; starting a new one on the
/// same channel replaces the old.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Visibility(NodeId),
    Translation(NodeId, Axis),
    Rotation(NodeId, Axis),
    /// Uniform scale factor (bounce-on-click).
    Scale(NodeId),
    OverlayAlpha(NodeId),
    TooltipAlpha(usize),
    CameraYaw,
    CameraPitch,
    CameraRadius,
    CameraTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Easing {
    Linear,
    QuadInOut,
}

impl Easing {
    fn apply(self, t: f32) -> f32 {
        match self {
            Easing::Linear => t,
            Easing::QuadInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repeat {
    /// Run to the end value and finish.
    Once,
    /// Out and back, finishing at the start value (bounce).
    MirrorOnce,
    /// Triangle-wave forever (idle cycles). Never finishes on its own.
    PingPongLoop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TweenId(u64);

#[derive(Debug, Clone)]
pub struct Tween {
    pub channel: Channel,
    pub start: Vec3,
    pub end: Vec3,
    pub duration: f32,
    pub easing: Easing,
    pub repeat: Repeat,
}

impl Tween {
    pub fn scalar(channel: Channel, from: f32, to: f32, duration: f32) -> Self {
        Self::vec(channel, Vec3::splat(from), Vec3::splat(to), duration)
    }

    pub fn vec(channel: Channel, from: Vec3, to: Vec3, duration: f32) -> Self {
        Self { channel, start: from, end: to, duration, easing: Easing::QuadInOut, repeat: Repeat::Once }
    }

    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    pub fn with_repeat(mut self, repeat: Repeat) -> Self {
        self.repeat = repeat;
        self
    }
}

#[derive(Debug, Clone)]
struct Active {
    id: TweenId,
    tween: Tween,
    elapsed: f32,
    paused: bool,
}

impl Active {
    /// Value at the current elapsed time, plus whether the tween is done.
    fn sample(&self) -> (Vec3, bool) {
        let duration = self.tween.duration.max(f32::EPSILON);
        match self.tween.repeat {
            Repeat::Once => {
                let t = (self.elapsed / duration).min(1.0);
                let eased = self.tween.easing.apply(t);
                (self.tween.start.lerp(self.tween.end, eased), t >= 1.0)
            }
            Repeat::MirrorOnce => {
                let t = (self.elapsed / duration).min(2.0);
                let phase = if t <= 1.0 { t } else { 2.0 - t };
                let eased = self.tween.easing.apply(phase);
                (self.tween.start.lerp(self.tween.end, eased), t >= 2.0)
            }
            Repeat::PingPongLoop => {
                let cycle = (self.elapsed / duration) % 2.0;
                let phase = if cycle <= 1.0 { cycle } else { 2.0 - cycle };
                let eased = self.tween.easing.apply(phase);
                (self.tween.start.lerp(self.tween.end, eased), false)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct TweenUpdate {
    pub id: TweenId,
    pub channel: Channel,
    pub value: Vec3,
    pub finished: bool,
}

impl TweenUpdate {
    pub fn scalar(&self) -> f32 {
        self.value.x
    }
}

/// The single animation driver. Everything that changes over time (fades,
/// camera moves, idle cycles, bounces) is a tween ticked here once per frame.
#[derive(Debug, Default)]
pub struct TweenScheduler {
    active: Vec<Active>,
    next_id: u64,
}

impl TweenScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a tween, replacing any live tween on the same channel. A zero
    /// duration still produces one update at the end value on the next tick.
    pub fn start(&mut self, tween: Tween) -> TweenId {
        self.active.retain(|a| a.tween.channel != tween.channel);
        self.next_id += 1;
        let id = TweenId(self.next_id);
        self.active.push(Active { id, tween, elapsed: 0.0, paused: false });
        id
    }

    pub fn cancel(&mut self, id: TweenId) {
        self.active.retain(|a| a.id != id);
    }

    pub fn cancel_channel(&mut self, channel: Channel) {
        self.active.retain(|a| a.tween.channel != channel);
    }

    /// Pause keeps elapsed time, so a later resume continues the same run.
    pub fn pause(&mut self, id: TweenId) {
        if let Some(active) = self.active.iter_mut().find(|a| a.id == id) {
            active.paused = true;
        }
    }

    pub fn resume(&mut self, id: TweenId) {
        if let Some(active) = self.active.iter_mut().find(|a| a.id == id) {
            active.paused = false;
        }
    }

    pub fn is_live(&self, id: TweenId) -> bool {
        self.active.iter().any(|a| a.id == id)
    }

    pub fn live_count(&self) -> usize {
        self.active.len()
    }

    /// Advances all unpaused tweens and returns their current values. Finished
    /// tweens report exact endpoints and are dropped.
    pub fn tick(&mut self, dt: f32) -> Vec<TweenUpdate> {
        let mut updates = Vec::with_capacity(self.active.len());
        for active in &mut self.active {
            if active.paused {
                continue;
            }
            active.elapsed += dt;
            let (value, finished) = active.sample();
            updates.push(TweenUpdate { id: active.id, channel: active.tween.channel, value, finished });
        }
        self.active.retain(|a| {
            a.paused || !matches!(a.sample(), (_, true))
        });
        updates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> Channel {
        Channel::Visibility(NodeId(1))
    }

    #[test]
    fn once_reaches_exact_endpoint_and_drops() {
        let mut sched = TweenScheduler::new();
        sched.start(Tween::scalar(channel(), 0.0, 1.0, 0.3));
        let mid = sched.tick(0.15);
        assert!(!mid[0].finished);
        assert!(mid[0].scalar() > 0.0 && mid[0].scalar() < 1.0);
        let done = sched.tick(0.2);
        assert!(done[0].finished);
        assert_eq!(done[0].scalar(), 1.0);
        assert_eq!(sched.live_count(), 0);
    }

    #[test]
    fn zero_duration_applies_immediately() {
        let mut sched = TweenScheduler::new();
        sched.start(Tween::scalar(channel(), 0.2, 0.9, 0.0));
        let updates = sched.tick(0.016);
        assert!(updates[0].finished);
        assert_eq!(updates[0].scalar(), 0.9);
    }

    #[test]
    fn same_channel_replaces() {
        let mut sched = TweenScheduler::new();
        let first = sched.start(Tween::scalar(channel(), 0.0, 1.0, 1.0));
        let second = sched.start(Tween::scalar(channel(), 1.0, 0.0, 1.0));
        assert!(!sched.is_live(first));
        assert!(sched.is_live(second));
        assert_eq!(sched.live_count(), 1);
    }

    #[test]
    fn pause_preserves_elapsed() {
        let mut sched = TweenScheduler::new();
        let id = sched.start(Tween::scalar(channel(), 0.0, 1.0, 1.0).with_easing(Easing::Linear));
        sched.tick(0.4);
        sched.pause(id);
        assert!(sched.tick(5.0).is_empty(), "paused tweens emit nothing");
        sched.resume(id);
        let updates = sched.tick(0.1);
        assert!((updates[0].scalar() - 0.5).abs() < 1e-5, "resume continues from 0.4s");
    }

    #[test]
    fn mirror_once_returns_to_start() {
        let mut sched = TweenScheduler::new();
        sched.start(
            Tween::scalar(channel(), 1.0, 0.9, 0.1).with_easing(Easing::Linear).with_repeat(Repeat::MirrorOnce),
        );
        let out = sched.tick(0.1);
        assert!((out[0].scalar() - 0.9).abs() < 1e-5);
        let back = sched.tick(0.1);
        assert!(back[0].finished);
        assert_eq!(back[0].scalar(), 1.0);
        assert_eq!(sched.live_count(), 0);
    }

    #[test]
    fn ping_pong_never_finishes() {
        let mut sched = TweenScheduler::new();
        sched.start(
            Tween::scalar(channel(), 0.0, 1.0, 0.5).with_easing(Easing::Linear).with_repeat(Repeat::PingPongLoop),
        );
        for _ in 0..40 {
            let updates = sched.tick(0.25);
            assert!(!updates[0].finished);
            let v = updates[0].scalar();
            assert!((0.0..=1.0).contains(&v));
        }
        assert_eq!(sched.live_count(), 1);
    }
}
