use std::time::{Duration, Instant};

/// Frame clock for the render loop.
pub struct Time {
    last: Instant,
    pub delta: Duration,
}

impl Time {
    pub fn new() -> Self {
        Self { last: Instant::now(), delta: Duration::ZERO }
    }

    pub fn tick(&mut self) {
        let now = Instant::now();
        self.delta = now - self.last;
        self.last = now;
    }

    pub fn delta_seconds(&self) -> f32 {
        self.delta.as_secs_f32()
    }
}

impl Default for Time {
    fn default() -> Self {
        Self::new()
    }
}
