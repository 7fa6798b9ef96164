use glam::Vec2;

/// Pointer tracking for the window shell: cursor position in physical pixels,
/// plus right-button drag state for orbiting the camera.
#[derive(Debug, Default)]
pub struct InputState {
    cursor: Option<Vec2>,
    dragging: bool,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cursor(&self) -> Option<Vec2> {
        self.cursor
    }

    /// Updates the cursor and returns the drag delta while orbiting.
    pub fn cursor_moved(&mut self, position: Vec2) -> Option<Vec2> {
        let delta = match (self.dragging, self.cursor) {
            (true, Some(previous)) => Some(position - previous),
            _ => None,
        };
        self.cursor = Some(position);
        delta
    }

    pub fn cursor_left(&mut self) {
        self.cursor = None;
        self.dragging = false;
    }

    pub fn set_dragging(&mut self, dragging: bool) {
        self.dragging = dragging;
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drag_delta_needs_active_drag_and_previous_position() {
        let mut input = InputState::new();
        assert_eq!(input.cursor_moved(Vec2::new(10.0, 10.0)), None);
        input.set_dragging(true);
        assert_eq!(input.cursor_moved(Vec2::new(14.0, 7.0)), Some(Vec2::new(4.0, -3.0)));
        input.set_dragging(false);
        assert_eq!(input.cursor_moved(Vec2::new(20.0, 20.0)), None);
    }

    #[test]
    fn leaving_the_window_clears_state() {
        let mut input = InputState::new();
        input.set_dragging(true);
        input.cursor_moved(Vec2::ZERO);
        input.cursor_left();
        assert_eq!(input.cursor(), None);
        assert!(!input.is_dragging());
    }
}
