use crate::session::OrbitInput;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};

/// Pixels of a trackpad scroll that count as one wheel notch.
const PIXELS_PER_NOTCH: f32 = 120.0;

/// Turns raw pointer events into orbit gestures: left drag rotates, right
/// drag pans, wheel zooms.
#[derive(Debug, Default)]
pub struct PointerInput {
    rotating: bool,
    panning: bool,
    last_cursor: Option<(f64, f64)>,
}

impl PointerInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dragging(&self) -> bool {
        self.rotating || self.panning
    }

    pub fn handle_event(&mut self, event: &WindowEvent) -> Option<OrbitInput> {
        match event {
            WindowEvent::MouseInput { button, state, .. } => {
                self.button(*button, *state);
                None
            }
            WindowEvent::CursorMoved { position, .. } => self.cursor_moved(position.x, position.y),
            WindowEvent::CursorLeft { .. } => {
                self.last_cursor = None;
                None
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let steps = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / PIXELS_PER_NOTCH,
                };
                (steps != 0.0).then_some(OrbitInput::Zoom { steps })
            }
            WindowEvent::Focused(false) => {
                self.rotating = false;
                self.panning = false;
                None
            }
            _ => None,
        }
    }

    /// Tracks which drag a button starts or ends. Releases must arrive here
    /// even when the UI has taken the press's matching pointer.
    pub fn button(&mut self, button: MouseButton, state: ElementState) {
        let pressed = state == ElementState::Pressed;
        match button {
            MouseButton::Left => self.rotating = pressed,
            MouseButton::Right => self.panning = pressed,
            _ => {}
        }
    }

    fn cursor_moved(&mut self, x: f64, y: f64) -> Option<OrbitInput> {
        let last = self.last_cursor.replace((x, y))?;
        let (dx, dy) = ((x - last.0) as f32, (y - last.1) as f32);

        if self.rotating {
            Some(OrbitInput::Rotate { dx, dy })
        } else if self.panning {
            Some(OrbitInput::Pan { dx, dy })
        } else {
            None
        }
    }
}
