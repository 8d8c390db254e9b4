use std::collections::HashSet;

use super::frame::InputFrame;
use super::types::{InputEvent, Key, KeyState, MouseButton, MouseButtonState};

/// Current input state for a single window.
#[derive(Debug, Default)]
pub struct InputState {
    pub focused: bool,

    /// Pointer position in logical pixels; `None` outside the window.
    pub pointer_pos: Option<(f32, f32)>,

    pub keys_down: HashSet<Key>,
    pub buttons_down: HashSet<MouseButton>,
}

impl InputState {
    /// Applies `ev` to the current state and records its deltas in `frame`.
    pub fn apply_event(&mut self, frame: &mut InputFrame, ev: InputEvent) {
        match ev {
            InputEvent::Focused(focused) => {
                self.focused = focused;
                if !focused {
                    // Releases never arrive for keys held while focus moves away.
                    self.keys_down.clear();
                    self.buttons_down.clear();
                }
            }

            InputEvent::PointerMoved { x, y } => {
                if let Some((px, py)) = self.pointer_pos {
                    frame.pointer_delta.0 += x - px;
                    frame.pointer_delta.1 += y - py;
                }
                self.pointer_pos = Some((x, y));
            }

            InputEvent::PointerLeft => {
                self.pointer_pos = None;
            }

            InputEvent::Key { key, state, .. } => match state {
                KeyState::Pressed => {
                    if self.keys_down.insert(key) {
                        frame.keys_pressed.insert(key);
                    }
                }
                KeyState::Released => {
                    if self.keys_down.remove(&key) {
                        frame.keys_released.insert(key);
                    }
                }
            },

            InputEvent::PointerButton { button, state } => match state {
                MouseButtonState::Pressed => {
                    if self.buttons_down.insert(button) {
                        frame.buttons_pressed.insert(button);
                    }
                }
                MouseButtonState::Released => {
                    if self.buttons_down.remove(&button) {
                        frame.buttons_released.insert(button);
                    }
                }
            },

            InputEvent::MouseWheel(delta) => {
                frame.wheel_lines += delta.lines_y();
            }
        }
    }

    pub fn key_down(&self, key: Key) -> bool {
        self.keys_down.contains(&key)
    }

    pub fn button_down(&self, btn: MouseButton) -> bool {
        self.buttons_down.contains(&btn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::MouseWheelDelta;

    fn key(key: Key, state: KeyState, repeat: bool) -> InputEvent {
        InputEvent::Key { key, state, repeat }
    }

    #[test]
    fn held_key_reports_one_press() {
        let mut s = InputState::default();
        let mut f = InputFrame::default();
        s.apply_event(&mut f, key(Key::ArrowUp, KeyState::Pressed, false));
        s.apply_event(&mut f, key(Key::ArrowUp, KeyState::Pressed, true));
        assert!(f.key_pressed(Key::ArrowUp));
        assert!(s.key_down(Key::ArrowUp));

        f.clear();
        s.apply_event(&mut f, key(Key::ArrowUp, KeyState::Pressed, true));
        assert!(!f.key_pressed(Key::ArrowUp));

        s.apply_event(&mut f, key(Key::ArrowUp, KeyState::Released, false));
        assert!(f.keys_released.contains(&Key::ArrowUp));
        assert!(!s.key_down(Key::ArrowUp));
    }

    #[test]
    fn pointer_delta_accumulates_after_first_position() {
        let mut s = InputState::default();
        let mut f = InputFrame::default();
        s.apply_event(&mut f, InputEvent::PointerMoved { x: 10.0, y: 10.0 });
        assert_eq!(f.pointer_delta, (0.0, 0.0));
        s.apply_event(&mut f, InputEvent::PointerMoved { x: 13.0, y: 8.0 });
        s.apply_event(&mut f, InputEvent::PointerMoved { x: 15.0, y: 9.0 });
        assert_eq!(f.pointer_delta, (5.0, -1.0));

        s.apply_event(&mut f, InputEvent::PointerLeft);
        s.apply_event(&mut f, InputEvent::PointerMoved { x: 100.0, y: 100.0 });
        assert_eq!(f.pointer_delta, (5.0, -1.0));
    }

    #[test]
    fn wheel_normalizes_pixels_to_lines() {
        let mut s = InputState::default();
        let mut f = InputFrame::default();
        s.apply_event(&mut f, InputEvent::MouseWheel(MouseWheelDelta::Line { x: 0.0, y: 1.0 }));
        s.apply_event(&mut f, InputEvent::MouseWheel(MouseWheelDelta::Pixel { x: 0.0, y: 80.0 }));
        assert_eq!(f.wheel_lines, 3.0);
    }

    #[test]
    fn focus_loss_releases_everything() {
        let mut s = InputState::default();
        let mut f = InputFrame::default();
        s.apply_event(&mut f, key(Key::R, KeyState::Pressed, false));
        s.apply_event(
            &mut f,
            InputEvent::PointerButton {
                button: MouseButton::Left,
                state: MouseButtonState::Pressed,
            },
        );
        s.apply_event(&mut f, InputEvent::Focused(false));
        assert!(!s.key_down(Key::R));
        assert!(!s.button_down(MouseButton::Left));
    }
}
