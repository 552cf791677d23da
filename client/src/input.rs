//! Client pointer input and its translation into room messages

use crate::scene::{CampScene, Draggable};
use macroquad::prelude::{is_mouse_button_pressed, is_mouse_button_released, mouse_position, MouseButton};
use shared::{ClientMessage, Vector2};
use std::time::{Duration, Instant};

/// Minimum time between two cursor moves sent to the server (~60Hz)
const MOVE_INTERVAL: Duration = Duration::from_millis(16);

/// One frame's worth of pointer input, in world coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerState {
    pub position: Vector2,
    pub pressed: bool,
    pub released: bool,
}

impl PointerState {
    /// Samples the mouse for the current frame. `to_world` maps screen
    /// coordinates into the room's coordinate space.
    pub fn sample(to_world: impl Fn(Vector2) -> Vector2) -> Self {
        let (x, y) = mouse_position();
        Self {
            position: to_world(Vector2::new(x as f64, y as f64)),
            pressed: is_mouse_button_pressed(MouseButton::Left),
            released: is_mouse_button_released(MouseButton::Left),
        }
    }
}

/// Turns pointer input into `dragLog`, `dragStick`, `moveCursor` and
/// `releaseCursor` messages
pub struct InputManager {
    last_sent_position: Option<Vector2>,
    last_move_sent: Option<Instant>,
    dragging: bool,
}

impl InputManager {
    pub fn new() -> Self {
        Self {
            last_sent_position: None,
            last_move_sent: None,
            dragging: false,
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    /// Processes one frame of input and returns the messages to send
    pub fn update(&mut self, pointer: PointerState, now: Instant, scene: &CampScene) -> Vec<ClientMessage> {
        let mut messages = Vec::new();
        let cursor = pointer.position;

        if pointer.pressed {
            if let Some(target) = scene.hit_test(cursor) {
                messages.push(Self::begin_drag(target, cursor));
                self.dragging = true;
            }
        }

        let moved = self.last_sent_position != Some(cursor);
        let due = self
            .last_move_sent
            .map_or(true, |sent| now.duration_since(sent) >= MOVE_INTERVAL);

        if pointer.released && self.dragging {
            messages.push(ClientMessage::release_cursor(cursor));
            self.dragging = false;
            self.record_move(cursor, now);
        } else if moved && due {
            messages.push(ClientMessage::move_cursor(cursor));
            self.record_move(cursor, now);
        }

        messages
    }

    fn begin_drag(target: Draggable, cursor: Vector2) -> ClientMessage {
        match target {
            Draggable::Log { id, position } => ClientMessage::drag_log(&id, position - cursor, position),
            Draggable::Stick { id, position } => ClientMessage::drag_stick(&id, position - cursor, position),
        }
    }

    fn record_move(&mut self, cursor: Vector2, now: Instant) {
        self.last_sent_position = Some(cursor);
        self.last_move_sent = Some(now);
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}
