//! Types shared by the campfire server and its clients: the state tree and
//! its change events, the subscription registry, and the wire packets.

pub mod error;
pub mod geometry;
pub mod path;
pub mod registry;
pub mod state_tree;
pub mod value;

pub use error::StateError;
pub use geometry::Vector2;
pub use path::{Captures, PathPattern};
pub use registry::{ChangeMatch, SubscriptionId, SubscriptionRegistry};
pub use state_tree::{Change, Operation, StateTree};
pub use value::Value;

use serde::{Deserialize, Serialize};

pub const WORLD_WIDTH: f64 = 800.0;
pub const WORLD_HEIGHT: f64 = 600.0;
pub const PROTOCOL_VERSION: u32 = 1;

pub const MOVE_CURSOR: &str = "moveCursor";
pub const RELEASE_CURSOR: &str = "releaseCursor";
pub const DRAG_LOG: &str = "dragLog";
pub const DRAG_STICK: &str = "dragStick";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    Join {
        client_version: u32,
    },
    Message(ClientMessage),
    Heartbeat,
    Leave,

    Joined {
        player_id: String,
        state: Value,
    },
    Patch {
        tick: u64,
        changes: Vec<Change>,
    },
    Disconnected {
        reason: String,
    },
}

/// An application message from a client: `{type, data}`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ClientMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: Value,
}

impl ClientMessage {
    pub fn new(kind: &str, data: Value) -> Self {
        Self {
            kind: kind.to_owned(),
            data,
        }
    }

    pub fn move_cursor(cursor: Vector2) -> Self {
        Self::new(MOVE_CURSOR, point(cursor))
    }

    pub fn release_cursor(cursor: Vector2) -> Self {
        Self::new(RELEASE_CURSOR, point(cursor))
    }

    pub fn drag_log(log_id: &str, drag_offset: Vector2, drag_origin: Vector2) -> Self {
        Self::new(
            DRAG_LOG,
            Value::record([
                ("logId", Value::from(log_id)),
                ("dragOffset", point(drag_offset)),
                ("dragOrigin", point(drag_origin)),
            ]),
        )
    }

    pub fn drag_stick(stick_id: &str, drag_offset: Vector2, drag_origin: Vector2) -> Self {
        Self::new(
            DRAG_STICK,
            Value::record([
                ("stickId", Value::from(stick_id)),
                ("dragOffset", point(drag_offset)),
                ("dragOrigin", point(drag_origin)),
            ]),
        )
    }
}

/// Encodes a point as an `{x, y}` record.
pub fn point(p: Vector2) -> Value {
    Value::record([("x", Value::from(p.x)), ("y", Value::from(p.y))])
}

/// Decodes an `{x, y}` record.
pub fn read_point(value: &Value) -> Option<Vector2> {
    let x = value.get("x")?.as_f64()?;
    let y = value.get("y")?.as_f64()?;
    Some(Vector2::new(x, y))
}
