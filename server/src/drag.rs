//! Per-player drag sessions.
//!
//! Sessions live in the state tree (`logDrags` / `stickDrags`, keyed by
//! player id) so clients can observe them like any other state. A player
//! holds at most one session per kind; starting a new one replaces the old.

use crate::world::{LOGS, LOG_DRAGS, STICKS, STICK_DRAGS};
use shared::{point, read_point, StateError, StateTree, Value, Vector2};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragKind {
    Log,
    Stick,
}

impl DragKind {
    pub const ALL: [DragKind; 2] = [DragKind::Log, DragKind::Stick];

    /// Collection holding the sessions of this kind.
    pub fn sessions(self) -> &'static str {
        match self {
            DragKind::Log => LOG_DRAGS,
            DragKind::Stick => STICK_DRAGS,
        }
    }

    /// Collection holding the dragged entities.
    pub fn targets(self) -> &'static str {
        match self {
            DragKind::Log => LOGS,
            DragKind::Stick => STICKS,
        }
    }

    /// Field naming the dragged entity inside a session record.
    pub fn target_key(self) -> &'static str {
        match self {
            DragKind::Log => "logId",
            DragKind::Stick => "stickId",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DragSession {
    pub kind: DragKind,
    pub player_id: String,
    pub target_id: String,
    /// Entity position minus pointer position at grab time.
    pub drag_offset: Vector2,
    /// Entity position at grab time.
    pub drag_origin: Vector2,
    pub start_time: u64,
}

impl DragSession {
    pub fn target_path(&self) -> String {
        format!("{}/{}", self.kind.targets(), self.target_id)
    }

    /// Where the dragged entity sits for a given cursor position.
    pub fn follow(&self, cursor: Vector2) -> Vector2 {
        self.drag_offset + cursor
    }

    pub fn is_expired(&self, now: u64, timeout: u64) -> bool {
        now.saturating_sub(self.start_time) > timeout
    }

    fn to_value(&self) -> Value {
        Value::record([
            (self.kind.target_key(), Value::from(self.target_id.as_str())),
            ("playerId", Value::from(self.player_id.as_str())),
            ("dragOffset", point(self.drag_offset)),
            ("dragOrigin", point(self.drag_origin)),
            ("startTime", Value::Number(self.start_time as f64)),
        ])
    }

    fn from_value(kind: DragKind, player_id: &str, value: &Value) -> Option<Self> {
        Some(DragSession {
            kind,
            player_id: player_id.to_owned(),
            target_id: value.get(kind.target_key())?.to_key()?,
            drag_offset: read_point(value.get("dragOffset")?)?,
            drag_origin: read_point(value.get("dragOrigin")?)?,
            start_time: value.get("startTime")?.as_f64()? as u64,
        })
    }
}

/// Tracks drag sessions and decides when they are abandoned.
#[derive(Debug, Clone)]
pub struct InteractionSessions {
    timeout: u64,
}

impl InteractionSessions {
    pub fn new(timeout: u64) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> u64 {
        self.timeout
    }

    pub fn begin(&self, tree: &mut StateTree, session: &DragSession) -> Result<(), StateError> {
        tree.insert(session.kind.sessions(), &session.player_id, session.to_value())
    }

    pub fn active(&self, tree: &StateTree, kind: DragKind, player_id: &str) -> Option<DragSession> {
        let record = tree.get(&format!("{}/{}", kind.sessions(), player_id))?;
        DragSession::from_value(kind, player_id, record)
    }

    /// Removes a player's session of the given kind, returning it.
    pub fn end(
        &self,
        tree: &mut StateTree,
        kind: DragKind,
        player_id: &str,
    ) -> Result<Option<DragSession>, StateError> {
        let session = self.active(tree, kind, player_id);
        tree.delete(kind.sessions(), player_id)?;
        Ok(session)
    }

    pub fn all(&self, tree: &StateTree, kind: DragKind) -> Result<Vec<DragSession>, StateError> {
        Ok(tree
            .members(kind.sessions())?
            .iter()
            .filter_map(|(player_id, record)| DragSession::from_value(kind, player_id, record))
            .collect())
    }

    /// Sessions older than the timeout, measured from their start.
    pub fn expired(
        &self,
        tree: &StateTree,
        kind: DragKind,
        now: u64,
    ) -> Result<Vec<DragSession>, StateError> {
        Ok(self
            .all(tree, kind)?
            .into_iter()
            .filter(|session| session.is_expired(now, self.timeout))
            .collect())
    }
}
