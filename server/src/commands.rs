//! Player commands: parsing client messages and applying them to the world.

use crate::drag::{DragKind, DragSession};
use crate::engine::SimulationEngine;
use crate::world::{
    log_path, player_path, FIRE_THRESHOLD, FIRE_VALUE, LOG_COOLDOWN, PLAYERS, SMALL_FIRE,
};
use log::{debug, info};
use shared::{
    read_point, ClientMessage, StateError, Value, Vector2, DRAG_LOG, DRAG_STICK, MOVE_CURSOR,
    RELEASE_CURSOR,
};
use std::convert::TryFrom;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CommandError {
    #[error("unknown message type \"{0}\"")]
    UnknownType(String),
    #[error("{kind} message is missing or has a malformed \"{field}\"")]
    MissingField { kind: String, field: &'static str },
}

/// Payload of a drag request.
#[derive(Debug, Clone, PartialEq)]
pub struct DragRequest {
    pub target_id: String,
    pub drag_offset: Vector2,
    pub drag_origin: Vector2,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    MoveCursor(Vector2),
    ReleaseCursor(Vector2),
    DragLog(DragRequest),
    DragStick(DragRequest),
}

impl TryFrom<&ClientMessage> for Command {
    type Error = CommandError;

    fn try_from(message: &ClientMessage) -> Result<Self, Self::Error> {
        let kind = message.kind.as_str();
        match kind {
            MOVE_CURSOR => Ok(Command::MoveCursor(cursor(kind, &message.data)?)),
            RELEASE_CURSOR => Ok(Command::ReleaseCursor(cursor(kind, &message.data)?)),
            DRAG_LOG => Ok(Command::DragLog(drag_request(kind, DragKind::Log, &message.data)?)),
            DRAG_STICK => Ok(Command::DragStick(drag_request(
                kind,
                DragKind::Stick,
                &message.data,
            )?)),
            other => Err(CommandError::UnknownType(other.to_owned())),
        }
    }
}

fn missing(kind: &str, field: &'static str) -> CommandError {
    CommandError::MissingField {
        kind: kind.to_owned(),
        field,
    }
}

fn cursor(kind: &str, data: &Value) -> Result<Vector2, CommandError> {
    let x = data.get("x").and_then(Value::as_f64).ok_or_else(|| missing(kind, "x"))?;
    let y = data.get("y").and_then(Value::as_f64).ok_or_else(|| missing(kind, "y"))?;
    Ok(Vector2::new(x, y))
}

fn drag_request(kind: &str, drag: DragKind, data: &Value) -> Result<DragRequest, CommandError> {
    let field = drag.target_key();
    let target_id = data
        .get(field)
        .and_then(Value::to_key)
        .ok_or_else(|| missing(kind, field))?;
    let drag_offset = data
        .get("dragOffset")
        .and_then(read_point)
        .ok_or_else(|| missing(kind, "dragOffset"))?;
    let drag_origin = data
        .get("dragOrigin")
        .and_then(read_point)
        .ok_or_else(|| missing(kind, "dragOrigin"))?;

    Ok(DragRequest {
        target_id,
        drag_offset,
        drag_origin,
    })
}

impl SimulationEngine {
    /// Applies a parsed command on behalf of a player. Commands from players
    /// that are no longer in the room are ignored.
    pub fn execute(&mut self, player_id: &str, command: Command, now: u64) -> Result<(), StateError> {
        match command {
            Command::MoveCursor(cursor) => self.move_cursor(player_id, cursor),
            Command::ReleaseCursor(cursor) => self.release_cursor(player_id, cursor),
            Command::DragLog(request) => self.drag_log(player_id, &request, now),
            Command::DragStick(request) => self.drag_stick(player_id, &request, now),
        }
    }

    pub fn add_player(&mut self, player_id: &str) -> Result<(), StateError> {
        info!("Added player {}", player_id);
        self.tree.insert(
            PLAYERS,
            player_id,
            Value::record([
                ("id", Value::from(player_id)),
                ("x", Value::from(0.0)),
                ("y", Value::from(0.0)),
            ]),
        )
    }

    /// Removes a player, abandoning their drags and putting the dragged
    /// entities back where they spawned.
    pub fn remove_player(&mut self, player_id: &str) -> Result<(), StateError> {
        for kind in DragKind::ALL {
            if let Some(session) = self.sessions.end(&mut self.tree, kind, player_id)? {
                self.reset_to_initial(&session.target_path())?;
            }
        }
        if self.tree.delete(PLAYERS, player_id)?.is_some() {
            info!("Removed player {}", player_id);
        }
        Ok(())
    }

    pub fn move_cursor(&mut self, player_id: &str, cursor: Vector2) -> Result<(), StateError> {
        let Some(cursor) = self.place_cursor(player_id, cursor)? else {
            return Ok(());
        };

        let session = self
            .sessions
            .active(&self.tree, DragKind::Log, player_id)
            .or_else(|| self.sessions.active(&self.tree, DragKind::Stick, player_id));

        if let Some(session) = session {
            let target = session.target_path();
            if self.tree.contains(&target) {
                self.set_position(&target, session.follow(cursor))?;
            }
        }
        Ok(())
    }

    pub fn release_cursor(&mut self, player_id: &str, cursor: Vector2) -> Result<(), StateError> {
        if self.place_cursor(player_id, cursor)?.is_none() {
            return Ok(());
        }

        if let Some(session) = self.sessions.end(&mut self.tree, DragKind::Log, player_id)? {
            let log = session.target_path();
            if !self.tree.contains(&log) {
                return Ok(());
            }
            let distance = self.position(&log)?.distance(&self.position(SMALL_FIRE)?);
            if distance < self.config.fire_reach {
                self.burn_log(&session.target_id)?;
            }
            self.reset_to_initial(&log)?;
        } else {
            // The stick stays where it was dropped.
            self.sessions.end(&mut self.tree, DragKind::Stick, player_id)?;
        }
        Ok(())
    }

    pub fn drag_log(&mut self, player_id: &str, request: &DragRequest, now: u64) -> Result<(), StateError> {
        self.begin_drag(DragKind::Log, player_id, request, now)
    }

    pub fn drag_stick(&mut self, player_id: &str, request: &DragRequest, now: u64) -> Result<(), StateError> {
        self.begin_drag(DragKind::Stick, player_id, request, now)
    }

    /// Feeds a log to the fire.
    pub fn burn_log(&mut self, log_id: &str) -> Result<(), StateError> {
        let log = log_path(log_id);
        if !self.tree.contains(&log) {
            return Ok(());
        }

        let value = self.tree.number(FIRE_VALUE)? + self.config.burn_value;
        self.tree.set(FIRE_VALUE, value)?;
        let cooldown = self.tree.number(LOG_COOLDOWN)?;
        self.tree.set(&format!("{}/cooldown", log), cooldown)?;
        self.tree.set(&format!("{}/hidden", log), true)?;
        self.reset_to_initial(&log)?;
        info!("Log {} burned, fire is at {}", log_id, value);

        if value >= self.tree.number(FIRE_THRESHOLD)? {
            self.show_large_fire()
        } else {
            self.show_small_fire()
        }
    }

    fn begin_drag(
        &mut self,
        kind: DragKind,
        player_id: &str,
        request: &DragRequest,
        now: u64,
    ) -> Result<(), StateError> {
        let target = format!("{}/{}", kind.targets(), request.target_id);
        if !self.tree.contains(&player_path(player_id)) || !self.tree.contains(&target) {
            debug!("Ignoring drag of {} by {}", target, player_id);
            return Ok(());
        }

        let session = DragSession {
            kind,
            player_id: player_id.to_owned(),
            target_id: request.target_id.clone(),
            drag_offset: request.drag_offset,
            drag_origin: request.drag_origin,
            start_time: now,
        };
        self.sessions.begin(&mut self.tree, &session)
    }

    /// Clamps and stores a player's cursor. Returns `None` for unknown
    /// players.
    fn place_cursor(&mut self, player_id: &str, cursor: Vector2) -> Result<Option<Vector2>, StateError> {
        let player = player_path(player_id);
        if !self.tree.contains(&player) {
            debug!("Ignoring cursor of unknown player {}", player_id);
            return Ok(None);
        }
        let cursor = cursor.clamp_to(self.config.width, self.config.height);
        self.set_position(&player, cursor)?;
        Ok(Some(cursor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RoomConfig;
    use crate::world::{initial_state, SHOWING_LARGE_FIRE};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use shared::StateTree;

    const NOW: u64 = 50_000;

    fn engine_with_player() -> SimulationEngine {
        let config = RoomConfig::default();
        let mut rng = StdRng::seed_from_u64(3);
        let tree = StateTree::new(initial_state(&config, &mut rng)).unwrap();
        let mut engine = SimulationEngine::new(config, tree);
        engine.add_player("1_abc").unwrap();
        engine.tree_mut().drain_changes();
        engine
    }

    fn request(target: &str, offset: Vector2) -> DragRequest {
        DragRequest {
            target_id: target.to_string(),
            drag_offset: offset,
            drag_origin: Vector2::default(),
        }
    }

    #[test]
    fn test_parse_commands() {
        let message = ClientMessage::move_cursor(Vector2::new(5.0, 6.0));
        assert_eq!(
            Command::try_from(&message),
            Ok(Command::MoveCursor(Vector2::new(5.0, 6.0)))
        );

        let message = ClientMessage::drag_log("2", Vector2::new(-1.0, 2.0), Vector2::new(580.0, 500.0));
        match Command::try_from(&message) {
            Ok(Command::DragLog(request)) => {
                assert_eq!(request.target_id, "2");
                assert_eq!(request.drag_offset, Vector2::new(-1.0, 2.0));
            }
            other => panic!("Unexpected parse result: {:?}", other),
        }
    }

    #[test]
    fn test_numeric_ids_are_accepted() {
        let message = ClientMessage::new(
            DRAG_STICK,
            Value::record([
                ("stickId", Value::from(3)),
                ("dragOffset", shared::point(Vector2::default())),
                ("dragOrigin", shared::point(Vector2::default())),
            ]),
        );
        match Command::try_from(&message) {
            Ok(Command::DragStick(request)) => assert_eq!(request.target_id, "3"),
            other => panic!("Unexpected parse result: {:?}", other),
        }
    }

    #[test]
    fn test_malformed_messages_are_rejected() {
        let unknown = ClientMessage::new("jump", Value::empty());
        assert_eq!(
            Command::try_from(&unknown),
            Err(CommandError::UnknownType("jump".to_string()))
        );

        let missing_y = ClientMessage::new(MOVE_CURSOR, Value::record([("x", Value::from(1.0))]));
        assert_eq!(
            Command::try_from(&missing_y),
            Err(CommandError::MissingField {
                kind: MOVE_CURSOR.to_string(),
                field: "y",
            })
        );

        let missing_origin = ClientMessage::new(
            DRAG_LOG,
            Value::record([("logId", Value::from("1")), ("dragOffset", shared::point(Vector2::default()))]),
        );
        assert!(matches!(
            Command::try_from(&missing_origin),
            Err(CommandError::MissingField { field: "dragOrigin", .. })
        ));
    }

    #[test]
    fn test_cursor_is_clamped() {
        let mut engine = engine_with_player();
        engine.move_cursor("1_abc", Vector2::new(-20.0, 900.0)).unwrap();
        assert_eq!(engine.position("players/1_abc"), Ok(Vector2::new(0.0, 600.0)));
    }

    #[test]
    fn test_dragged_log_follows_cursor() {
        let mut engine = engine_with_player();
        engine
            .drag_log("1_abc", &request("2", Vector2::new(-10.0, 5.0)), NOW)
            .unwrap();
        engine.move_cursor("1_abc", Vector2::new(300.0, 300.0)).unwrap();
        assert_eq!(engine.position("logs/2"), Ok(Vector2::new(290.0, 305.0)));
    }

    #[test]
    fn test_log_drag_takes_precedence_over_stick_drag() {
        let mut engine = engine_with_player();
        engine.drag_stick("1_abc", &request("1", Vector2::default()), NOW).unwrap();
        engine.drag_log("1_abc", &request("1", Vector2::default()), NOW).unwrap();

        engine.move_cursor("1_abc", Vector2::new(100.0, 100.0)).unwrap();
        assert_eq!(engine.position("logs/1"), Ok(Vector2::new(100.0, 100.0)));
        assert_eq!(engine.position("sticks/1"), Ok(Vector2::new(250.0, 390.0)));
    }

    #[test]
    fn test_release_near_fire_burns_log() {
        let mut engine = engine_with_player();
        engine.tree_mut().set(FIRE_VALUE, 150.0).unwrap();
        engine.drag_log("1_abc", &request("1", Vector2::default()), NOW).unwrap();
        engine.move_cursor("1_abc", Vector2::new(400.0, 540.0)).unwrap();

        engine.release_cursor("1_abc", Vector2::new(400.0, 540.0)).unwrap();

        assert_eq!(engine.tree().number(FIRE_VALUE), Ok(250.0));
        assert_eq!(engine.tree().flag(SHOWING_LARGE_FIRE), Ok(true));
        assert_eq!(engine.tree().flag("largeFire/hidden"), Ok(false));
        assert_eq!(engine.tree().flag("smallFire/hidden"), Ok(true));
        assert_eq!(engine.tree().flag("logs/1/hidden"), Ok(true));
        assert_eq!(engine.tree().number("logs/1/cooldown"), Ok(5000.0));
        assert_eq!(engine.position("logs/1"), Ok(Vector2::new(580.0, 475.0)));
        assert!(!engine.tree().contains("logDrags/1_abc"));
    }

    #[test]
    fn test_release_far_from_fire_returns_log() {
        let mut engine = engine_with_player();
        engine.drag_log("1_abc", &request("3", Vector2::default()), NOW).unwrap();
        engine.move_cursor("1_abc", Vector2::new(50.0, 50.0)).unwrap();

        engine.release_cursor("1_abc", Vector2::new(50.0, 50.0)).unwrap();

        assert_eq!(engine.tree().number(FIRE_VALUE), Ok(0.0));
        assert_eq!(engine.tree().flag("logs/3/hidden"), Ok(false));
        assert_eq!(engine.position("logs/3"), Ok(Vector2::new(600.0, 550.0)));
    }

    #[test]
    fn test_released_stick_stays_put() {
        let mut engine = engine_with_player();
        engine.drag_stick("1_abc", &request("2", Vector2::default()), NOW).unwrap();
        engine.move_cursor("1_abc", Vector2::new(350.0, 500.0)).unwrap();

        engine.release_cursor("1_abc", Vector2::new(350.0, 500.0)).unwrap();

        assert!(!engine.tree().contains("stickDrags/1_abc"));
        assert_eq!(engine.position("sticks/2"), Ok(Vector2::new(350.0, 500.0)));
    }

    #[test]
    fn test_stale_ids_are_ignored() {
        let mut engine = engine_with_player();
        engine.drag_log("1_abc", &request("9", Vector2::default()), NOW).unwrap();
        engine.drag_stick("ghost", &request("1", Vector2::default()), NOW).unwrap();
        engine.move_cursor("ghost", Vector2::new(1.0, 1.0)).unwrap();
        engine.release_cursor("ghost", Vector2::new(1.0, 1.0)).unwrap();
        engine.burn_log("9").unwrap();
        engine.remove_player("ghost").unwrap();

        assert!(engine.tree_mut().drain_changes().is_empty());
    }

    #[test]
    fn test_removing_player_mid_drag_resets_targets() {
        let mut engine = engine_with_player();
        engine.drag_log("1_abc", &request("2", Vector2::default()), NOW).unwrap();
        engine.move_cursor("1_abc", Vector2::new(10.0, 10.0)).unwrap();

        engine.remove_player("1_abc").unwrap();

        assert!(!engine.tree().contains("players/1_abc"));
        assert!(!engine.tree().contains("logDrags/1_abc"));
        assert_eq!(engine.position("logs/2"), Ok(Vector2::new(580.0, 500.0)));
    }

    #[test]
    fn test_redrag_replaces_session() {
        let mut engine = engine_with_player();
        engine.drag_stick("1_abc", &request("1", Vector2::default()), NOW).unwrap();
        engine.drag_stick("1_abc", &request("3", Vector2::default()), NOW + 10).unwrap();

        assert_eq!(engine.tree().text("stickDrags/1_abc/stickId"), Ok("3"));
        assert_eq!(engine.tree().number("stickDrags/1_abc/startTime"), Ok((NOW + 10) as f64));
    }
}
