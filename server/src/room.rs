//! A single campfire room: the simulation plus the fan-out of its changes.
//!
//! The room is owned by one task. Player commands and ticks mutate the
//! engine's state tree; [`Room::flush`] drains the accumulated changes,
//! runs the server-side listeners over them and hands them back so the
//! network layer can broadcast them as a patch.

use crate::commands::Command;
use crate::config::RoomConfig;
use crate::engine::SimulationEngine;
use crate::world::initial_state;
use log::{debug, error, warn};
use rand::Rng;
use shared::{Change, ClientMessage, Operation, StateTree, SubscriptionRegistry, Value};
use std::convert::TryFrom;
use std::time::{SystemTime, UNIX_EPOCH};

/// Counters maintained by the room's own change listeners.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomStats {
    pub logs_burned: u64,
    pub marshmallows_eaten: u64,
    pub players_online: usize,
}

pub struct Room {
    engine: SimulationEngine,
    listeners: SubscriptionRegistry<RoomStats>,
    stats: RoomStats,
}

impl Room {
    pub fn new(config: RoomConfig) -> Result<Self, shared::StateError> {
        Self::with_rng(config, &mut rand::thread_rng())
    }

    /// Builds a room whose random layout comes from `rng`.
    pub fn with_rng<R: Rng>(config: RoomConfig, rng: &mut R) -> Result<Self, shared::StateError> {
        let tree = StateTree::new(initial_state(&config, rng))?;
        let engine = SimulationEngine::new(config, tree);

        let mut listeners = SubscriptionRegistry::new();
        listeners.listen("logs/:logId/hidden", |stats: &mut RoomStats, event| {
            if event.value == Some(&Value::Bool(true)) {
                stats.logs_burned += 1;
            }
        })?;
        listeners.listen(
            "sticks/:stickId/children/marshmallow/hidden",
            |stats: &mut RoomStats, event| {
                if event.value == Some(&Value::Bool(true)) {
                    stats.marshmallows_eaten += 1;
                }
            },
        )?;
        listeners.listen("players/:playerId", |stats: &mut RoomStats, event| {
            match event.operation {
                Operation::Add => stats.players_online += 1,
                Operation::Remove => {
                    stats.players_online = stats.players_online.saturating_sub(1)
                }
                Operation::Set => {}
            }
        })?;

        Ok(Self {
            engine,
            listeners,
            stats: RoomStats::default(),
        })
    }

    pub fn engine(&self) -> &SimulationEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut SimulationEngine {
        &mut self.engine
    }

    pub fn stats(&self) -> &RoomStats {
        &self.stats
    }

    pub fn current_tick(&self) -> u64 {
        self.engine.current_tick()
    }

    /// Full copy of the world for a joining client. Call [`Room::flush`]
    /// first so the snapshot and the patches already sent agree.
    pub fn snapshot(&self) -> Value {
        self.engine.tree().snapshot()
    }

    pub fn join(&mut self, player_id: &str) {
        if let Err(e) = self.engine.add_player(player_id) {
            error!("Failed to add player {}: {}", player_id, e);
        }
    }

    pub fn leave(&mut self, player_id: &str) {
        if let Err(e) = self.engine.remove_player(player_id) {
            error!("Failed to remove player {}: {}", player_id, e);
        }
    }

    /// Parses and applies one client message. Malformed messages are logged
    /// and dropped.
    pub fn handle_message(&mut self, player_id: &str, message: &ClientMessage, now: u64) {
        let command = match Command::try_from(message) {
            Ok(command) => command,
            Err(e) => {
                warn!("Dropping message from {}: {}", player_id, e);
                return;
            }
        };

        if let Err(e) = self.engine.execute(player_id, command, now) {
            error!("Failed to apply {} from {}: {}", message.kind, player_id, e);
        }
    }

    pub fn tick(&mut self, dt: f64, now: u64) {
        if let Err(e) = self.engine.tick(dt, now) {
            error!("Tick {} failed: {}", self.engine.current_tick(), e);
        }
    }

    /// Drains pending changes, notifies the room's listeners and returns the
    /// changes in the order they happened.
    pub fn flush(&mut self) -> Vec<Change> {
        let changes = self.engine.tree_mut().drain_changes();
        for change in &changes {
            self.listeners.dispatch(&mut self.stats, change);
        }
        if !changes.is_empty() {
            debug!("Flushing {} changes", changes.len());
        }
        changes
    }
}

/// Wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis().min(u64::MAX as u128) as u64)
        .unwrap_or(0)
}
