//! Authoritative campfire simulation.
//!
//! [`SimulationEngine::tick`] advances the world by one fixed step. The
//! steps run in a fixed order and later steps see the mutations of earlier
//! ones within the same tick:
//!
//! 1. moon drift
//! 2. drag timeout sweep (logs, then sticks)
//! 3. stick drag effects (cooking, fox snatching marshmallows)
//! 4. log respawn countdown
//! 5. marshmallow respawn countdown and fox lure
//! 6. fire decay
//! 7. fox tween
//!
//! Player command handlers live in [`crate::commands`].

use crate::config::RoomConfig;
use crate::drag::{DragKind, InteractionSessions};
use crate::world::{
    log_path, marshmallow_path, stick_path, MarshmallowTexture, FIRE_DECAY, FIRE_THRESHOLD,
    FIRE_VALUE, FOX, LARGE_FIRE, LOGS, SHOWING_LARGE_FIRE, SMALL_FIRE, STICKS,
};
use log::{debug, info};
use shared::{StateError, StateTree, Vector2};
use std::f64::consts::PI;

/// Moon rotation per second, in radians.
const MOON_SPIN: f64 = PI / 100.0;

pub struct SimulationEngine {
    pub(crate) tree: StateTree,
    pub(crate) config: RoomConfig,
    pub(crate) sessions: InteractionSessions,
    tick: u64,
}

impl SimulationEngine {
    pub fn new(config: RoomConfig, tree: StateTree) -> Self {
        let sessions = InteractionSessions::new(config.drag_timeout);
        Self {
            tree,
            config,
            sessions,
            tick: 0,
        }
    }

    pub fn tree(&self) -> &StateTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut StateTree {
        &mut self.tree
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    pub fn sessions(&self) -> &InteractionSessions {
        &self.sessions
    }

    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Advances the world by `dt` milliseconds. `now` is wall-clock time in
    /// milliseconds and is only used to age drag sessions.
    pub fn tick(&mut self, dt: f64, now: u64) -> Result<(), StateError> {
        let seconds = dt / 1000.0;

        self.update_moon(seconds)?;
        self.expire_drags(now)?;
        self.update_stick_drags(dt)?;
        self.update_log_cooldowns(dt)?;
        self.update_marshmallows(dt)?;
        self.update_fire(seconds)?;
        self.update_fox(seconds)?;

        self.tick += 1;
        Ok(())
    }

    fn update_moon(&mut self, seconds: f64) -> Result<(), StateError> {
        let reversed = self.tree.flag("moon/reversed")?;
        let x = self.tree.number("moon/x")?;
        let rotation = self.tree.number("moon/rotation")?;
        let moon_width = self.tree.number("moon/width")?;
        let step = self.config.moon_speed * seconds;
        let spin = MOON_SPIN * seconds;

        if reversed {
            let x = x - step;
            self.tree.set("moon/x", x)?;
            self.tree.set("moon/rotation", rotation - spin)?;
            if x < -moon_width {
                self.tree.set("moon/reversed", false)?;
            }
        } else {
            let x = x + step;
            self.tree.set("moon/x", x)?;
            self.tree.set("moon/rotation", rotation + spin)?;
            if x > self.config.width + moon_width {
                self.tree.set("moon/reversed", true)?;
            }
        }
        Ok(())
    }

    fn expire_drags(&mut self, now: u64) -> Result<(), StateError> {
        for kind in DragKind::ALL {
            for session in self.sessions.expired(&self.tree, kind, now)? {
                debug!(
                    "Drag of {} by {} timed out",
                    session.target_path(),
                    session.player_id
                );
                self.sessions.end(&mut self.tree, kind, &session.player_id)?;
                self.reset_to_initial(&session.target_path())?;
            }
        }
        Ok(())
    }

    fn update_stick_drags(&mut self, dt: f64) -> Result<(), StateError> {
        let fire = self.position(SMALL_FIRE)?;

        for session in self.sessions.all(&self.tree, DragKind::Stick)? {
            let stick = session.target_path();
            if !self.tree.contains(&stick) {
                debug!("Dropping orphaned drag of {}", stick);
                self.sessions
                    .end(&mut self.tree, DragKind::Stick, &session.player_id)?;
                continue;
            }

            let position = self.position(&stick)?;
            if position.distance(&fire) < self.config.fire_reach {
                self.cook(&session.target_id, dt)?;
            } else if self.tree.flag("fox/out")?
                && position.distance(&self.position(FOX)?) < self.config.fox_reach
            {
                self.feed_fox(&session.target_id)?;
            }
        }
        Ok(())
    }

    fn cook(&mut self, stick_id: &str, dt: f64) -> Result<(), StateError> {
        let cook_time_path = format!("{}/cookTime", stick_path(stick_id));
        let cook_time = self.tree.number(&cook_time_path)? + dt;
        self.tree.set(&cook_time_path, cook_time)?;

        let texture = if cook_time > self.config.burned_after {
            Some(MarshmallowTexture::Burned)
        } else if cook_time > self.config.cooked_after {
            Some(MarshmallowTexture::Cooked)
        } else {
            None
        };

        if let Some(texture) = texture {
            let texture_path = format!("{}/texture", marshmallow_path(stick_id));
            self.tree.set(&texture_path, texture.as_str())?;
        }
        Ok(())
    }

    fn feed_fox(&mut self, stick_id: &str) -> Result<(), StateError> {
        info!("Fox snatched the marshmallow from stick {}", stick_id);
        self.tree.set("fox/out", false)?;
        self.tree
            .set(&format!("{}/hidden", marshmallow_path(stick_id)), true)?;
        self.tree.set(
            &format!("{}/marshmallowCooldown", stick_path(stick_id)),
            self.config.marshmallow_cooldown,
        )?;
        Ok(())
    }

    fn update_log_cooldowns(&mut self, dt: f64) -> Result<(), StateError> {
        for log_id in self.tree.keys(LOGS)? {
            let log = log_path(&log_id);
            let cooldown_path = format!("{}/cooldown", log);
            let cooldown = self.tree.number(&cooldown_path)?;
            if cooldown > 0.0 {
                let remaining = (cooldown - dt).max(0.0);
                self.tree.set(&cooldown_path, remaining)?;
                if remaining == 0.0 {
                    debug!("Log {} respawned", log_id);
                    self.tree.set(&format!("{}/hidden", log), false)?;
                }
            }
        }
        Ok(())
    }

    fn update_marshmallows(&mut self, dt: f64) -> Result<(), StateError> {
        for stick_id in self.tree.keys(STICKS)? {
            let cooldown_path = format!("{}/marshmallowCooldown", stick_path(&stick_id));
            let cooldown = self.tree.number(&cooldown_path)?;
            if cooldown > 0.0 {
                let remaining = (cooldown - dt).max(0.0);
                self.tree.set(&cooldown_path, remaining)?;
                if remaining == 0.0 {
                    self.respawn_marshmallow(&stick_id)?;
                }
            } else {
                let texture = self
                    .tree
                    .text(&format!("{}/texture", marshmallow_path(&stick_id)))?;
                if texture == MarshmallowTexture::Cooked.as_str() {
                    self.tree.set("fox/out", true)?;
                }
            }
        }
        Ok(())
    }

    /// The marshmallow comes back as it was when the fox took it, so a
    /// cooked one lures the fox out again on the next tick.
    fn respawn_marshmallow(&mut self, stick_id: &str) -> Result<(), StateError> {
        self.tree
            .set(&format!("{}/hidden", marshmallow_path(stick_id)), false)?;
        debug!("Marshmallow on stick {} respawned", stick_id);
        Ok(())
    }

    fn update_fire(&mut self, seconds: f64) -> Result<(), StateError> {
        let value = self.tree.number(FIRE_VALUE)?;
        if value > 0.0 {
            let decay = self.tree.number(FIRE_DECAY)?;
            let threshold = self.tree.number(FIRE_THRESHOLD)?;
            let decayed = (value - decay * seconds).max(0.0);
            self.tree.set(FIRE_VALUE, decayed)?;

            if decayed < threshold && self.tree.flag(SHOWING_LARGE_FIRE)? {
                self.show_small_fire()?;
            }
            // Scaled from the value the tick started with.
            if threshold > 0.0 {
                self.tree
                    .set("smallFire/scale", 1.0 + (value / threshold) * 0.5)?;
            }
        }
        Ok(())
    }

    fn update_fox(&mut self, seconds: f64) -> Result<(), StateError> {
        let out = self.tree.flag("fox/out")?;
        let x = self.tree.number("fox/x")?;
        let out_x = self.tree.number("fox/outX")?;
        let in_x = self.tree.number("fox/inX")?;
        let step = self.tree.number("fox/speed")? * seconds;

        if out && x < out_x {
            self.tree.set("fox/x", out_x.min(x + step))?;
        } else if !out && x > in_x {
            self.tree.set("fox/x", in_x.max(x - step))?;
        }
        Ok(())
    }

    pub(crate) fn show_large_fire(&mut self) -> Result<(), StateError> {
        self.tree.set(SHOWING_LARGE_FIRE, true)?;
        self.tree.set(&format!("{}/hidden", SMALL_FIRE), true)?;
        self.tree.set(&format!("{}/hidden", LARGE_FIRE), false)?;
        Ok(())
    }

    pub(crate) fn show_small_fire(&mut self) -> Result<(), StateError> {
        self.tree.set(SHOWING_LARGE_FIRE, false)?;
        self.tree.set(&format!("{}/hidden", SMALL_FIRE), false)?;
        self.tree.set(&format!("{}/hidden", LARGE_FIRE), true)?;
        Ok(())
    }

    /// Puts a draggable entity back where it spawned. Missing entities are
    /// ignored.
    pub(crate) fn reset_to_initial(&mut self, entity: &str) -> Result<(), StateError> {
        if !self.tree.contains(entity) {
            return Ok(());
        }
        let initial = Vector2::new(
            self.tree.number(&format!("{}/initialX", entity))?,
            self.tree.number(&format!("{}/initialY", entity))?,
        );
        self.set_position(entity, initial)
    }

    pub(crate) fn position(&self, entity: &str) -> Result<Vector2, StateError> {
        Ok(Vector2::new(
            self.tree.number(&format!("{}/x", entity))?,
            self.tree.number(&format!("{}/y", entity))?,
        ))
    }

    pub(crate) fn set_position(&mut self, entity: &str, position: Vector2) -> Result<(), StateError> {
        self.tree.set(&format!("{}/x", entity), position.x)?;
        self.tree.set(&format!("{}/y", entity), position.y)?;
        Ok(())
    }
}
