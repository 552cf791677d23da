//! Tunables for a campfire room.

use shared::{WORLD_HEIGHT, WORLD_WIDTH};

/// Gameplay constants for one room. Durations are in milliseconds,
/// distances in world pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomConfig {
    pub width: f64,
    pub height: f64,
    /// Fire value lost per second.
    pub fire_decay: f64,
    /// Fire value at which the large fire shows.
    pub fire_threshold: f64,
    /// Fire value added by each burned log.
    pub burn_value: f64,
    pub log_cooldown: f64,
    pub marshmallow_cooldown: f64,
    pub cooked_after: f64,
    pub burned_after: f64,
    pub drag_timeout: u64,
    /// Distance from the small fire within which logs burn and sticks cook.
    pub fire_reach: f64,
    /// Distance from the fox within which it snatches a marshmallow.
    pub fox_reach: f64,
    pub moon_speed: f64,
    pub fox_speed: f64,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            width: WORLD_WIDTH,
            height: WORLD_HEIGHT,
            fire_decay: 8.0,
            fire_threshold: 200.0,
            burn_value: 100.0,
            log_cooldown: 5000.0,
            marshmallow_cooldown: 3000.0,
            cooked_after: 3000.0,
            burned_after: 5000.0,
            drag_timeout: 5000,
            fire_reach: 100.0,
            fox_reach: 20.0,
            moon_speed: 1.0,
            fox_speed: 200.0,
        }
    }
}
