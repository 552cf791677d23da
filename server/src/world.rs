//! The campfire world schema and its initial contents.

use crate::config::RoomConfig;
use rand::Rng;
use shared::Value;
use std::f64::consts::PI;

pub const MOON: &str = "moon";
pub const FOX: &str = "fox";
pub const SMALL_FIRE: &str = "smallFire";
pub const LARGE_FIRE: &str = "largeFire";
pub const LOGS: &str = "logs";
pub const STICKS: &str = "sticks";
pub const PLAYERS: &str = "players";
pub const LOG_DRAGS: &str = "logDrags";
pub const STICK_DRAGS: &str = "stickDrags";

pub const FIRE_VALUE: &str = "fireValue";
pub const FIRE_DECAY: &str = "fireDecay";
// Key spelling is part of the wire format.
pub const FIRE_THRESHOLD: &str = "fireTheshold";
pub const SHOWING_LARGE_FIRE: &str = "showingLargeFire";
pub const LOG_COOLDOWN: &str = "logCooldown";

const LOG_SEEDS: [(f64, f64, i32); 3] = [(580.0, 475.0, 0), (580.0, 500.0, 1), (600.0, 550.0, 2)];
const STICKS_X: f64 = 220.0;
const STICKS_Y: f64 = 390.0;

/// The three looks of a marshmallow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarshmallowTexture {
    Uncooked,
    Cooked,
    Burned,
}

impl MarshmallowTexture {
    pub fn as_str(self) -> &'static str {
        match self {
            MarshmallowTexture::Uncooked => "uncooked",
            MarshmallowTexture::Cooked => "cooked",
            MarshmallowTexture::Burned => "burned",
        }
    }
}

pub fn log_path(log_id: &str) -> String {
    format!("{}/{}", LOGS, log_id)
}

pub fn stick_path(stick_id: &str) -> String {
    format!("{}/{}", STICKS, stick_id)
}

pub fn marshmallow_path(stick_id: &str) -> String {
    format!("{}/{}/children/marshmallow", STICKS, stick_id)
}

pub fn player_path(player_id: &str) -> String {
    format!("{}/{}", PLAYERS, player_id)
}

/// Builds the root record a room starts from.
pub fn initial_state<R: Rng>(config: &RoomConfig, rng: &mut R) -> Value {
    let width = config.width;
    let height = config.height;

    Value::record([
        ("width", Value::from(width)),
        ("height", Value::from(height)),
        ("ready", Value::from(true)),
        (LOG_DRAGS, Value::empty()),
        (STICK_DRAGS, Value::empty()),
        (PLAYERS, Value::empty()),
        (MOON, moon(width)),
        (FOX, fox(config)),
        (FIRE_VALUE, Value::from(0.0)),
        (FIRE_DECAY, Value::from(config.fire_decay)),
        (FIRE_THRESHOLD, Value::from(config.fire_threshold)),
        (SHOWING_LARGE_FIRE, Value::from(false)),
        (SMALL_FIRE, fire(width, height, false)),
        (LARGE_FIRE, fire(width, height, true)),
        (LOG_COOLDOWN, Value::from(config.log_cooldown)),
        (LOGS, logs()),
        (STICKS, sticks(rng)),
    ])
}

fn moon(width: f64) -> Value {
    Value::record([
        ("width", Value::from(width / 10.0)),
        ("height", Value::from(width / 10.0)),
        ("x", Value::from(width * 0.1)),
        ("y", Value::from(width * 0.1)),
        ("rotation", Value::from(0.0)),
        ("anchor", Value::from("center")),
        ("reversed", Value::from(false)),
    ])
}

fn fox(config: &RoomConfig) -> Value {
    Value::record([
        ("x", Value::from(0.0)),
        ("y", Value::from(config.height * 0.81)),
        (
            "anchor",
            Value::record([("x", Value::from(0.92)), ("y", Value::from(0.258))]),
        ),
        ("scale", Value::from(0.4)),
        ("out", Value::from(true)),
        ("outX", Value::from(config.width * 0.15)),
        ("inX", Value::from(config.width * -0.05)),
        ("speed", Value::from(config.fox_speed)),
    ])
}

fn fire(width: f64, height: f64, hidden: bool) -> Value {
    Value::record([
        ("x", Value::from(width * 0.5)),
        ("y", Value::from(height * 0.95)),
        ("animationSpeed", Value::from(0.1)),
        ("anchor", Value::from("bottom")),
        ("scale", Value::from(1.0)),
        ("hidden", Value::from(hidden)),
    ])
}

fn logs() -> Value {
    Value::Record(
        LOG_SEEDS
            .iter()
            .enumerate()
            .map(|(index, &(x, y, variant))| {
                let id = index as i32 + 1;
                let log = Value::record([
                    ("id", Value::from(id)),
                    ("cooldown", Value::from(0.0)),
                    ("initialX", Value::from(x)),
                    ("initialY", Value::from(y)),
                    ("x", Value::from(x)),
                    ("y", Value::from(y)),
                    ("scale", Value::from(0.5)),
                    ("variant", Value::from(variant)),
                    ("hidden", Value::from(false)),
                ]);
                (id.to_string(), log)
            })
            .collect(),
    )
}

fn sticks<R: Rng>(rng: &mut R) -> Value {
    Value::Record(
        (1..=3)
            .map(|id: i32| {
                let x = STICKS_X + 10.0 + 20.0 * id as f64;
                let stick = Value::record([
                    ("id", Value::from(id)),
                    ("initialX", Value::from(x)),
                    ("initialY", Value::from(STICKS_Y)),
                    ("x", Value::from(x)),
                    ("y", Value::from(STICKS_Y)),
                    ("cookTime", Value::from(0.0)),
                    ("scale", Value::from(0.4)),
                    ("rotation", Value::from(stick_tilt(rng))),
                    ("marshmallowCooldown", Value::from(0.0)),
                    (
                        "children",
                        Value::record([
                            ("stick", Value::record([("rotation", Value::from(0.0))])),
                            (
                                "marshmallow",
                                Value::record([
                                    ("scale", Value::from(0.7)),
                                    ("texture", Value::from(MarshmallowTexture::Uncooked.as_str())),
                                    ("hidden", Value::from(false)),
                                ]),
                            ),
                        ]),
                    ),
                ]);
                (id.to_string(), stick)
            })
            .collect(),
    )
}

/// A small random lean so the sticks don't line up perfectly.
fn stick_tilt<R: Rng>(rng: &mut R) -> f64 {
    let sign = if rng.gen_bool(0.5) { -1.0 } else { 1.0 };
    rng.gen::<f64>() * PI * 0.03 * sign
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use shared::StateTree;

    fn tree() -> StateTree {
        let mut rng = StdRng::seed_from_u64(7);
        StateTree::new(initial_state(&RoomConfig::default(), &mut rng)).unwrap()
    }

    #[test]
    fn test_initial_entities() {
        let tree = tree();
        assert_eq!(tree.flag("ready"), Ok(true));
        assert_eq!(tree.keys(LOGS).unwrap(), vec!["1", "2", "3"]);
        assert_eq!(tree.keys(STICKS).unwrap(), vec!["1", "2", "3"]);
        assert!(tree.keys(PLAYERS).unwrap().is_empty());
        assert!(tree.keys(LOG_DRAGS).unwrap().is_empty());
        assert!(tree.keys(STICK_DRAGS).unwrap().is_empty());
    }

    #[test]
    fn test_fire_and_fox_layout() {
        let tree = tree();
        assert_eq!(tree.number("smallFire/x"), Ok(400.0));
        assert_eq!(tree.number("smallFire/y"), Ok(570.0));
        assert_eq!(tree.flag("smallFire/hidden"), Ok(false));
        assert_eq!(tree.flag("largeFire/hidden"), Ok(true));
        assert_eq!(tree.number(FIRE_THRESHOLD), Ok(200.0));
        assert_eq!(tree.number("fox/outX"), Ok(120.0));
        assert_eq!(tree.number("fox/inX"), Ok(-40.0));
        assert_eq!(tree.flag("fox/out"), Ok(true));
    }

    #[test]
    fn test_stick_layout() {
        let tree = tree();
        assert_eq!(tree.number("sticks/2/x"), Ok(270.0));
        assert_eq!(tree.number("sticks/2/initialY"), Ok(390.0));
        assert_eq!(tree.text("sticks/2/children/marshmallow/texture"), Ok("uncooked"));
        let tilt = tree.number("sticks/1/rotation").unwrap();
        assert!(tilt.abs() <= PI * 0.03);
    }

    #[test]
    fn test_log_layout() {
        let tree = tree();
        assert_eq!(tree.number("logs/3/initialX"), Ok(600.0));
        assert_eq!(tree.number("logs/3/variant"), Ok(2.0));
        assert_eq!(tree.number("logs/1/cooldown"), Ok(0.0));
        assert_eq!(tree.get("logs/1/id"), Some(&Value::from(1)));
    }
}
