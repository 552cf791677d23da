//! The campfire scene: which state entities are drawn, and as what.

use crate::proxy::Proxy;
use crate::reconciler::ClientReconciler;
use log::info;
use shared::{Change, StateError, Value, Vector2};

pub const MOON: &str = "moon";
pub const FOX: &str = "fox";
pub const SMALL_FIRE: &str = "smallFire";
pub const LARGE_FIRE: &str = "largeFire";
pub const LOGS: &str = "logs";
pub const STICKS: &str = "sticks";
pub const PLAYERS: &str = "players";

const LOG_SOURCES: [&str; 3] = ["log_a", "log_b", "log_c"];

/// Something a player can pick up.
#[derive(Debug, Clone, PartialEq)]
pub enum Draggable {
    Log { id: String, position: Vector2 },
    Stick { id: String, position: Vector2 },
}

fn render_moon(_: &str, model: &Value) -> Proxy {
    let mut proxy = Proxy::sprite("moon", Vector2::new(80.0, 80.0));
    proxy.update_state(model);
    proxy
}

fn render_fox(_: &str, model: &Value) -> Proxy {
    let mut proxy = Proxy::sprite("fox", Vector2::new(300.0, 180.0));
    proxy.update_state(model);
    proxy
}

fn render_small_fire(_: &str, model: &Value) -> Proxy {
    let mut proxy = Proxy::animated("small_fire", Vector2::new(90.0, 120.0));
    proxy.update_state(model);
    proxy
}

fn render_large_fire(_: &str, model: &Value) -> Proxy {
    let mut proxy = Proxy::animated("large_fire", Vector2::new(160.0, 220.0));
    proxy.update_state(model);
    proxy
}

fn render_log(_: &str, model: &Value) -> Proxy {
    let variant = model
        .get("variant")
        .and_then(Value::as_f64)
        .map(|variant| variant as usize)
        .filter(|variant| *variant < LOG_SOURCES.len())
        .unwrap_or(0);
    let mut proxy = Proxy::sprite(LOG_SOURCES[variant], Vector2::new(160.0, 60.0));
    proxy.set_render("anchor", &Value::from("center"));
    proxy.update_state(model);
    proxy
}

fn render_stick(_: &str, model: &Value) -> Proxy {
    let stick = Proxy::sprite("stick", Vector2::new(300.0, 40.0));

    let mut marshmallow = Proxy::sprite("marshmallow", Vector2::new(50.0, 50.0)).with_textures([
        ("uncooked", "marshmallow_uncooked"),
        ("cooked", "marshmallow_cooked"),
        ("burned", "marshmallow_burned"),
    ]);
    marshmallow.set_render("x", &Value::from(13.0));
    marshmallow.set_render("y", &Value::from(-5.0));
    marshmallow.set_render("anchor", &Value::from("center"));

    let mut proxy = Proxy::group([
        ("stick".to_string(), stick),
        ("marshmallow".to_string(), marshmallow),
    ]);
    proxy.size = Vector2::new(300.0, 40.0);
    proxy.set_render("anchor", &Value::from("center"));
    proxy.update_state(model);
    proxy
}

fn render_cursor(_: &str, model: &Value) -> Proxy {
    let mut proxy = Proxy::sprite("cursor", Vector2::new(12.0, 12.0));
    proxy.set_render("anchor", &Value::from("center"));
    proxy.update_state(model);
    proxy
}

/// A client's scene. Nothing is mounted until the room reports `ready`.
pub struct CampScene {
    player_id: String,
    reconciler: ClientReconciler,
    mounted: bool,
}

impl CampScene {
    pub fn new(player_id: &str, snapshot: Value) -> Result<Self, StateError> {
        let mut scene = Self {
            player_id: player_id.to_owned(),
            reconciler: ClientReconciler::new(snapshot)?,
            mounted: false,
        };
        scene.mount_when_ready()?;
        Ok(scene)
    }

    pub fn player_id(&self) -> &str {
        &self.player_id
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn reconciler(&self) -> &ClientReconciler {
        &self.reconciler
    }

    pub fn apply(&mut self, change: &Change) -> Result<(), StateError> {
        self.reconciler.apply(change)?;
        self.mount_when_ready()
    }

    fn mount_when_ready(&mut self) -> Result<(), StateError> {
        if self.mounted || !self.reconciler.is_ready() {
            return Ok(());
        }

        self.reconciler.sync_entity(MOON, render_moon)?;
        self.reconciler.sync_entity(FOX, render_fox)?;
        self.reconciler.sync_entity(SMALL_FIRE, render_small_fire)?;
        self.reconciler.sync_entity(LARGE_FIRE, render_large_fire)?;
        self.reconciler.sync_collection(LOGS, render_log)?;
        self.reconciler.sync_collection(STICKS, render_stick)?;
        self.reconciler.sync_collection(PLAYERS, render_cursor)?;
        self.mounted = true;
        info!("Scene mounted for {}", self.player_id);
        Ok(())
    }

    /// The topmost visible log or stick under a point. Sticks are drawn
    /// above logs.
    pub fn hit_test(&self, point: Vector2) -> Option<Draggable> {
        let scene = self.reconciler.scene();

        let stick = scene
            .members(STICKS)
            .filter(|(_, proxy)| proxy.visible && proxy.contains(point))
            .last()
            .map(|(id, proxy)| Draggable::Stick {
                id: id.to_owned(),
                position: proxy.position,
            });
        if stick.is_some() {
            return stick;
        }

        scene
            .members(LOGS)
            .filter(|(_, proxy)| proxy.visible && proxy.contains(point))
            .last()
            .map(|(id, proxy)| Draggable::Log {
                id: id.to_owned(),
                position: proxy.position,
            })
    }
}
