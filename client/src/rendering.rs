use crate::proxy::Proxy;
use crate::scene::{CampScene, FOX, LARGE_FIRE, LOGS, MOON, PLAYERS, SMALL_FIRE, STICKS};
use macroquad::prelude::*;
use shared::{Vector2, WORLD_HEIGHT, WORLD_WIDTH};

/// Maps the fixed-size world onto the window, letterboxed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub scale: f64,
    pub offset: Vector2,
}

impl Viewport {
    pub fn fit(screen_width: f64, screen_height: f64) -> Self {
        let scale = (screen_width / WORLD_WIDTH).min(screen_height / WORLD_HEIGHT);
        let offset = Vector2::new(
            (screen_width - WORLD_WIDTH * scale) / 2.0,
            (screen_height - WORLD_HEIGHT * scale) / 2.0,
        );
        Self { scale, offset }
    }

    pub fn to_screen(&self, point: Vector2) -> Vector2 {
        Vector2::new(point.x * self.scale + self.offset.x, point.y * self.scale + self.offset.y)
    }

    pub fn to_world(&self, point: Vector2) -> Vector2 {
        Vector2::new(
            (point.x - self.offset.x) / self.scale,
            (point.y - self.offset.y) / self.scale,
        )
    }
}

fn marshmallow_color(texture: Option<&str>) -> Color {
    match texture {
        Some("cooked") => Color::from_rgba(222, 170, 90, 255),
        Some("burned") => Color::from_rgba(60, 36, 24, 255),
        _ => Color::from_rgba(250, 246, 236, 255),
    }
}

fn player_color(player_id: &str) -> Color {
    let hash = player_id.bytes().fold(0u32, |acc, byte| acc.wrapping_mul(31).wrapping_add(byte as u32));
    match hash % 6 {
        0 => RED,
        1 => BLUE,
        2 => YELLOW,
        3 => MAGENTA,
        4 => Color::from_rgba(0, 255, 255, 255),
        _ => Color::from_rgba(255, 136, 0, 255),
    }
}

pub struct Renderer {
    viewport: Viewport,
}

impl Renderer {
    pub fn new() -> Self {
        Self {
            viewport: Viewport::fit(WORLD_WIDTH, WORLD_HEIGHT),
        }
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Re-fits the world to the current window size.
    pub fn resize(&mut self) {
        self.viewport = Viewport::fit(screen_width() as f64, screen_height() as f64);
    }

    pub fn render_waiting(&mut self, status: &str) {
        self.resize();
        clear_background(Color::from_rgba(10, 12, 30, 255));
        draw_text(status, 20.0, 30.0, 24.0, WHITE);
    }

    pub fn render(&mut self, scene: &CampScene) {
        self.resize();
        clear_background(Color::from_rgba(10, 12, 30, 255));
        self.draw_ground();

        let proxies = scene.reconciler().scene();
        if let Some(moon) = proxies.entity(MOON) {
            self.draw_moon(moon);
        }
        if let Some(fox) = proxies.entity(FOX) {
            self.draw_box(fox, Color::from_rgba(214, 98, 32, 255));
        }
        for fire in [SMALL_FIRE, LARGE_FIRE] {
            if let Some(fire) = proxies.entity(fire) {
                self.draw_fire(fire);
            }
        }
        for (_, log) in proxies.members(LOGS) {
            self.draw_box(log, Color::from_rgba(110, 72, 40, 255));
        }
        for (_, stick) in proxies.members(STICKS) {
            self.draw_stick(stick);
        }
        for (player_id, cursor) in proxies.members(PLAYERS) {
            self.draw_cursor(cursor, player_id == scene.player_id(), player_color(player_id));
        }

        let players = proxies.members(PLAYERS).count();
        draw_text(&format!("{} online", players), 10.0, 20.0, 18.0, WHITE);
    }

    fn draw_ground(&self) {
        let top = self.viewport.to_screen(Vector2::new(0.0, WORLD_HEIGHT * 0.85));
        let bottom = self.viewport.to_screen(Vector2::new(WORLD_WIDTH, WORLD_HEIGHT));
        draw_rectangle(
            top.x as f32,
            top.y as f32,
            (bottom.x - top.x) as f32,
            (bottom.y - top.y) as f32,
            Color::from_rgba(24, 40, 24, 255),
        );
    }

    fn draw_moon(&self, moon: &Proxy) {
        if !moon.visible {
            return;
        }
        let (min, max) = moon.bounds();
        let center = self.viewport.to_screen(Vector2::new((min.x + max.x) / 2.0, (min.y + max.y) / 2.0));
        let radius = (max.x - min.x) / 2.0 * self.viewport.scale;
        draw_circle(center.x as f32, center.y as f32, radius as f32, Color::from_rgba(240, 240, 210, 255));
    }

    fn draw_box(&self, proxy: &Proxy, color: Color) {
        if !proxy.visible {
            return;
        }
        let (min, max) = proxy.bounds();
        let min = self.viewport.to_screen(min);
        let max = self.viewport.to_screen(max);
        draw_rectangle(min.x as f32, min.y as f32, (max.x - min.x) as f32, (max.y - min.y) as f32, color);
    }

    fn draw_fire(&self, fire: &Proxy) {
        if !fire.visible {
            return;
        }
        let (min, max) = fire.bounds();
        let flicker = (get_time() * fire.animation_speed * 60.0).sin() * 0.05 + 1.0;
        let tip = Vector2::new((min.x + max.x) / 2.0, max.y - (max.y - min.y) * flicker);
        let tip = self.viewport.to_screen(tip);
        let left = self.viewport.to_screen(Vector2::new(min.x, max.y));
        let right = self.viewport.to_screen(Vector2::new(max.x, max.y));
        draw_triangle(
            vec2(left.x as f32, left.y as f32),
            vec2(right.x as f32, right.y as f32),
            vec2(tip.x as f32, tip.y as f32),
            Color::from_rgba(255, 140, 20, 230),
        );
    }

    fn draw_stick(&self, stick: &Proxy) {
        if !stick.visible {
            return;
        }
        let (min, max) = stick.bounds();
        let (sin, cos) = stick.rotation.sin_cos();
        let rotate = |point: Vector2| {
            let local = point - stick.position;
            stick.position + Vector2::new(local.x * cos - local.y * sin, local.x * sin + local.y * cos)
        };

        let mid_y = (min.y + max.y) / 2.0;
        let handle = self.viewport.to_screen(rotate(Vector2::new(max.x, mid_y)));
        let tip = self.viewport.to_screen(rotate(Vector2::new(min.x, mid_y)));
        draw_line(
            handle.x as f32,
            handle.y as f32,
            tip.x as f32,
            tip.y as f32,
            (4.0 * self.viewport.scale) as f32,
            Color::from_rgba(150, 110, 70, 255),
        );

        let Some(marshmallow) = stick.children.get("marshmallow") else {
            return;
        };
        if !marshmallow.visible {
            return;
        }
        let offset = Vector2::new(marshmallow.position.x * stick.scale.x, marshmallow.position.y * stick.scale.y);
        let center = self.viewport.to_screen(rotate(Vector2::new(min.x, mid_y) + offset));
        let radius = marshmallow.size.x * marshmallow.scale.x * stick.scale.x / 2.0 * self.viewport.scale;
        draw_circle(
            center.x as f32,
            center.y as f32,
            radius as f32,
            marshmallow_color(marshmallow.texture.as_deref()),
        );
    }

    fn draw_cursor(&self, cursor: &Proxy, is_local: bool, color: Color) {
        let center = self.viewport.to_screen(cursor.position);
        let radius = if is_local { 7.0 } else { 5.0 };
        draw_circle(center.x as f32, center.y as f32, radius, color);
        if is_local {
            draw_circle_lines(center.x as f32, center.y as f32, radius + 2.0, 2.0, GREEN);
        }
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}
