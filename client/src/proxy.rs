//! Renderable stand-ins for synced state entities.
//!
//! A [`Proxy`] carries two things: the fields the renderer draws from
//! (position, scale, anchor, visibility, texture and so on) and a mirror of
//! the raw attributes it has received. Attribute updates go through a
//! per-kind dispatch table that maps an attribute name to a typed mutation
//! of the render fields. Attributes without a handler are only mirrored.

use log::debug;
use shared::{read_point, Value, Vector2};
use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyKind {
    Sprite,
    Animated,
    Group,
}

type AttributeHandler = fn(&mut Proxy, &Value);
type HandlerTable = HashMap<&'static str, AttributeHandler>;

/// Resolves a named anchor such as `"bottom"` or `"top left"`.
pub fn direction_anchor(name: &str) -> Option<Vector2> {
    let anchor = match name {
        "top left" => (0.0, 0.0),
        "top" => (0.5, 0.0),
        "top right" => (1.0, 0.0),
        "right" => (1.0, 0.5),
        "bottom right" => (1.0, 1.0),
        "bottom" => (0.5, 1.0),
        "bottom left" => (0.0, 1.0),
        "left" => (0.0, 0.5),
        "center" => (0.5, 0.5),
        _ => return None,
    };
    Some(Vector2::new(anchor.0, anchor.1))
}

fn sprite_handlers() -> HandlerTable {
    let mut table: HandlerTable = HashMap::new();
    table.insert("id", |proxy, value| proxy.model_id = value.to_key());
    table.insert("x", |proxy, value| {
        if let Some(x) = value.as_f64() {
            proxy.position.x = x;
        }
    });
    table.insert("y", |proxy, value| {
        if let Some(y) = value.as_f64() {
            proxy.position.y = y;
        }
    });
    table.insert("width", |proxy, value| {
        if let Some(width) = value.as_f64() {
            proxy.size.x = width;
        }
    });
    table.insert("height", |proxy, value| {
        if let Some(height) = value.as_f64() {
            proxy.size.y = height;
        }
    });
    table.insert("rotation", |proxy, value| {
        if let Some(rotation) = value.as_f64() {
            proxy.rotation = rotation;
        }
    });
    table.insert("scale", |proxy, value| match value {
        Value::Number(scale) => proxy.scale = Vector2::new(*scale, *scale),
        other => {
            if let Some(scale) = read_point(other) {
                proxy.scale = scale;
            }
        }
    });
    table.insert("hidden", |proxy, value| {
        if let Some(hidden) = value.as_bool() {
            proxy.visible = !hidden;
        }
    });
    table.insert("visible", |proxy, value| {
        if let Some(visible) = value.as_bool() {
            proxy.visible = visible;
        }
    });
    table.insert("anchor", |proxy, value| {
        let anchor = match value {
            Value::Str(name) => direction_anchor(name),
            other => read_point(other),
        };
        match anchor {
            Some(anchor) => proxy.anchor = anchor,
            None => debug!("Ignoring invalid anchor {}", value),
        }
    });
    table.insert("texture", |proxy, value| {
        if let Some(name) = value.as_str() {
            proxy.set_texture(name);
        }
    });
    table
}

fn animated_handlers() -> HandlerTable {
    let mut table = sprite_handlers();
    table.insert("animationSpeed", |proxy, value| {
        if let Some(speed) = value.as_f64() {
            proxy.animation_speed = speed;
        }
    });
    table
}

fn group_handlers() -> HandlerTable {
    let mut table = sprite_handlers();
    table.insert("children", |proxy, value| {
        let Some(children) = value.as_record() else {
            return;
        };
        for (child_id, state) in children {
            if let Some(child) = proxy.children.get_mut(child_id) {
                child.update_state(state);
            }
        }
    });
    table
}

fn handlers(kind: ProxyKind) -> &'static HandlerTable {
    static SPRITE: OnceLock<HandlerTable> = OnceLock::new();
    static ANIMATED: OnceLock<HandlerTable> = OnceLock::new();
    static GROUP: OnceLock<HandlerTable> = OnceLock::new();

    match kind {
        ProxyKind::Sprite => SPRITE.get_or_init(sprite_handlers),
        ProxyKind::Animated => ANIMATED.get_or_init(animated_handlers),
        ProxyKind::Group => GROUP.get_or_init(group_handlers),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Proxy {
    pub kind: ProxyKind,
    /// Asset the proxy is drawn from.
    pub source: String,
    /// Collection id of the model, once an `id` attribute arrived.
    pub model_id: Option<String>,
    pub position: Vector2,
    pub rotation: f64,
    pub scale: Vector2,
    pub anchor: Vector2,
    /// Unscaled size in world pixels.
    pub size: Vector2,
    pub visible: bool,
    /// Name of the current texture, if one was selected from the map.
    pub texture: Option<String>,
    pub animation_speed: f64,
    pub children: BTreeMap<String, Proxy>,
    textures: BTreeMap<String, String>,
    attributes: BTreeMap<String, Value>,
}

impl Proxy {
    fn new(kind: ProxyKind, source: &str, size: Vector2) -> Self {
        Self {
            kind,
            source: source.to_owned(),
            model_id: None,
            position: Vector2::default(),
            rotation: 0.0,
            scale: Vector2::new(1.0, 1.0),
            anchor: Vector2::default(),
            size,
            visible: true,
            texture: None,
            animation_speed: 0.0,
            children: BTreeMap::new(),
            textures: BTreeMap::new(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn sprite(source: &str, size: Vector2) -> Self {
        Self::new(ProxyKind::Sprite, source, size)
    }

    pub fn animated(source: &str, size: Vector2) -> Self {
        Self::new(ProxyKind::Animated, source, size)
    }

    pub fn group<I>(children: I) -> Self
    where
        I: IntoIterator<Item = (String, Proxy)>,
    {
        let mut proxy = Self::new(ProxyKind::Group, "group", Vector2::default());
        proxy.children = children.into_iter().collect();
        proxy
    }

    /// Registers the textures a `texture` attribute may select, keyed by name.
    pub fn with_textures<'a, I>(mut self, textures: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        self.textures = textures
            .into_iter()
            .map(|(name, source)| (name.to_owned(), source.to_owned()))
            .collect();
        self
    }

    /// Applies one synced attribute and records it in the attribute mirror.
    pub fn update_attribute(&mut self, key: &str, value: &Value) {
        self.attributes.insert(key.to_owned(), value.clone());
        self.apply(key, value);
    }

    /// Applies every field of a synced record.
    pub fn update_state(&mut self, state: &Value) {
        if let Some(fields) = state.as_record() {
            for (key, value) in fields {
                self.update_attribute(key, value);
            }
        }
    }

    /// Changes how the proxy is drawn without touching the attribute
    /// mirror, for presentation details the server doesn't track.
    pub fn set_render(&mut self, key: &str, value: &Value) {
        self.apply(key, value);
    }

    fn apply(&mut self, key: &str, value: &Value) {
        if let Some(handler) = handlers(self.kind).get(key) {
            handler(self, value);
        }
    }

    fn set_texture(&mut self, name: &str) {
        if self.textures.contains_key(name) {
            self.texture = Some(name.to_owned());
        } else {
            debug!("{} has no texture named {}", self.source, name);
        }
    }

    /// Asset behind the current texture, falling back to the proxy's own.
    pub fn texture_source(&self) -> &str {
        self.texture
            .as_ref()
            .and_then(|name| self.textures.get(name))
            .map(String::as_str)
            .unwrap_or(self.source.as_str())
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Rebuilds the record this proxy has been synced to.
    pub fn state(&self) -> Value {
        let mut fields = self.attributes.clone();
        if self.kind == ProxyKind::Group {
            let children = self
                .children
                .iter()
                .map(|(id, child)| (id.clone(), child.state()))
                .collect();
            fields.insert("children".to_string(), Value::Record(children));
        }
        Value::Record(fields)
    }

    /// Top-left and bottom-right corners of the drawn area.
    pub fn bounds(&self) -> (Vector2, Vector2) {
        let size = Vector2::new(self.size.x * self.scale.x, self.size.y * self.scale.y);
        let min = Vector2::new(
            self.position.x - size.x * self.anchor.x,
            self.position.y - size.y * self.anchor.y,
        );
        (min, min + size)
    }

    pub fn contains(&self, point: Vector2) -> bool {
        let (min, max) = self.bounds();
        point.x >= min.x && point.x <= max.x && point.y >= min.y && point.y <= max.y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marshmallow() -> Proxy {
        Proxy::sprite("marshmallow", Vector2::new(20.0, 20.0)).with_textures([
            ("uncooked", "marsh_1"),
            ("cooked", "marsh_2"),
            ("burned", "marsh_3"),
        ])
    }

    #[test]
    fn test_position_and_visibility_handlers() {
        let mut proxy = Proxy::sprite("log_a", Vector2::new(100.0, 40.0));
        proxy.update_attribute("x", &Value::from(580.0));
        proxy.update_attribute("y", &Value::from(475.0));
        proxy.update_attribute("hidden", &Value::from(true));

        assert_eq!(proxy.position, Vector2::new(580.0, 475.0));
        assert!(!proxy.visible);

        proxy.update_attribute("visible", &Value::from(true));
        assert!(proxy.visible);
    }

    #[test]
    fn test_scale_accepts_number_or_point() {
        let mut proxy = Proxy::sprite("fox", Vector2::default());
        proxy.update_attribute("scale", &Value::from(0.4));
        assert_eq!(proxy.scale, Vector2::new(0.4, 0.4));

        proxy.update_attribute(
            "scale",
            &Value::record([("x", Value::from(1.0)), ("y", Value::from(2.0))]),
        );
        assert_eq!(proxy.scale, Vector2::new(1.0, 2.0));
    }

    #[test]
    fn test_anchor_by_name_or_point() {
        let mut proxy = Proxy::sprite("fire", Vector2::default());
        proxy.update_attribute("anchor", &Value::from("bottom"));
        assert_eq!(proxy.anchor, Vector2::new(0.5, 1.0));

        proxy.update_attribute(
            "anchor",
            &Value::record([("x", Value::from(0.92)), ("y", Value::from(0.258))]),
        );
        assert_eq!(proxy.anchor, Vector2::new(0.92, 0.258));

        proxy.update_attribute("anchor", &Value::from("sideways"));
        assert_eq!(proxy.anchor, Vector2::new(0.92, 0.258));
    }

    #[test]
    fn test_texture_lookup() {
        let mut proxy = marshmallow();
        assert_eq!(proxy.texture_source(), "marshmallow");

        proxy.update_attribute("texture", &Value::from("cooked"));
        assert_eq!(proxy.texture.as_deref(), Some("cooked"));
        assert_eq!(proxy.texture_source(), "marsh_2");

        proxy.update_attribute("texture", &Value::from("charcoal"));
        assert_eq!(proxy.texture.as_deref(), Some("cooked"));
    }

    #[test]
    fn test_animation_speed_only_on_animated() {
        let mut sprite = Proxy::sprite("fire", Vector2::default());
        let mut animated = Proxy::animated("fire", Vector2::default());
        sprite.update_attribute("animationSpeed", &Value::from(0.1));
        animated.update_attribute("animationSpeed", &Value::from(0.1));

        assert_eq!(sprite.animation_speed, 0.0);
        assert_eq!(animated.animation_speed, 0.1);
        // Unhandled attributes are still mirrored.
        assert_eq!(sprite.attribute("animationSpeed"), Some(&Value::from(0.1)));
    }

    #[test]
    fn test_group_forwards_children() {
        let mut stick = Proxy::group([
            ("stick".to_string(), Proxy::sprite("stick_a", Vector2::default())),
            ("marshmallow".to_string(), marshmallow()),
        ]);
        stick.update_attribute(
            "children",
            &Value::record([(
                "marshmallow",
                Value::record([("texture", Value::from("burned")), ("hidden", Value::from(true))]),
            )]),
        );

        let marshmallow = &stick.children["marshmallow"];
        assert_eq!(marshmallow.texture.as_deref(), Some("burned"));
        assert!(!marshmallow.visible);
    }

    #[test]
    fn test_render_overrides_stay_out_of_state() {
        let mut proxy = marshmallow();
        proxy.set_render("x", &Value::from(13.0));
        proxy.update_state(&Value::record([("scale", Value::from(0.7))]));

        assert_eq!(proxy.position.x, 13.0);
        assert_eq!(proxy.state(), Value::record([("scale", Value::from(0.7))]));
    }

    #[test]
    fn test_group_state_includes_children() {
        let mut stick = Proxy::group([("stick".to_string(), Proxy::sprite("stick_a", Vector2::default()))]);
        stick.update_attribute("id", &Value::from(2));
        stick.children.get_mut("stick").unwrap().update_attribute("rotation", &Value::from(0.0));

        assert_eq!(stick.model_id.as_deref(), Some("2"));
        assert_eq!(
            stick.state(),
            Value::record([
                ("id", Value::from(2)),
                (
                    "children",
                    Value::record([("stick", Value::record([("rotation", Value::from(0.0))]))]),
                ),
            ])
        );
    }

    #[test]
    fn test_bounds_follow_anchor_and_scale() {
        let mut proxy = Proxy::sprite("log_a", Vector2::new(100.0, 40.0));
        proxy.update_state(&Value::record([
            ("x", Value::from(200.0)),
            ("y", Value::from(100.0)),
            ("scale", Value::from(0.5)),
            ("anchor", Value::from("center")),
        ]));

        assert_eq!(
            proxy.bounds(),
            (Vector2::new(175.0, 90.0), Vector2::new(225.0, 110.0))
        );
        assert!(proxy.contains(Vector2::new(180.0, 95.0)));
        assert!(!proxy.contains(Vector2::new(170.0, 95.0)));
    }
}
