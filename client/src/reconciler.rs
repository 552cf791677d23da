//! Keeps a client's view of the room in step with the server.
//!
//! The reconciler holds a mirror of the server's state tree and a
//! [`Scene`] of proxies. Every incoming change is first applied to the
//! mirror and then dispatched through a path subscription registry, whose
//! listeners route it to the proxy it concerns.
//!
//! Syncing an entity or a collection renders from the mirror's current
//! contents and registers the listeners in the same call. Since the mirror
//! only moves when [`ClientReconciler::apply`] runs, no change can fall
//! between the snapshot and the subscription.

use crate::proxy::{Proxy, ProxyKind};
use log::debug;
use shared::{path, Change, Operation, StateError, StateTree, SubscriptionRegistry, Value};
use std::collections::BTreeMap;

/// Builds a proxy for a model. Receives the model's id (or the entity's
/// own path for single entities) and its current record.
pub type RenderFn = fn(&str, &Value) -> Proxy;

/// Every proxy a client draws.
#[derive(Debug, Default)]
pub struct Scene {
    ready: bool,
    entities: BTreeMap<String, Proxy>,
    collections: BTreeMap<String, BTreeMap<String, Proxy>>,
}

impl Scene {
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// A proxy synced with [`ClientReconciler::sync_entity`].
    pub fn entity(&self, path: &str) -> Option<&Proxy> {
        self.entities.get(path)
    }

    /// A member of a synced collection.
    pub fn member(&self, collection: &str, id: &str) -> Option<&Proxy> {
        self.collections.get(collection)?.get(id)
    }

    /// Live members of a synced collection, in id order.
    pub fn members(&self, collection: &str) -> impl Iterator<Item = (&str, &Proxy)> {
        self.collections
            .get(collection)
            .into_iter()
            .flat_map(|members| members.iter().map(|(id, proxy)| (id.as_str(), proxy)))
    }

    fn entity_mut(&mut self, path: &str) -> Option<&mut Proxy> {
        self.entities.get_mut(path)
    }

    fn member_mut(&mut self, collection: &str, id: &str) -> Option<&mut Proxy> {
        self.collections.get_mut(collection)?.get_mut(id)
    }

    fn add_member(&mut self, collection: &str, id: &str, proxy: Proxy) {
        self.collections
            .entry(collection.to_owned())
            .or_default()
            .insert(id.to_owned(), proxy);
    }

    fn remove_member(&mut self, collection: &str, id: &str) -> Option<Proxy> {
        self.collections.get_mut(collection)?.remove(id)
    }
}

/// Routes a `:key` attribute change to a proxy.
fn update_attribute(proxy: Option<&mut Proxy>, key: Option<&str>, value: Option<&Value>) {
    if let (Some(proxy), Some(key), Some(value)) = (proxy, key, value) {
        proxy.update_attribute(key, value);
    }
}

pub struct ClientReconciler {
    mirror: StateTree,
    registry: SubscriptionRegistry<Scene>,
    scene: Scene,
}

impl ClientReconciler {
    /// Starts from the full snapshot received on join.
    pub fn new(snapshot: Value) -> Result<Self, StateError> {
        let mirror = StateTree::new(snapshot)?;
        let scene = Scene {
            ready: mirror.flag("ready").unwrap_or(false),
            ..Scene::default()
        };

        let mut registry = SubscriptionRegistry::new();
        registry.listen("ready", |scene: &mut Scene, event| {
            scene.ready = event.value.and_then(Value::as_bool).unwrap_or(false);
        })?;

        Ok(Self {
            mirror,
            registry,
            scene,
        })
    }

    pub fn is_ready(&self) -> bool {
        self.scene.ready
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn mirror(&self) -> &StateTree {
        &self.mirror
    }

    /// Applies one change from the server. Returns how many listeners it
    /// reached.
    ///
    /// A change that lands under a member removed earlier in the same patch
    /// stream is stale: it is dropped and reaches no listener.
    pub fn apply(&mut self, change: &Change) -> Result<usize, StateError> {
        match self.mirror.apply_change(change) {
            Ok(()) => Ok(self.registry.dispatch(&mut self.scene, change)),
            Err(StateError::MissingPath(missing)) => {
                debug!("Dropping stale change to {}: {} is gone", change.path, missing);
                Ok(0)
            }
            Err(e) => Err(e),
        }
    }

    /// Renders a single entity from the mirror and keeps it synced.
    pub fn sync_entity(&mut self, entity: &str, render: RenderFn) -> Result<(), StateError> {
        let model = self
            .mirror
            .get(entity)
            .ok_or_else(|| StateError::MissingPath(entity.to_owned()))?;
        let proxy = render(entity, model);
        let is_group = proxy.kind == ProxyKind::Group;
        self.scene.entities.insert(entity.to_owned(), proxy);

        let path = entity.to_owned();
        self.registry
            .listen(&format!("{}/:key", entity), move |scene: &mut Scene, event| {
                update_attribute(scene.entity_mut(&path), event.path.get("key"), event.value);
            })?;

        if is_group {
            let path = entity.to_owned();
            self.registry.listen(
                &format!("{}/children/:childId/:key", entity),
                move |scene: &mut Scene, event| {
                    let child = match event.path.get("childId") {
                        Some(child_id) => scene
                            .entity_mut(&path)
                            .and_then(|proxy| proxy.children.get_mut(child_id)),
                        None => None,
                    };
                    update_attribute(child, event.path.get("key"), event.value);
                },
            )?;
        }
        Ok(())
    }

    /// Renders every current member of a collection and keeps the set of
    /// proxies in step with later additions, removals and attribute changes.
    pub fn sync_collection(&mut self, collection: &str, render: RenderFn) -> Result<(), StateError> {
        for (id, model) in self.mirror.members(collection)? {
            self.scene.add_member(collection, &id, render(&id, &model));
        }

        let name = collection.to_owned();
        self.registry.listen(
            &path::join(&[collection, ":modelId"]),
            move |scene: &mut Scene, event| {
                let Some(id) = event.path.get("modelId") else {
                    return;
                };
                match (event.operation, event.value) {
                    (Operation::Add, Some(model)) | (Operation::Set, Some(model)) => {
                        scene.add_member(&name, id, render(id, model));
                    }
                    (Operation::Remove, _) => {
                        if scene.remove_member(&name, id).is_none() {
                            debug!("No proxy to remove for {}/{}", name, id);
                        }
                    }
                    _ => {}
                }
            },
        )?;

        let name = collection.to_owned();
        self.registry.listen(
            &path::join(&[collection, ":modelId", ":key"]),
            move |scene: &mut Scene, event| {
                let proxy = match event.path.get("modelId") {
                    Some(id) => scene.member_mut(&name, id),
                    None => None,
                };
                update_attribute(proxy, event.path.get("key"), event.value);
            },
        )?;

        let name = collection.to_owned();
        self.registry.listen(
            &path::join(&[collection, ":modelId", "children", ":childId", ":key"]),
            move |scene: &mut Scene, event| {
                let child = match (event.path.get("modelId"), event.path.get("childId")) {
                    (Some(id), Some(child_id)) => scene
                        .member_mut(&name, id)
                        .and_then(|proxy| proxy.children.get_mut(child_id)),
                    _ => None,
                };
                update_attribute(child, event.path.get("key"), event.value);
            },
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Vector2;

    fn render_sprite(_id: &str, model: &Value) -> Proxy {
        let mut proxy = Proxy::sprite("sprite", Vector2::new(10.0, 10.0));
        proxy.update_state(model);
        proxy
    }

    fn render_stick(_id: &str, model: &Value) -> Proxy {
        let mut proxy = Proxy::group([
            ("stick".to_string(), Proxy::sprite("stick", Vector2::default())),
            (
                "marshmallow".to_string(),
                Proxy::sprite("marshmallow", Vector2::default())
                    .with_textures([("uncooked", "m1"), ("cooked", "m2")]),
            ),
        ]);
        proxy.update_state(model);
        proxy
    }

    fn log(x: f64) -> Value {
        Value::record([("id", Value::from(1)), ("x", Value::from(x)), ("hidden", Value::from(false))])
    }

    fn snapshot() -> Value {
        Value::record([
            ("ready", Value::from(true)),
            ("moon", Value::record([("x", Value::from(80.0)), ("rotation", Value::from(0.0))])),
            ("logs", Value::record([("1", log(580.0))])),
            (
                "sticks",
                Value::record([(
                    "1",
                    Value::record([
                        ("x", Value::from(250.0)),
                        (
                            "children",
                            Value::record([
                                ("stick", Value::record([("rotation", Value::from(0.0))])),
                                ("marshmallow", Value::record([("texture", Value::from("uncooked"))])),
                            ]),
                        ),
                    ]),
                )]),
            ),
        ])
    }

    #[test]
    fn test_entity_follows_attribute_changes() {
        let mut reconciler = ClientReconciler::new(snapshot()).unwrap();
        reconciler.sync_entity("moon", render_sprite).unwrap();

        let reached = reconciler.apply(&Change::set("moon/x", Value::from(81.0))).unwrap();

        assert_eq!(reached, 1);
        let moon = reconciler.scene().entity("moon").unwrap();
        assert_eq!(moon.position.x, 81.0);
        assert_eq!(Some(&moon.state()), reconciler.mirror().get("moon"));
    }

    #[test]
    fn test_collection_backfill_and_lifecycle() {
        let mut reconciler = ClientReconciler::new(snapshot()).unwrap();
        reconciler.sync_collection("logs", render_sprite).unwrap();
        assert_eq!(reconciler.scene().members("logs").count(), 1);

        reconciler.apply(&Change::add("logs/2", log(600.0))).unwrap();
        assert_eq!(reconciler.scene().member("logs", "2").unwrap().position.x, 600.0);

        reconciler.apply(&Change::remove("logs/1")).unwrap();
        assert!(reconciler.scene().member("logs", "1").is_none());
        assert_eq!(reconciler.scene().members("logs").count(), 1);
    }

    #[test]
    fn test_add_over_existing_id_replaces_proxy() {
        let mut reconciler = ClientReconciler::new(snapshot()).unwrap();
        reconciler.sync_collection("logs", render_sprite).unwrap();

        reconciler.apply(&Change::add("logs/1", log(10.0))).unwrap();

        assert_eq!(reconciler.scene().members("logs").count(), 1);
        assert_eq!(reconciler.scene().member("logs", "1").unwrap().position.x, 10.0);
    }

    #[test]
    fn test_events_for_removed_members_are_dropped() {
        let mut reconciler = ClientReconciler::new(snapshot()).unwrap();
        reconciler.sync_collection("logs", render_sprite).unwrap();
        reconciler.apply(&Change::remove("logs/1")).unwrap();

        // The mirror no longer has the parent record either.
        assert_eq!(reconciler.apply(&Change::set("logs/1/x", Value::from(5.0))), Ok(0));
        assert!(reconciler.mirror().get("logs/1").is_none());
        assert_eq!(
            reconciler.apply(&Change::set("sticks/9/children/marshmallow/hidden", Value::from(true))),
            Ok(0)
        );

        reconciler.apply(&Change::add("logs/1", log(1.0))).unwrap();
        reconciler.apply(&Change::remove("logs/1")).unwrap();
        reconciler.apply(&Change::remove("logs/1")).unwrap();
        assert!(reconciler.scene().member("logs", "1").is_none());
    }

    #[test]
    fn test_group_children_are_routed() {
        let mut reconciler = ClientReconciler::new(snapshot()).unwrap();
        reconciler.sync_collection("sticks", render_stick).unwrap();

        reconciler
            .apply(&Change::set(
                "sticks/1/children/marshmallow/texture",
                Value::from("cooked"),
            ))
            .unwrap();

        let stick = reconciler.scene().member("sticks", "1").unwrap();
        assert_eq!(stick.children["marshmallow"].texture.as_deref(), Some("cooked"));
        assert_eq!(Some(&stick.state()), reconciler.mirror().get("sticks/1"));
    }

    #[test]
    fn test_ready_gate() {
        let snapshot = Value::record([("ready", Value::from(false))]);
        let mut reconciler = ClientReconciler::new(snapshot).unwrap();
        assert!(!reconciler.is_ready());

        reconciler.apply(&Change::set("ready", Value::from(true))).unwrap();
        assert!(reconciler.is_ready());
    }

    #[test]
    fn test_sync_missing_entity_fails() {
        let mut reconciler = ClientReconciler::new(snapshot()).unwrap();
        assert_eq!(
            reconciler.sync_entity("fox", render_sprite),
            Err(StateError::MissingPath("fox".to_string()))
        );
    }
}
