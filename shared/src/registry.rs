//! Pattern-based change listeners.
//!
//! The registry is generic over a context type `C` that the owner passes to
//! [`SubscriptionRegistry::dispatch`]. Listeners mutate that context (a
//! client scene, a room's statistics) instead of capturing shared state.

use crate::error::StateError;
use crate::path::{Captures, PathPattern};
use crate::state_tree::{Change, Operation};
use crate::value::Value;

pub type SubscriptionId = u64;

/// What a listener sees for one matching change.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeMatch<'a> {
    pub operation: Operation,
    pub value: Option<&'a Value>,
    /// Captured segments, keyed by capture name.
    pub path: Captures,
    /// The concrete path of the change.
    pub raw_path: &'a str,
}

type Listener<C> = Box<dyn FnMut(&mut C, &ChangeMatch<'_>) + Send>;

struct Subscription<C> {
    id: SubscriptionId,
    pattern: PathPattern,
    listener: Listener<C>,
}

pub struct SubscriptionRegistry<C> {
    next_id: SubscriptionId,
    subscriptions: Vec<Subscription<C>>,
}

impl<C> SubscriptionRegistry<C> {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            subscriptions: Vec::new(),
        }
    }

    /// Registers a listener for every future change whose path matches
    /// `pattern`. Changes that happened before registration are not replayed.
    pub fn listen<F>(&mut self, pattern: &str, listener: F) -> Result<SubscriptionId, StateError>
    where
        F: FnMut(&mut C, &ChangeMatch<'_>) + Send + 'static,
    {
        let pattern = PathPattern::parse(pattern)?;
        let id = self.next_id;
        self.next_id += 1;
        self.subscriptions.push(Subscription {
            id,
            pattern,
            listener: Box::new(listener),
        });
        Ok(id)
    }

    pub fn unlisten(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|subscription| subscription.id != id);
        self.subscriptions.len() != before
    }

    /// Invokes every matching listener in registration order and returns how
    /// many matched.
    pub fn dispatch(&mut self, context: &mut C, change: &Change) -> usize {
        let mut matched = 0;
        for subscription in &mut self.subscriptions {
            if let Some(captures) = subscription.pattern.matches(&change.path) {
                let event = ChangeMatch {
                    operation: change.operation,
                    value: change.value.as_ref(),
                    path: captures,
                    raw_path: &change.path,
                };
                (subscription.listener)(context, &event);
                matched += 1;
            }
        }
        matched
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.subscriptions.iter().map(|s| s.pattern.as_str())
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}

impl<C> Default for SubscriptionRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_tree::StateTree;

    #[test]
    fn test_dispatch_in_registration_order() {
        let mut registry: SubscriptionRegistry<Vec<String>> = SubscriptionRegistry::new();
        registry
            .listen("fox/:key", |log, m| log.push(format!("first:{}", m.path.get("key").unwrap())))
            .unwrap();
        registry
            .listen("fox/x", |log, _| log.push("second".to_string()))
            .unwrap();
        registry
            .listen("fox/:attribute", |log, _| log.push("third".to_string()))
            .unwrap();

        let mut seen = Vec::new();
        let matched = registry.dispatch(&mut seen, &Change::set("fox/x", Value::from(3.0)));

        assert_eq!(matched, 3);
        assert_eq!(seen, vec!["first:x", "second", "third"]);
    }

    #[test]
    fn test_non_matching_changes_are_ignored() {
        let mut registry: SubscriptionRegistry<u32> = SubscriptionRegistry::new();
        registry.listen("logs/:modelId", |count, _| *count += 1).unwrap();

        let mut count = 0;
        registry.dispatch(&mut count, &Change::set("logs/1/x", Value::from(1.0)));
        registry.dispatch(&mut count, &Change::set("sticks/1", Value::empty()));
        assert_eq!(count, 0);

        registry.dispatch(&mut count, &Change::remove("logs/1"));
        assert_eq!(count, 1);
    }

    #[test]
    fn test_listener_receives_operation_and_value() {
        let mut registry: SubscriptionRegistry<Vec<(Operation, Option<Value>, String)>> =
            SubscriptionRegistry::new();
        registry
            .listen("players/:playerId", |seen, m| {
                seen.push((
                    m.operation,
                    m.value.cloned(),
                    m.path.get("playerId").unwrap_or_default().to_string(),
                ))
            })
            .unwrap();

        let mut seen = Vec::new();
        let record = Value::record([("x", Value::from(0.0))]);
        registry.dispatch(&mut seen, &Change::add("players/p1", record.clone()));
        registry.dispatch(&mut seen, &Change::remove("players/p1"));

        assert_eq!(
            seen,
            vec![
                (Operation::Add, Some(record), "p1".to_string()),
                (Operation::Remove, None, "p1".to_string()),
            ]
        );
    }

    #[test]
    fn test_only_future_changes_are_reported() {
        let mut tree = StateTree::new(Value::record([("logs", Value::empty())])).unwrap();
        tree.insert("logs", "1", Value::empty()).unwrap();
        let earlier = tree.drain_changes();

        let mut registry: SubscriptionRegistry<Vec<String>> = SubscriptionRegistry::new();
        registry
            .listen("logs/:modelId", |ids, m| {
                ids.push(m.path.get("modelId").unwrap_or_default().to_string())
            })
            .unwrap();

        // Members present before subscribing are the caller's to backfill.
        let mut ids: Vec<String> = tree.keys("logs").unwrap();
        tree.insert("logs", "2", Value::empty()).unwrap();
        for change in tree.drain_changes() {
            registry.dispatch(&mut ids, &change);
        }

        assert_eq!(earlier.len(), 1);
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn test_unlisten() {
        let mut registry: SubscriptionRegistry<u32> = SubscriptionRegistry::new();
        let id = registry.listen("ready", |count, _| *count += 1).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.unlisten(id));
        assert!(!registry.unlisten(id));
        assert!(registry.is_empty());

        let mut count = 0;
        registry.dispatch(&mut count, &Change::set("ready", Value::from(true)));
        assert_eq!(count, 0);
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let mut registry: SubscriptionRegistry<()> = SubscriptionRegistry::new();
        assert!(registry.listen("logs/:", |_, _| {}).is_err());
        assert!(registry.is_empty());
    }
}
