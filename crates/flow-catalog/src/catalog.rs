//! In-memory flow store with TTL-based staleness.

use parking_lot::RwLock;
use questline_core_types::{Flow, FlowCategory};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

/// Default entry lifetime before the catalog reports itself stale.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// TTL-cached store of discovered flows, keyed by flow id.
///
/// Concurrent reads are always safe; writes take the exclusive lock for the
/// whole replace.
pub struct FlowCatalog {
    flows: RwLock<HashMap<String, Flow>>,
    last_refreshed: RwLock<Option<Instant>>,
}

impl FlowCatalog {
    pub fn new() -> Self {
        Self {
            flows: RwLock::new(HashMap::new()),
            last_refreshed: RwLock::new(None),
        }
    }

    /// Fetch one flow as a copy-on-read snapshot.
    pub fn get(&self, id: &str) -> Option<Flow> {
        self.flows.read().get(id).cloned()
    }

    /// Insert or replace one flow and mark the catalog fresh.
    pub fn put(&self, flow: Flow) {
        self.flows.write().insert(flow.id.clone(), flow);
        *self.last_refreshed.write() = Some(Instant::now());
    }

    /// Replace the whole catalog with a discovery result.
    pub fn put_all(&self, flows: Vec<Flow>) {
        let mut guard = self.flows.write();
        guard.clear();
        for flow in flows {
            guard.insert(flow.id.clone(), flow);
        }
        drop(guard);
        *self.last_refreshed.write() = Some(Instant::now());
        debug!(target: "flow-catalog", count = self.len(), "catalog replaced");
    }

    /// All flows, optionally filtered by category, sorted by id for stable
    /// listings.
    pub fn all(&self, category: Option<FlowCategory>) -> Vec<Flow> {
        let mut flows: Vec<Flow> = self
            .flows
            .read()
            .values()
            .filter(|f| category.map_or(true, |c| f.category == c))
            .cloned()
            .collect();
        flows.sort_by(|a, b| a.id.cmp(&b.id));
        flows
    }

    /// Whether entries are older than `max_age` (or nothing was ever loaded).
    pub fn is_stale(&self, max_age: Duration) -> bool {
        match *self.last_refreshed.read() {
            Some(at) => at.elapsed() > max_age,
            None => true,
        }
    }

    /// Drop every entry and reset staleness tracking.
    pub fn clear(&self) {
        self.flows.write().clear();
        *self.last_refreshed.write() = None;
        debug!(target: "flow-catalog", "catalog cleared");
    }

    pub fn len(&self) -> usize {
        self.flows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.read().is_empty()
    }

    /// Backdate the refresh instant, used when adopting a manifest whose scan
    /// happened in an earlier invocation.
    pub(crate) fn set_refreshed_ago(&self, age: Duration) {
        *self.last_refreshed.write() = Instant::now().checked_sub(age).or(Some(Instant::now()));
    }
}

impl Default for FlowCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use questline_core_types::{Step, StepAction};

    fn flow(id: &str, category: FlowCategory) -> Flow {
        Flow::new(id, id.to_uppercase(), category).with_step(Step::new(
            "s1",
            StepAction::Navigate {
                url: "/".to_string(),
            },
        ))
    }

    #[test]
    fn put_then_get_round_trips() {
        let catalog = FlowCatalog::new();
        catalog.put(flow("login", FlowCategory::Auth));
        assert_eq!(catalog.get("login").unwrap().id, "login");
        assert!(catalog.get("missing").is_none());
    }

    #[test]
    fn fresh_after_put_then_stale_after_ttl() {
        let catalog = FlowCatalog::new();
        assert!(catalog.is_stale(Duration::from_secs(1)));

        catalog.put(flow("login", FlowCategory::Auth));
        assert!(!catalog.is_stale(Duration::from_secs(1)));
        assert!(!catalog.is_stale(Duration::from_millis(1) + DEFAULT_TTL));

        catalog.set_refreshed_ago(Duration::from_secs(400));
        assert!(catalog.is_stale(DEFAULT_TTL));
        assert!(!catalog.is_stale(Duration::from_secs(500)));
    }

    #[test]
    fn category_filter_applies() {
        let catalog = FlowCatalog::new();
        catalog.put_all(vec![
            flow("login", FlowCategory::Auth),
            flow("signup", FlowCategory::Signup),
            flow("logout", FlowCategory::Auth),
        ]);
        assert_eq!(catalog.all(None).len(), 3);
        let auth = catalog.all(Some(FlowCategory::Auth));
        assert_eq!(auth.len(), 2);
        assert_eq!(auth[0].id, "login"); // sorted by id
    }

    #[test]
    fn put_all_replaces_everything() {
        let catalog = FlowCatalog::new();
        catalog.put(flow("old", FlowCategory::Other));
        catalog.put_all(vec![flow("new", FlowCategory::Other)]);
        assert!(catalog.get("old").is_none());
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn clear_resets_staleness() {
        let catalog = FlowCatalog::new();
        catalog.put(flow("login", FlowCategory::Auth));
        catalog.clear();
        assert!(catalog.is_empty());
        assert!(catalog.is_stale(Duration::from_secs(3600)));
    }

    #[test]
    fn snapshots_survive_concurrent_invalidation() {
        let catalog = FlowCatalog::new();
        catalog.put(flow("login", FlowCategory::Auth));
        let snapshot = catalog.get("login").unwrap();
        catalog.clear();
        // The executor's borrowed copy is unaffected by the replace.
        assert_eq!(snapshot.id, "login");
        assert_eq!(snapshot.steps.len(), 1);
    }
}
