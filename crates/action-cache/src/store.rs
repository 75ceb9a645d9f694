use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::model::CachedPlan;

/// Stand-in for the out-of-scope persistent record store (`cached_plans`
/// table in the spec's data model). An implementer swaps this for a real
/// backend without touching `ActionCache`'s key-derivation or upsert
/// policy.
pub trait PlanStore: Send + Sync {
    fn get(&self, cache_key: &str) -> Option<CachedPlan>;
    fn upsert(&self, plan: CachedPlan);
}

#[derive(Default)]
pub struct InMemoryPlanStore {
    inner: Arc<RwLock<HashMap<String, CachedPlan>>>,
}

impl InMemoryPlanStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl PlanStore for InMemoryPlanStore {
    fn get(&self, cache_key: &str) -> Option<CachedPlan> {
        self.inner.read().get(cache_key).cloned()
    }

    fn upsert(&self, plan: CachedPlan) {
        self.inner.write().insert(plan.cache_key.clone(), plan);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CachedAction;
    use chrono::Utc;

    #[test]
    fn upsert_then_get_round_trips() {
        let store = InMemoryPlanStore::new();
        let plan = CachedPlan {
            cache_key: "k1".into(),
            goal: "g".into(),
            url: "u".into(),
            actions: vec![CachedAction::KeyPress {
                key: "Enter".into(),
                wait_ms: None,
            }],
            avg_duration_ms: 10,
            success_count: 1,
            last_used_at: Utc::now(),
        };
        store.upsert(plan.clone());
        let fetched = store.get("k1").unwrap();
        assert_eq!(fetched.goal, "g");
        assert_eq!(fetched.actions.len(), 1);
    }

    #[test]
    fn get_missing_key_is_none() {
        let store = InMemoryPlanStore::new();
        assert!(store.get("missing").is_none());
    }
}
