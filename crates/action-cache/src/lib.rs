//! Action Cache: memoizes successful low-level plans keyed by the
//! goal-and-URL pair, enabling instant replay of previously solved tasks
//! without LLM inference.

pub mod model;
pub mod store;

pub use model::{cache_key, CachedAction, CachedPlan};
pub use store::{InMemoryPlanStore, PlanStore};

use std::sync::Arc;

use chrono::Utc;

pub struct ActionCache {
    store: Arc<dyn PlanStore>,
}

impl ActionCache {
    pub fn new(store: Arc<dyn PlanStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryPlanStore::new()))
    }

    /// On hit, atomically bumps `success_count` and `last_used_at` and
    /// returns the stored actions. Returns `None` on miss.
    pub fn get(&self, goal: &str, url: &str) -> Option<Vec<CachedAction>> {
        let key = cache_key(goal, url);
        let Some(mut plan) = self.store.get(&key) else {
            engine_metrics::record_cache_event("miss");
            return None;
        };
        plan.success_count += 1;
        plan.last_used_at = Utc::now();
        let actions = plan.actions.clone();
        self.store.upsert(plan);
        engine_metrics::record_cache_event("hit");
        Some(actions)
    }

    /// Upserts by `cache_key`. No-op if `actions` is empty.
    pub fn put(&self, goal: &str, url: &str, actions: Vec<CachedAction>, duration_ms: u64) {
        if actions.is_empty() {
            return;
        }
        let key = cache_key(goal, url);
        let plan = CachedPlan {
            cache_key: key,
            goal: goal.to_string(),
            url: url.to_string(),
            actions,
            avg_duration_ms: duration_ms,
            success_count: 0,
            last_used_at: Utc::now(),
        };
        self.store.upsert(plan);
        engine_metrics::record_cache_event("put");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_returns_same_plan() {
        let cache = ActionCache::in_memory();
        let actions = vec![CachedAction::Click {
            x: 10.0,
            y: 20.0,
            wait_ms: None,
        }];
        cache.put("open example.com", "about:blank", actions.clone(), 500);

        let got = cache.get("open example.com", "about:blank").unwrap();
        assert_eq!(got, actions);
    }

    #[test]
    fn put_empty_actions_is_noop() {
        let cache = ActionCache::in_memory();
        cache.put("goal", "url", vec![], 0);
        assert!(cache.get("goal", "url").is_none());
    }

    #[test]
    fn success_count_is_strictly_monotonic_across_hits() {
        let cache = ActionCache::in_memory();
        cache.put(
            "goal",
            "url",
            vec![CachedAction::KeyPress {
                key: "Enter".into(),
                wait_ms: None,
            }],
            10,
        );

        cache.get("goal", "url");
        cache.get("goal", "url");
        cache.get("goal", "url");

        let stored = cache.store.get(&cache_key("goal", "url")).unwrap();
        assert_eq!(stored.success_count, 3);
    }

    #[test]
    fn cache_key_equality_matches_case_folded_goal_and_exact_url() {
        assert_eq!(
            cache_key("Buy Stamps", "https://post.example/"),
            cache_key("buy stamps", "https://post.example/")
        );
        assert_ne!(
            cache_key("buy stamps", "https://post.example/"),
            cache_key("buy stamps", "https://post.example/?x=1")
        );
    }
}
