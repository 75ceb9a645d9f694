use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Closed tagged union of replayable low-level actions. Modeled explicitly
/// as three variants rather than a loosely-typed record with optional
/// fields, so a replayer never has to guess which fields are meaningful.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CachedAction {
    Click { x: f64, y: f64, wait_ms: Option<u64> },
    TypeText { text: String, wait_ms: Option<u64> },
    KeyPress { key: String, wait_ms: Option<u64> },
}

impl CachedAction {
    /// Default post-action delay when `wait_ms` wasn't overridden.
    pub fn default_wait_ms(&self) -> u64 {
        match self {
            CachedAction::Click { .. } => 500,
            CachedAction::TypeText { .. } => 100,
            CachedAction::KeyPress { .. } => 100,
        }
    }

    pub fn wait_ms(&self) -> u64 {
        let explicit = match self {
            CachedAction::Click { wait_ms, .. } => *wait_ms,
            CachedAction::TypeText { wait_ms, .. } => *wait_ms,
            CachedAction::KeyPress { wait_ms, .. } => *wait_ms,
        };
        explicit.unwrap_or_else(|| self.default_wait_ms())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CachedPlan {
    pub cache_key: String,
    pub goal: String,
    pub url: String,
    pub actions: Vec<CachedAction>,
    pub avg_duration_ms: u64,
    pub success_count: u64,
    pub last_used_at: DateTime<Utc>,
}

/// `SHA256(lower(trim(goal)) + "|" + trim(url))` as hex. Goal is
/// case-folded; the URL is preserved byte-exact so query strings
/// distinguish otherwise-identical plans.
pub fn cache_key(goal: &str, url: &str) -> String {
    use sha2::{Digest, Sha256};
    let normalized = format!("{}|{}", goal.trim().to_lowercase(), url.trim());
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hex_encode(&hasher.finalize())
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_is_case_insensitive_in_goal_only() {
        let a = cache_key("Open Example.com", "https://example.com");
        let b = cache_key("open example.com", "https://example.com");
        assert_eq!(a, b);

        let c = cache_key("open example.com", "https://EXAMPLE.com");
        assert_ne!(a, c, "url must be preserved byte-exact");
    }

    #[test]
    fn cache_key_trims_whitespace_in_goal() {
        let a = cache_key("  open example.com  ", "https://example.com");
        let b = cache_key("open example.com", "https://example.com");
        assert_eq!(a, b);
    }

    #[test]
    fn default_wait_ms_matches_action_type() {
        assert_eq!(
            CachedAction::Click { x: 1.0, y: 2.0, wait_ms: None }.wait_ms(),
            500
        );
        assert_eq!(
            CachedAction::TypeText { text: "hi".into(), wait_ms: None }.wait_ms(),
            100
        );
        assert_eq!(
            CachedAction::KeyPress { key: "Enter".into(), wait_ms: Some(50) }.wait_ms(),
            50
        );
    }
}
