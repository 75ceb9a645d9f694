//! Accessibility-tree grounding, supplemental to the screenshot-based
//! marking pipeline. Takes already-fetched `Accessibility.getFullAXTree`
//! nodes (the CDP round trip itself belongs to the caller) and filters
//! them down to the roles worth offering as selection candidates.
use serde::{Deserialize, Serialize};
use serde_json::Value;

const RETAINED_ROLES: &[&str] = &["button", "textbox", "link", "checkbox"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AxCandidate {
    pub node_id: Option<i64>,
    pub role: Option<String>,
    pub name: Option<String>,
}

/// Mirrors the original provider's filter: keep a node if it has a
/// name, or its role is one of the always-interactive roles.
pub fn simplify(nodes: &[Value]) -> Vec<AxCandidate> {
    nodes
        .iter()
        .filter_map(|node| {
            let role = node
                .get("role")
                .and_then(|r| r.get("value"))
                .and_then(|v| v.as_str())
                .map(str::to_string);
            let name = node
                .get("name")
                .and_then(|n| n.get("value"))
                .and_then(|v| v.as_str())
                .map(str::to_string);
            let node_id = node.get("nodeId").and_then(|v| v.as_str()).and_then(|s| s.parse().ok());

            let keep = name.is_some() || role.as_deref().map(|r| RETAINED_ROLES.contains(&r)).unwrap_or(false);
            keep.then_some(AxCandidate { node_id, role, name })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keeps_named_nodes_regardless_of_role() {
        let nodes = vec![json!({
            "nodeId": "7",
            "role": { "value": "generic" },
            "name": { "value": "Submit order" },
        })];
        let result = simplify(&nodes);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].name.as_deref(), Some("Submit order"));
    }

    #[test]
    fn drops_unnamed_non_interactive_nodes() {
        let nodes = vec![json!({
            "nodeId": "8",
            "role": { "value": "generic" },
        })];
        assert!(simplify(&nodes).is_empty());
    }

    #[test]
    fn keeps_unnamed_interactive_roles() {
        let nodes = vec![json!({
            "nodeId": "9",
            "role": { "value": "button" },
        })];
        assert_eq!(simplify(&nodes).len(), 1);
    }
}
