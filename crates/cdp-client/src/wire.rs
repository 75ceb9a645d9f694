use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outbound command envelope: `{id, method, params}`.
#[derive(Debug, Clone, Serialize)]
pub struct CommandEnvelope {
    pub id: u64,
    pub method: String,
    pub params: Value,
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteError {
    pub code: i64,
    pub message: String,
}

/// A decoded inbound frame: either a reply to a command we sent, or an
/// unsolicited event. CDP's wire format discriminates on field presence
/// (`id` => reply, `method` => event) rather than a tag, so this is parsed
/// from a raw `Value` rather than derived directly.
#[derive(Debug, Clone)]
pub enum InboundFrame {
    Reply {
        id: u64,
        result: Option<Value>,
        error: Option<RemoteError>,
    },
    Event {
        method: String,
        params: Value,
        session_id: Option<String>,
    },
}

impl InboundFrame {
    pub fn parse(raw: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(raw).ok()?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Option<Self> {
        let obj = value.as_object()?;
        if let Some(method) = obj.get("method").and_then(Value::as_str) {
            return Some(InboundFrame::Event {
                method: method.to_string(),
                params: obj.get("params").cloned().unwrap_or(Value::Null),
                session_id: obj
                    .get("sessionId")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            });
        }
        let id = obj.get("id").and_then(Value::as_u64)?;
        let error = obj
            .get("error")
            .and_then(|e| serde_json::from_value::<RemoteError>(e.clone()).ok());
        let result = obj.get("result").cloned();
        Some(InboundFrame::Reply { id, result, error })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_command_reply() {
        let raw = r#"{"id":7,"result":{"ok":true}}"#;
        match InboundFrame::parse(raw).unwrap() {
            InboundFrame::Reply { id, result, error } => {
                assert_eq!(id, 7);
                assert!(error.is_none());
                assert_eq!(result.unwrap()["ok"], true);
            }
            _ => panic!("expected reply"),
        }
    }

    #[test]
    fn parses_error_reply() {
        let raw = r#"{"id":1,"error":{"code":-32000,"message":"boom"}}"#;
        match InboundFrame::parse(raw).unwrap() {
            InboundFrame::Reply { error: Some(e), .. } => {
                assert_eq!(e.code, -32000);
                assert_eq!(e.message, "boom");
            }
            _ => panic!("expected error reply"),
        }
    }

    #[test]
    fn parses_event() {
        let raw = r#"{"method":"Page.screencastFrame","params":{"data":"abc"},"sessionId":"S1"}"#;
        match InboundFrame::parse(raw).unwrap() {
            InboundFrame::Event {
                method,
                session_id,
                ..
            } => {
                assert_eq!(method, "Page.screencastFrame");
                assert_eq!(session_id.as_deref(), Some("S1"));
            }
            _ => panic!("expected event"),
        }
    }
}
