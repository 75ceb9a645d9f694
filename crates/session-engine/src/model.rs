use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    Active,
    Paused,
    Completed,
    Failed,
    Cancelled,
    Stopped,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionStatus::Completed | SessionStatus::Failed | SessionStatus::Cancelled | SessionStatus::Stopped
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrowserMode {
    Direct,
    Container,
    Custom,
}

/// `agent_config` fields recognized at session start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
    #[serde(default = "default_enable_vision")]
    pub enable_owl_vision: bool,
}

fn default_max_steps() -> u32 {
    50
}

fn default_enable_vision() -> bool {
    true
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            enable_owl_vision: default_enable_vision(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StartSessionRequest {
    pub task: String,
    pub url: String,
    pub agent_config: AgentConfig,
    pub browser_mode: BrowserMode,
    pub cdp_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub status: SessionStatus,
    pub task: String,
    pub max_steps: u32,
    pub actions_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub result: Option<Value>,
    /// Filled in after termination by a best-effort background summary
    /// generation pass; absent until that pass completes, if ever.
    pub summary: Option<String>,
}

impl SessionRecord {
    pub fn new(id: String, task: String, max_steps: u32) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: SessionStatus::Pending,
            task,
            max_steps,
            actions_count: 0,
            created_at: now,
            updated_at: now,
            completed_at: None,
            error_message: None,
            result: None,
            summary: None,
        }
    }
}

/// The callback contract a caller's Agent implementation reports
/// through after every step, replacing reflective access to an
/// internal agent object's attributes.
#[derive(Debug, Clone, Default)]
pub struct StepObservation {
    pub goal: String,
    pub action: Option<Value>,
    pub evaluation: Option<String>,
    pub memory: Option<String>,
    pub result: Option<Value>,
    pub url: String,
}

/// What the step callback tells the loop to do next, replacing a raised
/// stop-iteration exception with an explicit three-way result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    Stop,
    Cancel,
}
