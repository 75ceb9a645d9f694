//! Engine configuration: a plain serde struct loaded through the `config`
//! crate's three-tier precedence (defaults, optional file, environment).
use std::path::Path;

use serde::{Deserialize, Serialize};
use session_engine::BrowserMode;

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_max_steps() -> u32 {
    50
}

fn default_enable_owl_vision() -> bool {
    true
}

fn default_log_format() -> String {
    "text".to_string()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Text,
    Json,
}

impl Default for LogFormat {
    fn default() -> Self {
        LogFormat::Text
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentDefaults {
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
    #[serde(default = "default_enable_owl_vision")]
    pub enable_owl_vision: bool,
}

impl Default for AgentDefaults {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            enable_owl_vision: default_enable_owl_vision(),
        }
    }
}

/// Process-wide settings recognized by the engine. Mirrors spec §6's
/// Configuration table; anything credential-shaped (`ENCRYPTION_KEY`,
/// `<LLM_PROVIDER>_API_KEY`) is read directly by the Agent's own driver,
/// never by this struct.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub browser_mode: BrowserModeConfig,
    pub cdp_url: Option<String>,
    pub browser_container_image: Option<String>,
    #[serde(default)]
    pub agent: AgentDefaults,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default)]
    pub log_format: LogFormat,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BrowserModeConfig {
    Direct,
    Container,
    Custom,
}

impl Default for BrowserModeConfig {
    fn default() -> Self {
        BrowserModeConfig::Container
    }
}

impl From<BrowserModeConfig> for BrowserMode {
    fn from(value: BrowserModeConfig) -> Self {
        match value {
            BrowserModeConfig::Direct => BrowserMode::Direct,
            BrowserModeConfig::Container => BrowserMode::Container,
            BrowserModeConfig::Custom => BrowserMode::Custom,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            browser_mode: BrowserModeConfig::default(),
            cdp_url: None,
            browser_container_image: None,
            agent: AgentDefaults::default(),
            bind_addr: default_bind_addr(),
            log_format: LogFormat::default(),
        }
    }
}

/// Loads configuration by layering defaults, an optional config file, and
/// environment variables (`ENGINE_` prefix, `__` as the nesting separator,
/// e.g. `ENGINE_AGENT__MAX_STEPS`), in that order of increasing precedence.
pub fn load(config_file: Option<&Path>) -> anyhow::Result<EngineConfig> {
    let mut builder = config::Config::builder()
        .set_default("browser_mode", "container")?
        .set_default("bind_addr", default_bind_addr())?
        .set_default("log_format", "text")?
        .set_default("agent.max_steps", default_max_steps() as i64)?
        .set_default("agent.enable_owl_vision", default_enable_owl_vision())?;

    if let Some(path) = config_file {
        if path.exists() {
            builder = builder.add_source(config::File::from(path));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("ENGINE")
            .separator("__")
            .try_parsing(true),
    );

    // CDP_URL and BROWSER_CONTAINER_IMAGE are read without the ENGINE_
    // prefix too, matching spec §6's bare key names.
    if let Ok(cdp_url) = std::env::var("CDP_URL") {
        builder = builder.set_override("cdp_url", cdp_url)?;
    }
    if let Ok(image) = std::env::var("BROWSER_CONTAINER_IMAGE") {
        builder = builder.set_override("browser_container_image", image)?;
    }
    if let Ok(mode) = std::env::var("BROWSER_MODE") {
        builder = builder.set_override("browser_mode", mode)?;
    }

    let settings = builder.build()?;
    let config: EngineConfig = settings.try_deserialize()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_values() {
        let config = EngineConfig::default();
        assert_eq!(config.agent.max_steps, 50);
        assert!(config.agent.enable_owl_vision);
        assert_eq!(config.browser_mode, BrowserModeConfig::Container);
    }

    #[test]
    fn load_with_no_file_and_no_env_falls_back_to_defaults() {
        let config = load(None).expect("default-only load should succeed");
        assert_eq!(config.agent.max_steps, 50);
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
    }
}
