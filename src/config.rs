use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{AppError, Result};

const API_KEY_ENV: &str = "LINK_SUMMARIZER_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    pub api_key: Option<String>,

    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    #[serde(default = "default_trigger_key")]
    pub trigger_key: char,

    #[serde(default = "default_hover_delay_ms")]
    pub hover_delay_ms: u64,

    #[serde(default = "default_hide_grace_ms")]
    pub hide_grace_ms: u64,
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("link-summarizer");
    std::fs::create_dir_all(&data_dir).ok();
    data_dir.join("summaries.db").to_string_lossy().to_string()
}

fn default_api_url() -> String {
    "https://api.perplexity.ai/chat/completions".to_string()
}

fn default_model() -> String {
    "mixtral-8x7b-instruct".to_string()
}

fn default_trigger_key() -> char {
    's'
}

fn default_hover_delay_ms() -> u64 {
    300
}

fn default_hide_grace_ms() -> u64 {
    300
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            api_key: None,
            api_url: default_api_url(),
            model: default_model(),
            request_timeout_secs: None,
            trigger_key: default_trigger_key(),
            hover_delay_ms: default_hover_delay_ms(),
            hide_grace_ms: default_hide_grace_ms(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Self::from_toml(&content)?
        } else {
            let config = Config::default();
            config.save()?;
            config
        };

        if config.api_key.is_none() {
            config.api_key = std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty());
        }

        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        if config.trigger_key.is_whitespace() {
            return Err(AppError::Config(
                "trigger_key must be a visible character".to_string(),
            ));
        }
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("link-summarizer")
            .join("config.toml")
    }

    pub fn hover_delay(&self) -> Duration {
        Duration::from_millis(self.hover_delay_ms)
    }

    pub fn hide_grace(&self) -> Duration {
        Duration::from_millis(self.hide_grace_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}
