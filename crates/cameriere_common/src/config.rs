//! Configuration for the waiter session.
//!
//! Loads settings from a TOML file or uses defaults; CLI flags override
//! individual fields after loading.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use tracing::info;

use crate::error::WaiterError;

/// Default config file name, looked up in the working directory.
pub const CONFIG_PATH: &str = "cameriere.toml";

/// The closed set of generation backends. Selected at startup from
/// configuration, never through runtime type inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Local inference through the Ollama chat API.
    Ollama,
    /// Any OpenAI-compatible chat completions server (vLLM, LM Studio, ...).
    OpenaiCompatible,
    /// Canned replies, for tests and offline runs.
    Scripted,
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai_compatible" | "openai" => Ok(Self::OpenaiCompatible),
            "scripted" => Ok(Self::Scripted),
            other => Err(format!(
                "unknown provider '{other}' (expected ollama, openai-compatible or scripted)"
            )),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Ollama => "ollama",
            Self::OpenaiCompatible => "openai_compatible",
            Self::Scripted => "scripted",
        };
        write!(f, "{s}")
    }
}

/// Generation backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: ProviderKind,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer key for OpenAI-compatible servers; most local ones accept any.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// How many past turns ride along with each generation request.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
}

fn default_provider() -> ProviderKind {
    ProviderKind::Ollama
}

fn default_model() -> String {
    "llama3.1:8b-instruct-q4_K_M".to_string()
}

fn default_base_url() -> String {
    "http://127.0.0.1:11434".to_string()
}

fn default_max_tokens() -> u32 {
    512
}

fn default_temperature() -> f32 {
    0.8
}

fn default_request_timeout() -> u64 {
    60
}

fn default_history_window() -> usize {
    10
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: default_base_url(),
            api_key: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            request_timeout_secs: default_request_timeout(),
            history_window: default_history_window(),
        }
    }
}

/// Menu source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuConfig {
    #[serde(default = "default_menu_path")]
    pub path: String,
}

fn default_menu_path() -> String {
    "menu.json".to_string()
}

impl Default for MenuConfig {
    fn default() -> Self {
        Self {
            path: default_menu_path(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub menu: MenuConfig,
}

impl Config {
    /// Load configuration. An explicitly requested file must exist; the
    /// default location may be absent, in which case defaults apply.
    pub fn load(explicit: Option<&Path>) -> Result<Self, WaiterError> {
        let path = match explicit {
            Some(p) => {
                if !p.exists() {
                    return Err(WaiterError::Config(format!(
                        "config file not found: {}",
                        p.display()
                    )));
                }
                p.to_path_buf()
            }
            None => {
                let default = Path::new(CONFIG_PATH);
                if !default.exists() {
                    return Ok(Self::default());
                }
                default.to_path_buf()
            }
        };

        let raw = std::fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&raw)
            .map_err(|e| WaiterError::Config(format!("{}: {e}", path.display())))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.llm.provider, ProviderKind::Ollama);
        assert_eq!(config.llm.history_window, 10);
        assert_eq!(config.menu.path, "menu.json");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let raw = r#"
            [llm]
            provider = "openai_compatible"
            base_url = "http://localhost:8000/v1"
        "#;
        let config: Config = toml::from_str(raw).unwrap();
        assert_eq!(config.llm.provider, ProviderKind::OpenaiCompatible);
        assert_eq!(config.llm.base_url, "http://localhost:8000/v1");
        assert_eq!(config.llm.max_tokens, 512); // default preserved
    }

    #[test]
    fn test_provider_from_str_accepts_dashes() {
        assert_eq!(
            "openai-compatible".parse::<ProviderKind>().unwrap(),
            ProviderKind::OpenaiCompatible
        );
        assert!("magic".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let err = Config::load(Some(Path::new("/nonexistent/cameriere.toml"))).unwrap_err();
        assert!(matches!(err, WaiterError::Config(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cameriere.toml");
        std::fs::write(&path, "[llm]\nmodel = \"llama3.2:1b\"\n").unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.llm.model, "llama3.2:1b");
    }
}
