//! Configuration loading
//!
//! Settings come from a TOML file (by default `config.toml` in the platform
//! config directory). Every section is optional; secrets may also be supplied
//! through `GEMINI_API_KEY` and `HF_TOKEN`.

pub mod schema;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::catalog::Locale;

pub use schema::parse_duration;

const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";
const HF_TOKEN_ENV: &str = "HF_TOKEN";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Text-generation endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// `"gemini"` or `"mock"`.
    pub provider: String,
    pub endpoint: String,
    pub model: String,
    pub api_key: String,
    pub temperature: f32,
    pub translation_temperature: f32,
    pub max_output_tokens: u32,
    pub timeout: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-2.0-flash".to_string(),
            api_key: String::new(),
            temperature: 0.4,
            translation_temperature: 0.2,
            max_output_tokens: 400,
            timeout: "60s".to_string(),
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Result<Duration> {
        parse_duration(&self.timeout).map_err(|e| anyhow!("llm.timeout: {e}"))
    }
}

/// Speech-to-text and text-to-speech adapter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub hub_endpoint: String,
    pub hf_token: Option<String>,
    pub timeout: String,
    /// Where downloaded synthesis output is stored. Defaults to the cache dir.
    /// Files are deleted when their session ends; leftovers from a crash are
    /// safe to remove.
    pub audio_dir: Option<PathBuf>,
    pub stt: SttConfig,
    pub tts: TtsConfig,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            hub_endpoint: "https://huggingface.co".to_string(),
            hf_token: None,
            timeout: "120s".to_string(),
            audio_dir: None,
            stt: SttConfig::default(),
            tts: TtsConfig::default(),
        }
    }
}

impl SpeechConfig {
    pub fn timeout(&self) -> Result<Duration> {
        parse_duration(&self.timeout).map_err(|e| anyhow!("speech.timeout: {e}"))
    }

    pub fn audio_dir(&self) -> PathBuf {
        self.audio_dir.clone().unwrap_or_else(|| {
            ProjectDirs::from("app", "evrimabot", "evrimabot")
                .map(|dirs| dirs.cache_dir().join("audio"))
                .unwrap_or_else(|| std::env::temp_dir().join("evrimabot-audio"))
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SttConfig {
    /// `"gradio"` or `"mock"`.
    pub provider: String,
    /// Space id (`owner/name`) or base URL of the Gradio app.
    pub space: String,
    pub language: String,
    pub api_name: String,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            provider: "gradio".to_string(),
            space: "DarliAI/Evaluation".to_string(),
            language: "Akan (Asante Twi)".to_string(),
            api_name: "/_transcribe_and_store".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    /// `"gradio"` or `"mock"`.
    pub provider: String,
    pub space: String,
    pub language: String,
    pub speaker: String,
    pub api_name: String,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            provider: "gradio".to_string(),
            space: "Ghana-NLP/Southern-Ghana-TTS-Public".to_string(),
            language: "Asante Twi".to_string(),
            speaker: "Male (Low)".to_string(),
            api_name: "/predict".to_string(),
        }
    }
}

/// Conversation behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub locale: Locale,
    pub greeting: Option<String>,
    /// Replaces the built-in persona and knowledge block when set.
    pub system_prompt_file: Option<PathBuf>,
    pub translation_target: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            locale: Locale::Twi,
            greeting: Some(crate::agent::persona::DEFAULT_GREETING.to_string()),
            system_prompt_file: None,
            translation_target: "English".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8510,
        }
    }
}

impl Config {
    /// Default location of the config file.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("app", "evrimabot", "evrimabot")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load from an explicit path (which must exist), or from the default
    /// location when present, or fall back to built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_file(path)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::load_file(&path)?,
                _ => {
                    info!("No config file found, using defaults");
                    Self::default()
                }
            },
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Fill secrets that the file left empty from the environment.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.llm.api_key.is_empty() {
            if let Some(key) = lookup(GEMINI_API_KEY_ENV).filter(|k| !k.is_empty()) {
                self.llm.api_key = key;
            }
        }
        if self.speech.hf_token.is_none() {
            self.speech.hf_token = lookup(HF_TOKEN_ENV).filter(|t| !t.is_empty());
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.llm.timeout()?;
        self.speech.timeout()?;
        if !(0.0..=2.0).contains(&self.llm.temperature)
            || !(0.0..=2.0).contains(&self.llm.translation_temperature)
        {
            return Err(anyhow!("llm temperatures must be within 0.0..=2.0"));
        }
        if self.llm.max_output_tokens == 0 {
            return Err(anyhow!("llm.max_output_tokens must be positive"));
        }
        if self.llm.provider == "gemini" && self.llm.api_key.is_empty() {
            warn!(
                "No Gemini API key configured (set llm.api_key or {}); replies will fail",
                GEMINI_API_KEY_ENV
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_hosted_services() {
        let config = Config::default();
        assert_eq!(config.llm.model, "gemini-2.0-flash");
        assert!((config.llm.temperature - 0.4).abs() < f32::EPSILON);
        assert!((config.llm.translation_temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(config.llm.max_output_tokens, 400);
        assert_eq!(config.speech.stt.space, "DarliAI/Evaluation");
        assert_eq!(config.speech.stt.language, "Akan (Asante Twi)");
        assert_eq!(config.speech.tts.speaker, "Male (Low)");
        assert_eq!(config.chat.locale, Locale::Twi);
        assert_eq!(config.chat.translation_target, "English");
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config: Config = toml::from_str(
            r#"
            [llm]
            model = "gemini-1.5-pro"

            [speech.tts]
            provider = "mock"

            [chat]
            locale = "english"
            "#,
        )
        .unwrap();
        assert_eq!(config.llm.model, "gemini-1.5-pro");
        assert_eq!(config.llm.max_output_tokens, 400);
        assert_eq!(config.speech.tts.provider, "mock");
        assert_eq!(config.speech.tts.api_name, "/predict");
        assert_eq!(config.speech.stt.provider, "gradio");
        assert_eq!(config.chat.locale, Locale::English);
        assert_eq!(config.server.port, 8510);
    }

    #[test]
    fn env_fills_missing_secrets_only() {
        let mut config = Config::default();
        config.apply_env(|key| match key {
            "GEMINI_API_KEY" => Some("from-env".to_string()),
            "HF_TOKEN" => Some("hf_x".to_string()),
            _ => None,
        });
        assert_eq!(config.llm.api_key, "from-env");
        assert_eq!(config.speech.hf_token.as_deref(), Some("hf_x"));

        let mut config = Config::default();
        config.llm.api_key = "from-file".to_string();
        config.apply_env(|_| Some("from-env".to_string()));
        assert_eq!(config.llm.api_key, "from-file");
    }

    #[test]
    fn validate_rejects_bad_timeout() {
        let mut config = Config::default();
        config.llm.timeout = "soon".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_tokens() {
        let mut config = Config::default();
        config.llm.max_output_tokens = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server]\nport = 9000\n").unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.server.port, 9000);
    }

    #[test]
    fn load_missing_explicit_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(Some(&dir.path().join("nope.toml"))).is_err());
    }

    #[test]
    fn explicit_audio_dir_wins() {
        let mut speech = SpeechConfig::default();
        speech.audio_dir = Some(PathBuf::from("/tmp/voices"));
        assert_eq!(speech.audio_dir(), PathBuf::from("/tmp/voices"));
    }
}
