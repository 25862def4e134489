//! Configuration types for the conversation session.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration for a conversation session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Speech input settings.
    pub input: InputConfig,
    /// Speech output settings.
    pub output: OutputConfig,
    /// Language model settings.
    pub model: ModelConfig,
    /// Turn timing settings (silence timeout, debounce, cooldown).
    pub turn: TurnConfig,
    /// Feedback guard settings (echo rejection heuristics).
    pub guard: GuardConfig,
}

/// Speech input configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// BCP-47 language tag passed to the speech input collaborator.
    pub language: String,
    /// Maximum restart attempts after a recoverable input failure.
    pub max_restart_attempts: u32,
    /// Delay between restart attempts in ms.
    pub restart_backoff_ms: u64,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            language: "en-US".to_owned(),
            max_restart_attempts: 3,
            restart_backoff_ms: 500,
        }
    }
}

/// Speech output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Voice name passed to the speech output collaborator.
    ///
    /// Empty selects the collaborator's default voice.
    pub voice: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            voice: String::new(),
        }
    }
}

/// Language model configuration (OpenAI-compatible streaming endpoint).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Base URL of the chat completions endpoint, e.g. `https://api.groq.com/openai/v1`.
    pub api_url: String,
    /// Model identifier sent in the request body.
    pub api_model: String,
    /// Bearer token. Empty sends no Authorization header.
    pub api_key: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum tokens per response.
    pub max_tokens: usize,
    /// System prompt. The literal `{language}` is replaced with the
    /// configured input language tag at session start.
    pub system_prompt: String,
    /// Maximum user/assistant messages kept in history (system prompt is
    /// always preserved). 0 disables trimming.
    pub max_history_messages: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:11434/v1".to_owned(),
            api_model: "llama-3.3-70b-versatile".to_owned(),
            api_key: String::new(),
            temperature: 0.7,
            max_tokens: 4096,
            system_prompt: "You are a natural, conversational voice assistant. \
                Express your thoughts fluidly as a human would and avoid lists, \
                bullet points, and formatting of any kind. Do not dominate the \
                conversation. Always respond in the language of the user's \
                question; the user's default language is {language}."
                .to_owned(),
            max_history_messages: 40,
        }
    }
}

impl ModelConfig {
    /// System prompt with the `{language}` placeholder resolved.
    pub fn system_message(&self, language: &str) -> String {
        self.system_prompt.replace("{language}", language)
    }
}

/// Turn timing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TurnConfig {
    /// Silence timeout in ms. If no stable speech activity occurs within
    /// this window while listening, the session stops.
    pub silence_timeout_ms: u64,
    /// Debounce window in ms. Interim transcripts re-arm this; only when it
    /// fires is the silence timeout restarted.
    pub debounce_ms: u64,
    /// Delay in ms after playback drains before listening resumes, so the
    /// tail of the assistant's own voice is not captured.
    pub cooldown_ms: u64,
    /// Minimum interim transcript length (chars) that counts as speech
    /// activity for the debounce.
    pub min_interim_len: usize,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            silence_timeout_ms: 30_000,
            debounce_ms: 1_000,
            cooldown_ms: 1_500,
            min_interim_len: 2,
        }
    }
}

/// Feedback guard configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Minimum accepted transcript length in chars.
    pub min_transcript_len: usize,
    /// Lowercase phrases characteristic of the assistant's own voice.
    /// A transcript containing any of them is dropped as probable echo.
    pub echo_phrases: Vec<String>,
}

impl GuardConfig {
    /// Phrases the assistant's voice tends to contain but a user's rarely
    /// does. Deliberately conservative: false negatives over false positives.
    pub fn default_echo_phrases() -> Vec<String> {
        [
            "en tant qu'assistant",
            "je peux vous aider",
            "intelligence artificielle",
            "je suis ici pour",
            "comment puis-je",
            "as an assistant",
            "i can help you",
            "artificial intelligence",
            "i am here to",
            "how can i",
        ]
        .into_iter()
        .map(str::to_owned)
        .collect()
    }
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            min_transcript_len: 3,
            echo_phrases: Self::default_echo_phrases(),
        }
    }
}

impl SessionConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::VoiceError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::VoiceError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `~/.config/colloquy/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config).join("colloquy").join("config.toml")
        } else if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("colloquy")
                .join("config.toml")
        } else {
            PathBuf::from("/tmp/colloquy-config/config.toml")
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SessionConfig::default();
        assert!(!config.input.language.is_empty());
        assert!(config.input.max_restart_attempts > 0);
        assert!(config.turn.silence_timeout_ms > config.turn.debounce_ms);
        assert!(config.turn.cooldown_ms > 0);
        assert!(config.guard.min_transcript_len > 0);
        assert!(!config.guard.echo_phrases.is_empty());
        assert!(config.model.max_tokens > 0);
        assert!(config.model.temperature >= 0.0);
    }

    #[test]
    fn system_message_resolves_language() {
        let config = ModelConfig::default();
        let prompt = config.system_message("fr-FR");
        assert!(prompt.contains("fr-FR"));
        assert!(!prompt.contains("{language}"));
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let config: SessionConfig = toml::from_str(
            r#"
            [turn]
            cooldown_ms = 2000
            "#,
        )
        .unwrap();
        assert_eq!(config.turn.cooldown_ms, 2_000);
        assert_eq!(config.turn.silence_timeout_ms, 30_000);
        assert_eq!(config.input.max_restart_attempts, 3);
    }
}
