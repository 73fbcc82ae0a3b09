use crate::client::VoiceFields;
use crate::global;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub voice: VoiceConfig,
    pub audio: AudioConfig,
    pub api: ApiConfig,
    pub behavior: BehaviorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL of the voice chat server, e.g. `http://127.0.0.1:5000`
    pub base_url: String,
    pub upload_path: String,
    pub retrieval_path: String,
    /// Voice model training form endpoint
    pub training_path: String,
    /// Speech synthesis on the server side can take a while.
    pub timeout_seconds: u64,
}

/// Default values for the three form fields sent with every recording.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    pub emotion: String,
    pub voice_id: String,
    pub prompt_template: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Substring of the input device name. Falls back to the default device.
    pub input_device: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Archive every recording and reply under the data directory.
    pub keep_audio: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            upload_path: "/upload-audio".to_string(),
            retrieval_path: "/get-audio".to_string(),
            training_path: "/train-model".to_string(),
            timeout_seconds: 120,
        }
    }
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            emotion: "neutral".to_string(),
            voice_id: "default".to_string(),
            prompt_template: "assistant".to_string(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 3738,
        }
    }
}

impl VoiceConfig {
    pub fn to_fields(&self) -> VoiceFields {
        VoiceFields {
            emotion: self.emotion.clone(),
            voice_id: self.voice_id.clone(),
            prompt_template: self.prompt_template.clone(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if !config_path.exists() {
            info!(
                "Config file not found, creating default at {:?}",
                config_path
            );
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).context("Failed to read config file")?;

        let config: Self = toml::from_str(&content).context("Failed to parse config file")?;

        info!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(path, content).context("Failed to write config file")?;

        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        global::config_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_server_fallbacks() {
        let config = Config::default();
        assert_eq!(config.server.upload_path, "/upload-audio");
        assert_eq!(config.server.retrieval_path, "/get-audio");
        assert_eq!(config.server.training_path, "/train-model");
        assert_eq!(config.voice.emotion, "neutral");
        assert_eq!(config.voice.voice_id, "default");
        assert_eq!(config.voice.prompt_template, "assistant");
        assert!(!config.behavior.keep_audio);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [server]
            base_url = "http://voice.local:8080"

            [voice]
            voice_id = "grandpa"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.base_url, "http://voice.local:8080");
        assert_eq!(config.server.upload_path, "/upload-audio");
        assert_eq!(config.voice.voice_id, "grandpa");
        assert_eq!(config.voice.emotion, "neutral");
        assert_eq!(config.api.port, 3738);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.voice.prompt_template = "tutor".to_string();
        config.audio.input_device = Some("USB".to_string());
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.voice.prompt_template, "tutor");
        assert_eq!(loaded.audio.input_device.as_deref(), Some("USB"));
    }

    #[test]
    fn test_voice_config_to_fields() {
        let fields = VoiceConfig::default().to_fields();
        assert_eq!(fields.emotion, "neutral");
        assert_eq!(fields.voice_id, "default");
        assert_eq!(fields.prompt_template, "assistant");
    }
}
