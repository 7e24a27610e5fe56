// Configuration module
// Centralized management of pipeline configuration

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{AppError, AppResult};

pub mod tts; // TTS provider configuration

pub use tts::{TtsConfig, TtsEngine};

/// Переменная окружения с путём к JSON-файлу конфигурации
pub const CONFIG_PATH_ENV: &str = "VOXNOVA_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub quota: QuotaLimits,
    pub cache: CacheTtls,
    pub limits: RequestLimits,
    pub tts: TtsConfig,
    pub audio: AudioConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Token for operator-only routes; without it those routes refuse everyone.
    pub operator_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3001".to_string(),
            operator_token: None,
        }
    }
}

/// Daily limits per operation kind plus the storage ceiling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaLimits {
    pub voice_generation: u64,
    pub audio_generation: u64,
    pub audio_transformation: u64,
    pub api_call: u64,
    pub storage_mb: u64,
}

impl Default for QuotaLimits {
    fn default() -> Self {
        Self {
            voice_generation: 25,
            audio_generation: 25,
            audio_transformation: 50,
            api_call: 1000,
            storage_mb: 100,
        }
    }
}

/// TTL в секундах для разных классов кэшируемых данных
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheTtls {
    pub profile_secs: u64,
    pub voice_result_secs: u64,
    pub preset_secs: u64,
}

impl CacheTtls {
    pub fn profile(&self) -> Duration {
        Duration::from_secs(self.profile_secs)
    }

    pub fn voice_result(&self) -> Duration {
        Duration::from_secs(self.voice_result_secs)
    }

    pub fn preset(&self) -> Duration {
        Duration::from_secs(self.preset_secs)
    }
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            profile_secs: 60 * 60,
            voice_result_secs: 24 * 60 * 60,
            preset_secs: 7 * 24 * 60 * 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestLimits {
    pub max_text_length: usize,
    pub max_audio_duration_secs: f64,
}

impl Default for RequestLimits {
    fn default() -> Self {
        Self {
            max_text_length: 1000,
            max_audio_duration_secs: 300.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Base rate the resample filters scale from.
    pub sample_rate: u32,
    pub output_format: String,
    /// Explicit ffmpeg binary; otherwise looked up on PATH.
    pub ffmpeg_path: Option<PathBuf>,
    pub temp_dir: Option<PathBuf>,
}

impl AudioConfig {
    pub fn temp_dir(&self) -> PathBuf {
        self.temp_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("voxnova"))
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            output_format: "mp3".to_string(),
            ffmpeg_path: None,
            temp_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub root_dir: PathBuf,
    pub public_base_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("storage"),
            public_base_url: "http://127.0.0.1:3001/files".to_string(),
        }
    }
}

impl AppConfig {
    /// Defaults, then the optional JSON file, then environment overrides.
    pub fn load() -> AppResult<Self> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    pub fn from_file(path: &str) -> AppResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::Configuration(format!("Failed to read config file {}: {}", path, e))
        })?;
        serde_json::from_str(&raw)
            .map_err(|e| AppError::Configuration(format!("Failed to parse config file {}: {}", path, e)))
    }

    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("VOICERSS_API_KEY") {
            if !key.trim().is_empty() {
                self.tts.voicerss_api_key = Some(key);
            }
        }
        if let Ok(token) = std::env::var("VOXNOVA_OPERATOR_TOKEN") {
            if !token.trim().is_empty() {
                self.server.operator_token = Some(token);
            }
        }
        if let Ok(bind) = std::env::var("VOXNOVA_BIND") {
            self.server.bind_addr = bind;
        }
        if let Ok(dir) = std::env::var("VOXNOVA_STORAGE_DIR") {
            self.storage.root_dir = PathBuf::from(dir);
        }
        if let Ok(url) = std::env::var("VOXNOVA_PUBLIC_URL") {
            self.storage.public_base_url = url;
        }
        if let Ok(path) = std::env::var("FFMPEG_PATH") {
            self.audio.ffmpeg_path = Some(PathBuf::from(path));
        }
    }
}
