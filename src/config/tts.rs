use std::time::Duration;

use serde::{Deserialize, Serialize};

// Доступные движки TTS
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TtsEngine {
    VoiceRss,
    GoogleTranslate,
}

impl TtsEngine {
    pub fn as_str(&self) -> &'static str {
        match self {
            TtsEngine::VoiceRss => "voicerss",
            TtsEngine::GoogleTranslate => "google-translate",
        }
    }
}

// Конфигурация TTS
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    // VoiceRSS: лучше качество, но лимитированные запросы
    pub voicerss_api_key: Option<String>,
    pub voicerss_endpoint: String,
    pub voicerss_language: String,
    pub voicerss_format: String,

    // Google Translate TTS: без лимитов, но простой голос
    pub google_endpoint: String,
    pub google_language: String,
    /// Per-call text ceiling of the fallback provider.
    pub fallback_chunk_chars: usize,
    /// Pause between chunk calls, not inserted into the audio.
    pub chunk_pause_ms: u64,

    pub request_timeout_secs: u64,
}

impl TtsConfig {
    pub fn chunk_pause(&self) -> Duration {
        Duration::from_millis(self.chunk_pause_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn has_primary_credential(&self) -> bool {
        self.voicerss_api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }
}

impl Default for TtsConfig {
    fn default() -> Self {
        TtsConfig {
            voicerss_api_key: None,
            voicerss_endpoint: "https://api.voicerss.org/".to_string(),
            voicerss_language: "en-us".to_string(),
            voicerss_format: "44khz_16bit_stereo".to_string(),
            google_endpoint: "https://translate.google.com/translate_tts".to_string(),
            google_language: "en".to_string(),
            fallback_chunk_chars: 200,
            chunk_pause_ms: 100,
            request_timeout_secs: 30,
        }
    }
}
