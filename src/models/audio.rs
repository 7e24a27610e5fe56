use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::voice::{Emotion, VoiceEmotions, VoiceTransformation};

/// Запись о сохранённом аудиофайле (коллекция `audioFiles`).
///
/// Меняются только `name` и `tags`; удалить запись может только владелец.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioFile {
    pub id: String,
    pub user_id: String,
    pub url: String,
    /// Identifier inside object storage, needed for server-side transforms.
    pub public_id: String,
    pub name: String,
    pub format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformation: Option<VoiceTransformation>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Response of a generation request, also the cached payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedAudio {
    pub id: String,
    pub url: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    pub format: String,
}

impl From<&AudioFile> for GeneratedAudio {
    fn from(file: &AudioFile) -> Self {
        Self {
            id: file.id.clone(),
            url: file.url.clone(),
            name: file.name.clone(),
            duration: file.duration,
            format: file.format.clone(),
        }
    }
}

/// Сохранённый пресет преобразования (коллекция `voicePresets`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoicePreset {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub transformation: VoiceTransformation,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub is_public: bool,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VoicePreset {
    pub fn visible_to(&self, user_id: &str) -> bool {
        self.is_public || self.user_id == user_id
    }
}

/// Fields a caller supplies when creating or replacing a preset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPreset {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub transformation: VoiceTransformation,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub is_public: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PitchStats {
    /// Hz
    pub mean: f64,
    pub range: f64,
    pub variability: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TempoStats {
    pub words_per_minute: f64,
    /// 0..1, 1 = perfectly even syllable spacing
    pub beat_regularity: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnergyProfile {
    pub overall: f64,
    pub distribution: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmotionalMarkers {
    pub dominant_emotion: Emotion,
    pub confidence: f64,
    pub emotion_scores: VoiceEmotions,
}

impl EmotionalMarkers {
    /// Используется, когда в записи нет голоса
    pub fn neutral() -> Self {
        let mut scores = VoiceEmotions::default();
        for emotion in Emotion::ALL {
            scores.set(emotion, 0.0);
        }
        scores.set(Emotion::Neutral, 100.0);
        Self {
            dominant_emotion: Emotion::Neutral,
            confidence: 0.0,
            emotion_scores: scores,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityScores {
    /// 0..100
    pub clarity: f64,
    /// Signal-to-noise ratio, dB
    pub snr: f64,
    /// Percentage of clipped samples
    pub distortion: f64,
}

/// Derived, non-authoritative measurement of a processed voice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceAnalysis {
    pub pitch: PitchStats,
    pub tempo: TempoStats,
    pub energy: EnergyProfile,
    pub emotional_markers: EmotionalMarkers,
    pub quality: QualityScores,
}

/// Результат оркестратора (коллекция `processedVoices`), пишется один раз
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedVoiceResult {
    pub id: String,
    pub original_audio_id: String,
    pub url: String,
    pub duration: f64,
    pub format: String,
    pub transformation: VoiceTransformation,
    pub analysis: VoiceAnalysis,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<VoicePreset>,
    pub created_at: DateTime<Utc>,
}

/// Остаток квот пользователя на текущие сутки
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaSnapshot {
    pub voice_generations: i64,
    pub api_calls: i64,
    pub storage_used_mb: f64,
    pub storage_remaining_mb: f64,
}
