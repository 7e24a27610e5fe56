use serde::{Deserialize, Serialize};

use crate::errors::{AppError, AppResult};

/// Эмоции в фиксированном порядке обхода.
///
/// Порядок объявления определяет tie-break при равных весах: побеждает
/// эмоция, встреченная первой.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Happiness,
    Sadness,
    Anger,
    Fear,
    Surprise,
    Neutral,
}

impl Emotion {
    pub const ALL: [Emotion; 6] = [
        Emotion::Happiness,
        Emotion::Sadness,
        Emotion::Anger,
        Emotion::Fear,
        Emotion::Surprise,
        Emotion::Neutral,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Happiness => "happiness",
            Emotion::Sadness => "sadness",
            Emotion::Anger => "anger",
            Emotion::Fear => "fear",
            Emotion::Surprise => "surprise",
            Emotion::Neutral => "neutral",
        }
    }
}

/// Emotion name -> weight. Unset emotions do not take part in selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceEmotions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub happiness: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sadness: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anger: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fear: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub surprise: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub neutral: Option<f64>,
}

impl VoiceEmotions {
    pub fn get(&self, emotion: Emotion) -> Option<f64> {
        match emotion {
            Emotion::Happiness => self.happiness,
            Emotion::Sadness => self.sadness,
            Emotion::Anger => self.anger,
            Emotion::Fear => self.fear,
            Emotion::Surprise => self.surprise,
            Emotion::Neutral => self.neutral,
        }
    }

    pub fn set(&mut self, emotion: Emotion, weight: f64) {
        let slot = match emotion {
            Emotion::Happiness => &mut self.happiness,
            Emotion::Sadness => &mut self.sadness,
            Emotion::Anger => &mut self.anger,
            Emotion::Fear => &mut self.fear,
            Emotion::Surprise => &mut self.surprise,
            Emotion::Neutral => &mut self.neutral,
        };
        *slot = Some(weight);
    }

    /// Present weights in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (Emotion, f64)> + '_ {
        Emotion::ALL
            .iter()
            .filter_map(move |emotion| self.get(*emotion).map(|weight| (*emotion, weight)))
    }

    /// Highest weight wins; on a tie the first one encountered stays.
    pub fn dominant(&self) -> Option<(Emotion, f64)> {
        self.iter().fold(None, |best, (emotion, weight)| match best {
            Some((_, best_weight)) if weight <= best_weight => best,
            _ => Some((emotion, weight)),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    fn merge(&self, other: &Self) -> Self {
        Self {
            happiness: other.happiness.or(self.happiness),
            sadness: other.sadness.or(self.sadness),
            anger: other.anger.or(self.anger),
            fear: other.fear.or(self.fear),
            surprise: other.surprise.or(self.surprise),
            neutral: other.neutral.or(self.neutral),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceCharacteristics {
    /// 0 (child) .. 100 (elder)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<f64>,
    /// -100 (masculine) .. 100 (feminine)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accent: Option<String>,
}

impl VoiceCharacteristics {
    fn merge(&self, other: &Self) -> Self {
        Self {
            age: other.age.or(self.age),
            gender: other.gender.or(self.gender),
            accent: other.accent.clone().or_else(|| self.accent.clone()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReverbEffect {
    pub enabled: bool,
    /// 0..100
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decay: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EchoEffect {
    pub enabled: bool,
    /// Milliseconds, 0..1000
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay: Option<f64>,
    /// 0..1
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChorusEffect {
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceEffects {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reverb: Option<ReverbEffect>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub echo: Option<EchoEffect>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chorus: Option<ChorusEffect>,
}

impl VoiceEffects {
    // Блоки эффектов заменяются целиком
    fn merge(&self, other: &Self) -> Self {
        Self {
            reverb: other.reverb.clone().or_else(|| self.reverb.clone()),
            echo: other.echo.clone().or_else(|| self.echo.clone()),
            chorus: other.chorus.clone().or_else(|| self.chorus.clone()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundNoise {
    /// "none" | "ambient" | "music" | "crowd" | "nature"
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// 0..100
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
}

impl BackgroundNoise {
    /// Mixing is requested unless the type is absent or "none".
    pub fn is_requested(&self) -> bool {
        self.kind
            .as_deref()
            .is_some_and(|kind| !kind.eq_ignore_ascii_case("none"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioEnhancement {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub noise_suppression: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_gain_control: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dereverberation: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_noise: Option<BackgroundNoise>,
}

impl AudioEnhancement {
    fn merge(&self, other: &Self) -> Self {
        Self {
            noise_suppression: other.noise_suppression.or(self.noise_suppression),
            auto_gain_control: other.auto_gain_control.or(self.auto_gain_control),
            dereverberation: other.dereverberation.or(self.dereverberation),
            background_noise: other
                .background_noise
                .clone()
                .or_else(|| self.background_noise.clone()),
        }
    }
}

/// Formant / vibrato / breathiness shaping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvancedModifications {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formant: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vibrato: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breathiness: Option<f64>,
}

impl AdvancedModifications {
    pub fn is_requested(&self) -> bool {
        self.formant.is_some() || self.vibrato.is_some() || self.breathiness.is_some()
    }

    fn merge(&self, other: &Self) -> Self {
        Self {
            formant: other.formant.or(self.formant),
            vibrato: other.vibrato.or(self.vibrato),
            breathiness: other.breathiness.or(self.breathiness),
        }
    }
}

/// Параметры преобразования голоса.
///
/// Каждое поле независимо опционально: отсутствие означает "без изменений",
/// а не ноль. Поля сериализуются в порядке объявления, поэтому JSON-форма
/// детерминирована и годится для ключей кэша.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceTransformation {
    /// -100..100
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pitch: Option<f64>,
    /// 0.1..3.0 multiplier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    /// -50..50
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emotions: Option<VoiceEmotions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub characteristics: Option<VoiceCharacteristics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effects: Option<VoiceEffects>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enhancement: Option<AudioEnhancement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advanced: Option<AdvancedModifications>,
}

fn merge_nested<T: Clone>(base: &Option<T>, over: &Option<T>, merge: impl Fn(&T, &T) -> T) -> Option<T> {
    match (base, over) {
        (Some(base), Some(over)) => Some(merge(base, over)),
        (None, Some(over)) => Some(over.clone()),
        (Some(base), None) => Some(base.clone()),
        (None, None) => None,
    }
}

fn check_range(field: &str, value: f64, min: f64, max: f64) -> AppResult<()> {
    if value.is_nan() || value < min || value > max {
        return Err(AppError::Validation(format!(
            "{} must be between {} and {}",
            field, min, max
        )));
    }
    Ok(())
}

impl VoiceTransformation {
    /// `self` ∘ `overrides`: every field present in `overrides` wins,
    /// nested blocks are merged one level deep.
    pub fn merge(&self, overrides: &VoiceTransformation) -> VoiceTransformation {
        VoiceTransformation {
            pitch: overrides.pitch.or(self.pitch),
            speed: overrides.speed.or(self.speed),
            volume: overrides.volume.or(self.volume),
            emotions: merge_nested(&self.emotions, &overrides.emotions, VoiceEmotions::merge),
            characteristics: merge_nested(
                &self.characteristics,
                &overrides.characteristics,
                VoiceCharacteristics::merge,
            ),
            effects: merge_nested(&self.effects, &overrides.effects, VoiceEffects::merge),
            enhancement: merge_nested(&self.enhancement, &overrides.enhancement, AudioEnhancement::merge),
            advanced: merge_nested(&self.advanced, &overrides.advanced, AdvancedModifications::merge),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == VoiceTransformation::default()
    }

    /// Stable serialized form, used for cache keys.
    pub fn canonical_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn validate(&self) -> AppResult<()> {
        if let Some(pitch) = self.pitch {
            check_range("Pitch", pitch, -100.0, 100.0)?;
        }
        if let Some(speed) = self.speed {
            check_range("Speed", speed, 0.1, 3.0)?;
        }
        if let Some(volume) = self.volume {
            check_range("Volume", volume, -50.0, 50.0)?;
        }

        if let Some(emotions) = &self.emotions {
            for (emotion, weight) in emotions.iter() {
                check_range(emotion.as_str(), weight, 0.0, 1.0)?;
            }
        }

        if let Some(characteristics) = &self.characteristics {
            if let Some(age) = characteristics.age {
                check_range("Age", age, 0.0, 100.0)?;
            }
            if let Some(gender) = characteristics.gender {
                check_range("Gender", gender, -100.0, 100.0)?;
            }
        }

        if let Some(effects) = &self.effects {
            if let Some(reverb) = effects.reverb.as_ref().filter(|r| r.enabled) {
                let decay = reverb.decay.ok_or_else(|| {
                    AppError::Validation("Decay is required when reverb is enabled".to_string())
                })?;
                check_range("Reverb decay", decay, 0.0, 100.0)?;
            }
            if let Some(echo) = effects.echo.as_ref().filter(|e| e.enabled) {
                let (Some(delay), Some(feedback)) = (echo.delay, echo.feedback) else {
                    return Err(AppError::Validation(
                        "Delay and feedback are required when echo is enabled".to_string(),
                    ));
                };
                check_range("Echo delay", delay, 0.0, 1000.0)?;
                check_range("Echo feedback", feedback, 0.0, 1.0)?;
            }
        }

        if let Some(noise) = self
            .enhancement
            .as_ref()
            .and_then(|e| e.background_noise.as_ref())
        {
            if let Some(volume) = noise.volume {
                check_range("Background noise volume", volume, 0.0, 100.0)?;
            }
        }

        Ok(())
    }
}
