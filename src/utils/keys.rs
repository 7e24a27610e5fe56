//! # Ключи хранилища
//!
//! Единственное место, где собираются строки ключей для кэша и квот.
//! Все сбрасываемые пользовательские ключи содержат сегмент `:{user_id}:`,
//! поэтому [`user_pattern`] находит их одним сканированием. Счётчик места
//! описывает файлы, которые реально лежат в хранилище, и под шаблон не попадает.

use std::fmt;

use chrono::NaiveDate;

use crate::models::VoiceTransformation;

/// Count-based quota buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    VoiceGeneration,
    AudioGeneration,
    AudioTransformation,
    ApiCall,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::VoiceGeneration => "voice-generation",
            OperationKind::AudioGeneration => "audio-generation",
            OperationKind::AudioTransformation => "audio-transformation",
            OperationKind::ApiCall => "api-call",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            OperationKind::VoiceGeneration => "voice generation",
            OperationKind::AudioGeneration => "audio generation",
            OperationKind::AudioTransformation => "audio transformation",
            OperationKind::ApiCall => "API call",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key into the key/value store. Only constructible through the builders below.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreKey(String);

impl StoreKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Day-scoped counter for `(user, kind, UTC day)`.
    pub fn daily_quota(user_id: &str, kind: OperationKind, day: NaiveDate) -> Self {
        StoreKey(format!("quota:{}:{}:{}", kind.as_str(), user_id, day.format("%Y-%m-%d")))
    }

    /// Cumulative storage usage in kilobytes. Not matched by [`user_pattern`].
    pub fn storage_usage(user_id: &str) -> Self {
        StoreKey(format!("storage-kb:{}", user_id))
    }

    /// Content-addressable generation result.
    pub fn voice_result(
        user_id: &str,
        text: &str,
        voice_id: &str,
        transformation: &VoiceTransformation,
    ) -> Self {
        let text_digest = md5::compute(text.as_bytes());
        let transformation_digest = md5::compute(transformation.canonical_json().as_bytes());
        StoreKey(format!(
            "voice:{}:{:x}:{}:{:x}",
            user_id, text_digest, voice_id, transformation_digest
        ))
    }

    pub fn preset(preset_id: &str) -> Self {
        StoreKey(format!("preset:{}", preset_id))
    }

    pub fn user_presets(user_id: &str) -> Self {
        StoreKey(format!("presets:{}:list", user_id))
    }

    pub fn user_audio_files(user_id: &str) -> Self {
        StoreKey(format!("user:{}:audio-files", user_id))
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Glob matching every key that belongs to `user_id`.
pub fn user_pattern(user_id: &str) -> String {
    format!("*:{}:*", user_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 17).unwrap()
    }

    #[test]
    fn quota_key_is_day_scoped() {
        let key = StoreKey::daily_quota("u1", OperationKind::VoiceGeneration, day());
        assert_eq!(key.as_str(), "quota:voice-generation:u1:2026-10-17");

        let next = StoreKey::daily_quota(
            "u1",
            OperationKind::VoiceGeneration,
            day().succ_opt().unwrap(),
        );
        assert_ne!(key, next);
    }

    #[test]
    fn voice_result_key_is_deterministic() {
        let t = VoiceTransformation {
            pitch: Some(10.0),
            speed: Some(1.2),
            ..Default::default()
        };
        let a = StoreKey::voice_result("u1", "Hello world", "voice1", &t);
        let b = StoreKey::voice_result("u1", "Hello world", "voice1", &t.clone());
        assert_eq!(a, b);

        let other_voice = StoreKey::voice_result("u1", "Hello world", "voice2", &t);
        let other_text = StoreKey::voice_result("u1", "Hello there", "voice1", &t);
        let other_user = StoreKey::voice_result("u2", "Hello world", "voice1", &t);
        assert_ne!(a, other_voice);
        assert_ne!(a, other_text);
        assert_ne!(a, other_user);
    }

    #[test]
    fn user_keys_contain_user_segment() {
        let segment = ":u42:";
        let t = VoiceTransformation::default();
        for key in [
            StoreKey::daily_quota("u42", OperationKind::ApiCall, day()),
            StoreKey::voice_result("u42", "x", "v", &t),
            StoreKey::user_presets("u42"),
            StoreKey::user_audio_files("u42"),
        ] {
            assert!(key.as_str().contains(segment), "{}", key);
        }
        assert_eq!(user_pattern("u42"), "*:u42:*");
        assert!(!StoreKey::storage_usage("u42").as_str().contains(segment));
    }
}
