//! # Audio library
//!
//! Генерация речи по тексту и работа с сохранёнными файлами пользователя.
//!
//! Генерация проходит состояния
//! `Admitted -> CacheChecked -> (hit: Done) | Synthesizing -> Transforming
//! -> Uploading -> Analyzing -> Persisting -> Done`; из любого состояния
//! возможен переход в `Failed`, повторов внутри конвейера нет.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::RequestLimits;
use crate::errors::{AppError, AppResult};
use crate::models::{AudioFile, GeneratedAudio, ProcessedVoiceResult, VoiceTransformation};
use crate::services::cache::{CachedResult, ResultCache};
use crate::services::processing::{StagePipeline, VoiceProcessor};
use crate::services::quota::QuotaLedger;
use crate::services::store::documents::{create_typed, get_typed, list_typed, update_typed};
use crate::services::store::{Collection, Direction, DocumentStore, ObjectStorage, Query, StoredObject};
use crate::services::tts::SynthesisSelector;
use crate::utils::keys::OperationKind;
use crate::utils::text::{prepare_text_for_tts, validate_text};

pub const DEFAULT_VOICE: &str = "default";
const NAME_PREVIEW_CHARS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationState {
    Admitted,
    CacheChecked,
    Synthesizing,
    Transforming,
    Uploading,
    Analyzing,
    Persisting,
    Done,
}

impl fmt::Display for GenerationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GenerationState::Admitted => "admitted",
            GenerationState::CacheChecked => "cache-checked",
            GenerationState::Synthesizing => "synthesizing",
            GenerationState::Transforming => "transforming",
            GenerationState::Uploading => "uploading",
            GenerationState::Analyzing => "analyzing",
            GenerationState::Persisting => "persisting",
            GenerationState::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub text: String,
    #[serde(default, alias = "voice")]
    pub voice_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "settings")]
    pub transformation: VoiceTransformation,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

pub struct AudioLibrary {
    quota: Arc<QuotaLedger>,
    cache: Arc<ResultCache>,
    selector: Arc<SynthesisSelector>,
    pipeline: StagePipeline,
    storage: Arc<dyn ObjectStorage>,
    documents: Arc<dyn DocumentStore>,
    processor: Arc<VoiceProcessor>,
    limits: RequestLimits,
    output_format: String,
}

fn default_name(text: &str) -> String {
    let preview: String = text.chars().take(NAME_PREVIEW_CHARS).collect();
    if text.chars().count() > NAME_PREVIEW_CHARS {
        format!("{}...", preview.trim_end())
    } else {
        preview
    }
}

impl AudioLibrary {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        quota: Arc<QuotaLedger>,
        cache: Arc<ResultCache>,
        selector: Arc<SynthesisSelector>,
        pipeline: StagePipeline,
        storage: Arc<dyn ObjectStorage>,
        documents: Arc<dyn DocumentStore>,
        processor: Arc<VoiceProcessor>,
        limits: RequestLimits,
        output_format: &str,
    ) -> Self {
        Self {
            quota,
            cache,
            selector,
            pipeline,
            storage,
            documents,
            processor,
            limits,
            output_format: output_format.to_string(),
        }
    }

    fn enter(&self, user_id: &str, state: GenerationState) {
        info!("[{}] generation {}", user_id, state);
    }

    fn check_duration(&self, duration: Option<f64>) -> AppResult<()> {
        let max = self.limits.max_audio_duration_secs;
        if duration.is_some_and(|d| d > max) {
            return Err(AppError::Validation(format!(
                "Audio duration exceeds limit of {} seconds.",
                max
            )));
        }
        Ok(())
    }

    /// Drops an object that will not be recorded and returns its space.
    async fn abandon(&self, user_id: &str, stored: &StoredObject) {
        if let Err(e) = self.storage.delete(&stored.public_id).await {
            warn!("Could not remove {}: {}", stored.public_id, e);
        }
        if let Err(e) = self.quota.release_storage(user_id, stored.bytes).await {
            warn!("Could not release storage for {}: {}", user_id, e);
        }
    }

    /// A cached result counts only while its record still exists.
    /// Legacy URL-only entries are resolved through the user's records.
    async fn resolve_cached(&self, user_id: &str, cached: CachedResult) -> AppResult<Option<GeneratedAudio>> {
        match cached {
            CachedResult::Payload(payload) => {
                let record = get_typed::<AudioFile>(self.documents.as_ref(), Collection::AudioFiles, &payload.id)
                    .await?
                    .filter(|file| file.user_id == user_id);
                if record.is_none() {
                    debug!("[{}] cached result {} has no record, regenerating", user_id, payload.id);
                }
                Ok(record.map(|_| payload))
            }
            CachedResult::Url(url) => {
                let query = Query::new()
                    .where_eq("userId", user_id)
                    .where_eq("url", url.as_str());
                let files: Vec<AudioFile> =
                    list_typed(self.documents.as_ref(), Collection::AudioFiles, &query).await?;
                Ok(files.first().map(GeneratedAudio::from))
            }
        }
    }

    /// Text to stored, transformed speech. Identical requests are served from cache.
    pub async fn generate(&self, user_id: &str, request: GenerateRequest) -> AppResult<GeneratedAudio> {
        let text = prepare_text_for_tts(&request.text);
        validate_text(&text, self.limits.max_text_length)?;
        request.transformation.validate()?;
        let voice_id = request
            .voice_id
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(DEFAULT_VOICE);
        let transformation = &request.transformation;

        self.quota.check(user_id, OperationKind::VoiceGeneration).await?;
        self.enter(user_id, GenerationState::Admitted);

        let cached = self.cache.lookup(user_id, &text, voice_id, transformation).await;
        self.enter(user_id, GenerationState::CacheChecked);
        if let Some(cached) = cached {
            if let Some(hit) = self.resolve_cached(user_id, cached).await? {
                info!("[{}] cache hit for {}", user_id, hit.id);
                self.enter(user_id, GenerationState::Done);
                return Ok(hit);
            }
        }

        self.enter(user_id, GenerationState::Synthesizing);
        let base = self.selector.synthesize_base(&text, voice_id).await?;

        self.enter(user_id, GenerationState::Transforming);
        let processed = self.pipeline.run(base.bytes.clone(), transformation).await?;
        let format = if processed.changed {
            self.output_format.clone()
        } else {
            "mp3".to_string()
        };

        self.enter(user_id, GenerationState::Uploading);
        let size = processed.bytes.len() as u64;
        self.quota.admit_storage(user_id, size).await?;
        let stored = match self
            .storage
            .upload(processed.bytes, &format!("voice-generator/{}", user_id), &format)
            .await
        {
            Ok(stored) => stored,
            Err(e) => {
                if let Err(release) = self.quota.release_storage(user_id, size).await {
                    warn!("Could not release storage for {}: {}", user_id, release);
                }
                return Err(e);
            }
        };

        self.enter(user_id, GenerationState::Analyzing);
        if let Err(e) = self.check_duration(stored.duration) {
            self.abandon(user_id, &stored).await;
            return Err(e);
        }

        self.enter(user_id, GenerationState::Persisting);
        let id = uuid::Uuid::new_v4().to_string();
        let name = request
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| default_name(&text));
        let result = GeneratedAudio {
            id: id.clone(),
            url: stored.url.clone(),
            name: name.clone(),
            duration: stored.duration,
            format: stored.format.clone(),
        };
        self.cache
            .store(user_id, &text, voice_id, transformation, &result)
            .await;

        let now = Utc::now();
        let record = AudioFile {
            id,
            user_id: user_id.to_string(),
            url: stored.url.clone(),
            public_id: stored.public_id.clone(),
            name,
            format: stored.format.clone(),
            duration: stored.duration,
            bytes: Some(stored.bytes),
            transformation: Some(transformation.clone()),
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        if let Err(e) = create_typed::<_, AudioFile>(self.documents.as_ref(), Collection::AudioFiles, &record).await {
            self.abandon(user_id, &stored).await;
            return Err(e);
        }
        self.cache.forget_audio_list(user_id).await;

        self.enter(user_id, GenerationState::Done);
        Ok(result)
    }

    /// Stores a user-provided recording.
    pub async fn upload(&self, user_id: &str, data: Bytes, name: &str, format: &str) -> AppResult<AudioFile> {
        if data.is_empty() {
            return Err(AppError::Validation("Audio file is required".to_string()));
        }
        let format = format.trim().trim_start_matches('.').to_ascii_lowercase();
        if format.is_empty() || !format.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(AppError::Validation("Unsupported audio format".to_string()));
        }

        self.quota.check(user_id, OperationKind::AudioGeneration).await?;
        self.quota.admit_storage(user_id, data.len() as u64).await?;

        let size = data.len() as u64;
        let stored = match self.storage.upload(data, &format!("audio/{}", user_id), &format).await {
            Ok(stored) => stored,
            Err(e) => {
                if let Err(release) = self.quota.release_storage(user_id, size).await {
                    warn!("Could not release storage for {}: {}", user_id, release);
                }
                return Err(e);
            }
        };
        if let Err(e) = self.check_duration(stored.duration) {
            self.abandon(user_id, &stored).await;
            return Err(e);
        }

        let now = Utc::now();
        let record = AudioFile {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            url: stored.url.clone(),
            public_id: stored.public_id.clone(),
            name: if name.trim().is_empty() {
                "Untitled".to_string()
            } else {
                name.trim().to_string()
            },
            format: stored.format.clone(),
            duration: stored.duration,
            bytes: Some(stored.bytes),
            transformation: None,
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        let saved = match create_typed(self.documents.as_ref(), Collection::AudioFiles, &record).await {
            Ok(saved) => saved,
            Err(e) => {
                self.abandon(user_id, &stored).await;
                return Err(e);
            }
        };
        self.cache.forget_audio_list(user_id).await;
        Ok(saved)
    }

    /// The user's files, newest first.
    pub async fn list(&self, user_id: &str) -> AppResult<Vec<AudioFile>> {
        if let Some(files) = self.cache.audio_list(user_id).await {
            return Ok(files);
        }
        let query = Query::new()
            .where_eq("userId", user_id)
            .order_by("createdAt", Direction::Desc);
        let files: Vec<AudioFile> =
            list_typed(self.documents.as_ref(), Collection::AudioFiles, &query).await?;
        self.cache.put_audio_list(user_id, &files).await;
        Ok(files)
    }

    async fn owned(&self, user_id: &str, audio_id: &str) -> AppResult<AudioFile> {
        get_typed::<AudioFile>(self.documents.as_ref(), Collection::AudioFiles, audio_id)
            .await?
            .filter(|file| file.user_id == user_id)
            .ok_or_else(|| AppError::NotFound("Audio".to_string()))
    }

    /// Only `name` and `tags` can change.
    pub async fn rename(&self, user_id: &str, audio_id: &str, update: AudioUpdate) -> AppResult<AudioFile> {
        self.owned(user_id, audio_id).await?;

        let mut patch = serde_json::Map::new();
        if let Some(name) = update.name {
            if name.trim().is_empty() {
                return Err(AppError::Validation("Name cannot be empty".to_string()));
            }
            patch.insert("name".to_string(), json!(name.trim()));
        }
        if let Some(tags) = update.tags {
            patch.insert("tags".to_string(), json!(tags));
        }

        let updated: AudioFile = update_typed(
            self.documents.as_ref(),
            Collection::AudioFiles,
            audio_id,
            serde_json::Value::Object(patch),
        )
        .await?;
        self.cache.forget_audio_list(user_id).await;
        Ok(updated)
    }

    pub async fn delete(&self, user_id: &str, audio_id: &str) -> AppResult<()> {
        let file = self.owned(user_id, audio_id).await?;

        if let Err(e) = self.storage.delete(&file.public_id).await {
            warn!("Could not remove stored object {}: {}", file.public_id, e);
        }
        self.documents.delete(Collection::AudioFiles, audio_id).await?;
        if let Some(bytes) = file.bytes {
            self.quota.release_storage(user_id, bytes).await?;
        }
        self.cache.forget_audio_list(user_id).await;
        info!("Deleted audio {} of {}", audio_id, user_id);
        Ok(())
    }

    pub async fn transform(
        &self,
        user_id: &str,
        audio_id: &str,
        transformation: &VoiceTransformation,
        preset_id: Option<&str>,
    ) -> AppResult<ProcessedVoiceResult> {
        self.quota
            .check(user_id, OperationKind::AudioTransformation)
            .await?;
        self.processor
            .process(audio_id, user_id, transformation, preset_id)
            .await
    }
}
