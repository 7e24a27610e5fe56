//! # Voice Processing Orchestrator
//!
//! Преобразование уже сохранённого аудио: базовая часть (pitch/speed/volume)
//! выполняется на стороне хранилища, остальные стадии идут по очереди над
//! скачанным буфером, результат загружается заново, анализируется и
//! записывается в `processedVoices`.
//!
//! Любая ошибка стадии прерывает весь конвейер. Промежуточные объекты в
//! хранилище удаляются, частичный результат никогда не записывается.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use log::{debug, info, warn};

use crate::errors::{AppError, AppResult};
use crate::models::{AudioFile, ProcessedVoiceResult, VoicePreset, VoiceTransformation};
use crate::services::audio::{EmotionClassifier, SignalStage, analyze, decode_audio};
use crate::services::presets::PresetService;
use crate::services::store::documents::{create_typed, get_typed};
use crate::services::store::{BasicAdjustments, Collection, DocumentStore, ObjectStorage, StoredObject};

/// Output of [`StagePipeline::run`].
#[derive(Debug, Clone)]
pub struct ProcessedAudio {
    pub bytes: Bytes,
    /// False when every stage passed the buffer through untouched.
    pub changed: bool,
}

/// Advanced modifications, the filter chain, then enhancement.
pub struct StagePipeline {
    advanced: Arc<dyn SignalStage>,
    chain: Arc<dyn SignalStage>,
    enhancement: Arc<dyn SignalStage>,
}

impl StagePipeline {
    pub fn new(
        advanced: Arc<dyn SignalStage>,
        chain: Arc<dyn SignalStage>,
        enhancement: Arc<dyn SignalStage>,
    ) -> Self {
        Self {
            advanced,
            chain,
            enhancement,
        }
    }

    pub async fn run(&self, audio: Bytes, transformation: &VoiceTransformation) -> AppResult<ProcessedAudio> {
        let original = audio.clone();
        let mut audio = audio;

        if transformation
            .advanced
            .as_ref()
            .is_some_and(|advanced| advanced.is_requested())
        {
            debug!("Stage {}", self.advanced.name());
            audio = self.advanced.apply(audio, transformation).await?;
        }

        debug!("Stage {}", self.chain.name());
        audio = self.chain.apply(audio, transformation).await?;

        if transformation.enhancement.is_some() {
            debug!("Stage {}", self.enhancement.name());
            audio = self.enhancement.apply(audio, transformation).await?;
        }

        let changed = audio != original;
        Ok(ProcessedAudio {
            bytes: audio,
            changed,
        })
    }
}

pub struct VoiceProcessor {
    documents: Arc<dyn DocumentStore>,
    storage: Arc<dyn ObjectStorage>,
    presets: Arc<PresetService>,
    pipeline: StagePipeline,
    classifier: Arc<dyn EmotionClassifier>,
    output_format: String,
}

impl VoiceProcessor {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        storage: Arc<dyn ObjectStorage>,
        presets: Arc<PresetService>,
        pipeline: StagePipeline,
        classifier: Arc<dyn EmotionClassifier>,
        output_format: &str,
    ) -> Self {
        Self {
            documents,
            storage,
            presets,
            pipeline,
            classifier,
            output_format: output_format.to_string(),
        }
    }

    pub async fn process(
        &self,
        audio_id: &str,
        user_id: &str,
        transformation: &VoiceTransformation,
        preset_id: Option<&str>,
    ) -> AppResult<ProcessedVoiceResult> {
        // чужая запись неотличима от отсутствующей
        let audio: AudioFile = get_typed(self.documents.as_ref(), Collection::AudioFiles, audio_id)
            .await?
            .filter(|audio: &AudioFile| audio.user_id == user_id)
            .ok_or_else(|| AppError::NotFound("Audio".to_string()))?;

        let preset = match preset_id {
            Some(id) => Some(self.presets.get(user_id, id).await?),
            None => None,
        };
        let effective = match &preset {
            Some(preset) => preset.transformation.merge(transformation),
            None => transformation.clone(),
        };
        effective.validate()?;

        info!("Processing audio {} for {}", audio.id, user_id);
        let derived = self
            .storage
            .explicit_transform(&audio.public_id, &BasicAdjustments::from_transformation(&effective))
            .await?;

        let outcome = self.complete(&audio, user_id, &effective, preset, &derived).await;
        // промежуточный объект не нужен ни при успехе, ни при ошибке
        self.discard(&derived.public_id).await;
        outcome
    }

    async fn complete(
        &self,
        audio: &AudioFile,
        user_id: &str,
        effective: &VoiceTransformation,
        preset: Option<VoicePreset>,
        derived: &StoredObject,
    ) -> AppResult<ProcessedVoiceResult> {
        let downloaded = self.storage.download(&derived.url).await?;
        let processed = self.pipeline.run(downloaded, effective).await?;

        let format = if processed.changed {
            self.output_format.clone()
        } else {
            derived.format.clone()
        };
        let stored = self
            .storage
            .upload(processed.bytes.clone(), &format!("processed/{}", user_id), &format)
            .await?;

        match self.analyze_and_persist(audio, effective, preset, &stored, &processed.bytes).await {
            Ok(result) => Ok(result),
            Err(e) => {
                self.discard(&stored.public_id).await;
                Err(e)
            }
        }
    }

    async fn analyze_and_persist(
        &self,
        audio: &AudioFile,
        effective: &VoiceTransformation,
        preset: Option<VoicePreset>,
        stored: &StoredObject,
        bytes: &Bytes,
    ) -> AppResult<ProcessedVoiceResult> {
        let decoded = decode_audio(bytes)?;
        let analysis = analyze(&decoded, self.classifier.as_ref());

        let result = ProcessedVoiceResult {
            id: uuid::Uuid::new_v4().to_string(),
            original_audio_id: audio.id.clone(),
            url: stored.url.clone(),
            duration: decoded.duration_secs(),
            format: stored.format.clone(),
            transformation: effective.clone(),
            analysis,
            preset,
            created_at: Utc::now(),
        };
        let saved: ProcessedVoiceResult =
            create_typed(self.documents.as_ref(), Collection::ProcessedVoices, &result).await?;
        info!("Processed voice {} from audio {}", saved.id, audio.id);
        Ok(saved)
    }

    async fn discard(&self, public_id: &str) {
        if let Err(e) = self.storage.delete(public_id).await {
            warn!("Could not remove intermediate object {}: {}", public_id, e);
        }
    }
}
