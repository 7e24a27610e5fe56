//! Стадии обработки сигнала поверх закодированного буфера.
//!
//! Оркестратор не знает, чем реализована стадия: цепочкой ffmpeg, моделью
//! или ничем. Для "ничем" есть две явные реализации: [`PassThroughStage`]
//! (осознанный no-op) и [`UnwiredStage`] (возможность не подключена,
//! запрос с ней должен упасть).

use std::sync::Arc;

use bytes::Bytes;
use log::{debug, warn};

use super::chain::{ChainStage, build_stages};
use super::ffmpeg::FilterGraphExecutor;
use super::filters::{AudioFilter, CompressorSettings, FilterProgram};
use crate::errors::{AppError, AppResult};
use crate::models::VoiceTransformation;

const AUTO_GAIN_BOOST: f64 = 1.5;

#[async_trait::async_trait]
pub trait SignalStage: Send + Sync {
    fn name(&self) -> &str;

    async fn apply(&self, audio: Bytes, transformation: &VoiceTransformation) -> AppResult<Bytes>;
}

/// Returns the buffer unchanged.
#[derive(Debug, Clone, Default)]
pub struct PassThroughStage;

#[async_trait::async_trait]
impl SignalStage for PassThroughStage {
    fn name(&self) -> &str {
        "pass-through"
    }

    async fn apply(&self, audio: Bytes, _transformation: &VoiceTransformation) -> AppResult<Bytes> {
        Ok(audio)
    }
}

/// Placeholder for a capability without a backing implementation.
#[derive(Debug, Clone)]
pub struct UnwiredStage {
    capability: String,
}

impl UnwiredStage {
    pub fn new(capability: impl Into<String>) -> Self {
        Self {
            capability: capability.into(),
        }
    }
}

#[async_trait::async_trait]
impl SignalStage for UnwiredStage {
    fn name(&self) -> &str {
        &self.capability
    }

    async fn apply(&self, _audio: Bytes, _transformation: &VoiceTransformation) -> AppResult<Bytes> {
        warn!("Requested {} but no implementation is wired", self.capability);
        Err(AppError::Unimplemented(self.capability.clone()))
    }
}

/// Selected chain stages executed in one filter-graph pass.
pub struct FilterChainStage {
    executor: Arc<dyn FilterGraphExecutor>,
    stages: Vec<ChainStage>,
}

impl FilterChainStage {
    pub fn new(executor: Arc<dyn FilterGraphExecutor>, stages: &[ChainStage]) -> Self {
        Self {
            executor,
            stages: stages.to_vec(),
        }
    }
}

#[async_trait::async_trait]
impl SignalStage for FilterChainStage {
    fn name(&self) -> &str {
        "filter-chain"
    }

    async fn apply(&self, audio: Bytes, transformation: &VoiceTransformation) -> AppResult<Bytes> {
        let program = build_stages(transformation, &self.stages);
        if program.is_empty() {
            return Ok(audio);
        }
        self.executor.execute(audio, &program).await
    }
}

/// Noise suppression and auto gain over the executor.
///
/// Dereverberation and background-noise mixing have no implementation and
/// fail before anything runs.
pub struct FilterGraphEnhancer {
    executor: Arc<dyn FilterGraphExecutor>,
}

impl FilterGraphEnhancer {
    pub fn new(executor: Arc<dyn FilterGraphExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait::async_trait]
impl SignalStage for FilterGraphEnhancer {
    fn name(&self) -> &str {
        "enhancement"
    }

    async fn apply(&self, audio: Bytes, transformation: &VoiceTransformation) -> AppResult<Bytes> {
        let Some(enhancement) = &transformation.enhancement else {
            return Ok(audio);
        };

        if enhancement.dereverberation == Some(true) {
            return Err(AppError::Unimplemented("Dereverberation".to_string()));
        }
        if enhancement
            .background_noise
            .as_ref()
            .is_some_and(|noise| noise.is_requested())
        {
            return Err(AppError::Unimplemented("Background noise mixing".to_string()));
        }

        let mut program = FilterProgram::new();
        if enhancement.noise_suppression == Some(true) {
            program.push(AudioFilter::Denoise);
        }
        if enhancement.auto_gain_control == Some(true) {
            program.push(AudioFilter::Compressor(CompressorSettings::default()));
            program.push(AudioFilter::Gain {
                factor: AUTO_GAIN_BOOST,
            });
        }

        if program.is_empty() {
            return Ok(audio);
        }
        debug!("Applying enhancement with {} filters", program.filters().len());
        self.executor.execute(audio, &program).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AudioEnhancement, BackgroundNoise, Emotion, VoiceEmotions};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingExecutor {
        graphs: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl FilterGraphExecutor for RecordingExecutor {
        async fn execute(&self, input: Bytes, program: &FilterProgram) -> AppResult<Bytes> {
            self.graphs.lock().push(program.to_filter_graph(44100));
            Ok(input)
        }
    }

    fn enhancement(e: AudioEnhancement) -> VoiceTransformation {
        VoiceTransformation {
            enhancement: Some(e),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn unwired_stage_fails_loudly() {
        let stage = UnwiredStage::new("Advanced voice modification");
        let err = stage
            .apply(Bytes::from_static(b"x"), &VoiceTransformation::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unimplemented(_)));
    }

    #[tokio::test]
    async fn pass_through_keeps_bytes() {
        let audio = Bytes::from_static(b"abc");
        let out = PassThroughStage
            .apply(audio.clone(), &VoiceTransformation::default())
            .await
            .unwrap();
        assert_eq!(out, audio);
    }

    #[tokio::test]
    async fn enhancer_builds_denoise_and_gain() {
        let executor = Arc::new(RecordingExecutor::default());
        let stage = FilterGraphEnhancer::new(executor.clone());
        let t = enhancement(AudioEnhancement {
            noise_suppression: Some(true),
            auto_gain_control: Some(true),
            ..Default::default()
        });
        stage.apply(Bytes::from_static(b"x"), &t).await.unwrap();
        assert_eq!(
            executor.graphs.lock().as_slice(),
            &["afftdn,acompressor=threshold=-24dB:ratio=12:attack=3:release=250,volume=1.5".to_string()]
        );
    }

    #[tokio::test]
    async fn enhancer_rejects_unbacked_options_before_running() {
        let executor = Arc::new(RecordingExecutor::default());
        let stage = FilterGraphEnhancer::new(executor.clone());

        let t = enhancement(AudioEnhancement {
            noise_suppression: Some(true),
            dereverberation: Some(true),
            ..Default::default()
        });
        let err = stage.apply(Bytes::from_static(b"x"), &t).await.unwrap_err();
        assert!(matches!(err, AppError::Unimplemented(_)));

        let t = enhancement(AudioEnhancement {
            background_noise: Some(BackgroundNoise {
                kind: Some("crowd".to_string()),
                volume: Some(20.0),
            }),
            ..Default::default()
        });
        assert!(stage.apply(Bytes::from_static(b"x"), &t).await.is_err());
        assert!(executor.graphs.lock().is_empty());

        // "none" означает, что смешивать нечего
        let t = enhancement(AudioEnhancement {
            background_noise: Some(BackgroundNoise {
                kind: Some("none".to_string()),
                volume: None,
            }),
            ..Default::default()
        });
        assert!(stage.apply(Bytes::from_static(b"x"), &t).await.is_ok());
    }

    #[tokio::test]
    async fn chain_stage_skips_executor_when_nothing_applies() {
        let executor = Arc::new(RecordingExecutor::default());
        let stage = FilterChainStage::new(executor.clone(), &[ChainStage::Emotion]);

        let t = VoiceTransformation {
            pitch: Some(30.0),
            ..Default::default()
        };
        stage.apply(Bytes::from_static(b"x"), &t).await.unwrap();
        assert!(executor.graphs.lock().is_empty());

        let mut emotions = VoiceEmotions::default();
        emotions.set(Emotion::Sadness, 0.6);
        let t = VoiceTransformation {
            emotions: Some(emotions),
            ..Default::default()
        };
        stage.apply(Bytes::from_static(b"x"), &t).await.unwrap();
        assert_eq!(
            executor.graphs.lock().as_slice(),
            &["asetrate=39690,aresample=44100,atempo=0.9".to_string()]
        );
    }
}
