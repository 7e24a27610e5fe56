//! # Synthesis Provider Selector
//!
//! Основной провайдер пробуется первым, только если для него настроен
//! ключ. Любая его ошибка ведёт к резервному провайдеру. Длинный текст для
//! провайдера с ограничением режется на чанки, которые синтезируются строго
//! последовательно с паузой между запросами; ошибка любого чанка роняет
//! весь запрос.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use log::{debug, error, info, warn};
use reqwest::Client;
use tempfile::NamedTempFile;

use super::chunking::split_text_into_chunks;
use super::google::GoogleTranslateProvider;
use super::voicerss::VoiceRssProvider;
use super::SpeechProvider;
use crate::config::TtsConfig;
use crate::errors::{AppError, AppResult};

/// Base audio written to a temp file that lives as long as this value.
#[derive(Debug)]
pub struct BaseAudio {
    pub bytes: Bytes,
    pub provider: String,
    pub chunks: usize,
    file: NamedTempFile,
}

impl BaseAudio {
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

pub struct SynthesisSelector {
    primary: Option<Arc<dyn SpeechProvider>>,
    fallback: Arc<dyn SpeechProvider>,
    chunk_pause: Duration,
    temp_dir: PathBuf,
}

impl SynthesisSelector {
    pub fn new(
        primary: Option<Arc<dyn SpeechProvider>>,
        fallback: Arc<dyn SpeechProvider>,
        chunk_pause: Duration,
        temp_dir: PathBuf,
    ) -> Self {
        Self {
            primary,
            fallback,
            chunk_pause,
            temp_dir,
        }
    }

    /// VoiceRSS as primary when a key is configured, Google Translate as fallback.
    pub fn from_config(config: &TtsConfig, temp_dir: PathBuf) -> AppResult<Self> {
        let client = Client::builder().timeout(config.request_timeout()).build()?;

        let primary: Option<Arc<dyn SpeechProvider>> = if config.has_primary_credential() {
            Some(Arc::new(VoiceRssProvider::new(client.clone(), config)))
        } else {
            info!("VoiceRSS key not configured, using Google Translate TTS only");
            None
        };
        let fallback: Arc<dyn SpeechProvider> = Arc::new(GoogleTranslateProvider::new(client, config));

        Ok(Self::new(primary, fallback, config.chunk_pause(), temp_dir))
    }

    pub async fn synthesize_base(&self, text: &str, voice_id: &str) -> AppResult<BaseAudio> {
        if let Some(primary) = &self.primary {
            match self.run_provider(primary.as_ref(), text, voice_id).await {
                Ok((bytes, chunks)) => return self.finish(bytes, primary.name(), chunks).await,
                Err(e) => warn!("Provider {} failed, falling back: {}", primary.name(), e),
            }
        }

        match self.run_provider(self.fallback.as_ref(), text, voice_id).await {
            Ok((bytes, chunks)) => self.finish(bytes, self.fallback.name(), chunks).await,
            Err(e) => {
                error!("Fallback provider {} failed: {}", self.fallback.name(), e);
                Err(AppError::ProviderFailure("speech generation failed".to_string()))
            }
        }
    }

    async fn run_provider(
        &self,
        provider: &dyn SpeechProvider,
        text: &str,
        voice_id: &str,
    ) -> AppResult<(Bytes, usize)> {
        let chunks = match provider.max_text_length() {
            Some(max) if text.chars().count() > max => split_text_into_chunks(text, max),
            _ => vec![text.to_string()],
        };
        debug!("{}: {} chunk(s)", provider.name(), chunks.len());

        let mut audio = Vec::new();
        for (i, chunk) in chunks.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.chunk_pause).await;
            }
            let bytes = provider.synthesize(chunk, voice_id).await?;
            if bytes.is_empty() {
                return Err(AppError::ProviderFailure(format!(
                    "{} returned no audio for chunk {}",
                    provider.name(),
                    i + 1
                )));
            }
            audio.extend_from_slice(&bytes);
        }
        Ok((Bytes::from(audio), chunks.len()))
    }

    async fn finish(&self, bytes: Bytes, provider: &str, chunks: usize) -> AppResult<BaseAudio> {
        tokio::fs::create_dir_all(&self.temp_dir).await?;
        let file = tempfile::Builder::new()
            .prefix("base_")
            .suffix(".mp3")
            .tempfile_in(&self.temp_dir)?;
        tokio::fs::write(file.path(), &bytes).await?;

        info!("Synthesized {} bytes with {} ({} chunk(s))", bytes.len(), provider, chunks);
        Ok(BaseAudio {
            bytes,
            provider: provider.to_string(),
            chunks,
            file,
        })
    }
}
