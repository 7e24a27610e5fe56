// Общая обвязка для сценарных тестов: in-memory хранилища, локальное
// объектное хранилище во временной папке и фейковые внешние сервисы.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use tempfile::TempDir;

use crate::config::{CacheTtls, QuotaLimits, RequestLimits};
use crate::errors::{AppError, AppResult};
use crate::services::audio::decode::tests::{sine, wav_bytes};
use crate::services::audio::{
    ChainStage, FilterChainStage, FilterGraphEnhancer, FilterGraphExecutor, FilterProgram,
    PassThroughStage, ProsodyClassifier, SignalStage,
};
use crate::services::store::{LocalObjectStorage, MemoryDocumentStore, MemoryKvStore};
use crate::services::tts::{SpeechProvider, SynthesisSelector};
use crate::services::{AudioLibrary, PresetService, QuotaLedger, ResultCache, StagePipeline, VoiceProcessor};

pub const SAMPLE_RATE: u32 = 16_000;
pub const BASE_URL: &str = "http://files.test";

/// One second of a 440 Hz tone.
pub fn speech_wav() -> Bytes {
    Bytes::from(wav_bytes(&sine(440.0, 1.0, SAMPLE_RATE, 0.5), SAMPLE_RATE, 1))
}

/// Records every filter graph and answers with a shorter, lower tone.
#[derive(Default)]
pub struct RecordingExecutor {
    graphs: Mutex<Vec<String>>,
}

impl RecordingExecutor {
    pub fn graphs(&self) -> Vec<String> {
        self.graphs.lock().clone()
    }
}

#[async_trait::async_trait]
impl FilterGraphExecutor for RecordingExecutor {
    async fn execute(&self, input: Bytes, program: &FilterProgram) -> AppResult<Bytes> {
        if program.is_empty() {
            return Ok(input);
        }
        self.graphs.lock().push(program.to_filter_graph(44_100));
        Ok(Bytes::from(wav_bytes(
            &sine(220.0, 0.5, SAMPLE_RATE, 0.4),
            SAMPLE_RATE,
            1,
        )))
    }
}

#[derive(Default)]
pub struct ScriptedProvider {
    calls: AtomicUsize,
    failing: AtomicBool,
}

impl ScriptedProvider {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl SpeechProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn synthesize(&self, _text: &str, _voice_id: &str) -> AppResult<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::ProviderFailure("scripted outage".to_string()));
        }
        Ok(speech_wav())
    }
}

pub struct Harness {
    pub dir: TempDir,
    pub documents: Arc<MemoryDocumentStore>,
    pub executor: Arc<RecordingExecutor>,
    pub provider: Arc<ScriptedProvider>,
    pub quota: Arc<QuotaLedger>,
    pub cache: Arc<ResultCache>,
    pub presets: Arc<PresetService>,
    pub processor: Arc<VoiceProcessor>,
    pub library: AudioLibrary,
}

pub struct HarnessOptions {
    pub quota: QuotaLimits,
    pub limits: RequestLimits,
    pub advanced: Arc<dyn SignalStage>,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            quota: QuotaLimits::default(),
            limits: RequestLimits::default(),
            advanced: Arc::new(PassThroughStage),
        }
    }
}

impl Harness {
    pub fn new() -> Self {
        Self::with(HarnessOptions::default())
    }

    pub fn with(options: HarnessOptions) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let kv = Arc::new(MemoryKvStore::new());
        let documents = Arc::new(MemoryDocumentStore::new());
        let executor = Arc::new(RecordingExecutor::default());
        let provider = Arc::new(ScriptedProvider::default());

        let storage = Arc::new(LocalObjectStorage::new(
            dir.path().join("objects"),
            BASE_URL,
            "mp3",
            executor.clone(),
            reqwest::Client::new(),
        ));
        let quota = Arc::new(QuotaLedger::new(kv.clone(), options.quota));
        let cache = Arc::new(ResultCache::new(kv.clone(), CacheTtls::default()));
        let presets = Arc::new(PresetService::new(documents.clone(), cache.clone()));

        let pipeline = |stages: &[ChainStage]| {
            StagePipeline::new(
                options.advanced.clone(),
                Arc::new(FilterChainStage::new(executor.clone(), stages)),
                Arc::new(FilterGraphEnhancer::new(executor.clone())),
            )
        };

        let processor = Arc::new(VoiceProcessor::new(
            documents.clone(),
            storage.clone(),
            presets.clone(),
            pipeline(&[ChainStage::Emotion, ChainStage::Characteristics, ChainStage::Effects]),
            Arc::new(ProsodyClassifier),
            "mp3",
        ));

        let selector = Arc::new(SynthesisSelector::new(
            None,
            provider.clone(),
            Duration::ZERO,
            dir.path().join("tmp"),
        ));

        let library = AudioLibrary::new(
            quota.clone(),
            cache.clone(),
            selector,
            pipeline(&ChainStage::ORDER),
            storage.clone(),
            documents.clone(),
            processor.clone(),
            options.limits,
            "mp3",
        );

        Self {
            dir,
            documents,
            executor,
            provider,
            quota,
            cache,
            presets,
            processor,
            library,
        }
    }

    /// Number of stored objects under `folder`.
    pub fn objects_in(&self, folder: &str) -> usize {
        count_files(&self.dir.path().join("objects").join(folder))
    }
}

fn count_files(path: &Path) -> usize {
    let Ok(entries) = std::fs::read_dir(path) else {
        return 0;
    };
    entries
        .filter_map(|entry| entry.ok())
        .map(|entry| {
            let path = entry.path();
            if path.is_dir() { count_files(&path) } else { 1 }
        })
        .sum()
}
