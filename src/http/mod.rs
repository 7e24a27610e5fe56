// HTTP layer
// Тонкая обёртка над сервисами: извлечение пользователя, учёт api-call и маршруты

use std::sync::Arc;

use axum::Router;
use axum::extract::{DefaultBodyLimit, FromRequestParts};
use axum::http::HeaderMap;
use axum::http::request::Parts;
use axum::routing::{get, patch, post};
use log::{info, warn};

use crate::config::AppConfig;
use crate::errors::AppResult;
use crate::services::audio::{
    ChainStage, FfmpegExecutor, FilterChainStage, FilterGraphEnhancer, FilterGraphExecutor,
    ProsodyClassifier, SignalStage, UnwiredStage,
};
use crate::services::store::{LocalObjectStorage, MemoryDocumentStore, MemoryKvStore};
use crate::services::tts::SynthesisSelector;
use crate::services::{
    AudioLibrary, PresetService, QuotaLedger, ResultCache, StagePipeline, VoiceProcessor,
};
use crate::utils::keys::OperationKind;
use crate::utils::tools::ffmpeg_version;

pub mod error;
pub mod handlers;

pub use error::ApiError;

/// Header set by the identity provider in front of the service.
pub const USER_HEADER: &str = "x-user-id";

/// Header carrying the operator token; unrelated to user identity.
pub const OPERATOR_HEADER: &str = "x-operator-token";

const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub library: Arc<AudioLibrary>,
    pub presets: Arc<PresetService>,
    pub quota: Arc<QuotaLedger>,
    pub cache: Arc<ResultCache>,
    pub files: Arc<LocalObjectStorage>,
    pub operator: OperatorGate,
}

impl AppState {
    /// Wires every service from configuration with the in-process stores.
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        let temp_dir = config.audio.temp_dir();
        let ffmpeg = FfmpegExecutor::discover(
            config.audio.ffmpeg_path.as_deref(),
            config.audio.sample_rate,
            &config.audio.output_format,
            temp_dir.clone(),
        )?;
        match ffmpeg_version(ffmpeg.binary()) {
            Ok(version) => info!("{}", version),
            Err(e) => warn!("Could not read ffmpeg version: {}", e),
        }
        let executor: Arc<dyn FilterGraphExecutor> = Arc::new(ffmpeg);

        let kv = Arc::new(MemoryKvStore::new());
        let documents = Arc::new(MemoryDocumentStore::new());
        let client = reqwest::Client::builder()
            .timeout(config.tts.request_timeout())
            .build()?;
        let files = Arc::new(LocalObjectStorage::new(
            config.storage.root_dir.clone(),
            &config.storage.public_base_url,
            &config.audio.output_format,
            executor.clone(),
            client,
        ));

        let quota = Arc::new(QuotaLedger::new(kv.clone(), config.quota.clone()));
        let cache = Arc::new(ResultCache::new(kv, config.cache.clone()));
        let presets = Arc::new(PresetService::new(documents.clone(), cache.clone()));

        let advanced: Arc<dyn SignalStage> = Arc::new(UnwiredStage::new("Advanced voice modifications"));
        let enhancement: Arc<dyn SignalStage> = Arc::new(FilterGraphEnhancer::new(executor.clone()));
        let pipeline = |stages: &[ChainStage]| {
            StagePipeline::new(
                advanced.clone(),
                Arc::new(FilterChainStage::new(executor.clone(), stages)),
                enhancement.clone(),
            )
        };

        // pitch/speed/volume уже применены хранилищем в explicit_transform
        let processor = Arc::new(VoiceProcessor::new(
            documents.clone(),
            files.clone(),
            presets.clone(),
            pipeline(&[ChainStage::Emotion, ChainStage::Characteristics, ChainStage::Effects]),
            Arc::new(ProsodyClassifier),
            &config.audio.output_format,
        ));

        let selector = Arc::new(SynthesisSelector::from_config(&config.tts, temp_dir)?);
        let library = Arc::new(AudioLibrary::new(
            quota.clone(),
            cache.clone(),
            selector,
            pipeline(&ChainStage::ORDER),
            files.clone(),
            documents,
            processor,
            config.limits.clone(),
            &config.audio.output_format,
        ));

        Ok(Self {
            library,
            presets,
            quota,
            cache,
            files,
            operator: OperatorGate::new(config.server.operator_token.clone()),
        })
    }
}

/// Authenticated caller; extracting it counts one API call.
#[derive(Debug, Clone)]
pub struct Caller(pub String);

#[async_trait::async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(ApiError::unauthorized)?
            .to_string();

        state.quota.check(&user_id, OperationKind::ApiCall).await?;
        Ok(Caller(user_id))
    }
}

/// Checks the operator token for routes that can reset user state.
#[derive(Clone, Default)]
pub struct OperatorGate {
    token: Option<Arc<str>>,
}

impl OperatorGate {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: token.filter(|t| !t.trim().is_empty()).map(Arc::from),
        }
    }

    pub fn authorize(&self, headers: &HeaderMap) -> Result<(), ApiError> {
        let Some(expected) = self.token.as_deref() else {
            return Err(ApiError::forbidden());
        };
        match headers.get(OPERATOR_HEADER).and_then(|value| value.to_str().ok()) {
            Some(given) if given == expected => Ok(()),
            _ => Err(ApiError::forbidden()),
        }
    }
}

/// Operator request; does not count against any user's quota.
#[derive(Debug, Clone, Copy)]
pub struct Operator;

#[async_trait::async_trait]
impl FromRequestParts<AppState> for Operator {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        state.operator.authorize(&parts.headers)?;
        Ok(Operator)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/audio/generate", post(handlers::generate))
        .route("/audio/transform", post(handlers::transform))
        .route(
            "/audio/upload",
            post(handlers::upload).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/audio/list", get(handlers::list_audio))
        .route(
            "/audio/:id",
            patch(handlers::update_audio).delete(handlers::delete_audio),
        )
        .route("/quota", get(handlers::quota))
        .route("/cache/invalidate/:user_id", post(handlers::invalidate_cache))
        .route(
            "/presets",
            get(handlers::list_presets).post(handlers::create_preset),
        )
        .route("/presets/public", get(handlers::public_presets))
        .route(
            "/presets/:id",
            get(handlers::get_preset)
                .put(handlers::update_preset)
                .delete(handlers::delete_preset),
        )
        .route("/files/*path", get(handlers::serve_file))
        .with_state(state)
}
