//! Object storage for audio artifacts.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use log::{debug, info};
use reqwest::Client;

use crate::errors::{AppError, AppResult};
use crate::models::VoiceTransformation;
use crate::services::audio::{ChainStage, FilterGraphExecutor, build_stages, decode_audio};

#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub public_id: String,
    pub url: String,
    pub format: String,
    pub duration: Option<f64>,
    pub bytes: u64,
}

/// Pitch / speed / volume applied by the storage side.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BasicAdjustments {
    pub pitch: Option<f64>,
    pub speed: Option<f64>,
    pub volume: Option<f64>,
}

impl BasicAdjustments {
    pub fn from_transformation(t: &VoiceTransformation) -> Self {
        Self {
            pitch: t.pitch,
            speed: t.speed,
            volume: t.volume,
        }
    }

    fn as_transformation(&self) -> VoiceTransformation {
        VoiceTransformation {
            pitch: self.pitch,
            speed: self.speed,
            volume: self.volume,
            ..Default::default()
        }
    }
}

#[async_trait::async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Persists `data` under `folder` and returns its durable location.
    async fn upload(&self, data: Bytes, folder: &str, format: &str) -> AppResult<StoredObject>;

    /// Server-side basic transform of an existing object into a new one.
    async fn explicit_transform(&self, public_id: &str, adjustments: &BasicAdjustments) -> AppResult<StoredObject>;

    async fn download(&self, url: &str) -> AppResult<Bytes>;

    async fn delete(&self, public_id: &str) -> AppResult<bool>;
}

/// Directory-backed storage served under a public URL prefix.
pub struct LocalObjectStorage {
    root: PathBuf,
    base_url: String,
    output_format: String,
    executor: Arc<dyn FilterGraphExecutor>,
    client: Client,
}

impl LocalObjectStorage {
    pub fn new(
        root: PathBuf,
        base_url: &str,
        output_format: &str,
        executor: Arc<dyn FilterGraphExecutor>,
        client: Client,
    ) -> Self {
        Self {
            root,
            base_url: base_url.trim_end_matches('/').to_string(),
            output_format: output_format.to_string(),
            executor,
            client,
        }
    }

    /// Raw file under the root, for serving public URLs.
    pub async fn read_path(&self, relative: &str) -> AppResult<Option<Bytes>> {
        let path = self.root.join(Self::checked_relative(relative)?);
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn url_for(&self, relative: &str) -> String {
        format!("{}/{}", self.base_url, relative)
    }

    // Только обычные компоненты пути, без ".." и абсолютных путей
    fn checked_relative(relative: &str) -> AppResult<PathBuf> {
        let path = Path::new(relative);
        if relative.is_empty() || !path.components().all(|c| matches!(c, Component::Normal(_))) {
            return Err(AppError::Storage(format!("Invalid object path: {}", relative)));
        }
        Ok(path.to_path_buf())
    }

    /// Finds the stored file for a public id (stored with its extension).
    async fn locate(&self, public_id: &str) -> AppResult<Option<PathBuf>> {
        let relative = Self::checked_relative(public_id)?;
        let full = self.root.join(&relative);
        let (Some(dir), Some(stem)) = (full.parent(), full.file_name()) else {
            return Ok(None);
        };

        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.file_stem() == Some(stem) {
                return Ok(Some(path));
            }
        }
        Ok(None)
    }

    async fn write_object(&self, data: &Bytes, public_id: &str, format: &str) -> AppResult<StoredObject> {
        let relative = format!("{}.{}", public_id, format);
        let path = self.root.join(Self::checked_relative(&relative)?);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, data).await?;

        let duration = match decode_audio(data) {
            Ok(decoded) => Some(decoded.duration_secs()),
            Err(e) => {
                debug!("Could not measure duration of {}: {}", relative, e);
                None
            }
        };

        Ok(StoredObject {
            public_id: public_id.to_string(),
            url: self.url_for(&relative),
            format: format.to_string(),
            duration,
            bytes: data.len() as u64,
        })
    }
}

#[async_trait::async_trait]
impl ObjectStorage for LocalObjectStorage {
    async fn upload(&self, data: Bytes, folder: &str, format: &str) -> AppResult<StoredObject> {
        let public_id = format!("{}/{}", folder.trim_matches('/'), uuid::Uuid::new_v4());
        let stored = self.write_object(&data, &public_id, format).await?;
        info!("Stored {} ({} bytes)", stored.url, stored.bytes);
        Ok(stored)
    }

    async fn explicit_transform(&self, public_id: &str, adjustments: &BasicAdjustments) -> AppResult<StoredObject> {
        let source = self
            .locate(public_id)
            .await?
            .ok_or_else(|| AppError::Storage(format!("Object {} is missing", public_id)))?;
        let original = Bytes::from(tokio::fs::read(&source).await?);

        let program = build_stages(&adjustments.as_transformation(), &[ChainStage::Basic]);
        let format = if program.is_empty() {
            source
                .extension()
                .and_then(|ext| ext.to_str())
                .unwrap_or(&self.output_format)
                .to_string()
        } else {
            self.output_format.clone()
        };
        let transformed = self.executor.execute(original, &program).await?;

        let derived_id = format!("{}-t{}", public_id, uuid::Uuid::new_v4().simple());
        self.write_object(&transformed, &derived_id, &format).await
    }

    async fn download(&self, url: &str) -> AppResult<Bytes> {
        if let Some(relative) = url.strip_prefix(&format!("{}/", self.base_url)) {
            let path = self.root.join(Self::checked_relative(relative)?);
            return Ok(Bytes::from(tokio::fs::read(&path).await?));
        }

        if url.starts_with("http://") || url.starts_with("https://") {
            let response = self.client.get(url).send().await?;
            if !response.status().is_success() {
                return Err(AppError::Storage(format!(
                    "Download of {} failed with status {}",
                    url,
                    response.status()
                )));
            }
            return Ok(response.bytes().await?);
        }

        Err(AppError::Storage(format!("Unsupported object URL: {}", url)))
    }

    async fn delete(&self, public_id: &str) -> AppResult<bool> {
        match self.locate(public_id).await? {
            Some(path) => {
                tokio::fs::remove_file(&path).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
