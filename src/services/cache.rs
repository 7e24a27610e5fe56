//! # Result Cache
//!
//! Кэш это оптимизация, а не источник истины: ошибка чтения считается
//! промахом, ошибка записи пишется в лог и проглатывается.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use log::{debug, info, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::CacheTtls;
use crate::errors::AppResult;
use crate::models::{AudioFile, GeneratedAudio, VoicePreset, VoiceTransformation};
use crate::services::store::KeyValueStore;
use crate::utils::keys::{StoreKey, user_pattern};

/// A cached generation: a full payload, or a bare URL written by older entries.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedResult {
    Payload(GeneratedAudio),
    Url(String),
}

pub struct ResultCache {
    store: Arc<dyn KeyValueStore>,
    ttls: CacheTtls,
}

impl ResultCache {
    pub fn new(store: Arc<dyn KeyValueStore>, ttls: CacheTtls) -> Self {
        Self { store, ttls }
    }

    async fn read(&self, key: &StoreKey) -> Option<String> {
        match self.store.get(key.as_str()).await {
            Ok(value) => value,
            Err(e) => {
                warn!("Cache read failed for {}, treating as miss: {}", key, e);
                None
            }
        }
    }

    async fn write(&self, key: &StoreKey, value: &str, ttl: Duration) {
        if let Err(e) = self.store.set(key.as_str(), value, Some(ttl)).await {
            warn!("Cache write failed for {}: {}", key, e);
        }
    }

    async fn read_json<T: DeserializeOwned>(&self, key: &StoreKey) -> Option<T> {
        let raw = self.read(key).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Dropping unreadable cache entry {}: {}", key, e);
                None
            }
        }
    }

    async fn write_json<T: Serialize + ?Sized>(&self, key: &StoreKey, value: &T, ttl: Duration) {
        match serde_json::to_string(value) {
            Ok(raw) => self.write(key, &raw, ttl).await,
            Err(e) => warn!("Could not serialize cache entry {}: {}", key, e),
        }
    }

    async fn forget(&self, key: &StoreKey) {
        if let Err(e) = self.store.del(key.as_str()).await {
            warn!("Cache delete failed for {}: {}", key, e);
        }
    }

    pub async fn lookup(
        &self,
        user_id: &str,
        text: &str,
        voice_id: &str,
        transformation: &VoiceTransformation,
    ) -> Option<CachedResult> {
        let key = StoreKey::voice_result(user_id, text, voice_id, transformation);
        let raw = self.read(&key).await?;

        if let Ok(payload) = serde_json::from_str::<GeneratedAudio>(&raw) {
            debug!("Cache hit {}", key);
            return Some(CachedResult::Payload(payload));
        }
        if raw.starts_with("http://") || raw.starts_with("https://") {
            debug!("Cache hit {} (url)", key);
            return Some(CachedResult::Url(raw));
        }
        warn!("Ignoring unrecognized cache entry {}", key);
        None
    }

    pub async fn store(
        &self,
        user_id: &str,
        text: &str,
        voice_id: &str,
        transformation: &VoiceTransformation,
        result: &GeneratedAudio,
    ) {
        let key = StoreKey::voice_result(user_id, text, voice_id, transformation);
        self.write_json(&key, result, self.ttls.voice_result()).await;
    }

    pub async fn store_url(
        &self,
        user_id: &str,
        text: &str,
        voice_id: &str,
        transformation: &VoiceTransformation,
        url: &str,
    ) {
        let key = StoreKey::voice_result(user_id, text, voice_id, transformation);
        self.write(&key, url, self.ttls.voice_result()).await;
    }

    pub async fn preset(&self, preset_id: &str) -> Option<VoicePreset> {
        self.read_json(&StoreKey::preset(preset_id)).await
    }

    pub async fn put_preset(&self, preset: &VoicePreset) {
        self.write_json(&StoreKey::preset(&preset.id), preset, self.ttls.preset())
            .await;
    }

    pub async fn forget_preset(&self, preset_id: &str) {
        self.forget(&StoreKey::preset(preset_id)).await;
    }

    pub async fn user_presets(&self, user_id: &str) -> Option<Vec<VoicePreset>> {
        self.read_json(&StoreKey::user_presets(user_id)).await
    }

    pub async fn put_user_presets(&self, user_id: &str, presets: &[VoicePreset]) {
        self.write_json(&StoreKey::user_presets(user_id), presets, self.ttls.preset())
            .await;
    }

    pub async fn forget_user_presets(&self, user_id: &str) {
        self.forget(&StoreKey::user_presets(user_id)).await;
    }

    pub async fn audio_list(&self, user_id: &str) -> Option<Vec<AudioFile>> {
        self.read_json(&StoreKey::user_audio_files(user_id)).await
    }

    pub async fn put_audio_list(&self, user_id: &str, files: &[AudioFile]) {
        self.write_json(&StoreKey::user_audio_files(user_id), files, self.ttls.profile())
            .await;
    }

    pub async fn forget_audio_list(&self, user_id: &str) {
        self.forget(&StoreKey::user_audio_files(user_id)).await;
    }

    /// Deletes every key carrying the user's segment: results, lists and daily counters.
    /// Storage usage stays, it tracks files that still exist.
    pub async fn invalidate_user(&self, user_id: &str) -> AppResult<usize> {
        let keys = self.store.scan(&user_pattern(user_id)).await?;
        let results = join_all(keys.iter().map(|key| self.store.del(key))).await;
        let mut removed = 0;
        for result in results {
            if result? {
                removed += 1;
            }
        }
        info!("Invalidated {} cache keys for {}", removed, user_id);
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QuotaLimits;
    use crate::errors::AppError;
    use crate::services::quota::QuotaLedger;
    use crate::services::store::MemoryKvStore;

    struct BrokenStore;

    #[async_trait::async_trait]
    impl KeyValueStore for BrokenStore {
        async fn get(&self, _key: &str) -> AppResult<Option<String>> {
            Err(AppError::Cache("connection refused".to_string()))
        }
        async fn set(&self, _key: &str, _value: &str, _ttl: Option<Duration>) -> AppResult<()> {
            Err(AppError::Cache("connection refused".to_string()))
        }
        async fn incr_by(&self, _key: &str, _delta: i64) -> AppResult<i64> {
            Err(AppError::Cache("connection refused".to_string()))
        }
        async fn expire(&self, _key: &str, _ttl: Duration) -> AppResult<bool> {
            Err(AppError::Cache("connection refused".to_string()))
        }
        async fn del(&self, _key: &str) -> AppResult<bool> {
            Err(AppError::Cache("connection refused".to_string()))
        }
        async fn scan(&self, _pattern: &str) -> AppResult<Vec<String>> {
            Err(AppError::Cache("connection refused".to_string()))
        }
    }

    fn sample() -> GeneratedAudio {
        GeneratedAudio {
            id: "a1".to_string(),
            url: "http://files.test/a1.mp3".to_string(),
            name: "Hello".to_string(),
            duration: Some(1.5),
            format: "mp3".to_string(),
        }
    }

    fn transformation() -> VoiceTransformation {
        VoiceTransformation {
            pitch: Some(10.0),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn stored_payload_is_found_again() {
        let cache = ResultCache::new(Arc::new(MemoryKvStore::new()), CacheTtls::default());
        let t = transformation();
        assert_eq!(cache.lookup("u1", "Hello", "v1", &t).await, None);

        cache.store("u1", "Hello", "v1", &t, &sample()).await;
        assert_eq!(
            cache.lookup("u1", "Hello", "v1", &t).await,
            Some(CachedResult::Payload(sample()))
        );
        // другой голос это другой ключ
        assert_eq!(cache.lookup("u1", "Hello", "v2", &t).await, None);
    }

    #[tokio::test]
    async fn plain_url_entries_are_recognized() {
        let cache = ResultCache::new(Arc::new(MemoryKvStore::new()), CacheTtls::default());
        let t = VoiceTransformation::default();
        cache.store_url("u1", "Hi", "v1", &t, "https://cdn.test/x.mp3").await;
        assert_eq!(
            cache.lookup("u1", "Hi", "v1", &t).await,
            Some(CachedResult::Url("https://cdn.test/x.mp3".to_string()))
        );
    }

    #[tokio::test]
    async fn unreachable_store_is_a_miss_and_writes_are_swallowed() {
        let cache = ResultCache::new(Arc::new(BrokenStore), CacheTtls::default());
        let t = transformation();
        cache.store("u1", "Hello", "v1", &t, &sample()).await;
        assert_eq!(cache.lookup("u1", "Hello", "v1", &t).await, None);
        assert!(cache.preset("p1").await.is_none());
        assert!(cache.invalidate_user("u1").await.is_err());
    }

    #[tokio::test]
    async fn invalidate_removes_only_that_users_keys() {
        let store = Arc::new(MemoryKvStore::new());
        let cache = ResultCache::new(store.clone(), CacheTtls::default());
        let t = transformation();
        cache.store("u1", "Hello", "v1", &t, &sample()).await;
        cache.store("u2", "Hello", "v1", &t, &sample()).await;
        cache.put_audio_list("u1", &[]).await;
        store.incr_by("quota:api-call:u1:2026-10-17", 3).await.unwrap();

        assert_eq!(cache.invalidate_user("u1").await.unwrap(), 3);
        assert_eq!(cache.lookup("u1", "Hello", "v1", &t).await, None);
        assert!(cache.lookup("u2", "Hello", "v1", &t).await.is_some());
    }

    #[tokio::test]
    async fn invalidate_keeps_storage_reservation() {
        let store = Arc::new(MemoryKvStore::new());
        let cache = ResultCache::new(store.clone(), CacheTtls::default());
        let ledger = QuotaLedger::new(store.clone(), QuotaLimits::default());
        let mb = 1024 * 1024;

        ledger.admit_storage("u1", 90 * mb).await.unwrap();
        assert!(ledger.admit_storage("u1", 90 * mb).await.is_err());

        cache.invalidate_user("u1").await.unwrap();

        let second = ledger.admit_storage("u1", 90 * mb).await;
        assert!(matches!(second, Err(AppError::QuotaExceeded { limit: 100, .. })));
        assert_eq!(ledger.remaining("u1").await.unwrap().storage_used_mb, 90.0);
    }
}
