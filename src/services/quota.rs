//! # Quota Ledger
//!
//! Суточные счётчики по `(пользователь, тип операции, UTC-день)` и
//! накопительный счётчик занятого места. Проверка идёт после инкремента:
//! счётчик может на единицу превысить лимит, но такой запрос уже отклонён.
//!
//! Место учитывается в килобайтах тем же атомарным `incr_by`, что и
//! счётчики операций; при превышении инкремент откатывается.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use log::{debug, warn};

use crate::config::QuotaLimits;
use crate::errors::{AppError, AppResult};
use crate::models::QuotaSnapshot;
use crate::services::store::KeyValueStore;
use crate::utils::keys::{OperationKind, StoreKey};

/// Lifetime of a daily counter, set on its first increment.
pub const QUOTA_WINDOW: Duration = Duration::from_secs(86_400);

const KB: u64 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed { used: i64, limit: u64 },
    Denied { limit: u64 },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed { .. })
    }
}

pub struct QuotaLedger {
    store: Arc<dyn KeyValueStore>,
    limits: QuotaLimits,
}

fn kilobytes(bytes: u64) -> i64 {
    bytes.div_ceil(KB) as i64
}

impl QuotaLedger {
    pub fn new(store: Arc<dyn KeyValueStore>, limits: QuotaLimits) -> Self {
        Self { store, limits }
    }

    pub fn limit_for(&self, kind: OperationKind) -> u64 {
        match kind {
            OperationKind::VoiceGeneration => self.limits.voice_generation,
            OperationKind::AudioGeneration => self.limits.audio_generation,
            OperationKind::AudioTransformation => self.limits.audio_transformation,
            OperationKind::ApiCall => self.limits.api_call,
        }
    }

    fn storage_limit_kb(&self) -> i64 {
        (self.limits.storage_mb * KB) as i64
    }

    /// Counts one operation for today (UTC).
    pub async fn admit(&self, user_id: &str, kind: OperationKind) -> AppResult<Admission> {
        self.admit_on(user_id, kind, Utc::now().date_naive()).await
    }

    pub async fn admit_on(&self, user_id: &str, kind: OperationKind, day: NaiveDate) -> AppResult<Admission> {
        let key = StoreKey::daily_quota(user_id, kind, day);
        let count = self.store.incr_by(key.as_str(), 1).await?;
        if count == 1 {
            self.store.expire(key.as_str(), QUOTA_WINDOW).await?;
        }

        let limit = self.limit_for(kind);
        if count > limit as i64 {
            warn!("User {} hit the daily {} limit ({})", user_id, kind, limit);
            return Ok(Admission::Denied { limit });
        }
        debug!("{} for {}: {}/{}", kind, user_id, count, limit);
        Ok(Admission::Allowed { used: count, limit })
    }

    /// [`admit`](Self::admit) with a denial turned into `QuotaExceeded`.
    pub async fn check(&self, user_id: &str, kind: OperationKind) -> AppResult<()> {
        match self.admit(user_id, kind).await? {
            Admission::Allowed { .. } => Ok(()),
            Admission::Denied { limit } => Err(AppError::quota_exceeded(
                limit,
                format!(
                    "Daily {} limit ({}) exceeded. Please try again tomorrow.",
                    kind.label(),
                    limit
                ),
            )),
        }
    }

    /// Reserves space for a new file; nothing is reserved when the ceiling would be crossed.
    pub async fn admit_storage(&self, user_id: &str, file_bytes: u64) -> AppResult<()> {
        let key = StoreKey::storage_usage(user_id);
        let kb = kilobytes(file_bytes);
        let used = self.store.incr_by(key.as_str(), kb).await?;

        if used > self.storage_limit_kb() {
            self.store.incr_by(key.as_str(), -kb).await?;
            warn!("User {} would exceed storage ({} KB)", user_id, used);
            return Err(AppError::quota_exceeded(
                self.limits.storage_mb,
                format!(
                    "Storage limit ({} MB) exceeded. Delete some files to free up space.",
                    self.limits.storage_mb
                ),
            ));
        }
        Ok(())
    }

    /// Returns space of a deleted file; usage never drops below zero.
    pub async fn release_storage(&self, user_id: &str, file_bytes: u64) -> AppResult<()> {
        let key = StoreKey::storage_usage(user_id);
        let used = self.store.incr_by(key.as_str(), -kilobytes(file_bytes)).await?;
        if used < 0 {
            self.store.incr_by(key.as_str(), -used).await?;
        }
        Ok(())
    }

    async fn read_counter(&self, key: &StoreKey) -> AppResult<i64> {
        Ok(self
            .store
            .get(key.as_str())
            .await?
            .and_then(|value| value.parse::<i64>().ok())
            .unwrap_or(0))
    }

    /// What is left for today.
    pub async fn remaining(&self, user_id: &str) -> AppResult<QuotaSnapshot> {
        let today = Utc::now().date_naive();
        let voice = self
            .read_counter(&StoreKey::daily_quota(user_id, OperationKind::VoiceGeneration, today))
            .await?;
        let api = self
            .read_counter(&StoreKey::daily_quota(user_id, OperationKind::ApiCall, today))
            .await?;
        let storage_kb = self.read_counter(&StoreKey::storage_usage(user_id)).await?.max(0);

        let used_mb = storage_kb as f64 / KB as f64;
        Ok(QuotaSnapshot {
            voice_generations: (self.limits.voice_generation as i64 - voice).max(0),
            api_calls: (self.limits.api_call as i64 - api).max(0),
            storage_used_mb: used_mb,
            storage_remaining_mb: (self.limits.storage_mb as f64 - used_mb).max(0.0),
        })
    }
}
