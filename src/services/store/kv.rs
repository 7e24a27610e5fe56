//! Key/value store used for quota counters and cached results.
//!
//! Корректность квот целиком держится на атомарности `incr_by` в хранилище,
//! внутри процесса никаких блокировок поверх этого нет.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::errors::{AppError, AppResult};

#[async_trait::async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> AppResult<Option<String>>;

    /// Replace the value; `ttl = None` keeps it until deleted.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> AppResult<()>;

    /// Atomic add on an integer value (missing key counts as 0).
    /// Returns the value after the increment.
    async fn incr_by(&self, key: &str, delta: i64) -> AppResult<i64>;

    /// Returns false if the key does not exist.
    async fn expire(&self, key: &str, ttl: Duration) -> AppResult<bool>;

    async fn del(&self, key: &str) -> AppResult<bool>;

    /// All live keys matching a glob where `*` matches any run of characters.
    async fn scan(&self, pattern: &str) -> AppResult<Vec<String>>;
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// In-process store with lazy expiry.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remaining lifetime of a key, if it has one.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let entries = self.entries.lock();
        entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .and_then(|entry| entry.expires_at)
            .map(|at| at.saturating_duration_since(now))
    }
}

#[async_trait::async_trait]
impl KeyValueStore for MemoryKvStore {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> AppResult<()> {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.entries.lock().insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn incr_by(&self, key: &str, delta: i64) -> AppResult<i64> {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        let (current, expires_at) = match entries.get(key) {
            Some(entry) if entry.is_live(now) => {
                let current = entry.value.parse::<i64>().map_err(|_| {
                    AppError::Cache(format!("value at {} is not an integer", key))
                })?;
                (current, entry.expires_at)
            }
            _ => (0, None),
        };

        let next = current + delta;
        entries.insert(
            key.to_string(),
            Entry {
                value: next.to_string(),
                expires_at,
            },
        );
        Ok(next)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> AppResult<bool> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        match entries.get_mut(key) {
            Some(entry) if entry.is_live(now) => {
                entry.expires_at = Some(now + ttl);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn del(&self, key: &str) -> AppResult<bool> {
        Ok(self.entries.lock().remove(key).is_some())
    }

    async fn scan(&self, pattern: &str) -> AppResult<Vec<String>> {
        let now = Instant::now();
        let entries = self.entries.lock();
        let mut keys: Vec<String> = entries
            .iter()
            .filter(|(key, entry)| entry.is_live(now) && glob_match(pattern, key))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }
}

/// `*`-only glob, enough for the scan patterns the pipeline builds.
pub fn glob_match(pattern: &str, candidate: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == candidate;
    }

    let first = parts[0];
    let last = parts[parts.len() - 1];
    if !candidate.starts_with(first) {
        return false;
    }

    let mut rest = &candidate[first.len()..];
    for part in &parts[1..parts.len() - 1] {
        match rest.find(part) {
            Some(pos) => rest = &rest[pos + part.len()..],
            None => return false,
        }
    }

    rest.len() >= last.len() && rest.ends_with(last)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn incr_starts_from_zero_and_keeps_ttl() {
        let store = MemoryKvStore::new();
        assert_eq!(store.incr_by("c", 1).await.unwrap(), 1);
        assert!(store.expire("c", Duration::from_secs(60)).await.unwrap());
        assert_eq!(store.incr_by("c", 4).await.unwrap(), 5);
        assert!(store.ttl("c").is_some());
        assert_eq!(store.get("c").await.unwrap().as_deref(), Some("5"));
    }

    #[tokio::test]
    async fn incr_on_text_value_fails() {
        let store = MemoryKvStore::new();
        store.set("k", "hello", None).await.unwrap();
        assert!(matches!(store.incr_by("k", 1).await, Err(AppError::Cache(_))));
    }

    #[tokio::test]
    async fn expired_entries_disappear() {
        let store = MemoryKvStore::new();
        store.set("k", "v", Some(Duration::from_millis(5))).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(!store.expire("k", Duration::from_secs(1)).await.unwrap());
        assert_eq!(store.incr_by("k", 1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn scan_matches_user_segment() {
        let store = MemoryKvStore::new();
        for key in ["voice:u1:a:v:b", "quota:api-call:u1:2026-01-01", "voice:u10:a:v:b", "preset:u1"] {
            store.set(key, "1", None).await.unwrap();
        }
        let keys = store.scan("*:u1:*").await.unwrap();
        assert_eq!(keys, vec!["quota:api-call:u1:2026-01-01", "voice:u1:a:v:b"]);
    }

    #[test]
    fn del_reports_presence() {
        let store = MemoryKvStore::new();
        tokio_test::block_on(async {
            store.set("k", "v", None).await.unwrap();
            assert!(store.del("k").await.unwrap());
            assert!(!store.del("k").await.unwrap());
            assert_eq!(store.get("k").await.unwrap(), None);
        });
    }

    #[test]
    fn glob_edge_cases() {
        assert!(glob_match("*", "anything"));
        assert!(glob_match("a*", "abc"));
        assert!(glob_match("*c", "abc"));
        assert!(glob_match("a*c", "ac"));
        assert!(!glob_match("a*c", "ab"));
        assert!(!glob_match("ab*ba", "aba"));
        assert!(glob_match("exact", "exact"));
        assert!(!glob_match("exact", "exact2"));
    }
}
