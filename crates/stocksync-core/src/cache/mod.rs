//! DataCache - TTL 付きのインメモリキャッシュ
//!
//! 重い読み取り（ページ、参照コレクション、集計）の結果を一定時間だけ保持します。
//! 期限切れのエントリは `get` 時に遅延削除され、`clear_expired` でまとめて掃除されます。
//! 期限切れのエントリが返ることはありません。

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::ports::Clock;

/// Default time-to-live for entries (5 minutes).
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

struct CacheEntry {
    data: Arc<dyn Any + Send + Sync>,
    timestamp: DateTime<Utc>,
    ttl: Duration,
}

impl CacheEntry {
    /// `now - timestamp > ttl`
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match (now - self.timestamp).to_std() {
            Ok(age) => age > self.ttl,
            // clock went backwards
            Err(_) => false,
        }
    }
}

/// Key/value cache with per-entry expiry.
///
/// Values are stored type-erased; `get::<T>` returns `None` for a key that
/// holds a value of another type.
pub struct DataCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    clock: Arc<dyn Clock>,
    default_ttl: Duration,
}

impl DataCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_default_ttl(clock, DEFAULT_TTL)
    }

    pub fn with_default_ttl(clock: Arc<dyn Clock>, default_ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
            default_ttl,
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Return the value for `key` if present, fresh and of type `T`.
    ///
    /// A stale entry is evicted as a side effect.
    pub fn get<T: Clone + Send + Sync + 'static>(&self, key: &str) -> Option<T> {
        let now = self.clock.now();
        let mut entries = self.entries();
        let entry = entries.get(key)?;
        if entry.is_expired(now) {
            entries.remove(key);
            return None;
        }
        entry.data.downcast_ref::<T>().cloned()
    }

    /// Store or overwrite `key`, resetting its timestamp and ttl.
    pub fn set<T: Send + Sync + 'static>(&self, key: impl Into<String>, value: T, ttl: Duration) {
        let entry = CacheEntry {
            data: Arc::new(value),
            timestamp: self.clock.now(),
            ttl,
        };
        self.entries().insert(key.into(), entry);
    }

    /// `set` with the default ttl.
    pub fn set_default<T: Send + Sync + 'static>(&self, key: impl Into<String>, value: T) {
        self.set(key, value, self.default_ttl);
    }

    pub fn remove(&self, key: &str) -> bool {
        self.entries().remove(key).is_some()
    }

    /// Remove every entry whose key starts with `prefix`; returns how many.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        before - entries.len()
    }

    pub fn clear(&self) {
        self.entries().clear();
    }

    /// Sweep expired entries; returns how many were removed.
    pub fn clear_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        let swept = before - entries.len();
        if swept > 0 {
            tracing::debug!(swept, remaining = entries.len(), "cache sweep");
        }
        swept
    }

    /// Number of stored entries, expired ones included until swept.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}
