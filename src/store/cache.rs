use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::Store;
use crate::error::CoreError;
use crate::models::Id;

struct Entry {
    value: Value,
    inserted_at: Instant,
}

/// Read-through cache wrapper with TTL and LRU eviction, for read-heavy
/// lookups. Opt-in per call site: callers choose whether to go through
/// `CachedStore::get_cached` or the underlying `Store::get` directly. Never
/// used for writes or pagination cursors, which always hit the store.
pub struct CachedStore<S> {
    inner: S,
    ttl: Duration,
    max_entries: usize,
    entries: Mutex<HashMap<(String, String), Entry>>,
    /// Most-recently-used key order, front = most recent.
    lru: Mutex<Vec<(String, String)>>,
}

impl<S: Store> CachedStore<S> {
    pub fn new(inner: S, ttl: Duration, max_entries: usize) -> Self {
        Self {
            inner,
            ttl,
            max_entries,
            entries: Mutex::new(HashMap::new()),
            lru: Mutex::new(Vec::new()),
        }
    }

    fn touch(&self, key: &(String, String)) {
        let mut lru = self.lru.lock().expect("cache lru lock poisoned");
        lru.retain(|existing| existing != key);
        lru.insert(0, key.clone());
    }

    fn evict_if_needed(&self) {
        let mut lru = self.lru.lock().expect("cache lru lock poisoned");
        let mut entries = self.entries.lock().expect("cache entries lock poisoned");
        while entries.len() > self.max_entries {
            if let Some(oldest) = lru.pop() {
                entries.remove(&oldest);
            } else {
                break;
            }
        }
    }

    pub async fn get_cached(&self, table: &str, id: &Id) -> Result<Option<Value>, CoreError> {
        let key = (table.to_string(), id.as_str().to_string());

        let cached = {
            let entries = self.entries.lock().expect("cache entries lock poisoned");
            entries.get(&key).and_then(|entry| {
                if entry.inserted_at.elapsed() < self.ttl {
                    Some(entry.value.clone())
                } else {
                    None
                }
            })
        };

        if let Some(value) = cached {
            self.touch(&key);
            return Ok(Some(value));
        }

        let fetched = self.inner.get(table, id).await?;
        if let Some(value) = &fetched {
            let mut entries = self.entries.lock().expect("cache entries lock poisoned");
            entries.insert(
                key.clone(),
                Entry {
                    value: value.clone(),
                    inserted_at: Instant::now(),
                },
            );
            self.touch(&key);
            drop(entries);
            self.evict_if_needed();
        }
        Ok(fetched)
    }

    pub async fn get_cached_typed<T: DeserializeOwned>(&self, table: &str, id: &Id) -> Result<Option<T>, CoreError> {
        match self.get_cached(table, id).await? {
            Some(value) => Ok(Some(serde_json::from_value(value).map_err(|err| {
                CoreError::permanent_decode(format!("corrupt cached record in {table}: {err}"))
            })?)),
            None => Ok(None),
        }
    }

    pub fn invalidate(&self, table: &str, id: &Id) {
        let key = (table.to_string(), id.as_str().to_string());
        self.entries.lock().expect("cache entries lock poisoned").remove(&key);
        self.lru.lock().expect("cache lru lock poisoned").retain(|existing| existing != &key);
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

/// Typed convenience wrapper over [`CachedStore::get_cached`] mirroring
/// [`super::put_typed`]'s naming.
pub async fn put_typed_invalidating<T: Serialize + Sync, S: Store>(
    cache: &CachedStore<S>,
    table: &str,
    id: &Id,
    record: &T,
    indexes: Vec<super::IndexKey>,
) -> Result<(), CoreError> {
    super::put_typed(&cache.inner, table, id, record, indexes).await?;
    cache.invalidate(table, id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use serde_json::json;

    #[tokio::test]
    async fn caches_reads_until_ttl_expires() {
        let store = MemoryStore::new();
        let id = Id::from_string("account-1");
        store.put("accounts", &id, json!({"v": 1}), vec![]).await.unwrap();

        let cached = CachedStore::new(store, Duration::from_millis(20), 10);
        let first = cached.get_cached("accounts", &id).await.unwrap().unwrap();
        assert_eq!(first["v"], 1);

        // Mutate underneath the cache directly; a cached read should still
        // see the stale value until TTL expiry.
        cached.inner().put("accounts", &id, json!({"v": 2}), vec![]).await.unwrap();
        let still_cached = cached.get_cached("accounts", &id).await.unwrap().unwrap();
        assert_eq!(still_cached["v"], 1);

        tokio::time::sleep(Duration::from_millis(25)).await;
        let refreshed = cached.get_cached("accounts", &id).await.unwrap().unwrap();
        assert_eq!(refreshed["v"], 2);
    }

    #[tokio::test]
    async fn evicts_least_recently_used_entry_beyond_capacity() {
        let store = MemoryStore::new();
        for i in 0..3 {
            store
                .put("accounts", &Id::from_string(format!("a{i}")), json!({"v": i}), vec![])
                .await
                .unwrap();
        }
        let cached = CachedStore::new(store, Duration::from_secs(60), 2);
        cached.get_cached("accounts", &Id::from_string("a0")).await.unwrap();
        cached.get_cached("accounts", &Id::from_string("a1")).await.unwrap();
        cached.get_cached("accounts", &Id::from_string("a2")).await.unwrap();

        let entries = cached.entries.lock().unwrap();
        assert_eq!(entries.len(), 2);
        assert!(!entries.contains_key(&("accounts".to_string(), "a0".to_string())));
    }
}
