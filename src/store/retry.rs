use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use super::{IndexKey, Page, Pagination, Store};
use crate::error::{CoreError, ErrorKind};
use crate::models::Id;

/// Wraps any `Store` with retry-on-throttle: transient errors are retried
/// with exponential backoff (base 100ms, doubling), capped at `max_attempts`
/// (default 3) before surfacing to the caller.
pub struct RetryingStore {
    inner: Arc<dyn Store>,
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryingStore {
    pub fn new(inner: Arc<dyn Store>) -> Self {
        Self {
            inner,
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    async fn retrying<T, F, Fut>(&self, operation: &str, mut attempt: F) -> Result<T, CoreError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>>,
    {
        let mut delay = self.base_delay;
        for attempt_number in 1..=self.max_attempts {
            match attempt().await {
                Ok(value) => return Ok(value),
                Err(err) if err.kind == ErrorKind::TransientIo && attempt_number < self.max_attempts => {
                    warn!(operation, attempt_number, delay_ms = delay.as_millis() as u64, "retrying after transient store error");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(err) => return Err(err),
            }
        }
        unreachable!("loop always returns on the final attempt")
    }
}

#[async_trait]
impl Store for RetryingStore {
    async fn get(&self, table: &str, id: &Id) -> Result<Option<Value>, CoreError> {
        self.retrying("get", || self.inner.get(table, id)).await
    }

    async fn put(&self, table: &str, id: &Id, value: Value, indexes: Vec<IndexKey>) -> Result<(), CoreError> {
        self.retrying("put", || self.inner.put(table, id, value.clone(), indexes.clone())).await
    }

    async fn conditional_put(
        &self,
        table: &str,
        id: &Id,
        expect_exists: bool,
        value: Value,
        indexes: Vec<IndexKey>,
    ) -> Result<bool, CoreError> {
        self.retrying("conditional_put", || {
            self.inner.conditional_put(table, id, expect_exists, value.clone(), indexes.clone())
        })
        .await
    }

    async fn delete(&self, table: &str, id: &Id) -> Result<(), CoreError> {
        self.retrying("delete", || self.inner.delete(table, id)).await
    }

    async fn query_index(
        &self,
        table: &str,
        index: &str,
        prefix: &str,
        pagination: Pagination,
    ) -> Result<Page<Value>, CoreError> {
        self.retrying("query_index", || self.inner.query_index(table, index, prefix, pagination.clone()))
            .await
    }

    async fn scan(&self, table: &str, pagination: Pagination) -> Result<Page<Value>, CoreError> {
        self.retrying("scan", || self.inner.scan(table, pagination.clone())).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyStore {
        inner: MemoryStore,
        failures_remaining: AtomicU32,
    }

    #[async_trait]
    impl Store for FlakyStore {
        async fn get(&self, table: &str, id: &Id) -> Result<Option<Value>, CoreError> {
            if self.failures_remaining.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                if n > 0 {
                    Some(n - 1)
                } else {
                    None
                }
            }).is_ok()
            {
                return Err(CoreError::transient_io("throttled"));
            }
            self.inner.get(table, id).await
        }

        async fn put(&self, table: &str, id: &Id, value: Value, indexes: Vec<IndexKey>) -> Result<(), CoreError> {
            self.inner.put(table, id, value, indexes).await
        }

        async fn conditional_put(
            &self,
            table: &str,
            id: &Id,
            expect_exists: bool,
            value: Value,
            indexes: Vec<IndexKey>,
        ) -> Result<bool, CoreError> {
            self.inner.conditional_put(table, id, expect_exists, value, indexes).await
        }

        async fn delete(&self, table: &str, id: &Id) -> Result<(), CoreError> {
            self.inner.delete(table, id).await
        }

        async fn query_index(
            &self,
            table: &str,
            index: &str,
            prefix: &str,
            pagination: Pagination,
        ) -> Result<Page<Value>, CoreError> {
            self.inner.query_index(table, index, prefix, pagination).await
        }

        async fn scan(&self, table: &str, pagination: Pagination) -> Result<Page<Value>, CoreError> {
            self.inner.scan(table, pagination).await
        }
    }

    #[tokio::test]
    async fn retries_transient_errors_up_to_max_attempts() {
        let flaky = Arc::new(FlakyStore {
            inner: MemoryStore::new(),
            failures_remaining: AtomicU32::new(1),
        });
        flaky.put("accounts", &Id::from_string("a"), json!({"v": 1}), vec![]).await.unwrap();

        let retrying = RetryingStore::new(flaky).with_base_delay(Duration::from_millis(1));
        let value = retrying.get("accounts", &Id::from_string("a")).await.unwrap();
        assert_eq!(value.unwrap()["v"], 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let flaky = Arc::new(FlakyStore {
            inner: MemoryStore::new(),
            failures_remaining: AtomicU32::new(10),
        });
        let retrying = RetryingStore::new(flaky)
            .with_base_delay(Duration::from_millis(1))
            .with_max_attempts(3);
        let result = retrying.get("accounts", &Id::from_string("a")).await;
        assert!(result.is_err());
    }
}
