//! Consumer framework: envelope decode, dedupe, retry/DLQ classification,
//! per-consumer routing for the shared event dispatch loop.

pub mod dedupe;
pub mod envelope_decode;

use async_trait::async_trait;
use serde_json::Value;

use crate::envelope::EventEnvelope;
use crate::error::CoreError;
use dedupe::DedupeCache;
use envelope_decode::extract_records;

/// Per-batch processing statistics, mirroring the wire response shape
/// `{processed_count, failed_count, skipped_count, errors[]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub processed: u32,
    pub failed: u32,
    pub skipped: u32,
    pub errors: Vec<String>,
}

/// Carries both the permanent error that aborted dispatch and whatever
/// statistics had accumulated before it, so callers can still report a
/// partial batch result while re-raising for dead-letter routing.
#[derive(Debug)]
pub struct BatchError {
    pub error: CoreError,
    pub partial: BatchStats,
}

impl std::fmt::Display for BatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl std::error::Error for BatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResult {
    pub status_code: u16,
    pub stats: BatchStats,
}

impl BatchResult {
    pub fn success(stats: BatchStats) -> Self {
        Self {
            status_code: 200,
            stats,
        }
    }

    pub fn permanent_failure(partial: BatchStats) -> Self {
        Self {
            status_code: 500,
            stats: partial,
        }
    }
}

/// One named consumer with a predicate over event types and the business
/// logic to apply to matching events.
#[async_trait]
pub trait Consumer: Send + Sync {
    fn name(&self) -> &str;

    fn should_process(&self, envelope: &EventEnvelope) -> bool;

    async fn process(&self, envelope: &EventEnvelope) -> Result<(), CoreError>;
}

/// Runs one batch through `consumer`: extracts records from whichever of
/// the three accepted payload shapes was delivered, decodes each to the
/// common envelope, applies `should_process`/dedupe gating, and invokes
/// `process`. A permanent error anywhere — in shape extraction, envelope
/// decode, or `process` itself — aborts the batch immediately and is
/// returned as `Err` carrying whatever stats had accumulated so far.
/// Transient `process` failures are recorded in `stats.errors` and do not
/// abort the batch.
pub async fn dispatch(consumer: &dyn Consumer, dedupe: &DedupeCache, payload: &Value) -> Result<BatchStats, BatchError> {
    let mut stats = BatchStats::default();

    let records = extract_records(payload).map_err(|error| BatchError {
        error,
        partial: stats.clone(),
    })?;

    for record in records {
        let envelope = match EventEnvelope::from_json(&record) {
            Ok(envelope) => envelope,
            Err(error) => {
                return Err(BatchError {
                    error,
                    partial: stats,
                })
            }
        };

        if !consumer.should_process(&envelope) {
            stats.skipped += 1;
            continue;
        }

        if dedupe.is_duplicate(&envelope.event_id) {
            stats.skipped += 1;
            continue;
        }

        match consumer.process(&envelope).await {
            Ok(()) => {
                dedupe.mark_processed(&envelope.event_id);
                stats.processed += 1;
            }
            Err(error) if error.is_permanent() => {
                return Err(BatchError {
                    error,
                    partial: stats,
                })
            }
            Err(error) => {
                stats.failed += 1;
                stats.errors.push(error.to_string());
            }
        }
    }

    Ok(stats)
}

/// Runs [`dispatch`] and folds the result into a [`BatchResult`] with the
/// wire-level status code, for adapters that want a response shape rather
/// than a `Result`.
pub async fn dispatch_to_response(consumer: &dyn Consumer, dedupe: &DedupeCache, payload: &Value) -> BatchResult {
    match dispatch(consumer, dedupe, payload).await {
        Ok(stats) => BatchResult::success(stats),
        Err(batch_error) => BatchResult::permanent_failure(batch_error.partial),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    struct RecordingConsumer {
        prefix: &'static str,
        processed: Mutex<Vec<String>>,
        fail_permanently_on: Option<&'static str>,
        transient_failures_remaining: AtomicU32,
    }

    #[async_trait]
    impl Consumer for RecordingConsumer {
        fn name(&self) -> &str {
            "recording"
        }

        fn should_process(&self, envelope: &EventEnvelope) -> bool {
            envelope.event_type.starts_with(self.prefix)
        }

        async fn process(&self, envelope: &EventEnvelope) -> Result<(), CoreError> {
            if Some(envelope.event_type.as_str()) == self.fail_permanently_on {
                return Err(CoreError::permanent_business("rejected"));
            }
            if self.transient_failures_remaining.load(Ordering::SeqCst) > 0 {
                self.transient_failures_remaining.fetch_sub(1, Ordering::SeqCst);
                return Err(CoreError::transient_io("throttled"));
            }
            self.processed.lock().unwrap().push(envelope.event_id.clone());
            Ok(())
        }
    }

    fn envelope(event_id: &str, event_type: &str) -> Value {
        json!({
            "eventId": event_id,
            "eventType": event_type,
            "timestamp": 1_700_000_000_000i64,
            "source": "test",
            "userId": "user-1",
            "data": {}
        })
    }

    #[tokio::test]
    async fn non_matching_events_are_skipped() {
        let consumer = RecordingConsumer {
            prefix: "file.",
            processed: Mutex::new(vec![]),
            fail_permanently_on: None,
            transient_failures_remaining: AtomicU32::new(0),
        };
        let dedupe = DedupeCache::new(500);
        let payload = json!([envelope("1", "file.processed"), envelope("2", "account.modified")]);

        let stats = dispatch(&consumer, &dedupe, &payload).await.unwrap();
        assert_eq!(stats.processed, 1);
        assert_eq!(stats.skipped, 1);
    }

    #[tokio::test]
    async fn duplicate_event_ids_are_skipped_on_second_delivery() {
        let consumer = RecordingConsumer {
            prefix: "file.",
            processed: Mutex::new(vec![]),
            fail_permanently_on: None,
            transient_failures_remaining: AtomicU32::new(0),
        };
        let dedupe = DedupeCache::new(500);
        let payload = json!([envelope("1", "file.processed")]);

        let first = dispatch(&consumer, &dedupe, &payload).await.unwrap();
        let second = dispatch(&consumer, &dedupe, &payload).await.unwrap();

        assert_eq!(first.processed, 1);
        assert_eq!(second.processed, 0);
        assert_eq!(second.skipped, 1);
    }

    #[tokio::test]
    async fn transient_failures_are_recorded_but_do_not_abort_the_batch() {
        let consumer = RecordingConsumer {
            prefix: "file.",
            processed: Mutex::new(vec![]),
            fail_permanently_on: None,
            transient_failures_remaining: AtomicU32::new(1),
        };
        let dedupe = DedupeCache::new(500);
        let payload = json!([envelope("1", "file.processed"), envelope("2", "file.processed")]);

        let stats = dispatch(&consumer, &dedupe, &payload).await.unwrap();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.processed, 1);
        assert_eq!(stats.errors.len(), 1);
    }

    #[tokio::test]
    async fn permanent_failure_aborts_the_batch_and_propagates() {
        let consumer = RecordingConsumer {
            prefix: "file.",
            processed: Mutex::new(vec![]),
            fail_permanently_on: Some("file.processed"),
            transient_failures_remaining: AtomicU32::new(0),
        };
        let dedupe = DedupeCache::new(500);
        let payload = json!([envelope("1", "file.processed"), envelope("2", "file.processed")]);

        let result = dispatch(&consumer, &dedupe, &payload).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn malformed_envelope_is_a_permanent_decode_failure() {
        let consumer = RecordingConsumer {
            prefix: "file.",
            processed: Mutex::new(vec![]),
            fail_permanently_on: None,
            transient_failures_remaining: AtomicU32::new(0),
        };
        let dedupe = DedupeCache::new(500);
        let payload = json!([{"eventType": "file.processed"}]);

        let result = dispatch(&consumer, &dedupe, &payload).await;
        assert!(result.unwrap_err().error.is_permanent());
    }
}
