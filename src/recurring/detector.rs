//! Recurring-charge detector: a `recurring_charge.detection.requested`
//! consumer that feature-extracts a user's transactions, clusters them with
//! DBSCAN, analyzes each cluster into a candidate pattern, and persists the
//! patterns clearing `min_confidence`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::clock::Clock;
use crate::consumer::Consumer;
use crate::envelope::EventEnvelope;
use crate::error::CoreError;
use crate::models::{Account, AccountType, AmountStatistics, Id, IdGenerator, OperationStatus, OperationTracking, RecurringChargePattern, Transaction};
use crate::store::{get_typed, put_typed, query_index_typed, IndexKey, Pagination, Store};

use super::{confidence, dbscan, features, frequency, merchant, temporal};

const TRANSACTIONS_TABLE: &str = "transactions";
const ACCOUNTS_TABLE: &str = "accounts";
const PATTERNS_TABLE: &str = "recurring_patterns";
const OPERATIONS_TABLE: &str = "operations";
const USER_ID_INDEX: &str = "userId";

const DEFAULT_MIN_OCCURRENCES: usize = 3;
const DEFAULT_MIN_CONFIDENCE: f64 = 0.6;

fn required_str<'a>(data: &'a Value, field: &str) -> Result<&'a str, CoreError> {
    data.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| CoreError::permanent_decode(format!("recurring_charge.detection.requested event missing required field {field:?}")))
}

struct DetectionRequest {
    operation_id: Id,
    account_id: Option<Id>,
    min_occurrences: usize,
    min_confidence: f64,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
}

fn parse_request(envelope: &EventEnvelope) -> Result<DetectionRequest, CoreError> {
    let data = &envelope.data;
    let operation_id = Id::from_string(required_str(data, "operationId")?);
    let account_id = data.get("accountId").and_then(Value::as_str).map(Id::from_string);
    let min_occurrences = data.get("minOccurrences").and_then(Value::as_u64).map(|n| n as usize).unwrap_or(DEFAULT_MIN_OCCURRENCES);
    let min_confidence = data.get("minConfidence").and_then(Value::as_f64).unwrap_or(DEFAULT_MIN_CONFIDENCE);
    let start_date = data.get("startDateTs").and_then(Value::as_i64).map(|ms| DateTime::<Utc>::from_timestamp_millis(ms).unwrap_or_default());
    let end_date = data.get("endDateTs").and_then(Value::as_i64).map(|ms| DateTime::<Utc>::from_timestamp_millis(ms).unwrap_or_default());

    Ok(DetectionRequest {
        operation_id,
        account_id,
        min_occurrences,
        min_confidence,
        start_date,
        end_date,
    })
}

/// Country code used for holiday-aware temporal pattern detection; not yet
/// exposed as a per-user setting, so a single configured default applies to
/// every detection run.
pub struct DetectorConfig {
    pub holiday_country: String,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            holiday_country: "US".to_string(),
        }
    }
}

pub struct RecurringChargeDetector {
    store: Arc<dyn Store>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    config: DetectorConfig,
}

impl RecurringChargeDetector {
    pub fn new(store: Arc<dyn Store>, ids: Arc<dyn IdGenerator>, clock: Arc<dyn Clock>, config: DetectorConfig) -> Self {
        Self { store, ids, clock, config }
    }

    async fn load_transactions(&self, user_id: &str, request: &DetectionRequest) -> Result<Vec<Transaction>, CoreError> {
        let page = query_index_typed::<Transaction>(self.store.as_ref(), TRANSACTIONS_TABLE, USER_ID_INDEX, user_id, Pagination::first(0)).await?;
        Ok(page
            .items
            .into_iter()
            .filter(|tx| request.account_id.as_ref().map(|id| id == &tx.account_id).unwrap_or(true))
            .filter(|tx| request.start_date.map(|start| tx.date >= start).unwrap_or(true))
            .filter(|tx| request.end_date.map(|end| tx.date <= end).unwrap_or(true))
            .collect())
    }

    /// Analyzes one DBSCAN cluster into a persisted pattern, if it clears
    /// `min_confidence`. Returns `None` for clusters too small or too weak.
    /// `account_type` is the primary account type for the detection scope,
    /// when known, and feeds the account-aware confidence adjustment.
    fn analyze_cluster(
        &self,
        user_id: &Id,
        account_id: Option<&Id>,
        account_type: Option<AccountType>,
        mut members: Vec<Transaction>,
        cluster_id: i32,
        min_confidence: f64,
    ) -> Option<RecurringChargePattern> {
        members.sort_by_key(|tx| tx.date);

        let dates: Vec<chrono::NaiveDate> = members.iter().map(|tx| tx.date.date_naive()).collect();
        let intervals = frequency::intervals_days(&dates);
        let interval_mean = frequency::mean(&intervals);
        let interval_std_dev = frequency::population_std_dev(&intervals);
        let freq = frequency::bucket(interval_mean);

        let (temporal_type, day_of_month, day_of_week, temporal_consistency) = temporal::detect_temporal_pattern(&dates, &self.config.holiday_country);

        let descriptions: Vec<String> = members.iter().map(|tx| tx.description.clone()).collect();
        let merchant_pattern = merchant::merchant_pattern(&descriptions);

        let amounts: Vec<f64> = members.iter().map(|tx| tx.amount.abs().to_string().parse::<f64>().unwrap_or(0.0)).collect();
        let amount_mean_abs = frequency::mean(&amounts);
        let amount_std_dev = frequency::population_std_dev(&amounts);

        let base_confidence = confidence::compute(
            confidence::ConfidenceWeights::default(),
            interval_mean,
            interval_std_dev,
            amount_mean_abs,
            amount_std_dev,
            members.len() as u32,
            temporal_consistency,
        );

        let final_confidence = match account_type {
            Some(account_type) => confidence::apply_account_aware_adjustment(base_confidence, account_type, freq, &merchant_pattern),
            None => base_confidence,
        };

        if final_confidence < min_confidence {
            return None;
        }

        let amount_values: Vec<Decimal> = members.iter().map(|tx| tx.amount.abs()).collect();
        let amount_stats = decimal_amount_statistics(&amount_values);

        let first_occurrence = members.first().expect("non-empty cluster").date;
        let last_occurrence = members.last().expect("non-empty cluster").date;
        let matched_ids: Vec<Id> = members.iter().map(|tx| tx.id.clone()).collect();

        let mut pattern = RecurringChargePattern::new_with_generator(
            self.ids.as_ref(),
            user_id.clone(),
            merchant_pattern,
            freq,
            temporal_type,
            amount_stats,
            final_confidence,
            members.len() as u32,
            first_occurrence,
            last_occurrence,
            cluster_id,
            matched_ids,
        );
        if let Some(account_id) = account_id {
            pattern = pattern.with_account_id(account_id.clone());
        }
        if let Some(day) = day_of_month {
            pattern = pattern.with_day_of_month(day);
        }
        if let Some(day) = day_of_week {
            pattern = pattern.with_day_of_week(day);
        }
        Some(pattern)
    }

    async fn run_detection(&self, envelope: &EventEnvelope, request: DetectionRequest) -> Result<Vec<RecurringChargePattern>, CoreError> {
        let user_id = Id::from_string(envelope.user_id.clone());
        let transactions = self.load_transactions(&envelope.user_id, &request).await?;

        if transactions.len() < request.min_occurrences {
            return Ok(Vec::new());
        }

        let account_type = match &request.account_id {
            Some(account_id) => get_typed::<Account>(self.store.as_ref(), ACCOUNTS_TABLE, account_id).await?.map(|account| account.account_type),
            None => None,
        };

        let mut sorted = transactions;
        sorted.sort_by_key(|tx| tx.date);

        let dates: Vec<chrono::NaiveDate> = sorted.iter().map(|tx| tx.date.date_naive()).collect();
        let amounts: Vec<Decimal> = sorted.iter().map(|tx| tx.amount).collect();
        let descriptions: Vec<String> = sorted.iter().map(|tx| tx.description.clone()).collect();
        let account_types: Option<Vec<AccountType>> = account_type.map(|account_type| vec![account_type; dates.len()]);

        let feature_matrix = features::build_feature_matrix(&dates, &amounts, &descriptions, &self.config.holiday_country, account_types.as_deref());

        let min_samples = dbscan::default_min_samples(feature_matrix.len(), request.min_occurrences);
        let labels = dbscan::cluster(&feature_matrix, 0.5, min_samples);

        let mut clusters: HashMap<i32, Vec<Transaction>> = HashMap::new();
        for (tx, label) in sorted.into_iter().zip(labels.into_iter()) {
            if label == dbscan::NOISE {
                continue;
            }
            clusters.entry(label).or_default().push(tx);
        }

        let mut patterns = Vec::new();
        for (cluster_id, members) in clusters {
            if members.len() < request.min_occurrences {
                continue;
            }
            if let Some(pattern) = self.analyze_cluster(&user_id, request.account_id.as_ref(), account_type, members, cluster_id, request.min_confidence) {
                let indexes = vec![IndexKey::new(USER_ID_INDEX, user_id.as_str())];
                put_typed(self.store.as_ref(), PATTERNS_TABLE, &pattern.id, &pattern, indexes).await?;
                patterns.push(pattern);
            }
        }

        Ok(patterns)
    }
}

fn decimal_amount_statistics(values: &[Decimal]) -> AmountStatistics {
    let floats: Vec<f64> = values.iter().map(|v| v.to_string().parse::<f64>().unwrap_or(0.0)).collect();
    let mean = frequency::mean(&floats);
    let std_dev = frequency::population_std_dev(&floats);
    let min = values.iter().cloned().min().unwrap_or(Decimal::ZERO);
    let max = values.iter().cloned().max().unwrap_or(Decimal::ZERO);

    AmountStatistics {
        mean: Decimal::try_from(mean).unwrap_or(Decimal::ZERO),
        std_dev: Decimal::try_from(std_dev).unwrap_or(Decimal::ZERO),
        min,
        max,
        tolerance_pct: Decimal::new(5, 0),
    }
}

#[async_trait]
impl Consumer for RecurringChargeDetector {
    fn name(&self) -> &str {
        "recurring-charge-detector"
    }

    fn should_process(&self, envelope: &EventEnvelope) -> bool {
        envelope.event_type == "recurring_charge.detection.requested"
    }

    async fn process(&self, envelope: &EventEnvelope) -> Result<(), CoreError> {
        let request = parse_request(envelope)?;
        let operation_id = request.operation_id.clone();

        let mut tracking = OperationTracking::new(operation_id.clone(), self.clock.now());
        tracking.update(OperationStatus::InProgress, None, self.clock.now());
        put_typed(self.store.as_ref(), OPERATIONS_TABLE, &operation_id, &tracking, vec![]).await?;

        match self.run_detection(envelope, request).await {
            Ok(patterns) => {
                tracking.update(OperationStatus::Completed, Some(format!("{} patterns detected", patterns.len())), self.clock.now());
                put_typed(self.store.as_ref(), OPERATIONS_TABLE, &operation_id, &tracking, vec![]).await?;
                Ok(())
            }
            Err(error) if !error.is_permanent() => {
                tracking.update(OperationStatus::Failed, Some(error.message.clone()), self.clock.now());
                put_typed(self.store.as_ref(), OPERATIONS_TABLE, &operation_id, &tracking, vec![]).await?;
                Err(error)
            }
            Err(error) => {
                tracking.update(OperationStatus::Failed, Some(error.message.clone()), self.clock.now());
                put_typed(self.store.as_ref(), OPERATIONS_TABLE, &operation_id, &tracking, vec![]).await?;
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::models::{FixedIdGenerator, TransactionStatus};
    use crate::store::memory::MemoryStore;
    use chrono::TimeZone;
    use serde_json::json;

    fn detector(store: Arc<MemoryStore>) -> RecurringChargeDetector {
        let ids = Arc::new(FixedIdGenerator::new((1..=5).map(|i| Id::from_string(format!("pattern-{i}")))));
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 12, 31, 0, 0, 0).unwrap()));
        RecurringChargeDetector::new(store, ids, clock, DetectorConfig::default())
    }

    async fn seed_netflix(store: &MemoryStore, user_id: &str) {
        for month in 1..=12u32 {
            let date = Utc.with_ymd_and_hms(2024, month, 15, 0, 0, 0).unwrap();
            let tx_ids = Arc::new(FixedIdGenerator::new([Id::from_string(format!("netflix-{month}"))]));
            let tx = Transaction::new_with_generator(
                tx_ids.as_ref(),
                Id::from_string("acct-1"),
                Id::from_string(user_id),
                date,
                format!("NETFLIX*{month}"),
                Decimal::new(-1499, 2),
                "USD",
                1,
            )
            .with_status(TransactionStatus::New);
            put_typed(store, TRANSACTIONS_TABLE, &tx.id, &tx, vec![IndexKey::new(USER_ID_INDEX, user_id)])
                .await
                .unwrap();
        }
    }

    fn requested_event(user_id: &str) -> EventEnvelope {
        EventEnvelope::new(
            "recurring_charge.detection.requested",
            "scheduler",
            user_id,
            json!({"operationId": "op-1", "minOccurrences": 3, "minConfidence": 0.5}),
        )
    }

    #[tokio::test]
    async fn twelve_monthly_netflix_charges_detect_one_high_confidence_pattern() {
        let store = Arc::new(MemoryStore::new());
        seed_netflix(&store, "user-1").await;
        let detector = detector(store.clone());

        detector.process(&requested_event("user-1")).await.unwrap();

        let page = query_index_typed::<RecurringChargePattern>(store.as_ref(), PATTERNS_TABLE, USER_ID_INDEX, "user-1", Pagination::first(0))
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        let pattern = &page.items[0];
        assert!(pattern.merchant_pattern.to_ascii_uppercase().contains("NETFLIX"));
        assert_eq!(pattern.day_of_month, Some(15));
        assert!(pattern.confidence_score >= 0.85, "confidence was {}", pattern.confidence_score);
    }

    #[tokio::test]
    async fn too_few_transactions_detects_nothing() {
        let store = Arc::new(MemoryStore::new());
        let tx_ids = FixedIdGenerator::new([Id::from_string("tx-1")]);
        let tx = Transaction::new_with_generator(
            &tx_ids,
            Id::from_string("acct-1"),
            Id::from_string("user-2"),
            Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap(),
            "NETFLIX",
            Decimal::new(-1499, 2),
            "USD",
            1,
        );
        put_typed(store.as_ref(), TRANSACTIONS_TABLE, &tx.id, &tx, vec![IndexKey::new(USER_ID_INDEX, "user-2")]).await.unwrap();
        let detector = detector(store.clone());
        detector.process(&requested_event("user-2")).await.unwrap();

        let page = query_index_typed::<RecurringChargePattern>(store.as_ref(), PATTERNS_TABLE, USER_ID_INDEX, "user-2", Pagination::first(0))
            .await
            .unwrap();
        assert!(page.items.is_empty());
    }

    #[tokio::test]
    async fn operation_tracking_reaches_completed() {
        let store = Arc::new(MemoryStore::new());
        seed_netflix(&store, "user-3").await;
        let detector = detector(store.clone());
        detector.process(&requested_event("user-3")).await.unwrap();

        let tracking: OperationTracking = get_typed(store.as_ref(), OPERATIONS_TABLE, &Id::from_string("op-1")).await.unwrap().unwrap();
        assert_eq!(tracking.status, OperationStatus::Completed);
    }
}
