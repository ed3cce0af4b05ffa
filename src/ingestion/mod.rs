//! File-ingestion pipeline: a `file.uploaded` consumer that fetches the
//! uploaded bytes, detects format, resolves a field map, parses rows,
//! detects duplicates, reconstructs running balances, persists transactions,
//! and emits `file.processed`. A second consumer, [`CategorizationConsumer`],
//! reacts to `file.processed` and attaches rule-engine category suggestions.

pub mod balance;
pub mod csv_parser;
pub mod duplicates;
pub mod field_mapping;
pub mod format;
pub mod ofx_parser;
pub mod rules;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Value};

use crate::bus::EventBus;
use crate::consumer::Consumer;
use crate::envelope::EventEnvelope;
use crate::error::CoreError;
use crate::models::{transaction_hash, Category, Currency, FieldMap, Id, IdGenerator, Transaction, TransactionFile, TransactionStatus};
use crate::object_store::ObjectStore;
use crate::store::{get_typed, put_typed, query_index_typed, IndexKey, Pagination, Store};

use balance::{extract_opening_balance, infer_opening_balance_from_balance_column, reconstruct_running_balances};
use duplicates::{account_hash_key, find_existing, opening_balance_from_overlap, ACCOUNT_HASH_INDEX};
use field_mapping::{column_map_from_field_map, infer_column_map, ColumnMap};
use format::detect_format;
use ofx_parser::parse_ofx_transactions;
use rules::{primary_candidate, RuleEngine};

const TRANSACTIONS_TABLE: &str = "transactions";
const FILES_TABLE: &str = "transaction_files";
const CATEGORIES_TABLE: &str = "categories";
const FIELD_MAPS_TABLE: &str = "field_maps";
const FILE_ID_INDEX: &str = "fileId";
const ACCOUNT_STATUS_DATE_INDEX: &str = "accountId_statusDate";
const USER_ID_INDEX: &str = "userId";

fn required_str<'a>(data: &'a Value, field: &str) -> Result<&'a str, CoreError> {
    data.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| CoreError::permanent_decode(format!("file.uploaded event missing required field {field:?}")))
}

fn transaction_indexes(tx: &Transaction) -> Vec<IndexKey> {
    vec![
        IndexKey::new(ACCOUNT_HASH_INDEX, account_hash_key(&tx.account_id, tx.hash)),
        IndexKey::new(FILE_ID_INDEX, tx.file_id.as_ref().map(Id::as_str).unwrap_or_default()),
        IndexKey::new(ACCOUNT_STATUS_DATE_INDEX, format!("{}#{}", tx.account_id.as_str(), tx.status_date_key())),
        IndexKey::new(USER_ID_INDEX, tx.user_id.as_str()),
    ]
}

struct IngestOutcome {
    opening_balance: Decimal,
    record_count: u32,
    duplicate_count: u32,
    date_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    transaction_ids: Vec<Id>,
}

/// Listens for `file.uploaded`, runs the full parse/dedupe/persist pipeline,
/// and emits `file.processed`.
pub struct IngestionConsumer {
    store: Arc<dyn Store>,
    objects: Arc<dyn ObjectStore>,
    bus: Arc<dyn EventBus>,
    ids: Arc<dyn IdGenerator>,
}

impl IngestionConsumer {
    pub fn new(store: Arc<dyn Store>, objects: Arc<dyn ObjectStore>, bus: Arc<dyn EventBus>, ids: Arc<dyn IdGenerator>) -> Self {
        Self { store, objects, bus, ids }
    }

    /// Runs steps 1-8. `Ok(None)` means the file was left in `NeedsMapping`
    /// and already persisted; the caller stops without emitting an event.
    async fn ingest(
        &self,
        file: &mut TransactionFile,
        account_id: &Id,
    ) -> Result<Option<IngestOutcome>, CoreError> {
        let bytes = self.objects.read(&file.object_key).await?;
        file.format = detect_format(&bytes, &file.name);
        put_typed(self.store.as_ref(), FILES_TABLE, &file.id, &*file, vec![]).await?;

        match file.format {
            crate::models::FileFormat::Csv => self.ingest_csv(file, account_id, &bytes).await,
            crate::models::FileFormat::Ofx | crate::models::FileFormat::Qfx => {
                self.ingest_ofx(file, account_id, &bytes).await.map(Some)
            }
            other => Err(CoreError::permanent_input(format!("{other:?} ingestion is not supported"))),
        }
    }

    async fn resolve_column_map(
        &self,
        file: &TransactionFile,
        headers: &[String],
    ) -> Result<Option<ColumnMap>, CoreError> {
        if let Some(field_map_id) = &file.field_map_id {
            let field_map: FieldMap = get_typed(self.store.as_ref(), FIELD_MAPS_TABLE, field_map_id)
                .await?
                .ok_or_else(|| CoreError::permanent_input("bound field map not found"))?;
            return Ok(column_map_from_field_map(&field_map, headers));
        }
        Ok(infer_column_map(headers))
    }

    async fn ingest_csv(
        &self,
        file: &mut TransactionFile,
        account_id: &Id,
        bytes: &[u8],
    ) -> Result<Option<IngestOutcome>, CoreError> {
        let headers = csv_parser::parse_header(bytes)?;

        let Some(column_map) = self.resolve_column_map(file, &headers).await? else {
            file.mark_needs_mapping();
            put_typed(self.store.as_ref(), FILES_TABLE, &file.id, &*file, vec![]).await?;
            return Ok(None);
        };

        let rows = csv_parser::parse_rows(bytes, &column_map)?;
        if rows.is_empty() {
            return Ok(Some(IngestOutcome {
                opening_balance: Decimal::ZERO,
                record_count: 0,
                duplicate_count: 0,
                date_range: None,
                transaction_ids: Vec::new(),
            }));
        }

        let amounts: Vec<Decimal> = rows.iter().map(|row| row.amount).collect();

        let first_hash = transaction_hash(account_id, rows[0].date, rows[0].amount, &rows[0].description);
        let last = rows.last().expect("checked non-empty above");
        let last_hash = transaction_hash(account_id, last.date, last.amount, &last.description);
        let first_existing = find_existing(self.store.as_ref(), account_id, first_hash).await?;
        let last_existing = find_existing(self.store.as_ref(), account_id, last_hash).await?;

        let balance_column_fallback = String::from_utf8_lossy(bytes)
            .lines()
            .nth(1)
            .map(csv_parser::split_csv_line)
            .and_then(|fields| infer_opening_balance_from_balance_column(&headers, &fields, amounts[0]));

        let opening_balance = opening_balance_from_overlap(first_existing.as_ref(), last_existing.as_ref(), amounts[0])
            .or_else(|| extract_opening_balance(file.format, bytes))
            .or(balance_column_fallback)
            .unwrap_or(Decimal::ZERO);

        let running_balances = reconstruct_running_balances(opening_balance, &amounts);

        let mut transaction_ids = Vec::new();
        let mut duplicate_count = 0u32;

        for (index, row) in rows.iter().enumerate() {
            let hash = transaction_hash(account_id, row.date, row.amount, &row.description);
            let existing = find_existing(self.store.as_ref(), account_id, hash).await?;
            let status = if existing.is_some() {
                duplicate_count += 1;
                TransactionStatus::Duplicate
            } else {
                TransactionStatus::New
            };

            let tx = Transaction::new_with_generator(
                self.ids.as_ref(),
                account_id.clone(),
                file.user_id.clone(),
                row.date,
                row.description.clone(),
                row.amount,
                file.currency,
                (index + 1) as u32,
            )
            .with_file_id(file.id.clone())
            .with_running_balance(running_balances[index])
            .with_status(status);

            if status == TransactionStatus::New {
                transaction_ids.push(tx.id.clone());
            }

            put_typed(self.store.as_ref(), TRANSACTIONS_TABLE, &tx.id, &tx, transaction_indexes(&tx)).await?;
        }

        let date_range = Some((rows.first().expect("non-empty").date, rows.last().expect("non-empty").date));

        Ok(Some(IngestOutcome {
            opening_balance,
            record_count: rows.len() as u32,
            duplicate_count,
            date_range,
            transaction_ids,
        }))
    }

    async fn ingest_ofx(
        &self,
        file: &mut TransactionFile,
        account_id: &Id,
        bytes: &[u8],
    ) -> Result<IngestOutcome, CoreError> {
        let records = parse_ofx_transactions(bytes)?;
        if records.is_empty() {
            return Ok(IngestOutcome {
                opening_balance: Decimal::ZERO,
                record_count: 0,
                duplicate_count: 0,
                date_range: None,
                transaction_ids: Vec::new(),
            });
        }

        let opening_balance = extract_opening_balance(file.format, bytes).unwrap_or(Decimal::ZERO);
        let amounts: Vec<Decimal> = records.iter().map(|record| record.amount).collect();
        let running_balances = reconstruct_running_balances(opening_balance, &amounts);

        let mut transaction_ids = Vec::new();
        let mut duplicate_count = 0u32;

        for (index, record) in records.iter().enumerate() {
            let hash = transaction_hash(account_id, record.date, record.amount, &record.description);
            let existing = find_existing(self.store.as_ref(), account_id, hash).await?;
            let status = if existing.is_some() {
                duplicate_count += 1;
                TransactionStatus::Duplicate
            } else {
                TransactionStatus::New
            };

            let tx = Transaction::new_with_generator(
                self.ids.as_ref(),
                account_id.clone(),
                file.user_id.clone(),
                record.date,
                record.description.clone(),
                record.amount,
                file.currency,
                (index + 1) as u32,
            )
            .with_file_id(file.id.clone())
            .with_running_balance(running_balances[index])
            .with_status(status);

            if status == TransactionStatus::New {
                transaction_ids.push(tx.id.clone());
            }

            put_typed(self.store.as_ref(), TRANSACTIONS_TABLE, &tx.id, &tx, transaction_indexes(&tx)).await?;
        }

        let date_range = Some((records.first().expect("non-empty").date, records.last().expect("non-empty").date));

        Ok(IngestOutcome {
            opening_balance,
            record_count: records.len() as u32,
            duplicate_count,
            date_range,
            transaction_ids,
        })
    }
}

#[async_trait]
impl Consumer for IngestionConsumer {
    fn name(&self) -> &str {
        "file-ingestion"
    }

    fn should_process(&self, envelope: &EventEnvelope) -> bool {
        envelope.event_type == "file.uploaded"
    }

    /// Errors from malformed envelope data propagate (nothing useful to
    /// persist). Everything past that point — a missing object, an
    /// unsupported format, a store failure mid-pipeline — is caught and
    /// turned into a `file.processed` event with `processingStatus=failed`
    /// plus an `Error` file record, per the pipeline's own exception
    /// contract, rather than bubbling up through the consumer framework.
    async fn process(&self, envelope: &EventEnvelope) -> Result<(), CoreError> {
        let data = &envelope.data;
        let file_id = Id::from_string(required_str(data, "fileId")?);
        let file_name = required_str(data, "fileName")?.to_string();
        let file_size = data.get("fileSize").and_then(Value::as_u64).unwrap_or(0);
        let s3_key = required_str(data, "s3Key")?.to_string();
        let account_id = data.get("accountId").and_then(Value::as_str).map(Id::from_string);
        let field_map_id = data.get("fieldMapId").and_then(Value::as_str).map(Id::from_string);
        let user_id = Id::from_string(envelope.user_id.clone());

        let mut file = TransactionFile {
            id: file_id.clone(),
            user_id,
            name: file_name,
            size: file_size,
            object_key: s3_key,
            format: crate::models::FileFormat::Other,
            status: crate::models::ProcessingStatus::Pending,
            account_id: account_id.clone(),
            field_map_id,
            opening_balance: None,
            currency: Currency::USD,
            record_count: 0,
            duplicate_count: 0,
            date_range: None,
            error_message: None,
        };

        let Some(account_id) = account_id else {
            file.mark_error("file.uploaded event carried no accountId");
            put_typed(self.store.as_ref(), FILES_TABLE, &file.id, &file, vec![]).await?;
            self.bus
                .publish(failed_event(envelope, &file, "file.uploaded event carried no accountId"))
                .await?;
            return Ok(());
        };

        match self.ingest(&mut file, &account_id).await {
            Ok(None) => Ok(()),
            Ok(Some(outcome)) => {
                file.mark_processed(outcome.opening_balance, outcome.record_count, outcome.duplicate_count, outcome.date_range);
                put_typed(self.store.as_ref(), FILES_TABLE, &file.id, &file, vec![]).await?;

                let data = json!({
                    "fileId": file.id.as_str(),
                    "accountId": account_id.as_str(),
                    "transactionCount": outcome.record_count,
                    "duplicateCount": outcome.duplicate_count,
                    "processingStatus": "success",
                    "transactionIds": outcome.transaction_ids.iter().map(Id::as_str).collect::<Vec<_>>(),
                });
                let published = EventEnvelope::new("file.processed", "ingestion", envelope.user_id.clone(), data)
                    .with_causation_id(envelope.event_id.clone());
                self.bus.publish(published).await?;
                Ok(())
            }
            Err(error) => {
                file.mark_error(error.message.clone());
                put_typed(self.store.as_ref(), FILES_TABLE, &file.id, &file, vec![]).await?;
                self.bus.publish(failed_event(envelope, &file, &error.message)).await?;
                Ok(())
            }
        }
    }
}

fn failed_event(envelope: &EventEnvelope, file: &TransactionFile, error_message: &str) -> EventEnvelope {
    let data = json!({
        "fileId": file.id.as_str(),
        "accountId": file.account_id.as_ref().map(Id::as_str),
        "transactionCount": 0,
        "duplicateCount": 0,
        "processingStatus": "failed",
        "transactionIds": Vec::<String>::new(),
        "errorMessage": error_message,
    });
    EventEnvelope::new("file.processed", "ingestion", envelope.user_id.clone(), data)
        .with_causation_id(envelope.event_id.clone())
}

/// Listens for `file.processed`, loads the user's categories, and attaches
/// rule-engine suggestions to each transaction the file produced. Existing
/// confirmed assignments are left untouched; suggestions are additive.
pub struct CategorizationConsumer {
    store: Arc<dyn Store>,
}

impl CategorizationConsumer {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Consumer for CategorizationConsumer {
    fn name(&self) -> &str {
        "categorization"
    }

    fn should_process(&self, envelope: &EventEnvelope) -> bool {
        envelope.event_type == "file.processed"
    }

    async fn process(&self, envelope: &EventEnvelope) -> Result<(), CoreError> {
        let data = &envelope.data;
        if data.get("processingStatus").and_then(Value::as_str) != Some("success") {
            return Ok(());
        }
        let file_id = required_str(data, "fileId")?;

        let categories = query_index_typed::<Category>(
            self.store.as_ref(),
            CATEGORIES_TABLE,
            USER_ID_INDEX,
            &envelope.user_id,
            Pagination::first(0),
        )
        .await?
        .items;
        if categories.is_empty() {
            return Ok(());
        }
        let engine = RuleEngine::new(&categories);

        let transactions =
            query_index_typed::<Transaction>(self.store.as_ref(), TRANSACTIONS_TABLE, FILE_ID_INDEX, file_id, Pagination::first(0))
                .await?
                .items;

        for mut tx in transactions {
            let suggestions = engine.suggest(&tx);
            if suggestions.is_empty() {
                continue;
            }
            if tx.primary_category.is_none() {
                if let Some(best) = primary_candidate(&suggestions) {
                    tx.primary_category = Some(best.category_id.clone());
                }
            }
            for suggestion in suggestions {
                tx.add_category_assignment(suggestion);
            }
            let indexes = transaction_indexes(&tx);
            put_typed(self.store.as_ref(), TRANSACTIONS_TABLE, &tx.id, &tx, indexes).await?;
        }

        Ok(())
    }
}
