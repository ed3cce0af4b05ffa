use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Currency, Id, IdGenerator};

/// Format detected by content sniffing during ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileFormat {
    Csv,
    Ofx,
    Qfx,
    Pdf,
    Xlsx,
    Json,
    Other,
}

/// Lifecycle state of an uploaded file as it moves through ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Processed,
    Error,
    NeedsMapping,
}

/// Record of a single bank-statement upload and its ingestion outcome.
///
/// Created once on object-store arrival, mutated by the ingestion pipeline
/// exactly once per run, and never resurrected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionFile {
    pub id: Id,
    pub user_id: Id,
    pub name: String,
    pub size: u64,
    pub object_key: String,
    pub format: FileFormat,
    pub status: ProcessingStatus,
    pub account_id: Option<Id>,
    pub field_map_id: Option<Id>,
    pub opening_balance: Option<Decimal>,
    pub currency: Currency,
    pub record_count: u32,
    pub duplicate_count: u32,
    pub date_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    pub error_message: Option<String>,
}

impl TransactionFile {
    pub fn new_with_generator(
        generator: &dyn IdGenerator,
        user_id: Id,
        name: impl Into<String>,
        size: u64,
        object_key: impl Into<String>,
        format: FileFormat,
        currency: impl Into<Currency>,
    ) -> Self {
        Self {
            id: generator.new_id(),
            user_id,
            name: name.into(),
            size,
            object_key: object_key.into(),
            format,
            status: ProcessingStatus::Pending,
            account_id: None,
            field_map_id: None,
            opening_balance: None,
            currency: currency.into(),
            record_count: 0,
            duplicate_count: 0,
            date_range: None,
            error_message: None,
        }
    }

    pub fn with_id(mut self, id: Id) -> Self {
        self.id = id;
        self
    }

    pub fn with_account_id(mut self, account_id: Id) -> Self {
        self.account_id = Some(account_id);
        self
    }

    pub fn with_field_map_id(mut self, field_map_id: Id) -> Self {
        self.field_map_id = Some(field_map_id);
        self
    }

    pub fn mark_needs_mapping(&mut self) {
        self.status = ProcessingStatus::NeedsMapping;
    }

    pub fn mark_error(&mut self, message: impl Into<String>) {
        self.status = ProcessingStatus::Error;
        self.error_message = Some(message.into());
    }

    #[allow(clippy::too_many_arguments)]
    pub fn mark_processed(
        &mut self,
        opening_balance: Decimal,
        record_count: u32,
        duplicate_count: u32,
        date_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) {
        self.status = ProcessingStatus::Processed;
        self.opening_balance = Some(opening_balance);
        self.record_count = record_count;
        self.duplicate_count = duplicate_count;
        self.date_range = date_range;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FixedIdGenerator;

    #[test]
    fn new_file_starts_pending() {
        let gen = FixedIdGenerator::new([Id::from_string("file-1")]);
        let file = TransactionFile::new_with_generator(
            &gen,
            Id::from_string("user-1"),
            "jan-statement.csv",
            2048,
            "user-1/file-1/jan-statement.csv",
            FileFormat::Csv,
            "USD",
        );
        assert_eq!(file.status, ProcessingStatus::Pending);
        assert_eq!(file.record_count, 0);
    }

    #[test]
    fn mark_processed_updates_summary_fields() {
        let gen = FixedIdGenerator::new([Id::from_string("file-1")]);
        let mut file = TransactionFile::new_with_generator(
            &gen,
            Id::from_string("user-1"),
            "jan-statement.csv",
            2048,
            "user-1/file-1/jan-statement.csv",
            FileFormat::Csv,
            "USD",
        );
        file.mark_processed(Decimal::ZERO, 10, 0, None);
        assert_eq!(file.status, ProcessingStatus::Processed);
        assert_eq!(file.record_count, 10);
    }
}
