use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

use super::{Currency, Id, IdGenerator};

/// Whether a transaction is newly imported or a re-encounter of one already
/// persisted for the same account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    New,
    Duplicate,
}

/// Whether a category suggestion has been accepted by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryAssignmentStatus {
    Suggested,
    Confirmed,
}

/// A single category suggestion or confirmation attached to a transaction.
/// A transaction may carry more than one of these (e.g. two rules both
/// matching), with `primary_category` picking a winner for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryAssignment {
    pub category_id: Id,
    /// 0-100, matching the wire contract for categorization suggestions.
    pub confidence: u8,
    pub rule_id: Option<Id>,
    pub manual: bool,
    pub status: CategoryAssignmentStatus,
}

/// A single posted or pending movement of money within an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Id,
    pub account_id: Id,
    pub file_id: Option<Id>,
    pub user_id: Id,
    pub date: DateTime<Utc>,
    pub description: String,
    pub amount: Decimal,
    pub currency: Currency,
    pub running_balance: Option<Decimal>,
    /// 1-based order in which this row appeared within its source file, after
    /// chronological normalization. Stable per file, not globally unique.
    pub import_order: u32,
    pub hash: u64,
    pub status: TransactionStatus,
    pub category_assignments: Vec<CategoryAssignment>,
    pub primary_category: Option<Id>,
}

impl Transaction {
    #[allow(clippy::too_many_arguments)]
    pub fn new_with_generator(
        generator: &dyn IdGenerator,
        account_id: Id,
        user_id: Id,
        date: DateTime<Utc>,
        description: impl Into<String>,
        amount: Decimal,
        currency: impl Into<Currency>,
        import_order: u32,
    ) -> Self {
        let description = description.into();
        let currency = currency.into();
        let hash = transaction_hash(&account_id, date, amount, &description);
        Self {
            id: generator.new_id(),
            account_id,
            file_id: None,
            user_id,
            date,
            description,
            amount,
            currency,
            running_balance: None,
            import_order,
            hash,
            status: TransactionStatus::New,
            category_assignments: Vec::new(),
            primary_category: None,
        }
    }

    pub fn with_id(mut self, id: Id) -> Self {
        self.id = id;
        self
    }

    pub fn with_file_id(mut self, file_id: Id) -> Self {
        self.file_id = Some(file_id);
        self
    }

    pub fn with_running_balance(mut self, balance: Decimal) -> Self {
        self.running_balance = Some(balance);
        self
    }

    pub fn with_status(mut self, status: TransactionStatus) -> Self {
        self.status = status;
        self
    }

    /// Composite sort key for the `(accountId, statusDate)` secondary index:
    /// `status#timestamp`, where timestamp is milliseconds since epoch.
    pub fn status_date_key(&self) -> String {
        format!(
            "{}#{}",
            match self.status {
                TransactionStatus::New => "new",
                TransactionStatus::Duplicate => "duplicate",
            },
            self.date.timestamp_millis()
        )
    }

    pub fn add_category_assignment(&mut self, assignment: CategoryAssignment) {
        self.category_assignments.push(assignment);
    }
}

/// Stable 64-bit fingerprint of (account, date, amount, description), used as
/// the duplicate-detection key alongside `accountId`. Deliberately
/// hand-rolled (not `DefaultHasher`, whose output isn't guaranteed stable
/// across Rust versions) so the hash is reproducible across runs and process
/// restarts — duplicate detection depends on it never drifting.
pub fn transaction_hash(account_id: &Id, date: DateTime<Utc>, amount: Decimal, description: &str) -> u64 {
    let mut hasher = Fnv1aHasher::new();
    account_id.as_str().hash(&mut hasher);
    date.timestamp_millis().hash(&mut hasher);
    amount.to_string().hash(&mut hasher);
    description.hash(&mut hasher);
    hasher.finish()
}

/// FNV-1a: simple, dependency-free, and stable across Rust versions and
/// platforms, unlike `std::collections::hash_map::DefaultHasher`.
struct Fnv1aHasher(u64);

impl Fnv1aHasher {
    const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;

    fn new() -> Self {
        Self(Self::OFFSET_BASIS)
    }
}

impl Hasher for Fnv1aHasher {
    fn finish(&self) -> u64 {
        self.0
    }

    fn write(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.0 ^= u64::from(*byte);
            self.0 = self.0.wrapping_mul(Self::PRIME);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FixedIdGenerator;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn hash_is_stable_for_identical_inputs() {
        let account_id = Id::from_string("acct-1");
        let a = transaction_hash(&account_id, date(2024, 1, 1), Decimal::new(-1499, 2), "NETFLIX");
        let b = transaction_hash(&account_id, date(2024, 1, 1), Decimal::new(-1499, 2), "NETFLIX");
        assert_eq!(a, b);
    }

    #[test]
    fn hash_differs_when_any_field_differs() {
        let account_id = Id::from_string("acct-1");
        let base = transaction_hash(&account_id, date(2024, 1, 1), Decimal::new(-1499, 2), "NETFLIX");
        let diff_amount =
            transaction_hash(&account_id, date(2024, 1, 1), Decimal::new(-1500, 2), "NETFLIX");
        let diff_desc = transaction_hash(&account_id, date(2024, 1, 1), Decimal::new(-1499, 2), "HULU");
        assert_ne!(base, diff_amount);
        assert_ne!(base, diff_desc);
    }

    #[test]
    fn status_date_key_composes_status_and_millis() {
        let gen = FixedIdGenerator::new([Id::from_string("tx-1")]);
        let tx = Transaction::new_with_generator(
            &gen,
            Id::from_string("acct-1"),
            Id::from_string("user-1"),
            date(2024, 1, 15),
            "NETFLIX*MONTHLY",
            Decimal::new(-1499, 2),
            "USD",
            1,
        );
        assert_eq!(tx.status_date_key(), format!("new#{}", date(2024, 1, 15).timestamp_millis()));
    }
}
