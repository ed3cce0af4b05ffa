use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Currency, Id, IdGenerator};

/// Kind of financial account. Drives default vote-quorum voter sets
/// (business-like accounts raise the bar) and recurring-charge
/// account-aware confidence adjustments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Checking,
    Savings,
    CreditCard,
    Investment,
    Loan,
    Other,
}

/// A financial account owned by exactly one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: Id,
    pub owner: Id,
    pub name: String,
    #[serde(rename = "type")]
    pub account_type: AccountType,
    pub institution: String,
    pub balance_amount: rust_decimal::Decimal,
    pub balance_currency: Currency,
    pub active: bool,
    pub first_transaction_date: Option<DateTime<Utc>>,
}

impl Account {
    pub fn new_with_generator(
        generator: &dyn IdGenerator,
        owner: Id,
        name: impl Into<String>,
        account_type: AccountType,
        institution: impl Into<String>,
        currency: impl Into<Currency>,
    ) -> Self {
        Self {
            id: generator.new_id(),
            owner,
            name: name.into(),
            account_type,
            institution: institution.into(),
            balance_amount: rust_decimal::Decimal::ZERO,
            balance_currency: currency.into(),
            active: true,
            first_transaction_date: None,
        }
    }

    pub fn with_id(mut self, id: Id) -> Self {
        self.id = id;
        self
    }

    pub fn with_balance(mut self, amount: rust_decimal::Decimal) -> Self {
        self.balance_amount = amount;
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn with_first_transaction_date(mut self, date: DateTime<Utc>) -> Self {
        self.first_transaction_date = Some(date);
        self
    }

    /// True if this account is treated as "business" for vote-quorum and
    /// recurring-charge adjustment purposes. Business classification isn't a
    /// first-class field in the data model, so it is inferred from `name`/
    /// `institution` containing a business marker, matching the heuristic the
    /// workflow-config resolver applies when no explicit flag is present.
    pub fn is_business(&self) -> bool {
        self.name.to_ascii_lowercase().contains("business")
            || self.institution.to_ascii_lowercase().contains("business")
    }
}
