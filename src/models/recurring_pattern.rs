use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Id, IdGenerator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceFrequency {
    Daily,
    Weekly,
    BiWeekly,
    SemiMonthly,
    Monthly,
    BiMonthly,
    Quarterly,
    SemiAnnually,
    Annually,
    Irregular,
}

/// Weekday ordinal matching `chrono::Weekday`'s Monday=0 convention, used for
/// `day_of_week` so it round-trips through the 0-6 Mon-Sun wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemporalPatternType {
    DayOfMonth,
    DayOfWeek,
    FirstWorkingDay,
    LastWorkingDay,
    FirstWeekdayOfMonth,
    LastWeekdayOfMonth,
    Weekend,
    Weekday,
    Flexible,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternStatus {
    Detected,
    Confirmed,
    Active,
    Paused,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AmountStatistics {
    pub mean: Decimal,
    pub std_dev: Decimal,
    pub min: Decimal,
    pub max: Decimal,
    /// Percent tolerance applied around `mean` during criteria validation.
    pub tolerance_pct: Decimal,
}

/// A candidate recurring charge produced by clustering: a detected
/// frequency, temporal type, merchant pattern, amount statistics, and a
/// confidence score, plus the bookkeeping needed to bridge clustering
/// (Phase 1) to rule-based re-matching (Phase 2).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringChargePattern {
    pub id: Id,
    pub user_id: Id,
    pub account_id: Option<Id>,
    pub merchant_pattern: String,
    pub frequency: RecurrenceFrequency,
    pub temporal_pattern_type: TemporalPatternType,
    pub day_of_month: Option<u32>,
    /// 0-6, Monday=0, matching `chrono::Weekday::num_days_from_monday`.
    pub day_of_week: Option<u32>,
    pub tolerance_days: u32,
    pub amount_statistics: AmountStatistics,
    pub confidence_score: f64,
    pub transaction_count: u32,
    pub first_occurrence: DateTime<Utc>,
    pub last_occurrence: DateTime<Utc>,
    pub cluster_id: i32,
    pub status: PatternStatus,
    pub matched_transaction_ids: Vec<Id>,
    pub criteria_validated: bool,
    pub validation_errors: Vec<String>,
}

impl RecurringChargePattern {
    #[allow(clippy::too_many_arguments)]
    pub fn new_with_generator(
        generator: &dyn IdGenerator,
        user_id: Id,
        merchant_pattern: impl Into<String>,
        frequency: RecurrenceFrequency,
        temporal_pattern_type: TemporalPatternType,
        amount_statistics: AmountStatistics,
        confidence_score: f64,
        transaction_count: u32,
        first_occurrence: DateTime<Utc>,
        last_occurrence: DateTime<Utc>,
        cluster_id: i32,
        matched_transaction_ids: Vec<Id>,
    ) -> Self {
        Self {
            id: generator.new_id(),
            user_id,
            account_id: None,
            merchant_pattern: merchant_pattern.into(),
            frequency,
            temporal_pattern_type,
            day_of_month: None,
            day_of_week: None,
            tolerance_days: 2,
            amount_statistics,
            confidence_score,
            transaction_count,
            first_occurrence,
            last_occurrence,
            cluster_id,
            status: PatternStatus::Detected,
            matched_transaction_ids,
            criteria_validated: false,
            validation_errors: Vec::new(),
        }
    }

    pub fn with_account_id(mut self, account_id: Id) -> Self {
        self.account_id = Some(account_id);
        self
    }

    pub fn with_day_of_month(mut self, day: u32) -> Self {
        self.day_of_month = Some(day);
        self
    }

    pub fn with_day_of_week(mut self, day: u32) -> Self {
        self.day_of_week = Some(day);
        self
    }

    pub fn with_tolerance_days(mut self, tolerance_days: u32) -> Self {
        self.tolerance_days = tolerance_days;
        self
    }

    /// A pattern may transition to Active only if validation has passed
    /// and marked `criteria_validated`.
    pub fn can_activate(&self) -> bool {
        self.criteria_validated && self.validation_errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FixedIdGenerator;
    use chrono::TimeZone;

    #[test]
    fn new_pattern_starts_detected_and_unvalidated() {
        let gen = FixedIdGenerator::new([Id::from_string("pattern-1")]);
        let stats = AmountStatistics {
            mean: Decimal::new(1499, 2),
            std_dev: Decimal::ZERO,
            min: Decimal::new(1499, 2),
            max: Decimal::new(1499, 2),
            tolerance_pct: Decimal::new(5, 0),
        };
        let pattern = RecurringChargePattern::new_with_generator(
            &gen,
            Id::from_string("user-1"),
            "NETFLIX",
            RecurrenceFrequency::Monthly,
            TemporalPatternType::DayOfMonth,
            stats,
            0.9,
            12,
            Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 12, 15, 0, 0, 0).unwrap(),
            0,
            vec![],
        );
        assert_eq!(pattern.status, PatternStatus::Detected);
        assert!(!pattern.can_activate());
    }
}
