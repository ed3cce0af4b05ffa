//! Pattern review actions: reject/edit/confirm lifecycle
//! transitions, gated by re-validation.

use rust_decimal::Decimal;

use crate::error::CoreError;
use crate::models::{PatternStatus, RecurringChargePattern, Transaction};

use super::validation::{self, ValidationReport};

/// Per-field edits a reviewer may apply before re-validating. `None` leaves
/// the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct PatternEdit {
    pub merchant_pattern: Option<String>,
    pub tolerance_pct: Option<Decimal>,
    pub tolerance_days: Option<u32>,
    pub suggested_category: Option<String>,
}

fn apply_validation(pattern: &mut RecurringChargePattern, report: &ValidationReport) {
    pattern.criteria_validated = report.is_valid;
    pattern.validation_errors = if report.is_valid { Vec::new() } else { report.suggestions.clone() };
}

fn activate_if_eligible(pattern: &mut RecurringChargePattern, activate_immediately: bool) {
    if activate_immediately && pattern.can_activate() {
        pattern.status = PatternStatus::Active;
    } else {
        pattern.status = PatternStatus::Paused;
    }
}

/// `reject`: the only transition that leaves `Confirmed`/`Active` entirely —
/// a rejected pattern never activates.
pub fn reject(pattern: &mut RecurringChargePattern) -> Result<(), CoreError> {
    require_transition(pattern.status, PatternStatus::Rejected)?;
    pattern.status = PatternStatus::Rejected;
    Ok(())
}

/// `confirm`: re-validates against `transactions`, always lands on
/// `Confirmed` first, then activates only if both `activate_immediately` and
/// validation passed.
pub fn confirm(
    pattern: &mut RecurringChargePattern,
    transactions: &[Transaction],
    activate_immediately: bool,
) -> Result<ValidationReport, CoreError> {
    require_transition(pattern.status, PatternStatus::Confirmed)?;
    let report = validation::validate(pattern, transactions);
    apply_validation(pattern, &report);
    pattern.status = PatternStatus::Confirmed;
    activate_if_eligible(pattern, activate_immediately);
    Ok(report)
}

/// `edit`: applies field edits, re-validates, always moves to `Confirmed`,
/// then activates under the same rule as `confirm`.
pub fn edit(
    pattern: &mut RecurringChargePattern,
    edits: PatternEdit,
    transactions: &[Transaction],
    activate_immediately: bool,
) -> Result<ValidationReport, CoreError> {
    require_transition(pattern.status, PatternStatus::Confirmed)?;

    if let Some(merchant_pattern) = edits.merchant_pattern {
        pattern.merchant_pattern = merchant_pattern;
    }
    if let Some(tolerance_pct) = edits.tolerance_pct {
        pattern.amount_statistics.tolerance_pct = tolerance_pct;
    }
    if let Some(tolerance_days) = edits.tolerance_days {
        pattern.tolerance_days = tolerance_days;
    }
    // suggested_category has no dedicated field on RecurringChargePattern
    // yet — it's recorded as a validation-adjacent note rather than
    // dropped silently.
    if let Some(category) = edits.suggested_category {
        pattern.validation_errors.push(format!("suggested category: {category}"));
    }

    let report = validation::validate(pattern, transactions);
    apply_validation(pattern, &report);
    pattern.status = PatternStatus::Confirmed;
    activate_if_eligible(pattern, activate_immediately);
    Ok(report)
}

/// Allowed lifecycle transitions: `Detected -> (Confirmed | Rejected)`,
/// `Confirmed -> (Active | Paused | Rejected)`. Anything else is a
/// precondition violation, not a retryable error.
fn require_transition(current: PatternStatus, target: PatternStatus) -> Result<(), CoreError> {
    let allowed = matches!(
        (current, target),
        (PatternStatus::Detected, PatternStatus::Confirmed)
            | (PatternStatus::Detected, PatternStatus::Rejected)
            | (PatternStatus::Confirmed, PatternStatus::Confirmed)
            | (PatternStatus::Confirmed, PatternStatus::Rejected)
            | (PatternStatus::Active, PatternStatus::Rejected)
            | (PatternStatus::Paused, PatternStatus::Rejected)
            | (PatternStatus::Paused, PatternStatus::Confirmed)
    );
    if allowed {
        Ok(())
    } else {
        Err(CoreError::permanent_business(format!("cannot transition pattern from {current:?} to {target:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AmountStatistics, FixedIdGenerator, Id, RecurrenceFrequency, TemporalPatternType, TransactionStatus};
    use chrono::{TimeZone, Utc};

    fn netflix_pattern() -> RecurringChargePattern {
        let gen = FixedIdGenerator::new([Id::from_string("pattern-1")]);
        RecurringChargePattern::new_with_generator(
            &gen,
            Id::from_string("user-1"),
            "NETFLIX",
            RecurrenceFrequency::Monthly,
            TemporalPatternType::DayOfMonth,
            AmountStatistics {
                mean: Decimal::new(1499, 2),
                std_dev: Decimal::ZERO,
                min: Decimal::new(1499, 2),
                max: Decimal::new(1499, 2),
                tolerance_pct: Decimal::new(5, 0),
            },
            0.9,
            1,
            Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap(),
            0,
            vec![],
        )
        .with_day_of_month(15)
    }

    fn tx(date: chrono::DateTime<Utc>) -> Transaction {
        let gen = FixedIdGenerator::new([Id::new()]);
        Transaction::new_with_generator(&gen, Id::from_string("acct-1"), Id::from_string("user-1"), date, "NETFLIX*MONTHLY", Decimal::new(-1499, 2), "USD", 1)
            .with_status(TransactionStatus::New)
    }

    #[test]
    fn reject_moves_directly_to_rejected() {
        let mut pattern = netflix_pattern();
        reject(&mut pattern).unwrap();
        assert_eq!(pattern.status, PatternStatus::Rejected);
    }

    #[test]
    fn confirm_activates_only_when_requested_and_valid() {
        let mut pattern = netflix_pattern();
        let jan = tx(Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap());
        pattern.matched_transaction_ids = vec![jan.id.clone()];
        let report = confirm(&mut pattern, &[jan], true).unwrap();
        assert!(report.is_valid);
        assert_eq!(pattern.status, PatternStatus::Active);
    }

    #[test]
    fn confirm_without_activate_immediately_pauses_even_if_valid() {
        let mut pattern = netflix_pattern();
        let jan = tx(Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap());
        pattern.matched_transaction_ids = vec![jan.id.clone()];
        confirm(&mut pattern, &[jan], false).unwrap();
        assert_eq!(pattern.status, PatternStatus::Paused);
    }

    #[test]
    fn confirm_with_no_matching_transactions_leaves_pattern_unvalidated_and_paused() {
        let mut pattern = netflix_pattern();
        pattern.matched_transaction_ids = vec![Id::from_string("tx-ghost")];
        let report = confirm(&mut pattern, &[], true).unwrap();
        assert!(!report.is_valid);
        assert_eq!(pattern.status, PatternStatus::Paused);
        assert!(!pattern.validation_errors.is_empty());
    }

    #[test]
    fn edit_updates_merchant_pattern_and_revalidates() {
        let mut pattern = netflix_pattern();
        let jan = tx(Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap());
        pattern.matched_transaction_ids = vec![jan.id.clone()];
        let edits = PatternEdit {
            merchant_pattern: Some("NETFLIX*".to_string()),
            ..Default::default()
        };
        edit(&mut pattern, edits, &[jan], true).unwrap();
        assert_eq!(pattern.merchant_pattern, "NETFLIX*");
        assert_eq!(pattern.status, PatternStatus::Active);
    }

    #[test]
    fn rejected_pattern_cannot_be_confirmed() {
        let mut pattern = netflix_pattern();
        reject(&mut pattern).unwrap();
        let result = confirm(&mut pattern, &[], true);
        assert!(result.unwrap_err().is_permanent());
    }
}
