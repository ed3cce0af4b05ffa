//! Criteria validation: re-applies a pattern's own
//! matching criteria against transactions and compares the result to the
//! cluster it was originally detected from.

use rust_decimal::Decimal;

use crate::models::{Id, RecurringChargePattern, Transaction};

/// The outcome of validating a pattern against a set of candidate
/// transactions: which ids matched, and how that compares to the pattern's
/// recorded `matched_transaction_ids`.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    pub matched_ids: Vec<Id>,
    pub missing_ids: Vec<Id>,
    pub extra_ids: Vec<Id>,
    pub all_original_match_criteria: bool,
    pub no_false_positives: bool,
    pub perfect_match: bool,
    pub is_valid: bool,
    pub suggestions: Vec<String>,
}

/// Whether `tx` satisfies `pattern`'s merchant/amount/temporal criteria,
/// independent of any date window.
fn matches_criteria(pattern: &RecurringChargePattern, tx: &Transaction) -> bool {
    let merchant_matches = tx.description.to_ascii_lowercase().contains(&pattern.merchant_pattern.to_ascii_lowercase());
    if !merchant_matches {
        return false;
    }

    let tolerance = pattern.amount_statistics.tolerance_pct / Decimal::new(100, 0);
    let mean = pattern.amount_statistics.mean.abs();
    let allowed = mean * tolerance;
    let amount_matches = (tx.amount.abs() - mean).abs() <= allowed;
    if !amount_matches {
        return false;
    }

    temporal_matches(pattern, tx)
}

fn temporal_matches(pattern: &RecurringChargePattern, tx: &Transaction) -> bool {
    use crate::models::TemporalPatternType::*;
    use chrono::Datelike;

    let date = tx.date.date_naive();
    let tolerance = pattern.tolerance_days as i64;

    match pattern.temporal_pattern_type {
        DayOfMonth => {
            let Some(target) = pattern.day_of_month else { return true };
            (date.day() as i64 - target as i64).abs() <= tolerance
        }
        DayOfWeek => {
            let Some(target) = pattern.day_of_week else { return true };
            date.weekday().num_days_from_monday() == target
        }
        FirstWorkingDay | LastWorkingDay | FirstWeekdayOfMonth | LastWeekdayOfMonth => true,
        Weekend => matches!(date.weekday(), chrono::Weekday::Sat | chrono::Weekday::Sun),
        Weekday => !matches!(date.weekday(), chrono::Weekday::Sat | chrono::Weekday::Sun),
        Flexible => true,
    }
}

/// Validates `pattern` against `transactions` restricted to
/// `[first_occurrence, last_occurrence]`, comparing the result to
/// `pattern.matched_transaction_ids`.
pub fn validate(pattern: &RecurringChargePattern, transactions: &[Transaction]) -> ValidationReport {
    let windowed: Vec<&Transaction> = transactions
        .iter()
        .filter(|tx| tx.date >= pattern.first_occurrence && tx.date <= pattern.last_occurrence)
        .collect();
    build_report(pattern, &windowed)
}

/// Applies the pattern's criteria against every transaction given, with no
/// date window — used by retroactive categorization.
pub fn get_matching_transactions<'a>(pattern: &RecurringChargePattern, transactions: &'a [Transaction]) -> Vec<&'a Transaction> {
    transactions.iter().filter(|tx| matches_criteria(pattern, tx)).collect()
}

fn build_report(pattern: &RecurringChargePattern, candidates: &[&Transaction]) -> ValidationReport {
    let matched_ids: Vec<Id> = candidates.iter().filter(|tx| matches_criteria(pattern, tx)).map(|tx| tx.id.clone()).collect();

    let missing_ids: Vec<Id> = pattern.matched_transaction_ids.iter().filter(|id| !matched_ids.contains(id)).cloned().collect();
    let extra_ids: Vec<Id> = matched_ids.iter().filter(|id| !pattern.matched_transaction_ids.contains(id)).cloned().collect();

    let all_original_match_criteria = missing_ids.is_empty();
    let no_false_positives = extra_ids.is_empty();
    let perfect_match = all_original_match_criteria && no_false_positives;
    let is_valid = all_original_match_criteria;

    let mut suggestions = Vec::new();
    if !missing_ids.is_empty() {
        suggestions.push("loosen amount tolerance".to_string());
        suggestions.push("widen temporal tolerance days".to_string());
    }
    if !extra_ids.is_empty() {
        suggestions.push("tighten merchant pattern".to_string());
    }

    ValidationReport {
        matched_ids,
        missing_ids,
        extra_ids,
        all_original_match_criteria,
        no_false_positives,
        perfect_match,
        is_valid,
        suggestions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AmountStatistics, FixedIdGenerator, RecurrenceFrequency, TemporalPatternType, TransactionStatus};
    use chrono::{TimeZone, Utc};

    fn tx(id: &str, description: &str, amount: i64, date: chrono::DateTime<Utc>) -> Transaction {
        let gen = FixedIdGenerator::new([Id::from_string(id)]);
        Transaction::new_with_generator(&gen, Id::from_string("acct-1"), Id::from_string("user-1"), date, description, Decimal::new(amount, 2), "USD", 1)
            .with_status(TransactionStatus::New)
    }

    fn netflix_pattern(matched_ids: Vec<Id>) -> RecurringChargePattern {
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
            matched_ids.len() as u32,
            Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 12, 15, 0, 0, 0).unwrap(),
            0,
            matched_ids,
        )
        .with_day_of_month(15)
    }

    #[test]
    fn matching_the_original_cluster_is_a_perfect_match() {
        let jan = tx("tx-1", "NETFLIX*MONTHLY", -1499, Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap());
        let feb = tx("tx-2", "NETFLIX*MONTHLY", -1499, Utc.with_ymd_and_hms(2024, 2, 15, 0, 0, 0).unwrap());
        let pattern = netflix_pattern(vec![jan.id.clone(), feb.id.clone()]);
        let report = validate(&pattern, &[jan, feb]);
        assert!(report.perfect_match);
        assert!(report.is_valid);
    }

    #[test]
    fn a_missing_original_transaction_fails_validity() {
        let jan = tx("tx-1", "NETFLIX*MONTHLY", -1499, Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap());
        let ghost_id = Id::from_string("tx-missing");
        let pattern = netflix_pattern(vec![jan.id.clone(), ghost_id]);
        let report = validate(&pattern, &[jan]);
        assert!(!report.all_original_match_criteria);
        assert!(!report.is_valid);
        assert_eq!(report.missing_ids.len(), 1);
    }

    #[test]
    fn extra_matches_are_tolerated_but_not_a_perfect_match() {
        let jan = tx("tx-1", "NETFLIX*MONTHLY", -1499, Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap());
        let extra = tx("tx-2", "NETFLIX*STANDARD", -1499, Utc.with_ymd_and_hms(2024, 2, 15, 0, 0, 0).unwrap());
        let pattern = netflix_pattern(vec![jan.id.clone()]);
        let report = validate(&pattern, &[jan, extra]);
        assert!(report.is_valid);
        assert!(!report.perfect_match);
        assert_eq!(report.extra_ids.len(), 1);
    }

    #[test]
    fn get_matching_transactions_ignores_the_date_window() {
        let outside = tx("tx-1", "NETFLIX*MONTHLY", -1499, Utc.with_ymd_and_hms(2025, 6, 15, 0, 0, 0).unwrap());
        let pattern = netflix_pattern(vec![]);
        let matches = get_matching_transactions(&pattern, &[outside]);
        assert_eq!(matches.len(), 1);
    }
}
