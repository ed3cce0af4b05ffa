//! Confidence scoring: a weighted blend of interval
//! regularity, amount regularity, sample size, and temporal consistency,
//! plus an optional account-aware adjustment table.

use crate::models::{AccountType, RecurrenceFrequency};

#[derive(Debug, Clone, Copy)]
pub struct ConfidenceWeights {
    pub interval_regularity: f64,
    pub amount_regularity: f64,
    pub sample_size: f64,
    pub temporal_consistency: f64,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            interval_regularity: 0.30,
            amount_regularity: 0.20,
            sample_size: 0.20,
            temporal_consistency: 0.30,
        }
    }
}

fn regularity(mean: f64, std_dev: f64) -> f64 {
    1.0 / (1.0 + std_dev / (mean + 1.0))
}

/// The blended confidence score, rounded to two decimals.
#[allow(clippy::too_many_arguments)]
pub fn compute(
    weights: ConfidenceWeights,
    interval_mean: f64,
    interval_std_dev: f64,
    amount_mean_abs: f64,
    amount_std_dev: f64,
    transaction_count: u32,
    temporal_consistency: f64,
) -> f64 {
    let interval_regularity = regularity(interval_mean, interval_std_dev);
    let amount_regularity = regularity(amount_mean_abs, amount_std_dev);
    let sample_size = (transaction_count as f64 / 12.0).min(1.0);

    let score = weights.interval_regularity * interval_regularity
        + weights.amount_regularity * amount_regularity
        + weights.sample_size * sample_size
        + weights.temporal_consistency * temporal_consistency;

    (score * 100.0).round() / 100.0
}

/// A coarse merchant category, inferred by keyword match against the
/// cluster's merchant pattern, used only to look up the account-aware
/// adjustment table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MerchantCategory {
    Subscription,
    Utility,
    Bill,
    Income,
    Transfer,
    Contribution,
    Payment,
    Fee,
    Interest,
    Deposit,
    Expense,
}

pub fn classify_merchant(merchant_pattern: &str) -> MerchantCategory {
    let lower = merchant_pattern.to_ascii_lowercase();
    const KEYWORDS: &[(&[&str], MerchantCategory)] = &[
        (&["netflix", "hulu", "spotify", "subscription", "prime", "membership"], MerchantCategory::Subscription),
        (&["electric", "water", "gas co", "utility", "power"], MerchantCategory::Utility),
        (&["payroll", "salary", "direct dep", "deposit from"], MerchantCategory::Income),
        (&["transfer", "xfer"], MerchantCategory::Transfer),
        (&["401k", "ira", "contribution", "retirement"], MerchantCategory::Contribution),
        (&["loan", "mortgage", "payment"], MerchantCategory::Payment),
        (&["fee", "overdraft", "service charge"], MerchantCategory::Fee),
        (&["interest"], MerchantCategory::Interest),
        (&["deposit"], MerchantCategory::Deposit),
        (&["bill", "invoice"], MerchantCategory::Bill),
    ];
    KEYWORDS
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|keyword| lower.contains(keyword)))
        .map(|(_, category)| *category)
        .unwrap_or(MerchantCategory::Expense)
}

/// Static `(account_type, frequency, category) -> delta` table. Not
/// exhaustive of every combination — unmatched combinations contribute no
/// adjustment.
fn adjustment_delta(account_type: AccountType, frequency: RecurrenceFrequency, category: MerchantCategory) -> f64 {
    use AccountType::*;
    use MerchantCategory::*;
    use RecurrenceFrequency::*;

    match (account_type, frequency, category) {
        (CreditCard, Monthly, Subscription) => 0.10,
        (Checking, BiWeekly, Income) => 0.15,
        (Checking, Monthly, Income) => 0.10,
        (Savings, Daily, Expense) => -0.20,
        (Loan, Monthly, Payment) => 0.20,
        (Checking, Monthly, Bill) => 0.05,
        (Checking, Monthly, Utility) => 0.05,
        (Investment, Monthly, Contribution) => 0.10,
        (Savings, Annually, Fee) => -0.10,
        _ => 0.0,
    }
}

/// Applies the account-aware delta to `base_confidence`, clamped to
/// `[0, 1]`. Logs when the adjustment is non-trivial (`|delta| >= 0.05`).
pub fn apply_account_aware_adjustment(
    base_confidence: f64,
    account_type: AccountType,
    frequency: RecurrenceFrequency,
    merchant_pattern: &str,
) -> f64 {
    let category = classify_merchant(merchant_pattern);
    let delta = adjustment_delta(account_type, frequency, category);
    if delta.abs() >= 0.05 {
        tracing::debug!(?account_type, ?frequency, ?category, delta, "applying account-aware confidence adjustment");
    }
    (base_confidence + delta).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfectly_regular_pattern_scores_high() {
        let score = compute(ConfidenceWeights::default(), 30.0, 0.0, 14.99, 0.0, 12, 1.0);
        assert!(score >= 0.85, "expected high confidence, got {score}");
    }

    #[test]
    fn credit_card_monthly_subscription_gets_a_positive_bump() {
        let adjusted = apply_account_aware_adjustment(0.80, AccountType::CreditCard, RecurrenceFrequency::Monthly, "NETFLIX");
        assert!((adjusted - 0.90).abs() < 1e-9);
    }

    #[test]
    fn adjustment_clamps_to_one() {
        let adjusted = apply_account_aware_adjustment(0.95, AccountType::CreditCard, RecurrenceFrequency::Monthly, "NETFLIX");
        assert_eq!(adjusted, 1.0);
    }
}
