use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Id, IdGenerator};

/// A single forecasted future occurrence of a recurring charge pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringChargePrediction {
    pub id: Id,
    pub pattern_id: Id,
    pub next_expected_date: DateTime<Utc>,
    pub expected_amount: Decimal,
    pub amount_range_min: Decimal,
    pub amount_range_max: Decimal,
    pub confidence: f64,
    pub days_until_due: i64,
}

impl RecurringChargePrediction {
    #[allow(clippy::too_many_arguments)]
    pub fn new_with_generator(
        generator: &dyn IdGenerator,
        pattern_id: Id,
        next_expected_date: DateTime<Utc>,
        expected_amount: Decimal,
        amount_range_min: Decimal,
        amount_range_max: Decimal,
        confidence: f64,
        from_date: DateTime<Utc>,
    ) -> Self {
        let days_until_due = (next_expected_date.date_naive() - from_date.date_naive()).num_days();
        Self {
            id: generator.new_id(),
            pattern_id,
            next_expected_date,
            expected_amount,
            amount_range_min,
            amount_range_max,
            confidence,
            days_until_due,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FixedIdGenerator;
    use chrono::TimeZone;

    #[test]
    fn days_until_due_counts_whole_days_from_from_date() {
        let gen = FixedIdGenerator::new([Id::from_string("prediction-1")]);
        let from_date = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let next = Utc.with_ymd_and_hms(2024, 2, 15, 0, 0, 0).unwrap();
        let prediction = RecurringChargePrediction::new_with_generator(
            &gen,
            Id::from_string("pattern-1"),
            next,
            Decimal::new(1499, 2),
            Decimal::new(1424, 2),
            Decimal::new(1574, 2),
            0.85,
            from_date,
        );
        assert_eq!(prediction.days_until_due, 14);
    }
}
