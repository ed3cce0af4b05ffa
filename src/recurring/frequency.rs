//! Interval statistics and frequency-bucket classification.

use chrono::NaiveDate;

use crate::models::RecurrenceFrequency;

/// Days between each consecutive pair of `sorted_dates` (already assumed
/// sorted ascending by the caller).
pub fn intervals_days(sorted_dates: &[NaiveDate]) -> Vec<f64> {
    sorted_dates
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).num_days() as f64)
        .collect()
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
pub fn population_std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Buckets a mean inter-transaction interval (in days) into a
/// [`RecurrenceFrequency`].
pub fn bucket(mean_interval_days: f64) -> RecurrenceFrequency {
    const BUCKETS: &[(f64, f64, RecurrenceFrequency)] = &[
        (0.5, 1.5, RecurrenceFrequency::Daily),
        (6.0, 8.0, RecurrenceFrequency::Weekly),
        (12.0, 16.0, RecurrenceFrequency::BiWeekly),
        (13.0, 17.0, RecurrenceFrequency::SemiMonthly),
        (25.0, 35.0, RecurrenceFrequency::Monthly),
        (55.0, 65.0, RecurrenceFrequency::BiMonthly),
        (85.0, 95.0, RecurrenceFrequency::Quarterly),
        (175.0, 190.0, RecurrenceFrequency::SemiAnnually),
        (355.0, 375.0, RecurrenceFrequency::Annually),
    ];
    BUCKETS
        .iter()
        .find(|(low, high, _)| mean_interval_days >= *low && mean_interval_days <= *high)
        .map(|(_, _, frequency)| *frequency)
        .unwrap_or(RecurrenceFrequency::Irregular)
}

/// Typical interval length for a frequency, used by the predictor's
/// Flexible/Irregular fallback and by the confidence calculation's decay
/// thresholds.
pub fn typical_days(frequency: RecurrenceFrequency) -> f64 {
    match frequency {
        RecurrenceFrequency::Daily => 1.0,
        RecurrenceFrequency::Weekly => 7.0,
        RecurrenceFrequency::BiWeekly => 14.0,
        RecurrenceFrequency::SemiMonthly => 15.0,
        RecurrenceFrequency::Monthly => 30.0,
        RecurrenceFrequency::BiMonthly => 60.0,
        RecurrenceFrequency::Quarterly => 90.0,
        RecurrenceFrequency::SemiAnnually => 182.0,
        RecurrenceFrequency::Annually => 365.0,
        RecurrenceFrequency::Irregular => 30.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thirty_day_interval_buckets_as_monthly() {
        assert_eq!(bucket(30.0), RecurrenceFrequency::Monthly);
    }

    #[test]
    fn seven_day_interval_buckets_as_weekly() {
        assert_eq!(bucket(7.0), RecurrenceFrequency::Weekly);
    }

    #[test]
    fn out_of_range_interval_is_irregular() {
        assert_eq!(bucket(40.0), RecurrenceFrequency::Irregular);
    }

    #[test]
    fn population_std_dev_of_constant_series_is_zero() {
        assert_eq!(population_std_dev(&[30.0, 30.0, 30.0]), 0.0);
    }
}
