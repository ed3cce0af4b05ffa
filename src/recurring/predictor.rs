//! Next-occurrence prediction: computes the next expected
//! date for a pattern's temporal type, an amount range, and a decayed
//! confidence score.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use rust_decimal::Decimal;

use crate::models::{Id, IdGenerator, RecurrenceFrequency, RecurringChargePattern, RecurringChargePrediction, TemporalPatternType};

use super::{frequency, holidays};

const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

fn weekday_from_index(index: u32) -> Weekday {
    WEEKDAYS[(index % 7) as usize]
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let next_month_first = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .expect("valid year/month");
    (next_month_first - NaiveDate::from_ymd_opt(year, month, 1).expect("valid year/month")).num_days() as u32
}

fn next_day_of_month(from: NaiveDate, day: u32) -> NaiveDate {
    let mut candidate_year = from.year();
    let mut candidate_month = from.month();
    loop {
        let days_in_candidate_month = days_in_month(candidate_year, candidate_month);
        let clamped_day = day.min(days_in_candidate_month);
        let candidate = NaiveDate::from_ymd_opt(candidate_year, candidate_month, clamped_day).expect("clamped day is valid");
        if candidate > from {
            return candidate;
        }
        if candidate_month == 12 {
            candidate_year += 1;
            candidate_month = 1;
        } else {
            candidate_month += 1;
        }
    }
}

fn next_day_of_week(from: NaiveDate, weekday: Weekday, biweekly: bool) -> NaiveDate {
    let mut offset = (7 + weekday.num_days_from_monday() as i64 - from.weekday().num_days_from_monday() as i64) % 7;
    if offset == 0 {
        offset = if biweekly { 14 } else { 7 };
    }
    from + Duration::days(offset)
}

fn next_working_day_boundary(from: NaiveDate, country: &str, last: bool) -> NaiveDate {
    let candidate = if last {
        holidays::last_working_day_of_month(from.year(), from.month(), country)
    } else {
        holidays::first_working_day_of_month(from.year(), from.month(), country)
    };
    if candidate > from {
        return candidate;
    }
    let (next_year, next_month) = if from.month() == 12 { (from.year() + 1, 1) } else { (from.year(), from.month() + 1) };
    if last {
        holidays::last_working_day_of_month(next_year, next_month, country)
    } else {
        holidays::first_working_day_of_month(next_year, next_month, country)
    }
}

fn next_weekday_of_month(from: NaiveDate, weekday: Weekday, last: bool) -> NaiveDate {
    let nth = if last { 0 } else { 1 };
    let candidate = holidays::weekday_of_month(from.year(), from.month(), weekday, nth);
    if candidate > from {
        return candidate;
    }
    let (next_year, next_month) = if from.month() == 12 { (from.year() + 1, 1) } else { (from.year(), from.month() + 1) };
    holidays::weekday_of_month(next_year, next_month, weekday, nth)
}

fn next_weekend(from: NaiveDate) -> NaiveDate {
    let mut candidate = from + Duration::days(1);
    while !matches!(candidate.weekday(), Weekday::Sat | Weekday::Sun) {
        candidate += Duration::days(1);
    }
    candidate
}

fn next_weekday(from: NaiveDate) -> NaiveDate {
    let mut candidate = from + Duration::days(1);
    while matches!(candidate.weekday(), Weekday::Sat | Weekday::Sun) {
        candidate += Duration::days(1);
    }
    candidate
}

fn next_flexible(last_occurrence: NaiveDate, from: NaiveDate, frequency: RecurrenceFrequency) -> NaiveDate {
    let step = frequency::typical_days(frequency).round() as i64;
    let step = step.max(1);
    let mut candidate = last_occurrence + Duration::days(step);
    while candidate <= from {
        candidate += Duration::days(step);
    }
    candidate
}

/// The next expected date strictly after `from`, per the pattern's temporal
/// type.
fn next_expected_date(pattern: &RecurringChargePattern, from: NaiveDate, country: &str) -> NaiveDate {
    match pattern.temporal_pattern_type {
        TemporalPatternType::DayOfMonth => next_day_of_month(from, pattern.day_of_month.unwrap_or(1)),
        TemporalPatternType::DayOfWeek => {
            let weekday = weekday_from_index(pattern.day_of_week.unwrap_or(0));
            next_day_of_week(from, weekday, pattern.frequency == RecurrenceFrequency::BiWeekly)
        }
        TemporalPatternType::FirstWorkingDay => next_working_day_boundary(from, country, false),
        TemporalPatternType::LastWorkingDay => next_working_day_boundary(from, country, true),
        TemporalPatternType::FirstWeekdayOfMonth => {
            next_weekday_of_month(from, weekday_from_index(pattern.day_of_week.unwrap_or(0)), false)
        }
        TemporalPatternType::LastWeekdayOfMonth => {
            next_weekday_of_month(from, weekday_from_index(pattern.day_of_week.unwrap_or(0)), true)
        }
        TemporalPatternType::Weekend => next_weekend(from),
        TemporalPatternType::Weekday => next_weekday(from),
        TemporalPatternType::Flexible => next_flexible(pattern.last_occurrence.date_naive(), from, pattern.frequency),
    }
}

/// `time_factor`: decays with how many multiples of the typical interval
/// have elapsed since `from` relative to the pattern's last occurrence.
fn time_factor(pattern: &RecurringChargePattern, from: NaiveDate) -> f64 {
    let typical = frequency::typical_days(pattern.frequency).max(1.0);
    let elapsed = (from - pattern.last_occurrence.date_naive()).num_days() as f64;
    let ratio = elapsed / typical;
    if ratio <= 1.5 {
        1.0
    } else if ratio <= 2.0 {
        0.9
    } else if ratio <= 3.0 {
        0.8
    } else {
        0.7
    }
}

fn sample_factor(transaction_count: u32) -> f64 {
    if transaction_count >= 12 {
        1.0
    } else if transaction_count >= 6 {
        0.95
    } else {
        0.90
    }
}

/// Predicts the single next occurrence of `pattern` strictly after
/// `from_date` (defaulting to "now" is the caller's responsibility — this
/// function always takes an explicit `from_date`).
pub fn predict_next(
    generator: &dyn IdGenerator,
    pattern: &RecurringChargePattern,
    from_date: DateTime<Utc>,
    country: &str,
) -> RecurringChargePrediction {
    let from = from_date.date_naive();
    let next_date = next_expected_date(pattern, from, country);
    let next_expected = next_date.and_hms_opt(0, 0, 0).expect("midnight is valid").and_utc();

    let tolerance = pattern.amount_statistics.tolerance_pct / Decimal::new(100, 0);
    let mean = pattern.amount_statistics.mean;
    let range_min = mean - (mean.abs() * tolerance);
    let range_max = mean + (mean.abs() * tolerance);

    let confidence = pattern.confidence_score * time_factor(pattern, from) * sample_factor(pattern.transaction_count);

    RecurringChargePrediction::new_with_generator(generator, pattern.id.clone(), next_expected, mean, range_min, range_max, confidence, from_date)
}

/// Iterates `predict_next`, starting each subsequent prediction at
/// `previous + 1 day` so consecutive predictions never collapse onto the
/// same date.
pub fn predict_multiple(
    generator: &dyn IdGenerator,
    pattern: &RecurringChargePattern,
    count: usize,
    from_date: DateTime<Utc>,
    country: &str,
) -> Vec<RecurringChargePrediction> {
    let mut predictions = Vec::with_capacity(count);
    let mut cursor = from_date;
    for _ in 0..count {
        let prediction = predict_next(generator, pattern, cursor, country);
        cursor = prediction.next_expected_date + Duration::days(1);
        predictions.push(prediction);
    }
    predictions
}
