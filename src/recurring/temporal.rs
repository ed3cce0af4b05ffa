//! Temporal-pattern detection: tries each pattern in
//! priority order, accepting the first whose consistency clears its
//! threshold.

use std::collections::HashMap;

use chrono::{Datelike, NaiveDate, Weekday};

use crate::models::TemporalPatternType;

use super::holidays;

const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

fn mode(values: &[u32]) -> Option<u32> {
    let mut counts: HashMap<u32, usize> = HashMap::new();
    for value in values {
        *counts.entry(*value).or_insert(0) += 1;
    }
    counts.into_iter().max_by_key(|(_, count)| *count).map(|(value, _)| value)
}

/// The detected temporal pattern plus `day_of_month`/`day_of_week` (whichever
/// applies) and the consistency fraction that won. `dates` need not be
/// sorted.
pub fn detect_temporal_pattern(dates: &[NaiveDate], country: &str) -> (TemporalPatternType, Option<u32>, Option<u32>, f64) {
    let n = dates.len() as f64;
    if dates.is_empty() {
        return (TemporalPatternType::Flexible, None, None, 0.5);
    }

    let last_working_day_consistency = dates
        .iter()
        .filter(|date| **date == holidays::last_working_day_of_month(date.year(), date.month(), country))
        .count() as f64
        / n;
    if last_working_day_consistency >= 0.70 {
        return (TemporalPatternType::LastWorkingDay, None, None, last_working_day_consistency);
    }

    let first_working_day_consistency = dates
        .iter()
        .filter(|date| **date == holidays::first_working_day_of_month(date.year(), date.month(), country))
        .count() as f64
        / n;
    if first_working_day_consistency >= 0.70 {
        return (TemporalPatternType::FirstWorkingDay, None, None, first_working_day_consistency);
    }

    let mut best_weekday_of_month: Option<(TemporalPatternType, u32, f64)> = None;
    for weekday in WEEKDAYS {
        for (pattern_type, nth) in [(TemporalPatternType::LastWeekdayOfMonth, 0u32), (TemporalPatternType::FirstWeekdayOfMonth, 1u32)] {
            let consistency = dates
                .iter()
                .filter(|date| **date == holidays::weekday_of_month(date.year(), date.month(), weekday, nth))
                .count() as f64
                / n;
            let better = best_weekday_of_month.as_ref().map(|(_, _, best)| consistency > *best).unwrap_or(true);
            if better {
                best_weekday_of_month = Some((pattern_type, weekday.num_days_from_monday(), consistency));
            }
        }
    }
    if let Some((pattern_type, day_of_week, consistency)) = best_weekday_of_month {
        if consistency >= 0.70 {
            return (pattern_type, None, Some(day_of_week), consistency);
        }
    }

    let days_of_month: Vec<u32> = dates.iter().map(|d| d.day()).collect();
    if let Some(modal_day) = mode(&days_of_month) {
        let consistency = days_of_month.iter().filter(|d| **d == modal_day).count() as f64 / n;
        if consistency >= 0.60 {
            return (TemporalPatternType::DayOfMonth, Some(modal_day), None, consistency);
        }
    }

    let weekdays: Vec<u32> = dates.iter().map(|d| d.weekday().num_days_from_monday()).collect();
    if let Some(modal_weekday) = mode(&weekdays) {
        let consistency = weekdays.iter().filter(|d| **d == modal_weekday).count() as f64 / n;
        if consistency >= 0.60 {
            return (TemporalPatternType::DayOfWeek, None, Some(modal_weekday), consistency);
        }
    }

    (TemporalPatternType::Flexible, None, None, 0.5)
}
