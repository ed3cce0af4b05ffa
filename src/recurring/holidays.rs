//! Small per-country fixed-date holiday table backing working-day
//! calculations. Only as much calendar math as `is_working_day`/first-or-
//! last-working-day detection needs — not a general-purpose calendar
//! dependency.

use chrono::{Datelike, NaiveDate, Weekday};

/// `nth` occurrence (1-based) of `weekday` in `year`/`month`. `nth = 0` means
/// the *last* occurrence.
fn nth_weekday_of_month(year: i32, month: u32, weekday: Weekday, nth: u32) -> NaiveDate {
    let first_of_month = NaiveDate::from_ymd_opt(year, month, 1).expect("valid year/month");
    let first_weekday_offset = (7 + weekday.num_days_from_monday() as i64 - first_of_month.weekday().num_days_from_monday() as i64) % 7;
    let first_occurrence = first_of_month + chrono::Duration::days(first_weekday_offset);

    if nth > 0 {
        return first_occurrence + chrono::Duration::days(7 * (nth as i64 - 1));
    }

    // Last occurrence: step forward by 7 days while still in the same month.
    let mut candidate = first_occurrence;
    loop {
        let next = candidate + chrono::Duration::days(7);
        if next.month() != month {
            return candidate;
        }
        candidate = next;
    }
}

/// US federal holidays observed in `year`, as a fixed list (not exhaustive of
/// every observed-on-Monday shift rule, but enough to drive deterministic
/// working-day tests).
fn us_holidays(year: i32) -> Vec<NaiveDate> {
    vec![
        NaiveDate::from_ymd_opt(year, 1, 1).unwrap(),
        nth_weekday_of_month(year, 5, Weekday::Mon, 0),
        NaiveDate::from_ymd_opt(year, 6, 19).unwrap(),
        NaiveDate::from_ymd_opt(year, 7, 4).unwrap(),
        nth_weekday_of_month(year, 9, Weekday::Mon, 1),
        nth_weekday_of_month(year, 11, Weekday::Thu, 4),
        NaiveDate::from_ymd_opt(year, 11, 11).unwrap(),
        NaiveDate::from_ymd_opt(year, 12, 25).unwrap(),
    ]
}

/// Whether `date` is a recognized holiday for `country`. An unrecognized
/// country code degrades to "no holidays" (weekdays-only working-day
/// calculation) rather than erroring.
pub fn is_holiday(date: NaiveDate, country: &str) -> bool {
    match country {
        "US" => us_holidays(date.year()).contains(&date),
        _ => false,
    }
}

pub fn is_working_day(date: NaiveDate, country: &str) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !is_holiday(date, country)
}

/// The first working day of `date`'s month.
pub fn first_working_day_of_month(year: i32, month: u32, country: &str) -> NaiveDate {
    let mut day = NaiveDate::from_ymd_opt(year, month, 1).expect("valid year/month");
    while !is_working_day(day, country) {
        day += chrono::Duration::days(1);
    }
    day
}

/// The last working day of `date`'s month.
pub fn last_working_day_of_month(year: i32, month: u32, country: &str) -> NaiveDate {
    let next_month_first = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .expect("valid year/month");
    let mut day = next_month_first - chrono::Duration::days(1);
    while !is_working_day(day, country) {
        day -= chrono::Duration::days(1);
    }
    day
}

/// First or last occurrence (`nth = 0` for last) of `weekday` within `date`'s
/// month.
pub fn weekday_of_month(year: i32, month: u32, weekday: Weekday, nth: u32) -> NaiveDate {
    nth_weekday_of_month(year, month, weekday, nth)
}
