//! Per-transaction feature extraction: 17 temporal + 1
//! amount + 49 description dimensions, optionally extended with 24
//! account-aware dimensions.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;

use crate::models::AccountType;

use super::holidays;
use super::tfidf;

pub const TEMPORAL_DIMS: usize = 17;
pub const AMOUNT_DIMS: usize = 1;
pub const DESCRIPTION_DIMS: usize = tfidf::MAX_FEATURES;
pub const ACCOUNT_AWARE_DIMS: usize = 24;
pub const BASE_DIMS: usize = TEMPORAL_DIMS + AMOUNT_DIMS + DESCRIPTION_DIMS;

fn days_in_month(year: i32, month: u32) -> u32 {
    let next_month_first = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .expect("valid year/month");
    (next_month_first - NaiveDate::from_ymd_opt(year, month, 1).expect("valid year/month")).num_days() as u32
}

/// Which ISO week-of-month (1-5) `date` falls in, counting from day 1.
fn week_of_month(date: NaiveDate) -> u32 {
    (date.day() - 1) / 7 + 1
}

/// The 17-dimensional temporal feature block for a single date.
fn temporal_features(date: NaiveDate, country: &str) -> [f64; TEMPORAL_DIMS] {
    let dim = days_in_month(date.year(), date.month()) as f64;
    let day_of_week = date.weekday().num_days_from_monday() as f64;
    let day_of_month = (date.day() - 1) as f64;
    let month_position = (date.day() - 1) as f64;
    let week_of_month = (week_of_month(date) - 1) as f64;

    let is_working_day = holidays::is_working_day(date, country);
    let is_first_working_day = date == holidays::first_working_day_of_month(date.year(), date.month(), country);
    let is_last_working_day = date == holidays::last_working_day_of_month(date.year(), date.month(), country);
    let is_first_weekday_of_month = date == holidays::weekday_of_month(date.year(), date.month(), date.weekday(), 1);
    let is_last_weekday_of_month = date == holidays::weekday_of_month(date.year(), date.month(), date.weekday(), 0);
    let is_weekend = matches!(date.weekday(), chrono::Weekday::Sat | chrono::Weekday::Sun);
    let is_first_day = date.day() == 1;
    let is_last_day = date.day() == dim as u32;

    let normalized_day_position = if dim > 1.0 { day_of_month / (dim - 1.0) } else { 0.0 };

    [
        (2.0 * std::f64::consts::PI * day_of_week / 7.0).sin(),
        (2.0 * std::f64::consts::PI * day_of_week / 7.0).cos(),
        (2.0 * std::f64::consts::PI * day_of_month / 31.0).sin(),
        (2.0 * std::f64::consts::PI * day_of_month / 31.0).cos(),
        (2.0 * std::f64::consts::PI * month_position / dim).sin(),
        (2.0 * std::f64::consts::PI * month_position / dim).cos(),
        (2.0 * std::f64::consts::PI * week_of_month / 5.0).sin(),
        (2.0 * std::f64::consts::PI * week_of_month / 5.0).cos(),
        is_working_day as u8 as f64,
        is_first_working_day as u8 as f64,
        is_last_working_day as u8 as f64,
        is_first_weekday_of_month as u8 as f64,
        is_last_weekday_of_month as u8 as f64,
        is_weekend as u8 as f64,
        is_first_day as u8 as f64,
        is_last_day as u8 as f64,
        normalized_day_position,
    ]
}

/// Min-max normalized `log1p(|amount|)` across the batch; a single-row batch
/// defaults every value to 0.5 (no spread to normalize against).
fn amount_features(amounts: &[Decimal]) -> Vec<f64> {
    if amounts.len() <= 1 {
        return vec![0.5; amounts.len()];
    }
    let logged: Vec<f64> = amounts.iter().map(|amount| amount.abs().to_string().parse::<f64>().unwrap_or(0.0).ln_1p()).collect();
    let min = logged.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = logged.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if (max - min).abs() < f64::EPSILON {
        return vec![0.5; amounts.len()];
    }
    logged.iter().map(|value| (value - min) / (max - min)).collect()
}

fn account_type_one_hot(account_type: AccountType) -> [f64; 6] {
    let mut one_hot = [0.0; 6];
    let index = match account_type {
        AccountType::Checking => 0,
        AccountType::Savings => 1,
        AccountType::CreditCard => 2,
        AccountType::Investment => 3,
        AccountType::Loan => 4,
        AccountType::Other => 5,
    };
    one_hot[index] = 1.0;
    one_hot
}

/// Builds the row-stacked feature matrix for clustering: one row per input
/// transaction, `BASE_DIMS` wide (67), or `BASE_DIMS + ACCOUNT_AWARE_DIMS`
/// (91) wide when `account_types` is supplied. The account-aware block is a
/// 6-dimensional one-hot account type followed by 18 reserved zero
/// dimensions, reserved for future account-aware signals beyond account
/// type itself.
pub fn build_feature_matrix(
    dates: &[NaiveDate],
    amounts: &[Decimal],
    descriptions: &[String],
    country: &str,
    account_types: Option<&[AccountType]>,
) -> Vec<Vec<f64>> {
    let n = dates.len();
    let amount_column = amount_features(amounts);
    let description_rows = tfidf::vectorize(descriptions);

    (0..n)
        .map(|index| {
            let mut row = Vec::with_capacity(BASE_DIMS + ACCOUNT_AWARE_DIMS);
            row.extend_from_slice(&temporal_features(dates[index], country));
            row.push(amount_column[index]);
            row.extend_from_slice(&description_rows[index]);

            if let Some(account_types) = account_types {
                row.extend_from_slice(&account_type_one_hot(account_types[index]));
                row.extend(std::iter::repeat(0.0).take(ACCOUNT_AWARE_DIMS - 6));
            }
            row
        })
        .collect()
}
