use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

use super::field_mapping::ColumnMap;
use crate::error::CoreError;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%d/%m/%Y", "%Y%m%d", "%m-%d-%Y", "%d-%m-%Y"];

#[derive(Debug, Clone, PartialEq)]
pub struct CsvRow {
    pub date: DateTime<Utc>,
    pub description: String,
    pub amount: Decimal,
    pub memo: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateOrder {
    Ascending,
    Descending,
}

/// Splits one CSV line on unquoted commas, skipping leading whitespace on
/// each field — the lenient dialect the ingestion pipeline accepts rather
/// than strict RFC 4180 quoting.
pub fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                if in_quotes && chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = !in_quotes;
                }
            }
            ',' if !in_quotes => {
                fields.push(current.trim_start().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    fields.push(current.trim_start().to_string());
    fields
}

pub fn parse_header(bytes: &[u8]) -> Result<Vec<String>, CoreError> {
    let text = String::from_utf8_lossy(bytes);
    let header_line = text
        .lines()
        .next()
        .ok_or_else(|| CoreError::permanent_decode("CSV file has no header row"))?;
    Ok(split_csv_line(header_line))
}

/// Parses a date trying each of the accepted formats in order; the first
/// format that parses wins, so `%m/%d/%Y` is preferred over `%d/%m/%Y` when
/// both could apply.
pub fn parse_date(raw: &str) -> Result<NaiveDate, CoreError> {
    let trimmed = raw.trim();
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Ok(date);
        }
    }
    Err(CoreError::permanent_decode(format!("unparseable date: {raw:?}")))
}

/// Strips `$` and thousands-separator commas before parsing as `Decimal`.
pub fn clean_amount(raw: &str) -> Result<Decimal, CoreError> {
    let cleaned: String = raw.chars().filter(|c| !matches!(c, '$' | ',')).collect();
    let cleaned = cleaned.trim();
    Decimal::from_str(cleaned).map_err(|err| CoreError::permanent_decode(format!("unparseable amount {raw:?}: {err}")))
}

/// Applies a debit/credit indicator by taking the magnitude and re-applying
/// sign, so the operation is idempotent regardless of the amount column's
/// original sign convention.
pub fn apply_debit_credit_indicator(amount: Decimal, indicator: Option<&str>) -> Decimal {
    match indicator.map(str::to_ascii_uppercase) {
        Some(indicator) if indicator.contains("DBIT") || indicator.contains("DEBIT") => -amount.abs(),
        Some(indicator) if indicator.contains("CRDT") || indicator.contains("CREDIT") => amount.abs(),
        _ => amount,
    }
}

/// Compares the first non-equal pair of consecutive dates to decide
/// ascending vs. descending — not a global monotonicity check, matching the
/// upstream heuristic exactly.
pub fn detect_date_order(dates: &[DateTime<Utc>]) -> DateOrder {
    for window in dates.windows(2) {
        if window[1] != window[0] {
            return if window[1] > window[0] {
                DateOrder::Ascending
            } else {
                DateOrder::Descending
            };
        }
    }
    DateOrder::Ascending
}

/// Parses all data rows (skipping the header) and normalizes to ascending
/// chronological order, reversing the row list if the source file was
/// descending.
pub fn parse_rows(bytes: &[u8], column_map: &ColumnMap) -> Result<Vec<CsvRow>, CoreError> {
    let text = String::from_utf8_lossy(bytes);
    let mut rows = Vec::new();

    for line in text.lines().skip(1) {
        if line.trim().is_empty() {
            continue;
        }
        let fields = split_csv_line(line);
        let raw_date = fields
            .get(column_map.date)
            .map(String::as_str)
            .unwrap_or_default();
        let date = parse_date(raw_date)?
            .and_hms_opt(0, 0, 0)
            .expect("midnight is always a valid time")
            .and_utc();
        let description = fields.get(column_map.description).cloned().unwrap_or_default();
        let raw_amount = fields.get(column_map.amount).map(String::as_str).unwrap_or_default();
        let amount = clean_amount(raw_amount)?;
        let indicator = column_map
            .debit_or_credit
            .and_then(|idx| fields.get(idx))
            .map(String::as_str);
        let amount = apply_debit_credit_indicator(amount, indicator);
        let memo = column_map.memo.and_then(|idx| fields.get(idx)).cloned();
        let category = column_map.category.and_then(|idx| fields.get(idx)).cloned();

        rows.push(CsvRow {
            date,
            description,
            amount,
            memo,
            category,
        });
    }

    let dates: Vec<DateTime<Utc>> = rows.iter().map(|row| row.date).collect();
    if detect_date_order(&dates) == DateOrder::Descending {
        rows.reverse();
    }

    Ok(rows)
}
