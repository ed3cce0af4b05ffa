//! Opening-balance extraction (step 5) and running-balance reconstruction
//! (step 6) of the file-ingestion pipeline.

use regex::Regex;
use rust_decimal::Decimal;

use crate::models::FileFormat;

use super::csv_parser::clean_amount;
use super::field_mapping::find_column_index;
use super::ofx_parser;

/// Scans the first ten lines for `Opening Balance`, `Beginning Balance`,
/// `Balance Forward`, or `Previous Balance` followed by a decimal.
pub fn extract_csv_opening_balance(bytes: &[u8]) -> Option<Decimal> {
    let text = String::from_utf8_lossy(bytes);
    let pattern = Regex::new(
        r"(?i)(opening balance|beginning balance|balance forward|previous balance)\D*(-?\$?[\d,]+\.\d{2})",
    )
    .expect("static opening-balance pattern is valid");

    text.lines().take(10).find_map(|line| pattern.captures(line)).and_then(|caps| clean_amount(&caps[2]).ok())
}

/// Best-effort fallback when no header line matches: reads the first data
/// row's `Balance` column and backs out the opening balance by removing that
/// row's own signed amount.
pub fn infer_opening_balance_from_balance_column(
    headers: &[String],
    first_row_fields: &[String],
    first_row_signed_amount: Decimal,
) -> Option<Decimal> {
    let index = find_column_index(headers, &["balance", "running balance"])?;
    let raw = first_row_fields.get(index)?;
    let balance_after_first_row = clean_amount(raw).ok()?;
    Some(balance_after_first_row - first_row_signed_amount)
}

/// Dispatches opening-balance extraction by format: CSV uses the header-scan
/// heuristic (falling back to the balance-column heuristic is the caller's
/// responsibility, since it needs the parsed header and first row), OFX/QFX
/// read `LEDGERBAL`/`AVAILBAL`, anything else has no opening balance to
/// extract from file content.
pub fn extract_opening_balance(format: FileFormat, bytes: &[u8]) -> Option<Decimal> {
    match format {
        FileFormat::Csv => extract_csv_opening_balance(bytes),
        FileFormat::Ofx | FileFormat::Qfx => ofx_parser::extract_opening_balance(bytes),
        _ => None,
    }
}

/// Running balance for the k-th row: opening balance plus the cumulative sum
/// of sign-normalized amounts through row k.
pub fn reconstruct_running_balances(opening_balance: Decimal, signed_amounts: &[Decimal]) -> Vec<Decimal> {
    let mut running = opening_balance;
    signed_amounts
        .iter()
        .map(|amount| {
            running += *amount;
            running
        })
        .collect()
}
