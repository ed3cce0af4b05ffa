use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use rust_decimal::Decimal;

use crate::error::CoreError;

#[derive(Debug, Clone, PartialEq)]
pub struct OfxTransaction {
    pub date: DateTime<Utc>,
    pub amount: Decimal,
    pub description: String,
    pub memo: Option<String>,
    pub transaction_type: Option<String>,
}

/// Extracts the value of a leaf tag within `block`. Works for both OFX
/// dialects: SGML, where leaf tags have no closing tag and the value runs
/// to the next `<` or end of line, and XML, where the closing tag itself
/// starts with `<` and so also terminates the capture.
fn extract_tag(block: &str, tag: &str) -> Option<String> {
    let pattern = format!(r"(?i)<{tag}>\s*([^<\r\n]*)");
    let re = Regex::new(&pattern).expect("static OFX tag pattern is valid");
    re.captures(block).map(|c| c[1].trim().to_string())
}

fn extract_section<'a>(text: &'a str, section: &str) -> Option<&'a str> {
    let pattern = format!(r"(?is)<{section}>(.*?)</{section}>");
    let re = Regex::new(&pattern).expect("static OFX section pattern is valid");
    re.find(text).map(|m| m.as_str())
}

fn parse_ofx_date(raw: &str) -> Result<DateTime<Utc>, CoreError> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).take(8).collect();
    if digits.len() < 8 {
        return Err(CoreError::permanent_decode(format!("unparseable OFX date: {raw:?}")));
    }
    NaiveDate::parse_from_str(&digits, "%Y%m%d")
        .map(|date| date.and_hms_opt(0, 0, 0).expect("midnight is always valid").and_utc())
        .map_err(|err| CoreError::permanent_decode(format!("unparseable OFX date {raw:?}: {err}")))
}

/// Parses `STMTTRN` blocks from either OFX dialect: XML (`<STMTTRN>` with
/// matching children) or SGML (colon-free, tag-per-line, no closing tags on
/// leaves). Maps `DTPOSTED -> date`, `TRNAMT -> amount`, `NAME ->
/// description`, `MEMO -> memo`, `TRNTYPE -> transaction type`.
pub fn parse_ofx_transactions(bytes: &[u8]) -> Result<Vec<OfxTransaction>, CoreError> {
    let text = String::from_utf8_lossy(bytes);
    let block_re = Regex::new(r"(?is)<STMTTRN>(.*?)</STMTTRN>").expect("static OFX block pattern is valid");

    let mut transactions = Vec::new();
    for capture in block_re.captures_iter(&text) {
        let block = &capture[1];

        let dtposted = extract_tag(block, "DTPOSTED")
            .ok_or_else(|| CoreError::permanent_decode("OFX STMTTRN missing DTPOSTED"))?;
        let date = parse_ofx_date(&dtposted)?;

        let trnamt = extract_tag(block, "TRNAMT")
            .ok_or_else(|| CoreError::permanent_decode("OFX STMTTRN missing TRNAMT"))?;
        let amount = Decimal::from_str(&trnamt)
            .map_err(|err| CoreError::permanent_decode(format!("unparseable OFX amount {trnamt:?}: {err}")))?;

        transactions.push(OfxTransaction {
            date,
            amount,
            description: extract_tag(block, "NAME").unwrap_or_default(),
            memo: extract_tag(block, "MEMO"),
            transaction_type: extract_tag(block, "TRNTYPE"),
        });
    }

    Ok(transactions)
}

/// Reads `LEDGERBAL/BALAMT`, falling back to `AVAILBAL/BALAMT`.
pub fn extract_opening_balance(bytes: &[u8]) -> Option<Decimal> {
    let text = String::from_utf8_lossy(bytes);
    extract_balance_from_section(&text, "LEDGERBAL").or_else(|| extract_balance_from_section(&text, "AVAILBAL"))
}

fn extract_balance_from_section(text: &str, section: &str) -> Option<Decimal> {
    let block = extract_section(text, section)?;
    let raw = extract_tag(block, "BALAMT")?;
    Decimal::from_str(&raw).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SGML_SAMPLE: &str = "OFXHEADER:100\nDATA:OFXSGML\n<OFX>\n<BANKMSGSRSV1>\n<STMTTRNRS>\n<STMTRS>\n<LEDGERBAL>\n<BALAMT>1234.56\n<DTASOF>20240131\n</LEDGERBAL>\n<BANKTRANLIST>\n<STMTTRN>\n<TRNTYPE>DEBIT\n<DTPOSTED>20240115\n<TRNAMT>-14.99\n<NAME>NETFLIX.COM\n<MEMO>Monthly subscription\n</STMTTRN>\n</BANKTRANLIST>\n</STMTRS>\n</STMTTRNRS>\n</BANKMSGSRSV1>\n</OFX>\n";

    #[test]
    fn parses_sgml_dialect_transactions() {
        let transactions = parse_ofx_transactions(SGML_SAMPLE.as_bytes()).unwrap();
        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0].description, "NETFLIX.COM");
        assert_eq!(transactions[0].amount, Decimal::new(-1499, 2));
        assert_eq!(transactions[0].transaction_type.as_deref(), Some("DEBIT"));
    }

    #[test]
    fn parses_xml_dialect_transactions() {
        let xml = "<OFX><STMTTRN><TRNTYPE>CREDIT</TRNTYPE><DTPOSTED>20240201</DTPOSTED><TRNAMT>3500.00</TRNAMT><NAME>PAYROLL</NAME></STMTTRN></OFX>";
        let transactions = parse_ofx_transactions(xml.as_bytes()).unwrap();
        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0].amount, Decimal::new(350000, 2));
    }

    #[test]
    fn extracts_ledger_balance() {
        let balance = extract_opening_balance(SGML_SAMPLE.as_bytes()).unwrap();
        assert_eq!(balance, Decimal::new(123456, 2));
    }
}
