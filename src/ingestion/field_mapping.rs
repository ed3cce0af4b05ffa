use crate::models::{FieldMap, TargetField};

/// Resolved column positions for the fields ingestion cares about, whether
/// sourced from a persisted [`FieldMap`] or inferred heuristically from
/// header keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMap {
    pub date: usize,
    pub description: usize,
    pub amount: usize,
    pub debit_or_credit: Option<usize>,
    pub category: Option<usize>,
    pub memo: Option<usize>,
}

/// Finds the first header whose lowercased text contains any of `keywords`.
pub fn find_column_index(headers: &[String], keywords: &[&str]) -> Option<usize> {
    headers.iter().position(|header| {
        let lower = header.to_ascii_lowercase();
        keywords.iter().any(|keyword| lower.contains(keyword))
    })
}

/// Heuristic mapping by header-name keyword, applied when no account-bound
/// field map is available. Returns `None` if any of the three required
/// fields (date, description, amount) cannot be located.
pub fn infer_column_map(headers: &[String]) -> Option<ColumnMap> {
    let date = find_column_index(headers, &["date", "transaction date", "posted date"])?;
    let description = find_column_index(headers, &["description", "payee", "merchant", "transaction"])?;
    let amount = find_column_index(headers, &["amount", "transaction amount", "billing amount"])?;
    Some(ColumnMap {
        date,
        description,
        amount,
        debit_or_credit: find_column_index(headers, &["type", "transaction type"]),
        category: find_column_index(headers, &["category", "transaction category"]),
        memo: find_column_index(headers, &["memo", "notes", "reference"]),
    })
}

/// Resolves column positions from a persisted, account-bound [`FieldMap`] by
/// matching each mapping's `source_field` to a header (case-insensitively).
pub fn column_map_from_field_map(field_map: &FieldMap, headers: &[String]) -> Option<ColumnMap> {
    let find = |target: TargetField| -> Option<usize> {
        let mapping = field_map.source_for(target)?;
        headers.iter().position(|header| header.eq_ignore_ascii_case(&mapping.source_field))
    };
    Some(ColumnMap {
        date: find(TargetField::Date)?,
        description: find(TargetField::Description)?,
        amount: find(TargetField::Amount)?,
        debit_or_credit: find(TargetField::DebitOrCredit),
        category: find(TargetField::Category),
        memo: find(TargetField::Memo),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_required_columns_from_common_header_names() {
        let headers = vec!["Posted Date".to_string(), "Description".to_string(), "Amount".to_string()];
        let map = infer_column_map(&headers).unwrap();
        assert_eq!(map.date, 0);
        assert_eq!(map.description, 1);
        assert_eq!(map.amount, 2);
    }

    #[test]
    fn missing_required_column_yields_none() {
        let headers = vec!["Posted Date".to_string(), "Memo".to_string()];
        assert!(infer_column_map(&headers).is_none());
    }
}
