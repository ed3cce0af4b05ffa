use serde::{Deserialize, Serialize};

use super::{Id, IdGenerator};

/// Canonical transaction fields a source column can be mapped onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetField {
    Date,
    Description,
    Amount,
    DebitOrCredit,
    Category,
    Memo,
}

/// A single source-column-to-target-field binding, with an optional
/// transformation. Transformations are intentionally not an embedded
/// expression language (the upstream system used `eval()` over an arbitrary
/// expression string, which has no safe Rust equivalent); instead a closed
/// set of named transforms covers the cases field mapping actually needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transform {
    /// No transformation; use the raw source value.
    Identity,
    /// Negate a numeric value (used when a source's sign convention is
    /// inverted relative to the target field).
    Negate,
    /// Take the absolute value.
    Absolute,
    /// Trim surrounding whitespace.
    Trim,
    /// Uppercase the value (useful for matching debit/credit indicators).
    Uppercase,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub source_field: String,
    pub target_field: TargetField,
    pub transform: Option<Transform>,
}

impl FieldMapping {
    pub fn new(source_field: impl Into<String>, target_field: TargetField) -> Self {
        Self {
            source_field: source_field.into(),
            target_field,
            transform: None,
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = Some(transform);
        self
    }
}

/// A named, reusable set of column mappings for a particular statement
/// layout, optionally scoped to one account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMap {
    pub id: Id,
    pub user_id: Id,
    pub account_id: Option<Id>,
    pub name: String,
    pub mappings: Vec<FieldMapping>,
}

impl FieldMap {
    pub fn new_with_generator(
        generator: &dyn IdGenerator,
        user_id: Id,
        name: impl Into<String>,
        mappings: Vec<FieldMapping>,
    ) -> Self {
        Self {
            id: generator.new_id(),
            user_id,
            account_id: None,
            name: name.into(),
            mappings,
        }
    }

    pub fn with_account_id(mut self, account_id: Id) -> Self {
        self.account_id = Some(account_id);
        self
    }

    pub fn source_for(&self, target: TargetField) -> Option<&FieldMapping> {
        self.mappings.iter().find(|m| m.target_field == target)
    }

    /// Whether the three fields ingestion cannot proceed without are all
    /// bound: date, description, amount.
    pub fn has_required_fields(&self) -> bool {
        self.source_for(TargetField::Date).is_some()
            && self.source_for(TargetField::Description).is_some()
            && self.source_for(TargetField::Amount).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FixedIdGenerator;

    #[test]
    fn has_required_fields_checks_date_description_amount() {
        let gen = FixedIdGenerator::new([Id::from_string("map-1")]);
        let map = FieldMap::new_with_generator(
            &gen,
            Id::from_string("user-1"),
            "Chase CSV",
            vec![
                FieldMapping::new("Posted Date", TargetField::Date),
                FieldMapping::new("Description", TargetField::Description),
            ],
        );
        assert!(!map.has_required_fields());
    }

    #[test]
    fn source_for_finds_matching_target() {
        let gen = FixedIdGenerator::new([Id::from_string("map-1")]);
        let map = FieldMap::new_with_generator(
            &gen,
            Id::from_string("user-1"),
            "Chase CSV",
            vec![FieldMapping::new("Amount", TargetField::Amount)
                .with_transform(Transform::Trim)],
        );
        let mapping = map.source_for(TargetField::Amount).unwrap();
        assert_eq!(mapping.source_field, "Amount");
        assert_eq!(mapping.transform, Some(Transform::Trim));
    }
}
