//! Categorization rule engine: evaluates a transaction against each
//! category's rules and produces suggested category assignments.

use chrono::Datelike;

use crate::models::{Category, CategoryAssignment, CategoryAssignmentStatus, CategoryRule, Transaction};

pub struct RuleEngine<'a> {
    categories: &'a [Category],
}

impl<'a> RuleEngine<'a> {
    pub fn new(categories: &'a [Category]) -> Self {
        Self { categories }
    }

    /// Evaluates every rule of every category against `transaction`,
    /// returning one suggestion per matching rule, in category then rule
    /// order. A transaction can collect more than one suggestion; picking a
    /// primary is left to [`primary_candidate`].
    pub fn suggest(&self, transaction: &Transaction) -> Vec<CategoryAssignment> {
        let mut suggestions = Vec::new();
        for category in self.categories {
            for rule in &category.rules {
                if rule_matches(rule, transaction) {
                    suggestions.push(CategoryAssignment {
                        category_id: category.id.clone(),
                        confidence: rule.confidence,
                        rule_id: Some(rule.id.clone()),
                        manual: false,
                        status: CategoryAssignmentStatus::Suggested,
                    });
                }
            }
        }
        suggestions
    }
}

/// All gates present on a rule must pass; a gate left unset never excludes a
/// transaction.
fn rule_matches(rule: &CategoryRule, transaction: &Transaction) -> bool {
    if let Some(matcher) = &rule.description {
        if !matcher.matches(&transaction.description) {
            return false;
        }
    }
    if let Some(min) = rule.amount_min {
        if transaction.amount < min {
            return false;
        }
    }
    if let Some(max) = rule.amount_max {
        if transaction.amount > max {
            return false;
        }
    }
    if let Some(weekday) = rule.weekday {
        if transaction.date.weekday() != weekday {
            return false;
        }
    }
    if let Some(day) = rule.day_of_month {
        if transaction.date.day() != day {
            return false;
        }
    }
    if let Some(account_id) = &rule.account_id {
        if account_id != &transaction.account_id {
            return false;
        }
    }
    true
}

/// The highest-confidence suggestion, used to populate a transaction's
/// `primary_category`. Ties keep the first (highest-priority category order).
pub fn primary_candidate(suggestions: &[CategoryAssignment]) -> Option<&CategoryAssignment> {
    suggestions.iter().max_by_key(|assignment| assignment.confidence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Currency, DescriptionMatch, FixedIdGenerator, Id};
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    fn transaction(description: &str, amount: Decimal, date: chrono::DateTime<Utc>) -> Transaction {
        let generator = FixedIdGenerator::new([Id::from_string("tx-1")]);
        Transaction::new_with_generator(
            &generator,
            Id::from_string("acct-1"),
            Id::from_string("user-1"),
            date,
            description,
            amount,
            Currency::USD,
            1,
        )
    }

    fn category_with_rule(rule: CategoryRule) -> Category {
        let generator = FixedIdGenerator::new([Id::from_string("cat-1")]);
        let mut category = Category::new_with_generator(
            &generator,
            Id::from_string("user-1"),
            "Streaming",
            crate::models::CategoryType::Expense,
        );
        category.add_rule(rule);
        category
    }

    #[test]
    fn matches_on_description_and_assigns_rule_confidence() {
        let rule = CategoryRule::new(Id::from_string("rule-1"), 90).with_description(DescriptionMatch::new("netflix"));
        let categories = vec![category_with_rule(rule)];
        let engine = RuleEngine::new(&categories);

        let tx = transaction("NETFLIX*MONTHLY", Decimal::new(-1499, 2), Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap());
        let suggestions = engine.suggest(&tx);
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].confidence, 90);
    }

    #[test]
    fn amount_range_gate_excludes_out_of_range_transactions() {
        let rule = CategoryRule::new(Id::from_string("rule-1"), 80).with_amount_range(Decimal::new(-2000, 2), Decimal::new(-1000, 2));
        let categories = vec![category_with_rule(rule)];
        let engine = RuleEngine::new(&categories);

        let in_range = transaction("ANY", Decimal::new(-1500, 2), Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap());
        let out_of_range = transaction("ANY", Decimal::new(-500, 2), Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap());

        assert_eq!(engine.suggest(&in_range).len(), 1);
        assert_eq!(engine.suggest(&out_of_range).len(), 0);
    }

    #[test]
    fn primary_candidate_picks_highest_confidence() {
        let low = CategoryAssignment {
            category_id: Id::from_string("cat-low"),
            confidence: 40,
            rule_id: None,
            manual: false,
            status: CategoryAssignmentStatus::Suggested,
        };
        let high = CategoryAssignment {
            category_id: Id::from_string("cat-high"),
            confidence: 90,
            rule_id: None,
            manual: false,
            status: CategoryAssignmentStatus::Suggested,
        };
        let best = primary_candidate(&[low, high.clone()]).unwrap();
        assert_eq!(best.category_id, high.category_id);
    }
}
