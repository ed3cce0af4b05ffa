use chrono::Weekday;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Id, IdGenerator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryType {
    Expense,
    Income,
    Transfer,
}

/// A matcher clause over a transaction's description. Regex-vs-substring is
/// chosen the same way the pattern-validation matcher chooses: a pattern
/// containing any of `()[]^$?` is treated as a regex, otherwise as a
/// case-insensitive substring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptionMatch {
    pub pattern: String,
}

impl DescriptionMatch {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }

    /// Mirrors the regex-syntax heuristic used for recurring-pattern merchant
    /// matching: any of `()[]^$?` present means treat the pattern as a regex.
    pub fn looks_like_regex(&self) -> bool {
        self.pattern.chars().any(|c| "()[]^$?".contains(c))
    }

    pub fn matches(&self, description: &str) -> bool {
        if self.looks_like_regex() {
            regex::RegexBuilder::new(&self.pattern)
                .case_insensitive(true)
                .build()
                .map(|re| re.is_match(description))
                .unwrap_or_else(|_| {
                    description
                        .to_ascii_lowercase()
                        .contains(&self.pattern.to_ascii_lowercase())
                })
        } else {
            description
                .to_ascii_lowercase()
                .contains(&self.pattern.to_ascii_lowercase())
        }
    }
}

/// A single rule within a category: the gates that must all pass for a
/// transaction to be suggested for this category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub id: Id,
    pub description: Option<DescriptionMatch>,
    pub amount_min: Option<Decimal>,
    pub amount_max: Option<Decimal>,
    pub weekday: Option<Weekday>,
    pub day_of_month: Option<u32>,
    pub account_id: Option<Id>,
    /// 0-100, the confidence attached to a suggestion produced by this rule.
    pub confidence: u8,
}

impl CategoryRule {
    pub fn new(id: Id, confidence: u8) -> Self {
        Self {
            id,
            description: None,
            amount_min: None,
            amount_max: None,
            weekday: None,
            day_of_month: None,
            account_id: None,
            confidence,
        }
    }

    pub fn with_description(mut self, matcher: DescriptionMatch) -> Self {
        self.description = Some(matcher);
        self
    }

    pub fn with_amount_range(mut self, min: Decimal, max: Decimal) -> Self {
        self.amount_min = Some(min);
        self.amount_max = Some(max);
        self
    }

    pub fn with_weekday(mut self, weekday: Weekday) -> Self {
        self.weekday = Some(weekday);
        self
    }

    pub fn with_day_of_month(mut self, day: u32) -> Self {
        self.day_of_month = Some(day);
        self
    }

    pub fn with_account(mut self, account_id: Id) -> Self {
        self.account_id = Some(account_id);
        self
    }
}

/// A user-defined grouping bucket for transactions, with the matcher rules
/// the categorization consumer evaluates against newly-ingested rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: Id,
    pub user_id: Id,
    pub name: String,
    #[serde(rename = "type")]
    pub category_type: CategoryType,
    pub parent_id: Option<Id>,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub rules: Vec<CategoryRule>,
}

impl Category {
    pub fn new_with_generator(
        generator: &dyn IdGenerator,
        user_id: Id,
        name: impl Into<String>,
        category_type: CategoryType,
    ) -> Self {
        Self {
            id: generator.new_id(),
            user_id,
            name: name.into(),
            category_type,
            parent_id: None,
            color: None,
            icon: None,
            rules: Vec::new(),
        }
    }

    pub fn with_parent(mut self, parent_id: Id) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn add_rule(&mut self, rule: CategoryRule) {
        self.rules.push(rule);
    }
}
