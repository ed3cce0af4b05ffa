mod account;
mod category;
mod field_map;
mod id;
mod id_generator;
mod money;
mod recurring_pattern;
mod recurring_prediction;
mod transaction;
mod transaction_file;
mod workflow;

pub use account::{Account, AccountType};
pub use category::{Category, CategoryRule, CategoryType, DescriptionMatch};
pub use field_map::{FieldMap, FieldMapping, TargetField, Transform};
pub use id::{Id, IdError};
pub use id_generator::{FixedIdGenerator, IdGenerator, UuidIdGenerator};
pub use money::{Currency, Money};
pub use recurring_pattern::{
    AmountStatistics, PatternStatus, RecurrenceFrequency, RecurringChargePattern, TemporalPatternType,
};
pub use recurring_prediction::RecurringChargePrediction;
pub use transaction::{CategoryAssignment, CategoryAssignmentStatus, Transaction, TransactionStatus, transaction_hash};
pub use transaction_file::{FileFormat, ProcessingStatus, TransactionFile};
pub use workflow::{Decision, OperationStatus, OperationTracking, Vote, VoteRecord, VoteStatus};
