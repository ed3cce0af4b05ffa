use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Proceed,
    Deny,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteStatus {
    Waiting,
    Approved,
    Denied,
}

/// A single voter's recorded decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub decision: Decision,
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// The vote-tracking block embedded inside a workflow record, covering one
/// in-flight quorum decision (a file deletion, upload, or account
/// modification request awaiting voter sign-off).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub workflow_type: String,
    pub required_voters: Vec<String>,
    pub votes_received: BTreeMap<String, Vote>,
    pub status: VoteStatus,
    pub vote_started_at: DateTime<Utc>,
}

impl VoteRecord {
    pub fn new(workflow_type: impl Into<String>, required_voters: Vec<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            workflow_type: workflow_type.into(),
            required_voters,
            votes_received: BTreeMap::new(),
            status: VoteStatus::Waiting,
            vote_started_at: started_at,
        }
    }

    /// Idempotent upsert: a repeated vote from the same voter overwrites the
    /// previous entry. Evaluates the quorum decision rules after the write:
    /// a deny short-circuits the result regardless of how many other voters
    /// have or haven't responded yet.
    pub fn record_vote(&mut self, voter: impl Into<String>, vote: Vote) {
        let deny = vote.decision == Decision::Deny;
        self.votes_received.insert(voter.into(), vote);

        if deny {
            self.status = VoteStatus::Denied;
            return;
        }

        let all_required_present = self
            .required_voters
            .iter()
            .all(|v| self.votes_received.contains_key(v));
        let all_proceed = self
            .votes_received
            .values()
            .all(|v| v.decision == Decision::Proceed);

        if all_required_present && all_proceed {
            self.status = VoteStatus::Approved;
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status != VoteStatus::Waiting
    }
}

/// Status reported via the auxiliary operation-tracking record, kept
/// independent of the event bus so external observers can poll progress
/// without subscribing to events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationTracking {
    pub operation_id: Id,
    pub status: OperationStatus,
    pub message: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl OperationTracking {
    pub fn new(operation_id: Id, updated_at: DateTime<Utc>) -> Self {
        Self {
            operation_id,
            status: OperationStatus::Pending,
            message: None,
            updated_at,
        }
    }

    pub fn update(&mut self, status: OperationStatus, message: Option<String>, updated_at: DateTime<Utc>) {
        self.status = status;
        self.message = message;
        self.updated_at = updated_at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn vote(decision: Decision, reason: Option<&str>) -> Vote {
        Vote {
            decision,
            reason: reason.map(String::from),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn deny_short_circuits_regardless_of_order() {
        let started = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut record = VoteRecord::new(
            "file.deletion",
            vec!["a".into(), "b".into(), "c".into()],
            started,
        );
        record.record_vote("a", vote(Decision::Proceed, None));
        record.record_vote("c", vote(Decision::Deny, Some("policy violation")));
        assert_eq!(record.status, VoteStatus::Denied);
        assert!(record.is_terminal());
        assert!(!record.votes_received.contains_key("b"));
    }

    #[test]
    fn approved_requires_all_required_voters_to_proceed() {
        let started = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut record = VoteRecord::new("file.deletion", vec!["a".into(), "b".into()], started);
        record.record_vote("a", vote(Decision::Proceed, None));
        assert_eq!(record.status, VoteStatus::Waiting);
        record.record_vote("b", vote(Decision::Proceed, None));
        assert_eq!(record.status, VoteStatus::Approved);
    }

    #[test]
    fn repeated_vote_from_same_voter_overwrites_previous() {
        let started = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut record = VoteRecord::new("file.deletion", vec!["a".into()], started);
        record.record_vote("a", vote(Decision::Deny, Some("no")));
        assert_eq!(record.status, VoteStatus::Denied);
        record.record_vote("a", vote(Decision::Proceed, None));
        assert_eq!(record.status, VoteStatus::Approved);
    }
}
