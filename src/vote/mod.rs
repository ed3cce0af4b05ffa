//! Vote-quorum coordinator: resolves a voter set from request context,
//! tracks votes on a workflow aggregate, and emits a terminal `*.approved` /
//! `*.denied` decision once the quorum rules are satisfied.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::bus::EventBus;
use crate::clock::Clock;
use crate::consumer::Consumer;
use crate::envelope::EventEnvelope;
use crate::error::CoreError;
use crate::models::{Decision, Id, OperationStatus, OperationTracking, Vote, VoteRecord};
use crate::store::{get_typed, put_typed, Store};

const WORKFLOWS_TABLE: &str = "workflows";
const OPERATIONS_TABLE: &str = "operations";

/// The three workflow types this coordinator understands. An event whose
/// type does not reduce to one of these is left for some other consumer.
const WORKFLOW_TYPES: [&str; 3] = ["file.deletion", "file.upload", "account.modification"];

fn workflow_type_of(event_type: &str, suffix: &str) -> Option<String> {
    let prefix = event_type.strip_suffix(suffix)?;
    WORKFLOW_TYPES.contains(&prefix).then(|| prefix.to_string())
}

/// Voter-set resolution, keyed by workflow type and the request's own
/// context fields — static tables, not data the coordinator ever mutates.
fn resolve_voters(workflow_type: &str, context: &Value) -> Vec<String> {
    match workflow_type {
        "file.deletion" => {
            if context.get("accountType").and_then(Value::as_str) == Some("business") {
                vec!["analytics_manager".into(), "category_manager".into(), "compliance_manager".into()]
            } else {
                let mut voters = vec!["analytics_manager".to_string(), "category_manager".to_string()];
                if context.get("transactionCount").and_then(Value::as_u64).unwrap_or(0) > 1000 {
                    voters.push("backup_manager".into());
                }
                voters
            }
        }
        "file.upload" => {
            let sensitive = context.get("sensitive").and_then(Value::as_bool).unwrap_or(false)
                || context.get("dataClassification").and_then(Value::as_str) == Some("sensitive");
            if sensitive {
                vec![
                    "security_scanner".into(),
                    "format_validator".into(),
                    "compliance_manager".into(),
                    "encryption_manager".into(),
                ]
            } else {
                let mut voters = vec!["security_scanner".to_string(), "format_validator".to_string()];
                const HUNDRED_MB: u64 = 100 * 1024 * 1024;
                if context.get("fileSize").and_then(Value::as_u64).unwrap_or(0) > HUNDRED_MB {
                    voters.push("storage_manager".into());
                }
                voters
            }
        }
        "account.modification" => {
            let mut voters = vec!["data_integrity_checker".to_string(), "analytics_impact_assessor".to_string()];
            if context.get("accountType").and_then(Value::as_str) == Some("business") {
                voters.push("compliance_manager".into());
            }
            let over_a_million = context
                .get("accountValue")
                .and_then(Value::as_f64)
                .map(|value| value > 1_000_000.0)
                .unwrap_or(false);
            if over_a_million {
                voters.push("risk_manager".into());
                voters.push("audit_manager".into());
            }
            voters
        }
        other => {
            tracing::warn!(workflow_type = other, "no voter-set config for workflow type");
            Vec::new()
        }
    }
}

/// The workflow aggregate a vote-tracking block is embedded inside. Keyed
/// by `requestId`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Workflow {
    operation_id: Id,
    entity_id: String,
    context: Value,
    vote_tracking: Option<VoteRecord>,
}

/// Listens for `<workflow_type>.requested` and `<workflow_type>.vote` across
/// the three known workflow types, and owns the corresponding `.approved` /
/// `.denied` decision events.
pub struct VoteCoordinator {
    store: Arc<dyn Store>,
    bus: Arc<dyn EventBus>,
    clock: Arc<dyn Clock>,
    /// When false, terminal decisions are logged rather than published —
    /// some deployments run vote coordination without an active bus
    /// subscriber, and tests exercise both modes.
    publish_events: bool,
}

impl VoteCoordinator {
    pub fn new(store: Arc<dyn Store>, bus: Arc<dyn EventBus>, clock: Arc<dyn Clock>, publish_events: bool) -> Self {
        Self {
            store,
            bus,
            clock,
            publish_events,
        }
    }

    async fn handle_requested(&self, envelope: &EventEnvelope, workflow_type: &str) -> Result<(), CoreError> {
        let data = &envelope.data;
        let request_id = required_str(data, "requestId")?.to_string();
        let entity_id = entity_id_of(data).unwrap_or_else(|| request_id.clone());

        let required_voters = resolve_voters(workflow_type, data);
        let vote_tracking = VoteRecord::new(workflow_type, required_voters, self.clock.now());

        let workflow = Workflow {
            operation_id: Id::from_string(request_id),
            entity_id,
            context: data.clone(),
            vote_tracking: Some(vote_tracking),
        };
        put_typed(self.store.as_ref(), WORKFLOWS_TABLE, &workflow.operation_id, &workflow, vec![]).await?;

        if workflow_type == "file.deletion" {
            let tracking = OperationTracking::new(workflow.operation_id.clone(), self.clock.now());
            put_typed(self.store.as_ref(), OPERATIONS_TABLE, &tracking.operation_id, &tracking, vec![]).await?;
        }

        tracing::info!(workflow_type, operation_id = %workflow.operation_id, "vote request opened");
        Ok(())
    }

    async fn handle_vote(&self, envelope: &EventEnvelope, workflow_type: &str) -> Result<(), CoreError> {
        let data = &envelope.data;
        let request_id = required_str(data, "requestId")?.to_string();
        let voter = required_str(data, "voter")?.to_string();
        let decision: Decision = serde_json::from_value(data.get("decision").cloned().unwrap_or(Value::Null))
            .map_err(|_| CoreError::permanent_decode("vote event carried an invalid decision"))?;
        let reason = data.get("reason").and_then(Value::as_str).map(str::to_string);

        if decision == Decision::Deny && reason.as_deref().unwrap_or("").trim().is_empty() {
            return Err(CoreError::permanent_input("deny vote must include a non-empty reason"));
        }

        let request_key = Id::from_string(request_id.clone());
        let mut workflow = get_typed::<Workflow>(self.store.as_ref(), WORKFLOWS_TABLE, &request_key)
            .await?
            .unwrap_or_else(|| {
                // First vote arriving before (or without) a matching `.requested`
                // event: reconstruct a skeleton from this vote's own context.
                let required_voters = resolve_voters(workflow_type, data);
                Workflow {
                    operation_id: request_key.clone(),
                    entity_id: entity_id_of(data).unwrap_or_else(|| request_id.clone()),
                    context: json!({}),
                    vote_tracking: Some(VoteRecord::new(workflow_type, required_voters, self.clock.now())),
                }
            });

        let mut vote_tracking = workflow
            .vote_tracking
            .take()
            .unwrap_or_else(|| VoteRecord::new(workflow_type, resolve_voters(workflow_type, &workflow.context), self.clock.now()));

        let was_terminal = vote_tracking.is_terminal();
        let previous_status = vote_tracking.status;

        vote_tracking.record_vote(
            voter.clone(),
            Vote {
                decision,
                reason: reason.clone(),
                timestamp: self.clock.now(),
            },
        );

        let newly_terminal = vote_tracking.is_terminal() && (!was_terminal || vote_tracking.status != previous_status);

        if newly_terminal {
            let decision_event = terminal_event(envelope, workflow_type, &workflow.entity_id, &request_id, &workflow.context, &vote_tracking);
            if self.publish_events {
                self.bus.publish(decision_event).await?;
            } else {
                tracing::info!(workflow_type, request_id, status = ?vote_tracking.status, "vote decision reached, publishing disabled");
            }

            if workflow_type == "file.deletion" {
                let (status, message) = match vote_tracking.status {
                    crate::models::VoteStatus::Approved => (OperationStatus::Completed, None),
                    crate::models::VoteStatus::Denied => (OperationStatus::Failed, deny_reason(&vote_tracking)),
                    crate::models::VoteStatus::Waiting => unreachable!("newly_terminal implies a terminal status"),
                };
                if let Some(mut tracking) =
                    get_typed::<OperationTracking>(self.store.as_ref(), OPERATIONS_TABLE, &request_key).await?
                {
                    tracking.update(status, message, self.clock.now());
                    put_typed(self.store.as_ref(), OPERATIONS_TABLE, &tracking.operation_id, &tracking, vec![]).await?;
                }
            }

            workflow.vote_tracking = None;
        } else {
            workflow.vote_tracking = Some(vote_tracking);
        }

        put_typed(self.store.as_ref(), WORKFLOWS_TABLE, &workflow.operation_id, &workflow, vec![]).await?;
        Ok(())
    }
}

fn entity_id_of(data: &Value) -> Option<String> {
    ["entityId", "fileId", "accountId"]
        .iter()
        .find_map(|field| data.get(field).and_then(Value::as_str))
        .map(str::to_string)
}

fn deny_reason(vote_tracking: &VoteRecord) -> Option<String> {
    vote_tracking
        .votes_received
        .values()
        .find(|vote| vote.decision == Decision::Deny)
        .and_then(|vote| vote.reason.clone())
}

fn terminal_event(
    envelope: &EventEnvelope,
    workflow_type: &str,
    entity_id: &str,
    request_id: &str,
    context: &Value,
    vote_tracking: &VoteRecord,
) -> EventEnvelope {
    let all_votes: Value = serde_json::to_value(&vote_tracking.votes_received).unwrap_or(Value::Null);
    let event_type = match vote_tracking.status {
        crate::models::VoteStatus::Approved => format!("{workflow_type}.approved"),
        crate::models::VoteStatus::Denied => format!("{workflow_type}.denied"),
        crate::models::VoteStatus::Waiting => unreachable!("terminal_event only called on a terminal status"),
    };

    let mut data = json!({
        "entityId": entity_id,
        "requestId": request_id,
        "workflowType": workflow_type,
        "allVotes": all_votes,
        "context": context,
    });

    if let Value::Object(map) = &mut data {
        match vote_tracking.status {
            crate::models::VoteStatus::Approved => {
                let approved_by: Vec<&str> = vote_tracking.votes_received.keys().map(String::as_str).collect();
                map.insert("approvedBy".into(), json!(approved_by));
            }
            crate::models::VoteStatus::Denied => {
                let denied_by = vote_tracking
                    .votes_received
                    .iter()
                    .find(|(_, vote)| vote.decision == Decision::Deny)
                    .map(|(voter, _)| voter.clone());
                map.insert("deniedBy".into(), json!(denied_by));
                map.insert("reason".into(), json!(deny_reason(vote_tracking)));
            }
            crate::models::VoteStatus::Waiting => {}
        }
    }

    EventEnvelope::new(event_type, "vote-coordinator", envelope.user_id.clone(), data)
        .with_causation_id(envelope.event_id.clone())
}

fn required_str<'a>(data: &'a Value, field: &str) -> Result<&'a str, CoreError> {
    data.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| CoreError::permanent_decode(format!("vote event missing required field {field:?}")))
}

#[async_trait]
impl Consumer for VoteCoordinator {
    fn name(&self) -> &str {
        "vote-quorum-coordinator"
    }

    fn should_process(&self, envelope: &EventEnvelope) -> bool {
        workflow_type_of(&envelope.event_type, ".requested").is_some() || workflow_type_of(&envelope.event_type, ".vote").is_some()
    }

    async fn process(&self, envelope: &EventEnvelope) -> Result<(), CoreError> {
        if let Some(workflow_type) = workflow_type_of(&envelope.event_type, ".requested") {
            return self.handle_requested(envelope, &workflow_type).await;
        }
        if let Some(workflow_type) = workflow_type_of(&envelope.event_type, ".vote") {
            return self.handle_vote(envelope, &workflow_type).await;
        }
        Ok(())
    }
}
