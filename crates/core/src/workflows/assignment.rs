//! Batch pharmacy assignment.
//!
//! Assigns several delivery lines to one pharmacy (and optionally a rider). Each line is updated
//! on its own; the enrollees of every committed line then receive one combined SMS and one
//! combined email.

use crate::draft::PharmacySelection;
use crate::entry::{DeliveryEntry, Rider};
use crate::gateway::DeliveryGateway;
use crate::notice::Notice;
use crate::notifications::{batch_jobs, DispatchReport, NotificationDispatcher};
use crate::payload::DeliveryPayload;
use crate::refresh::RefreshSignal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentRequest {
    pub entries: Vec<DeliveryEntry>,
    pub pharmacy: PharmacySelection,
    #[serde(default)]
    pub rider: Option<Rider>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentFailure {
    pub entry_id: Option<String>,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentReport {
    pub assigned: Vec<DeliveryEntry>,
    pub failed: Vec<AssignmentFailure>,
    /// `None` when nothing was assigned.
    pub notifications: Option<DispatchReport>,
    pub notice: Notice,
}

pub struct PharmacyAssignmentWorkflow {
    gateway: Arc<dyn DeliveryGateway>,
    dispatcher: NotificationDispatcher,
    refresh: RefreshSignal,
}

impl PharmacyAssignmentWorkflow {
    pub fn new(
        gateway: Arc<dyn DeliveryGateway>,
        dispatcher: NotificationDispatcher,
        refresh: RefreshSignal,
    ) -> Self {
        Self {
            gateway,
            dispatcher,
            refresh,
        }
    }

    /// Assign every entry in `request` to its pharmacy.
    ///
    /// Updates run one after another. A failed line is recorded and the batch carries on.
    pub async fn assign(&self, request: AssignmentRequest) -> AssignmentReport {
        let AssignmentRequest {
            entries,
            pharmacy,
            rider,
        } = request;

        let mut assigned = Vec::new();
        let mut failed = Vec::new();

        for entry in &entries {
            let updated = entry.with_assignment(&pharmacy, rider.as_ref());
            let response = match DeliveryPayload::from_entry(&updated) {
                Ok(payload) => self.gateway.update(&payload).await,
                Err(e) => Err(e),
            };

            let failure = match response {
                Ok(result) if result.is_accepted() => None,
                Ok(result) => Some(result.failure_message()),
                Err(e) => Some(e.to_string()),
            };

            match failure {
                None => assigned.push(updated),
                Some(message) => {
                    tracing::warn!(entry_id = ?entry.entry_id, %message, "assignment failed");
                    failed.push(AssignmentFailure {
                        entry_id: entry.entry_id.clone(),
                        message,
                    });
                }
            }
        }

        tracing::info!(
            pharmacy_id = %pharmacy.id,
            assigned = assigned.len(),
            failed = failed.len(),
            "pharmacy assignment finished"
        );

        if assigned.is_empty() {
            let notice = if entries.is_empty() {
                Notice::info("No deliveries were selected.")
            } else {
                Notice::error(format!(
                    "No deliveries could be assigned to {}: {}",
                    pharmacy.name,
                    join_messages(&failed)
                ))
            };
            return AssignmentReport {
                assigned,
                failed,
                notifications: None,
                notice,
            };
        }

        self.refresh.notify();
        let notifications = self.dispatcher.dispatch(batch_jobs(&assigned, &pharmacy)).await;

        let mut problems: Vec<String> = Vec::new();
        if !failed.is_empty() {
            problems.push(format!("{} could not be assigned ({})", failed.len(), join_messages(&failed)));
        }
        problems.extend(
            notifications
                .warnings()
                .iter()
                .map(|w| format!("{} notification could not be sent", w.channel)),
        );

        let headline = format!("{} delivery(ies) assigned to {}.", assigned.len(), pharmacy.name);
        let notice = if problems.is_empty() {
            Notice::success(headline)
        } else {
            Notice::warning(format!("{headline} {}.", problems.join("; ")))
        };

        AssignmentReport {
            assigned,
            failed,
            notifications: Some(notifications),
            notice,
        }
    }
}

fn join_messages(failed: &[AssignmentFailure]) -> String {
    failed
        .iter()
        .map(|f| f.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}
