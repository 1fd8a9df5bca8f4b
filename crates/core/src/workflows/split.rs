//! Quantity split workflow.
//!
//! Reduces a delivery line to a smaller quantity and creates an unassigned compensating line for
//! the difference, so the removed units go back into the fulfilment pool.

use crate::entry::DeliveryEntry;
use crate::gateway::{DeliveryGateway, SubmissionResult};
use crate::notice::Notice;
use crate::payload::DeliveryPayload;
use crate::refresh::RefreshSignal;
use crate::DispatchResult;
use dispatch_types::Quantity;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuantitySplitRequest {
    pub original_entry_id: String,
    pub current_quantity: u32,
    pub requested_quantity: u32,
}

/// A delivery line as currently shown to the operator.
///
/// `displayed_quantity` is updated optimistically while the split runs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DisplayedLine {
    pub entry: DeliveryEntry,
    pub displayed_quantity: u32,
}

impl DisplayedLine {
    pub fn new(entry: DeliveryEntry) -> Self {
        let displayed_quantity = entry.quantity().get();
        Self {
            entry,
            displayed_quantity,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum SplitOutcome {
    /// The request was not a valid reduction; nothing was sent.
    NoOp { reason: String },
    Completed {
        reduced_to: u32,
        compensating_quantity: u32,
        compensating_entry_id: Option<String>,
        notice: Notice,
    },
    /// Reducing the original failed; the displayed quantity was restored.
    RolledBack { restored_quantity: u32, notice: Notice },
    /// The original was reduced but the compensating line was not created.
    CompensationFailed {
        reduced_to: u32,
        orphaned_quantity: u32,
        notice: Notice,
    },
}

impl SplitOutcome {
    pub fn notice(&self) -> Option<&Notice> {
        match self {
            Self::NoOp { .. } => None,
            Self::Completed { notice, .. }
            | Self::RolledBack { notice, .. }
            | Self::CompensationFailed { notice, .. } => Some(notice),
        }
    }
}

pub struct QuantitySplitWorkflow {
    gateway: Arc<dyn DeliveryGateway>,
    refresh: RefreshSignal,
}

impl QuantitySplitWorkflow {
    pub fn new(gateway: Arc<dyn DeliveryGateway>, refresh: RefreshSignal) -> Self {
        Self { gateway, refresh }
    }

    /// Split `line` down to `request.requested_quantity`.
    ///
    /// Steps run strictly in order: optimistic local update, update of the original, then
    /// creation of the compensating line. A failed second step is never undone.
    pub async fn split(&self, line: &mut DisplayedLine, request: &QuantitySplitRequest) -> SplitOutcome {
        let (requested, remainder) = match check_request(line, request) {
            Ok(quantities) => quantities,
            Err(reason) => {
                tracing::debug!(%reason, entry_id = %request.original_entry_id, "split ignored");
                return SplitOutcome::NoOp { reason };
            }
        };

        let previous = line.displayed_quantity;
        line.displayed_quantity = requested.get();

        let reduced = line.entry.with_quantity(requested);
        if let Err(message) = self.apply(DeliveryPayload::from_entry(&reduced), Step::Reduce).await {
            line.displayed_quantity = previous;
            tracing::warn!(entry_id = %request.original_entry_id, %message, "split rolled back");
            return SplitOutcome::RolledBack {
                restored_quantity: previous,
                notice: Notice::error(format!("Unable to update the quantity: {message}")),
            };
        }

        line.entry = reduced;
        self.refresh.notify();

        let compensating = line.entry.unassigned_remainder(remainder);
        match self
            .apply(DeliveryPayload::from_entry(&compensating), Step::Compensate)
            .await
        {
            Ok(result) => {
                tracing::info!(
                    entry_id = %request.original_entry_id,
                    reduced_to = requested.get(),
                    compensating = remainder.get(),
                    "quantity split completed"
                );
                SplitOutcome::Completed {
                    reduced_to: requested.get(),
                    compensating_quantity: remainder.get(),
                    compensating_entry_id: result.entry_id(),
                    notice: Notice::success(format!(
                        "Quantity updated to {requested}. A new unassigned delivery for the remaining {remainder} has been created."
                    )),
                }
            }
            Err(message) => {
                tracing::warn!(
                    entry_id = %request.original_entry_id,
                    orphaned = remainder.get(),
                    %message,
                    "compensating delivery was not created"
                );
                SplitOutcome::CompensationFailed {
                    reduced_to: requested.get(),
                    orphaned_quantity: remainder.get(),
                    notice: Notice::warning(format!(
                        "Quantity was reduced to {requested}, but the delivery for the remaining {remainder} could not be created ({message}). Manual reconciliation is needed."
                    )),
                }
            }
        }
    }

    /// Run one gateway step. Any failure is flattened to the message shown to the operator.
    async fn apply(&self, payload: DispatchResult<DeliveryPayload>, step: Step) -> Result<SubmissionResult, String> {
        let payload = payload.map_err(|e| e.to_string())?;
        let response = match step {
            Step::Reduce => self.gateway.update(&payload).await,
            // The remainder repeats an existing procedure on purpose.
            Step::Compensate => self.gateway.create(&payload, true).await,
        };

        match response {
            Ok(result) if result.is_accepted() => Ok(result),
            Ok(result) => Err(result.failure_message()),
            Err(e) => Err(e.to_string()),
        }
    }
}

#[derive(Clone, Copy)]
enum Step {
    Reduce,
    Compensate,
}

/// Returns `(requested, remainder)` for a valid reduction, or why it is not one.
fn check_request(line: &DisplayedLine, request: &QuantitySplitRequest) -> Result<(Quantity, Quantity), String> {
    if line.entry.entry_id.as_deref() != Some(request.original_entry_id.as_str()) {
        return Err("request does not match the displayed entry".into());
    }
    if request.current_quantity != line.displayed_quantity {
        return Err(format!(
            "displayed quantity is {}, not {}",
            line.displayed_quantity, request.current_quantity
        ));
    }

    let requested = Quantity::new(request.requested_quantity)
        .map_err(|_| "requested quantity must be at least 1".to_string())?;
    let current = Quantity::new(request.current_quantity)
        .map_err(|_| "current quantity must be at least 1".to_string())?;
    let remainder = current
        .checked_sub(requested)
        .ok_or_else(|| "requested quantity must be less than the current quantity".to_string())?;

    Ok((requested, remainder))
}
