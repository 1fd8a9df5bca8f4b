//! Input validation utilities.
//!
//! Drafts are checked here before any payload is built or any network call is made. A draft
//! that fails validation never leaves the process.

use crate::draft::{Cadence, DeliveryDraft};
use crate::{DispatchError, DispatchResult};

/// Parses a user-entered unit cost.
///
/// # Errors
///
/// Returns `DispatchError::Validation` unless the trimmed text is a finite number above zero.
pub fn parse_cost(cost: &str, procedure_name: &str) -> DispatchResult<f64> {
    let parsed = cost.trim().parse::<f64>().map_err(|_| {
        DispatchError::Validation(format!("enter a valid cost for {procedure_name}"))
    })?;

    if !parsed.is_finite() || parsed <= 0.0 {
        return Err(DispatchError::Validation(format!(
            "cost for {procedure_name} must be greater than zero"
        )));
    }

    Ok(parsed)
}

/// Validates a draft before submission.
///
/// Checks, in order:
/// - an enrollee is selected
/// - at least one procedure and one diagnosis are present
/// - every procedure has a positive numeric cost
/// - the schedule matches the cadence (a start date always, and for routine deliveries an end
///   date on or after the start with the next delivery inside that window)
/// - an editing draft carries the id of the entry being edited
///
/// # Errors
///
/// Returns the first failing check as `DispatchError::Validation`.
pub fn validate_draft(draft: &DeliveryDraft) -> DispatchResult<()> {
    if draft.enrollee.id.trim().is_empty() {
        return Err(DispatchError::Validation("select an enrollee".into()));
    }

    if draft.procedures.is_empty() {
        return Err(DispatchError::Validation(
            "add at least one procedure".into(),
        ));
    }

    if draft.diagnoses.is_empty() {
        return Err(DispatchError::Validation(
            "add at least one diagnosis".into(),
        ));
    }

    for procedure in &draft.procedures {
        parse_cost(&procedure.cost, &procedure.name)?;
    }

    let Some(start) = draft.start_date else {
        return Err(DispatchError::Validation("select a start date".into()));
    };

    if draft.cadence == Cadence::Routine {
        let Some(end) = draft.end_date else {
            return Err(DispatchError::Validation(
                "routine deliveries need an end date".into(),
            ));
        };
        if end < start {
            return Err(DispatchError::Validation(
                "end date cannot be before the start date".into(),
            ));
        }
        if let Some(next) = draft.next_delivery_date {
            if next < start || next > end {
                return Err(DispatchError::Validation(
                    "next delivery date must fall between the start and end dates".into(),
                ));
            }
        }
    }

    if draft.is_editing
        && draft
            .entry_id
            .as_deref()
            .map_or(true, |id| id.trim().is_empty())
    {
        return Err(DispatchError::Validation(
            "the delivery being edited has no entry id".into(),
        ));
    }

    Ok(())
}
