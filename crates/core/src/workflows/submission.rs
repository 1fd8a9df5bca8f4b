//! Delivery submission workflow.
//!
//! Turns the current draft into a committed delivery record. The workflow owns a small state
//! machine:
//!
//! ```text
//! Draft -> Submitting -> Committed
//!                     -> DuplicateDetected -> AwaitingConfirmation -> Resubmitting -> Committed
//!                                                                                -> Failed
//!                                                                 -> Cancelled
//!                     -> Failed
//! ```
//!
//! ## Rules
//!
//! - The draft is snapshotted once per submission; later edits to the store do not reach the
//!   in-flight payload.
//! - Duplicate detection runs on the first response only. After the user confirms, the
//!   server's answer is final.
//! - Confirmation resends the identical payload with only the confirm-duplicates flag set.
//! - While a submission is between `Submitting` and `Resubmitting` the workflow reports
//!   `is_submitting() == true` and refuses a new submission.
//! - Only a commit resets the draft store. Failures and cancellations leave it as it was.
//! - Notifications run after the commit and cannot undo it.

use crate::constants::NETWORK_FAILURE_MESSAGE;
use crate::draft::{DeliveryDraft, DraftStore};
use crate::duplicates::{parse_warnings, DuplicateDefaults, DuplicateWarning};
use crate::gateway::{mentions_duplicate, DeliveryGateway, SubmissionResult};
use crate::notice::Notice;
use crate::notifications::{commit_jobs, DispatchReport, NotificationDispatcher, NotificationWarning};
use crate::payload::DeliveryPayload;
use crate::refresh::RefreshSignal;
use crate::validation::validate_draft;
use crate::{DispatchError, DispatchResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

// ============================================================================
// STATES AND OUTCOMES
// ============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum SubmissionState {
    #[default]
    Draft,
    Submitting,
    DuplicateDetected,
    AwaitingConfirmation,
    Resubmitting,
    Committed,
    Failed,
    Cancelled,
}

impl SubmissionState {
    /// Whether editing controls must stay locked.
    pub fn is_submitting(self) -> bool {
        matches!(
            self,
            Self::Submitting
                | Self::DuplicateDetected
                | Self::AwaitingConfirmation
                | Self::Resubmitting
        )
    }
}

/// Which server signal identified a duplicate conflict.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum DuplicateSignal {
    ConfirmationRequired,
    ConflictStatus,
    PriorDeliveries,
}

/// Checks the duplicate signals in priority order; the first match wins.
pub fn detect_duplicate(result: &SubmissionResult) -> Option<DuplicateSignal> {
    if result.requires_confirmation {
        return Some(DuplicateSignal::ConfirmationRequired);
    }
    if result.is_duplicate_conflict() {
        return Some(DuplicateSignal::ConflictStatus);
    }
    if result.prior_delivery_count() > 0 {
        return Some(DuplicateSignal::PriorDeliveries);
    }
    None
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum FailureKind {
    /// The request never got a response.
    Network,
    /// The server answered with an error.
    Server,
    /// The request was refused before it was sent.
    Request,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SubmissionFailure {
    pub kind: FailureKind,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CommitReport {
    pub entry_id: Option<String>,
    pub edited: bool,
    /// `None` when editing; edits do not notify the enrollee.
    pub notifications: Option<DispatchReport>,
    pub notice: Notice,
}

impl CommitReport {
    pub fn notification_warnings(&self) -> Vec<NotificationWarning> {
        self.notifications
            .as_ref()
            .map(DispatchReport::warnings)
            .unwrap_or_default()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum SubmissionOutcome {
    /// The draft failed validation; nothing was sent.
    Invalid { notice: Notice },
    Committed { report: CommitReport },
    /// Waiting for the user to confirm or decline.
    DuplicateDetected {
        signal: DuplicateSignal,
        warnings: Vec<DuplicateWarning>,
    },
    Failed {
        failure: SubmissionFailure,
        notice: Notice,
    },
    Cancelled { notice: Notice },
}

impl SubmissionOutcome {
    /// The summary notice for this outcome. `None` while waiting on a duplicate decision.
    pub fn notice(&self) -> Option<&Notice> {
        match self {
            Self::Invalid { notice } | Self::Failed { notice, .. } | Self::Cancelled { notice } => {
                Some(notice)
            }
            Self::Committed { report } => Some(&report.notice),
            Self::DuplicateDetected { .. } => None,
        }
    }
}

struct PendingSubmission {
    snapshot: DeliveryDraft,
    payload: DeliveryPayload,
    warnings: Vec<DuplicateWarning>,
}

// ============================================================================
// SUBMISSION WORKFLOW
// ============================================================================

/// Orchestrates one draft at a time through the gateway.
pub struct SubmissionWorkflow {
    gateway: Arc<dyn DeliveryGateway>,
    dispatcher: NotificationDispatcher,
    store: Arc<dyn DraftStore>,
    refresh: RefreshSignal,
    state: SubmissionState,
    pending: Option<PendingSubmission>,
    history: Vec<SubmissionState>,
}

impl SubmissionWorkflow {
    pub fn new(
        gateway: Arc<dyn DeliveryGateway>,
        dispatcher: NotificationDispatcher,
        store: Arc<dyn DraftStore>,
        refresh: RefreshSignal,
    ) -> Self {
        Self {
            gateway,
            dispatcher,
            store,
            refresh,
            state: SubmissionState::Draft,
            pending: None,
            history: vec![SubmissionState::Draft],
        }
    }

    pub fn state(&self) -> SubmissionState {
        self.state
    }

    pub fn is_submitting(&self) -> bool {
        self.state.is_submitting()
    }

    /// States visited by the current (or last) submission, in order.
    pub fn history(&self) -> &[SubmissionState] {
        &self.history
    }

    /// Warnings awaiting a decision; empty unless a duplicate is pending.
    pub fn pending_warnings(&self) -> &[DuplicateWarning] {
        self.pending.as_ref().map_or(&[], |p| p.warnings.as_slice())
    }

    /// Submit the current draft.
    ///
    /// # Returns
    ///
    /// The outcome of the first attempt. A `DuplicateDetected` outcome leaves the workflow
    /// waiting for [`Self::confirm`].
    ///
    /// # Errors
    ///
    /// - [`DispatchError::SubmissionInProgress`] if a submission is already under way
    /// - [`DispatchError::StorePoisoned`] if the draft cannot be read
    pub async fn submit(&mut self) -> DispatchResult<SubmissionOutcome> {
        if self.is_submitting() {
            return Err(DispatchError::SubmissionInProgress);
        }

        let snapshot = self.store.get()?;
        self.history.clear();
        self.transition(SubmissionState::Draft);

        let payload = match validate_draft(&snapshot).and_then(|()| DeliveryPayload::from_draft(&snapshot)) {
            Ok(payload) => payload,
            Err(e) => {
                let message = match e {
                    DispatchError::Validation(message) => message,
                    other => other.to_string(),
                };
                tracing::debug!(%message, "draft rejected before submission");
                return Ok(SubmissionOutcome::Invalid {
                    notice: Notice::error(message),
                });
            }
        };

        self.transition(SubmissionState::Submitting);

        let response = if snapshot.is_editing {
            self.gateway.update(&payload).await
        } else {
            self.gateway.create(&payload, false).await
        };

        let result = match response {
            Ok(result) => result,
            Err(e) => return Ok(self.fail_request(e)),
        };

        if let Some(signal) = detect_duplicate(&result) {
            let defaults = DuplicateDefaults::from_draft(&snapshot);
            let warnings = parse_warnings(&warning_texts(&result), &defaults);

            tracing::info!(?signal, count = warnings.len(), "duplicate delivery detected");

            self.transition(SubmissionState::DuplicateDetected);
            self.pending = Some(PendingSubmission {
                snapshot,
                payload,
                warnings: warnings.clone(),
            });

            return Ok(SubmissionOutcome::DuplicateDetected { signal, warnings });
        }

        Ok(self.settle(snapshot, result).await)
    }

    /// Mark the duplicate prompt as shown to the user.
    pub fn await_confirmation(&mut self) -> DispatchResult<&[DuplicateWarning]> {
        match self.state {
            SubmissionState::DuplicateDetected => {
                self.transition(SubmissionState::AwaitingConfirmation);
            }
            SubmissionState::AwaitingConfirmation => {}
            _ => return Err(DispatchError::NoPendingConfirmation),
        }
        Ok(self.pending_warnings())
    }

    /// Resolve a pending duplicate conflict.
    ///
    /// `proceed == true` resends the same payload with duplicates confirmed. `false` cancels,
    /// keeping the draft for further editing.
    ///
    /// # Errors
    ///
    /// [`DispatchError::NoPendingConfirmation`] unless a duplicate is pending.
    pub async fn confirm(&mut self, proceed: bool) -> DispatchResult<SubmissionOutcome> {
        if !matches!(
            self.state,
            SubmissionState::DuplicateDetected | SubmissionState::AwaitingConfirmation
        ) {
            return Err(DispatchError::NoPendingConfirmation);
        }
        let pending = self
            .pending
            .take()
            .ok_or(DispatchError::NoPendingConfirmation)?;

        if self.state == SubmissionState::DuplicateDetected {
            self.transition(SubmissionState::AwaitingConfirmation);
        }

        if !proceed {
            self.transition(SubmissionState::Cancelled);
            tracing::info!("duplicate submission cancelled by user");
            return Ok(SubmissionOutcome::Cancelled {
                notice: Notice::info("Submission cancelled. Your draft has been kept."),
            });
        }

        self.transition(SubmissionState::Resubmitting);

        let response = if pending.snapshot.is_editing {
            self.gateway
                .update(&pending.payload.with_confirmation(true))
                .await
        } else {
            self.gateway.create(&pending.payload, true).await
        };

        match response {
            Ok(result) => Ok(self.settle(pending.snapshot, result).await),
            Err(e) => Ok(self.fail_request(e)),
        }
    }

    async fn settle(&mut self, snapshot: DeliveryDraft, result: SubmissionResult) -> SubmissionOutcome {
        if !result.is_accepted() {
            return self.fail(FailureKind::Server, result.failure_message());
        }
        self.commit(snapshot, result).await
    }

    async fn commit(&mut self, snapshot: DeliveryDraft, result: SubmissionResult) -> SubmissionOutcome {
        self.transition(SubmissionState::Committed);

        let entry_id = result.entry_id().or_else(|| snapshot.entry_id.clone());
        let edited = snapshot.is_editing;
        tracing::info!(entry_id = ?entry_id, edited, "delivery committed");

        if let Err(e) = self.store.reset() {
            tracing::error!(error = %e, "failed to reset draft after commit");
        }
        self.refresh.notify();

        let notifications = if edited {
            None
        } else {
            Some(self.dispatcher.dispatch(commit_jobs(&snapshot)).await)
        };

        let headline = if edited {
            "Delivery updated successfully."
        } else {
            "Delivery saved successfully."
        };
        let warnings = notifications
            .as_ref()
            .map(DispatchReport::warnings)
            .unwrap_or_default();

        let notice = if warnings.is_empty() {
            Notice::success(headline)
        } else {
            let detail = warnings
                .iter()
                .map(|w| format!("{} notification could not be sent ({})", w.channel, w.message))
                .collect::<Vec<_>>()
                .join("; ");
            Notice::warning(format!("{headline} {detail}."))
        };

        SubmissionOutcome::Committed {
            report: CommitReport {
                entry_id,
                edited,
                notifications,
                notice,
            },
        }
    }

    fn fail_request(&mut self, error: DispatchError) -> SubmissionOutcome {
        tracing::warn!(error = %error, "delivery request failed");
        match error {
            DispatchError::Network(_) => self.fail(FailureKind::Network, NETWORK_FAILURE_MESSAGE.into()),
            other => self.fail(FailureKind::Request, other.to_string()),
        }
    }

    fn fail(&mut self, kind: FailureKind, message: String) -> SubmissionOutcome {
        self.transition(SubmissionState::Failed);
        self.pending = None;
        tracing::info!(?kind, %message, "delivery submission failed");

        SubmissionOutcome::Failed {
            notice: Notice::error(message.clone()),
            failure: SubmissionFailure { kind, message },
        }
    }

    fn transition(&mut self, next: SubmissionState) {
        tracing::debug!(from = ?self.state, to = ?next, "submission state");
        self.state = next;
        self.history.push(next);
    }
}

/// Texts to parse into duplicate warnings.
///
/// Uses the server's warnings when it sent any, then duplicate errors, then the message. Always
/// yields at least one entry so the user sees a prompt.
fn warning_texts(result: &SubmissionResult) -> Vec<String> {
    if !result.warnings.is_empty() {
        return result.warnings.clone();
    }

    let duplicate_errors: Vec<String> = result
        .errors
        .iter()
        .filter(|e| mentions_duplicate(e))
        .cloned()
        .collect();
    if !duplicate_errors.is_empty() {
        return duplicate_errors;
    }

    vec![result.message.clone().unwrap_or_default()]
}

// ============================================================================
// TESTS
// ============================================================================
