//! The in-progress delivery form and the store that holds it.
//!
//! The dashboard edits a [`DeliveryDraft`] field by field. The submission workflow never reads
//! the store directly while a request is in flight: it takes an owned snapshot at submit time,
//! so edits made afterwards cannot leak into the payload being sent.

use crate::entry::DeliveryEntry;
use crate::error::{DispatchError, DispatchResult};
use chrono::NaiveDate;
use dispatch_types::Quantity;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use utoipa::ToSchema;

/// How the pharmacy fulfilling a delivery relates to the scheme.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum PharmacyType {
    Internal,
    External,
    ThirdPartyNetwork,
}

/// The pharmacy chosen to fulfil a delivery.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PharmacySelection {
    pub id: String,
    pub name: String,
    pub pharmacy_type: PharmacyType,
}

/// Whether a delivery happens once or on a schedule.
///
/// Each cadence maps to its own backend endpoint and payload shape.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Cadence {
    #[default]
    OneOff,
    Routine,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct Enrollee {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// A medication or procedure line on a delivery.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProcedureLine {
    pub id: String,
    pub name: String,
    #[schema(value_type = u32, minimum = 1)]
    pub quantity: Quantity,
    /// Unit cost as typed by the user. Must parse to a positive number before submission.
    pub cost: String,
    #[serde(default)]
    pub dosage: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisLine {
    pub id: String,
    pub name: String,
}

/// A file already encoded by the caller; passed through untouched.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub file_name: String,
    pub content_type: String,
    pub base64_content: String,
}

/// The in-progress, unsaved delivery form.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct DeliveryDraft {
    pub enrollee: Enrollee,
    pub scheme_id: String,
    pub pharmacy: Option<PharmacySelection>,
    pub procedures: Vec<ProcedureLine>,
    pub diagnoses: Vec<DiagnosisLine>,
    pub cadence: Cadence,
    pub start_date: Option<NaiveDate>,
    pub next_delivery_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub comment: String,
    pub attachment: Option<Attachment>,
    pub is_editing: bool,
    pub entry_id: Option<String>,
    /// Index of the form step the user is on.
    pub step: usize,
}

impl DeliveryDraft {
    /// Build an editing draft from a persisted delivery line.
    pub fn from_entry(entry: &DeliveryEntry) -> Self {
        Self {
            enrollee: entry.enrollee.clone(),
            scheme_id: entry.scheme_id.clone(),
            pharmacy: entry.pharmacy.clone(),
            procedures: vec![entry.procedure.clone()],
            diagnoses: vec![entry.diagnosis.clone()],
            cadence: entry.cadence,
            start_date: entry.start_date,
            next_delivery_date: entry.next_delivery_date,
            end_date: entry.end_date,
            comment: entry.comment.clone(),
            attachment: None,
            is_editing: true,
            entry_id: entry.entry_id.clone(),
            step: 0,
        }
    }

    /// Comma separated procedure names, used in notification bodies.
    pub fn procedure_summary(&self) -> String {
        self.procedures
            .iter()
            .map(|p| format!("{} x{}", p.name, p.quantity))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Holder of the single in-progress draft.
///
/// Implementations use interior mutability so the store can be shared between the dashboard
/// handlers and the submission workflow.
pub trait DraftStore: Send + Sync {
    fn get(&self) -> DispatchResult<DeliveryDraft>;

    fn set(&self, draft: DeliveryDraft) -> DispatchResult<()>;

    fn reset(&self) -> DispatchResult<()>;

    /// Replace the draft with an editing copy of an existing delivery line.
    fn load_for_edit(&self, entry: &DeliveryEntry) -> DispatchResult<()> {
        self.set(DeliveryDraft::from_entry(entry))
    }
}

/// Process-local draft store.
#[derive(Debug, Default)]
pub struct InMemoryDraftStore {
    draft: RwLock<DeliveryDraft>,
}

impl InMemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_draft(draft: DeliveryDraft) -> Self {
        Self {
            draft: RwLock::new(draft),
        }
    }
}

impl DraftStore for InMemoryDraftStore {
    fn get(&self) -> DispatchResult<DeliveryDraft> {
        let guard = self.draft.read().map_err(|_| DispatchError::StorePoisoned)?;
        Ok(guard.clone())
    }

    fn set(&self, draft: DeliveryDraft) -> DispatchResult<()> {
        let mut guard = self.draft.write().map_err(|_| DispatchError::StorePoisoned)?;
        *guard = draft;
        Ok(())
    }

    fn reset(&self) -> DispatchResult<()> {
        self.set(DeliveryDraft::default())
    }
}
