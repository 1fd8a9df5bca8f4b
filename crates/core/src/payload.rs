//! Backend wire payloads for delivery create/update calls.
//!
//! Responsibilities:
//! - Map a [`DeliveryDraft`] or a [`DeliveryEntry`] onto the backend's PascalCase wire shape
//! - Choose the endpoint for the delivery's cadence
//! - Carry the confirm-duplicates flag in the body envelope
//!
//! Notes:
//! - One-off deliveries nest procedures and diagnoses as two arrays on a single delivery date.
//! - Routine deliveries send one line per procedure, each carrying every diagnosis id, plus the
//!   start/next/end schedule.
//! - Mapping is deterministic: the same draft always serialises to the same bytes.

use crate::constants::{ONE_OFF_ENDPOINT, ROUTINE_ENDPOINT};
use crate::draft::{
    Attachment, Cadence, DeliveryDraft, DiagnosisLine, Enrollee, PharmacySelection, PharmacyType,
    ProcedureLine,
};
use crate::entry::DeliveryEntry;
use crate::validation::parse_cost;
use crate::DispatchResult;
use chrono::NaiveDate;
use serde::Serialize;

// ============================================================================
// Public payload type
// ============================================================================

/// A create/update body ready for the gateway.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeliveryPayload {
    #[serde(skip)]
    cadence: Cadence,
    #[serde(flatten)]
    body: PayloadBody,
    confirm_duplicates: bool,
}

impl DeliveryPayload {
    /// Map a draft onto the payload shape for its cadence.
    ///
    /// The draft is expected to have passed [`crate::validation::validate_draft`]; costs are
    /// parsed again here so an unvalidated draft still cannot produce a malformed body.
    pub fn from_draft(draft: &DeliveryDraft) -> DispatchResult<Self> {
        let header = PayloadHeader::new(
            draft.entry_id.as_deref(),
            &draft.enrollee,
            &draft.scheme_id,
            draft.pharmacy.as_ref(),
            None,
            None,
            None,
            &draft.comment,
        );
        let attachment = draft.attachment.as_ref().map(AttachmentWire::from);

        Self::build(
            draft.cadence,
            header,
            &draft.procedures,
            &draft.diagnoses,
            Schedule {
                start: draft.start_date,
                next: draft.next_delivery_date,
                end: draft.end_date,
            },
            attachment,
        )
    }

    /// Map a single persisted line, keeping its assignment and pickup details.
    pub fn from_entry(entry: &DeliveryEntry) -> DispatchResult<Self> {
        let header = PayloadHeader::new(
            entry.entry_id.as_deref(),
            &entry.enrollee,
            &entry.scheme_id,
            entry.pharmacy.as_ref(),
            entry.rider.as_ref().map(|r| r.id.as_str()),
            entry.pickup_address.as_deref(),
            entry.pickup_code.as_deref(),
            &entry.comment,
        );

        Self::build(
            entry.cadence,
            header,
            std::slice::from_ref(&entry.procedure),
            std::slice::from_ref(&entry.diagnosis),
            Schedule {
                start: entry.start_date,
                next: entry.next_delivery_date,
                end: entry.end_date,
            },
            None,
        )
    }

    fn build(
        cadence: Cadence,
        header: PayloadHeader,
        procedures: &[ProcedureLine],
        diagnoses: &[DiagnosisLine],
        schedule: Schedule,
        attachment: Option<AttachmentWire>,
    ) -> DispatchResult<Self> {
        let diagnoses: Vec<DiagnosisWire> = diagnoses.iter().map(DiagnosisWire::from).collect();

        let body = match cadence {
            Cadence::OneOff => PayloadBody::OneOff(OneOffBody {
                header,
                delivery_date: schedule.start,
                procedures: procedures
                    .iter()
                    .map(ProcedureWire::try_from)
                    .collect::<DispatchResult<_>>()?,
                diagnoses,
                attachment,
            }),
            Cadence::Routine => {
                let diagnosis_ids: Vec<String> = diagnoses.iter().map(|d| d.diagnosis_id.clone()).collect();
                let lines = procedures
                    .iter()
                    .map(|p| {
                        Ok(RoutineLine {
                            procedure: ProcedureWire::try_from(p)?,
                            diagnosis_ids: diagnosis_ids.clone(),
                        })
                    })
                    .collect::<DispatchResult<_>>()?;

                PayloadBody::Routine(RoutineBody {
                    header,
                    start_date: schedule.start,
                    next_delivery_date: schedule.next.or(schedule.start),
                    end_date: schedule.end,
                    lines,
                    diagnoses,
                    attachment,
                })
            }
        };

        Ok(Self {
            cadence,
            body,
            confirm_duplicates: false,
        })
    }

    pub fn cadence(&self) -> Cadence {
        self.cadence
    }

    /// Endpoint for creating a delivery of this cadence.
    pub fn endpoint(&self) -> &'static str {
        match self.cadence {
            Cadence::OneOff => ONE_OFF_ENDPOINT,
            Cadence::Routine => ROUTINE_ENDPOINT,
        }
    }

    /// Id of the entry being updated, if the payload targets an existing one.
    pub fn entry_id(&self) -> Option<&str> {
        self.header().entry_id.as_deref()
    }

    pub fn confirm_duplicates(&self) -> bool {
        self.confirm_duplicates
    }

    /// The same payload with the confirm-duplicates flag set to `confirm`.
    ///
    /// This is the only field confirmation is allowed to change.
    pub fn with_confirmation(&self, confirm: bool) -> Self {
        Self {
            confirm_duplicates: confirm,
            ..self.clone()
        }
    }

    fn header(&self) -> &PayloadHeader {
        match &self.body {
            PayloadBody::OneOff(body) => &body.header,
            PayloadBody::Routine(body) => &body.header,
        }
    }
}

// ============================================================================
// Wire types (internal)
// ============================================================================

struct Schedule {
    start: Option<NaiveDate>,
    next: Option<NaiveDate>,
    end: Option<NaiveDate>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
enum PayloadBody {
    OneOff(OneOffBody),
    Routine(RoutineBody),
}

/// Fields common to both cadences.
///
/// Unassigned lines send empty pharmacy, rider and pickup fields rather than omitting them.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
struct PayloadHeader {
    #[serde(skip_serializing_if = "Option::is_none")]
    entry_id: Option<String>,
    enrollee_id: String,
    enrollee_name: String,
    enrollee_phone: String,
    enrollee_email: String,
    scheme_id: String,
    pharmacy_id: String,
    pharmacy_name: String,
    pharmacy_type: Option<PharmacyType>,
    rider_id: String,
    pickup_address: String,
    pickup_code: String,
    comment: String,
}

impl PayloadHeader {
    #[allow(clippy::too_many_arguments)]
    fn new(
        entry_id: Option<&str>,
        enrollee: &Enrollee,
        scheme_id: &str,
        pharmacy: Option<&PharmacySelection>,
        rider_id: Option<&str>,
        pickup_address: Option<&str>,
        pickup_code: Option<&str>,
        comment: &str,
    ) -> Self {
        Self {
            entry_id: entry_id.map(str::to_owned),
            enrollee_id: enrollee.id.clone(),
            enrollee_name: enrollee.name.clone(),
            enrollee_phone: enrollee.phone.clone().unwrap_or_default(),
            enrollee_email: enrollee.email.clone().unwrap_or_default(),
            scheme_id: scheme_id.to_owned(),
            pharmacy_id: pharmacy.map(|p| p.id.clone()).unwrap_or_default(),
            pharmacy_name: pharmacy.map(|p| p.name.clone()).unwrap_or_default(),
            pharmacy_type: pharmacy.map(|p| p.pharmacy_type),
            rider_id: rider_id.unwrap_or_default().to_owned(),
            pickup_address: pickup_address.unwrap_or_default().to_owned(),
            pickup_code: pickup_code.unwrap_or_default().to_owned(),
            comment: comment.to_owned(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
struct OneOffBody {
    #[serde(flatten)]
    header: PayloadHeader,
    delivery_date: Option<NaiveDate>,
    procedures: Vec<ProcedureWire>,
    diagnoses: Vec<DiagnosisWire>,
    #[serde(skip_serializing_if = "Option::is_none")]
    attachment: Option<AttachmentWire>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
struct RoutineBody {
    #[serde(flatten)]
    header: PayloadHeader,
    start_date: Option<NaiveDate>,
    next_delivery_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    lines: Vec<RoutineLine>,
    diagnoses: Vec<DiagnosisWire>,
    #[serde(skip_serializing_if = "Option::is_none")]
    attachment: Option<AttachmentWire>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
struct RoutineLine {
    #[serde(flatten)]
    procedure: ProcedureWire,
    diagnosis_ids: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ProcedureWire {
    procedure_id: String,
    procedure_name: String,
    quantity: u32,
    cost: f64,
    dosage: String,
}

impl TryFrom<&ProcedureLine> for ProcedureWire {
    type Error = crate::DispatchError;

    fn try_from(line: &ProcedureLine) -> DispatchResult<Self> {
        Ok(Self {
            procedure_id: line.id.clone(),
            procedure_name: line.name.clone(),
            quantity: line.quantity.get(),
            cost: parse_cost(&line.cost, &line.name)?,
            dosage: line.dosage.clone(),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
struct DiagnosisWire {
    diagnosis_id: String,
    diagnosis_name: String,
}

impl From<&DiagnosisLine> for DiagnosisWire {
    fn from(line: &DiagnosisLine) -> Self {
        Self {
            diagnosis_id: line.id.clone(),
            diagnosis_name: line.name.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
struct AttachmentWire {
    file_name: String,
    content_type: String,
    base64_content: String,
}

impl From<&Attachment> for AttachmentWire {
    fn from(attachment: &Attachment) -> Self {
        Self {
            file_name: attachment.file_name.clone(),
            content_type: attachment.content_type.clone(),
            base64_content: attachment.base64_content.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sample_draft, sample_entry};
    use serde_json::Value;

    fn to_value(payload: &DeliveryPayload) -> Value {
        serde_json::to_value(payload).unwrap()
    }

    #[test]
    fn test_one_off_shape() {
        let payload = DeliveryPayload::from_draft(&sample_draft(Cadence::OneOff)).unwrap();
        let json = to_value(&payload);

        assert_eq!(payload.endpoint(), ONE_OFF_ENDPOINT);
        assert_eq!(json["EnrolleeId"], "ENR-1001");
        assert_eq!(json["DeliveryDate"], "2026-11-02");
        assert_eq!(json["Procedures"][0]["ProcedureId"], "PROC-7");
        assert_eq!(json["Procedures"][0]["Quantity"], 2);
        assert_eq!(json["Procedures"][0]["Cost"], 150.0);
        assert_eq!(json["Diagnoses"][0]["DiagnosisId"], "DX-42");
        assert_eq!(json["ConfirmDuplicates"], false);
        assert!(json.get("Lines").is_none());
        assert!(json.get("EntryId").is_none());
    }

    #[test]
    fn test_routine_shape() {
        let payload = DeliveryPayload::from_draft(&sample_draft(Cadence::Routine)).unwrap();
        let json = to_value(&payload);

        assert_eq!(payload.endpoint(), ROUTINE_ENDPOINT);
        assert_eq!(json["StartDate"], "2026-11-02");
        assert_eq!(json["EndDate"], "2027-05-02");
        assert_eq!(json["NextDeliveryDate"], "2026-11-02");
        assert_eq!(json["Lines"][0]["ProcedureName"], "Metformin 500mg");
        assert_eq!(json["Lines"][0]["DiagnosisIds"][0], "DX-42");
        assert!(json.get("Procedures").is_none());
        assert!(json.get("DeliveryDate").is_none());
    }

    #[test]
    fn test_mapping_is_deterministic() {
        let draft = sample_draft(Cadence::Routine);
        let a = serde_json::to_vec(&DeliveryPayload::from_draft(&draft).unwrap()).unwrap();
        let b = serde_json::to_vec(&DeliveryPayload::from_draft(&draft).unwrap()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_confirmation_changes_only_the_flag() {
        let payload = DeliveryPayload::from_draft(&sample_draft(Cadence::OneOff)).unwrap();
        let mut original = to_value(&payload);
        let mut confirmed = to_value(&payload.with_confirmation(true));

        assert_eq!(confirmed["ConfirmDuplicates"], true);
        original.as_object_mut().unwrap().remove("ConfirmDuplicates");
        confirmed.as_object_mut().unwrap().remove("ConfirmDuplicates");
        assert_eq!(original, confirmed);
    }

    #[test]
    fn test_unassigned_entry_sends_empty_pharmacy_fields() {
        let entry = sample_entry();
        let remainder = entry.unassigned_remainder(dispatch_types::Quantity::new(2).unwrap());
        let json = to_value(&DeliveryPayload::from_entry(&remainder).unwrap());

        assert_eq!(json["PharmacyId"], "");
        assert_eq!(json["PharmacyName"], "");
        assert_eq!(json["PharmacyType"], Value::Null);
        assert_eq!(json["PickupCode"], "");
        assert_eq!(json["PickupAddress"], "");
        assert_eq!(json["RiderId"], "");
        assert!(json.get("EntryId").is_none());
        assert_eq!(json["Procedures"][0]["Quantity"], 2);
    }

    #[test]
    fn test_entry_payload_keeps_entry_id_and_assignment() {
        let entry = sample_entry();
        let payload = DeliveryPayload::from_entry(&entry).unwrap();
        let json = to_value(&payload);

        assert_eq!(payload.entry_id(), Some("DEL-501"));
        assert_eq!(json["PharmacyId"], "PH-3");
        assert_eq!(json["PickupCode"], "PK-7781");
    }

    #[test]
    fn test_invalid_cost_is_rejected() {
        let mut draft = sample_draft(Cadence::OneOff);
        draft.procedures[0].cost = "free".into();
        assert!(DeliveryPayload::from_draft(&draft).is_err());
    }
}
