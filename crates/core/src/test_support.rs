//! Shared fixtures and fakes for the unit tests in this crate.

use crate::draft::{
    Cadence, DeliveryDraft, DiagnosisLine, Enrollee, PharmacySelection, PharmacyType, ProcedureLine,
};
use crate::entry::{DeliveryEntry, Rider};
use crate::gateway::{check_delete_identifiers, DeliveryGateway, SubmissionResult};
use crate::notifications::{Channel, NotificationJob, NotificationSender};
use crate::payload::DeliveryPayload;
use crate::{DispatchError, DispatchResult};
use async_trait::async_trait;
use chrono::NaiveDate;
use dispatch_types::Quantity;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn enrollee() -> Enrollee {
    Enrollee {
        id: "ENR-1001".into(),
        name: "Ada Obi".into(),
        phone: Some("+2348000000001".into()),
        email: Some("ada@example.org".into()),
    }
}

fn pharmacy() -> PharmacySelection {
    PharmacySelection {
        id: "PH-3".into(),
        name: "Cedar Pharmacy".into(),
        pharmacy_type: PharmacyType::Internal,
    }
}

fn procedure(quantity: u32) -> ProcedureLine {
    ProcedureLine {
        id: "PROC-7".into(),
        name: "Metformin 500mg".into(),
        quantity: Quantity::new(quantity).unwrap(),
        cost: "150".into(),
        dosage: "1 tablet twice daily".into(),
    }
}

fn diagnosis() -> DiagnosisLine {
    DiagnosisLine {
        id: "DX-42".into(),
        name: "Type 2 diabetes".into(),
    }
}

pub(crate) fn sample_draft(cadence: Cadence) -> DeliveryDraft {
    DeliveryDraft {
        enrollee: enrollee(),
        scheme_id: "SCH-1".into(),
        pharmacy: Some(pharmacy()),
        procedures: vec![procedure(2)],
        diagnoses: vec![diagnosis()],
        cadence,
        start_date: Some(date(2026, 11, 2)),
        next_delivery_date: None,
        end_date: match cadence {
            Cadence::OneOff => None,
            Cadence::Routine => Some(date(2027, 5, 2)),
        },
        comment: "Call before arrival".into(),
        ..Default::default()
    }
}

pub(crate) fn sample_entry() -> DeliveryEntry {
    DeliveryEntry {
        entry_id: Some("DEL-501".into()),
        enrollee: enrollee(),
        scheme_id: "SCH-1".into(),
        diagnosis: diagnosis(),
        procedure: procedure(5),
        cadence: Cadence::OneOff,
        start_date: Some(date(2026, 11, 2)),
        next_delivery_date: None,
        end_date: None,
        pharmacy: Some(pharmacy()),
        rider: Some(Rider {
            id: "R-12".into(),
            name: "Tunde".into(),
            phone: Some("+2348000000099".into()),
        }),
        pickup_address: Some("12 Marina Rd".into()),
        pickup_code: Some("PK-7781".into()),
        comment: String::new(),
    }
}

pub(crate) fn ok_result() -> SubmissionResult {
    SubmissionResult {
        http_status: 200,
        server_status: 200,
        ..Default::default()
    }
}

/// A transport error, as produced when the backend cannot be reached.
pub(crate) fn network_error() -> DispatchError {
    let err = reqwest::Client::new().get("not a url").build().unwrap_err();
    DispatchError::Network(err)
}

// ============================================================================
// Fake gateway
// ============================================================================

/// A gateway call as the backend would have received it.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum GatewayCall {
    Create {
        endpoint: String,
        confirm: bool,
        body: Value,
    },
    Update {
        entry_id: String,
        body: Value,
    },
    Delete {
        entry_id: String,
        procedure_id: String,
        diagnosis_id: String,
    },
}

/// Replays scripted responses in order; answers `200 OK` once the script runs out.
#[derive(Default)]
pub(crate) struct FakeGateway {
    responses: Mutex<VecDeque<DispatchResult<SubmissionResult>>>,
    calls: Mutex<Vec<GatewayCall>>,
}

impl FakeGateway {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(self, result: SubmissionResult) -> Self {
        self.push(Ok(result));
        self
    }

    pub(crate) fn fail_with(self, error: DispatchError) -> Self {
        self.push(Err(error));
        self
    }

    pub(crate) fn push(&self, response: DispatchResult<SubmissionResult>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub(crate) fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().unwrap().clone()
    }

    fn answer(&self, call: GatewayCall) -> DispatchResult<SubmissionResult> {
        self.calls.lock().unwrap().push(call);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ok_result()))
    }
}

#[async_trait]
impl DeliveryGateway for FakeGateway {
    async fn create(
        &self,
        payload: &DeliveryPayload,
        confirm_duplicates: bool,
    ) -> DispatchResult<SubmissionResult> {
        let body = serde_json::to_value(payload.with_confirmation(confirm_duplicates)).unwrap();
        self.answer(GatewayCall::Create {
            endpoint: payload.endpoint().to_owned(),
            confirm: confirm_duplicates,
            body,
        })
    }

    async fn update(&self, payload: &DeliveryPayload) -> DispatchResult<SubmissionResult> {
        let entry_id = payload
            .entry_id()
            .ok_or(DispatchError::MissingIdentifier("entry id"))?
            .to_owned();
        self.answer(GatewayCall::Update {
            entry_id,
            body: serde_json::to_value(payload).unwrap(),
        })
    }

    async fn delete(
        &self,
        entry_id: &str,
        procedure_id: &str,
        diagnosis_id: &str,
    ) -> DispatchResult<SubmissionResult> {
        check_delete_identifiers(entry_id, procedure_id, diagnosis_id)?;
        self.answer(GatewayCall::Delete {
            entry_id: entry_id.to_owned(),
            procedure_id: procedure_id.to_owned(),
            diagnosis_id: diagnosis_id.to_owned(),
        })
    }
}

// ============================================================================
// Fake notification sender
// ============================================================================

#[derive(Default)]
pub(crate) struct FakeSender {
    failing: Option<Channel>,
    panicking: Option<Channel>,
    sent: Mutex<Vec<NotificationJob>>,
}

impl FakeSender {
    pub(crate) fn failing(channel: Channel) -> Self {
        Self {
            failing: Some(channel),
            ..Default::default()
        }
    }

    pub(crate) fn panicking(channel: Channel) -> Self {
        Self {
            panicking: Some(channel),
            ..Default::default()
        }
    }

    /// Jobs successfully sent on `channel`.
    pub(crate) fn sent(&self, channel: Channel) -> Vec<NotificationJob> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|job| job.channel == channel)
            .cloned()
            .collect()
    }

    fn send(&self, job: &NotificationJob) -> DispatchResult<()> {
        if self.panicking == Some(job.channel) {
            panic!("{} transport crashed", job.channel);
        }
        if self.failing == Some(job.channel) {
            return Err(DispatchError::Notification {
                channel: job.channel,
                message: "provider unavailable".into(),
            });
        }
        self.sent.lock().unwrap().push(job.clone());
        Ok(())
    }
}

#[async_trait]
impl NotificationSender for FakeSender {
    async fn send_sms(&self, job: &NotificationJob) -> DispatchResult<()> {
        self.send(job)
    }

    async fn send_email(&self, job: &NotificationJob) -> DispatchResult<()> {
        self.send(job)
    }
}
