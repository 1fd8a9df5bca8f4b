//! Persisted delivery lines as the back office lists them.

use crate::draft::{Cadence, DiagnosisLine, Enrollee, PharmacySelection, ProcedureLine};
use chrono::NaiveDate;
use dispatch_types::Quantity;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Rider {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
}

/// One delivery line: a single procedure for a single enrollee and diagnosis.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryEntry {
    /// `None` only for entries that have not been persisted yet.
    #[serde(default)]
    pub entry_id: Option<String>,
    pub enrollee: Enrollee,
    #[serde(default)]
    pub scheme_id: String,
    pub diagnosis: DiagnosisLine,
    pub procedure: ProcedureLine,
    #[serde(default)]
    pub cadence: Cadence,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub next_delivery_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub pharmacy: Option<PharmacySelection>,
    #[serde(default)]
    pub rider: Option<Rider>,
    #[serde(default)]
    pub pickup_address: Option<String>,
    #[serde(default)]
    pub pickup_code: Option<String>,
    #[serde(default)]
    pub comment: String,
}

impl DeliveryEntry {
    pub fn quantity(&self) -> Quantity {
        self.procedure.quantity
    }

    /// Same line with a different quantity; every other field is carried forward.
    pub fn with_quantity(&self, quantity: Quantity) -> Self {
        let mut entry = self.clone();
        entry.procedure.quantity = quantity;
        entry
    }

    /// A new, unassigned line holding `quantity` units of this line's procedure.
    ///
    /// Keeps enrollee, scheme, diagnosis, procedure and schedule. Clears the entry id, pharmacy,
    /// rider, pickup address and pickup code so the line re-enters the fulfilment pool.
    pub fn unassigned_remainder(&self, quantity: Quantity) -> Self {
        let mut entry = self.with_quantity(quantity);
        entry.entry_id = None;
        entry.pharmacy = None;
        entry.rider = None;
        entry.pickup_address = None;
        entry.pickup_code = None;
        entry
    }

    /// Same line assigned to `pharmacy` and, when given, a rider.
    pub fn with_assignment(&self, pharmacy: &PharmacySelection, rider: Option<&Rider>) -> Self {
        let mut entry = self.clone();
        entry.pharmacy = Some(pharmacy.clone());
        if let Some(rider) = rider {
            entry.rider = Some(rider.clone());
        }
        entry
    }
}
