//! # Dispatch Core
//!
//! Core business logic for pharmacy delivery submission and reconciliation.
//!
//! This crate turns a user-edited delivery draft into a backend record:
//! - Draft validation and cadence-specific payload mapping
//! - Duplicate-conflict detection with explicit confirmation
//! - Quantity splits with a compensating unassigned delivery
//! - Best-effort SMS and email notifications that never block a commit
//!
//! **No API concerns**: HTTP servers and command-line handling belong in `api-rest` and `dispatch-cli`.

pub mod config;
pub mod constants;
pub mod draft;
pub mod duplicates;
pub mod entry;
pub mod error;
pub mod gateway;
pub mod notice;
pub mod notifications;
pub mod payload;
pub mod refresh;
pub mod validation;
pub mod workflows;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::DispatchConfig;
pub use draft::{Cadence, DeliveryDraft, DraftStore, InMemoryDraftStore};
pub use entry::DeliveryEntry;
pub use error::{DispatchError, DispatchResult};
pub use gateway::{DeliveryGateway, HttpDeliveryGateway, SubmissionResult};
pub use notice::{Notice, NoticeLevel};
pub use notifications::{HttpNotificationSender, NotificationDispatcher, NotificationSender};
pub use refresh::RefreshSignal;
pub use workflows::assignment::PharmacyAssignmentWorkflow;
pub use workflows::split::QuantitySplitWorkflow;
pub use workflows::submission::SubmissionWorkflow;
