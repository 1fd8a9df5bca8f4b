//! Workflow orchestration modules.
//!
//! Each workflow drives the delivery gateway through one multi-step operation and turns the
//! result into a single outcome carrying one user-facing notice.

pub mod assignment;
pub mod split;
pub mod submission;
