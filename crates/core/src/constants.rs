//! Constants used throughout the dispatch core crate.
//!
//! Backend endpoint paths, default configuration values and the user-facing
//! fallback messages live here so the workflows and the HTTP adapters agree.

/// Default backend base URL when none is configured.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8080/api/";

/// Default per-request timeout, in seconds, applied by the HTTP transport.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Endpoint for one-off (acute) deliveries.
pub const ONE_OFF_ENDPOINT: &str = "deliveries/one-off";

/// Endpoint for routine (recurring) deliveries.
pub const ROUTINE_ENDPOINT: &str = "deliveries/routine";

/// Endpoint prefix for deleting delivery lines.
pub const DELIVERIES_ENDPOINT: &str = "deliveries";

/// Endpoint for SMS notifications.
pub const SMS_ENDPOINT: &str = "notifications/sms";

/// Endpoint for email notifications.
pub const EMAIL_ENDPOINT: &str = "notifications/email";

/// Token whose presence in a server message marks a duplicate conflict.
pub const DUPLICATE_TOKEN: &str = "duplicate";

/// HTTP status the backend uses for duplicate conflicts.
pub const CONFLICT_STATUS: u16 = 409;

/// Placeholder for warning fields that could not be recovered.
pub const UNKNOWN_FIELD: &str = "Unknown";

/// Shown when a failure carries no server message.
pub const GENERIC_FAILURE_MESSAGE: &str = "Unable to save the delivery. Please try again.";

/// Recorded when the backend answered with JSON that is not a response envelope.
pub const UNRECOGNISED_RESPONSE_MESSAGE: &str =
    "The delivery service returned a response that could not be read.";

/// Shown when the transport itself failed.
pub const NETWORK_FAILURE_MESSAGE: &str =
    "Could not reach the delivery service. Check your connection and try again.";
