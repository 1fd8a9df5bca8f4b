//! Typed access to the backend's delivery endpoints.
//!
//! The backend answers every call with a loosely typed JSON envelope
//! (`status`, `result`, `ReturnMessage`, `Warnings`, `Errors`, `RequiresConfirmation`).
//! [`SubmissionResult::from_envelope`] normalises that envelope together with the HTTP status
//! so the workflows only ever branch on one shape.

use crate::constants::{
    CONFLICT_STATUS, DELIVERIES_ENDPOINT, DUPLICATE_TOKEN, GENERIC_FAILURE_MESSAGE,
    UNRECOGNISED_RESPONSE_MESSAGE,
};
use crate::payload::DeliveryPayload;
use crate::{DispatchError, DispatchResult};
use async_trait::async_trait;
use reqwest::{Client, Method, Url};
use serde_json::{Map, Value};

// ============================================================================
// Normalised result
// ============================================================================

/// Outcome of one gateway call. A new value is produced per attempt.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SubmissionResult {
    pub http_status: u16,
    pub server_status: u16,
    pub message: Option<String>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub requires_confirmation: bool,
    pub result: Option<Value>,
}

impl SubmissionResult {
    /// Normalise a response envelope received with `http_status`.
    ///
    /// The server status is taken from `result.status` when the backend nests one, then from the
    /// envelope's own `status`, and finally falls back to the HTTP status.
    pub fn from_envelope(http_status: u16, envelope: ResponseEnvelope) -> Self {
        let nested_status = envelope
            .result
            .as_ref()
            .and_then(|r| r.get("status"))
            .and_then(status_from_value);

        let server_status = nested_status.or(envelope.status).unwrap_or(http_status);

        let message = envelope
            .return_message
            .filter(|m| !m.trim().is_empty())
            .or_else(|| {
                envelope
                    .result
                    .as_ref()
                    .and_then(|r| r.get("message").or_else(|| r.get("ReturnMessage")))
                    .and_then(Value::as_str)
                    .map(str::to_owned)
            });

        Self {
            http_status,
            server_status,
            message,
            warnings: envelope.warnings.unwrap_or_default(),
            errors: envelope.errors.unwrap_or_default(),
            requires_confirmation: envelope.requires_confirmation.unwrap_or(false),
            result: envelope.result,
        }
    }

    /// Normalise a raw response body received with `http_status`.
    ///
    /// A body that is not JSON at all is kept as text. JSON that does not read as an envelope
    /// is recorded as an error, so the call is never accepted on the HTTP status alone.
    pub fn from_body(http_status: u16, body: &str) -> Self {
        let Ok(value) = serde_json::from_str::<Value>(body) else {
            return Self::from_text(http_status, body);
        };

        match ResponseEnvelope::from_value(&value) {
            Some(envelope) => Self::from_envelope(http_status, envelope),
            None => {
                tracing::warn!(http_status, "unrecognised response envelope");
                Self {
                    http_status,
                    server_status: http_status,
                    errors: vec![UNRECOGNISED_RESPONSE_MESSAGE.to_owned()],
                    result: Some(value),
                    ..Default::default()
                }
            }
        }
    }

    /// Result for a non-JSON body; the text (if any) becomes the message.
    pub fn from_text(http_status: u16, body: &str) -> Self {
        let body = body.trim();
        Self {
            http_status,
            server_status: http_status,
            message: (!body.is_empty()).then(|| body.chars().take(500).collect()),
            ..Default::default()
        }
    }

    pub fn is_http_success(&self) -> bool {
        (200..300).contains(&self.http_status)
    }

    pub fn is_server_success(&self) -> bool {
        (200..300).contains(&self.server_status)
    }

    /// `409` with a message mentioning duplicates.
    pub fn is_duplicate_conflict(&self) -> bool {
        self.server_status == CONFLICT_STATUS
            && self.message.as_deref().is_some_and(mentions_duplicate)
    }

    /// Number of earlier deliveries the backend reported for the same procedure.
    pub fn prior_delivery_count(&self) -> usize {
        self.result
            .as_ref()
            .and_then(|r| {
                r.get("PreviousDeliveries")
                    .or_else(|| r.get("previousDeliveries"))
            })
            .and_then(Value::as_array)
            .map_or(0, Vec::len)
    }

    /// Errors that are not duplicate notices.
    pub fn non_duplicate_errors(&self) -> impl Iterator<Item = &str> {
        self.errors
            .iter()
            .map(String::as_str)
            .filter(|e| !mentions_duplicate(e))
    }

    /// HTTP and server status both 2xx and no error other than a duplicate notice.
    pub fn is_accepted(&self) -> bool {
        self.is_http_success()
            && self.is_server_success()
            && self.non_duplicate_errors().next().is_none()
    }

    /// Message to show when the call was not accepted.
    ///
    /// Prefers the server's non-duplicate errors, then its message. Anything mentioning
    /// duplicates has already been shown through the confirmation prompt and is left out.
    pub fn failure_message(&self) -> String {
        let errors: Vec<&str> = self.non_duplicate_errors().collect();
        if !errors.is_empty() {
            return errors.join("; ");
        }

        self.message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty() && !mentions_duplicate(m))
            .map(str::to_owned)
            .unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_owned())
    }

    /// Id of the record the backend created or updated, when it reports one.
    pub fn entry_id(&self) -> Option<String> {
        let result = self.result.as_ref()?;
        ["EntryId", "entryId", "id", "Id"]
            .iter()
            .find_map(|key| match result.get(key)? {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
    }
}

/// Case-insensitive check for the duplicate token.
pub fn mentions_duplicate(text: &str) -> bool {
    text.to_ascii_lowercase().contains(DUPLICATE_TOKEN)
}

/// The backend's response envelope, read leniently out of a JSON body.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResponseEnvelope {
    pub status: Option<u16>,
    pub result: Option<Value>,
    pub return_message: Option<String>,
    pub warnings: Option<Vec<String>>,
    pub errors: Option<Vec<String>>,
    pub requires_confirmation: Option<bool>,
}

const STATUS_KEYS: &[&str] = &["status", "Status"];
const RESULT_KEYS: &[&str] = &["result", "Result"];
const MESSAGE_KEYS: &[&str] = &["ReturnMessage", "returnMessage"];
const WARNING_KEYS: &[&str] = &["Warnings", "warnings"];
const ERROR_KEYS: &[&str] = &["Errors", "errors"];
const CONFIRMATION_KEYS: &[&str] = &["RequiresConfirmation", "requiresConfirmation"];

impl ResponseEnvelope {
    /// Read an envelope from any JSON value.
    ///
    /// `status` may be a number or a numeric string, `Warnings` and `Errors` a single string or
    /// a list, and `RequiresConfirmation` a bool or `"true"`/`"false"`.
    ///
    /// Returns `None` when the value is not an object, has none of the envelope fields, or has
    /// one in a shape that cannot be read.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;

        let known = [
            STATUS_KEYS,
            RESULT_KEYS,
            MESSAGE_KEYS,
            WARNING_KEYS,
            ERROR_KEYS,
            CONFIRMATION_KEYS,
        ];
        if !known.iter().flat_map(|keys| keys.iter()).any(|k| object.contains_key(*k)) {
            return None;
        }

        Some(Self {
            status: read_field(object, STATUS_KEYS, status_from_value)?,
            result: read_field(object, RESULT_KEYS, |v| Some(v.clone()))?,
            return_message: read_field(object, MESSAGE_KEYS, text_from_value)?,
            warnings: read_field(object, WARNING_KEYS, texts_from_value)?,
            errors: read_field(object, ERROR_KEYS, texts_from_value)?,
            requires_confirmation: read_field(object, CONFIRMATION_KEYS, flag_from_value)?,
        })
    }
}

/// `Some(None)` when absent or null, `Some(Some(_))` when readable, `None` when malformed.
fn read_field<T>(
    object: &Map<String, Value>,
    keys: &[&str],
    read: impl Fn(&Value) -> Option<T>,
) -> Option<Option<T>> {
    match keys.iter().find_map(|k| object.get(*k)) {
        None | Some(Value::Null) => Some(None),
        Some(value) => read(value).map(Some),
    }
}

fn status_from_value(value: &Value) -> Option<u16> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|s| u16::try_from(s).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn text_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn texts_from_value(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::String(s) if s.trim().is_empty() => Some(Vec::new()),
        Value::String(s) => Some(vec![s.clone()]),
        Value::Array(items) => items
            .iter()
            .filter(|item| !item.is_null())
            .map(|item| match item {
                Value::Bool(b) => Some(b.to_string()),
                other => text_from_value(other),
            })
            .collect(),
        _ => None,
    }
}

fn flag_from_value(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) if s.trim().eq_ignore_ascii_case("true") => Some(true),
        Value::String(s) if s.trim().eq_ignore_ascii_case("false") => Some(false),
        Value::Number(n) => match n.as_u64()? {
            0 => Some(false),
            1 => Some(true),
            _ => None,
        },
        _ => None,
    }
}

// ============================================================================
// Gateway trait
// ============================================================================

/// Create/update/delete operations on delivery records.
///
/// Implementations return `Err` only for transport failures and client-side checks; every
/// response the backend actually sent, successful or not, comes back as a [`SubmissionResult`].
#[async_trait]
pub trait DeliveryGateway: Send + Sync {
    /// Create a delivery. `confirm_duplicates` is carried in the body envelope.
    async fn create(
        &self,
        payload: &DeliveryPayload,
        confirm_duplicates: bool,
    ) -> DispatchResult<SubmissionResult>;

    /// Update an existing delivery. The payload must carry an entry id.
    async fn update(&self, payload: &DeliveryPayload) -> DispatchResult<SubmissionResult>;

    /// Delete one procedure/diagnosis line of a delivery.
    async fn delete(
        &self,
        entry_id: &str,
        procedure_id: &str,
        diagnosis_id: &str,
    ) -> DispatchResult<SubmissionResult>;
}

/// Check the identifiers a delete needs, before any network call.
pub fn check_delete_identifiers(
    entry_id: &str,
    procedure_id: &str,
    diagnosis_id: &str,
) -> DispatchResult<()> {
    if entry_id.trim().is_empty() {
        return Err(DispatchError::MissingIdentifier("entry id"));
    }
    if procedure_id.trim().is_empty() {
        return Err(DispatchError::MissingIdentifier("procedure id"));
    }
    if diagnosis_id.trim().is_empty() {
        return Err(DispatchError::MissingIdentifier("diagnosis id"));
    }
    Ok(())
}

// ============================================================================
// HTTP implementation
// ============================================================================

/// [`DeliveryGateway`] over the backend's REST API.
#[derive(Clone, Debug)]
pub struct HttpDeliveryGateway {
    client: Client,
    base_url: Url,
}

impl HttpDeliveryGateway {
    /// `base_url` should end in `/`; [`crate::DispatchConfig`] guarantees this.
    pub fn new(client: Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    fn url(&self, path: &str) -> DispatchResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| DispatchError::InvalidUrl(format!("{path}: {e}")))
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<&DeliveryPayload>,
    ) -> DispatchResult<SubmissionResult> {
        tracing::debug!(%method, %url, "delivery gateway request");

        let mut request = self.client.request(method.clone(), url.clone());
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            tracing::warn!(%method, %url, error = %e, "delivery gateway request failed");
            DispatchError::Network(e)
        })?;

        let http_status = response.status().as_u16();
        let text = response.text().await.map_err(DispatchError::Network)?;

        let result = SubmissionResult::from_body(http_status, &text);

        tracing::debug!(
            http_status = result.http_status,
            server_status = result.server_status,
            warnings = result.warnings.len(),
            errors = result.errors.len(),
            "delivery gateway response"
        );

        Ok(result)
    }
}

#[async_trait]
impl DeliveryGateway for HttpDeliveryGateway {
    async fn create(
        &self,
        payload: &DeliveryPayload,
        confirm_duplicates: bool,
    ) -> DispatchResult<SubmissionResult> {
        let url = self.url(payload.endpoint())?;
        let body = payload.with_confirmation(confirm_duplicates);
        self.send(Method::POST, url, Some(&body)).await
    }

    async fn update(&self, payload: &DeliveryPayload) -> DispatchResult<SubmissionResult> {
        let entry_id = payload
            .entry_id()
            .filter(|id| !id.trim().is_empty())
            .ok_or(DispatchError::MissingIdentifier("entry id"))?;

        let url = self.url(&format!("{}/{}", payload.endpoint(), entry_id))?;
        self.send(Method::PUT, url, Some(payload)).await
    }

    async fn delete(
        &self,
        entry_id: &str,
        procedure_id: &str,
        diagnosis_id: &str,
    ) -> DispatchResult<SubmissionResult> {
        check_delete_identifiers(entry_id, procedure_id, diagnosis_id)?;

        let mut url = self.url(&format!("{DELIVERIES_ENDPOINT}/{}", entry_id.trim()))?;
        url.query_pairs_mut()
            .append_pair("procedureId", procedure_id.trim())
            .append_pair("diagnosisId", diagnosis_id.trim());

        self.send(Method::DELETE, url, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::Cadence;
    use crate::test_support::{sample_draft, sample_entry};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn envelope(value: Value) -> ResponseEnvelope {
        ResponseEnvelope::from_value(&value).unwrap()
    }

    fn gateway(server: &MockServer) -> HttpDeliveryGateway {
        let base = Url::parse(&format!("{}/api/", server.uri())).unwrap();
        HttpDeliveryGateway::new(Client::new(), base)
    }

    #[test]
    fn test_envelope_nested_status_wins() {
        let result =
            SubmissionResult::from_envelope(200, envelope(json!({"status": 200, "result": {"status": 500}})));
        assert_eq!(result.server_status, 500);
        assert!(!result.is_server_success());
    }

    #[test]
    fn test_envelope_duplicate_conflict() {
        let result = SubmissionResult::from_envelope(
            200,
            envelope(json!({"status": 409, "ReturnMessage": "Duplicate entry found"})),
        );
        assert!(result.is_duplicate_conflict());
        assert_eq!(result.message.as_deref(), Some("Duplicate entry found"));
    }

    #[test]
    fn test_envelope_camel_case_aliases() {
        let result = SubmissionResult::from_envelope(
            200,
            envelope(json!({
                "status": 200,
                "warnings": ["w1"],
                "errors": ["e1"],
                "requiresConfirmation": true
            })),
        );
        assert_eq!(result.warnings, vec!["w1".to_string()]);
        assert_eq!(result.errors, vec!["e1".to_string()]);
        assert!(result.requires_confirmation);
    }

    #[test]
    fn test_prior_deliveries_and_entry_id() {
        let result = SubmissionResult::from_envelope(
            200,
            envelope(json!({"status": 200, "result": {"EntryId": 88, "PreviousDeliveries": [{}, {}]}})),
        );
        assert_eq!(result.prior_delivery_count(), 2);
        assert_eq!(result.entry_id().as_deref(), Some("88"));
    }

    #[test]
    fn test_non_duplicate_errors_filters_duplicates() {
        let result = SubmissionResult {
            errors: vec!["DUPLICATE procedure".into(), "Scheme expired".into()],
            ..Default::default()
        };
        let errors: Vec<&str> = result.non_duplicate_errors().collect();
        assert_eq!(errors, vec!["Scheme expired"]);
    }

    #[test]
    fn test_failure_message_suppresses_duplicates() {
        let result = SubmissionResult {
            http_status: 409,
            server_status: 409,
            message: Some("Duplicate entry found".into()),
            errors: vec!["duplicate procedure".into()],
            ..Default::default()
        };
        assert_eq!(result.failure_message(), GENERIC_FAILURE_MESSAGE);

        let result = SubmissionResult {
            http_status: 200,
            server_status: 200,
            message: Some("Saved with errors".into()),
            errors: vec!["Scheme expired".into(), "Duplicate procedure".into()],
            ..Default::default()
        };
        assert!(!result.is_accepted());
        assert_eq!(result.failure_message(), "Scheme expired");
    }

    #[test]
    fn test_accepted_ignores_duplicate_errors() {
        let result = SubmissionResult {
            http_status: 200,
            server_status: 200,
            errors: vec!["Duplicate procedure overridden".into()],
            ..Default::default()
        };
        assert!(result.is_accepted());
    }

    #[test]
    fn test_from_text_keeps_body_as_message() {
        let result = SubmissionResult::from_text(502, "Bad Gateway");
        assert_eq!(result.server_status, 502);
        assert_eq!(result.message.as_deref(), Some("Bad Gateway"));
    }

    #[test]
    fn test_envelope_reads_loose_field_shapes() {
        let result = SubmissionResult::from_envelope(
            200,
            envelope(json!({
                "status": "409",
                "ReturnMessage": "duplicate entry found",
                "Warnings": "Procedure already delivered",
                "RequiresConfirmation": "true",
                "result": {"status": "409"}
            })),
        );
        assert_eq!(result.server_status, 409);
        assert!(result.is_duplicate_conflict());
        assert_eq!(result.warnings, vec!["Procedure already delivered".to_string()]);
        assert!(result.requires_confirmation);
    }

    #[test]
    fn test_envelope_rejects_unreadable_shapes() {
        assert!(ResponseEnvelope::from_value(&json!([1, 2])).is_none());
        assert!(ResponseEnvelope::from_value(&json!({"ok": true})).is_none());
        assert!(ResponseEnvelope::from_value(&json!({"status": 200, "Errors": {"code": 1}})).is_none());
        assert!(ResponseEnvelope::from_value(&json!({"status": "two hundred"})).is_none());
        assert!(ResponseEnvelope::from_value(&json!({"status": 200, "Errors": null})).is_some());
    }

    #[test]
    fn test_from_body_never_accepts_unrecognised_json() {
        let result = SubmissionResult::from_body(200, r#"{"ok": true}"#);
        assert!(!result.is_accepted());
        assert_eq!(result.failure_message(), UNRECOGNISED_RESPONSE_MESSAGE);

        let result = SubmissionResult::from_body(200, "Saved");
        assert!(result.is_accepted());
        assert_eq!(result.message.as_deref(), Some("Saved"));
    }

    #[test]
    fn test_check_delete_identifiers() {
        assert!(check_delete_identifiers("E1", "P1", "D1").is_ok());
        assert!(matches!(
            check_delete_identifiers("E1", " ", "D1"),
            Err(DispatchError::MissingIdentifier("procedure id"))
        ));
    }

    #[tokio::test]
    async fn test_create_posts_to_cadence_endpoint_with_flag() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/deliveries/routine"))
            .and(body_partial_json(json!({"ConfirmDuplicates": true, "EnrolleeId": "ENR-1001"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": 200, "result": {"status": 200}})))
            .expect(1)
            .mount(&server)
            .await;

        let payload = DeliveryPayload::from_draft(&sample_draft(Cadence::Routine)).unwrap();
        let result = gateway(&server).create(&payload, true).await.unwrap();

        assert_eq!(result.http_status, 200);
        assert!(result.is_server_success());
    }

    #[tokio::test]
    async fn test_update_puts_to_entry_path() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/deliveries/one-off/DEL-501"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": 200})))
            .expect(1)
            .mount(&server)
            .await;

        let payload = DeliveryPayload::from_entry(&sample_entry()).unwrap();
        let result = gateway(&server).update(&payload).await.unwrap();
        assert!(result.is_server_success());
    }

    #[tokio::test]
    async fn test_update_without_entry_id_makes_no_call() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let payload = DeliveryPayload::from_draft(&sample_draft(Cadence::OneOff)).unwrap();
        let result = gateway(&server).update(&payload).await;
        assert!(matches!(result, Err(DispatchError::MissingIdentifier(_))));
    }

    #[tokio::test]
    async fn test_delete_sends_all_identifiers() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/deliveries/DEL-501"))
            .and(query_param("procedureId", "PROC-7"))
            .and(query_param("diagnosisId", "DX-42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": 200})))
            .expect(1)
            .mount(&server)
            .await;

        let result = gateway(&server)
            .delete("DEL-501", "PROC-7", "DX-42")
            .await
            .unwrap();
        assert!(result.is_server_success());
    }

    #[tokio::test]
    async fn test_delete_missing_identifier_makes_no_call() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let result = gateway(&server).delete("DEL-501", "PROC-7", "").await;
        assert!(matches!(
            result,
            Err(DispatchError::MissingIdentifier("diagnosis id"))
        ));
    }

    #[tokio::test]
    async fn test_non_json_error_body_is_normalised() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
            .mount(&server)
            .await;

        let payload = DeliveryPayload::from_draft(&sample_draft(Cadence::OneOff)).unwrap();
        let result = gateway(&server).create(&payload, false).await.unwrap();

        assert_eq!(result.http_status, 503);
        assert!(!result.is_http_success());
        assert_eq!(result.message.as_deref(), Some("Service Unavailable"));
    }

    async fn create_against(server: &MockServer, status: u16, body: Value) -> SubmissionResult {
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(server)
            .await;

        let payload = DeliveryPayload::from_draft(&sample_draft(Cadence::OneOff)).unwrap();
        gateway(server).create(&payload, false).await.unwrap()
    }

    #[tokio::test]
    async fn test_string_conflict_status_is_a_duplicate() {
        let server = MockServer::start().await;
        let result = create_against(
            &server,
            200,
            json!({
                "status": "409",
                "ReturnMessage": "duplicate entry found",
                "Errors": ["duplicate entry found"]
            }),
        )
        .await;

        assert_eq!(result.server_status, 409);
        assert!(result.is_duplicate_conflict());
        assert!(!result.is_accepted());
    }

    #[tokio::test]
    async fn test_single_string_errors_fail_the_call() {
        let server = MockServer::start().await;
        let result =
            create_against(&server, 200, json!({"status": 200, "Errors": "Scheme has expired"})).await;

        assert_eq!(result.errors, vec!["Scheme has expired".to_string()]);
        assert!(!result.is_accepted());
        assert_eq!(result.failure_message(), "Scheme has expired");
    }

    #[tokio::test]
    async fn test_string_confirmation_flag_is_read() {
        let server = MockServer::start().await;
        let result = create_against(
            &server,
            200,
            json!({"status": 200, "RequiresConfirmation": "true", "Warnings": ["Delivered last week"]}),
        )
        .await;

        assert!(result.requires_confirmation);
        assert_eq!(result.warnings.len(), 1);
    }

    #[tokio::test]
    async fn test_unrecognised_json_body_is_not_accepted() {
        let server = MockServer::start().await;
        let result = create_against(&server, 200, json!({"Errors": {"code": 17}})).await;

        assert_eq!(result.http_status, 200);
        assert!(!result.is_accepted());
        assert_eq!(result.failure_message(), UNRECOGNISED_RESPONSE_MESSAGE);
    }
}
