//! SMS and email notifications sent after deliveries are committed.
//!
//! Every job is independent. The dispatcher starts all jobs together and waits for each to
//! settle; a failed (or panicking) channel becomes a warning in the [`DispatchReport`] and never
//! affects the other channel or the delivery that triggered it.

use crate::constants::{EMAIL_ENDPOINT, SMS_ENDPOINT};
use crate::draft::{Attachment, DeliveryDraft, PharmacySelection};
use crate::entry::DeliveryEntry;
use crate::gateway::SubmissionResult;
use crate::{DispatchError, DispatchResult};
use async_trait::async_trait;
use futures::future::join_all;
use futures::FutureExt;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
pub enum Channel {
    Sms,
    Email,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Sms => write!(f, "SMS"),
            Channel::Email => write!(f, "email"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub subject: Option<String>,
    pub body: String,
}

/// One message on one channel, possibly to several recipients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationJob {
    pub channel: Channel,
    pub recipients: Vec<String>,
    pub payload: NotificationPayload,
    pub attachment: Option<Attachment>,
}

impl NotificationJob {
    pub fn sms(recipients: Vec<String>, body: impl Into<String>) -> Self {
        Self {
            channel: Channel::Sms,
            recipients,
            payload: NotificationPayload {
                subject: None,
                body: body.into(),
            },
            attachment: None,
        }
    }

    pub fn email(
        recipients: Vec<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
        attachment: Option<Attachment>,
    ) -> Self {
        Self {
            channel: Channel::Email,
            recipients,
            payload: NotificationPayload {
                subject: Some(subject.into()),
                body: body.into(),
            },
            attachment,
        }
    }
}

fn contact(value: Option<&String>) -> Vec<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(|v| vec![v.to_owned()])
        .unwrap_or_default()
}

/// The SMS and email jobs for a single committed delivery.
pub fn commit_jobs(draft: &DeliveryDraft) -> Vec<NotificationJob> {
    let name = draft.enrollee.name.trim();
    let items = draft.procedure_summary();
    let when = draft
        .start_date
        .map(|d| format!(" starting {}", d.format("%d %b %Y")))
        .unwrap_or_default();
    let pharmacy = draft
        .pharmacy
        .as_ref()
        .map(|p| format!(" via {}", p.name))
        .unwrap_or_default();

    let sms_body = format!("Dear {name}, your medication delivery ({items}) has been scheduled{when}{pharmacy}.");
    let email_body = format!(
        "Dear {name},\n\nYour medication delivery has been scheduled{when}{pharmacy}.\n\nItems: {items}\n\n{}",
        draft.comment.trim()
    );

    vec![
        NotificationJob::sms(contact(draft.enrollee.phone.as_ref()), sms_body),
        NotificationJob::email(
            contact(draft.enrollee.email.as_ref()),
            "Your medication delivery",
            email_body.trim_end().to_owned(),
            draft.attachment.clone(),
        ),
    ]
}

/// One SMS and one email covering a whole assignment batch.
///
/// Recipients are de-duplicated and sorted; every enrollee receives the same combined message.
pub fn batch_jobs(entries: &[DeliveryEntry], pharmacy: &PharmacySelection) -> Vec<NotificationJob> {
    let phones: BTreeSet<String> = entries
        .iter()
        .flat_map(|e| contact(e.enrollee.phone.as_ref()))
        .collect();
    let emails: BTreeSet<String> = entries
        .iter()
        .flat_map(|e| contact(e.enrollee.email.as_ref()))
        .collect();

    let body = format!(
        "Your medication delivery has been assigned to {}. You will be contacted with pickup details.",
        pharmacy.name
    );

    vec![
        NotificationJob::sms(phones.into_iter().collect(), body.clone()),
        NotificationJob::email(
            emails.into_iter().collect(),
            format!("Delivery assigned to {}", pharmacy.name),
            body,
            None,
        ),
    ]
}

// ============================================================================
// Sender
// ============================================================================

/// Transport for notification jobs.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send_sms(&self, job: &NotificationJob) -> DispatchResult<()>;

    /// Sends the job's attachment along with the message when present.
    async fn send_email(&self, job: &NotificationJob) -> DispatchResult<()>;
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct SmsRequest<'a> {
    recipients: String,
    message: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct EmailRequest<'a> {
    recipients: String,
    subject: &'a str,
    body: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    attachment: Option<EmailAttachment<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct EmailAttachment<'a> {
    file_name: &'a str,
    content_type: &'a str,
    base64_content: &'a str,
}

/// [`NotificationSender`] over the notification backend's REST API.
#[derive(Clone, Debug)]
pub struct HttpNotificationSender {
    client: Client,
    base_url: Url,
}

impl HttpNotificationSender {
    pub fn new(client: Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        channel: Channel,
        path: &str,
        body: &T,
    ) -> DispatchResult<()> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| DispatchError::InvalidUrl(format!("{path}: {e}")))?;

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(DispatchError::Network)?;

        let http_status = response.status().as_u16();
        let text = response.text().await.map_err(DispatchError::Network)?;
        let result = SubmissionResult::from_body(http_status, &text);

        if result.is_accepted() {
            return Ok(());
        }

        let error = result.non_duplicate_errors().next().map(str::to_owned);
        Err(DispatchError::Notification {
            channel,
            message: error
                .or(result.message)
                .unwrap_or_else(|| format!("status {}", result.server_status)),
        })
    }
}

#[async_trait]
impl NotificationSender for HttpNotificationSender {
    async fn send_sms(&self, job: &NotificationJob) -> DispatchResult<()> {
        let request = SmsRequest {
            recipients: job.recipients.join(","),
            message: &job.payload.body,
        };
        self.post(Channel::Sms, SMS_ENDPOINT, &request).await
    }

    async fn send_email(&self, job: &NotificationJob) -> DispatchResult<()> {
        let request = EmailRequest {
            recipients: job.recipients.join(","),
            subject: job.payload.subject.as_deref().unwrap_or_default(),
            body: &job.payload.body,
            attachment: job.attachment.as_ref().map(|a| EmailAttachment {
                file_name: &a.file_name,
                content_type: &a.content_type,
                base64_content: &a.base64_content,
            }),
        };
        self.post(Channel::Email, EMAIL_ENDPOINT, &request).await
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ChannelOutcome {
    Sent,
    Failed { message: String },
    Skipped { reason: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ChannelReport {
    pub channel: Channel,
    pub recipients: usize,
    pub outcome: ChannelOutcome,
}

/// A non-fatal notification failure attached to an otherwise successful operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct NotificationWarning {
    pub channel: Channel,
    pub message: String,
}

/// Settled outcome of every job in one dispatch.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DispatchReport {
    pub channels: Vec<ChannelReport>,
}

impl DispatchReport {
    pub fn outcome(&self, channel: Channel) -> Option<&ChannelOutcome> {
        self.channels
            .iter()
            .find(|c| c.channel == channel)
            .map(|c| &c.outcome)
    }

    pub fn warnings(&self) -> Vec<NotificationWarning> {
        self.channels
            .iter()
            .filter_map(|c| match &c.outcome {
                ChannelOutcome::Failed { message } => Some(NotificationWarning {
                    channel: c.channel,
                    message: message.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    pub fn has_failures(&self) -> bool {
        self.channels
            .iter()
            .any(|c| matches!(c.outcome, ChannelOutcome::Failed { .. }))
    }
}

/// Runs notification jobs with settle-all semantics.
#[derive(Clone)]
pub struct NotificationDispatcher {
    sender: Arc<dyn NotificationSender>,
    enabled: bool,
}

impl NotificationDispatcher {
    pub fn new(sender: Arc<dyn NotificationSender>, enabled: bool) -> Self {
        Self { sender, enabled }
    }

    /// Send every job concurrently and report each one separately.
    ///
    /// Jobs without recipients, or all jobs when notifications are disabled, are reported as
    /// skipped without touching the sender.
    pub async fn dispatch(&self, jobs: Vec<NotificationJob>) -> DispatchReport {
        let runs = jobs.into_iter().map(|job| self.run(job));
        DispatchReport {
            channels: join_all(runs).await,
        }
    }

    async fn run(&self, job: NotificationJob) -> ChannelReport {
        let recipients = job.recipients.len();
        let skipped = |reason: &str| ChannelReport {
            channel: job.channel,
            recipients,
            outcome: ChannelOutcome::Skipped {
                reason: reason.into(),
            },
        };

        if !self.enabled {
            return skipped("notifications are disabled");
        }
        if recipients == 0 {
            return skipped("no recipient on file");
        }

        let send = async {
            match job.channel {
                Channel::Sms => self.sender.send_sms(&job).await,
                Channel::Email => self.sender.send_email(&job).await,
            }
        };

        let outcome = match AssertUnwindSafe(send).catch_unwind().await {
            Ok(Ok(())) => {
                tracing::info!(channel = %job.channel, recipients, "notification sent");
                ChannelOutcome::Sent
            }
            Ok(Err(e)) => {
                tracing::warn!(channel = %job.channel, error = %e, "notification failed");
                ChannelOutcome::Failed {
                    message: e.to_string(),
                }
            }
            Err(_) => {
                tracing::warn!(channel = %job.channel, "notification sender panicked");
                ChannelOutcome::Failed {
                    message: format!("{} sender crashed", job.channel),
                }
            }
        };

        ChannelReport {
            channel: job.channel,
            recipients,
            outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::{Cadence, PharmacyType};
    use crate::test_support::{sample_draft, sample_entry, FakeSender};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn dispatcher(sender: &Arc<FakeSender>) -> NotificationDispatcher {
        NotificationDispatcher::new(sender.clone(), true)
    }

    #[tokio::test]
    async fn test_both_channels_sent() {
        let sender = Arc::new(FakeSender::default());
        let report = dispatcher(&sender)
            .dispatch(commit_jobs(&sample_draft(Cadence::OneOff)))
            .await;

        assert_eq!(report.outcome(Channel::Sms), Some(&ChannelOutcome::Sent));
        assert_eq!(report.outcome(Channel::Email), Some(&ChannelOutcome::Sent));
        assert!(report.warnings().is_empty());
        assert_eq!(sender.sent(Channel::Sms).len(), 1);
        assert_eq!(sender.sent(Channel::Email).len(), 1);
    }

    #[tokio::test]
    async fn test_sms_failure_does_not_stop_email() {
        let sender = Arc::new(FakeSender::failing(Channel::Sms));
        let report = dispatcher(&sender)
            .dispatch(commit_jobs(&sample_draft(Cadence::OneOff)))
            .await;

        assert!(matches!(
            report.outcome(Channel::Sms),
            Some(ChannelOutcome::Failed { .. })
        ));
        assert_eq!(report.outcome(Channel::Email), Some(&ChannelOutcome::Sent));
        assert_eq!(sender.sent(Channel::Email).len(), 1);

        let warnings = report.warnings();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].channel, Channel::Sms);
    }

    #[tokio::test]
    async fn test_panicking_sender_is_reported_as_failure() {
        let sender = Arc::new(FakeSender::panicking(Channel::Email));
        let report = dispatcher(&sender)
            .dispatch(commit_jobs(&sample_draft(Cadence::OneOff)))
            .await;

        assert_eq!(report.outcome(Channel::Sms), Some(&ChannelOutcome::Sent));
        assert!(matches!(
            report.outcome(Channel::Email),
            Some(ChannelOutcome::Failed { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_recipient_is_skipped() {
        let sender = Arc::new(FakeSender::default());
        let mut draft = sample_draft(Cadence::OneOff);
        draft.enrollee.email = Some("  ".into());

        let report = dispatcher(&sender).dispatch(commit_jobs(&draft)).await;

        assert!(matches!(
            report.outcome(Channel::Email),
            Some(ChannelOutcome::Skipped { .. })
        ));
        assert!(sender.sent(Channel::Email).is_empty());
        assert!(!report.has_failures());
    }

    #[tokio::test]
    async fn test_disabled_dispatcher_skips_everything() {
        let sender = Arc::new(FakeSender::default());
        let report = NotificationDispatcher::new(sender.clone(), false)
            .dispatch(commit_jobs(&sample_draft(Cadence::OneOff)))
            .await;

        assert!(report
            .channels
            .iter()
            .all(|c| matches!(c.outcome, ChannelOutcome::Skipped { .. })));
        assert!(sender.sent(Channel::Sms).is_empty());
    }

    #[test]
    fn test_commit_jobs_carry_attachment_on_email_only() {
        let mut draft = sample_draft(Cadence::OneOff);
        draft.attachment = Some(Attachment {
            file_name: "rx.pdf".into(),
            content_type: "application/pdf".into(),
            base64_content: "JVBERi0=".into(),
        });

        let jobs = commit_jobs(&draft);
        assert_eq!(jobs[0].channel, Channel::Sms);
        assert!(jobs[0].attachment.is_none());
        assert_eq!(jobs[1].channel, Channel::Email);
        assert_eq!(jobs[1].attachment, draft.attachment);
        assert!(jobs[0].payload.body.contains("Metformin 500mg x2"));
    }

    #[test]
    fn test_batch_jobs_aggregate_recipients() {
        let first = sample_entry();
        let mut second = sample_entry();
        second.enrollee.phone = Some("+2348000000002".into());
        second.enrollee.email = Some("bo@example.org".into());
        let third = sample_entry();

        let pharmacy = PharmacySelection {
            id: "PH-9".into(),
            name: "Harbour Pharmacy".into(),
            pharmacy_type: PharmacyType::External,
        };

        let jobs = batch_jobs(&[first, second, third], &pharmacy);

        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].recipients.len(), 2);
        assert_eq!(jobs[1].recipients.len(), 2);
        assert!(jobs[0].payload.body.contains("Harbour Pharmacy"));
    }

    #[tokio::test]
    async fn test_http_sender_posts_sms() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/notify/notifications/sms"))
            .and(body_partial_json(json!({"Recipients": "+2348000000001,+2348000000002"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": 200})))
            .expect(1)
            .mount(&server)
            .await;

        let sender = HttpNotificationSender::new(
            Client::new(),
            Url::parse(&format!("{}/notify/", server.uri())).unwrap(),
        );
        let job = NotificationJob::sms(
            vec!["+2348000000001".into(), "+2348000000002".into()],
            "hello",
        );

        sender.send_sms(&job).await.unwrap();
    }

    #[tokio::test]
    async fn test_http_sender_reports_server_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/notify/notifications/email"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"status": 500, "ReturnMessage": "mailbox unavailable"})),
            )
            .mount(&server)
            .await;

        let sender = HttpNotificationSender::new(
            Client::new(),
            Url::parse(&format!("{}/notify/", server.uri())).unwrap(),
        );
        let job = NotificationJob::email(vec!["a@example.org".into()], "s", "b", None);

        let err = sender.send_email(&job).await.unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Notification { channel: Channel::Email, ref message } if message == "mailbox unavailable"
        ));
    }

    #[tokio::test]
    async fn test_http_sender_reads_string_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/notify/notifications/sms"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"status": "200", "Errors": "Invalid phone number"})),
            )
            .mount(&server)
            .await;

        let sender = HttpNotificationSender::new(
            Client::new(),
            Url::parse(&format!("{}/notify/", server.uri())).unwrap(),
        );
        let job = NotificationJob::sms(vec!["+2348000000001".into()], "hello");

        let err = sender.send_sms(&job).await.unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Notification { channel: Channel::Sms, ref message } if message == "Invalid phone number"
        ));
    }
}
