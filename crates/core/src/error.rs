use crate::notifications::Channel;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("{0} is required")]
    MissingIdentifier(&'static str),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(reqwest::Error),
    #[error("network request failed: {0}")]
    Network(reqwest::Error),
    #[error("invalid backend URL: {0}")]
    InvalidUrl(String),

    #[error("{channel} notification failed: {message}")]
    Notification { channel: Channel, message: String },

    #[error("a submission is already in progress")]
    SubmissionInProgress,
    #[error("no duplicate confirmation is pending")]
    NoPendingConfirmation,
    #[error("draft store lock poisoned")]
    StorePoisoned,
}

pub type DispatchResult<T> = std::result::Result<T, DispatchError>;
