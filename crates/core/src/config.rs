//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into the gateway and
//! notification adapters. Nothing in the workflows reads environment variables while a
//! submission is running.

use crate::constants::{DEFAULT_BACKEND_URL, DEFAULT_TIMEOUT_SECS};
use crate::{DispatchError, DispatchResult};
use reqwest::Url;
use std::time::Duration;

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct DispatchConfig {
    backend_url: Url,
    notify_url: Url,
    request_timeout: Duration,
    notifications_enabled: bool,
}

impl DispatchConfig {
    /// Create a new `DispatchConfig`.
    ///
    /// Both URLs must be absolute `http`/`https` URLs. They are normalised to end in `/` so
    /// relative endpoint paths join underneath them rather than replacing the last segment.
    pub fn new(
        backend_url: Url,
        notify_url: Url,
        request_timeout: Duration,
        notifications_enabled: bool,
    ) -> DispatchResult<Self> {
        if request_timeout.is_zero() {
            return Err(DispatchError::InvalidInput(
                "request timeout must be greater than zero".into(),
            ));
        }

        Ok(Self {
            backend_url: normalise_base_url(backend_url)?,
            notify_url: normalise_base_url(notify_url)?,
            request_timeout,
            notifications_enabled,
        })
    }

    pub fn backend_url(&self) -> &Url {
        &self.backend_url
    }

    pub fn notify_url(&self) -> &Url {
        &self.notify_url
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn notifications_enabled(&self) -> bool {
        self.notifications_enabled
    }

    /// Build the shared HTTP client with the configured transport timeout.
    pub fn http_client(&self) -> DispatchResult<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.request_timeout)
            .build()
            .map_err(DispatchError::HttpClient)
    }
}

fn normalise_base_url(url: Url) -> DispatchResult<Url> {
    if !matches!(url.scheme(), "http" | "https") {
        return Err(DispatchError::InvalidUrl(format!(
            "unsupported scheme '{}' in {}",
            url.scheme(),
            url
        )));
    }
    if url.cannot_be_a_base() {
        return Err(DispatchError::InvalidUrl(url.to_string()));
    }

    if url.path().ends_with('/') {
        return Ok(url);
    }
    let path = format!("{}/", url.path());
    let mut url = url;
    url.set_path(&path);
    Ok(url)
}

/// Parse a base URL from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns the default backend URL.
pub fn url_from_env_value(value: Option<String>) -> DispatchResult<Url> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());

    Url::parse(&value).map_err(|e| DispatchError::InvalidUrl(format!("{value}: {e}")))
}

/// Parse the request timeout (whole seconds) from an optional string value.
pub fn timeout_from_env_value(value: Option<String>) -> DispatchResult<Duration> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    let secs = match value {
        Some(v) => v.parse::<u64>().map_err(|_| {
            DispatchError::InvalidInput(format!("timeout must be a whole number of seconds: {v}"))
        })?,
        None => DEFAULT_TIMEOUT_SECS,
    };

    Ok(Duration::from_secs(secs))
}

/// Parse an on/off flag. Missing values default to `true`.
pub fn flag_from_env_value(value: Option<String>) -> DispatchResult<bool> {
    let Some(value) = value.map(|v| v.trim().to_ascii_lowercase()) else {
        return Ok(true);
    };

    match value.as_str() {
        "" | "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(DispatchError::InvalidInput(format!(
            "expected a boolean flag, got '{other}'"
        ))),
    }
}
