use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::AppState;
use dispatch_core::DispatchConfig;
use dispatch_core::config::{flag_from_env_value, timeout_from_env_value, url_from_env_value};

/// Main entry point for the dispatch application
///
/// Resolves configuration once, wires the HTTP gateway and notification sender, and serves the
/// REST API (with Swagger UI) until the server stops.
///
/// # Environment Variables
/// - `DISPATCH_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `DISPATCH_BACKEND_URL`: Delivery backend base URL (default: "http://localhost:8080/api/")
/// - `DISPATCH_NOTIFY_URL`: Notification backend base URL (default: the backend URL)
/// - `DISPATCH_TIMEOUT_SECS`: Request timeout in seconds (default: 30)
/// - `DISPATCH_NOTIFICATIONS`: `false` to skip SMS and email (default: enabled)
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If configuration is invalid or the server fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("dispatch_core=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("DISPATCH_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    let backend_url = std::env::var("DISPATCH_BACKEND_URL").ok();
    let notify_url = std::env::var("DISPATCH_NOTIFY_URL")
        .ok()
        .or_else(|| backend_url.clone());

    let cfg = DispatchConfig::new(
        url_from_env_value(backend_url)?,
        url_from_env_value(notify_url)?,
        timeout_from_env_value(std::env::var("DISPATCH_TIMEOUT_SECS").ok())?,
        flag_from_env_value(std::env::var("DISPATCH_NOTIFICATIONS").ok())?,
    )?;

    tracing::info!(
        "++ Delivery backend at {} (notifications {})",
        cfg.backend_url(),
        if cfg.notifications_enabled() { "on" } else { "off" }
    );

    let state = AppState::from_config(&cfg)?;
    api_rest::serve(&rest_addr, state).await
}
