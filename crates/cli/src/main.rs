use clap::{Parser, Subcommand, ValueEnum};
use dispatch_core::config::{flag_from_env_value, timeout_from_env_value, url_from_env_value};
use dispatch_core::draft::{PharmacySelection, PharmacyType};
use dispatch_core::duplicates::{parse_warning, DuplicateDefaults};
use dispatch_core::entry::Rider;
use dispatch_core::workflows::assignment::AssignmentRequest;
use dispatch_core::workflows::split::{DisplayedLine, QuantitySplitRequest};
use dispatch_core::workflows::submission::SubmissionOutcome;
use dispatch_core::{
    DeliveryDraft, DeliveryEntry, DeliveryGateway, DispatchConfig, HttpDeliveryGateway,
    HttpNotificationSender, InMemoryDraftStore, NotificationDispatcher,
    PharmacyAssignmentWorkflow, QuantitySplitWorkflow, RefreshSignal, SubmissionWorkflow,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "dispatch")]
#[command(about = "Pharmacy delivery dispatch CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a delivery draft
    Submit {
        /// Path to the draft JSON file
        draft: PathBuf,
        /// Resubmit with duplicates confirmed if the backend reports a conflict
        #[arg(long)]
        confirm_duplicates: bool,
    },
    /// Reduce a delivery line's quantity and re-pool the difference
    Split {
        /// Path to the delivery entry JSON file
        entry: PathBuf,
        /// Quantity to keep on the original line
        requested: u32,
    },
    /// Delete one procedure/diagnosis line of a delivery
    Delete {
        entry_id: String,
        procedure_id: String,
        diagnosis_id: String,
    },
    /// Assign delivery lines to a pharmacy
    Assign {
        /// Path to a JSON array of delivery entries
        entries: PathBuf,
        pharmacy_id: String,
        pharmacy_name: String,
        #[arg(long, value_enum, default_value_t = PharmacyKind::Internal)]
        pharmacy_type: PharmacyKind,
        /// Rider id to assign alongside the pharmacy
        #[arg(long)]
        rider: Option<String>,
        /// Rider display name (defaults to the id)
        #[arg(long, requires = "rider")]
        rider_name: Option<String>,
    },
    /// Parse a duplicate warning and print the extracted fields
    ParseWarning {
        text: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PharmacyKind {
    Internal,
    External,
    ThirdPartyNetwork,
}

impl From<PharmacyKind> for PharmacyType {
    fn from(kind: PharmacyKind) -> Self {
        match kind {
            PharmacyKind::Internal => PharmacyType::Internal,
            PharmacyKind::External => PharmacyType::External,
            PharmacyKind::ThirdPartyNetwork => PharmacyType::ThirdPartyNetwork,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("dispatch_core=warn".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Submit {
            draft,
            confirm_duplicates,
        }) => {
            let draft: DeliveryDraft = read_json(&draft)?;
            let services = Services::from_env()?;
            let mut workflow = SubmissionWorkflow::new(
                services.gateway.clone(),
                services.dispatcher.clone(),
                Arc::new(InMemoryDraftStore::with_draft(draft)),
                RefreshSignal::new(),
            );

            let outcome = workflow.submit().await?;
            let outcome = match outcome {
                SubmissionOutcome::DuplicateDetected { ref warnings, .. } => {
                    for w in warnings {
                        eprintln!(
                            "Duplicate: {} ({}) for {} ({}), existing end {}, new start {}",
                            w.procedure_name,
                            w.procedure_id,
                            w.enrollee_name,
                            w.enrollee_id,
                            w.existing_end_date,
                            w.new_start_date
                        );
                    }
                    if !confirm_duplicates {
                        eprintln!("Use --confirm-duplicates to submit anyway.");
                    }
                    workflow.confirm(confirm_duplicates).await?
                }
                other => other,
            };
            print_json(&outcome)?;
        }
        Some(Commands::Split { entry, requested }) => {
            let entry: DeliveryEntry = read_json(&entry)?;
            let services = Services::from_env()?;
            let workflow = QuantitySplitWorkflow::new(services.gateway, RefreshSignal::new());

            let mut line = DisplayedLine::new(entry);
            let request = QuantitySplitRequest {
                original_entry_id: line.entry.entry_id.clone().unwrap_or_default(),
                current_quantity: line.displayed_quantity,
                requested_quantity: requested,
            };
            let outcome = workflow.split(&mut line, &request).await;
            print_json(&outcome)?;
        }
        Some(Commands::Delete {
            entry_id,
            procedure_id,
            diagnosis_id,
        }) => {
            let services = Services::from_env()?;
            let result = services
                .gateway
                .delete(&entry_id, &procedure_id, &diagnosis_id)
                .await?;
            if result.is_accepted() {
                println!("Deleted {procedure_id}/{diagnosis_id} from delivery {entry_id}");
            } else {
                anyhow::bail!(result.failure_message());
            }
        }
        Some(Commands::Assign {
            entries,
            pharmacy_id,
            pharmacy_name,
            pharmacy_type,
            rider,
            rider_name,
        }) => {
            let entries: Vec<DeliveryEntry> = read_json(&entries)?;
            let services = Services::from_env()?;
            let workflow = PharmacyAssignmentWorkflow::new(
                services.gateway,
                services.dispatcher,
                RefreshSignal::new(),
            );

            let rider = rider.map(|id| Rider {
                name: rider_name.unwrap_or_else(|| id.clone()),
                id,
                phone: None,
            });
            let report = workflow
                .assign(AssignmentRequest {
                    entries,
                    pharmacy: PharmacySelection {
                        id: pharmacy_id,
                        name: pharmacy_name,
                        pharmacy_type: pharmacy_type.into(),
                    },
                    rider,
                })
                .await;
            print_json(&report)?;
        }
        Some(Commands::ParseWarning { text }) => {
            print_json(&parse_warning(&text, &DuplicateDefaults::default()))?;
        }
        None => {
            println!("Use 'dispatch --help' for commands");
        }
    }

    Ok(())
}

/// HTTP adapters built from the environment.
struct Services {
    gateway: Arc<dyn DeliveryGateway>,
    dispatcher: NotificationDispatcher,
}

impl Services {
    fn from_env() -> anyhow::Result<Self> {
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

        let client = cfg.http_client()?;
        let sender = HttpNotificationSender::new(client.clone(), cfg.notify_url().clone());

        Ok(Self {
            gateway: Arc::new(HttpDeliveryGateway::new(client, cfg.backend_url().clone())),
            dispatcher: NotificationDispatcher::new(Arc::new(sender), cfg.notifications_enabled()),
        })
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    serde_json::from_str(&text)
        .map_err(|e| anyhow::anyhow!("failed to parse {}: {e}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
