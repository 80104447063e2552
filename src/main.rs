//! urlsentry entrypoint: classify URLs and moderate the classification history.
//! Results are printed to stdout as JSON lines; logs go to stderr.

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use urlsentry::{
    config::ServiceConfig,
    identity::{Identity, Role},
    logging::StructuredLogger,
    prediction::Predictor,
    service::{HistoryListing, HistoryService, PredictionService},
    storage::{HistoryStore, SqliteHistoryStore},
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Parser)]
#[command(name = "urlsentry", version, about = "Classify URLs and review the results")]
struct Cli {
    /// JSON configuration file
    #[arg(long, env = "URLSENTRY_CONFIG_PATH", default_value = "urlsentry.json")]
    config: PathBuf,

    /// Submitter / reviewer id
    #[arg(long, env = "URLSENTRY_USER", default_value = "local")]
    user: String,

    /// `user` or `admin`
    #[arg(long, env = "URLSENTRY_ROLE", default_value = "user")]
    role: Role,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Classify a single URL
    Predict { url: String },
    /// Classify every row of a CSV file with a `url` column
    Upload { file: PathBuf },
    /// List history records
    History {
        #[arg(value_enum)]
        view: HistoryView,
        #[command(flatten)]
        list: ListArgs,
    },
    /// Show one record
    Show { id: String },
    /// Ask for review of one of your records
    Submit { id: String },
    /// Approve a record (admin)
    Approve { id: String },
    /// Reject a record (admin)
    Reject { id: String },
    /// Delete a record (admin)
    Delete { id: String },
    /// Label totals over a date range
    Report {
        #[arg(long)]
        from: Option<DateTime<Utc>>,
        #[arg(long)]
        to: Option<DateTime<Utc>>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum HistoryView {
    Mine,
    Approved,
    All,
    Pending,
    Recent,
}

#[derive(Args)]
struct ListArgs {
    #[arg(long)]
    from: Option<DateTime<Utc>>,
    #[arg(long)]
    to: Option<DateTime<Utc>>,
    /// Benign, Defacement, Malware or Phishing
    #[arg(long)]
    classifier: Option<String>,
    /// Approved, Rejected or Pending
    #[arg(long)]
    status: Option<String>,
    #[arg(long, default_value_t = 1)]
    page: u32,
    #[arg(long, default_value_t = 10)]
    size: u32,
}

impl From<ListArgs> for HistoryListing {
    fn from(a: ListArgs) -> Self {
        Self {
            from: a.from,
            to: a.to,
            page: a.page,
            size: a.size,
            classifier: a.classifier,
            approved_status: a.status,
        }
    }
}

fn emit(value: &impl Serialize) -> Result<(), BoxError> {
    StructuredLogger::emit_json(value, &mut std::io::stdout().lock())?;
    Ok(())
}

fn prediction_service(
    config: &ServiceConfig,
    store: Arc<dyn HistoryStore>,
) -> Result<PredictionService, BoxError> {
    let predictor = Predictor::load(config).map_err(|e| {
        error!(error = %e, models = ?config.models.dir, "model artifacts unavailable");
        e
    })?;
    Ok(PredictionService::new(
        Arc::new(predictor),
        store,
        &config.upload,
    ))
}

fn main() -> Result<(), BoxError> {
    let cli = Cli::parse();
    let config = ServiceConfig::load(&cli.config);

    StructuredLogger::init(config.log.json, &config.log.level);

    info!(data_dir = ?config.data_dir, "urlsentry starting");

    std::fs::create_dir_all(&config.data_dir)?;
    let secret = std::env::var(&config.storage.secret_env)
        .map_err(|_| format!("{} is not set", config.storage.secret_env))?;
    let store: Arc<dyn HistoryStore> = Arc::new(SqliteHistoryStore::open(
        &config.store_path(),
        secret.as_bytes(),
    )?);
    let identity = Identity::new(cli.user, cli.role);

    match cli.command {
        Command::Predict { url } => {
            let record = prediction_service(&config, store)?.predict_url(&url, &identity)?;
            emit(&record)?;
        }
        Command::Upload { file } => {
            let bytes = std::fs::read(&file)?;
            let records = prediction_service(&config, store)?.predict_upload(&bytes, &identity)?;
            for record in &records {
                emit(record)?;
            }
        }
        Command::History { view, list } => {
            let history = HistoryService::new(store);
            let listing = HistoryListing::from(list);
            let page = match view {
                HistoryView::Mine => history.user_history(&identity, &listing)?,
                HistoryView::Approved => history.approved_global_history(&listing)?,
                HistoryView::All => history.all_history(&identity, &listing)?,
                HistoryView::Pending => history.pending_approvals(&identity, &listing)?,
                HistoryView::Recent => history.recent_approvals(listing.page, listing.size)?,
            };
            emit(&page)?;
        }
        Command::Show { id } => emit(&HistoryService::new(store).get(&id)?)?,
        Command::Submit { id } => {
            emit(&HistoryService::new(store).submit_for_approval(&identity, &id)?)?
        }
        Command::Approve { id } => emit(&HistoryService::new(store).approve(&identity, &id)?)?,
        Command::Reject { id } => emit(&HistoryService::new(store).reject(&identity, &id)?)?,
        Command::Delete { id } => {
            HistoryService::new(store).delete(&identity, &id)?;
            emit(&serde_json::json!({ "deleted": id }))?;
        }
        Command::Report { from, to } => {
            emit(&HistoryService::new(store).report(&identity, from, to)?)?
        }
    }

    Ok(())
}
