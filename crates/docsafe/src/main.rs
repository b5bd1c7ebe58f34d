use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;

use docsafe::config::default_config_path;
use docsafe::email::IngestSettings;
use docsafe::{
    load_config, AttachmentIngestor, Config, CredentialProvider, Database, DocsafeError,
    GmailConnector, PdfNormalizer, ProgressReporter, Schema, SyncRequest, TracingProgress,
};

#[derive(Parser, Debug)]
#[command(name = "docsafe", author, version, about = "Archive mail attachments and normalize PDFs to XML")]
struct Cli {
    /// Config file (default: ~/.docsafe/config.json)
    #[arg(short, long, global = true, env = "DOCSAFE_CONFIG")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download new attachments for the configured accounts
    Sync {
        /// Ignore stored messages and look back the full configured window
        #[arg(long)]
        full: bool,

        /// First day to search (YYYY-MM-DD)
        #[arg(long, value_parser = parse_day)]
        from: Option<DateTime<Utc>>,

        /// Day to stop before (YYYY-MM-DD)
        #[arg(long, value_parser = parse_day)]
        to: Option<DateTime<Utc>>,

        /// Sync only this account
        #[arg(long)]
        account: Option<String>,
    },
    /// Convert stored PDF attachments to XML
    Normalize,
    /// Run the browser consent flow for an account and store its token
    Authorize { account: String },
}

fn parse_day(value: &str) -> Result<DateTime<Utc>, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|day| day.and_time(NaiveTime::MIN).and_utc())
        .map_err(|e| format!("expected YYYY-MM-DD: {}", e))
}

fn init_logging(json: bool) -> Result<(), DocsafeError> {
    tracing_log::LogTracer::init().map_err(|e| DocsafeError::Logging(e.to_string()))?;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(env_filter);

    let result = if json {
        tracing::subscriber::set_global_default(
            registry.with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)),
        )
    } else {
        tracing::subscriber::set_global_default(
            registry.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)),
        )
    };
    result.map_err(|e| DocsafeError::Logging(e.to_string()))
}

fn load(path: Option<PathBuf>) -> Result<Config, DocsafeError> {
    let path = match path {
        Some(path) => path,
        None => default_config_path()?,
    };
    info!("Loading config from {}", path.display());
    Ok(load_config(&path)?)
}

async fn run(cli: Cli) -> Result<(), DocsafeError> {
    let config = load(cli.config)?;
    let progress: Arc<dyn ProgressReporter> = Arc::new(TracingProgress);

    match cli.command {
        Command::Sync {
            full,
            from,
            to,
            account,
        } => {
            let accounts = config.sync_accounts(account.as_deref())?;
            let db = Database::open(&config.ingest_database_path(), Schema::Ingest)?;
            let credentials = CredentialProvider::from_config(&config)?.with_progress(progress.clone());
            let connector = Arc::new(GmailConnector::new(
                credentials,
                config.oauth.api_base_url.clone(),
            ));

            let ingestor = AttachmentIngestor::new(db, connector, IngestSettings::from_config(&config))
                .with_progress(progress);
            let report = ingestor
                .sync(&SyncRequest {
                    accounts,
                    from,
                    to,
                    full_resync: full,
                })
                .await?;

            println!(
                "Synced {} account(s): {} message(s) stored, {} already known, {} failed, {} attachment(s) saved, {} skipped",
                report.accounts,
                report.messages_stored,
                report.messages_skipped,
                report.messages_failed,
                report.attachments_stored,
                report.attachments_skipped,
            );
        }
        Command::Normalize => {
            let report = PdfNormalizer::from_config(&config)?
                .with_progress(progress)
                .run()?;
            println!(
                "Normalized {} PDF(s): {} converted, {} stored with conversion errors, {} already done",
                report.candidates, report.converted, report.failed, report.skipped,
            );
        }
        Command::Authorize { account } => {
            CredentialProvider::from_config(&config)?
                .with_progress(progress)
                .authorize(&account)
                .await?;
            println!("Authorized {}", account);
        }
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.log_json) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
