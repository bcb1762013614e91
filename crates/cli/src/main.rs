//! OdooFlow CLI - Operator tools for the Odoo sync core.
//!
//! # Usage
//!
//! ```bash
//! # Inspect the configured instance
//! odooflow version
//! odooflow databases
//! odooflow modules
//!
//! # Export every order of a store snapshot
//! odooflow sync orders --store store.yaml
//!
//! # Export two products, sending only the price
//! odooflow sync products --store store.yaml --ids 10,11 --fields list_price
//!
//! # Import the active catalog
//! odooflow import products --store store.yaml
//! ```
//!
//! # Environment Variables
//!
//! Connection settings are read by `OdooConfig::from_env` (`ODOO_URL`,
//! `ODOO_USERNAME`, `ODOO_API_KEY`, `ODOO_DATABASE`, ...). In addition:
//!
//! - `RUST_LOG` - Log filter (default: `odooflow_sync=info,odooflow_cli=info`)
//! - `ODOOFLOW_LOG_JSON` - Emit logs as JSON lines when set
//! - `SENTRY_DSN` - Report warnings and errors to Sentry when set
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use odooflow_core::EntityKind;

mod commands;

#[derive(Parser)]
#[command(name = "odooflow")]
#[command(author, version, about = "WooCommerce to Odoo sync tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the Odoo server version
    Version,
    /// List the databases of the configured instance
    Databases,
    /// List installed Odoo modules
    Modules,
    /// Export local records to Odoo
    Sync {
        #[command(subcommand)]
        target: SyncTarget,
    },
    /// Import Odoo records into the local store
    Import {
        #[command(subcommand)]
        target: ImportTarget,
    },
}

#[derive(Subcommand)]
enum SyncTarget {
    /// Export orders as sale orders
    Orders(BatchArgs),
    /// Export customers as partners
    Customers(BatchArgs),
    /// Export products as product templates
    Products(BatchArgs),
}

#[derive(Subcommand)]
enum ImportTarget {
    /// Import product templates
    Products(BatchArgs),
    /// Import customer partners
    Customers(BatchArgs),
}

/// Arguments shared by every batch command.
#[derive(Args)]
struct BatchArgs {
    /// Store snapshot (`.yaml`, `.yml` or `.json`), written back afterwards
    #[arg(short, long)]
    store: PathBuf,

    /// Record ids (local for sync, Odoo for import); all records when omitted
    #[arg(short, long, value_delimiter = ',')]
    ids: Vec<i64>,

    /// Optional Odoo fields to send or read; all when omitted
    #[arg(short, long, value_delimiter = ',')]
    fields: Vec<String>,
}

impl From<BatchArgs> for commands::batch::Batch {
    fn from(args: BatchArgs) -> Self {
        Self {
            store: args.store,
            ids: args.ids,
            fields: args.fields,
        }
    }
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry() -> Option<sentry::ClientInitGuard> {
    let dsn = std::env::var("SENTRY_DSN").ok().filter(|v| !v.is_empty())?;

    let guard = sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: std::env::var("SENTRY_ENVIRONMENT")
                .ok()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "odooflow_sync=info,odooflow_cli=info".into());

    let json = std::env::var("ODOOFLOW_LOG_JSON").is_ok();
    // Logs go to stderr; stdout carries the JSON result.
    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_writer(std::io::stderr)
    });
    let text_layer = (!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() {
    // Load .env before Sentry reads its DSN
    let _ = dotenvy::dotenv();

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry();
    init_tracing();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CliError> {
    match cli.command {
        Commands::Version => commands::discover::version().await?,
        Commands::Databases => commands::discover::databases().await?,
        Commands::Modules => commands::discover::modules().await?,
        Commands::Sync { target } => match target {
            SyncTarget::Orders(args) => commands::batch::export(EntityKind::Order, args.into()).await?,
            SyncTarget::Customers(args) => {
                commands::batch::export(EntityKind::Customer, args.into()).await?;
            }
            SyncTarget::Products(args) => {
                commands::batch::export(EntityKind::Product, args.into()).await?;
            }
        },
        Commands::Import { target } => match target {
            ImportTarget::Products(args) => {
                commands::batch::import(EntityKind::Product, args.into()).await?;
            }
            ImportTarget::Customers(args) => {
                commands::batch::import(EntityKind::Customer, args.into()).await?;
            }
        },
    }
    Ok(())
}
