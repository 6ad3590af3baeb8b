//! Lotcast: scheduled social posting for dealer networks
//!
//! Main binary with subcommands:
//! - `serve`: HTTP API server (post operations, reminder trigger endpoint)
//! - `remind`: One reminder pass, for invocation from cron
//! - `bootstrap`: Seed territories, profiles, and groups from a JSON file

use std::sync::Arc;

use clap::{Parser, Subcommand};
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lotcast_db::Store;
use lotcast_dispatch::{GenerationClient, MailClient};
use lotcast_scheduler::{ReminderConfig, ReminderScheduler};
use lotcast_web::{AppState, create_router};

mod bootstrap;

#[derive(Parser)]
#[command(name = "lotcast")]
#[command(about = "Scheduled social posting for dealer networks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API server
    Serve {
        /// SQLite database path
        #[arg(long, env = "LOTCAST_DB_PATH", default_value = "lotcast.db")]
        db_path: String,

        /// API server port
        #[arg(long, default_value = "8080")]
        port: u16,

        /// Bearer token the external timer presents to the reminder
        /// trigger endpoint. The endpoint answers 500 until this is set.
        #[arg(long, env = "LOTCAST_TRIGGER_TOKEN")]
        trigger_token: Option<String>,

        /// Content-generation service URL
        #[arg(long, env = "LOTCAST_GENERATION_URL")]
        generation_url: String,

        /// Content-generation API key
        #[arg(long, env = "LOTCAST_GENERATION_API_KEY")]
        generation_api_key: String,

        /// Mail transport URL
        #[arg(long, env = "LOTCAST_MAIL_URL")]
        mail_url: String,

        /// Mail transport API key
        #[arg(long, env = "LOTCAST_MAIL_API_KEY")]
        mail_api_key: String,

        /// Sender address for reminder emails
        #[arg(long, env = "LOTCAST_MAIL_FROM")]
        mail_from: String,

        /// How many minutes before the scheduled time a reminder fires
        #[arg(long, default_value = "120")]
        lead_time_minutes: i64,

        /// Skip posts overdue by more than this many minutes, leaving
        /// them for manual handling. Unset means no cutoff.
        #[arg(long)]
        stale_after_minutes: Option<i64>,
    },

    /// Run one reminder pass and exit (for cron)
    Remind {
        /// SQLite database path
        #[arg(long, env = "LOTCAST_DB_PATH", default_value = "lotcast.db")]
        db_path: String,

        /// Content-generation service URL
        #[arg(long, env = "LOTCAST_GENERATION_URL")]
        generation_url: String,

        /// Content-generation API key
        #[arg(long, env = "LOTCAST_GENERATION_API_KEY")]
        generation_api_key: String,

        /// Mail transport URL
        #[arg(long, env = "LOTCAST_MAIL_URL")]
        mail_url: String,

        /// Mail transport API key
        #[arg(long, env = "LOTCAST_MAIL_API_KEY")]
        mail_api_key: String,

        /// Sender address for reminder emails
        #[arg(long, env = "LOTCAST_MAIL_FROM")]
        mail_from: String,

        /// How many minutes before the scheduled time a reminder fires
        #[arg(long, default_value = "120")]
        lead_time_minutes: i64,

        /// Skip posts overdue by more than this many minutes, leaving
        /// them for manual handling. Unset means no cutoff.
        #[arg(long)]
        stale_after_minutes: Option<i64>,
    },

    /// Seed territories, profiles, and groups from a JSON file
    Bootstrap {
        /// SQLite database path
        #[arg(long, env = "LOTCAST_DB_PATH", default_value = "lotcast.db")]
        db_path: String,

        /// Path to the seed JSON file
        #[arg(value_name = "SEED_FILE")]
        seed_file: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "lotcast=info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            db_path,
            port,
            trigger_token,
            generation_url,
            generation_api_key,
            mail_url,
            mail_api_key,
            mail_from,
            lead_time_minutes,
            stale_after_minutes,
        } => {
            run_serve(
                &db_path,
                port,
                trigger_token,
                &generation_url,
                &generation_api_key,
                &mail_url,
                &mail_api_key,
                &mail_from,
                lead_time_minutes,
                stale_after_minutes,
            )
            .await
        }

        Commands::Remind {
            db_path,
            generation_url,
            generation_api_key,
            mail_url,
            mail_api_key,
            mail_from,
            lead_time_minutes,
            stale_after_minutes,
        } => {
            run_remind(
                &db_path,
                &generation_url,
                &generation_api_key,
                &mail_url,
                &mail_api_key,
                &mail_from,
                lead_time_minutes,
                stale_after_minutes,
            )
            .await
        }

        Commands::Bootstrap { db_path, seed_file } => bootstrap::run(&db_path, &seed_file).await,
    }
}

fn reminder_config(lead_time_minutes: i64, stale_after_minutes: Option<i64>) -> ReminderConfig {
    ReminderConfig {
        lead_time: chrono::Duration::minutes(lead_time_minutes),
        stale_after: stale_after_minutes.map(chrono::Duration::minutes),
    }
}

#[allow(clippy::too_many_arguments)]
fn build_scheduler(
    store: Arc<Store>,
    generation_url: &str,
    generation_api_key: &str,
    mail_url: &str,
    mail_api_key: &str,
    mail_from: &str,
    lead_time_minutes: i64,
    stale_after_minutes: Option<i64>,
) -> ReminderScheduler {
    ReminderScheduler::new(
        store,
        GenerationClient::new(generation_url, generation_api_key),
        MailClient::new(mail_url, mail_api_key, mail_from),
        reminder_config(lead_time_minutes, stale_after_minutes),
    )
}

#[allow(clippy::too_many_arguments)]
async fn run_serve(
    db_path: &str,
    port: u16,
    trigger_token: Option<String>,
    generation_url: &str,
    generation_api_key: &str,
    mail_url: &str,
    mail_api_key: &str,
    mail_from: &str,
    lead_time_minutes: i64,
    stale_after_minutes: Option<i64>,
) -> Result<()> {
    let store = Arc::new(Store::open(db_path).map_err(|e| miette::miette!("{}", e))?);

    if trigger_token.is_none() {
        tracing::warn!("no trigger token configured, the reminder endpoint will refuse all runs");
    }

    let scheduler = Arc::new(build_scheduler(
        Arc::clone(&store),
        generation_url,
        generation_api_key,
        mail_url,
        mail_api_key,
        mail_from,
        lead_time_minutes,
        stale_after_minutes,
    ));

    let router = create_router(Arc::new(AppState {
        store,
        scheduler,
        trigger_token,
    }));

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .map_err(|e| miette::miette!("{}", e))?;

    tracing::info!("api server listening on http://0.0.0.0:{}", port);

    axum::serve(listener, router)
        .await
        .map_err(|e| miette::miette!("{}", e))?;

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_remind(
    db_path: &str,
    generation_url: &str,
    generation_api_key: &str,
    mail_url: &str,
    mail_api_key: &str,
    mail_from: &str,
    lead_time_minutes: i64,
    stale_after_minutes: Option<i64>,
) -> Result<()> {
    let store = Arc::new(Store::open(db_path).map_err(|e| miette::miette!("{}", e))?);

    let scheduler = build_scheduler(
        store,
        generation_url,
        generation_api_key,
        mail_url,
        mail_api_key,
        mail_from,
        lead_time_minutes,
        stale_after_minutes,
    );

    let summary = scheduler
        .run_once(chrono::Utc::now())
        .await
        .map_err(|e| miette::miette!("{}", e))?;

    tracing::info!(
        found = summary.found,
        sent = summary.sent,
        failed = summary.failed,
        "reminder pass finished"
    );

    Ok(())
}
