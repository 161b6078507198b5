//! canteen-server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) layered with
//! `CANTEEN_*` environment variables, opens the SQLite store, and serves the
//! kiosk and admin API over HTTP.
//!
//! # Password hash generation
//!
//! To generate the argon2 PHC string for `admin_password_hash`:
//!
//! ```text
//! cargo run -p canteen-server -- hash-password
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use canteen_core::period::period_for;
use canteen_server::{ServerConfig, app_state, auth, jobs};
use canteen_store_sqlite::SqliteStore;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Canteen check-in and billing server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
  /// Serve the HTTP API (the default).
  Serve,
  /// Print the argon2 hash for a password entered on stdin and exit.
  HashPassword,
  /// Aggregate one billing period into deductions and exit.
  Aggregate {
    /// Any date inside the period; defaults to today.
    #[arg(long)]
    date: Option<NaiveDate>,
  },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  match cli.command.unwrap_or(Command::Serve) {
    Command::HashPassword => hash_password(),
    Command::Serve => serve(&cli.config).await,
    Command::Aggregate { date } => aggregate(&cli.config, date).await,
  }
}

fn hash_password() -> anyhow::Result<()> {
  let password = read_password()?;
  let hash = auth::hash_password(&password)
    .map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?;
  println!("{hash}");
  Ok(())
}

async fn serve(config_path: &Path) -> anyhow::Result<()> {
  let config = load_config(config_path)?;
  let auth = config.auth()?;
  let store = open_store(&config).await?;
  let state = app_state(store, &config)?;

  if let Some(every) = config.schedule_interval() {
    tokio::spawn(jobs::run_scheduler(
      state.clone(),
      every,
      config.aggregation_timeout(),
    ));
  }

  let app = canteen_server::router(state, auth);
  let address = format!("{}:{}", config.host, config.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  Ok(())
}

async fn aggregate(config_path: &Path, date: Option<NaiveDate>) -> anyhow::Result<()> {
  let config = load_config(config_path)?;
  let store = open_store(&config).await?;
  let state = app_state(store, &config)?;

  let period = period_for(date.unwrap_or_else(|| state.today()))?;
  let summary =
    jobs::aggregate_once(&state, &period, &state.tariff, config.aggregation_timeout())
      .await
      .with_context(|| format!("failed to aggregate {}", period.label))?;

  println!("{}", summary.period.label);
  for d in &summary.deductions {
    println!("{:<20} {:>4} {:>12} {}", d.holder_key, d.visit_count, d.amount, d.currency);
  }
  println!("{} holder(s) aggregated", summary.holders_aggregated);
  Ok(())
}

fn load_config(path: &Path) -> anyhow::Result<ServerConfig> {
  ServerConfig::load(path).context("failed to load configuration")
}

async fn open_store(config: &ServerConfig) -> anyhow::Result<Arc<SqliteStore>> {
  let store_path = expand_tilde(&config.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  Ok(Arc::new(store))
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(error = %e, "failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
  tracing::info!("shutting down");
}

/// Read a password from stdin.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  let stdin = io::stdin();
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  stdin.lock().read_line(&mut line)?;
  Ok(line.trim_end_matches(['\n', '\r']).to_string())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
