//! exodus server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`) layered under
//! `EXODUS_*` environment variables, opens the SQLite store, and serves the
//! JSON API over HTTP.
//!
//! # Bearer tokens
//!
//! To mint a token and the digest that goes into `token_digests`:
//!
//! ```
//! cargo run -p exodus-server -- token
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use exodus_server::{
  AppState, ServerConfig,
  auth::{AuthConfig, digest_token, generate_token},
};
use exodus_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Exodus protocol resource server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand, Default)]
enum Command {
  /// Serve the JSON API (the default).
  #[default]
  Serve,
  /// Apply pending schema migrations and exit.
  Migrate,
  /// Print a new bearer token and its digest, then exit.
  Token,
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

  match cli.command.unwrap_or_default() {
    Command::Token => {
      let token = generate_token();
      println!("token:  {token}");
      println!("digest: {}", digest_token(&token));
      Ok(())
    }
    Command::Migrate => {
      let config = load_config(&cli.config)?;
      let store = open_store(&config).await?;
      let version = store.schema_version().await?;
      println!("schema version {version}");
      Ok(())
    }
    Command::Serve => serve(load_config(&cli.config)?).await,
  }
}

async fn serve(config: ServerConfig) -> anyhow::Result<()> {
  let store = open_store(&config).await?;

  let auth = AuthConfig::new(&config.token_digests);
  if auth.is_empty() {
    tracing::warn!("no token_digests configured; every request will be rejected");
  }

  let app = exodus_server::router(AppState {
    store: Arc::new(store),
    auth:  Arc::new(auth),
  });
  let address = format!("{}:{}", config.host, config.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  tracing::info!("shut down");
  Ok(())
}

fn load_config(path: &Path) -> anyhow::Result<ServerConfig> {
  let settings = config::Config::builder()
    .set_default("host", "127.0.0.1")?
    .set_default("port", 8080)?
    .set_default("store_path", "exodus.db")?
    .add_source(config::File::from(path).required(false))
    .add_source(config::Environment::with_prefix("EXODUS"))
    .build()
    .context("failed to read config file")?;

  settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")
}

async fn open_store(config: &ServerConfig) -> anyhow::Result<SqliteStore> {
  let store_path = expand_tilde(&config.store_path);
  SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(error = %e, "failed to listen for ctrl-c");
  }
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
