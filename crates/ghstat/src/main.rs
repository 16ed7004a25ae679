use clap::{Args, Parser, Subcommand};
use gs_bot::{ChatTransport, CommandRouter, Outbox, RouterConfig};
use gs_core::error::{HostError, SettingsError, StoreError, TransportError};
use gs_core::settings::Tuning;
use gs_core::{Commands, CorrelationStore, CredentialStore, MemoryCredentialStore};
use gs_db::SqliteCredentialStore;
use gs_github::{GitHubConnector, GitHubOAuth};
use gs_serve::AppState;
use gs_telegram::TelegramTransport;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// How long lanes and the outbound queue get to finish after shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "ghstat", version, about = "Chat bot reporting GitHub language statistics")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the bot and the OAuth callback server.
    Serve(ServeArgs),
    /// Validate the tuning file and print the effective settings.
    CheckConfig {
        #[arg(long, env = "GHSTAT_CONFIG")]
        config: Option<PathBuf>,
    },
}

#[derive(Args)]
struct ServeArgs {
    #[arg(long, env = "GITHUB_CLIENT_ID")]
    github_client_id: String,
    #[arg(long, env = "GITHUB_CLIENT_SECRET", hide_env_values = true)]
    github_client_secret: String,
    #[arg(long, env = "TELEGRAM_TOKEN", hide_env_values = true)]
    telegram_token: String,
    #[arg(long, env = "PORT", default_value_t = 8080)]
    port: u16,
    /// SQLite file for credentials. Credentials stay in memory when unset.
    #[arg(long, env = "GHSTAT_DB_PATH")]
    db_path: Option<PathBuf>,
    #[arg(long, env = "GHSTAT_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Debug, Error)]
enum StartupError {
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error("credential store: {0}")]
    Store(#[from] StoreError),
    #[error("github client: {0}")]
    Host(#[from] HostError),
    #[error("telegram: {0}")]
    Transport(#[from] TransportError),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("server task: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();
    let result = match cli.command {
        Command::Serve(args) => serve(args).await,
        Command::CheckConfig { config } => check_config(config.as_deref()),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "ghstat failed");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn check_config(path: Option<&Path>) -> Result<(), StartupError> {
    let tuning = Tuning::load(path)?;
    println!("{tuning:#?}");
    Ok(())
}

fn credential_store(path: Option<&Path>) -> Result<Arc<dyn CredentialStore>, StartupError> {
    let Some(path) = path else {
        warn!("no database path configured, credentials are kept in memory");
        return Ok(Arc::new(MemoryCredentialStore::new()));
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let store = SqliteCredentialStore::open(path)?;
    info!(path = %path.display(), linked = store.count()?, "opened credential store");
    Ok(Arc::new(store))
}

async fn serve(args: ServeArgs) -> Result<(), StartupError> {
    let tuning = Tuning::load(args.config.as_deref())?;
    let credentials = credential_store(args.db_path.as_deref())?;

    let telegram = Arc::new(TelegramTransport::new(&args.telegram_token)?);
    let bot_link = match tuning.bot_link.clone() {
        Some(link) => link,
        None => format!("https://t.me/{}", telegram.bot_username().await?),
    };
    let transport: Arc<dyn ChatTransport> = telegram;

    let commands = Arc::new(Commands::new(
        credentials,
        Arc::new(CorrelationStore::new(
            tuning.correlation_ttl(),
            tuning.token_length,
        )),
        Arc::new(GitHubOAuth::new(
            &args.github_client_id,
            &args.github_client_secret,
            &tuning.oauth_scope,
        )?),
        Arc::new(GitHubConnector::new()?),
        tuning.fetch_timeout(),
    ));

    let (outbox, queue) = Outbox::channel(tuning.outbound_capacity);
    let drain = tokio::spawn(queue.drain(transport.clone()));
    let (router, mut workers) = CommandRouter::spawn(
        commands.clone(),
        &outbox,
        RouterConfig {
            lane_capacity: tuning.lane_capacity,
            send_timeout: tuning.lane_send_timeout(),
        },
    );

    let shutdown = CancellationToken::new();
    tokio::spawn(watch_ctrl_c(shutdown.clone()));

    let state = AppState {
        commands,
        outbox,
        bot_link,
    };
    let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), args.port);
    let server_shutdown = shutdown.clone();
    let mut server = tokio::spawn(gs_serve::serve(state, addr, async move {
        server_shutdown.cancelled().await;
    }));
    info!(%addr, "ghstat started");

    let stopped = tokio::select! {
        () = router.ingest(transport, shutdown.clone()) => None,
        result = &mut server => Some(result),
    };
    let server_result = match stopped {
        // The server exited on its own, which only happens on error.
        Some(result) => {
            shutdown.cancel();
            result
        }
        None => server.await,
    };

    // Closing the lanes lets each worker finish its current event.
    drop(router);
    let finished = tokio::time::timeout(SHUTDOWN_GRACE, async {
        while workers.join_next().await.is_some() {}
    })
    .await;
    if finished.is_err() {
        warn!("lanes did not finish in time, aborting");
        workers.abort_all();
    }
    if tokio::time::timeout(SHUTDOWN_GRACE, drain).await.is_err() {
        warn!("outbound queue did not drain in time");
    }
    info!("ghstat stopped");

    server_result??;
    Ok(())
}

async fn watch_ctrl_c(shutdown: CancellationToken) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "cannot listen for ctrl-c");
        return;
    }
    info!("shutdown requested");
    shutdown.cancel();
}
