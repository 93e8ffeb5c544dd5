//! dashboard-sync: serves the authoritative cycle list and focus timer, or mirrors them from a
//! running server the way a display client would.

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use dashboard_sync::api::{create_router, ApiState};
use dashboard_sync::application::bootstrap::bootstrap_workspace;
use dashboard_sync::application::commands::AppState;
use dashboard_sync::application::mirror_sync::{AuthStatus, DashboardSync, MirrorView};
use dashboard_sync::domain::display::{rotation, timer_face, DisplaySlot, DEFAULT_ITEM_DURATION_MS};
use dashboard_sync::infrastructure::config::{load_app_config, load_client_config};
use dashboard_sync::infrastructure::credential_store::KeyringCredentialStore;
use dashboard_sync::infrastructure::dashboard_client::ReqwestDashboardClient;
use dashboard_sync::infrastructure::error::InfraError;
use dashboard_sync::infrastructure::settings_repository::SqliteSettingsRepository;
use dashboard_sync::infrastructure::timer_repository::SqliteTimerRepository;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "dashboard-sync")]
#[command(about = "Dashboard state server and client mirror", long_about = None)]
#[command(version)]
struct Cli {
    /// Workspace root holding config/ and state/
    #[arg(short, long, env = "DASHBOARD_WORKSPACE", default_value = ".")]
    workspace: PathBuf,

    /// Log level
    #[arg(long, env = "DASHBOARD_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long, env = "DASHBOARD_LOG_JSON")]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the authoritative dashboard state over HTTP
    Serve(ServeArgs),
    /// Mirror dashboard state from a server and log what the display would rotate through
    Mirror(MirrorArgs),
}

#[derive(Args)]
struct ServeArgs {
    /// Listen address, overrides listenAddr from app.json
    #[arg(short, long)]
    listen: Option<String>,

    /// Bearer token clients must present, overrides apiToken and DASHBOARD_API_TOKEN
    #[arg(long)]
    api_token: Option<String>,
}

#[derive(Args)]
struct MirrorArgs {
    /// Server base URL, overrides serverUrl and DASHBOARD_SERVER_URL
    #[arg(long)]
    server_url: Option<String>,

    /// Store this token in the system keyring before polling starts
    #[arg(long)]
    token: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), InfraError> {
    let cli = Cli::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| cli.log_level.clone().into());

    if cli.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    match cli.command {
        Command::Serve(args) => serve(&cli.workspace, args).await,
        Command::Mirror(args) => mirror(&cli.workspace, args).await,
    }
}

async fn serve(workspace: &Path, args: ServeArgs) -> Result<(), InfraError> {
    let bootstrap = bootstrap_workspace(workspace)?;
    let mut config = load_app_config(&bootstrap.config_dir)?
        .with_overrides_from_lookup(|key| env::var(key).ok());
    if let Some(listen) = args.listen {
        config.listen_addr = listen;
    }
    if let Some(token) = args.api_token {
        config.api_token = Some(token);
    }
    let api_token = config.required_api_token()?.to_string();

    let app = AppState::with_repositories(
        Arc::new(SqliteSettingsRepository::new(&bootstrap.database_path)),
        Arc::new(SqliteTimerRepository::new(&bootstrap.database_path)),
        &config.timer,
    )?;
    let router = create_router(ApiState::new(Arc::new(app), &api_token));

    let listener = TcpListener::bind(&config.listen_addr).await?;
    info!(
        listen_addr = %config.listen_addr,
        database = %bootstrap.database_path.display(),
        "dashboard server listening"
    );
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("dashboard server stopped");
    Ok(())
}

async fn mirror(workspace: &Path, args: MirrorArgs) -> Result<(), InfraError> {
    let bootstrap = bootstrap_workspace(workspace)?;
    let mut config = load_client_config(&bootstrap.config_dir)?
        .with_overrides_from_lookup(|key| env::var(key).ok());
    if let Some(server_url) = args.server_url {
        config.server_url = server_url;
    }
    config.validate()?;

    let api = Arc::new(ReqwestDashboardClient::new(&config.server_url)?);
    let credentials = Arc::new(KeyringCredentialStore::default());
    let server_url = config.server_url.clone();
    let sync = DashboardSync::new(api, credentials, config);
    if let Some(token) = args.token {
        sync.set_token(&token)?;
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let pollers = sync.spawn_pollers(shutdown_rx);
    let mut view = sync.subscribe();
    let mut auth = sync.auth_status();
    let mut last_rotation = Vec::new();
    info!(%server_url, "mirroring dashboard state");

    let ctrl_c = shutdown_signal();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            changed = view.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = view.borrow_and_update().clone();
                log_view(&current, &mut last_rotation);
            }
            changed = auth.changed() => {
                if changed.is_err() {
                    break;
                }
                if let AuthStatus::ReauthenticationRequired { reason } = &*auth.borrow_and_update() {
                    error!(%reason, "api token rejected; rerun with --token to re-authenticate");
                }
            }
            _ = &mut ctrl_c => break,
        }
    }

    shutdown_tx.send_replace(true);
    for handle in pollers {
        if let Err(error) = handle.await {
            warn!(%error, "poller task ended abnormally");
        }
    }
    info!("mirror stopped");
    Ok(())
}

fn log_view(view: &MirrorView, last_rotation: &mut Vec<DisplaySlot>) {
    let snapshot = view.timer_snapshot();
    let slots = rotation(&view.cycle_items, snapshot.as_ref(), DEFAULT_ITEM_DURATION_MS);
    if slots != *last_rotation {
        let order = slots
            .iter()
            .map(|slot| slot.label.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        info!(slots = slots.len(), %order, "display rotation changed");
        *last_rotation = slots;
    }

    if let Some(snapshot) = snapshot {
        let face = timer_face(&snapshot, Utc::now());
        debug!(
            mode = face.mode,
            clock = %face.clock,
            paused = face.paused,
            active = face.active,
            "timer face"
        );
    }
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
