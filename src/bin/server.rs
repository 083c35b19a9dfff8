use clap::Parser;
use sea_orm::{ConnectOptions, Database};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use dynowatch::alerting::{ReconciliationEngine, Scheduler};
use dynowatch::db::{DbSnapshotStore, MemorySnapshotStore, SnapshotStore};
use dynowatch::heroku::HerokuClient;
use dynowatch::monitoring::{RuntimeConfig, RuntimeConfigHandle};
use dynowatch::notifications::NotificationService;
use dynowatch::server::config::ServerConfig;
use dynowatch::version::VERSION;
use dynowatch::web::{AppState, create_axum_router};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<String>,
}

fn init_logging(log_dir: &str) {
    // JSON file log, rotated daily
    let file_appender = rolling::daily(log_dir, "dynowatch.log");
    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .json();

    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sea_orm=warn,sqlx::query=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C.");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM.");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received, draining HTTP server.");
}

async fn open_store(config: &ServerConfig) -> Result<Arc<dyn SnapshotStore>, sea_orm::DbErr> {
    let Some(database_url) = config.database_url.as_deref() else {
        warn!("DATABASE_URL not set, snapshots are kept in memory and lost on restart.");
        return Ok(Arc::new(MemorySnapshotStore::new()));
    };

    let mut opt = ConnectOptions::new(database_url.to_owned());
    opt.max_connections(5).sqlx_logging(false);
    let db = Database::connect(opt).await?;

    let store = DbSnapshotStore::new(db);
    store.ensure_schema().await?;
    info!("Connected to snapshot database.");
    Ok(Arc::new(store))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if std::env::args().any(|arg| arg == "--version") {
        println!("dynowatch version: {VERSION}");
        return Ok(());
    }

    let args = Args::parse();

    let server_config = match ServerConfig::load(args.config.as_deref()) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            eprintln!("Failed to load server configuration: {e}");
            return Err(e.into());
        }
    };

    init_logging(&server_config.log_dir);
    info!("Starting dynowatch, version: {}", VERSION);

    // --- Collaborators ---
    let store = open_store(&server_config).await?;
    let engine = Arc::new(ReconciliationEngine::new(store));
    let heroku = Arc::new(HerokuClient::new(
        server_config.heroku_api_key.clone(),
        server_config.heroku_api_url.clone(),
        server_config.request_timeout(),
    )?);
    let notifier = Arc::new(NotificationService::from_config(&server_config)?);

    // --- Runtime configuration, seeded from static config ---
    let initial = match server_config.monitored_app_name.as_deref() {
        Some(app_name) => match RuntimeConfig::new(
            app_name,
            server_config.slack_channel.clone(),
            server_config.check_interval_minutes,
        ) {
            Ok(config) => Some(config),
            Err(e) => {
                error!(error = %e, "Ignoring invalid monitoring settings from configuration.");
                None
            }
        },
        None => None,
    };
    let runtime_config = RuntimeConfigHandle::new(initial);

    // --- Scheduler task ---
    let scheduler = Arc::new(Scheduler::new(
        runtime_config.clone(),
        heroku.clone(),
        engine.clone(),
        notifier,
    ));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler_task = tokio::spawn(scheduler.clone().run(shutdown_rx));

    // --- Axum HTTP Server ---
    let app_state = Arc::new(AppState {
        config: server_config.clone(),
        runtime_config,
        scheduler,
        engine,
        heroku,
        http_client: reqwest::Client::builder()
            .timeout(server_config.request_timeout())
            .build()?,
    });
    let app = create_axum_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], server_config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, "HTTP server listening");

    let serve_result = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await;
    if let Err(e) = &serve_result {
        error!(error = %e, "HTTP server exited with error.");
    }

    // In-flight cycle completes before the scheduler reports Stopped.
    if shutdown_tx.send(true).is_err() {
        warn!("Scheduler already exited before shutdown signal.");
    }
    if let Err(e) = scheduler_task.await {
        error!(error = %e, "Scheduler task panicked.");
    }
    info!("dynowatch stopped.");

    serve_result.map_err(|e| e.into())
}
