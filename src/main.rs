//! FeedLens - customer feedback service with AI team analysis
//!
//! An HTTP service that stores post-installation feedback for field teams
//! and asks a hosted language model to rank team performance.
//!
//! Exit codes:
//!   0 - Clean shutdown
//!   1 - Startup or runtime error (missing config, bind failure, etc.)

mod analysis;
mod api;
mod cli;
mod config;
mod llm;
mod models;
mod store;

use anyhow::{Context, Result};
use analysis::AnalysisService;
use api::AppState;
use cli::Args;
use config::{Config, DEFAULT_CONFIG_FILE};
use llm::OpenAiClient;
use std::path::Path;
use std::sync::Arc;
use store::FeedbackStore;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args)?;

    info!("FeedLens v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run_server(args).await {
        error!("Server failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle --init-config: generate a default .feedlens.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Set DATABASE_URL and OPENAI_API_KEY (or add them to the file) before starting.");
    Ok(())
}

/// Initialize logging. `RUST_LOG` wins over --verbose/--quiet.
fn init_logging(args: &Args) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(args.log_level().into()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

/// Load config, open the store, build the model client and serve until a
/// shutdown signal arrives.
async fn run_server(args: Args) -> Result<()> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    config.validate()?;
    debug!(
        "Config: model={} base_url={} source={:?} language={}",
        config.model.name,
        config.model.base_url,
        config.analysis.prompt_source,
        config.analysis.language
    );

    let database_url = config.database.url.as_deref().unwrap_or_default();
    let store = FeedbackStore::open(
        database_url,
        &config.database.name,
        &config.database.collection,
    )
    .context("Failed to open feedback store")?;
    let stored = store
        .count()
        .await
        .context("Failed to read feedback store")?;
    info!(
        "Feedback store ready: {} records in collection '{}'",
        stored,
        store.collection()
    );

    let client = OpenAiClient::new(config.openai_config())
        .context("Failed to create model client")?;
    let analyzer = AnalysisService::new(Arc::new(client), config.analysis_settings());

    let app = api::build_router(AppState::new(store.clone(), analyzer));

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("Server stopped, closing feedback store");
    store.close().await.context("Failed to close feedback store")?;

    Ok(())
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", DEFAULT_CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
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

    info!("Shutdown signal received");
}
