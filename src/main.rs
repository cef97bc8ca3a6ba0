use axum::{routing::post, Router};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::{load_config, Config};
use crate::engine::{MediaEngine, YtDlp};

// --- Modules ---
pub mod config;
pub mod daemon;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod models;
pub mod plan;
pub mod ranker;
pub mod url;

/// Shared, read-only state handed to every request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub engine: Arc<dyn MediaEngine>,
}

// --- Command-Line Argument Parsing ---
#[derive(Parser, Debug)]
#[command(author, version, about = "Lists and downloads media renditions through yt-dlp.", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manages the server process.
    Server {
        #[command(subcommand)]
        action: ServerAction,
    },
    /// Inspects the configuration file.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ServerAction {
    /// Start the server as a background process.
    Start,
    /// Stop the background server process.
    Stop,
    /// Restart the background server process.
    Restart,
    /// Run the server in the foreground.
    Run,
    /// Check the status of the background server process.
    Status,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective configuration.
    Show,
    /// Print the location of config.toml.
    Path,
}

// The runtime is built per command so `start` can fork before any threads exist.
fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Server { action } => match action {
            ServerAction::Start => daemon::start_server()?,
            ServerAction::Stop => daemon::stop_server()?,
            ServerAction::Restart => {
                daemon::stop_server()?;
                std::thread::sleep(std::time::Duration::from_secs(1));
                daemon::start_server()?;
            }
            ServerAction::Run => block_on(run_server())?,
            ServerAction::Status => daemon::check_status()?,
        },
        Commands::Config { action } => block_on(async move {
            match action {
                ConfigAction::Show => {
                    let config = load_config().await?.with_env_overrides()?;
                    print!("{}", toml::to_string_pretty(&config)?);
                }
                ConfigAction::Path => println!("{}", config::config_path().await?.display()),
            }
            Ok::<(), anyhow::Error>(())
        })?,
    }

    Ok(())
}

pub(crate) fn block_on<F>(future: F) -> anyhow::Result<()>
where
    F: std::future::Future<Output = anyhow::Result<()>>,
{
    tokio::runtime::Runtime::new()?.block_on(future)
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/get_formats", post(handlers::get_formats))
        .route("/download_specific", post(handlers::download_specific))
        .layer(CorsLayer::new().allow_origin(Any).allow_headers(Any).allow_methods(Any))
        .with_state(state)
}

/// Runs the Axum web server in the foreground until the process is stopped.
pub async fn run_server() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let config = load_config().await?.with_env_overrides()?;
    let addr = config.bind_address();

    tracing::info!("Downloads will be written to {}", config.download_directory);
    let state = AppState {
        engine: Arc::new(YtDlp::from_config(&config)),
        config: Arc::new(config),
    };

    tracing::info!("Starting server in foreground, listening on http://{}/", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router(state)).await?;
    Ok(())
}
