//! Raccolta
//!
//! HTTP server for query-result collections.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::http::{HeaderValue, Method};
use clap::{Parser, Subcommand};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use raccolta_kernel::collection::{BundleResourceTypeResolver, QueryRegistry};
use raccolta_kernel::{AppState, Config, routes};

/// Raccolta collection server.
#[derive(Parser, Debug)]
#[command(name = "raccolta", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default).
    Serve,
    /// Print the routes derived from the collections file.
    Routes,
    /// Load and validate the collections file, then exit.
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env().context("failed to load configuration")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Routes => print_routes(&config),
        Command::Check => check(&config),
    }
}

async fn serve(config: Config) -> Result<()> {
    info!("Starting Raccolta");
    info!(port = config.port, base_path = %config.base_path, "Configuration loaded");

    let state = AppState::new(&config)
        .await
        .context("failed to initialize application state")?;

    info!(
        engine = state.engine_name(),
        displays = state.registry().len(),
        "Collections loaded"
    );

    let cors = build_cors_layer(&config);

    let app = routes::app_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind to address")?;

    info!(%addr, "Server listening");

    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}

fn load_registry(config: &Config) -> Result<QueryRegistry> {
    let collections = config.load_collections()?;
    let resolver = BundleResourceTypeResolver::new(&collections.resource_types);
    QueryRegistry::from_config(&collections, &resolver).context("invalid collections configuration")
}

fn print_routes(config: &Config) -> Result<()> {
    let registry = load_registry(config)?;
    for route in registry.routes(&config.base_path) {
        println!("{:<40} {}", route.name, route.path);
    }
    Ok(())
}

fn check(config: &Config) -> Result<()> {
    let registry = load_registry(config)?;
    println!(
        "{}: {} collection display(s) registered",
        config.collections_file.display(),
        registry.len()
    );
    Ok(())
}

fn build_cors_layer(config: &Config) -> CorsLayer {
    let methods = [Method::GET, Method::OPTIONS];

    if config.cors_allowed_origins.len() == 1 && config.cors_allowed_origins[0] == "*" {
        CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods(methods)
            .allow_headers(tower_http::cors::Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_allowed_origins
            .iter()
            .filter_map(|o| match o.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(origin = %o, "ignoring unparseable CORS origin");
                    None
                }
            })
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(tower_http::cors::Any)
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug,sqlx=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
