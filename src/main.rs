use actix_web::{web, App, HttpServer};
use clap::Parser;
use counsel::api::middleware::{BearerAuth, FixedWindowLimiter, RateLimit};
use counsel::auth::TokenVerifier;
use counsel::chat::{SessionManager, TurnCoordinator};
use counsel::cli::{commands::{Cli, Commands}, run_cli};
use counsel::config::AppConfig;
use counsel::db;
use counsel::llm::{ModelBridge, ProviderFactory};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    if !matches!(cli.command, Commands::Serve) {
        if let Err(e) = run_cli(cli.command, cli.config).await {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
        return Ok(());
    }

    info!("Starting Counsel chat server...");

    let config = match AppConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let store = match db::open_store(&config) {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to initialize transcript store: {}", e);
            std::process::exit(1);
        }
    };

    let llm_provider = match ProviderFactory::create_default(&config) {
        Some(p) => p,
        None => {
            error!(provider = %config.llm.provider, "Failed to initialize LLM provider from configuration");
            std::process::exit(1);
        }
    };

    let bridge = ModelBridge::from_config(llm_provider, &config);
    info!(provider = %bridge.provider_name(), "Model bridge ready");

    let sessions = Arc::new(SessionManager::new(store));
    let turns = Arc::new(TurnCoordinator::new(sessions.clone(), bridge, &config.chat));
    let verifier = Arc::new(TokenVerifier::new(&config.auth.jwt_secret));
    let limiter = Arc::new(FixedWindowLimiter::from_config(&config.rate_limit));

    let host = config.server.host.clone();
    let port = config.server.port;

    info!("Server listening on {}:{}", host, port);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::from(sessions.clone()))
            .app_data(web::Data::from(turns.clone()))
            .app_data(web::Data::from(verifier.clone()))
            .configure(counsel::api::routes::configure)
            .wrap(BearerAuth)
            .wrap(RateLimit::new(limiter.clone()))
    })
    .bind((host, port))?
    .run()
    .await
}
