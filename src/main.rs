//! Group Service
//!
//! An RPC service for managing directory groups and their members, backed by the
//! Admin SDK Directory API.

mod api;
mod auth;
mod config;
mod directory;
mod errors;
mod models;
mod names;
mod service;

use std::sync::Arc;

use axum::{
    extract::Request,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use auth::ServiceAccountTokenSource;
use config::{Config, LogFormat};
use directory::HttpDirectoryClient;
use service::GroupService;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: GroupService,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }

    tracing::info!("Starting Group Service");
    tracing::info!("Directory domain: {}", config.domain);
    tracing::info!("Directory URL: {}", config.directory_url);
    tracing::info!("Bind address: {}", config.bind_addr);

    // Load credentials; any failure here aborts startup
    let http = reqwest::Client::builder()
        .timeout(config.upstream_timeout)
        .build()?;
    let tokens = ServiceAccountTokenSource::from_file(
        &config.credentials_path,
        &config.admin_subject,
        http.clone(),
    )?;
    tracing::info!(
        "Loaded service account {} impersonating {}",
        tokens.client_email(),
        config.admin_subject
    );

    let directory = HttpDirectoryClient::new(http, &config.directory_url, Arc::new(tokens))?;

    // Create application state
    let state = AppState {
        service: GroupService::new(Arc::new(directory), config.domain.clone()),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    let rpc = |method: &str| api::method_path(method);

    // RPC routes
    let rpc_routes = Router::new()
        // Groups
        .route(&rpc("ListGroups"), post(api::list_groups))
        .route(&rpc("GetGroup"), post(api::get_group))
        .route(&rpc("CreateGroup"), post(api::create_group))
        .route(&rpc("DeleteGroup"), post(api::delete_group))
        // Members
        .route(&rpc("ListMembers"), post(api::list_members))
        .route(&rpc("GetMember"), post(api::get_member))
        .route(&rpc("CreateMember"), post(api::create_member))
        .route(&rpc("DeleteMember"), post(api::delete_member));

    // Health check and reflection
    let meta_routes = Router::new()
        .route("/health", get(health_check))
        .route("/reflection", get(api::describe_service));

    // Request tagging and logging
    let middleware = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id = %request_id,
                )
            }),
        )
        .layer(PropagateRequestIdLayer::x_request_id());

    Router::new()
        .merge(rpc_routes)
        .merge(meta_routes)
        .layer(middleware)
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT, shutting down gracefully..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down gracefully..."),
    }
}

#[cfg(test)]
mod tests;
