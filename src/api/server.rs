use axum::{
    http::HeaderValue,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use super::handlers;
use crate::config::ClientConfig;
use crate::manager::ClientManager;
use crate::storage::Storage;

pub async fn start_server(config: ClientConfig) -> anyhow::Result<()> {
    let addr = config.bind_address.clone();
    let storage = Storage::new_with_base_dir(config.storage_dir.clone());
    let manager = Arc::new(ClientManager::new_with_storage(config, storage)?);

    // Startup reconciliation runs in the background so the API answers immediately
    let startup = manager.clone();
    tokio::spawn(async move {
        startup.start().await;
    });

    let app = router(manager).layer(cors_layer()?);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// All routes, without CORS.
pub fn router(manager: Arc<ClientManager>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_handler))
        // Session routes
        .route(
            "/api/session",
            get(handlers::get_session_handler)
                .post(handlers::connect_handler)
                .delete(handlers::disconnect_handler),
        )
        // Account routes
        .route(
            "/api/accounts",
            get(handlers::list_accounts_handler).post(handlers::create_account_handler),
        )
        .route(
            "/api/accounts/:id",
            put(handlers::update_account_handler).delete(handlers::deactivate_account_handler),
        )
        // Identity routes
        .route(
            "/api/identity",
            get(handlers::check_identity_handler)
                .post(handlers::register_identity_handler)
                .delete(handlers::deactivate_identity_handler),
        )
        .route(
            "/api/identity/:address",
            get(handlers::identity_by_address_handler),
        )
        // Subnet routes
        .route("/api/subnets", get(handlers::list_subnets_handler))
        .route(
            "/api/subnets/current",
            get(handlers::current_subnet_handler),
        )
        .route(
            "/api/subnets/select",
            post(handlers::select_subnet_handler),
        )
        .route(
            "/api/subnets/refresh",
            post(handlers::refresh_subnet_handler),
        )
        .route(
            "/api/subnets/:name/stats",
            get(handlers::subnet_stats_handler),
        )
        .route(
            "/api/network/status",
            get(handlers::network_status_handler),
        )
        // Plot routes
        .route("/api/plots/:id", get(handlers::get_plot_handler))
        .route(
            "/api/plots/:id/transfer",
            post(handlers::transfer_plot_handler),
        )
        // Contract routes
        .route("/api/contracts", get(handlers::contracts_handler))
        .route(
            "/api/contracts/refresh",
            post(handlers::refresh_contracts_handler),
        )
        .route("/api/notifications", get(handlers::notices_handler))
        .with_state(manager)
}

/// CORS from `ALLOWED_ORIGINS` (comma separated); any origin when unset.
fn cors_layer() -> anyhow::Result<CorsLayer> {
    match std::env::var("ALLOWED_ORIGINS") {
        Ok(origins) if !origins.is_empty() => {
            log::info!("CORS configured for origins: {}", origins);
            let origin_list = origins
                .split(',')
                .map(|s| s.trim().parse::<HeaderValue>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| anyhow::anyhow!("Invalid CORS origin: {}", e))?;
            Ok(CorsLayer::new()
                .allow_origin(origin_list)
                .allow_methods(Any)
                .allow_headers(Any))
        }
        _ => {
            log::warn!("CORS: Allowing all origins (development mode). Set ALLOWED_ORIGINS env var for production.");
            Ok(CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any))
        }
    }
}

/// Handle graceful shutdown signals (Ctrl+C, SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {}", e);
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
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            log::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            log::info!("Received SIGTERM signal");
        },
    }

    log::info!("Shutdown signal received, exiting gracefully...");
}
