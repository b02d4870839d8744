use rootcause::Report;
use std::sync::Arc;
use tenant_gate_access::{MemorySessionStore, SessionStore};
use tenant_gate_server::{
    app,
    auth::{AppState, AuthSettings, OidcClient},
    config::ServerConfig,
    error::ServerError,
    pages,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(report) = run().await {
        tracing::error!("{}", report);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Report<ServerError>> {
    // Load configuration from environment
    let config = ServerConfig::from_env().map_err(|e| ServerError::Configuration {
        details: e.to_string(),
    })?;
    tracing::info!("Loaded configuration");

    let settings = AuthSettings::from_config(&config).map_err(|e| ServerError::Configuration {
        details: e.to_string(),
    })?;
    let cookie_key = config
        .cookie_key()
        .map_err(|e| ServerError::Configuration {
            details: e.to_string(),
        })?;
    let templates = pages::templates().map_err(|e| ServerError::Templates {
        details: e.to_string(),
    })?;

    // Initialize OIDC client
    tracing::info!("Discovering OIDC provider...");
    let oidc_client = OidcClient::discover(&config.oidc_config(), config.http_timeout())
        .await
        .map_err(|e| ServerError::Discovery {
            details: e.to_string(),
        })?;

    let sessions: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());

    // Spawn periodic session cleanup task
    let cleanup_store = sessions.clone();
    let cleanup_interval_secs = config.session.cleanup_interval_seconds;
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(cleanup_interval_secs));
        loop {
            interval.tick().await;
            match cleanup_store.delete_expired().await {
                Ok(count) if count > 0 => {
                    tracing::debug!(deleted_sessions = count, "Periodic session cleanup");
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to cleanup expired sessions");
                }
            }
        }
    });

    let app_state = AppState::new(
        Arc::new(oidc_client),
        sessions,
        settings,
        cookie_key,
        templates,
    );
    let app = app::router(app_state);

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .map_err(|e| ServerError::Bind {
            address: config.bind_address.clone(),
            details: e.to_string(),
        })?;

    tracing::info!("listening on http://{}", config.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ServerError::Serve {
            details: e.to_string(),
        })?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
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
                tracing::warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutting down");
}
