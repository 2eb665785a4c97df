use std::net::SocketAddr;
use std::sync::Arc;

use aipal_backend::config::Config;
use aipal_backend::db::config::DbConfigError;
use aipal_backend::db::memory::MemoryStore;
use aipal_backend::db::migrate::run_migrations;
use aipal_backend::db::postgres::PgStore;
use aipal_backend::db::store::Store;
use aipal_backend::db::{DatabaseProxy, DbInitError};
use aipal_backend::logging::init_tracing;
use aipal_backend::services::llm_provider::LLMProvider;
use aipal_backend::state::AppState;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let config = Config::from_env();
    let _log_guard = init_tracing(&config);

    let store: Arc<dyn Store> = match DatabaseProxy::from_env().await {
        Ok(proxy) => {
            if config.run_migrations {
                if let Err(err) = run_migrations(proxy.pool()).await {
                    tracing::error!(error = %err, "database migration failed");
                    return;
                }
            }
            Arc::new(PgStore::new(proxy))
        }
        Err(DbInitError::Config(DbConfigError::Missing { key })) => {
            tracing::warn!(key, "database not configured; using in-memory store");
            Arc::new(MemoryStore::new())
        }
        Err(err) => {
            tracing::error!(error = %err, "database connection failed");
            return;
        }
    };

    let llm = LLMProvider::from_env();
    if !llm.is_available() {
        tracing::warn!("LLM_API_KEY not set; analysis endpoints will fail");
    }
    tracing::info!(model = llm.model(), "completion client ready");

    let jwt_secret = std::env::var("JWT_SECRET").ok();
    if jwt_secret.is_none() {
        tracing::warn!("JWT_SECRET not set; authenticated routes will reject every token");
    }

    let state = AppState::new(store, Arc::new(llm), jwt_secret);
    let app = aipal_backend::create_app(state);

    let addr = config.bind_addr();
    tracing::info!(%addr, "aipal-backend listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("bind listener failed");

    let server = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal());

    if let Err(e) = server.await {
        tracing::error!(error = %e, "server error");
    }

    tracing::info!("Graceful shutdown complete");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
