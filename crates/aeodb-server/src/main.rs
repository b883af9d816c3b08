mod api;
mod middleware;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, default_rate_limit_state, AppState},
    middleware::AuthState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(aeodb_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = aeodb_db::PoolConfig::from_app_config(&config);
    let pool = aeodb_db::connect_pool(&config.database_url, pool_config).await?;
    aeodb_db::run_migrations(&pool).await?;

    let enrich = match &config.enrich_base_url {
        Some(base_url) => {
            let client = aeodb_enrich::EnrichClient::new(
                base_url,
                config.enrich_api_key.as_deref(),
                config.enrich_timeout_secs,
            )?;
            Some(Arc::new(client))
        }
        None => {
            tracing::info!("AEODB_ENRICH_BASE_URL not set; wizard suggestions disabled");
            None
        }
    };

    let auth = AuthState::from_env(matches!(config.env, aeodb_core::Environment::Development))?;
    let app = build_app(AppState { pool, enrich }, auth, default_rate_limit_state());

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
