use studylink::{
    clock::SystemClock,
    config::{
        session::{validate_production_config, SessionConfig},
        AppConfig,
    },
    db, routes, services, AppState,
};

use std::{net::SocketAddr, sync::Arc};
use tower_sessions_sqlx_store::SqliteStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "studylink=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    validate_production_config()?;
    if config.is_production() {
        tracing::info!("Production mode: secure session cookies and HSTS enabled");
    }

    // Database connection
    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;

    let email_service: Arc<dyn services::EmailService> =
        Arc::from(services::create_email_service(&config.base_url));
    let app_state = AppState::new(pool.clone(), email_service, Arc::new(SystemClock));

    // Session store
    let session_store = SqliteStore::new(pool.clone())
        .with_table_name("sessions")
        .map_err(anyhow::Error::msg)?;
    session_store.migrate().await?;
    let session_layer = SessionConfig::from_env().create_layer(session_store);

    let app = routes::build_router(app_state, session_layer);

    let addr = SocketAddr::from((config.host.parse::<std::net::IpAddr>()?, config.port));
    tracing::info!(environment = %config.environment, "Server running on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
