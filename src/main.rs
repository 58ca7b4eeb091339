use std::sync::Arc;

use sqlx::sqlite::SqlitePoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gympay::{
    api,
    config::Settings,
    gateway::HttpWalletGateway,
    notify::HttpSmsNotifier,
    service::ServiceContext,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gympay=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let settings = Settings::new().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config: {}. Using defaults.", e);
        Settings::default()
    });

    tracing::info!(
        "Starting gympay server on {}:{}",
        settings.server.host,
        settings.server.port
    );

    // Initialize database
    let db_pool = SqlitePoolOptions::new()
        .max_connections(settings.database.max_connections)
        .connect(&settings.database.url)
        .await?;

    // Run migrations
    sqlx::migrate!("./migrations").run(&db_pool).await?;

    // Outbound collaborators
    let gateway = Arc::new(HttpWalletGateway::new(settings.gateway.clone())?);
    let notifier = Arc::new(HttpSmsNotifier::new(settings.sms.clone())?);

    // Create service context
    let service_context = Arc::new(ServiceContext::new(
        db_pool.clone(),
        gateway,
        notifier,
        &settings,
    ));

    // Background sweep: stale pending payments past their OTP expiry are
    // failed even if the client never comes back.
    let sweep_service = service_context.payment_service.clone();
    let sweep_interval = settings.otp.sweep_interval();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        loop {
            ticker.tick().await;
            if let Err(e) = sweep_service.sweep_expired().await {
                tracing::error!("Expiry sweep failed: {}", e);
            }
        }
    });

    let app = api::create_app(service_context, Arc::new(settings.clone()));

    let listener = tokio::net::TcpListener::bind(format!(
        "{}:{}",
        settings.server.host, settings.server.port
    ))
    .await?;

    tracing::info!(
        "Server listening on http://{}:{}",
        settings.server.host,
        settings.server.port
    );

    axum::serve(listener, app).await?;

    Ok(())
}
