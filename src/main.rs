mod auth;
mod db;
mod error;
mod feed;
mod middleware;
mod notification;
mod readstate;
mod realtime;
mod routes;
mod state;
mod websocket;

use db::{create_pool, run_migrations};
use notification::{start_expiry_service, NotificationRepository};
use readstate::ReadStateStore;
use realtime::run_change_listener;
use routes::create_router;
use state::{AppState, Config};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use websocket::SessionRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,campus_notify=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Arc::new(Config::from_env());

    let database_url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set");

    tracing::info!("Connecting to database...");
    let db = create_pool(&database_url).await?;

    tracing::info!("Running migrations...");
    run_migrations(&db).await?;

    // Row-change fan-out: the Postgres listener publishes here, every feed
    // session holds a subscription
    let (change_tx, _) = broadcast::channel(100);

    let notifications = Arc::new(NotificationRepository::new(db.clone(), change_tx.clone()));
    let read_store = ReadStateStore::new(&config.read_state_dir)?;

    let state = AppState {
        config: config.clone(),
        notifications,
        read_store,
        sessions: SessionRegistry::new(),
    };

    // Forward table changes from Postgres into the broadcast channel
    tokio::spawn(run_change_listener(db.clone(), change_tx));

    // Start the expiry sweep
    let expiry_state = state.clone();
    tokio::spawn(async move {
        if let Err(e) = start_expiry_service(expiry_state).await {
            tracing::error!("Expiry service error: {:?}", e);
        }
    });

    // Create router
    let app = create_router(state);

    // Start server
    let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("{}:{}", host, port);

    tracing::info!("Server starting on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
