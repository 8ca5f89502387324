use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::{CorsLayer, Any};
use tower_http::trace::{self, TraceLayer};
use tracing::{Level, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use appointment_cell::services::notifications::{BroadcastNotificationSink, EventReceiver};
use appointment_cell::AppointmentCellState;
use shared_config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting clinic scheduling API server");

    // Load configuration
    let config = Arc::new(AppConfig::from_env());

    let sink = Arc::new(BroadcastNotificationSink::new(config.notification_channel_capacity));
    tokio::spawn(log_appointment_events(sink.subscribe()));

    let state = Arc::new(
        AppointmentCellState::from_config(Arc::clone(&config), sink)
            .context("building appointment services")?,
    );

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the application router
    let app = router::create_router(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new()
                    .level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new()
                    .level(Level::INFO)),
        )
        .layer(cors);

    // Run the server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    axum::serve(listener, app).await.context("serving HTTP")?;

    Ok(())
}

/// Drains lifecycle events so they land in the service log.
async fn log_appointment_events(mut events: EventReceiver) {
    loop {
        match events.recv().await {
            Ok(payload) => info!(target: "appointment_events", "{}", payload),
            Err(RecvError::Lagged(skipped)) => warn!("Event logger lagged, skipped {} events", skipped),
            Err(RecvError::Closed) => break,
        }
    }
}
