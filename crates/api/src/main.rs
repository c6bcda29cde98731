//! Binary entrypoint: wire the store, engine, bus, and effect router
//! together and serve until a termination signal arrives.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use aftercare_api::config::ServerConfig;
use aftercare_api::effects::{BusSink, EffectRouter, GeocodeClient};
use aftercare_api::router::app_router;
use aftercare_api::state::AppState;
use aftercare_core::LifecycleEngine;
use aftercare_db::{DbPool, PgServiceStore};

/// How long the effect router gets to drain after the listener stops.
const EFFECT_DRAIN_WINDOW: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    let pool = prepare_database().await;

    // One bus; the engine publishes onto it through the sink, the effect
    // router consumes it from a background task.
    let event_bus = Arc::new(aftercare_events::EventBus::default());
    let engine = Arc::new(LifecycleEngine::new(
        Arc::new(PgServiceStore::new(pool.clone())),
        Arc::new(BusSink::new(Arc::clone(&event_bus))),
    ));

    let geocoder = GeocodeClient::new(config.geocoder_url.clone());
    let effects = EffectRouter::new(pool.clone(), geocoder);
    let effects_handle = tokio::spawn(effects.run(event_bus.subscribe()));
    tracing::info!("Effect router started");

    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        engine,
        event_bus: Arc::clone(&event_bus),
    };
    let app = app_router(state, &config);

    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");
    tracing::info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // Closing the bus (last sender dropped) tells the effect router to
    // exit once it has drained. Effects still queued past the window are
    // lost, which the dispatch contract allows.
    drop(event_bus);
    let _ = tokio::time::timeout(EFFECT_DRAIN_WINDOW, effects_handle).await;
    tracing::info!("Shutdown complete");
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aftercare_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Connect, probe, and migrate. Any failure here aborts startup.
async fn prepare_database() -> DbPool {
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = aftercare_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    aftercare_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    aftercare_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database ready");

    pool
}

/// Resolve on SIGINT or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT, shutting down"),
        () = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
