use diesel::sqlite::SqliteConnection;
use diesel::{Connection, RunQueryDsl};
use diesel_migrations::MigrationHarness;
use newsdesk_service::{
    DefaultAppState, MIGRATIONS,
    auth::AuthContext,
    config::Config,
    routes::create_router,
    shutdown::{GracefulShutdownLayer, ShutdownState},
};
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{error, info, warn};

const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("newsdesk_service=debug".parse().unwrap()),
        )
        .init();

    let config = Config::from_env().unwrap_or_else(|err| {
        error!(error = %err, "Invalid configuration");
        std::process::exit(1);
    });

    let mut connection = SqliteConnection::establish(&config.database_url).unwrap_or_else(|err| {
        error!(database_url = %config.database_url, error = %err, "Failed to connect to database");
        std::process::exit(1);
    });

    // SQLite leaves foreign keys off unless asked per connection
    diesel::sql_query("PRAGMA foreign_keys = ON")
        .execute(&mut connection)
        .unwrap_or_else(|err| {
            error!(error = %err, "Failed to enable foreign key enforcement");
            std::process::exit(1);
        });

    connection
        .run_pending_migrations(MIGRATIONS)
        .unwrap_or_else(|err| {
            error!(error = %err, "Failed to run database migrations");
            std::process::exit(1);
        });

    info!(database_url = %config.database_url, "Connected to database");

    let auth = AuthContext::new(
        &config.jwt_secret,
        config.admin_username.clone(),
        config.admin_password.clone(),
        config.cookie_secure,
    );
    let app_state = DefaultAppState::new(Arc::new(Mutex::new(connection)), auth);
    let shutdown_state = ShutdownState::new();

    let app = create_router(&config.admin_secret_path)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(GracefulShutdownLayer::new(shutdown_state.clone()))
                .layer(TimeoutLayer::new(Duration::from_secs(15))),
        )
        .with_state(app_state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .unwrap_or_else(|err| {
            error!(bind_address = %config.bind_addr, error = %err, "Failed to bind to address");
            std::process::exit(1);
        });

    info!(bind_address = %config.bind_addr, "Server listening");

    let server =
        axum::serve(listener, app).with_graceful_shutdown(shutdown_signal(shutdown_state.clone()));

    if let Err(err) = server.await {
        error!(error = %err, "Server error");
        std::process::exit(1);
    }

    if tokio::time::timeout(DRAIN_TIMEOUT, shutdown_state.drained())
        .await
        .is_err()
    {
        warn!(
            in_flight = shutdown_state.in_flight_count(),
            "Drain timed out with requests still in flight"
        );
    } else {
        info!("Graceful shutdown completed - all requests finished");
    }
}

async fn shutdown_signal(shutdown_state: ShutdownState) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
    shutdown_state.start_shutdown();
}
