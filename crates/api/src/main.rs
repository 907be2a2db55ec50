//! API server entry point.

use api::config::Config;
use saga::{
    CommercePlatform, HttpCommercePlatform, HttpPaymentGateway, PaymentGateway,
    ReservationSweeper,
};
use sqlx::postgres::PgPoolOptions;
use store::{InMemoryStore, MarketplaceStore, PostgresStore};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Builds state, spawns the sweeper, and serves requests until shutdown.
async fn serve<S, P, C>(store: S, payment: P, commerce: C, config: Config)
where
    S: MarketplaceStore + Clone + 'static,
    P: PaymentGateway + 'static,
    C: CommercePlatform + 'static,
{
    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    let sweeper = ReservationSweeper::new(store.clone(), config.sweeper);
    tokio::spawn(sweeper.run());
    tracing::info!(
        interval_secs = config.sweeper.interval.as_secs(),
        grace_secs = config.sweeper.grace.as_secs(),
        "reservation sweeper started"
    );

    let state = api::create_state(store, payment, commerce);
    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("server shut down gracefully");
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    let payment = HttpPaymentGateway::new(config.payment.clone())
        .expect("failed to build payment gateway client");
    let commerce = HttpCommercePlatform::new(config.commerce.clone())
        .expect("failed to build commerce platform client");

    match config.database_url.clone() {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(&url)
                .await
                .expect("failed to connect to database");
            let store = PostgresStore::new(pool);
            store
                .run_migrations()
                .await
                .expect("failed to run migrations");
            serve(store, payment, commerce, config).await;
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory store");
            serve(InMemoryStore::new(), payment, commerce, config).await;
        }
    }
}
