use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use dotenvy::dotenv;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use lattice::application::ports::Store;
use lattice::application::services::Compactor;
use lattice::config::Config;
use lattice::infrastructure::db::sqlite_store::SqliteStore;
use lattice::infrastructure::db::{connect_pool, migrate};
use lattice::interfaces::{http, ws};
use lattice::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "lattice=debug,tower_http=info,axum=info".into()),
        )
        .init();

    let cfg = Config::from_env()?;
    info!(?cfg, "starting lattice");

    let pool = connect_pool(&cfg.database_path).await?;
    migrate(&pool).await?;

    let store: Arc<dyn Store> = Arc::new(SqliteStore::new(pool.clone()));
    let state = AppState::new(store.clone());

    let compactor = Arc::new(Compactor::new(store.clone()));
    tokio::spawn(compactor.run());
    tokio::spawn(state.rate_limiter.clone().run_sweeper());

    let app: Router<AppState> = http::router()
        .route("/ws", get(ws::ws_upgrade))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());
    let app = app.with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    info!("shutdown complete");
    Ok(())
}

/// Waits for Ctrl-C or SIGTERM (spec §5: "the Store is closed on process
/// signal; outstanding sessions are closed by their respective write
/// deadlines").
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
