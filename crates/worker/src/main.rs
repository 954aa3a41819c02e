//! Worker binary: runs the typing runner and the cleanup sweep.
//!
//! Kept separate from the API process so HTTP deployments can scale
//! independently of job execution. Exactly one logical worker fleet should
//! run against a database; multiple instances are safe (steps are claimed
//! with SKIP LOCKED) but unnecessary at current scale.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ghosttype_engine::runner::TypingRunner;
use ghosttype_engine::sweep;
use ghosttype_engine::writer::NoopWriter;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ghosttype_worker=debug,ghosttype_engine=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = ghosttype_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    ghosttype_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // The deployment wires the real document writer here; the no-op writer
    // keeps local environments runnable without remote credentials.
    let writer = Arc::new(NoopWriter);
    tracing::warn!("Using NoopWriter: batches are logged, not written to any document");

    let cancel = CancellationToken::new();

    let runner = TypingRunner::new(pool.clone(), writer);
    let runner_cancel = cancel.clone();
    let runner_handle = tokio::spawn(async move {
        runner.run(runner_cancel).await;
    });

    let sweep_cancel = cancel.clone();
    let sweep_pool = pool.clone();
    let sweep_handle = tokio::spawn(async move {
        sweep::run(sweep_pool, sweep_cancel).await;
    });

    tracing::info!("Worker started (typing runner + cleanup sweep)");

    shutdown_signal().await;
    cancel.cancel();

    let _ = runner_handle.await;
    let _ = sweep_handle.await;
    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or SIGTERM.
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
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
