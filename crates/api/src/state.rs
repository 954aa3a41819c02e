use std::sync::Arc;

use ghosttype_engine::tiers::PlanLimitsProvider;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: ghosttype_db::DbPool,
    /// Server configuration (accessed by the auth extractor and handlers).
    pub config: Arc<ServerConfig>,
    /// Plan-tier limits collaborator.
    pub limits: Arc<dyn PlanLimitsProvider>,
}
