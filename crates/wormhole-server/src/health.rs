//! Health check endpoint, for load balancers, monitoring, and Docker health checks.

use std::sync::Arc;
use std::time::Instant;

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use wormhole_db::Database;

pub struct HealthState {
    pub db: Database,
    pub started: Instant,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    database: bool,
    version: String,
    uptime_secs: u64,
}

/// Health check router.
pub fn router(db: Database) -> Router {
    let state = Arc::new(HealthState {
        db,
        started: Instant::now(),
    });
    Router::new()
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check(State(state): State<Arc<HealthState>>) -> Json<HealthResponse> {
    let db_ok = state.db.health_check().await;

    Json(HealthResponse {
        status: if db_ok {
            "healthy".into()
        } else {
            "degraded".into()
        },
        database: db_ok,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.started.elapsed().as_secs(),
    })
}
