//! Request handlers for the health endpoints.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::health::{HealthStatus, SystemHealth};
use crate::http::server::AppState;
use crate::resilience::{BreakerStats, RegistrySummary};

#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub status: HealthStatus,
}

#[derive(Debug, Serialize)]
pub struct LivenessResponse {
    pub alive: bool,
}

#[derive(Debug, Serialize)]
pub struct BreakersResponse {
    pub summary: RegistrySummary,
    pub breakers: Vec<BreakerStats>,
}

fn status_code(status: HealthStatus) -> StatusCode {
    match status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
    }
}

pub async fn get_health(State(state): State<AppState>) -> (StatusCode, Json<SystemHealth>) {
    let health = state.monitor.get_system_health().await;
    (status_code(health.status), Json(health))
}

pub async fn get_ready(State(state): State<AppState>) -> impl IntoResponse {
    let health = state.monitor.current_health().await;
    let ready = health.status != HealthStatus::Unhealthy;
    if !ready {
        tracing::warn!(status = %health.status, "Readiness check failed");
    }
    (
        status_code(health.status),
        Json(ReadinessResponse {
            ready,
            status: health.status,
        }),
    )
}

pub async fn get_live(State(state): State<AppState>) -> Json<LivenessResponse> {
    Json(LivenessResponse {
        alive: state.monitor.is_alive(),
    })
}

pub async fn get_breakers(State(state): State<AppState>) -> Json<BreakersResponse> {
    Json(BreakersResponse {
        summary: state.registry.summary(),
        breakers: state.registry.all_stats(),
    })
}
