// Health check endpoint handler implementation

use axum::{extract::State, Json};
use serde::Serialize;

use crate::handlers::AppState;

#[derive(Debug, Serialize)]
pub struct HealthCheckResponse {
    status: String,
    explorer: String,
}

/// Handler for GET /health - Returns a simple health check response to verify the API is running
pub async fn health_check(State(state): State<AppState>) -> Json<HealthCheckResponse> {
    Json(HealthCheckResponse {
        status: "ok".to_string(),
        explorer: state.dashboard.explorer_name(),
    })
}
