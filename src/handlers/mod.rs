// Handlers Module
// This module contains the API endpoint handlers

pub mod auth;
pub mod dashboard;
pub mod health;

use std::sync::Arc;

use axum::routing::{get, post, Router};

use crate::config::ApiConfig;
use crate::services::allow_list::AllowList;
use crate::services::dashboard_service::DashboardService;
use crate::services::explorer::BlockExplorer;
use crate::services::session_service::SessionService;

/// Shared services behind every handler
pub struct AppContext {
    pub config: ApiConfig,
    pub sessions: SessionService,
    pub dashboard: DashboardService,
}

impl AppContext {
    pub fn new(config: ApiConfig, explorer: Arc<dyn BlockExplorer>) -> Self {
        let allow_list = Arc::new(AllowList::new(&config.allowed_emails));
        let sessions = SessionService::new(allow_list, &config);
        let dashboard = DashboardService::new(explorer, config.network, config.page_size);

        Self {
            config,
            sessions,
            dashboard,
        }
    }
}

// Type alias for the application state
pub type AppState = Arc<AppContext>;

/// API routes with state attached; middleware layers are added by the caller
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/check-email-allowed", post(auth::check_email_allowed))
        .route("/auth/sign-in", post(auth::sign_in))
        .route("/auth/verify", get(auth::verify))
        .route("/auth/session", get(auth::get_session))
        .route("/auth/sign-out", post(auth::sign_out))
        .route("/dashboard", get(dashboard::get_dashboard))
        .route("/dashboard/address", post(dashboard::submit_address))
        .route("/dashboard/transactions", get(dashboard::get_transactions))
        .route("/dashboard/chart", get(dashboard::get_chart))
        .with_state(state)
}
