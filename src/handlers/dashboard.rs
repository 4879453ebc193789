// Dashboard endpoint handlers for the signed-in user's watched address

use axum::{
    extract::{Query, State},
    Json,
};

use crate::error::WatchResult;
use crate::handlers::auth::CurrentSession;
use crate::handlers::AppState;
use crate::models::ledger::ChartPoint;
use crate::models::{
    AddressRequest, ChartQuery, DashboardQuery, DashboardView, TransactionPage, TransactionQuery,
};

/// POST /dashboard/address - Load an address and return the fresh dashboard
pub async fn submit_address(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Json(body): Json<AddressRequest>,
) -> WatchResult<Json<DashboardView>> {
    state
        .dashboard
        .submit_address(session.user_id, &body.address)
        .await?;

    let view = state
        .dashboard
        .view(session.user_id, &DashboardQuery::default())
        .await;
    Ok(Json(view))
}

/// GET /dashboard - Balance, chart and one transaction page
pub async fn get_dashboard(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Query(query): Query<DashboardQuery>,
) -> Json<DashboardView> {
    Json(state.dashboard.view(session.user_id, &query).await)
}

/// GET /dashboard/transactions - Filtered, sorted page of transaction rows
pub async fn get_transactions(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Query(query): Query<TransactionQuery>,
) -> Json<TransactionPage> {
    Json(state.dashboard.transactions(session.user_id, &query).await)
}

/// GET /dashboard/chart - Balance history for the requested range
pub async fn get_chart(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Query(query): Query<ChartQuery>,
) -> Json<Vec<ChartPoint>> {
    Json(state.dashboard.chart(session.user_id, query.range).await)
}
