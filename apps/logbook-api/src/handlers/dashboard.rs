//! 看板与报表 handlers
//!
//! - `GET /dashboard?days=30&department=D1`：`view_dashboard`，费用字段仅对 `view_costs` 可见
//! - `GET /reports/issues/:issue_id`：`generate_reports`

use crate::AppState;
use crate::handlers::issues::IssuePath;
use crate::middleware::require_authorized;
use crate::utils::response::{dashboard_to_dto, maintenance_error, report_to_dto};
use api_contract::{ApiResponse, DashboardQueryParams};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use domain::Permission;
use logbook_maintenance::DashboardQuery;

pub async fn dashboard(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<DashboardQueryParams>,
) -> Response {
    let caller = match require_authorized(&state, &headers, Permission::ViewDashboard).await {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    let query = DashboardQuery {
        days: Some(params.days.unwrap_or(state.dashboard_default_days)),
        department_id: params
            .department
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty()),
    };
    match state.maintenance.dashboard(&caller.viewer(), &query).await {
        Ok(metrics) => (
            StatusCode::OK,
            Json(ApiResponse::success(dashboard_to_dto(metrics))),
        )
            .into_response(),
        Err(err) => maintenance_error(err),
    }
}

pub async fn issue_report(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<IssuePath>,
) -> Response {
    let caller = match require_authorized(&state, &headers, Permission::GenerateReports).await {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    match state.maintenance.issue_report(&caller, &path.issue_id).await {
        Ok(report) => (
            StatusCode::OK,
            Json(ApiResponse::success(report_to_dto(report))),
        )
            .into_response(),
        Err(err) => maintenance_error(err),
    }
}
