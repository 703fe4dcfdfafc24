use crate::AppState;
use crate::middleware::require_authorized;
use api_contract::{ApiResponse, MetricsSnapshotDto};
use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use domain::Permission;

/// 进程内计数器快照。
pub async fn metrics(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(response) = require_authorized(&state, &headers, Permission::ViewDashboard).await {
        return response;
    }
    let snapshot = logbook_telemetry::metrics().snapshot();
    let dto = MetricsSnapshotDto {
        issues_created: snapshot.issues_created,
        issues_updated: snapshot.issues_updated,
        issues_deleted: snapshot.issues_deleted,
        remedies_added: snapshot.remedies_added,
        attachments_stored: snapshot.attachments_stored,
        attachments_rolled_back: snapshot.attachments_rolled_back,
        permission_denials: snapshot.permission_denials,
        optimistic_conflicts: snapshot.optimistic_conflicts,
        reports_generated: snapshot.reports_generated,
        issue_save_latency_ms_total: snapshot.issue_save_latency_ms_total,
        issue_save_latency_ms_count: snapshot.issue_save_latency_ms_count,
    };
    (StatusCode::OK, Json(ApiResponse::success(dto))).into_response()
}
