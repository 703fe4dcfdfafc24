//! 审计日志查询（需要 `manage_users`），最新的在前。

use crate::AppState;
use crate::middleware::require_authorized;
use crate::utils::response::{audit_log_to_dto, maintenance_error};
use crate::utils::validation::parse_optional_choice;
use api_contract::{ApiResponse, AuditLogDto, AuditLogQueryParams};
use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use domain::{AuditAction, Permission};
use logbook_storage::AuditLogQuery;

const DEFAULT_AUDIT_LIMIT: i64 = 100;
const MAX_AUDIT_LIMIT: i64 = 1000;

pub async fn list_audit_logs(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<AuditLogQueryParams>,
) -> Response {
    if let Err(response) = require_authorized(&state, &headers, Permission::ManageUsers).await {
        return response;
    }
    let action = match parse_optional_choice::<AuditAction>(params.action.as_deref()) {
        Ok(action) => action,
        Err(response) => return response,
    };
    let query = AuditLogQuery {
        issue_id: params.issue_id,
        action,
        user_id: params.user_id,
        limit: params
            .limit
            .unwrap_or(DEFAULT_AUDIT_LIMIT)
            .clamp(1, MAX_AUDIT_LIMIT),
    };
    match state.maintenance.list_audit_logs(&query).await {
        Ok(records) => {
            let items: Vec<AuditLogDto> = records.into_iter().map(audit_log_to_dto).collect();
            (StatusCode::OK, Json(ApiResponse::success(items))).into_response()
        }
        Err(err) => maintenance_error(err),
    }
}
