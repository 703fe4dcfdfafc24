//! 故障单 handlers
//!
//! - `GET /issues`：列表（任何访问者可读）
//! - `POST /issues`：新建（`crud_issues`）
//! - `GET /issues/:issue_id`：详情，维修措施按查看者脱敏
//! - `PUT /issues/:issue_id`：部分更新（`crud_issues`；改为 resolved/closed 还需 `mark_resolved`）
//! - `PATCH /issues/:issue_id/status`：状态变更（resolved/closed 需 `mark_resolved`，其余需 `crud_issues`）
//! - `DELETE /issues/:issue_id`：删除（`crud_issues`）

use crate::AppState;
use crate::middleware::{require_caller, require_permission};
use crate::utils::response::{
    issue_detail_to_dto, issue_summary_to_dto, maintenance_error,
};
use crate::utils::validation::{normalize_required, parse_choice, parse_optional_choice};
use api_contract::{
    ApiResponse, CreateIssueRequest, IssueDto, IssueListQuery, UpdateIssueRequest,
    UpdateStatusRequest,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use domain::{IssueCategory, IssuePriority, IssueStatus, Permission};
use logbook_maintenance::{Caller, IssueChanges, NewIssue};
use logbook_storage::{IssueFilter, IssueRecord};

const DEFAULT_LIST_LIMIT: i64 = 200;

#[derive(Debug, serde::Deserialize)]
pub struct IssuePath {
    pub issue_id: String,
}

/// 写操作后返回的故障单视图。
pub(crate) async fn issue_response(
    state: &AppState,
    issue: IssueRecord,
    status: StatusCode,
) -> Response {
    match state.maintenance.describe_issue(issue).await {
        Ok(summary) => {
            let dto: IssueDto = issue_summary_to_dto(summary);
            (status, Json(ApiResponse::success(dto))).into_response()
        }
        Err(err) => maintenance_error(err),
    }
}

/// 进入 resolved/closed 需要 `mark_resolved`，其他状态变更需要 `crud_issues`。
fn require_status_permission(caller: &Caller, status: IssueStatus) -> Result<(), Response> {
    if status.requires_resolution_permission() {
        require_permission(&caller.actor, Permission::MarkResolved)
    } else {
        require_permission(&caller.actor, Permission::CrudIssues)
    }
}

pub async fn list_issues(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<IssueListQuery>,
) -> Response {
    if let Err(response) = require_caller(&state, &headers).await {
        return response;
    }
    let filter = IssueFilter {
        status: match parse_optional_choice::<IssueStatus>(query.status.as_deref()) {
            Ok(value) => value,
            Err(response) => return response,
        },
        priority: match parse_optional_choice::<IssuePriority>(query.priority.as_deref()) {
            Ok(value) => value,
            Err(response) => return response,
        },
        category: match parse_optional_choice::<IssueCategory>(query.category.as_deref()) {
            Ok(value) => value,
            Err(response) => return response,
        },
        machine_id_ref: query.machine.map(|value| value.trim().to_string()),
        department_id: query.department.map(|value| value.trim().to_string()),
        is_runnable: query.is_runnable,
        created_after: None,
        search: query.search.filter(|value| !value.trim().is_empty()),
        limit: Some(query.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, 1000)),
    };

    match state.maintenance.list_issues(&filter).await {
        Ok(items) => {
            let items: Vec<IssueDto> = items.into_iter().map(issue_summary_to_dto).collect();
            (StatusCode::OK, Json(ApiResponse::success(items))).into_response()
        }
        Err(err) => maintenance_error(err),
    }
}

pub async fn create_issue(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateIssueRequest>,
) -> Response {
    let caller = match require_caller(&state, &headers).await {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    if let Err(response) = require_permission(&caller.actor, Permission::CrudIssues) {
        return response;
    }

    let machine_id_ref = match normalize_required(req.machine_id_ref, "machineIdRef") {
        Ok(value) => value,
        Err(response) => return response,
    };
    let category = match parse_choice::<IssueCategory>(&req.category) {
        Ok(value) => value,
        Err(response) => return response,
    };
    let priority = match parse_optional_choice::<IssuePriority>(req.priority.as_deref()) {
        Ok(value) => value.unwrap_or_default(),
        Err(response) => return response,
    };
    let input = NewIssue {
        machine_id_ref,
        category,
        priority,
        alarm_code: req.alarm_code,
        description: req.description,
        is_runnable: req.is_runnable,
        reported_by: req.reported_by,
        auto_title: req.auto_title,
    };

    match state.maintenance.create_issue(&caller, input).await {
        Ok(issue) => issue_response(&state, issue, StatusCode::CREATED).await,
        Err(err) => maintenance_error(err),
    }
}

pub async fn get_issue(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<IssuePath>,
) -> Response {
    let caller = match require_caller(&state, &headers).await {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    match state
        .maintenance
        .issue_detail(&caller.viewer(), &path.issue_id)
        .await
    {
        Ok(detail) => (
            StatusCode::OK,
            Json(ApiResponse::success(issue_detail_to_dto(detail))),
        )
            .into_response(),
        Err(err) => maintenance_error(err),
    }
}

pub async fn update_issue(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<IssuePath>,
    Json(req): Json<UpdateIssueRequest>,
) -> Response {
    let caller = match require_caller(&state, &headers).await {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    if let Err(response) = require_permission(&caller.actor, Permission::CrudIssues) {
        return response;
    }

    let status = match parse_optional_choice::<IssueStatus>(req.status.as_deref()) {
        Ok(value) => value,
        Err(response) => return response,
    };
    if let Some(status) = status {
        if let Err(response) = require_status_permission(&caller, status) {
            return response;
        }
    }
    let changes = IssueChanges {
        machine_id_ref: req.machine_id_ref,
        category: match parse_optional_choice::<IssueCategory>(req.category.as_deref()) {
            Ok(value) => value,
            Err(response) => return response,
        },
        priority: match parse_optional_choice::<IssuePriority>(req.priority.as_deref()) {
            Ok(value) => value,
            Err(response) => return response,
        },
        status,
        alarm_code: req.alarm_code,
        description: req.description,
        is_runnable: req.is_runnable,
        auto_title: req.auto_title,
        ai_summary: req.ai_summary,
        expected_version: req.expected_version,
    };

    match state
        .maintenance
        .update_issue(&caller, &path.issue_id, changes)
        .await
    {
        Ok(issue) => issue_response(&state, issue, StatusCode::OK).await,
        Err(err) => maintenance_error(err),
    }
}

pub async fn update_issue_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<IssuePath>,
    Json(req): Json<UpdateStatusRequest>,
) -> Response {
    let caller = match require_caller(&state, &headers).await {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    let status = match parse_choice::<IssueStatus>(&req.status) {
        Ok(value) => value,
        Err(response) => return response,
    };
    if let Err(response) = require_status_permission(&caller, status) {
        return response;
    }

    match state
        .maintenance
        .update_status(&caller, &path.issue_id, status, req.expected_version)
        .await
    {
        Ok(issue) => issue_response(&state, issue, StatusCode::OK).await,
        Err(err) => maintenance_error(err),
    }
}

pub async fn delete_issue(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<IssuePath>,
) -> Response {
    let caller = match require_caller(&state, &headers).await {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    if let Err(response) = require_permission(&caller.actor, Permission::CrudIssues) {
        return response;
    }

    match state.maintenance.delete_issue(&caller, &path.issue_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => maintenance_error(err),
    }
}
