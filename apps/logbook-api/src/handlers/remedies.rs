//! 维修措施 handlers
//!
//! - `POST /issues/:issue_id/remedies`：新增，同时驱动故障单状态（`crud_remedies`）
//! - `GET /remedies/:remedy_id`：按查看者脱敏后返回
//! - `PUT /remedies/:remedy_id`：整体替换可编辑字段（`crud_remedies`）
//! - `DELETE /remedies/:remedy_id`：删除（`crud_remedies`）

use crate::AppState;
use crate::handlers::issues::IssuePath;
use crate::middleware::{require_caller, require_permission};
use crate::utils::response::{issue_summary_to_dto, maintenance_error, remedy_to_dto};
use api_contract::{ApiResponse, RemedyAddedDto, RemedyRequest};
use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use domain::Permission;
use logbook_maintenance::{RemedyInput, redact_remedy};

#[derive(Debug, serde::Deserialize)]
pub struct RemedyPath {
    pub remedy_id: String,
}

fn remedy_input(req: RemedyRequest) -> (RemedyInput, Option<i64>) {
    (
        RemedyInput {
            description: req.description,
            technician_name: req.technician_name,
            is_external: req.is_external,
            phone_number: req.phone_number,
            is_machine_runnable: req.is_machine_runnable,
            parts_purchased: req.parts_purchased,
            labor_cost: req.labor_cost,
            parts_cost: req.parts_cost,
        },
        req.expected_version,
    )
}

pub async fn add_remedy(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<IssuePath>,
    Json(req): Json<RemedyRequest>,
) -> Response {
    let caller = match require_caller(&state, &headers).await {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    if let Err(response) = require_permission(&caller.actor, Permission::CrudRemedies) {
        return response;
    }

    let (input, expected_version) = remedy_input(req);
    let (issue, remedy) = match state
        .maintenance
        .add_remedy(&caller, &path.issue_id, input, expected_version)
        .await
    {
        Ok(result) => result,
        Err(err) => return maintenance_error(err),
    };
    let summary = match state.maintenance.describe_issue(issue).await {
        Ok(summary) => summary,
        Err(err) => return maintenance_error(err),
    };
    let dto = RemedyAddedDto {
        issue: issue_summary_to_dto(summary),
        remedy: remedy_to_dto(redact_remedy(&remedy, &caller.viewer()), Vec::new()),
    };
    (StatusCode::CREATED, Json(ApiResponse::success(dto))).into_response()
}

pub async fn get_remedy(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<RemedyPath>,
) -> Response {
    let caller = match require_caller(&state, &headers).await {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    match state
        .maintenance
        .remedy_detail(&caller.viewer(), &path.remedy_id)
        .await
    {
        Ok(entry) => (
            StatusCode::OK,
            Json(ApiResponse::success(remedy_to_dto(
                entry.remedy,
                entry.attachments,
            ))),
        )
            .into_response(),
        Err(err) => maintenance_error(err),
    }
}

pub async fn update_remedy(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<RemedyPath>,
    Json(req): Json<RemedyRequest>,
) -> Response {
    let caller = match require_caller(&state, &headers).await {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    if let Err(response) = require_permission(&caller.actor, Permission::CrudRemedies) {
        return response;
    }

    let (input, _) = remedy_input(req);
    if let Err(err) = state
        .maintenance
        .update_remedy(&caller, &path.remedy_id, input)
        .await
    {
        return maintenance_error(err);
    }
    // 重新读取以带上附件列表
    match state
        .maintenance
        .remedy_detail(&caller.viewer(), &path.remedy_id)
        .await
    {
        Ok(entry) => (
            StatusCode::OK,
            Json(ApiResponse::success(remedy_to_dto(
                entry.remedy,
                entry.attachments,
            ))),
        )
            .into_response(),
        Err(err) => maintenance_error(err),
    }
}

pub async fn delete_remedy(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<RemedyPath>,
) -> Response {
    let caller = match require_caller(&state, &headers).await {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    if let Err(response) = require_permission(&caller.actor, Permission::CrudRemedies) {
        return response;
    }

    match state
        .maintenance
        .delete_remedy(&caller, &path.remedy_id)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => maintenance_error(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{bearer, state};
    use domain::{Actor, IssueCategory, IssuePriority, PublicGrant};
    use logbook_maintenance::{Caller, NewIssue};
    use serde_json::{Value, json};

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("json")
    }

    #[tokio::test]
    async fn costs_and_contacts_hidden_from_anonymous() {
        let state = state();
        let reporter = Caller::new(Actor::Anonymous(PublicGrant::Unavailable));
        let issue = state
            .maintenance
            .create_issue(
                &reporter,
                NewIssue {
                    machine_id_ref: "D2-LATHE-03".to_string(),
                    category: IssueCategory::Mechanical,
                    priority: IssuePriority::High,
                    alarm_code: Some("E-221".to_string()),
                    description: "Chuck slipping under load".to_string(),
                    is_runnable: false,
                    reported_by: None,
                    auto_title: None,
                },
            )
            .await
            .expect("issue");

        let admin = bearer(&state, "admin", "admin123").await;
        let req: RemedyRequest = serde_json::from_value(json!({
            "description": "Replaced jaw inserts",
            "technicianName": "Vendor Tech",
            "isExternal": true,
            "phoneNumber": "555-010-2000",
            "isMachineRunnable": true,
            "laborCost": 120.5,
            "partsCost": 80
        }))
        .expect("request");
        let response = add_remedy(
            State(state.clone()),
            admin,
            Path(IssuePath {
                issue_id: issue.issue_id.clone(),
            }),
            Json(req),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let added = body_json(response).await;
        assert_eq!(added["data"]["remedy"]["totalCost"].as_f64(), Some(200.5));
        let remedy_id = added["data"]["remedy"]["remedyId"]
            .as_str()
            .expect("remedy id")
            .to_string();

        let response = get_remedy(
            State(state),
            HeaderMap::new(),
            Path(RemedyPath { remedy_id }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let viewed = body_json(response).await;
        let remedy = &viewed["data"];
        assert_eq!(remedy.get("laborCost"), Some(&Value::Null));
        assert_eq!(remedy.get("totalCost"), Some(&Value::Null));
        assert!(remedy["phoneNumber"].is_null());
    }

    #[tokio::test]
    async fn operator_cannot_add_remedy() {
        let state = state();
        crate::test_support::add_user(&state, "op3", "operator-pass", "operator").await;
        let headers = bearer(&state, "op3", "operator-pass").await;
        let req: RemedyRequest = serde_json::from_value(json!({
            "description": "Tightened belt",
            "technicianName": "Op",
            "isMachineRunnable": true
        }))
        .expect("request");
        let response = add_remedy(
            State(state),
            headers,
            Path(IssuePath {
                issue_id: "any".to_string(),
            }),
            Json(req),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
