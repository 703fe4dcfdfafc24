//! 全局设置与公共角色 handlers（需要 `configure_limits`）

use super::write_audit;
use crate::AppState;
use crate::middleware::require_authorized;
use crate::utils::response::{
    bad_request_error, permission_codes, public_role_to_dto, settings_to_dto, storage_error,
};
use crate::utils::validation::parse_permissions;
use api_contract::{ApiResponse, PermissionListRequest, UpdateSettingsRequest};
use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use domain::{AuditAction, Permission};
use logbook_storage::GlobalSettingsUpdate;
use serde_json::json;

/// 所有限制值必须为正数。
fn validate_limits(req: &UpdateSettingsRequest) -> Result<(), Response> {
    let fields = [
        ("maxUpdateTextLength", req.max_update_text_length),
        ("maxAttachmentsPerIssue", req.max_attachments_per_issue),
        ("maxAttachmentsPerRemedy", req.max_attachments_per_remedy),
        ("maxVideoResolutionHeight", req.max_video_resolution_height),
        ("maxVideoQualityCrf", req.max_video_quality_crf),
        ("maxFileSizeMb", req.max_file_size_mb),
    ];
    for (field, value) in fields {
        if let Some(value) = value {
            if value <= 0 {
                return Err(bad_request_error(format!("{field} must be positive")));
            }
        }
    }
    Ok(())
}

pub async fn get_settings(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(response) = require_authorized(&state, &headers, Permission::ConfigureLimits).await
    {
        return response;
    }
    match state.settings_store.load_settings().await {
        Ok(record) => (
            StatusCode::OK,
            Json(ApiResponse::success(settings_to_dto(record))),
        )
            .into_response(),
        Err(err) => storage_error(err),
    }
}

pub async fn update_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<UpdateSettingsRequest>,
) -> Response {
    let caller =
        match require_authorized(&state, &headers, Permission::ConfigureLimits).await {
            Ok(caller) => caller,
            Err(response) => return response,
        };
    if let Err(response) = validate_limits(&req) {
        return response;
    }

    let update = GlobalSettingsUpdate {
        max_update_text_length: req.max_update_text_length,
        max_attachments_per_issue: req.max_attachments_per_issue,
        max_attachments_per_remedy: req.max_attachments_per_remedy,
        max_video_resolution_height: req.max_video_resolution_height,
        max_video_quality_crf: req.max_video_quality_crf,
        max_file_size_mb: req.max_file_size_mb,
        updated_by: Some(caller.actor.display_name().to_string()),
    };
    let record = match state.settings_store.update_settings(update).await {
        Ok(record) => record,
        Err(err) => return storage_error(err),
    };
    tracing::info!(updated_by = caller.actor.display_name(), "global_settings_updated");
    write_audit(
        &state,
        &caller,
        AuditAction::Other,
        "Global settings updated".to_string(),
        json!({
            "max_update_text_length": record.max_update_text_length,
            "max_attachments_per_issue": record.max_attachments_per_issue,
            "max_attachments_per_remedy": record.max_attachments_per_remedy,
            "max_file_size_mb": record.max_file_size_mb,
        }),
    )
    .await;
    (
        StatusCode::OK,
        Json(ApiResponse::success(settings_to_dto(record))),
    )
        .into_response()
}

pub async fn get_public_role(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(response) = require_authorized(&state, &headers, Permission::ConfigureLimits).await
    {
        return response;
    }
    match state.rbac_store.load_public_role().await {
        Ok(record) => (
            StatusCode::OK,
            Json(ApiResponse::success(public_role_to_dto(record))),
        )
            .into_response(),
        Err(err) => storage_error(err),
    }
}

/// 整体替换匿名访问者的权限集合。
pub async fn set_public_role_permissions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<PermissionListRequest>,
) -> Response {
    let caller =
        match require_authorized(&state, &headers, Permission::ConfigureLimits).await {
            Ok(caller) => caller,
            Err(response) => return response,
        };
    let permissions = match parse_permissions(&req.permissions) {
        Ok(value) => value,
        Err(response) => return response,
    };
    let record = match state.rbac_store.set_public_permissions(permissions).await {
        Ok(record) => record,
        Err(err) => return storage_error(err),
    };
    write_audit(
        &state,
        &caller,
        AuditAction::PermissionChanged,
        "Public role permissions replaced".to_string(),
        json!({ "permissions": permission_codes(&record.permissions) }),
    )
    .await;
    (
        StatusCode::OK,
        Json(ApiResponse::success(public_role_to_dto(record))),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_positive_limits_are_rejected() {
        let req = UpdateSettingsRequest {
            max_update_text_length: Some(500),
            max_attachments_per_issue: Some(0),
            max_attachments_per_remedy: None,
            max_video_resolution_height: None,
            max_video_quality_crf: None,
            max_file_size_mb: None,
        };
        let response = validate_limits(&req).expect_err("zero limit");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn partial_update_passes() {
        let req = UpdateSettingsRequest {
            max_update_text_length: None,
            max_attachments_per_issue: None,
            max_attachments_per_remedy: Some(3),
            max_video_resolution_height: None,
            max_video_quality_crf: None,
            max_file_size_mb: Some(50),
        };
        assert!(validate_limits(&req).is_ok());
    }
}
