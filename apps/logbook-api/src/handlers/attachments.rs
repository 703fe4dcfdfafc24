//! 附件 handlers
//!
//! 上传使用原始请求体，文件名/类型/用途放在 query 中：
//! `POST /issues/:issue_id/attachments?fileName=a.jpg&fileType=image&purpose=photo`

use crate::AppState;
use crate::handlers::issues::IssuePath;
use crate::handlers::remedies::RemedyPath;
use crate::middleware::{require_caller, require_permission};
use crate::utils::response::{attachment_to_dto, maintenance_error};
use crate::utils::validation::{normalize_required, parse_choice, parse_optional_choice};
use api_contract::{ApiResponse, AttachmentUploadQuery};
use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use domain::{AttachmentKind, AttachmentPurpose, Permission};
use logbook_maintenance::{AttachmentUpload, Caller};

#[derive(Debug, serde::Deserialize)]
pub struct AttachmentPath {
    pub attachment_id: String,
}

fn upload_from_query(query: AttachmentUploadQuery, body: Bytes) -> Result<AttachmentUpload, Response> {
    let file_name = normalize_required(query.file_name, "fileName")?;
    let file_type = parse_choice::<AttachmentKind>(&query.file_type)?;
    let purpose = parse_optional_choice::<AttachmentPurpose>(query.purpose.as_deref())?;
    Ok(AttachmentUpload {
        file_name,
        file_type,
        purpose: purpose.unwrap_or_default(),
        bytes: body.to_vec(),
    })
}

async fn store_upload(
    state: &AppState,
    caller: &Caller,
    issue_id: Option<&str>,
    remedy_id: Option<&str>,
    upload: AttachmentUpload,
) -> Response {
    match state
        .maintenance
        .add_attachment(caller, issue_id, remedy_id, upload)
        .await
    {
        Ok(record) => (
            StatusCode::CREATED,
            Json(ApiResponse::success(attachment_to_dto(record))),
        )
            .into_response(),
        Err(err) => maintenance_error(err),
    }
}

pub async fn upload_issue_attachment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<IssuePath>,
    Query(query): Query<AttachmentUploadQuery>,
    body: Bytes,
) -> Response {
    let caller = match require_caller(&state, &headers).await {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    if let Err(response) = require_permission(&caller.actor, Permission::CrudIssues) {
        return response;
    }
    let upload = match upload_from_query(query, body) {
        Ok(upload) => upload,
        Err(response) => return response,
    };
    store_upload(&state, &caller, Some(&path.issue_id), None, upload).await
}

pub async fn upload_remedy_attachment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<RemedyPath>,
    Query(query): Query<AttachmentUploadQuery>,
    body: Bytes,
) -> Response {
    let caller = match require_caller(&state, &headers).await {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    if let Err(response) = require_permission(&caller.actor, Permission::CrudRemedies) {
        return response;
    }
    let upload = match upload_from_query(query, body) {
        Ok(upload) => upload,
        Err(response) => return response,
    };
    store_upload(&state, &caller, None, Some(&path.remedy_id), upload).await
}

pub async fn delete_attachment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<AttachmentPath>,
) -> Response {
    let caller = match require_caller(&state, &headers).await {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    if let Err(response) = require_permission(&caller.actor, Permission::CrudIssues) {
        return response;
    }

    match state
        .maintenance
        .delete_attachment(&caller, &path.attachment_id)
        .await
    {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => maintenance_error(err),
    }
}
