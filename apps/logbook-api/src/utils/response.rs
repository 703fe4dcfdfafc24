//! HTTP 响应辅助函数和 DTO 转换
//!
//! - 错误响应：auth_error, forbidden_error, bad_request_error, not_found_error, conflict_error,
//!   internal_auth_error, storage_error, maintenance_error
//! - DTO 转换：故障单、维修措施（已脱敏）、附件、看板、报表、角色、用户、设置、审计
//!
//! 所有错误返回统一的 ApiResponse 格式，HTTP 状态码与错误码一一对应。

use api_contract::{
    ApiResponse, AttachmentDto, AuditLogDto, DailyTrendDto, DashboardDto, DepartmentSummaryDto,
    DowntimeEpisodeDto, GlobalSettingsDto, IssueDetailDto, IssueDto, IssueReportDto,
    PermissionDto, PublicRoleDto, RemedyCostDto, RemedyDto, RoleDto, codes,
};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use domain::Permission;
use logbook_auth::AuthError;
use logbook_maintenance::{
    ClosedInterval, DashboardMetrics, IssueDetail, IssueReport, IssueSummary, MaintenanceError,
    RemedyView,
};
use logbook_storage::{
    AttachmentRecord, AuditLogRecord, GlobalSettingsRecord, IssueRecord, PermissionRecord,
    PublicRoleRecord, RoleRecord, StorageError, StorageErrorKind,
};
use std::collections::BTreeSet;

fn error_response(status: StatusCode, code: &str, message: impl Into<String>) -> Response {
    (status, Json(ApiResponse::<()>::error(code, message.into()))).into_response()
}

/// 认证错误响应
pub fn auth_error(status: StatusCode) -> Response {
    error_response(status, codes::UNAUTHORIZED, "unauthorized")
}

/// 禁止访问错误响应
pub fn forbidden_error() -> Response {
    error_response(StatusCode::FORBIDDEN, codes::FORBIDDEN, "forbidden")
}

/// 错误请求响应
pub fn bad_request_error(message: impl Into<String>) -> Response {
    error_response(StatusCode::BAD_REQUEST, codes::INVALID_REQUEST, message)
}

/// 资源未找到错误响应
pub fn not_found_error() -> Response {
    error_response(StatusCode::NOT_FOUND, codes::NOT_FOUND, "not found")
}

/// 并发修改冲突（客户端应重新读取后重试）
pub fn conflict_error(message: impl Into<String>) -> Response {
    error_response(StatusCode::CONFLICT, codes::CONFLICT, message)
}

/// 认证内部错误响应
pub fn internal_auth_error(err: AuthError) -> Response {
    match err {
        AuthError::WeakPassword(_) => bad_request_error(err.to_string()),
        err => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::INTERNAL,
            err.to_string(),
        ),
    }
}

/// 存储错误响应
pub fn storage_error(err: StorageError) -> Response {
    match err.kind() {
        StorageErrorKind::Conflict => conflict_error(err.message()),
        StorageErrorKind::Invalid => bad_request_error(err.message()),
        StorageErrorKind::NotFound => not_found_error(),
        StorageErrorKind::Backend => {
            tracing::error!(error = %err, "storage_error");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::INTERNAL,
                err.to_string(),
            )
        }
    }
}

/// 维修服务错误响应
pub fn maintenance_error(err: MaintenanceError) -> Response {
    match err {
        MaintenanceError::Invalid(message) => bad_request_error(message),
        MaintenanceError::NotFound(_) => not_found_error(),
        MaintenanceError::Conflict(message) => conflict_error(message),
        MaintenanceError::Timeout => error_response(
            StatusCode::REQUEST_TIMEOUT,
            codes::INVALID_REQUEST,
            "attachment processing timed out",
        ),
        MaintenanceError::Storage(message) => {
            tracing::error!(error = %message, "maintenance_storage_error");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, codes::INTERNAL, message)
        }
    }
}

pub fn permission_codes(permissions: &BTreeSet<Permission>) -> Vec<String> {
    permissions
        .iter()
        .map(|permission| permission.codename().to_string())
        .collect()
}

fn issue_dto(
    issue: IssueRecord,
    machine_name: String,
    department_name: String,
    downtime_hours: f64,
    remedies_count: Option<usize>,
) -> IssueDto {
    IssueDto {
        issue_id: issue.issue_id,
        machine_id_ref: issue.machine_id_ref.to_string(),
        machine_name,
        department_name,
        category: issue.category.as_str().to_string(),
        priority: issue.priority.as_str().to_string(),
        status: issue.status.as_str().to_string(),
        alarm_code: issue.alarm_code,
        description: issue.description,
        ai_summary: issue.ai_summary,
        auto_title: issue.auto_title,
        is_runnable: issue.is_runnable,
        reported_by: issue.reported_by,
        downtime_start: issue.downtime_start,
        downtime_end: issue.downtime_end,
        downtime_hours,
        remedies_count,
        created_at: issue.created_at,
        updated_at: issue.updated_at,
        version: issue.version,
    }
}

pub fn issue_summary_to_dto(summary: IssueSummary) -> IssueDto {
    issue_dto(
        summary.issue,
        summary.machine_name,
        summary.department_name,
        summary.downtime_hours,
        Some(summary.remedies_count),
    )
}

pub fn episode_to_dto(episode: ClosedInterval) -> DowntimeEpisodeDto {
    DowntimeEpisodeDto {
        hours: episode.hours(),
        started_at: episode.start,
        ended_at: episode.end,
    }
}

pub fn attachment_to_dto(record: AttachmentRecord) -> AttachmentDto {
    AttachmentDto {
        attachment_id: record.attachment_id,
        issue_id: record.parent.issue_id().map(str::to_string),
        remedy_id: record.parent.remedy_id().map(str::to_string),
        file_path: record.file_path,
        file_name: record.file_name,
        file_size: record.file_size,
        file_type: record.file_type.as_str().to_string(),
        purpose: record.purpose.as_str().to_string(),
        uploaded_at: record.uploaded_at,
    }
}

/// 已脱敏的维修措施转 DTO；费用不可见时整体省略。
pub fn remedy_to_dto(view: RemedyView, attachments: Vec<AttachmentRecord>) -> RemedyDto {
    RemedyDto {
        remedy_id: view.remedy_id,
        issue_id: view.issue_id,
        description: view.description,
        technician_name: view.technician_name,
        is_external: view.is_external,
        phone_number: view.phone_number,
        is_machine_runnable: view.is_machine_runnable,
        parts_purchased: view.parts_purchased,
        cost: view
            .cost
            .map(|cost| RemedyCostDto {
                labor_cost: cost.labor_cost,
                parts_cost: cost.parts_cost,
                total_cost: cost.total_cost,
            })
            .unwrap_or_default(),
        attachments: attachments.into_iter().map(attachment_to_dto).collect(),
        created_at: view.created_at,
        updated_at: view.updated_at,
    }
}

pub fn issue_detail_to_dto(detail: IssueDetail) -> IssueDetailDto {
    let machine_name =
        logbook_maintenance::report::machine_name(&detail.issue, detail.machine.as_ref());
    let remedies_count = detail.remedies.len();
    IssueDetailDto {
        issue: issue_dto(
            detail.issue,
            machine_name,
            detail.department_name,
            detail.downtime_hours,
            Some(remedies_count),
        ),
        total_downtime_hours: detail.total_downtime_hours,
        downtime_episodes: detail
            .downtime_episodes
            .into_iter()
            .map(episode_to_dto)
            .collect(),
        remedies: detail
            .remedies
            .into_iter()
            .map(|entry| remedy_to_dto(entry.remedy, entry.attachments))
            .collect(),
        attachments: detail
            .attachments
            .into_iter()
            .map(attachment_to_dto)
            .collect(),
    }
}

pub fn dashboard_to_dto(metrics: DashboardMetrics) -> DashboardDto {
    DashboardDto {
        days: metrics.days,
        total_issues: metrics.total_issues,
        open_issues: metrics.open_issues,
        resolved_issues: metrics.resolved_issues,
        on_hold_issues: metrics.on_hold_issues,
        high_priority_issues: metrics.high_priority_issues,
        total_downtime_hours: metrics.total_downtime_hours,
        avg_downtime_per_issue: metrics.avg_downtime_per_issue,
        daily_trend: metrics
            .daily_trend
            .into_iter()
            .map(|day| DailyTrendDto {
                date: day.date,
                issues: day.issues,
                resolved: day.resolved,
            })
            .collect(),
        department_breakdown: metrics
            .department_breakdown
            .into_iter()
            .map(|department| DepartmentSummaryDto {
                department_id: department.department_id,
                name: department.name,
                total_issues: department.total_issues,
                open_issues: department.open_issues,
                resolved_issues: department.resolved_issues,
                downtime_hours: department.downtime_hours,
                total_cost: department.total_cost,
            })
            .collect(),
        total_cost: metrics.total_cost,
        avg_cost_per_issue: metrics.avg_cost_per_issue,
    }
}

pub fn report_to_dto(report: IssueReport) -> IssueReportDto {
    let remedies_count = report.remedies.len();
    IssueReportDto {
        issue: issue_dto(
            report.issue,
            report.machine_name.clone(),
            report.department_name.clone(),
            report.downtime_hours,
            Some(remedies_count),
        ),
        machine_name: report.machine_name,
        department_name: report.department_name,
        remedies: report
            .remedies
            .into_iter()
            .map(|view| remedy_to_dto(view, Vec::new()))
            .collect(),
        downtime_hours: report.downtime_hours,
        total_downtime_hours: report.total_downtime_hours,
        downtime_episodes: report
            .downtime_episodes
            .into_iter()
            .map(episode_to_dto)
            .collect(),
        total_cost: report.total_cost,
        generated_by: report.generated_by,
        generated_at: report.generated_at,
    }
}

pub fn permission_to_dto(record: PermissionRecord) -> PermissionDto {
    PermissionDto {
        codename: record.permission.codename().to_string(),
        name: record.name,
        category: record.category,
        description: record.description,
    }
}

pub fn role_to_dto(record: RoleRecord, user_count: usize) -> RoleDto {
    RoleDto {
        permissions: permission_codes(&record.permissions),
        role_code: record.role_code,
        name: record.name,
        description: record.description,
        is_active: record.is_active,
        is_public_role: record.is_public_role,
        user_count,
    }
}

pub fn public_role_to_dto(record: PublicRoleRecord) -> PublicRoleDto {
    PublicRoleDto {
        is_active: record.is_active,
        permissions: permission_codes(&record.permissions),
    }
}

pub fn settings_to_dto(record: GlobalSettingsRecord) -> GlobalSettingsDto {
    GlobalSettingsDto {
        max_update_text_length: record.max_update_text_length,
        max_attachments_per_issue: record.max_attachments_per_issue,
        max_attachments_per_remedy: record.max_attachments_per_remedy,
        max_video_resolution_height: record.max_video_resolution_height,
        max_video_quality_crf: record.max_video_quality_crf,
        max_file_size_mb: record.max_file_size_mb,
        updated_by: record.updated_by,
        updated_at: record.updated_at,
    }
}

pub fn audit_log_to_dto(record: AuditLogRecord) -> AuditLogDto {
    AuditLogDto {
        audit_id: record.audit_id,
        action: record.action.as_str().to_string(),
        description: record.description,
        user_id: record.user_id,
        username: record.username,
        issue_id: record.issue_id,
        remedy_id: record.remedy_id,
        ip_address: record.ip_address,
        user_agent: record.user_agent,
        metadata: record.metadata,
        created_at: record.created_at,
    }
}
