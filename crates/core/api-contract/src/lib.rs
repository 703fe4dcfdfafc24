//! 稳定的 DTO 与 API 响应契约。
//!
//! 所有 JSON 字段使用 camelCase；枚举值（状态、优先级、类别等）以 snake_case 字符串传输，
//! 由 API 层解析为领域类型。调用方无 `view_costs` 权限时费用字段为 null，字段集合不随查看者变化。

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 错误码。
pub mod codes {
    pub const UNAUTHORIZED: &str = "AUTH.UNAUTHORIZED";
    pub const FORBIDDEN: &str = "AUTH.FORBIDDEN";
    pub const INVALID_REQUEST: &str = "INVALID.REQUEST";
    pub const NOT_FOUND: &str = "RESOURCE.NOT_FOUND";
    pub const CONFLICT: &str = "RESOURCE.CONFLICT";
    pub const INTERNAL: &str = "INTERNAL.ERROR";
}

/// 标准 API 响应封装。
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

/// 失败响应的错误体。
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                code: code.into(),
                message: message.into(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// 认证
// ---------------------------------------------------------------------------

/// 登录请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// 登录响应体。
///
/// `permissions` 为登录时解析出的有效权限，仅供前端渲染；
/// 后续请求的权限仍由服务端按存储状态重新解析。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires: u64,
    pub user_id: String,
    pub username: String,
    pub is_superuser: bool,
    pub role: Option<String>,
    pub permissions: Vec<String>,
}

/// 刷新 token 请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    #[serde(alias = "refresh_token")]
    pub refresh_token: String,
}

/// 刷新 token 响应体。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires: u64,
}

/// 当前访问者的有效权限。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentActorDto {
    pub authenticated: bool,
    pub username: String,
    pub role: Option<String>,
    pub permissions: Vec<String>,
}

// ---------------------------------------------------------------------------
// 故障单
// ---------------------------------------------------------------------------

/// 故障单列表查询参数。
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueListQuery {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub category: Option<String>,
    /// 部门编号前缀。
    pub department: Option<String>,
    pub machine: Option<String>,
    pub is_runnable: Option<bool>,
    pub search: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIssueRequest {
    pub machine_id_ref: String,
    pub category: String,
    pub priority: Option<String>,
    pub alarm_code: Option<String>,
    pub description: String,
    pub is_runnable: bool,
    pub reported_by: Option<String>,
    pub auto_title: Option<String>,
}

/// 故障单部分更新；`expectedVersion` 用于乐观并发校验。
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateIssueRequest {
    pub machine_id_ref: Option<String>,
    pub category: Option<String>,
    pub priority: Option<String>,
    pub status: Option<String>,
    pub alarm_code: Option<String>,
    pub description: Option<String>,
    pub is_runnable: Option<bool>,
    pub auto_title: Option<String>,
    pub ai_summary: Option<String>,
    pub expected_version: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub status: String,
    pub expected_version: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueDto {
    pub issue_id: String,
    pub machine_id_ref: String,
    pub machine_name: String,
    pub department_name: String,
    pub category: String,
    pub priority: String,
    pub status: String,
    pub alarm_code: Option<String>,
    pub description: String,
    pub ai_summary: String,
    pub auto_title: String,
    pub is_runnable: bool,
    pub reported_by: String,
    pub downtime_start: Option<DateTime<Utc>>,
    pub downtime_end: Option<DateTime<Utc>>,
    /// 当前区间的停机小时数。
    pub downtime_hours: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remedies_count: Option<usize>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DowntimeEpisodeDto {
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub hours: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueDetailDto {
    #[serde(flatten)]
    pub issue: IssueDto,
    /// 历史区间与当前区间之和。
    pub total_downtime_hours: f64,
    pub downtime_episodes: Vec<DowntimeEpisodeDto>,
    pub remedies: Vec<RemedyDto>,
    pub attachments: Vec<AttachmentDto>,
}

// ---------------------------------------------------------------------------
// 维修措施
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemedyRequest {
    pub description: String,
    pub technician_name: String,
    #[serde(default)]
    pub is_external: bool,
    pub phone_number: Option<String>,
    pub is_machine_runnable: bool,
    #[serde(default)]
    pub parts_purchased: String,
    pub labor_cost: Option<Decimal>,
    pub parts_cost: Option<Decimal>,
    /// 仅新增时使用：目标故障单的期望版本。
    pub expected_version: Option<i64>,
}

/// 费用明细；调用方不可见时三项均为 null。
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemedyCostDto {
    pub labor_cost: Option<Decimal>,
    pub parts_cost: Option<Decimal>,
    pub total_cost: Option<Decimal>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemedyDto {
    pub remedy_id: String,
    pub issue_id: String,
    pub description: String,
    pub technician_name: String,
    pub is_external: bool,
    pub phone_number: Option<String>,
    pub is_machine_runnable: bool,
    pub parts_purchased: String,
    #[serde(flatten)]
    pub cost: RemedyCostDto,
    pub attachments: Vec<AttachmentDto>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 新增维修措施的结果：更新后的故障单与新措施。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemedyAddedDto {
    pub issue: IssueDto,
    pub remedy: RemedyDto,
}

// ---------------------------------------------------------------------------
// 附件
// ---------------------------------------------------------------------------

/// 上传参数（查询串）；请求体为文件原始字节。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentUploadQuery {
    pub file_name: String,
    pub file_type: String,
    pub purpose: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentDto {
    pub attachment_id: String,
    pub issue_id: Option<String>,
    pub remedy_id: Option<String>,
    pub file_path: String,
    pub file_name: String,
    pub file_size: i64,
    pub file_type: String,
    pub purpose: String,
    pub uploaded_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// 看板与报表
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardQueryParams {
    pub days: Option<u32>,
    pub department: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyTrendDto {
    pub date: NaiveDate,
    pub issues: usize,
    pub resolved: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentSummaryDto {
    pub department_id: String,
    pub name: String,
    pub total_issues: usize,
    pub open_issues: usize,
    pub resolved_issues: usize,
    pub downtime_hours: f64,
    pub total_cost: Option<Decimal>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardDto {
    pub days: u32,
    pub total_issues: usize,
    pub open_issues: usize,
    pub resolved_issues: usize,
    pub on_hold_issues: usize,
    pub high_priority_issues: usize,
    pub total_downtime_hours: f64,
    pub avg_downtime_per_issue: f64,
    pub daily_trend: Vec<DailyTrendDto>,
    pub department_breakdown: Vec<DepartmentSummaryDto>,
    pub total_cost: Option<Decimal>,
    pub avg_cost_per_issue: Option<Decimal>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueReportDto {
    pub issue: IssueDto,
    pub machine_name: String,
    pub department_name: String,
    pub remedies: Vec<RemedyDto>,
    pub downtime_hours: f64,
    pub total_downtime_hours: f64,
    pub downtime_episodes: Vec<DowntimeEpisodeDto>,
    pub total_cost: Option<Decimal>,
    pub generated_by: String,
    pub generated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// 权限管理
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionDto {
    pub codename: String,
    pub name: String,
    pub category: String,
    pub description: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionCategoryDto {
    pub category: String,
    pub permissions: Vec<PermissionDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleDto {
    pub role_code: String,
    pub name: String,
    pub description: String,
    pub is_active: bool,
    pub is_public_role: bool,
    pub permissions: Vec<String>,
    pub user_count: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoleRequest {
    pub role_code: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// 以现有角色为模板复制出新角色。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloneRoleRequest {
    pub role_code: String,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionListRequest {
    pub permissions: Vec<String>,
}

/// 权限矩阵：行为角色，列为权限码。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionMatrixDto {
    pub permissions: Vec<PermissionDto>,
    pub roles: Vec<PermissionMatrixRowDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionMatrixRowDto {
    pub role_code: String,
    pub name: String,
    pub granted: BTreeMap<String, bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub user_id: String,
    pub username: String,
    pub email: Option<String>,
    pub is_superuser: bool,
    pub is_active: bool,
    pub role: Option<String>,
    pub permission_overrides: BTreeMap<String, bool>,
    pub can_view_costs: bool,
    pub can_view_external_contacts: bool,
    pub all_permissions: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    pub email: Option<String>,
    pub role: Option<String>,
    #[serde(default)]
    pub is_superuser: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRoleRequest {
    pub role: String,
}

/// 设置单个权限覆盖：`granted = true` 授予，`false` 收回。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetOverrideRequest {
    pub permission: String,
    pub granted: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicRoleDto {
    pub is_active: bool,
    pub permissions: Vec<String>,
}

// ---------------------------------------------------------------------------
// 全局设置
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalSettingsDto {
    pub max_update_text_length: i32,
    pub max_attachments_per_issue: i32,
    pub max_attachments_per_remedy: i32,
    pub max_video_resolution_height: i32,
    pub max_video_quality_crf: i32,
    pub max_file_size_mb: i32,
    pub updated_by: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettingsRequest {
    pub max_update_text_length: Option<i32>,
    pub max_attachments_per_issue: Option<i32>,
    pub max_attachments_per_remedy: Option<i32>,
    pub max_video_resolution_height: Option<i32>,
    pub max_video_quality_crf: Option<i32>,
    pub max_file_size_mb: Option<i32>,
}

// ---------------------------------------------------------------------------
// 审计与指标
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogQueryParams {
    pub issue_id: Option<String>,
    pub action: Option<String>,
    pub user_id: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogDto {
    pub audit_id: String,
    pub action: String,
    pub description: String,
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub issue_id: Option<String>,
    pub remedy_id: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshotDto {
    pub issues_created: u64,
    pub issues_updated: u64,
    pub issues_deleted: u64,
    pub remedies_added: u64,
    pub attachments_stored: u64,
    pub attachments_rolled_back: u64,
    pub permission_denials: u64,
    pub optimistic_conflicts: u64,
    pub reports_generated: u64,
    pub issue_save_latency_ms_total: u64,
    pub issue_save_latency_ms_count: u64,
}
