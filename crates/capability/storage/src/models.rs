//! 存储数据模型
//!
//! 存储层的记录结构，与数据库表一一对应；
//! 时间字段统一为 `DateTime<Utc>`，费用字段为 `Decimal`。

use chrono::{DateTime, Utc};
use domain::{
    AttachmentKind, AttachmentPurpose, AuditAction, IssueCategory, IssuePriority, IssueStatus,
    MachineRef, Permission, PermissionOverrides,
};
use rust_decimal::Decimal;
use std::collections::BTreeSet;

/// 用户记录（含口令哈希）。
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub user_id: String,
    pub username: String,
    pub password: String,
    pub email: Option<String>,
    pub is_superuser: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct UserCreate {
    pub user_id: String,
    pub username: String,
    /// 已哈希的口令。
    pub password: String,
    pub email: Option<String>,
    pub is_superuser: bool,
}

/// 权限目录条目。
#[derive(Debug, Clone)]
pub struct PermissionRecord {
    pub permission: Permission,
    pub name: String,
    pub category: String,
    pub description: String,
}

impl PermissionRecord {
    pub fn from_permission(permission: Permission) -> Self {
        Self {
            permission,
            name: permission.display_name().to_string(),
            category: permission.category().to_string(),
            description: permission.description(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RoleRecord {
    pub role_code: String,
    pub name: String,
    pub description: String,
    pub is_active: bool,
    pub is_public_role: bool,
    pub permissions: BTreeSet<Permission>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RoleCreate {
    pub role_code: String,
    pub name: String,
    pub description: String,
    pub permissions: BTreeSet<Permission>,
}

/// 用户 → 角色（每个用户至多一条）。
#[derive(Debug, Clone)]
pub struct UserRoleRecord {
    pub user_id: String,
    pub role_code: String,
    pub permission_overrides: PermissionOverrides,
    /// 兼容旧数据的标志，仅存储与展示，不参与权限解析。
    pub can_view_costs: bool,
    pub can_view_external_contacts: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 用户角色连同角色本身（权限解析的输入）。
#[derive(Debug, Clone)]
pub struct RoleAssignment {
    pub user_role: UserRoleRecord,
    pub role: RoleRecord,
}

/// 公共角色（单例）。
#[derive(Debug, Clone)]
pub struct PublicRoleRecord {
    pub is_active: bool,
    pub permissions: BTreeSet<Permission>,
}

impl PublicRoleRecord {
    pub fn seeded() -> Self {
        Self {
            is_active: true,
            permissions: domain::permissions::DEFAULT_PUBLIC_PERMISSIONS
                .into_iter()
                .collect(),
        }
    }
}

/// 全局设置（单例）。
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalSettingsRecord {
    pub max_update_text_length: i32,
    pub max_attachments_per_issue: i32,
    pub max_attachments_per_remedy: i32,
    pub max_video_resolution_height: i32,
    pub max_video_quality_crf: i32,
    pub max_file_size_mb: i32,
    pub updated_by: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl GlobalSettingsRecord {
    pub fn defaults(now: DateTime<Utc>) -> Self {
        Self {
            max_update_text_length: 2000,
            max_attachments_per_issue: 10,
            max_attachments_per_remedy: 5,
            max_video_resolution_height: 720,
            max_video_quality_crf: 28,
            max_file_size_mb: 50,
            updated_by: None,
            updated_at: now,
        }
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        u64::try_from(self.max_file_size_mb).unwrap_or(0) * 1024 * 1024
    }
}

/// 全局设置的部分更新。
#[derive(Debug, Clone, Default)]
pub struct GlobalSettingsUpdate {
    pub max_update_text_length: Option<i32>,
    pub max_attachments_per_issue: Option<i32>,
    pub max_attachments_per_remedy: Option<i32>,
    pub max_video_resolution_height: Option<i32>,
    pub max_video_quality_crf: Option<i32>,
    pub max_file_size_mb: Option<i32>,
    pub updated_by: Option<String>,
}

impl GlobalSettingsUpdate {
    pub fn apply_to(&self, record: &mut GlobalSettingsRecord, now: DateTime<Utc>) {
        if let Some(value) = self.max_update_text_length {
            record.max_update_text_length = value;
        }
        if let Some(value) = self.max_attachments_per_issue {
            record.max_attachments_per_issue = value;
        }
        if let Some(value) = self.max_attachments_per_remedy {
            record.max_attachments_per_remedy = value;
        }
        if let Some(value) = self.max_video_resolution_height {
            record.max_video_resolution_height = value;
        }
        if let Some(value) = self.max_video_quality_crf {
            record.max_video_quality_crf = value;
        }
        if let Some(value) = self.max_file_size_mb {
            record.max_file_size_mb = value;
        }
        record.updated_by = self.updated_by.clone();
        record.updated_at = now;
    }
}

/// 故障单。
#[derive(Debug, Clone, PartialEq)]
pub struct IssueRecord {
    pub issue_id: String,
    pub machine_id_ref: MachineRef,
    pub category: IssueCategory,
    pub priority: IssuePriority,
    pub status: IssueStatus,
    pub alarm_code: Option<String>,
    pub description: String,
    pub ai_summary: String,
    pub auto_title: String,
    pub is_runnable: bool,
    pub reported_by: String,
    pub downtime_start: Option<DateTime<Utc>>,
    pub downtime_end: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// 乐观锁版本，每次更新 +1。
    pub version: i64,
}

/// 已关闭的停机区间（追加写入，不修改）。
#[derive(Debug, Clone, PartialEq)]
pub struct DowntimeEpisodeRecord {
    pub issue_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

/// 故障单列表过滤条件。
#[derive(Debug, Clone, Default)]
pub struct IssueFilter {
    pub status: Option<IssueStatus>,
    pub priority: Option<IssuePriority>,
    pub category: Option<IssueCategory>,
    pub machine_id_ref: Option<String>,
    pub department_id: Option<String>,
    pub is_runnable: Option<bool>,
    pub created_after: Option<DateTime<Utc>>,
    /// 在标题、描述、报警代码中做子串匹配（不区分大小写）。
    pub search: Option<String>,
    pub limit: Option<i64>,
}

impl IssueFilter {
    /// 内存实现与测试共用的匹配逻辑。
    pub fn matches(&self, issue: &IssueRecord) -> bool {
        if self.status.is_some_and(|status| status != issue.status) {
            return false;
        }
        if self.priority.is_some_and(|priority| priority != issue.priority) {
            return false;
        }
        if self.category.is_some_and(|category| category != issue.category) {
            return false;
        }
        if let Some(machine) = self.machine_id_ref.as_deref() {
            if issue.machine_id_ref.as_str() != machine {
                return false;
            }
        }
        if let Some(department) = self.department_id.as_deref() {
            if !issue.machine_id_ref.in_department(department) {
                return false;
            }
        }
        if self.is_runnable.is_some_and(|flag| flag != issue.is_runnable) {
            return false;
        }
        if self.created_after.is_some_and(|after| issue.created_at < after) {
            return false;
        }
        if let Some(needle) = self.search.as_deref() {
            let needle = needle.to_lowercase();
            let hit = issue.auto_title.to_lowercase().contains(&needle)
                || issue.description.to_lowercase().contains(&needle)
                || issue
                    .alarm_code
                    .as_deref()
                    .is_some_and(|code| code.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        true
    }
}

/// 维修措施。
#[derive(Debug, Clone, PartialEq)]
pub struct RemedyRecord {
    pub remedy_id: String,
    pub issue_id: String,
    pub description: String,
    pub technician_name: String,
    pub is_external: bool,
    pub phone_number: Option<String>,
    pub is_machine_runnable: bool,
    pub parts_purchased: String,
    pub labor_cost: Option<Decimal>,
    pub parts_cost: Option<Decimal>,
    pub total_cost: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 附件所属对象：故障单或维修措施，二者只能取其一。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentParent {
    Issue(String),
    Remedy(String),
}

impl AttachmentParent {
    pub fn issue_id(&self) -> Option<&str> {
        match self {
            AttachmentParent::Issue(id) => Some(id),
            AttachmentParent::Remedy(_) => None,
        }
    }

    pub fn remedy_id(&self) -> Option<&str> {
        match self {
            AttachmentParent::Remedy(id) => Some(id),
            AttachmentParent::Issue(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttachmentRecord {
    pub attachment_id: String,
    pub parent: AttachmentParent,
    /// 相对媒体根目录的路径。
    pub file_path: String,
    pub file_name: String,
    pub file_size: i64,
    pub file_type: AttachmentKind,
    pub purpose: AttachmentPurpose,
    pub uploaded_at: DateTime<Utc>,
}

/// 审计日志（只追加）。
#[derive(Debug, Clone)]
pub struct AuditLogRecord {
    pub audit_id: String,
    pub action: AuditAction,
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

#[derive(Debug, Clone, Default)]
pub struct AuditLogQuery {
    pub issue_id: Option<String>,
    pub action: Option<AuditAction>,
    pub user_id: Option<String>,
    pub limit: i64,
}

impl AuditLogQuery {
    pub fn matches(&self, record: &AuditLogRecord) -> bool {
        if let Some(issue_id) = self.issue_id.as_deref() {
            if record.issue_id.as_deref() != Some(issue_id) {
                return false;
            }
        }
        if self.action.is_some_and(|action| action != record.action) {
            return false;
        }
        if let Some(user_id) = self.user_id.as_deref() {
            if record.user_id.as_deref() != Some(user_id) {
                return false;
            }
        }
        true
    }
}

/// 机器目录条目（只读）。
#[derive(Debug, Clone)]
pub struct MachineRecord {
    pub machine_id: String,
    pub machine_number: String,
    pub model: Option<String>,
    pub status: String,
    pub department_id: String,
    pub department_name: String,
}

impl MachineRecord {
    /// 展示名：`编号 (型号)`，缺项时逐级回落。
    pub fn display_name(&self) -> String {
        match (self.machine_number.is_empty(), self.model.as_deref()) {
            (false, Some(model)) if !model.is_empty() => {
                format!("{} ({})", self.machine_number, model)
            }
            (false, _) => self.machine_number.clone(),
            (true, Some(model)) if !model.is_empty() => model.to_string(),
            _ => self.machine_id.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DepartmentRecord {
    pub department_id: String,
    pub name: String,
}
