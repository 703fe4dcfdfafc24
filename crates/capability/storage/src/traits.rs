//! 存储接口定义
//!
//! Handler 与服务层只依赖这些 trait；内存实现与 Postgres 实现可互换。

use crate::error::StorageError;
use crate::models::{
    AttachmentParent, AttachmentRecord, AuditLogQuery, AuditLogRecord, DepartmentRecord,
    DowntimeEpisodeRecord, GlobalSettingsRecord, GlobalSettingsUpdate, IssueFilter, IssueRecord,
    MachineRecord, PermissionRecord, PublicRoleRecord, RemedyRecord, RoleAssignment, RoleCreate,
    RoleRecord, UserCreate, UserRecord, UserRoleRecord,
};
use domain::Permission;
use std::collections::BTreeSet;

/// 用户与登录凭据。
#[async_trait::async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StorageError>;

    async fn find_by_id(&self, user_id: &str) -> Result<Option<UserRecord>, StorageError>;

    async fn update_password_hash(
        &self,
        user_id: &str,
        password_hash: &str,
    ) -> Result<bool, StorageError>;

    async fn get_refresh_jti(&self, user_id: &str) -> Result<Option<String>, StorageError>;

    async fn set_refresh_jti(
        &self,
        user_id: &str,
        refresh_jti: Option<&str>,
    ) -> Result<bool, StorageError>;

    async fn list_users(&self) -> Result<Vec<UserRecord>, StorageError>;

    async fn create_user(&self, record: UserCreate) -> Result<UserRecord, StorageError>;

    /// 删除用户：同一事务内先删除其角色分配，再删除用户本身。
    async fn delete_user(&self, user_id: &str) -> Result<bool, StorageError>;
}

/// 角色、权限与用户角色分配。
#[async_trait::async_trait]
pub trait RbacStore: Send + Sync {
    async fn list_permissions(&self) -> Result<Vec<PermissionRecord>, StorageError>;

    async fn list_roles(&self) -> Result<Vec<RoleRecord>, StorageError>;

    async fn find_role(&self, role_code: &str) -> Result<Option<RoleRecord>, StorageError>;

    async fn create_role(&self, record: RoleCreate) -> Result<RoleRecord, StorageError>;

    /// 仍有用户持有的角色不可删除（返回 Invalid）。
    async fn delete_role(&self, role_code: &str) -> Result<bool, StorageError>;

    async fn set_role_permissions(
        &self,
        role_code: &str,
        permissions: BTreeSet<Permission>,
    ) -> Result<Option<RoleRecord>, StorageError>;

    async fn list_user_roles(&self) -> Result<Vec<UserRoleRecord>, StorageError>;

    /// 用户的角色分配连同角色定义；未分配时返回 None。
    async fn find_assignment(&self, user_id: &str)
    -> Result<Option<RoleAssignment>, StorageError>;

    /// 分配（或替换）角色，保留已有覆盖。
    async fn assign_role(
        &self,
        user_id: &str,
        role_code: &str,
    ) -> Result<UserRoleRecord, StorageError>;

    /// 设置（`Some`）或移除（`None`）单个权限覆盖；用户无角色分配时返回 None。
    async fn set_permission_override(
        &self,
        user_id: &str,
        permission: Permission,
        granted: Option<bool>,
    ) -> Result<Option<UserRoleRecord>, StorageError>;

    /// 读取公共角色，不存在时原子地创建默认行。
    async fn load_public_role(&self) -> Result<PublicRoleRecord, StorageError>;

    async fn set_public_permissions(
        &self,
        permissions: BTreeSet<Permission>,
    ) -> Result<PublicRoleRecord, StorageError>;
}

/// 全局设置单例。
#[async_trait::async_trait]
pub trait SettingsStore: Send + Sync {
    /// 读取设置，不存在时原子地创建默认行。
    async fn load_settings(&self) -> Result<GlobalSettingsRecord, StorageError>;

    async fn update_settings(
        &self,
        update: GlobalSettingsUpdate,
    ) -> Result<GlobalSettingsRecord, StorageError>;
}

/// 故障单。
#[async_trait::async_trait]
pub trait IssueStore: Send + Sync {
    async fn list_issues(&self, filter: &IssueFilter) -> Result<Vec<IssueRecord>, StorageError>;

    async fn find_issue(&self, issue_id: &str) -> Result<Option<IssueRecord>, StorageError>;

    async fn create_issue(&self, record: IssueRecord) -> Result<IssueRecord, StorageError>;

    /// 版本校验更新：存储中的版本必须等于 `expected_version`，
    /// 否则返回 Conflict；成功后版本 +1。
    ///
    /// `closed_episode` 与故障单更新在同一事务内写入。
    async fn update_issue(
        &self,
        record: IssueRecord,
        expected_version: i64,
        closed_episode: Option<DowntimeEpisodeRecord>,
    ) -> Result<IssueRecord, StorageError>;

    /// 删除故障单，连带删除其维修措施、附件记录与停机历史。
    async fn delete_issue(&self, issue_id: &str) -> Result<bool, StorageError>;

    async fn list_downtime_episodes(
        &self,
        issue_id: &str,
    ) -> Result<Vec<DowntimeEpisodeRecord>, StorageError>;
}

/// 维修措施。
#[async_trait::async_trait]
pub trait RemedyStore: Send + Sync {
    async fn list_remedies(&self, issue_id: &str) -> Result<Vec<RemedyRecord>, StorageError>;

    /// 批量读取多个故障单的维修措施（看板与报表使用）。
    async fn list_remedies_for_issues(
        &self,
        issue_ids: &[String],
    ) -> Result<Vec<RemedyRecord>, StorageError>;

    async fn find_remedy(&self, remedy_id: &str) -> Result<Option<RemedyRecord>, StorageError>;

    /// 写入维修措施，同时以版本校验写回其故障单（含关闭的停机区间）。
    ///
    /// 三者同成同败：版本不一致返回 Conflict，维修措施写入失败时故障单保持原样。
    async fn record_remedy(
        &self,
        remedy: RemedyRecord,
        issue: IssueRecord,
        expected_version: i64,
        closed_episode: Option<DowntimeEpisodeRecord>,
    ) -> Result<(IssueRecord, RemedyRecord), StorageError>;

    async fn update_remedy(
        &self,
        record: RemedyRecord,
    ) -> Result<Option<RemedyRecord>, StorageError>;

    async fn delete_remedy(&self, remedy_id: &str) -> Result<bool, StorageError>;
}

/// 附件记录（文件本体见 [`crate::files::FileStore`]）。
#[async_trait::async_trait]
pub trait AttachmentStore: Send + Sync {
    async fn list_attachments(
        &self,
        parent: &AttachmentParent,
    ) -> Result<Vec<AttachmentRecord>, StorageError>;

    async fn count_attachments(&self, parent: &AttachmentParent) -> Result<i64, StorageError>;

    async fn find_attachment(
        &self,
        attachment_id: &str,
    ) -> Result<Option<AttachmentRecord>, StorageError>;

    /// 写入附件记录；父对象已有 `max_per_parent` 条附件时返回 Invalid。
    ///
    /// 计数与写入在同一把锁（或同一事务）内完成。
    async fn create_attachment(
        &self,
        record: AttachmentRecord,
        max_per_parent: i32,
    ) -> Result<AttachmentRecord, StorageError>;

    async fn delete_attachment(&self, attachment_id: &str) -> Result<bool, StorageError>;
}

/// 审计日志（只追加）。
#[async_trait::async_trait]
pub trait AuditLogStore: Send + Sync {
    async fn create_audit_log(&self, record: AuditLogRecord)
    -> Result<AuditLogRecord, StorageError>;

    async fn list_audit_logs(
        &self,
        query: &AuditLogQuery,
    ) -> Result<Vec<AuditLogRecord>, StorageError>;
}

/// 只读机器目录；查不到是正常情况。
#[async_trait::async_trait]
pub trait MachineCatalog: Send + Sync {
    async fn find_machine(&self, machine_id: &str) -> Result<Option<MachineRecord>, StorageError>;

    async fn list_departments(&self) -> Result<Vec<DepartmentRecord>, StorageError>;
}
