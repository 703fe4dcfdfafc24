//! 维修日志核心领域模型
//!
//! - [`permissions`]：封闭的权限码枚举、三态覆盖表、默认角色包
//! - [`actor`]：请求主体（匿名 / 登录用户）
//! - [`issue`]：故障单相关枚举与机器外部引用
//! - [`time`]：时间戳规范化

pub mod actor;
pub mod issue;
pub mod permissions;
pub mod time;

pub use actor::{Actor, PublicGrant, RoleGrant, UserPrincipal};
pub use issue::{
    AttachmentKind, AttachmentPurpose, AuditAction, IssueCategory, IssuePriority, IssueStatus,
    MachineRef, UnknownVariant,
};
pub use permissions::{OverrideState, Permission, PermissionOverrides, UnknownPermission};

/// 会话上下文：由 access token 解出的登录身份。
///
/// 只携带身份，不携带权限；权限在每个请求中依据存储的角色状态重新解析。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub user_id: String,
    pub username: String,
}

impl SessionContext {
    pub fn new(user_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
        }
    }
}
