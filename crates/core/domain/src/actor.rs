//! 请求主体
//!
//! 权限解析只依赖 [`Actor`] 本身携带的数据，解析过程是纯函数。
//! 构造 Actor 时（见 `logbook-access`）负责从存储装载角色与公共角色，
//! 装载失败时构造出的 Actor 不含任何权限。

use crate::permissions::{Permission, PermissionOverrides};
use std::collections::BTreeSet;

/// 用户所持角色的快照。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleGrant {
    pub role_code: String,
    pub is_active: bool,
    pub permissions: BTreeSet<Permission>,
}

/// 登录用户主体。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserPrincipal {
    pub user_id: String,
    pub username: String,
    pub is_superuser: bool,
    /// 未分配角色或角色装载失败时为 None。
    pub role: Option<RoleGrant>,
    pub overrides: PermissionOverrides,
}

/// 匿名访问者可用的公共权限。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicGrant {
    Loaded {
        is_active: bool,
        permissions: BTreeSet<Permission>,
    },
    /// 公共角色无法装载：一律拒绝。
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    Anonymous(PublicGrant),
    User(UserPrincipal),
}

impl Actor {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Actor::User(_))
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            Actor::User(principal) => Some(principal.user_id.as_str()),
            Actor::Anonymous(_) => None,
        }
    }

    /// 审计与日志使用的主体标识。
    pub fn display_name(&self) -> &str {
        match self {
            Actor::User(principal) => principal.username.as_str(),
            Actor::Anonymous(_) => "anonymous",
        }
    }
}
