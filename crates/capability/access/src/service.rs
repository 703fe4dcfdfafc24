//! Actor 装载
//!
//! 每个请求从存储重新装载用户、角色分配与公共角色，
//! 角色变更对所有持有者立即生效。
//! 角色或公共角色装载失败时不报错，构造出不含权限的 Actor。

use domain::{Actor, PublicGrant, RoleGrant, SessionContext, UserPrincipal};
use logbook_storage::{RbacStore, UserStore};
use std::sync::Arc;

/// 会话对应的用户已不可用（认证层面的失败，而非权限拒绝）。
#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    #[error("user not found")]
    UnknownUser,
    #[error("user inactive")]
    InactiveUser,
}

pub struct AccessService {
    user_store: Arc<dyn UserStore>,
    rbac_store: Arc<dyn RbacStore>,
}

impl AccessService {
    pub fn new(user_store: Arc<dyn UserStore>, rbac_store: Arc<dyn RbacStore>) -> Self {
        Self {
            user_store,
            rbac_store,
        }
    }

    /// 无会话时为匿名访问者，有会话时为登录用户。
    pub async fn resolve(&self, session: Option<&SessionContext>) -> Result<Actor, AccessError> {
        match session {
            Some(session) => self.user_actor(session).await,
            None => Ok(self.anonymous_actor().await),
        }
    }

    pub async fn anonymous_actor(&self) -> Actor {
        match self.rbac_store.load_public_role().await {
            Ok(public_role) => Actor::Anonymous(PublicGrant::Loaded {
                is_active: public_role.is_active,
                permissions: public_role.permissions,
            }),
            Err(err) => {
                tracing::warn!(target: "logbook.access", error = %err, "public role unavailable, denying anonymous access");
                Actor::Anonymous(PublicGrant::Unavailable)
            }
        }
    }

    pub async fn user_actor(&self, session: &SessionContext) -> Result<Actor, AccessError> {
        let is_superuser = match self.user_store.find_by_id(&session.user_id).await {
            Ok(Some(user)) if !user.is_active => return Err(AccessError::InactiveUser),
            Ok(Some(user)) => user.is_superuser,
            Ok(None) => return Err(AccessError::UnknownUser),
            Err(err) => {
                tracing::warn!(target: "logbook.access", user_id = %session.user_id, error = %err, "user lookup failed, resolving without privileges");
                false
            }
        };

        let (role, overrides) = match self.rbac_store.find_assignment(&session.user_id).await {
            Ok(Some(assignment)) => (
                Some(RoleGrant {
                    role_code: assignment.role.role_code,
                    is_active: assignment.role.is_active,
                    permissions: assignment.role.permissions,
                }),
                assignment.user_role.permission_overrides,
            ),
            Ok(None) => (None, Default::default()),
            Err(err) => {
                tracing::warn!(target: "logbook.access", user_id = %session.user_id, error = %err, "role lookup failed, resolving without role");
                (None, Default::default())
            }
        };

        Ok(Actor::User(UserPrincipal {
            user_id: session.user_id.clone(),
            username: session.username.clone(),
            is_superuser,
            role,
            overrides,
        }))
    }
}
