//! 权限解析
//!
//! 登录用户的判定顺序：
//! 0. 超级用户：直接放行（记录日志）
//! 1. 覆盖表中存在该权限：以覆盖值为准（授予或撤销）
//! 2. 否则：角色处于启用状态且角色权限包含该权限
//!
//! 匿名访问者只看公共角色；公共角色未装载或已停用时一律拒绝。

use domain::{Actor, OverrideState, Permission, PublicGrant, UserPrincipal};
use std::collections::BTreeSet;

pub fn has_permission(actor: &Actor, permission: Permission) -> bool {
    match actor {
        Actor::User(principal) => user_has_permission(principal, permission),
        Actor::Anonymous(grant) => public_permissions(grant).contains(&permission),
    }
}

/// 以字符串权限码判定；未知权限码视为拒绝。
pub fn has_permission_code(actor: &Actor, codename: &str) -> bool {
    match codename.parse::<Permission>() {
        Ok(permission) => has_permission(actor, permission),
        Err(err) => {
            tracing::warn!(target: "logbook.access", actor = actor.display_name(), error = %err, "permission check denied");
            false
        }
    }
}

/// 有效权限全集：角色权限 ∪ 覆盖授予 − 覆盖撤销。
pub fn all_permissions(actor: &Actor) -> BTreeSet<Permission> {
    match actor {
        Actor::User(principal) if principal.is_superuser => Permission::ALL.into_iter().collect(),
        Actor::User(principal) => {
            let role_permissions = role_permissions(principal);
            let granted = principal.overrides.granted();
            let revoked = principal.overrides.revoked();
            role_permissions
                .union(&granted)
                .copied()
                .collect::<BTreeSet<_>>()
                .difference(&revoked)
                .copied()
                .collect()
        }
        Actor::Anonymous(grant) => public_permissions(grant),
    }
}

fn user_has_permission(principal: &UserPrincipal, permission: Permission) -> bool {
    if principal.is_superuser {
        tracing::info!(
            target: "logbook.access",
            user_id = %principal.user_id,
            permission = permission.codename(),
            "superuser bypass"
        );
        return true;
    }
    match principal.overrides.state(permission) {
        OverrideState::Grant => true,
        OverrideState::Deny => false,
        OverrideState::Unset => role_permissions(principal).contains(&permission),
    }
}

fn role_permissions(principal: &UserPrincipal) -> BTreeSet<Permission> {
    match principal.role.as_ref() {
        Some(role) if role.is_active => role.permissions.clone(),
        _ => BTreeSet::new(),
    }
}

fn public_permissions(grant: &PublicGrant) -> BTreeSet<Permission> {
    match grant {
        PublicGrant::Loaded {
            is_active: true,
            permissions,
        } => permissions.clone(),
        _ => BTreeSet::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{PermissionOverrides, RoleGrant};

    fn principal(role: Option<RoleGrant>, overrides: PermissionOverrides) -> Actor {
        Actor::User(UserPrincipal {
            user_id: "user-1".to_string(),
            username: "tech".to_string(),
            is_superuser: false,
            role,
            overrides,
        })
    }

    #[test]
    fn inactive_role_grants_nothing_but_overrides_still_apply() {
        let mut overrides = PermissionOverrides::new();
        overrides.set(Permission::ViewDashboard, true);
        let actor = principal(
            Some(RoleGrant {
                role_code: "technician".to_string(),
                is_active: false,
                permissions: BTreeSet::from([Permission::CrudIssues]),
            }),
            overrides,
        );
        assert!(!has_permission(&actor, Permission::CrudIssues));
        assert!(has_permission(&actor, Permission::ViewDashboard));
        assert_eq!(
            all_permissions(&actor),
            BTreeSet::from([Permission::ViewDashboard])
        );
    }

    #[test]
    fn unknown_codename_is_denied() {
        let actor = principal(None, PermissionOverrides::new());
        assert!(!has_permission_code(&actor, "drop_tables"));
    }
}
