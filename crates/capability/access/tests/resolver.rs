use domain::{Actor, Permission, PermissionOverrides, PublicGrant, RoleGrant, UserPrincipal};
use logbook_access::{all_permissions, has_permission, has_permission_code};
use std::collections::BTreeSet;

fn user(role_permissions: &[Permission], overrides: PermissionOverrides) -> Actor {
    Actor::User(UserPrincipal {
        user_id: "user-1".to_string(),
        username: "alice".to_string(),
        is_superuser: false,
        role: Some(RoleGrant {
            role_code: "custom".to_string(),
            is_active: true,
            permissions: role_permissions.iter().copied().collect(),
        }),
        overrides,
    })
}

fn anonymous(permissions: &[Permission]) -> Actor {
    Actor::Anonymous(PublicGrant::Loaded {
        is_active: true,
        permissions: permissions.iter().copied().collect(),
    })
}

#[test]
fn anonymous_uses_public_role_membership() {
    let actor = anonymous(&[Permission::CrudIssues, Permission::CrudRemedies]);
    assert!(has_permission_code(&actor, "crud_issues"));
    assert!(!has_permission_code(&actor, "view_costs"));
}

#[test]
fn override_revocation_removes_role_permission() {
    let mut overrides = PermissionOverrides::new();
    overrides.set(Permission::ViewCosts, false);
    let actor = user(&[Permission::CrudIssues, Permission::ViewCosts], overrides);

    assert_eq!(
        all_permissions(&actor),
        BTreeSet::from([Permission::CrudIssues])
    );
    assert!(!has_permission(&actor, Permission::ViewCosts));
}

#[test]
fn override_wins_in_both_directions() {
    for role_has in [true, false] {
        for granted in [true, false] {
            let role: &[Permission] = if role_has {
                &[Permission::GenerateReports]
            } else {
                &[]
            };
            let mut overrides = PermissionOverrides::new();
            overrides.set(Permission::GenerateReports, granted);
            let actor = user(role, overrides);
            assert_eq!(has_permission(&actor, Permission::GenerateReports), granted);
        }
    }
}

#[test]
fn role_permissions_apply_without_overrides() {
    let actor = user(&[Permission::ViewDashboard], PermissionOverrides::new());
    assert!(has_permission(&actor, Permission::ViewDashboard));
    assert!(!has_permission(&actor, Permission::ManageUsers));
}

#[test]
fn single_check_agrees_with_aggregate_set() {
    let mut overrides = PermissionOverrides::new();
    overrides.set(Permission::ManageUsers, true);
    overrides.set(Permission::CrudIssues, false);
    let actor = user(&[Permission::CrudIssues, Permission::ViewCosts], overrides);

    let effective = all_permissions(&actor);
    for permission in Permission::ALL {
        assert_eq!(
            has_permission(&actor, permission),
            effective.contains(&permission),
            "{permission}"
        );
    }
}

#[test]
fn anonymous_ignores_any_user_state() {
    let actor = anonymous(&[]);
    for permission in Permission::ALL {
        assert!(!has_permission(&actor, permission));
    }
}

#[test]
fn unavailable_or_inactive_public_role_denies() {
    let unavailable = Actor::Anonymous(PublicGrant::Unavailable);
    assert!(!has_permission(&unavailable, Permission::CrudIssues));
    assert!(all_permissions(&unavailable).is_empty());

    let inactive = Actor::Anonymous(PublicGrant::Loaded {
        is_active: false,
        permissions: BTreeSet::from([Permission::CrudIssues]),
    });
    assert!(!has_permission(&inactive, Permission::CrudIssues));
}

#[test]
fn user_without_role_is_denied() {
    let actor = Actor::User(UserPrincipal {
        user_id: "user-2".to_string(),
        username: "bob".to_string(),
        is_superuser: false,
        role: None,
        overrides: PermissionOverrides::new(),
    });
    assert!(!has_permission(&actor, Permission::CrudIssues));
    assert!(all_permissions(&actor).is_empty());
}

#[test]
fn superuser_bypasses_overrides() {
    let mut overrides = PermissionOverrides::new();
    overrides.set(Permission::ManageUsers, false);
    let actor = Actor::User(UserPrincipal {
        user_id: "user-admin".to_string(),
        username: "admin".to_string(),
        is_superuser: true,
        role: None,
        overrides,
    });
    assert!(has_permission(&actor, Permission::ManageUsers));
    assert_eq!(all_permissions(&actor).len(), Permission::ALL.len());
}
