use domain::{Actor, Permission, PublicGrant, SessionContext};
use logbook_access::{AccessError, AccessService, all_permissions, has_permission};
use logbook_storage::{
    InMemoryUserStore, PermissionRecord, PublicRoleRecord, RbacStore, RoleAssignment, RoleCreate,
    RoleRecord, StorageError, UserCreate, UserRoleRecord, UserStore,
};
use std::collections::BTreeSet;
use std::sync::Arc;

/// 所有读取都失败的 RBAC 存储。
struct BrokenRbacStore;

#[async_trait::async_trait]
impl RbacStore for BrokenRbacStore {
    async fn list_permissions(&self) -> Result<Vec<PermissionRecord>, StorageError> {
        Err(StorageError::new("down"))
    }
    async fn list_roles(&self) -> Result<Vec<RoleRecord>, StorageError> {
        Err(StorageError::new("down"))
    }
    async fn find_role(&self, _role_code: &str) -> Result<Option<RoleRecord>, StorageError> {
        Err(StorageError::new("down"))
    }
    async fn create_role(&self, _record: RoleCreate) -> Result<RoleRecord, StorageError> {
        Err(StorageError::new("down"))
    }
    async fn delete_role(&self, _role_code: &str) -> Result<bool, StorageError> {
        Err(StorageError::new("down"))
    }
    async fn set_role_permissions(
        &self,
        _role_code: &str,
        _permissions: BTreeSet<Permission>,
    ) -> Result<Option<RoleRecord>, StorageError> {
        Err(StorageError::new("down"))
    }
    async fn list_user_roles(&self) -> Result<Vec<UserRoleRecord>, StorageError> {
        Err(StorageError::new("down"))
    }
    async fn find_assignment(
        &self,
        _user_id: &str,
    ) -> Result<Option<RoleAssignment>, StorageError> {
        Err(StorageError::new("down"))
    }
    async fn assign_role(
        &self,
        _user_id: &str,
        _role_code: &str,
    ) -> Result<UserRoleRecord, StorageError> {
        Err(StorageError::new("down"))
    }
    async fn set_permission_override(
        &self,
        _user_id: &str,
        _permission: Permission,
        _granted: Option<bool>,
    ) -> Result<Option<UserRoleRecord>, StorageError> {
        Err(StorageError::new("down"))
    }
    async fn load_public_role(&self) -> Result<PublicRoleRecord, StorageError> {
        Err(StorageError::new("down"))
    }
    async fn set_public_permissions(
        &self,
        _permissions: BTreeSet<Permission>,
    ) -> Result<PublicRoleRecord, StorageError> {
        Err(StorageError::new("down"))
    }
}

async fn store_with_technician() -> Arc<InMemoryUserStore> {
    let store = Arc::new(InMemoryUserStore::new());
    store
        .create_user(UserCreate {
            user_id: "user-tech".to_string(),
            username: "tech".to_string(),
            password: "hash".to_string(),
            email: None,
            is_superuser: false,
        })
        .await
        .expect("create user");
    store
        .assign_role("user-tech", "technician")
        .await
        .expect("assign role");
    store
}

#[tokio::test]
async fn resolves_role_and_overrides_from_store() {
    let store = store_with_technician().await;
    store
        .set_permission_override("user-tech", Permission::ViewCosts, Some(false))
        .await
        .expect("override");
    let service = AccessService::new(store.clone(), store.clone());

    let session = SessionContext::new("user-tech", "tech");
    let actor = service.resolve(Some(&session)).await.expect("actor");
    assert!(has_permission(&actor, Permission::CrudRemedies));
    assert!(!has_permission(&actor, Permission::ViewCosts));
    assert!(!has_permission(&actor, Permission::MarkResolved));
}

#[tokio::test]
async fn role_changes_apply_to_next_resolution() {
    let store = store_with_technician().await;
    let service = AccessService::new(store.clone(), store.clone());
    let session = SessionContext::new("user-tech", "tech");

    let before = service.resolve(Some(&session)).await.expect("actor");
    assert!(!has_permission(&before, Permission::MarkResolved));

    let mut permissions = store
        .find_role("technician")
        .await
        .expect("query")
        .expect("role")
        .permissions;
    permissions.insert(Permission::MarkResolved);
    store
        .set_role_permissions("technician", permissions)
        .await
        .expect("update role");

    let after = service.resolve(Some(&session)).await.expect("actor");
    assert!(has_permission(&after, Permission::MarkResolved));
}

#[tokio::test]
async fn anonymous_gets_seeded_public_permissions() {
    let store = Arc::new(InMemoryUserStore::new());
    let service = AccessService::new(store.clone(), store);
    let actor = service.resolve(None).await.expect("anonymous");
    assert_eq!(
        all_permissions(&actor),
        BTreeSet::from([Permission::CrudIssues, Permission::CrudRemedies])
    );
}

#[tokio::test]
async fn storage_failures_fail_closed() {
    let users = store_with_technician().await;
    let service = AccessService::new(users, Arc::new(BrokenRbacStore));

    let anonymous = service.resolve(None).await.expect("anonymous");
    assert_eq!(anonymous, Actor::Anonymous(PublicGrant::Unavailable));
    assert!(!has_permission(&anonymous, Permission::CrudIssues));

    let session = SessionContext::new("user-tech", "tech");
    let actor = service.resolve(Some(&session)).await.expect("user");
    assert!(all_permissions(&actor).is_empty());
}

#[tokio::test]
async fn deleted_user_session_is_rejected() {
    let store = store_with_technician().await;
    store.delete_user("user-tech").await.expect("delete");
    let service = AccessService::new(store.clone(), store);

    let session = SessionContext::new("user-tech", "tech");
    let err = service.resolve(Some(&session)).await.expect_err("gone");
    assert!(matches!(err, AccessError::UnknownUser));
}

#[tokio::test]
async fn default_admin_is_superuser() {
    let store = Arc::new(InMemoryUserStore::with_default_admin());
    let service = AccessService::new(store.clone(), store);
    let session = SessionContext::new("user-admin", "admin");
    let actor = service.resolve(Some(&session)).await.expect("admin");
    assert_eq!(all_permissions(&actor).len(), Permission::ALL.len());
}
