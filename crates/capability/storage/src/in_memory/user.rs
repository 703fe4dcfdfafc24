//! 用户与 RBAC 内存存储实现
//!
//! 用于本地演示和测试。
//!
//! 功能：
//! - 内置默认角色包（admin / management / executive / technician / operator）
//! - 内置 admin 超级用户（用户名：admin，密码：admin123）
//! - 公共角色单例按需创建

use crate::error::StorageError;
use crate::models::{
    PermissionRecord, PublicRoleRecord, RoleAssignment, RoleCreate, RoleRecord, UserCreate,
    UserRecord, UserRoleRecord,
};
use crate::traits::{RbacStore, UserStore};
use domain::Permission;
use domain::permissions::{ROLE_ADMIN, default_role_templates};
use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

#[derive(Default)]
struct RbacState {
    users: HashMap<String, UserRecord>,
    refresh_jti: HashMap<String, String>,
    roles: HashMap<String, RoleRecord>,
    user_roles: HashMap<String, UserRoleRecord>,
    public_role: Option<PublicRoleRecord>,
}

/// 用户与 RBAC 内存存储
///
/// 所有表放在同一把 RwLock 下，删除用户与其角色分配是原子的。
pub struct InMemoryUserStore {
    state: RwLock<RbacState>,
}

impl Default for InMemoryUserStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryUserStore {
    /// 空存储（仅有默认角色包）。
    pub fn new() -> Self {
        let now = domain::time::now_utc();
        let roles = default_role_templates()
            .into_iter()
            .map(|template| {
                let record = RoleRecord {
                    role_code: template.role_code.to_string(),
                    name: template.name.to_string(),
                    description: template.description.to_string(),
                    is_active: true,
                    is_public_role: false,
                    permissions: template.permissions.iter().copied().collect(),
                    created_at: now,
                    updated_at: now,
                };
                (record.role_code.clone(), record)
            })
            .collect();
        Self {
            state: RwLock::new(RbacState {
                roles,
                ..RbacState::default()
            }),
        }
    }

    /// 内置 admin 账户
    ///
    /// 口令以明文存放，首次登录时由认证层升级为 argon2 哈希。
    pub fn with_default_admin() -> Self {
        let store = Self::new();
        let now = domain::time::now_utc();
        if let Ok(mut state) = store.state.write() {
            state.users.insert(
                "user-admin".to_string(),
                UserRecord {
                    user_id: "user-admin".to_string(),
                    username: "admin".to_string(),
                    password: "admin123".to_string(),
                    email: None,
                    is_superuser: true,
                    is_active: true,
                    created_at: now,
                },
            );
            state.user_roles.insert(
                "user-admin".to_string(),
                UserRoleRecord {
                    user_id: "user-admin".to_string(),
                    role_code: ROLE_ADMIN.to_string(),
                    permission_overrides: Default::default(),
                    can_view_costs: true,
                    can_view_external_contacts: true,
                    created_at: now,
                    updated_at: now,
                },
            );
        }
        store
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, RbacState>, StorageError> {
        self.state
            .read()
            .map_err(|_| StorageError::new("lock failed"))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, RbacState>, StorageError> {
        self.state
            .write()
            .map_err(|_| StorageError::new("lock failed"))
    }
}

#[async_trait::async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StorageError> {
        let state = self.read()?;
        Ok(state
            .users
            .values()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn find_by_id(&self, user_id: &str) -> Result<Option<UserRecord>, StorageError> {
        Ok(self.read()?.users.get(user_id).cloned())
    }

    async fn update_password_hash(
        &self,
        user_id: &str,
        password_hash: &str,
    ) -> Result<bool, StorageError> {
        let mut state = self.write()?;
        match state.users.get_mut(user_id) {
            Some(user) => {
                user.password = password_hash.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_refresh_jti(&self, user_id: &str) -> Result<Option<String>, StorageError> {
        Ok(self.read()?.refresh_jti.get(user_id).cloned())
    }

    async fn set_refresh_jti(
        &self,
        user_id: &str,
        refresh_jti: Option<&str>,
    ) -> Result<bool, StorageError> {
        let mut state = self.write()?;
        if !state.users.contains_key(user_id) {
            return Ok(false);
        }
        match refresh_jti {
            Some(value) => {
                state
                    .refresh_jti
                    .insert(user_id.to_string(), value.to_string());
            }
            None => {
                state.refresh_jti.remove(user_id);
            }
        }
        Ok(true)
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>, StorageError> {
        let mut users: Vec<UserRecord> = self.read()?.users.values().cloned().collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.username.cmp(&b.username)));
        Ok(users)
    }

    async fn create_user(&self, record: UserCreate) -> Result<UserRecord, StorageError> {
        let mut state = self.write()?;
        if state.users.contains_key(&record.user_id)
            || state.users.values().any(|user| user.username == record.username)
        {
            return Err(StorageError::invalid("username already exists"));
        }
        let user = UserRecord {
            user_id: record.user_id,
            username: record.username,
            password: record.password,
            email: record.email,
            is_superuser: record.is_superuser,
            is_active: true,
            created_at: domain::time::now_utc(),
        };
        state.users.insert(user.user_id.clone(), user.clone());
        Ok(user)
    }

    async fn delete_user(&self, user_id: &str) -> Result<bool, StorageError> {
        let mut state = self.write()?;
        state.user_roles.remove(user_id);
        state.refresh_jti.remove(user_id);
        Ok(state.users.remove(user_id).is_some())
    }
}

#[async_trait::async_trait]
impl RbacStore for InMemoryUserStore {
    async fn list_permissions(&self) -> Result<Vec<PermissionRecord>, StorageError> {
        Ok(Permission::ALL
            .iter()
            .copied()
            .map(PermissionRecord::from_permission)
            .collect())
    }

    async fn list_roles(&self) -> Result<Vec<RoleRecord>, StorageError> {
        let mut roles: Vec<RoleRecord> = self.read()?.roles.values().cloned().collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn find_role(&self, role_code: &str) -> Result<Option<RoleRecord>, StorageError> {
        Ok(self.read()?.roles.get(role_code).cloned())
    }

    async fn create_role(&self, record: RoleCreate) -> Result<RoleRecord, StorageError> {
        let mut state = self.write()?;
        if state.roles.contains_key(&record.role_code)
            || state.roles.values().any(|role| role.name == record.name)
        {
            return Err(StorageError::invalid("role already exists"));
        }
        let now = domain::time::now_utc();
        let role = RoleRecord {
            role_code: record.role_code,
            name: record.name,
            description: record.description,
            is_active: true,
            is_public_role: false,
            permissions: record.permissions,
            created_at: now,
            updated_at: now,
        };
        state.roles.insert(role.role_code.clone(), role.clone());
        Ok(role)
    }

    async fn delete_role(&self, role_code: &str) -> Result<bool, StorageError> {
        let mut state = self.write()?;
        if state
            .user_roles
            .values()
            .any(|assignment| assignment.role_code == role_code)
        {
            return Err(StorageError::invalid("role is assigned to users"));
        }
        Ok(state.roles.remove(role_code).is_some())
    }

    async fn set_role_permissions(
        &self,
        role_code: &str,
        permissions: BTreeSet<Permission>,
    ) -> Result<Option<RoleRecord>, StorageError> {
        let mut state = self.write()?;
        let Some(role) = state.roles.get_mut(role_code) else {
            return Ok(None);
        };
        role.permissions = permissions;
        role.updated_at = domain::time::now_utc();
        Ok(Some(role.clone()))
    }

    async fn list_user_roles(&self) -> Result<Vec<UserRoleRecord>, StorageError> {
        let mut items: Vec<UserRoleRecord> = self.read()?.user_roles.values().cloned().collect();
        items.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        Ok(items)
    }

    async fn find_assignment(
        &self,
        user_id: &str,
    ) -> Result<Option<RoleAssignment>, StorageError> {
        let state = self.read()?;
        let Some(user_role) = state.user_roles.get(user_id) else {
            return Ok(None);
        };
        let Some(role) = state.roles.get(&user_role.role_code) else {
            return Err(StorageError::new("role missing for user assignment"));
        };
        Ok(Some(RoleAssignment {
            user_role: user_role.clone(),
            role: role.clone(),
        }))
    }

    async fn assign_role(
        &self,
        user_id: &str,
        role_code: &str,
    ) -> Result<UserRoleRecord, StorageError> {
        let mut state = self.write()?;
        if !state.users.contains_key(user_id) {
            return Err(StorageError::not_found("user not found"));
        }
        if !state.roles.contains_key(role_code) {
            return Err(StorageError::invalid("unknown role"));
        }
        let now = domain::time::now_utc();
        let record = state
            .user_roles
            .entry(user_id.to_string())
            .and_modify(|existing| {
                existing.role_code = role_code.to_string();
                existing.updated_at = now;
            })
            .or_insert_with(|| UserRoleRecord {
                user_id: user_id.to_string(),
                role_code: role_code.to_string(),
                permission_overrides: Default::default(),
                can_view_costs: false,
                can_view_external_contacts: false,
                created_at: now,
                updated_at: now,
            });
        Ok(record.clone())
    }

    async fn set_permission_override(
        &self,
        user_id: &str,
        permission: Permission,
        granted: Option<bool>,
    ) -> Result<Option<UserRoleRecord>, StorageError> {
        let mut state = self.write()?;
        let Some(record) = state.user_roles.get_mut(user_id) else {
            return Ok(None);
        };
        match granted {
            Some(granted) => record.permission_overrides.set(permission, granted),
            None => {
                record.permission_overrides.clear(permission);
            }
        }
        record.updated_at = domain::time::now_utc();
        Ok(Some(record.clone()))
    }

    async fn load_public_role(&self) -> Result<PublicRoleRecord, StorageError> {
        let mut state = self.write()?;
        Ok(state
            .public_role
            .get_or_insert_with(PublicRoleRecord::seeded)
            .clone())
    }

    async fn set_public_permissions(
        &self,
        permissions: BTreeSet<Permission>,
    ) -> Result<PublicRoleRecord, StorageError> {
        let mut state = self.write()?;
        let public_role = state
            .public_role
            .get_or_insert_with(PublicRoleRecord::seeded);
        public_role.permissions = permissions;
        Ok(public_role.clone())
    }
}
