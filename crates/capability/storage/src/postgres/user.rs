//! Postgres 用户与 RBAC 存储实现
//!
//! 设计要点：
//! - 删除用户在一个事务内先删除 `user_roles`，再删除 `users`
//! - 公共角色单例通过 `insert ... on conflict do nothing` 原子创建
//! - 数据库中出现未知权限码时跳过并告警，不参与权限解析

use crate::error::StorageError;
use crate::models::{
    PermissionRecord, PublicRoleRecord, RoleAssignment, RoleCreate, RoleRecord, UserCreate,
    UserRecord, UserRoleRecord,
};
use crate::postgres::rows::timestamp;
use crate::traits::{RbacStore, UserStore};
use domain::permissions::{DEFAULT_PUBLIC_PERMISSIONS, default_role_templates};
use domain::{Permission, PermissionOverrides};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::collections::{BTreeMap, BTreeSet, HashMap};

pub struct PgUserStore {
    pub pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 写入权限目录与默认角色包（已存在的行保持不变）。
    pub async fn seed_defaults(&self) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await?;
        for permission in Permission::ALL {
            sqlx::query(
                "insert into permissions (codename, name, category, description) \
                 values ($1, $2, $3, $4) on conflict (codename) do nothing",
            )
            .bind(permission.codename())
            .bind(permission.display_name())
            .bind(permission.category())
            .bind(permission.description())
            .execute(&mut *tx)
            .await?;
        }
        for template in default_role_templates() {
            let inserted = sqlx::query(
                "insert into roles (role_code, name, description) values ($1, $2, $3) \
                 on conflict (role_code) do nothing",
            )
            .bind(template.role_code)
            .bind(template.name)
            .bind(template.description)
            .execute(&mut *tx)
            .await?;
            if inserted.rows_affected() == 0 {
                continue;
            }
            for permission in template.permissions {
                insert_role_permission(&mut tx, template.role_code, *permission).await?;
            }
        }
        tx.commit().await?;
        Ok(())
    }

    async fn role_permissions(
        &self,
        role_codes: &[String],
    ) -> Result<HashMap<String, BTreeSet<Permission>>, StorageError> {
        let rows = sqlx::query(
            "select role_code, codename from role_permissions where role_code = any($1)",
        )
        .bind(role_codes)
        .fetch_all(&self.pool)
        .await?;
        let mut grouped: HashMap<String, BTreeSet<Permission>> = HashMap::new();
        for row in rows {
            let role_code: String = row.try_get("role_code")?;
            let codename: String = row.try_get("codename")?;
            match codename.parse::<Permission>() {
                Ok(permission) => {
                    grouped.entry(role_code).or_default().insert(permission);
                }
                Err(err) => {
                    tracing::warn!(target: "logbook.storage", role_code = %role_code, error = %err, "skip unknown role permission");
                }
            }
        }
        Ok(grouped)
    }
}

const USER_COLUMNS: &str =
    "user_id, username, password_hash, email, is_superuser, is_active, created_at";

fn user_from_row(row: &PgRow) -> Result<UserRecord, StorageError> {
    Ok(UserRecord {
        user_id: row.try_get("user_id")?,
        username: row.try_get("username")?,
        password: row.try_get("password_hash")?,
        email: row.try_get("email")?,
        is_superuser: row.try_get("is_superuser")?,
        is_active: row.try_get("is_active")?,
        created_at: timestamp(row, "created_at")?,
    })
}

fn role_from_row(row: &PgRow, permissions: BTreeSet<Permission>) -> Result<RoleRecord, StorageError> {
    Ok(RoleRecord {
        role_code: row.try_get("role_code")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        is_active: row.try_get("is_active")?,
        is_public_role: row.try_get("is_public_role")?,
        permissions,
        created_at: timestamp(row, "created_at")?,
        updated_at: timestamp(row, "updated_at")?,
    })
}

const USER_ROLE_COLUMNS: &str = "user_id, role_code, permission_overrides, can_view_costs, \
     can_view_external_contacts, created_at, updated_at";

fn user_role_from_row(row: &PgRow) -> Result<UserRoleRecord, StorageError> {
    let Json(raw): Json<HashMap<String, bool>> = row.try_get("permission_overrides")?;
    let permission_overrides = PermissionOverrides::parse(&raw)
        .map_err(|err| StorageError::invalid(format!("invalid permission_overrides: {err}")))?;
    Ok(UserRoleRecord {
        user_id: row.try_get("user_id")?,
        role_code: row.try_get("role_code")?,
        permission_overrides,
        can_view_costs: row.try_get("can_view_costs")?,
        can_view_external_contacts: row.try_get("can_view_external_contacts")?,
        created_at: timestamp(row, "created_at")?,
        updated_at: timestamp(row, "updated_at")?,
    })
}

async fn insert_role_permission(
    tx: &mut Transaction<'_, Postgres>,
    role_code: &str,
    permission: Permission,
) -> Result<(), StorageError> {
    sqlx::query(
        "insert into role_permissions (role_code, codename) values ($1, $2) \
         on conflict do nothing",
    )
    .bind(role_code)
    .bind(permission.codename())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// 确保公共角色行存在；首次创建时写入默认公共权限。
async fn ensure_public_role(tx: &mut Transaction<'_, Postgres>) -> Result<(), StorageError> {
    let inserted = sqlx::query("insert into public_role (id) values (1) on conflict (id) do nothing")
        .execute(&mut **tx)
        .await?;
    if inserted.rows_affected() > 0 {
        for permission in DEFAULT_PUBLIC_PERMISSIONS {
            sqlx::query(
                "insert into public_role_permissions (codename) values ($1) on conflict do nothing",
            )
            .bind(permission.codename())
            .execute(&mut **tx)
            .await?;
        }
    }
    Ok(())
}

async fn read_public_role(
    tx: &mut Transaction<'_, Postgres>,
) -> Result<PublicRoleRecord, StorageError> {
    let is_active: bool = sqlx::query_scalar("select is_active from public_role where id = 1")
        .fetch_one(&mut **tx)
        .await?;
    let codes: Vec<String> = sqlx::query_scalar("select codename from public_role_permissions")
        .fetch_all(&mut **tx)
        .await?;
    let permissions = codes
        .iter()
        .filter_map(|code| code.parse::<Permission>().ok())
        .collect();
    Ok(PublicRoleRecord {
        is_active,
        permissions,
    })
}

#[async_trait::async_trait]
impl UserStore for PgUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StorageError> {
        let row = sqlx::query(&format!("select {USER_COLUMNS} from users where username = $1"))
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_by_id(&self, user_id: &str) -> Result<Option<UserRecord>, StorageError> {
        let row = sqlx::query(&format!("select {USER_COLUMNS} from users where user_id = $1"))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn update_password_hash(
        &self,
        user_id: &str,
        password_hash: &str,
    ) -> Result<bool, StorageError> {
        let result = sqlx::query("update users set password_hash = $2 where user_id = $1")
            .bind(user_id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_refresh_jti(&self, user_id: &str) -> Result<Option<String>, StorageError> {
        let value: Option<Option<String>> =
            sqlx::query_scalar("select refresh_jti from users where user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(value.flatten())
    }

    async fn set_refresh_jti(
        &self,
        user_id: &str,
        refresh_jti: Option<&str>,
    ) -> Result<bool, StorageError> {
        let result = sqlx::query("update users set refresh_jti = $2 where user_id = $1")
            .bind(user_id)
            .bind(refresh_jti)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>, StorageError> {
        let rows = sqlx::query(&format!(
            "select {USER_COLUMNS} from users order by created_at asc, username asc"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(user_from_row).collect()
    }

    async fn create_user(&self, record: UserCreate) -> Result<UserRecord, StorageError> {
        let exists: Option<String> =
            sqlx::query_scalar("select user_id from users where username = $1 or user_id = $2")
                .bind(&record.username)
                .bind(&record.user_id)
                .fetch_optional(&self.pool)
                .await?;
        if exists.is_some() {
            return Err(StorageError::invalid("username already exists"));
        }
        let row = sqlx::query(&format!(
            "insert into users (user_id, username, password_hash, email, is_superuser) \
             values ($1, $2, $3, $4, $5) returning {USER_COLUMNS}"
        ))
        .bind(&record.user_id)
        .bind(&record.username)
        .bind(&record.password)
        .bind(&record.email)
        .bind(record.is_superuser)
        .fetch_one(&self.pool)
        .await?;
        user_from_row(&row)
    }

    async fn delete_user(&self, user_id: &str) -> Result<bool, StorageError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("delete from user_roles where user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("delete from users where user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait::async_trait]
impl RbacStore for PgUserStore {
    async fn list_permissions(&self) -> Result<Vec<PermissionRecord>, StorageError> {
        let rows = sqlx::query(
            "select codename, name, category, description from permissions \
             order by category asc, codename asc",
        )
        .fetch_all(&self.pool)
        .await?;
        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let codename: String = row.try_get("codename")?;
            let Ok(permission) = codename.parse::<Permission>() else {
                tracing::warn!(target: "logbook.storage", codename = %codename, "skip unknown permission");
                continue;
            };
            items.push(PermissionRecord {
                permission,
                name: row.try_get("name")?,
                category: row.try_get("category")?,
                description: row.try_get("description")?,
            });
        }
        Ok(items)
    }

    async fn list_roles(&self) -> Result<Vec<RoleRecord>, StorageError> {
        let rows = sqlx::query(
            "select role_code, name, description, is_active, is_public_role, created_at, updated_at \
             from roles order by name asc",
        )
        .fetch_all(&self.pool)
        .await?;
        let codes: Vec<String> = rows
            .iter()
            .map(|row| row.try_get("role_code"))
            .collect::<Result<_, _>>()?;
        let mut permissions = self.role_permissions(&codes).await?;
        rows.iter()
            .map(|row| {
                let code: String = row.try_get("role_code")?;
                role_from_row(row, permissions.remove(&code).unwrap_or_default())
            })
            .collect()
    }

    async fn find_role(&self, role_code: &str) -> Result<Option<RoleRecord>, StorageError> {
        let row = sqlx::query(
            "select role_code, name, description, is_active, is_public_role, created_at, updated_at \
             from roles where role_code = $1",
        )
        .bind(role_code)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let mut permissions = self.role_permissions(&[role_code.to_string()]).await?;
        Ok(Some(role_from_row(
            &row,
            permissions.remove(role_code).unwrap_or_default(),
        )?))
    }

    async fn create_role(&self, record: RoleCreate) -> Result<RoleRecord, StorageError> {
        let mut tx = self.pool.begin().await?;
        let inserted = sqlx::query(
            "insert into roles (role_code, name, description) values ($1, $2, $3) \
             on conflict do nothing",
        )
        .bind(&record.role_code)
        .bind(&record.name)
        .bind(&record.description)
        .execute(&mut *tx)
        .await?;
        if inserted.rows_affected() == 0 {
            return Err(StorageError::invalid("role already exists"));
        }
        for permission in &record.permissions {
            insert_role_permission(&mut tx, &record.role_code, *permission).await?;
        }
        tx.commit().await?;
        self.find_role(&record.role_code)
            .await?
            .ok_or_else(|| StorageError::new("role vanished after insert"))
    }

    async fn delete_role(&self, role_code: &str) -> Result<bool, StorageError> {
        let holders: i64 =
            sqlx::query_scalar("select count(*) from user_roles where role_code = $1")
                .bind(role_code)
                .fetch_one(&self.pool)
                .await?;
        if holders > 0 {
            return Err(StorageError::invalid("role is assigned to users"));
        }
        let result = sqlx::query("delete from roles where role_code = $1")
            .bind(role_code)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_role_permissions(
        &self,
        role_code: &str,
        permissions: BTreeSet<Permission>,
    ) -> Result<Option<RoleRecord>, StorageError> {
        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query("update roles set updated_at = now() where role_code = $1")
            .bind(role_code)
            .execute(&mut *tx)
            .await?;
        if updated.rows_affected() == 0 {
            return Ok(None);
        }
        sqlx::query("delete from role_permissions where role_code = $1")
            .bind(role_code)
            .execute(&mut *tx)
            .await?;
        for permission in &permissions {
            insert_role_permission(&mut tx, role_code, *permission).await?;
        }
        tx.commit().await?;
        self.find_role(role_code).await
    }

    async fn list_user_roles(&self) -> Result<Vec<UserRoleRecord>, StorageError> {
        let rows = sqlx::query(&format!(
            "select {USER_ROLE_COLUMNS} from user_roles order by user_id asc"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(user_role_from_row).collect()
    }

    async fn find_assignment(
        &self,
        user_id: &str,
    ) -> Result<Option<RoleAssignment>, StorageError> {
        let row = sqlx::query(&format!(
            "select {USER_ROLE_COLUMNS} from user_roles where user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let user_role = user_role_from_row(&row)?;
        let role = self
            .find_role(&user_role.role_code)
            .await?
            .ok_or_else(|| StorageError::new("role missing for user assignment"))?;
        Ok(Some(RoleAssignment { user_role, role }))
    }

    async fn assign_role(
        &self,
        user_id: &str,
        role_code: &str,
    ) -> Result<UserRoleRecord, StorageError> {
        let user_exists: Option<String> =
            sqlx::query_scalar("select user_id from users where user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        if user_exists.is_none() {
            return Err(StorageError::not_found("user not found"));
        }
        let role_exists: Option<String> =
            sqlx::query_scalar("select role_code from roles where role_code = $1")
                .bind(role_code)
                .fetch_optional(&self.pool)
                .await?;
        if role_exists.is_none() {
            return Err(StorageError::invalid("unknown role"));
        }
        let row = sqlx::query(&format!(
            "insert into user_roles (user_id, role_code) values ($1, $2) \
             on conflict (user_id) do update set role_code = excluded.role_code, updated_at = now() \
             returning {USER_ROLE_COLUMNS}"
        ))
        .bind(user_id)
        .bind(role_code)
        .fetch_one(&self.pool)
        .await?;
        user_role_from_row(&row)
    }

    async fn set_permission_override(
        &self,
        user_id: &str,
        permission: Permission,
        granted: Option<bool>,
    ) -> Result<Option<UserRoleRecord>, StorageError> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(&format!(
            "select {USER_ROLE_COLUMNS} from user_roles where user_id = $1 for update"
        ))
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let mut record = user_role_from_row(&row)?;
        match granted {
            Some(granted) => record.permission_overrides.set(permission, granted),
            None => {
                record.permission_overrides.clear(permission);
            }
        }
        let stored: BTreeMap<String, bool> = record.permission_overrides.to_code_map();
        let row = sqlx::query(&format!(
            "update user_roles set permission_overrides = $2, updated_at = now() \
             where user_id = $1 returning {USER_ROLE_COLUMNS}"
        ))
        .bind(user_id)
        .bind(Json(stored))
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(Some(user_role_from_row(&row)?))
    }

    async fn load_public_role(&self) -> Result<PublicRoleRecord, StorageError> {
        let mut tx = self.pool.begin().await?;
        ensure_public_role(&mut tx).await?;
        let record = read_public_role(&mut tx).await?;
        tx.commit().await?;
        Ok(record)
    }

    async fn set_public_permissions(
        &self,
        permissions: BTreeSet<Permission>,
    ) -> Result<PublicRoleRecord, StorageError> {
        let mut tx = self.pool.begin().await?;
        ensure_public_role(&mut tx).await?;
        sqlx::query("delete from public_role_permissions")
            .execute(&mut *tx)
            .await?;
        for permission in &permissions {
            sqlx::query("insert into public_role_permissions (codename) values ($1)")
                .bind(permission.codename())
                .execute(&mut *tx)
                .await?;
        }
        let record = read_public_role(&mut tx).await?;
        tx.commit().await?;
        Ok(record)
    }
}

