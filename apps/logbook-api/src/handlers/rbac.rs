//! 角色与用户管理 handlers（全部需要 `manage_users`）
//!
//! - 权限目录：`GET /rbac/permissions`、`GET /rbac/permissions/by-category`
//! - 角色：列表、新建、克隆、删除、整体替换权限、权限矩阵
//! - 用户：列表、新建、分配角色、设置/移除单个权限覆盖、删除
//!
//! 角色权限变更在下一次请求时对所有持有者生效（Actor 每个请求重新装载）。

use super::write_audit;
use crate::AppState;
use crate::middleware::require_authorized;
use crate::utils::response::{
    bad_request_error, internal_auth_error, not_found_error, permission_codes,
    permission_to_dto, role_to_dto, storage_error,
};
use crate::utils::validation::{
    normalize_optional, normalize_required, parse_permission, parse_permissions,
};
use api_contract::{
    ApiResponse, AssignRoleRequest, CloneRoleRequest, CreateRoleRequest, CreateUserRequest,
    PermissionCategoryDto, PermissionDto, PermissionListRequest, PermissionMatrixDto,
    PermissionMatrixRowDto, RoleDto, SetOverrideRequest, UserDto,
};
use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use domain::{AuditAction, Permission, SessionContext};
use logbook_access::all_permissions;
use logbook_auth::hash_new_password;
use logbook_storage::{RoleCreate, RoleRecord, UserCreate, UserRecord, UserRoleRecord};
use serde_json::json;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, serde::Deserialize)]
pub struct RolePath {
    pub role_code: String,
}

#[derive(Debug, serde::Deserialize)]
pub struct UserPath {
    pub user_id: String,
}

#[derive(Debug, serde::Deserialize)]
pub struct OverridePath {
    pub user_id: String,
    pub permission: String,
}

fn user_counts(assignments: &[UserRoleRecord]) -> HashMap<&str, usize> {
    let mut counts = HashMap::new();
    for assignment in assignments {
        *counts.entry(assignment.role_code.as_str()).or_default() += 1;
    }
    counts
}

async fn role_response(state: &AppState, role: RoleRecord, status: StatusCode) -> Response {
    let assignments = match state.rbac_store.list_user_roles().await {
        Ok(assignments) => assignments,
        Err(err) => return storage_error(err),
    };
    let count = user_counts(&assignments)
        .get(role.role_code.as_str())
        .copied()
        .unwrap_or(0);
    (status, Json(ApiResponse::success(role_to_dto(role, count)))).into_response()
}

/// 组装用户视图；有效权限与请求时的解析结果一致（停用用户为空）。
async fn user_dto(state: &AppState, user: UserRecord, assignment: Option<&UserRoleRecord>) -> UserDto {
    let session = SessionContext::new(user.user_id.clone(), user.username.clone());
    let effective = match state.access.user_actor(&session).await {
        Ok(actor) => permission_codes(&all_permissions(&actor)),
        Err(_) => Vec::new(),
    };
    UserDto {
        user_id: user.user_id,
        username: user.username,
        email: user.email,
        is_superuser: user.is_superuser,
        is_active: user.is_active,
        role: assignment.map(|record| record.role_code.clone()),
        permission_overrides: assignment
            .map(|record| record.permission_overrides.to_code_map())
            .unwrap_or_default(),
        can_view_costs: assignment.is_some_and(|record| record.can_view_costs),
        can_view_external_contacts: assignment
            .is_some_and(|record| record.can_view_external_contacts),
        all_permissions: effective,
        created_at: user.created_at,
    }
}

async fn single_user_response(state: &AppState, user_id: &str, status: StatusCode) -> Response {
    let user = match state.user_store.find_by_id(user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => return not_found_error(),
        Err(err) => return storage_error(err),
    };
    let assignment = match state.rbac_store.find_assignment(user_id).await {
        Ok(assignment) => assignment.map(|assignment| assignment.user_role),
        Err(err) => return storage_error(err),
    };
    let dto = user_dto(state, user, assignment.as_ref()).await;
    (status, Json(ApiResponse::success(dto))).into_response()
}

// ---- 权限目录 ----

pub async fn list_permissions(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(response) = require_authorized(&state, &headers, Permission::ManageUsers).await {
        return response;
    }
    match state.rbac_store.list_permissions().await {
        Ok(records) => {
            let items: Vec<PermissionDto> = records.into_iter().map(permission_to_dto).collect();
            (StatusCode::OK, Json(ApiResponse::success(items))).into_response()
        }
        Err(err) => storage_error(err),
    }
}

pub async fn permissions_by_category(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Response {
    if let Err(response) = require_authorized(&state, &headers, Permission::ManageUsers).await {
        return response;
    }
    let records = match state.rbac_store.list_permissions().await {
        Ok(records) => records,
        Err(err) => return storage_error(err),
    };
    let mut grouped: BTreeMap<String, Vec<PermissionDto>> = BTreeMap::new();
    for record in records {
        grouped
            .entry(record.category.clone())
            .or_default()
            .push(permission_to_dto(record));
    }
    let items: Vec<PermissionCategoryDto> = grouped
        .into_iter()
        .map(|(category, permissions)| PermissionCategoryDto {
            category,
            permissions,
        })
        .collect();
    (StatusCode::OK, Json(ApiResponse::success(items))).into_response()
}

// ---- 角色 ----

pub async fn list_roles(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(response) = require_authorized(&state, &headers, Permission::ManageUsers).await {
        return response;
    }
    let roles = match state.rbac_store.list_roles().await {
        Ok(roles) => roles,
        Err(err) => return storage_error(err),
    };
    let assignments = match state.rbac_store.list_user_roles().await {
        Ok(assignments) => assignments,
        Err(err) => return storage_error(err),
    };
    let counts = user_counts(&assignments);
    let items: Vec<RoleDto> = roles
        .into_iter()
        .map(|role| {
            let count = counts.get(role.role_code.as_str()).copied().unwrap_or(0);
            role_to_dto(role, count)
        })
        .collect();
    (StatusCode::OK, Json(ApiResponse::success(items))).into_response()
}

pub async fn get_role(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<RolePath>,
) -> Response {
    if let Err(response) = require_authorized(&state, &headers, Permission::ManageUsers).await {
        return response;
    }
    match state.rbac_store.find_role(&path.role_code).await {
        Ok(Some(role)) => role_response(&state, role, StatusCode::OK).await,
        Ok(None) => not_found_error(),
        Err(err) => storage_error(err),
    }
}

pub async fn create_role(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateRoleRequest>,
) -> Response {
    let caller = match require_authorized(&state, &headers, Permission::ManageUsers).await {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    let role_code = match normalize_required(req.role_code, "roleCode") {
        Ok(value) => value,
        Err(response) => return response,
    };
    let name = match normalize_required(req.name, "name") {
        Ok(value) => value,
        Err(response) => return response,
    };
    let permissions = match parse_permissions(&req.permissions) {
        Ok(value) => value,
        Err(response) => return response,
    };

    let record = RoleCreate {
        role_code,
        name,
        description: req.description.trim().to_string(),
        permissions,
    };
    let role = match state.rbac_store.create_role(record).await {
        Ok(role) => role,
        Err(err) => return storage_error(err),
    };
    write_audit(
        &state,
        &caller,
        AuditAction::PermissionChanged,
        format!("Role {} created", role.role_code),
        json!({ "role_code": role.role_code, "permissions": permission_codes(&role.permissions) }),
    )
    .await;
    role_response(&state, role, StatusCode::CREATED).await
}

/// 以现有角色的权限为模板创建新角色。
pub async fn clone_role(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<RolePath>,
    Json(req): Json<CloneRoleRequest>,
) -> Response {
    let caller = match require_authorized(&state, &headers, Permission::ManageUsers).await {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    let source = match state.rbac_store.find_role(&path.role_code).await {
        Ok(Some(role)) => role,
        Ok(None) => return not_found_error(),
        Err(err) => return storage_error(err),
    };
    let role_code = match normalize_required(req.role_code, "roleCode") {
        Ok(value) => value,
        Err(response) => return response,
    };
    let name = match normalize_required(req.name, "name") {
        Ok(value) => value,
        Err(response) => return response,
    };

    let record = RoleCreate {
        role_code,
        name,
        description: req
            .description
            .map(|value| value.trim().to_string())
            .unwrap_or_else(|| format!("Copy of {}", source.name)),
        permissions: source.permissions.clone(),
    };
    let role = match state.rbac_store.create_role(record).await {
        Ok(role) => role,
        Err(err) => return storage_error(err),
    };
    write_audit(
        &state,
        &caller,
        AuditAction::PermissionChanged,
        format!("Role {} cloned from {}", role.role_code, source.role_code),
        json!({ "role_code": role.role_code, "source": source.role_code }),
    )
    .await;
    role_response(&state, role, StatusCode::CREATED).await
}

pub async fn delete_role(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<RolePath>,
) -> Response {
    let caller = match require_authorized(&state, &headers, Permission::ManageUsers).await {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    match state.rbac_store.delete_role(&path.role_code).await {
        Ok(true) => {}
        Ok(false) => return not_found_error(),
        Err(err) => return storage_error(err),
    }
    write_audit(
        &state,
        &caller,
        AuditAction::PermissionChanged,
        format!("Role {} deleted", path.role_code),
        json!({ "role_code": path.role_code }),
    )
    .await;
    StatusCode::NO_CONTENT.into_response()
}

/// 整体替换角色的权限集合。
pub async fn set_role_permissions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<RolePath>,
    Json(req): Json<PermissionListRequest>,
) -> Response {
    let caller = match require_authorized(&state, &headers, Permission::ManageUsers).await {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    let permissions = match parse_permissions(&req.permissions) {
        Ok(value) => value,
        Err(response) => return response,
    };
    let role = match state
        .rbac_store
        .set_role_permissions(&path.role_code, permissions)
        .await
    {
        Ok(Some(role)) => role,
        Ok(None) => return not_found_error(),
        Err(err) => return storage_error(err),
    };
    tracing::info!(
        target: "logbook.access",
        role_code = %role.role_code,
        permissions = role.permissions.len(),
        "role_permissions_replaced"
    );
    write_audit(
        &state,
        &caller,
        AuditAction::PermissionChanged,
        format!("Permissions of role {} replaced", role.role_code),
        json!({ "role_code": role.role_code, "permissions": permission_codes(&role.permissions) }),
    )
    .await;
    role_response(&state, role, StatusCode::OK).await
}

/// 角色 × 权限矩阵。
pub async fn permission_matrix(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(response) = require_authorized(&state, &headers, Permission::ManageUsers).await {
        return response;
    }
    let permissions = match state.rbac_store.list_permissions().await {
        Ok(records) => records,
        Err(err) => return storage_error(err),
    };
    let roles = match state.rbac_store.list_roles().await {
        Ok(roles) => roles,
        Err(err) => return storage_error(err),
    };
    let rows = roles
        .into_iter()
        .map(|role| PermissionMatrixRowDto {
            granted: Permission::ALL
                .iter()
                .map(|permission| {
                    (
                        permission.codename().to_string(),
                        role.permissions.contains(permission),
                    )
                })
                .collect(),
            role_code: role.role_code,
            name: role.name,
        })
        .collect();
    let dto = PermissionMatrixDto {
        permissions: permissions.into_iter().map(permission_to_dto).collect(),
        roles: rows,
    };
    (StatusCode::OK, Json(ApiResponse::success(dto))).into_response()
}

// ---- 用户 ----

pub async fn list_users(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(response) = require_authorized(&state, &headers, Permission::ManageUsers).await {
        return response;
    }
    let users = match state.user_store.list_users().await {
        Ok(users) => users,
        Err(err) => return storage_error(err),
    };
    let assignments = match state.rbac_store.list_user_roles().await {
        Ok(assignments) => assignments,
        Err(err) => return storage_error(err),
    };
    let by_user: HashMap<&str, &UserRoleRecord> = assignments
        .iter()
        .map(|assignment| (assignment.user_id.as_str(), assignment))
        .collect();

    let mut items = Vec::with_capacity(users.len());
    for user in users {
        let assignment = by_user.get(user.user_id.as_str()).copied();
        items.push(user_dto(&state, user, assignment).await);
    }
    (StatusCode::OK, Json(ApiResponse::success(items))).into_response()
}

pub async fn get_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<UserPath>,
) -> Response {
    if let Err(response) = require_authorized(&state, &headers, Permission::ManageUsers).await {
        return response;
    }
    single_user_response(&state, &path.user_id, StatusCode::OK).await
}

pub async fn create_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateUserRequest>,
) -> Response {
    let caller = match require_authorized(&state, &headers, Permission::ManageUsers).await {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    let username = match normalize_required(req.username, "username") {
        Ok(value) => value,
        Err(response) => return response,
    };
    let email = match normalize_optional(req.email, "email") {
        Ok(value) => value,
        Err(response) => return response,
    };
    let role = match normalize_optional(req.role, "role") {
        Ok(value) => value,
        Err(response) => return response,
    };
    // 先确认角色存在，避免留下无角色的半成品用户
    if let Some(role_code) = role.as_deref() {
        match state.rbac_store.find_role(role_code).await {
            Ok(Some(_)) => {}
            Ok(None) => return bad_request_error(format!("unknown role: {role_code}")),
            Err(err) => return storage_error(err),
        }
    }
    let password = match hash_new_password(&req.password) {
        Ok(hash) => hash,
        Err(err) => return internal_auth_error(err),
    };

    let user = match state
        .user_store
        .create_user(UserCreate {
            user_id: uuid::Uuid::new_v4().to_string(),
            username,
            password,
            email,
            is_superuser: req.is_superuser,
        })
        .await
    {
        Ok(user) => user,
        Err(err) => return storage_error(err),
    };
    if let Some(role_code) = role.as_deref() {
        if let Err(err) = state.rbac_store.assign_role(&user.user_id, role_code).await {
            return storage_error(err);
        }
    }
    write_audit(
        &state,
        &caller,
        AuditAction::PermissionChanged,
        format!("User {} created", user.username),
        json!({ "user_id": user.user_id, "role": role, "is_superuser": user.is_superuser }),
    )
    .await;
    single_user_response(&state, &user.user_id, StatusCode::CREATED).await
}

pub async fn delete_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<UserPath>,
) -> Response {
    let caller = match require_authorized(&state, &headers, Permission::ManageUsers).await {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    if caller.actor.user_id() == Some(path.user_id.as_str()) {
        return bad_request_error("cannot delete the current user");
    }
    match state.user_store.delete_user(&path.user_id).await {
        Ok(true) => {}
        Ok(false) => return not_found_error(),
        Err(err) => return storage_error(err),
    }
    write_audit(
        &state,
        &caller,
        AuditAction::PermissionChanged,
        format!("User {} deleted", path.user_id),
        json!({ "user_id": path.user_id }),
    )
    .await;
    StatusCode::NO_CONTENT.into_response()
}

/// 分配（或替换）用户角色，已有的权限覆盖保留。
pub async fn assign_user_role(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<UserPath>,
    Json(req): Json<AssignRoleRequest>,
) -> Response {
    let caller = match require_authorized(&state, &headers, Permission::ManageUsers).await {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    let role_code = match normalize_required(req.role, "role") {
        Ok(value) => value,
        Err(response) => return response,
    };
    match state.user_store.find_by_id(&path.user_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return not_found_error(),
        Err(err) => return storage_error(err),
    }
    match state.rbac_store.find_role(&role_code).await {
        Ok(Some(_)) => {}
        Ok(None) => return bad_request_error(format!("unknown role: {role_code}")),
        Err(err) => return storage_error(err),
    }
    if let Err(err) = state.rbac_store.assign_role(&path.user_id, &role_code).await {
        return storage_error(err);
    }
    write_audit(
        &state,
        &caller,
        AuditAction::PermissionChanged,
        format!("Role {role_code} assigned to user {}", path.user_id),
        json!({ "user_id": path.user_id, "role": role_code }),
    )
    .await;
    single_user_response(&state, &path.user_id, StatusCode::OK).await
}

async fn apply_override(
    state: &AppState,
    headers: &HeaderMap,
    user_id: &str,
    permission: &str,
    granted: Option<bool>,
) -> Response {
    let caller = match require_authorized(state, headers, Permission::ManageUsers).await {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    let permission = match parse_permission(permission) {
        Ok(value) => value,
        Err(response) => return response,
    };
    match state
        .rbac_store
        .set_permission_override(user_id, permission, granted)
        .await
    {
        Ok(Some(_)) => {}
        Ok(None) => return bad_request_error("user has no role assignment"),
        Err(err) => return storage_error(err),
    }
    write_audit(
        state,
        &caller,
        AuditAction::PermissionChanged,
        format!("Permission override {} changed for user {user_id}", permission.codename()),
        json!({ "user_id": user_id, "permission": permission.codename(), "granted": granted }),
    )
    .await;
    single_user_response(state, user_id, StatusCode::OK).await
}

pub async fn set_permission_override(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<UserPath>,
    Json(req): Json<SetOverrideRequest>,
) -> Response {
    apply_override(&state, &headers, &path.user_id, &req.permission, Some(req.granted)).await
}

pub async fn remove_permission_override(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<OverridePath>,
) -> Response {
    apply_override(&state, &headers, &path.user_id, &path.permission, None).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{add_user, bearer, state};

    #[tokio::test]
    async fn operator_cannot_manage_users() {
        let state = state();
        add_user(&state, "op1", "operator-pass", "operator").await;
        let headers = bearer(&state, "op1", "operator-pass").await;
        let response = list_users(State(state), headers).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn unknown_permission_code_is_rejected() {
        let state = state();
        let headers = bearer(&state, "admin", "admin123").await;
        let response = set_role_permissions(
            State(state),
            headers,
            Path(RolePath {
                role_code: "operator".to_string(),
            }),
            Json(PermissionListRequest {
                permissions: vec!["crud_issues".to_string(), "fly_drones".to_string()],
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn override_applies_on_next_request() {
        let state = state();
        add_user(&state, "op2", "operator-pass", "operator").await;
        let admin = bearer(&state, "admin", "admin123").await;
        let response = set_permission_override(
            State(state.clone()),
            admin,
            Path(UserPath {
                user_id: "user-op2".to_string(),
            }),
            Json(SetOverrideRequest {
                permission: "manage_users".to_string(),
                granted: true,
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let headers = bearer(&state, "op2", "operator-pass").await;
        let response = list_users(State(state), headers).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn short_password_is_rejected() {
        let state = state();
        let headers = bearer(&state, "admin", "admin123").await;
        let response = create_user(
            State(state),
            headers,
            Json(CreateUserRequest {
                username: "tech9".to_string(),
                password: "short".to_string(),
                email: None,
                role: Some("technician".to_string()),
                is_superuser: false,
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
