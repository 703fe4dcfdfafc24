//! 认证相关 handlers：健康检查、登录、刷新 token、登出、当前访问者
//!
//! - `GET /health`、`GET /livez`、`GET /readyz`
//! - `POST /login`：返回 token 对、角色与登录时的有效权限
//! - `POST /refresh-token`：refresh token 单次有效，每次刷新轮换
//! - `POST /logout`：作废当前 refresh token
//! - `GET /me`：当前访问者（匿名或登录用户）的有效权限

use super::write_audit;
use crate::AppState;
use crate::middleware::{client_ip, require_caller, require_user, user_agent};
use crate::utils::response::{auth_error, internal_auth_error, permission_codes};
use api_contract::{
    ApiResponse, CurrentActorDto, LoginRequest, LoginResponse, RefreshTokenRequest,
    RefreshTokenResponse,
};
use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use domain::{Actor, AuditAction, SessionContext};
use logbook_access::all_permissions;
use logbook_auth::AuthError;
use logbook_maintenance::Caller;
use serde_json::json;

/// 健康检查端点
pub async fn health() -> impl IntoResponse {
    livez().await
}

/// Liveness 探针：只反映进程存活，不做外部依赖检查。
pub async fn livez() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

/// Readiness 探针：内存模式直接就绪，Postgres 模式检查连接。
pub async fn readyz(State(state): State<AppState>) -> Response {
    let Some(pool) = state.db_pool.as_ref() else {
        return (StatusCode::OK, Json(json!({ "ok": true }))).into_response();
    };

    match sqlx::query_scalar::<_, i32>("select 1").fetch_one(pool).await {
        Ok(_) => (StatusCode::OK, Json(json!({ "ok": true }))).into_response(),
        Err(err) => {
            tracing::warn!(error = %err, "readyz check failed");
            (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "ok": false }))).into_response()
        }
    }
}

fn role_code(actor: &Actor) -> Option<String> {
    match actor {
        Actor::User(principal) => principal.role.as_ref().map(|role| role.role_code.clone()),
        Actor::Anonymous(_) => None,
    }
}

/// 登录接口
///
/// # Errors
///
/// - `401 UNAUTHORIZED`：用户名或密码错误、用户已停用
/// - `500 INTERNAL SERVER ERROR`：认证服务内部错误
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<LoginRequest>,
) -> Response {
    let (user, tokens) = match state.auth.login(req.username.trim(), &req.password).await {
        Ok(result) => result,
        Err(AuthError::InvalidCredentials | AuthError::UserInactive) => {
            tracing::info!(username = %req.username.trim(), "login rejected");
            return auth_error(StatusCode::UNAUTHORIZED);
        }
        Err(err) => return internal_auth_error(err),
    };

    let session = SessionContext::new(user.user_id.clone(), user.username.clone());
    let actor = match state.access.user_actor(&session).await {
        Ok(actor) => actor,
        Err(_) => return auth_error(StatusCode::UNAUTHORIZED),
    };
    let permissions = permission_codes(&all_permissions(&actor));
    let role = role_code(&actor);

    let caller = Caller {
        actor,
        ip_address: client_ip(&headers),
        user_agent: user_agent(&headers),
    };
    write_audit(
        &state,
        &caller,
        AuditAction::UserLogin,
        format!("User {} logged in", user.username),
        json!({ "role": role }),
    )
    .await;

    let response = LoginResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        // 前端期望毫秒时间戳
        expires: tokens.expires_at.saturating_mul(1000),
        user_id: user.user_id,
        username: user.username,
        is_superuser: user.is_superuser,
        role,
        permissions,
    };
    (StatusCode::OK, Json(ApiResponse::success(response))).into_response()
}

/// 刷新 access token（refresh token 轮换，旧 token 立即失效）
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(req): Json<RefreshTokenRequest>,
) -> Response {
    match state.auth.refresh(&req.refresh_token).await {
        Ok(tokens) => {
            let response = RefreshTokenResponse {
                access_token: tokens.access_token,
                refresh_token: tokens.refresh_token,
                expires: tokens.expires_at.saturating_mul(1000),
            };
            (StatusCode::OK, Json(ApiResponse::success(response))).into_response()
        }
        Err(AuthError::TokenInvalid | AuthError::TokenExpired) => {
            auth_error(StatusCode::UNAUTHORIZED)
        }
        Err(err) => internal_auth_error(err),
    }
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let caller = match require_user(&state, &headers).await {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    let Actor::User(principal) = &caller.actor else {
        return auth_error(StatusCode::UNAUTHORIZED);
    };
    let session = SessionContext::new(principal.user_id.clone(), principal.username.clone());
    if let Err(err) = state.auth.logout(&session).await {
        return internal_auth_error(err);
    }
    write_audit(
        &state,
        &caller,
        AuditAction::UserLogout,
        format!("User {} logged out", session.username),
        json!({}),
    )
    .await;
    (StatusCode::OK, Json(ApiResponse::success(json!({ "ok": true })))).into_response()
}

pub async fn current_actor(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let caller = match require_caller(&state, &headers).await {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    let dto = CurrentActorDto {
        authenticated: caller.actor.is_authenticated(),
        username: caller.actor.display_name().to_string(),
        role: role_code(&caller.actor),
        permissions: permission_codes(&all_permissions(&caller.actor)),
    };
    (StatusCode::OK, Json(ApiResponse::success(dto))).into_response()
}
