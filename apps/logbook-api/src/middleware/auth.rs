//! 认证和授权中间件
//!
//! - request_context：请求上下文中间件，注入 request_id/trace_id
//! - bearer_token：从 Authorization 头提取 Bearer token
//! - require_caller：解析请求主体；无 token 为匿名访问者，token 无效返回 401
//! - require_user：要求登录用户
//! - require_permission：按有效权限判定，拒绝时记录计数与日志
//!
//! 权限不从 token 读取，每个请求依据存储中的角色状态重新解析。

use axum::{
    body::Body,
    extract::Request,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    middleware::Next,
    response::Response,
};
use domain::{Actor, Permission, SessionContext};
use logbook_access::{AccessError, has_permission};
use logbook_auth::AuthError;
use logbook_maintenance::Caller;
use logbook_telemetry::{new_request_ids, record_permission_denial};
use tracing::{Instrument, info_span, warn};

use crate::AppState;
use crate::utils::response::{auth_error, forbidden_error, internal_auth_error};

/// 请求上下文中间件：注入 request_id/trace_id
pub async fn request_context(mut req: Request<Body>, next: Next) -> Response {
    let ids = new_request_ids();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    req.extensions_mut().insert(ids.clone());

    let span = info_span!(
        "request",
        request_id = %ids.request_id,
        trace_id = %ids.trace_id,
        method = %method,
        path = %path
    );

    let mut response: Response = next.run(req).instrument(span).await;
    response.headers_mut().insert(
        "x-request-id",
        HeaderValue::from_str(&ids.request_id).unwrap_or_else(|_| HeaderValue::from_static("")),
    );
    response.headers_mut().insert(
        "x-trace-id",
        HeaderValue::from_str(&ids.trace_id).unwrap_or_else(|_| HeaderValue::from_static("")),
    );
    response
}

/// 从请求头中提取 Bearer token
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let header_value = headers.get(header::AUTHORIZATION)?;
    let auth_str = header_value.to_str().ok()?;
    auth_str.strip_prefix("Bearer ")
}

/// 审计用的客户端地址：取 `x-forwarded-for` 的第一个地址，其次 `x-real-ip`。
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    forwarded
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
        })
        .map(str::to_string)
}

pub fn user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

/// 验证 access token 得到会话；无 token 返回 None。
pub fn optional_session(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Option<SessionContext>, Response> {
    let Some(token) = bearer_token(headers) else {
        return Ok(None);
    };
    match state.auth.verify_access_token(token) {
        Ok(session) => Ok(Some(session)),
        Err(AuthError::TokenInvalid | AuthError::TokenExpired) => {
            Err(auth_error(StatusCode::UNAUTHORIZED))
        }
        Err(err) => Err(internal_auth_error(err)),
    }
}

/// 解析请求主体并附带审计所需的客户端信息。
pub async fn require_caller(state: &AppState, headers: &HeaderMap) -> Result<Caller, Response> {
    let session = optional_session(state, headers)?;
    let actor = match state.access.resolve(session.as_ref()).await {
        Ok(actor) => actor,
        Err(AccessError::UnknownUser | AccessError::InactiveUser) => {
            return Err(auth_error(StatusCode::UNAUTHORIZED));
        }
    };
    Ok(Caller {
        actor,
        ip_address: client_ip(headers),
        user_agent: user_agent(headers),
    })
}

/// 要求登录用户；匿名访问者返回 401。
pub async fn require_user(state: &AppState, headers: &HeaderMap) -> Result<Caller, Response> {
    let caller = require_caller(state, headers).await?;
    if !caller.actor.is_authenticated() {
        return Err(auth_error(StatusCode::UNAUTHORIZED));
    }
    Ok(caller)
}

/// 按有效权限判定。匿名访问者被拒返回 401（提示登录），登录用户返回 403。
pub fn require_permission(actor: &Actor, permission: Permission) -> Result<(), Response> {
    if has_permission(actor, permission) {
        return Ok(());
    }
    record_permission_denial();
    warn!(
        target: "logbook.access",
        actor = actor.display_name(),
        permission = permission.codename(),
        "permission_denied"
    );
    if actor.is_authenticated() {
        Err(forbidden_error())
    } else {
        Err(auth_error(StatusCode::UNAUTHORIZED))
    }
}

/// 解析请求主体并要求指定权限。
pub async fn require_authorized(
    state: &AppState,
    headers: &HeaderMap,
    permission: Permission,
) -> Result<Caller, Response> {
    let caller = require_caller(state, headers).await?;
    require_permission(&caller.actor, permission)?;
    Ok(caller)
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::PublicGrant;

    #[test]
    fn bearer_token_extracts() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer token-1"),
        );
        assert_eq!(bearer_token(&headers), Some("token-1"));
    }

    #[test]
    fn forwarded_address_wins() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.5, 10.0.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.9"));
        assert_eq!(client_ip(&headers).as_deref(), Some("10.0.0.5"));
    }

    #[test]
    fn anonymous_denial_is_unauthorized() {
        let actor = Actor::Anonymous(PublicGrant::Unavailable);
        let response = require_permission(&actor, Permission::CrudIssues).expect_err("denied");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
