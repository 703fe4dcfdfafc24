//! 路由定义
//!
//! 集中管理所有 API 路由，将路径映射到对应的 handlers。
//! 路由包括：
//! - 健康检查：/health, /livez, /readyz
//! - 认证接口：/login, /refresh-token, /logout, /me
//! - 故障单：/issues/*
//! - 维修措施：/issues/{id}/remedies, /remedies/*
//! - 附件：/issues/{id}/attachments, /remedies/{id}/attachments, /attachments/*
//! - 看板与报表：/dashboard, /reports/issues/*
//! - 权限管理：/rbac/*, /public-role
//! - 设置、审计与指标：/settings, /audit-logs, /metrics

use super::AppState;
use super::handlers::*;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, patch, post, put},
};

/// 附件请求体上限；单文件大小由全局设置另行校验。
const UPLOAD_BODY_LIMIT: usize = 512 * 1024 * 1024;

/// 创建 API 路由
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/livez", get(livez))
        .route("/readyz", get(readyz))
        .route("/login", post(login))
        .route("/refresh-token", post(refresh_token))
        .route("/logout", post(logout))
        .route("/me", get(current_actor))
        .route("/issues", get(list_issues).post(create_issue))
        .route(
            "/issues/:issue_id",
            get(get_issue).put(update_issue).delete(delete_issue),
        )
        .route("/issues/:issue_id/status", patch(update_issue_status))
        .route("/issues/:issue_id/remedies", post(add_remedy))
        .route(
            "/issues/:issue_id/attachments",
            post(upload_issue_attachment).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route(
            "/remedies/:remedy_id",
            get(get_remedy).put(update_remedy).delete(delete_remedy),
        )
        .route(
            "/remedies/:remedy_id/attachments",
            post(upload_remedy_attachment).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route(
            "/attachments/:attachment_id",
            axum::routing::delete(delete_attachment),
        )
        .route("/dashboard", get(dashboard))
        .route("/reports/issues/:issue_id", get(issue_report))
        .route("/audit-logs", get(list_audit_logs))
        .route("/metrics", get(metrics))
        .route("/rbac/permissions", get(list_permissions))
        .route("/rbac/permissions/by-category", get(permissions_by_category))
        .route("/rbac/roles", get(list_roles).post(create_role))
        .route("/rbac/roles/:role_code", get(get_role).delete(delete_role))
        .route("/rbac/roles/:role_code/clone", post(clone_role))
        .route(
            "/rbac/roles/:role_code/permissions",
            put(set_role_permissions),
        )
        .route("/rbac/matrix", get(permission_matrix))
        .route("/rbac/users", get(list_users).post(create_user))
        .route("/rbac/users/:user_id", get(get_user).delete(delete_user))
        .route("/rbac/users/:user_id/role", put(assign_user_role))
        .route(
            "/rbac/users/:user_id/overrides",
            post(set_permission_override),
        )
        .route(
            "/rbac/users/:user_id/overrides/:permission",
            axum::routing::delete(remove_permission_override),
        )
        .route(
            "/public-role",
            get(get_public_role).put(set_public_role_permissions),
        )
        .route("/settings", get(get_settings).put(update_settings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use tower::ServiceExt;

    fn app() -> Router {
        create_api_router().with_state(test_support::state())
    }

    fn json_request(method: &str, uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    #[tokio::test]
    async fn anonymous_dashboard_requires_login() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/dashboard")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn invalid_token_is_rejected() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/issues")
                    .header(header::AUTHORIZATION, "Bearer not-a-token")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn anonymous_reporter_can_open_issue() {
        let body = r#"{"machineIdRef":"D1-M07","category":"mechanical","description":"Spindle noise","isRunnable":false}"#;
        let response = app()
            .oneshot(json_request("POST", "/issues", body))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn anonymous_cannot_resolve_issue() {
        let body = r#"{"status":"resolved"}"#;
        let response = app()
            .oneshot(json_request("PATCH", "/issues/missing/status", body))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn admin_reaches_dashboard() {
        let state = test_support::state();
        let (_, tokens) = state.auth.login("admin", "admin123").await.expect("login");
        let app = create_api_router().with_state(state);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/dashboard?days=7")
                    .header(
                        header::AUTHORIZATION,
                        format!("Bearer {}", tokens.access_token),
                    )
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_issue_is_not_found() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/issues/does-not-exist")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
