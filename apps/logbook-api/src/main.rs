//! 维修日志 HTTP API 服务。
//!
//! 配置了 `LOGBOOK_DATABASE_URL` 时使用 PostgreSQL，否则使用内存存储（内置 admin 账户）。

mod handlers;
mod middleware;
mod routes;
mod utils;

use axum::{Router, middleware as axum_middleware};
use logbook_access::AccessService;
use logbook_auth::{AuthService, JwtManager};
use logbook_config::AppConfig;
use logbook_maintenance::{IssueService, IssueServiceConfig, MaintenanceStores};
use logbook_storage::{
    AuditLogStore, FileStore, InMemoryAuditLogStore, InMemoryIssueStore, InMemoryMachineCatalog,
    InMemorySettingsStore, InMemoryUserStore, LocalFileStore, PgAuditLogStore, PgIssueStore,
    PgMachineCatalog, PgSettingsStore, PgUserStore, RbacStore, SettingsStore, UserStore,
    apply_schema, connect_pool,
};
use logbook_telemetry::init_tracing;
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// 所有 handler 共享的应用状态。
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub access: Arc<AccessService>,
    pub maintenance: Arc<IssueService>,
    pub user_store: Arc<dyn UserStore>,
    pub rbac_store: Arc<dyn RbacStore>,
    pub settings_store: Arc<dyn SettingsStore>,
    pub audit_store: Arc<dyn AuditLogStore>,
    /// 仅 Postgres 模式下存在（readyz 使用）。
    pub db_pool: Option<PgPool>,
    pub dashboard_default_days: u32,
}

/// 一组可互换的存储实现。
pub struct StoreSet {
    pub users: Arc<dyn UserStore>,
    pub rbac: Arc<dyn RbacStore>,
    pub maintenance: MaintenanceStores,
    pub db_pool: Option<PgPool>,
}

impl StoreSet {
    /// 内存存储：默认角色包 + admin 超级用户。
    pub fn in_memory(files: Arc<dyn FileStore>) -> Self {
        let users = Arc::new(InMemoryUserStore::with_default_admin());
        let issues = Arc::new(InMemoryIssueStore::new());
        Self {
            users: users.clone(),
            rbac: users,
            maintenance: MaintenanceStores {
                issues: issues.clone(),
                remedies: issues.clone(),
                attachments: issues,
                audit: Arc::new(InMemoryAuditLogStore::new()),
                settings: Arc::new(InMemorySettingsStore::new()),
                machines: Arc::new(InMemoryMachineCatalog::new()),
                files,
            },
            db_pool: None,
        }
    }

    pub async fn postgres(
        config: &AppConfig,
        database_url: &str,
        files: Arc<dyn FileStore>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let pool = connect_pool(database_url).await?;
        if config.apply_schema {
            apply_schema(&pool).await?;
        }
        let users = Arc::new(PgUserStore::new(pool.clone()));
        users.seed_defaults().await?;
        let issues = Arc::new(PgIssueStore::new(pool.clone()));
        Ok(Self {
            users: users.clone(),
            rbac: users,
            maintenance: MaintenanceStores {
                issues: issues.clone(),
                remedies: issues.clone(),
                attachments: issues,
                audit: Arc::new(PgAuditLogStore::new(pool.clone())),
                settings: Arc::new(PgSettingsStore::new(pool.clone())),
                machines: Arc::new(PgMachineCatalog::new(pool.clone())),
                files,
            },
            db_pool: Some(pool),
        })
    }
}

impl AppState {
    pub fn from_stores(
        stores: StoreSet,
        jwt: JwtManager,
        issue_config: IssueServiceConfig,
        dashboard_default_days: u32,
    ) -> Self {
        let auth = Arc::new(AuthService::new(stores.users.clone(), jwt));
        let access = Arc::new(AccessService::new(
            stores.users.clone(),
            stores.rbac.clone(),
        ));
        let settings_store = stores.maintenance.settings.clone();
        let audit_store = stores.maintenance.audit.clone();
        let maintenance = Arc::new(IssueService::new_with_config(
            stores.maintenance,
            issue_config,
        ));
        Self {
            auth,
            access,
            maintenance,
            user_store: stores.users,
            rbac_store: stores.rbac,
            settings_store,
            audit_store,
            db_pool: stores.db_pool,
            dashboard_default_days,
        }
    }
}

/// 组装完整路由（含请求上下文与 HTTP trace 中间件）。
pub fn build_app(state: AppState) -> Router {
    routes::create_api_router()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(axum_middleware::from_fn(middleware::request_context))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;
    init_tracing();

    let files: Arc<dyn FileStore> = Arc::new(LocalFileStore::new(config.media_root.clone()));
    let stores = match config.database_url.as_deref() {
        Some(database_url) => StoreSet::postgres(&config, database_url, files).await?,
        None => {
            tracing::warn!("LOGBOOK_DATABASE_URL not set, using in-memory stores");
            StoreSet::in_memory(files)
        }
    };
    let jwt = JwtManager::new(
        config.jwt_secret.clone(),
        config.jwt_access_ttl_seconds,
        config.jwt_refresh_ttl_seconds,
    );
    let state = AppState::from_stores(
        stores,
        jwt,
        IssueServiceConfig {
            upload_timeout: config.upload_timeout(),
        },
        config.dashboard_default_days,
    );

    let app = build_app(state);
    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    tracing::info!(addr = %config.http_addr, "logbook api listening");
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue, header};
    use logbook_auth::hash_password;
    use logbook_storage::{InMemoryFileStore, UserCreate};

    pub fn state() -> AppState {
        AppState::from_stores(
            StoreSet::in_memory(Arc::new(InMemoryFileStore::new())),
            JwtManager::new("test-secret".to_string(), 3600, 7200),
            IssueServiceConfig::default(),
            30,
        )
    }

    /// 新建用户并分配角色。
    pub async fn add_user(state: &AppState, username: &str, password: &str, role_code: &str) {
        let user = state
            .user_store
            .create_user(UserCreate {
                user_id: format!("user-{username}"),
                username: username.to_string(),
                password: hash_password(password).expect("hash"),
                email: None,
                is_superuser: false,
            })
            .await
            .expect("create user");
        state
            .rbac_store
            .assign_role(&user.user_id, role_code)
            .await
            .expect("assign role");
    }

    pub async fn bearer(state: &AppState, username: &str, password: &str) -> HeaderMap {
        let (_, tokens) = state.auth.login(username, password).await.expect("login");
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", tokens.access_token)).expect("header"),
        );
        headers
    }
}
