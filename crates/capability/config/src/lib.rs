//! 应用运行配置加载。
//!
//! 全部来自 `LOGBOOK_*` 环境变量（`.env` 由二进制入口通过 dotenvy 预先载入）。
//! 未配置 `LOGBOOK_DATABASE_URL` 时使用内存存储。

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env: {0}")]
    Missing(String),
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// 应用运行配置。
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http_addr: String,
    pub database_url: Option<String>,
    /// 启动时执行建表脚本（幂等）。
    pub apply_schema: bool,
    pub jwt_secret: String,
    pub jwt_access_ttl_seconds: u64,
    pub jwt_refresh_ttl_seconds: u64,
    pub media_root: PathBuf,
    pub upload_timeout_seconds: u64,
    pub dashboard_default_days: u32,
}

impl AppConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        let jwt_secret = read_optional("LOGBOOK_JWT_SECRET")
            .ok_or_else(|| ConfigError::Missing("LOGBOOK_JWT_SECRET".to_string()))?;
        let jwt_access_ttl_seconds = read_u64("LOGBOOK_JWT_ACCESS_TTL_SECONDS")?;
        let jwt_refresh_ttl_seconds = read_u64("LOGBOOK_JWT_REFRESH_TTL_SECONDS")?;
        let http_addr =
            env::var("LOGBOOK_HTTP_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let database_url = read_optional("LOGBOOK_DATABASE_URL");
        let apply_schema = read_bool_with_default("LOGBOOK_APPLY_SCHEMA", false);
        let media_root = PathBuf::from(
            env::var("LOGBOOK_MEDIA_ROOT").unwrap_or_else(|_| "./media".to_string()),
        );
        let upload_timeout_seconds =
            read_u64_with_default("LOGBOOK_UPLOAD_TIMEOUT_SECONDS", 30)?;
        if upload_timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "LOGBOOK_UPLOAD_TIMEOUT_SECONDS".to_string(),
                "0".to_string(),
            ));
        }
        let dashboard_default_days = read_u64_with_default("LOGBOOK_DASHBOARD_DEFAULT_DAYS", 30)?;
        let dashboard_default_days = u32::try_from(dashboard_default_days)
            .ok()
            .filter(|days| *days > 0)
            .ok_or_else(|| {
                ConfigError::Invalid(
                    "LOGBOOK_DASHBOARD_DEFAULT_DAYS".to_string(),
                    dashboard_default_days.to_string(),
                )
            })?;

        Ok(Self {
            http_addr,
            database_url,
            apply_schema,
            jwt_secret,
            jwt_access_ttl_seconds,
            jwt_refresh_ttl_seconds,
            media_root,
            upload_timeout_seconds,
            dashboard_default_days,
        })
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_seconds)
    }

    /// 是否使用 PostgreSQL 存储。
    pub fn uses_database(&self) -> bool {
        self.database_url.is_some()
    }
}

fn read_u64(key: &str) -> Result<u64, ConfigError> {
    let value = env::var(key).map_err(|_| ConfigError::Missing(key.to_string()))?;
    value
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u64_with_default(key: &str, default: u64) -> Result<u64, ConfigError> {
    let value = match env::var(key) {
        Ok(value) if !value.trim().is_empty() => value,
        _ => return Ok(default),
    };
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}

fn read_bool_with_default(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(value) => matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "on"),
        Err(_) => default,
    }
}
