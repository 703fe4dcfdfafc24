use logbook_config::{AppConfig, ConfigError};

// 环境变量是进程级状态，相关断言放在同一个测试里顺序执行。
#[test]
fn load_config_from_env() {
    // Rust 2024 中 set_var 需要显式标注 unsafe（测试进程内可控）。
    unsafe {
        std::env::set_var("LOGBOOK_JWT_SECRET", "secret");
        std::env::set_var("LOGBOOK_JWT_ACCESS_TTL_SECONDS", "3600");
        std::env::set_var("LOGBOOK_JWT_REFRESH_TTL_SECONDS", "7200");
        std::env::set_var("LOGBOOK_HTTP_ADDR", "127.0.0.1:8081");
        std::env::remove_var("LOGBOOK_DATABASE_URL");
        std::env::remove_var("LOGBOOK_UPLOAD_TIMEOUT_SECONDS");
    }

    let config = AppConfig::from_env().expect("config");
    assert_eq!(config.http_addr, "127.0.0.1:8081");
    assert_eq!(config.jwt_access_ttl_seconds, 3600);
    assert_eq!(config.jwt_refresh_ttl_seconds, 7200);
    assert!(!config.uses_database());
    assert_eq!(config.upload_timeout_seconds, 30);
    assert_eq!(config.dashboard_default_days, 30);

    unsafe {
        std::env::set_var("LOGBOOK_UPLOAD_TIMEOUT_SECONDS", "soon");
    }
    let err = AppConfig::from_env().expect_err("invalid");
    assert!(matches!(err, ConfigError::Invalid(key, _) if key == "LOGBOOK_UPLOAD_TIMEOUT_SECONDS"));

    unsafe {
        std::env::remove_var("LOGBOOK_UPLOAD_TIMEOUT_SECONDS");
        std::env::remove_var("LOGBOOK_JWT_SECRET");
    }
    let err = AppConfig::from_env().expect_err("missing");
    assert!(matches!(err, ConfigError::Missing(key) if key == "LOGBOOK_JWT_SECRET"));
}
