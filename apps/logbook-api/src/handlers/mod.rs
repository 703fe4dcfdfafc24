//! Handlers 模块

pub mod attachments;
pub mod audit;
pub mod auth;
pub mod dashboard;
pub mod issues;
pub mod metrics;
pub mod rbac;
pub mod remedies;
pub mod settings;

pub use attachments::*;
pub use audit::*;
pub use auth::*;
pub use dashboard::*;
pub use issues::*;
pub use metrics::*;
pub use rbac::*;
pub use remedies::*;
pub use settings::*;

use crate::AppState;
use domain::AuditAction;
use logbook_maintenance::Caller;
use logbook_storage::AuditLogRecord;

/// 写入审计日志；失败只记录告警，不影响请求结果。
pub(crate) async fn write_audit(
    state: &AppState,
    caller: &Caller,
    action: AuditAction,
    description: String,
    metadata: serde_json::Value,
) {
    let record = AuditLogRecord {
        audit_id: uuid::Uuid::new_v4().to_string(),
        action,
        description,
        user_id: caller.actor.user_id().map(str::to_string),
        username: caller
            .actor
            .is_authenticated()
            .then(|| caller.actor.display_name().to_string()),
        issue_id: None,
        remedy_id: None,
        ip_address: caller.ip_address.clone(),
        user_agent: caller.user_agent.clone(),
        metadata,
        created_at: domain::time::now_utc(),
    };
    if let Err(err) = state.audit_store.create_audit_log(record).await {
        tracing::warn!(action = action.as_str(), error = %err, "audit_write_failed");
    }
}
