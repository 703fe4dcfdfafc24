//! 追踪、请求 ID 与进程内计数器。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 请求级追踪标识。
#[derive(Debug, Clone)]
pub struct RequestIds {
    pub request_id: String,
    pub trace_id: String,
}

/// 指标快照。
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub issues_created: u64,
    pub issues_updated: u64,
    pub issues_deleted: u64,
    pub remedies_added: u64,
    pub attachments_stored: u64,
    /// 附件记录写入失败后删除的文件数。
    pub attachments_rolled_back: u64,
    pub permission_denials: u64,
    pub optimistic_conflicts: u64,
    pub reports_generated: u64,
    pub issue_save_latency_ms_total: u64,
    pub issue_save_latency_ms_count: u64,
}

pub struct TelemetryMetrics {
    issues_created: AtomicU64,
    issues_updated: AtomicU64,
    issues_deleted: AtomicU64,
    remedies_added: AtomicU64,
    attachments_stored: AtomicU64,
    attachments_rolled_back: AtomicU64,
    permission_denials: AtomicU64,
    optimistic_conflicts: AtomicU64,
    reports_generated: AtomicU64,
    issue_save_latency_ms_total: AtomicU64,
    issue_save_latency_ms_count: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            issues_created: AtomicU64::new(0),
            issues_updated: AtomicU64::new(0),
            issues_deleted: AtomicU64::new(0),
            remedies_added: AtomicU64::new(0),
            attachments_stored: AtomicU64::new(0),
            attachments_rolled_back: AtomicU64::new(0),
            permission_denials: AtomicU64::new(0),
            optimistic_conflicts: AtomicU64::new(0),
            reports_generated: AtomicU64::new(0),
            issue_save_latency_ms_total: AtomicU64::new(0),
            issue_save_latency_ms_count: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            issues_created: self.issues_created.load(Ordering::Relaxed),
            issues_updated: self.issues_updated.load(Ordering::Relaxed),
            issues_deleted: self.issues_deleted.load(Ordering::Relaxed),
            remedies_added: self.remedies_added.load(Ordering::Relaxed),
            attachments_stored: self.attachments_stored.load(Ordering::Relaxed),
            attachments_rolled_back: self.attachments_rolled_back.load(Ordering::Relaxed),
            permission_denials: self.permission_denials.load(Ordering::Relaxed),
            optimistic_conflicts: self.optimistic_conflicts.load(Ordering::Relaxed),
            reports_generated: self.reports_generated.load(Ordering::Relaxed),
            issue_save_latency_ms_total: self.issue_save_latency_ms_total.load(Ordering::Relaxed),
            issue_save_latency_ms_count: self.issue_save_latency_ms_count.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局指标实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（默认 info）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 生成新的 request_id 与 trace_id。
pub fn new_request_ids() -> RequestIds {
    RequestIds {
        request_id: uuid::Uuid::new_v4().to_string(),
        trace_id: uuid::Uuid::new_v4().to_string(),
    }
}

pub fn record_issue_created() {
    metrics().issues_created.fetch_add(1, Ordering::Relaxed);
}

pub fn record_issue_updated() {
    metrics().issues_updated.fetch_add(1, Ordering::Relaxed);
}

pub fn record_issue_deleted() {
    metrics().issues_deleted.fetch_add(1, Ordering::Relaxed);
}

pub fn record_remedy_added() {
    metrics().remedies_added.fetch_add(1, Ordering::Relaxed);
}

/// 记录附件落盘且记录写入成功的次数。
pub fn record_attachment_stored() {
    metrics().attachments_stored.fetch_add(1, Ordering::Relaxed);
}

pub fn record_attachment_rolled_back() {
    metrics()
        .attachments_rolled_back
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录接口层的权限拒绝（403）。
pub fn record_permission_denial() {
    metrics().permission_denials.fetch_add(1, Ordering::Relaxed);
}

/// 记录乐观锁冲突（409）。
pub fn record_optimistic_conflict() {
    metrics()
        .optimistic_conflicts
        .fetch_add(1, Ordering::Relaxed);
}

pub fn record_report_generated() {
    metrics().reports_generated.fetch_add(1, Ordering::Relaxed);
}

/// 记录故障单保存耗时（毫秒，包含读取前像、状态机与版本校验写入）。
pub fn record_issue_save_latency_ms(latency_ms: u64) {
    let metrics = metrics();
    metrics
        .issue_save_latency_ms_total
        .fetch_add(latency_ms, Ordering::Relaxed);
    metrics
        .issue_save_latency_ms_count
        .fetch_add(1, Ordering::Relaxed);
}
