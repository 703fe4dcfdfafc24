//! # Logbook Maintenance 模块
//!
//! 故障单生命周期：
//! - `downtime`：停机状态机与停机小时数
//! - `cost`：维修费用合计
//! - `redaction`：按查看者的字段脱敏
//! - `lifecycle`：保存前的派生字段计算
//! - `service`：带版本校验的读写、附件、审计
//! - `dashboard` / `report`：看板统计与单据报表

pub mod cost;
pub mod dashboard;
pub mod downtime;
pub mod error;
pub mod lifecycle;
pub mod redaction;
pub mod report;
pub mod service;

pub use cost::{sum_costs, total_cost};
pub use dashboard::{DailyTrend, DashboardMetrics, DashboardQuery, DepartmentSummary};
pub use downtime::{ClosedInterval, DowntimeOutcome, DowntimeState, DowntimeTransition};
pub use error::MaintenanceError;
pub use lifecycle::{SavePlan, apply_remedy, auto_title, prepare_issue_save};
pub use redaction::{CostBreakdown, RemedyView, Viewer, redact_remedy};
pub use report::IssueReport;
pub use service::{
    AttachmentUpload, Caller, IssueChanges, IssueDetail, IssueService, IssueServiceConfig,
    IssueSummary, MaintenanceStores, NewIssue, RemedyEntry, RemedyInput,
};
