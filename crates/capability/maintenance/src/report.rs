//! 单个故障单的报表数据。

use crate::cost::sum_costs;
use crate::downtime::{ClosedInterval, total_downtime_hours};
use crate::lifecycle::downtime_state;
use crate::redaction::{RemedyView, Viewer, redact_remedy, visible_cost};
use chrono::{DateTime, Utc};
use logbook_storage::{IssueRecord, MachineRecord, RemedyRecord};
use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq)]
pub struct IssueReport {
    pub issue: IssueRecord,
    pub machine_name: String,
    pub department_name: String,
    pub remedies: Vec<RemedyView>,
    /// 当前区间。
    pub downtime_hours: f64,
    /// 历史区间与当前区间合计。
    pub total_downtime_hours: f64,
    pub downtime_episodes: Vec<ClosedInterval>,
    pub total_cost: Option<Decimal>,
    pub generated_by: String,
    pub generated_at: DateTime<Utc>,
}

/// 未在目录中找到机器时显示原始引用。
pub fn machine_name(issue: &IssueRecord, machine: Option<&MachineRecord>) -> String {
    machine
        .map(MachineRecord::display_name)
        .unwrap_or_else(|| issue.machine_id_ref.to_string())
}

pub fn department_name(machine: Option<&MachineRecord>) -> String {
    machine
        .map(|machine| machine.department_name.clone())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "Unknown".to_string())
}

pub fn build_report(
    issue: IssueRecord,
    machine: Option<&MachineRecord>,
    remedies: &[RemedyRecord],
    history: Vec<ClosedInterval>,
    viewer: &Viewer,
    generated_by: &str,
    now: DateTime<Utc>,
) -> IssueReport {
    let state = downtime_state(&issue);
    let total_cost = sum_costs(remedies.iter().map(|remedy| remedy.total_cost));
    IssueReport {
        machine_name: machine_name(&issue, machine),
        department_name: department_name(machine),
        remedies: remedies
            .iter()
            .map(|remedy| redact_remedy(remedy, viewer))
            .collect(),
        downtime_hours: state.elapsed_hours(now),
        total_downtime_hours: total_downtime_hours(&state, &history, now),
        downtime_episodes: history,
        total_cost: visible_cost(total_cost, viewer),
        generated_by: generated_by.to_string(),
        generated_at: now,
        issue,
    }
}
