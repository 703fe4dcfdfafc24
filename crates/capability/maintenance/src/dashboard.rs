//! 看板统计
//!
//! 在时间窗口内（按创建时间）统计故障单数量、停机时长、每日趋势与部门分布。
//! 费用字段只对持有 `view_costs` 的查看者输出。

use crate::cost::sum_costs;
use crate::downtime::{ClosedInterval, round_to, total_downtime_hours};
use crate::lifecycle::downtime_state;
use crate::redaction::{Viewer, visible_cost};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use domain::{IssuePriority, IssueStatus};
use logbook_storage::{DepartmentRecord, IssueRecord, RemedyRecord};
use rust_decimal::Decimal;
use std::collections::HashMap;

pub const DEFAULT_DASHBOARD_DAYS: u32 = 30;
pub const MAX_DASHBOARD_DAYS: u32 = 366;

#[derive(Debug, Clone, Default)]
pub struct DashboardQuery {
    pub days: Option<u32>,
    pub department_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DailyTrend {
    pub date: NaiveDate,
    pub issues: usize,
    pub resolved: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DepartmentSummary {
    pub department_id: String,
    pub name: String,
    pub total_issues: usize,
    pub open_issues: usize,
    pub resolved_issues: usize,
    pub downtime_hours: f64,
    pub total_cost: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardMetrics {
    pub days: u32,
    pub total_issues: usize,
    /// open 与 in_progress。
    pub open_issues: usize,
    pub resolved_issues: usize,
    pub on_hold_issues: usize,
    /// high 与 critical。
    pub high_priority_issues: usize,
    pub total_downtime_hours: f64,
    pub avg_downtime_per_issue: f64,
    pub daily_trend: Vec<DailyTrend>,
    pub department_breakdown: Vec<DepartmentSummary>,
    pub total_cost: Option<Decimal>,
    pub avg_cost_per_issue: Option<Decimal>,
}

/// 看板计算所需的全部已装载数据。
pub struct DashboardInput<'a> {
    pub issues: &'a [IssueRecord],
    pub remedies: &'a [RemedyRecord],
    pub history: &'a HashMap<String, Vec<ClosedInterval>>,
    pub departments: &'a [DepartmentRecord],
}

pub fn clamp_days(days: Option<u32>) -> u32 {
    days.unwrap_or(DEFAULT_DASHBOARD_DAYS)
        .clamp(1, MAX_DASHBOARD_DAYS)
}

pub fn window_start(days: u32, now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::days(i64::from(days))
}

fn is_open(issue: &IssueRecord) -> bool {
    matches!(issue.status, IssueStatus::Open | IssueStatus::InProgress)
}

pub fn summarize(
    input: &DashboardInput<'_>,
    viewer: &Viewer,
    days: u32,
    now: DateTime<Utc>,
) -> DashboardMetrics {
    let empty = Vec::new();
    let downtime: HashMap<&str, f64> = input
        .issues
        .iter()
        .map(|issue| {
            let history = input.history.get(&issue.issue_id).unwrap_or(&empty);
            let hours = total_downtime_hours(&downtime_state(issue), history, now);
            (issue.issue_id.as_str(), hours)
        })
        .collect();
    let mut cost_by_issue: HashMap<&str, Decimal> = HashMap::new();
    for remedy in input.remedies {
        if let Some(total) = remedy.total_cost {
            *cost_by_issue.entry(remedy.issue_id.as_str()).or_default() += total;
        }
    }

    let total_issues = input.issues.len();
    let total_downtime: f64 = downtime.values().sum();
    let total_cost = sum_costs(input.issues.iter().map(|issue| {
        cost_by_issue.get(issue.issue_id.as_str()).copied()
    }));
    let divisor = total_issues.max(1);

    let today = now.date_naive();
    let daily_trend = (0..days)
        .map(|offset| {
            let date = today - Duration::days(i64::from(days - 1 - offset));
            let day_issues: Vec<&IssueRecord> = input
                .issues
                .iter()
                .filter(|issue| issue.created_at.date_naive() == date)
                .collect();
            DailyTrend {
                date,
                issues: day_issues.len(),
                resolved: day_issues
                    .iter()
                    .filter(|issue| issue.status == IssueStatus::Resolved)
                    .count(),
            }
        })
        .collect();

    let department_breakdown = input
        .departments
        .iter()
        .map(|department| {
            let members: Vec<&IssueRecord> = input
                .issues
                .iter()
                .filter(|issue| issue.machine_id_ref.in_department(&department.department_id))
                .collect();
            let hours: f64 = members
                .iter()
                .map(|issue| downtime.get(issue.issue_id.as_str()).copied().unwrap_or(0.0))
                .sum();
            let cost = sum_costs(
                members
                    .iter()
                    .map(|issue| cost_by_issue.get(issue.issue_id.as_str()).copied()),
            );
            DepartmentSummary {
                department_id: department.department_id.clone(),
                name: department.name.clone(),
                total_issues: members.len(),
                open_issues: members.iter().filter(|issue| is_open(issue)).count(),
                resolved_issues: members
                    .iter()
                    .filter(|issue| issue.status == IssueStatus::Resolved)
                    .count(),
                downtime_hours: round_to(hours, 2),
                total_cost: visible_cost(cost, viewer),
            }
        })
        .collect();

    DashboardMetrics {
        days,
        total_issues,
        open_issues: input.issues.iter().filter(|issue| is_open(issue)).count(),
        resolved_issues: input
            .issues
            .iter()
            .filter(|issue| issue.status == IssueStatus::Resolved)
            .count(),
        on_hold_issues: input
            .issues
            .iter()
            .filter(|issue| issue.status == IssueStatus::OnHold)
            .count(),
        high_priority_issues: input
            .issues
            .iter()
            .filter(|issue| matches!(issue.priority, IssuePriority::High | IssuePriority::Critical))
            .count(),
        total_downtime_hours: round_to(total_downtime, 2),
        avg_downtime_per_issue: round_to(total_downtime / divisor as f64, 2),
        daily_trend,
        department_breakdown,
        total_cost: visible_cost(total_cost, viewer),
        avg_cost_per_issue: visible_cost(total_cost / Decimal::from(divisor), viewer),
    }
}
