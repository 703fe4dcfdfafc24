//! 故障单保存流程
//!
//! 保存前的派生字段计算：标题补全、停机状态机、维修措施带来的状态变化。
//! 这里只修改内存中的记录，写入由 [`crate::service::IssueService`] 负责。

use crate::downtime::{DowntimeOutcome, DowntimeState};
use chrono::{DateTime, Utc};
use domain::{IssueCategory, IssueStatus, MachineRef};
use logbook_storage::{DowntimeEpisodeRecord, IssueRecord, RemedyRecord};

/// 标题为空时的默认标题。
pub fn auto_title(category: IssueCategory, machine: &MachineRef) -> String {
    format!("{} Issue - {}", category.title(), machine)
}

pub fn downtime_state(issue: &IssueRecord) -> DowntimeState {
    DowntimeState {
        status: issue.status,
        is_runnable: issue.is_runnable,
        start: issue.downtime_start,
        end: issue.downtime_end,
    }
}

/// 保存前的一次完整计算。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SavePlan {
    pub outcome: DowntimeOutcome,
    /// 需要与本次更新一起写入的停机历史。
    pub closed_episode: Option<DowntimeEpisodeRecord>,
}

/// `previous_status` 为 None 表示新建。
///
/// 从 resolved 重新打开（open / on_hold）且机器仍不可运行时，
/// 先清空 `downtime_end`，使原区间继续累积。
pub fn prepare_issue_save(
    issue: &mut IssueRecord,
    previous_status: Option<IssueStatus>,
    now: DateTime<Utc>,
) -> SavePlan {
    let is_new = previous_status.is_none();
    if is_reopen(previous_status, issue.status) && !issue.is_runnable {
        issue.downtime_end = None;
    }
    if issue.auto_title.trim().is_empty() {
        issue.auto_title = auto_title(issue.category, &issue.machine_id_ref);
    }

    let mut state = downtime_state(issue);
    let outcome = state.apply(is_new, now);
    issue.downtime_start = state.start;
    issue.downtime_end = state.end;
    issue.updated_at = now;

    if !outcome.is_unchanged() {
        let transitions: Vec<&str> = outcome.transitions.iter().map(|t| t.as_str()).collect();
        tracing::info!(
            target: "logbook.maintenance",
            issue_id = %issue.issue_id,
            status = issue.status.as_str(),
            is_runnable = issue.is_runnable,
            transitions = ?transitions,
            "downtime_transition"
        );
    }

    let closed_episode = outcome.discarded.map(|interval| DowntimeEpisodeRecord {
        issue_id: issue.issue_id.clone(),
        started_at: interval.start,
        ended_at: interval.end,
    });
    SavePlan {
        outcome,
        closed_episode,
    }
}

/// 新增维修措施对故障单的影响：
/// open / on_hold 转为 in_progress；可运行标志与维修结果不一致时随之翻转。
///
/// 返回变化前的状态与保存计划。
pub fn apply_remedy(
    issue: &mut IssueRecord,
    remedy: &RemedyRecord,
    now: DateTime<Utc>,
) -> (IssueStatus, SavePlan) {
    let previous_status = issue.status;
    if matches!(issue.status, IssueStatus::Open | IssueStatus::OnHold) {
        issue.status = IssueStatus::InProgress;
    }
    if remedy.is_machine_runnable != issue.is_runnable {
        issue.is_runnable = remedy.is_machine_runnable;
    }
    let plan = prepare_issue_save(issue, Some(previous_status), now);
    (previous_status, plan)
}

pub fn is_reopen(previous_status: Option<IssueStatus>, status: IssueStatus) -> bool {
    previous_status == Some(IssueStatus::Resolved)
        && matches!(status, IssueStatus::Open | IssueStatus::OnHold)
}
