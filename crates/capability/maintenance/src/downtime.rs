//! 停机状态机
//!
//! 停机状态由 `is_runnable` 与两个可空时间戳共同编码：
//! - Up：可运行，没有未关闭的区间
//! - Down-Open：不可运行，`start` 已设置，`end` 为空（停机时长持续累积）
//! - Down-Closed：`start` 与 `end` 均已设置（区间已关闭）
//!
//! 每次保存故障单时按固定顺序评估以下转移，后一步看到前一步的结果：
//! 1. 新建：新记录不可运行且没有 `start` → `start = now`
//! 2. 活动状态下失去可运行：不可运行、没有 `start`、状态活动 → 开启区间
//! 3. 恢复：可运行、区间未关闭 → `end = now`
//! 4. 再次故障：不可运行且 `end` 已设置 → 重新开启区间，旧区间写入历史
//! 5. 解决：状态为 resolved 且区间未关闭 → `end = now`
//! 6. 兜底：状态活动、不可运行、没有 `start` → 开启区间
//!
//! 2–4 互斥，5–6 互斥。

use chrono::{DateTime, Utc};
use domain::IssueStatus;

/// 状态机读写的字段。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DowntimeState {
    pub status: IssueStatus,
    pub is_runnable: bool,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DowntimeTransition {
    Created,
    Regressed,
    Recovered,
    Refailed,
    Resolved,
    SafetyNet,
}

impl DowntimeTransition {
    pub fn as_str(self) -> &'static str {
        match self {
            DowntimeTransition::Created => "created",
            DowntimeTransition::Regressed => "regressed",
            DowntimeTransition::Recovered => "recovered",
            DowntimeTransition::Refailed => "refailed",
            DowntimeTransition::Resolved => "resolved",
            DowntimeTransition::SafetyNet => "safety_net",
        }
    }
}

/// 已关闭的停机区间。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClosedInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ClosedInterval {
    pub fn hours(&self) -> f64 {
        span_hours(self.start, self.end)
    }
}

/// 一次评估的结果。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DowntimeOutcome {
    pub transitions: Vec<DowntimeTransition>,
    /// 被再次故障覆盖掉的已关闭区间，需追加到停机历史。
    pub discarded: Option<ClosedInterval>,
}

impl DowntimeOutcome {
    pub fn is_unchanged(&self) -> bool {
        self.transitions.is_empty()
    }
}

impl DowntimeState {
    pub fn is_open(&self) -> bool {
        self.start.is_some() && self.end.is_none()
    }

    /// 按顺序评估全部转移，就地修改状态。
    pub fn apply(&mut self, is_new: bool, now: DateTime<Utc>) -> DowntimeOutcome {
        let mut outcome = DowntimeOutcome::default();

        if is_new && !self.is_runnable && self.start.is_none() {
            self.start = Some(now);
            outcome.transitions.push(DowntimeTransition::Created);
        }

        if !self.is_runnable && self.start.is_none() && self.status.is_active() {
            self.start = Some(now);
            self.end = None;
            outcome.transitions.push(DowntimeTransition::Regressed);
        } else if self.is_runnable && self.is_open() {
            self.end = Some(now);
            outcome.transitions.push(DowntimeTransition::Recovered);
        } else if !self.is_runnable && self.end.is_some() {
            if let (Some(start), Some(end)) = (self.start, self.end) {
                if end > start {
                    outcome.discarded = Some(ClosedInterval { start, end });
                }
            }
            self.start = Some(now);
            self.end = None;
            outcome.transitions.push(DowntimeTransition::Refailed);
        }

        if self.status == IssueStatus::Resolved && self.is_open() {
            self.end = Some(now);
            outcome.transitions.push(DowntimeTransition::Resolved);
        } else if self.status.is_active() && !self.is_runnable && self.start.is_none() {
            self.start = Some(now);
            self.end = None;
            outcome.transitions.push(DowntimeTransition::SafetyNet);
        }

        outcome
    }

    /// 当前区间的停机小时数（保留 4 位小数）。
    ///
    /// 计算失败（溢出、负区间）时为 0。
    pub fn elapsed_hours(&self, now: DateTime<Utc>) -> f64 {
        let Some(start) = self.start else {
            return 0.0;
        };
        if self.status == IssueStatus::Resolved {
            if let Some(end) = self.end {
                return span_hours(start, end);
            }
        }
        if !self.is_runnable && self.status.is_active() {
            return span_hours(start, self.end.unwrap_or(now));
        }
        match self.end {
            Some(end) => span_hours(start, end),
            None => 0.0,
        }
    }
}

/// 历史区间与当前区间合计的停机小时数。
pub fn total_downtime_hours(
    state: &DowntimeState,
    history: &[ClosedInterval],
    now: DateTime<Utc>,
) -> f64 {
    let past: f64 = history.iter().map(ClosedInterval::hours).sum();
    round_to(past + state.elapsed_hours(now), 4)
}

fn span_hours(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    let Some(micros) = end.signed_duration_since(start).num_microseconds() else {
        return 0.0;
    };
    if micros < 0 {
        return 0.0;
    }
    round_to(micros as f64 / 3_600_000_000.0, 4)
}

pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, hour, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    fn state(status: IssueStatus, is_runnable: bool) -> DowntimeState {
        DowntimeState {
            status,
            is_runnable,
            start: None,
            end: None,
        }
    }

    #[test]
    fn new_runnable_issue_opens_nothing() {
        let mut s = state(IssueStatus::Open, true);
        let outcome = s.apply(true, at(8));
        assert!(outcome.is_unchanged());
        assert_eq!(s.start, None);
        assert_eq!(s.elapsed_hours(at(9)), 0.0);
    }

    #[test]
    fn creation_step_runs_before_safety_net() {
        let mut s = state(IssueStatus::Open, false);
        let outcome = s.apply(true, at(8));
        assert_eq!(outcome.transitions, vec![DowntimeTransition::Created]);
        assert_eq!(s.start, Some(at(8)));
        assert_eq!(s.end, None);
    }

    #[test]
    fn refailure_reports_discarded_interval() {
        let mut s = DowntimeState {
            status: IssueStatus::InProgress,
            is_runnable: false,
            start: Some(at(8)),
            end: Some(at(10)),
        };
        let outcome = s.apply(false, at(12));
        assert_eq!(outcome.transitions, vec![DowntimeTransition::Refailed]);
        assert_eq!(
            outcome.discarded,
            Some(ClosedInterval {
                start: at(8),
                end: at(10)
            })
        );
        assert_eq!(s.start, Some(at(12)));
        assert_eq!(s.end, None);
    }

    #[test]
    fn resolved_issue_with_reversed_span_reports_zero() {
        let s = DowntimeState {
            status: IssueStatus::Resolved,
            is_runnable: true,
            start: Some(at(10)),
            end: Some(at(8)),
        };
        assert_eq!(s.elapsed_hours(at(12)), 0.0);
    }

    #[test]
    fn open_interval_keeps_growing() {
        let s = DowntimeState {
            status: IssueStatus::Open,
            is_runnable: false,
            start: Some(at(8)),
            end: None,
        };
        let earlier = s.elapsed_hours(at(9));
        let later = s.elapsed_hours(at(11));
        assert_eq!(earlier, 1.0);
        assert_eq!(later, 3.0);
        assert!(later >= earlier);
    }

    #[test]
    fn closed_interval_on_active_issue_is_fixed() {
        let s = DowntimeState {
            status: IssueStatus::InProgress,
            is_runnable: true,
            start: Some(at(8)),
            end: Some(at(10)),
        };
        assert_eq!(s.elapsed_hours(at(11)), 2.0);
        assert_eq!(s.elapsed_hours(at(20)), 2.0);
    }

    #[test]
    fn runnable_issue_without_end_reports_zero() {
        let s = DowntimeState {
            status: IssueStatus::OnHold,
            is_runnable: true,
            start: Some(at(8)),
            end: None,
        };
        assert_eq!(s.elapsed_hours(at(12)), 0.0);
    }

    #[test]
    fn total_adds_history_to_live_interval() {
        let s = DowntimeState {
            status: IssueStatus::InProgress,
            is_runnable: false,
            start: Some(at(12)),
            end: None,
        };
        let history = [ClosedInterval {
            start: at(8),
            end: at(10),
        }];
        assert_eq!(total_downtime_hours(&s, &history, at(13)), 3.0);
        assert!(total_downtime_hours(&s, &history, at(15)) >= 3.0);
    }

    #[test]
    fn hours_round_to_four_places() {
        let start = at(8);
        let s = DowntimeState {
            status: IssueStatus::Resolved,
            is_runnable: true,
            start: Some(start),
            end: Some(start + Duration::seconds(1)),
        };
        assert_eq!(s.elapsed_hours(at(12)), 0.0003);
    }
}
