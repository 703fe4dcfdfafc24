//! 故障单相关枚举
//!
//! 所有枚举以 snake_case 字符串存储与传输。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// 为字符串枚举生成 `as_str` / `FromStr` / `Display`。
macro_rules! string_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($text => Ok($name::$variant),)+
                    _ => Err(UnknownVariant { kind: $kind, value: value.to_string() }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

/// 故障单状态：open → in_progress → on_hold → resolved → closed。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    Open,
    InProgress,
    OnHold,
    Resolved,
    Closed,
}

string_enum!(IssueStatus, "issue status", {
    Open => "open",
    InProgress => "in_progress",
    OnHold => "on_hold",
    Resolved => "resolved",
    Closed => "closed",
});

impl IssueStatus {
    /// 仍在处理中的状态（open / in_progress / on_hold）。
    pub fn is_active(self) -> bool {
        matches!(
            self,
            IssueStatus::Open | IssueStatus::InProgress | IssueStatus::OnHold
        )
    }

    /// 进入该状态需要 `mark_resolved` 权限。
    pub fn requires_resolution_permission(self) -> bool {
        matches!(self, IssueStatus::Resolved | IssueStatus::Closed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    Mechanical,
    Electrical,
    Software,
    Maintenance,
    Calibration,
    Safety,
    Other,
}

string_enum!(IssueCategory, "issue category", {
    Mechanical => "mechanical",
    Electrical => "electrical",
    Software => "software",
    Maintenance => "maintenance",
    Calibration => "calibration",
    Safety => "safety",
    Other => "other",
});

impl IssueCategory {
    /// 标题用的首字母大写形式。
    pub fn title(self) -> &'static str {
        match self {
            IssueCategory::Mechanical => "Mechanical",
            IssueCategory::Electrical => "Electrical",
            IssueCategory::Software => "Software",
            IssueCategory::Maintenance => "Maintenance",
            IssueCategory::Calibration => "Calibration",
            IssueCategory::Safety => "Safety",
            IssueCategory::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssuePriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

string_enum!(IssuePriority, "issue priority", {
    Low => "low",
    Medium => "medium",
    High => "high",
    Critical => "critical",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    Image,
    Video,
}

string_enum!(AttachmentKind, "attachment type", {
    Image => "image",
    Video => "video",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentPurpose {
    AlarmScreen,
    Manual,
    #[default]
    Other,
}

string_enum!(AttachmentPurpose, "attachment purpose", {
    AlarmScreen => "alarm_screen",
    Manual => "manual",
    Other => "other",
});

/// 审计动作。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    IssueCreated,
    IssueUpdated,
    IssueResolved,
    IssueReopened,
    IssueDeleted,
    RemedyAdded,
    RemedyUpdated,
    RemedyDeleted,
    ReportGenerated,
    StatusChanged,
    AttachmentAdded,
    AttachmentDeleted,
    UserLogin,
    UserLogout,
    PermissionChanged,
    Other,
}

string_enum!(AuditAction, "audit action", {
    IssueCreated => "issue_created",
    IssueUpdated => "issue_updated",
    IssueResolved => "issue_resolved",
    IssueReopened => "issue_reopened",
    IssueDeleted => "issue_deleted",
    RemedyAdded => "remedy_added",
    RemedyUpdated => "remedy_updated",
    RemedyDeleted => "remedy_deleted",
    ReportGenerated => "report_generated",
    StatusChanged => "status_changed",
    AttachmentAdded => "attachment_added",
    AttachmentDeleted => "attachment_deleted",
    UserLogin => "user_login",
    UserLogout => "user_logout",
    PermissionChanged => "permission_changed",
    Other => "other",
});

/// 机器外部引用。
///
/// 指向外部机器目录的松散引用，不是外键：目录中可能不存在对应机器，
/// 解析失败时按原值展示。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MachineRef(String);

impl MachineRef {
    pub const MAX_LEN: usize = 20;

    /// 去除首尾空白后构造；空值或超长返回 None。
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() || value.chars().count() > Self::MAX_LEN {
            return None;
        }
        Some(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 机器编号以部门编号开头即视为属于该部门。
    pub fn in_department(&self, department_id: &str) -> bool {
        !department_id.is_empty() && self.0.starts_with(department_id)
    }
}

impl fmt::Display for MachineRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
