//! 权限码与权限覆盖
//!
//! 权限码是封闭集合：新增权限必须在 [`Permission`] 中声明，
//! 未知权限码在解析时即被拒绝（[`UnknownPermission`]）。

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

/// 系统权限码。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ViewDashboard,
    CrudIssues,
    CrudRemedies,
    MarkResolved,
    ConfigureLimits,
    ManageUsers,
    ViewCosts,
    ViewExternalContacts,
    ViewExternalTechnicianNames,
    GenerateReports,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown permission codename: {0}")]
pub struct UnknownPermission(pub String);

impl Permission {
    pub const ALL: [Permission; 10] = [
        Permission::ViewDashboard,
        Permission::CrudIssues,
        Permission::CrudRemedies,
        Permission::MarkResolved,
        Permission::ConfigureLimits,
        Permission::ManageUsers,
        Permission::ViewCosts,
        Permission::ViewExternalContacts,
        Permission::ViewExternalTechnicianNames,
        Permission::GenerateReports,
    ];

    pub fn codename(self) -> &'static str {
        match self {
            Permission::ViewDashboard => "view_dashboard",
            Permission::CrudIssues => "crud_issues",
            Permission::CrudRemedies => "crud_remedies",
            Permission::MarkResolved => "mark_resolved",
            Permission::ConfigureLimits => "configure_limits",
            Permission::ManageUsers => "manage_users",
            Permission::ViewCosts => "view_costs",
            Permission::ViewExternalContacts => "view_external_contacts",
            Permission::ViewExternalTechnicianNames => "view_external_technician_names",
            Permission::GenerateReports => "generate_reports",
        }
    }

    /// 展示名称。
    pub fn display_name(self) -> &'static str {
        match self {
            Permission::ViewDashboard => "View Dashboard",
            Permission::CrudIssues => "Create/Read/Update/Delete Issues",
            Permission::CrudRemedies => "Create/Read/Update/Delete Remedies",
            Permission::MarkResolved => "Mark Issues as Resolved",
            Permission::ConfigureLimits => "Configure System Limits",
            Permission::ManageUsers => "Manage User Roles",
            Permission::ViewCosts => "View Cost Information",
            Permission::ViewExternalContacts => "View External Contact Info",
            Permission::ViewExternalTechnicianNames => "View External Technician Names",
            Permission::GenerateReports => "Generate Reports",
        }
    }

    /// 分类（权限矩阵按分类分组展示）。
    pub fn category(self) -> &'static str {
        match self {
            Permission::ViewDashboard => "dashboard",
            Permission::CrudIssues | Permission::MarkResolved => "issues",
            Permission::CrudRemedies => "remedies",
            Permission::ConfigureLimits => "settings",
            Permission::ManageUsers => "users",
            Permission::ViewCosts
            | Permission::ViewExternalContacts
            | Permission::ViewExternalTechnicianNames => "data",
            Permission::GenerateReports => "reports",
        }
    }

    pub fn description(self) -> String {
        format!("Allows user to {}", self.display_name().to_lowercase())
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.codename())
    }
}

impl FromStr for Permission {
    type Err = UnknownPermission;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .iter()
            .copied()
            .find(|permission| permission.codename() == value)
            .ok_or_else(|| UnknownPermission(value.to_string()))
    }
}

/// 全部权限码（字符串形式）。
pub const PERMISSION_CODES: [&str; 10] = [
    "view_dashboard",
    "crud_issues",
    "crud_remedies",
    "mark_resolved",
    "configure_limits",
    "manage_users",
    "view_costs",
    "view_external_contacts",
    "view_external_technician_names",
    "generate_reports",
];

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_MANAGEMENT: &str = "management";
pub const ROLE_EXECUTIVE: &str = "executive";
pub const ROLE_TECHNICIAN: &str = "technician";
pub const ROLE_OPERATOR: &str = "operator";

/// 默认角色定义。
#[derive(Debug, Clone)]
pub struct RoleTemplate {
    pub role_code: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub permissions: &'static [Permission],
}

/// 初始化时写入的默认角色包。
pub fn default_role_templates() -> Vec<RoleTemplate> {
    use Permission::*;
    vec![
        RoleTemplate {
            role_code: ROLE_ADMIN,
            name: "Administrator",
            description: "Full system access with all permissions",
            permissions: &Permission::ALL,
        },
        RoleTemplate {
            role_code: ROLE_MANAGEMENT,
            name: "Management",
            description: "Management level access with all operational permissions",
            permissions: &Permission::ALL,
        },
        RoleTemplate {
            role_code: ROLE_EXECUTIVE,
            name: "Executive",
            description: "Executive level access without system configuration",
            permissions: &[
                ViewDashboard,
                CrudIssues,
                CrudRemedies,
                MarkResolved,
                ViewCosts,
                ViewExternalContacts,
                ViewExternalTechnicianNames,
                GenerateReports,
            ],
        },
        RoleTemplate {
            role_code: ROLE_TECHNICIAN,
            name: "Technician",
            description: "Technician access without resolution marking",
            permissions: &[
                ViewDashboard,
                CrudIssues,
                CrudRemedies,
                ViewCosts,
                ViewExternalContacts,
                ViewExternalTechnicianNames,
            ],
        },
        RoleTemplate {
            role_code: ROLE_OPERATOR,
            name: "Operator",
            description: "Basic operator access for issue reporting only",
            permissions: &[CrudIssues],
        },
    ]
}

/// 匿名访问者默认拥有的权限。
pub const DEFAULT_PUBLIC_PERMISSIONS: [Permission; 2] =
    [Permission::CrudIssues, Permission::CrudRemedies];

/// 单个权限在覆盖表中的状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideState {
    Unset,
    Grant,
    Deny,
}

/// 用户级权限覆盖表：权限码 → 授予 / 撤销。
///
/// 未出现在表中的权限为 `Unset`，回落到角色权限。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionOverrides(BTreeMap<Permission, bool>);

impl PermissionOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从字符串键的映射解析；任一未知权限码都会被拒绝。
    pub fn parse(raw: &HashMap<String, bool>) -> Result<Self, UnknownPermission> {
        let mut map = BTreeMap::new();
        for (code, granted) in raw {
            map.insert(code.parse::<Permission>()?, *granted);
        }
        Ok(Self(map))
    }

    pub fn state(&self, permission: Permission) -> OverrideState {
        match self.0.get(&permission) {
            Some(true) => OverrideState::Grant,
            Some(false) => OverrideState::Deny,
            None => OverrideState::Unset,
        }
    }

    pub fn set(&mut self, permission: Permission, granted: bool) {
        self.0.insert(permission, granted);
    }

    /// 移除覆盖，返回之前是否存在。
    pub fn clear(&mut self, permission: Permission) -> bool {
        self.0.remove(&permission).is_some()
    }

    pub fn granted(&self) -> BTreeSet<Permission> {
        self.0
            .iter()
            .filter(|(_, granted)| **granted)
            .map(|(permission, _)| *permission)
            .collect()
    }

    pub fn revoked(&self) -> BTreeSet<Permission> {
        self.0
            .iter()
            .filter(|(_, granted)| !**granted)
            .map(|(permission, _)| *permission)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Permission, bool)> + '_ {
        self.0.iter().map(|(permission, granted)| (*permission, *granted))
    }

    /// 导出为以权限码为键的映射（用于 API 输出）。
    pub fn to_code_map(&self) -> BTreeMap<String, bool> {
        self.0
            .iter()
            .map(|(permission, granted)| (permission.codename().to_string(), *granted))
            .collect()
    }
}

/// 解析权限码列表，任一未知即失败。
pub fn parse_permission_codes<I, S>(codes: I) -> Result<BTreeSet<Permission>, UnknownPermission>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    codes
        .into_iter()
        .map(|code| code.as_ref().parse::<Permission>())
        .collect()
}
