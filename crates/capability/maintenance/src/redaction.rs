//! 按查看者脱敏
//!
//! 同一条维修措施对不同查看者渲染结果不同，每个请求重新计算，不做缓存。
//! - 技术员姓名：外部技术员且查看者没有 `view_external_contacts` → "External Technician"
//! - 电话：同一权限门槛；登录用户看到掩码，匿名访问者得到 None，字段始终存在
//! - 费用：只有持有 `view_costs` 的登录用户可见，匿名访问者一律为 None

use chrono::{DateTime, Utc};
use domain::{Actor, Permission};
use logbook_access::has_permission;
use logbook_storage::RemedyRecord;
use rust_decimal::Decimal;

pub const EXTERNAL_TECHNICIAN_LABEL: &str = "External Technician";
pub const MASKED_PHONE: &str = "***-***-****";

/// 查看者在渲染时用到的权限，每个请求由 Actor 计算一次。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewer {
    pub authenticated: bool,
    pub view_costs: bool,
    pub view_external_contacts: bool,
}

impl Viewer {
    pub fn from_actor(actor: &Actor) -> Self {
        let authenticated = actor.is_authenticated();
        Self {
            authenticated,
            view_costs: authenticated && has_permission(actor, Permission::ViewCosts),
            view_external_contacts: has_permission(actor, Permission::ViewExternalContacts),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CostBreakdown {
    pub labor_cost: Option<Decimal>,
    pub parts_cost: Option<Decimal>,
    pub total_cost: Option<Decimal>,
}

/// 脱敏后的维修措施。
#[derive(Debug, Clone, PartialEq)]
pub struct RemedyView {
    pub remedy_id: String,
    pub issue_id: String,
    pub description: String,
    pub technician_name: String,
    pub is_external: bool,
    pub phone_number: Option<String>,
    pub is_machine_runnable: bool,
    pub parts_purchased: String,
    pub cost: Option<CostBreakdown>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub fn technician_display_name(remedy: &RemedyRecord, viewer: &Viewer) -> String {
    if remedy.is_external && !viewer.view_external_contacts {
        EXTERNAL_TECHNICIAN_LABEL.to_string()
    } else {
        remedy.technician_name.clone()
    }
}

pub fn phone_display(remedy: &RemedyRecord, viewer: &Viewer) -> Option<String> {
    if !remedy.is_external || viewer.view_external_contacts {
        return remedy.phone_number.clone();
    }
    if viewer.authenticated {
        Some(MASKED_PHONE.to_string())
    } else {
        None
    }
}

pub fn cost_display(remedy: &RemedyRecord, viewer: &Viewer) -> Option<CostBreakdown> {
    viewer.view_costs.then_some(CostBreakdown {
        labor_cost: remedy.labor_cost,
        parts_cost: remedy.parts_cost,
        total_cost: remedy.total_cost,
    })
}

pub fn redact_remedy(remedy: &RemedyRecord, viewer: &Viewer) -> RemedyView {
    RemedyView {
        remedy_id: remedy.remedy_id.clone(),
        issue_id: remedy.issue_id.clone(),
        description: remedy.description.clone(),
        technician_name: technician_display_name(remedy, viewer),
        is_external: remedy.is_external,
        phone_number: phone_display(remedy, viewer),
        is_machine_runnable: remedy.is_machine_runnable,
        parts_purchased: remedy.parts_purchased.clone(),
        cost: cost_display(remedy, viewer),
        created_at: remedy.created_at,
        updated_at: remedy.updated_at,
    }
}

/// 费用类汇总字段：没有 `view_costs` 时整体隐藏。
pub fn visible_cost(value: Decimal, viewer: &Viewer) -> Option<Decimal> {
    viewer.view_costs.then(|| value.round_dp(2))
}
