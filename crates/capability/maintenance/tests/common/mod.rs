#![allow(dead_code)]

use domain::{Actor, IssueCategory, IssuePriority, PermissionOverrides, PublicGrant, RoleGrant, UserPrincipal};
use logbook_maintenance::{Caller, IssueService, MaintenanceStores, NewIssue, RemedyInput};
use logbook_storage::{
    InMemoryAuditLogStore, InMemoryFileStore, InMemoryIssueStore, InMemoryMachineCatalog,
    InMemorySettingsStore, MachineRecord,
};
use std::sync::Arc;

pub struct Harness {
    pub service: IssueService,
    pub issues: Arc<InMemoryIssueStore>,
    pub audit: Arc<InMemoryAuditLogStore>,
    pub settings: Arc<InMemorySettingsStore>,
    pub files: Arc<InMemoryFileStore>,
    pub stores: MaintenanceStores,
}

pub fn machines() -> Vec<MachineRecord> {
    vec![MachineRecord {
        machine_id: "D1-M01".to_string(),
        machine_number: "M01".to_string(),
        model: Some("Haas VF-2".to_string()),
        status: "active".to_string(),
        department_id: "D1".to_string(),
        department_name: "Machining".to_string(),
    }]
}

pub fn harness() -> Harness {
    let issues = Arc::new(InMemoryIssueStore::new());
    let audit = Arc::new(InMemoryAuditLogStore::new());
    let settings = Arc::new(InMemorySettingsStore::new());
    let files = Arc::new(InMemoryFileStore::new());
    let stores = MaintenanceStores {
        issues: issues.clone(),
        remedies: issues.clone(),
        attachments: issues.clone(),
        audit: audit.clone(),
        settings: settings.clone(),
        machines: Arc::new(InMemoryMachineCatalog::with_machines(machines())),
        files: files.clone(),
    };
    Harness {
        service: IssueService::new(stores.clone()),
        issues,
        audit,
        settings,
        files,
        stores,
    }
}

pub fn user(permissions: &[domain::Permission]) -> Actor {
    Actor::User(UserPrincipal {
        user_id: "user-tech".to_string(),
        username: "tech".to_string(),
        is_superuser: false,
        role: Some(RoleGrant {
            role_code: "technician".to_string(),
            is_active: true,
            permissions: permissions.iter().copied().collect(),
        }),
        overrides: PermissionOverrides::new(),
    })
}

pub fn anonymous() -> Actor {
    Actor::Anonymous(PublicGrant::Loaded {
        is_active: true,
        permissions: domain::permissions::DEFAULT_PUBLIC_PERMISSIONS
            .into_iter()
            .collect(),
    })
}

pub fn caller() -> Caller {
    Caller::new(user(&[]))
}

pub fn new_issue(is_runnable: bool) -> NewIssue {
    NewIssue {
        machine_id_ref: "D1-M01".to_string(),
        category: IssueCategory::Mechanical,
        priority: IssuePriority::High,
        alarm_code: Some("E-042".to_string()),
        description: "Spindle stalls under load".to_string(),
        is_runnable,
        reported_by: None,
        auto_title: None,
    }
}

pub fn remedy(is_machine_runnable: bool) -> RemedyInput {
    RemedyInput {
        description: "Replaced spindle belt".to_string(),
        technician_name: "Dana".to_string(),
        is_external: false,
        phone_number: None,
        is_machine_runnable,
        parts_purchased: "belt".to_string(),
        labor_cost: None,
        parts_cost: None,
    }
}
