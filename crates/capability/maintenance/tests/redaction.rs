mod common;

use chrono::Utc;
use common::{anonymous, user};
use domain::Permission;
use logbook_maintenance::redaction::{EXTERNAL_TECHNICIAN_LABEL, MASKED_PHONE};
use logbook_maintenance::{Viewer, redact_remedy, total_cost};
use logbook_storage::RemedyRecord;
use rust_decimal::Decimal;

fn external_remedy() -> RemedyRecord {
    let now = Utc::now();
    let labor = Some(Decimal::new(12000, 2));
    let parts = Some(Decimal::new(4550, 2));
    RemedyRecord {
        remedy_id: "remedy-1".to_string(),
        issue_id: "issue-1".to_string(),
        description: "Rewired contactor".to_string(),
        technician_name: "Acme Service".to_string(),
        is_external: true,
        phone_number: Some("555-010-2000".to_string()),
        is_machine_runnable: true,
        parts_purchased: "contactor".to_string(),
        labor_cost: labor,
        parts_cost: parts,
        total_cost: total_cost(labor, parts),
        created_at: now,
        updated_at: now,
    }
}

#[test]
fn cost_total_follows_presence() {
    let ten = Some(Decimal::from(10));
    assert_eq!(total_cost(None, None), None);
    assert_eq!(total_cost(ten, None), ten);
    assert_eq!(total_cost(None, ten), ten);
    assert_eq!(total_cost(ten, ten), Some(Decimal::from(20)));
}

#[test]
fn cost_visibility_differs_but_shared_fields_match() {
    let remedy = external_remedy();
    let with_costs = redact_remedy(&remedy, &Viewer::from_actor(&user(&[Permission::ViewCosts])));
    let without = redact_remedy(&remedy, &Viewer::from_actor(&user(&[])));

    let breakdown = with_costs.cost.expect("visible");
    assert_eq!(breakdown.total_cost, Some(Decimal::new(16550, 2)));
    assert_eq!(without.cost, None);
    assert_eq!(with_costs.description, without.description);
    assert_eq!(with_costs.created_at, without.created_at);
}

#[test]
fn external_contacts_are_masked_for_users_without_permission() {
    let remedy = external_remedy();
    let view = redact_remedy(&remedy, &Viewer::from_actor(&user(&[])));
    assert_eq!(view.technician_name, EXTERNAL_TECHNICIAN_LABEL);
    assert_eq!(view.phone_number.as_deref(), Some(MASKED_PHONE));

    let view = redact_remedy(
        &remedy,
        &Viewer::from_actor(&user(&[Permission::ViewExternalContacts])),
    );
    assert_eq!(view.technician_name, "Acme Service");
    assert_eq!(view.phone_number.as_deref(), Some("555-010-2000"));
}

#[test]
fn anonymous_viewer_gets_null_phone_and_no_costs() {
    let remedy = external_remedy();
    let view = redact_remedy(&remedy, &Viewer::from_actor(&anonymous()));
    assert_eq!(view.technician_name, EXTERNAL_TECHNICIAN_LABEL);
    assert_eq!(view.phone_number, None);
    assert_eq!(view.cost, None);
}

#[test]
fn anonymous_never_sees_costs_even_if_public_role_allows() {
    let actor = domain::Actor::Anonymous(domain::PublicGrant::Loaded {
        is_active: true,
        permissions: [Permission::ViewCosts].into_iter().collect(),
    });
    let view = redact_remedy(&external_remedy(), &Viewer::from_actor(&actor));
    assert_eq!(view.cost, None);
}

#[test]
fn internal_technician_is_never_masked() {
    let mut remedy = external_remedy();
    remedy.is_external = false;
    let view = redact_remedy(&remedy, &Viewer::from_actor(&anonymous()));
    assert_eq!(view.technician_name, "Acme Service");
    assert_eq!(view.phone_number.as_deref(), Some("555-010-2000"));
}
