mod common;

use common::{caller, harness, new_issue, remedy, user};
use domain::{IssueStatus, Permission};
use logbook_maintenance::{Caller, DashboardQuery, Viewer};
use logbook_storage::{AuditLogQuery, AuditLogStore};
use rust_decimal::Decimal;

#[tokio::test]
async fn dashboard_counts_and_hides_costs() {
    let h = harness();
    let first = h
        .service
        .create_issue(&caller(), new_issue(false))
        .await
        .expect("create");
    let mut outside = new_issue(true);
    outside.machine_id_ref = "D2-M07".to_string();
    h.service
        .create_issue(&caller(), outside)
        .await
        .expect("create");
    let mut paid = remedy(true);
    paid.labor_cost = Some(Decimal::from(80));
    h.service
        .add_remedy(&caller(), &first.issue_id, paid, None)
        .await
        .expect("remedy");
    h.service
        .update_status(&caller(), &first.issue_id, IssueStatus::Resolved, None)
        .await
        .expect("resolve");

    let query = DashboardQuery {
        days: Some(7),
        department_id: None,
    };
    let with_costs = h
        .service
        .dashboard(&Viewer::from_actor(&user(&[Permission::ViewCosts])), &query)
        .await
        .expect("dashboard");
    assert_eq!(with_costs.total_issues, 2);
    assert_eq!(with_costs.resolved_issues, 1);
    assert_eq!(with_costs.open_issues, 1);
    assert_eq!(with_costs.high_priority_issues, 2);
    assert_eq!(with_costs.daily_trend.len(), 7);
    assert_eq!(with_costs.daily_trend.last().map(|day| day.issues), Some(2));
    assert_eq!(with_costs.total_cost, Some(Decimal::from(80)));
    assert_eq!(with_costs.avg_cost_per_issue, Some(Decimal::from(40)));

    let machining = with_costs
        .department_breakdown
        .iter()
        .find(|department| department.department_id == "D1")
        .expect("department");
    assert_eq!(machining.total_issues, 1);
    assert_eq!(machining.resolved_issues, 1);

    let without = h
        .service
        .dashboard(&Viewer::from_actor(&user(&[])), &query)
        .await
        .expect("dashboard");
    assert_eq!(without.total_cost, None);
    assert!(
        without
            .department_breakdown
            .iter()
            .all(|department| department.total_cost.is_none())
    );
}

#[tokio::test]
async fn dashboard_filters_by_department_prefix() {
    let h = harness();
    h.service
        .create_issue(&caller(), new_issue(false))
        .await
        .expect("create");
    let mut other = new_issue(false);
    other.machine_id_ref = "D2-M07".to_string();
    h.service.create_issue(&caller(), other).await.expect("create");

    let metrics = h
        .service
        .dashboard(
            &Viewer::from_actor(&user(&[])),
            &DashboardQuery {
                days: None,
                department_id: Some("D2".to_string()),
            },
        )
        .await
        .expect("dashboard");
    assert_eq!(metrics.total_issues, 1);
    assert_eq!(metrics.days, 30);
}

#[tokio::test]
async fn report_redacts_for_viewer_and_is_audited() {
    let h = harness();
    let issue = h
        .service
        .create_issue(&caller(), new_issue(false))
        .await
        .expect("create");
    let mut external = remedy(true);
    external.is_external = true;
    external.phone_number = Some("555-0100".to_string());
    external.parts_cost = Some(Decimal::from(25));
    h.service
        .add_remedy(&caller(), &issue.issue_id, external, None)
        .await
        .expect("remedy");

    let report = h
        .service
        .issue_report(&Caller::new(user(&[Permission::GenerateReports])), &issue.issue_id)
        .await
        .expect("report");
    assert_eq!(report.machine_name, "M01 (Haas VF-2)");
    assert_eq!(report.department_name, "Machining");
    assert_eq!(report.total_cost, None);
    assert_eq!(report.remedies.len(), 1);
    assert_eq!(report.remedies[0].technician_name, "External Technician");
    assert!(report.total_downtime_hours >= 0.0);

    let logs = h
        .audit
        .list_audit_logs(&AuditLogQuery {
            action: Some(domain::AuditAction::ReportGenerated),
            limit: 10,
            ..Default::default()
        })
        .await
        .expect("audit");
    assert_eq!(logs.len(), 1);
}
