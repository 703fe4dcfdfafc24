use domain::{Permission, MachineRef};
use logbook_storage::{
    AttachmentParent, AttachmentRecord, AttachmentStore, DowntimeEpisodeRecord, GlobalSettingsUpdate,
    InMemoryIssueStore, InMemorySettingsStore, InMemoryUserStore, IssueFilter, IssueRecord,
    IssueStore, RbacStore, RemedyRecord, RemedyStore, SettingsStore, StorageErrorKind, UserCreate,
    UserStore,
};
use std::collections::BTreeSet;
use std::sync::Arc;

fn issue(issue_id: &str, machine: &str) -> IssueRecord {
    let now = domain::time::now_utc();
    IssueRecord {
        issue_id: issue_id.to_string(),
        machine_id_ref: MachineRef::parse(machine).expect("machine ref"),
        category: domain::IssueCategory::Mechanical,
        priority: domain::IssuePriority::High,
        status: domain::IssueStatus::Open,
        alarm_code: Some("E-042".to_string()),
        description: "spindle jammed".to_string(),
        ai_summary: String::new(),
        auto_title: "Mechanical Issue - D01-M01".to_string(),
        is_runnable: false,
        reported_by: "operator".to_string(),
        downtime_start: Some(now),
        downtime_end: None,
        created_at: now,
        updated_at: now,
        version: 0,
    }
}

fn remedy(remedy_id: &str, issue_id: &str) -> RemedyRecord {
    let now = domain::time::now_utc();
    RemedyRecord {
        remedy_id: remedy_id.to_string(),
        issue_id: issue_id.to_string(),
        description: "replaced bearing".to_string(),
        technician_name: "Lee".to_string(),
        is_external: false,
        phone_number: None,
        is_machine_runnable: true,
        parts_purchased: String::new(),
        labor_cost: None,
        parts_cost: None,
        total_cost: None,
        created_at: now,
        updated_at: now,
    }
}

fn attachment(attachment_id: &str, parent: AttachmentParent) -> AttachmentRecord {
    AttachmentRecord {
        attachment_id: attachment_id.to_string(),
        parent,
        file_path: format!("attachments/{attachment_id}.png"),
        file_name: "screen.png".to_string(),
        file_size: 10,
        file_type: domain::AttachmentKind::Image,
        purpose: domain::AttachmentPurpose::AlarmScreen,
        uploaded_at: domain::time::now_utc(),
    }
}

#[tokio::test]
async fn find_default_admin() {
    let store = InMemoryUserStore::with_default_admin();
    let user = store
        .find_by_username("admin")
        .await
        .expect("query")
        .expect("admin");
    assert_eq!(user.username, "admin");
    assert!(user.is_superuser);

    let assignment = store
        .find_assignment(&user.user_id)
        .await
        .expect("query")
        .expect("assignment");
    assert_eq!(assignment.role.role_code, "admin");
    assert_eq!(assignment.role.permissions.len(), Permission::ALL.len());
}

#[tokio::test]
async fn public_role_is_a_single_seeded_row() {
    let store = InMemoryUserStore::new();
    let first = store.load_public_role().await.expect("load");
    assert!(first.is_active);
    assert_eq!(
        first.permissions,
        BTreeSet::from([Permission::CrudIssues, Permission::CrudRemedies])
    );

    store
        .set_public_permissions(BTreeSet::from([Permission::ViewDashboard]))
        .await
        .expect("set");
    let second = store.load_public_role().await.expect("reload");
    assert_eq!(second.permissions, BTreeSet::from([Permission::ViewDashboard]));
}

#[tokio::test]
async fn delete_user_removes_role_assignment() {
    let store = InMemoryUserStore::new();
    store
        .create_user(UserCreate {
            user_id: "user-7".to_string(),
            username: "tech".to_string(),
            password: "hash".to_string(),
            email: None,
            is_superuser: false,
        })
        .await
        .expect("create");
    store.assign_role("user-7", "technician").await.expect("assign");

    assert!(store.delete_user("user-7").await.expect("delete"));
    assert!(store.find_assignment("user-7").await.expect("query").is_none());
    assert!(store.list_user_roles().await.expect("list").is_empty());
    assert!(!store.delete_user("user-7").await.expect("second delete"));
}

#[tokio::test]
async fn overrides_are_set_and_cleared() {
    let store = InMemoryUserStore::new();
    store
        .create_user(UserCreate {
            user_id: "user-8".to_string(),
            username: "viewer".to_string(),
            password: "hash".to_string(),
            email: None,
            is_superuser: false,
        })
        .await
        .expect("create");

    let missing = store
        .set_permission_override("user-8", Permission::ViewCosts, Some(true))
        .await
        .expect("no assignment");
    assert!(missing.is_none());

    store.assign_role("user-8", "operator").await.expect("assign");
    let updated = store
        .set_permission_override("user-8", Permission::ViewCosts, Some(true))
        .await
        .expect("set")
        .expect("assignment");
    assert_eq!(updated.permission_overrides.granted(), BTreeSet::from([Permission::ViewCosts]));

    let cleared = store
        .set_permission_override("user-8", Permission::ViewCosts, None)
        .await
        .expect("clear")
        .expect("assignment");
    assert!(cleared.permission_overrides.is_empty());
}

#[tokio::test]
async fn assigned_roles_cannot_be_deleted() {
    let store = InMemoryUserStore::with_default_admin();
    let err = store.delete_role("admin").await.expect_err("in use");
    assert_eq!(err.kind(), StorageErrorKind::Invalid);
    assert!(store.delete_role("operator").await.expect("unused"));
}

#[tokio::test]
async fn settings_singleton_defaults_and_updates() {
    let store = InMemorySettingsStore::new();
    let defaults = store.load_settings().await.expect("load");
    assert_eq!(defaults.max_update_text_length, 2000);
    assert_eq!(defaults.max_attachments_per_issue, 10);
    assert_eq!(defaults.max_attachments_per_remedy, 5);
    assert_eq!(defaults.max_file_size_mb, 50);

    let updated = store
        .update_settings(GlobalSettingsUpdate {
            max_attachments_per_issue: Some(3),
            updated_by: Some("user-admin".to_string()),
            ..Default::default()
        })
        .await
        .expect("update");
    assert_eq!(updated.max_attachments_per_issue, 3);
    assert_eq!(updated.max_update_text_length, 2000);
    assert_eq!(updated.updated_by.as_deref(), Some("user-admin"));
}

#[tokio::test]
async fn stale_version_is_a_conflict() {
    let store = InMemoryIssueStore::new();
    let created = store.create_issue(issue("issue-1", "D01-M01")).await.expect("create");

    let mut first = created.clone();
    first.description = "first writer".to_string();
    let saved = store.update_issue(first, created.version, None).await.expect("first");
    assert_eq!(saved.version, created.version + 1);

    let mut second = created.clone();
    second.description = "second writer".to_string();
    let err = store
        .update_issue(second, created.version, None)
        .await
        .expect_err("stale");
    assert!(err.is_conflict());

    let stored = store.find_issue("issue-1").await.expect("query").expect("issue");
    assert_eq!(stored.description, "first writer");
}

#[tokio::test]
async fn closed_episodes_are_written_with_the_update() {
    let store = InMemoryIssueStore::new();
    let created = store.create_issue(issue("issue-2", "D01-M02")).await.expect("create");
    let start = created.downtime_start.expect("start");
    let end = start + chrono::Duration::hours(2);

    store
        .update_issue(
            created.clone(),
            created.version,
            Some(DowntimeEpisodeRecord {
                issue_id: "issue-2".to_string(),
                started_at: start,
                ended_at: end,
            }),
        )
        .await
        .expect("update");

    let episodes = store.list_downtime_episodes("issue-2").await.expect("episodes");
    assert_eq!(episodes.len(), 1);
    assert_eq!(episodes[0].ended_at, end);
}

#[tokio::test]
async fn remedy_and_issue_update_commit_together() {
    let store = InMemoryIssueStore::new();
    let created = store.create_issue(issue("issue-4", "D01-M04")).await.expect("create");
    let start = created.downtime_start.expect("start");
    let end = start + chrono::Duration::hours(2);

    let mut flipped = created.clone();
    flipped.is_runnable = true;
    flipped.status = domain::IssueStatus::InProgress;
    flipped.downtime_end = Some(end);
    let (saved, _) = store
        .record_remedy(remedy("remedy-4", "issue-4"), flipped.clone(), created.version, None)
        .await
        .expect("first remedy");
    assert_eq!(saved.version, created.version + 1);

    // 重复的维修措施 id：故障单与停机历史都不变
    let mut again = saved.clone();
    again.status = domain::IssueStatus::Resolved;
    let err = store
        .record_remedy(
            remedy("remedy-4", "issue-4"),
            again,
            saved.version,
            Some(DowntimeEpisodeRecord {
                issue_id: "issue-4".to_string(),
                started_at: start,
                ended_at: end,
            }),
        )
        .await
        .expect_err("duplicate remedy");
    assert_eq!(err.kind(), StorageErrorKind::Invalid);

    let stored = store.find_issue("issue-4").await.expect("query").expect("issue");
    assert_eq!(stored.version, saved.version);
    assert_eq!(stored.status, domain::IssueStatus::InProgress);
    assert!(store.list_downtime_episodes("issue-4").await.expect("episodes").is_empty());
    assert_eq!(store.list_remedies("issue-4").await.expect("remedies").len(), 1);

    let err = store
        .record_remedy(remedy("remedy-5", "issue-4"), flipped, created.version, None)
        .await
        .expect_err("stale");
    assert!(err.is_conflict());
    assert!(store.find_remedy("remedy-5").await.expect("query").is_none());
}

#[tokio::test]
async fn attachment_limit_is_checked_on_insert() {
    let store = InMemoryIssueStore::new();
    store.create_issue(issue("issue-5", "D01-M05")).await.expect("create");
    let parent = AttachmentParent::Issue("issue-5".to_string());
    store
        .create_attachment(attachment("att-5a", parent.clone()), 1)
        .await
        .expect("first");
    let err = store
        .create_attachment(attachment("att-5b", parent.clone()), 1)
        .await
        .expect_err("over limit");
    assert_eq!(err.kind(), StorageErrorKind::Invalid);
    assert_eq!(store.count_attachments(&parent).await.expect("count"), 1);
}

#[tokio::test]
async fn deleting_issue_cascades_to_children() {
    let store = Arc::new(InMemoryIssueStore::new());
    let created = store.create_issue(issue("issue-3", "D02-M01")).await.expect("create");
    store
        .record_remedy(remedy("remedy-1", "issue-3"), created.clone(), created.version, None)
        .await
        .expect("remedy");
    store
        .create_attachment(attachment("att-1", AttachmentParent::Issue("issue-3".to_string())), 10)
        .await
        .expect("issue attachment");
    store
        .create_attachment(attachment("att-2", AttachmentParent::Remedy("remedy-1".to_string())), 5)
        .await
        .expect("remedy attachment");

    assert!(store.delete_issue("issue-3").await.expect("delete"));
    assert!(store.find_remedy("remedy-1").await.expect("query").is_none());
    assert!(store.find_attachment("att-1").await.expect("query").is_none());
    assert!(store.find_attachment("att-2").await.expect("query").is_none());
}

#[tokio::test]
async fn attachments_require_existing_parent() {
    let store = InMemoryIssueStore::new();
    let err = store
        .create_attachment(attachment("att-9", AttachmentParent::Issue("missing".to_string())), 10)
        .await
        .expect_err("dangling parent");
    assert_eq!(err.kind(), StorageErrorKind::NotFound);
}

#[tokio::test]
async fn issue_filter_by_department_and_search() {
    let store = InMemoryIssueStore::new();
    store.create_issue(issue("issue-a", "D01-M01")).await.expect("a");
    let mut other = issue("issue-b", "D02-M09");
    other.description = "coolant leak".to_string();
    other.alarm_code = None;
    store.create_issue(other).await.expect("b");

    let d01 = store
        .list_issues(&IssueFilter {
            department_id: Some("D01".to_string()),
            ..Default::default()
        })
        .await
        .expect("list");
    assert_eq!(d01.len(), 1);
    assert_eq!(d01[0].issue_id, "issue-a");

    let leak = store
        .list_issues(&IssueFilter {
            search: Some("COOLANT".to_string()),
            ..Default::default()
        })
        .await
        .expect("search");
    assert_eq!(leak.len(), 1);
    assert_eq!(leak[0].issue_id, "issue-b");
}
