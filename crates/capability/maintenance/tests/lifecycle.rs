mod common;

use common::{caller, harness, new_issue, remedy};
use domain::{AuditAction, IssueStatus};
use logbook_maintenance::{IssueChanges, IssueService, MaintenanceError, MaintenanceStores};
use logbook_storage::{
    AuditLogQuery, AuditLogStore, DowntimeEpisodeRecord, InMemoryIssueStore, IssueRecord,
    IssueStore, RemedyRecord, RemedyStore, StorageError,
};
use std::sync::Arc;

/// 维修措施写入总是失败的存储。
struct RejectingRemedies {
    inner: Arc<InMemoryIssueStore>,
}

#[async_trait::async_trait]
impl RemedyStore for RejectingRemedies {
    async fn list_remedies(&self, issue_id: &str) -> Result<Vec<RemedyRecord>, StorageError> {
        self.inner.list_remedies(issue_id).await
    }

    async fn list_remedies_for_issues(
        &self,
        issue_ids: &[String],
    ) -> Result<Vec<RemedyRecord>, StorageError> {
        self.inner.list_remedies_for_issues(issue_ids).await
    }

    async fn find_remedy(&self, remedy_id: &str) -> Result<Option<RemedyRecord>, StorageError> {
        self.inner.find_remedy(remedy_id).await
    }

    async fn record_remedy(
        &self,
        _remedy: RemedyRecord,
        _issue: IssueRecord,
        _expected_version: i64,
        _closed_episode: Option<DowntimeEpisodeRecord>,
    ) -> Result<(IssueRecord, RemedyRecord), StorageError> {
        Err(StorageError::new("insert failed"))
    }

    async fn update_remedy(
        &self,
        record: RemedyRecord,
    ) -> Result<Option<RemedyRecord>, StorageError> {
        self.inner.update_remedy(record).await
    }

    async fn delete_remedy(&self, remedy_id: &str) -> Result<bool, StorageError> {
        self.inner.delete_remedy(remedy_id).await
    }
}

#[tokio::test]
async fn down_machine_opens_interval_at_creation() {
    let h = harness();
    let issue = h
        .service
        .create_issue(&caller(), new_issue(false))
        .await
        .expect("create");

    assert_eq!(issue.status, IssueStatus::Open);
    assert_eq!(issue.downtime_start, Some(issue.created_at));
    assert_eq!(issue.downtime_end, None);
    assert_eq!(issue.auto_title, "Mechanical Issue - D1-M01");
    assert_eq!(issue.reported_by, "tech");
}

#[tokio::test]
async fn runnable_machine_has_no_downtime() {
    let h = harness();
    let issue = h
        .service
        .create_issue(&caller(), new_issue(true))
        .await
        .expect("create");
    assert_eq!(issue.downtime_start, None);
    assert_eq!(issue.downtime_end, None);
}

#[tokio::test]
async fn runnable_remedy_closes_interval_and_starts_work() {
    let h = harness();
    let issue = h
        .service
        .create_issue(&caller(), new_issue(false))
        .await
        .expect("create");

    let (issue, remedy) = h
        .service
        .add_remedy(&caller(), &issue.issue_id, remedy(true), None)
        .await
        .expect("add remedy");

    assert!(issue.is_runnable);
    assert_eq!(issue.status, IssueStatus::InProgress);
    let start = issue.downtime_start.expect("start");
    let end = issue.downtime_end.expect("end");
    assert!(end >= start);
    assert_eq!(remedy.issue_id, issue.issue_id);
    assert_eq!(issue.version, 2);
}

#[tokio::test]
async fn resolving_closes_interval_while_still_down() {
    let h = harness();
    let issue = h
        .service
        .create_issue(&caller(), new_issue(false))
        .await
        .expect("create");

    let issue = h
        .service
        .update_status(&caller(), &issue.issue_id, IssueStatus::Resolved, None)
        .await
        .expect("resolve");

    assert!(!issue.is_runnable);
    assert!(issue.downtime_end.is_some());

    let actions: Vec<AuditAction> = h
        .audit
        .list_audit_logs(&AuditLogQuery {
            issue_id: Some(issue.issue_id.clone()),
            limit: 50,
            ..Default::default()
        })
        .await
        .expect("audit")
        .into_iter()
        .map(|record| record.action)
        .collect();
    assert!(actions.contains(&AuditAction::StatusChanged));
    assert!(actions.contains(&AuditAction::IssueResolved));
}

#[tokio::test]
async fn refailure_records_previous_interval() {
    let h = harness();
    let issue = h
        .service
        .create_issue(&caller(), new_issue(false))
        .await
        .expect("create");
    let (recovered, _) = h
        .service
        .add_remedy(&caller(), &issue.issue_id, remedy(true), None)
        .await
        .expect("recover");
    let prior_end = recovered.downtime_end.expect("closed");

    let (failed, _) = h
        .service
        .add_remedy(&caller(), &issue.issue_id, remedy(false), None)
        .await
        .expect("fail again");

    assert!(!failed.is_runnable);
    assert!(failed.downtime_start.expect("reopened") >= prior_end);
    assert_eq!(failed.downtime_end, None);

    let episodes = h
        .issues
        .list_downtime_episodes(&issue.issue_id)
        .await
        .expect("episodes");
    assert!(episodes.len() <= 1);
    if let Some(episode) = episodes.first() {
        assert_eq!(episode.ended_at, prior_end);
    }
}

#[tokio::test]
async fn reopening_a_down_machine_resumes_interval() {
    let h = harness();
    let issue = h
        .service
        .create_issue(&caller(), new_issue(false))
        .await
        .expect("create");
    let start = issue.downtime_start;
    let resolved = h
        .service
        .update_status(&caller(), &issue.issue_id, IssueStatus::Resolved, None)
        .await
        .expect("resolve");
    assert!(resolved.downtime_end.is_some());

    let reopened = h
        .service
        .update_status(&caller(), &issue.issue_id, IssueStatus::Open, None)
        .await
        .expect("reopen");
    assert_eq!(reopened.downtime_start, start);
    assert_eq!(reopened.downtime_end, None);
}

#[tokio::test]
async fn stale_version_is_rejected_without_writing() {
    let h = harness();
    let issue = h
        .service
        .create_issue(&caller(), new_issue(false))
        .await
        .expect("create");
    h.service
        .update_status(&caller(), &issue.issue_id, IssueStatus::OnHold, Some(issue.version))
        .await
        .expect("first writer");

    let err = h
        .service
        .add_remedy(&caller(), &issue.issue_id, remedy(true), Some(issue.version))
        .await
        .expect_err("second writer");
    assert!(matches!(err, MaintenanceError::Conflict(_)));

    let remedies = h
        .issues
        .list_remedies(&issue.issue_id)
        .await
        .expect("remedies");
    assert!(remedies.is_empty());
    let stored = h
        .issues
        .find_issue(&issue.issue_id)
        .await
        .expect("query")
        .expect("issue");
    assert_eq!(stored.status, IssueStatus::OnHold);
    assert!(!stored.is_runnable);
}

#[tokio::test]
async fn failed_remedy_write_leaves_issue_untouched() {
    let h = harness();
    let issue = h
        .service
        .create_issue(&caller(), new_issue(false))
        .await
        .expect("create");
    let stores = MaintenanceStores {
        remedies: Arc::new(RejectingRemedies {
            inner: h.issues.clone(),
        }),
        ..h.stores.clone()
    };
    let service = IssueService::new(stores);

    let err = service
        .add_remedy(&caller(), &issue.issue_id, remedy(true), None)
        .await
        .expect_err("remedy insert fails");
    assert!(matches!(err, MaintenanceError::Storage(_)));

    let stored = h
        .issues
        .find_issue(&issue.issue_id)
        .await
        .expect("query")
        .expect("issue");
    assert_eq!(stored.version, issue.version);
    assert_eq!(stored.status, IssueStatus::Open);
    assert!(!stored.is_runnable);
    assert_eq!(stored.downtime_end, None);
    assert!(
        h.issues
            .list_downtime_episodes(&issue.issue_id)
            .await
            .expect("episodes")
            .is_empty()
    );
    assert!(
        h.issues
            .list_remedies(&issue.issue_id)
            .await
            .expect("remedies")
            .is_empty()
    );
}

#[tokio::test]
async fn update_validates_machine_reference_and_description() {
    let h = harness();
    let issue = h
        .service
        .create_issue(&caller(), new_issue(true))
        .await
        .expect("create");

    let err = h
        .service
        .update_issue(
            &caller(),
            &issue.issue_id,
            IssueChanges {
                machine_id_ref: Some("X".repeat(21)),
                ..Default::default()
            },
        )
        .await
        .expect_err("too long");
    assert!(matches!(err, MaintenanceError::Invalid(_)));

    let err = h
        .service
        .update_issue(
            &caller(),
            &issue.issue_id,
            IssueChanges {
                description: Some("x".repeat(2001)),
                ..Default::default()
            },
        )
        .await
        .expect_err("too long");
    assert!(matches!(err, MaintenanceError::Invalid(_)));
}

#[tokio::test]
async fn marking_down_while_active_opens_interval() {
    let h = harness();
    let issue = h
        .service
        .create_issue(&caller(), new_issue(true))
        .await
        .expect("create");

    let issue = h
        .service
        .update_issue(
            &caller(),
            &issue.issue_id,
            IssueChanges {
                is_runnable: Some(false),
                ..Default::default()
            },
        )
        .await
        .expect("update");
    assert!(issue.downtime_start.is_some());
    assert_eq!(issue.downtime_end, None);
}

#[tokio::test]
async fn external_technician_requires_phone() {
    let h = harness();
    let issue = h
        .service
        .create_issue(&caller(), new_issue(false))
        .await
        .expect("create");
    let mut input = remedy(true);
    input.is_external = true;

    let err = h
        .service
        .add_remedy(&caller(), &issue.issue_id, input, None)
        .await
        .expect_err("phone required");
    assert!(matches!(err, MaintenanceError::Invalid(_)));
}

#[tokio::test]
async fn deleting_issue_removes_remedies() {
    let h = harness();
    let issue = h
        .service
        .create_issue(&caller(), new_issue(false))
        .await
        .expect("create");
    let (_, remedy) = h
        .service
        .add_remedy(&caller(), &issue.issue_id, remedy(true), None)
        .await
        .expect("remedy");

    h.service
        .delete_issue(&caller(), &issue.issue_id)
        .await
        .expect("delete");
    assert!(
        h.issues
            .find_remedy(&remedy.remedy_id)
            .await
            .expect("query")
            .is_none()
    );
    let err = h
        .service
        .delete_issue(&caller(), &issue.issue_id)
        .await
        .expect_err("gone");
    assert!(matches!(err, MaintenanceError::NotFound(_)));
}
