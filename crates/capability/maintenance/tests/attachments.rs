mod common;

use common::{caller, harness, new_issue, remedy};
use domain::{AttachmentKind, AttachmentPurpose};
use logbook_maintenance::{
    AttachmentUpload, IssueService, IssueServiceConfig, MaintenanceError, MaintenanceStores,
};
use logbook_storage::{
    AttachmentParent, AttachmentRecord, AttachmentStore, FileStore, GlobalSettingsUpdate,
    InMemoryIssueStore, SettingsStore, StorageError,
};
use std::sync::Arc;
use std::time::Duration;

fn upload(bytes: usize) -> AttachmentUpload {
    AttachmentUpload {
        file_name: "alarm screen.png".to_string(),
        file_type: AttachmentKind::Image,
        purpose: AttachmentPurpose::AlarmScreen,
        bytes: vec![7; bytes],
    }
}

/// 记录写入总是失败的附件存储。
struct RejectingAttachments {
    inner: Arc<InMemoryIssueStore>,
}

#[async_trait::async_trait]
impl AttachmentStore for RejectingAttachments {
    async fn list_attachments(
        &self,
        parent: &AttachmentParent,
    ) -> Result<Vec<AttachmentRecord>, StorageError> {
        self.inner.list_attachments(parent).await
    }

    async fn count_attachments(&self, parent: &AttachmentParent) -> Result<i64, StorageError> {
        self.inner.count_attachments(parent).await
    }

    async fn find_attachment(
        &self,
        attachment_id: &str,
    ) -> Result<Option<AttachmentRecord>, StorageError> {
        self.inner.find_attachment(attachment_id).await
    }

    async fn create_attachment(
        &self,
        _record: AttachmentRecord,
        _max_per_parent: i32,
    ) -> Result<AttachmentRecord, StorageError> {
        Err(StorageError::new("insert failed"))
    }

    async fn delete_attachment(&self, attachment_id: &str) -> Result<bool, StorageError> {
        self.inner.delete_attachment(attachment_id).await
    }
}

/// 写入永远不返回的文件存储。
struct StalledFiles;

#[async_trait::async_trait]
impl FileStore for StalledFiles {
    async fn put(&self, _relative_path: &str, _bytes: &[u8]) -> Result<(), StorageError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(())
    }

    async fn remove(&self, _relative_path: &str) -> Result<bool, StorageError> {
        Ok(false)
    }
}

#[tokio::test]
async fn attachment_needs_exactly_one_parent() {
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

    for (issue_id, remedy_id) in [
        (Some(issue.issue_id.as_str()), Some(remedy.remedy_id.as_str())),
        (None, None),
    ] {
        let err = h
            .service
            .add_attachment(&caller(), issue_id, remedy_id, upload(16))
            .await
            .expect_err("invalid linkage");
        match err {
            MaintenanceError::Invalid(message) => {
                assert_eq!(message, "attachment must link to exactly one parent")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
    assert!(h.files.is_empty());
}

#[tokio::test]
async fn stores_file_then_record() {
    let h = harness();
    let issue = h
        .service
        .create_issue(&caller(), new_issue(false))
        .await
        .expect("create");

    let record = h
        .service
        .add_attachment(&caller(), Some(&issue.issue_id), None, upload(16))
        .await
        .expect("attach");
    assert_eq!(record.parent, AttachmentParent::Issue(issue.issue_id.clone()));
    assert_eq!(record.file_size, 16);
    assert!(record.file_name.ends_with("alarm_screen.png"));
    assert!(h.files.contains(&record.file_path));

    h.service
        .delete_attachment(&caller(), &record.attachment_id)
        .await
        .expect("delete");
    assert!(!h.files.contains(&record.file_path));
}

#[tokio::test]
async fn enforces_count_and_size_limits() {
    let h = harness();
    h.settings
        .update_settings(GlobalSettingsUpdate {
            max_attachments_per_issue: Some(1),
            max_file_size_mb: Some(1),
            ..Default::default()
        })
        .await
        .expect("settings");
    let issue = h
        .service
        .create_issue(&caller(), new_issue(false))
        .await
        .expect("create");

    let err = h
        .service
        .add_attachment(&caller(), Some(&issue.issue_id), None, upload(1024 * 1024 + 1))
        .await
        .expect_err("too large");
    assert!(matches!(err, MaintenanceError::Invalid(_)));

    h.service
        .add_attachment(&caller(), Some(&issue.issue_id), None, upload(8))
        .await
        .expect("first");
    let err = h
        .service
        .add_attachment(&caller(), Some(&issue.issue_id), None, upload(8))
        .await
        .expect_err("limit");
    assert!(matches!(err, MaintenanceError::Invalid(_)));
    assert_eq!(h.files.len(), 1);
}

#[tokio::test]
async fn concurrent_uploads_respect_count_limit() {
    let h = harness();
    h.settings
        .update_settings(GlobalSettingsUpdate {
            max_attachments_per_issue: Some(1),
            ..Default::default()
        })
        .await
        .expect("settings");
    let issue = h
        .service
        .create_issue(&caller(), new_issue(false))
        .await
        .expect("create");

    let (caller_a, caller_b) = (caller(), caller());
    let (first, second) = tokio::join!(
        h.service
            .add_attachment(&caller_a, Some(&issue.issue_id), None, upload(8)),
        h.service
            .add_attachment(&caller_b, Some(&issue.issue_id), None, upload(8)),
    );
    assert_eq!(usize::from(first.is_ok()) + usize::from(second.is_ok()), 1);
    let stored = h
        .issues
        .list_attachments(&AttachmentParent::Issue(issue.issue_id.clone()))
        .await
        .expect("list");
    assert_eq!(stored.len(), 1);
    assert_eq!(h.files.len(), 1);
}

#[tokio::test]
async fn failed_record_removes_stored_file() {
    let h = harness();
    let issue = h
        .service
        .create_issue(&caller(), new_issue(false))
        .await
        .expect("create");
    let stores = MaintenanceStores {
        attachments: Arc::new(RejectingAttachments {
            inner: h.issues.clone(),
        }),
        ..h.stores.clone()
    };
    let service = IssueService::new(stores);

    service
        .add_attachment(&caller(), Some(&issue.issue_id), None, upload(16))
        .await
        .expect_err("record insert fails");
    assert!(h.files.is_empty());
}

#[tokio::test]
async fn stalled_file_write_times_out() {
    let h = harness();
    let issue = h
        .service
        .create_issue(&caller(), new_issue(false))
        .await
        .expect("create");
    let stores = MaintenanceStores {
        files: Arc::new(StalledFiles),
        ..h.stores.clone()
    };
    let service = IssueService::new_with_config(
        stores,
        IssueServiceConfig {
            upload_timeout: Duration::from_millis(20),
        },
    );

    let err = service
        .add_attachment(&caller(), Some(&issue.issue_id), None, upload(16))
        .await
        .expect_err("timeout");
    assert!(matches!(err, MaintenanceError::Timeout));
    assert!(
        h.issues
            .list_attachments(&AttachmentParent::Issue(issue.issue_id.clone()))
            .await
            .expect("list")
            .is_empty()
    );
}
