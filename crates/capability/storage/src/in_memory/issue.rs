//! 故障单、维修措施与附件记录的内存存储
//!
//! 三类记录放在同一把锁下，删除故障单时级联删除其子记录。

use crate::error::StorageError;
use crate::models::{
    AttachmentParent, AttachmentRecord, DowntimeEpisodeRecord, IssueFilter, IssueRecord,
    RemedyRecord,
};
use crate::traits::{AttachmentStore, IssueStore, RemedyStore};
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Default)]
struct MaintenanceState {
    issues: HashMap<String, IssueRecord>,
    episodes: Vec<DowntimeEpisodeRecord>,
    remedies: HashMap<String, RemedyRecord>,
    attachments: HashMap<String, AttachmentRecord>,
}

impl MaintenanceState {
    fn check_version(&self, issue_id: &str, expected_version: i64) -> Result<(), StorageError> {
        let Some(current) = self.issues.get(issue_id) else {
            return Err(StorageError::not_found("issue not found"));
        };
        if current.version != expected_version {
            return Err(StorageError::conflict("issue was modified concurrently"));
        }
        Ok(())
    }

    fn write_issue(
        &mut self,
        mut record: IssueRecord,
        expected_version: i64,
        closed_episode: Option<DowntimeEpisodeRecord>,
    ) -> IssueRecord {
        record.version = expected_version + 1;
        self.issues.insert(record.issue_id.clone(), record.clone());
        if let Some(episode) = closed_episode {
            self.episodes.push(episode);
        }
        record
    }
}

#[derive(Default)]
pub struct InMemoryIssueStore {
    state: RwLock<MaintenanceState>,
}

impl InMemoryIssueStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, MaintenanceState>, StorageError> {
        self.state
            .read()
            .map_err(|_| StorageError::new("lock failed"))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, MaintenanceState>, StorageError> {
        self.state
            .write()
            .map_err(|_| StorageError::new("lock failed"))
    }
}

fn apply_limit<T>(items: &mut Vec<T>, limit: Option<i64>) {
    if let Some(limit) = limit {
        let limit = limit.max(0) as usize;
        if limit > 0 && items.len() > limit {
            items.truncate(limit);
        }
    }
}

#[async_trait::async_trait]
impl IssueStore for InMemoryIssueStore {
    async fn list_issues(&self, filter: &IssueFilter) -> Result<Vec<IssueRecord>, StorageError> {
        let state = self.read()?;
        let mut items: Vec<IssueRecord> = state
            .issues
            .values()
            .filter(|issue| filter.matches(issue))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        apply_limit(&mut items, filter.limit);
        Ok(items)
    }

    async fn find_issue(&self, issue_id: &str) -> Result<Option<IssueRecord>, StorageError> {
        Ok(self.read()?.issues.get(issue_id).cloned())
    }

    async fn create_issue(&self, record: IssueRecord) -> Result<IssueRecord, StorageError> {
        let mut state = self.write()?;
        if state.issues.contains_key(&record.issue_id) {
            return Err(StorageError::invalid("issue already exists"));
        }
        state.issues.insert(record.issue_id.clone(), record.clone());
        Ok(record)
    }

    async fn update_issue(
        &self,
        record: IssueRecord,
        expected_version: i64,
        closed_episode: Option<DowntimeEpisodeRecord>,
    ) -> Result<IssueRecord, StorageError> {
        let mut state = self.write()?;
        state.check_version(&record.issue_id, expected_version)?;
        Ok(state.write_issue(record, expected_version, closed_episode))
    }

    async fn delete_issue(&self, issue_id: &str) -> Result<bool, StorageError> {
        let mut state = self.write()?;
        if state.issues.remove(issue_id).is_none() {
            return Ok(false);
        }
        let remedy_ids: Vec<String> = state
            .remedies
            .values()
            .filter(|remedy| remedy.issue_id == issue_id)
            .map(|remedy| remedy.remedy_id.clone())
            .collect();
        state.remedies.retain(|_, remedy| remedy.issue_id != issue_id);
        state.attachments.retain(|_, attachment| match &attachment.parent {
            AttachmentParent::Issue(id) => id != issue_id,
            AttachmentParent::Remedy(id) => !remedy_ids.contains(id),
        });
        state.episodes.retain(|episode| episode.issue_id != issue_id);
        Ok(true)
    }

    async fn list_downtime_episodes(
        &self,
        issue_id: &str,
    ) -> Result<Vec<DowntimeEpisodeRecord>, StorageError> {
        let state = self.read()?;
        let mut items: Vec<DowntimeEpisodeRecord> = state
            .episodes
            .iter()
            .filter(|episode| episode.issue_id == issue_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        Ok(items)
    }
}

#[async_trait::async_trait]
impl RemedyStore for InMemoryIssueStore {
    async fn list_remedies(&self, issue_id: &str) -> Result<Vec<RemedyRecord>, StorageError> {
        let state = self.read()?;
        let mut items: Vec<RemedyRecord> = state
            .remedies
            .values()
            .filter(|remedy| remedy.issue_id == issue_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(items)
    }

    async fn list_remedies_for_issues(
        &self,
        issue_ids: &[String],
    ) -> Result<Vec<RemedyRecord>, StorageError> {
        let state = self.read()?;
        let mut items: Vec<RemedyRecord> = state
            .remedies
            .values()
            .filter(|remedy| issue_ids.contains(&remedy.issue_id))
            .cloned()
            .collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(items)
    }

    async fn find_remedy(&self, remedy_id: &str) -> Result<Option<RemedyRecord>, StorageError> {
        Ok(self.read()?.remedies.get(remedy_id).cloned())
    }

    async fn record_remedy(
        &self,
        remedy: RemedyRecord,
        issue: IssueRecord,
        expected_version: i64,
        closed_episode: Option<DowntimeEpisodeRecord>,
    ) -> Result<(IssueRecord, RemedyRecord), StorageError> {
        let mut state = self.write()?;
        if remedy.issue_id != issue.issue_id {
            return Err(StorageError::invalid("remedy belongs to another issue"));
        }
        state.check_version(&issue.issue_id, expected_version)?;
        if state.remedies.contains_key(&remedy.remedy_id) {
            return Err(StorageError::invalid("remedy already exists"));
        }
        let issue = state.write_issue(issue, expected_version, closed_episode);
        state
            .remedies
            .insert(remedy.remedy_id.clone(), remedy.clone());
        Ok((issue, remedy))
    }

    async fn update_remedy(
        &self,
        record: RemedyRecord,
    ) -> Result<Option<RemedyRecord>, StorageError> {
        let mut state = self.write()?;
        let Some(existing) = state.remedies.get_mut(&record.remedy_id) else {
            return Ok(None);
        };
        *existing = record.clone();
        Ok(Some(record))
    }

    async fn delete_remedy(&self, remedy_id: &str) -> Result<bool, StorageError> {
        let mut state = self.write()?;
        if state.remedies.remove(remedy_id).is_none() {
            return Ok(false);
        }
        state
            .attachments
            .retain(|_, attachment| attachment.parent.remedy_id() != Some(remedy_id));
        Ok(true)
    }
}

#[async_trait::async_trait]
impl AttachmentStore for InMemoryIssueStore {
    async fn list_attachments(
        &self,
        parent: &AttachmentParent,
    ) -> Result<Vec<AttachmentRecord>, StorageError> {
        let state = self.read()?;
        let mut items: Vec<AttachmentRecord> = state
            .attachments
            .values()
            .filter(|attachment| &attachment.parent == parent)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        Ok(items)
    }

    async fn count_attachments(&self, parent: &AttachmentParent) -> Result<i64, StorageError> {
        let state = self.read()?;
        let count = state
            .attachments
            .values()
            .filter(|attachment| &attachment.parent == parent)
            .count();
        Ok(count as i64)
    }

    async fn find_attachment(
        &self,
        attachment_id: &str,
    ) -> Result<Option<AttachmentRecord>, StorageError> {
        Ok(self.read()?.attachments.get(attachment_id).cloned())
    }

    async fn create_attachment(
        &self,
        record: AttachmentRecord,
        max_per_parent: i32,
    ) -> Result<AttachmentRecord, StorageError> {
        let mut state = self.write()?;
        let parent_exists = match &record.parent {
            AttachmentParent::Issue(id) => state.issues.contains_key(id),
            AttachmentParent::Remedy(id) => state.remedies.contains_key(id),
        };
        if !parent_exists {
            return Err(StorageError::not_found("attachment parent not found"));
        }
        let existing = state
            .attachments
            .values()
            .filter(|attachment| attachment.parent == record.parent)
            .count();
        if existing as i64 >= i64::from(max_per_parent) {
            return Err(StorageError::invalid(format!(
                "attachment limit reached ({max_per_parent})"
            )));
        }
        state
            .attachments
            .insert(record.attachment_id.clone(), record.clone());
        Ok(record)
    }

    async fn delete_attachment(&self, attachment_id: &str) -> Result<bool, StorageError> {
        let mut state = self.write()?;
        Ok(state.attachments.remove(attachment_id).is_some())
    }
}
