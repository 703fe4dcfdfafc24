//! 故障单服务（状态机 + 版本校验写入 + 附件 + 审计）
//!
//! 权限门槛由接口层在调用前判定；这里只负责业务规则与一致性：
//! - 故障单更新读取存储中的前像，跑状态机后带版本号写回，冲突返回可重试错误
//! - 附件先落盘再写记录，记录写入失败时删除文件
//! - 审计日志尽力写入，失败只记录告警

use crate::cost::total_cost;
use crate::dashboard::{DashboardInput, DashboardMetrics, DashboardQuery, clamp_days, summarize, window_start};
use crate::downtime::{ClosedInterval, total_downtime_hours};
use crate::error::MaintenanceError;
use crate::lifecycle::{apply_remedy, downtime_state, is_reopen, prepare_issue_save};
use crate::redaction::{RemedyView, Viewer, redact_remedy};
use crate::report::{IssueReport, build_report};
use chrono::{DateTime, Utc};
use domain::{
    Actor, AttachmentKind, AttachmentPurpose, AuditAction, IssueCategory, IssuePriority,
    IssueStatus, MachineRef,
};
use logbook_storage::{
    AttachmentParent, AttachmentRecord, AttachmentStore, AuditLogQuery, AuditLogRecord,
    AuditLogStore, DowntimeEpisodeRecord, FileStore, IssueFilter, IssueRecord, IssueStore,
    MachineCatalog, MachineRecord, RemedyRecord, RemedyStore, SettingsStore, attachment_parent,
    ensure_non_negative_cost,
};
use logbook_telemetry::{
    record_attachment_rolled_back, record_attachment_stored, record_issue_created,
    record_issue_deleted, record_issue_save_latency_ms, record_issue_updated,
    record_optimistic_conflict, record_remedy_added, record_report_generated,
};
use rust_decimal::Decimal;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// 发起操作的一方（审计使用）。
#[derive(Debug, Clone)]
pub struct Caller {
    pub actor: Actor,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl Caller {
    pub fn new(actor: Actor) -> Self {
        Self {
            actor,
            ip_address: None,
            user_agent: None,
        }
    }

    pub fn viewer(&self) -> Viewer {
        Viewer::from_actor(&self.actor)
    }
}

#[derive(Debug, Clone)]
pub struct NewIssue {
    pub machine_id_ref: String,
    pub category: IssueCategory,
    pub priority: IssuePriority,
    pub alarm_code: Option<String>,
    pub description: String,
    pub is_runnable: bool,
    pub reported_by: Option<String>,
    pub auto_title: Option<String>,
}

/// 故障单的部分更新；`expected_version` 由客户端带回时先行校验。
#[derive(Debug, Clone, Default)]
pub struct IssueChanges {
    pub machine_id_ref: Option<String>,
    pub category: Option<IssueCategory>,
    pub priority: Option<IssuePriority>,
    pub status: Option<IssueStatus>,
    /// 空字符串表示清除。
    pub alarm_code: Option<String>,
    pub description: Option<String>,
    pub is_runnable: Option<bool>,
    pub auto_title: Option<String>,
    pub ai_summary: Option<String>,
    pub expected_version: Option<i64>,
}

/// 维修措施的可编辑字段（新增与整体替换共用）。
#[derive(Debug, Clone)]
pub struct RemedyInput {
    pub description: String,
    pub technician_name: String,
    pub is_external: bool,
    pub phone_number: Option<String>,
    pub is_machine_runnable: bool,
    pub parts_purchased: String,
    pub labor_cost: Option<Decimal>,
    pub parts_cost: Option<Decimal>,
}

#[derive(Debug, Clone)]
pub struct AttachmentUpload {
    pub file_name: String,
    pub file_type: AttachmentKind,
    pub purpose: AttachmentPurpose,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct IssueSummary {
    pub issue: IssueRecord,
    pub machine_name: String,
    pub department_name: String,
    pub remedies_count: usize,
    pub downtime_hours: f64,
}

#[derive(Debug, Clone)]
pub struct RemedyEntry {
    pub remedy: RemedyView,
    pub attachments: Vec<AttachmentRecord>,
}

#[derive(Debug, Clone)]
pub struct IssueDetail {
    pub issue: IssueRecord,
    pub machine: Option<MachineRecord>,
    pub department_name: String,
    /// 最新的在前。
    pub remedies: Vec<RemedyEntry>,
    pub attachments: Vec<AttachmentRecord>,
    pub downtime_episodes: Vec<ClosedInterval>,
    pub downtime_hours: f64,
    pub total_downtime_hours: f64,
}

#[derive(Clone)]
pub struct MaintenanceStores {
    pub issues: Arc<dyn IssueStore>,
    pub remedies: Arc<dyn RemedyStore>,
    pub attachments: Arc<dyn AttachmentStore>,
    pub audit: Arc<dyn AuditLogStore>,
    pub settings: Arc<dyn SettingsStore>,
    pub machines: Arc<dyn MachineCatalog>,
    pub files: Arc<dyn FileStore>,
}

#[derive(Debug, Clone)]
pub struct IssueServiceConfig {
    /// 附件落盘的超时。
    pub upload_timeout: Duration,
}

impl Default for IssueServiceConfig {
    fn default() -> Self {
        Self {
            upload_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Clone)]
pub struct IssueService {
    stores: MaintenanceStores,
    config: IssueServiceConfig,
}

impl IssueService {
    pub fn new(stores: MaintenanceStores) -> Self {
        Self::new_with_config(stores, IssueServiceConfig::default())
    }

    pub fn new_with_config(stores: MaintenanceStores, config: IssueServiceConfig) -> Self {
        Self { stores, config }
    }

    // ---- 故障单 ----

    pub async fn list_issues(
        &self,
        filter: &IssueFilter,
    ) -> Result<Vec<IssueSummary>, MaintenanceError> {
        let now = domain::time::now_utc();
        let issues = self.stores.issues.list_issues(filter).await?;
        let ids: Vec<String> = issues.iter().map(|issue| issue.issue_id.clone()).collect();
        let remedies = self.stores.remedies.list_remedies_for_issues(&ids).await?;
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for remedy in &remedies {
            *counts.entry(remedy.issue_id.as_str()).or_default() += 1;
        }

        let mut machines: HashMap<String, Option<MachineRecord>> = HashMap::new();
        let mut items = Vec::with_capacity(issues.len());
        for issue in issues {
            let key = issue.machine_id_ref.as_str().to_string();
            if !machines.contains_key(&key) {
                let machine = self.lookup_machine(&issue.machine_id_ref).await;
                machines.insert(key.clone(), machine);
            }
            let machine = machines.get(&key).and_then(Option::as_ref);
            items.push(IssueSummary {
                machine_name: crate::report::machine_name(&issue, machine),
                department_name: crate::report::department_name(machine),
                remedies_count: counts.get(issue.issue_id.as_str()).copied().unwrap_or(0),
                downtime_hours: downtime_state(&issue).elapsed_hours(now),
                issue,
            });
        }
        Ok(items)
    }

    /// 单个故障单的列表视图（写操作返回给客户端时使用）。
    pub async fn describe_issue(&self, issue: IssueRecord) -> Result<IssueSummary, MaintenanceError> {
        let remedies_count = self.stores.remedies.list_remedies(&issue.issue_id).await?.len();
        let machine = self.lookup_machine(&issue.machine_id_ref).await;
        Ok(IssueSummary {
            machine_name: crate::report::machine_name(&issue, machine.as_ref()),
            department_name: crate::report::department_name(machine.as_ref()),
            remedies_count,
            downtime_hours: downtime_state(&issue).elapsed_hours(domain::time::now_utc()),
            issue,
        })
    }

    pub async fn issue_detail(
        &self,
        viewer: &Viewer,
        issue_id: &str,
    ) -> Result<IssueDetail, MaintenanceError> {
        let now = domain::time::now_utc();
        let issue = self.load_issue(issue_id).await?;
        let machine = self.lookup_machine(&issue.machine_id_ref).await;
        let mut remedies = self.stores.remedies.list_remedies(issue_id).await?;
        remedies.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let mut entries = Vec::with_capacity(remedies.len());
        for remedy in &remedies {
            entries.push(self.remedy_entry(remedy, viewer).await?);
        }
        let attachments = self
            .stores
            .attachments
            .list_attachments(&AttachmentParent::Issue(issue_id.to_string()))
            .await?;
        let history = self.history(issue_id).await?;
        let state = downtime_state(&issue);

        Ok(IssueDetail {
            department_name: crate::report::department_name(machine.as_ref()),
            machine,
            remedies: entries,
            attachments,
            downtime_hours: state.elapsed_hours(now),
            total_downtime_hours: total_downtime_hours(&state, &history, now),
            downtime_episodes: history,
            issue,
        })
    }

    pub async fn create_issue(
        &self,
        caller: &Caller,
        input: NewIssue,
    ) -> Result<IssueRecord, MaintenanceError> {
        let machine_id_ref = parse_machine_ref(&input.machine_id_ref)?;
        self.validate_text("description", &input.description).await?;
        let now = domain::time::now_utc();
        let reported_by = input
            .reported_by
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| caller.actor.display_name().to_string());
        let record = IssueRecord {
            issue_id: uuid::Uuid::new_v4().to_string(),
            machine_id_ref,
            category: input.category,
            priority: input.priority,
            status: IssueStatus::Open,
            alarm_code: non_empty(input.alarm_code),
            description: input.description.trim().to_string(),
            ai_summary: String::new(),
            auto_title: input.auto_title.unwrap_or_default().trim().to_string(),
            is_runnable: input.is_runnable,
            reported_by,
            downtime_start: None,
            downtime_end: None,
            created_at: now,
            updated_at: now,
            version: 1,
        };
        let issue = self.save_issue(record, None).await?;
        record_issue_created();
        self.audit(
            caller,
            AuditAction::IssueCreated,
            format!("Issue created: {}", issue.auto_title),
            Some(&issue.issue_id),
            None,
            json!({
                "machine_id_ref": issue.machine_id_ref.as_str(),
                "category": issue.category.as_str(),
                "priority": issue.priority.as_str(),
                "is_runnable": issue.is_runnable,
            }),
        )
        .await;
        Ok(issue)
    }

    /// 故障单保存入口：`previous_status` 为 None 表示新建。
    ///
    /// 更新时 `issue.version` 必须等于存储中的版本。
    pub async fn save_issue(
        &self,
        mut issue: IssueRecord,
        previous_status: Option<IssueStatus>,
    ) -> Result<IssueRecord, MaintenanceError> {
        let started_at = Instant::now();
        // 新建时停机区间以创建时间为起点
        let now = match previous_status {
            None => issue.created_at,
            Some(_) => domain::time::now_utc(),
        };
        let plan = prepare_issue_save(&mut issue, previous_status, now);
        let result = match previous_status {
            None => self.stores.issues.create_issue(issue).await,
            Some(_) => {
                let expected_version = issue.version;
                self.stores
                    .issues
                    .update_issue(issue, expected_version, plan.closed_episode)
                    .await
            }
        };
        record_issue_save_latency_ms(started_at.elapsed().as_millis() as u64);
        result.map_err(|err| {
            if err.is_conflict() {
                record_optimistic_conflict();
                warn!(target: "logbook.maintenance", error = %err, "issue_save_conflict");
            }
            MaintenanceError::from(err)
        })
    }

    pub async fn update_issue(
        &self,
        caller: &Caller,
        issue_id: &str,
        changes: IssueChanges,
    ) -> Result<IssueRecord, MaintenanceError> {
        let stored = self.load_issue(issue_id).await?;
        check_expected_version(&stored, changes.expected_version)?;
        let previous_status = stored.status;
        let mut issue = stored;

        if let Some(machine) = changes.machine_id_ref.as_deref() {
            issue.machine_id_ref = parse_machine_ref(machine)?;
        }
        if let Some(description) = changes.description.as_deref() {
            self.validate_text("description", description).await?;
            issue.description = description.trim().to_string();
        }
        if let Some(category) = changes.category {
            issue.category = category;
        }
        if let Some(priority) = changes.priority {
            issue.priority = priority;
        }
        if let Some(status) = changes.status {
            issue.status = status;
        }
        if let Some(alarm_code) = changes.alarm_code {
            issue.alarm_code = non_empty(Some(alarm_code));
        }
        if let Some(is_runnable) = changes.is_runnable {
            issue.is_runnable = is_runnable;
        }
        if let Some(title) = changes.auto_title {
            issue.auto_title = title.trim().to_string();
        }
        if let Some(summary) = changes.ai_summary {
            issue.ai_summary = summary;
        }

        let issue = self.save_issue(issue, Some(previous_status)).await?;
        record_issue_updated();
        self.audit(
            caller,
            AuditAction::IssueUpdated,
            format!("Issue updated: {}", issue.auto_title),
            Some(&issue.issue_id),
            None,
            json!({ "version": issue.version }),
        )
        .await;
        self.audit_status_change(caller, &issue, previous_status).await;
        Ok(issue)
    }

    /// 状态变更，由状态机处理停机区间。
    pub async fn update_status(
        &self,
        caller: &Caller,
        issue_id: &str,
        status: IssueStatus,
        expected_version: Option<i64>,
    ) -> Result<IssueRecord, MaintenanceError> {
        let mut issue = self.load_issue(issue_id).await?;
        check_expected_version(&issue, expected_version)?;
        let previous_status = issue.status;
        issue.status = status;
        let issue = self.save_issue(issue, Some(previous_status)).await?;
        record_issue_updated();
        self.audit_status_change(caller, &issue, previous_status).await;
        Ok(issue)
    }

    pub async fn delete_issue(&self, caller: &Caller, issue_id: &str) -> Result<(), MaintenanceError> {
        let issue = self.load_issue(issue_id).await?;
        let mut files = self.attachment_paths(&AttachmentParent::Issue(issue_id.to_string())).await?;
        for remedy in self.stores.remedies.list_remedies(issue_id).await? {
            files.extend(
                self.attachment_paths(&AttachmentParent::Remedy(remedy.remedy_id))
                    .await?,
            );
        }
        if !self.stores.issues.delete_issue(issue_id).await? {
            return Err(MaintenanceError::NotFound("issue"));
        }
        self.remove_files(&files).await;
        record_issue_deleted();
        self.audit(
            caller,
            AuditAction::IssueDeleted,
            format!("Issue deleted: {}", issue.auto_title),
            None,
            None,
            json!({ "issue_id": issue_id, "machine_id_ref": issue.machine_id_ref.as_str() }),
        )
        .await;
        Ok(())
    }

    // ---- 维修措施 ----

    pub async fn remedy_detail(
        &self,
        viewer: &Viewer,
        remedy_id: &str,
    ) -> Result<RemedyEntry, MaintenanceError> {
        let remedy = self.load_remedy(remedy_id).await?;
        self.remedy_entry(&remedy, viewer).await
    }

    /// 新增维修措施，返回变化后的故障单与维修措施。
    ///
    /// 故障单（版本校验）与维修措施在同一次存储写入中完成；任一失败时两者都不写。
    pub async fn add_remedy(
        &self,
        caller: &Caller,
        issue_id: &str,
        input: RemedyInput,
        expected_version: Option<i64>,
    ) -> Result<(IssueRecord, RemedyRecord), MaintenanceError> {
        self.validate_remedy(&input).await?;
        let mut issue = self.load_issue(issue_id).await?;
        check_expected_version(&issue, expected_version)?;

        let now = domain::time::now_utc();
        let remedy = RemedyRecord {
            remedy_id: uuid::Uuid::new_v4().to_string(),
            issue_id: issue_id.to_string(),
            total_cost: total_cost(input.labor_cost, input.parts_cost),
            description: input.description.trim().to_string(),
            technician_name: input.technician_name.trim().to_string(),
            is_external: input.is_external,
            phone_number: non_empty(input.phone_number),
            is_machine_runnable: input.is_machine_runnable,
            parts_purchased: input.parts_purchased,
            labor_cost: input.labor_cost,
            parts_cost: input.parts_cost,
            created_at: now,
            updated_at: now,
        };

        let (previous_status, plan) = apply_remedy(&mut issue, &remedy, now);
        let expected_version = issue.version;
        let (issue, remedy) = self
            .stores
            .remedies
            .record_remedy(remedy, issue, expected_version, plan.closed_episode)
            .await
            .map_err(|err| {
                if err.is_conflict() {
                    record_optimistic_conflict();
                    warn!(target: "logbook.maintenance", issue_id = %issue_id, error = %err, "remedy_issue_conflict");
                }
                MaintenanceError::from(err)
            })?;
        record_remedy_added();
        info!(
            target: "logbook.maintenance",
            issue_id = %issue.issue_id,
            remedy_id = %remedy.remedy_id,
            status = issue.status.as_str(),
            is_runnable = issue.is_runnable,
            "remedy_added"
        );

        self.audit(
            caller,
            AuditAction::RemedyAdded,
            format!("Remedy added to {}", issue.auto_title),
            Some(&issue.issue_id),
            Some(&remedy.remedy_id),
            json!({
                "is_external": remedy.is_external,
                "is_machine_runnable": remedy.is_machine_runnable,
            }),
        )
        .await;
        self.audit_status_change(caller, &issue, previous_status).await;
        Ok((issue, remedy))
    }

    /// 整体替换维修措施的可编辑字段；不影响故障单状态。
    pub async fn update_remedy(
        &self,
        caller: &Caller,
        remedy_id: &str,
        input: RemedyInput,
    ) -> Result<RemedyRecord, MaintenanceError> {
        self.validate_remedy(&input).await?;
        let mut remedy = self.load_remedy(remedy_id).await?;
        remedy.total_cost = total_cost(input.labor_cost, input.parts_cost);
        remedy.description = input.description.trim().to_string();
        remedy.technician_name = input.technician_name.trim().to_string();
        remedy.is_external = input.is_external;
        remedy.phone_number = non_empty(input.phone_number);
        remedy.is_machine_runnable = input.is_machine_runnable;
        remedy.parts_purchased = input.parts_purchased;
        remedy.labor_cost = input.labor_cost;
        remedy.parts_cost = input.parts_cost;
        remedy.updated_at = domain::time::now_utc();

        let remedy = self
            .stores
            .remedies
            .update_remedy(remedy)
            .await?
            .ok_or(MaintenanceError::NotFound("remedy"))?;
        self.audit(
            caller,
            AuditAction::RemedyUpdated,
            "Remedy updated".to_string(),
            Some(&remedy.issue_id),
            Some(&remedy.remedy_id),
            json!({}),
        )
        .await;
        Ok(remedy)
    }

    pub async fn delete_remedy(&self, caller: &Caller, remedy_id: &str) -> Result<(), MaintenanceError> {
        let remedy = self.load_remedy(remedy_id).await?;
        let files = self
            .attachment_paths(&AttachmentParent::Remedy(remedy_id.to_string()))
            .await?;
        if !self.stores.remedies.delete_remedy(remedy_id).await? {
            return Err(MaintenanceError::NotFound("remedy"));
        }
        self.remove_files(&files).await;
        self.audit(
            caller,
            AuditAction::RemedyDeleted,
            "Remedy deleted".to_string(),
            Some(&remedy.issue_id),
            None,
            json!({ "remedy_id": remedy_id }),
        )
        .await;
        Ok(())
    }

    // ---- 附件 ----

    /// 附件必须且只能关联一个对象，校验在任何写入之前完成。
    pub async fn add_attachment(
        &self,
        caller: &Caller,
        issue_id: Option<&str>,
        remedy_id: Option<&str>,
        upload: AttachmentUpload,
    ) -> Result<AttachmentRecord, MaintenanceError> {
        let parent = attachment_parent(issue_id, remedy_id)?;
        let audit_issue_id = match &parent {
            AttachmentParent::Issue(id) => self.load_issue(id).await?.issue_id,
            AttachmentParent::Remedy(id) => self.load_remedy(id).await?.issue_id,
        };

        let settings = self.stores.settings.load_settings().await?;
        let limit = match parent {
            AttachmentParent::Issue(_) => settings.max_attachments_per_issue,
            AttachmentParent::Remedy(_) => settings.max_attachments_per_remedy,
        };
        let existing = self.stores.attachments.count_attachments(&parent).await?;
        if existing >= i64::from(limit) {
            return Err(MaintenanceError::Invalid(format!(
                "attachment limit reached ({limit})"
            )));
        }
        if upload.bytes.is_empty() {
            return Err(MaintenanceError::Invalid("file is empty".to_string()));
        }
        let size = upload.bytes.len() as u64;
        if size > settings.max_file_size_bytes() {
            return Err(MaintenanceError::Invalid(format!(
                "file exceeds {} MB",
                settings.max_file_size_mb
            )));
        }

        let now = domain::time::now_utc();
        let attachment_id = uuid::Uuid::new_v4().to_string();
        let file_name = sanitize_file_name(&upload.file_name);
        let file_path = attachment_path(now, &attachment_id, &file_name);

        match tokio::time::timeout(
            self.config.upload_timeout,
            self.stores.files.put(&file_path, &upload.bytes),
        )
        .await
        {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(err.into()),
            Err(_) => {
                warn!(target: "logbook.maintenance", file_path = %file_path, "attachment_store_timeout");
                self.remove_files(std::slice::from_ref(&file_path)).await;
                return Err(MaintenanceError::Timeout);
            }
        }

        let record = AttachmentRecord {
            attachment_id,
            parent,
            file_path: file_path.clone(),
            file_name,
            file_size: i64::try_from(size).unwrap_or(i64::MAX),
            file_type: upload.file_type,
            purpose: upload.purpose,
            uploaded_at: now,
        };
        let record = match self.stores.attachments.create_attachment(record, limit).await {
            Ok(record) => record,
            Err(err) => {
                warn!(target: "logbook.maintenance", file_path = %file_path, error = %err, "attachment_record_failed");
                self.remove_files(std::slice::from_ref(&file_path)).await;
                record_attachment_rolled_back();
                return Err(err.into());
            }
        };
        record_attachment_stored();
        info!(
            target: "logbook.maintenance",
            attachment_id = %record.attachment_id,
            file_path = %record.file_path,
            file_size = record.file_size,
            "attachment_stored"
        );
        self.audit(
            caller,
            AuditAction::AttachmentAdded,
            format!("Attachment added: {}", record.file_name),
            Some(&audit_issue_id),
            record.parent.remedy_id(),
            json!({
                "attachment_id": record.attachment_id,
                "file_type": record.file_type.as_str(),
                "purpose": record.purpose.as_str(),
            }),
        )
        .await;
        Ok(record)
    }

    pub async fn delete_attachment(
        &self,
        caller: &Caller,
        attachment_id: &str,
    ) -> Result<AttachmentRecord, MaintenanceError> {
        let record = self
            .stores
            .attachments
            .find_attachment(attachment_id)
            .await?
            .ok_or(MaintenanceError::NotFound("attachment"))?;
        if !self.stores.attachments.delete_attachment(attachment_id).await? {
            return Err(MaintenanceError::NotFound("attachment"));
        }
        self.remove_files(std::slice::from_ref(&record.file_path)).await;
        self.audit(
            caller,
            AuditAction::AttachmentDeleted,
            format!("Attachment deleted: {}", record.file_name),
            record.parent.issue_id(),
            record.parent.remedy_id(),
            json!({ "attachment_id": attachment_id }),
        )
        .await;
        Ok(record)
    }

    // ---- 看板 / 报表 / 审计 ----

    pub async fn dashboard(
        &self,
        viewer: &Viewer,
        query: &DashboardQuery,
    ) -> Result<DashboardMetrics, MaintenanceError> {
        let now = domain::time::now_utc();
        let days = clamp_days(query.days);
        let filter = IssueFilter {
            created_after: Some(window_start(days, now)),
            department_id: query.department_id.clone(),
            ..Default::default()
        };
        let issues = self.stores.issues.list_issues(&filter).await?;
        let ids: Vec<String> = issues.iter().map(|issue| issue.issue_id.clone()).collect();
        let remedies = self.stores.remedies.list_remedies_for_issues(&ids).await?;
        let mut history = HashMap::new();
        for issue in &issues {
            let episodes = self.history(&issue.issue_id).await?;
            if !episodes.is_empty() {
                history.insert(issue.issue_id.clone(), episodes);
            }
        }
        let departments = match self.stores.machines.list_departments().await {
            Ok(departments) => departments,
            Err(err) => {
                warn!(target: "logbook.maintenance", error = %err, "department_catalog_unavailable");
                Vec::new()
            }
        };
        let input = DashboardInput {
            issues: &issues,
            remedies: &remedies,
            history: &history,
            departments: &departments,
        };
        Ok(summarize(&input, viewer, days, now))
    }

    pub async fn issue_report(
        &self,
        caller: &Caller,
        issue_id: &str,
    ) -> Result<IssueReport, MaintenanceError> {
        let issue = self.load_issue(issue_id).await?;
        let machine = self.lookup_machine(&issue.machine_id_ref).await;
        let mut remedies = self.stores.remedies.list_remedies(issue_id).await?;
        remedies.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        let history = self.history(issue_id).await?;
        let report = build_report(
            issue,
            machine.as_ref(),
            &remedies,
            history,
            &caller.viewer(),
            caller.actor.display_name(),
            domain::time::now_utc(),
        );
        record_report_generated();
        self.audit(
            caller,
            AuditAction::ReportGenerated,
            format!("Report generated for {}", report.issue.auto_title),
            Some(issue_id),
            None,
            json!({ "remedies": report.remedies.len() }),
        )
        .await;
        Ok(report)
    }

    pub async fn list_audit_logs(
        &self,
        query: &AuditLogQuery,
    ) -> Result<Vec<AuditLogRecord>, MaintenanceError> {
        Ok(self.stores.audit.list_audit_logs(query).await?)
    }

    // ---- 内部 ----

    async fn load_issue(&self, issue_id: &str) -> Result<IssueRecord, MaintenanceError> {
        self.stores
            .issues
            .find_issue(issue_id)
            .await?
            .ok_or(MaintenanceError::NotFound("issue"))
    }

    async fn load_remedy(&self, remedy_id: &str) -> Result<RemedyRecord, MaintenanceError> {
        self.stores
            .remedies
            .find_remedy(remedy_id)
            .await?
            .ok_or(MaintenanceError::NotFound("remedy"))
    }

    async fn remedy_entry(
        &self,
        remedy: &RemedyRecord,
        viewer: &Viewer,
    ) -> Result<RemedyEntry, MaintenanceError> {
        let attachments = self
            .stores
            .attachments
            .list_attachments(&AttachmentParent::Remedy(remedy.remedy_id.clone()))
            .await?;
        Ok(RemedyEntry {
            remedy: redact_remedy(remedy, viewer),
            attachments,
        })
    }

    async fn history(&self, issue_id: &str) -> Result<Vec<ClosedInterval>, MaintenanceError> {
        Ok(self
            .stores
            .issues
            .list_downtime_episodes(issue_id)
            .await?
            .into_iter()
            .map(|episode: DowntimeEpisodeRecord| ClosedInterval {
                start: episode.started_at,
                end: episode.ended_at,
            })
            .collect())
    }

    /// 机器目录查询失败按查不到处理。
    async fn lookup_machine(&self, machine: &MachineRef) -> Option<MachineRecord> {
        match self.stores.machines.find_machine(machine.as_str()).await {
            Ok(found) => found,
            Err(err) => {
                warn!(target: "logbook.maintenance", machine_id = %machine, error = %err, "machine_lookup_failed");
                None
            }
        }
    }

    async fn attachment_paths(&self, parent: &AttachmentParent) -> Result<Vec<String>, MaintenanceError> {
        Ok(self
            .stores
            .attachments
            .list_attachments(parent)
            .await?
            .into_iter()
            .map(|attachment| attachment.file_path)
            .collect())
    }

    async fn remove_files(&self, paths: &[String]) {
        for path in paths {
            if let Err(err) = self.stores.files.remove(path).await {
                warn!(target: "logbook.maintenance", file_path = %path, error = %err, "attachment_file_remove_failed");
            }
        }
    }

    async fn validate_text(&self, field: &str, value: &str) -> Result<(), MaintenanceError> {
        if value.trim().is_empty() {
            return Err(MaintenanceError::Invalid(format!("{field} is required")));
        }
        let settings = self.stores.settings.load_settings().await?;
        let limit = usize::try_from(settings.max_update_text_length).unwrap_or(0);
        if value.chars().count() > limit {
            return Err(MaintenanceError::Invalid(format!(
                "{field} exceeds {limit} characters"
            )));
        }
        Ok(())
    }

    async fn validate_remedy(&self, input: &RemedyInput) -> Result<(), MaintenanceError> {
        self.validate_text("description", &input.description).await?;
        if input.technician_name.trim().is_empty() {
            return Err(MaintenanceError::Invalid(
                "technician_name is required".to_string(),
            ));
        }
        let has_phone = input
            .phone_number
            .as_deref()
            .is_some_and(|phone| !phone.trim().is_empty());
        if input.is_external && !has_phone {
            return Err(MaintenanceError::Invalid(
                "phone_number is required for external technicians".to_string(),
            ));
        }
        ensure_non_negative_cost("labor_cost", input.labor_cost)?;
        ensure_non_negative_cost("parts_cost", input.parts_cost)?;
        Ok(())
    }

    async fn audit_status_change(&self, caller: &Caller, issue: &IssueRecord, previous: IssueStatus) {
        if issue.status == previous {
            return;
        }
        self.audit(
            caller,
            AuditAction::StatusChanged,
            format!(
                "Status changed from {} to {}",
                previous.as_str(),
                issue.status.as_str()
            ),
            Some(&issue.issue_id),
            None,
            json!({ "from": previous.as_str(), "to": issue.status.as_str() }),
        )
        .await;
        let follow_up = if issue.status == IssueStatus::Resolved {
            Some((AuditAction::IssueResolved, "Issue resolved"))
        } else if is_reopen(Some(previous), issue.status) {
            Some((AuditAction::IssueReopened, "Issue reopened"))
        } else {
            None
        };
        if let Some((action, description)) = follow_up {
            self.audit(
                caller,
                action,
                description.to_string(),
                Some(&issue.issue_id),
                None,
                json!({}),
            )
            .await;
        }
    }

    async fn audit(
        &self,
        caller: &Caller,
        action: AuditAction,
        description: String,
        issue_id: Option<&str>,
        remedy_id: Option<&str>,
        metadata: serde_json::Value,
    ) {
        let record = AuditLogRecord {
            audit_id: uuid::Uuid::new_v4().to_string(),
            action,
            description,
            user_id: caller.actor.user_id().map(str::to_string),
            username: caller
                .actor
                .is_authenticated()
                .then(|| caller.actor.display_name().to_string()),
            issue_id: issue_id.map(str::to_string),
            remedy_id: remedy_id.map(str::to_string),
            ip_address: caller.ip_address.clone(),
            user_agent: caller.user_agent.clone(),
            metadata,
            created_at: domain::time::now_utc(),
        };
        if let Err(err) = self.stores.audit.create_audit_log(record).await {
            warn!(target: "logbook.maintenance", action = action.as_str(), error = %err, "audit_write_failed");
        }
    }
}

fn parse_machine_ref(value: &str) -> Result<MachineRef, MaintenanceError> {
    MachineRef::parse(value).ok_or_else(|| {
        MaintenanceError::Invalid(format!(
            "machine_id_ref must be 1-{} characters",
            MachineRef::MAX_LEN
        ))
    })
}

fn check_expected_version(issue: &IssueRecord, expected: Option<i64>) -> Result<(), MaintenanceError> {
    match expected {
        Some(version) if version != issue.version => {
            record_optimistic_conflict();
            Err(MaintenanceError::Conflict(format!(
                "issue version is {}, expected {}",
                issue.version, version
            )))
        }
        _ => Ok(()),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// 只保留字母数字与 `.-_`，其余替换为 `_`。
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

fn attachment_path(now: DateTime<Utc>, attachment_id: &str, file_name: &str) -> String {
    format!(
        "attachments/{}/{}_{}",
        now.format("%Y/%m/%d"),
        attachment_id,
        file_name
    )
}
