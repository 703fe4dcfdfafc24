//! Postgres 故障单、维修措施与附件记录存储
//!
//! 设计要点：
//! - 故障单更新带版本条件（`where version = $n`），版本不一致返回 Conflict
//! - 关闭的停机区间与故障单更新在同一事务内写入；新增维修措施也在该事务内
//! - 附件数量上限在锁住父记录后检查
//! - 维修措施、附件、停机历史依赖外键 `on delete cascade` 随故障单删除

use crate::error::StorageError;
use crate::models::{
    AttachmentParent, AttachmentRecord, DowntimeEpisodeRecord, IssueFilter, IssueRecord,
    RemedyRecord,
};
use crate::postgres::rows::{optional_timestamp, parsed, timestamp};
use crate::traits::{AttachmentStore, IssueStore, RemedyStore};
use crate::validation::attachment_parent;
use domain::MachineRef;
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder, Row};

pub struct PgIssueStore {
    pub pool: PgPool,
}

impl PgIssueStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const ISSUE_COLUMNS: &str = "issue_id, machine_id_ref, category, priority, status, alarm_code, \
     description, ai_summary, auto_title, is_runnable, reported_by, downtime_start, downtime_end, \
     created_at, updated_at, version";

fn issue_from_row(row: &PgRow) -> Result<IssueRecord, StorageError> {
    let machine_raw: String = row.try_get("machine_id_ref")?;
    let machine_id_ref = MachineRef::parse(&machine_raw)
        .ok_or_else(|| StorageError::new(format!("invalid machine_id_ref: {machine_raw}")))?;
    Ok(IssueRecord {
        issue_id: row.try_get("issue_id")?,
        machine_id_ref,
        category: parsed(row, "category")?,
        priority: parsed(row, "priority")?,
        status: parsed(row, "status")?,
        alarm_code: row.try_get("alarm_code")?,
        description: row.try_get("description")?,
        ai_summary: row.try_get("ai_summary")?,
        auto_title: row.try_get("auto_title")?,
        is_runnable: row.try_get("is_runnable")?,
        reported_by: row.try_get("reported_by")?,
        downtime_start: optional_timestamp(row, "downtime_start")?,
        downtime_end: optional_timestamp(row, "downtime_end")?,
        created_at: timestamp(row, "created_at")?,
        updated_at: timestamp(row, "updated_at")?,
        version: row.try_get("version")?,
    })
}

const REMEDY_COLUMNS: &str = "remedy_id, issue_id, description, technician_name, is_external, \
     phone_number, is_machine_runnable, parts_purchased, labor_cost, parts_cost, total_cost, \
     created_at, updated_at";

fn remedy_from_row(row: &PgRow) -> Result<RemedyRecord, StorageError> {
    Ok(RemedyRecord {
        remedy_id: row.try_get("remedy_id")?,
        issue_id: row.try_get("issue_id")?,
        description: row.try_get("description")?,
        technician_name: row.try_get("technician_name")?,
        is_external: row.try_get("is_external")?,
        phone_number: row.try_get("phone_number")?,
        is_machine_runnable: row.try_get("is_machine_runnable")?,
        parts_purchased: row.try_get("parts_purchased")?,
        labor_cost: row.try_get("labor_cost")?,
        parts_cost: row.try_get("parts_cost")?,
        total_cost: row.try_get("total_cost")?,
        created_at: timestamp(row, "created_at")?,
        updated_at: timestamp(row, "updated_at")?,
    })
}

const ATTACHMENT_COLUMNS: &str = "attachment_id, issue_id, remedy_id, file_path, file_name, \
     file_size, file_type, purpose, uploaded_at";

fn attachment_from_row(row: &PgRow) -> Result<AttachmentRecord, StorageError> {
    let issue_id: Option<String> = row.try_get("issue_id")?;
    let remedy_id: Option<String> = row.try_get("remedy_id")?;
    Ok(AttachmentRecord {
        attachment_id: row.try_get("attachment_id")?,
        parent: attachment_parent(issue_id.as_deref(), remedy_id.as_deref())?,
        file_path: row.try_get("file_path")?,
        file_name: row.try_get("file_name")?,
        file_size: row.try_get("file_size")?,
        file_type: parsed(row, "file_type")?,
        purpose: parsed(row, "purpose")?,
        uploaded_at: timestamp(row, "uploaded_at")?,
    })
}

fn push_issue_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &IssueFilter) {
    builder.push(" where 1 = 1");
    if let Some(status) = filter.status {
        builder.push(" and status = ").push_bind(status.as_str());
    }
    if let Some(priority) = filter.priority {
        builder.push(" and priority = ").push_bind(priority.as_str());
    }
    if let Some(category) = filter.category {
        builder.push(" and category = ").push_bind(category.as_str());
    }
    if let Some(machine) = filter.machine_id_ref.clone() {
        builder.push(" and machine_id_ref = ").push_bind(machine);
    }
    if let Some(department) = filter.department_id.clone() {
        builder
            .push(" and starts_with(machine_id_ref, ")
            .push_bind(department)
            .push(")");
    }
    if let Some(is_runnable) = filter.is_runnable {
        builder.push(" and is_runnable = ").push_bind(is_runnable);
    }
    if let Some(after) = filter.created_after {
        builder.push(" and created_at >= ").push_bind(after);
    }
    if let Some(search) = filter.search.as_deref() {
        let pattern = format!("%{}%", search.replace('%', "\\%").replace('_', "\\_"));
        builder
            .push(" and (auto_title ilike ")
            .push_bind(pattern.clone())
            .push(" or description ilike ")
            .push_bind(pattern.clone())
            .push(" or alarm_code ilike ")
            .push_bind(pattern)
            .push(")");
    }
}

/// 版本校验更新故障单，并写入关闭的停机区间；由调用方提交事务。
async fn write_issue(
    conn: &mut PgConnection,
    record: &IssueRecord,
    expected_version: i64,
    closed_episode: Option<DowntimeEpisodeRecord>,
) -> Result<IssueRecord, StorageError> {
    let row = sqlx::query(&format!(
        "update issues set machine_id_ref = $3, category = $4, priority = $5, status = $6, \
         alarm_code = $7, description = $8, ai_summary = $9, auto_title = $10, \
         is_runnable = $11, reported_by = $12, downtime_start = $13, downtime_end = $14, \
         updated_at = $15, version = version + 1 \
         where issue_id = $1 and version = $2 returning {ISSUE_COLUMNS}"
    ))
    .bind(&record.issue_id)
    .bind(expected_version)
    .bind(record.machine_id_ref.as_str())
    .bind(record.category.as_str())
    .bind(record.priority.as_str())
    .bind(record.status.as_str())
    .bind(&record.alarm_code)
    .bind(&record.description)
    .bind(&record.ai_summary)
    .bind(&record.auto_title)
    .bind(record.is_runnable)
    .bind(&record.reported_by)
    .bind(record.downtime_start)
    .bind(record.downtime_end)
    .bind(record.updated_at)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        let exists: Option<i64> = sqlx::query_scalar("select version from issues where issue_id = $1")
            .bind(&record.issue_id)
            .fetch_optional(&mut *conn)
            .await?;
        return Err(match exists {
            Some(_) => StorageError::conflict("issue was modified concurrently"),
            None => StorageError::not_found("issue not found"),
        });
    };

    if let Some(episode) = closed_episode {
        sqlx::query(
            "insert into downtime_episodes (issue_id, started_at, ended_at) values ($1, $2, $3)",
        )
        .bind(&episode.issue_id)
        .bind(episode.started_at)
        .bind(episode.ended_at)
        .execute(&mut *conn)
        .await?;
    }
    issue_from_row(&row)
}

#[async_trait::async_trait]
impl IssueStore for PgIssueStore {
    async fn list_issues(&self, filter: &IssueFilter) -> Result<Vec<IssueRecord>, StorageError> {
        let mut builder: QueryBuilder<'_, Postgres> =
            QueryBuilder::new(format!("select {ISSUE_COLUMNS} from issues"));
        push_issue_filter(&mut builder, filter);
        builder.push(" order by created_at desc");
        if let Some(limit) = filter.limit.filter(|limit| *limit > 0) {
            builder.push(" limit ").push_bind(limit);
        }
        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(issue_from_row).collect()
    }

    async fn find_issue(&self, issue_id: &str) -> Result<Option<IssueRecord>, StorageError> {
        let row = sqlx::query(&format!("select {ISSUE_COLUMNS} from issues where issue_id = $1"))
            .bind(issue_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(issue_from_row).transpose()
    }

    async fn create_issue(&self, record: IssueRecord) -> Result<IssueRecord, StorageError> {
        let row = sqlx::query(&format!(
            "insert into issues (issue_id, machine_id_ref, category, priority, status, alarm_code, \
             description, ai_summary, auto_title, is_runnable, reported_by, downtime_start, \
             downtime_end, created_at, updated_at, version) \
             values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) \
             returning {ISSUE_COLUMNS}"
        ))
        .bind(&record.issue_id)
        .bind(record.machine_id_ref.as_str())
        .bind(record.category.as_str())
        .bind(record.priority.as_str())
        .bind(record.status.as_str())
        .bind(&record.alarm_code)
        .bind(&record.description)
        .bind(&record.ai_summary)
        .bind(&record.auto_title)
        .bind(record.is_runnable)
        .bind(&record.reported_by)
        .bind(record.downtime_start)
        .bind(record.downtime_end)
        .bind(record.created_at)
        .bind(record.updated_at)
        .bind(record.version)
        .fetch_one(&self.pool)
        .await?;
        issue_from_row(&row)
    }

    async fn update_issue(
        &self,
        record: IssueRecord,
        expected_version: i64,
        closed_episode: Option<DowntimeEpisodeRecord>,
    ) -> Result<IssueRecord, StorageError> {
        let mut tx = self.pool.begin().await?;
        let updated = write_issue(&mut *tx, &record, expected_version, closed_episode).await?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn delete_issue(&self, issue_id: &str) -> Result<bool, StorageError> {
        let result = sqlx::query("delete from issues where issue_id = $1")
            .bind(issue_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_downtime_episodes(
        &self,
        issue_id: &str,
    ) -> Result<Vec<DowntimeEpisodeRecord>, StorageError> {
        let rows = sqlx::query(
            "select issue_id, started_at, ended_at from downtime_episodes \
             where issue_id = $1 order by started_at asc",
        )
        .bind(issue_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| {
                Ok(DowntimeEpisodeRecord {
                    issue_id: row.try_get("issue_id")?,
                    started_at: timestamp(row, "started_at")?,
                    ended_at: timestamp(row, "ended_at")?,
                })
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl RemedyStore for PgIssueStore {
    async fn list_remedies(&self, issue_id: &str) -> Result<Vec<RemedyRecord>, StorageError> {
        let rows = sqlx::query(&format!(
            "select {REMEDY_COLUMNS} from remedies where issue_id = $1 order by created_at asc"
        ))
        .bind(issue_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(remedy_from_row).collect()
    }

    async fn list_remedies_for_issues(
        &self,
        issue_ids: &[String],
    ) -> Result<Vec<RemedyRecord>, StorageError> {
        if issue_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(&format!(
            "select {REMEDY_COLUMNS} from remedies where issue_id = any($1) order by created_at asc"
        ))
        .bind(issue_ids)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(remedy_from_row).collect()
    }

    async fn find_remedy(&self, remedy_id: &str) -> Result<Option<RemedyRecord>, StorageError> {
        let row = sqlx::query(&format!(
            "select {REMEDY_COLUMNS} from remedies where remedy_id = $1"
        ))
        .bind(remedy_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(remedy_from_row).transpose()
    }

    async fn record_remedy(
        &self,
        remedy: RemedyRecord,
        issue: IssueRecord,
        expected_version: i64,
        closed_episode: Option<DowntimeEpisodeRecord>,
    ) -> Result<(IssueRecord, RemedyRecord), StorageError> {
        if remedy.issue_id != issue.issue_id {
            return Err(StorageError::invalid("remedy belongs to another issue"));
        }
        let mut tx = self.pool.begin().await?;
        let issue = write_issue(&mut *tx, &issue, expected_version, closed_episode).await?;
        let row = sqlx::query(&format!(
            "insert into remedies (remedy_id, issue_id, description, technician_name, is_external, \
             phone_number, is_machine_runnable, parts_purchased, labor_cost, parts_cost, total_cost, \
             created_at, updated_at) \
             values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             returning {REMEDY_COLUMNS}"
        ))
        .bind(&remedy.remedy_id)
        .bind(&remedy.issue_id)
        .bind(&remedy.description)
        .bind(&remedy.technician_name)
        .bind(remedy.is_external)
        .bind(&remedy.phone_number)
        .bind(remedy.is_machine_runnable)
        .bind(&remedy.parts_purchased)
        .bind(remedy.labor_cost)
        .bind(remedy.parts_cost)
        .bind(remedy.total_cost)
        .bind(remedy.created_at)
        .bind(remedy.updated_at)
        .fetch_one(&mut *tx)
        .await?;
        let remedy = remedy_from_row(&row)?;
        tx.commit().await?;
        Ok((issue, remedy))
    }

    async fn update_remedy(
        &self,
        record: RemedyRecord,
    ) -> Result<Option<RemedyRecord>, StorageError> {
        let row = sqlx::query(&format!(
            "update remedies set description = $2, technician_name = $3, is_external = $4, \
             phone_number = $5, is_machine_runnable = $6, parts_purchased = $7, labor_cost = $8, \
             parts_cost = $9, total_cost = $10, updated_at = $11 \
             where remedy_id = $1 returning {REMEDY_COLUMNS}"
        ))
        .bind(&record.remedy_id)
        .bind(&record.description)
        .bind(&record.technician_name)
        .bind(record.is_external)
        .bind(&record.phone_number)
        .bind(record.is_machine_runnable)
        .bind(&record.parts_purchased)
        .bind(record.labor_cost)
        .bind(record.parts_cost)
        .bind(record.total_cost)
        .bind(record.updated_at)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(remedy_from_row).transpose()
    }

    async fn delete_remedy(&self, remedy_id: &str) -> Result<bool, StorageError> {
        let result = sqlx::query("delete from remedies where remedy_id = $1")
            .bind(remedy_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait::async_trait]
impl AttachmentStore for PgIssueStore {
    async fn list_attachments(
        &self,
        parent: &AttachmentParent,
    ) -> Result<Vec<AttachmentRecord>, StorageError> {
        let rows = match parent {
            AttachmentParent::Issue(issue_id) => {
                sqlx::query(&format!(
                    "select {ATTACHMENT_COLUMNS} from attachments where issue_id = $1 \
                     order by uploaded_at desc"
                ))
                .bind(issue_id)
                .fetch_all(&self.pool)
                .await?
            }
            AttachmentParent::Remedy(remedy_id) => {
                sqlx::query(&format!(
                    "select {ATTACHMENT_COLUMNS} from attachments where remedy_id = $1 \
                     order by uploaded_at desc"
                ))
                .bind(remedy_id)
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.iter().map(attachment_from_row).collect()
    }

    async fn count_attachments(&self, parent: &AttachmentParent) -> Result<i64, StorageError> {
        let count: i64 = match parent {
            AttachmentParent::Issue(issue_id) => {
                sqlx::query_scalar("select count(*) from attachments where issue_id = $1")
                    .bind(issue_id)
                    .fetch_one(&self.pool)
                    .await?
            }
            AttachmentParent::Remedy(remedy_id) => {
                sqlx::query_scalar("select count(*) from attachments where remedy_id = $1")
                    .bind(remedy_id)
                    .fetch_one(&self.pool)
                    .await?
            }
        };
        Ok(count)
    }

    async fn find_attachment(
        &self,
        attachment_id: &str,
    ) -> Result<Option<AttachmentRecord>, StorageError> {
        let row = sqlx::query(&format!(
            "select {ATTACHMENT_COLUMNS} from attachments where attachment_id = $1"
        ))
        .bind(attachment_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(attachment_from_row).transpose()
    }

    async fn create_attachment(
        &self,
        record: AttachmentRecord,
        max_per_parent: i32,
    ) -> Result<AttachmentRecord, StorageError> {
        let mut tx = self.pool.begin().await?;
        // 锁住父记录，串行化同一父对象的并发上传
        let (lock_sql, count_sql, parent_id) = match &record.parent {
            AttachmentParent::Issue(id) => (
                "select issue_id from issues where issue_id = $1 for update",
                "select count(*) from attachments where issue_id = $1",
                id,
            ),
            AttachmentParent::Remedy(id) => (
                "select remedy_id from remedies where remedy_id = $1 for update",
                "select count(*) from attachments where remedy_id = $1",
                id,
            ),
        };
        let parent: Option<String> = sqlx::query_scalar(lock_sql)
            .bind(parent_id)
            .fetch_optional(&mut *tx)
            .await?;
        if parent.is_none() {
            return Err(StorageError::not_found("attachment parent not found"));
        }
        let existing: i64 = sqlx::query_scalar(count_sql)
            .bind(parent_id)
            .fetch_one(&mut *tx)
            .await?;
        if existing >= i64::from(max_per_parent) {
            return Err(StorageError::invalid(format!(
                "attachment limit reached ({max_per_parent})"
            )));
        }

        let row = sqlx::query(&format!(
            "insert into attachments (attachment_id, issue_id, remedy_id, file_path, file_name, \
             file_size, file_type, purpose, uploaded_at) \
             values ($1, $2, $3, $4, $5, $6, $7, $8, $9) returning {ATTACHMENT_COLUMNS}"
        ))
        .bind(&record.attachment_id)
        .bind(record.parent.issue_id())
        .bind(record.parent.remedy_id())
        .bind(&record.file_path)
        .bind(&record.file_name)
        .bind(record.file_size)
        .bind(record.file_type.as_str())
        .bind(record.purpose.as_str())
        .bind(record.uploaded_at)
        .fetch_one(&mut *tx)
        .await?;
        let created = attachment_from_row(&row)?;
        tx.commit().await?;
        Ok(created)
    }

    async fn delete_attachment(&self, attachment_id: &str) -> Result<bool, StorageError> {
        let result = sqlx::query("delete from attachments where attachment_id = $1")
            .bind(attachment_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
