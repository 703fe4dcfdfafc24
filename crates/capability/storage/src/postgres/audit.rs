//! Postgres 审计日志存储

use crate::error::StorageError;
use crate::models::{AuditLogQuery, AuditLogRecord};
use crate::postgres::rows::{parsed, timestamp};
use crate::traits::AuditLogStore;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};

pub struct PgAuditLogStore {
    pub pool: PgPool,
}

impl PgAuditLogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl AuditLogStore for PgAuditLogStore {
    async fn create_audit_log(
        &self,
        record: AuditLogRecord,
    ) -> Result<AuditLogRecord, StorageError> {
        sqlx::query(
            "insert into audit_logs (audit_id, action, description, user_id, username, issue_id, \
             remedy_id, ip_address, user_agent, metadata, created_at) \
             values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(&record.audit_id)
        .bind(record.action.as_str())
        .bind(&record.description)
        .bind(&record.user_id)
        .bind(&record.username)
        .bind(&record.issue_id)
        .bind(&record.remedy_id)
        .bind(&record.ip_address)
        .bind(&record.user_agent)
        .bind(Json(&record.metadata))
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;
        Ok(record)
    }

    async fn list_audit_logs(
        &self,
        query: &AuditLogQuery,
    ) -> Result<Vec<AuditLogRecord>, StorageError> {
        let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new(
            "select audit_id, action, description, user_id, username, issue_id, remedy_id, \
             ip_address, user_agent, metadata, created_at from audit_logs where 1 = 1",
        );
        if let Some(issue_id) = query.issue_id.clone() {
            builder.push(" and issue_id = ").push_bind(issue_id);
        }
        if let Some(action) = query.action {
            builder.push(" and action = ").push_bind(action.as_str());
        }
        if let Some(user_id) = query.user_id.clone() {
            builder.push(" and user_id = ").push_bind(user_id);
        }
        builder.push(" order by created_at desc");
        if query.limit > 0 {
            builder.push(" limit ").push_bind(query.limit);
        }
        let rows = builder.build().fetch_all(&self.pool).await?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let Json(metadata): Json<serde_json::Value> = row.try_get("metadata")?;
            items.push(AuditLogRecord {
                audit_id: row.try_get("audit_id")?,
                action: parsed(&row, "action")?,
                description: row.try_get("description")?,
                user_id: row.try_get("user_id")?,
                username: row.try_get("username")?,
                issue_id: row.try_get("issue_id")?,
                remedy_id: row.try_get("remedy_id")?,
                ip_address: row.try_get("ip_address")?,
                user_agent: row.try_get("user_agent")?,
                metadata,
                created_at: timestamp(&row, "created_at")?,
            });
        }
        Ok(items)
    }
}
