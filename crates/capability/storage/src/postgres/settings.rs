//! Postgres 全局设置存储
//!
//! 单例行（id = 1）通过 `insert ... on conflict do nothing` 原子创建。

use crate::error::StorageError;
use crate::models::{GlobalSettingsRecord, GlobalSettingsUpdate};
use crate::postgres::rows::timestamp;
use crate::traits::SettingsStore;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

pub struct PgSettingsStore {
    pub pool: PgPool,
}

impl PgSettingsStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn ensure_row(&self) -> Result<(), StorageError> {
        sqlx::query("insert into global_settings (id) values (1) on conflict (id) do nothing")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

const SETTINGS_COLUMNS: &str = "max_update_text_length, max_attachments_per_issue, \
     max_attachments_per_remedy, max_video_resolution_height, max_video_quality_crf, \
     max_file_size_mb, updated_by, updated_at";

fn settings_from_row(row: &PgRow) -> Result<GlobalSettingsRecord, StorageError> {
    Ok(GlobalSettingsRecord {
        max_update_text_length: row.try_get("max_update_text_length")?,
        max_attachments_per_issue: row.try_get("max_attachments_per_issue")?,
        max_attachments_per_remedy: row.try_get("max_attachments_per_remedy")?,
        max_video_resolution_height: row.try_get("max_video_resolution_height")?,
        max_video_quality_crf: row.try_get("max_video_quality_crf")?,
        max_file_size_mb: row.try_get("max_file_size_mb")?,
        updated_by: row.try_get("updated_by")?,
        updated_at: timestamp(row, "updated_at")?,
    })
}

#[async_trait::async_trait]
impl SettingsStore for PgSettingsStore {
    async fn load_settings(&self) -> Result<GlobalSettingsRecord, StorageError> {
        self.ensure_row().await?;
        let row = sqlx::query(&format!(
            "select {SETTINGS_COLUMNS} from global_settings where id = 1"
        ))
        .fetch_one(&self.pool)
        .await?;
        settings_from_row(&row)
    }

    async fn update_settings(
        &self,
        update: GlobalSettingsUpdate,
    ) -> Result<GlobalSettingsRecord, StorageError> {
        self.ensure_row().await?;
        let row = sqlx::query(&format!(
            "update global_settings set \
             max_update_text_length = coalesce($1, max_update_text_length), \
             max_attachments_per_issue = coalesce($2, max_attachments_per_issue), \
             max_attachments_per_remedy = coalesce($3, max_attachments_per_remedy), \
             max_video_resolution_height = coalesce($4, max_video_resolution_height), \
             max_video_quality_crf = coalesce($5, max_video_quality_crf), \
             max_file_size_mb = coalesce($6, max_file_size_mb), \
             updated_by = $7, updated_at = now() \
             where id = 1 returning {SETTINGS_COLUMNS}"
        ))
        .bind(update.max_update_text_length)
        .bind(update.max_attachments_per_issue)
        .bind(update.max_attachments_per_remedy)
        .bind(update.max_video_resolution_height)
        .bind(update.max_video_quality_crf)
        .bind(update.max_file_size_mb)
        .bind(&update.updated_by)
        .fetch_one(&self.pool)
        .await?;
        settings_from_row(&row)
    }
}
