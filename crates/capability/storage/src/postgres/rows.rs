//! 行解码辅助函数

use crate::error::StorageError;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::Row;
use sqlx::postgres::PgRow;
use std::str::FromStr;

/// 读取时间戳列；旧数据可能是不带时区的 `timestamp`，按 UTC 解释。
pub(crate) fn timestamp(row: &PgRow, column: &str) -> Result<DateTime<Utc>, StorageError> {
    optional_timestamp(row, column)?
        .ok_or_else(|| StorageError::new(format!("{column} is null")))
}

pub(crate) fn optional_timestamp(
    row: &PgRow,
    column: &str,
) -> Result<Option<DateTime<Utc>>, StorageError> {
    match row.try_get::<Option<DateTime<Utc>>, _>(column) {
        Ok(value) => Ok(value),
        Err(_) => {
            let naive: Option<NaiveDateTime> = row.try_get(column)?;
            Ok(naive.map(domain::time::assume_utc))
        }
    }
}

/// 读取字符串列并解析为领域枚举。
pub(crate) fn parsed<T>(row: &PgRow, column: &str) -> Result<T, StorageError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw: String = row.try_get(column)?;
    raw.parse::<T>()
        .map_err(|err| StorageError::new(format!("invalid {column}: {err}")))
}
