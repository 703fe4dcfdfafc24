//! 时间戳规范化
//!
//! 领域内的时间一律为 UTC。存储层读到不带时区的旧数据时，
//! 按 UTC 解释后再参与计算。

use chrono::{DateTime, NaiveDateTime, Utc};

pub fn now_utc() -> DateTime<Utc> {
    Utc::now()
}

/// 不带时区的时间戳按 UTC 解释。
pub fn assume_utc(value: NaiveDateTime) -> DateTime<Utc> {
    value.and_utc()
}
