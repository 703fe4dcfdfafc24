//! 维修业务错误。

use logbook_storage::{StorageError, StorageErrorKind};

#[derive(Debug, thiserror::Error)]
pub enum MaintenanceError {
    #[error("{0}")]
    Invalid(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    /// 可重试：故障单已被其他请求修改。
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("file processing timed out")]
    Timeout,
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<StorageError> for MaintenanceError {
    fn from(err: StorageError) -> Self {
        match err.kind() {
            StorageErrorKind::Conflict => MaintenanceError::Conflict(err.message().to_string()),
            StorageErrorKind::Invalid => MaintenanceError::Invalid(err.message().to_string()),
            StorageErrorKind::NotFound => MaintenanceError::NotFound("record"),
            StorageErrorKind::Backend => MaintenanceError::Storage(err.message().to_string()),
        }
    }
}
