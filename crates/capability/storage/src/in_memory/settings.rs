//! 全局设置内存存储

use crate::error::StorageError;
use crate::models::{GlobalSettingsRecord, GlobalSettingsUpdate};
use crate::traits::SettingsStore;
use std::sync::RwLock;

#[derive(Default)]
pub struct InMemorySettingsStore {
    settings: RwLock<Option<GlobalSettingsRecord>>,
}

impl InMemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl SettingsStore for InMemorySettingsStore {
    async fn load_settings(&self) -> Result<GlobalSettingsRecord, StorageError> {
        let mut settings = self
            .settings
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(settings
            .get_or_insert_with(|| GlobalSettingsRecord::defaults(domain::time::now_utc()))
            .clone())
    }

    async fn update_settings(
        &self,
        update: GlobalSettingsUpdate,
    ) -> Result<GlobalSettingsRecord, StorageError> {
        let mut settings = self
            .settings
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let now = domain::time::now_utc();
        let record = settings.get_or_insert_with(|| GlobalSettingsRecord::defaults(now));
        update.apply_to(record, now);
        Ok(record.clone())
    }
}
