//! 附件文件存储
//!
//! 附件本体与附件记录分开保存：先写文件并落盘，再写记录；
//! 记录写入失败时由调用方删除文件。

use crate::error::StorageError;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::RwLock;
use tokio::io::AsyncWriteExt;

#[async_trait::async_trait]
pub trait FileStore: Send + Sync {
    /// 写入文件并在返回前完成 fsync。
    async fn put(&self, relative_path: &str, bytes: &[u8]) -> Result<(), StorageError>;

    /// 删除文件，返回文件之前是否存在。
    async fn remove(&self, relative_path: &str) -> Result<bool, StorageError>;
}

/// 相对路径不得为绝对路径或包含 `..`。
fn checked_relative(relative_path: &str) -> Result<&Path, StorageError> {
    let path = Path::new(relative_path);
    let valid = !relative_path.is_empty()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
    if !valid {
        return Err(StorageError::invalid("invalid file path"));
    }
    Ok(path)
}

/// 本地磁盘存储，路径相对于媒体根目录。
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait::async_trait]
impl FileStore for LocalFileStore {
    async fn put(&self, relative_path: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.root.join(checked_relative(relative_path)?);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(&path).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        Ok(())
    }

    async fn remove(&self, relative_path: &str) -> Result<bool, StorageError> {
        let path = self.root.join(checked_relative(relative_path)?);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

/// 内存文件存储（测试用）。
#[derive(Default)]
pub struct InMemoryFileStore {
    files: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, relative_path: &str) -> bool {
        self.files
            .read()
            .map(|files| files.contains_key(relative_path))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.files.read().map(|files| files.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl FileStore for InMemoryFileStore {
    async fn put(&self, relative_path: &str, bytes: &[u8]) -> Result<(), StorageError> {
        checked_relative(relative_path)?;
        let mut files = self
            .files
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        files.insert(relative_path.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn remove(&self, relative_path: &str) -> Result<bool, StorageError> {
        let mut files = self
            .files
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(files.remove(relative_path).is_some())
    }
}
