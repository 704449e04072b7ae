//! Local filesystem backend
//!
//! Buckets are directories and objects are files under a base directory.
//! The id `/data/a.txt` lives at `<base>/data/a.txt`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;

use crate::backend::{Backend, Bucket, Entry, Object, Resource};
use crate::error::{BackendError, BackendResult};
use crate::resource::ResourceId;

/// Backend mapping the tree onto a local directory
#[derive(Debug, Clone)]
pub struct LocalBackend {
    base: PathBuf,
}

impl LocalBackend {
    /// Use an existing base directory
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Use `base`, creating it if needed
    pub async fn open(base: impl Into<PathBuf>) -> BackendResult<Self> {
        let base = base.into();
        tokio::fs::create_dir_all(&base).await?;
        Ok(Self { base })
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Filesystem path for `id`; `None` for ids that climb out of the base
    fn path_of(&self, id: &ResourceId) -> Option<PathBuf> {
        let relative = id.as_str().trim_start_matches('/');
        if relative.split('/').any(|segment| segment == "..") {
            return None;
        }
        Some(self.base.join(relative))
    }

    fn require_path(&self, id: &ResourceId) -> BackendResult<PathBuf> {
        self.path_of(id).ok_or_else(|| {
            BackendError::Other(format!("{id} is outside of {}", self.base.display()))
        })
    }

    async fn is_dir(path: &Path) -> bool {
        tokio::fs::metadata(path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    async fn is_file(path: &Path) -> bool {
        tokio::fs::metadata(path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }
}

fn io_error(id: &ResourceId, error: std::io::Error) -> BackendError {
    match error.kind() {
        ErrorKind::NotFound => BackendError::NotFound(id.to_string()),
        ErrorKind::DirectoryNotEmpty => BackendError::Conflict(format!("bucket {id} is not empty")),
        _ => BackendError::Io(error),
    }
}

#[async_trait]
impl Backend for LocalBackend {
    type Bucket = Bucket;
    type Object = Object;

    fn is_local(&self) -> bool {
        true
    }

    async fn is_bucket(&self, id: &ResourceId) -> bool {
        match self.path_of(id) {
            Some(path) => Self::is_dir(&path).await,
            None => false,
        }
    }

    async fn is_object(&self, id: &ResourceId) -> bool {
        match self.path_of(id) {
            Some(path) => Self::is_file(&path).await,
            None => false,
        }
    }

    async fn create_bucket(&self, bucket: &Bucket) -> BackendResult<()> {
        let id = bucket.id();
        let path = self.require_path(id)?;
        if Self::is_file(&path).await {
            return Err(BackendError::Conflict(format!(
                "{id} already exists as an object"
            )));
        }
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|e| io_error(id, e))
    }

    async fn read_bucket(&self, bucket: &Bucket) -> BackendResult<Vec<Entry>> {
        let id = bucket.id();
        let path = self.require_path(id)?;
        if !Self::is_dir(&path).await {
            return Err(BackendError::NotFound(id.to_string()));
        }

        let mut entries = Vec::new();
        let mut dir = tokio::fs::read_dir(&path)
            .await
            .map_err(|e| io_error(id, e))?;
        while let Some(child) = dir.next_entry().await? {
            let name = child.file_name();
            let child_id = ResourceId::new(format!("{id}/{}", name.to_string_lossy()));
            let metadata = child.metadata().await?;
            if metadata.is_dir() {
                entries.push(Entry::bucket(child_id));
            } else if metadata.is_file() {
                entries.push(Entry::object(child_id, metadata.len()));
            }
        }

        entries.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(entries)
    }

    async fn delete_bucket(&self, bucket: &Bucket) -> BackendResult<()> {
        let id = bucket.id();
        if id.is_top() {
            return Err(BackendError::Conflict(format!(
                "cannot delete top-level bucket {id}"
            )));
        }
        let path = self.require_path(id)?;
        if !Self::is_dir(&path).await {
            return Err(BackendError::NotFound(id.to_string()));
        }
        tokio::fs::remove_dir(&path)
            .await
            .map_err(|e| io_error(id, e))
    }

    async fn create_object(&self, object: &Object, value: Bytes) -> BackendResult<()> {
        let id = object.id();
        let path = self.require_path(id)?;
        if Self::is_dir(&path).await {
            return Err(BackendError::Conflict(format!("{id} is a bucket")));
        }
        tokio::fs::write(&path, &value)
            .await
            .map_err(|e| io_error(&id.parent(), e))
    }

    async fn read_object(&self, object: &Object) -> BackendResult<Bytes> {
        let id = object.id();
        let path = self.require_path(id)?;
        if !Self::is_file(&path).await {
            return Err(BackendError::NotFound(id.to_string()));
        }
        let data = tokio::fs::read(&path).await.map_err(|e| io_error(id, e))?;
        Ok(Bytes::from(data))
    }

    async fn delete_object(&self, object: &Object) -> BackendResult<()> {
        let id = object.id();
        let path = self.require_path(id)?;
        if !Self::is_file(&path).await {
            return Err(BackendError::NotFound(id.to_string()));
        }
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| io_error(id, e))
    }
}
