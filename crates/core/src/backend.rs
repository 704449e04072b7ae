//! Backend contract
//!
//! A backend is the storage medium behind a [`Store`](crate::Store). It
//! declares one concrete representation per resource kind and implements
//! create/read/delete for each, plus kind probes. The store only talks to
//! backends through this trait.

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::BackendResult;
use crate::resource::ResourceId;

/// A backend's concrete representation of a bucket or an object
pub trait Resource: From<ResourceId> + fmt::Debug + Send + Sync + 'static {
    /// Identifier this handle was built from
    fn id(&self) -> &ResourceId;
}

/// Generic bucket marker for backends that need nothing beyond the id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket(ResourceId);

impl From<ResourceId> for Bucket {
    fn from(id: ResourceId) -> Self {
        Self(id)
    }
}

impl Resource for Bucket {
    fn id(&self) -> &ResourceId {
        &self.0
    }
}

/// Generic object marker for backends that need nothing beyond the id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Object(ResourceId);

impl From<ResourceId> for Object {
    fn from(id: ResourceId) -> Self {
        Self(id)
    }
}

impl Resource for Object {
    fn id(&self) -> &ResourceId {
        &self.0
    }
}

/// Kind of a listing entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Bucket,
    Object,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::Bucket => write!(f, "bucket"),
            EntryKind::Object => write!(f, "object"),
        }
    }
}

/// One row of a bucket listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: ResourceId,
    pub kind: EntryKind,
    /// Object size in bytes, when the backend knows it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
}

impl Entry {
    pub fn bucket(id: ResourceId) -> Self {
        Self {
            id,
            kind: EntryKind::Bucket,
            size_bytes: None,
        }
    }

    pub fn object(id: ResourceId, size_bytes: u64) -> Self {
        Self {
            id,
            kind: EntryKind::Object,
            size_bytes: Some(size_bytes),
        }
    }

    pub fn is_bucket(&self) -> bool {
        self.kind == EntryKind::Bucket
    }
}

/// Symbolic resource kind used by permission dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Bucket,
    Object,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Bucket => write!(f, "bucket"),
            ResourceKind::Object => write!(f, "object"),
        }
    }
}

impl std::str::FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bucket" => Ok(ResourceKind::Bucket),
            "object" => Ok(ResourceKind::Object),
            _ => Err(format!("Invalid resource kind: {s}")),
        }
    }
}

/// The concrete type a backend declared for one resource kind
///
/// Used as the key of type-scoped permissions. Equality follows the
/// underlying [`TypeId`]; the name is kept for display.
#[derive(Debug, Clone, Copy)]
pub struct ResourceType {
    id: TypeId,
    name: &'static str,
}

impl ResourceType {
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for ResourceType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ResourceType {}

impl Hash for ResourceType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Storage medium behind a store
///
/// Implementations own persistence and any per-resource concurrency
/// control. Timeouts and retries are the backend's business too.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Concrete bucket representation
    type Bucket: Resource;

    /// Concrete object representation
    type Object: Resource;

    /// Whether the medium lives on this machine
    fn is_local(&self) -> bool;

    /// Probe whether `id` currently denotes a bucket
    async fn is_bucket(&self, id: &ResourceId) -> bool;

    /// Probe whether `id` currently denotes an object
    async fn is_object(&self, id: &ResourceId) -> bool;

    async fn create_bucket(&self, bucket: &Self::Bucket) -> BackendResult<()>;

    /// List the direct children of a bucket
    async fn read_bucket(&self, bucket: &Self::Bucket) -> BackendResult<Vec<Entry>>;

    async fn delete_bucket(&self, bucket: &Self::Bucket) -> BackendResult<()>;

    async fn create_object(&self, object: &Self::Object, value: Bytes) -> BackendResult<()>;

    async fn read_object(&self, object: &Self::Object) -> BackendResult<Bytes>;

    async fn delete_object(&self, object: &Self::Object) -> BackendResult<()>;
}
