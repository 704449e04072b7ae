//! In-memory backend
//!
//! Keeps the whole tree in a map. Used by tests and by `bf` sessions that
//! don't need persistence.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use bytes::Bytes;

use crate::backend::{Backend, Bucket, Entry, Object, Resource};
use crate::error::{BackendError, BackendResult};
use crate::resource::ResourceId;

#[derive(Debug, Clone)]
enum Node {
    Bucket,
    Object(Bytes),
}

/// Backend storing buckets and objects in process memory
///
/// `/` (and `.` for relative trees) is always a bucket. Creating a bucket
/// creates its missing ancestors.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    nodes: RwLock<BTreeMap<ResourceId, Node>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn nodes(&self) -> RwLockReadGuard<'_, BTreeMap<ResourceId, Node>> {
        self.nodes.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn nodes_mut(&self) -> RwLockWriteGuard<'_, BTreeMap<ResourceId, Node>> {
        self.nodes.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn bucket_exists(nodes: &BTreeMap<ResourceId, Node>, id: &ResourceId) -> bool {
        id.is_top() || matches!(nodes.get(id), Some(Node::Bucket))
    }

    fn children<'a>(
        nodes: &'a BTreeMap<ResourceId, Node>,
        id: &'a ResourceId,
    ) -> impl Iterator<Item = (&'a ResourceId, &'a Node)> + 'a {
        nodes
            .iter()
            .filter(move |(child, _)| !child.is_top() && child.parent() == *id)
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    type Bucket = Bucket;
    type Object = Object;

    fn is_local(&self) -> bool {
        true
    }

    async fn is_bucket(&self, id: &ResourceId) -> bool {
        Self::bucket_exists(&self.nodes(), id)
    }

    async fn is_object(&self, id: &ResourceId) -> bool {
        matches!(self.nodes().get(id), Some(Node::Object(_)))
    }

    async fn create_bucket(&self, bucket: &Bucket) -> BackendResult<()> {
        let id = bucket.id();
        if id.is_top() {
            return Ok(());
        }

        let mut lineage = vec![id.clone()];
        let mut current = id.parent();
        while !current.is_top() {
            lineage.push(current.clone());
            current = current.parent();
        }

        let mut nodes = self.nodes_mut();
        for ancestor in lineage.iter().rev() {
            if let Some(Node::Object(_)) = nodes.get(ancestor) {
                return Err(BackendError::Conflict(format!(
                    "{ancestor} already exists as an object"
                )));
            }
        }
        for ancestor in lineage {
            nodes.entry(ancestor).or_insert(Node::Bucket);
        }
        Ok(())
    }

    async fn read_bucket(&self, bucket: &Bucket) -> BackendResult<Vec<Entry>> {
        let id = bucket.id();
        let nodes = self.nodes();
        if !Self::bucket_exists(&nodes, id) {
            return Err(BackendError::NotFound(id.to_string()));
        }

        Ok(Self::children(&nodes, id)
            .map(|(child, node)| match node {
                Node::Bucket => Entry::bucket(child.clone()),
                Node::Object(data) => Entry::object(child.clone(), data.len() as u64),
            })
            .collect())
    }

    async fn delete_bucket(&self, bucket: &Bucket) -> BackendResult<()> {
        let id = bucket.id();
        if id.is_top() {
            return Err(BackendError::Conflict(format!(
                "cannot delete top-level bucket {id}"
            )));
        }

        let mut nodes = self.nodes_mut();
        if !matches!(nodes.get(id), Some(Node::Bucket)) {
            return Err(BackendError::NotFound(id.to_string()));
        }
        if Self::children(&nodes, id).next().is_some() {
            return Err(BackendError::Conflict(format!("bucket {id} is not empty")));
        }
        nodes.remove(id);
        Ok(())
    }

    async fn create_object(&self, object: &Object, value: Bytes) -> BackendResult<()> {
        let id = object.id();
        let mut nodes = self.nodes_mut();
        if Self::bucket_exists(&nodes, id) {
            return Err(BackendError::Conflict(format!("{id} is a bucket")));
        }
        if !Self::bucket_exists(&nodes, &id.parent()) {
            return Err(BackendError::NotFound(id.parent().to_string()));
        }
        nodes.insert(id.clone(), Node::Object(value));
        Ok(())
    }

    async fn read_object(&self, object: &Object) -> BackendResult<Bytes> {
        match self.nodes().get(object.id()) {
            Some(Node::Object(data)) => Ok(data.clone()),
            _ => Err(BackendError::NotFound(object.id().to_string())),
        }
    }

    async fn delete_object(&self, object: &Object) -> BackendResult<()> {
        let id = object.id();
        let mut nodes = self.nodes_mut();
        if !matches!(nodes.get(id), Some(Node::Object(_))) {
            return Err(BackendError::NotFound(id.to_string()));
        }
        nodes.remove(id);
        Ok(())
    }
}
