//! Bucket and object handles for the S3 backend
//!
//! The whole tree lives in one physical bucket. A resource id maps to a key
//! by dropping the leading `/`; a bucket is recorded as a zero-length marker
//! object whose key ends in `/`.

use bf_core::{Resource, ResourceId};

/// Key for `id` inside the physical bucket
pub fn key_of(id: &ResourceId) -> String {
    if id.is_top() {
        return String::new();
    }
    id.as_str().trim_start_matches('/').to_string()
}

/// A bucket handle: the id plus the key prefix its children share
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Bucket {
    id: ResourceId,
    prefix: String,
}

impl S3Bucket {
    /// Listing prefix; empty for the top-level bucket
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Key of the marker object, `None` for the top-level bucket
    pub fn marker(&self) -> Option<&str> {
        if self.prefix.is_empty() {
            None
        } else {
            Some(&self.prefix)
        }
    }

    /// Id of the direct child whose key is `key`
    ///
    /// `key` must start with this bucket's prefix. A trailing `/` (common
    /// prefixes, markers) is ignored.
    pub fn child_id(&self, key: &str) -> Option<ResourceId> {
        let name = key.strip_prefix(&self.prefix)?.trim_end_matches('/');
        if name.is_empty() || name.contains('/') {
            return None;
        }
        Some(ResourceId::new(format!("{}/{name}", self.id)))
    }
}

impl From<ResourceId> for S3Bucket {
    fn from(id: ResourceId) -> Self {
        let key = key_of(&id);
        let prefix = if key.is_empty() { key } else { format!("{key}/") };
        Self { id, prefix }
    }
}

impl Resource for S3Bucket {
    fn id(&self) -> &ResourceId {
        &self.id
    }
}

/// An object handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Object {
    id: ResourceId,
    key: String,
}

impl S3Object {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Content type guessed from the key's extension
    pub fn content_type(&self) -> String {
        mime_guess::from_path(&self.key)
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    }
}

impl From<ResourceId> for S3Object {
    fn from(id: ResourceId) -> Self {
        let key = key_of(&id);
        Self { id, key }
    }
}

impl Resource for S3Object {
    fn id(&self) -> &ResourceId {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(path: &str) -> ResourceId {
        ResourceId::new(path)
    }

    #[test]
    fn test_key_mapping() {
        assert_eq!(key_of(&id("/")), "");
        assert_eq!(key_of(&id("/data")), "data");
        assert_eq!(key_of(&id("/data/reports/q1.csv")), "data/reports/q1.csv");
        assert_eq!(key_of(&id("data/x")), "data/x");
    }

    #[test]
    fn test_bucket_prefix_and_marker() {
        let top = S3Bucket::from(id("/"));
        assert_eq!(top.prefix(), "");
        assert_eq!(top.marker(), None);

        let reports = S3Bucket::from(id("/data/reports"));
        assert_eq!(reports.prefix(), "data/reports/");
        assert_eq!(reports.marker(), Some("data/reports/"));
        assert_eq!(reports.id().as_str(), "/data/reports");
    }

    #[test]
    fn test_child_id() {
        let data = S3Bucket::from(id("/data"));
        assert_eq!(data.child_id("data/a.txt"), Some(id("/data/a.txt")));
        assert_eq!(data.child_id("data/reports/"), Some(id("/data/reports")));
        assert_eq!(data.child_id("data/"), None);
        assert_eq!(data.child_id("data/reports/q1.csv"), None);
        assert_eq!(data.child_id("other/a.txt"), None);

        let top = S3Bucket::from(id("/"));
        assert_eq!(top.child_id("data/"), Some(id("/data")));
    }

    #[test]
    fn test_object_key_and_content_type() {
        let object = S3Object::from(id("/data/reports/q1.csv"));
        assert_eq!(object.key(), "data/reports/q1.csv");
        assert_eq!(object.content_type(), "text/csv");

        let unknown = S3Object::from(id("/data/blob"));
        assert_eq!(unknown.content_type(), "application/octet-stream");
    }
}
