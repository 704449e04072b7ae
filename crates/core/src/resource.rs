//! Resource identifiers and root confinement
//!
//! Every name handed to a [`Store`](crate::Store) is joined to the store
//! root and normalized before it is compared against that root. Comparing
//! before normalizing would let `a/../../x` slip past a prefix check.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A normalized, path-like identifier for a bucket or an object
///
/// The canonical form contains no `.` or `..` segments (other than leading
/// `..` segments of a relative id) and no empty segments.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ResourceId(String);

impl ResourceId {
    /// Create an identifier, normalizing the given path
    pub fn new(path: impl AsRef<str>) -> Self {
        Self(normalize(path.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the filesystem-style root `/` or the relative root `.`
    pub fn is_top(&self) -> bool {
        self.0 == "/" || self.0 == "."
    }

    /// The containing identifier (`/data/a` -> `/data`, `/a` -> `/`)
    pub fn parent(&self) -> ResourceId {
        if self.is_top() {
            return self.clone();
        }
        match self.0.rfind('/') {
            Some(0) => Self("/".to_string()),
            Some(pos) => Self(self.0[..pos].to_string()),
            None => Self(".".to_string()),
        }
    }

    /// Last segment of the identifier
    pub fn name(&self) -> &str {
        if self.is_top() {
            return "";
        }
        match self.0.rfind('/') {
            Some(pos) => &self.0[pos + 1..],
            None => &self.0,
        }
    }

    /// The part of this identifier below `root`, if it is confined to it
    pub fn strip_root(&self, root: &ResourceId) -> Option<&str> {
        if !confine(root, self) {
            return None;
        }
        if root.0 == "." {
            return Some(if self.0 == "." { "" } else { &self.0 });
        }
        Some(self.0[root.0.len()..].trim_start_matches('/'))
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ResourceId {
    fn from(path: String) -> Self {
        Self::new(path)
    }
}

impl From<ResourceId> for String {
    fn from(id: ResourceId) -> Self {
        id.0
    }
}

impl AsRef<str> for ResourceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Collapse `.`, `..` and repeated separators in a path
///
/// `..` never climbs above `/` for absolute paths; relative paths keep
/// leading `..` segments so an escape stays visible to [`confine`].
pub fn normalize(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => match segments.last() {
                Some(last) if *last != ".." => {
                    segments.pop();
                }
                _ if !absolute => segments.push(".."),
                _ => {}
            },
            s => segments.push(s),
        }
    }

    let joined = segments.join("/");
    if absolute {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

/// Resolve `name` against `root`
///
/// An empty name is the root itself. An absolute name replaces the root,
/// the same way joining paths does, and is then caught by [`confine`].
pub fn resolve(root: &ResourceId, name: &str) -> ResourceId {
    if name.is_empty() {
        return root.clone();
    }
    if name.starts_with('/') {
        return ResourceId::new(name);
    }
    ResourceId::new(format!("{}/{}", root.as_str(), name))
}

/// Check whether `candidate` lies at or below `root`
///
/// Segments are compared, not bytes, so `/data2` is not inside `/data`.
/// Relative ids keep their leading `..` segments, and any `..` past the
/// root's own segments climbs above it.
pub fn confine(root: &ResourceId, candidate: &ResourceId) -> bool {
    let (root, candidate) = (root.as_str(), candidate.as_str());
    if root.starts_with('/') != candidate.starts_with('/') {
        return false;
    }

    let mut rest = segments(candidate);
    for expected in segments(root) {
        if rest.next() != Some(expected) {
            return false;
        }
    }
    rest.all(|segment| segment != "..")
}

fn segments(id: &str) -> impl Iterator<Item = &str> {
    id.split('/').filter(|s| !s.is_empty() && *s != ".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("/data/./reports//q1.csv"), "/data/reports/q1.csv");
        assert_eq!(normalize("/data/reports/../q1.csv"), "/data/q1.csv");
        assert_eq!(normalize("/../../etc/passwd"), "/etc/passwd");
        assert_eq!(normalize("/"), "/");
        assert_eq!(normalize("data/../../x"), "../x");
        assert_eq!(normalize("a/.."), ".");
        assert_eq!(normalize(""), ".");
        assert_eq!(normalize("/data/"), "/data");
    }

    #[test]
    fn test_resolve_empty_name_is_root() {
        let root = ResourceId::new("/data");
        assert_eq!(resolve(&root, ""), root);
    }

    #[test]
    fn test_resolve_joins_and_normalizes() {
        let root = ResourceId::new("/data");
        assert_eq!(resolve(&root, "reports/q1.csv").as_str(), "/data/reports/q1.csv");
        assert_eq!(resolve(&root, "reports/../x").as_str(), "/data/x");
        assert_eq!(resolve(&root, "../../etc/passwd").as_str(), "/etc/passwd");
        assert_eq!(resolve(&root, "/etc/passwd").as_str(), "/etc/passwd");
    }

    #[test]
    fn test_confine() {
        let root = ResourceId::new("/data");
        assert!(confine(&root, &root));
        assert!(confine(&root, &ResourceId::new("/data/a/b")));
        assert!(!confine(&root, &ResourceId::new("/")));
        assert!(!confine(&root, &ResourceId::new("/etc/passwd")));
        assert!(!confine(&root, &ResourceId::new("/data2/x")));

        let top = ResourceId::new("/");
        assert!(confine(&top, &ResourceId::new("/anything")));
    }

    #[test]
    fn test_confine_relative_root() {
        let root = ResourceId::new("data");
        assert!(confine(&root, &resolve(&root, "x")));
        assert!(!confine(&root, &resolve(&root, "../../x")));

        let dot = ResourceId::new(".");
        assert!(confine(&dot, &resolve(&dot, "a/b")));
        assert!(!confine(&dot, &resolve(&dot, "../a")));
        assert!(!confine(&dot, &ResourceId::new("/a")));
    }

    #[test]
    fn test_confine_root_above_working_dir() {
        let root = ResourceId::new("a/../..");
        assert_eq!(root.as_str(), "..");
        assert!(confine(&root, &root));
        assert!(confine(&root, &resolve(&root, "x/y")));
        assert!(!confine(&root, &resolve(&root, "..")));
        assert!(!confine(&root, &resolve(&root, "../../etc/passwd")));
        assert!(!confine(&root, &resolve(&root, "../escaped")));
        assert!(!confine(&root, &ResourceId::new(".")));
        assert_eq!(resolve(&root, "x").strip_root(&root), Some("x"));

        let deeper = ResourceId::new("../..");
        assert!(!confine(&deeper, &resolve(&deeper, "..")));
        assert!(!confine(&deeper, &root));
    }

    #[test]
    fn test_resolve_is_confined_iff_no_escape() {
        let root = ResourceId::new("/data");
        let cases = [
            ("a", true),
            ("a/b/../c", true),
            ("a/../..", false),
            ("..", false),
            ("../data", true),
            ("../data2", false),
            ("./.", true),
            ("/data/x", true),
            ("/tmp", false),
        ];
        for (name, expected) in cases {
            assert_eq!(
                confine(&root, &resolve(&root, name)),
                expected,
                "name {name:?}"
            );
        }
    }

    #[test]
    fn test_parent_and_name() {
        let id = ResourceId::new("/data/reports/q1.csv");
        assert_eq!(id.parent().as_str(), "/data/reports");
        assert_eq!(id.name(), "q1.csv");
        assert_eq!(ResourceId::new("/data").parent().as_str(), "/");
        assert_eq!(ResourceId::new("/").parent().as_str(), "/");
        assert_eq!(ResourceId::new("a").parent().as_str(), ".");
        assert_eq!(ResourceId::new("/").name(), "");
    }

    #[test]
    fn test_deserialized_id_is_normalized() {
        let id: ResourceId = serde_json::from_str(r#""/data/./a//../b/""#).unwrap();
        assert_eq!(id.as_str(), "/data/b");
        assert_eq!(serde_json::to_string(&id).unwrap(), r#""/data/b""#);
    }

    #[test]
    fn test_strip_root() {
        let root = ResourceId::new("/data");
        assert_eq!(ResourceId::new("/data/a/b").strip_root(&root), Some("a/b"));
        assert_eq!(root.strip_root(&root), Some(""));
        assert_eq!(ResourceId::new("/etc").strip_root(&root), None);

        let top = ResourceId::new("/");
        assert_eq!(ResourceId::new("/a").strip_root(&top), Some("a"));
    }
}
