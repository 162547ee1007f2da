//! Node path tracking for structural documents

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A single step from a parent node to one of its children
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PathSegment {
    /// Object member access
    Key(String),
    /// Sequence element access
    Index(usize),
}

#[derive(Debug)]
struct Step {
    parent: Option<Arc<Step>>,
    segment: PathSegment,
    depth: usize,
}

/// Location of a node inside a structural document, rooted at `$`
///
/// Paths are built as the reader descends, so every structural error can
/// point at the offending node, e.g. `$.data_criteria[3].value.type`.
/// Children share their parent's steps; extending a path is O(1).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<PathSegment>", into = "Vec<PathSegment>")]
pub struct NodePath {
    last: Option<Arc<Step>>,
}

impl NodePath {
    /// The document root
    pub const fn root() -> Self {
        Self { last: None }
    }

    fn push(&self, segment: PathSegment) -> Self {
        Self {
            last: Some(Arc::new(Step {
                parent: self.last.clone(),
                segment,
                depth: self.depth() + 1,
            })),
        }
    }

    /// Path of the named member of this node
    pub fn key(&self, key: impl Into<String>) -> Self {
        self.push(PathSegment::Key(key.into()))
    }

    /// Path of the indexed element of this node
    pub fn index(&self, index: usize) -> Self {
        self.push(PathSegment::Index(index))
    }

    /// Number of segments below the root
    pub fn depth(&self) -> usize {
        self.last.as_ref().map_or(0, |step| step.depth)
    }

    /// Check if this is the root path
    pub fn is_root(&self) -> bool {
        self.last.is_none()
    }

    /// Segments from the root down
    pub fn segments(&self) -> Vec<PathSegment> {
        let mut segments = Vec::with_capacity(self.depth());
        let mut step = self.last.as_deref();
        while let Some(current) = step {
            segments.push(current.segment.clone());
            step = current.parent.as_deref();
        }
        segments.reverse();
        segments
    }
}

// Unlink the chain one step at a time; the default drop recurses per segment.
impl Drop for NodePath {
    fn drop(&mut self) {
        let mut next = self.last.take();
        while let Some(step) = next {
            next = match Arc::try_unwrap(step) {
                Ok(mut owned) => owned.parent.take(),
                Err(_) => None,
            };
        }
    }
}

impl From<Vec<PathSegment>> for NodePath {
    fn from(segments: Vec<PathSegment>) -> Self {
        segments
            .into_iter()
            .fold(Self::root(), |path, segment| path.push(segment))
    }
}

impl From<NodePath> for Vec<PathSegment> {
    fn from(path: NodePath) -> Self {
        path.segments()
    }
}

impl PartialEq for NodePath {
    fn eq(&self, other: &Self) -> bool {
        self.depth() == other.depth() && self.segments() == other.segments()
    }
}

impl Eq for NodePath {}

impl Hash for NodePath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.segments().hash(state);
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$")?;
        for segment in self.segments() {
            match segment {
                PathSegment::Key(key) => write!(f, ".{}", key)?,
                PathSegment::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_display() {
        assert_eq!(NodePath::root().to_string(), "$");
        assert!(NodePath::root().is_root());
    }

    #[test]
    fn test_nested_display() {
        let path = NodePath::root()
            .key("data_criteria")
            .index(3)
            .key("value")
            .key("type");
        assert_eq!(path.to_string(), "$.data_criteria[3].value.type");
        assert_eq!(path.depth(), 4);
    }

    #[test]
    fn test_extending_does_not_mutate_parent() {
        let parent = NodePath::root().key("population_criteria");
        let child = parent.index(0);
        assert_eq!(parent.depth(), 1);
        assert_eq!(child.depth(), 2);
        assert_eq!(child.segments()[0], PathSegment::Key("population_criteria".to_string()));
    }

    #[test]
    fn test_equality_by_segments() {
        let a = NodePath::root().key("x").index(1);
        let b = NodePath::from(vec![PathSegment::Key("x".to_string()), PathSegment::Index(1)]);
        assert_eq!(a, b);
        assert_ne!(a, NodePath::root().key("x"));
    }

    #[test]
    fn test_deep_path_drops() {
        let mut path = NodePath::root();
        for i in 0..200_000 {
            path = path.index(i);
        }
        assert_eq!(path.depth(), 200_000);
    }
}
