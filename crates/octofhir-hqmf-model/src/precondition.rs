//! Population criteria and their precondition trees
//!
//! A precondition is either a conjunction over child preconditions or a
//! leaf naming a data criterion. Whether a node is a conjunction follows
//! from its shape, never from a stored flag.
//!
//! Trees are built, serialized, cloned, compared and dropped with an
//! explicit stack so that input depth is bounded only by memory.

use octofhir_hqmf_diagnostics::{HqmfError, NodePath, Result};
use serde_json::Value as Json;
use std::fmt;
use std::str::FromStr;

use crate::structural::{NodeReader, NodeWriter};
use crate::temporal::Reference;

/// Boolean combinator of a conjunction node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConjunctionCode {
    AllTrue,
    AllFalse,
    AtLeastOneTrue,
    AtLeastOneFalse,
    AtMostOneTrue,
    OnlyOneTrue,
    OnlyOneFalse,
}

impl ConjunctionCode {
    pub const ALL: [ConjunctionCode; 7] = [
        Self::AllTrue,
        Self::AllFalse,
        Self::AtLeastOneTrue,
        Self::AtLeastOneFalse,
        Self::AtMostOneTrue,
        Self::OnlyOneTrue,
        Self::OnlyOneFalse,
    ];

    pub const fn code(&self) -> &'static str {
        match self {
            Self::AllTrue => "allTrue",
            Self::AllFalse => "allFalse",
            Self::AtLeastOneTrue => "atLeastOneTrue",
            Self::AtLeastOneFalse => "atLeastOneFalse",
            Self::AtMostOneTrue => "atMostOneTrue",
            Self::OnlyOneTrue => "onlyOneTrue",
            Self::OnlyOneFalse => "onlyOneFalse",
        }
    }
}

impl FromStr for ConjunctionCode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|code| code.code() == s)
            .ok_or_else(|| format!("unknown conjunction code '{}'", s))
    }
}

impl fmt::Display for ConjunctionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A node of a precondition tree
#[derive(Debug)]
pub enum Precondition {
    /// Combines non-empty, ordered children
    Conjunction {
        code: ConjunctionCode,
        preconditions: Vec<Precondition>,
    },
    /// Holds when the referenced data criterion does
    Leaf { reference: Reference },
}

/// Shape of one inbound precondition node
enum Shape<'a> {
    Leaf(Reference),
    Conjunction {
        code: ConjunctionCode,
        items: &'a [Json],
        path: NodePath,
    },
}

fn classify(node: &Json, path: NodePath) -> Result<Shape<'_>> {
    let reader = NodeReader::new(node, path)?;
    let children = reader.opt_array("preconditions")?;
    let reference = reader.opt_str("reference")?;

    match (children, reference) {
        (Some(_), Some(_)) => Err(HqmfError::malformed(
            "a precondition has either 'preconditions' or a 'reference', not both",
            reader.path().clone(),
        )),
        (None, None) => Err(HqmfError::malformed(
            "a precondition needs 'preconditions' or a 'reference'",
            reader.path().clone(),
        )),
        (None, Some(_)) if reader.has("conjunction_code") => Err(HqmfError::malformed(
            "a leaf precondition cannot carry a conjunction code",
            reader.path().key("conjunction_code"),
        )),
        (None, Some(id)) => Ok(Shape::Leaf(Reference::new(id))),
        (Some((items, path)), None) => {
            if items.is_empty() {
                return Err(HqmfError::malformed("conjunction has no preconditions", path));
            }
            let code = reader
                .req_str("conjunction_code")?
                .parse::<ConjunctionCode>()
                .map_err(|message| {
                    HqmfError::malformed(message, reader.path().key("conjunction_code"))
                })?;
            Ok(Shape::Conjunction { code, items, path })
        }
    }
}

/// Partially built conjunction
struct BuildFrame<'a> {
    code: ConjunctionCode,
    items: &'a [Json],
    path: NodePath,
    next: usize,
    built: Vec<Precondition>,
}

impl<'a> BuildFrame<'a> {
    fn new(code: ConjunctionCode, items: &'a [Json], path: NodePath) -> Self {
        Self {
            code,
            items,
            path,
            next: 0,
            built: Vec::with_capacity(items.len()),
        }
    }
}

/// Conjunction whose children are being mapped to `T`
struct MapFrame<'a, T> {
    code: ConjunctionCode,
    children: &'a [Precondition],
    next: usize,
    mapped: Vec<T>,
}

impl<'a, T> MapFrame<'a, T> {
    fn new(code: ConjunctionCode, children: &'a [Precondition]) -> Self {
        Self {
            code,
            children,
            next: 0,
            mapped: Vec::with_capacity(children.len()),
        }
    }
}

fn leaf_structural(reference: &Reference) -> Json {
    NodeWriter::new().str("reference", reference.id.as_str()).finish()
}

fn conjunction_structural(code: ConjunctionCode, preconditions: Vec<Json>) -> Json {
    NodeWriter::new()
        .str("conjunction_code", code.code())
        .node("preconditions", Json::Array(preconditions))
        .finish()
}

impl Precondition {
    /// A leaf on the given data criterion id
    pub fn leaf(id: impl Into<String>) -> Self {
        Self::Leaf {
            reference: Reference::new(id),
        }
    }

    /// A conjunction; callers supply at least one child
    pub fn conjunction(code: ConjunctionCode, preconditions: Vec<Precondition>) -> Self {
        Self::Conjunction {
            code,
            preconditions,
        }
    }

    pub fn is_conjunction(&self) -> bool {
        matches!(self, Self::Conjunction { .. })
    }

    pub fn conjunction_code(&self) -> Option<ConjunctionCode> {
        match self {
            Self::Conjunction { code, .. } => Some(*code),
            Self::Leaf { .. } => None,
        }
    }

    /// Children of a conjunction; empty for a leaf
    pub fn preconditions(&self) -> &[Precondition] {
        match self {
            Self::Conjunction { preconditions, .. } => preconditions,
            Self::Leaf { .. } => &[],
        }
    }

    pub fn reference(&self) -> Option<&Reference> {
        match self {
            Self::Leaf { reference } => Some(reference),
            Self::Conjunction { .. } => None,
        }
    }

    /// Leaf references in document (pre-)order
    pub fn references(&self) -> Vec<&Reference> {
        let mut found = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            match node {
                Self::Leaf { reference } => found.push(reference),
                Self::Conjunction { preconditions, .. } => stack.extend(preconditions.iter().rev()),
            }
        }
        found
    }

    /// Number of leaves in the tree
    pub fn leaf_count(&self) -> usize {
        self.references().len()
    }

    /// Number of levels; a lone leaf has depth 1
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(self, 1)];
        while let Some((node, level)) = stack.pop() {
            deepest = deepest.max(level);
            stack.extend(node.preconditions().iter().map(|child| (child, level + 1)));
        }
        deepest
    }

    /// Build a tree from its structural node
    pub fn from_structural(node: &Json, path: NodePath) -> Result<Self> {
        let mut stack = match classify(node, path)? {
            Shape::Leaf(reference) => return Ok(Self::Leaf { reference }),
            Shape::Conjunction { code, items, path } => vec![BuildFrame::new(code, items, path)],
        };

        // The stack is never empty at the top of the loop: the root frame is
        // the last one popped, and popping it returns.
        loop {
            let top = stack.len() - 1;
            let frame = &mut stack[top];
            if let Some(item) = frame.items.get(frame.next) {
                let item_path = frame.path.index(frame.next);
                frame.next += 1;
                match classify(item, item_path)? {
                    Shape::Leaf(reference) => frame.built.push(Self::Leaf { reference }),
                    Shape::Conjunction { code, items, path } => {
                        stack.push(BuildFrame::new(code, items, path))
                    }
                }
                continue;
            }

            let done = stack.swap_remove(top);
            let node = Self::Conjunction {
                code: done.code,
                preconditions: done.built,
            };
            match stack.last_mut() {
                Some(parent) => parent.built.push(node),
                None => return Ok(node),
            }
        }
    }

    /// Bottom-up fold: `leaf` maps each leaf, `conjunction` combines a
    /// node's code with its already mapped children
    fn fold<T>(
        &self,
        leaf: impl Fn(&Reference) -> T,
        conjunction: impl Fn(ConjunctionCode, Vec<T>) -> T,
    ) -> T {
        let mut stack = match self {
            Self::Leaf { reference } => return leaf(reference),
            Self::Conjunction {
                code,
                preconditions,
            } => vec![MapFrame::new(*code, preconditions)],
        };

        loop {
            let top = stack.len() - 1;
            let frame = &mut stack[top];
            if let Some(child) = frame.children.get(frame.next) {
                frame.next += 1;
                match child {
                    Self::Leaf { reference } => frame.mapped.push(leaf(reference)),
                    Self::Conjunction {
                        code,
                        preconditions,
                    } => stack.push(MapFrame::new(*code, preconditions)),
                }
                continue;
            }

            let done = stack.swap_remove(top);
            let node = conjunction(done.code, done.mapped);
            match stack.last_mut() {
                Some(parent) => parent.mapped.push(node),
                None => return node,
            }
        }
    }

    /// Serialize the tree
    pub fn to_structural(&self) -> Json {
        self.fold(leaf_structural, conjunction_structural)
    }
}

impl Clone for Precondition {
    fn clone(&self) -> Self {
        self.fold(
            |reference| Self::Leaf {
                reference: reference.clone(),
            },
            |code, preconditions| Self::Conjunction {
                code,
                preconditions,
            },
        )
    }
}

impl PartialEq for Precondition {
    fn eq(&self, other: &Self) -> bool {
        let mut pending = vec![(self, other)];
        while let Some(pair) = pending.pop() {
            match pair {
                (Self::Leaf { reference: a }, Self::Leaf { reference: b }) => {
                    if a != b {
                        return false;
                    }
                }
                (
                    Self::Conjunction {
                        code: code_a,
                        preconditions: a,
                    },
                    Self::Conjunction {
                        code: code_b,
                        preconditions: b,
                    },
                ) => {
                    if code_a != code_b || a.len() != b.len() {
                        return false;
                    }
                    pending.extend(a.iter().zip(b));
                }
                _ => return false,
            }
        }
        true
    }
}

impl Eq for Precondition {}

// Children are moved onto a work list so nested conjunctions drop one at a time.
impl Drop for Precondition {
    fn drop(&mut self) {
        let mut pending = match self {
            Self::Conjunction { preconditions, .. } => std::mem::take(preconditions),
            Self::Leaf { .. } => return,
        };
        while let Some(mut node) = pending.pop() {
            if let Self::Conjunction { preconditions, .. } = &mut node {
                pending.append(preconditions);
            }
        }
    }
}

/// A named population (IPP, DENOM, NUMER, DENEXCEP, ...) and its tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopulationCriteria {
    id: String,
    pub title: Option<String>,
    pub root: Precondition,
}

impl PopulationCriteria {
    pub fn new(id: impl Into<String>, root: Precondition) -> Self {
        Self {
            id: id.into(),
            title: None,
            root,
        }
    }

    /// Population code
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_conjunction(&self) -> bool {
        self.root.is_conjunction()
    }

    pub fn conjunction_code(&self) -> Option<ConjunctionCode> {
        self.root.conjunction_code()
    }

    pub fn preconditions(&self) -> &[Precondition] {
        self.root.preconditions()
    }

    pub fn from_structural(node: &Json, path: NodePath) -> Result<Self> {
        let reader = NodeReader::new(node, path)?;
        let id = reader.req_str("id")?;
        let title = reader.opt_str("title")?;
        let root = Precondition::from_structural(node, reader.path().clone())?;
        log::trace!("built population criteria '{}' ({} leaves)", id, root.leaf_count());
        Ok(Self { id, title, root })
    }

    /// Serialize as `{id, title?, ...root}`
    pub fn to_structural(&self) -> Json {
        let mut node = NodeWriter::new()
            .str("id", self.id.as_str())
            .opt_str("title", self.title.as_deref())
            .finish();
        if let (Json::Object(fields), Json::Object(root)) = (&mut node, self.root.to_structural()) {
            fields.extend(root);
        }
        node
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    // serde_json drops nested values recursively
    fn dismantle(mut pending: Vec<Json>) {
        while let Some(mut value) = pending.pop() {
            if let Some(Json::Array(children)) = value.get_mut("preconditions").map(Json::take) {
                pending.extend(children);
            }
        }
    }

    fn denominator() -> Json {
        json!({
            "id": "DENOM",
            "conjunction_code": "allTrue",
            "preconditions": [{
                "conjunction_code": "atLeastOneTrue",
                "preconditions": [
                    {
                        "conjunction_code": "allTrue",
                        "preconditions": [{"reference": "HasDiabetes"}, {"reference": "DiabetesMedAdministered"}]
                    },
                    {"reference": "HasGestationalDiabetes"}
                ]
            }]
        })
    }

    #[test]
    fn test_nested_tree() {
        let population = PopulationCriteria::from_structural(&denominator(), NodePath::root()).unwrap();

        assert_eq!(population.id(), "DENOM");
        assert_eq!(population.preconditions().len(), 1);
        let inner = &population.preconditions()[0];
        assert_eq!(inner.conjunction_code(), Some(ConjunctionCode::AtLeastOneTrue));
        assert_eq!(inner.preconditions().len(), 2);
        let first = &inner.preconditions()[0];
        assert!(first.is_conjunction());
        assert!(!first.preconditions()[0].is_conjunction());
        assert_eq!(
            first.preconditions()[0].reference().map(|r| r.id.as_str()),
            Some("HasDiabetes")
        );

        assert_eq!(population.root.leaf_count(), 3);
        assert_eq!(population.root.depth(), 4);
        assert_eq!(population.to_structural(), denominator());
    }

    #[test]
    fn test_references_in_document_order() {
        let population = PopulationCriteria::from_structural(&denominator(), NodePath::root()).unwrap();
        let ids: Vec<_> = population.root.references().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["HasDiabetes", "DiabetesMedAdministered", "HasGestationalDiabetes"]);
    }

    #[test]
    fn test_leaf_root() {
        let node = json!({"reference": "HbA1C"});
        let tree = Precondition::from_structural(&node, NodePath::root()).unwrap();
        assert_eq!(tree, Precondition::leaf("HbA1C"));
        assert!(tree.preconditions().is_empty());
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.to_structural(), node);
    }

    #[test]
    fn test_empty_conjunction_rejected() {
        let node = json!({"conjunction_code": "allTrue", "preconditions": []});
        let err = Precondition::from_structural(&node, NodePath::root()).unwrap_err();
        assert_eq!(err.path().map(ToString::to_string), Some("$.preconditions".to_string()));
    }

    #[test]
    fn test_mixed_shape_rejected() {
        let node = json!({"conjunction_code": "allTrue", "preconditions": [{"reference": "a"}], "reference": "b"});
        assert!(matches!(
            Precondition::from_structural(&node, NodePath::root()),
            Err(HqmfError::MalformedStructural { .. })
        ));
        assert!(Precondition::from_structural(&json!({}), NodePath::root()).is_err());
    }

    #[test]
    fn test_error_path_in_nested_child() {
        let node = json!({
            "conjunction_code": "allTrue",
            "preconditions": [{"reference": "a"}, {"conjunction_code": "someTrue", "preconditions": [{"reference": "b"}]}]
        });
        let err = Precondition::from_structural(&node, NodePath::root()).unwrap_err();
        assert_eq!(
            err.path().map(ToString::to_string),
            Some("$.preconditions[1].conjunction_code".to_string())
        );
    }

    #[test]
    fn test_deep_tree_does_not_overflow() {
        let depth = 50_000;
        let mut node = json!({"reference": "leaf"});
        for _ in 0..depth {
            node = json!({"conjunction_code": "allTrue", "preconditions": [node]});
        }

        let tree = Precondition::from_structural(&node, NodePath::root()).unwrap();
        assert_eq!(tree.depth(), depth + 1);
        assert_eq!(tree.leaf_count(), 1);

        let copy = tree.clone();
        assert!(copy == tree);
        assert!(copy != Precondition::leaf("leaf"));
        drop(copy);

        let emitted = tree.to_structural();
        drop(tree);
        dismantle(vec![emitted, node]);
    }

    #[test]
    fn test_deep_population_drops() {
        let depth = 100_000;
        let mut node = json!({"reference": "leaf"});
        for _ in 0..depth {
            node = json!({"conjunction_code": "atLeastOneTrue", "preconditions": [node]});
        }
        if let Json::Object(fields) = &mut node {
            fields.insert("id".to_string(), json!("IPP"));
        }

        let population = PopulationCriteria::from_structural(&node, NodePath::root()).unwrap();
        assert_eq!(population.root.depth(), depth + 1);
        drop(population);
        dismantle(vec![node]);
    }

    #[test]
    fn test_leaf_with_conjunction_code_rejected() {
        let node = json!({"reference": "a", "conjunction_code": "allTrue"});
        let err = Precondition::from_structural(&node, NodePath::root().key("IPP")).unwrap_err();
        assert!(matches!(err, HqmfError::MalformedStructural { .. }));
        assert_eq!(
            err.path().map(ToString::to_string),
            Some("$.IPP.conjunction_code".to_string())
        );
    }
}
