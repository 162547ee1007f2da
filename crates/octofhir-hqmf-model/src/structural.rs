//! Typed access to the structural (JSON) form of a document
//!
//! The upstream XML adapter hands the model a tree of objects, arrays and
//! scalars. `NodeReader` walks one object of that tree while tracking its
//! `NodePath`, so every shape error names the node it came from.
//! `NodeWriter` is the outbound mirror: it never emits `null` and skips
//! absent optionals and empty sequences.

use octofhir_hqmf_diagnostics::{HqmfError, NodePath, Result};
use serde_json::{Map, Value as Json};

fn kind_of(node: &Json) -> &'static str {
    match node {
        Json::Null => "null",
        Json::Bool(_) => "a boolean",
        Json::Number(_) => "a number",
        Json::String(_) => "a string",
        Json::Array(_) => "an array",
        Json::Object(_) => "an object",
    }
}

/// Read-only view over one structural object
#[derive(Debug, Clone)]
pub struct NodeReader<'a> {
    fields: &'a Map<String, Json>,
    path: NodePath,
}

impl<'a> NodeReader<'a> {
    /// Wrap a node, which must be an object
    pub fn new(node: &'a Json, path: NodePath) -> Result<Self> {
        match node {
            Json::Object(fields) => Ok(Self { fields, path }),
            other => Err(HqmfError::malformed(
                format!("expected an object, found {}", kind_of(other)),
                path,
            )),
        }
    }

    /// Path of this node
    pub fn path(&self) -> &NodePath {
        &self.path
    }

    // `null` is treated exactly like an absent key.
    fn get(&self, key: &str) -> Option<&'a Json> {
        self.fields.get(key).filter(|v| !v.is_null())
    }

    fn wrong_type(&self, key: &str, expected: &str, found: &Json) -> HqmfError {
        HqmfError::malformed(
            format!("expected {} for '{}', found {}", expected, key, kind_of(found)),
            self.path.key(key),
        )
    }

    /// Check whether a key is present with a non-null value
    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Optional string member
    pub fn opt_str(&self, key: &str) -> Result<Option<String>> {
        match self.get(key) {
            None => Ok(None),
            Some(Json::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(self.wrong_type(key, "a string", other)),
        }
    }

    /// Required string member
    pub fn req_str(&self, key: &str) -> Result<String> {
        self.opt_str(key)?
            .ok_or_else(|| HqmfError::missing_field(key, &self.path))
    }

    /// Optional literal, accepting strings or numbers and keeping the text verbatim
    pub fn opt_literal(&self, key: &str) -> Result<Option<String>> {
        match self.get(key) {
            None => Ok(None),
            Some(Json::String(s)) => Ok(Some(s.clone())),
            Some(Json::Number(n)) => Ok(Some(n.to_string())),
            Some(other) => Err(self.wrong_type(key, "a string or number", other)),
        }
    }

    /// Optional boolean member
    pub fn opt_bool(&self, key: &str) -> Result<Option<bool>> {
        match self.get(key) {
            None => Ok(None),
            Some(Json::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(self.wrong_type(key, "a boolean", other)),
        }
    }

    /// Optional raw child node with its path
    pub fn opt_node(&self, key: &str) -> Option<(&'a Json, NodePath)> {
        self.get(key).map(|node| (node, self.path.key(key)))
    }

    /// Optional child object
    pub fn opt_child(&self, key: &str) -> Result<Option<NodeReader<'a>>> {
        self.opt_node(key)
            .map(|(node, path)| NodeReader::new(node, path))
            .transpose()
    }

    /// Optional array member
    pub fn opt_array(&self, key: &str) -> Result<Option<(&'a [Json], NodePath)>> {
        match self.get(key) {
            None => Ok(None),
            Some(Json::Array(items)) => Ok(Some((items.as_slice(), self.path.key(key)))),
            Some(other) => Err(self.wrong_type(key, "an array", other)),
        }
    }

    /// Optional array of strings
    pub fn opt_str_array(&self, key: &str) -> Result<Option<Vec<String>>> {
        let Some((items, path)) = self.opt_array(key)? else {
            return Ok(None);
        };
        items
            .iter()
            .enumerate()
            .map(|(i, item)| match item {
                Json::String(s) => Ok(s.clone()),
                other => Err(HqmfError::malformed(
                    format!("expected a string, found {}", kind_of(other)),
                    path.index(i),
                )),
            })
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    /// Optional object member, returned as raw map
    pub fn opt_map(&self, key: &str) -> Result<Option<(&'a Map<String, Json>, NodePath)>> {
        match self.get(key) {
            None => Ok(None),
            Some(Json::Object(map)) => Ok(Some((map, self.path.key(key)))),
            Some(other) => Err(self.wrong_type(key, "an object", other)),
        }
    }
}

/// Builder for an outbound structural object
#[derive(Debug, Default)]
pub struct NodeWriter {
    fields: Map<String, Json>,
}

impl NodeWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a string member
    pub fn str(mut self, key: &str, value: impl Into<String>) -> Self {
        self.fields.insert(key.to_string(), Json::String(value.into()));
        self
    }

    /// Set a string member when present
    pub fn opt_str(self, key: &str, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.str(key, v),
            None => self,
        }
    }

    /// Set a boolean member only when it differs from its default
    pub fn flag(mut self, key: &str, value: bool, default: bool) -> Self {
        if value != default {
            self.fields.insert(key.to_string(), Json::Bool(value));
        }
        self
    }

    /// Set a nested node
    pub fn node(mut self, key: &str, value: Json) -> Self {
        self.fields.insert(key.to_string(), value);
        self
    }

    /// Set a nested node when present
    pub fn opt_node(self, key: &str, value: Option<Json>) -> Self {
        match value {
            Some(v) => self.node(key, v),
            None => self,
        }
    }

    /// Set a sequence member, skipping it when empty
    pub fn seq(self, key: &str, items: Vec<Json>) -> Self {
        if items.is_empty() {
            self
        } else {
            self.node(key, Json::Array(items))
        }
    }

    pub fn finish(self) -> Json {
        Json::Object(self.fields)
    }
}
