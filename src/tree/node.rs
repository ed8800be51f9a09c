//! Hierarchical attribute tree: named children, scalar leaves, array leaves.
//!
//! A [`Node`] is either empty, a scalar, a typed [`Array`], or an object of
//! named children. Children keep insertion order for deterministic output;
//! lookup goes through a name index so deep trees stay cheap to address.
//!
//! Paths are `/`-separated. A component may carry an index suffix `name[i]`
//! which steps to the `i`-th child of `name`; a bare `[i]` steps to the
//! `i`-th child of the current node.

use hashbrown::HashMap;

use crate::error::MeshRepartError;
use crate::tree::array::Array;

/// The payload of a [`Node`].
#[derive(Clone, Debug, PartialEq, Default)]
pub enum Value {
    #[default]
    Empty,
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    Array(Array),
    Object(Object),
}

impl Value {
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Value::Empty => "empty",
            Value::Int(_) => "int",
            Value::UInt(_) => "uint",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }
}

/// Insertion-ordered map of named child nodes.
#[derive(Clone, Debug, Default)]
pub struct Object {
    index: HashMap<String, usize>,
    entries: Vec<(String, Node)>,
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Object {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Node> {
        self.index.get(name).map(|&i| &self.entries[i].1)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Node> {
        let i = *self.index.get(name)?;
        Some(&mut self.entries[i].1)
    }

    pub fn at(&self, i: usize) -> Option<(&str, &Node)> {
        self.entries.get(i).map(|(n, c)| (n.as_str(), c))
    }

    /// Insert or replace the child `name`.
    pub fn insert(&mut self, name: &str, node: Node) -> &mut Node {
        if let Some(&i) = self.index.get(name) {
            self.entries[i].1 = node;
            &mut self.entries[i].1
        } else {
            let i = self.entries.len();
            self.index.insert(name.to_owned(), i);
            self.entries.push((name.to_owned(), node));
            &mut self.entries[i].1
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Node> {
        let i = self.index.remove(name)?;
        let (_, node) = self.entries.remove(i);
        for v in self.index.values_mut() {
            if *v > i {
                *v -= 1;
            }
        }
        Some(node)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.entries.iter().map(|(n, c)| (n.as_str(), c))
    }
}

/// One node of the attribute tree.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Node {
    value: Value,
}

/// A parsed path component: optional name, optional child index.
struct Component<'p> {
    name: Option<&'p str>,
    index: Option<usize>,
}

fn parse_component(seg: &str) -> Component<'_> {
    if let Some(open) = seg.find('[') {
        if seg.ends_with(']') {
            let idx = seg[open + 1..seg.len() - 1].parse::<usize>().ok();
            if idx.is_some() {
                let name = &seg[..open];
                return Component {
                    name: (!name.is_empty()).then_some(name),
                    index: idx,
                };
            }
        }
    }
    Component {
        name: Some(seg),
        index: None,
    }
}

impl Node {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn kind_name(&self) -> &'static str {
        self.value.kind_name()
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.value, Value::Empty)
    }

    pub fn is_object(&self) -> bool {
        matches!(self.value, Value::Object(_))
    }

    // ---- children ---------------------------------------------------------

    pub fn num_children(&self) -> usize {
        match &self.value {
            Value::Object(o) => o.len(),
            _ => 0,
        }
    }

    pub fn child(&self, name: &str) -> Option<&Node> {
        match &self.value {
            Value::Object(o) => o.get(name),
            _ => None,
        }
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Node> {
        match &mut self.value {
            Value::Object(o) => o.get_mut(name),
            _ => None,
        }
    }

    pub fn child_at(&self, i: usize) -> Option<(&str, &Node)> {
        match &self.value {
            Value::Object(o) => o.at(i),
            _ => None,
        }
    }

    /// Children in insertion order; empty iterator for non-objects.
    pub fn children(&self) -> impl Iterator<Item = (&str, &Node)> {
        let entries: &[(String, Node)] = match &self.value {
            Value::Object(o) => &o.entries,
            _ => &[],
        };
        entries.iter().map(|(n, c)| (n.as_str(), c))
    }

    pub fn has_child(&self, name: &str) -> bool {
        self.child(name).is_some()
    }

    /// Insert or replace a direct child, converting this node to an object
    /// if it was not one.
    pub fn insert_child(&mut self, name: &str, node: Node) -> &mut Node {
        if !self.is_object() {
            self.value = Value::Object(Object::default());
        }
        match &mut self.value {
            Value::Object(o) => o.insert(name, node),
            _ => unreachable!(),
        }
    }

    pub fn remove_child(&mut self, name: &str) -> Option<Node> {
        match &mut self.value {
            Value::Object(o) => o.remove(name),
            _ => None,
        }
    }

    // ---- path lookup ------------------------------------------------------

    /// Non-strict path lookup.
    pub fn get(&self, path: &str) -> Option<&Node> {
        let mut cur = self;
        for seg in path.split('/').filter(|s| !s.is_empty()) {
            let comp = parse_component(seg);
            if let Some(name) = comp.name {
                cur = cur.child(name)?;
            }
            if let Some(i) = comp.index {
                cur = cur.child_at(i)?.1;
            }
        }
        Some(cur)
    }

    /// Strict path lookup; reports the full path on failure.
    pub fn fetch(&self, path: &str) -> Result<&Node, MeshRepartError> {
        self.get(path)
            .ok_or_else(|| MeshRepartError::PathNotFound(path.to_owned()))
    }

    pub fn has_path(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Path lookup that creates missing object nodes along the way.
    ///
    /// Index suffixes are not valid here; a scalar node encountered in the
    /// middle of the path is replaced by an object.
    pub fn fetch_mut(&mut self, path: &str) -> &mut Node {
        let mut cur = self;
        for seg in path.split('/').filter(|s| !s.is_empty()) {
            if cur.child(seg).is_none() {
                cur.insert_child(seg, Node::new());
            }
            cur = cur.child_mut(seg).expect("child just ensured");
        }
        cur
    }

    // ---- scalars and arrays ----------------------------------------------

    pub fn set_i64(&mut self, v: i64) {
        self.value = Value::Int(v);
    }

    pub fn set_u64(&mut self, v: u64) {
        self.value = Value::UInt(v);
    }

    pub fn set_f64(&mut self, v: f64) {
        self.value = Value::Float(v);
    }

    pub fn set_str(&mut self, v: &str) {
        self.value = Value::Str(v.to_owned());
    }

    pub fn set_array(&mut self, a: impl Into<Array>) {
        self.value = Value::Array(a.into());
    }

    /// Share an existing array without copying its payload.
    pub fn set_external(&mut self, a: &Array) {
        self.value = Value::Array(a.clone());
    }

    /// Scalar read with numeric conversion.
    pub fn to_i64(&self) -> Result<i64, MeshRepartError> {
        match &self.value {
            Value::Int(v) => Ok(*v),
            Value::UInt(v) => Ok(*v as i64),
            Value::Float(v) => Ok(*v as i64),
            other => Err(MeshRepartError::WrongKind {
                expected: "numeric scalar",
                found: other.kind_name(),
            }),
        }
    }

    pub fn to_u64(&self) -> Result<u64, MeshRepartError> {
        Ok(self.to_i64()? as u64)
    }

    pub fn to_f64(&self) -> Result<f64, MeshRepartError> {
        match &self.value {
            Value::Int(v) => Ok(*v as f64),
            Value::UInt(v) => Ok(*v as f64),
            Value::Float(v) => Ok(*v),
            other => Err(MeshRepartError::WrongKind {
                expected: "numeric scalar",
                found: other.kind_name(),
            }),
        }
    }

    pub fn as_str(&self) -> Result<&str, MeshRepartError> {
        match &self.value {
            Value::Str(s) => Ok(s),
            other => Err(MeshRepartError::WrongKind {
                expected: "string",
                found: other.kind_name(),
            }),
        }
    }

    pub fn as_array(&self) -> Result<&Array, MeshRepartError> {
        match &self.value {
            Value::Array(a) => Ok(a),
            other => Err(MeshRepartError::WrongKind {
                expected: "array",
                found: other.kind_name(),
            }),
        }
    }

    pub(crate) fn set_value(&mut self, v: Value) {
        self.value = v;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Node {
        let mut n = Node::new();
        n.fetch_mut("topologies/mesh/type").set_str("uniform");
        n.fetch_mut("state/domain_id").set_i64(3);
        n.fetch_mut("values/x").set_array(vec![0.0f64, 1.0, 2.0]);
        n
    }

    #[test]
    fn path_lookup() {
        let n = sample();
        assert_eq!(
            n.fetch("topologies/mesh/type").unwrap().as_str().unwrap(),
            "uniform"
        );
        assert_eq!(n.fetch("state/domain_id").unwrap().to_i64().unwrap(), 3);
        assert!(n.fetch("state/missing").is_err());
    }

    #[test]
    fn index_suffix() {
        let n = sample();
        // topologies[0] is the first topology regardless of its name
        let t = n.get("topologies[0]").unwrap();
        assert!(t.has_child("type"));
        let ty = n.get("topologies/mesh[0]").unwrap();
        assert_eq!(ty.as_str().unwrap(), "uniform");
    }

    #[test]
    fn insertion_order_is_kept() {
        let mut n = Node::new();
        for name in ["c", "a", "b"] {
            n.insert_child(name, Node::new());
        }
        let names: Vec<&str> = n.children().map(|(name, _)| name).collect();
        assert_eq!(names, ["c", "a", "b"]);
    }

    #[test]
    fn remove_keeps_index_consistent() {
        let mut n = sample();
        n.remove_child("topologies");
        assert!(n.get("topologies").is_none());
        assert_eq!(n.fetch("state/domain_id").unwrap().to_i64().unwrap(), 3);
    }
}
