//! Introspection helpers over blueprint-shaped mesh trees.
//!
//! A mesh domain is an attribute subtree with `coordsets`, `topologies` and
//! optional `fields` / `state` children. These modules read and build such
//! trees; none of them mutate their inputs.

pub mod coordset;
pub mod domain;
pub mod topology;

use crate::error::MeshRepartError;
use crate::tree::Node;

/// Field association: values bound to vertices or to elements.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Association {
    Vertex,
    Element,
}

impl Association {
    pub fn from_str(s: &str) -> Result<Self, MeshRepartError> {
        match s {
            "vertex" => Ok(Association::Vertex),
            "element" => Ok(Association::Element),
            other => Err(MeshRepartError::OptionMalformed {
                path: "association".into(),
                reason: format!("unknown association `{other}`"),
            }),
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Association::Vertex => "vertex",
            Association::Element => "element",
        }
    }
}

/// Association of a field node.
pub fn field_association(field: &Node) -> Result<Association, MeshRepartError> {
    Association::from_str(field.fetch("association")?.as_str()?)
}
