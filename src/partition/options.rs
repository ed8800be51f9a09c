//! Options schema: parse and validate the partitioning request.

use crate::error::MeshRepartError;
use crate::selection::Selection;
use crate::tree::Node;

/// Parsed partitioning options.
#[derive(Clone, Debug)]
pub struct Options {
    /// Desired output domain count; `None` means "not requested".
    pub target: Option<u64>,
    /// Restrict which fields appear in output; empty keeps all.
    pub fields: Vec<String>,
    /// Emit `original_element_ids` / `original_vertex_ids`.
    pub mapping: bool,
    /// Vertex coincidence threshold as a fraction of the bounding-box
    /// diagonal.
    pub merge_tolerance: f64,
    pub selections: Vec<Selection>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            target: None,
            fields: Vec::new(),
            mapping: true,
            merge_tolerance: 1e-12,
            selections: Vec::new(),
        }
    }
}

impl Options {
    /// Parse the options subtree, rejecting unknown keys and malformed
    /// values.
    pub fn from_node(n: &Node) -> Result<Self, MeshRepartError> {
        let mut opts = Options::default();
        for (key, child) in n.children() {
            match key {
                "target" => {
                    let t = child.to_u64().map_err(|_| MeshRepartError::OptionMalformed {
                        path: "target".into(),
                        reason: "expected an unsigned integer".into(),
                    })?;
                    if t == 0 {
                        return Err(MeshRepartError::OptionMalformed {
                            path: "target".into(),
                            reason: "target must be at least 1".into(),
                        });
                    }
                    opts.target = Some(t);
                }
                "fields" => {
                    for (_, f) in child.children() {
                        opts.fields.push(
                            f.as_str()
                                .map_err(|_| MeshRepartError::OptionMalformed {
                                    path: "fields".into(),
                                    reason: "each entry must be a field name".into(),
                                })?
                                .to_owned(),
                        );
                    }
                }
                "mapping" => {
                    opts.mapping = child.to_i64().map_err(|_| {
                        MeshRepartError::OptionMalformed {
                            path: "mapping".into(),
                            reason: "expected 0 or 1".into(),
                        }
                    })? != 0;
                }
                "merge_tolerance" => {
                    let tol = child.to_f64().map_err(|_| MeshRepartError::OptionMalformed {
                        path: "merge_tolerance".into(),
                        reason: "expected a float".into(),
                    })?;
                    if !(tol >= 0.0) {
                        return Err(MeshRepartError::OptionMalformed {
                            path: "merge_tolerance".into(),
                            reason: format!("tolerance {tol} must be non-negative"),
                        });
                    }
                    opts.merge_tolerance = tol;
                }
                "selections" => {
                    for (i, (_, sel)) in child.children().enumerate() {
                        let path = format!("selections[{i}]");
                        opts.selections.push(Selection::from_node(sel, &path)?);
                    }
                }
                other => {
                    return Err(MeshRepartError::OptionMalformed {
                        path: other.to_owned(),
                        reason: "unknown option".into(),
                    });
                }
            }
        }
        Ok(opts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let o = Options::from_node(&Node::new()).unwrap();
        assert_eq!(o.target, None);
        assert!(o.mapping);
        assert_eq!(o.merge_tolerance, 1e-12);
        assert!(o.selections.is_empty());
    }

    #[test]
    fn unknown_key_is_rejected() {
        let mut n = Node::new();
        n.fetch_mut("tarqet").set_u64(2);
        assert!(Options::from_node(&n).is_err());
    }

    #[test]
    fn parses_selections() {
        let mut n = Node::new();
        n.fetch_mut("target").set_u64(4);
        n.fetch_mut("mapping").set_i64(0);
        let s = n.fetch_mut("selections/s0");
        s.fetch_mut("type").set_str("ranges");
        s.fetch_mut("ranges").set_array(vec![0u64, 3]);
        let o = Options::from_node(&n).unwrap();
        assert_eq!(o.target, Some(4));
        assert!(!o.mapping);
        assert_eq!(o.selections.len(), 1);
    }
}
