//! Field selections: an element field whose integer values name the
//! destination domain of every element.
//!
//! Partitioning a field selection is one-shot: it happens during
//! `initialize` and yields one pinned explicit sub-selection per distinct
//! tag value. The splitter never divides those further.

use std::collections::BTreeMap;

use crate::error::MeshRepartError;
use crate::mesh::{self, domain};
use crate::selection::{ExplicitSelection, Selection, SelectionCommon};
use crate::tree::Node;

#[derive(Clone, Debug, PartialEq)]
pub struct FieldSelection {
    pub common: SelectionCommon,
    /// Name of the tag field.
    pub field: String,
}

impl FieldSelection {
    pub fn from_node(
        common: SelectionCommon,
        n: &Node,
        path: &str,
    ) -> Result<Self, MeshRepartError> {
        let field = n
            .get("field")
            .ok_or_else(|| MeshRepartError::OptionMalformed {
                path: format!("{path}/field"),
                reason: "field selection requires `field`".into(),
            })?
            .as_str()?
            .to_owned();
        Ok(Self { common, field })
    }

    fn field_node<'a>(&self, mesh: &'a Node) -> Result<&'a Node, MeshRepartError> {
        mesh.get("fields")
            .and_then(|f| f.child(&self.field))
            .ok_or_else(|| MeshRepartError::PathNotFound(format!("fields/{}", self.field)))
    }

    pub fn applicable(&self, mesh: &Node) -> Result<bool, MeshRepartError> {
        let Ok(field) = self.field_node(mesh) else {
            return Ok(false);
        };
        if mesh::field_association(field)? != mesh::Association::Element {
            return Ok(false);
        }
        // the field must tag the topology this selection targets
        let bound = field.fetch("topology")?.as_str()?;
        Ok(bound == self.common.topology)
    }

    pub fn length(&self, mesh: &Node) -> Result<u64, MeshRepartError> {
        domain::topology_len(mesh, &self.common.topology)
    }

    pub fn is_whole(&self) -> bool {
        true
    }

    /// One-shot partition: one pinned explicit selection per distinct tag.
    pub fn partition(&self, mesh: &Node) -> Result<Vec<Selection>, MeshRepartError> {
        let values = self.field_node(mesh)?.fetch("values")?.as_array()?;
        let mut by_tag: BTreeMap<i64, Vec<u64>> = BTreeMap::new();
        for i in 0..values.len() {
            by_tag.entry(values.i64_at(i)).or_default().push(i as u64);
        }
        Ok(by_tag
            .into_iter()
            .map(|(tag, ids)| {
                let mut common = self.common.clone();
                common.destination_domain = tag;
                common.splittable = false;
                Selection::Explicit(ExplicitSelection::new(common, ids))
            })
            .collect())
    }

    pub fn project_elements(
        &self,
        mesh: &Node,
        lo: u64,
        hi: u64,
        out: &mut Vec<u64>,
    ) -> Result<(), MeshRepartError> {
        let n = self.length(mesh)?;
        if n == 0 {
            return Ok(());
        }
        for id in lo..=hi.min(n - 1) {
            out.push(id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::FREE_RANK_ID;

    fn tagged_mesh() -> Node {
        let mut m = Node::new();
        m.fetch_mut("coordsets/coords/type").set_str("explicit");
        m.fetch_mut("coordsets/coords/values/x")
            .set_array(vec![0.0f64; 8]);
        m.fetch_mut("topologies/mesh/type").set_str("unstructured");
        m.fetch_mut("topologies/mesh/coordset").set_str("coords");
        m.fetch_mut("topologies/mesh/elements/shape").set_str("tri");
        m.fetch_mut("topologies/mesh/elements/connectivity")
            .set_array((0..18u64).map(|i| i % 8).collect::<Vec<_>>());
        m.fetch_mut("fields/part/association").set_str("element");
        m.fetch_mut("fields/part/topology").set_str("mesh");
        m.fetch_mut("fields/part/values")
            .set_array(vec![0i64, 0, 1, 1, 2, 2]);
        m
    }

    fn sel() -> FieldSelection {
        let mut common = SelectionCommon::default();
        common.topology = "mesh".into();
        FieldSelection {
            common,
            field: "part".into(),
        }
    }

    #[test]
    fn one_shot_partition_pins_tags() {
        let m = tagged_mesh();
        let s = sel();
        assert!(s.applicable(&m).unwrap());
        let parts = s.partition(&m).unwrap();
        assert_eq!(parts.len(), 3);
        for (i, p) in parts.iter().enumerate() {
            assert_eq!(p.common().destination_domain, i as i64);
            assert_eq!(p.common().destination_rank, FREE_RANK_ID);
            assert!(!p.common().splittable);
            assert_eq!(p.length(&m).unwrap(), 2);
        }
    }

    #[test]
    fn missing_field_is_not_applicable() {
        let m = tagged_mesh();
        let mut s = sel();
        s.field = "missing".into();
        assert!(!s.applicable(&m).unwrap());
    }

    #[test]
    fn unexpanded_selection_covers_every_element() {
        // a field selection is a live value between options parsing and
        // its one-shot expansion; it measures as the whole topology
        let m = tagged_mesh();
        let s = Selection::Field(sel());
        assert_eq!(s.length(&m).unwrap(), 6);
        assert!(s.is_whole(&m).unwrap());
        assert!(!s.can_split(&m));

        let mut ids = Vec::new();
        s.project_elements(&m, 1, 4, &mut ids).unwrap();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        ids.clear();
        s.project_elements(&m, 0, u64::MAX, &mut ids).unwrap();
        assert_eq!(ids, (0..6).collect::<Vec<u64>>());
    }
}
