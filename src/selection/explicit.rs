//! Explicit selections: a sorted unique list of element ids.

use crate::error::MeshRepartError;
use crate::selection::{u64_list, Selection, SelectionCommon};
use crate::tree::Node;

#[derive(Clone, Debug, PartialEq)]
pub struct ExplicitSelection {
    pub common: SelectionCommon,
    /// Strictly increasing element ids.
    pub elements: Vec<u64>,
}

impl ExplicitSelection {
    pub fn from_node(
        common: SelectionCommon,
        n: &Node,
        path: &str,
    ) -> Result<Self, MeshRepartError> {
        let child = n
            .get("elements")
            .ok_or_else(|| MeshRepartError::OptionMalformed {
                path: format!("{path}/elements"),
                reason: "explicit selection requires `elements`".into(),
            })?;
        let mut elements = u64_list(child, &format!("{path}/elements"))?;
        elements.sort_unstable();
        if elements.windows(2).any(|w| w[0] == w[1]) {
            return Err(MeshRepartError::OptionMalformed {
                path: format!("{path}/elements"),
                reason: "duplicate element ids".into(),
            });
        }
        Ok(Self { common, elements })
    }

    pub fn new(common: SelectionCommon, elements: Vec<u64>) -> Self {
        debug_assert!(elements.windows(2).all(|w| w[0] < w[1]));
        Self { common, elements }
    }

    pub fn applicable(&self, _mesh: &Node) -> Result<bool, MeshRepartError> {
        // element id lists make sense on every topology kind
        Ok(true)
    }

    pub fn length(&self) -> u64 {
        self.elements.len() as u64
    }

    pub fn is_whole(&self, mesh: &Node) -> Result<bool, MeshRepartError> {
        let n = crate::mesh::domain::topology_len(mesh, &self.common.topology)?;
        Ok(self.elements.len() as u64 == n
            && self.elements.first() == Some(&0)
            && self.elements.last() == Some(&n.saturating_sub(1)))
    }

    /// Split the sorted id vector at its midpoint.
    pub fn partition(&self) -> Result<Vec<Selection>, MeshRepartError> {
        if self.elements.len() < 2 {
            return Ok(vec![Selection::Explicit(self.clone())]);
        }
        let mid = self.elements.len() / 2;
        Ok(vec![
            Selection::Explicit(Self {
                common: self.common.clone(),
                elements: self.elements[..mid].to_vec(),
            }),
            Selection::Explicit(Self {
                common: self.common.clone(),
                elements: self.elements[mid..].to_vec(),
            }),
        ])
    }

    pub fn project_elements(
        &self,
        lo: u64,
        hi: u64,
        out: &mut Vec<u64>,
    ) -> Result<(), MeshRepartError> {
        let from = self.elements.partition_point(|&e| e < lo);
        let to = self.elements.partition_point(|&e| e <= hi);
        out.extend_from_slice(&self.elements[from..to]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sel(ids: &[u64]) -> ExplicitSelection {
        ExplicitSelection::new(SelectionCommon::default(), ids.to_vec())
    }

    #[test]
    fn midpoint_split_preserves_union() {
        let s = sel(&[1, 4, 6, 9, 12]);
        let parts = s.partition().unwrap();
        let mut all = Vec::new();
        for p in &parts {
            p.project_elements(&Node::new(), 0, u64::MAX, &mut all)
                .unwrap();
        }
        assert_eq!(all, vec![1, 4, 6, 9, 12]);
    }

    #[test]
    fn projection_clamps() {
        let s = sel(&[1, 4, 6, 9, 12]);
        let mut out = Vec::new();
        s.project_elements(4, 9, &mut out).unwrap();
        assert_eq!(out, vec![4, 6, 9]);
    }

    #[test]
    fn duplicates_are_rejected() {
        let mut n = Node::new();
        n.fetch_mut("type").set_str("explicit");
        n.fetch_mut("elements").set_array(vec![3u64, 1, 3]);
        let err = ExplicitSelection::from_node(SelectionCommon::default(), &n, "selections[0]");
        assert!(err.is_err());
    }
}
