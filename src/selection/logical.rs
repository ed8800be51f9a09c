//! Logical selections: axis-aligned IJK sub-boxes of implicit topologies.
//!
//! `start`/`end` are inclusive point-space bounds; the covered elements
//! along an axis are the cells between those point planes, so an axis spans
//! `end - start` cells and a flat axis (`end == start`) selects none. A
//! flat axis is a singleton: it is never split.

use crate::error::MeshRepartError;
use crate::mesh::{domain, topology};
use crate::selection::{u64_list, Selection, SelectionCommon};
use crate::tree::Node;

#[derive(Clone, Debug, PartialEq)]
pub struct LogicalSelection {
    pub common: SelectionCommon,
    pub start: [u64; 3],
    pub end: [u64; 3],
}

impl LogicalSelection {
    pub fn from_node(
        common: SelectionCommon,
        n: &Node,
        path: &str,
    ) -> Result<Self, MeshRepartError> {
        let start = read_triple(n, path, "start")?;
        let end = read_triple(n, path, "end")?;
        for a in 0..3 {
            if start[a] > end[a] {
                return Err(MeshRepartError::OptionMalformed {
                    path: format!("{path}/start"),
                    reason: format!("start[{a}] = {} exceeds end[{a}] = {}", start[a], end[a]),
                });
            }
        }
        Ok(Self { common, start, end })
    }

    /// Whole-mesh selection over an implicit topology.
    pub fn whole(common: SelectionCommon, point_dims: [u64; 3]) -> Self {
        Self {
            common,
            start: [0; 3],
            end: [
                point_dims[0].saturating_sub(1),
                point_dims[1].saturating_sub(1),
                point_dims[2].saturating_sub(1),
            ],
        }
    }

    fn dims(&self, mesh: &Node) -> Result<([u64; 3], usize), MeshRepartError> {
        let topo = domain::topology(mesh, &self.common.topology)?;
        let cset = domain::coordset_for(mesh, topo)?;
        Ok((
            topology::point_dims_for(topo, cset)?,
            topology::logical_dimension(topo, cset)?,
        ))
    }

    pub fn applicable(&self, mesh: &Node) -> Result<bool, MeshRepartError> {
        let topo = domain::topology(mesh, &self.common.topology)?;
        Ok(topology::kind(topo)?.is_implicit())
    }

    /// Clamp the box to the mesh extents.
    pub fn resolve(&mut self, mesh: &Node) -> Result<(), MeshRepartError> {
        let (pts, ndim) = self.dims(mesh)?;
        for a in 0..3 {
            let max = if a < ndim { pts[a] - 1 } else { 0 };
            if self.start[a] > max {
                return Err(MeshRepartError::OptionMalformed {
                    path: "start".into(),
                    reason: format!(
                        "start[{a}] = {} is outside the {}-point axis",
                        self.start[a], pts[a]
                    ),
                });
            }
            if self.end[a] > max {
                self.end[a] = max;
            }
        }
        Ok(())
    }

    /// Cells spanned along each axis.
    fn spans(&self) -> [u64; 3] {
        [
            self.end[0] - self.start[0],
            self.end[1] - self.start[1],
            self.end[2] - self.start[2],
        ]
    }

    pub fn length(&self, mesh: &Node) -> Result<u64, MeshRepartError> {
        let (_, ndim) = self.dims(mesh)?;
        let spans = self.spans();
        Ok((0..ndim).map(|a| spans[a]).product())
    }

    pub fn is_whole(&self, mesh: &Node) -> Result<bool, MeshRepartError> {
        let (pts, ndim) = self.dims(mesh)?;
        for a in 0..ndim {
            if self.start[a] != 0 || self.end[a] != pts[a] - 1 {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn can_split(&self, _mesh: &Node) -> bool {
        self.spans().iter().any(|&s| s >= 2)
    }

    /// Halve along the longest axis; ties prefer i over j over k.
    pub fn partition(&self) -> Result<Vec<Selection>, MeshRepartError> {
        let spans = self.spans();
        let mut axis = None;
        for a in 0..3 {
            if spans[a] >= 2 && axis.map_or(true, |b: usize| spans[a] > spans[b]) {
                axis = Some(a);
            }
        }
        let Some(axis) = axis else {
            return Ok(vec![Selection::Logical(self.clone())]);
        };
        let mid = self.start[axis] + spans[axis] / 2;
        let mut left = self.clone();
        left.end[axis] = mid;
        let mut right = self.clone();
        right.start[axis] = mid;
        Ok(vec![Selection::Logical(left), Selection::Logical(right)])
    }

    pub fn project_elements(
        &self,
        mesh: &Node,
        lo: u64,
        hi: u64,
        out: &mut Vec<u64>,
    ) -> Result<(), MeshRepartError> {
        let topo = domain::topology(mesh, &self.common.topology)?;
        let cset = domain::coordset_for(mesh, topo)?;
        let cells = topology::cell_dims(topo, cset)?;
        let (_, ndim) = self.dims(mesh)?;
        let spans = self.spans();
        if (0..ndim).any(|a| spans[a] == 0) {
            return Ok(());
        }
        let kr = if ndim > 2 {
            self.start[2]..self.end[2]
        } else {
            0..1
        };
        let jr = if ndim > 1 {
            self.start[1]..self.end[1]
        } else {
            0..1
        };
        for k in kr {
            for j in jr.clone() {
                for i in self.start[0]..self.end[0] {
                    let id = (k * cells[1] + j) * cells[0] + i;
                    if id >= lo && id <= hi {
                        out.push(id);
                    }
                }
            }
        }
        Ok(())
    }
}

fn read_triple(n: &Node, path: &str, key: &str) -> Result<[u64; 3], MeshRepartError> {
    let child = n.get(key).ok_or_else(|| MeshRepartError::OptionMalformed {
        path: format!("{path}/{key}"),
        reason: "logical selection requires `start` and `end`".into(),
    })?;
    let list = u64_list(child, &format!("{path}/{key}"))?;
    if list.is_empty() || list.len() > 3 {
        return Err(MeshRepartError::OptionMalformed {
            path: format!("{path}/{key}"),
            reason: format!("expected 1..3 indices, got {}", list.len()),
        });
    }
    let mut t = [0u64; 3];
    t[..list.len()].copy_from_slice(&list);
    Ok(t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::Selection;

    fn mesh_5x5() -> Node {
        let mut m = Node::new();
        m.fetch_mut("coordsets/coords/type").set_str("uniform");
        m.fetch_mut("coordsets/coords/dims/i").set_u64(5);
        m.fetch_mut("coordsets/coords/dims/j").set_u64(5);
        m.fetch_mut("topologies/mesh/type").set_str("uniform");
        m.fetch_mut("topologies/mesh/coordset").set_str("coords");
        m
    }

    fn boxed(start: [u64; 3], end: [u64; 3]) -> LogicalSelection {
        let mut common = SelectionCommon::default();
        common.topology = "mesh".into();
        LogicalSelection { common, start, end }
    }

    #[test]
    fn point_space_box_counts_cells() {
        let m = mesh_5x5();
        let s = boxed([1, 1, 0], [3, 3, 0]);
        assert_eq!(s.length(&m).unwrap(), 4);
        let mut ids = Vec::new();
        s.project_elements(&m, 0, u64::MAX, &mut ids).unwrap();
        assert_eq!(ids, vec![5, 6, 9, 10]);
    }

    #[test]
    fn whole_box_is_whole() {
        let m = mesh_5x5();
        let s = boxed([0, 0, 0], [4, 4, 0]);
        assert!(s.is_whole(&m).unwrap());
        assert_eq!(s.length(&m).unwrap(), 16);
    }

    #[test]
    fn halves_cover_the_box() {
        let m = mesh_5x5();
        let s = boxed([0, 0, 0], [4, 2, 0]);
        let parts = s.partition().unwrap();
        assert_eq!(parts.len(), 2);
        let total: u64 = parts.iter().map(|p| p.length(&m).unwrap()).sum();
        assert_eq!(total, s.length(&m).unwrap());
        // longest axis is i, split at its midpoint plane
        if let Selection::Logical(left) = &parts[0] {
            assert_eq!(left.end, [2, 2, 0]);
        } else {
            unreachable!()
        }
    }

    #[test]
    fn flat_axis_is_never_split() {
        let s = boxed([0, 0, 0], [0, 4, 0]);
        let parts = s.partition().unwrap();
        assert_eq!(parts.len(), 2);
        if let (Selection::Logical(a), Selection::Logical(b)) = (&parts[0], &parts[1]) {
            assert_eq!(a.start[0], 0);
            assert_eq!(a.end[0], 0);
            assert_eq!(b.start[0], 0);
            // split ran along j, the only axis with extent
            assert_eq!(a.end[1], 2);
            assert_eq!(b.start[1], 2);
        } else {
            unreachable!()
        }
    }
}
