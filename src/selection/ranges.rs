//! Ranges selections: disjoint, sorted `[lo, hi]` element id ranges.

use crate::error::MeshRepartError;
use crate::selection::{u64_list, Selection, SelectionCommon};
use crate::tree::Node;

#[derive(Clone, Debug, PartialEq)]
pub struct RangesSelection {
    pub common: SelectionCommon,
    /// Inclusive (lo, hi) pairs, ascending and disjoint.
    pub ranges: Vec<(u64, u64)>,
}

impl RangesSelection {
    pub fn from_node(
        common: SelectionCommon,
        n: &Node,
        path: &str,
    ) -> Result<Self, MeshRepartError> {
        let child = n
            .get("ranges")
            .ok_or_else(|| MeshRepartError::OptionMalformed {
                path: format!("{path}/ranges"),
                reason: "ranges selection requires `ranges`".into(),
            })?;
        let flat = u64_list(child, &format!("{path}/ranges"))?;
        if flat.is_empty() || flat.len() % 2 != 0 {
            return Err(MeshRepartError::OptionMalformed {
                path: format!("{path}/ranges"),
                reason: format!("expected a non-empty even-length array, got {}", flat.len()),
            });
        }
        let ranges: Vec<(u64, u64)> = flat.chunks_exact(2).map(|p| (p[0], p[1])).collect();
        for (i, &(lo, hi)) in ranges.iter().enumerate() {
            if lo > hi {
                return Err(MeshRepartError::OptionMalformed {
                    path: format!("{path}/ranges"),
                    reason: format!("range {i} has lo {lo} > hi {hi}"),
                });
            }
            if i > 0 && lo <= ranges[i - 1].1 {
                return Err(MeshRepartError::OptionMalformed {
                    path: format!("{path}/ranges"),
                    reason: format!("range {i} overlaps or is out of order"),
                });
            }
        }
        Ok(Self { common, ranges })
    }

    pub fn new(common: SelectionCommon, ranges: Vec<(u64, u64)>) -> Self {
        Self { common, ranges }
    }

    pub fn applicable(&self, _mesh: &Node) -> Result<bool, MeshRepartError> {
        Ok(true)
    }

    pub fn length(&self) -> u64 {
        self.ranges.iter().map(|&(lo, hi)| hi - lo + 1).sum()
    }

    pub fn is_whole(&self, mesh: &Node) -> Result<bool, MeshRepartError> {
        let n = crate::mesh::domain::topology_len(mesh, &self.common.topology)?;
        Ok(self.length() == n
            && self.ranges.first().map(|&(lo, _)| lo) == Some(0)
            && self.ranges.last().map(|&(_, hi)| hi) == Some(n.saturating_sub(1)))
    }

    /// Split so the left half holds at least `total / 2` elements.
    pub fn partition(&self) -> Result<Vec<Selection>, MeshRepartError> {
        let total = self.length();
        if total < 2 {
            return Ok(vec![Selection::Ranges(self.clone())]);
        }
        let half = total / 2;
        let mut acc = 0u64;
        for (i, &(lo, hi)) in self.ranges.iter().enumerate() {
            let n = hi - lo + 1;
            if acc + n < half {
                acc += n;
                continue;
            }
            let need = half - acc;
            let (left, right) = if need == 0 {
                (self.ranges[..i].to_vec(), self.ranges[i..].to_vec())
            } else if need == n {
                (self.ranges[..=i].to_vec(), self.ranges[i + 1..].to_vec())
            } else {
                let mut left = self.ranges[..i].to_vec();
                left.push((lo, lo + need - 1));
                let mut right = vec![(lo + need, hi)];
                right.extend_from_slice(&self.ranges[i + 1..]);
                (left, right)
            };
            if left.is_empty() || right.is_empty() {
                break;
            }
            return Ok(vec![
                Selection::Ranges(Self {
                    common: self.common.clone(),
                    ranges: left,
                }),
                Selection::Ranges(Self {
                    common: self.common.clone(),
                    ranges: right,
                }),
            ]);
        }
        Ok(vec![Selection::Ranges(self.clone())])
    }

    pub fn project_elements(
        &self,
        lo: u64,
        hi: u64,
        out: &mut Vec<u64>,
    ) -> Result<(), MeshRepartError> {
        for &(rlo, rhi) in &self.ranges {
            if rhi < lo || rlo > hi {
                continue;
            }
            for id in rlo.max(lo)..=rhi.min(hi) {
                out.push(id);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sel(pairs: &[(u64, u64)]) -> RangesSelection {
        RangesSelection::new(SelectionCommon::default(), pairs.to_vec())
    }

    #[test]
    fn length_sums_ranges() {
        assert_eq!(sel(&[(0, 2), (5, 7), (9, 9)]).length(), 7);
    }

    #[test]
    fn split_balances_left_half() {
        let s = sel(&[(0, 2), (5, 7), (9, 9)]);
        let parts = s.partition().unwrap();
        assert_eq!(parts.len(), 2);
        let mesh = Node::new();
        let (l, r) = (
            parts[0].length(&mesh).unwrap(),
            parts[1].length(&mesh).unwrap(),
        );
        assert_eq!(l + r, 7);
        assert!(l >= 3);
    }

    #[test]
    fn split_inside_a_range() {
        let s = sel(&[(0, 9)]);
        let parts = s.partition().unwrap();
        let mut ids = Vec::new();
        for p in &parts {
            p.project_elements(&Node::new(), 0, u64::MAX, &mut ids)
                .unwrap();
        }
        assert_eq!(ids, (0..10).collect::<Vec<u64>>());
    }

    #[test]
    fn overlapping_input_is_rejected() {
        let mut n = Node::new();
        n.fetch_mut("ranges").set_array(vec![0u64, 5, 4, 9]);
        assert!(RangesSelection::from_node(SelectionCommon::default(), &n, "selections[0]").is_err());
    }

    #[test]
    fn projection_clamps_to_query() {
        let s = sel(&[(0, 2), (5, 7), (9, 9)]);
        let mut out = Vec::new();
        s.project_elements(2, 6, &mut out).unwrap();
        assert_eq!(out, vec![2, 5, 6]);
    }
}
