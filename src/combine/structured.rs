//! Structured assembly: stitch uniform or rectilinear bricks back into one
//! logical block.
//!
//! Every input contributes an IJK box (its `elements/origin` offset plus
//! its cell dims). Assembly succeeds when the boxes tile the bounding box
//! exactly once and the geometry agrees along the seams; any failed check
//! makes the caller fall back to unstructured assembly.

use std::collections::BTreeMap;

use crate::combine::fields::merge_fields;
use crate::error::MeshRepartError;
use crate::mesh::coordset::{self, CoordsetKind, AXES, LOGICAL_AXES, SPACING_AXES};
use crate::mesh::{domain, topology};
use crate::tree::Node;

/// Relative tolerance for spacing and seam-coordinate agreement.
const SEAM_REL_TOL: f64 = 1e-8;

struct Block<'a> {
    cset: &'a Node,
    /// IJK cell offset in the combined brick.
    origin: [u64; 3],
    cells: [u64; 3],
}

/// Try to recombine the inputs as one structured mesh.
///
/// Returns `Ok(false)` when the inputs do not tile a brick or their
/// geometry disagrees; the caller then assembles unstructured.
pub fn combine_as_structured(
    domain_id: i64,
    inputs: &[&Node],
    output: &mut Node,
) -> Result<bool, MeshRepartError> {
    let first_topos = inputs[0].fetch("topologies")?;
    let (topo_name, first_topo) = first_topos.child_at(0).expect("one topology");
    let topo_name = topo_name.to_owned();
    let cset_name = topology::coordset_name(first_topo)?.to_owned();
    let ckind = coordset::kind(domain::coordset_for(inputs[0], first_topo)?)?;
    let ndim = coordset::dimension(domain::coordset_for(inputs[0], first_topo)?)?;

    // collect one block per input
    let mut blocks = Vec::with_capacity(inputs.len());
    for input in inputs {
        let topos = input.fetch("topologies")?;
        let (name, topo) = topos.child_at(0).expect("one topology");
        if name != topo_name {
            return Ok(false);
        }
        let cset = domain::coordset_for(input, topo)?;
        if coordset::dimension(cset)? != ndim {
            return Ok(false);
        }
        blocks.push(Block {
            cset,
            origin: topology::origin_ijk(topo)?,
            cells: topology::cell_dims(topo, cset)?,
        });
    }

    // bounding brick and exact-once coverage
    let mut lo = [u64::MAX; 3];
    let mut hi = [0u64; 3];
    for b in &blocks {
        for a in 0..3 {
            lo[a] = lo[a].min(b.origin[a]);
            hi[a] = hi[a].max(b.origin[a] + b.cells[a]);
        }
    }
    let gcells = [hi[0] - lo[0], hi[1] - lo[1], hi[2] - lo[2]];
    let total = gcells[0] * gcells[1] * gcells[2];
    let sum: u64 = blocks
        .iter()
        .map(|b| b.cells[0] * b.cells[1] * b.cells[2])
        .sum();
    if sum != total {
        return Ok(false);
    }
    let cell_index = |g: [u64; 3]| ((g[2] * gcells[1] + g[1]) * gcells[0] + g[0]) as usize;
    let mut cover = vec![0u8; total as usize];
    for b in &blocks {
        for k in 0..b.cells[2] {
            for j in 0..b.cells[1] {
                for i in 0..b.cells[0] {
                    let g = [
                        b.origin[0] + i - lo[0],
                        b.origin[1] + j - lo[1],
                        b.origin[2] + k - lo[2],
                    ];
                    let idx = cell_index(g);
                    if cover[idx] != 0 {
                        return Ok(false);
                    }
                    cover[idx] = 1;
                }
            }
        }
    }

    // geometry: one combined coordset, seams verified
    let out_cset = match ckind {
        CoordsetKind::Uniform => {
            match combined_uniform_coordset(&blocks, lo, gcells, ndim)? {
                Some(c) => c,
                None => return Ok(false),
            }
        }
        CoordsetKind::Rectilinear => {
            match combined_rectilinear_coordset(&blocks, lo, gcells, ndim)? {
                Some(c) => c,
                None => return Ok(false),
            }
        }
        CoordsetKind::Explicit => return Ok(false),
    };
    output.fetch_mut("coordsets").insert_child(&cset_name, out_cset);
    let t = output.fetch_mut(&format!("topologies/{topo_name}"));
    t.fetch_mut("type").set_str(ckind.as_str());
    t.fetch_mut("coordset").set_str(&cset_name);

    // provenance of every output cell and vertex
    let mut elem_placement = vec![(0u32, 0u64); total as usize];
    for (bi, b) in blocks.iter().enumerate() {
        let mut local = 0u64;
        for k in 0..b.cells[2] {
            for j in 0..b.cells[1] {
                for i in 0..b.cells[0] {
                    let g = [
                        b.origin[0] + i - lo[0],
                        b.origin[1] + j - lo[1],
                        b.origin[2] + k - lo[2],
                    ];
                    elem_placement[cell_index(g)] = (bi as u32, local);
                    local += 1;
                }
            }
        }
    }
    let gpts = [
        if ndim > 0 { gcells[0] + 1 } else { 1 },
        if ndim > 1 { gcells[1] + 1 } else { 1 },
        if ndim > 2 { gcells[2] + 1 } else { 1 },
    ];
    let mut vertex_placement = vec![(0u32, 0u64); (gpts[0] * gpts[1] * gpts[2]) as usize];
    for (bi, b) in blocks.iter().enumerate() {
        let lpts = [
            if ndim > 0 { b.cells[0] + 1 } else { 1 },
            if ndim > 1 { b.cells[1] + 1 } else { 1 },
            if ndim > 2 { b.cells[2] + 1 } else { 1 },
        ];
        let mut local = 0u64;
        for k in 0..lpts[2] {
            for j in 0..lpts[1] {
                for i in 0..lpts[0] {
                    let g = [
                        b.origin[0] + i - lo[0],
                        b.origin[1] + j - lo[1],
                        b.origin[2] + k - lo[2],
                    ];
                    let gv = coordset::vertex_id(g, gpts);
                    vertex_placement[gv as usize] = (bi as u32, local);
                    local += 1;
                }
            }
        }
    }

    let mut elem_placements = BTreeMap::new();
    elem_placements.insert(topo_name, elem_placement);
    merge_fields(domain_id, inputs, &elem_placements, &vertex_placement, output)?;

    output.fetch_mut("state/domain_id").set_i64(domain_id);
    for key in ["state/cycle", "state/time"] {
        if let Some(v) = inputs[0].get(key) {
            *output.fetch_mut(key) = v.clone();
        }
    }
    Ok(true)
}

fn combined_uniform_coordset(
    blocks: &[Block<'_>],
    lo: [u64; 3],
    gcells: [u64; 3],
    ndim: usize,
) -> Result<Option<Node>, MeshRepartError> {
    let spacing = coordset::uniform_spacing(blocks[0].cset)?;
    let first_origin = coordset::uniform_origin(blocks[0].cset)?;
    let mut world = [0.0; 3];
    for a in 0..ndim {
        world[a] = first_origin[a] - (blocks[0].origin[a] - lo[a]) as f64 * spacing[a];
    }
    for b in blocks {
        let s = coordset::uniform_spacing(b.cset)?;
        let o = coordset::uniform_origin(b.cset)?;
        for a in 0..ndim {
            let tol = SEAM_REL_TOL * spacing[a].abs().max(1.0);
            if (s[a] - spacing[a]).abs() > tol {
                return Ok(None);
            }
            let expect = world[a] + (b.origin[a] - lo[a]) as f64 * spacing[a];
            if (o[a] - expect).abs() > tol {
                return Ok(None);
            }
        }
    }
    let mut out = Node::new();
    out.fetch_mut("type").set_str("uniform");
    for a in 0..ndim {
        out.fetch_mut(&format!("dims/{}", LOGICAL_AXES[a]))
            .set_u64(gcells[a] + 1);
        out.fetch_mut(&format!("origin/{}", AXES[a])).set_f64(world[a]);
        out.fetch_mut(&format!("spacing/{}", SPACING_AXES[a]))
            .set_f64(spacing[a]);
    }
    Ok(Some(out))
}

fn combined_rectilinear_coordset(
    blocks: &[Block<'_>],
    lo: [u64; 3],
    gcells: [u64; 3],
    ndim: usize,
) -> Result<Option<Node>, MeshRepartError> {
    let mut out = Node::new();
    out.fetch_mut("type").set_str("rectilinear");
    for a in 0..ndim {
        let n = (gcells[a] + 1) as usize;
        let mut axis = vec![f64::NAN; n];
        for b in blocks {
            let arr = b.cset.fetch("values")?.fetch(AXES[a])?.as_array()?;
            if arr.len() as u64 != b.cells[a] + 1 {
                return Ok(None);
            }
            for t in 0..arr.len() {
                let pos = (b.origin[a] - lo[a]) as usize + t;
                let v = arr.f64_at(t);
                let cur = axis[pos];
                if cur.is_nan() {
                    axis[pos] = v;
                } else {
                    let tol = SEAM_REL_TOL * cur.abs().max(1.0);
                    if (cur - v).abs() > tol {
                        return Ok(None);
                    }
                }
            }
        }
        if axis.iter().any(|v| v.is_nan()) {
            return Ok(None);
        }
        out.fetch_mut(&format!("values/{}", AXES[a])).set_array(axis);
    }
    Ok(Some(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meshgen;

    #[test]
    fn two_uniform_halves_tile() {
        // left half [0..1]x[0..2] of a 2x2 grid, right half [1..2]x[0..2]
        let mut left = meshgen::uniform([2, 3, 1], [0.0, 0.0, 0.0], [1.0, 1.0, 1.0]);
        let mut right = meshgen::uniform([2, 3, 1], [1.0, 0.0, 0.0], [1.0, 1.0, 1.0]);
        right
            .fetch_mut("topologies/mesh/elements/origin/i0")
            .set_u64(1);
        left.fetch_mut("topologies/mesh/elements/origin/i0")
            .set_u64(0);
        let mut out = Node::new();
        let ok = combine_as_structured(0, &[&left, &right], &mut out).unwrap();
        assert!(ok);
        assert_eq!(out.fetch("coordsets/coords/dims/i").unwrap().to_u64().unwrap(), 3);
        assert_eq!(out.fetch("coordsets/coords/dims/j").unwrap().to_u64().unwrap(), 3);
        assert_eq!(out.fetch("state/domain_id").unwrap().to_i64().unwrap(), 0);
    }

    #[test]
    fn overlapping_bricks_fall_back() {
        let a = meshgen::uniform([3, 3, 1], [0.0, 0.0, 0.0], [1.0, 1.0, 1.0]);
        let b = meshgen::uniform([3, 3, 1], [0.0, 0.0, 0.0], [1.0, 1.0, 1.0]);
        let mut out = Node::new();
        let ok = combine_as_structured(0, &[&a, &b], &mut out).unwrap();
        assert!(!ok);
    }

    #[test]
    fn mismatched_spacing_falls_back() {
        let left = meshgen::uniform([2, 2, 1], [0.0, 0.0, 0.0], [1.0, 1.0, 1.0]);
        let mut right = meshgen::uniform([2, 2, 1], [1.0, 0.0, 0.0], [0.5, 1.0, 1.0]);
        right
            .fetch_mut("topologies/mesh/elements/origin/i0")
            .set_u64(1);
        let mut out = Node::new();
        let ok = combine_as_structured(0, &[&left, &right], &mut out).unwrap();
        assert!(!ok);
    }
}
