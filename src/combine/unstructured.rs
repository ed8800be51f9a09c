//! Unstructured assembly: merge coordsets with coincident-vertex welding,
//! concatenate like-named topologies, and merge fields.

use std::collections::BTreeMap;

use hashbrown::HashMap;

use crate::combine::fields::merge_fields;
use crate::error::MeshRepartError;
use crate::mesh::coordset::{self, AXES};
use crate::mesh::topology::{self, Shape, TopoKind};
use crate::mesh::domain;
use crate::partition::options::Options;
use crate::tree::Node;

/// Combine the inputs into one unstructured mesh for `domain_id`.
pub fn combine_as_unstructured(
    domain_id: i64,
    inputs: &[&Node],
    opts: &Options,
    output: &mut Node,
) -> Result<(), MeshRepartError> {
    // ---- merge coordsets -----------------------------------------------
    let mut input_coords = Vec::with_capacity(inputs.len());
    let mut ndim = 0usize;
    for input in inputs {
        let cset = first_coordset(domain_id, input)?;
        ndim = ndim.max(coordset::dimension(cset)?);
        input_coords.push(coordset::all_point_coords(cset)?);
    }
    let mut bb_lo = [f64::INFINITY; 3];
    let mut bb_hi = [f64::NEG_INFINITY; 3];
    for coords in &input_coords {
        for p in coords {
            for a in 0..3 {
                bb_lo[a] = bb_lo[a].min(p[a]);
                bb_hi[a] = bb_hi[a].max(p[a]);
            }
        }
    }
    let diag = (0..3)
        .map(|a| (bb_hi[a] - bb_lo[a]).max(0.0).powi(2))
        .sum::<f64>()
        .sqrt();
    let tol = if diag.is_finite() {
        opts.merge_tolerance * diag
    } else {
        0.0
    };

    let mut merger = PointMerger::new(tol);
    let mut remaps: Vec<Vec<u64>> = Vec::with_capacity(inputs.len());
    for coords in &input_coords {
        let mut remap = Vec::with_capacity(coords.len());
        for &p in coords {
            remap.push(merger.insert(p) as u64);
        }
        remaps.push(remap);
    }

    let cset_name = {
        let (name, _) = inputs[0]
            .fetch("coordsets")?
            .child_at(0)
            .expect("input has a coordset");
        name.to_owned()
    };
    let out_cset = output.fetch_mut(&format!("coordsets/{cset_name}"));
    out_cset.fetch_mut("type").set_str("explicit");
    for a in 0..ndim.max(1) {
        let comp: Vec<f64> = merger.points.iter().map(|p| p[a]).collect();
        out_cset
            .fetch_mut(&format!("values/{}", AXES[a]))
            .set_array(comp);
    }

    // ---- merge topologies by name --------------------------------------
    let mut groups: BTreeMap<&str, Vec<(usize, &Node)>> = BTreeMap::new();
    for (i, input) in inputs.iter().enumerate() {
        if let Some(topos) = input.get("topologies") {
            for (name, topo) in topos.children() {
                groups.entry(name).or_default().push((i, topo));
            }
        }
    }
    let mut elem_placements: BTreeMap<String, Vec<(u32, u64)>> = BTreeMap::new();
    for (&name, members) in &groups {
        let merged = merge_topology_group(domain_id, name, members, inputs, &remaps, &cset_name)?;
        output
            .fetch_mut("topologies")
            .insert_child(name, merged.node);
        elem_placements.insert(name.to_owned(), merged.placement);
    }

    // ---- vertex provenance and fields ----------------------------------
    let mut vertex_placement = vec![(0u32, 0u64); merger.points.len()];
    for (i, remap) in remaps.iter().enumerate() {
        for (local, &merged) in remap.iter().enumerate() {
            vertex_placement[merged as usize] = (i as u32, local as u64);
        }
    }
    merge_fields(domain_id, inputs, &elem_placements, &vertex_placement, output)?;

    output.fetch_mut("state/domain_id").set_i64(domain_id);
    for key in ["state/cycle", "state/time"] {
        if let Some(v) = inputs.iter().find_map(|i| i.get(key)) {
            *output.fetch_mut(key) = v.clone();
        }
    }
    Ok(())
}

fn first_coordset<'a>(domain_id: i64, input: &'a Node) -> Result<&'a Node, MeshRepartError> {
    input
        .fetch("coordsets")?
        .child_at(0)
        .map(|(_, c)| c)
        .ok_or(MeshRepartError::CombinationConflict {
            domain: domain_id,
            field: "coordsets".into(),
            reason: "input carries no coordset".into(),
        })
}

struct MergedTopology {
    node: Node,
    placement: Vec<(u32, u64)>,
}

/// Concatenate one like-named topology group, rewriting connectivity
/// through the merged vertex ids. Mixed 2-D shapes promote to polygonal;
/// polyhedral inputs only combine with polyhedral inputs.
fn merge_topology_group(
    domain_id: i64,
    name: &str,
    members: &[(usize, &Node)],
    inputs: &[&Node],
    remaps: &[Vec<u64>],
    cset_name: &str,
) -> Result<MergedTopology, MeshRepartError> {
    let conflict = |reason: String| MeshRepartError::CombinationConflict {
        domain: domain_id,
        field: format!("topologies/{name}"),
        reason,
    };

    // fixed output shape, or promotion to polygonal for mixed 2-D input
    let mut shapes = Vec::new();
    for &(i, topo) in members {
        let cset = domain::coordset_for(inputs[i], topo)?;
        let shape = match topology::kind(topo)? {
            k if k.is_implicit() => match coordset::dimension(cset)? {
                1 => Shape::Line,
                2 => Shape::Quad,
                _ => Shape::Hex,
            },
            TopoKind::Points => Shape::Point,
            TopoKind::Unstructured => topology::shape(topo)?,
            _ => unreachable!("all topology kinds covered"),
        };
        shapes.push(shape);
    }
    let uniform_shape = shapes.iter().all(|&s| s == shapes[0]);
    let out_shape = if uniform_shape {
        shapes[0]
    } else if shapes
        .iter()
        .all(|s| matches!(s, Shape::Tri | Shape::Quad | Shape::Polygonal))
    {
        Shape::Polygonal
    } else {
        return Err(conflict(format!(
            "cannot concatenate mixed element shapes {:?}",
            shapes
        )));
    };

    if out_shape == Shape::Polyhedral {
        return merge_polyhedral_group(domain_id, name, members, inputs, remaps, cset_name);
    }

    let mut conn: Vec<u64> = Vec::new();
    let mut sizes: Vec<u64> = Vec::new();
    let mut offsets: Vec<u64> = Vec::new();
    let mut placement: Vec<(u32, u64)> = Vec::new();
    let mut scratch = Vec::new();
    for &(i, topo) in members {
        let cset = domain::coordset_for(inputs[i], topo)?;
        let n = topology::element_count(topo, cset)?;
        let remap = &remaps[i];
        for e in 0..n {
            scratch.clear();
            topology::element_vertices(topo, cset, e, &mut scratch)?;
            offsets.push(conn.len() as u64);
            sizes.push(scratch.len() as u64);
            conn.extend(scratch.iter().map(|&v| remap[v as usize]));
            placement.push((i as u32, e));
        }
    }

    let mut node = Node::new();
    node.fetch_mut("type").set_str("unstructured");
    node.fetch_mut("coordset").set_str(cset_name);
    node.fetch_mut("elements/shape").set_str(out_shape.as_str());
    node.fetch_mut("elements/connectivity").set_array(conn);
    if out_shape.vertex_count().is_none() {
        node.fetch_mut("elements/sizes").set_array(sizes);
        node.fetch_mut("elements/offsets").set_array(offsets);
    }
    Ok(MergedTopology { node, placement })
}

/// Polyhedral concatenation: face lists append with a running face offset.
fn merge_polyhedral_group(
    domain_id: i64,
    name: &str,
    members: &[(usize, &Node)],
    inputs: &[&Node],
    remaps: &[Vec<u64>],
    cset_name: &str,
) -> Result<MergedTopology, MeshRepartError> {
    let conflict = |reason: String| MeshRepartError::CombinationConflict {
        domain: domain_id,
        field: format!("topologies/{name}"),
        reason,
    };
    let mut conn: Vec<u64> = Vec::new();
    let mut sizes: Vec<u64> = Vec::new();
    let mut offsets: Vec<u64> = Vec::new();
    let mut fconn: Vec<u64> = Vec::new();
    let mut fsizes: Vec<u64> = Vec::new();
    let mut foffsets: Vec<u64> = Vec::new();
    let mut placement: Vec<(u32, u64)> = Vec::new();
    let mut face_base = 0u64;
    for &(i, topo) in members {
        if topology::shape(topo)? != Shape::Polyhedral {
            return Err(conflict("polyhedral inputs cannot mix with other shapes".into()));
        }
        let cset = domain::coordset_for(inputs[i], topo)?;
        let n = topology::element_count(topo, cset)?;
        let remap = &remaps[i];
        let mut faces = Vec::new();
        for e in 0..n {
            faces.clear();
            topology::element_faces(topo, e, &mut faces)?;
            offsets.push(conn.len() as u64);
            sizes.push(faces.len() as u64);
            conn.extend(faces.iter().map(|f| f + face_base));
            placement.push((i as u32, e));
        }
        let sub = topo.fetch("subelements")?;
        let sub_conn = sub.fetch("connectivity")?.as_array()?;
        let sub_sizes = sub.fetch("sizes")?.as_array()?;
        let sub_offsets = sub.fetch("offsets")?.as_array()?;
        for f in 0..sub_sizes.len() {
            let off = sub_offsets.u64_at(f) as usize;
            let len = sub_sizes.u64_at(f) as usize;
            foffsets.push(fconn.len() as u64);
            fsizes.push(len as u64);
            for t in off..off + len {
                fconn.push(remap[sub_conn.u64_at(t) as usize]);
            }
        }
        face_base += sub_sizes.len() as u64;
    }
    let mut node = Node::new();
    node.fetch_mut("type").set_str("unstructured");
    node.fetch_mut("coordset").set_str(cset_name);
    node.fetch_mut("elements/shape").set_str("polyhedral");
    node.fetch_mut("elements/connectivity").set_array(conn);
    node.fetch_mut("elements/sizes").set_array(sizes);
    node.fetch_mut("elements/offsets").set_array(offsets);
    node.fetch_mut("subelements/shape").set_str("polygonal");
    node.fetch_mut("subelements/connectivity").set_array(fconn);
    node.fetch_mut("subelements/sizes").set_array(fsizes);
    node.fetch_mut("subelements/offsets").set_array(foffsets);
    Ok(MergedTopology { node, placement })
}

/// Coincident-vertex welder over a quantized spatial hash.
pub struct PointMerger {
    tol: f64,
    cell: f64,
    grid: HashMap<[i64; 3], Vec<u32>>,
    points: Vec<[f64; 3]>,
}

impl PointMerger {
    pub fn new(tol: f64) -> Self {
        Self {
            tol: tol.max(0.0),
            cell: if tol > 0.0 { tol * 2.0 } else { 1.0 },
            grid: HashMap::new(),
            points: Vec::new(),
        }
    }

    fn key(&self, p: [f64; 3]) -> [i64; 3] {
        [
            (p[0] / self.cell).floor() as i64,
            (p[1] / self.cell).floor() as i64,
            (p[2] / self.cell).floor() as i64,
        ]
    }

    /// Insert a point, returning the id of the point it welds to (or its
    /// own fresh id).
    pub fn insert(&mut self, p: [f64; 3]) -> u32 {
        let tol2 = self.tol * self.tol;
        let klo = self.key([p[0] - self.tol, p[1] - self.tol, p[2] - self.tol]);
        let khi = self.key([p[0] + self.tol, p[1] + self.tol, p[2] + self.tol]);
        for kx in klo[0]..=khi[0] {
            for ky in klo[1]..=khi[1] {
                for kz in klo[2]..=khi[2] {
                    let Some(bucket) = self.grid.get(&[kx, ky, kz]) else {
                        continue;
                    };
                    for &id in bucket {
                        let q = self.points[id as usize];
                        let d2 = (q[0] - p[0]).powi(2)
                            + (q[1] - p[1]).powi(2)
                            + (q[2] - p[2]).powi(2);
                        if d2 <= tol2 {
                            return id;
                        }
                    }
                }
            }
        }
        let id = self.points.len() as u32;
        self.points.push(p);
        self.grid.entry(self.key(p)).or_default().push(id);
        id
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
