//! Extraction: turn a (mesh, selection) pair into a self-contained
//! sub-mesh with dense vertex numbering and sliced fields.

use std::collections::BTreeSet;

use hashbrown::HashMap;

use crate::error::MeshRepartError;
use crate::mesh::coordset::{self, CoordsetKind};
use crate::mesh::topology::{self, Shape, TopoKind};
use crate::mesh::{domain, field_association, Association};
use crate::partition::options::Options;
use crate::selection::Selection;
use crate::tree::Node;

/// Extract the sub-mesh a selection describes.
///
/// The result owns its tree. Logical selections over uniform coordsets
/// keep the uniform kind (a shifted sub-brick with its IJK offset recorded
/// under `elements/origin`); every other combination produces an explicit
/// coordset and an unstructured topology with vertex ids rewritten to a
/// dense `[0..V)` range.
pub fn extract(
    sel: &Selection,
    mesh: &Node,
    opts: &Options,
) -> Result<Node, MeshRepartError> {
    let topo_name = sel.common().topology.clone();
    let topo = sel.topo(mesh)?;
    let cset = domain::coordset_for(mesh, topo)?;
    let cset_name = topology::coordset_name(topo)?.to_owned();
    let n_elem = topology::element_count(topo, cset)?;

    if let Some(max) = sel.max_element_id() {
        if max >= n_elem {
            return Err(MeshRepartError::IdsOutOfRange {
                topology: topo_name,
                id: max,
                num_elements: n_elem,
            });
        }
    }

    let mut element_ids = Vec::new();
    if n_elem > 0 {
        sel.project_elements(mesh, 0, n_elem - 1, &mut element_ids)?;
    }

    let mut out = Node::new();
    let uniform_brick_path = match sel {
        Selection::Logical(logical) => {
            let ndim = coordset::dimension(cset)?;
            topology::kind(topo)? == TopoKind::Uniform
                && coordset::kind(cset)? == CoordsetKind::Uniform
                && (0..ndim).all(|a| logical.end[a] > logical.start[a])
        }
        _ => false,
    };
    let vertex_ids = if let (Selection::Logical(logical), true) = (sel, uniform_brick_path) {
        // uniform brick fast path: the sub-mesh stays uniform
        let brick = coordset::uniform_brick(cset, logical.start, logical.end)?;
        out.fetch_mut("coordsets").insert_child(&cset_name, brick);
        let t = out.fetch_mut(&format!("topologies/{topo_name}"));
        t.fetch_mut("type").set_str("uniform");
        t.fetch_mut("coordset").set_str(&cset_name);
        for (a, name) in ["i0", "j0", "k0"].iter().enumerate() {
            t.fetch_mut(&format!("elements/origin/{name}"))
                .set_u64(logical.start[a]);
        }
        brick_vertex_ids(cset, logical.start, logical.end)?
    } else {
        let vertex_ids = selected_vertex_ids(topo, cset, &element_ids)?;
        let vinv: HashMap<u64, u64> = vertex_ids
            .iter()
            .enumerate()
            .map(|(new, &old)| (old, new as u64))
            .collect();
        out.fetch_mut("coordsets")
            .insert_child(&cset_name, coordset::explicit_from(cset, &vertex_ids)?);
        let new_topo = unstructured_from(topo, cset, &cset_name, &element_ids, &vinv)?;
        out.fetch_mut("topologies")
            .insert_child(&topo_name, new_topo);
        vertex_ids
    };

    slice_fields(mesh, &topo_name, &element_ids, &vertex_ids, opts, &mut out)?;

    let source_domain = sel.common().domain_id;
    if opts.mapping {
        add_mapping_field(
            &mut out,
            "original_element_ids",
            &topo_name,
            Association::Element,
            source_domain,
            &element_ids,
        );
        add_mapping_field(
            &mut out,
            "original_vertex_ids",
            &topo_name,
            Association::Vertex,
            source_domain,
            &vertex_ids,
        );
    }

    out.fetch_mut("state/domain_id").set_i64(source_domain);
    for key in ["state/cycle", "state/time"] {
        if let Some(v) = mesh.get(key) {
            *out.fetch_mut(key) = v.clone();
        }
    }
    Ok(out)
}

/// Sorted unique vertex ids referenced by the listed elements.
pub fn selected_vertex_ids(
    topo: &Node,
    cset: &Node,
    element_ids: &[u64],
) -> Result<Vec<u64>, MeshRepartError> {
    let mut set = BTreeSet::new();
    let mut scratch = Vec::new();
    for &e in element_ids {
        scratch.clear();
        topology::element_vertices(topo, cset, e, &mut scratch)?;
        set.extend(scratch.iter().copied());
    }
    Ok(set.into_iter().collect())
}

/// Vertex ids of a point-space brick, ascending.
fn brick_vertex_ids(
    cset: &Node,
    start: [u64; 3],
    end: [u64; 3],
) -> Result<Vec<u64>, MeshRepartError> {
    let dims = coordset::point_dims(cset)?;
    let ndim = coordset::dimension(cset)?;
    let axis = |a: usize| {
        if a < ndim {
            start[a]..=end[a]
        } else {
            0..=0
        }
    };
    let mut out = Vec::new();
    for k in axis(2) {
        for j in axis(1) {
            for i in axis(0) {
                out.push(coordset::vertex_id([i, j, k], dims));
            }
        }
    }
    Ok(out)
}

/// Build the unstructured sub-topology with connectivity rewritten through
/// the dense vertex map.
fn unstructured_from(
    topo: &Node,
    cset: &Node,
    cset_name: &str,
    element_ids: &[u64],
    vinv: &HashMap<u64, u64>,
) -> Result<Node, MeshRepartError> {
    let mut out = Node::new();
    out.fetch_mut("type").set_str("unstructured");
    out.fetch_mut("coordset").set_str(cset_name);
    match topology::kind(topo)? {
        k if k.is_implicit() => {
            let shape = match coordset::dimension(cset)? {
                1 => Shape::Line,
                2 => Shape::Quad,
                _ => Shape::Hex,
            };
            out.fetch_mut("elements/shape").set_str(shape.as_str());
            let mut conn = Vec::new();
            let mut scratch = Vec::new();
            for &e in element_ids {
                scratch.clear();
                topology::element_vertices(topo, cset, e, &mut scratch)?;
                conn.extend(scratch.iter().map(|v| vinv[v]));
            }
            out.fetch_mut("elements/connectivity").set_array(conn);
        }
        TopoKind::Points => {
            out.fetch_mut("elements/shape").set_str("point");
            let conn: Vec<u64> = element_ids.iter().map(|v| vinv[v]).collect();
            out.fetch_mut("elements/connectivity").set_array(conn);
        }
        TopoKind::Unstructured => {
            let shape = topology::shape(topo)?;
            match shape {
                Shape::Polyhedral => {
                    polyhedral_from(topo, element_ids, vinv, &mut out)?;
                }
                Shape::Polygonal => {
                    let conn = topo.fetch("elements/connectivity")?.as_array()?;
                    let mut new_conn = Vec::new();
                    let mut sizes = Vec::with_capacity(element_ids.len());
                    let mut offsets = Vec::with_capacity(element_ids.len());
                    for &e in element_ids {
                        let (off, n) = topology::element_span(topo, e)?;
                        offsets.push(new_conn.len() as u64);
                        sizes.push(n as u64);
                        for i in off..off + n {
                            new_conn.push(vinv[&conn.u64_at(i)]);
                        }
                    }
                    out.fetch_mut("elements/shape").set_str("polygonal");
                    out.fetch_mut("elements/connectivity").set_array(new_conn);
                    out.fetch_mut("elements/sizes").set_array(sizes);
                    out.fetch_mut("elements/offsets").set_array(offsets);
                }
                _ => {
                    let conn = topo.fetch("elements/connectivity")?.as_array()?;
                    let per = shape.vertex_count().expect("fixed shape") as usize;
                    let mut new_conn = Vec::with_capacity(element_ids.len() * per);
                    for &e in element_ids {
                        let off = e as usize * per;
                        for i in off..off + per {
                            new_conn.push(vinv[&conn.u64_at(i)]);
                        }
                    }
                    out.fetch_mut("elements/shape").set_str(shape.as_str());
                    out.fetch_mut("elements/connectivity").set_array(new_conn);
                }
            }
        }
        _ => unreachable!("all topology kinds covered"),
    }
    Ok(out)
}

/// Polyhedral extraction: keep the faces the selected elements reference,
/// renumber them densely, and rewrite both connectivity levels.
fn polyhedral_from(
    topo: &Node,
    element_ids: &[u64],
    vinv: &HashMap<u64, u64>,
    out: &mut Node,
) -> Result<(), MeshRepartError> {
    let mut kept_faces = BTreeSet::new();
    let mut faces_per_elem = Vec::with_capacity(element_ids.len());
    for &e in element_ids {
        let mut faces = Vec::new();
        topology::element_faces(topo, e, &mut faces)?;
        kept_faces.extend(faces.iter().copied());
        faces_per_elem.push(faces);
    }
    let face_list: Vec<u64> = kept_faces.into_iter().collect();
    let finv: HashMap<u64, u64> = face_list
        .iter()
        .enumerate()
        .map(|(new, &old)| (old, new as u64))
        .collect();

    let mut conn = Vec::new();
    let mut sizes = Vec::with_capacity(faces_per_elem.len());
    let mut offsets = Vec::with_capacity(faces_per_elem.len());
    for faces in &faces_per_elem {
        offsets.push(conn.len() as u64);
        sizes.push(faces.len() as u64);
        conn.extend(faces.iter().map(|f| finv[f]));
    }
    out.fetch_mut("elements/shape").set_str("polyhedral");
    out.fetch_mut("elements/connectivity").set_array(conn);
    out.fetch_mut("elements/sizes").set_array(sizes);
    out.fetch_mut("elements/offsets").set_array(offsets);

    let sub = topo.fetch("subelements")?;
    let face_conn = sub.fetch("connectivity")?.as_array()?;
    let face_sizes = sub.fetch("sizes")?.as_array()?;
    let face_offsets = sub.fetch("offsets")?.as_array()?;
    let mut new_fconn = Vec::new();
    let mut new_fsizes = Vec::with_capacity(face_list.len());
    let mut new_foffsets = Vec::with_capacity(face_list.len());
    for &f in &face_list {
        let off = face_offsets.u64_at(f as usize) as usize;
        let n = face_sizes.u64_at(f as usize) as usize;
        new_foffsets.push(new_fconn.len() as u64);
        new_fsizes.push(n as u64);
        for i in off..off + n {
            new_fconn.push(vinv[&face_conn.u64_at(i)]);
        }
    }
    out.fetch_mut("subelements/shape").set_str("polygonal");
    out.fetch_mut("subelements/connectivity").set_array(new_fconn);
    out.fetch_mut("subelements/sizes").set_array(new_fsizes);
    out.fetch_mut("subelements/offsets").set_array(new_foffsets);
    Ok(())
}

/// Slice every retained field of the selected topology.
fn slice_fields(
    mesh: &Node,
    topo_name: &str,
    element_ids: &[u64],
    vertex_ids: &[u64],
    opts: &Options,
    out: &mut Node,
) -> Result<(), MeshRepartError> {
    let Some(fields) = mesh.get("fields") else {
        return Ok(());
    };
    for (name, field) in fields.children() {
        if !opts.fields.is_empty() && !opts.fields.iter().any(|f| f == name) {
            continue;
        }
        let Some(bound) = field.get("topology") else {
            continue;
        };
        if bound.as_str()? != topo_name {
            continue;
        }
        let assoc = field_association(field)?;
        let ids = match assoc {
            Association::Element => element_ids,
            Association::Vertex => vertex_ids,
        };
        let dst = out.fetch_mut(&format!("fields/{name}"));
        dst.fetch_mut("association").set_str(assoc.as_str());
        dst.fetch_mut("topology").set_str(topo_name);
        slice_values(field.fetch("values")?, ids, dst.fetch_mut("values"))?;
    }
    Ok(())
}

/// Gather field values at `ids`, component-wise for mcarray values.
fn slice_values(values: &Node, ids: &[u64], out: &mut Node) -> Result<(), MeshRepartError> {
    if values.is_object() {
        for (comp, child) in values.children() {
            out.insert_child(comp, {
                let mut n = Node::new();
                n.set_array(child.as_array()?.gather(ids));
                n
            });
        }
    } else {
        out.set_array(values.as_array()?.gather(ids));
    }
    Ok(())
}

/// Emit one original-id field with `domains` and `ids` components so the
/// provenance survives combination of chunks from different sources.
fn add_mapping_field(
    out: &mut Node,
    name: &str,
    topo_name: &str,
    assoc: Association,
    source_domain: i64,
    ids: &[u64],
) {
    let f = out.fetch_mut(&format!("fields/{name}"));
    f.fetch_mut("association").set_str(assoc.as_str());
    f.fetch_mut("topology").set_str(topo_name);
    f.fetch_mut("values/domains")
        .set_array(vec![source_domain; ids.len()]);
    f.fetch_mut("values/ids").set_array(ids.to_vec());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::{RangesSelection, SelectionCommon};

    fn tri_mesh() -> Node {
        // four triangles in a strip over five points
        let mut m = Node::new();
        m.fetch_mut("coordsets/coords/type").set_str("explicit");
        m.fetch_mut("coordsets/coords/values/x")
            .set_array(vec![0.0f64, 1.0, 2.0, 3.0, 4.0]);
        m.fetch_mut("coordsets/coords/values/y")
            .set_array(vec![0.0f64, 1.0, 0.0, 1.0, 0.0]);
        m.fetch_mut("topologies/mesh/type").set_str("unstructured");
        m.fetch_mut("topologies/mesh/coordset").set_str("coords");
        m.fetch_mut("topologies/mesh/elements/shape").set_str("tri");
        m.fetch_mut("topologies/mesh/elements/connectivity")
            .set_array(vec![0u64, 1, 2, 2, 1, 3, 2, 3, 4, 0, 2, 4]);
        m
    }

    #[test]
    fn dense_vertex_remap() {
        let m = tri_mesh();
        let mut common = SelectionCommon::default();
        common.topology = "mesh".into();
        let sel = Selection::Ranges(RangesSelection::new(common, vec![(1, 2)]));
        let out = extract(&sel, &m, &Options::default()).unwrap();

        let conn = out
            .fetch("topologies/mesh/elements/connectivity")
            .unwrap()
            .as_array()
            .unwrap()
            .to_u64_vec();
        // vertices {1,2,3,4} remap to 0..4
        assert_eq!(conn, vec![1, 0, 2, 1, 2, 3]);
        let x = out
            .fetch("coordsets/coords/values/x")
            .unwrap()
            .as_array()
            .unwrap()
            .to_f64_vec();
        assert_eq!(x, vec![1.0, 2.0, 3.0, 4.0]);

        let ov = out
            .fetch("fields/original_vertex_ids/values/ids")
            .unwrap()
            .as_array()
            .unwrap()
            .to_u64_vec();
        assert_eq!(ov, vec![1, 2, 3, 4]);
        let oe = out
            .fetch("fields/original_element_ids/values/ids")
            .unwrap()
            .as_array()
            .unwrap()
            .to_u64_vec();
        assert_eq!(oe, vec![1, 2]);
    }

    #[test]
    fn out_of_range_ids_error() {
        let m = tri_mesh();
        let mut common = SelectionCommon::default();
        common.topology = "mesh".into();
        let sel = Selection::Ranges(RangesSelection::new(common, vec![(3, 7)]));
        let err = extract(&sel, &m, &Options::default()).unwrap_err();
        assert!(matches!(err, MeshRepartError::IdsOutOfRange { .. }));
    }

    #[test]
    fn empty_selection_is_legal() {
        let mut m = Node::new();
        m.fetch_mut("coordsets/coords/type").set_str("uniform");
        m.fetch_mut("coordsets/coords/dims/i").set_u64(3);
        m.fetch_mut("coordsets/coords/dims/j").set_u64(3);
        m.fetch_mut("topologies/mesh/type").set_str("rectilinear");
        m.fetch_mut("topologies/mesh/coordset").set_str("coords");
        // a flat box selects no cells
        let mut common = SelectionCommon::default();
        common.topology = "mesh".into();
        let sel = Selection::Logical(crate::selection::LogicalSelection {
            common,
            start: [1, 0, 0],
            end: [1, 2, 0],
        });
        let out = extract(&sel, &m, &Options::default()).unwrap();
        let conn = out
            .fetch("topologies/mesh/elements/connectivity")
            .unwrap()
            .as_array()
            .unwrap();
        assert!(conn.is_empty());
    }
}
