//! Topology readers: implicit IJK grids, point clouds and unstructured
//! element lists, with one vertex-walk entry point used by extraction and
//! combination.

use crate::error::MeshRepartError;
use crate::mesh::coordset;
use crate::tree::Node;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TopoKind {
    Uniform,
    Rectilinear,
    Structured,
    Points,
    Unstructured,
}

impl TopoKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            TopoKind::Uniform => "uniform",
            TopoKind::Rectilinear => "rectilinear",
            TopoKind::Structured => "structured",
            TopoKind::Points => "points",
            TopoKind::Unstructured => "unstructured",
        }
    }

    /// Implicit kinds carry their element structure in the coordset.
    pub const fn is_implicit(self) -> bool {
        matches!(
            self,
            TopoKind::Uniform | TopoKind::Rectilinear | TopoKind::Structured
        )
    }
}

/// Kind of a topology node (its `type` child).
pub fn kind(topo: &Node) -> Result<TopoKind, MeshRepartError> {
    match topo.fetch("type")?.as_str()? {
        "uniform" => Ok(TopoKind::Uniform),
        "rectilinear" => Ok(TopoKind::Rectilinear),
        "structured" => Ok(TopoKind::Structured),
        "points" => Ok(TopoKind::Points),
        "unstructured" => Ok(TopoKind::Unstructured),
        _ => Err(MeshRepartError::WrongKind {
            expected: "topology type",
            found: "unknown type",
        }),
    }
}

/// Name of the coordset this topology references.
pub fn coordset_name(topo: &Node) -> Result<&str, MeshRepartError> {
    topo.fetch("coordset")?.as_str()
}

/// Element shapes of unstructured topologies.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Shape {
    Point,
    Line,
    Tri,
    Quad,
    Tet,
    Hex,
    Polygonal,
    Polyhedral,
}

impl Shape {
    pub fn from_str(s: &str) -> Result<Self, MeshRepartError> {
        Ok(match s {
            "point" => Shape::Point,
            "line" => Shape::Line,
            "tri" => Shape::Tri,
            "quad" => Shape::Quad,
            "tet" => Shape::Tet,
            "hex" => Shape::Hex,
            "polygonal" => Shape::Polygonal,
            "polyhedral" => Shape::Polyhedral,
            other => return Err(MeshRepartError::UnsupportedShape(other.to_owned())),
        })
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Shape::Point => "point",
            Shape::Line => "line",
            Shape::Tri => "tri",
            Shape::Quad => "quad",
            Shape::Tet => "tet",
            Shape::Hex => "hex",
            Shape::Polygonal => "polygonal",
            Shape::Polyhedral => "polyhedral",
        }
    }

    /// Vertices per element; `None` for variable-size shapes.
    pub const fn vertex_count(self) -> Option<u64> {
        match self {
            Shape::Point => Some(1),
            Shape::Line => Some(2),
            Shape::Tri => Some(3),
            Shape::Quad => Some(4),
            Shape::Tet => Some(4),
            Shape::Hex => Some(8),
            Shape::Polygonal | Shape::Polyhedral => None,
        }
    }
}

/// Shape of an unstructured topology.
pub fn shape(topo: &Node) -> Result<Shape, MeshRepartError> {
    Shape::from_str(topo.fetch("elements/shape")?.as_str()?)
}

/// Per-axis cell counts of an implicit topology.
pub fn cell_dims(topo: &Node, cset: &Node) -> Result<[u64; 3], MeshRepartError> {
    if kind(topo)? == TopoKind::Structured {
        if let Some(d) = topo.get("elements/dims") {
            let mut dims = [1u64; 3];
            for (a, name) in coordset::LOGICAL_AXES.iter().enumerate() {
                if let Some(n) = d.child(name) {
                    dims[a] = n.to_u64()?;
                }
            }
            return Ok(dims);
        }
    }
    let pts = coordset::point_dims(cset)?;
    Ok([
        pts[0].saturating_sub(1).max(1),
        pts[1].saturating_sub(1).max(1),
        pts[2].saturating_sub(1).max(1),
    ])
}

/// Per-axis vertex counts of the grid an implicit topology spans.
///
/// Structured topologies carry their own `elements/dims`; the coordset of
/// a structured mesh is explicit and has no logical shape of its own.
pub fn point_dims_for(topo: &Node, cset: &Node) -> Result<[u64; 3], MeshRepartError> {
    if kind(topo)? == TopoKind::Structured {
        if let Some(d) = topo.get("elements/dims") {
            let mut pts = [1u64; 3];
            for (a, name) in coordset::LOGICAL_AXES.iter().enumerate() {
                if let Some(n) = d.child(name) {
                    pts[a] = n.to_u64()? + 1;
                }
            }
            return Ok(pts);
        }
    }
    coordset::point_dims(cset)
}

/// Number of logical axes of an implicit topology.
pub fn logical_dimension(topo: &Node, cset: &Node) -> Result<usize, MeshRepartError> {
    if kind(topo)? == TopoKind::Structured {
        if let Some(d) = topo.get("elements/dims") {
            return Ok(coordset::LOGICAL_AXES
                .iter()
                .filter(|a| d.has_child(a))
                .count());
        }
    }
    coordset::dimension(cset)
}

/// IJK offset this topology occupies in a larger logical brick, recorded by
/// logical extraction under `elements/origin`.
pub fn origin_ijk(topo: &Node) -> Result<[u64; 3], MeshRepartError> {
    let mut origin = [0u64; 3];
    if let Some(o) = topo.get("elements/origin") {
        for (a, name) in ["i0", "j0", "k0"].iter().enumerate() {
            if let Some(n) = o.child(name) {
                origin[a] = n.to_u64()?;
            }
        }
    }
    Ok(origin)
}

/// Number of elements of a topology, given its coordset.
pub fn element_count(topo: &Node, cset: &Node) -> Result<u64, MeshRepartError> {
    match kind(topo)? {
        k if k.is_implicit() => Ok(cell_dims(topo, cset)?.iter().product()),
        TopoKind::Points => coordset::point_count(cset),
        TopoKind::Unstructured => {
            if let Some(sizes) = topo.get("elements/sizes") {
                return Ok(sizes.as_array()?.len() as u64);
            }
            let conn = topo.fetch("elements/connectivity")?.as_array()?;
            let sh = shape(topo)?;
            let per = sh.vertex_count().ok_or_else(|| {
                MeshRepartError::UnsupportedShape(format!(
                    "{} topology without elements/sizes",
                    sh.as_str()
                ))
            })?;
            Ok(conn.len() as u64 / per)
        }
        _ => unreachable!("all topology kinds covered"),
    }
}

/// Spatial dimension of the elements.
pub fn dimension(topo: &Node, cset: &Node) -> Result<usize, MeshRepartError> {
    match kind(topo)? {
        k if k.is_implicit() => coordset::dimension(cset),
        TopoKind::Points => Ok(0),
        TopoKind::Unstructured => Ok(match shape(topo)? {
            Shape::Point => 0,
            Shape::Line => 1,
            Shape::Tri | Shape::Quad | Shape::Polygonal => 2,
            Shape::Tet | Shape::Hex | Shape::Polyhedral => 3,
        }),
        _ => unreachable!("all topology kinds covered"),
    }
}

/// Append the vertex ids of element `elem` to `out`.
///
/// Implicit topologies yield quad corners (2-D) or hex corners (3-D) in the
/// conventional winding; polyhedral elements yield the union of their face
/// vertices in face order.
pub fn element_vertices(
    topo: &Node,
    cset: &Node,
    elem: u64,
    out: &mut Vec<u64>,
) -> Result<(), MeshRepartError> {
    match kind(topo)? {
        k if k.is_implicit() => {
            let cells = cell_dims(topo, cset)?;
            let pts = point_dims_for(topo, cset)?;
            let ci = elem % cells[0];
            let cj = (elem / cells[0]) % cells[1];
            let ck = elem / (cells[0] * cells[1]);
            let v = |i, j, k| coordset::vertex_id([i, j, k], pts);
            match logical_dimension(topo, cset)? {
                1 => out.extend([v(ci, 0, 0), v(ci + 1, 0, 0)]),
                2 => out.extend([
                    v(ci, cj, 0),
                    v(ci + 1, cj, 0),
                    v(ci + 1, cj + 1, 0),
                    v(ci, cj + 1, 0),
                ]),
                _ => out.extend([
                    v(ci, cj, ck),
                    v(ci + 1, cj, ck),
                    v(ci + 1, cj + 1, ck),
                    v(ci, cj + 1, ck),
                    v(ci, cj, ck + 1),
                    v(ci + 1, cj, ck + 1),
                    v(ci + 1, cj + 1, ck + 1),
                    v(ci, cj + 1, ck + 1),
                ]),
            }
            Ok(())
        }
        TopoKind::Points => {
            out.push(elem);
            Ok(())
        }
        TopoKind::Unstructured => {
            let sh = shape(topo)?;
            if sh == Shape::Polyhedral {
                let faces = topo.fetch("subelements")?;
                let face_conn = faces.fetch("connectivity")?.as_array()?;
                let face_sizes = faces.fetch("sizes")?.as_array()?;
                let face_offsets = faces.fetch("offsets")?.as_array()?;
                let mut face_ids = Vec::new();
                element_faces(topo, elem, &mut face_ids)?;
                for f in face_ids {
                    let off = face_offsets.u64_at(f as usize) as usize;
                    let n = face_sizes.u64_at(f as usize) as usize;
                    for i in off..off + n {
                        out.push(face_conn.u64_at(i));
                    }
                }
                return Ok(());
            }
            let conn = topo.fetch("elements/connectivity")?.as_array()?;
            let (off, n) = element_span(topo, elem)?;
            for i in off..off + n {
                out.push(conn.u64_at(i));
            }
            Ok(())
        }
        _ => unreachable!("all topology kinds covered"),
    }
}

/// (offset, length) of element `elem` inside `elements/connectivity`.
pub fn element_span(topo: &Node, elem: u64) -> Result<(usize, usize), MeshRepartError> {
    if let Some(offsets) = topo.get("elements/offsets") {
        let sizes = topo.fetch("elements/sizes")?.as_array()?;
        let off = offsets.as_array()?.u64_at(elem as usize) as usize;
        let n = sizes.u64_at(elem as usize) as usize;
        return Ok((off, n));
    }
    let sh = shape(topo)?;
    let per = sh.vertex_count().ok_or_else(|| {
        MeshRepartError::UnsupportedShape(format!(
            "{} topology without elements/offsets",
            sh.as_str()
        ))
    })? as usize;
    Ok((elem as usize * per, per))
}

/// Append the face ids of polyhedral element `elem` to `out`.
pub fn element_faces(
    topo: &Node,
    elem: u64,
    out: &mut Vec<u64>,
) -> Result<(), MeshRepartError> {
    let conn = topo.fetch("elements/connectivity")?.as_array()?;
    let (off, n) = element_span(topo, elem)?;
    for i in off..off + n {
        out.push(conn.u64_at(i));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn structured_2x2() -> (Node, Node) {
        let mut cset = Node::new();
        cset.fetch_mut("type").set_str("uniform");
        cset.fetch_mut("dims/i").set_u64(3);
        cset.fetch_mut("dims/j").set_u64(3);
        let mut topo = Node::new();
        topo.fetch_mut("type").set_str("uniform");
        topo.fetch_mut("coordset").set_str("coords");
        (topo, cset)
    }

    #[test]
    fn implicit_counts_and_corners() {
        let (topo, cset) = structured_2x2();
        assert_eq!(element_count(&topo, &cset).unwrap(), 4);
        let mut verts = Vec::new();
        element_vertices(&topo, &cset, 3, &mut verts).unwrap();
        assert_eq!(verts, vec![4, 5, 8, 7]);
    }

    #[test]
    fn unstructured_fixed_shape() {
        let mut topo = Node::new();
        topo.fetch_mut("type").set_str("unstructured");
        topo.fetch_mut("coordset").set_str("coords");
        topo.fetch_mut("elements/shape").set_str("tri");
        topo.fetch_mut("elements/connectivity")
            .set_array(vec![0u64, 1, 2, 2, 1, 3]);
        let cset = Node::new();
        assert_eq!(element_count(&topo, &cset).unwrap(), 2);
        let mut verts = Vec::new();
        element_vertices(&topo, &cset, 1, &mut verts).unwrap();
        assert_eq!(verts, vec![2, 1, 3]);
    }
}
