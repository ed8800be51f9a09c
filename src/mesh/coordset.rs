//! Coordinate-set readers: uniform, rectilinear and explicit point sets.

use crate::error::MeshRepartError;
use crate::tree::{Array, Node};

/// Axis names in coordinate order.
pub const AXES: [&str; 3] = ["x", "y", "z"];
/// Logical axis names in index order.
pub const LOGICAL_AXES: [&str; 3] = ["i", "j", "k"];
/// Spacing child names for uniform coordsets.
pub const SPACING_AXES: [&str; 3] = ["dx", "dy", "dz"];

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CoordsetKind {
    Uniform,
    Rectilinear,
    Explicit,
}

impl CoordsetKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            CoordsetKind::Uniform => "uniform",
            CoordsetKind::Rectilinear => "rectilinear",
            CoordsetKind::Explicit => "explicit",
        }
    }
}

/// Kind of a coordset node (its `type` child).
pub fn kind(cset: &Node) -> Result<CoordsetKind, MeshRepartError> {
    match cset.fetch("type")?.as_str()? {
        "uniform" => Ok(CoordsetKind::Uniform),
        "rectilinear" => Ok(CoordsetKind::Rectilinear),
        "explicit" => Ok(CoordsetKind::Explicit),
        _ => Err(MeshRepartError::WrongKind {
            expected: "uniform|rectilinear|explicit coordset",
            found: "unknown type",
        }),
    }
}

/// Number of coordinate axes (1, 2 or 3).
pub fn dimension(cset: &Node) -> Result<usize, MeshRepartError> {
    match kind(cset)? {
        CoordsetKind::Uniform => {
            let dims = cset.fetch("dims")?;
            Ok(LOGICAL_AXES.iter().filter(|a| dims.has_child(a)).count())
        }
        CoordsetKind::Rectilinear | CoordsetKind::Explicit => {
            let values = cset.fetch("values")?;
            Ok(AXES.iter().filter(|a| values.has_child(a)).count())
        }
    }
}

/// Per-axis vertex counts; absent axes report 1.
///
/// Explicit coordsets have no logical structure: they report
/// `[n_points, 1, 1]`.
pub fn point_dims(cset: &Node) -> Result<[u64; 3], MeshRepartError> {
    let mut dims = [1u64; 3];
    match kind(cset)? {
        CoordsetKind::Uniform => {
            let d = cset.fetch("dims")?;
            for (a, name) in LOGICAL_AXES.iter().enumerate() {
                if let Some(n) = d.child(name) {
                    dims[a] = n.to_u64()?;
                }
            }
        }
        CoordsetKind::Rectilinear => {
            let values = cset.fetch("values")?;
            for (a, name) in AXES.iter().enumerate() {
                if let Some(n) = values.child(name) {
                    dims[a] = n.as_array()?.len() as u64;
                }
            }
        }
        CoordsetKind::Explicit => {
            let values = cset.fetch("values")?;
            let (_, first) = values
                .child_at(0)
                .ok_or_else(|| MeshRepartError::PathNotFound("values[0]".into()))?;
            dims[0] = first.as_array()?.len() as u64;
        }
    }
    Ok(dims)
}

/// Total number of points.
pub fn point_count(cset: &Node) -> Result<u64, MeshRepartError> {
    Ok(point_dims(cset)?.iter().product())
}

/// Uniform origin along each axis (default 0).
pub fn uniform_origin(cset: &Node) -> Result<[f64; 3], MeshRepartError> {
    let mut origin = [0.0; 3];
    if let Some(o) = cset.get("origin") {
        for (a, name) in AXES.iter().enumerate() {
            if let Some(n) = o.child(name) {
                origin[a] = n.to_f64()?;
            }
        }
    }
    Ok(origin)
}

/// Uniform spacing along each axis (default 1).
pub fn uniform_spacing(cset: &Node) -> Result<[f64; 3], MeshRepartError> {
    let mut spacing = [1.0; 3];
    if let Some(s) = cset.get("spacing") {
        for (a, name) in SPACING_AXES.iter().enumerate() {
            if let Some(n) = s.child(name) {
                spacing[a] = n.to_f64()?;
            }
        }
    }
    Ok(spacing)
}

/// Decompose a vertex id into its (i, j, k) logical index.
#[inline]
pub fn vertex_ijk(id: u64, dims: [u64; 3]) -> [u64; 3] {
    [
        id % dims[0],
        (id / dims[0]) % dims[1],
        id / (dims[0] * dims[1]),
    ]
}

/// Compose a logical index into a vertex id.
#[inline]
pub fn vertex_id(ijk: [u64; 3], dims: [u64; 3]) -> u64 {
    (ijk[2] * dims[1] + ijk[1]) * dims[0] + ijk[0]
}

/// World coordinate of one point of an implicit or rectilinear coordset.
pub fn implicit_point(
    cset: &Node,
    axis: usize,
    ijk: [u64; 3],
) -> Result<f64, MeshRepartError> {
    match kind(cset)? {
        CoordsetKind::Uniform => {
            let origin = uniform_origin(cset)?;
            let spacing = uniform_spacing(cset)?;
            Ok(origin[axis] + ijk[axis] as f64 * spacing[axis])
        }
        CoordsetKind::Rectilinear => {
            let arr = cset.fetch("values")?.fetch(AXES[axis])?.as_array()?;
            Ok(arr.f64_at(ijk[axis] as usize))
        }
        CoordsetKind::Explicit => Err(MeshRepartError::WrongKind {
            expected: "implicit coordset",
            found: "explicit",
        }),
    }
}

/// Build an explicit coordset holding the listed vertices of `cset`.
///
/// Explicit sources gather with their original dtype; computed coordinates
/// come out as `float64`.
pub fn explicit_from(cset: &Node, vertex_ids: &[u64]) -> Result<Node, MeshRepartError> {
    let mut out = Node::new();
    out.fetch_mut("type").set_str("explicit");
    match kind(cset)? {
        CoordsetKind::Explicit => {
            let values = cset.fetch("values")?;
            for (name, comp) in values.children() {
                let sliced = comp.as_array()?.gather(vertex_ids);
                out.fetch_mut(&format!("values/{name}")).set_array(sliced);
            }
        }
        CoordsetKind::Uniform | CoordsetKind::Rectilinear => {
            let dims = point_dims(cset)?;
            let ndim = dimension(cset)?;
            for axis in 0..ndim {
                let mut coords = Vec::with_capacity(vertex_ids.len());
                for &id in vertex_ids {
                    coords.push(implicit_point(cset, axis, vertex_ijk(id, dims))?);
                }
                out.fetch_mut(&format!("values/{}", AXES[axis]))
                    .set_array(coords);
            }
        }
    }
    Ok(out)
}

/// Uniform sub-brick covering point planes `start..=end` along each axis.
pub fn uniform_brick(
    cset: &Node,
    start: [u64; 3],
    end: [u64; 3],
) -> Result<Node, MeshRepartError> {
    let origin = uniform_origin(cset)?;
    let spacing = uniform_spacing(cset)?;
    let ndim = dimension(cset)?;
    let mut out = Node::new();
    out.fetch_mut("type").set_str("uniform");
    for axis in 0..ndim {
        out.fetch_mut(&format!("dims/{}", LOGICAL_AXES[axis]))
            .set_u64(end[axis] - start[axis] + 1);
        out.fetch_mut(&format!("origin/{}", AXES[axis]))
            .set_f64(origin[axis] + start[axis] as f64 * spacing[axis]);
        out.fetch_mut(&format!("spacing/{}", SPACING_AXES[axis]))
            .set_f64(spacing[axis]);
    }
    Ok(out)
}

/// World coordinates of one vertex of any coordset kind, padded to 3-D.
pub fn point_coords(cset: &Node, id: u64) -> Result<[f64; 3], MeshRepartError> {
    let mut p = [0.0; 3];
    match kind(cset)? {
        CoordsetKind::Explicit => {
            let values = cset.fetch("values")?;
            for (a, name) in AXES.iter().enumerate() {
                if let Some(comp) = values.child(name) {
                    p[a] = comp.as_array()?.f64_at(id as usize);
                }
            }
        }
        _ => {
            let dims = point_dims(cset)?;
            let ijk = vertex_ijk(id, dims);
            for axis in 0..dimension(cset)? {
                p[axis] = implicit_point(cset, axis, ijk)?;
            }
        }
    }
    Ok(p)
}

/// All vertex coordinates as rows, padded to 3-D.
pub fn all_point_coords(cset: &Node) -> Result<Vec<[f64; 3]>, MeshRepartError> {
    let n = point_count(cset)?;
    let mut out = Vec::with_capacity(n as usize);
    match kind(cset)? {
        CoordsetKind::Explicit => {
            let values = cset.fetch("values")?;
            let mut comps: [Option<&Array>; 3] = [None, None, None];
            for (a, name) in AXES.iter().enumerate() {
                if let Some(c) = values.child(name) {
                    comps[a] = Some(c.as_array()?);
                }
            }
            for i in 0..n as usize {
                let mut p = [0.0; 3];
                for a in 0..3 {
                    if let Some(arr) = comps[a] {
                        p[a] = arr.f64_at(i);
                    }
                }
                out.push(p);
            }
        }
        _ => {
            for id in 0..n {
                out.push(point_coords(cset, id)?);
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform_cset() -> Node {
        let mut c = Node::new();
        c.fetch_mut("type").set_str("uniform");
        c.fetch_mut("dims/i").set_u64(3);
        c.fetch_mut("dims/j").set_u64(2);
        c.fetch_mut("origin/x").set_f64(1.0);
        c.fetch_mut("origin/y").set_f64(0.0);
        c.fetch_mut("spacing/dx").set_f64(0.5);
        c.fetch_mut("spacing/dy").set_f64(2.0);
        c
    }

    #[test]
    fn uniform_dims_and_points() {
        let c = uniform_cset();
        assert_eq!(kind(&c).unwrap(), CoordsetKind::Uniform);
        assert_eq!(point_dims(&c).unwrap(), [3, 2, 1]);
        assert_eq!(point_count(&c).unwrap(), 6);
        // vertex 4 is (i=1, j=1)
        assert_eq!(point_coords(&c, 4).unwrap(), [1.5, 2.0, 0.0]);
    }

    #[test]
    fn explicit_gather_keeps_dtype() {
        let mut c = Node::new();
        c.fetch_mut("type").set_str("explicit");
        c.fetch_mut("values/x").set_array(vec![0.0f32, 1.0, 2.0]);
        c.fetch_mut("values/y").set_array(vec![5.0f32, 6.0, 7.0]);
        let sub = explicit_from(&c, &[2, 0]).unwrap();
        let x = sub.fetch("values/x").unwrap().as_array().unwrap();
        assert_eq!(x.dtype(), crate::tree::DType::Float32);
        assert_eq!(x.to_f64_vec(), vec![2.0, 0.0]);
    }

    #[test]
    fn brick_shifts_origin() {
        let c = uniform_cset();
        let b = uniform_brick(&c, [1, 0, 0], [2, 1, 0]).unwrap();
        assert_eq!(b.fetch("dims/i").unwrap().to_u64().unwrap(), 2);
        assert_eq!(b.fetch("origin/x").unwrap().to_f64().unwrap(), 1.5);
    }
}
