//! Small blueprint-shaped mesh builders for tests, benches and demos.
//!
//! Every builder returns a single domain with coordset `coords` and
//! topology `mesh`.

use crate::mesh::coordset::{AXES, LOGICAL_AXES, SPACING_AXES};
use crate::tree::{Array, Node};

/// Uniform grid. Axes with `dims[a] <= 1` are omitted, so `[3, 3, 1]`
/// builds a 2-D mesh of 2x2 cells.
pub fn uniform(dims: [u64; 3], origin: [f64; 3], spacing: [f64; 3]) -> Node {
    let mut m = Node::new();
    let c = m.fetch_mut("coordsets/coords");
    c.fetch_mut("type").set_str("uniform");
    for a in 0..3 {
        if dims[a] > 1 {
            c.fetch_mut(&format!("dims/{}", LOGICAL_AXES[a])).set_u64(dims[a]);
            c.fetch_mut(&format!("origin/{}", AXES[a])).set_f64(origin[a]);
            c.fetch_mut(&format!("spacing/{}", SPACING_AXES[a]))
                .set_f64(spacing[a]);
        }
    }
    m.fetch_mut("topologies/mesh/type").set_str("uniform");
    m.fetch_mut("topologies/mesh/coordset").set_str("coords");
    m
}

/// Rectilinear grid from per-axis point coordinates.
pub fn rectilinear(axes: &[Vec<f64>]) -> Node {
    let mut m = Node::new();
    let c = m.fetch_mut("coordsets/coords");
    c.fetch_mut("type").set_str("rectilinear");
    for (a, values) in axes.iter().enumerate() {
        c.fetch_mut(&format!("values/{}", AXES[a]))
            .set_array(values.clone());
    }
    m.fetch_mut("topologies/mesh/type").set_str("rectilinear");
    m.fetch_mut("topologies/mesh/coordset").set_str("coords");
    m
}

/// Structured grid of `nx x ny` cells over explicit unit-spaced points.
pub fn structured(nx: u64, ny: u64) -> Node {
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    for j in 0..=ny {
        for i in 0..=nx {
            xs.push(i as f64);
            ys.push(j as f64);
        }
    }
    let mut m = Node::new();
    let c = m.fetch_mut("coordsets/coords");
    c.fetch_mut("type").set_str("explicit");
    c.fetch_mut("values/x").set_array(xs);
    c.fetch_mut("values/y").set_array(ys);
    let t = m.fetch_mut("topologies/mesh");
    t.fetch_mut("type").set_str("structured");
    t.fetch_mut("coordset").set_str("coords");
    t.fetch_mut("elements/dims/i").set_u64(nx);
    t.fetch_mut("elements/dims/j").set_u64(ny);
    m
}

/// Unstructured grid of `nx x ny` quads over explicit unit-spaced points,
/// shifted by `origin`.
pub fn quad_grid(nx: u64, ny: u64, origin: [f64; 2]) -> Node {
    let px = nx + 1;
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    for j in 0..=ny {
        for i in 0..=nx {
            xs.push(origin[0] + i as f64);
            ys.push(origin[1] + j as f64);
        }
    }
    let mut conn = Vec::new();
    for j in 0..ny {
        for i in 0..nx {
            let v = j * px + i;
            conn.extend([v, v + 1, v + px + 1, v + px]);
        }
    }
    let mut m = Node::new();
    let c = m.fetch_mut("coordsets/coords");
    c.fetch_mut("type").set_str("explicit");
    c.fetch_mut("values/x").set_array(xs);
    c.fetch_mut("values/y").set_array(ys);
    let t = m.fetch_mut("topologies/mesh");
    t.fetch_mut("type").set_str("unstructured");
    t.fetch_mut("coordset").set_str("coords");
    t.fetch_mut("elements/shape").set_str("quad");
    t.fetch_mut("elements/connectivity").set_array(conn);
    m
}

/// Strip of `n` triangles over `n + 2` zig-zag points.
pub fn tri_strip(n: u64) -> Node {
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    for i in 0..n + 2 {
        xs.push(i as f64 * 0.5);
        ys.push((i % 2) as f64);
    }
    let mut conn = Vec::new();
    for e in 0..n {
        conn.extend([e, e + 1, e + 2]);
    }
    let mut m = Node::new();
    let c = m.fetch_mut("coordsets/coords");
    c.fetch_mut("type").set_str("explicit");
    c.fetch_mut("values/x").set_array(xs);
    c.fetch_mut("values/y").set_array(ys);
    let t = m.fetch_mut("topologies/mesh");
    t.fetch_mut("type").set_str("unstructured");
    t.fetch_mut("coordset").set_str("coords");
    t.fetch_mut("elements/shape").set_str("tri");
    t.fetch_mut("elements/connectivity").set_array(conn);
    m
}

/// Attach a vertex-associated field to the `mesh` topology.
pub fn add_vertex_field(domain: &mut Node, name: &str, values: impl Into<Array>) {
    let f = domain.fetch_mut(&format!("fields/{name}"));
    f.fetch_mut("association").set_str("vertex");
    f.fetch_mut("topology").set_str("mesh");
    f.fetch_mut("values").set_array(values.into());
}

/// Attach an element-associated field to the `mesh` topology.
pub fn add_element_field(domain: &mut Node, name: &str, values: impl Into<Array>) {
    let f = domain.fetch_mut(&format!("fields/{name}"));
    f.fetch_mut("association").set_str("element");
    f.fetch_mut("topology").set_str("mesh");
    f.fetch_mut("values").set_array(values.into());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{domain, topology};

    #[test]
    fn builders_report_expected_counts() {
        let u = uniform([3, 3, 3], [0.0; 3], [1.0; 3]);
        assert_eq!(domain::topology_len(&u, "mesh").unwrap(), 8);

        let r = rectilinear(&[vec![0.0, 1.0, 2.0], vec![0.0, 1.0]]);
        assert_eq!(domain::topology_len(&r, "mesh").unwrap(), 2);

        let s = structured(10, 10);
        assert_eq!(domain::topology_len(&s, "mesh").unwrap(), 100);

        let q = quad_grid(2, 2, [0.0, 0.0]);
        assert_eq!(domain::topology_len(&q, "mesh").unwrap(), 4);

        let t = tri_strip(10);
        let topo = domain::topology(&t, "mesh").unwrap();
        let cset = domain::coordset_for(&t, topo).unwrap();
        assert_eq!(topology::element_count(topo, cset).unwrap(), 10);
    }
}
