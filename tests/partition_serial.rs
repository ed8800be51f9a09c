//! Serial end-to-end scenarios for the repartitioning pipeline.

use mesh_repart::mesh::domain;
use mesh_repart::tree::Node;
use mesh_repart::{meshgen, partition, MeshRepartError};

fn options(edit: impl FnOnce(&mut Node)) -> Node {
    let mut n = Node::new();
    edit(&mut n);
    n
}

fn u64s(node: &Node, path: &str) -> Vec<u64> {
    node.fetch(path).unwrap().as_array().unwrap().to_u64_vec()
}

fn f64s(node: &Node, path: &str) -> Vec<f64> {
    node.fetch(path).unwrap().as_array().unwrap().to_f64_vec()
}

#[test]
fn uniform_cube_splits_into_structured_halves() {
    // 2x2x2 cells, target 2: split along i at the midpoint plane
    let mesh = meshgen::uniform([3, 3, 3], [0.0; 3], [1.0; 3]);
    let opts = options(|o| o.fetch_mut("target").set_u64(2));
    let mut out = Node::new();
    partition(&mesh, &opts, &mut out).unwrap();

    assert_eq!(out.num_children(), 2);
    for (i, key) in ["domain_000000", "domain_000001"].iter().enumerate() {
        let d = out.fetch(key).unwrap();
        assert_eq!(
            d.fetch("coordsets/coords/type").unwrap().as_str().unwrap(),
            "uniform"
        );
        assert_eq!(domain::topology_len(d, "mesh").unwrap(), 4);
        assert_eq!(
            d.fetch("state/domain_id").unwrap().to_i64().unwrap(),
            i as i64
        );
    }
    // halves are one cell thick along i, full extent along j and k
    let left = out.fetch("domain_000000").unwrap();
    assert_eq!(left.fetch("coordsets/coords/dims/i").unwrap().to_u64().unwrap(), 2);
    assert_eq!(left.fetch("coordsets/coords/dims/j").unwrap().to_u64().unwrap(), 3);
    let right = out.fetch("domain_000001").unwrap();
    assert_eq!(
        right.fetch("coordsets/coords/origin/x").unwrap().to_f64().unwrap(),
        1.0
    );
}

#[test]
fn logical_selection_on_rectilinear_mesh() {
    // 4x4 cells; the point box [1,1]..[3,3] covers 2x2 cells and 9 vertices
    let axes = vec![
        vec![0.0, 1.0, 2.0, 3.0, 4.0],
        vec![0.0, 1.0, 2.0, 3.0, 4.0],
    ];
    let mut mesh = meshgen::rectilinear(&axes);
    meshgen::add_vertex_field(&mut mesh, "temp", (0..25).map(f64::from).collect::<Vec<_>>());

    let opts = options(|o| {
        let s = o.fetch_mut("selections/s0");
        s.fetch_mut("type").set_str("logical");
        s.fetch_mut("start").set_array(vec![1u64, 1, 0]);
        s.fetch_mut("end").set_array(vec![3u64, 3, 0]);
    });
    let mut out = Node::new();
    partition(&mesh, &opts, &mut out).unwrap();

    // a single output domain is written directly at the root
    assert!(out.has_child("coordsets"));
    assert_eq!(
        out.fetch("topologies/mesh/type").unwrap().as_str().unwrap(),
        "unstructured"
    );
    assert_eq!(domain::topology_len(&out, "mesh").unwrap(), 4);
    assert_eq!(f64s(&out, "coordsets/coords/values/x").len(), 9);

    let ov = u64s(&out, "fields/original_vertex_ids/values/ids");
    assert_eq!(ov.len(), 9);
    assert!(ov.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(ov, vec![6, 7, 8, 11, 12, 13, 16, 17, 18]);

    let temp = f64s(&out, "fields/temp/values");
    assert_eq!(temp, vec![6.0, 7.0, 8.0, 11.0, 12.0, 13.0, 16.0, 17.0, 18.0]);

    // vertex density: connectivity is dense over the new coordset
    let conn = u64s(&out, "topologies/mesh/elements/connectivity");
    assert_eq!(conn.iter().max().copied(), Some(8));
}

#[test]
fn ranges_selection_keeps_order_and_remaps_densely() {
    let mesh = meshgen::tri_strip(10);
    let opts = options(|o| {
        let s = o.fetch_mut("selections/s0");
        s.fetch_mut("type").set_str("ranges");
        s.fetch_mut("ranges").set_array(vec![0u64, 2, 5, 7, 9, 9]);
    });
    let mut out = Node::new();
    partition(&mesh, &opts, &mut out).unwrap();

    let oe = u64s(&out, "fields/original_element_ids/values/ids");
    assert_eq!(oe, vec![0, 1, 2, 5, 6, 7, 9]);
    assert_eq!(domain::topology_len(&out, "mesh").unwrap(), 7);

    // the referenced vertices are exactly {0..11}, densely renumbered
    let ov = u64s(&out, "fields/original_vertex_ids/values/ids");
    assert_eq!(ov, (0..12).collect::<Vec<u64>>());
    let conn = u64s(&out, "topologies/mesh/elements/connectivity");
    assert_eq!(conn.iter().max().copied(), Some(11));
    assert_eq!(f64s(&out, "coordsets/coords/values/x").len(), 12);
}

#[test]
fn mapping_round_trip_recovers_source_coordinates() {
    let mesh = meshgen::tri_strip(10);
    let opts = options(|o| {
        let s = o.fetch_mut("selections/s0");
        s.fetch_mut("type").set_str("ranges");
        s.fetch_mut("ranges").set_array(vec![2u64, 4, 8, 9]);
    });
    let mut out = Node::new();
    partition(&mesh, &opts, &mut out).unwrap();

    let src_x = f64s(&mesh, "coordsets/coords/values/x");
    let src_conn = u64s(&mesh, "topologies/mesh/elements/connectivity");
    let out_x = f64s(&out, "coordsets/coords/values/x");
    let out_conn = u64s(&out, "topologies/mesh/elements/connectivity");
    let oe = u64s(&out, "fields/original_element_ids/values/ids");
    let ov = u64s(&out, "fields/original_vertex_ids/values/ids");

    for (i, &src_elem) in oe.iter().enumerate() {
        for t in 0..3 {
            let out_v = out_conn[i * 3 + t] as usize;
            let src_v = src_conn[src_elem as usize * 3 + t] as usize;
            // the output vertex maps back to the same source vertex
            assert_eq!(ov[out_v], src_v as u64);
            assert_eq!(out_x[out_v], src_x[src_v]);
        }
    }
}

#[test]
fn disjoint_blocks_weld_shared_vertices() {
    // two 2x2-quad blocks; the second is offset so exactly two corner
    // vertices coincide with the first block's right edge
    let mut root = Node::new();
    root.insert_child("domain_000000", meshgen::quad_grid(2, 2, [0.0, 0.0]));
    root.insert_child("domain_000001", meshgen::quad_grid(2, 2, [2.0, 1.0]));

    let opts = options(|o| {
        o.fetch_mut("target").set_u64(1);
        o.fetch_mut("merge_tolerance").set_f64(1e-9);
    });
    let mut out = Node::new();
    partition(&root, &opts, &mut out).unwrap();

    assert!(out.has_child("coordsets"));
    assert_eq!(domain::topology_len(&out, "mesh").unwrap(), 8);
    assert_eq!(f64s(&out, "coordsets/coords/values/x").len(), 16);
    // dense connectivity over the merged coordset
    let conn = u64s(&out, "topologies/mesh/elements/connectivity");
    assert_eq!(conn.iter().max().copied(), Some(15));
}

#[test]
fn field_selection_is_one_shot() {
    let mut mesh = meshgen::tri_strip(6);
    meshgen::add_element_field(&mut mesh, "part", vec![0i64, 0, 1, 1, 2, 2]);

    for target in [None, Some(5u64)] {
        let opts = options(|o| {
            if let Some(t) = target {
                o.fetch_mut("target").set_u64(t);
            }
            let s = o.fetch_mut("selections/s0");
            s.fetch_mut("type").set_str("field");
            s.fetch_mut("field").set_str("part");
        });
        let mut out = Node::new();
        partition(&mesh, &opts, &mut out).unwrap();

        // three tag values, three domains, never split further
        assert_eq!(out.num_children(), 3);
        for (i, key) in ["domain_000000", "domain_000001", "domain_000002"]
            .iter()
            .enumerate()
        {
            let d = out.fetch(key).unwrap();
            assert_eq!(domain::topology_len(d, "mesh").unwrap(), 2);
            assert_eq!(
                d.fetch("state/domain_id").unwrap().to_i64().unwrap(),
                i as i64
            );
        }
    }
}

#[test]
fn pinned_destination_domains_survive() {
    let mesh = meshgen::tri_strip(8);
    let opts = options(|o| {
        let a = o.fetch_mut("selections/a");
        a.fetch_mut("type").set_str("ranges");
        a.fetch_mut("ranges").set_array(vec![0u64, 3]);
        a.fetch_mut("destination_domain").set_i64(5);
        let b = o.fetch_mut("selections/b");
        b.fetch_mut("type").set_str("ranges");
        b.fetch_mut("ranges").set_array(vec![4u64, 7]);
        b.fetch_mut("destination_domain").set_i64(7);
    });
    let mut out = Node::new();
    partition(&mesh, &opts, &mut out).unwrap();

    // target defaults to 1 but two reserved ids raise it
    assert_eq!(out.num_children(), 2);
    assert!(out.has_child("domain_000005"));
    assert!(out.has_child("domain_000007"));
}

#[test]
fn conservation_and_balance_over_many_targets() {
    let mesh = meshgen::uniform([9, 9, 1], [0.0; 3], [1.0; 3]); // 64 cells
    for target in 1..=6u64 {
        let opts = options(|o| o.fetch_mut("target").set_u64(target));
        let mut out = Node::new();
        partition(&mesh, &opts, &mut out).unwrap();
        let domains = domain::domains(&out);
        assert_eq!(domains.len(), target as usize);
        let total: u64 = domains
            .iter()
            .map(|d| domain::total_elements(d).unwrap())
            .sum();
        assert_eq!(total, 64);
    }
}

#[test]
fn identical_runs_are_identical() {
    let axes = vec![vec![0.0, 0.5, 1.5, 3.0], vec![0.0, 1.0, 2.0]];
    let mut mesh = meshgen::rectilinear(&axes);
    meshgen::add_vertex_field(&mut mesh, "temp", (0..12).map(f64::from).collect::<Vec<_>>());
    let opts = options(|o| o.fetch_mut("target").set_u64(3));

    let mut out1 = Node::new();
    partition(&mesh, &opts, &mut out1).unwrap();
    let mut out2 = Node::new();
    partition(&mesh, &opts, &mut out2).unwrap();
    assert_eq!(out1, out2);
}

#[test]
fn malformed_options_do_not_run() {
    let mesh = meshgen::tri_strip(4);
    let opts = options(|o| o.fetch_mut("tarqet").set_u64(2));
    let mut out = Node::new();
    let err = partition(&mesh, &opts, &mut out).unwrap_err();
    assert!(matches!(err, MeshRepartError::OptionMalformed { .. }));
    assert!(out.is_empty());
}

#[test]
fn inapplicable_selection_fails_initialize() {
    // logical selections require an implicit topology
    let mesh = meshgen::tri_strip(4);
    let opts = options(|o| {
        let s = o.fetch_mut("selections/s0");
        s.fetch_mut("type").set_str("logical");
        s.fetch_mut("start").set_array(vec![0u64, 0, 0]);
        s.fetch_mut("end").set_array(vec![1u64, 1, 0]);
    });
    let mut out = Node::new();
    let err = partition(&mesh, &opts, &mut out).unwrap_err();
    assert!(matches!(err, MeshRepartError::SelectionInapplicable { .. }));
}

#[test]
fn out_of_range_ids_fail_extraction() {
    let mesh = meshgen::tri_strip(4);
    let opts = options(|o| {
        let s = o.fetch_mut("selections/s0");
        s.fetch_mut("type").set_str("explicit");
        s.fetch_mut("elements").set_array(vec![0u64, 99]);
    });
    let mut out = Node::new();
    let err = partition(&mesh, &opts, &mut out).unwrap_err();
    assert!(matches!(err, MeshRepartError::IdsOutOfRange { .. }));
}

#[test]
fn split_then_recombine_restores_the_structured_mesh() {
    let mut mesh = meshgen::uniform([5, 5, 1], [0.0; 3], [1.0; 3]); // 4x4 cells
    meshgen::add_vertex_field(&mut mesh, "temp", (0..25).map(f64::from).collect::<Vec<_>>());

    let mut pieces = Node::new();
    let opts4 = options(|o| o.fetch_mut("target").set_u64(4));
    partition(&mesh, &opts4, &mut pieces).unwrap();
    assert_eq!(pieces.num_children(), 4);

    let mut restored = Node::new();
    let opts1 = options(|o| o.fetch_mut("target").set_u64(1));
    partition(&pieces, &opts1, &mut restored).unwrap();

    // the four bricks tile the original block again
    assert_eq!(
        restored.fetch("coordsets/coords/type").unwrap().as_str().unwrap(),
        "uniform"
    );
    assert_eq!(
        restored.fetch("coordsets/coords/dims/i").unwrap().to_u64().unwrap(),
        5
    );
    assert_eq!(domain::topology_len(&restored, "mesh").unwrap(), 16);
    let temp = f64s(&restored, "fields/temp/values");
    assert_eq!(temp, (0..25).map(f64::from).collect::<Vec<f64>>());
}
