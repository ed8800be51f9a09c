use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use mesh_repart::tree::Node;
use mesh_repart::{meshgen, partition};

fn bench_repartition(c: &mut Criterion) {
    let mut group = c.benchmark_group("repartition_uniform");
    for &n in &[16u64, 32, 64] {
        let mut mesh = meshgen::uniform([n + 1, n + 1, 1], [0.0; 3], [1.0; 3]);
        let npts = ((n + 1) * (n + 1)) as usize;
        meshgen::add_vertex_field(&mut mesh, "temp", (0..npts).map(|i| i as f64).collect::<Vec<_>>());
        let mut options = Node::new();
        options.fetch_mut("target").set_u64(8);

        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                let mut output = Node::new();
                partition(&mesh, &options, &mut output).unwrap();
                output
            })
        });
    }
    group.finish();
}

fn bench_weld(c: &mut Criterion) {
    // two abutting quad blocks force the unstructured path and the
    // coincident-vertex weld along the shared seam
    let mut root = Node::new();
    root.insert_child("domain_000000", meshgen::quad_grid(32, 32, [0.0, 0.0]));
    root.insert_child("domain_000001", meshgen::quad_grid(32, 32, [32.0, 0.0]));
    let mut options = Node::new();
    options.fetch_mut("target").set_u64(1);

    c.bench_function("combine_weld_seam", |b| {
        b.iter(|| {
            let mut output = Node::new();
            partition(&root, &options, &mut output).unwrap();
            output
        })
    });
}

criterion_group!(benches, bench_repartition, bench_weld);
criterion_main!(benches);
