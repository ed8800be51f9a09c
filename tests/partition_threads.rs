//! Multi-rank pipeline runs on in-process thread groups.

use std::thread;

use mesh_repart::comm::{Communicator, ThreadComm};
use mesh_repart::mesh::domain;
use mesh_repart::tree::Node;
use mesh_repart::{meshgen, partition_with};

/// Four ranks, one 10x10 structured domain each, repartitioned to two
/// output domains.
#[test]
fn four_ranks_to_two_domains() {
    let comms = ThreadComm::split(4);
    let handles: Vec<_> = comms
        .into_iter()
        .map(|comm| {
            thread::spawn(move || {
                let rank = comm.rank();
                let mut mesh = meshgen::structured(10, 10);
                mesh.fetch_mut("state/domain_id").set_i64(rank as i64);

                let mut options = Node::new();
                options.fetch_mut("target").set_u64(2);
                let mut output = Node::new();
                partition_with(&comm, &mesh, &options, &mut output).unwrap();
                (rank, output)
            })
        })
        .collect();

    let mut owned_domains: Vec<(usize, i64, u64)> = Vec::new();
    for h in handles {
        let (rank, output) = h.join().expect("rank thread");
        for d in domain::domains(&output) {
            let id = domain::domain_id(d).expect("combined domain has an id");
            let cells = domain::total_elements(d).unwrap();
            owned_domains.push((rank, id, cells));
        }
    }

    // exactly two output domains, each on exactly one rank
    assert_eq!(owned_domains.len(), 2);
    let mut ids: Vec<i64> = owned_domains.iter().map(|&(_, id, _)| id).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![0, 1]);
    let ranks: Vec<usize> = owned_domains.iter().map(|&(r, _, _)| r).collect();
    assert_ne!(ranks[0], ranks[1]);

    // all 400 elements survive, 200 per output domain
    let total: u64 = owned_domains.iter().map(|&(_, _, c)| c).sum();
    assert_eq!(total, 400);
    for &(_, _, cells) in &owned_domains {
        assert_eq!(cells, 200);
    }
}

/// A two-rank group where only rank 0 passes a target; the max wins
/// everywhere and both runs agree on the placement.
#[test]
fn target_is_reduced_across_ranks() {
    let comms = ThreadComm::split(2);
    let handles: Vec<_> = comms
        .into_iter()
        .map(|comm| {
            thread::spawn(move || {
                let rank = comm.rank();
                let mut mesh = meshgen::uniform([5, 5, 1], [rank as f64 * 4.0, 0.0, 0.0], [1.0; 3]);
                mesh.fetch_mut("state/domain_id").set_i64(rank as i64);
                let mut options = Node::new();
                if rank == 0 {
                    options.fetch_mut("target").set_u64(4);
                }
                let mut output = Node::new();
                partition_with(&comm, &mesh, &options, &mut output).unwrap();
                (rank, output)
            })
        })
        .collect();

    let mut total_domains = 0usize;
    let mut total_cells = 0u64;
    for h in handles {
        let (_, output) = h.join().expect("rank thread");
        for d in domain::domains(&output) {
            total_domains += 1;
            total_cells += domain::total_elements(d).unwrap();
        }
    }
    assert_eq!(total_domains, 4);
    assert_eq!(total_cells, 32);
}
