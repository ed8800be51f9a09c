//! Chunk placement: assign every chunk a destination domain and rank.
//!
//! All ranks run the same algorithm over the same globally gathered chunk
//! records, so the resulting placement is identical everywhere without a
//! broadcast. Free chunks go to the domain with the fewest elements so
//! far; domains that still need a rank are placed largest-first onto the
//! least-loaded rank.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};

use log::{debug, warn};

use crate::comm::Communicator;
use crate::error::MeshRepartError;
use crate::partition::chunk::{Chunk, ChunkInfo};

/// Globally consistent placement of every chunk, indexed by global chunk id.
#[derive(Clone, Debug)]
pub struct ChunkMap {
    pub dest_rank: Vec<i64>,
    pub dest_domain: Vec<i64>,
    /// First global chunk id of each rank.
    pub offsets: Vec<usize>,
    pub num_elements: Vec<u64>,
}

impl ChunkMap {
    /// Number of distinct output domains.
    pub fn num_domains(&self) -> usize {
        self.dest_domain.iter().collect::<BTreeSet<_>>().len()
    }
}

pub fn map_chunks<C: Communicator>(
    comm: &C,
    target: u64,
    chunks: &[Chunk<'_>],
) -> Result<ChunkMap, MeshRepartError> {
    let local: Vec<ChunkInfo> = chunks
        .iter()
        .map(|c| c.info())
        .collect::<Result<_, _>>()?;
    let gathered = comm.all_gather_bytes(bytemuck::cast_slice(&local));
    let global: Vec<ChunkInfo> = bytemuck::pod_collect_to_vec(&gathered.bytes);
    let rec = std::mem::size_of::<ChunkInfo>();
    let offsets: Vec<usize> = gathered.offsets.iter().map(|o| o / rec).collect();
    let ntotal = global.len();

    let mut dest_rank: Vec<i64> = global
        .iter()
        .map(|ci| i64::from(ci.destination_rank))
        .collect();
    let mut dest_domain: Vec<i64> = global
        .iter()
        .map(|ci| i64::from(ci.destination_domain))
        .collect();
    let num_elements: Vec<u64> = global.iter().map(|ci| ci.num_elements).collect();

    // ---- destination domains -------------------------------------------
    let mut reserved: BTreeSet<i64> = BTreeSet::new();
    let mut domain_counts: BTreeMap<i64, u64> = BTreeMap::new();
    for i in 0..ntotal {
        if !global[i].domain_is_free() {
            reserved.insert(dest_domain[i]);
            *domain_counts.entry(dest_domain[i]).or_insert(0) += num_elements[i];
        }
    }
    if reserved.len() as u64 > target {
        warn!(
            "{} distinct reserved domain ids exceed the target of {target}; \
             free chunks will join the reserved domains",
            reserved.len()
        );
    } else {
        let to_create = target - reserved.len() as u64;
        let mut domid: i64 = 0;
        for _ in 0..to_create {
            while reserved.contains(&domid) {
                domid += 1;
            }
            reserved.insert(domid);
            domain_counts.insert(domid, 0);
        }
    }
    for i in 0..ntotal {
        if global[i].domain_is_free() {
            let (&best, _) = domain_counts
                .iter()
                .min_by_key(|&(_, &count)| count)
                .expect("at least one destination domain");
            dest_domain[i] = best;
            *domain_counts.get_mut(&best).expect("domain present") += num_elements[i];
        }
    }

    // ---- destination ranks ---------------------------------------------
    let mut rank_counts: BTreeMap<usize, u64> = (0..comm.size()).map(|r| (r, 0)).collect();
    let mut unplaced: BTreeSet<i64> = BTreeSet::new();
    for i in 0..ntotal {
        if global[i].rank_is_free() {
            unplaced.insert(dest_domain[i]);
        } else {
            *rank_counts
                .get_mut(&(dest_rank[i] as usize))
                .expect("rank in group") += num_elements[i];
        }
    }
    // place big domains first so small ones can fill the gaps
    let mut order: Vec<i64> = unplaced.into_iter().collect();
    order.sort_by_key(|d| (Reverse(domain_counts.get(d).copied().unwrap_or(0)), *d));
    for d in order {
        let (&rank, _) = rank_counts
            .iter()
            .min_by_key(|&(_, &count)| count)
            .expect("at least one rank");
        *rank_counts.get_mut(&rank).expect("rank present") +=
            domain_counts.get(&d).copied().unwrap_or(0);
        // every chunk of the domain moves to the chosen rank, pinned ones
        // included, so equal-domain chunks share a rank
        for i in 0..ntotal {
            if dest_domain[i] == d {
                dest_rank[i] = rank as i64;
            }
        }
    }

    debug!(
        "mapped {ntotal} chunks onto {} domains across {} ranks",
        domain_counts.len(),
        comm.size()
    );

    Ok(ChunkMap {
        dest_rank,
        dest_domain,
        offsets,
        num_elements,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::SerialComm;
    use crate::partition::chunk::Chunk;
    use crate::tree::Node;

    fn chunk_with_cells(n: u64, dd: i64, dr: i64) -> Chunk<'static> {
        let mut m = Node::new();
        m.fetch_mut("coordsets/coords/type").set_str("explicit");
        m.fetch_mut("coordsets/coords/values/x")
            .set_array(vec![0.0f64; (n + 2) as usize]);
        m.fetch_mut("topologies/mesh/type").set_str("unstructured");
        m.fetch_mut("topologies/mesh/coordset").set_str("coords");
        m.fetch_mut("topologies/mesh/elements/shape").set_str("line");
        m.fetch_mut("topologies/mesh/elements/connectivity")
            .set_array((0..2 * n).map(|i| i / 2).collect::<Vec<u64>>());
        Chunk::owned(m, dd, dr)
    }

    #[test]
    fn free_chunks_balance_by_element_count() {
        let comm = SerialComm;
        let chunks = vec![
            chunk_with_cells(10, -1, -1),
            chunk_with_cells(4, -1, -1),
            chunk_with_cells(4, -1, -1),
        ];
        let map = map_chunks(&comm, 2, &chunks).unwrap();
        assert_eq!(map.dest_domain[0], 0);
        // the two small chunks share the other domain
        assert_eq!(map.dest_domain[1], 1);
        assert_eq!(map.dest_domain[2], 1);
        assert!(map.dest_rank.iter().all(|&r| r == 0));
    }

    #[test]
    fn reserved_ids_survive_and_fresh_ids_avoid_them() {
        let comm = SerialComm;
        let chunks = vec![chunk_with_cells(4, 1, -1), chunk_with_cells(4, -1, -1)];
        let map = map_chunks(&comm, 2, &chunks).unwrap();
        assert_eq!(map.dest_domain[0], 1);
        // the fresh id enumerates around the reserved one
        assert_eq!(map.dest_domain[1], 0);
    }

    #[test]
    fn equal_domain_implies_equal_rank() {
        let comm = SerialComm;
        let chunks = vec![
            chunk_with_cells(4, 3, -1),
            chunk_with_cells(4, 3, -1),
            chunk_with_cells(4, -1, -1),
        ];
        let map = map_chunks(&comm, 1, &chunks).unwrap();
        for i in 0..3 {
            for j in 0..3 {
                if map.dest_domain[i] == map.dest_domain[j] {
                    assert_eq!(map.dest_rank[i], map.dest_rank[j]);
                }
            }
        }
    }
}
