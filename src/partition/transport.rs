//! Chunk redistribution: move every chunk to its destination rank.
//!
//! Sends and receives are posted non-blocking and paired by global chunk
//! index, with a size exchange ahead of each payload so the receiver can
//! allocate. Local chunks are re-wrapped instead of copied: the wrapper
//! shares the array payloads and only replaces `state/domain_id`.

use crate::comm::{ChunkCommTags, Communicator, Wait};
use crate::error::MeshRepartError;
use crate::partition::chunk::Chunk;
use crate::partition::map::ChunkMap;
use crate::tree::wire;

/// Base tag for chunk migration; chunk `g` uses the pair `BASE + 2g`,
/// `BASE + 2g + 1`.
pub const PARTITION_TAG_BASE: u16 = 12000;

/// Deliver every chunk to its destination rank and renumber
/// `state/domain_id` to the assigned destination domain.
///
/// Returns this rank's chunks to assemble, ordered by ascending global
/// chunk index. Sent chunks are released on the sender once their sends
/// complete.
pub fn communicate_chunks<'a, C: Communicator>(
    comm: &C,
    chunks: Vec<Chunk<'a>>,
    map: &ChunkMap,
) -> Result<Vec<Chunk<'a>>, MeshRepartError> {
    let rank = comm.rank();
    let size = comm.size();

    if size == 1 {
        return Ok(chunks
            .into_iter()
            .enumerate()
            .map(|(i, ch)| renumbered(ch, map.dest_domain[i], rank))
            .collect());
    }

    let ntotal = map.dest_rank.len();

    // sender of each global chunk, from the per-rank offsets
    let mut src_rank = vec![size - 1; ntotal];
    let mut idx = 0;
    for r in 1..size {
        let n = map.offsets[r] - map.offsets[r - 1];
        for _ in 0..n {
            src_rank[idx] = r - 1;
            idx += 1;
        }
    }

    // post sends for chunks that must migrate
    let my_offset = map.offsets[rank];
    let mut send_handles = Vec::new();
    for (i, ch) in chunks.iter().enumerate() {
        let g = my_offset + i;
        let dest = map.dest_rank[g] as usize;
        if dest == rank {
            continue;
        }
        let tags = ChunkCommTags::for_chunk(PARTITION_TAG_BASE, g);
        let payload = wire::encode_tree(ch.node());
        let len_bytes = (payload.len() as u64).to_le_bytes();
        send_handles.push(comm.isend(dest, tags.sizes.as_u16(), &len_bytes));
        send_handles.push(comm.isend(dest, tags.data.as_u16(), &payload));
    }

    // collect local and incoming chunks in ascending global order
    let mut slots: Vec<Option<Chunk<'a>>> = chunks.into_iter().map(Some).collect();
    let mut out = Vec::new();
    for g in 0..ntotal {
        if map.dest_rank[g] as usize != rank {
            continue;
        }
        let dd = map.dest_domain[g];
        if g >= my_offset && g < my_offset + slots.len() {
            let ch = slots[g - my_offset].take().expect("local chunk taken once");
            out.push(renumbered(ch, dd, rank));
        } else {
            let tags = ChunkCommTags::for_chunk(PARTITION_TAG_BASE, g);
            let src = src_rank[g];
            let len_msg = comm
                .irecv(src, tags.sizes.as_u16(), 8)
                .wait()
                .expect("size message");
            let len = u64::from_le_bytes(len_msg[..8].try_into().expect("8-byte size"));
            let payload = comm
                .irecv(src, tags.data.as_u16(), len as usize)
                .wait()
                .expect("payload message");
            let mut node = wire::decode_tree(&payload)?;
            node.fetch_mut("state/domain_id").set_i64(dd);
            out.push(Chunk::owned(node, dd, rank as i64));
        }
    }

    for h in send_handles {
        h.wait();
    }
    comm.barrier();
    Ok(out)
}

/// Re-wrap a chunk under its assigned destination domain id. The clone is
/// structural only; array payloads stay shared.
fn renumbered<'a>(ch: Chunk<'a>, dest_domain: i64, rank: usize) -> Chunk<'a> {
    let mut node = ch.mesh.into_owned();
    node.fetch_mut("state/domain_id").set_i64(dest_domain);
    Chunk::owned(node, dest_domain, rank as i64)
}
