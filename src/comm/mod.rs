//! Process-group abstraction for the repartitioning pipeline.
//!
//! The engine factors every cross-process interaction through the
//! [`Communicator`] trait: rank/size queries, non-blocking byte
//! point-to-point with waitable handles, and the small set of collectives
//! the pipeline uses (sum / max-loc reductions and all-gathers). The serial
//! backend has size 1 and trivial collectives; the threaded backend drives
//! multi-rank tests inside one process; the MPI backend binds the same
//! surface to a real communicator.
//!
//! Wire conventions: all integers little-endian fixed width; payloads are
//! opaque byte slices produced by `tree::wire`.

pub mod local;
#[cfg(feature = "mpi-support")]
pub mod mpi;
pub mod serial;

pub use local::ThreadComm;
#[cfg(feature = "mpi-support")]
pub use mpi::MpiComm;
pub use serial::SerialComm;

/// Reserved tag for the scalar all-gather phase of the default collectives.
pub const TAG_GATHER: u16 = 0xA100;
/// Reserved tag for the variable-length all-gather data phase.
pub const TAG_GATHER_V: u16 = 0xA101;

/// Anything that can be waited on.
pub trait Wait {
    /// Wait for completion and return the received data (if any).
    fn wait(self) -> Option<Vec<u8>>;
}

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

/// Tag newtype for safer tag arithmetic.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct CommTag(u16);

impl CommTag {
    #[inline]
    pub const fn new(tag: u16) -> Self {
        Self(tag)
    }

    #[inline]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Offset the tag by `dx`, wrapping on overflow.
    #[inline]
    pub const fn offset(self, dx: u16) -> Self {
        Self(self.0.wrapping_add(dx))
    }
}

/// Per-chunk tag pair for the two-phase tree exchange: the receiver learns
/// the payload size on `sizes` before the payload lands on `data`.
#[derive(Copy, Clone, Debug)]
pub struct ChunkCommTags {
    pub sizes: CommTag,
    pub data: CommTag,
}

impl ChunkCommTags {
    /// Tags for the chunk at `global_index`, deterministic across ranks.
    #[inline]
    pub const fn for_chunk(base: u16, global_index: usize) -> Self {
        let b = CommTag::new(base).offset((global_index as u16).wrapping_mul(2));
        Self {
            sizes: b,
            data: b.offset(1),
        }
    }
}

/// Result of a max-location reduction.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MaxLoc {
    pub value: u64,
    /// Rank holding the maximum; ties resolve to the lower rank.
    pub rank: usize,
}

/// Result of a variable-length all-gather, concatenated in rank order.
#[derive(Clone, Debug)]
pub struct Gathered {
    pub bytes: Vec<u8>,
    pub counts: Vec<usize>,
    pub offsets: Vec<usize>,
}

/// Non-blocking communication interface plus the pipeline's collectives.
///
/// The collectives have default implementations built on the point-to-point
/// layer; backends with native collectives override them.
pub trait Communicator: Send + Sync {
    type SendHandle: Wait;
    type RecvHandle: Wait;

    /// Rank of this process (0..size-1).
    fn rank(&self) -> usize;
    /// Total number of ranks.
    fn size(&self) -> usize;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle;
    /// Post a receive of exactly `len` bytes from `peer`.
    fn irecv(&self, peer: usize, tag: u16, len: usize) -> Self::RecvHandle;

    /// Synchronization barrier (no-op for size-1 groups).
    fn barrier(&self) {}

    fn all_reduce_sum(&self, value: u64) -> u64 {
        self.all_gather_u64(value).iter().sum()
    }

    fn all_reduce_max_loc(&self, value: u64) -> MaxLoc {
        let all = self.all_gather_u64(value);
        let mut best = MaxLoc {
            value: all[0],
            rank: 0,
        };
        for (rank, &value) in all.iter().enumerate().skip(1) {
            if value > best.value {
                best = MaxLoc { value, rank };
            }
        }
        best
    }

    fn all_gather_u64(&self, value: u64) -> Vec<u64> {
        let size = self.size();
        if size == 1 {
            return vec![value];
        }
        let me = self.rank();
        let bytes = value.to_le_bytes();
        let mut sends = Vec::with_capacity(size - 1);
        for peer in 0..size {
            if peer != me {
                sends.push(self.isend(peer, TAG_GATHER, &bytes));
            }
        }
        let mut out = vec![0u64; size];
        out[me] = value;
        for peer in 0..size {
            if peer == me {
                continue;
            }
            let got = self
                .irecv(peer, TAG_GATHER, 8)
                .wait()
                .expect("collective gather receive");
            out[peer] = u64::from_le_bytes(got[..8].try_into().expect("8-byte message"));
        }
        for s in sends {
            s.wait();
        }
        out
    }

    fn all_gather_bytes(&self, local: &[u8]) -> Gathered {
        let size = self.size();
        let counts: Vec<usize> = self
            .all_gather_u64(local.len() as u64)
            .iter()
            .map(|&c| c as usize)
            .collect();
        let mut offsets = vec![0usize; size];
        for i in 1..size {
            offsets[i] = offsets[i - 1] + counts[i - 1];
        }
        let total = offsets[size - 1] + counts[size - 1];
        let mut bytes = vec![0u8; total];
        let me = self.rank();
        bytes[offsets[me]..offsets[me] + counts[me]].copy_from_slice(local);
        if size == 1 {
            return Gathered {
                bytes,
                counts,
                offsets,
            };
        }
        let mut sends = Vec::with_capacity(size - 1);
        for peer in 0..size {
            if peer != me {
                sends.push(self.isend(peer, TAG_GATHER_V, local));
            }
        }
        for peer in 0..size {
            if peer == me {
                continue;
            }
            let got = self
                .irecv(peer, TAG_GATHER_V, counts[peer])
                .wait()
                .expect("collective gather-v receive");
            bytes[offsets[peer]..offsets[peer] + counts[peer]].copy_from_slice(&got);
        }
        for s in sends {
            s.wait();
        }
        Gathered {
            bytes,
            counts,
            offsets,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_tags_are_disjoint_pairs() {
        let a = ChunkCommTags::for_chunk(12000, 0);
        let b = ChunkCommTags::for_chunk(12000, 1);
        assert_eq!(a.sizes.as_u16() + 1, a.data.as_u16());
        assert_eq!(b.sizes.as_u16(), a.data.as_u16() + 1);
    }
}
