//! Chunks: extracted sub-meshes awaiting placement.

use std::borrow::Cow;

use bytemuck::{Pod, Zeroable};

use crate::error::MeshRepartError;
use crate::mesh::domain;
use crate::selection::{FREE_DOMAIN_ID, FREE_RANK_ID};
use crate::tree::Node;

/// A sub-mesh plus its requested placement. Borrowed chunks wrap an input
/// domain; owned chunks come from extraction or a receive and are freed
/// with the chunk.
#[derive(Clone, Debug)]
pub struct Chunk<'a> {
    pub mesh: Cow<'a, Node>,
    pub destination_rank: i64,
    pub destination_domain: i64,
}

impl<'a> Chunk<'a> {
    pub fn borrowed(mesh: &'a Node, destination_domain: i64, destination_rank: i64) -> Self {
        Self {
            mesh: Cow::Borrowed(mesh),
            destination_rank,
            destination_domain,
        }
    }

    pub fn owned(mesh: Node, destination_domain: i64, destination_rank: i64) -> Self {
        Self {
            mesh: Cow::Owned(mesh),
            destination_rank,
            destination_domain,
        }
    }

    pub fn node(&self) -> &Node {
        &self.mesh
    }

    /// Element count across all topologies of the chunk.
    pub fn num_elements(&self) -> Result<u64, MeshRepartError> {
        domain::total_elements(self.node())
    }

    /// Wire record describing this chunk for the global all-gather.
    pub fn info(&self) -> Result<ChunkInfo, MeshRepartError> {
        Ok(ChunkInfo {
            num_elements: self.num_elements()?,
            destination_rank: self.destination_rank as i32,
            destination_domain: self.destination_domain as i32,
        })
    }
}

/// Per-chunk placement record exchanged between ranks.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct ChunkInfo {
    pub num_elements: u64,
    pub destination_rank: i32,
    pub destination_domain: i32,
}

impl ChunkInfo {
    pub fn rank_is_free(&self) -> bool {
        i64::from(self.destination_rank) == FREE_RANK_ID
    }

    pub fn domain_is_free(&self) -> bool {
        i64::from(self.destination_domain) == FREE_DOMAIN_ID
    }
}

const _: () = {
    assert!(std::mem::size_of::<ChunkInfo>() == 16);
    assert!(std::mem::align_of::<ChunkInfo>() == 8);
};
