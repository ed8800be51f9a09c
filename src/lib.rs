//! # mesh-repart
//!
//! mesh-repart is a repartitioning engine for blueprint-shaped scientific
//! mesh data. Given one or more mesh domains (coordsets, topologies,
//! fields) held in an attribute tree plus a set of options, it produces a
//! new set of domains whose number and decomposition follow the request:
//! selections are split adaptively to a target domain count, extracted
//! into self-contained chunks, placed greedily onto destination domains
//! and ranks, migrated between processes where needed, and recombined into
//! one mesh per output domain (structured where the pieces tile a brick,
//! unstructured otherwise).
//!
//! The engine runs serially or across a process group. All cross-process
//! interaction goes through [`comm::Communicator`]; the serial backend has
//! size 1 and trivial collectives, [`comm::ThreadComm`] drives multi-rank
//! tests inside one process, and an MPI backend binds the same surface to
//! a real communicator (feature `mpi-support`).
//!
//! ```
//! use mesh_repart::{meshgen, partition, tree::Node};
//!
//! // split a 4x4-cell uniform mesh into two domains
//! let mesh = meshgen::uniform([5, 5, 1], [0.0; 3], [1.0; 3]);
//! let mut options = Node::new();
//! options.fetch_mut("target").set_u64(2);
//! let mut output = Node::new();
//! partition(&mesh, &options, &mut output).unwrap();
//! assert_eq!(output.num_children(), 2);
//! ```

pub mod combine;
pub mod comm;
pub mod error;
pub mod mesh;
pub mod meshgen;
pub mod partition;
pub mod selection;
pub mod tree;

pub use error::MeshRepartError;
pub use partition::{partition, partition_with, Options, Partitioner};

/// A convenient prelude importing the most-used types.
pub mod prelude {
    #[cfg(feature = "mpi-support")]
    pub use crate::comm::MpiComm;
    pub use crate::comm::{Communicator, SerialComm, ThreadComm};
    pub use crate::error::MeshRepartError;
    pub use crate::partition::{partition, partition_with, Chunk, Options, Partitioner};
    pub use crate::selection::{Selection, FREE_DOMAIN_ID, FREE_RANK_ID};
    pub use crate::tree::{Array, DType, Node, Value};
}
