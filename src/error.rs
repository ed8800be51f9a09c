//! MeshRepartError: unified error type for mesh-repart public APIs.
//!
//! Every fallible operation in the crate reports through this enum so that
//! callers get one non-panicking error channel for the whole pipeline, from
//! option parsing to per-domain combination.

use thiserror::Error;

/// Unified error type for mesh-repart operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MeshRepartError {
    /// Strict path lookup failed.
    #[error("tree error: no node at path `{0}`")]
    PathNotFound(String),
    /// A node had a different kind than the caller required.
    #[error("tree error: expected {expected} node, found {found}")]
    WrongKind {
        expected: &'static str,
        found: &'static str,
    },
    /// Two arrays that must share a dtype do not.
    #[error("array dtype mismatch: {expected} vs {found}")]
    DtypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
    /// A serialized subtree could not be decoded.
    #[error("wire decode error: {0}")]
    WireDecode(String),
    /// The options tree contains an unknown key or a malformed value.
    #[error("malformed option at `{path}`: {reason}")]
    OptionMalformed { path: String, reason: String },
    /// A selection kind is incompatible with the topology it references.
    #[error("selection of type `{kind}` is not applicable to topology `{topology}` of domain {domain}")]
    SelectionInapplicable {
        kind: &'static str,
        domain: i64,
        topology: String,
    },
    /// An explicit/ranges selection references an element beyond the
    /// topology's element count.
    #[error("element id {id} is out of range for topology `{topology}` ({num_elements} elements)")]
    IdsOutOfRange {
        topology: String,
        id: u64,
        num_elements: u64,
    },
    /// The named topology does not exist on the referenced domain.
    #[error("domain {domain} has no topology named `{name}`")]
    UnknownTopology { domain: i64, name: String },
    /// A topology references a coordset that is not present.
    #[error("no coordset named `{0}`")]
    UnknownCoordset(String),
    /// An element shape name was not recognized.
    #[error("unsupported element shape `{0}`")]
    UnsupportedShape(String),
    /// Inputs destined for one output domain cannot be merged.
    #[error("cannot combine inputs for domain {domain}: field `{field}`: {reason}")]
    CombinationConflict {
        domain: i64,
        field: String,
        reason: String,
    },
    /// One or more output domains failed to combine; the rest were written.
    #[error("{0} output domain(s) failed to combine")]
    DomainsFailed(usize),
}
