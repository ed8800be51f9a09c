//! Selection kinds: descriptors for regions of one topology of one domain.
//!
//! A selection is a tagged variant (logical box, explicit id list, id
//! ranges, tag field) over a shared header carrying the target domain and
//! topology plus the requested destination domain/rank. Each kind knows how
//! to test applicability, measure itself, split in half, and project to
//! element ids.

pub mod explicit;
pub mod field;
pub mod logical;
pub mod ranges;

pub use explicit::ExplicitSelection;
pub use field::FieldSelection;
pub use logical::LogicalSelection;
pub use ranges::RangesSelection;

use std::fmt;

use crate::error::MeshRepartError;
use crate::mesh::domain;
use crate::tree::Node;

/// Destination domain id of a chunk that is free to be placed anywhere.
pub const FREE_DOMAIN_ID: i64 = -1;
/// Destination rank of a chunk that is free to be placed anywhere.
pub const FREE_RANK_ID: i64 = -1;

/// Header shared by every selection kind.
#[derive(Clone, Debug, PartialEq)]
pub struct SelectionCommon {
    /// Domain id of the mesh this selection applies to.
    pub domain_id: i64,
    /// Topology name on that domain; filled with the domain's first
    /// topology during resolution when the options omit it.
    pub topology: String,
    pub destination_domain: i64,
    pub destination_rank: i64,
    /// Cleared on field-derived sub-selections, which are one-shot.
    pub splittable: bool,
}

impl Default for SelectionCommon {
    fn default() -> Self {
        Self {
            domain_id: 0,
            topology: String::new(),
            destination_domain: FREE_DOMAIN_ID,
            destination_rank: FREE_RANK_ID,
            splittable: true,
        }
    }
}

/// A region of interest on one topology of one domain.
#[derive(Clone, Debug, PartialEq)]
pub enum Selection {
    Logical(LogicalSelection),
    Explicit(ExplicitSelection),
    Ranges(RangesSelection),
    Field(FieldSelection),
}

impl Selection {
    /// Parse one selection subtree from the options.
    pub fn from_node(n: &Node, path: &str) -> Result<Selection, MeshRepartError> {
        let ty = n
            .get("type")
            .ok_or_else(|| MeshRepartError::OptionMalformed {
                path: format!("{path}/type"),
                reason: "selection has no `type`".into(),
            })?
            .as_str()?;
        let mut common = SelectionCommon::default();
        if let Some(d) = n.get("domain_id") {
            common.domain_id = d.to_i64()?;
        }
        if let Some(t) = n.get("topology") {
            common.topology = t.as_str()?.to_owned();
        }
        if let Some(d) = n.get("destination_domain") {
            common.destination_domain = d.to_i64()?;
        }
        if let Some(r) = n.get("destination_rank") {
            common.destination_rank = r.to_i64()?;
        }
        match ty {
            "logical" => Ok(Selection::Logical(LogicalSelection::from_node(
                common, n, path,
            )?)),
            "explicit" => Ok(Selection::Explicit(ExplicitSelection::from_node(
                common, n, path,
            )?)),
            "ranges" => Ok(Selection::Ranges(RangesSelection::from_node(
                common, n, path,
            )?)),
            "field" => Ok(Selection::Field(FieldSelection::from_node(
                common, n, path,
            )?)),
            other => Err(MeshRepartError::OptionMalformed {
                path: format!("{path}/type"),
                reason: format!("unknown selection type `{other}`"),
            }),
        }
    }

    pub fn common(&self) -> &SelectionCommon {
        match self {
            Selection::Logical(s) => &s.common,
            Selection::Explicit(s) => &s.common,
            Selection::Ranges(s) => &s.common,
            Selection::Field(s) => &s.common,
        }
    }

    pub fn common_mut(&mut self) -> &mut SelectionCommon {
        match self {
            Selection::Logical(s) => &mut s.common,
            Selection::Explicit(s) => &mut s.common,
            Selection::Ranges(s) => &mut s.common,
            Selection::Field(s) => &mut s.common,
        }
    }

    pub const fn kind_name(&self) -> &'static str {
        match self {
            Selection::Logical(_) => "logical",
            Selection::Explicit(_) => "explicit",
            Selection::Ranges(_) => "ranges",
            Selection::Field(_) => "field",
        }
    }

    /// The topology node this selection targets on `mesh`.
    pub fn topo<'a>(&self, mesh: &'a Node) -> Result<&'a Node, MeshRepartError> {
        domain::topology(mesh, &self.common().topology)
    }

    /// Fill defaults against the mesh and check applicability; called once
    /// during `initialize`.
    pub fn resolve(&mut self, mesh: &Node) -> Result<(), MeshRepartError> {
        if self.common().topology.is_empty() {
            let name = domain::first_topology_name(mesh)?.to_owned();
            self.common_mut().topology = name;
        }
        // the topology must exist before the kind check can run
        self.topo(mesh)?;
        if !self.applicable(mesh)? {
            return Err(MeshRepartError::SelectionInapplicable {
                kind: self.kind_name(),
                domain: self.common().domain_id,
                topology: self.common().topology.clone(),
            });
        }
        match self {
            Selection::Logical(s) => s.resolve(mesh),
            Selection::Explicit(_) | Selection::Ranges(_) | Selection::Field(_) => Ok(()),
        }
    }

    /// Type-compatibility check against the referenced topology.
    pub fn applicable(&self, mesh: &Node) -> Result<bool, MeshRepartError> {
        match self {
            Selection::Logical(s) => s.applicable(mesh),
            Selection::Explicit(s) => s.applicable(mesh),
            Selection::Ranges(s) => s.applicable(mesh),
            Selection::Field(s) => s.applicable(mesh),
        }
    }

    /// Number of selected elements.
    pub fn length(&self, mesh: &Node) -> Result<u64, MeshRepartError> {
        match self {
            Selection::Logical(s) => s.length(mesh),
            Selection::Explicit(s) => Ok(s.length()),
            Selection::Ranges(s) => Ok(s.length()),
            Selection::Field(s) => s.length(mesh),
        }
    }

    /// True iff the selection covers every element of its topology.
    pub fn is_whole(&self, mesh: &Node) -> Result<bool, MeshRepartError> {
        match self {
            Selection::Logical(s) => s.is_whole(mesh),
            Selection::Explicit(s) => s.is_whole(mesh),
            Selection::Ranges(s) => s.is_whole(mesh),
            Selection::Field(s) => Ok(s.is_whole()),
        }
    }

    /// Produce a covering of this selection (two halves, or one
    /// sub-selection per distinct tag for field selections).
    pub fn partition(&self, mesh: &Node) -> Result<Vec<Selection>, MeshRepartError> {
        match self {
            Selection::Logical(s) => s.partition(),
            Selection::Explicit(s) => s.partition(),
            Selection::Ranges(s) => s.partition(),
            Selection::Field(s) => s.partition(mesh),
        }
    }

    /// Append selected element ids within `[lo, hi]` (inclusive) in
    /// topology-local numbering, ascending.
    pub fn project_elements(
        &self,
        mesh: &Node,
        lo: u64,
        hi: u64,
        out: &mut Vec<u64>,
    ) -> Result<(), MeshRepartError> {
        match self {
            Selection::Logical(s) => s.project_elements(mesh, lo, hi, out),
            Selection::Explicit(s) => s.project_elements(lo, hi, out),
            Selection::Ranges(s) => s.project_elements(lo, hi, out),
            Selection::Field(s) => s.project_elements(mesh, lo, hi, out),
        }
    }

    /// Whether the splitter may partition this selection further.
    pub fn can_split(&self, mesh: &Node) -> bool {
        if !self.common().splittable {
            return false;
        }
        match self {
            Selection::Logical(s) => s.can_split(mesh),
            Selection::Explicit(s) => s.elements.len() >= 2,
            Selection::Ranges(s) => s.length() >= 2,
            // field selections partition once, at initialization
            Selection::Field(_) => false,
        }
    }

    /// Largest element id this selection references, when it enumerates ids.
    pub fn max_element_id(&self) -> Option<u64> {
        match self {
            Selection::Explicit(s) => s.elements.last().copied(),
            Selection::Ranges(s) => s.ranges.last().map(|&(_, hi)| hi),
            _ => None,
        }
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = self.common();
        write!(
            f,
            "{} selection on domain {} topology `{}` (dest domain {}, dest rank {})",
            self.kind_name(),
            c.domain_id,
            c.topology,
            c.destination_domain,
            c.destination_rank
        )?;
        match self {
            Selection::Logical(s) => write!(
                f,
                " start [{}, {}, {}] end [{}, {}, {}]",
                s.start[0], s.start[1], s.start[2], s.end[0], s.end[1], s.end[2]
            ),
            Selection::Explicit(s) => write!(f, " with {} element ids", s.elements.len()),
            Selection::Ranges(s) => write!(f, " with {} ranges", s.ranges.len()),
            Selection::Field(s) => write!(f, " tagged by field `{}`", s.field),
        }
    }
}

/// Read a u64 list from an options child.
pub(crate) fn u64_list(n: &Node, path: &str) -> Result<Vec<u64>, MeshRepartError> {
    n.as_array()
        .map(|a| a.to_u64_vec())
        .map_err(|_| MeshRepartError::OptionMalformed {
            path: path.to_owned(),
            reason: "expected an integer array".into(),
        })
}
