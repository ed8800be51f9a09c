//! Partitioner driver: selections → splitting → extraction → mapping →
//! redistribution → combination.

pub mod chunk;
pub mod extract;
pub mod map;
pub mod options;
pub mod transport;

pub use chunk::{Chunk, ChunkInfo};
pub use map::ChunkMap;
pub use options::Options;

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, warn};

use crate::combine;
use crate::comm::{Communicator, SerialComm};
use crate::error::MeshRepartError;
use crate::mesh::{domain, topology};
use crate::selection::{
    LogicalSelection, RangesSelection, Selection, SelectionCommon, FREE_DOMAIN_ID,
};
use crate::tree::Node;

/// Repartitioning engine over one process group.
///
/// `initialize` interprets the mesh and options; `execute` runs the
/// pipeline and writes the output domains. Several engines may coexist per
/// process; the input mesh is never mutated.
pub struct Partitioner<'a, C: Communicator> {
    comm: &'a C,
    options: Options,
    domains: Vec<&'a Node>,
    domain_ids: Vec<i64>,
    /// Mesh each selection applies to, parallel to `selections`.
    meshes: Vec<&'a Node>,
    selections: Vec<Selection>,
    target: u64,
}

impl<'a, C: Communicator> Partitioner<'a, C> {
    pub fn new(comm: &'a C) -> Self {
        Self {
            comm,
            options: Options::default(),
            domains: Vec::new(),
            domain_ids: Vec::new(),
            meshes: Vec::new(),
            selections: Vec::new(),
            target: 1,
        }
    }

    pub fn target(&self) -> u64 {
        self.target
    }

    pub fn selections(&self) -> &[Selection] {
        &self.selections
    }

    /// Interpret the mesh and options, build the selection list, and
    /// resolve the global target domain count.
    pub fn initialize(
        &mut self,
        mesh: &'a Node,
        options: &Node,
    ) -> Result<(), MeshRepartError> {
        self.options = Options::from_node(options)?;
        self.domains = domain::domains(mesh);
        self.domain_ids = self
            .domains
            .iter()
            .enumerate()
            .map(|(i, d)| domain::domain_id(d).unwrap_or(i as i64))
            .collect();
        self.meshes.clear();
        self.selections.clear();

        if self.options.selections.is_empty() {
            for (i, &d) in self.domains.iter().enumerate() {
                if let Some(mut sel) = whole_selection(d, self.domain_ids[i])? {
                    sel.resolve(d)?;
                    self.meshes.push(d);
                    self.selections.push(sel);
                }
            }
        } else {
            for mut sel in self.options.selections.clone() {
                let Some(d) = self.find_domain(sel.common().domain_id) else {
                    // this rank does not own the referenced domain
                    continue;
                };
                sel.resolve(d)?;
                if matches!(sel, Selection::Field(_)) {
                    // one-shot expansion; the splitter never divides these
                    for sub in sel.partition(d)? {
                        self.meshes.push(d);
                        self.selections.push(sub);
                    }
                } else {
                    self.meshes.push(d);
                    self.selections.push(sel);
                }
            }
        }

        // target: max over ranks, floored at the reserved-domain count
        let local = self.options.target.unwrap_or(0);
        let mut target = self
            .comm
            .all_gather_u64(local)
            .into_iter()
            .max()
            .unwrap_or(0)
            .max(1);
        let reserved = self.global_reserved_domains();
        if reserved.len() as u64 > target {
            warn!(
                "{} distinct destination-domain ids exceed the target of {target}; \
                 raising the target",
                reserved.len()
            );
            target = reserved.len() as u64;
        }
        self.target = target;
        debug!(
            "initialized with {} local selection(s), target {target}",
            self.selections.len()
        );
        Ok(())
    }

    fn find_domain(&self, id: i64) -> Option<&'a Node> {
        self.domain_ids
            .iter()
            .position(|&d| d == id)
            .map(|i| self.domains[i])
    }

    /// Distinct fixed destination-domain ids across the process group.
    fn global_reserved_domains(&self) -> BTreeSet<i64> {
        let local: Vec<i64> = self
            .selections
            .iter()
            .map(|s| s.common().destination_domain)
            .filter(|&d| d != FREE_DOMAIN_ID)
            .collect();
        let gathered = self.comm.all_gather_bytes(bytemuck::cast_slice(&local));
        let all: Vec<i64> = bytemuck::pod_collect_to_vec(&gathered.bytes);
        all.into_iter().collect()
    }

    /// Iteratively split the globally largest selection until the group
    /// holds `target` selections (or nothing can be split any further).
    pub fn split_selections(&mut self) -> Result<(), MeshRepartError> {
        loop {
            let total = self.comm.all_reduce_sum(self.selections.len() as u64);
            if total >= self.target {
                break;
            }
            // largest splittable selection on this rank; lower index wins ties
            let mut best: Option<(u64, usize)> = None;
            for (i, sel) in self.selections.iter().enumerate() {
                if !sel.can_split(self.meshes[i]) {
                    continue;
                }
                let len = sel.length(self.meshes[i])?;
                if best.map_or(true, |(blen, _)| len > blen) {
                    best = Some((len, i));
                }
            }
            let local_best = best.map_or(0, |(len, _)| len);
            let global = self.comm.all_reduce_max_loc(local_best);
            if global.value < 2 {
                warn!(
                    "no selection can be split further; stopping at {total} of \
                     {} target domains",
                    self.target
                );
                break;
            }
            if global.rank == self.comm.rank() {
                let (_, idx) = best.expect("winning rank has a local best");
                let mesh = self.meshes[idx];
                let children = self.selections[idx].partition(mesh)?;
                let n = children.len();
                self.selections.splice(idx..idx + 1, children);
                self.meshes
                    .splice(idx..idx + 1, std::iter::repeat(mesh).take(n));
            }
        }
        Ok(())
    }

    /// Run the pipeline end-to-end and write the combined domains into
    /// `output`. A single global output domain is written directly at the
    /// root; otherwise each domain lands under `domain_XXXXXX`.
    pub fn execute(&mut self, output: &mut Node) -> Result<(), MeshRepartError> {
        self.split_selections()?;

        let mut chunks: Vec<Chunk<'a>> = Vec::with_capacity(self.selections.len());
        for (i, sel) in self.selections.iter().enumerate() {
            let mesh = self.meshes[i];
            let c = sel.common();
            if sel.is_whole(mesh)? {
                chunks.push(Chunk::borrowed(mesh, c.destination_domain, c.destination_rank));
            } else {
                let extracted = extract::extract(sel, mesh, &self.options)?;
                chunks.push(Chunk::owned(
                    extracted,
                    c.destination_domain,
                    c.destination_rank,
                ));
            }
        }

        let map = map::map_chunks(self.comm, self.target, &chunks)?;
        let n_output_domains = map.num_domains();
        let assembled = transport::communicate_chunks(self.comm, chunks, &map)?;

        let mut groups: BTreeMap<i64, Vec<&Node>> = BTreeMap::new();
        for ch in &assembled {
            groups.entry(ch.destination_domain).or_default().push(ch.node());
        }

        let mut failures = 0usize;
        for (dd, inputs) in &groups {
            let mut result = Node::new();
            match combine::combine(*dd, inputs, &self.options, &mut result) {
                Ok(()) => {
                    if n_output_domains == 1 {
                        *output = result;
                    } else {
                        output.insert_child(&format!("domain_{dd:06}"), result);
                    }
                }
                Err(e) => {
                    warn!("skipping output domain {dd}: {e}");
                    failures += 1;
                }
            }
        }
        if failures > 0 {
            return Err(MeshRepartError::DomainsFailed(failures));
        }
        Ok(())
    }

    /// Combine a group of meshes into the single output for `domain`.
    ///
    /// Exposed for direct use and tests; serial, local to this rank.
    pub fn combine(
        &self,
        domain: i64,
        inputs: &[&Node],
        output: &mut Node,
    ) -> Result<(), MeshRepartError> {
        combine::combine(domain, inputs, &self.options, output)
    }
}

/// Best whole-mesh selection for a domain: logical for implicit
/// topologies, ranges otherwise. Empty domains yield no selection.
fn whole_selection(
    mesh: &Node,
    domain_id: i64,
) -> Result<Option<Selection>, MeshRepartError> {
    let topo_name = domain::first_topology_name(mesh)?;
    let topo = domain::topology(mesh, topo_name)?;
    let cset = domain::coordset_for(mesh, topo)?;
    let common = SelectionCommon {
        domain_id,
        topology: topo_name.to_owned(),
        ..SelectionCommon::default()
    };
    if topology::kind(topo)?.is_implicit() {
        Ok(Some(Selection::Logical(LogicalSelection::whole(
            common,
            topology::point_dims_for(topo, cset)?,
        ))))
    } else {
        let n = topology::element_count(topo, cset)?;
        if n == 0 {
            debug!("domain {domain_id} is empty; no selection created");
            return Ok(None);
        }
        Ok(Some(Selection::Ranges(RangesSelection::new(
            common,
            vec![(0, n - 1)],
        ))))
    }
}

/// Repartition `mesh` according to `options` on a single process.
pub fn partition(
    mesh: &Node,
    options: &Node,
    output: &mut Node,
) -> Result<(), MeshRepartError> {
    partition_with(&SerialComm, mesh, options, output)
}

/// Repartition `mesh` across the given process group.
pub fn partition_with<C: Communicator>(
    comm: &C,
    mesh: &Node,
    options: &Node,
    output: &mut Node,
) -> Result<(), MeshRepartError> {
    let mut partitioner = Partitioner::new(comm);
    partitioner.initialize(mesh, options)?;
    partitioner.execute(output)
}
