//! Combination: merge the chunks of one destination domain into a single
//! mesh, structured where the inputs tile a logical brick, unstructured
//! otherwise.

pub(crate) mod fields;
pub mod structured;
pub mod unstructured;

use log::debug;

use crate::error::MeshRepartError;
use crate::mesh::coordset;
use crate::mesh::topology::{self, TopoKind};
use crate::partition::options::Options;
use crate::tree::Node;

/// Assembly mode decided from the input metadata before any work happens.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AssemblyMode {
    Structured,
    Unstructured,
}

/// Decide how a group of inputs can be recombined.
///
/// Structured assembly needs every input to carry exactly one topology of
/// one shared implicit kind (uniform or rectilinear) over one shared
/// coordset kind; the tiling itself is verified later and failure falls
/// back to unstructured.
pub fn recommended_mode(inputs: &[&Node]) -> AssemblyMode {
    let mut kinds = None;
    for input in inputs {
        let Some(topos) = input.get("topologies") else {
            return AssemblyMode::Unstructured;
        };
        if topos.num_children() != 1 {
            return AssemblyMode::Unstructured;
        }
        let (_, topo) = topos.child_at(0).expect("one topology");
        let Ok(tkind) = topology::kind(topo) else {
            return AssemblyMode::Unstructured;
        };
        if !matches!(tkind, TopoKind::Uniform | TopoKind::Rectilinear) {
            return AssemblyMode::Unstructured;
        }
        let Ok(cset) = crate::mesh::domain::coordset_for(input, topo) else {
            return AssemblyMode::Unstructured;
        };
        let Ok(ckind) = coordset::kind(cset) else {
            return AssemblyMode::Unstructured;
        };
        match kinds {
            None => kinds = Some((tkind, ckind)),
            Some(k) if k != (tkind, ckind) => return AssemblyMode::Unstructured,
            Some(_) => {}
        }
    }
    AssemblyMode::Structured
}

/// Combine `inputs` into the single output mesh for `domain`.
pub fn combine(
    domain: i64,
    inputs: &[&Node],
    opts: &Options,
    output: &mut Node,
) -> Result<(), MeshRepartError> {
    assert!(!inputs.is_empty(), "combine requires at least one input");
    if inputs.len() == 1 {
        // structural clone; array payloads stay shared with the chunk
        *output = inputs[0].clone();
        output.fetch_mut("state/domain_id").set_i64(domain);
        return Ok(());
    }
    if recommended_mode(inputs) == AssemblyMode::Structured {
        let mut result = Node::new();
        if structured::combine_as_structured(domain, inputs, &mut result)? {
            *output = result;
            return Ok(());
        }
        debug!("domain {domain}: inputs do not tile a brick, assembling unstructured");
    }
    unstructured::combine_as_unstructured(domain, inputs, opts, output)
}
