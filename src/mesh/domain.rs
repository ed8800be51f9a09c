//! Domain-level helpers: multi-domain normalization, ids, lookups.

use crate::error::MeshRepartError;
use crate::mesh::topology;
use crate::tree::Node;

/// True if `node` looks like a single mesh domain.
pub fn is_domain(node: &Node) -> bool {
    node.has_child("coordsets")
}

/// Normalize a mesh tree into a list of domain nodes.
///
/// A single domain lifts to a length-1 list; otherwise every child that
/// carries a `coordsets` node is a domain, in insertion order.
pub fn domains(root: &Node) -> Vec<&Node> {
    if is_domain(root) {
        return vec![root];
    }
    root.children()
        .filter(|(_, c)| is_domain(c))
        .map(|(_, c)| c)
        .collect()
}

/// `state/domain_id` of a domain, if present.
pub fn domain_id(domain: &Node) -> Option<i64> {
    domain.get("state/domain_id").and_then(|n| n.to_i64().ok())
}

/// Look up a topology by name.
pub fn topology<'a>(domain: &'a Node, name: &str) -> Result<&'a Node, MeshRepartError> {
    domain
        .get("topologies")
        .and_then(|t| t.child(name))
        .ok_or_else(|| MeshRepartError::UnknownTopology {
            domain: domain_id(domain).unwrap_or(0),
            name: name.to_owned(),
        })
}

/// Name of the first topology of a domain.
pub fn first_topology_name(domain: &Node) -> Result<&str, MeshRepartError> {
    domain
        .get("topologies")
        .and_then(|t| t.child_at(0))
        .map(|(name, _)| name)
        .ok_or_else(|| MeshRepartError::PathNotFound("topologies[0]".into()))
}

/// Coordset referenced by a topology.
pub fn coordset_for<'a>(domain: &'a Node, topo: &Node) -> Result<&'a Node, MeshRepartError> {
    let name = topology::coordset_name(topo)?;
    domain
        .get("coordsets")
        .and_then(|c| c.child(name))
        .ok_or_else(|| MeshRepartError::UnknownCoordset(name.to_owned()))
}

/// Element count of a named topology.
pub fn topology_len(domain: &Node, name: &str) -> Result<u64, MeshRepartError> {
    let topo = topology(domain, name)?;
    let cset = coordset_for(domain, topo)?;
    topology::element_count(topo, cset)
}

/// Total element count across all topologies of a domain.
pub fn total_elements(domain: &Node) -> Result<u64, MeshRepartError> {
    let mut total = 0;
    if let Some(topos) = domain.get("topologies") {
        for (_, topo) in topos.children() {
            let cset = coordset_for(domain, topo)?;
            total += topology::element_count(topo, cset)?;
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_domain_lifts() {
        let mut m = Node::new();
        m.fetch_mut("coordsets/coords/type").set_str("explicit");
        assert_eq!(domains(&m).len(), 1);
    }

    #[test]
    fn multi_domain_children() {
        let mut m = Node::new();
        m.fetch_mut("domain_000000/coordsets/coords/type")
            .set_str("explicit");
        m.fetch_mut("domain_000001/coordsets/coords/type")
            .set_str("explicit");
        m.fetch_mut("not_a_domain").set_i64(1);
        assert_eq!(domains(&m).len(), 2);
    }
}
