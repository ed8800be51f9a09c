//! Field merging shared by both assembly modes.
//!
//! The caller describes where every output element and vertex comes from
//! as `(input index, local id)` placements; values then merge dtype-exact
//! through `Array::merge_ordered`. Inconsistent fields abort the domain
//! with a combination conflict; fields missing from some inputs are
//! dropped with a warning.

use std::collections::BTreeMap;

use log::warn;

use crate::error::MeshRepartError;
use crate::mesh::{field_association, Association};
use crate::tree::{Array, Node};

/// Merge all fields of `inputs` into `out/fields`.
///
/// `elem_placements` maps a topology name to the provenance of each output
/// element of that topology; `vertex_placement` covers the merged coordset.
pub(crate) fn merge_fields(
    domain: i64,
    inputs: &[&Node],
    elem_placements: &BTreeMap<String, Vec<(u32, u64)>>,
    vertex_placement: &[(u32, u64)],
    out: &mut Node,
) -> Result<(), MeshRepartError> {
    let mut names: Vec<&str> = Vec::new();
    for input in inputs {
        if let Some(fields) = input.get("fields") {
            for (name, _) in fields.children() {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
    }

    for name in names {
        let holders: Vec<&Node> = inputs
            .iter()
            .filter_map(|i| i.get("fields").and_then(|f| f.child(name)))
            .collect();
        if holders.len() != inputs.len() {
            warn!(
                "domain {domain}: field `{name}` is missing on {} of {} inputs; dropped",
                inputs.len() - holders.len(),
                inputs.len()
            );
            continue;
        }
        let assoc = field_association(holders[0])?;
        let topo_name = holders[0].fetch("topology")?.as_str()?;
        for h in &holders[1..] {
            if field_association(h)? != assoc {
                return Err(MeshRepartError::CombinationConflict {
                    domain,
                    field: name.to_owned(),
                    reason: "association differs between inputs".into(),
                });
            }
            if h.fetch("topology")?.as_str()? != topo_name {
                return Err(MeshRepartError::CombinationConflict {
                    domain,
                    field: name.to_owned(),
                    reason: "topology binding differs between inputs".into(),
                });
            }
        }
        let placement: &[(u32, u64)] = match assoc {
            Association::Element => elem_placements.get(topo_name).ok_or_else(|| {
                MeshRepartError::CombinationConflict {
                    domain,
                    field: name.to_owned(),
                    reason: format!("bound to unknown topology `{topo_name}`"),
                }
            })?,
            Association::Vertex => vertex_placement,
        };

        let values: Vec<&Node> = holders
            .iter()
            .map(|h| h.fetch("values"))
            .collect::<Result<_, _>>()?;
        let dst = out.fetch_mut(&format!("fields/{name}"));
        dst.fetch_mut("association").set_str(assoc.as_str());
        dst.fetch_mut("topology").set_str(topo_name);
        merge_values(domain, name, &values, placement, dst.fetch_mut("values"))?;
    }
    Ok(())
}

/// Merge plain or component-wise (mcarray) field values.
fn merge_values(
    domain: i64,
    name: &str,
    values: &[&Node],
    placement: &[(u32, u64)],
    out: &mut Node,
) -> Result<(), MeshRepartError> {
    let object = values[0].is_object();
    if values.iter().any(|v| v.is_object() != object) {
        return Err(MeshRepartError::CombinationConflict {
            domain,
            field: name.to_owned(),
            reason: "mixed scalar and component values".into(),
        });
    }
    if object {
        let comps: Vec<&str> = values[0].children().map(|(n, _)| n).collect();
        for comp in comps {
            let parts: Vec<&Array> = values
                .iter()
                .map(|v| {
                    v.child(comp)
                        .ok_or_else(|| MeshRepartError::CombinationConflict {
                            domain,
                            field: name.to_owned(),
                            reason: format!("component `{comp}` missing on an input"),
                        })
                        .and_then(|c| c.as_array())
                })
                .collect::<Result<_, _>>()?;
            let merged = merge_arrays(domain, name, &parts, placement)?;
            out.fetch_mut(comp).set_array(merged);
        }
    } else {
        let parts: Vec<&Array> = values
            .iter()
            .map(|v| v.as_array())
            .collect::<Result<_, _>>()?;
        out.set_array(merge_arrays(domain, name, &parts, placement)?);
    }
    Ok(())
}

fn merge_arrays(
    domain: i64,
    name: &str,
    parts: &[&Array],
    placement: &[(u32, u64)],
) -> Result<Array, MeshRepartError> {
    Array::merge_ordered(parts, placement).map_err(|e| match e {
        MeshRepartError::DtypeMismatch { expected, found } => {
            MeshRepartError::CombinationConflict {
                domain,
                field: name.to_owned(),
                reason: format!("dtype mismatch: {expected} vs {found}"),
            }
        }
        other => other,
    })
}
