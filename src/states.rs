//! Bridge seeding the external likelihood engine with a valid initial host
//! assignment for every node of an already-built symbiont tree.
use crate::host::{HostTree, NodeId};
use crate::tree::{SymbiontNode, SymbiontTree};
use rand::Rng;
use std::collections::HashMap;

/// The contract the downstream likelihood machinery exposes: one host state
/// per symbiont node plus a single origin height, set once after tree
/// construction.
pub trait LikelihoodStates {
    fn set_states_for_node(&mut self, node: &SymbiontNode, host: Option<NodeId>);
    fn set_origin_height(&mut self, height: f64);
}

/// Assign an initial host lineage to every symbiont node: tips follow the
/// per-taxon host attribute (no host when the attribute is absent), internal
/// nodes sample uniformly among the host lineages contemporaneous with their
/// height, optionally including the no-host choice. The origin height is the
/// host root's height.
///
/// A single non-recursive pass; it hardly simulates coevolution, but it
/// yields a valid random mapping to start from.
pub fn initialize_states<L, R>(
    host: &HostTree,
    symbiont: &SymbiontTree,
    host_attribute_of: &HashMap<String, String>,
    sampling_no_host: bool,
    states: &mut L,
    rng: &mut R,
) where
    L: LikelihoodStates + ?Sized,
    R: Rng,
{
    for node in symbiont.iter() {
        if node.is_external() {
            let assigned = node
                .taxon
                .as_deref()
                .and_then(|taxon| host_attribute_of.get(taxon))
                .and_then(|host_taxon| host.external_with_taxon(host_taxon));
            states.set_states_for_node(node, assigned);
        } else {
            let mut candidates: Vec<Option<NodeId>> = host
                .contemporaneous_lineages(node.height)
                .into_iter()
                .map(Some)
                .collect();
            if sampling_no_host {
                candidates.push(None);
            }
            let choice = candidates[rng.gen_range(0..candidates.len())];
            states.set_states_for_node(node, choice);
        }
    }
    states.set_origin_height(host.height_of(host.root()));
}
