//! The fixed host phylogeny the symbiont lineages evolve on, with the
//! read-only queries the simulator consumes and a birth-death generator used
//! to build host trees from scratch.
use anyhow::{bail, ensure};
use rand::Rng;
use rand_distr::Exp;
use std::fmt::Write as _;

/// Index of a node within the host tree arena.
pub type NodeId = usize;

/// Number of times the host birth-death simulation restarts after a whole-tree
/// extinction before giving up on the parameter regime.
const MAX_HOST_ATTEMPTS: u32 = 10_000;
/// Cap on the branching events of one host simulation attempt.
const MAX_HOST_EVENTS: u32 = 10_000;

/// A node of the host tree. Heights increase from the tips towards the root;
/// tips of an ultrametric tree sit at height zero.
#[derive(Clone, Debug)]
pub struct HostNode {
    pub height: f64,
    pub parent: Option<NodeId>,
    /// Empty for a tip, exactly two entries otherwise.
    pub children: Vec<NodeId>,
    /// Taxon identifier, carried by every tip.
    pub taxon: Option<String>,
}

/// Immutable, rooted binary host tree. Built once, outliving every
/// simulation attempt that runs on it.
#[derive(Clone, Debug)]
pub struct HostTree {
    nodes: Vec<HostNode>,
    root: NodeId,
    externals: Vec<NodeId>,
}

impl HostTree {
    pub fn new(nodes: Vec<HostNode>, root: NodeId) -> anyhow::Result<Self> {
        //! Validate the arena and index the external nodes. Heights must
        //! strictly decrease from the root towards the tips and every node
        //! must have zero or two children.
        ensure!(!nodes.is_empty(), "host tree without nodes");
        ensure!(root < nodes.len(), "root {} out of bounds", root);
        ensure!(nodes[root].parent.is_none(), "root {} has a parent", root);
        for (id, node) in nodes.iter().enumerate() {
            ensure!(
                node.height.is_finite() && node.height >= 0.,
                "node {} with height {}",
                id,
                node.height
            );
            match node.children.len() {
                0 => ensure!(node.taxon.is_some(), "tip {} without taxon", id),
                2 => {
                    for &child in &node.children {
                        ensure!(child < nodes.len(), "child {} out of bounds", child);
                        ensure!(
                            nodes[child].parent == Some(id),
                            "child {} does not point back to {}",
                            child,
                            id
                        );
                        ensure!(
                            nodes[child].height < node.height,
                            "child {} at height {} not below parent {} at {}",
                            child,
                            nodes[child].height,
                            id,
                            node.height
                        );
                    }
                }
                n => bail!("node {} with {} children", id, n),
            }
        }
        let externals = (0..nodes.len())
            .filter(|&id| nodes[id].children.is_empty())
            .collect();
        Ok(HostTree { nodes, root, externals })
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn height_of(&self, node: NodeId) -> f64 {
        self.nodes[node].height
    }

    pub fn parent_of(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node].parent
    }

    pub fn children_of(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node].children
    }

    pub fn is_root(&self, node: NodeId) -> bool {
        node == self.root
    }

    pub fn is_external(&self, node: NodeId) -> bool {
        self.nodes[node].children.is_empty()
    }

    pub fn taxon_of(&self, node: NodeId) -> Option<&str> {
        self.nodes[node].taxon.as_deref()
    }

    pub fn external_count(&self) -> usize {
        self.externals.len()
    }

    /// Position of a tip within the tree's tip ordering.
    pub fn external_index(&self, node: NodeId) -> Option<usize> {
        self.externals.iter().position(|&tip| tip == node)
    }

    pub fn external_with_taxon(&self, taxon: &str) -> Option<NodeId> {
        self.externals
            .iter()
            .copied()
            .find(|&tip| self.taxon_of(tip) == Some(taxon))
    }

    /// All branches alive at `height`: a branch spans the half-open interval
    /// from its own height (included) up to its parent's height (excluded).
    /// The root branch extends upwards without bound, covering origins drawn
    /// past the root.
    pub fn contemporaneous_lineages(&self, height: f64) -> Vec<NodeId> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| {
                node.height <= height
                    && match node.parent {
                        Some(parent) => height < self.nodes[parent].height,
                        None => true,
                    }
            })
            .map(|(id, _)| id)
            .collect()
    }

    /// Simulate a host tree under a constant-rate birth-death process started
    /// from a single lineage at `origin`, conditioned on at least two tips
    /// surviving to the present. Extinct side branches are spliced out; tips
    /// sit at height zero and are labelled `host1..hostN` left to right.
    pub fn simulate_birth_death<R: Rng>(
        origin: f64,
        birth: f64,
        death: f64,
        rng: &mut R,
    ) -> anyhow::Result<Self> {
        ensure!(
            origin.is_finite() && origin > 0.,
            "host origin must be finite and positive, got {}",
            origin
        );
        ensure!(
            birth.is_finite() && birth > 0.,
            "host birth rate must be finite and positive, got {}",
            birth
        );
        ensure!(
            death.is_finite() && death >= 0.,
            "host death rate must be finite and non-negative, got {}",
            death
        );
        let waiting = Exp::new(birth + death).expect("rates are finite and positive");
        let p_birth = birth / (birth + death);

        for _ in 0..MAX_HOST_ATTEMPTS {
            let mut budget = MAX_HOST_EVENTS;
            if let Some(root) = grow(origin, waiting, p_birth, &mut budget, rng) {
                // a single surviving tip leaves nothing to cospeciate with
                if root.children.len() == 2 {
                    let mut nodes = Vec::new();
                    let mut tips = 0;
                    flatten(root, None, &mut nodes, &mut tips);
                    return HostTree::new(nodes, 0);
                }
            }
        }
        bail!(
            "no host tree with two surviving tips after {} attempts",
            MAX_HOST_ATTEMPTS
        )
    }

    /// Newick rendition of the tree, branch lengths as height differences.
    pub fn to_newick(&self) -> String {
        let mut out = String::new();
        self.write_newick(self.root, None, &mut out);
        out.push(';');
        out
    }

    fn write_newick(&self, node: NodeId, parent_height: Option<f64>, out: &mut String) {
        if self.is_external(node) {
            out.push_str(self.taxon_of(node).expect("tips carry a taxon"));
        } else {
            out.push('(');
            let children = self.children_of(node);
            self.write_newick(children[0], Some(self.height_of(node)), out);
            out.push(',');
            self.write_newick(children[1], Some(self.height_of(node)), out);
            out.push(')');
        }
        if let Some(parent_height) = parent_height {
            write!(out, ":{}", parent_height - self.height_of(node))
                .expect("writing to a string cannot fail");
        }
    }
}

/// One surviving branch of the growing host tree, children at the next
/// speciation or none at the present.
struct Branch {
    height: f64,
    children: Vec<Branch>,
}

fn grow<R: Rng>(
    height: f64,
    waiting: Exp<f64>,
    p_birth: f64,
    budget: &mut u32,
    rng: &mut R,
) -> Option<Branch> {
    if *budget == 0 {
        return None;
    }
    *budget -= 1;

    let next = height - rng.sample(waiting);
    if next <= 0. {
        // reached the present
        return Some(Branch { height: 0., children: vec![] });
    }
    if rng.gen::<f64>() < p_birth {
        let left = grow(next, waiting, p_birth, budget, rng);
        let right = grow(next, waiting, p_birth, budget, rng);
        match (left, right) {
            (Some(a), Some(b)) => Some(Branch { height: next, children: vec![a, b] }),
            (Some(only), None) | (None, Some(only)) => Some(only),
            (None, None) => None,
        }
    } else {
        None
    }
}

fn flatten(
    branch: Branch,
    parent: Option<NodeId>,
    nodes: &mut Vec<HostNode>,
    tips: &mut usize,
) -> NodeId {
    let id = nodes.len();
    nodes.push(HostNode {
        height: branch.height,
        parent,
        children: Vec::new(),
        taxon: None,
    });
    if branch.children.is_empty() {
        *tips += 1;
        nodes[id].taxon = Some(format!("host{}", tips));
    } else {
        for child in branch.children {
            let child_id = flatten(child, Some(id), nodes, tips);
            nodes[id].children.push(child_id);
        }
    }
    id
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    /// Two tips at the present under a root at height 1.
    pub(crate) fn cherry() -> HostTree {
        HostTree::new(
            vec![
                HostNode {
                    height: 1.,
                    parent: None,
                    children: vec![1, 2],
                    taxon: None,
                },
                HostNode {
                    height: 0.,
                    parent: Some(0),
                    children: vec![],
                    taxon: Some("host1".to_string()),
                },
                HostNode {
                    height: 0.,
                    parent: Some(0),
                    children: vec![],
                    taxon: Some("host2".to_string()),
                },
            ],
            0,
        )
        .unwrap()
    }

    #[test]
    fn test_new_rejects_single_child() {
        let nodes = vec![
            HostNode { height: 1., parent: None, children: vec![1], taxon: None },
            HostNode {
                height: 0.,
                parent: Some(0),
                children: vec![],
                taxon: Some("host1".to_string()),
            },
        ];
        assert!(HostTree::new(nodes, 0).is_err());
    }

    #[test]
    fn test_new_rejects_child_above_parent() {
        let nodes = vec![
            HostNode { height: 1., parent: None, children: vec![1, 2], taxon: None },
            HostNode {
                height: 2.,
                parent: Some(0),
                children: vec![],
                taxon: Some("host1".to_string()),
            },
            HostNode {
                height: 0.,
                parent: Some(0),
                children: vec![],
                taxon: Some("host2".to_string()),
            },
        ];
        assert!(HostTree::new(nodes, 0).is_err());
    }

    #[test]
    fn test_new_rejects_unlabelled_tip() {
        let nodes = vec![HostNode { height: 0., parent: None, children: vec![], taxon: None }];
        assert!(HostTree::new(nodes, 0).is_err());
    }

    #[test]
    fn test_external_queries() {
        let tree = cherry();
        assert_eq!(tree.external_count(), 2);
        assert_eq!(tree.external_index(1), Some(0));
        assert_eq!(tree.external_index(2), Some(1));
        assert_eq!(tree.external_index(0), None);
        assert_eq!(tree.external_with_taxon("host2"), Some(2));
        assert_eq!(tree.external_with_taxon("host3"), None);
        assert!(tree.is_root(0));
        assert!(tree.is_external(1));
        assert!(!tree.is_external(0));
    }

    #[test]
    fn test_contemporaneous_lineages() {
        let tree = cherry();
        assert_eq!(tree.contemporaneous_lineages(0.5), vec![1, 2]);
        assert_eq!(tree.contemporaneous_lineages(0.), vec![1, 2]);
        // at the root height the tip branches are already closed
        assert_eq!(tree.contemporaneous_lineages(1.), vec![0]);
        assert_eq!(tree.contemporaneous_lineages(1.5), vec![0]);
    }

    #[test]
    fn test_cherry_newick() {
        assert_eq!(cherry().to_newick(), "(host1:1,host2:1);");
    }

    #[test]
    fn test_simulate_birth_death_is_binary_ultrametric() {
        let mut rng = ChaCha8Rng::seed_from_u64(26);
        let tree = HostTree::simulate_birth_death(5., 1., 0.3, &mut rng).unwrap();
        assert!(tree.external_count() >= 2);
        for id in 0..tree.node_count() {
            match tree.children_of(id).len() {
                0 => {
                    assert_eq!(tree.height_of(id), 0.);
                    assert!(tree.taxon_of(id).unwrap().starts_with("host"));
                }
                2 => {
                    for &child in tree.children_of(id) {
                        assert!(tree.height_of(child) < tree.height_of(id));
                    }
                }
                n => panic!("host node {} with {} children", id, n),
            }
        }
    }

    #[test]
    fn test_simulate_birth_death_unique_taxa_below_origin() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let tree = HostTree::simulate_birth_death(3., 1.2, 0.4, &mut rng).unwrap();
        assert!(tree.height_of(tree.root()) < 3.);
        let mut taxa: Vec<_> = (0..tree.node_count())
            .filter_map(|id| tree.taxon_of(id))
            .collect();
        taxa.sort_unstable();
        taxa.dedup();
        assert_eq!(taxa.len(), tree.external_count());
    }

    #[test]
    fn test_simulate_birth_death_rejects_bad_rates() {
        let mut rng = ChaCha8Rng::seed_from_u64(26);
        assert!(HostTree::simulate_birth_death(0., 1., 0., &mut rng).is_err());
        assert!(HostTree::simulate_birth_death(1., 0., 0., &mut rng).is_err());
        assert!(HostTree::simulate_birth_death(1., 1., -1., &mut rng).is_err());
        assert!(HostTree::simulate_birth_death(1., f64::NAN, 0., &mut rng).is_err());
    }
}
