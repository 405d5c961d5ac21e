//! The simulated symbiont tree handed to the caller of an accepted attempt.
use crate::host::NodeId;
use std::fmt::Write as _;

/// Coevolutionary event recorded on a symbiont node. Cospeciations and
/// co-terminations carry `NoEvent`, mirroring that the host, not the
/// symbiont process, caused the split.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    NoEvent,
    Duplication,
    HostSwitch,
    Loss,
}

/// A node of the symbiont tree: a labelled tip, a labelled extinct tip (loss
/// kept as a leaf), or an internal node with exactly two children.
#[derive(Clone, Debug, PartialEq)]
pub struct SymbiontNode {
    pub height: f64,
    pub event: EventKind,
    /// Clock rate of the lineage, lognormally relaxed when enabled.
    /// Descriptive metadata only.
    pub rate: f64,
    pub taxon: Option<String>,
    /// Host lineage occupied when this node was created (annotated mode).
    pub host: Option<NodeId>,
    children: Vec<SymbiontNode>,
}

impl SymbiontNode {
    pub(crate) fn new(height: f64, event: EventKind, rate: f64, host: Option<NodeId>) -> Self {
        SymbiontNode { height, event, rate, taxon: None, host, children: vec![] }
    }

    pub(crate) fn attach(&mut self, child1: SymbiontNode, child2: SymbiontNode) {
        debug_assert!(self.children.is_empty());
        self.children = vec![child1, child2];
    }

    pub fn is_external(&self) -> bool {
        self.children.is_empty()
    }

    pub fn children(&self) -> &[SymbiontNode] {
        &self.children
    }

    /// Preorder traversal of the subtree rooted here.
    pub fn iter(&self) -> Nodes<'_> {
        Nodes { stack: vec![self] }
    }
}

/// Preorder node iterator.
pub struct Nodes<'a> {
    stack: Vec<&'a SymbiontNode>,
}

impl<'a> Iterator for Nodes<'a> {
    type Item = &'a SymbiontNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// Rooted binary symbiont tree: every node is a labelled leaf or carries
/// exactly two children, single-child nodes are spliced out during
/// simulation.
#[derive(Clone, Debug, PartialEq)]
pub struct SymbiontTree {
    root: SymbiontNode,
}

impl SymbiontTree {
    pub(crate) fn new(root: SymbiontNode) -> Self {
        SymbiontTree { root }
    }

    pub fn root(&self) -> &SymbiontNode {
        &self.root
    }

    pub fn iter(&self) -> Nodes<'_> {
        self.root.iter()
    }

    pub fn external_count(&self) -> usize {
        self.iter().filter(|node| node.is_external()).count()
    }

    /// Splice every extinct leaf back out of the tree, with the same
    /// combination rule the simulator applies: a node losing one child is
    /// replaced by the surviving child, a node losing both is dropped.
    /// `None` when nothing survives.
    pub fn without_extinct_leaves(&self) -> Option<SymbiontTree> {
        prune(&self.root).map(SymbiontTree::new)
    }

    /// Newick rendition of the tree, branch lengths as height differences.
    pub fn to_newick(&self) -> String {
        let mut out = String::new();
        write_newick(&self.root, None, &mut out);
        out.push(';');
        out
    }
}

fn prune(node: &SymbiontNode) -> Option<SymbiontNode> {
    if node.is_external() {
        if node.event == EventKind::Loss {
            return None;
        }
        return Some(node.clone());
    }
    let mut spared = SymbiontNode {
        height: node.height,
        event: node.event,
        rate: node.rate,
        taxon: node.taxon.clone(),
        host: node.host,
        children: vec![],
    };
    match (prune(&node.children[0]), prune(&node.children[1])) {
        (Some(child1), Some(child2)) => {
            spared.attach(child1, child2);
            Some(spared)
        }
        (Some(only), None) | (None, Some(only)) => Some(only),
        (None, None) => None,
    }
}

fn write_newick(node: &SymbiontNode, parent_height: Option<f64>, out: &mut String) {
    if node.is_external() {
        out.push_str(node.taxon.as_deref().unwrap_or(""));
    } else {
        out.push('(');
        write_newick(&node.children[0], Some(node.height), out);
        out.push(',');
        write_newick(&node.children[1], Some(node.height), out);
        out.push(')');
    }
    if let Some(parent_height) = parent_height {
        write!(out, ":{}", parent_height - node.height)
            .expect("writing to a string cannot fail");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(height: f64, event: EventKind, taxon: &str) -> SymbiontNode {
        let mut node = SymbiontNode::new(height, event, 1., None);
        node.taxon = Some(taxon.to_string());
        node
    }

    fn join(height: f64, child1: SymbiontNode, child2: SymbiontNode) -> SymbiontNode {
        let mut node = SymbiontNode::new(height, EventKind::NoEvent, 1., None);
        node.attach(child1, child2);
        node
    }

    #[test]
    fn test_preorder_iteration() {
        let tree = SymbiontTree::new(join(
            1.,
            leaf(0., EventKind::NoEvent, "symbiont1.1"),
            leaf(0., EventKind::NoEvent, "symbiont2.1"),
        ));
        let taxa: Vec<_> = tree.iter().map(|node| node.taxon.clone()).collect();
        assert_eq!(taxa.len(), 3);
        assert_eq!(taxa[0], None);
        assert_eq!(taxa[1].as_deref(), Some("symbiont1.1"));
        assert_eq!(taxa[2].as_deref(), Some("symbiont2.1"));
        assert_eq!(tree.external_count(), 2);
    }

    #[test]
    fn test_newick() {
        let tree = SymbiontTree::new(join(
            1.,
            leaf(0., EventKind::NoEvent, "symbiont1.1"),
            leaf(0.5, EventKind::Loss, "extinct_symbiont1"),
        ));
        assert_eq!(tree.to_newick(), "(symbiont1.1:1,extinct_symbiont1:0.5);");
    }

    #[test]
    fn test_without_extinct_leaves_splices_lost_branch() {
        let tree = SymbiontTree::new(join(
            1.,
            join(
                0.5,
                leaf(0., EventKind::NoEvent, "symbiont1.1"),
                leaf(0.2, EventKind::Loss, "extinct_symbiont1"),
            ),
            leaf(0., EventKind::NoEvent, "symbiont2.1"),
        ));
        let pruned = tree.without_extinct_leaves().unwrap();
        // the degree-one node at 0.5 is gone, its survivor reattached
        assert_eq!(pruned.external_count(), 2);
        assert_eq!(pruned.root().children()[0].taxon.as_deref(), Some("symbiont1.1"));
        assert_eq!(pruned.to_newick(), "(symbiont1.1:1,symbiont2.1:1);");
    }

    #[test]
    fn test_without_extinct_leaves_fully_extinct_tree() {
        let tree = SymbiontTree::new(join(
            1.,
            leaf(0.4, EventKind::Loss, "extinct_symbiont1"),
            leaf(0.1, EventKind::Loss, "extinct_symbiont2"),
        ));
        assert!(tree.without_extinct_leaves().is_none());
    }
}
