use crate::codec;
use crate::node::{Node, NodeArena, NodeId, PreOrder, TreeError};
use rand::Rng;

/// A complete derivation tree: the arena owning its nodes, the root handle, the
/// depth bound it was generated with and a lazily filled rendering cache.
///
/// Cloning copies the arena slot for slot, so handles taken from a tree remain
/// valid on its clones while the two trees share no mutable state.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: NodeArena,
    root: NodeId,
    depth: usize,
    rendered: Option<Vec<u8>>,
}

impl Tree {
    /// Wraps an arena and a detached root into a tree.
    pub fn new(nodes: NodeArena, root: NodeId, depth: usize) -> Result<Self, TreeError> {
        if nodes.node(root)?.parent().is_some() {
            return Err(TreeError::AlreadyAttached(root));
        }
        Ok(Self {
            nodes,
            root,
            depth,
            rendered: None,
        })
    }

    /// Handle of the root node; it has no parent.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Depth bound recorded for this tree (grown by mutations, never shrunk).
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub(crate) fn set_depth(&mut self, depth: usize) {
        self.depth = depth;
    }

    /// The arena owning every node of this tree, including detached ones not yet freed.
    pub fn nodes(&self) -> &NodeArena {
        &self.nodes
    }

    /// Mutable arena access for in-crate generation. Drops the rendering cache.
    pub(crate) fn nodes_mut(&mut self) -> &mut NodeArena {
        self.rendered = None;
        &mut self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Total number of non-terminals reachable from the root.
    pub fn non_terminal_count(&self) -> usize {
        self.nodes.get(self.root).map_or(0, Node::non_terminal_count)
    }

    /// Pre-order walk from the root, which is also rendering order.
    pub fn preorder(&self) -> PreOrder<'_> {
        self.nodes.preorder(self.root)
    }

    /// Checks every cached count and parent link reachable from the root.
    pub fn verify(&self) -> Result<(), TreeError> {
        self.nodes.verify(self.root)
    }

    /// Concatenates the terminal values in pre-order, reusing the cache when present.
    pub fn render(&mut self) -> &[u8] {
        if self.rendered.is_none() {
            let bytes = self.to_bytes();
            self.rendered = Some(bytes);
        }
        self.rendered.as_deref().unwrap_or_default()
    }

    /// The cached rendering, if the tree has been rendered since its last edit.
    pub fn rendered(&self) -> Option<&[u8]> {
        self.rendered.as_deref()
    }

    /// Renders without touching the cache.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        codec::render_subtree(&self.nodes, self.root, &mut out);
        out
    }

    /// Returns the `k`-th non-terminal in pre-order.
    ///
    /// Descends from the root using the cached subtree weights: at each
    /// non-terminal the index either selects the node itself (0) or is reduced by
    /// one and routed to the child whose weight range covers it.
    pub fn nth_non_terminal(&self, mut k: usize) -> Option<NodeId> {
        let mut current = self.root;
        'descend: loop {
            let node = self.nodes.get(current)?;
            if node.is_terminal() {
                return None;
            }
            if k == 0 {
                return Some(current);
            }
            k -= 1;
            for &child in node.children() {
                let weight = self.nodes.get(child)?.non_terminal_count();
                if k < weight {
                    current = child;
                    continue 'descend;
                }
                k -= weight;
            }
            return None;
        }
    }

    /// Picks a non-terminal uniformly at random. `None` iff the tree has none.
    pub fn pick_non_terminal<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<NodeId> {
        let total = self.non_terminal_count();
        if total == 0 {
            return None;
        }
        self.nth_non_terminal(rng.random_range(0..total))
    }

    /// Replaces the strict descendant `old` with the detached `new`; see
    /// [`NodeArena::replace_subnode`]. Returns the detached `old`.
    pub fn replace_subnode(&mut self, old: NodeId, new: NodeId) -> Result<NodeId, TreeError> {
        let root = self.root;
        let detached = self.nodes.replace_subnode(root, old, new)?;
        self.rendered = None;
        Ok(detached)
    }

    /// Makes the detached `new` the root, returning the previous root (now detached).
    pub fn replace_root(&mut self, new: NodeId) -> Result<NodeId, TreeError> {
        if new == self.root {
            return Err(TreeError::SameNode(new));
        }
        if self.nodes.node(new)?.parent().is_some() {
            return Err(TreeError::AlreadyAttached(new));
        }
        self.rendered = None;
        Ok(std::mem::replace(&mut self.root, new))
    }

    /// Copies a subtree of `source` into this tree's arena, detached.
    pub fn import_subtree(&mut self, source: &Tree, id: NodeId) -> Result<NodeId, TreeError> {
        self.nodes.import_subtree(&source.nodes, id)
    }

    /// Frees a detached subtree. The root cannot be freed through its own tree.
    pub fn free(&mut self, id: NodeId) -> Result<usize, TreeError> {
        if id == self.root {
            return Err(TreeError::CannotFreeRoot(id));
        }
        self.nodes.free(id)
    }

    pub(crate) fn needs_compaction(&self) -> bool {
        self.nodes.vacant_len() > self.nodes.len()
    }

    /// Rebuilds the arena with only the nodes reachable from the root.
    ///
    /// Every handle previously taken from this tree is invalidated.
    pub fn compact(&mut self) -> Result<(), TreeError> {
        let mut nodes = NodeArena::new();
        let root = nodes.import_subtree(&self.nodes, self.root)?;
        tracing::trace!(
            live_before = self.nodes.len(),
            vacant_before = self.nodes.vacant_len(),
            live_after = nodes.len(),
            "compacted tree arena"
        );
        self.nodes = nodes;
        self.root = root;
        Ok(())
    }

    /// Structural comparison of two subtrees, possibly from different trees.
    ///
    /// Rules, terminal values and child order must match. Parent links, cached
    /// counts, handles and depth are not compared.
    pub fn subtree_eq(&self, a: NodeId, other: &Tree, b: NodeId) -> bool {
        let mut pending = vec![(a, b)];
        while let Some((left, right)) = pending.pop() {
            let (Some(left_node), Some(right_node)) = (self.node(left), other.node(right)) else {
                return false;
            };
            if left_node.rule() != right_node.rule()
                || left_node.value() != right_node.value()
                || left_node.children().len() != right_node.children().len()
            {
                return false;
            }
            pending.extend(
                left_node
                    .children()
                    .iter()
                    .copied()
                    .zip(right_node.children().iter().copied()),
            );
        }
        true
    }
}

impl PartialEq for Tree {
    fn eq(&self, other: &Self) -> bool {
        self.subtree_eq(self.root, other, other.root)
    }
}

impl Eq for Tree {}
