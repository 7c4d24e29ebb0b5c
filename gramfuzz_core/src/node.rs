use la_arena::{Arena, ArenaMap, Idx};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Identifies the grammar production a node was derived from.
///
/// Rule ids are dense small integers assigned by the grammar. `RuleId::TERMINAL`
/// (0) is reserved for plain literal terminals that belong to no rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct RuleId(pub u32);

impl RuleId {
    /// Generic terminal marker used for literals emitted inside a production.
    pub const TERMINAL: RuleId = RuleId(0);
}

impl From<u32> for RuleId {
    fn from(raw: u32) -> Self {
        RuleId(raw)
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

static NEXT_LINEAGE: AtomicU64 = AtomicU64::new(1);

/// Handle to a node stored in a [`NodeArena`].
///
/// Handles are only meaningful for the arena that issued them (or a clone of it).
/// Each handle records the lineage of its arena, so a handle presented to an
/// unrelated arena is reported as unknown instead of aliasing another node.
/// They are non-owning: holding a handle keeps nothing alive.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    lineage: u64,
    index: Idx<Slot>,
}

impl NodeId {
    fn slot(self) -> usize {
        u32::from(self.index.into_raw()) as usize
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({}@{})", self.slot(), self.lineage)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.slot())
    }
}

/// Errors raised by structural operations on nodes and trees.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// The handle does not name a live node of this arena.
    #[error("Node {0} does not exist or has been freed")]
    UnknownNode(NodeId),

    /// Only non-terminal nodes can own children.
    #[error("Node {0} is a terminal and cannot own children")]
    TerminalParent(NodeId),

    /// `attach_children` is a one-shot operation per node.
    #[error("Node {0} already has children attached")]
    ChildrenAlreadyAttached(NodeId),

    /// A node can have at most one parent.
    #[error("Node {0} is already attached to a parent")]
    AlreadyAttached(NodeId),

    #[error("Node {0} appears more than once in the same child list")]
    DuplicateChild(NodeId),

    /// The edit would make a node its own ancestor.
    #[error("Attaching node {0} would create a cycle")]
    Cycle(NodeId),

    #[error("Node {0} cannot replace itself")]
    SameNode(NodeId),

    /// The node to replace is not a strict descendant of the given root.
    #[error("Node {old} is not a descendant of node {root}")]
    NotFound { old: NodeId, root: NodeId },

    /// Only detached subtrees can be freed.
    #[error("Node {0} is still attached to a parent and cannot be freed")]
    StillAttached(NodeId),

    #[error("Node {0} is the tree root and cannot be freed")]
    CannotFreeRoot(NodeId),

    /// A cached count or link disagrees with the structure it summarises.
    #[error("Tree invariant violated: {0}")]
    InvariantViolation(String),
}

/// A single derivation-tree node.
///
/// A node is a terminal when it carries a literal value; otherwise it is a
/// non-terminal owning an ordered (possibly empty) list of children. Fields are
/// private so the cached counts can only change through [`NodeArena`] operations.
#[derive(Debug, Clone)]
pub struct Node {
    rule: RuleId,
    value: Option<Vec<u8>>,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
    non_terminal_count: usize,
    direct_recursive_edges: usize,
}

impl Node {
    /// Rule this node was derived from, or [`RuleId::TERMINAL`] for plain literals.
    pub fn rule(&self) -> RuleId {
        self.rule
    }

    /// Literal bytes of a terminal; `None` for non-terminals.
    pub fn value(&self) -> Option<&[u8]> {
        self.value.as_deref()
    }

    pub fn is_terminal(&self) -> bool {
        self.value.is_some()
    }

    /// Ordered child handles; always empty for terminals.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Back-reference to the owning node, `None` for a root or a detached subtree.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Number of non-terminals in this subtree, this node included.
    pub fn non_terminal_count(&self) -> usize {
        self.non_terminal_count
    }

    /// Number of immediate children derived from the same rule as this node.
    pub fn direct_recursive_edges(&self) -> usize {
        self.direct_recursive_edges
    }
}

#[derive(Debug, Clone)]
enum Slot {
    Live(Node),
    Vacant,
}

/// Owning store for the nodes of one tree.
///
/// Children are held as handles into the same arena and parents as non-owning
/// back-references, so there is no ownership cycle. Freed nodes leave a vacant
/// slot behind; [`crate::Tree::compact`] rebuilds the arena without them.
///
/// Every arena created with [`NodeArena::new`] gets a fresh lineage. Clones keep
/// it, which is what lets handles survive a tree clone.
#[derive(Debug, Clone)]
pub struct NodeArena {
    lineage: u64,
    slots: Arena<Slot>,
    vacant: usize,
}

impl Default for NodeArena {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeArena {
    pub fn new() -> Self {
        Self {
            lineage: NEXT_LINEAGE.fetch_add(1, Ordering::Relaxed),
            slots: Arena::new(),
            vacant: 0,
        }
    }

    /// Whether `id` was issued by this arena or one it was cloned from.
    fn owns(&self, id: NodeId) -> bool {
        id.lineage == self.lineage && id.slot() < self.slots.len()
    }

    fn issue(&mut self, node: Node) -> NodeId {
        NodeId {
            lineage: self.lineage,
            index: self.slots.alloc(Slot::Live(node)),
        }
    }

    /// Number of live nodes, attached or not.
    pub fn len(&self) -> usize {
        self.slots.len() - self.vacant
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of slots left behind by freed nodes.
    pub fn vacant_len(&self) -> usize {
        self.vacant
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        if !self.owns(id) {
            return None;
        }
        match &self.slots[id.index] {
            Slot::Live(node) => Some(node),
            Slot::Vacant => None,
        }
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    pub fn node(&self, id: NodeId) -> Result<&Node, TreeError> {
        self.get(id).ok_or(TreeError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, TreeError> {
        if !self.owns(id) {
            return Err(TreeError::UnknownNode(id));
        }
        match &mut self.slots[id.index] {
            Slot::Live(node) => Ok(node),
            Slot::Vacant => Err(TreeError::UnknownNode(id)),
        }
    }

    /// Creates a detached terminal node carrying `value`.
    pub fn terminal(&mut self, rule: RuleId, value: impl Into<Vec<u8>>) -> NodeId {
        self.issue(Node {
            rule,
            value: Some(value.into()),
            children: Vec::new(),
            parent: None,
            non_terminal_count: 0,
            direct_recursive_edges: 0,
        })
    }

    /// Creates a detached non-terminal node with no children yet.
    pub fn non_terminal(&mut self, rule: RuleId) -> NodeId {
        self.issue(Node {
            rule,
            value: None,
            children: Vec::new(),
            parent: None,
            non_terminal_count: 1,
            direct_recursive_edges: 0,
        })
    }

    /// Gives a childless non-terminal its ordered children.
    ///
    /// This is the only place where a node's `non_terminal_count` grows from its
    /// own children. Every child must be live and detached; each one gets `parent`
    /// as its back-reference. If `parent` is itself attached, the added weight is
    /// carried up to the top of its tree. On error nothing is modified.
    pub fn attach_children(
        &mut self,
        parent: NodeId,
        children: Vec<NodeId>,
    ) -> Result<(), TreeError> {
        let parent_node = self.node(parent)?;
        if parent_node.is_terminal() {
            return Err(TreeError::TerminalParent(parent));
        }
        if !parent_node.children.is_empty() {
            return Err(TreeError::ChildrenAlreadyAttached(parent));
        }
        let parent_rule = parent_node.rule;
        let grandparent = parent_node.parent;
        let top = self.top_of(parent);

        let mut added_weight = 0usize;
        let mut recursive_edges = 0usize;
        for &child in &children {
            let child_node = self.node(child)?;
            if child_node.parent.is_some() {
                return Err(TreeError::AlreadyAttached(child));
            }
            if child == top {
                return Err(TreeError::Cycle(child));
            }
            added_weight += child_node.non_terminal_count;
            if child_node.rule == parent_rule {
                recursive_edges += 1;
            }
        }

        // A child listed twice is already wired when it comes around again.
        for (position, &child) in children.iter().enumerate() {
            let child_node = self.node_mut(child)?;
            if child_node.parent.is_some() {
                for &wired in &children[..position] {
                    if let Ok(node) = self.node_mut(wired) {
                        node.parent = None;
                    }
                }
                return Err(TreeError::DuplicateChild(child));
            }
            child_node.parent = Some(parent);
        }

        let parent_node = self.node_mut(parent)?;
        parent_node.children = children;
        parent_node.non_terminal_count += added_weight;
        parent_node.direct_recursive_edges = recursive_edges;
        self.adjust_counts(grandparent, added_weight as isize);
        Ok(())
    }

    /// Iterates over the proper ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            arena: self,
            next: self.get(id).and_then(Node::parent),
        }
    }

    /// Whether `id` lies strictly below `root`.
    pub fn is_descendant(&self, root: NodeId, id: NodeId) -> bool {
        self.ancestors(id).any(|ancestor| ancestor == root)
    }

    fn top_of(&self, id: NodeId) -> NodeId {
        self.ancestors(id).last().unwrap_or(id)
    }

    fn adjust_counts(&mut self, from: Option<NodeId>, delta: isize) {
        if delta == 0 {
            return;
        }
        let mut current = from;
        while let Some(id) = current {
            let Ok(node) = self.node_mut(id) else { break };
            node.non_terminal_count = node.non_terminal_count.saturating_add_signed(delta);
            current = node.parent;
        }
    }

    /// Replaces `old`, a strict descendant of `root`, with the detached node `new`.
    ///
    /// `new` takes `old`'s position in the parent's child list and the count
    /// difference is propagated to every ancestor. `old` is detached but not
    /// freed: its handle is returned and the caller decides whether to free it
    /// or attach it elsewhere.
    pub fn replace_subnode(
        &mut self,
        root: NodeId,
        old: NodeId,
        new: NodeId,
    ) -> Result<NodeId, TreeError> {
        self.node(root)?;
        let old_node = self.node(old)?;
        let (old_rule, old_weight) = (old_node.rule, old_node.non_terminal_count);
        let Some(parent) = old_node.parent else {
            return Err(TreeError::NotFound { old, root });
        };
        if !self.is_descendant(root, old) {
            return Err(TreeError::NotFound { old, root });
        }

        let new_node = self.node(new)?;
        if new_node.parent.is_some() {
            return Err(TreeError::AlreadyAttached(new));
        }
        if new == self.top_of(root) {
            return Err(TreeError::Cycle(new));
        }
        let (new_rule, new_weight) = (new_node.rule, new_node.non_terminal_count);

        let parent_node = self.node_mut(parent)?;
        let position = parent_node
            .children
            .iter()
            .position(|&child| child == old)
            .ok_or_else(|| {
                TreeError::InvariantViolation(format!(
                    "node {old} names {parent} as parent but is not among its children"
                ))
            })?;
        parent_node.children[position] = new;
        if old_rule == parent_node.rule {
            parent_node.direct_recursive_edges = parent_node.direct_recursive_edges.saturating_sub(1);
        }
        if new_rule == parent_node.rule {
            parent_node.direct_recursive_edges += 1;
        }

        self.node_mut(new)?.parent = Some(parent);
        self.node_mut(old)?.parent = None;
        self.adjust_counts(Some(parent), new_weight as isize - old_weight as isize);
        Ok(old)
    }

    /// Frees a detached node and its whole subtree, returning how many nodes were released.
    pub fn free(&mut self, id: NodeId) -> Result<usize, TreeError> {
        if self.node(id)?.parent.is_some() {
            return Err(TreeError::StillAttached(id));
        }
        let mut pending = vec![id];
        let mut freed = 0;
        while let Some(current) = pending.pop() {
            if let Slot::Live(node) = std::mem::replace(&mut self.slots[current.index], Slot::Vacant) {
                pending.extend(node.children);
                freed += 1;
            }
        }
        self.vacant += freed;
        Ok(freed)
    }

    /// Pre-order walk over the subtree rooted at `root`.
    pub fn preorder(&self, root: NodeId) -> PreOrder<'_> {
        PreOrder {
            arena: self,
            stack: vec![root],
        }
    }

    /// Copies the subtree at `id` in `source` into this arena as a new detached subtree.
    ///
    /// The copy is rebuilt through [`NodeArena::attach_children`], so its counts are
    /// recomputed rather than trusted.
    pub fn import_subtree(&mut self, source: &NodeArena, id: NodeId) -> Result<NodeId, TreeError> {
        let mut built: Vec<NodeId> = Vec::new();
        let mut stack = vec![(id, false)];
        while let Some((current, expanded)) = stack.pop() {
            let node = source.node(current)?;
            if let Some(value) = node.value() {
                built.push(self.terminal(node.rule, value));
                continue;
            }
            if !expanded {
                stack.push((current, true));
                stack.extend(node.children.iter().rev().map(|&child| (child, false)));
                continue;
            }
            let first_child = built.len() - node.children.len();
            let children = built.split_off(first_child);
            let copy = self.non_terminal(node.rule);
            self.attach_children(copy, children)?;
            built.push(copy);
        }
        built
            .pop()
            .ok_or_else(|| TreeError::InvariantViolation(format!("import of {id} produced no node")))
    }

    /// Recomputes counts, recursive edges and parent links below `root` and
    /// reports the first disagreement with the cached values.
    pub fn verify(&self, root: NodeId) -> Result<(), TreeError> {
        let mut order = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let node = self.node(id)?;
            if node.is_terminal() && !node.children.is_empty() {
                return Err(TreeError::InvariantViolation(format!(
                    "terminal {id} owns {} children",
                    node.children.len()
                )));
            }
            for &child in node.children.iter().rev() {
                if self.node(child)?.parent != Some(id) {
                    return Err(TreeError::InvariantViolation(format!(
                        "child {child} of {id} does not point back to it"
                    )));
                }
                stack.push(child);
            }
            order.push(id);
        }

        let mut weights: ArenaMap<Idx<Slot>, usize> = ArenaMap::default();
        for &id in order.iter().rev() {
            let node = self.node(id)?;
            let mut expected = usize::from(!node.is_terminal());
            let mut recursive_edges = 0;
            for &child in &node.children {
                expected += weights.get(child.index).copied().unwrap_or(0);
                if self.node(child)?.rule == node.rule {
                    recursive_edges += 1;
                }
            }
            if expected != node.non_terminal_count {
                return Err(TreeError::InvariantViolation(format!(
                    "node {id} caches {} non-terminals but its subtree holds {expected}",
                    node.non_terminal_count
                )));
            }
            if recursive_edges != node.direct_recursive_edges {
                return Err(TreeError::InvariantViolation(format!(
                    "node {id} caches {} recursive edges but has {recursive_edges}",
                    node.direct_recursive_edges
                )));
            }
            weights.insert(id.index, expected);
        }
        Ok(())
    }
}

/// Iterator returned by [`NodeArena::ancestors`].
pub struct Ancestors<'a> {
    arena: &'a NodeArena,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.arena.get(current).and_then(Node::parent);
        Some(current)
    }
}

/// Iterator returned by [`NodeArena::preorder`].
pub struct PreOrder<'a> {
    arena: &'a NodeArena,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for PreOrder<'a> {
    type Item = (NodeId, &'a Node);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let node = self.arena.get(id)?;
        self.stack.extend(node.children.iter().rev());
        Some((id, node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WS: RuleId = RuleId(23);
    const SP1: RuleId = RuleId(24);
    const VALUE: RuleId = RuleId(4);

    /// ws -> sp1 ws, with the inner ws empty.
    fn whitespace_chain(arena: &mut NodeArena) -> NodeId {
        let space = arena.terminal(RuleId::TERMINAL, " ");
        let sp1 = arena.non_terminal(SP1);
        arena.attach_children(sp1, vec![space]).unwrap();
        let inner = arena.non_terminal(WS);
        let outer = arena.non_terminal(WS);
        arena.attach_children(outer, vec![sp1, inner]).unwrap();
        outer
    }

    #[test]
    fn construction_maintains_counts_and_links() {
        let mut arena = NodeArena::new();
        let outer = whitespace_chain(&mut arena);

        let node = arena.node(outer).unwrap();
        assert_eq!(node.non_terminal_count(), 3);
        assert_eq!(node.direct_recursive_edges(), 1);
        assert_eq!(node.children().len(), 2);
        for &child in node.children() {
            assert_eq!(arena.node(child).unwrap().parent(), Some(outer));
        }
        assert_eq!(arena.len(), 4);
        arena.verify(outer).unwrap();
    }

    #[test]
    fn terminals_carry_values_and_zero_weight() {
        let mut arena = NodeArena::new();
        let empty = arena.terminal(RuleId::TERMINAL, Vec::new());
        let node = arena.node(empty).unwrap();
        assert!(node.is_terminal());
        assert_eq!(node.value(), Some(&[][..]));
        assert_eq!(node.non_terminal_count(), 0);
        arena.verify(empty).unwrap();
    }

    #[test]
    fn attaching_below_an_attached_node_updates_ancestors() {
        let mut arena = NodeArena::new();
        let middle = arena.non_terminal(VALUE);
        let top = arena.non_terminal(VALUE);
        arena.attach_children(top, vec![middle]).unwrap();
        assert_eq!(arena.node(top).unwrap().non_terminal_count(), 2);

        let chain = whitespace_chain(&mut arena);
        arena.attach_children(middle, vec![chain]).unwrap();
        assert_eq!(arena.node(middle).unwrap().non_terminal_count(), 4);
        assert_eq!(arena.node(top).unwrap().non_terminal_count(), 5);
        arena.verify(top).unwrap();
    }

    #[test]
    fn attach_rejects_invalid_requests_without_side_effects() {
        let mut arena = NodeArena::new();
        let leaf = arena.terminal(RuleId::TERMINAL, "x");
        let parent = arena.non_terminal(VALUE);
        let other = arena.non_terminal(VALUE);

        assert_eq!(
            arena.attach_children(leaf, vec![parent]),
            Err(TreeError::TerminalParent(leaf))
        );
        assert_eq!(
            arena.attach_children(parent, vec![parent]),
            Err(TreeError::Cycle(parent))
        );
        assert_eq!(
            arena.attach_children(parent, vec![leaf, leaf]),
            Err(TreeError::DuplicateChild(leaf))
        );
        assert_eq!(arena.node(leaf).unwrap().parent(), None);
        assert!(arena.node(parent).unwrap().children().is_empty());

        arena.attach_children(parent, vec![leaf]).unwrap();
        assert_eq!(
            arena.attach_children(other, vec![leaf]),
            Err(TreeError::AlreadyAttached(leaf))
        );
        assert_eq!(
            arena.attach_children(parent, vec![other]),
            Err(TreeError::ChildrenAlreadyAttached(parent))
        );
        assert_eq!(
            arena.attach_children(other, vec![parent]),
            Ok(())
        );
        let top = arena.non_terminal(VALUE);
        assert_eq!(arena.node(other).unwrap().non_terminal_count(), 2);
        assert_eq!(
            arena.attach_children(parent, vec![top]),
            Err(TreeError::ChildrenAlreadyAttached(parent))
        );
    }

    #[test]
    fn attaching_the_top_of_the_parents_tree_is_a_cycle() {
        let mut arena = NodeArena::new();
        let top = arena.non_terminal(VALUE);
        let inner = arena.non_terminal(VALUE);
        arena.attach_children(top, vec![inner]).unwrap();
        assert_eq!(
            arena.attach_children(inner, vec![top]),
            Err(TreeError::Cycle(top))
        );
    }

    #[test]
    fn replace_subnode_detaches_old_and_propagates_delta() {
        let mut arena = NodeArena::new();
        let chain = whitespace_chain(&mut arena);
        let root = arena.non_terminal(VALUE);
        let open = arena.terminal(RuleId::TERMINAL, "[");
        arena.attach_children(root, vec![open, chain]).unwrap();
        assert_eq!(arena.node(root).unwrap().non_terminal_count(), 4);

        let replacement = arena.non_terminal(WS);
        let detached = arena.replace_subnode(root, chain, replacement).unwrap();
        assert_eq!(detached, chain);

        // The old subtree is no longer reachable from the root.
        assert_eq!(arena.node(chain).unwrap().parent(), None);
        assert!(!arena.is_descendant(root, chain));
        assert!(arena.preorder(root).all(|(id, _)| id != chain));
        assert_eq!(arena.node(root).unwrap().children(), &[open, replacement]);
        assert_eq!(arena.node(replacement).unwrap().parent(), Some(root));
        assert_eq!(arena.node(root).unwrap().non_terminal_count(), 2);
        arena.verify(root).unwrap();

        // Freeing the detached subtree leaves the root intact.
        assert_eq!(arena.free(chain).unwrap(), 4);
        assert!(!arena.contains(chain));
        assert_eq!(arena.vacant_len(), 4);
        arena.verify(root).unwrap();
    }

    #[test]
    fn replace_subnode_tracks_recursive_edges() {
        let mut arena = NodeArena::new();
        let outer = whitespace_chain(&mut arena);
        let inner = arena.node(outer).unwrap().children()[1];
        let foreign = arena.non_terminal(VALUE);
        arena.replace_subnode(outer, inner, foreign).unwrap();
        assert_eq!(arena.node(outer).unwrap().direct_recursive_edges(), 0);
        arena.replace_subnode(outer, foreign, inner).unwrap();
        assert_eq!(arena.node(outer).unwrap().direct_recursive_edges(), 1);
        arena.verify(outer).unwrap();
    }

    #[test]
    fn replace_subnode_reports_missing_nodes() {
        let mut arena = NodeArena::new();
        let first = whitespace_chain(&mut arena);
        let second = whitespace_chain(&mut arena);
        let inner = arena.node(second).unwrap().children()[0];
        let replacement = arena.non_terminal(SP1);

        assert_eq!(
            arena.replace_subnode(first, inner, replacement),
            Err(TreeError::NotFound { old: inner, root: first })
        );
        assert_eq!(
            arena.replace_subnode(first, first, replacement),
            Err(TreeError::NotFound { old: first, root: first })
        );
        let attached = arena.node(first).unwrap().children()[0];
        assert_eq!(
            arena.replace_subnode(second, inner, attached),
            Err(TreeError::AlreadyAttached(attached))
        );
        assert_eq!(
            arena.replace_subnode(second, inner, second),
            Err(TreeError::Cycle(second))
        );
        arena.verify(first).unwrap();
        arena.verify(second).unwrap();
    }

    #[test]
    fn free_requires_detached_nodes() {
        let mut arena = NodeArena::new();
        let outer = whitespace_chain(&mut arena);
        let inner = arena.node(outer).unwrap().children()[1];
        assert_eq!(arena.free(inner), Err(TreeError::StillAttached(inner)));
        assert_eq!(arena.free(outer), Ok(4));
        assert_eq!(arena.free(outer), Err(TreeError::UnknownNode(outer)));
        assert!(arena.is_empty());
    }

    #[test]
    fn import_subtree_copies_into_another_arena() {
        let mut source = NodeArena::new();
        let outer = whitespace_chain(&mut source);
        let mut target = NodeArena::new();
        target.terminal(RuleId::TERMINAL, "padding");

        let copy = target.import_subtree(&source, outer).unwrap();
        target.verify(copy).unwrap();
        let original: Vec<_> = source
            .preorder(outer)
            .map(|(_, node)| (node.rule(), node.value().map(<[u8]>::to_vec)))
            .collect();
        let copied: Vec<_> = target
            .preorder(copy)
            .map(|(_, node)| (node.rule(), node.value().map(<[u8]>::to_vec)))
            .collect();
        assert_eq!(original, copied);
        assert_eq!(target.node(copy).unwrap().parent(), None);
    }

    #[test]
    fn handles_from_other_arenas_are_rejected() {
        let mut big = NodeArena::new();
        for _ in 0..8 {
            big.non_terminal(VALUE);
        }
        let foreign = big.non_terminal(VALUE);
        let small = NodeArena::new();
        assert!(small.get(foreign).is_none());
        assert_eq!(small.node(foreign).err(), Some(TreeError::UnknownNode(foreign)));
    }

    #[test]
    fn in_range_handles_from_other_arenas_are_rejected() {
        // Same construction in both arenas, so every slot index is in range for both.
        let mut first = NodeArena::new();
        let mut second = NodeArena::new();
        let first_outer = whitespace_chain(&mut first);
        let second_outer = whitespace_chain(&mut second);
        let foreign_inner = first.node(first_outer).unwrap().children()[1];
        let replacement = second.non_terminal(WS);

        assert_eq!(first_outer.to_string(), second_outer.to_string());
        assert_ne!(first_outer, second_outer);
        assert!(second.get(first_outer).is_none());
        assert!(!second.contains(foreign_inner));
        assert_eq!(
            second.replace_subnode(second_outer, foreign_inner, replacement),
            Err(TreeError::UnknownNode(foreign_inner))
        );
        assert_eq!(
            second.attach_children(replacement, vec![foreign_inner]),
            Err(TreeError::UnknownNode(foreign_inner))
        );
        assert_eq!(second.free(first_outer), Err(TreeError::UnknownNode(first_outer)));
        assert!(!second.is_descendant(second_outer, foreign_inner));
        assert_eq!(second.len(), 5);
        second.verify(second_outer).unwrap();
    }

    #[test]
    fn clones_share_lineage_with_their_source() {
        let mut arena = NodeArena::new();
        let outer = whitespace_chain(&mut arena);
        let copy = arena.clone();
        assert_eq!(copy.node(outer).unwrap().non_terminal_count(), 3);
        copy.verify(outer).unwrap();

        let fresh = NodeArena::default();
        assert!(fresh.get(outer).is_none());
    }
}
