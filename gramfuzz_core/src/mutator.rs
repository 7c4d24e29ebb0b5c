use crate::config::MutationSettings;
use crate::grammar::{Grammar, GrammarError};
use crate::node::{NodeId, RuleId, TreeError};
use crate::tree::Tree;
use rand::Rng;
use thiserror::Error;

/// Smallest depth bound drawn for a regenerated subtree.
pub const DEFAULT_MIN_DEPTH: usize = 1;
/// Largest depth bound drawn for a regenerated subtree.
pub const DEFAULT_MAX_DEPTH: usize = 15;

#[derive(Error, Debug)]
pub enum MutationError {
    #[error("Tree has no non-terminal node to mutate")]
    NoNonTerminal,

    #[error("Node {0} is not a non-terminal of this tree")]
    NotANonTerminal(NodeId),

    #[error("Splicing requires at least one donor tree")]
    NoDonors,

    #[error("Donor tree has no non-terminal derived from rule {0}")]
    NoCompatibleSubtree(RuleId),

    #[error("Invalid depth range {min}..={max}: bounds must satisfy 1 <= min <= max")]
    InvalidDepthRange { min: usize, max: usize },

    #[error("Tree edit failed: {0}")]
    Tree(#[from] TreeError),

    #[error("Grammar dispatch failed: {0}")]
    Grammar(#[from] GrammarError),
}

/// A `TreeMutator` derives a new tree from an existing one.
///
/// Mutators never edit their input: the returned tree is always a fresh value
/// and the input stays structurally identical, cached rendering included.
///
/// # Type Parameters
/// * `R`: The type of random number generator used for mutation decisions.
pub trait TreeMutator<R: Rng + ?Sized> {
    /// Produces a mutated copy of `tree`.
    ///
    /// # Arguments
    /// * `tree`: The tree to derive from. It is not modified.
    /// * `rng`: A mutable reference to a random number generator.
    /// * `donors`: Other trees a mutator may borrow material from. Mutators that
    ///   work on a single tree ignore it.
    ///
    /// # Returns
    /// `Result<Tree, MutationError>`:
    ///   - `Ok(tree)`: The mutated copy.
    ///   - `Err(error)`: No mutation was possible; nothing was changed.
    fn mutate(&mut self, tree: &Tree, rng: &mut R, donors: &[Tree]) -> Result<Tree, MutationError>;
}

/// Regenerates one uniformly chosen subtree of `tree` with the default depth range.
pub fn random_mutation<G: Grammar, R: Rng + ?Sized>(
    tree: &Tree,
    grammar: &G,
    rng: &mut R,
) -> Result<Tree, MutationError> {
    RandomSubtreeMutator::new(grammar).mutate_tree(tree, rng)
}

/// Replaces a random non-terminal with a freshly derived subtree of the same rule.
///
/// Each mutation draws a new depth bound from `min_depth..=max_depth`, so the
/// replacement may be much shallower or deeper than what it replaces.
#[derive(Debug, Clone)]
pub struct RandomSubtreeMutator<G> {
    grammar: G,
    min_depth: usize,
    max_depth: usize,
}

impl<G: Grammar> RandomSubtreeMutator<G> {
    pub fn new(grammar: G) -> Self {
        Self {
            grammar,
            min_depth: DEFAULT_MIN_DEPTH,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_depth_range(grammar: G, min_depth: usize, max_depth: usize) -> Result<Self, MutationError> {
        if min_depth == 0 || min_depth > max_depth {
            return Err(MutationError::InvalidDepthRange {
                min: min_depth,
                max: max_depth,
            });
        }
        Ok(Self {
            grammar,
            min_depth,
            max_depth,
        })
    }

    pub fn from_settings(grammar: G, settings: &MutationSettings) -> Result<Self, MutationError> {
        Self::with_depth_range(grammar, settings.min_depth, settings.max_depth)
    }

    pub fn grammar(&self) -> &G {
        &self.grammar
    }

    /// Clones `tree` and regenerates a uniformly chosen non-terminal of the clone.
    pub fn mutate_tree<R: Rng + ?Sized>(&self, tree: &Tree, rng: &mut R) -> Result<Tree, MutationError> {
        let mut mutated = tree.clone();
        if mutated.needs_compaction() {
            mutated.compact()?;
        }
        let target = mutated
            .pick_non_terminal(rng)
            .ok_or(MutationError::NoNonTerminal)?;
        self.regenerate_in_place(&mut mutated, target, rng)?;
        Ok(mutated)
    }

    /// Clones `tree` and regenerates the non-terminal `target` of the clone.
    ///
    /// Handles survive cloning, so `target` may be any handle taken from `tree`.
    pub fn regenerate<R: Rng + ?Sized>(
        &self,
        tree: &Tree,
        target: NodeId,
        rng: &mut R,
    ) -> Result<Tree, MutationError> {
        non_terminal_rule(tree, target)?;
        let mut mutated = tree.clone();
        self.regenerate_in_place(&mut mutated, target, rng)?;
        Ok(mutated)
    }

    fn regenerate_in_place<R: Rng + ?Sized>(
        &self,
        tree: &mut Tree,
        target: NodeId,
        rng: &mut R,
    ) -> Result<(), MutationError> {
        let rule = tree
            .node(target)
            .ok_or(TreeError::UnknownNode(target))?
            .rule();
        let depth_bound = rng.random_range(self.min_depth..=self.max_depth);
        let replacement = self
            .grammar
            .generate(rule, depth_bound, tree.nodes_mut(), rng)?;
        tracing::debug!(
            %rule,
            name = self.grammar.rule_name(rule).unwrap_or("?"),
            depth_bound,
            "regenerated subtree"
        );
        swap_out(tree, target, replacement)?;
        tree.set_depth(tree.depth().max(depth_bound));
        Ok(())
    }
}

impl<G: Grammar, R: Rng + ?Sized> TreeMutator<R> for RandomSubtreeMutator<G> {
    fn mutate(&mut self, tree: &Tree, rng: &mut R, _donors: &[Tree]) -> Result<Tree, MutationError> {
        self.mutate_tree(tree, rng)
    }
}

/// Rule of `target` when it is a non-terminal reachable from the root of `tree`.
fn non_terminal_rule(tree: &Tree, target: NodeId) -> Result<RuleId, MutationError> {
    let reachable = target == tree.root() || tree.nodes().is_descendant(tree.root(), target);
    match tree.node(target) {
        Some(node) if reachable && !node.is_terminal() => Ok(node.rule()),
        _ => Err(MutationError::NotANonTerminal(target)),
    }
}

/// Puts the detached `replacement` where `target` was and frees `target`.
fn swap_out(tree: &mut Tree, target: NodeId, replacement: NodeId) -> Result<(), TreeError> {
    let detached = if target == tree.root() {
        tree.replace_root(replacement)?
    } else {
        tree.replace_subnode(target, replacement)?
    };
    let freed = tree.free(detached)?;
    tracing::trace!(freed, "released replaced subtree");
    Ok(())
}

/// Replaces a random non-terminal with a copy of a same-rule subtree taken from a donor.
#[derive(Debug, Default, Clone, Copy)]
pub struct SplicingMutator;

impl SplicingMutator {
    /// Splices a subtree of `donor` into a clone of `tree`.
    ///
    /// The position in `tree` is chosen uniformly among its non-terminals, the
    /// graft uniformly among the donor's non-terminals with the same rule.
    pub fn splice<R: Rng + ?Sized>(
        &self,
        tree: &Tree,
        donor: &Tree,
        rng: &mut R,
    ) -> Result<Tree, MutationError> {
        let mut spliced = tree.clone();
        if spliced.needs_compaction() {
            spliced.compact()?;
        }
        let target = spliced
            .pick_non_terminal(rng)
            .ok_or(MutationError::NoNonTerminal)?;
        self.splice_in_place(&mut spliced, target, donor, rng)?;
        Ok(spliced)
    }

    /// Clones `tree` and replaces its non-terminal `target` with a copy of a
    /// same-rule subtree of `donor`.
    ///
    /// Handles survive cloning, so `target` may be any handle taken from `tree`,
    /// and every other handle of `tree` outside the replaced subtree stays valid.
    pub fn splice_at<R: Rng + ?Sized>(
        &self,
        tree: &Tree,
        target: NodeId,
        donor: &Tree,
        rng: &mut R,
    ) -> Result<Tree, MutationError> {
        non_terminal_rule(tree, target)?;
        let mut spliced = tree.clone();
        self.splice_in_place(&mut spliced, target, donor, rng)?;
        Ok(spliced)
    }

    fn splice_in_place<R: Rng + ?Sized>(
        &self,
        tree: &mut Tree,
        target: NodeId,
        donor: &Tree,
        rng: &mut R,
    ) -> Result<(), MutationError> {
        let rule = non_terminal_rule(tree, target)?;
        let candidates: Vec<NodeId> = donor
            .preorder()
            .filter(|(_, node)| !node.is_terminal() && node.rule() == rule)
            .map(|(id, _)| id)
            .collect();
        if candidates.is_empty() {
            return Err(MutationError::NoCompatibleSubtree(rule));
        }
        let source = candidates[rng.random_range(0..candidates.len())];

        let graft = tree.import_subtree(donor, source)?;
        swap_out(tree, target, graft)?;
        tree.set_depth(tree.depth().max(donor.depth()));
        tracing::debug!(%rule, candidates = candidates.len(), "spliced donor subtree");
        Ok(())
    }
}

impl<R: Rng + ?Sized> TreeMutator<R> for SplicingMutator {
    fn mutate(&mut self, tree: &Tree, rng: &mut R, donors: &[Tree]) -> Result<Tree, MutationError> {
        if donors.is_empty() {
            return Err(MutationError::NoDonors);
        }
        let donor = &donors[rng.random_range(0..donors.len())];
        self.splice(tree, donor, rng)
    }
}
