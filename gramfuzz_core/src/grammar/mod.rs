pub mod json;

pub use json::{JsonGrammar, JsonRule};

use crate::node::{NodeArena, NodeId, RuleId, TreeError};
use crate::tree::Tree;
use rand::Rng;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GrammarError {
    #[error("Rule {0} is not part of grammar `{1}`")]
    UnknownRule(RuleId, &'static str),

    #[error("Rule `{0}` has nothing to derive from")]
    EmptyRule(&'static str),

    #[error("Failed to assemble derivation: {0}")]
    Tree(#[from] TreeError),
}

/// The dispatch contract between the tree engine and a concrete grammar.
///
/// A grammar maps rule ids to generators. Generation is driven entirely by the
/// arguments: the depth bound is passed explicitly and the grammar itself is
/// immutable, so one grammar can serve any number of trees and threads.
pub trait Grammar {
    /// Short name used in diagnostics.
    fn name(&self) -> &'static str;

    /// Rule an initial tree is derived from.
    fn start_rule(&self) -> RuleId;

    /// Whether `rule` names one of this grammar's productions.
    fn knows(&self, rule: RuleId) -> bool;

    fn rule_name(&self, rule: RuleId) -> Option<&'static str>;

    /// Derives a fresh subtree for `rule` inside `nodes`.
    ///
    /// # Arguments
    ///
    /// * `rule` - The rule to expand; it becomes the rule of the returned node.
    /// * `depth_bound` - Expansions nested deeper than this emit a literal from
    ///   the rule's pool instead of recursing.
    /// * `nodes` - The arena of the tree that will receive the subtree.
    /// * `rng` - Source of every random choice made during derivation.
    ///
    /// # Returns
    ///
    /// The handle of the detached subtree root, or `GrammarError::UnknownRule`
    /// when the rule is not part of this grammar.
    fn generate<R: Rng + ?Sized>(
        &self,
        rule: RuleId,
        depth_bound: usize,
        nodes: &mut NodeArena,
        rng: &mut R,
    ) -> Result<NodeId, GrammarError>;
}

impl<G: Grammar + ?Sized> Grammar for &G {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn start_rule(&self) -> RuleId {
        (**self).start_rule()
    }

    fn knows(&self, rule: RuleId) -> bool {
        (**self).knows(rule)
    }

    fn rule_name(&self, rule: RuleId) -> Option<&'static str> {
        (**self).rule_name(rule)
    }

    fn generate<R: Rng + ?Sized>(
        &self,
        rule: RuleId,
        depth_bound: usize,
        nodes: &mut NodeArena,
        rng: &mut R,
    ) -> Result<NodeId, GrammarError> {
        (**self).generate(rule, depth_bound, nodes, rng)
    }
}

/// One element on the right-hand side of a production.
#[derive(Debug, Clone, Copy)]
pub enum Symbol<R: 'static> {
    /// A fixed literal, emitted as a generic terminal.
    Literal(&'static [u8]),
    /// One byte drawn uniformly from the class, emitted as a generic terminal.
    OneOf(&'static [u8]),
    /// A nested derivation one level deeper.
    Rule(R),
}

#[derive(Debug, Clone, Copy)]
pub struct Production<R: 'static> {
    pub weight: u32,
    pub symbols: &'static [Symbol<R>],
}

/// Literals a rule falls back to once the depth bound is exceeded.
#[derive(Debug, Clone, Copy)]
pub enum Pool {
    Literals(&'static [&'static [u8]]),
    /// Every byte of the slice is a one-byte literal.
    Bytes(&'static [u8]),
}

impl Pool {
    pub fn len(&self) -> usize {
        match self {
            Pool::Literals(literals) => literals.len(),
            Pool::Bytes(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<&'static [u8]> {
        match *self {
            Pool::Literals(literals) => literals.get(index).copied(),
            Pool::Bytes(bytes) => bytes.get(index..=index),
        }
    }
}

#[derive(Debug)]
pub struct RuleDef<R: 'static> {
    pub name: &'static str,
    pub pool: Pool,
    pub productions: &'static [Production<R>],
}

/// A rule of a table-driven grammar: a closed set of values each backed by a static [`RuleDef`].
pub trait TableRule: Copy + Into<RuleId> + 'static {
    fn def(self) -> &'static RuleDef<Self>;
}

/// Expands `rule` at nesting level `depth` into `nodes`.
///
/// Past the depth bound the rule collapses to a single terminal tagged with the
/// rule itself, so its rule identity survives in the tree.
pub fn derive<T: TableRule, R: Rng + ?Sized>(
    rule: T,
    depth: usize,
    depth_bound: usize,
    nodes: &mut NodeArena,
    rng: &mut R,
) -> Result<NodeId, GrammarError> {
    let def = rule.def();
    if depth > depth_bound {
        if def.pool.is_empty() {
            return Err(GrammarError::EmptyRule(def.name));
        }
        let literal = def
            .pool
            .get(rng.random_range(0..def.pool.len()))
            .ok_or(GrammarError::EmptyRule(def.name))?;
        return Ok(nodes.terminal(rule.into(), literal));
    }

    let production = choose_production(def, rng)?;
    let mut children = Vec::with_capacity(production.symbols.len());
    for symbol in production.symbols {
        let child = match *symbol {
            Symbol::Literal(bytes) => nodes.terminal(RuleId::TERMINAL, bytes),
            Symbol::OneOf(class) => {
                if class.is_empty() {
                    return Err(GrammarError::EmptyRule(def.name));
                }
                let index = rng.random_range(0..class.len());
                nodes.terminal(RuleId::TERMINAL, &class[index..=index])
            }
            Symbol::Rule(next) => derive(next, depth + 1, depth_bound, nodes, rng)?,
        };
        children.push(child);
    }

    let node = nodes.non_terminal(rule.into());
    nodes.attach_children(node, children)?;
    Ok(node)
}

fn choose_production<T: TableRule, R: Rng + ?Sized>(
    def: &'static RuleDef<T>,
    rng: &mut R,
) -> Result<&'static Production<T>, GrammarError> {
    let total: u64 = def.productions.iter().map(|p| u64::from(p.weight)).sum();
    if total == 0 {
        return Err(GrammarError::EmptyRule(def.name));
    }
    let mut target = rng.random_range(0..total);
    for production in def.productions {
        let weight = u64::from(production.weight);
        if target < weight {
            return Ok(production);
        }
        target -= weight;
    }
    Err(GrammarError::EmptyRule(def.name))
}

/// Derives a complete tree from the grammar's start rule.
pub fn generate_tree<G: Grammar, R: Rng + ?Sized>(
    grammar: &G,
    depth_bound: usize,
    rng: &mut R,
) -> Result<Tree, GrammarError> {
    let mut nodes = NodeArena::new();
    let root = grammar.generate(grammar.start_rule(), depth_bound, &mut nodes, rng)?;
    tracing::debug!(
        grammar = grammar.name(),
        depth_bound,
        nodes = nodes.len(),
        "generated initial tree"
    );
    Ok(Tree::new(nodes, root, depth_bound)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaCha8Rng;
    use rand_core::SeedableRng;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Toy {
        List,
        Item,
        Empty,
    }

    impl From<Toy> for RuleId {
        fn from(rule: Toy) -> Self {
            RuleId(rule as u32 + 1)
        }
    }

    static LIST: RuleDef<Toy> = RuleDef {
        name: "list",
        pool: Pool::Literals(&[b"[]"]),
        productions: &[
            Production {
                weight: 1,
                symbols: &[Symbol::Literal(b"["), Symbol::Rule(Toy::Item), Symbol::Literal(b"]")],
            },
            Production {
                weight: 3,
                symbols: &[Symbol::Rule(Toy::Item), Symbol::Literal(b","), Symbol::Rule(Toy::List)],
            },
        ],
    };

    static ITEM: RuleDef<Toy> = RuleDef {
        name: "item",
        pool: Pool::Bytes(b"xyz"),
        productions: &[Production {
            weight: 1,
            symbols: &[Symbol::OneOf(b"abc")],
        }],
    };

    static EMPTY: RuleDef<Toy> = RuleDef {
        name: "empty",
        pool: Pool::Literals(&[]),
        productions: &[],
    };

    impl TableRule for Toy {
        fn def(self) -> &'static RuleDef<Self> {
            match self {
                Toy::List => &LIST,
                Toy::Item => &ITEM,
                Toy::Empty => &EMPTY,
            }
        }
    }

    #[test]
    fn derivation_respects_the_depth_bound() {
        let mut rng = ChaCha8Rng::from_seed([5; 32]);
        for _ in 0..50 {
            let mut nodes = NodeArena::new();
            let root = derive(Toy::List, 0, 3, &mut nodes, &mut rng).unwrap();
            nodes.verify(root).unwrap();
            let tree = Tree::new(nodes, root, 3).unwrap();
            let rendered = tree.to_bytes();
            assert!(rendered.iter().all(|b| b"[],abcxyz".contains(b)));

            // Depth-0 expansion always happens, deeper ones stop past the bound.
            assert!(!tree.node(root).unwrap().is_terminal());
            let mut stack = vec![(root, 0usize)];
            while let Some((id, depth)) = stack.pop() {
                let node = tree.node(id).unwrap();
                if node.rule() != RuleId::TERMINAL {
                    assert_eq!(node.is_terminal(), depth > 3);
                }
                stack.extend(node.children().iter().map(|&child| (child, depth + 1)));
            }
        }
    }

    #[test]
    fn past_the_bound_rules_emit_pool_literals() {
        let mut rng = ChaCha8Rng::from_seed([2; 32]);
        let mut nodes = NodeArena::new();
        let id = derive(Toy::Item, 1, 0, &mut nodes, &mut rng).unwrap();
        let node = nodes.node(id).unwrap();
        assert_eq!(node.rule(), RuleId::from(Toy::Item));
        assert!(matches!(node.value(), Some(b"x" | b"y" | b"z")));
    }

    #[test]
    fn empty_rules_are_reported() {
        let mut rng = ChaCha8Rng::from_seed([2; 32]);
        let mut nodes = NodeArena::new();
        assert!(matches!(
            derive(Toy::Empty, 0, 4, &mut nodes, &mut rng),
            Err(GrammarError::EmptyRule("empty"))
        ));
        assert!(matches!(
            derive(Toy::Empty, 5, 4, &mut nodes, &mut rng),
            Err(GrammarError::EmptyRule("empty"))
        ));
    }

    #[test]
    fn production_weights_bias_the_choice() {
        let mut rng = ChaCha8Rng::from_seed([9; 32]);
        let mut recursive = 0;
        let draws = 4_000;
        for _ in 0..draws {
            let production = choose_production(&LIST, &mut rng).unwrap();
            if production.symbols.len() == 3 && matches!(production.symbols[2], Symbol::Rule(Toy::List)) {
                recursive += 1;
            }
        }
        // Three quarters of the weight sits on the recursive alternative.
        assert!((2_800..=3_200).contains(&recursive), "recursive = {recursive}");
    }

    #[test]
    fn pool_lookup_handles_both_shapes() {
        assert_eq!(Pool::Bytes(b"ab").get(1), Some(&b"b"[..]));
        assert_eq!(Pool::Bytes(b"ab").get(2), None);
        assert_eq!(Pool::Literals(&[b"one", b""]).get(1), Some(&b""[..]));
        assert!(Pool::Literals(&[]).is_empty());
    }
}
