pub mod codec;
pub mod config;
pub mod grammar;
pub mod mutator;
pub mod node;
pub mod tree;

pub use codec::{CodecError, decode_tree, encode_tree, render_subtree};
pub use config::{ConfigError, GenerationSettings, GramfuzzConfig, MutationSettings};
pub use grammar::{Grammar, GrammarError, JsonGrammar, JsonRule, generate_tree};
pub use mutator::{
    MutationError, RandomSubtreeMutator, SplicingMutator, TreeMutator, random_mutation,
};
pub use node::{Node, NodeArena, NodeId, RuleId, TreeError};
pub use tree::Tree;
