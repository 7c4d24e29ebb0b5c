//! Byte-level views of a tree.
//!
//! Rendering concatenates terminal values and cannot be inverted. The structural
//! format records every node and decodes back to an equal tree:
//!
//! ```text
//! header: magic "GFZT" | version u16 | depth u64 | node count u64
//! record: tag u32 | rule u32 | (value len u64 + bytes) or (child count u64)
//! ```
//!
//! Records follow the header in pre-order; all integers are fixed-width little endian.
//! Any tree can be encoded. On decode, a value length reaching past the end of
//! the buffer is rejected before anything is allocated for it.

use crate::grammar::Grammar;
use crate::node::{NodeArena, NodeId, RuleId, TreeError};
use crate::tree::Tree;
use bincode::config::{Configuration, Fixint, LittleEndian, NoLimit};
use bincode::error::{DecodeError, EncodeError};
use bincode::{Decode, Encode};
use thiserror::Error;

pub const FORMAT_MAGIC: [u8; 4] = *b"GFZT";
pub const FORMAT_VERSION: u16 = 1;
/// Variant tag of a terminal record.
const TERMINAL_TAG: u32 = 0;
/// Bytes before a terminal's value: tag, rule and value length.
const TERMINAL_PREFIX_LEN: usize = 16;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Buffer does not start with the tree format magic")]
    BadMagic,

    #[error("Unsupported tree format version {0}")]
    UnsupportedVersion(u16),

    #[error("Buffer ended before the tree was complete")]
    Truncated,

    #[error("Header announces {expected} nodes but the records describe {actual}")]
    LengthMismatch { expected: u64, actual: u64 },

    #[error("{0} unexpected bytes after the end of the tree")]
    TrailingBytes(usize),

    #[error("Rule {0} is not a valid {1} rule here")]
    UnknownRule(RuleId, &'static str),

    #[error("Malformed tree buffer: {0}")]
    Malformed(String),

    #[error("Failed to encode tree: {0}")]
    Encode(String),

    #[error("Decoded records do not form a valid tree: {0}")]
    Tree(#[from] TreeError),
}

impl From<DecodeError> for CodecError {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::UnexpectedEnd { .. } => CodecError::Truncated,
            other => CodecError::Malformed(other.to_string()),
        }
    }
}

impl From<EncodeError> for CodecError {
    fn from(err: EncodeError) -> Self {
        CodecError::Encode(err.to_string())
    }
}

#[derive(Encode, Decode, Debug, Clone, PartialEq, Eq)]
struct Header {
    magic: [u8; 4],
    version: u16,
    depth: u64,
    node_count: u64,
}

#[derive(Encode, Decode, Debug, Clone, PartialEq, Eq)]
enum Record {
    Terminal { rule: u32, value: Vec<u8> },
    NonTerminal { rule: u32, child_count: u64 },
}

fn format_config() -> Configuration<LittleEndian, Fixint, NoLimit> {
    bincode::config::standard()
        .with_little_endian()
        .with_fixed_int_encoding()
}

/// Value length announced by the terminal record at the start of `rest`, if
/// `rest` starts with one.
fn announced_value_len(rest: &[u8]) -> Option<u64> {
    if rest.get(..4)? != TERMINAL_TAG.to_le_bytes() {
        return None;
    }
    let len: [u8; 8] = rest.get(8..TERMINAL_PREFIX_LEN)?.try_into().ok()?;
    Some(u64::from_le_bytes(len))
}

/// Appends the terminal values below `root` to `out`, left to right.
pub fn render_subtree(nodes: &NodeArena, root: NodeId, out: &mut Vec<u8>) {
    for (_, node) in nodes.preorder(root) {
        if let Some(value) = node.value() {
            out.extend_from_slice(value);
        }
    }
}

/// Serializes the full shape of `tree` into the structural format.
pub fn encode_tree(tree: &Tree) -> Result<Vec<u8>, CodecError> {
    let config = format_config();
    let header = Header {
        magic: FORMAT_MAGIC,
        version: FORMAT_VERSION,
        depth: tree.depth() as u64,
        node_count: tree.preorder().count() as u64,
    };
    let mut out = bincode::encode_to_vec(&header, config)?;

    for (_, node) in tree.preorder() {
        let record = match node.value() {
            Some(value) => Record::Terminal {
                rule: node.rule().0,
                value: value.to_vec(),
            },
            None => Record::NonTerminal {
                rule: node.rule().0,
                child_count: node.children().len() as u64,
            },
        };
        out.extend(bincode::encode_to_vec(&record, config)?);
    }
    Ok(out)
}

/// Non-terminal whose children are still being read.
struct Pending {
    id: NodeId,
    remaining: u64,
    children: Vec<NodeId>,
}

/// Rebuilds a tree from the structural format.
///
/// Records are read one at a time against an explicit stack, so nesting depth
/// in the buffer never turns into call depth. Nodes are attached through
/// [`NodeArena::attach_children`], which recomputes every cached count.
pub fn decode_tree<G: Grammar>(buf: &[u8], grammar: &G) -> Result<Tree, CodecError> {
    let config = format_config();
    let (header, mut offset): (Header, usize) = bincode::decode_from_slice(buf, config)?;
    if header.magic != FORMAT_MAGIC {
        return Err(CodecError::BadMagic);
    }
    if header.version != FORMAT_VERSION {
        return Err(CodecError::UnsupportedVersion(header.version));
    }

    let mut nodes = NodeArena::new();
    let mut stack: Vec<Pending> = Vec::new();
    let mut decoded: u64 = 0;

    let root = 'read: loop {
        let rest = &buf[offset..];
        if let Some(len) = announced_value_len(rest) {
            if len > (rest.len() - TERMINAL_PREFIX_LEN) as u64 {
                return Err(CodecError::Truncated);
            }
        }
        let (record, used): (Record, usize) = bincode::decode_from_slice(rest, config)?;
        offset += used;
        decoded += 1;

        let mut finished = match record {
            Record::Terminal { rule, value } => {
                let rule = RuleId(rule);
                if rule != RuleId::TERMINAL && !grammar.knows(rule) {
                    return Err(CodecError::UnknownRule(rule, grammar.name()));
                }
                nodes.terminal(rule, value)
            }
            Record::NonTerminal { rule, child_count } => {
                let rule = RuleId(rule);
                if rule == RuleId::TERMINAL || !grammar.knows(rule) {
                    return Err(CodecError::UnknownRule(rule, grammar.name()));
                }
                let id = nodes.non_terminal(rule);
                if child_count > 0 {
                    stack.push(Pending {
                        id,
                        remaining: child_count,
                        children: Vec::new(),
                    });
                    continue 'read;
                }
                id
            }
        };

        // Close every non-terminal whose last child just arrived.
        loop {
            let Some(parent) = stack.last_mut() else {
                break 'read finished;
            };
            parent.children.push(finished);
            parent.remaining -= 1;
            if parent.remaining > 0 {
                continue 'read;
            }
            let Some(Pending { id, children, .. }) = stack.pop() else {
                break 'read finished;
            };
            nodes.attach_children(id, children)?;
            finished = id;
        }
    };

    if decoded != header.node_count {
        return Err(CodecError::LengthMismatch {
            expected: header.node_count,
            actual: decoded,
        });
    }
    if offset != buf.len() {
        return Err(CodecError::TrailingBytes(buf.len() - offset));
    }

    tracing::trace!(nodes = decoded, bytes = buf.len(), "decoded tree");
    Ok(Tree::new(nodes, root, header.depth as usize)?)
}

impl Tree {
    /// Structural encoding of this tree; see [`encode_tree`].
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        encode_tree(self)
    }

    /// Decodes a buffer produced by [`Tree::encode`], validating rule ids against `grammar`.
    pub fn decode<G: Grammar>(buf: &[u8], grammar: &G) -> Result<Tree, CodecError> {
        decode_tree(buf, grammar)
    }
}
