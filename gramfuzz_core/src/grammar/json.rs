//! The JSON grammar: thirty rules with ids 1..=30 in dispatch-table order.
//!
//! Left-recursive repetitions of the source grammar are expanded into right
//! recursive helper rules (`symbol_2`, `symbol_1_1`, `character_1`, `digit_1`).
//! Every rule carries a pool of short literals used once the depth bound is
//! exceeded; the pools are chosen so that a collapsed rule still renders as a
//! plausible fragment of its surroundings.

use super::{Grammar, GrammarError, Pool, Production, RuleDef, Symbol, TableRule, derive};
use crate::node::{NodeArena, NodeId, RuleId};
use rand::Rng;

use JsonRule as J;
use Symbol::{Literal, OneOf, Rule};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum JsonRule {
    Start = 1,
    Json,
    Element,
    Value,
    Object,
    Members,
    Member,
    Array,
    Elements,
    String,
    Characters,
    Character,
    Esc,
    Escc,
    Number,
    Int,
    Digits,
    Digit,
    Onenine,
    Frac,
    Exp,
    Sign,
    Ws,
    Sp1,
    Symbol,
    Symbol1,
    Symbol2,
    Symbol11,
    Character1,
    Digit1,
}

impl JsonRule {
    /// All rules, indexed by `id - 1`.
    pub const ALL: [JsonRule; 30] = [
        J::Start,
        J::Json,
        J::Element,
        J::Value,
        J::Object,
        J::Members,
        J::Member,
        J::Array,
        J::Elements,
        J::String,
        J::Characters,
        J::Character,
        J::Esc,
        J::Escc,
        J::Number,
        J::Int,
        J::Digits,
        J::Digit,
        J::Onenine,
        J::Frac,
        J::Exp,
        J::Sign,
        J::Ws,
        J::Sp1,
        J::Symbol,
        J::Symbol1,
        J::Symbol2,
        J::Symbol11,
        J::Character1,
        J::Digit1,
    ];

    pub fn id(self) -> RuleId {
        RuleId(self as u32)
    }

    pub fn name(self) -> &'static str {
        self.def().name
    }
}

impl From<JsonRule> for RuleId {
    fn from(rule: JsonRule) -> Self {
        rule.id()
    }
}

impl TryFrom<RuleId> for JsonRule {
    type Error = GrammarError;

    fn try_from(id: RuleId) -> Result<Self, Self::Error> {
        (id.0 as usize)
            .checked_sub(1)
            .and_then(|index| JsonRule::ALL.get(index).copied())
            .ok_or(GrammarError::UnknownRule(id, "json"))
    }
}

/// Printable ASCII without `'` and `\`. The quote stays in, so strings may break early.
const PRINTABLE: &[u8] =
    b" !\"#$%&()*+,-./0123456789:;<=>?@ABCDEFGHIJKLMNOPQRSTUVWXYZ[]^_`abcdefghijklmnopqrstuvwxyz{|}~";

const fn alt(symbols: &'static [Symbol<JsonRule>]) -> Production<JsonRule> {
    Production { weight: 1, symbols }
}

const fn weighted(weight: u32, symbols: &'static [Symbol<JsonRule>]) -> Production<JsonRule> {
    Production { weight, symbols }
}

static START: RuleDef<JsonRule> = RuleDef {
    name: "start",
    pool: Pool::Literals(&[b"null", b"false", b"true"]),
    productions: &[alt(&[Rule(J::Json)])],
};

static JSON: RuleDef<JsonRule> = RuleDef {
    name: "json",
    pool: Pool::Literals(&[b"true", b"false", b"null"]),
    productions: &[alt(&[Rule(J::Element)])],
};

static ELEMENT: RuleDef<JsonRule> = RuleDef {
    name: "element",
    pool: Pool::Literals(&[b"null", b"false", b"true"]),
    productions: &[alt(&[Rule(J::Ws), Rule(J::Value), Rule(J::Ws)])],
};

static VALUE: RuleDef<JsonRule> = RuleDef {
    name: "value",
    pool: Pool::Literals(&[b"null", b"true", b"false"]),
    productions: &[
        alt(&[Literal(b"false")]),
        alt(&[Literal(b"null")]),
        alt(&[Literal(b"true")]),
        alt(&[Rule(J::Array)]),
        alt(&[Rule(J::Object)]),
        alt(&[Rule(J::Number)]),
        alt(&[Rule(J::String)]),
    ],
};

static OBJECT: RuleDef<JsonRule> = RuleDef {
    name: "object",
    pool: Pool::Literals(&[b"{}"]),
    productions: &[
        alt(&[Literal(b"{"), Rule(J::Ws), Literal(b"}")]),
        alt(&[Literal(b"{"), Rule(J::Members), Literal(b"}")]),
    ],
};

static MEMBERS: RuleDef<JsonRule> = RuleDef {
    name: "members",
    pool: Pool::Literals(&[b"\"\":true", b"\"\":null", b"\"\":false"]),
    productions: &[alt(&[Rule(J::Member), Rule(J::Symbol2)])],
};

static MEMBER: RuleDef<JsonRule> = RuleDef {
    name: "member",
    pool: Pool::Literals(&[b"\"\":false", b"\"\":null", b"\"\":true"]),
    productions: &[alt(&[
        Rule(J::Ws),
        Rule(J::String),
        Rule(J::Ws),
        Literal(b":"),
        Rule(J::Element),
    ])],
};

static ARRAY: RuleDef<JsonRule> = RuleDef {
    name: "array",
    pool: Pool::Literals(&[b"[]"]),
    productions: &[
        alt(&[Literal(b"["), Rule(J::Ws), Literal(b"]")]),
        alt(&[Literal(b"["), Rule(J::Elements), Literal(b"]")]),
    ],
};

static ELEMENTS: RuleDef<JsonRule> = RuleDef {
    name: "elements",
    pool: Pool::Literals(&[b"true", b"null", b"false"]),
    productions: &[alt(&[Rule(J::Element), Rule(J::Symbol11)])],
};

static STRING: RuleDef<JsonRule> = RuleDef {
    name: "string",
    pool: Pool::Literals(&[b"\"\""]),
    productions: &[alt(&[Literal(b"\""), Rule(J::Characters), Literal(b"\"")])],
};

static CHARACTERS: RuleDef<JsonRule> = RuleDef {
    name: "characters",
    pool: Pool::Literals(&[b""]),
    productions: &[alt(&[Rule(J::Character1)])],
};

// One alternative per printable byte plus the escape.
static CHARACTER: RuleDef<JsonRule> = RuleDef {
    name: "character",
    pool: Pool::Bytes(PRINTABLE),
    productions: &[
        weighted(PRINTABLE.len() as u32, &[OneOf(PRINTABLE)]),
        alt(&[Rule(J::Esc)]),
    ],
};

static ESC: RuleDef<JsonRule> = RuleDef {
    name: "esc",
    pool: Pool::Literals(&[b"\\t", b"\\r", b"\\b", b"\\\"", b"\\\\", b"\\f", b"\\n"]),
    productions: &[alt(&[Literal(b"\\"), Rule(J::Escc)])],
};

static ESCC: RuleDef<JsonRule> = RuleDef {
    name: "escc",
    pool: Pool::Bytes(b"\"bn\\rtf"),
    productions: &[alt(&[OneOf(b"\"bn\\rtf")])],
};

static NUMBER: RuleDef<JsonRule> = RuleDef {
    name: "number",
    pool: Pool::Literals(&[b"0"]),
    productions: &[alt(&[Rule(J::Int), Rule(J::Frac), Rule(J::Exp)])],
};

static INT: RuleDef<JsonRule> = RuleDef {
    name: "int",
    pool: Pool::Literals(&[b"0"]),
    productions: &[
        alt(&[Rule(J::Digit)]),
        alt(&[Literal(b"-"), Rule(J::Digits)]),
        alt(&[Literal(b"-"), Rule(J::Onenine), Rule(J::Digits)]),
        alt(&[Rule(J::Onenine), Rule(J::Digits)]),
    ],
};

static DIGITS: RuleDef<JsonRule> = RuleDef {
    name: "digits",
    pool: Pool::Literals(&[b"0"]),
    productions: &[alt(&[Rule(J::Digit1)])],
};

static DIGIT: RuleDef<JsonRule> = RuleDef {
    name: "digit",
    pool: Pool::Literals(&[b"0"]),
    productions: &[alt(&[Literal(b"0")]), alt(&[Rule(J::Onenine)])],
};

static ONENINE: RuleDef<JsonRule> = RuleDef {
    name: "onenine",
    pool: Pool::Bytes(b"658231794"),
    productions: &[alt(&[OneOf(b"123456789")])],
};

static FRAC: RuleDef<JsonRule> = RuleDef {
    name: "frac",
    pool: Pool::Literals(&[b""]),
    productions: &[alt(&[]), alt(&[Literal(b"."), Rule(J::Digits)])],
};

static EXP: RuleDef<JsonRule> = RuleDef {
    name: "exp",
    pool: Pool::Literals(&[b""]),
    productions: &[
        alt(&[]),
        alt(&[Literal(b"E"), Rule(J::Sign), Rule(J::Digits)]),
        alt(&[Literal(b"e"), Rule(J::Sign), Rule(J::Digits)]),
    ],
};

static SIGN: RuleDef<JsonRule> = RuleDef {
    name: "sign",
    pool: Pool::Literals(&[b"-", b"", b"+"]),
    productions: &[alt(&[]), alt(&[Literal(b"+")]), alt(&[Literal(b"-")])],
};

static WS: RuleDef<JsonRule> = RuleDef {
    name: "ws",
    pool: Pool::Literals(&[b""]),
    productions: &[alt(&[]), alt(&[Rule(J::Sp1), Rule(J::Ws)])],
};

static SP1: RuleDef<JsonRule> = RuleDef {
    name: "sp1",
    pool: Pool::Bytes(b" \t\r\n"),
    productions: &[alt(&[OneOf(b"\t\n\r ")])],
};

static SYMBOL: RuleDef<JsonRule> = RuleDef {
    name: "symbol",
    pool: Pool::Literals(&[b",\"\":true", b",\"\":null", b",\"\":false"]),
    productions: &[alt(&[Literal(b","), Rule(J::Members)])],
};

static SYMBOL_1: RuleDef<JsonRule> = RuleDef {
    name: "symbol_1",
    pool: Pool::Literals(&[b",null", b",true", b",false"]),
    productions: &[alt(&[Literal(b","), Rule(J::Elements)])],
};

static SYMBOL_2: RuleDef<JsonRule> = RuleDef {
    name: "symbol_2",
    pool: Pool::Literals(&[b""]),
    productions: &[alt(&[]), alt(&[Rule(J::Symbol), Rule(J::Symbol2)])],
};

static SYMBOL_1_1: RuleDef<JsonRule> = RuleDef {
    name: "symbol_1_1",
    pool: Pool::Literals(&[b""]),
    productions: &[alt(&[]), alt(&[Rule(J::Symbol1), Rule(J::Symbol11)])],
};

static CHARACTER_1: RuleDef<JsonRule> = RuleDef {
    name: "character_1",
    pool: Pool::Literals(&[b""]),
    productions: &[alt(&[]), alt(&[Rule(J::Character), Rule(J::Character1)])],
};

static DIGIT_1: RuleDef<JsonRule> = RuleDef {
    name: "digit_1",
    pool: Pool::Literals(&[b"0"]),
    productions: &[alt(&[Rule(J::Digit)]), alt(&[Rule(J::Digit), Rule(J::Digit1)])],
};

impl TableRule for JsonRule {
    fn def(self) -> &'static RuleDef<Self> {
        match self {
            J::Start => &START,
            J::Json => &JSON,
            J::Element => &ELEMENT,
            J::Value => &VALUE,
            J::Object => &OBJECT,
            J::Members => &MEMBERS,
            J::Member => &MEMBER,
            J::Array => &ARRAY,
            J::Elements => &ELEMENTS,
            J::String => &STRING,
            J::Characters => &CHARACTERS,
            J::Character => &CHARACTER,
            J::Esc => &ESC,
            J::Escc => &ESCC,
            J::Number => &NUMBER,
            J::Int => &INT,
            J::Digits => &DIGITS,
            J::Digit => &DIGIT,
            J::Onenine => &ONENINE,
            J::Frac => &FRAC,
            J::Exp => &EXP,
            J::Sign => &SIGN,
            J::Ws => &WS,
            J::Sp1 => &SP1,
            J::Symbol => &SYMBOL,
            J::Symbol1 => &SYMBOL_1,
            J::Symbol2 => &SYMBOL_2,
            J::Symbol11 => &SYMBOL_1_1,
            J::Character1 => &CHARACTER_1,
            J::Digit1 => &DIGIT_1,
        }
    }
}

/// Generator for JSON documents, dispatching rule ids through [`JsonRule`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonGrammar;

impl Grammar for JsonGrammar {
    fn name(&self) -> &'static str {
        "json"
    }

    fn start_rule(&self) -> RuleId {
        J::Start.id()
    }

    fn knows(&self, rule: RuleId) -> bool {
        JsonRule::try_from(rule).is_ok()
    }

    fn rule_name(&self, rule: RuleId) -> Option<&'static str> {
        JsonRule::try_from(rule).ok().map(JsonRule::name)
    }

    fn generate<R: Rng + ?Sized>(
        &self,
        rule: RuleId,
        depth_bound: usize,
        nodes: &mut NodeArena,
        rng: &mut R,
    ) -> Result<NodeId, GrammarError> {
        derive(JsonRule::try_from(rule)?, 0, depth_bound, nodes, rng)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::generate_tree;
    use rand_chacha::ChaCha8Rng;
    use rand_core::SeedableRng;

    #[test]
    fn rule_ids_are_dense_and_ordered() {
        for (index, rule) in JsonRule::ALL.iter().enumerate() {
            assert_eq!(rule.id(), RuleId(index as u32 + 1));
            assert_eq!(JsonRule::try_from(rule.id()).unwrap(), *rule);
        }
        assert_eq!(J::Start.id(), RuleId(1));
        assert_eq!(J::Ws.id(), RuleId(23));
        assert_eq!(J::Digit1.id(), RuleId(30));
    }

    #[test]
    fn unknown_ids_are_rejected_at_the_boundary() {
        for raw in [0, 31, u32::MAX] {
            assert!(matches!(
                JsonRule::try_from(RuleId(raw)),
                Err(GrammarError::UnknownRule(id, "json")) if id == RuleId(raw)
            ));
            assert!(!JsonGrammar.knows(RuleId(raw)));
        }
        let mut nodes = NodeArena::new();
        let mut rng = ChaCha8Rng::from_seed([0; 32]);
        assert!(matches!(
            JsonGrammar.generate(RuleId(0), 3, &mut nodes, &mut rng),
            Err(GrammarError::UnknownRule(RuleId(0), "json"))
        ));
        assert!(nodes.is_empty());
    }

    #[test]
    fn every_rule_has_a_pool_and_productions() {
        for rule in JsonRule::ALL {
            let def = rule.def();
            assert!(!def.pool.is_empty(), "{} has an empty pool", def.name);
            assert!(!def.productions.is_empty(), "{} has no productions", def.name);
            assert_eq!(JsonGrammar.rule_name(rule.id()), Some(def.name));
        }
        assert_eq!(JsonGrammar.rule_name(RuleId(23)), Some("ws"));
        assert_eq!(PRINTABLE.len(), 93);
        assert!(!PRINTABLE.contains(&b'\'') && !PRINTABLE.contains(&b'\\'));
    }

    #[test]
    fn depth_zero_collapses_below_the_start_rule() {
        let mut rng = ChaCha8Rng::from_seed([4; 32]);
        for _ in 0..20 {
            let tree = generate_tree(&JsonGrammar, 0, &mut rng).unwrap();
            assert_eq!(tree.non_terminal_count(), 1);
            let rendered = tree.to_bytes();
            assert!(
                [&b"true"[..], b"false", b"null"].contains(&rendered.as_slice()),
                "unexpected rendering {rendered:?}"
            );
        }
    }

    #[test]
    fn generated_trees_are_valid_and_start_at_the_start_rule() {
        let mut rng = ChaCha8Rng::from_seed([8; 32]);
        for depth in 1..12 {
            let mut tree = generate_tree(&JsonGrammar, depth, &mut rng).unwrap();
            tree.verify().unwrap();
            assert_eq!(tree.depth(), depth);
            assert_eq!(tree.node(tree.root()).unwrap().rule(), J::Start.id());
            for (_, node) in tree.preorder() {
                assert!(node.rule() == RuleId::TERMINAL || JsonGrammar.knows(node.rule()));
            }
            assert!(tree.render().is_ascii());
        }
    }

    #[test]
    fn whitespace_rule_only_emits_json_whitespace() {
        let mut rng = ChaCha8Rng::from_seed([6; 32]);
        for bound in 0..10 {
            let mut nodes = NodeArena::new();
            let ws = JsonGrammar.generate(J::Ws.id(), bound, &mut nodes, &mut rng).unwrap();
            let mut out = Vec::new();
            crate::codec::render_subtree(&nodes, ws, &mut out);
            assert!(out.iter().all(|b| b" \t\r\n".contains(b)), "{out:?}");
            assert_eq!(nodes.node(ws).unwrap().rule(), J::Ws.id());
        }
    }

    #[test]
    fn hand_built_example_matches_its_rendering() {
        let (mut tree, trailing) = test_utils::object_with_empty_key();
        assert_eq!(tree.render(), b"{\"\":true}");
        assert_eq!(tree.non_terminal_count(), 19);
        assert_eq!(tree.node(trailing).unwrap().rule(), J::Ws.id());
        tree.verify().unwrap();
    }
}
