//! Extensible operator-precedence parsing.
//!
//! A shunting-yard variant folds every run of `expr op expr op ...` in a
//! flat node list into [`NodeKind::BinOp`] trees. Two adjacent operands
//! with no operator between them force every pending operator to resolve
//! first, which is how implicit juxtaposition (`{f a + b c}`) binds tighter
//! than any declared operator.

use makrell_foundation::{Error, Result};

use crate::node::{Node, NodeKind};

/// Operator associativity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Associativity {
    /// `a op b op c` groups as `(a op b) op c`.
    Left,
    /// `a op b op c` groups as `a op (b op c)`.
    Right,
}

/// Precedence level and associativity of an operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Precedence {
    /// Binding strength; higher binds tighter.
    pub level: i32,
    /// Grouping of equal-level chains.
    pub associativity: Associativity,
}

impl Precedence {
    /// Creates a precedence entry.
    #[must_use]
    pub const fn new(level: i32, associativity: Associativity) -> Self {
        Self {
            level,
            associativity,
        }
    }

    /// The entry used for operators nobody declared.
    pub const UNKNOWN: Self = Self::new(0, Associativity::Left);
}

/// Looks up an operator in the built-in table.
#[must_use]
pub fn default_precedence(op: &str) -> Option<Precedence> {
    use Associativity::{Left, Right};
    let (level, associativity) = match op {
        "=" => (0, Right),
        "|" | "|*" => (20, Left),
        "\\" | "*\\" => (20, Right),
        "->" => (30, Right),
        "||" | "&&" => (45, Left),
        "==" | "!=" | "<" | ">" | "<=" | ">=" | "~=" | "!~=" => (50, Left),
        ".." => (90, Left),
        "+" | "-" => (110, Left),
        "*" | "/" | "//" | "%" => (120, Left),
        "**" => (130, Right),
        "@" => (140, Left),
        "." => (200, Left),
        _ => return None,
    };
    Some(Precedence::new(level, associativity))
}

/// Precedence table of one compilation unit.
///
/// Entries added with [`OperatorTable::define`] shadow the built-in table.
/// The override map is persistent, so cloning a table to checkpoint it is
/// cheap.
#[derive(Clone, Debug, Default)]
pub struct OperatorTable {
    overrides: im::HashMap<String, Precedence>,
    version: u64,
}

impl OperatorTable {
    /// Creates a table with only the built-in operators.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Precedence of `op`: overrides first, then built-ins, then the default.
    #[must_use]
    pub fn lookup(&self, op: &str) -> Precedence {
        self.overrides
            .get(op)
            .copied()
            .or_else(|| default_precedence(op))
            .unwrap_or(Precedence::UNKNOWN)
    }

    /// Adds or replaces an operator entry.
    pub fn define(&mut self, op: impl Into<String>, precedence: Precedence) {
        self.overrides.insert(op.into(), precedence);
        self.version += 1;
    }

    /// Returns true if `op` was defined in this unit.
    #[must_use]
    pub fn is_defined(&self, op: &str) -> bool {
        self.overrides.contains_key(op)
    }

    /// Counter bumped by every definition.
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }
}

/// Folds operator runs into binary-operation nodes.
///
/// Trivia in `nodes` is skipped.
///
/// # Errors
/// Fails when an operator is missing an operand.
pub fn parse_operators(
    nodes: &[Node],
    lookup: impl Fn(&str) -> Precedence,
) -> Result<Vec<Node>> {
    Ok(parse_operators_counted(nodes, lookup)?
        .into_iter()
        .map(|(node, _)| node)
        .collect())
}

/// Like [`parse_operators`], also returning how many input nodes each
/// output node was folded from.
///
/// # Errors
/// Fails when an operator is missing an operand.
pub fn parse_operators_counted(
    nodes: &[Node],
    lookup: impl Fn(&str) -> Precedence,
) -> Result<Vec<(Node, usize)>> {
    let mut output: Vec<(Node, usize)> = Vec::new();
    let mut pending: Vec<Node> = Vec::new();
    let mut last_was_operator = true;

    for node in nodes.iter().filter(|n| n.is_regular()) {
        if let NodeKind::Operator(op) = &node.kind {
            let current = lookup(op);
            while let Some(top) = pending.last() {
                let top_prec = top.as_operator().map_or(Precedence::UNKNOWN, &lookup);
                let pops = top_prec.level > current.level
                    || (top_prec.level == current.level
                        && top_prec.associativity == Associativity::Left);
                if !pops {
                    break;
                }
                reduce(&mut output, &mut pending)?;
            }
            pending.push(node.clone());
            last_was_operator = true;
        } else {
            if !last_was_operator {
                while !pending.is_empty() {
                    reduce(&mut output, &mut pending)?;
                }
            }
            output.push((node.clone(), 1));
            last_was_operator = false;
        }
    }

    while !pending.is_empty() {
        reduce(&mut output, &mut pending)?;
    }
    Ok(output)
}

fn reduce(output: &mut Vec<(Node, usize)>, pending: &mut Vec<Node>) -> Result<()> {
    let Some(op) = pending.pop() else {
        return Ok(());
    };
    let symbol = op.as_operator().unwrap_or_default().to_string();
    let missing = || Error::syntax(format!("operator {symbol} is missing an operand")).at(op.span);
    let (right, right_width) = output.pop().ok_or_else(missing)?;
    let (left, left_width) = output.pop().ok_or_else(missing)?;
    output.push((
        Node::binop(left, symbol.clone(), right),
        left_width + 1 + right_width,
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::node::regular;
    use crate::tree::parse_source;

    fn parse(source: &str) -> Vec<Node> {
        parse_with(source, &OperatorTable::new())
    }

    fn parse_with(source: &str, table: &OperatorTable) -> Vec<Node> {
        let mut diag = Diagnostics::new();
        let nodes = regular(&parse_source(source, &mut diag).expect("builds"));
        parse_operators(&nodes, |op| table.lookup(op)).expect("parses")
    }

    /// Renders binary operations fully parenthesized.
    fn shape(node: &Node) -> String {
        match &node.kind {
            NodeKind::BinOp { left, op, right } => {
                format!("({} {op} {})", shape(left), shape(right))
            }
            _ => node.to_string(),
        }
    }

    fn shapes(source: &str) -> Vec<String> {
        parse(source).iter().map(shape).collect()
    }

    #[test]
    fn multiplication_binds_tighter() {
        assert_eq!(shapes("2 + 3 * 5"), vec!["(2 + (3 * 5))"]);
        assert_eq!(shapes("2 * 3 + 5 * 7"), vec!["((2 * 3) + (5 * 7))"]);
    }

    #[test]
    fn left_associative_chain() {
        assert_eq!(shapes("a - b - c"), vec!["((a - b) - c)"]);
    }

    #[test]
    fn right_associative_chains() {
        assert_eq!(shapes("a = b = c"), vec!["(a = (b = c))"]);
        assert_eq!(shapes("2 ** 3 ** 2"), vec!["(2 ** (3 ** 2))"]);
        assert_eq!(shapes("x -> y -> x"), vec!["(x -> (y -> x))"]);
    }

    #[test]
    fn assignment_has_lowest_precedence() {
        assert_eq!(shapes("x = a + b"), vec!["(x = (a + b))"]);
    }

    #[test]
    fn adjacent_operands_split_expressions() {
        assert_eq!(shapes("2 3 + 5 7"), vec!["2", "(3 + 5)", "7"]);
        assert_eq!(shapes("f a + b c"), vec!["f", "(a + b)", "c"]);
    }

    #[test]
    fn brackets_are_opaque_operands() {
        assert_eq!(shapes("2 * (3 + 5)"), vec!["(2 * (3 + 5))"]);
    }

    #[test]
    fn unknown_operators_default_to_zero_left() {
        assert_eq!(OperatorTable::new().lookup("<=>"), Precedence::UNKNOWN);
        assert_eq!(shapes("a <=> b <=> c"), vec!["((a <=> b) <=> c)"]);
    }

    #[test]
    fn overrides_shadow_defaults() {
        let mut table = OperatorTable::new();
        table.define("+", Precedence::new(130, Associativity::Right));
        let out: Vec<String> = parse_with("a + b + c * d", &table).iter().map(shape).collect();
        assert_eq!(out, vec!["(a + (b + (c * d)))"]);
        assert!(table.is_defined("+"));
        assert_eq!(table.version(), 1);
    }

    #[test]
    fn widths_count_input_nodes() {
        let mut diag = Diagnostics::new();
        let nodes = regular(&parse_source("x = 1 + 2 f", &mut diag).expect("builds"));
        let table = OperatorTable::new();
        let counted = parse_operators_counted(&nodes, |op| table.lookup(op)).expect("parses");
        let widths: Vec<usize> = counted.iter().map(|(_, w)| *w).collect();
        assert_eq!(widths, vec![5, 1]);
    }

    #[test]
    fn dangling_operator_is_an_error() {
        let mut diag = Diagnostics::new();
        let nodes = regular(&parse_source("1 +", &mut diag).expect("builds"));
        assert!(parse_operators(&nodes, |op| OperatorTable::new().lookup(op)).is_err());
    }
}
