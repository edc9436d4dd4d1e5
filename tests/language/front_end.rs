//! Integration tests for lexing, bracket trees and operator parsing

use makrell_language::{
    Associativity, Diagnostics, OperatorTable, Precedence, SequenceKind, parse_source, tokenize,
};

// =============================================================================
// Lexer
// =============================================================================

#[test]
fn tokens_cover_the_whole_source() {
    let source = "{fun f [x] x + 1} # trailing\n\"s\"dt 2.5e3k";
    let tokens = tokenize(source).unwrap();
    let joined: String = tokens.iter().map(|t| t.text(source)).collect();
    assert_eq!(joined, source);
}

#[test]
fn unterminated_strings_fail_to_lex() {
    assert!(tokenize("\"open").is_err());
}

// =============================================================================
// Bracket trees
// =============================================================================

#[test]
fn brackets_nest() {
    let mut diag = Diagnostics::new();
    let nodes = parse_source("a (b [c {d}])", &mut diag).unwrap();
    assert!(diag.is_empty());
    let regular: Vec<_> = nodes.iter().filter(|n| n.is_regular()).collect();
    assert_eq!(regular.len(), 2);
    let round = regular[1].as_sequence_of(SequenceKind::Round).unwrap();
    assert_eq!(round.regular().len(), 2);
}

#[test]
fn original_text_is_preserved() {
    let source = "{fun f [x y]\n    # comment\n    x + y}";
    let mut diag = Diagnostics::new();
    let nodes = parse_source(source, &mut diag).unwrap();
    assert_eq!(nodes[0].original_text(), source);
}

#[test]
fn mismatched_brackets_are_errors() {
    let mut diag = Diagnostics::new();
    assert!(parse_source("(a]", &mut diag).is_err());
}

#[test]
fn open_brackets_are_incomplete_input() {
    let mut diag = Diagnostics::new();
    parse_source("{f [1 2", &mut diag).unwrap();
    assert!(diag.is_incomplete());
}

// =============================================================================
// Operator table
// =============================================================================

#[test]
fn defined_operators_shadow_builtins() {
    let mut table = OperatorTable::new();
    assert_eq!(table.lookup("+").level, 110);
    table.define("+", Precedence::new(5, Associativity::Right));
    assert_eq!(table.lookup("+"), Precedence::new(5, Associativity::Right));
    assert!(table.is_defined("+"));
}

#[test]
fn undeclared_operators_get_the_default() {
    let table = OperatorTable::new();
    assert_eq!(table.lookup("<=>"), Precedence::UNKNOWN);
}
