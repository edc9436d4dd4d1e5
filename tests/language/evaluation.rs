//! Integration tests for evaluating Makrell source

use makrell_language::{Context, Value};

fn eval(source: &str) -> Value {
    Context::new().unwrap().eval_source(source).unwrap()
}

fn shown(source: &str) -> String {
    eval(source).to_string()
}

// =============================================================================
// Scalars
// =============================================================================

#[test]
fn eval_scalars() {
    assert_eq!(eval("2"), Value::Int(2));
    assert_eq!(eval("-3"), Value::Int(-3));
    assert_eq!(eval("2.5"), Value::Float(2.5));
    assert_eq!(eval("true"), Value::Bool(true));
    assert_eq!(eval("false"), Value::Bool(false));
    assert!(eval("null").is_none());
    assert_eq!(shown("\"hello\""), "hello");
}

#[test]
fn eval_suffixed_literals() {
    assert_eq!(eval("3k"), Value::Int(3000));
    assert_eq!(eval("\"ff\"hex"), Value::Int(255));
    assert_eq!(eval("2pi"), Value::Float(2.0 * std::f64::consts::PI));
    let Value::DateTime(when) = eval("\"2024-03-01T12:30:00\"dt") else {
        panic!("Expected DateTime");
    };
    assert_eq!(when.to_string(), "2024-03-01 12:30:00");
}

#[test]
fn eval_string_interpolation() {
    assert_eq!(shown("x = 4 \"x={x} y={x * 2}\"e"), "x=4 y=8");
}

// =============================================================================
// Sequences
// =============================================================================

#[test]
fn eval_lists_and_tuples() {
    assert_eq!(shown("[]"), "[]");
    assert_eq!(shown("[2 3 + 5 7]"), "[2, 8, 7]");
    assert_eq!(shown("[[1 2] [3]]"), "[[1, 2], [3]]");
    assert_eq!(shown("(1 2)"), "(1, 2)");
    assert!(eval("()").is_none());
    assert_eq!(eval("(((4)))"), Value::Int(4));
}

#[test]
fn eval_indexing_and_slicing() {
    assert_eq!(eval("xs = [5 6 7 8] xs@2"), Value::Int(7));
    assert_eq!(shown("xs = [5 6 7 8] xs@(1..3)"), "[6, 7]");
    assert_eq!(shown("[1 2 3 4]@{slice 1 null 2}"), "[2, 4]");
}

// =============================================================================
// Operators
// =============================================================================

#[test]
fn eval_arithmetic_precedence() {
    assert_eq!(eval("2 + 3 * 5"), Value::Int(17));
    assert_eq!(eval("(2 + 3) * 5"), Value::Int(25));
    assert_eq!(eval("2 ** 3 ** 2"), Value::Int(512));
    assert_eq!(eval("7 // 2"), Value::Int(3));
    assert_eq!(eval("7 % 4"), Value::Int(3));
    assert_eq!(eval("1 / 4"), Value::Float(0.25));
}

#[test]
fn eval_comparisons() {
    assert_eq!(eval("2 < 3"), Value::Bool(true));
    assert_eq!(eval("2 >= 3"), Value::Bool(false));
    assert_eq!(eval("\"a\" == \"a\""), Value::Bool(true));
    assert_eq!(eval("[1 2] != [1 2]"), Value::Bool(false));
}

#[test]
fn eval_logic() {
    assert_eq!(eval("true && false"), Value::Bool(false));
    assert_eq!(eval("false || 7"), Value::Int(7));
    assert_eq!(eval("{not []}"), Value::Bool(true));
    assert_eq!(eval("{not 1}"), Value::Bool(false));
}

#[test]
fn eval_pipes_and_maps() {
    assert_eq!(eval("f = x -> x * 2 3 | f"), Value::Int(6));
    assert_eq!(eval("f = x -> x * 2 f \\ 4"), Value::Int(8));
    assert_eq!(shown("[1 2 3] |* {+ 10}"), "[11, 12, 13]");
    assert_eq!(shown("{* 3} *\\ [1 2]"), "[3, 6]");
}

#[test]
fn eval_pattern_matching() {
    assert_eq!(eval("[1 [2 3]] ~= [1 [_ 3]]"), Value::Bool(true));
    assert_eq!(eval("[1 2] ~= [_]"), Value::Bool(false));
    assert_eq!(eval("\"x\" !~= 5"), Value::Bool(true));
}

// =============================================================================
// Functions
// =============================================================================

#[test]
fn eval_recursion() {
    let source = "{fun fib [n] {if n < 2 n {fib n - 1} + {fib n - 2}}} {fib 15}";
    assert_eq!(eval(source), Value::Int(610));
}

#[test]
fn eval_closures_capture_their_scope() {
    let source = r#"
        {fun counter []
            n = [0]
            {fun [] n@0 = n@0 + 1 n@0}}
        c = {counter}
        {c} {c} {c}
    "#;
    assert_eq!(eval(source), Value::Int(3));
}

#[test]
fn eval_partial_application_and_keywords() {
    assert_eq!(eval("{fun f [a b] a - b} g = {f _ 1} {g 10}"), Value::Int(9));
    assert_eq!(eval("{fun f [a b] a - b} {f b=1 a=10}"), Value::Int(9));
}

#[test]
fn eval_builtins() {
    assert_eq!(eval("{len \"hello\"}"), Value::Int(5));
    assert_eq!(eval("{sum {range 5}}"), Value::Int(10));
    assert_eq!(shown("{sorted [3 1 2]}"), "[1, 2, 3]");
    assert_eq!(shown("{\"hello\".upper}"), "HELLO");
    assert_eq!(eval("{max 3 9 4}"), Value::Int(9));
}

#[test]
fn runtime_bindings_persist_across_evaluations() {
    let mut ctx = Context::new().unwrap();
    ctx.eval_source("total = 40").unwrap();
    ctx.eval_source("{fun bump [] total + 2}").unwrap();
    assert_eq!(ctx.eval_source("{bump}").unwrap(), Value::Int(42));
}

#[test]
fn print_output_is_captured() {
    let mut ctx = Context::new().unwrap();
    ctx.eval_source("{print \"a\" 1} {print [2]}").unwrap();
    assert_eq!(ctx.take_output(), ["a 1", "[2]"]);
    assert!(ctx.take_output().is_empty());
}

mod properties {
    use makrell_language::{Context, Value};
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn integer_arithmetic_matches_host(a in -1000i64..1000, b in -1000i64..1000, c in 1i64..50) {
            let source = format!("({a}) + ({b}) * {c} - {c}");
            let value = Context::bare().eval_source(&source).unwrap();
            prop_assert_eq!(value, Value::Int(a + b * c - c));
        }

        #[test]
        fn lists_keep_their_items(items in prop::collection::vec(-99i64..99, 0..12)) {
            let source = format!("[{}]", items.iter().map(ToString::to_string).collect::<Vec<_>>().join(" "));
            let expected = format!("[{}]", items.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "));
            let value = Context::bare().eval_source(&source).unwrap();
            prop_assert_eq!(value.to_string(), expected);
        }
    }
}
