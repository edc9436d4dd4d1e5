//! Integration tests for the meta engine: quoting, macros and operators

use makrell_foundation::ErrorKind;
use makrell_language::{Context, ContextConfig, MemoryResolver, Value};

fn eval(source: &str) -> Value {
    Context::new().unwrap().eval_source(source).unwrap()
}

// =============================================================================
// Quoting
// =============================================================================

#[test]
fn quote_returns_nodes() {
    assert_eq!(eval("{node_name {quote a + 1}}").to_string(), "BinOp");
    assert_eq!(eval("{quote {f [x] x * 2}}").to_string(), "{f [x] x * 2}");
}

#[test]
fn unquote_splices_values_and_lists() {
    assert_eq!(eval("n = 2 {quote [{$ n * 10} 1]}").to_string(), "[20 1]");
    assert_eq!(eval("xs = [7 8] {quote {g {unquote xs}}}").to_string(), "{g 7 8}");
}

#[test]
fn quoted_code_evaluates() {
    let mut ctx = Context::new().unwrap();
    let Value::Node(node) = ctx.eval_source("{quote 6 * 7}").unwrap() else {
        panic!("Expected Node");
    };
    assert_eq!(ctx.eval_nodes(&[(*node).clone()]).unwrap(), Value::Int(42));
}

// =============================================================================
// Macros
// =============================================================================

#[test]
fn macros_rewrite_syntax() {
    let source = r#"
        {def macro flip [ns]
            ns = {operator_parse {regular ns}}
            {quote {$ ns@1} - {$ ns@0}}}
        {flip 2 50}
    "#;
    assert_eq!(eval(source), Value::Int(48));
}

#[test]
fn macros_see_unparsed_nodes() {
    let source = "{macro count [ns] {len {regular ns}}} {count 1 + 2 x}";
    assert_eq!(eval(source), Value::Int(4));
}

#[test]
fn meta_blocks_define_compile_time_values() {
    let mut ctx = Context::new().unwrap();
    ctx.eval_source("{meta limit = 3}").unwrap();
    assert!(ctx.is_meta_symbol("limit"));
    assert_eq!(ctx.eval_source("limit * 2").unwrap(), Value::Int(6));
}

#[test]
fn runaway_expansion_is_stopped() {
    let config = ContextConfig::new().with_max_expansion_depth(8);
    let mut ctx = Context::with_config(config).unwrap();
    let err = ctx
        .eval_source("{macro again [ns] {quote {again}}} {again}")
        .unwrap_err();
    assert!(matches!(err.kind, ErrorKind::ExpansionDepth(8)));
}

#[test]
fn gensyms_are_unique() {
    let ctx = Context::bare();
    let a = ctx.gensym();
    let b = ctx.gensym();
    assert_ne!(a, b);
    assert!(a.starts_with("__gensym_"));
}

// =============================================================================
// Operators
// =============================================================================

#[test]
fn defined_operators_apply_to_later_code() {
    let source = "{def operator <> 110 [$left $right]} 1 <> 2 <> 3";
    assert_eq!(eval(source).to_string(), "[[1, 2], 3]");
    let source = "{def operator <> 110 rightassoc [$left $right]} 1 <> 2 <> 3";
    assert_eq!(eval(source).to_string(), "[1, [2, 3]]");
}

#[test]
fn operator_precedence_is_respected() {
    let source = "{def operator ** 50 $left + $right} 2 * 3 ** 4";
    assert_eq!(eval(source), Value::Int(10));
}

#[test]
fn prelude_operators_and_macros() {
    assert_eq!(eval("f = {* 3} >> {- 1} {f 4}"), Value::Int(-11));
    assert_eq!(eval("x = 0 {unless x > 1 x = 5} x"), Value::Int(5));
}

#[test]
fn importm_brings_macros_and_operators() {
    let resolver = MemoryResolver::new();
    resolver.add(
        "syntax",
        "{def operator %+ 110 $left * 100 + $right} {macro first [ns] {regular ns}@0}",
    );
    let mut ctx = Context::new().unwrap();
    ctx.set_resolver(resolver);
    assert_eq!(ctx.eval_source("{importm syntax} 3 %+ 4").unwrap(), Value::Int(304));
    assert_eq!(ctx.eval_source("{first 9 10}").unwrap(), Value::Int(9));
}

#[test]
fn checkpoints_undo_meta_definitions() {
    let mut ctx = Context::new().unwrap();
    let saved = ctx.checkpoint();
    ctx.eval_source("{def operator +++ 110 $left + $right}").unwrap();
    assert!(ctx.is_meta_symbol("+++"));
    ctx.restore(saved);
    assert!(!ctx.is_meta_symbol("+++"));
    assert!(ctx.compile_source("1 +++ 2").is_err());
}
