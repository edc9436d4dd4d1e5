//! Integration tests for special forms

use std::rc::Rc;

use makrell_foundation::ErrorKind;
use makrell_language::{Context, ContextConfig, MemoryLoader, MemoryResolver, Value, pretty_print};

fn eval(source: &str) -> Value {
    Context::new().unwrap().eval_source(source).unwrap()
}

// =============================================================================
// Control flow
// =============================================================================

#[test]
fn if_chains() {
    assert_eq!(eval("x = 5 {if x > 3 \"big\" \"small\"}").to_string(), "big");
    assert_eq!(eval("{if false 1 false 2 3}"), Value::Int(3));
    assert!(eval("{if false 1}").is_none());
}

#[test]
fn when_and_unless() {
    assert_eq!(eval("x = 1 {when x > 0 x = 10} x"), Value::Int(10));
    assert_eq!(eval("x = 1 {unless x > 0 x = 10} x"), Value::Int(1));
}

#[test]
fn loops() {
    assert_eq!(eval("n = 0 i = 0 {while i < 4 i = i + 1 n = n + i} n"), Value::Int(10));
    let source = "out = [] {for x [1 2 3] {out.append x * x}} out";
    assert_eq!(eval(source).to_string(), "[1, 4, 9]");
}

#[test]
fn do_blocks_yield_their_last_value() {
    assert_eq!(eval("y = {do a = 6 a * 7} y"), Value::Int(42));
}

// =============================================================================
// Definitions
// =============================================================================

#[test]
fn classes_with_methods() {
    let source = r#"
        {class Point []
            {fun __init__ [self x y]
                self.x = x
                self.y = y}
            {fun sum [self] self.x + self.y}}
        p = {Point 3 4}
        {p.sum}
    "#;
    assert_eq!(eval(source), Value::Int(7));
}

#[test]
fn generators() {
    let source = "{fun evens [n] {for i {range n} {when i % 2 == 0 {yield i}}}} {list {evens 7}}";
    assert_eq!(eval(source).to_string(), "[0, 2, 4, 6]");
}

#[test]
fn collections() {
    assert_eq!(eval("{dict \"a\" 1 \"b\" 2}").to_string(), "{\"a\": 1, \"b\": 2}");
    assert_eq!(eval("{len {set 1 2 2 3}}"), Value::Int(3));
}

// =============================================================================
// Exceptions
// =============================================================================

#[test]
fn try_catch_finally() {
    let source = r#"
        log = []
        {try
            {raise {ValueError "bad"}}
            {catch e:ValueError {log.append e.args@0}}
            {finally {log.append "done"}}}
        log
    "#;
    assert_eq!(eval(source).to_string(), "[\"bad\", \"done\"]");
}

#[test]
fn uncaught_exceptions_surface_as_errors() {
    let err = Context::new()
        .unwrap()
        .eval_source("{raise {KeyError \"k\"}}")
        .unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Uncaught { ref class, .. } if class == "KeyError"));
}

#[test]
fn try_clauses_must_be_ordered() {
    let err = Context::bare()
        .compile_source("{try a {finally b} {catch c}}")
        .unwrap_err();
    assert!(matches!(err.kind, ErrorKind::TryClauseOrder { .. }));
}

// =============================================================================
// Modules and includes
// =============================================================================

#[test]
fn native_module_imports() {
    assert_eq!(eval("{import math@[sqrt]} {sqrt 25}"), Value::Float(5.0));
    assert_eq!(eval("{import math} {math.floor 2.7}"), Value::Int(2));
}

#[test]
fn resolved_module_imports() {
    let resolver = MemoryResolver::new();
    resolver.add("shapes", "{fun area [w h] w * h} unit = 1");
    let mut ctx = Context::new().unwrap();
    ctx.set_resolver(resolver);
    assert_eq!(ctx.eval_source("{import shapes} {shapes.area 3 4}").unwrap(), Value::Int(12));
    assert_eq!(ctx.eval_source("{import shapes@[unit]} unit").unwrap(), Value::Int(1));
}

#[test]
fn includes_splice_source() {
    let loader = MemoryLoader::new();
    loader.add("src/lib.mr", "{fun twice [x] x * 2}");
    let config = ContextConfig::new().with_source_path("src/main.mr");
    let mut ctx = Context::with_config(config).unwrap();
    ctx.set_loader(Rc::new(loader));
    assert_eq!(ctx.eval_source("{include \"lib.mr\"} {twice 21}").unwrap(), Value::Int(42));
}

// =============================================================================
// Code generation
// =============================================================================

#[test]
fn programs_pretty_print() {
    let mut ctx = Context::bare();
    let unit = ctx.compile_source("x = 2 + 3").unwrap();
    assert_eq!(pretty_print(&unit.program), "x = (2 + 3)");
    let unit = ctx.compile_source("{fun f [a] a}").unwrap();
    assert!(pretty_print(&unit.program).starts_with("fun f(a):"));
}
