//! Integration tests for compile errors and diagnostics

use makrell_foundation::ErrorKind;
use makrell_language::{Context, Severity};

fn compile_err(source: &str) -> makrell_foundation::Error {
    Context::bare().compile_source(source).unwrap_err()
}

#[test]
fn recoverable_problems_become_diagnostics() {
    let mut ctx = Context::bare();
    let err = ctx.compile_source("x = 1\n{if}").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Diagnostics(_)));

    let items = ctx.diagnostics().items();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].severity, Severity::Error);
    assert!(items[0].message.contains("No arguments to if."));
    assert_eq!(items[0].span.map(|s| s.line), Some(2));
}

#[test]
fn diagnostics_can_be_drained() {
    let mut ctx = Context::bare();
    assert!(ctx.compile_source("{when}").is_err());
    let taken = ctx.take_diagnostics();
    assert!(taken.has_errors());
    assert!(ctx.diagnostics().is_empty());
    assert!(ctx.compile_source("{when true 1}").is_ok());
}

#[test]
fn unknown_operators_are_fatal() {
    let err = compile_err("1 <~> 2");
    assert!(matches!(err.kind, ErrorKind::UnknownOperator(ref op) if op == "<~>"));
    assert!(err.span.is_some());
}

#[test]
fn lambda_parameters_must_be_names() {
    let err = compile_err("2 -> 3");
    assert!(matches!(err.kind, ErrorKind::InvalidLambdaParams(_)));
}

#[test]
fn fixed_arity_forms_reject_extra_arguments() {
    for source in ["{not}", "{while}", "{del}", "{assert}"] {
        let err = compile_err(source);
        assert!(matches!(err.kind, ErrorKind::Arity { .. }), "{source}: {err}");
    }
}

#[test]
fn unbalanced_source_is_incomplete_or_invalid() {
    let mut ctx = Context::bare();
    assert!(ctx.eval_source("{fun f [x]").unwrap_err().is_incomplete_input());
    assert!(!ctx.eval_source("[1 2)").unwrap_err().is_incomplete_input());
}

#[test]
fn runtime_errors_name_their_class() {
    let mut ctx = Context::bare();
    let err = ctx.eval_source("undefined_name + 1").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Uncaught { ref class, .. } if class == "NameError"));
    let err = ctx.eval_source("1 / 0").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Uncaught { ref class, .. } if class == "ZeroDivisionError"));
}
