//! Sessions resolving modules from disk

use std::fs;

use makrell_foundation::ErrorKind;
use makrell_language::Value;
use makrell_runtime::{CACHE_EXTENSION, Session, SessionConfig};

use crate::scratch_dir;

#[test]
fn imports_resolve_against_roots() {
    let dir = scratch_dir("imports");
    fs::write(dir.join("geometry.mr"), "{fun area [w h] w * h}").unwrap();
    let mut session = Session::new(SessionConfig::new().with_root(&dir)).unwrap();

    let evaluation = session.eval("{import geometry} {geometry.area 6 7}").unwrap();
    assert_eq!(evaluation.value, Value::Int(42));
    assert!(dir.join(format!("geometry.{CACHE_EXTENSION}")).is_file());
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn cached_units_are_reused_by_new_sessions() {
    let dir = scratch_dir("reuse");
    fs::write(dir.join("consts.mr"), "answer = 6 * 7").unwrap();
    let first = Session::new(SessionConfig::new().with_root(&dir)).unwrap();
    let unit = first.resolver().resolve("consts").unwrap();

    let mut second = Session::new(SessionConfig::new().with_root(&dir)).unwrap();
    assert_eq!(*second.resolver().resolve("consts").unwrap(), *unit);
    let value = second.eval("{import consts@[answer]} answer").unwrap().value;
    assert_eq!(value, Value::Int(42));
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn uncached_sessions_leave_no_files() {
    let dir = scratch_dir("nocache");
    fs::write(dir.join("m.mr"), "x = 1").unwrap();
    let mut session = Session::new(SessionConfig::new().with_root(&dir).without_cache()).unwrap();
    session.eval("{import m}").unwrap();
    assert!(!dir.join(format!("m.{CACHE_EXTENSION}")).exists());
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn importm_loads_macros_from_files() {
    let dir = scratch_dir("importm");
    fs::write(
        dir.join("sugar.mr"),
        "{def macro square [ns] ns = {operator_parse {regular ns}} {quote {$ ns@0} * {$ ns@0}}}",
    )
    .unwrap();
    let mut session = Session::new(SessionConfig::new().with_root(&dir)).unwrap();
    session.eval("{importm sugar}").unwrap();
    assert_eq!(session.eval("{square 9}").unwrap().value, Value::Int(81));
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn missing_modules_raise_import_errors() {
    let dir = scratch_dir("missing");
    let mut session = Session::new(SessionConfig::new().with_root(&dir)).unwrap();
    let err = session.eval("{import nowhere}").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Uncaught { ref class, .. } if class == "ImportError"));
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn files_run_next_to_their_modules() {
    let dir = scratch_dir("files");
    fs::write(dir.join("helpers.mr"), "{fun greet [n] \"hi \" + n}").unwrap();
    fs::write(dir.join("main.mr"), "{import helpers} {print {helpers.greet \"bob\"}} 7").unwrap();
    let main = dir.join("main.mr");
    let mut session = Session::new(SessionConfig::new().with_source_path(&main)).unwrap();

    let evaluation = session.eval_file(&main).unwrap();
    assert_eq!(evaluation.value, Value::Int(7));
    assert_eq!(evaluation.output, ["hi bob"]);
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn emitting_attaches_the_program() {
    let mut session = Session::new(SessionConfig::new().without_cache().with_emit()).unwrap();
    let evaluation = session.eval("y = 1 + 1").unwrap();
    assert_eq!(evaluation.program.as_deref(), Some("y = (1 + 1)"));
}
