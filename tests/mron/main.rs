//! Integration tests for Layer 2: MRON
//!
//! Reads whole documents through the public entry points.

use chrono::NaiveDate;
use makrell_foundation::ErrorKind;
use makrell_language::Value;
use makrell_mron::{Reader, parse_file, parse_str};

fn field(value: &Value, key: &str) -> Value {
    let Value::Dict(dict) = value else {
        panic!("Expected Dict, got {value}");
    };
    dict.borrow().get(&Value::str(key)).unwrap().unwrap()
}

#[test]
fn empty_documents_are_null() {
    assert!(parse_str("  ").unwrap().is_none());
    assert!(parse_str("# only a comment\n").unwrap().is_none());
}

#[test]
fn single_root_values() {
    assert_eq!(parse_str(" 2 ").unwrap(), Value::Int(2));
    assert_eq!(parse_str("[]").unwrap().to_string(), "[]");
    assert_eq!(parse_str("[2 3 5]").unwrap().to_string(), "[2, 3, 5]");
}

#[test]
fn odd_root_counts_are_rejected() {
    let err = parse_str("2 3 5").unwrap_err();
    let ErrorKind::Data(message) = &err.kind else {
        panic!("Expected Data error, got {err}");
    };
    assert_eq!(message, "Illegal number (3) of root level expressions");
}

#[test]
fn root_pairs_form_a_mapping() {
    assert_eq!(parse_str("a 2 b 3").unwrap().to_string(), "{\"a\": 2, \"b\": 3}");
    assert_eq!(
        parse_str("a [2 3 \"æ\"]").unwrap().to_string(),
        "{\"a\": [2, 3, \"æ\"]}"
    );
}

#[test]
fn nested_mappings() {
    let source = r#"
        f {
            g [2]
            h "asd"
        }
    "#;
    assert_eq!(
        parse_str(source).unwrap().to_string(),
        "{\"f\": {\"g\": [2], \"h\": \"asd\"}}"
    );
}

#[test]
fn unicode_keys_and_dates() {
    let source = r#"
    a 2
    b [3 5 "7"]
    c {
        "d x" 11
        "e æ" 13.17
        f {
            g []
            h "asd"
            ø2 qweÆØÅ
            生年月日 "1996-05-12"dt
        }
    }
    "#;
    let doc = parse_str(source).unwrap();
    assert_eq!(field(&doc, "a"), Value::Int(2));
    assert_eq!(field(&doc, "b").to_string(), "[3, 5, \"7\"]");
    let c = field(&doc, "c");
    assert_eq!(field(&c, "d x"), Value::Int(11));
    assert_eq!(field(&c, "e æ"), Value::Float(13.17));
    let f = field(&c, "f");
    assert_eq!(field(&f, "ø2").to_string(), "qweÆØÅ");
    let born = NaiveDate::from_ymd_opt(1996, 5, 12)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    assert_eq!(field(&f, "生年月日"), Value::DateTime(born));
}

#[test]
fn dates_with_times() {
    let doc = parse_str("Født \"1996-05-12 13:47\"dt").unwrap();
    let born = NaiveDate::from_ymd_opt(1996, 5, 12)
        .unwrap()
        .and_hms_opt(13, 47, 0)
        .unwrap();
    assert_eq!(field(&doc, "Født"), Value::DateTime(born));
}

#[test]
fn exec_blocks_evaluate_code() {
    let doc = parse_str("a 2\nb {$ 2 + 3 }").unwrap();
    assert_eq!(field(&doc, "b"), Value::Int(5));
}

#[test]
fn data_only_readers_keep_exec_blocks_as_data() {
    let doc = Reader::data_only().parse_str("b {$ x}").unwrap();
    assert_eq!(field(&field(&doc, "b"), "$").to_string(), "x");
}

#[test]
fn files_are_read_from_disk() {
    let path = std::env::temp_dir().join(format!("makrell-mron-{}.mron", std::process::id()));
    std::fs::write(&path, "name \"demo\"\nsize 3k").unwrap();
    let doc = parse_file(&path).unwrap();
    assert_eq!(field(&doc, "size"), Value::Int(3000));
    std::fs::remove_file(&path).ok();
    assert!(parse_file(&path).is_err());
}
