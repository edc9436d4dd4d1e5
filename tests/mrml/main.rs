//! Integration tests for Layer 2: MRML
//!
//! Reads markup documents and compares their XML rendering.

use makrell_mrml::{Reader, parse_file, parse_str, parse_to_xml};

fn to_xml(source: &str) -> String {
    parse_to_xml(source, false).unwrap()
}

#[test]
fn bare_elements_self_close() {
    assert_eq!(to_xml("{a}"), "<a />");
}

#[test]
fn text_content() {
    assert_eq!(to_xml("{a 2}"), "<a>2</a>");
    assert_eq!(to_xml("{a b 2 b 2}"), "<a>b 2 b 2</a>");
}

#[test]
fn mixed_content() {
    assert_eq!(
        to_xml(r#"{a b()2")" {c d 3}"asd"}"#),
        "<a>b()2) <c>d 3</c>asd</a>"
    );
}

#[test]
fn attributes() {
    assert_eq!(to_xml(r#"{a [b="2" c=3]}"#), r#"<a b="2" c="3" />"#);
}

#[test]
fn attributes_then_content() {
    assert_eq!(to_xml(r#"{a [b="2" c=3] a"b"}"#), r#"<a b="2" c="3">ab</a>"#);
}

#[test]
fn evaluated_content() {
    let xml = parse_to_xml("{a {$ [2 3 5 7] | sum}}", true).unwrap();
    assert_eq!(xml, "<a>17</a>");
}

#[test]
fn evaluated_attributes() {
    let xml = parse_to_xml("{a [b = {$ [2 3 5 7] | sum}] asd}", true).unwrap();
    assert_eq!(xml, r#"<a b="17">asd</a>"#);
}

#[test]
fn element_tree_access() {
    let root = parse_str(r#"{ul [id=menu] {li one} {li "two"}}"#).unwrap();
    assert_eq!(root.name(), "ul");
    assert_eq!(root.attribute("id"), Some("menu"));
    let items: Vec<String> = root.children().map(|li| li.text()).collect();
    assert_eq!(items, ["one", "two"]);
}

#[test]
fn failing_evaluation_is_an_error() {
    assert!(Reader::with_exec().parse_str("{a {$ missing}}").is_err());
    assert!(Reader::with_exec().parse_str("{a {$ 1 / 0}}").is_err());
}

#[test]
fn bracket_errors_are_reported() {
    assert!(parse_str("{a [b)}").is_err());
    assert!(parse_str("{a").is_err());
}

#[test]
fn files_are_read() {
    let dir = std::env::temp_dir().join(format!("makrell-mrml-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("page.mrml");
    std::fs::write(&path, "{page {title Home}}").unwrap();
    assert_eq!(parse_file(&path).unwrap().to_xml(), "<page><title>Home</title></page>");
    std::fs::remove_dir_all(&dir).unwrap();
}
