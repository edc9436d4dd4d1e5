use std::path::Path;

use makrell_foundation::{Error, ErrorKind, Result};
use makrell_language::interp::{Dict, literal_to_value};
use makrell_language::literal::literal_value;
use makrell_language::node::regular;
use makrell_language::{Context, Diagnostics, Node, NodeKind, SequenceKind, Value, parse_source};

/// Head of an evaluated curly form.
pub const EXEC_MARKER: &str = "$";

/// MRON reader.
///
/// The evaluation context behind `{$ ...}` forms is created on first use
/// and shared by the rest of the document.
#[derive(Debug)]
pub struct Reader {
    allow_exec: bool,
    context: Option<Context>,
}

impl Default for Reader {
    fn default() -> Self {
        Self::new()
    }
}

impl Reader {
    /// A reader that evaluates `{$ ...}` forms.
    #[must_use]
    pub fn new() -> Self {
        Self {
            allow_exec: true,
            context: None,
        }
    }

    /// A reader treating `{$ ...}` as an ordinary mapping.
    #[must_use]
    pub fn data_only() -> Self {
        Self {
            allow_exec: false,
            context: None,
        }
    }

    /// Reads a document.
    ///
    /// # Errors
    /// See [`crate::parse_str`].
    pub fn parse_str(&mut self, text: &str) -> Result<Value> {
        let mut diagnostics = Diagnostics::new();
        let nodes = regular(&parse_source(text, &mut diagnostics)?);
        if diagnostics.has_errors() {
            let messages: Vec<String> = diagnostics.items().iter().map(ToString::to_string).collect();
            return Err(Error::new(ErrorKind::Diagnostics(messages.join("; "))));
        }
        match nodes.len() {
            0 => Ok(Value::None),
            1 => self.value(&nodes[0]),
            n if n % 2 == 0 => self.pairs(&nodes),
            n => Err(Error::new(ErrorKind::Data(format!(
                "Illegal number ({n}) of root level expressions"
            )))),
        }
    }

    /// Reads a document from a file.
    ///
    /// # Errors
    /// See [`crate::parse_file`].
    pub fn parse_file(&mut self, path: impl AsRef<Path>) -> Result<Value> {
        let text = std::fs::read_to_string(path)?;
        self.parse_str(&text)
    }

    fn value(&mut self, node: &Node) -> Result<Value> {
        match &node.kind {
            NodeKind::Identifier(name) => Ok(match name.as_str() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                "null" => Value::None,
                _ => Value::str(name),
            }),
            NodeKind::String { .. } | NodeKind::Number { .. } => {
                literal_to_value(literal_value(node)?).map_err(|e| Error::from(e).at(node.span))
            }
            NodeKind::Sequence(seq) => {
                let children = regular(&seq.nodes);
                match seq.kind {
                    SequenceKind::Square => {
                        let items = children
                            .iter()
                            .map(|child| self.value(child))
                            .collect::<Result<Vec<_>>>()?;
                        Ok(Value::list(items))
                    }
                    SequenceKind::Curly if self.is_exec(&children) => self.exec(&seq.nodes, node),
                    _ => self.pairs(&children),
                }
            }
            _ => Err(Error::new(ErrorKind::Data(format!("unexpected {}", node.variant_name())))
                .at(node.span)),
        }
    }

    fn is_exec(&self, children: &[Node]) -> bool {
        self.allow_exec
            && children.len() >= 2
            && children[0].is_identifier(EXEC_MARKER)
    }

    fn exec(&mut self, raw: &[Node], node: &Node) -> Result<Value> {
        let body: Vec<Node> = raw
            .iter()
            .skip_while(|n| !n.is_regular())
            .skip(1)
            .cloned()
            .collect();
        if self.context.is_none() {
            self.context = Some(Context::new()?);
        }
        let context = self
            .context
            .as_mut()
            .ok_or_else(|| Error::internal("no evaluation context"))?;
        context.eval_nodes(&body).map_err(|e| match e.span {
            Some(_) => e,
            None => e.at(node.span),
        })
    }

    fn pairs(&mut self, nodes: &[Node]) -> Result<Value> {
        if nodes.len() % 2 == 1 {
            let span = nodes[nodes.len() - 1].span;
            return Err(Error::new(ErrorKind::Data(format!(
                "odd number ({}) of nodes in mapping",
                nodes.len()
            )))
            .at(span));
        }
        let mut dict = Dict::new();
        for pair in nodes.chunks(2) {
            let key = self.value(&pair[0])?;
            let value = self.value(&pair[1])?;
            dict.insert(key, value).map_err(|e| Error::from(e).at(pair[0].span))?;
        }
        Ok(Value::dict(dict))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(text: &str) -> Value {
        Reader::new().parse_str(text).expect("reads")
    }

    #[test]
    fn empty_document_is_null() {
        assert_eq!(read("  "), Value::None);
        assert_eq!(read("# only a comment"), Value::None);
    }

    #[test]
    fn single_scalar() {
        assert_eq!(read(" 2 "), Value::Int(2));
        assert_eq!(read("\"hi\""), Value::str("hi"));
        assert_eq!(read("word"), Value::str("word"));
        assert_eq!(read("false"), Value::Bool(false));
    }

    #[test]
    fn suffixed_literals() {
        let joined = chrono::NaiveDate::from_ymd_opt(1996, 5, 12)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .expect("valid date");
        assert_eq!(read("\"1996-05-12\"dt"), Value::DateTime(joined));
        assert_eq!(read("2k"), Value::Int(2000));
    }

    #[test]
    fn odd_root_count_is_rejected() {
        let err = Reader::new().parse_str("2 3 5").expect_err("odd");
        assert!(matches!(
            err.kind,
            ErrorKind::Data(ref m) if m == "Illegal number (3) of root level expressions"
        ));
    }

    #[test]
    fn root_pairs_and_nesting() {
        let value = read("a 2 b { c [1 \"x\"] }");
        assert_eq!(value.to_string(), "{\"a\": 2, \"b\": {\"c\": [1, \"x\"]}}");
    }

    #[test]
    fn odd_mapping_is_rejected() {
        assert!(Reader::new().parse_str("a {b}").is_err());
    }

    #[test]
    fn exec_forms_evaluate() {
        assert_eq!(read("{$ 2 + 3}"), Value::Int(5));
        assert_eq!(read("n {$ [1 2 3] |* {* 10}}").to_string(), "{\"n\": [10, 20, 30]}");
    }

    #[test]
    fn exec_shares_one_context() {
        assert_eq!(read("a {$ k = 4 k} b {$ k * 2}").to_string(), "{\"a\": 4, \"b\": 8}");
    }

    #[test]
    fn data_only_reads_exec_as_mapping() {
        let value = Reader::data_only().parse_str("{$ x}").expect("reads");
        assert_eq!(value.to_string(), "{\"$\": \"x\"}");
    }

    #[test]
    fn bracket_errors_are_reported() {
        assert!(Reader::new().parse_str("a [1 2)").is_err());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn key() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_]{0,8}".prop_filter("reserved words", |k| {
            !matches!(k.as_str(), "true" | "false" | "null")
        })
    }

    proptest! {
        #[test]
        fn pairs_read_as_mappings(entries in prop::collection::vec((key(), -500i64..500), 1..10)) {
            let text = entries
                .iter()
                .map(|(k, v)| format!("{k} {v}"))
                .collect::<Vec<_>>()
                .join("\n");
            let value = Reader::data_only().parse_str(&text).expect("reads");
            let Value::Dict(dict) = value else {
                return Err(TestCaseError::fail("not a mapping"));
            };
            let dict = dict.borrow();
            for (k, _) in &entries {
                let last = entries.iter().rev().find(|(other, _)| other == k).map(|(_, v)| *v);
                let found = dict.get(&Value::str(k)).expect("hashable");
                prop_assert_eq!(found, last.map(Value::Int));
            }
        }

        #[test]
        fn lists_keep_order(items in prop::collection::vec(-500i64..500, 0..12)) {
            let text = format!("[{}]", items.iter().map(ToString::to_string).collect::<Vec<_>>().join(" "));
            let value = Reader::data_only().parse_str(&text).expect("reads");
            let expected = Value::list(items.into_iter().map(Value::Int).collect());
            prop_assert_eq!(value, expected);
        }
    }
}
