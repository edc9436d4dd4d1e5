//! The REPL driven by a scripted editor

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use makrell_foundation::Result;
use makrell_language::Value;
use makrell_runtime::editor::{LineEditor, ReadResult, is_complete};
use makrell_runtime::repl::Response;
use makrell_runtime::{Repl, Session, SessionConfig};

struct Script {
    lines: VecDeque<String>,
    history: Rc<RefCell<Vec<String>>>,
}

impl Script {
    fn new(lines: &[&str]) -> Self {
        Self {
            lines: lines.iter().map(ToString::to_string).collect(),
            history: Rc::default(),
        }
    }
}

impl LineEditor for Script {
    fn read_line(&mut self, _prompt: &str) -> Result<ReadResult> {
        Ok(self.lines.pop_front().map_or(ReadResult::Eof, ReadResult::Line))
    }

    fn add_history(&mut self, line: &str) {
        self.history.borrow_mut().push(line.to_string());
    }
}

fn repl(lines: &[&str]) -> Repl<Script> {
    scripted(Script::new(lines))
}

fn scripted(script: Script) -> Repl<Script> {
    let session = Session::new(SessionConfig::new().without_cache()).unwrap();
    Repl::with_editor(script, session).without_banner()
}

/// Response text without ANSI styling.
fn text(response: Response) -> String {
    let Response::Continue(styled) = response else {
        panic!("unexpected quit");
    };
    let mut plain = String::new();
    let mut chars = styled.chars();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            chars.by_ref().find(|&c| c == 'm');
        } else {
            plain.push(c);
        }
    }
    plain.trim().to_string()
}

#[test]
fn responses_show_values() {
    let mut repl = repl(&[]);
    assert_eq!(text(repl.respond("[1 2] |* {* 2}")), "[2, 4]");
    assert_eq!(text(repl.respond("x = 5")), "");
    assert_eq!(text(repl.respond("x + 1")), "6");
}

#[test]
fn errors_do_not_end_the_session() {
    let mut repl = repl(&[]);
    assert!(text(repl.respond("{raise {ValueError \"boom\"}}")).contains("ValueError"));
    assert_eq!(text(repl.respond("2 * 21")), "42");
}

#[test]
fn emit_command_renders_code() {
    let mut repl = repl(&[]);
    assert_eq!(text(repl.respond(":emit z = 3")), "z = 3");
    assert_eq!(text(repl.respond(":emit")), "emit on");
    assert_eq!(repl.respond(":quit"), Response::Quit);
}

#[test]
fn scripted_sessions_run_to_the_end() {
    let script = Script::new(&["total = 0", "{for i [1 2 3]", "  total = total + i}", "", ":q", "x = 1"]);
    let history = Rc::clone(&script.history);
    let mut repl = scripted(script);
    repl.run().unwrap();
    let value = repl.session_mut().eval("total").unwrap().value;
    assert_eq!(value, Value::Int(6));
    assert_eq!(
        *history.borrow(),
        ["total = 0", "{for i [1 2 3]\n  total = total + i}", ":q"]
    );
    assert!(repl.session_mut().eval("x").is_err());
}

#[test]
fn completeness_follows_brackets() {
    assert!(is_complete("{f 1}"));
    assert!(!is_complete("{f [1"));
    assert!(!is_complete("\"open"));
    assert!(is_complete("(]"));
}
