//! Integration tests for Layer 1: Language
//!
//! Tests for the front end, evaluation, special forms and the meta engine.

mod diagnostics;
mod evaluation;
mod forms;
mod front_end;
mod meta;
