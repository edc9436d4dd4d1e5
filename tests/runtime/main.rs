//! Integration tests for Layer 3: Runtime
//!
//! Tests for sessions over module directories, the compiled-unit cache and
//! the REPL driven by a scripted editor.

mod repl;
mod sessions;

use std::path::PathBuf;

/// A fresh directory under the system temp dir.
pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("makrell-it-{name}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}
