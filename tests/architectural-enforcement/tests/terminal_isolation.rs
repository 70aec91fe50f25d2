//! Integration Test: Terminal Isolation
//!
//! `deskapp-core` is reachable from worker threads, so it must never touch
//! the terminal. Only `deskapp-tui` may depend on crossterm or ratatui.

use std::fs;

use architectural_enforcement::{assert_clean, find, workspace_root};

#[test]
fn test_core_sources_never_use_terminal_crates() {
    let violations = find("core/src", &["crossterm", "ratatui"]);
    assert_clean("core must not use crossterm or ratatui", &violations);
}

#[test]
fn test_core_manifest_has_no_terminal_dependencies() {
    let manifest = fs::read_to_string(workspace_root().join("core/Cargo.toml")).unwrap();
    assert!(!manifest.contains("crossterm"));
    assert!(!manifest.contains("ratatui"));
}

#[test]
fn test_worker_module_only_talks_through_the_bus() {
    let violations = find("core/src/worker.rs", &["stdout", "stderr", "println!", "eprintln!"]);
    assert_clean("workers must report through events, not the terminal", &violations);
}
