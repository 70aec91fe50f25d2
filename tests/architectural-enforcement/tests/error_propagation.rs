//! Integration Test: Error Propagation
//!
//! Production code returns errors with `?` so the dispatch loop can contain
//! them. A panic in a handler would take the whole application down.

use architectural_enforcement::{assert_clean, find};

const PANICKY: &[&str] = &[".unwrap()", ".expect(", "panic!(", "unimplemented!(", "todo!("];

#[test]
fn test_core_never_unwraps() {
    assert_clean("core propagates errors", &find("core/src", PANICKY));
}

#[test]
fn test_tui_never_unwraps() {
    assert_clean("tui propagates errors", &find("tui/src", PANICKY));
}
