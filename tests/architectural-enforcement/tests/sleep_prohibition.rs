//! Integration Test: Sleep Prohibition
//!
//! The dispatch loop owns the frame budget. Sleeping is allowed in exactly
//! two places: the frame pacer and the worker wait loop. Anywhere else a
//! sleep stalls input and rendering for every module.

use architectural_enforcement::{assert_clean, find, SourceLine};

const ALLOWED: &[&str] = &["core/src/frame.rs", "core/src/worker.rs"];

fn sleeps(dir: &str) -> Vec<SourceLine> {
    find(dir, &["thread::sleep", "std::thread::sleep", "sleep("])
        .into_iter()
        .filter(|line| !ALLOWED.iter().any(|allowed| line.path.ends_with(allowed)))
        .collect()
}

#[test]
fn test_no_sleep_in_core_outside_pacing_and_workers() {
    assert_clean("sleep only in frame pacing and workers", &sleeps("core/src"));
}

#[test]
fn test_no_sleep_in_tui() {
    assert_clean("the tui never sleeps directly", &sleeps("tui/src"));
}
