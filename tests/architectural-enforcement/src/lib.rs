//! Architectural Enforcement Integration Tests
//!
//! Source-scanning checks for the rules the workspace relies on:
//! - `deskapp-core` never touches the terminal (no crossterm, no ratatui)
//! - sleeping only happens in frame pacing and worker loops
//! - production code propagates errors instead of unwrapping
//!
//! The helpers here walk the production sources of a crate and hand back
//! the lines that are not comments and not test code.

use std::fs;
use std::path::{Path, PathBuf};

/// One scanned line of production code
#[derive(Debug, Clone)]
pub struct SourceLine {
    /// File the line came from, relative to the workspace root
    pub path: PathBuf,
    /// 1-based line number
    pub number: usize,
    /// The code with any trailing `//` comment removed
    pub code: String,
}

impl std::fmt::Display for SourceLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{} - {}", self.path.display(), self.number, self.code.trim())
    }
}

/// The workspace root
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../..")
        .canonicalize()
        .unwrap_or_else(|_| PathBuf::from("../.."))
}

/// Every `.rs` file under `dir` (relative to the workspace root)
pub fn rust_files(dir: &str) -> Vec<PathBuf> {
    let root = workspace_root().join(dir);
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(&root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("rs"))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

/// Production lines of a file: everything before its `#[cfg(test)]` module,
/// minus comments
pub fn production_lines(path: &Path) -> Vec<SourceLine> {
    let Ok(content) = fs::read_to_string(path) else {
        return Vec::new();
    };
    let relative = path
        .strip_prefix(workspace_root())
        .unwrap_or(path)
        .to_path_buf();

    content
        .lines()
        .enumerate()
        .take_while(|(_, line)| line.trim() != "#[cfg(test)]")
        .filter_map(|(idx, line)| {
            let code = line.split("//").next().unwrap_or(line);
            (!code.trim().is_empty()).then(|| SourceLine {
                path: relative.clone(),
                number: idx + 1,
                code: code.to_string(),
            })
        })
        .collect()
}

/// Production lines under `dir` containing any of `needles`
pub fn find(dir: &str, needles: &[&str]) -> Vec<SourceLine> {
    rust_files(dir)
        .iter()
        .flat_map(|file| production_lines(file))
        .filter(|line| needles.iter().any(|n| line.code.contains(n)))
        .collect()
}

/// Fail with a readable list when `violations` is not empty
pub fn assert_clean(rule: &str, violations: &[SourceLine]) {
    if violations.is_empty() {
        return;
    }
    for violation in violations {
        eprintln!("  {violation}");
    }
    panic!("\n{} violation(s) of: {rule}", violations.len());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_lines_stop_at_test_module() {
        let dir = std::env::temp_dir().join("deskapp-arch-scan");
        fs::create_dir_all(&dir).unwrap();
        let file = dir.join("sample.rs");
        fs::write(
            &file,
            "fn a() {} // trailing\n// only a comment\n\n#[cfg(test)]\nmod tests { fn b() {} }\n",
        )
        .unwrap();

        let lines = production_lines(&file);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].code.trim(), "fn a() {}");
        assert_eq!(lines[0].number, 1);
    }

    #[test]
    fn test_workspace_root_has_members() {
        let root = workspace_root();
        assert!(root.join("core").join("Cargo.toml").exists());
        assert!(root.join("tui").join("Cargo.toml").exists());
    }
}
