//! Read-only listing of the host storage locations, appended to the trace
//! after a successful invocation.

use std::fs;
use std::io;
use std::path::Path;

use crate::environment::StorageLocations;
use crate::trace::{Phase, Trace};

/// Deepest level descended into; entries one level further are named but not opened.
pub const MAX_DEPTH: usize = 2;

const INDENT: &str = "  ";

/// One `Storage` entry per location.
pub fn report(storage: &StorageLocations, trace: &mut Trace) {
    for (label, dir) in [
        ("files_dir", storage.files_dir.as_path()),
        ("cache_dir", storage.cache_dir.as_path()),
    ] {
        let header = format!("{label} {}", dir.display());
        if !dir.is_dir() {
            trace.degraded(Phase::Storage, format!("{header}: Directory does not exist"));
            continue;
        }
        match list(dir) {
            Ok(lines) => {
                tracing::debug!(location = label, entries = lines.len(), "listed storage");
                trace.ok(Phase::Storage, format!("{header}\n{}", lines.join("\n")));
            }
            Err(err) => {
                tracing::warn!(location = label, error = %err, "storage listing failed");
                trace.degraded(Phase::Storage, format!("{header}: unreadable: {err}"));
            }
        }
    }
}

/// Listing lines for `root`, never empty.
pub fn list(root: &Path) -> io::Result<Vec<String>> {
    let mut lines = Vec::new();
    walk(root, 0, &mut lines)?;
    if lines.is_empty() {
        lines.push("(empty)".to_string());
    }
    Ok(lines)
}

fn walk(dir: &Path, depth: usize, lines: &mut Vec<String>) -> io::Result<()> {
    let mut entries = fs::read_dir(dir)?.collect::<io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.file_name());

    let indent = INDENT.repeat(depth);
    for entry in entries {
        let name = entry.file_name().to_string_lossy().into_owned();
        let path = entry.path();
        if path.is_dir() {
            lines.push(format!("{indent}[d] {name}/"));
            if depth < MAX_DEPTH {
                let before = lines.len();
                walk(&path, depth + 1, lines)?;
                if lines.len() == before {
                    lines.push(format!("{indent}{INDENT}(empty)"));
                }
            }
        } else {
            let size = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            lines.push(format!("{indent}[f] {name} ({size} bytes)"));
        }
    }
    Ok(())
}
