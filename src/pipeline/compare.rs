use log::info;
use similar::{ChangeTag, TextDiff};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::DiffStrategyKind;
use crate::error::{PipelineError, Result};
use crate::utils::io::ensure_parent_dir;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffResult {
    Identical,
    /// `changes` counts the `-`/`+` lines written to `diff_path`.
    Different { diff_path: PathBuf, changes: usize },
}

/// Renders the body of a diff (everything after the `---`/`+++` header) as
/// `- old` / `+ new` lines.
pub trait DiffStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn changes(&self, old: &str, new: &str) -> Vec<String>;
}

/// Compares line `i` of one input with line `i` of the other. An inserted
/// line shifts everything after it, so every following line is reported.
pub struct PositionalDiff;

impl DiffStrategy for PositionalDiff {
    fn name(&self) -> &'static str { "positional" }

    fn changes(&self, old: &str, new: &str) -> Vec<String> {
        let left: Vec<&str> = old.split('\n').collect();
        let right: Vec<&str> = new.split('\n').collect();
        let mut out = Vec::new();

        for i in 0..left.len().max(right.len()) {
            let l = left.get(i).copied().unwrap_or("");
            let r = right.get(i).copied().unwrap_or("");
            if l == r {
                continue;
            }
            if !l.is_empty() {
                out.push(format!("- {}", l));
            }
            if !r.is_empty() {
                out.push(format!("+ {}", r));
            }
        }
        out
    }
}

/// Aligned line diff (Myers, via `similar`); unchanged lines are omitted.
pub struct LcsDiff;

impl DiffStrategy for LcsDiff {
    fn name(&self) -> &'static str { "lcs" }

    fn changes(&self, old: &str, new: &str) -> Vec<String> {
        TextDiff::from_lines(old, new)
            .iter_all_changes()
            .filter_map(|change| {
                let line = change.value().trim_end_matches(['\n', '\r']);
                match change.tag() {
                    ChangeTag::Delete => Some(format!("- {}", line)),
                    ChangeTag::Insert => Some(format!("+ {}", line)),
                    ChangeTag::Equal => None,
                }
            })
            .collect()
    }
}

pub fn strategy_for(kind: DiffStrategyKind) -> Box<dyn DiffStrategy> {
    match kind {
        DiffStrategyKind::Positional => Box::new(PositionalDiff),
        DiffStrategyKind::Lcs => Box::new(LcsDiff),
    }
}

pub fn render(old_name: &Path, new_name: &Path, changes: &[String]) -> String {
    let mut out = String::new();
    out.push_str(&format!("--- {}\n", old_name.display()));
    out.push_str(&format!("+++ {}\n", new_name.display()));
    for line in changes {
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Compare two backup artifacts byte for byte. Writes `diff_path` only when
/// they differ; bytes that are not UTF-8 are diffed as U+FFFD.
pub fn compare_files(
    first: &Path,
    second: &Path,
    diff_path: &Path,
    strategy: &dyn DiffStrategy,
) -> Result<DiffResult> {
    for f in [first, second] {
        if !f.is_file() {
            return Err(PipelineError::MissingFile(f.to_path_buf()));
        }
    }

    let a = fs::read(first)?;
    let b = fs::read(second)?;
    if a == b {
        info!("Files are identical");
        return Ok(DiffResult::Identical);
    }

    info!("Files are different, generating {} diff", strategy.name());
    let changes = strategy.changes(&String::from_utf8_lossy(&a), &String::from_utf8_lossy(&b));
    ensure_parent_dir(diff_path)?;
    fs::write(diff_path, render(first, second, &changes))?;
    info!("Diff file created: {}", diff_path.display());

    Ok(DiffResult::Different { diff_path: diff_path.to_path_buf(), changes: changes.len() })
}
