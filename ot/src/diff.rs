//! Annotated line diffs between two tree renderings
//!
//! Output follows the classic differ line shape: every line is prefixed with
//! `"  "` (unchanged), `"- "` (removed), `"+ "` (added), or `"? "` (intraline
//! hint with `^` markers under the changed span of the adjacent line).

use similar::{DiffTag, TextDiff};

/// Compare two renderings line by line
pub fn diff_lines(old: &str, new: &str) -> Vec<String> {
    let old_lines: Vec<&str> = old.lines().collect();
    let new_lines: Vec<&str> = new.lines().collect();
    let diff = TextDiff::from_slices(&old_lines, &new_lines);

    let mut out = Vec::new();
    for op in diff.ops() {
        let removed = &old_lines[op.old_range()];
        let added = &new_lines[op.new_range()];
        match op.tag() {
            DiffTag::Equal => {
                for line in removed {
                    out.push(format!("  {line}"));
                }
            }
            DiffTag::Delete => {
                for line in removed {
                    out.push(format!("- {line}"));
                }
            }
            DiffTag::Insert => {
                for line in added {
                    out.push(format!("+ {line}"));
                }
            }
            DiffTag::Replace => push_replace(removed, added, &mut out),
        }
    }
    out
}

/// Emit a replace block, pairing removed/added lines and adding `"? "` hint
/// lines when a pair differs only in a small intraline span
fn push_replace(removed: &[&str], added: &[&str], out: &mut Vec<String>) {
    let paired = removed.len().min(added.len());

    for i in 0..paired {
        let (before, after) = (removed[i], added[i]);
        match intraline_markers(before, after) {
            Some((before_hint, after_hint)) => {
                out.push(format!("- {before}"));
                if before_hint.contains('^') {
                    out.push(format!("? {before_hint}"));
                }
                out.push(format!("+ {after}"));
                if after_hint.contains('^') {
                    out.push(format!("? {after_hint}"));
                }
            }
            None => {
                out.push(format!("- {before}"));
                out.push(format!("+ {after}"));
            }
        }
    }
    for line in &removed[paired..] {
        out.push(format!("- {line}"));
    }
    for line in &added[paired..] {
        out.push(format!("+ {line}"));
    }
}

/// Build `^` marker strings for a removed/added line pair, or `None` when the
/// lines are too different for an intraline hint to help
fn intraline_markers(before: &str, after: &str) -> Option<(String, String)> {
    let b: Vec<char> = before.chars().collect();
    let a: Vec<char> = after.chars().collect();

    let prefix = b.iter().zip(a.iter()).take_while(|(x, y)| x == y).count();
    let max_suffix = b.len().min(a.len()) - prefix;
    let suffix = b
        .iter()
        .rev()
        .zip(a.iter().rev())
        .take_while(|(x, y)| x == y)
        .count()
        .min(max_suffix);

    let common = prefix + suffix;
    if common == 0 || common * 2 < b.len().max(a.len()) {
        return None;
    }

    let marker = |len: usize| -> String {
        let changed = len - prefix - suffix;
        let mut hint = " ".repeat(prefix);
        hint.push_str(&"^".repeat(changed));
        hint
    };
    Some((marker(b.len()), marker(a.len())))
}
