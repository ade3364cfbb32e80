//! Reviewable text rendering of task trees
//!
//! Renders a snapshot to the canonical JSON-shaped form consumed by decision
//! agents and human review surfaces:
//!
//! ```text
//! {
//!    "id": "1",
//!    "task": "...",
//!    "status": "In progress",
//!    "retrospective": null,
//!    "subtasks": [ ... ] | null
//! }
//! ```
//!
//! Redaction, obfuscation, and pending-change diffing are purely
//! presentational - they never touch the node graph itself.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use crate::diff::diff_lines;
use crate::node::NodeSnapshot;
use crate::status::TaskStatus;

/// Literal marker that replaces redacted planned subtasks
pub const REDACTED_PLANS_MARKER: &str = "(FUTURE PLANNED TASKS REDACTED)";

/// Literal marker that replaces an obfuscated status
pub const OBFUSCATED_STATUS_MARKER: &str = "?";

/// Spaces per nesting level in rendered output
pub const DEFAULT_RENDER_INDENT: usize = 3;

/// Presentation options for [`NodeSnapshot::stringify`]
#[derive(Debug, Clone)]
pub struct StringifyOptions {
    /// Spaces per nesting level
    pub indent: usize,

    /// Once rendering reaches this node, every planned-status descendant
    /// subtree from then on is replaced by [`REDACTED_PLANS_MARKER`]
    pub redact_planned_subtasks_below: Option<String>,

    /// This one node's status renders as [`OBFUSCATED_STATUS_MARKER`]
    /// instead of its real value (hides ground truth from a node asked to
    /// self-assess)
    pub obfuscate_status_of: Option<String>,
}

impl Default for StringifyOptions {
    fn default() -> Self {
        Self {
            indent: DEFAULT_RENDER_INDENT,
            redact_planned_subtasks_below: None,
            obfuscate_status_of: None,
        }
    }
}

impl NodeSnapshot {
    /// Render this snapshot and its subtree to the canonical text shape
    pub fn stringify(&self, opts: &StringifyOptions) -> String {
        let mut out = String::new();
        write_node(self, opts, false, 0, &mut out);
        out
    }

    /// Parse an unredacted, unobfuscated rendering back into a snapshot
    ///
    /// Children whose status is `Planned` land in the planned list; all
    /// others in the non-planned list, preserving order.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let raw: RawNode = serde_json::from_str(text)?;
        Ok(raw.into())
    }

    /// Copy of this snapshot with replacement subtrees substituted wherever
    /// their id matches
    pub fn with_changes(&self, changes: &HashMap<String, NodeSnapshot>) -> NodeSnapshot {
        if let Some(replacement) = changes.get(&self.id) {
            return replacement.clone();
        }
        NodeSnapshot {
            id: self.id.clone(),
            task: self.task.clone(),
            status: self.status,
            retrospective: self.retrospective.clone(),
            non_planned_subtasks: self
                .non_planned_subtasks
                .iter()
                .map(|c| c.with_changes(changes))
                .collect(),
            planned_subtasks: self
                .planned_subtasks
                .iter()
                .map(|c| c.with_changes(changes))
                .collect(),
        }
    }
}

/// Render the tree twice - as is, and with `changes` substituted - and
/// return annotated diff lines between the two renderings
///
/// With empty `changes` this degenerates to a self-diff (all lines
/// unchanged), for callers that always expect diff-shaped output.
pub fn render_diff(
    base: &NodeSnapshot,
    changes: &HashMap<String, NodeSnapshot>,
    opts: &StringifyOptions,
) -> Vec<String> {
    let before = base.stringify(opts);
    if changes.is_empty() {
        return diff_lines(&before, &before);
    }
    let after = base.with_changes(changes).stringify(opts);
    diff_lines(&before, &after)
}

fn pad(opts: &StringifyOptions, lvl: usize) -> String {
    " ".repeat(opts.indent * lvl)
}

fn write_node(snap: &NodeSnapshot, opts: &StringifyOptions, redacting: bool, lvl: usize, out: &mut String) {
    let pad0 = pad(opts, lvl);
    let pad1 = pad(opts, lvl + 1);

    let status_value = if opts.obfuscate_status_of.as_deref() == Some(snap.id.as_str()) {
        Value::String(OBFUSCATED_STATUS_MARKER.to_string())
    } else {
        Value::String(snap.status.as_str().to_string())
    };
    let retrospective_value = match &snap.retrospective {
        Some(text) => Value::String(text.clone()),
        None => Value::Null,
    };

    out.push_str(&format!("{pad0}{{\n"));
    out.push_str(&format!("{pad1}\"id\": {},\n", Value::String(snap.id.clone())));
    out.push_str(&format!("{pad1}\"task\": {},\n", Value::String(snap.task.clone())));
    out.push_str(&format!("{pad1}\"status\": {status_value},\n"));
    out.push_str(&format!("{pad1}\"retrospective\": {retrospective_value},\n"));

    if !snap.has_subtasks() {
        out.push_str(&format!("{pad1}\"subtasks\": null\n"));
    } else {
        let redacting = redacting || opts.redact_planned_subtasks_below.as_deref() == Some(snap.id.as_str());

        let mut items = Vec::new();
        for child in snap.subtasks() {
            if redacting && child.status == TaskStatus::Planned {
                items.push(format!("{}{REDACTED_PLANS_MARKER}", pad(opts, lvl + 2)));
                break;
            }
            let mut rendered = String::new();
            write_node(child, opts, redacting, lvl + 2, &mut rendered);
            items.push(rendered);
        }

        out.push_str(&format!("{pad1}\"subtasks\": [\n"));
        out.push_str(&items.join(",\n"));
        out.push_str(&format!("\n{pad1}]\n"));
    }

    out.push_str(&format!("{pad0}}}"));
}

/// Wire shape of one rendered node, used for parsing back
#[derive(Deserialize)]
struct RawNode {
    id: String,
    task: String,
    status: TaskStatus,
    retrospective: Option<String>,
    subtasks: Option<Vec<RawNode>>,
}

impl From<RawNode> for NodeSnapshot {
    fn from(raw: RawNode) -> Self {
        let mut non_planned = Vec::new();
        let mut planned = Vec::new();
        for child in raw.subtasks.unwrap_or_default() {
            let child: NodeSnapshot = child.into();
            if child.status == TaskStatus::Planned {
                planned.push(child);
            } else {
                non_planned.push(child);
            }
        }
        NodeSnapshot {
            id: raw.id,
            task: raw.task,
            status: raw.status,
            retrospective: raw.retrospective,
            non_planned_subtasks: non_planned,
            planned_subtasks: planned,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn leaf(id: &str, task: &str, status: TaskStatus) -> NodeSnapshot {
        NodeSnapshot {
            id: id.to_string(),
            task: task.to_string(),
            status,
            retrospective: None,
            non_planned_subtasks: Vec::new(),
            planned_subtasks: Vec::new(),
        }
    }

    /// root -> [1.1 success (retrospective), 1.2 in progress] + planned 1.3
    fn sample_tree() -> NodeSnapshot {
        let mut done = leaf("1.1", "first step", TaskStatus::Success);
        done.retrospective = Some("it worked".to_string());
        let mut root = leaf("1", "top-level goal", TaskStatus::InProgress);
        root.non_planned_subtasks = vec![done, leaf("1.2", "second step", TaskStatus::InProgress)];
        root.planned_subtasks = vec![leaf("1.3", "third step", TaskStatus::Planned)];
        root
    }

    #[test]
    fn test_childless_node_renders_null_subtasks() {
        let text = leaf("1", "goal", TaskStatus::InProgress).stringify(&StringifyOptions::default());
        let expected = "{\n   \"id\": \"1\",\n   \"task\": \"goal\",\n   \"status\": \"In progress\",\n   \"retrospective\": null,\n   \"subtasks\": null\n}";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_rendering_round_trips() {
        let tree = sample_tree();
        let text = tree.stringify(&StringifyOptions::default());
        let parsed = NodeSnapshot::parse(&text).unwrap();
        assert_eq!(parsed, tree);
    }

    #[test]
    fn test_redaction_replaces_planned_subtrees() {
        let tree = sample_tree();
        let opts = StringifyOptions {
            redact_planned_subtasks_below: Some("1".to_string()),
            ..Default::default()
        };
        let text = tree.stringify(&opts);
        assert!(text.contains(REDACTED_PLANS_MARKER));
        assert!(!text.contains("third step"));
        // Non-planned children still render in full
        assert!(text.contains("first step"));
        assert!(text.contains("second step"));
    }

    #[test]
    fn test_redaction_applies_below_flagged_node() {
        let mut planned_deep = leaf("1.2.1", "deep plan", TaskStatus::Planned);
        planned_deep.task = "deep plan".to_string();
        let mut mid = leaf("1.2", "second step", TaskStatus::InProgress);
        mid.planned_subtasks = vec![planned_deep];
        mid.non_planned_subtasks = vec![leaf("1.2.0", "active", TaskStatus::InProgress)];
        let mut root = sample_tree();
        root.non_planned_subtasks[1] = mid;

        let opts = StringifyOptions {
            redact_planned_subtasks_below: Some("1.2".to_string()),
            ..Default::default()
        };
        let text = root.stringify(&opts);
        assert!(!text.contains("deep plan"));
        // The flag sits at 1.2, so root-level planned subtasks stay visible
        assert!(text.contains("third step"));
    }

    #[test]
    fn test_obfuscation_hides_exactly_one_status() {
        let tree = sample_tree();
        let opts = StringifyOptions {
            obfuscate_status_of: Some("1.2".to_string()),
            ..Default::default()
        };
        let text = tree.stringify(&opts);
        assert!(text.contains("\"status\": \"?\""));
        // Root and 1.1 statuses are untouched
        assert!(text.contains("\"status\": \"In progress\""));
        assert!(text.contains("\"status\": \"Attempted (success)\""));
        assert_eq!(text.matches("\"status\": \"?\"").count(), 1);
    }

    #[test]
    fn test_with_changes_substitutes_whole_subtree() {
        let tree = sample_tree();
        let mut replacement = leaf("1.2", "second step", TaskStatus::Failure);
        replacement.retrospective = Some("did not work".to_string());
        let changes = HashMap::from([("1.2".to_string(), replacement.clone())]);

        let modified = tree.with_changes(&changes);
        assert_eq!(modified.non_planned_subtasks[1], replacement);
        // Base is untouched
        assert_eq!(tree.non_planned_subtasks[1].status, TaskStatus::InProgress);
    }

    #[test]
    fn test_render_diff_marks_status_change() {
        let tree = sample_tree();
        let mut replacement = leaf("1.2", "second step", TaskStatus::Success);
        replacement.retrospective = Some("done".to_string());
        let changes = HashMap::from([("1.2".to_string(), replacement)]);

        let lines = render_diff(&tree, &changes, &StringifyOptions::default());
        assert!(lines.iter().any(|l| l.starts_with("- ") && l.contains("In progress")));
        assert!(lines.iter().any(|l| l.starts_with("+ ") && l.contains("Attempted (success)")));
        assert!(lines.iter().any(|l| l.starts_with("  ")));
    }

    #[test]
    fn test_self_diff_is_all_unchanged() {
        let tree = sample_tree();
        let lines = render_diff(&tree, &HashMap::new(), &StringifyOptions::default());
        assert!(!lines.is_empty());
        assert!(lines.iter().all(|l| l.starts_with("  ")));
    }

    fn any_status() -> impl Strategy<Value = TaskStatus> {
        prop_oneof![
            Just(TaskStatus::InProgress),
            Just(TaskStatus::Planned),
            Just(TaskStatus::Success),
            Just(TaskStatus::PartialSuccess),
            Just(TaskStatus::Failure),
            Just(TaskStatus::Dropped),
        ]
    }

    fn non_planned_status() -> impl Strategy<Value = TaskStatus> {
        prop_oneof![
            Just(TaskStatus::InProgress),
            Just(TaskStatus::Success),
            Just(TaskStatus::PartialSuccess),
            Just(TaskStatus::Failure),
            Just(TaskStatus::Dropped),
        ]
    }

    /// Trees where planned children are exactly the `Planned`-status ones,
    /// which is all the parser needs to reconstruct the two lists
    fn snapshot_strategy() -> impl Strategy<Value = NodeSnapshot> {
        let leaf = ("[0-9.]{1,9}", ".*", any_status(), prop::option::of(".*")).prop_map(
            |(id, task, status, retrospective)| NodeSnapshot {
                id,
                task,
                status,
                retrospective,
                non_planned_subtasks: Vec::new(),
                planned_subtasks: Vec::new(),
            },
        );
        leaf.prop_recursive(3, 16, 4, |inner| {
            (
                "[0-9.]{1,9}",
                ".*",
                any_status(),
                prop::option::of(".*"),
                prop::collection::vec((inner.clone(), non_planned_status()), 0..3),
                prop::collection::vec(inner, 0..2),
            )
                .prop_map(|(id, task, status, retrospective, non_planned, planned)| NodeSnapshot {
                    id,
                    task,
                    status,
                    retrospective,
                    non_planned_subtasks: non_planned
                        .into_iter()
                        .map(|(mut child, status)| {
                            child.status = status;
                            child
                        })
                        .collect(),
                    planned_subtasks: planned
                        .into_iter()
                        .map(|mut child| {
                            child.status = TaskStatus::Planned;
                            child
                        })
                        .collect(),
                })
        })
    }

    proptest! {
        #[test]
        fn prop_render_parse_round_trip(tree in snapshot_strategy()) {
            let text = tree.stringify(&StringifyOptions::default());
            let parsed = NodeSnapshot::parse(&text).unwrap();
            prop_assert_eq!(parsed, tree);
        }
    }
}
