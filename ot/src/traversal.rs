//! Traversal state machine over an OLTHAD
//!
//! The traversal exclusively owns the tree and a cursor into it. Mutations
//! are exposed as two-phase pending updates: a zero-argument preview that
//! renders the would-be change as an annotated diff without touching the
//! tree, and a zero-argument commit (consuming the update, so it applies at
//! most once) that performs the mutation and advances the frontier.

use std::collections::HashMap;

use tracing::debug;

use crate::error::OlthadError;
use crate::node::{NodeSnapshot, Olthad, TaskNode};
use crate::render::{StringifyOptions, render_diff};
use crate::status::TaskStatus;

/// An ongoing traversal of an OLTHAD
///
/// State is `(tree, cursor)`. The cursor is either the id of a registered
/// node or `None`, the terminal state meaning the whole tree has been
/// exited.
#[derive(Debug)]
pub struct OlthadTraversal {
    olthad: Olthad,
    cur_node_id: Option<String>,
}

impl OlthadTraversal {
    /// Start a traversal from a single top-level task description
    pub fn new(highest_level_task: impl Into<String>) -> Self {
        let olthad = Olthad::new(highest_level_task);
        let cur_node_id = Some(olthad.root_id().to_string());
        Self { olthad, cur_node_id }
    }

    pub fn olthad(&self) -> &Olthad {
        &self.olthad
    }

    /// Id of the current node, `None` once the root has been exited
    pub fn cur_node_id(&self) -> Option<&str> {
        self.cur_node_id.as_deref()
    }

    pub fn cur_node(&self) -> Option<&TaskNode> {
        self.cur_node_id.as_deref().and_then(|id| self.olthad.get(id))
    }

    fn require_cur_node(&self) -> Result<&TaskNode, OlthadError> {
        self.cur_node()
            .ok_or_else(|| OlthadError::usage("the traversal has already exited the root node"))
    }

    /// Set the current node to its in-progress subtask
    ///
    /// Usage error when the current node has none (call right after a
    /// planning update has promoted one).
    pub fn recurse_inward(&mut self) -> Result<(), OlthadError> {
        debug!(cur = ?self.cur_node_id, "OlthadTraversal::recurse_inward: called");
        let cur = self.require_cur_node()?;
        let child = self.olthad.in_progress_subtask_of(cur)?.ok_or_else(|| {
            OlthadError::usage(format!(
                "current node '{}' has no in-progress subtask to recurse into",
                cur.id()
            ))
        })?;
        self.cur_node_id = Some(child.id().to_string());
        Ok(())
    }

    /// Move the cursor up to an ancestor, discarding everything explored
    /// beneath it
    ///
    /// `None` exits the root entirely (terminal state, no pruning).
    /// Otherwise the target must be a registered strict ancestor of the
    /// current node; ancestry is validated before any mutation, so a usage
    /// error never leaves the tree half-pruned. Afterwards the target is the
    /// current node and has no surviving subtasks - re-opened as if it had
    /// never been explored.
    pub fn backtrack_to(&mut self, target_id: Option<&str>) -> Result<(), OlthadError> {
        debug!(cur = ?self.cur_node_id, ?target_id, "OlthadTraversal::backtrack_to: called");
        let Some(target_id) = target_id else {
            self.cur_node_id = None;
            return Ok(());
        };

        let cur = self.require_cur_node()?;
        if !self.olthad.contains(target_id) {
            return Err(OlthadError::usage(format!(
                "node '{target_id}' not found in the registry"
            )));
        }
        if !self.is_strict_ancestor_of_cur(target_id)? {
            return Err(OlthadError::usage(format!(
                "node '{target_id}' is not an ancestor of the current node"
            )));
        }

        // Walk upward from the current node, pruning each level's subtask
        // subtrees, up to and including the target itself.
        let mut walking = cur.id().to_string();
        loop {
            let node = self.olthad.get(&walking).ok_or_else(|| {
                OlthadError::corrupted(format!("node '{walking}' disappeared during backtracking"))
            })?;
            let children: Vec<String> = node.subtask_ids().map(str::to_string).collect();
            let parent_id = node.parent_id().map(str::to_string);
            for child_id in &children {
                self.olthad.remove_subtree(child_id);
            }
            if let Some(node) = self.olthad.get_mut(&walking) {
                node.non_planned_subtasks.clear();
                node.planned_subtasks.clear();
            }

            if walking == target_id {
                break;
            }
            walking = parent_id.ok_or_else(|| {
                OlthadError::corrupted(format!(
                    "reached the root while backtracking to verified ancestor '{target_id}'"
                ))
            })?;
        }

        self.cur_node_id = Some(target_id.to_string());
        Ok(())
    }

    fn is_strict_ancestor_of_cur(&self, target_id: &str) -> Result<bool, OlthadError> {
        let mut walking = self.require_cur_node()?;
        while let Some(parent_id) = walking.parent_id() {
            if parent_id == target_id {
                return Ok(true);
            }
            walking = self.olthad.get(parent_id).ok_or_else(|| {
                OlthadError::corrupted(format!(
                    "node '{}' references unregistered parent '{parent_id}'",
                    walking.id()
                ))
            })?;
        }
        Ok(false)
    }

    /// Stage a wholesale replacement of the current node's planned subtasks
    ///
    /// New nodes take ids continuing the parent's combined subtask order.
    /// On commit, if the current node is left without an in-progress
    /// frontier, the first new planned subtask is promoted to restore it.
    pub fn update_planned_subtasks_of_cur_node(
        &mut self,
        new_planned_subtasks: &[String],
    ) -> Result<PendingUpdate<'_>, OlthadError> {
        debug!(
            cur = ?self.cur_node_id,
            count = new_planned_subtasks.len(),
            "OlthadTraversal::update_planned_subtasks_of_cur_node: called"
        );
        if new_planned_subtasks.is_empty() {
            return Err(OlthadError::usage("the list of new planned subtasks cannot be empty"));
        }
        let cur = self.require_cur_node()?;

        let offset = cur.non_planned_subtasks.len();
        let new_nodes: Vec<TaskNode> = new_planned_subtasks
            .iter()
            .enumerate()
            .map(|(i, task)| {
                TaskNode::new(
                    format!("{}.{}", cur.id(), offset + i + 1),
                    Some(cur.id().to_string()),
                    task.clone(),
                    TaskStatus::Planned,
                )
            })
            .collect();

        Ok(PendingUpdate {
            traversal: self,
            action: PendingAction::ReplacePlannedSubtasks { new_nodes },
        })
    }

    /// Stage a terminal status + retrospective for an in-progress node
    ///
    /// The node must be the current node or one of its direct subtasks, and
    /// currently in progress; the new status must not be in progress. On
    /// commit the next planned sibling, if any, is promoted to keep the
    /// frontier advancing.
    pub fn update_status_and_retrospective_of(
        &mut self,
        node_id: &str,
        new_status: TaskStatus,
        new_retrospective: impl Into<String>,
    ) -> Result<PendingUpdate<'_>, OlthadError> {
        debug!(
            cur = ?self.cur_node_id,
            %node_id,
            %new_status,
            "OlthadTraversal::update_status_and_retrospective_of: called"
        );
        let cur = self.require_cur_node()?;
        if node_id != cur.id() && !cur.subtask_ids().any(|id| id == node_id) {
            return Err(OlthadError::usage(
                "the node can only be the current node or one of its subtasks",
            ));
        }
        let node = self.olthad.get(node_id).ok_or_else(|| {
            OlthadError::corrupted(format!("subtask '{node_id}' of the current node is unregistered"))
        })?;
        if node.status() != TaskStatus::InProgress {
            return Err(OlthadError::usage(format!(
                "status updates only apply to an in-progress task, but '{node_id}' is '{}'",
                node.status()
            )));
        }
        if new_status == TaskStatus::InProgress {
            return Err(OlthadError::usage(
                "a status update cannot set a task back to in progress",
            ));
        }

        Ok(PendingUpdate {
            traversal: self,
            action: PendingAction::SetStatusAndRetrospective {
                node_id: node_id.to_string(),
                new_status,
                new_retrospective: new_retrospective.into(),
            },
        })
    }
}

#[derive(Debug)]
enum PendingAction {
    ReplacePlannedSubtasks {
        new_nodes: Vec<TaskNode>,
    },
    SetStatusAndRetrospective {
        node_id: String,
        new_status: TaskStatus,
        new_retrospective: String,
    },
}

/// A staged, reviewable mutation of the traversal's tree
///
/// Preview with [`diff`](PendingUpdate::diff), then apply with
/// [`commit`](PendingUpdate::commit). Dropping the update discards it;
/// commit consumes it, so the mutation happens at most once.
#[derive(Debug)]
pub struct PendingUpdate<'a> {
    traversal: &'a mut OlthadTraversal,
    action: PendingAction,
}

impl PendingUpdate<'_> {
    /// Annotated diff of the whole tree with this update's changes staged,
    /// without mutating anything
    pub fn diff(&self) -> Result<Vec<String>, OlthadError> {
        self.diff_with_options(&StringifyOptions::default())
    }

    /// Like [`diff`](PendingUpdate::diff) with explicit rendering options
    pub fn diff_with_options(&self, opts: &StringifyOptions) -> Result<Vec<String>, OlthadError> {
        let tree = &self.traversal.olthad;
        let root = tree.snapshot(tree.root_id())?;
        let changes = self.pending_changes()?;
        Ok(render_diff(&root, &changes, opts))
    }

    /// Snapshot replacements this update would apply, keyed by node id
    fn pending_changes(&self) -> Result<HashMap<String, NodeSnapshot>, OlthadError> {
        let tree = &self.traversal.olthad;
        let mut changes = HashMap::new();
        match &self.action {
            PendingAction::ReplacePlannedSubtasks { new_nodes } => {
                let cur = self.traversal.require_cur_node()?;
                let mut replacement = tree.snapshot(cur.id())?;
                replacement.planned_subtasks = new_nodes.iter().map(NodeSnapshot::childless).collect();
                changes.insert(replacement.id.clone(), replacement);
            }
            PendingAction::SetStatusAndRetrospective {
                node_id,
                new_status,
                new_retrospective,
            } => {
                let mut replacement = tree.snapshot(node_id)?;
                replacement.status = *new_status;
                replacement.retrospective = Some(new_retrospective.clone());
                let parent_id = tree
                    .get(node_id)
                    .and_then(|node| node.parent_id().map(str::to_string));
                changes.insert(node_id.clone(), replacement);

                // The status change frees the frontier, so the next planned
                // sibling's promotion is part of the same preview.
                if let Some(parent_id) = parent_id
                    && let Some(parent) = tree.get(&parent_id)
                    && let Some(next_planned_id) = parent.planned_subtasks.first()
                {
                    let mut promoted = tree.snapshot(next_planned_id)?;
                    promoted.status = TaskStatus::InProgress;
                    changes.insert(promoted.id.clone(), promoted);
                }
            }
        }
        Ok(changes)
    }

    /// Apply the staged mutation exactly once
    pub fn commit(self) -> Result<(), OlthadError> {
        let traversal = self.traversal;
        match self.action {
            PendingAction::ReplacePlannedSubtasks { new_nodes } => {
                debug!(count = new_nodes.len(), "PendingUpdate::commit: replacing planned subtasks");
                let cur_id = traversal.require_cur_node()?.id().to_string();
                let new_ids: Vec<String> = new_nodes.iter().map(|n| n.id().to_string()).collect();
                for node in new_nodes {
                    traversal.olthad.insert(node);
                }
                let cur = traversal.olthad.get_mut(&cur_id).ok_or_else(|| {
                    OlthadError::corrupted(format!("current node '{cur_id}' is unregistered"))
                })?;
                cur.planned_subtasks = new_ids;

                traversal.restore_frontier_of(&cur_id)
            }
            PendingAction::SetStatusAndRetrospective {
                node_id,
                new_status,
                new_retrospective,
            } => {
                debug!(%node_id, %new_status, "PendingUpdate::commit: setting status and retrospective");
                let node = traversal.olthad.get_mut(&node_id).ok_or_else(|| {
                    OlthadError::corrupted(format!("node '{node_id}' is unregistered"))
                })?;
                node.status = new_status;
                node.retrospective = Some(new_retrospective);
                let parent_id = node.parent_id().map(str::to_string);

                // The node just left in-progress; its next planned sibling,
                // if any, becomes the parent's new frontier.
                match parent_id {
                    Some(parent_id) => traversal.promote_next_planned_of(&parent_id),
                    None => Ok(()),
                }
            }
        }
    }
}

impl OlthadTraversal {
    /// Promote the first planned subtask of `parent_id` to in progress,
    /// moving it onto the non-planned list; no-op without planned subtasks
    fn promote_next_planned_of(&mut self, parent_id: &str) -> Result<(), OlthadError> {
        let parent = self.olthad.get_mut(parent_id).ok_or_else(|| {
            OlthadError::corrupted(format!("node '{parent_id}' is unregistered"))
        })?;
        if parent.planned_subtasks.is_empty() {
            return Ok(());
        }
        let next_id = parent.planned_subtasks.remove(0);
        parent.non_planned_subtasks.push(next_id.clone());
        let next = self.olthad.get_mut(&next_id).ok_or_else(|| {
            OlthadError::corrupted(format!("planned subtask '{next_id}' is unregistered"))
        })?;
        next.status = TaskStatus::InProgress;
        Ok(())
    }

    /// After a planned-list replacement, make sure the node ends with an
    /// in-progress frontier subtask
    fn restore_frontier_of(&mut self, node_id: &str) -> Result<(), OlthadError> {
        let node = self.olthad.get(node_id).ok_or_else(|| {
            OlthadError::corrupted(format!("node '{node_id}' is unregistered"))
        })?;
        let frontier_intact = match node.non_planned_subtasks.last() {
            Some(last_id) => {
                let last = self.olthad.get(last_id).ok_or_else(|| {
                    OlthadError::corrupted(format!("subtask '{last_id}' is unregistered"))
                })?;
                last.status() == TaskStatus::InProgress
            }
            None => false,
        };
        if frontier_intact {
            return Ok(());
        }
        self.promote_next_planned_of(node_id)
    }
}
