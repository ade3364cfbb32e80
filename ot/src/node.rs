//! Task nodes and the OLTHAD arena
//!
//! The tree is stored as a flat arena keyed by dotted id ("1", "1.3",
//! "1.3.2", ...). Parent links are non-owning id lookups through the arena;
//! child links are ordered id lists held directly on each node, split into
//! the already-attempted/active prefix (`non_planned_subtasks`) and the
//! tentative future plan (`planned_subtasks`). The canonical child order is
//! always non-planned followed by planned.

use std::collections::HashMap;

use tracing::debug;

use crate::error::OlthadError;
use crate::status::TaskStatus;

/// Id of the root node of every OLTHAD
pub const ROOT_ID: &str = "1";

/// One task in the hierarchy
///
/// Field mutation goes through [`crate::OlthadTraversal`]'s update
/// operations only; reads are free.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskNode {
    pub(crate) id: String,
    pub(crate) parent_id: Option<String>,
    pub(crate) task: String,
    pub(crate) status: TaskStatus,
    pub(crate) retrospective: Option<String>,
    pub(crate) non_planned_subtasks: Vec<String>,
    pub(crate) planned_subtasks: Vec<String>,
}

impl TaskNode {
    pub(crate) fn new(
        id: impl Into<String>,
        parent_id: Option<String>,
        task: impl Into<String>,
        status: TaskStatus,
    ) -> Self {
        Self {
            id: id.into(),
            parent_id,
            task: task.into(),
            status,
            retrospective: None,
            non_planned_subtasks: Vec::new(),
            planned_subtasks: Vec::new(),
        }
    }

    /// Dotted hierarchical id, immutable once assigned
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Id of the parent node, `None` only for the root
    pub fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }

    /// Free-form task description
    pub fn task(&self) -> &str {
        &self.task
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    /// Post-mortem text, set exactly once with the terminal status transition
    pub fn retrospective(&self) -> Option<&str> {
        self.retrospective.as_deref()
    }

    /// Check whether the node is the root of an OLTHAD
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Child ids in canonical order: non-planned first, then planned
    pub fn subtask_ids(&self) -> impl Iterator<Item = &str> {
        self.non_planned_subtasks
            .iter()
            .chain(self.planned_subtasks.iter())
            .map(String::as_str)
    }

    pub fn has_subtasks(&self) -> bool {
        !self.non_planned_subtasks.is_empty() || !self.planned_subtasks.is_empty()
    }
}

/// The task-tree arena: every node currently reachable from the root,
/// keyed by id
///
/// The arena doubles as the registry the traversal prunes against. Entries
/// are only ever removed by backtracking-induced pruning.
#[derive(Debug, Clone)]
pub struct Olthad {
    nodes: HashMap<String, TaskNode>,
    root_id: String,
}

impl Olthad {
    /// Create a tree holding a single in-progress root task with id `"1"`
    pub fn new(highest_level_task: impl Into<String>) -> Self {
        let root = TaskNode::new(ROOT_ID, None, highest_level_task, TaskStatus::InProgress);
        let mut nodes = HashMap::new();
        nodes.insert(root.id.clone(), root);
        Self {
            nodes,
            root_id: ROOT_ID.to_string(),
        }
    }

    pub fn root_id(&self) -> &str {
        &self.root_id
    }

    pub fn root(&self) -> &TaskNode {
        // The root is inserted at construction and never pruned
        &self.nodes[&self.root_id]
    }

    pub fn get(&self, id: &str) -> Option<&TaskNode> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Number of registered nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut TaskNode> {
        self.nodes.get_mut(id)
    }

    pub(crate) fn insert(&mut self, node: TaskNode) {
        self.nodes.insert(node.id.clone(), node);
    }

    pub(crate) fn remove(&mut self, id: &str) -> Option<TaskNode> {
        self.nodes.remove(id)
    }

    /// Remove a node and its entire subtree from the registry
    pub(crate) fn remove_subtree(&mut self, id: &str) {
        if let Some(node) = self.nodes.remove(id) {
            for child_id in node.subtask_ids() {
                self.remove_subtree(child_id);
            }
        }
    }

    fn child(&self, parent_id: &str, child_id: &str) -> Result<&TaskNode, OlthadError> {
        self.nodes.get(child_id).ok_or_else(|| {
            OlthadError::corrupted(format!(
                "node '{parent_id}' references unregistered subtask '{child_id}'"
            ))
        })
    }

    /// Subtasks of a node in canonical order
    pub fn subtasks_of(&self, node: &TaskNode) -> Result<Vec<&TaskNode>, OlthadError> {
        node.subtask_ids()
            .map(|child_id| self.child(&node.id, child_id))
            .collect()
    }

    /// The unique in-progress subtask of a node, if any
    ///
    /// Returns `Ok(None)` when the node has no subtasks, or when every
    /// non-planned subtask is terminal and nothing is planned. Returns
    /// `Corrupted` when planned subtasks exist but the non-planned list is
    /// empty or does not end with an in-progress node - the frontier
    /// invariant does not hold.
    pub fn in_progress_subtask_of(&self, node: &TaskNode) -> Result<Option<&TaskNode>, OlthadError> {
        let Some(last_id) = node.non_planned_subtasks.last() else {
            if node.planned_subtasks.is_empty() {
                return Ok(None);
            }
            return Err(OlthadError::corrupted(format!(
                "node '{}' has planned subtasks but no non-planned subtasks",
                node.id
            )));
        };

        let last = self.child(&node.id, last_id)?;
        if last.status == TaskStatus::InProgress {
            return Ok(Some(last));
        }
        if node.planned_subtasks.is_empty() {
            return Ok(None);
        }
        Err(OlthadError::corrupted(format!(
            "last non-planned subtask '{}' of node '{}' must be in progress while planned subtasks remain",
            last.id, node.id
        )))
    }

    /// Deep immutable snapshot of a node and its entire subtree
    pub fn snapshot(&self, id: &str) -> Result<NodeSnapshot, OlthadError> {
        let node = self
            .get(id)
            .ok_or_else(|| OlthadError::usage(format!("node '{id}' not found in the registry")))?;
        self.snapshot_node(node)
    }

    fn snapshot_node(&self, node: &TaskNode) -> Result<NodeSnapshot, OlthadError> {
        let mut snap = NodeSnapshot::childless(node);
        for child_id in &node.non_planned_subtasks {
            snap.non_planned_subtasks
                .push(self.snapshot_node(self.child(&node.id, child_id)?)?);
        }
        for child_id in &node.planned_subtasks {
            snap.planned_subtasks
                .push(self.snapshot_node(self.child(&node.id, child_id)?)?);
        }
        Ok(snap)
    }

    /// Level-by-level rebuild walk from an in-progress node down to its
    /// deepest in-progress descendant
    ///
    /// Yields one pair per depth level: the partially rebuilt root (levels
    /// already visited carry their real subtask lists as snapshots, deeper
    /// levels are childless) and the childless snapshot of the in-progress
    /// node at the current depth. This lets a consumer evaluate ancestor
    /// tasks against "as much of the tree as is known so far" without
    /// peeking into not-yet-visited structure.
    ///
    /// Fails with a usage error unless the starting node is in progress.
    /// Restartable: call again for a fresh walk.
    pub fn iter_in_progress_descendants(
        &self,
        id: &str,
    ) -> Result<InProgressDescendants<'_>, OlthadError> {
        debug!(%id, "Olthad::iter_in_progress_descendants: called");
        let node = self
            .get(id)
            .ok_or_else(|| OlthadError::usage(format!("node '{id}' not found in the registry")))?;
        if node.status != TaskStatus::InProgress {
            return Err(OlthadError::usage(format!(
                "iter_in_progress_descendants requires an in-progress node, but '{}' is '{}'",
                node.id, node.status
            )));
        }

        Ok(InProgressDescendants {
            tree: self,
            rebuild: NodeSnapshot::childless(node),
            cur_live_id: Some(node.id.clone()),
            depth: 0,
            pending_err: None,
        })
    }
}

/// Explicit immutable snapshot of a node
///
/// Snapshots own their children outright, so a rebuild-in-progress can never
/// alias the live mutable tree. They are the input to rendering and the
/// currency of pending-update previews.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSnapshot {
    pub id: String,
    pub task: String,
    pub status: TaskStatus,
    pub retrospective: Option<String>,
    pub non_planned_subtasks: Vec<NodeSnapshot>,
    pub planned_subtasks: Vec<NodeSnapshot>,
}

impl NodeSnapshot {
    /// Snapshot of a node's own fields with no children attached
    pub fn childless(node: &TaskNode) -> Self {
        Self {
            id: node.id.clone(),
            task: node.task.clone(),
            status: node.status,
            retrospective: node.retrospective.clone(),
            non_planned_subtasks: Vec::new(),
            planned_subtasks: Vec::new(),
        }
    }

    /// Children in canonical order: non-planned first, then planned
    pub fn subtasks(&self) -> impl Iterator<Item = &NodeSnapshot> {
        self.non_planned_subtasks.iter().chain(self.planned_subtasks.iter())
    }

    pub fn has_subtasks(&self) -> bool {
        !self.non_planned_subtasks.is_empty() || !self.planned_subtasks.is_empty()
    }

    /// Descend `depth` levels along the last non-planned child at each level
    fn frontier_mut(&mut self, depth: usize) -> Option<&mut NodeSnapshot> {
        let mut node = self;
        for _ in 0..depth {
            node = node.non_planned_subtasks.last_mut()?;
        }
        Some(node)
    }
}

/// Iterator behind [`Olthad::iter_in_progress_descendants`]
#[derive(Debug)]
pub struct InProgressDescendants<'a> {
    tree: &'a Olthad,
    rebuild: NodeSnapshot,
    cur_live_id: Option<String>,
    depth: usize,
    pending_err: Option<OlthadError>,
}

impl Iterator for InProgressDescendants<'_> {
    type Item = Result<(NodeSnapshot, NodeSnapshot), OlthadError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(err) = self.pending_err.take() {
            self.cur_live_id = None;
            return Some(Err(err));
        }
        let live_id = self.cur_live_id.take()?;
        let Some(live) = self.tree.get(&live_id) else {
            return Some(Err(OlthadError::corrupted(format!(
                "node '{live_id}' disappeared from the registry mid-walk"
            ))));
        };

        let pair = (self.rebuild.clone(), NodeSnapshot::childless(live));

        // Advance the rebuild one level; a corruption found here surfaces on
        // the next call, after the already-valid pair is consumed.
        if live.has_subtasks() {
            match self.advance(live) {
                Ok(next_id) => self.cur_live_id = Some(next_id),
                Err(err) => self.pending_err = Some(err),
            }
        }

        Some(Ok(pair))
    }
}

impl InProgressDescendants<'_> {
    /// Attach childless copies of `live`'s subtasks to the rebuild frontier
    /// and step down to the next in-progress node
    fn advance(&mut self, live: &TaskNode) -> Result<String, OlthadError> {
        let next = self.tree.in_progress_subtask_of(live)?.ok_or_else(|| {
            OlthadError::corrupted(format!(
                "node '{}' has subtasks but no in-progress subtask to descend into",
                live.id
            ))
        })?;
        let next_id = next.id.clone();

        let attach_to = self.rebuild.frontier_mut(self.depth).ok_or_else(|| {
            OlthadError::corrupted(format!("rebuild lost its frontier at depth {}", self.depth))
        })?;
        for subtask in self.tree.subtasks_of(live)? {
            let copy = NodeSnapshot::childless(subtask);
            if subtask.status == TaskStatus::Planned {
                attach_to.planned_subtasks.push(copy);
            } else {
                attach_to.non_planned_subtasks.push(copy);
            }
        }

        self.depth += 1;
        Ok(next_id)
    }
}
