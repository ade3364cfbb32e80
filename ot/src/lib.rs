//! OLTHAD - Open-Language Task Hierarchies of Any Depth
//!
//! An OLTHAD is a tree of natural-language tasks of arbitrary depth, each
//! carrying a status and (once attempted) a retrospective. This crate owns
//! the tree representation plus the traversal state machine that walks and
//! mutates it.
//!
//! # Core Concepts
//!
//! - **Frontier**: at every level, at most one subtask is in progress, and it
//!   is always the last non-planned one - so the in-progress chain from the
//!   root is unique
//! - **Two-Phase Mutation**: planning and status updates are staged as
//!   [`PendingUpdate`]s that render a reviewable diff before committing
//! - **Snapshots**: read paths hand out deep [`NodeSnapshot`] copies, so
//!   renderings and previews never alias live tree state
//!
//! # Modules
//!
//! - [`status`] - task status enum and its attempted/backtracked subsets
//! - [`node`] - task nodes, the id-keyed tree registry, snapshots
//! - [`traversal`] - the traversal state machine and pending updates
//! - [`render`] - JSON-like stringification with redaction and obfuscation
//! - [`diff`] - annotated line diffs between renderings

pub mod diff;
pub mod error;
pub mod node;
pub mod render;
pub mod status;
pub mod traversal;

// Re-export commonly used types
pub use diff::diff_lines;
pub use error::OlthadError;
pub use node::{InProgressDescendants, NodeSnapshot, Olthad, ROOT_ID, TaskNode};
pub use render::{
    DEFAULT_RENDER_INDENT, OBFUSCATED_STATUS_MARKER, REDACTED_PLANS_MARKER, StringifyOptions,
    render_diff,
};
pub use status::{AttemptedStatus, BacktrackedFromStatus, TaskStatus};
pub use traversal::{OlthadTraversal, PendingUpdate};
