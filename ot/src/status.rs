//! Task status vocabulary
//!
//! Statuses serialize with the exact human-readable strings that appear in
//! rendered trees, so a status survives a render/parse round trip unchanged.

use serde::{Deserialize, Serialize};

/// All possible statuses for a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    #[serde(rename = "In progress")]
    InProgress,

    #[serde(rename = "Tentatively planned")]
    Planned,

    #[serde(rename = "Attempted (success)")]
    Success,

    #[serde(rename = "Attempted (partial success)")]
    PartialSuccess,

    #[serde(rename = "Attempted (failure)")]
    Failure,

    #[serde(rename = "Dropped")]
    Dropped,
}

impl TaskStatus {
    /// The rendered form of this status
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "In progress",
            Self::Planned => "Tentatively planned",
            Self::Success => "Attempted (success)",
            Self::PartialSuccess => "Attempted (partial success)",
            Self::Failure => "Attempted (failure)",
            Self::Dropped => "Dropped",
        }
    }

    /// True for statuses that indicate the task was attempted
    pub fn is_attempted(&self) -> bool {
        matches!(self, Self::Success | Self::PartialSuccess | Self::Failure)
    }

    /// True for statuses a task can never leave (attempted or dropped)
    pub fn is_terminal(&self) -> bool {
        self.is_attempted() || matches!(self, Self::Dropped)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Statuses that indicate that a task was attempted
///
/// This is the vocabulary an attempt-judging agent votes with; it converts
/// losslessly into [`TaskStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttemptedStatus {
    #[serde(rename = "Attempted (success)")]
    Success,

    #[serde(rename = "Attempted (partial success)")]
    PartialSuccess,

    #[serde(rename = "Attempted (failure)")]
    Failure,
}

impl From<AttemptedStatus> for TaskStatus {
    fn from(status: AttemptedStatus) -> Self {
        match status {
            AttemptedStatus::Success => TaskStatus::Success,
            AttemptedStatus::PartialSuccess => TaskStatus::PartialSuccess,
            AttemptedStatus::Failure => TaskStatus::Failure,
        }
    }
}

/// Statuses that warrant backtracking or indicate that backtracking occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BacktrackedFromStatus {
    #[serde(rename = "Attempted (success)")]
    Success,

    #[serde(rename = "Attempted (partial success)")]
    PartialSuccess,

    #[serde(rename = "Attempted (failure)")]
    Failure,

    #[serde(rename = "Dropped")]
    Dropped,
}

impl From<AttemptedStatus> for BacktrackedFromStatus {
    fn from(status: AttemptedStatus) -> Self {
        match status {
            AttemptedStatus::Success => Self::Success,
            AttemptedStatus::PartialSuccess => Self::PartialSuccess,
            AttemptedStatus::Failure => Self::Failure,
        }
    }
}

impl From<BacktrackedFromStatus> for TaskStatus {
    fn from(status: BacktrackedFromStatus) -> Self {
        match status {
            BacktrackedFromStatus::Success => TaskStatus::Success,
            BacktrackedFromStatus::PartialSuccess => TaskStatus::PartialSuccess,
            BacktrackedFromStatus::Failure => TaskStatus::Failure,
            BacktrackedFromStatus::Dropped => TaskStatus::Dropped,
        }
    }
}
