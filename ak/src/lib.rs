//! Agentkit - LM-agnostic agent plumbing
//!
//! The generic framework side of the task-execution system: role-tagged chat
//! messages, the [`InstructLm`] and [`Agent`] trait boundaries, streaming
//! with per-call indices, concurrent majority voting over redundant agent
//! calls, JSON extraction from free-form LM text, and a retry helper.
//!
//! # Modules
//!
//! - [`types`] - messages, stream chunks, the indexed stream handle
//! - [`lm`] - the text-completion boundary
//! - [`agent`] - the decision-producing operation boundary
//! - [`vote`] - fan-out/fan-in majority voting
//! - [`json`] - JSON-from-free-text extraction
//! - [`retry`] - retry-on-failure wrapping

pub mod agent;
pub mod json;
pub mod lm;
pub mod retry;
pub mod types;
pub mod vote;

// Re-export commonly used types
pub use agent::{Agent, AgentReturn, VoteOutput};
pub use json::{JsonExtractError, extract_json_from_text};
pub use lm::{InstructLm, LmError};
pub use retry::with_retry;
pub use types::{InstructLmMessage, LmStream, Role, StreamChunk};
pub use vote::{VoteAggregator, VoteConfigError, VoteOutcome};
