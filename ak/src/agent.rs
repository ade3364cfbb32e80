//! Agent trait boundary
//!
//! An agent is any async operation that takes structured input and returns
//! structured output alongside the LM transcript that produced it. The
//! [`VoteOutput`] bound is what makes an agent's output countable by the
//! vote aggregator.

use std::fmt::{Debug, Display};
use std::hash::Hash;

use async_trait::async_trait;

use crate::types::{InstructLmMessage, LmStream};

/// Output payloads that carry a countable vote
pub trait VoteOutput {
    /// The hashable, orderable value the vote is tallied over
    type Vote: Clone + Eq + Hash + Ord + Debug + Display + Send;

    fn vote(&self) -> Self::Vote;

    /// Free-text justification for the vote, when the payload carries one
    fn vote_reason(&self) -> Option<String> {
        None
    }
}

/// An agent call's result: the structured output plus the conversation
/// transcript behind it
#[derive(Debug, Clone)]
pub struct AgentReturn<O> {
    pub output_data: O,
    pub messages: Vec<InstructLmMessage>,
}

/// A decision-producing async operation
///
/// Implementations hold their own LM handle and prompt machinery; callers
/// see only typed input and output. The optional stream handle forwards raw
/// LM output for display and never affects the result.
#[async_trait]
pub trait Agent: Send + Sync {
    type Input: Clone + Send + Sync;
    type Output: VoteOutput + Send;
    type Error: std::error::Error + Send;

    async fn call(
        &self,
        input: Self::Input,
        stream: Option<LmStream>,
    ) -> Result<AgentReturn<Self::Output>, Self::Error>;
}
