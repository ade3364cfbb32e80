//! Concurrent majority-vote aggregation over redundant agent calls

use std::collections::HashMap;

use futures::{StreamExt, stream};
use thiserror::Error;
use tracing::{debug, warn};

use crate::agent::{Agent, AgentReturn, VoteOutput};
use crate::types::LmStream;

/// Construction-time validation failures for [`VoteAggregator`]
#[derive(Debug, Error)]
pub enum VoteConfigError {
    #[error("n_calls must be at least 1, got {0}")]
    NCalls(usize),

    #[error("max_concurrent must be at least 1, got {0}")]
    MaxConcurrent(usize),
}

/// Consensus result of a fan-out vote
///
/// `returns` holds every successful call's full return in completion order,
/// winners and losers alike; `vote` and `reason` are the aggregated verdict.
#[derive(Debug, Clone)]
pub struct VoteOutcome<O: VoteOutput> {
    pub vote: O::Vote,
    pub reason: Option<String>,
    /// How many successful calls voted for the winner
    pub winning_votes: usize,
    /// Total calls dispatched, including failed ones
    pub n_calls: usize,
    pub returns: Vec<AgentReturn<O>>,
}

/// Fan-out/fan-in consensus over an agent
///
/// Dispatches `n_calls` identically-parameterized calls, at most
/// `max_concurrent` in flight at once, and majority-votes their outputs.
/// Failed calls are excluded from the tally; only a total failure is fatal.
pub struct VoteAggregator<A: Agent> {
    agent: A,
    n_calls: usize,
    max_concurrent: usize,
}

impl<A: Agent> VoteAggregator<A> {
    pub fn new(agent: A, n_calls: usize, max_concurrent: usize) -> Result<Self, VoteConfigError> {
        debug!(%n_calls, %max_concurrent, "VoteAggregator::new: called");
        if n_calls < 1 {
            return Err(VoteConfigError::NCalls(n_calls));
        }
        if max_concurrent < 1 {
            return Err(VoteConfigError::MaxConcurrent(max_concurrent));
        }
        Ok(Self {
            agent,
            n_calls,
            max_concurrent,
        })
    }

    pub fn agent(&self) -> &A {
        &self.agent
    }

    /// Run the fan-out and aggregate a consensus result
    ///
    /// Each dispatched call gets the stream handle re-tagged with its own
    /// call index, assigned at dispatch time, so chunks stay attributable
    /// regardless of completion order. All calls run to completion or
    /// failure; there is no cancellation. If every call fails, the first
    /// failure in completion order is propagated.
    pub async fn call(
        &self,
        input: A::Input,
        stream: Option<LmStream>,
    ) -> Result<VoteOutcome<A::Output>, A::Error> {
        debug!(n_calls = %self.n_calls, "VoteAggregator::call: called");
        if self.n_calls == 1 {
            let ret = self.agent.call(input, stream).await?;
            return Ok(VoteOutcome {
                vote: ret.output_data.vote(),
                reason: ret.output_data.vote_reason(),
                winning_votes: 1,
                n_calls: 1,
                returns: vec![ret],
            });
        }

        let calls = (0..self.n_calls).map(|call_idx| {
            let input = input.clone();
            let stream = stream.as_ref().map(|s| s.with_call_idx(call_idx));
            async move { self.agent.call(input, stream).await }
        });
        let results: Vec<Result<AgentReturn<A::Output>, A::Error>> = stream::iter(calls)
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;

        let mut returns = Vec::new();
        let mut first_err = None;
        for result in results {
            match result {
                Ok(ret) => returns.push(ret),
                Err(err) => {
                    warn!(error = %err, "VoteAggregator::call: one call failed, excluding it");
                    if first_err.is_none() {
                        first_err = Some(err);
                    }
                }
            }
        }
        if returns.is_empty() {
            warn!("VoteAggregator::call: every call failed, propagating the first failure");
            match first_err {
                Some(err) => return Err(err),
                // n_calls >= 1 guarantees at least one result above
                None => unreachable!("no returns and no errors from a non-empty fan-out"),
            }
        }

        Ok(self.aggregate(returns))
    }

    /// Tally votes across the successful returns and synthesize the outcome
    ///
    /// Winner is the most frequent vote; ties break to the smallest vote
    /// value by `Ord`, so the outcome is deterministic under any completion
    /// order.
    fn aggregate(&self, returns: Vec<AgentReturn<A::Output>>) -> VoteOutcome<A::Output> {
        let mut counts: HashMap<<A::Output as VoteOutput>::Vote, usize> = HashMap::new();
        for ret in &returns {
            *counts.entry(ret.output_data.vote()).or_insert(0) += 1;
        }
        let (vote, winning_votes) = counts
            .into_iter()
            .max_by(|(vote_a, count_a), (vote_b, count_b)| {
                count_a.cmp(count_b).then_with(|| vote_b.cmp(vote_a))
            })
            // returns is checked non-empty by the caller
            .unwrap_or_else(|| unreachable!("tally over at least one return"));

        let winning_reasons: Vec<String> = returns
            .iter()
            .filter(|ret| ret.output_data.vote() == vote)
            .filter_map(|ret| ret.output_data.vote_reason())
            .collect();
        let reason = if winning_reasons.is_empty() {
            None
        } else {
            Some(format!(
                "'{vote}' was chosen since, in a multi-agent vote, it received \
                 {winning_votes}/{} votes for the following reasons:\n{winning_reasons:?}",
                self.n_calls
            ))
        };

        debug!(%vote, %winning_votes, successes = returns.len(), "VoteAggregator::call: vote complete");
        VoteOutcome {
            vote,
            reason,
            winning_votes,
            n_calls: self.n_calls,
            returns,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::types::InstructLmMessage;

    #[derive(Debug, Clone)]
    struct Judgment {
        verdict: String,
        reason: Option<String>,
    }

    impl VoteOutput for Judgment {
        type Vote = String;

        fn vote(&self) -> String {
            self.verdict.clone()
        }

        fn vote_reason(&self) -> Option<String> {
            self.reason.clone()
        }
    }

    #[derive(Debug, Error)]
    #[error("scripted failure #{0}")]
    struct ScriptedError(usize);

    /// Replays a script of verdicts/failures, one entry per call in
    /// dispatch order
    struct ScriptedAgent {
        script: Vec<Result<Judgment, usize>>,
        next: AtomicUsize,
    }

    impl ScriptedAgent {
        fn new(script: Vec<Result<Judgment, usize>>) -> Self {
            Self {
                script,
                next: AtomicUsize::new(0),
            }
        }

        fn verdict(v: &str) -> Result<Judgment, usize> {
            Ok(Judgment {
                verdict: v.to_string(),
                reason: Some(format!("because {v}")),
            })
        }
    }

    #[async_trait]
    impl Agent for ScriptedAgent {
        type Input = String;
        type Output = Judgment;
        type Error = ScriptedError;

        async fn call(
            &self,
            input: String,
            stream: Option<LmStream>,
        ) -> Result<AgentReturn<Judgment>, ScriptedError> {
            if let Some(stream) = stream {
                stream.send("chunk").await;
            }
            let idx = self.next.fetch_add(1, Ordering::SeqCst);
            match self.script[idx].clone() {
                Ok(output_data) => Ok(AgentReturn {
                    output_data,
                    messages: vec![InstructLmMessage::user(input)],
                }),
                Err(marker) => Err(ScriptedError(marker)),
            }
        }
    }

    fn aggregator(script: Vec<Result<Judgment, usize>>, max_concurrent: usize) -> VoteAggregator<ScriptedAgent> {
        let n_calls = script.len();
        VoteAggregator::new(ScriptedAgent::new(script), n_calls, max_concurrent).unwrap()
    }

    #[test]
    fn test_config_validation() {
        let agent = ScriptedAgent::new(vec![]);
        assert!(matches!(
            VoteAggregator::new(agent, 0, 2),
            Err(VoteConfigError::NCalls(0))
        ));
        let agent = ScriptedAgent::new(vec![]);
        assert!(matches!(
            VoteAggregator::new(agent, 3, 0),
            Err(VoteConfigError::MaxConcurrent(0))
        ));
    }

    #[tokio::test]
    async fn test_majority_wins() {
        let agg = aggregator(
            vec![
                ScriptedAgent::verdict("A"),
                ScriptedAgent::verdict("B"),
                ScriptedAgent::verdict("A"),
                ScriptedAgent::verdict("B"),
                ScriptedAgent::verdict("A"),
            ],
            2,
        );
        let outcome = agg.call("question".to_string(), None).await.unwrap();
        assert_eq!(outcome.vote, "A");
        assert_eq!(outcome.winning_votes, 3);
        assert_eq!(outcome.n_calls, 5);
        assert_eq!(outcome.returns.len(), 5);

        let reason = outcome.reason.unwrap();
        assert!(reason.contains("'A' was chosen"));
        assert!(reason.contains("3/5 votes"));
        assert!(reason.contains("because A"));
        assert!(!reason.contains("because B"));
    }

    #[tokio::test]
    async fn test_partial_failures_are_excluded() {
        let agg = aggregator(
            vec![
                ScriptedAgent::verdict("A"),
                Err(1),
                ScriptedAgent::verdict("B"),
                Err(3),
                Err(4),
            ],
            5,
        );
        let outcome = agg.call("question".to_string(), None).await.unwrap();
        assert_eq!(outcome.returns.len(), 2);
        // 1-1 tie between A and B breaks to the smaller vote value
        assert_eq!(outcome.vote, "A");
        assert_eq!(outcome.winning_votes, 1);
    }

    #[tokio::test]
    async fn test_total_failure_propagates_first_error() {
        let agg = aggregator(vec![Err(0), Err(1), Err(2), Err(3), Err(4)], 1);
        let err = agg.call("question".to_string(), None).await.unwrap_err();
        // max_concurrent = 1 serializes the calls, so completion order is
        // dispatch order and the first failure is call 0's
        assert_eq!(err.0, 0);
    }

    #[tokio::test]
    async fn test_single_call_is_pass_through() {
        let agg = aggregator(vec![ScriptedAgent::verdict("A")], 1);
        let outcome = agg.call("question".to_string(), None).await.unwrap();
        assert_eq!(outcome.vote, "A");
        assert_eq!(outcome.n_calls, 1);
        // The call's own reason passes through unsynthesized
        assert_eq!(outcome.reason, Some("because A".to_string()));
    }

    #[tokio::test]
    async fn test_tie_breaks_to_smallest_vote() {
        let agg = aggregator(
            vec![
                ScriptedAgent::verdict("B"),
                ScriptedAgent::verdict("B"),
                ScriptedAgent::verdict("A"),
                ScriptedAgent::verdict("A"),
            ],
            4,
        );
        let outcome = agg.call("question".to_string(), None).await.unwrap();
        assert_eq!(outcome.vote, "A");
        assert_eq!(outcome.winning_votes, 2);
    }

    #[tokio::test]
    async fn test_streams_get_distinct_call_indices() {
        let agg = aggregator(
            vec![
                ScriptedAgent::verdict("A"),
                ScriptedAgent::verdict("A"),
                ScriptedAgent::verdict("A"),
            ],
            2,
        );
        let (stream, mut rx) = LmStream::channel(8);
        agg.call("question".to_string(), Some(stream)).await.unwrap();
        drop(agg);

        let mut seen = Vec::new();
        while let Some(chunk) = rx.recv().await {
            seen.push(chunk.call_idx.unwrap());
        }
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2]);
    }
}
