//! InstructLm trait definition

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{InstructLmMessage, LmStream};

/// Errors from an instruct-LM backend
#[derive(Debug, Error)]
pub enum LmError {
    #[error("LM API error: {0}")]
    Api(String),

    #[error("invalid LM response: {0}")]
    InvalidResponse(String),
}

/// Stateless text-completion boundary
///
/// Each call is an independent conversation: the messages passed in are the
/// whole context, no state is kept between calls. When a stream handle is
/// supplied, implementations send chunks through it as they arrive and still
/// return the full completed text.
#[async_trait]
pub trait InstructLm: Send + Sync {
    async fn generate(
        &self,
        messages: &[InstructLmMessage],
        stream: Option<LmStream>,
    ) -> Result<String, LmError>;
}
