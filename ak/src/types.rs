//! Chat message and streaming types

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Chat role of an instruct-LM message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One role-tagged message in an instruct-LM conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructLmMessage {
    pub role: Role,
    pub content: String,
}

impl InstructLmMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// One chunk of streamed LM output
///
/// `call_idx` identifies which of several parallel calls produced the chunk;
/// `None` for a lone call outside any fan-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamChunk {
    pub text: String,
    pub call_idx: Option<usize>,
}

/// Sending handle for streamed LM output
///
/// Cloneable; each clone can carry its own call index, bound at dispatch
/// time with [`with_call_idx`](LmStream::with_call_idx), so one receiver can
/// demultiplex chunks from parallel calls.
#[derive(Debug, Clone)]
pub struct LmStream {
    tx: mpsc::Sender<StreamChunk>,
    call_idx: Option<usize>,
}

impl LmStream {
    pub fn new(tx: mpsc::Sender<StreamChunk>) -> Self {
        Self { tx, call_idx: None }
    }

    /// Create a stream handle together with its receiving end
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<StreamChunk>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self::new(tx), rx)
    }

    /// A clone of this handle tagging every chunk with `call_idx`
    pub fn with_call_idx(&self, call_idx: usize) -> Self {
        Self {
            tx: self.tx.clone(),
            call_idx: Some(call_idx),
        }
    }

    pub fn call_idx(&self) -> Option<usize> {
        self.call_idx
    }

    /// Send one chunk of text downstream
    ///
    /// A closed receiver is not an error: streaming is best-effort display
    /// output and never affects the call's result.
    pub async fn send(&self, text: impl Into<String>) {
        let chunk = StreamChunk {
            text: text.into(),
            call_idx: self.call_idx,
        };
        let _ = self.tx.send(chunk).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_constructors() {
        assert_eq!(InstructLmMessage::system("be terse").role, Role::System);
        assert_eq!(InstructLmMessage::user("hello").role, Role::User);
        assert_eq!(InstructLmMessage::assistant("hi").role, Role::Assistant);
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let msg = InstructLmMessage::user("hello");
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"hello"}"#);
    }

    #[tokio::test]
    async fn test_stream_chunks_carry_bound_call_idx() {
        let (stream, mut rx) = LmStream::channel(8);
        stream.send("plain").await;
        stream.with_call_idx(3).send("tagged").await;

        let first = rx.recv().await.unwrap();
        assert_eq!(first.text, "plain");
        assert_eq!(first.call_idx, None);
        let second = rx.recv().await.unwrap();
        assert_eq!(second.text, "tagged");
        assert_eq!(second.call_idx, Some(3));
    }

    #[tokio::test]
    async fn test_send_to_dropped_receiver_is_silent() {
        let (stream, rx) = LmStream::channel(1);
        drop(rx);
        // Must not panic or hang
        stream.send("nobody listening").await;
    }
}
