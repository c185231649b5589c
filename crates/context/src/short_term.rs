//! Short-term memory — the recent turns of the current session.

use promptloom_core::error::SourceError;
use promptloom_core::message::{Message, Role};
use promptloom_core::source::MessageSource;

/// Default number of turns requested from the message source.
pub const DEFAULT_MAX_TURNS: usize = 10;

/// Fetches recent conversation turns and normalizes them to
/// chronological order.
#[derive(Debug, Clone)]
pub struct ShortTermExtractor {
    max_turns: usize,
}

impl Default for ShortTermExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TURNS)
    }
}

impl ShortTermExtractor {
    /// Create an extractor. Zero falls back to [`DEFAULT_MAX_TURNS`].
    pub fn new(max_turns: usize) -> Self {
        let max_turns = if max_turns == 0 {
            DEFAULT_MAX_TURNS
        } else {
            max_turns
        };
        Self { max_turns }
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    /// Fetch up to `max_turns` recent messages of `session_id`, oldest first.
    ///
    /// Without a source this is an empty success. Source errors are
    /// returned as-is; the caller decides whether they are fatal.
    pub async fn extract(
        &self,
        source: Option<&dyn MessageSource>,
        session_id: &str,
    ) -> Result<Vec<Message>, SourceError> {
        let Some(source) = source else {
            return Ok(Vec::new());
        };

        let mut messages = source.get_recent_messages(session_id, self.max_turns).await?;
        // Sources may answer newest-first or unordered.
        messages.sort_by_key(|m| m.timestamp);
        Ok(messages)
    }
}

/// Split chronologically ordered messages into the trailing `recent_count`
/// (recent) and the rest (older). Both halves keep their original order.
pub fn split_by_recency(messages: &[Message], recent_count: usize) -> (&[Message], &[Message]) {
    if messages.len() <= recent_count {
        return (messages, &[]);
    }
    let (older, recent) = messages.split_at(messages.len() - recent_count);
    (recent, older)
}

/// Render messages as a conversation transcript.
pub fn format_conversation(messages: &[Message]) -> String {
    if messages.is_empty() {
        return String::new();
    }

    let mut out = String::from("[Conversation History]\n");
    for msg in messages {
        let line = match msg.role {
            Role::User => format!("User: {}\n", msg.content),
            Role::Assistant => format!("Assistant: {}\n", msg.content),
            other => format!("{}: {}\n", other, msg.content),
        };
        out.push_str(&line);
    }
    out
}
