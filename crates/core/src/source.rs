//! Source traits — the capabilities the context pipeline consumes.
//!
//! Each external collaborator is injected at construction time as an
//! `Arc<dyn …>`. Cancellation follows future-drop semantics: when the caller
//! drops a pending build, the in-flight source future is dropped with it.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::SourceError;
use crate::memory::{EpisodicMemory, UserPreferences};
use crate::message::Message;

/// Supplies recent conversation turns for a session.
///
/// Implementations are not required to return messages in any particular
/// order; callers normalize.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Fetch up to `limit` of the most recent messages of `session_id`.
    async fn get_recent_messages(
        &self,
        session_id: &str,
        limit: usize,
    ) -> std::result::Result<Vec<Message>, SourceError>;
}

/// Searches stored episodic memories of a user.
#[async_trait]
pub trait EpisodicSource: Send + Sync {
    /// Search the episodes of `user_id` relevant to `query`.
    ///
    /// An empty query returns the most recent episodes.
    async fn search_episodes(
        &self,
        user_id: i32,
        query: &str,
        limit: usize,
    ) -> std::result::Result<Vec<EpisodicMemory>, SourceError>;
}

/// Looks up durable user preferences.
#[async_trait]
pub trait PreferenceSource: Send + Sync {
    async fn get_preferences(
        &self,
        user_id: i32,
    ) -> std::result::Result<UserPreferences, SourceError>;
}

/// A byte-oriented memoization cache with per-entry TTL.
#[async_trait]
pub trait ContextCache: Send + Sync {
    /// Get a live entry, or `None` when missing or expired.
    async fn get(&self, key: &str) -> Option<Vec<u8>>;

    /// Store `value` under `key` for `ttl`.
    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> std::result::Result<(), SourceError>;
}
