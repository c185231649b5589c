//! In-memory stores — useful for testing and ephemeral sessions.

use async_trait::async_trait;
use promptloom_core::error::SourceError;
use promptloom_core::memory::{EpisodicMemory, UserPreferences};
use promptloom_core::message::Message;
use promptloom_core::source::{EpisodicSource, MessageSource, PreferenceSource};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

// ── Sessions ──────────────────────────────────────────────────────────────

/// Conversation sessions keyed by session ID.
///
/// `get_recent_messages` answers newest-first, the way a
/// `ORDER BY timestamp DESC LIMIT n` query would.
#[derive(Default, Clone)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, Vec<Message>>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message to a session, creating the session if needed.
    pub async fn append(&self, session_id: &str, message: Message) {
        self.sessions
            .write()
            .await
            .entry(session_id.to_string())
            .or_default()
            .push(message);
    }

    /// Number of messages stored for a session.
    pub async fn len(&self, session_id: &str) -> usize {
        self.sessions
            .read()
            .await
            .get(session_id)
            .map_or(0, Vec::len)
    }
}

#[async_trait]
impl MessageSource for InMemorySessionStore {
    async fn get_recent_messages(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>, SourceError> {
        let sessions = self.sessions.read().await;
        let Some(messages) = sessions.get(session_id) else {
            return Ok(Vec::new());
        };

        let mut recent = messages.clone();
        recent.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        recent.truncate(limit);
        Ok(recent)
    }
}

// ── Episodes ──────────────────────────────────────────────────────────────

/// Episodic memories for all users, searched by keyword.
#[derive(Default, Clone)]
pub struct InMemoryEpisodicStore {
    episodes: Arc<RwLock<Vec<EpisodicMemory>>>,
}

impl InMemoryEpisodicStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an episode.
    pub async fn save(&self, episode: EpisodicMemory) {
        self.episodes.write().await.push(episode);
    }
}

#[async_trait]
impl EpisodicSource for InMemoryEpisodicStore {
    async fn search_episodes(
        &self,
        user_id: i32,
        query: &str,
        limit: usize,
    ) -> Result<Vec<EpisodicMemory>, SourceError> {
        let episodes = self.episodes.read().await;
        let query_lower = query.trim().to_lowercase();

        let mut results: Vec<EpisodicMemory> = episodes
            .iter()
            .filter(|e| e.user_id == user_id)
            .filter(|e| query_lower.is_empty() || e.summary.to_lowercase().contains(&query_lower))
            .cloned()
            .collect();

        results.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        results.truncate(limit);

        tracing::debug!(user_id, hits = results.len(), "Episodic search completed");
        Ok(results)
    }
}

// ── Preferences ───────────────────────────────────────────────────────────

/// Per-user preferences. Unknown users are reported as `NotFound`.
#[derive(Default, Clone)]
pub struct InMemoryPreferenceStore {
    preferences: Arc<RwLock<HashMap<i32, UserPreferences>>>,
}

impl InMemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set (or replace) the preferences of a user.
    pub async fn set(&self, user_id: i32, prefs: UserPreferences) {
        self.preferences.write().await.insert(user_id, prefs);
    }
}

#[async_trait]
impl PreferenceSource for InMemoryPreferenceStore {
    async fn get_preferences(&self, user_id: i32) -> Result<UserPreferences, SourceError> {
        self.preferences
            .read()
            .await
            .get(&user_id)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(format!("preferences for user {user_id}")))
    }
}
