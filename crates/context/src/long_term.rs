//! Long-term memory — episodic summaries and user preferences.
//!
//! Both lookups degrade independently: a missing or failing episodic source
//! yields no episodes, a missing or failing preference source yields
//! [`UserPreferences::default`]. Extraction itself never fails.

use promptloom_core::memory::{EpisodicMemory, UserPreferences};
use promptloom_core::source::{EpisodicSource, PreferenceSource};
use tracing::warn;

/// Default number of episodes requested per build.
pub const DEFAULT_MAX_EPISODES: usize = 3;

/// Long-term context gathered for one user.
#[derive(Debug, Clone, PartialEq)]
pub struct LongTermContext {
    pub episodes: Vec<EpisodicMemory>,
    /// Always populated; the default value stands in when the source is unusable.
    pub preferences: UserPreferences,
}

/// Fetches episodic memories and preferences for a user.
#[derive(Debug, Clone)]
pub struct LongTermExtractor {
    max_episodes: usize,
}

impl Default for LongTermExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_EPISODES)
    }
}

impl LongTermExtractor {
    /// Create an extractor. Zero falls back to [`DEFAULT_MAX_EPISODES`].
    pub fn new(max_episodes: usize) -> Self {
        let max_episodes = if max_episodes == 0 {
            DEFAULT_MAX_EPISODES
        } else {
            max_episodes
        };
        Self { max_episodes }
    }

    pub fn max_episodes(&self) -> usize {
        self.max_episodes
    }

    pub async fn extract(
        &self,
        episodic: Option<&dyn EpisodicSource>,
        preferences: Option<&dyn PreferenceSource>,
        user_id: i32,
        query: &str,
    ) -> LongTermContext {
        let episodes = match episodic {
            Some(source) => match source.search_episodes(user_id, query, self.max_episodes).await {
                Ok(episodes) => episodes,
                Err(e) => {
                    warn!(user_id, error = %e, "Episodic lookup failed, continuing without episodes");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let preferences = match preferences {
            Some(source) => match source.get_preferences(user_id).await {
                Ok(prefs) => prefs,
                Err(e) => {
                    warn!(user_id, error = %e, "Preference lookup failed, using defaults");
                    UserPreferences::default()
                }
            },
            None => UserPreferences::default(),
        };

        LongTermContext {
            episodes,
            preferences,
        }
    }
}

/// Render episodes as a dated bullet list.
pub fn format_episodes(episodes: &[EpisodicMemory]) -> String {
    if episodes.is_empty() {
        return String::new();
    }

    let mut out = String::from("[Relevant History]\n");
    for episode in episodes {
        out.push_str(&format!(
            "- [{}] {}\n",
            episode.timestamp.format("%m-%d %H:%M"),
            episode.summary
        ));
    }
    out
}

/// Render the set preference fields on one line. Empty when nothing is set.
pub fn format_preferences(prefs: &UserPreferences) -> String {
    let mut parts = Vec::new();

    if !prefs.timezone.is_empty() {
        parts.push(format!("Timezone: {}", prefs.timezone));
    }
    if prefs.default_duration > 0 {
        parts.push(format!(
            "Default meeting duration: {} min",
            prefs.default_duration
        ));
    }
    if !prefs.preferred_times.is_empty() {
        parts.push(format!(
            "Preferred times: {}",
            prefs.preferred_times.join(", ")
        ));
    }
    if !prefs.communication_style.is_empty() {
        parts.push(format!(
            "Communication style: {}",
            prefs.communication_style
        ));
    }

    if parts.is_empty() {
        return String::new();
    }
    format!("[User Preferences]\n{}", parts.join(" | "))
}
