//! Long-term memory types — episodic summaries and durable user preferences.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored summary of a past interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodicMemory {
    /// Storage ID of the episode
    pub id: i64,

    /// Owning user
    pub user_id: i32,

    /// When the interaction happened
    pub timestamp: DateTime<Utc>,

    /// Free-text summary of what happened
    pub summary: String,

    /// Agent that handled the interaction (memo/schedule/amazing/...)
    #[serde(default)]
    pub agent_type: String,

    /// Outcome tag (success/failure)
    #[serde(default)]
    pub outcome: String,
}

/// Durable per-user preferences.
///
/// [`UserPreferences::default`] is the value substituted whenever the
/// preference source is missing or failing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPreferences {
    /// IANA timezone name
    #[serde(default)]
    pub timezone: String,

    /// Default meeting duration in minutes
    #[serde(default)]
    pub default_duration: u32,

    /// Preferred times of day, e.g. `["09:00", "14:00"]`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preferred_times: Vec<String>,

    /// Communication style (concise/detailed)
    #[serde(default)]
    pub communication_style: String,
}

impl UserPreferences {
    /// Preferences with every field unset.
    pub fn empty() -> Self {
        Self {
            timezone: String::new(),
            default_duration: 0,
            preferred_times: Vec::new(),
            communication_style: String::new(),
        }
    }

    /// True when no field carries a value.
    pub fn is_empty(&self) -> bool {
        self.timezone.is_empty()
            && self.default_duration == 0
            && self.preferred_times.is_empty()
            && self.communication_style.is_empty()
    }
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            timezone: "Asia/Shanghai".into(),
            default_duration: 60,
            preferred_times: vec!["09:00".into(), "14:00".into()],
            communication_style: "concise".into(),
        }
    }
}
