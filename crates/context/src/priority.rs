//! Priority ranking and budget truncation of context segments.
//!
//! # Algorithm
//!
//! 1. Drop zero-cost segments
//! 2. Stable-sort by descending priority (input order breaks ties)
//! 3. Keep whole segments while they fit
//! 4. The first segment that does not fit is truncated into the remainder
//!    (if at least [`MIN_SEGMENT_TOKENS`] remain) and ranking stops there
//!
//! Step 4 is a greedy cut, not bin packing: a smaller segment further down
//! the list is never used to fill leftover budget.

use serde::{Deserialize, Serialize};

use crate::budget::MIN_SEGMENT_TOKENS;
use crate::token;

/// Priority tier of a context segment. Higher tiers are kept first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    OlderTurns = 40,
    Preferences = 50,
    Episodic = 60,
    Retrieval = 70,
    RecentTurns = 80,
    UserQuery = 90,
    System = 100,
}

impl Priority {
    /// Every tier, highest first.
    pub const ALL: [Priority; 7] = [
        Priority::System,
        Priority::UserQuery,
        Priority::RecentTurns,
        Priority::Retrieval,
        Priority::Episodic,
        Priority::Preferences,
        Priority::OlderTurns,
    ];

    /// Numeric weight of the tier.
    pub fn value(self) -> u8 {
        self as u8
    }
}

/// Which result category a segment is assembled into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentSource {
    System,
    ShortTerm,
    LongTerm,
    Retrieval,
    Prefs,
}

impl SegmentSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::ShortTerm => "short_term",
            Self::LongTerm => "long_term",
            Self::Retrieval => "retrieval",
            Self::Prefs => "prefs",
        }
    }
}

impl std::fmt::Display for SegmentSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A priced, prioritized piece of context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextSegment {
    pub content: String,
    pub priority: Priority,
    pub token_cost: usize,
    pub source: SegmentSource,
}

impl ContextSegment {
    /// Build a segment priced with [`token::estimate_tokens`].
    pub fn new(content: impl Into<String>, priority: Priority, source: SegmentSource) -> Self {
        let content = content.into();
        let token_cost = token::estimate_tokens(&content);
        Self {
            content,
            priority,
            token_cost,
            source,
        }
    }
}

/// Ranks segments by priority and cuts them down to a budget.
#[derive(Debug, Clone, Copy, Default)]
pub struct PriorityRanker;

impl PriorityRanker {
    pub fn new() -> Self {
        Self
    }

    pub fn rank_and_truncate(
        &self,
        segments: Vec<ContextSegment>,
        budget: usize,
    ) -> Vec<ContextSegment> {
        let mut ranked: Vec<ContextSegment> =
            segments.into_iter().filter(|s| s.token_cost > 0).collect();
        // `sort_by` is stable, so equal tiers keep input order.
        ranked.sort_by(|a, b| b.priority.cmp(&a.priority));

        let mut kept = Vec::with_capacity(ranked.len());
        let mut used = 0usize;

        for segment in ranked {
            if let Some(next) = used
                .checked_add(segment.token_cost)
                .filter(|&next| next <= budget)
            {
                used = next;
                kept.push(segment);
                continue;
            }

            let remaining = budget.saturating_sub(used);
            if remaining >= MIN_SEGMENT_TOKENS {
                let content = token::truncate_to_tokens(&segment.content, remaining);
                if !content.is_empty() {
                    kept.push(ContextSegment {
                        content,
                        token_cost: remaining,
                        ..segment
                    });
                }
            }
            break;
        }

        kept
    }
}

/// Rank and truncate with a default [`PriorityRanker`].
pub fn prioritize_and_truncate(segments: Vec<ContextSegment>, budget: usize) -> Vec<ContextSegment> {
    PriorityRanker::new().rank_and_truncate(segments, budget)
}
