//! Token budget allocation across context categories.
//!
//! The system prompt gets a fixed reservation, user preferences a fixed
//! share of the total, and the rest is split between short-term memory,
//! long-term memory and retrieval by fixed ratios that depend on whether
//! retrieval content is present.

use serde::{Deserialize, Serialize};

/// Total used when the caller passes a non-positive budget.
pub const DEFAULT_MAX_TOKENS: i64 = 4096;
/// Fixed reservation for the system prompt.
pub const DEFAULT_SYSTEM_PROMPT_TOKENS: i64 = 500;
/// Share of the total reserved for user preferences.
pub const DEFAULT_USER_PREFS_RATIO: f64 = 0.10;
/// Smallest remainder worth filling with a truncated segment.
pub const MIN_SEGMENT_TOKENS: usize = 100;

/// Ratios applied to the remaining budget: (short-term, long-term, retrieval).
const WITH_RETRIEVAL: (f64, f64, f64) = (0.40, 0.15, 0.45);
const WITHOUT_RETRIEVAL: (f64, f64, f64) = (0.55, 0.30, 0.0);

/// Token allocation plan for one build.
///
/// Allotments are signed: a pathologically small total leaves a negative
/// remainder, which shows up here as negative category allotments. The sum
/// of all allotments never exceeds `total`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBudget {
    pub total: i64,
    pub system_prompt: i64,
    pub short_term_memory: i64,
    pub long_term_memory: i64,
    pub retrieval: i64,
    pub user_prefs: i64,
}

impl TokenBudget {
    /// Sum of every category allotment.
    pub fn allocated(&self) -> i64 {
        self.system_prompt
            + self.short_term_memory
            + self.long_term_memory
            + self.retrieval
            + self.user_prefs
    }
}

/// Splits a total token budget into category allotments.
#[derive(Debug, Clone)]
pub struct BudgetAllocator {
    system_prompt_tokens: i64,
    user_prefs_ratio: f64,
}

impl Default for BudgetAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl BudgetAllocator {
    /// Create an allocator with the default reservations.
    pub fn new() -> Self {
        Self {
            system_prompt_tokens: DEFAULT_SYSTEM_PROMPT_TOKENS,
            user_prefs_ratio: DEFAULT_USER_PREFS_RATIO,
        }
    }

    /// Allocate `total` tokens. A non-positive total falls back to
    /// [`DEFAULT_MAX_TOKENS`].
    pub fn allocate(&self, total: i64, has_retrieval: bool) -> TokenBudget {
        let total = if total <= 0 { DEFAULT_MAX_TOKENS } else { total };

        let system_prompt = self.system_prompt_tokens;
        let user_prefs = share(total, self.user_prefs_ratio);
        let remaining = total - system_prompt - user_prefs;

        let (short_ratio, long_ratio, retrieval_ratio) = if has_retrieval {
            WITH_RETRIEVAL
        } else {
            WITHOUT_RETRIEVAL
        };

        let short_term_memory = share(remaining, short_ratio);
        let retrieval = share(remaining, retrieval_ratio);
        // A deficit is charged in full: long-term absorbs whatever the
        // ratios leave unassigned, so the allotments sum to `remaining`.
        let long_term_memory = if remaining < 0 {
            remaining - short_term_memory - retrieval
        } else {
            share(remaining, long_ratio)
        };

        TokenBudget {
            total,
            system_prompt,
            short_term_memory,
            long_term_memory,
            retrieval,
            user_prefs,
        }
    }
}

/// Allocate with a default [`BudgetAllocator`].
pub fn allocate_budget(total: i64, has_retrieval: bool) -> TokenBudget {
    BudgetAllocator::new().allocate(total, has_retrieval)
}

// Floors toward negative infinity so negative remainders never round up.
fn share(amount: i64, ratio: f64) -> i64 {
    (amount as f64 * ratio).floor() as i64
}
