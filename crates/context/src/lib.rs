//! Token-budgeted context assembly for promptloom.
//!
//! Turns a request into a model-ready context:
//!
//! 1. **Allocate** a token budget across categories
//! 2. **Gather** the system prompt, conversation turns, episodic memories,
//!    user preferences and retrieval results as prioritized segments
//! 3. **Rank** the segments and cut them down to the budget
//! 4. **Assemble** the survivors into a [`ContextResult`]
//!
//! Every data source is optional and may fail; the service logs and
//! degrades instead of failing the build.

pub mod budget;
pub mod cache;
pub mod long_term;
pub mod priority;
pub mod prompt;
pub mod service;
pub mod short_term;
pub mod token;

pub use budget::{BudgetAllocator, TokenBudget, allocate_budget};
pub use cache::CachedPreferenceSource;
pub use long_term::{LongTermContext, LongTermExtractor};
pub use priority::{
    ContextSegment, Priority, PriorityRanker, SegmentSource, prioritize_and_truncate,
};
pub use prompt::AgentKind;
pub use service::{
    ContextAssemblyService, ContextBuilder, ContextRequest, ContextResult, ContextStats,
    RetrievalItem, TokenBreakdown,
};
pub use short_term::ShortTermExtractor;
pub use token::{estimate_tokens, truncate_to_tokens};
