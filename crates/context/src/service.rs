//! Context assembly service — the orchestrating pipeline.
//!
//! One [`ContextAssemblyService::build`] call:
//!
//! 1. Allocates a [`TokenBudget`] for the request
//! 2. Adds the agent's system prompt (always present, but not exempt from truncation)
//! 3. Adds recent and older conversation turns (when a session is known)
//! 4. Adds episodic memories and preferences (when a user is known)
//! 5. Adds up to the top retrieval items
//! 6. Ranks and truncates everything against the total budget
//! 7. Groups the surviving segments into the result and records stats
//!
//! Source failures are logged and absorbed; `build` does not fail.

use async_trait::async_trait;
use promptloom_config::ContextConfig;
use promptloom_core::error::Result;
use promptloom_core::source::{ContextCache, EpisodicSource, MessageSource, PreferenceSource};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::budget::{BudgetAllocator, TokenBudget};
use crate::cache::CachedPreferenceSource;
use crate::long_term::{self, LongTermExtractor};
use crate::priority::{ContextSegment, Priority, PriorityRanker, SegmentSource};
use crate::prompt::AgentKind;
use crate::short_term::{self, ShortTermExtractor};

// ── Types ─────────────────────────────────────────────────────────────────

/// A result from the external retrieval engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalItem {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub score: f32,
    #[serde(default)]
    pub source: String,
}

impl RetrievalItem {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            score: 0.0,
            source: String::new(),
        }
    }
}

/// Parameters for one context build.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextRequest {
    /// Owning user; long-term memory is only consulted when positive.
    #[serde(default)]
    pub user_id: i32,
    /// Conversation session; short-term memory is only consulted when set.
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub current_query: String,
    #[serde(default)]
    pub agent_type: AgentKind,
    /// Retrieval results, best first.
    #[serde(default)]
    pub retrieval_results: Vec<RetrievalItem>,
    /// Total token budget; `None` or zero uses the configured default.
    #[serde(default)]
    pub max_tokens: Option<usize>,
}

impl ContextRequest {
    pub fn new(current_query: impl Into<String>) -> Self {
        Self {
            current_query: current_query.into(),
            ..Self::default()
        }
    }

    pub fn with_user(mut self, user_id: i32) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    /// Set the agent from an external tag (unknown tags become `Generic`).
    pub fn with_agent_tag(mut self, tag: &str) -> Self {
        self.agent_type = AgentKind::from_tag(tag);
        self
    }

    pub fn with_retrieval(mut self, items: Vec<RetrievalItem>) -> Self {
        self.retrieval_results = items;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Tokens consumed per category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBreakdown {
    pub system_prompt: usize,
    pub short_term_memory: usize,
    pub long_term_memory: usize,
    pub retrieval: usize,
    pub user_prefs: usize,
}

impl TokenBreakdown {
    pub fn total(&self) -> usize {
        self.system_prompt
            + self.short_term_memory
            + self.long_term_memory
            + self.retrieval
            + self.user_prefs
    }
}

/// The assembled context, ready for a model call.
#[derive(Debug, Clone, Serialize)]
pub struct ContextResult {
    pub system_prompt: String,
    /// Short-term turns and episodic memories, in priority order.
    pub conversation_context: String,
    pub retrieval_context: String,
    pub user_preferences: String,
    /// Sum of the kept segments' token costs.
    pub total_tokens: usize,
    pub token_breakdown: TokenBreakdown,
    /// The allocation computed for this build.
    pub budget: TokenBudget,
    pub build_time: Duration,
}

/// Snapshot of cumulative build statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ContextStats {
    pub total_builds: u64,
    pub average_tokens: f64,
    pub cache_hits: u64,
    pub average_build_time: Duration,
}

/// Anything that can build contexts and report on them.
#[async_trait]
pub trait ContextBuilder: Send + Sync {
    async fn build(&self, request: &ContextRequest) -> Result<ContextResult>;

    fn stats(&self) -> ContextStats;
}

// ── Service ───────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct BuildCounters {
    total_builds: AtomicU64,
    total_tokens: AtomicU64,
    total_build_ms: AtomicU64,
    cache_hits: AtomicU64,
}

/// The context assembly service. Share it behind an `Arc`; `build` takes
/// `&self` and may run concurrently.
pub struct ContextAssemblyService {
    config: ContextConfig,
    short_term: ShortTermExtractor,
    long_term: LongTermExtractor,
    ranker: PriorityRanker,
    allocator: BudgetAllocator,

    message_source: Option<Arc<dyn MessageSource>>,
    episodic_source: Option<Arc<dyn EpisodicSource>>,
    preference_source: Option<Arc<dyn PreferenceSource>>,
    cache: Option<Arc<dyn ContextCache>>,

    counters: BuildCounters,
}

impl ContextAssemblyService {
    /// Create a service with no sources attached. Zero settings in `config`
    /// are replaced with defaults.
    pub fn new(config: ContextConfig) -> Self {
        let config = config.normalized();
        Self {
            short_term: ShortTermExtractor::new(config.max_turns),
            long_term: LongTermExtractor::new(config.max_episodes),
            ranker: PriorityRanker::new(),
            allocator: BudgetAllocator::new(),
            config,
            message_source: None,
            episodic_source: None,
            preference_source: None,
            cache: None,
            counters: BuildCounters::default(),
        }
    }

    pub fn with_message_source(mut self, source: Arc<dyn MessageSource>) -> Self {
        self.message_source = Some(source);
        self
    }

    pub fn with_episodic_source(mut self, source: Arc<dyn EpisodicSource>) -> Self {
        self.episodic_source = Some(source);
        self
    }

    pub fn with_preference_source(mut self, source: Arc<dyn PreferenceSource>) -> Self {
        self.preference_source = Some(source);
        self
    }

    /// Memoize preference lookups in `cache` for the configured TTL.
    pub fn with_cache(mut self, cache: Arc<dyn ContextCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Build the context for one request.
    ///
    /// Always returns `Ok` under the current contract; the `Result` leaves
    /// room for fatal failure classes.
    pub async fn build(&self, request: &ContextRequest) -> Result<ContextResult> {
        let start = Instant::now();

        let max_tokens = request
            .max_tokens
            .filter(|&t| t > 0)
            .unwrap_or(self.config.max_tokens);
        let has_retrieval = !request.retrieval_results.is_empty();
        let budget = self
            .allocator
            .allocate(i64::try_from(max_tokens).unwrap_or(i64::MAX), has_retrieval);

        let agent = request.agent_type;
        let mut segments = vec![ContextSegment::new(
            agent.system_prompt(),
            Priority::System,
            SegmentSource::System,
        )];

        self.push_short_term(&mut segments, &request.session_id).await;

        if request.user_id > 0 {
            self.push_long_term(&mut segments, request.user_id, &request.current_query)
                .await;
        }

        if has_retrieval {
            segments.push(ContextSegment::new(
                format_retrieval(&request.retrieval_results, self.config.max_retrieval_items),
                Priority::Retrieval,
                SegmentSource::Retrieval,
            ));
        }

        let candidates = segments.len();
        let kept = self
            .ranker
            .rank_and_truncate(segments, usize::try_from(budget.total).unwrap_or(0));

        let mut result = assemble_result(&kept, budget);
        result.build_time = start.elapsed();

        self.record(&result);

        debug!(
            agent = %agent,
            candidates,
            kept = kept.len(),
            total_tokens = result.total_tokens,
            budget = budget.total,
            elapsed_ms = result.build_time.as_millis() as u64,
            "Context built"
        );

        Ok(result)
    }

    /// Snapshot of the cumulative counters. Zero before the first build.
    pub fn stats(&self) -> ContextStats {
        let builds = self.counters.total_builds.load(Ordering::Relaxed);
        if builds == 0 {
            return ContextStats::default();
        }

        let tokens = self.counters.total_tokens.load(Ordering::Relaxed);
        let build_ms = self.counters.total_build_ms.load(Ordering::Relaxed);
        ContextStats {
            total_builds: builds,
            average_tokens: tokens as f64 / builds as f64,
            cache_hits: self.counters.cache_hits.load(Ordering::Relaxed),
            average_build_time: Duration::from_millis(build_ms / builds),
        }
    }

    async fn push_short_term(&self, segments: &mut Vec<ContextSegment>, session_id: &str) {
        let Some(source) = self.message_source.as_deref() else {
            return;
        };
        if session_id.is_empty() {
            return;
        }

        let messages = match self.short_term.extract(Some(source), session_id).await {
            Ok(messages) => messages,
            Err(e) => {
                warn!(session_id, error = %e, "Failed to extract short-term memory");
                return;
            }
        };

        let (recent, older) = short_term::split_by_recency(&messages, self.config.recent_turns);
        if !recent.is_empty() {
            segments.push(ContextSegment::new(
                short_term::format_conversation(recent),
                Priority::RecentTurns,
                SegmentSource::ShortTerm,
            ));
        }
        if !older.is_empty() {
            segments.push(ContextSegment::new(
                short_term::format_conversation(older),
                Priority::OlderTurns,
                SegmentSource::ShortTerm,
            ));
        }
    }

    async fn push_long_term(&self, segments: &mut Vec<ContextSegment>, user_id: i32, query: &str) {
        let cached;
        let preferences: Option<&dyn PreferenceSource> =
            match (self.preference_source.as_deref(), self.cache.as_deref()) {
                (Some(inner), Some(cache)) => {
                    cached = CachedPreferenceSource::new(
                        inner,
                        cache,
                        self.config.cache_ttl(),
                        &self.counters.cache_hits,
                    );
                    Some(&cached as &dyn PreferenceSource)
                }
                (inner, _) => inner,
            };

        let context = self
            .long_term
            .extract(self.episodic_source.as_deref(), preferences, user_id, query)
            .await;

        if !context.episodes.is_empty() {
            segments.push(ContextSegment::new(
                long_term::format_episodes(&context.episodes),
                Priority::Episodic,
                SegmentSource::LongTerm,
            ));
        }

        let prefs_text = long_term::format_preferences(&context.preferences);
        if !prefs_text.is_empty() {
            segments.push(ContextSegment::new(
                prefs_text,
                Priority::Preferences,
                SegmentSource::Prefs,
            ));
        }
    }

    fn record(&self, result: &ContextResult) {
        let elapsed_ms = u64::try_from(result.build_time.as_millis()).unwrap_or(u64::MAX);
        self.counters.total_builds.fetch_add(1, Ordering::Relaxed);
        self.counters
            .total_tokens
            .fetch_add(result.total_tokens as u64, Ordering::Relaxed);
        self.counters
            .total_build_ms
            .fetch_add(elapsed_ms, Ordering::Relaxed);
    }
}

#[async_trait]
impl ContextBuilder for ContextAssemblyService {
    async fn build(&self, request: &ContextRequest) -> Result<ContextResult> {
        ContextAssemblyService::build(self, request).await
    }

    fn stats(&self) -> ContextStats {
        ContextAssemblyService::stats(self)
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────

/// Render the first `limit` retrieval items as a numbered list.
pub fn format_retrieval(items: &[RetrievalItem], limit: usize) -> String {
    if items.is_empty() {
        return String::new();
    }

    let mut out = String::from("[Retrieved Knowledge]\n");
    for (i, item) in items.iter().take(limit).enumerate() {
        out.push_str(&format!("{}. {}\n", i + 1, item.content));
    }
    out
}

fn assemble_result(segments: &[ContextSegment], budget: TokenBudget) -> ContextResult {
    let mut breakdown = TokenBreakdown::default();
    let mut system_prompt = String::new();
    let mut conversation = String::new();
    let mut retrieval = String::new();
    let mut prefs = String::new();

    for segment in segments {
        let (text, tokens) = match segment.source {
            SegmentSource::System => (&mut system_prompt, &mut breakdown.system_prompt),
            SegmentSource::ShortTerm => (&mut conversation, &mut breakdown.short_term_memory),
            SegmentSource::LongTerm => (&mut conversation, &mut breakdown.long_term_memory),
            SegmentSource::Retrieval => (&mut retrieval, &mut breakdown.retrieval),
            SegmentSource::Prefs => (&mut prefs, &mut breakdown.user_prefs),
        };
        text.push_str(&segment.content);
        *tokens += segment.token_cost;
    }

    ContextResult {
        system_prompt,
        conversation_context: conversation,
        retrieval_context: retrieval,
        user_preferences: prefs,
        total_tokens: breakdown.total(),
        token_breakdown: breakdown,
        budget,
        build_time: Duration::ZERO,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
