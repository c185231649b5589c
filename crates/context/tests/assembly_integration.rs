//! End-to-end tests for the context assembly pipeline.
//!
//! These wire the service to the in-memory reference stores (and to
//! deliberately broken sources) and check the assembled output.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{Duration, Utc};
use promptloom_config::ContextConfig;
use promptloom_context::{
    AgentKind, ContextAssemblyService, ContextBuilder, ContextRequest, RetrievalItem,
    estimate_tokens,
};
use promptloom_core::error::SourceError;
use promptloom_core::memory::{EpisodicMemory, UserPreferences};
use promptloom_core::message::Message;
use promptloom_core::source::{EpisodicSource, MessageSource, PreferenceSource};
use promptloom_memory::{
    InMemoryCache, InMemoryEpisodicStore, InMemoryPreferenceStore, InMemorySessionStore,
};

// ── Fixtures ─────────────────────────────────────────────────────────────

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

struct Stores {
    sessions: Arc<InMemorySessionStore>,
    episodes: Arc<InMemoryEpisodicStore>,
    prefs: Arc<InMemoryPreferenceStore>,
}

async fn seeded_stores() -> Stores {
    let sessions = InMemorySessionStore::new();
    let base = Utc::now() - Duration::hours(2);
    let turns = [
        ("user", "Create a note about the Go workshop"),
        ("assistant", "Saved the note 'Go workshop'."),
        ("user", "Add the venue: room 4B"),
        ("assistant", "Updated the note with the venue."),
        ("user", "What time does it start?"),
        ("assistant", "The workshop starts at 14:00."),
    ];
    for (i, (role, text)) in turns.iter().enumerate() {
        let msg = match *role {
            "user" => Message::user(*text),
            _ => Message::assistant(*text),
        };
        sessions
            .append("chat-42", msg.at(base + Duration::minutes(i as i64)))
            .await;
    }

    let episodes = InMemoryEpisodicStore::new();
    for (id, summary) in [
        (1, "Organized notes from the Rust meetup"),
        (2, "Scheduled the Go workshop for Friday"),
    ] {
        episodes
            .save(EpisodicMemory {
                id,
                user_id: 7,
                timestamp: base - Duration::days(id),
                summary: summary.into(),
                agent_type: "memo".into(),
                outcome: "success".into(),
            })
            .await;
    }

    let prefs = InMemoryPreferenceStore::new();
    prefs
        .set(
            7,
            UserPreferences {
                timezone: "America/New_York".into(),
                default_duration: 45,
                preferred_times: vec!["11:00".into()],
                communication_style: "detailed".into(),
            },
        )
        .await;

    Stores {
        sessions: Arc::new(sessions),
        episodes: Arc::new(episodes),
        prefs: Arc::new(prefs),
    }
}

fn wired(stores: &Stores) -> ContextAssemblyService {
    ContextAssemblyService::new(ContextConfig::default())
        .with_message_source(stores.sessions.clone())
        .with_episodic_source(stores.episodes.clone())
        .with_preference_source(stores.prefs.clone())
}

fn full_request() -> ContextRequest {
    ContextRequest::new("Go workshop")
        .with_user(7)
        .with_session("chat-42")
        .with_agent_tag("memo")
        .with_retrieval(vec![
            RetrievalItem::new("n1", "Go workshop, Friday 14:00, room 4B"),
            RetrievalItem::new("n2", "Bring a laptop with Go 1.22 installed"),
        ])
}

struct BrokenSource;

#[async_trait::async_trait]
impl MessageSource for BrokenSource {
    async fn get_recent_messages(
        &self,
        _session_id: &str,
        _limit: usize,
    ) -> Result<Vec<Message>, SourceError> {
        Err(SourceError::Unavailable("connection refused".into()))
    }
}

#[async_trait::async_trait]
impl EpisodicSource for BrokenSource {
    async fn search_episodes(
        &self,
        _user_id: i32,
        _query: &str,
        _limit: usize,
    ) -> Result<Vec<EpisodicMemory>, SourceError> {
        Err(SourceError::Timeout { timeout_ms: 200 })
    }
}

#[async_trait::async_trait]
impl PreferenceSource for BrokenSource {
    async fn get_preferences(&self, _user_id: i32) -> Result<UserPreferences, SourceError> {
        Err(SourceError::QueryFailed("syntax error".into()))
    }
}

// ── Tests ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn full_pipeline_assembles_every_category() {
    init_tracing();
    let stores = seeded_stores().await;
    let service = wired(&stores);

    let result = service.build(&full_request()).await.unwrap();

    assert_eq!(result.system_prompt, AgentKind::Memo.system_prompt());

    let conv = &result.conversation_context;
    assert!(conv.contains("User: What time does it start?"));
    assert!(conv.contains("Assistant: Saved the note 'Go workshop'."));
    assert!(conv.contains("[Relevant History]"));
    // "Go workshop" matches only one episode summary.
    assert!(conv.contains("Scheduled the Go workshop for Friday"));
    assert!(!conv.contains("Rust meetup"));

    assert!(result.retrieval_context.contains("1. Go workshop, Friday 14:00, room 4B"));
    assert!(result.retrieval_context.contains("2. Bring a laptop"));

    assert!(result.user_preferences.starts_with("[User Preferences]\n"));
    assert!(result.user_preferences.contains("Timezone: America/New_York"));
    assert!(result.user_preferences.contains("Default meeting duration: 45 min"));

    assert_eq!(result.total_tokens, result.token_breakdown.total());
    assert_eq!(
        result.token_breakdown.system_prompt,
        estimate_tokens(&result.system_prompt)
    );
    assert!(result.budget.retrieval > 0);
}

#[tokio::test]
async fn service_without_sources_still_builds() {
    let service = ContextAssemblyService::new(ContextConfig::default());
    let result = service.build(&full_request()).await.unwrap();

    assert!(!result.system_prompt.is_empty());
    assert!(result.conversation_context.is_empty());
    assert!(!result.retrieval_context.is_empty());
    assert_eq!(
        result.user_preferences,
        promptloom_context::long_term::format_preferences(&UserPreferences::default())
    );
}

#[tokio::test]
async fn broken_sources_degrade_gracefully() {
    init_tracing();
    let broken = Arc::new(BrokenSource);
    let service = ContextAssemblyService::new(ContextConfig::default())
        .with_message_source(broken.clone())
        .with_episodic_source(broken.clone())
        .with_preference_source(broken);

    let result = service.build(&full_request()).await.unwrap();

    assert!(result.conversation_context.is_empty());
    assert_eq!(result.token_breakdown.short_term_memory, 0);
    assert_eq!(result.token_breakdown.long_term_memory, 0);
    assert!(result.user_preferences.contains("Asia/Shanghai"));
    assert!(!result.retrieval_context.is_empty());
    assert_eq!(service.stats().total_builds, 1);
}

#[tokio::test]
async fn budget_is_never_exceeded() {
    let stores = seeded_stores().await;
    let service = wired(&stores);

    for max_tokens in [50, 120, 200, 400, 800, 4096] {
        let request = full_request().with_max_tokens(max_tokens);
        let result = service.build(&request).await.unwrap();
        assert!(
            result.total_tokens <= max_tokens,
            "{} tokens for a budget of {max_tokens}",
            result.total_tokens
        );
    }
}

#[tokio::test]
async fn truncated_context_keeps_highest_priorities() {
    let stores = seeded_stores().await;
    let service = wired(&stores);
    let long_note = "Workshop agenda item. ".repeat(400);
    let request = full_request()
        .with_retrieval(vec![RetrievalItem::new("big", long_note)])
        .with_max_tokens(600);

    let result = service.build(&request).await.unwrap();

    // System prompt and recent turns fit; retrieval is cut to the remainder
    // and nothing below it survives.
    assert!(!result.system_prompt.is_empty());
    assert!(result.conversation_context.contains("What time does it start?"));
    assert!(result.retrieval_context.ends_with("..."));
    assert!(!result.conversation_context.contains("[Relevant History]"));
    assert!(result.user_preferences.is_empty());
    assert_eq!(result.total_tokens, 600);
}

#[tokio::test]
async fn preference_cache_counts_hits() {
    struct CountingPrefs(AtomicUsize);

    #[async_trait::async_trait]
    impl PreferenceSource for CountingPrefs {
        async fn get_preferences(&self, _user_id: i32) -> Result<UserPreferences, SourceError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(UserPreferences::default())
        }
    }

    let prefs = Arc::new(CountingPrefs(AtomicUsize::new(0)));
    let service = ContextAssemblyService::new(ContextConfig::default())
        .with_preference_source(prefs.clone())
        .with_cache(Arc::new(InMemoryCache::new()));

    let request = ContextRequest::new("hi").with_user(9);
    for _ in 0..4 {
        service.build(&request).await.unwrap();
    }

    assert_eq!(prefs.0.load(Ordering::SeqCst), 1);
    let stats = service.stats();
    assert_eq!(stats.total_builds, 4);
    assert_eq!(stats.cache_hits, 3);
}

#[tokio::test]
async fn stats_start_at_zero() {
    let service = ContextAssemblyService::new(ContextConfig::default());
    let stats = service.stats();
    assert_eq!(stats.total_builds, 0);
    assert_eq!(stats.average_tokens, 0.0);
    assert_eq!(stats.cache_hits, 0);
    assert!(stats.average_build_time.is_zero());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_builds_share_one_service() {
    let stores = seeded_stores().await;
    let service: Arc<dyn ContextBuilder> = Arc::new(wired(&stores));

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let service = service.clone();
            tokio::spawn(async move {
                let request = full_request().with_max_tokens(1000 + i * 100);
                service.build(&request).await
            })
        })
        .collect();

    for result in futures::future::join_all(handles).await {
        let context = result.unwrap().unwrap();
        assert!(!context.system_prompt.is_empty());
    }

    let stats = service.stats();
    assert_eq!(stats.total_builds, 16);
    assert!(stats.average_tokens > 0.0);
}

#[tokio::test]
async fn request_from_json_payload() {
    let stores = seeded_stores().await;
    let service = wired(&stores);
    let request: ContextRequest = serde_json::from_str(
        r#"{
            "user_id": 7,
            "session_id": "chat-42",
            "current_query": "notes",
            "agent_type": "schedule",
            "retrieval_results": [{"id": "a", "content": "Standup at 09:30", "score": 0.91}]
        }"#,
    )
    .unwrap();

    let result = service.build(&request).await.unwrap();
    assert_eq!(result.system_prompt, AgentKind::Schedule.system_prompt());
    assert!(result.retrieval_context.contains("1. Standup at 09:30"));

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["budget"]["total"], 4096);
    assert!(json["token_breakdown"]["retrieval"].as_u64().unwrap() > 0);
}
