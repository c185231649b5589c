//! Agent kinds and their system prompt templates.

use serde::{Deserialize, Serialize};

/// The agent a context is being built for.
///
/// Decoded once from the external tag; anything unrecognized is `Generic`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum AgentKind {
    /// Note search and organization (`memo`)
    Memo,
    /// Calendar management (`schedule`)
    Schedule,
    /// Open-ended analysis and summarizing (`amazing`)
    Amazing,
    #[default]
    Generic,
}

impl AgentKind {
    /// Decode an external agent-type tag. Case and surrounding whitespace
    /// are ignored.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "memo" => Self::Memo,
            "schedule" => Self::Schedule,
            "amazing" => Self::Amazing,
            _ => Self::Generic,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Memo => "memo",
            Self::Schedule => "schedule",
            Self::Amazing => "amazing",
            Self::Generic => "generic",
        }
    }

    /// The system prompt template for this agent.
    pub fn system_prompt(self) -> &'static str {
        match self {
            Self::Memo => {
                "You are a note-taking assistant. Help the user search, organize and manage their notes.\n\
                 Answer concisely and accurately, grounding answers in the retrieved notes first."
            }
            Self::Schedule => {
                "You are a scheduling assistant. Help the user create, query and manage calendar events.\n\
                 Interpret time expressions carefully and extract exact dates and times."
            }
            Self::Amazing => {
                "You are a general-purpose assistant. Help the user analyze problems, summarize information and give recommendations.\n\
                 Use the surrounding context to give insightful answers."
            }
            Self::Generic => {
                "You are a helpful assistant that helps the user with a wide range of tasks.\n\
                 Give accurate, useful answers based on the context provided."
            }
        }
    }
}

impl From<String> for AgentKind {
    fn from(tag: String) -> Self {
        Self::from_tag(&tag)
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
