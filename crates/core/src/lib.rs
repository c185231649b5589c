//! # promptloom Core
//!
//! Domain types, provider traits, and error definitions for the promptloom
//! context assembler. This crate has **no runtime dependencies** — it defines
//! the model that the memory and context crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (session store, episodic memory, preference
//! store, cache) is defined as a capability trait here. Implementations live
//! elsewhere. This enables:
//! - Injecting real or in-memory sources at construction time
//! - Easy testing with failing/stub sources
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod memory;
pub mod message;
pub mod source;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result, SourceError};
pub use memory::{EpisodicMemory, UserPreferences};
pub use message::{Message, Role};
pub use source::{ContextCache, EpisodicSource, MessageSource, PreferenceSource};
