//! In-process source implementations for promptloom.
//!
//! These back the context pipeline in tests and in embedders that keep
//! sessions in memory. Persistent stores implement the same traits from
//! `promptloom-core`.

pub mod cache;
pub mod in_memory;

pub use cache::InMemoryCache;
pub use in_memory::{InMemoryEpisodicStore, InMemoryPreferenceStore, InMemorySessionStore};
