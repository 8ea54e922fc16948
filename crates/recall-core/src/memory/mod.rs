//! Memory system for recall-core
//!
//! This module provides persistent conversational recall: a SQLite row
//! store mirrored one-to-one by an FTS5 search index, sector
//! classification for inbound turns, and relevance+recency context
//! composition with salience reinforcement.

pub mod classify;
mod recall;
mod store;
mod types;

pub use recall::RecallManager;
pub use store::{DecayStats, MemoryStore, INITIAL_SALIENCE, SALIENCE_CAP, TOUCH_BOOST};
pub use types::{Memory, Sector};
