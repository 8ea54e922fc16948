//! Memory type definitions for recall-core

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Classification of a stored memory
///
/// Semantic memories are durable facts or preferences about the user;
/// episodic memories are transient conversational context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sector {
    Semantic,
    Episodic,
}

impl Sector {
    /// Stable string form used in the database and context labels
    pub fn as_str(&self) -> &'static str {
        match self {
            Sector::Semantic => "semantic",
            Sector::Episodic => "episodic",
        }
    }
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "semantic" => Ok(Sector::Semantic),
            "episodic" => Ok(Sector::Episodic),
            other => Err(Error::Other(format!("unknown sector: {}", other))),
        }
    }
}

/// A memory entry owned by a single conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    /// Store-assigned unique identifier
    pub id: String,
    /// Conversation/channel identifier that scopes all access
    pub owner: String,
    /// Optional free-form grouping tag
    pub topic_key: Option<String>,
    /// The remembered text
    pub content: String,
    /// Semantic (durable) or episodic (transient)
    pub sector: Sector,
    /// Recall strength in [0.0, 5.0]
    pub salience: f64,
    /// When the memory was created (immutable)
    pub created_at: DateTime<Utc>,
    /// Last reinforcement time
    pub accessed_at: DateTime<Utc>,
}
