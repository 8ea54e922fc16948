//! Retrieval composition and turn recording
//!
//! `RecallManager` is the handle the conversational bridge calls around
//! every turn: `build_context` before inference, `record_turn` after.
//! It owns no state of its own; the store is injected and shared with
//! the decay sweeper.

use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use crate::Result;
use crate::config::MemoryConfig;
use crate::memory::{DecayStats, Memory, MemoryStore, Sector, classify};

/// Composes recall context and records finished turns
pub struct RecallManager {
    /// Shared store (the sweeper holds the other handle)
    store: Arc<Mutex<MemoryStore>>,
    config: MemoryConfig,
}

impl RecallManager {
    /// Create a manager over an already-opened store
    pub fn new(store: Arc<Mutex<MemoryStore>>, config: MemoryConfig) -> Self {
        Self { store, config }
    }

    /// Create a manager over an isolated in-memory store (for testing)
    pub fn in_memory(config: MemoryConfig) -> Result<Self> {
        let store = Arc::new(Mutex::new(MemoryStore::in_memory()?));
        Ok(Self::new(store, config))
    }

    /// Shared handle to the underlying store
    pub fn store(&self) -> Arc<Mutex<MemoryStore>> {
        Arc::clone(&self.store)
    }

    /// Compose the context block injected ahead of the next reply.
    ///
    /// Relevance hits come first, recency fills in behind them, and
    /// every surfaced memory is reinforced. Returns the empty string
    /// when nothing qualifies. A search failure degrades to
    /// recency-only results; this path never blocks a reply.
    pub fn build_context(&self, owner: &str, user_message: &str) -> String {
        let mut store = self.store.lock().unwrap();

        let relevant = match store.search(owner, user_message, self.config.relevant_limit) {
            Ok(hits) => hits,
            Err(e) => {
                warn!("Memory search failed, falling back to recency: {}", e);
                Vec::new()
            }
        };

        let recent = match store.recent(owner, self.config.recent_limit) {
            Ok(rows) => rows,
            Err(e) => {
                warn!("Recent-memory lookup failed: {}", e);
                Vec::new()
            }
        };

        let mut selected: Vec<Memory> = Vec::new();
        for memory in relevant.into_iter().chain(recent) {
            if selected.len() >= self.config.max_context {
                break;
            }
            if selected.iter().any(|m| m.id == memory.id) {
                continue;
            }
            selected.push(memory);
        }

        if selected.is_empty() {
            return String::new();
        }

        // Surfacing a memory reinforces it; that is what lets useful
        // memories outlive the decay sweep.
        for memory in &selected {
            if let Err(e) = store.touch(&memory.id) {
                warn!("Failed to reinforce memory {}: {}", memory.id, e);
            }
        }

        debug!("Injecting {} memories for owner {}", selected.len(), owner);
        format_context(&selected)
    }

    /// Persist one completed turn.
    ///
    /// The utterance is stored under its classified sector; the reply,
    /// when long enough to matter, is stored as episodic context. Store
    /// failures propagate so the caller can decide to retry or drop.
    pub fn record_turn(&self, owner: &str, user_message: &str, reply: &str) -> Result<()> {
        if classify::is_noise(user_message, &self.config.command_prefix) {
            debug!("Skipping noise turn for owner {}", owner);
            return Ok(());
        }

        let sector = classify::classify(user_message);
        let mut store = self.store.lock().unwrap();
        store.insert(owner, user_message.trim(), sector, None)?;

        // A generated reply is conversational context, never a durable
        // fact about the user.
        let reply = reply.trim();
        if reply.chars().count() > classify::MIN_PERSIST_LEN {
            store.insert(owner, reply, Sector::Episodic, None)?;
        }

        Ok(())
    }

    /// Read-only view for a "what do you remember" surface.
    /// Content is returned untruncated; display truncation is the
    /// caller's job.
    pub fn list_recent(&self, owner: &str, limit: usize) -> Result<Vec<Memory>> {
        self.store.lock().unwrap().recent(owner, limit)
    }

    /// One decay pass across all owners
    pub fn sweep_now(&self) -> Result<DecayStats> {
        self.store.lock().unwrap().decay_sweep(
            self.config.decay_rate,
            self.config.min_salience,
            chrono::Duration::hours(self.config.grace_hours),
        )
    }
}

/// One tagged line per memory under a fixed header
fn format_context(memories: &[Memory]) -> String {
    let mut block = String::from("Relevant memories from previous conversations:\n");
    for memory in memories {
        block.push_str(&format!("- [{}] {}\n", memory.sector, memory.content));
    }
    block
}
