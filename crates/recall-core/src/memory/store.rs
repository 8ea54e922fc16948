//! Memory storage implementation using SQLite
//!
//! Rows live in the `memories` table and their `content` is mirrored
//! one-to-one into the `memories_fts` FTS5 table. Every mutation writes
//! both tables inside a single transaction so the index cannot drift
//! from the store.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::{Connection, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::Result;
use crate::memory::{Memory, Sector};

/// Salience assigned to a freshly inserted memory
pub const INITIAL_SALIENCE: f64 = 1.0;

/// Salience added by each reinforcement
pub const TOUCH_BOOST: f64 = 0.1;

/// Upper bound salience can be reinforced to
pub const SALIENCE_CAP: f64 = 5.0;

/// Counts reported by a decay sweep
#[derive(Debug, Clone, Copy, Default)]
pub struct DecayStats {
    /// Rows whose salience was multiplied by the decay rate
    pub decayed: usize,
    /// Rows deleted for falling below the salience floor
    pub deleted: usize,
}

/// SQLite-based storage for memories with a mirrored FTS5 index
pub struct MemoryStore {
    conn: Connection,
}

impl MemoryStore {
    /// Create a new MemoryStore with the given database path
    pub fn new(db_path: &str) -> Result<Self> {
        debug!("Opening recall database at: {}", db_path);
        let conn = Connection::open(db_path)?;
        let store = Self { conn };
        store.init_tables()?;
        info!("MemoryStore initialized");
        Ok(store)
    }

    /// Create an in-memory MemoryStore (useful for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_tables()?;
        Ok(store)
    }

    /// Initialize database tables
    fn init_tables(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS memories (
                id TEXT PRIMARY KEY,
                owner TEXT NOT NULL,
                topic_key TEXT,
                content TEXT NOT NULL,
                sector TEXT NOT NULL,
                salience REAL NOT NULL,
                created_at TEXT NOT NULL,
                accessed_at TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_memories_owner_accessed
             ON memories(owner, accessed_at)",
            [],
        )?;

        self.conn.execute(
            "CREATE VIRTUAL TABLE IF NOT EXISTS memories_fts USING fts5(
                id UNINDEXED,
                content
            )",
            [],
        )?;

        Ok(())
    }

    /// Insert a new memory and index its content in the same transaction.
    /// Returns the store-assigned id.
    pub fn insert(
        &mut self,
        owner: &str,
        content: &str,
        sector: Sector,
        topic_key: Option<&str>,
    ) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let now = timestamp(Utc::now());

        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO memories (id, owner, topic_key, content, sector, salience, created_at, accessed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                id,
                owner,
                topic_key,
                content,
                sector.as_str(),
                INITIAL_SALIENCE,
                now,
                now
            ],
        )?;
        tx.execute(
            "INSERT INTO memories_fts (id, content) VALUES (?1, ?2)",
            params![id, content],
        )?;
        tx.commit()?;

        debug!("Inserted {} memory {} for owner {}", sector, id, owner);
        Ok(id)
    }

    /// Search an owner's memories by lexical relevance.
    ///
    /// The query is reduced to alphanumeric tokens, each extended with a
    /// prefix wildcard. A query with no usable tokens yields an empty
    /// list rather than an error.
    pub fn search(&self, owner: &str, query: &str, limit: usize) -> Result<Vec<Memory>> {
        let fts_query = match build_match_query(query) {
            Some(q) => q,
            None => return Ok(Vec::new()),
        };

        let mut stmt = self.conn.prepare(
            "SELECT m.id, m.owner, m.topic_key, m.content, m.sector, m.salience, m.created_at, m.accessed_at
             FROM memories m
             JOIN memories_fts ON memories_fts.id = m.id
             WHERE memories_fts MATCH ?1 AND m.owner = ?2
             ORDER BY memories_fts.rank
             LIMIT ?3",
        )?;

        let memories = stmt
            .query_map(params![fts_query, owner, limit as i64], row_to_memory)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        debug!("Found {} memories matching: {}", memories.len(), fts_query);
        Ok(memories)
    }

    /// List an owner's memories ordered by most recent access
    pub fn recent(&self, owner: &str, limit: usize) -> Result<Vec<Memory>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, owner, topic_key, content, sector, salience, created_at, accessed_at
             FROM memories
             WHERE owner = ?1
             ORDER BY accessed_at DESC
             LIMIT ?2",
        )?;

        let memories = stmt
            .query_map(params![owner, limit as i64], row_to_memory)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(memories)
    }

    /// Load a single memory by id, scoped to its owner
    pub fn get(&self, owner: &str, id: &str) -> Result<Option<Memory>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, owner, topic_key, content, sector, salience, created_at, accessed_at
             FROM memories
             WHERE owner = ?1 AND id = ?2",
        )?;

        let result = stmt.query_row(params![owner, id], row_to_memory);

        match result {
            Ok(memory) => Ok(Some(memory)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Reinforce a memory: refresh its access time and bump salience.
    ///
    /// One UPDATE statement, so a touch racing a decay sweep resolves to
    /// one of the two serial orders at the storage layer.
    pub fn touch(&self, id: &str) -> Result<()> {
        let now = timestamp(Utc::now());
        self.conn.execute(
            "UPDATE memories
             SET accessed_at = ?1, salience = MIN(salience + ?2, ?3)
             WHERE id = ?4",
            params![now, TOUCH_BOOST, SALIENCE_CAP, id],
        )?;
        Ok(())
    }

    /// Fade salience for every row past the grace window, then prune
    /// rows under the floor along with their index entries. Runs across
    /// all owners in one transaction.
    ///
    /// The grace boundary is inclusive; the deletion floor is strict.
    pub fn decay_sweep(
        &mut self,
        rate: f64,
        min_salience: f64,
        grace: Duration,
    ) -> Result<DecayStats> {
        let cutoff = timestamp(Utc::now() - grace);

        let tx = self.conn.transaction()?;
        let decayed = tx.execute(
            "UPDATE memories SET salience = salience * ?1 WHERE created_at <= ?2",
            params![rate, cutoff],
        )?;
        tx.execute(
            "DELETE FROM memories_fts WHERE id IN
             (SELECT id FROM memories WHERE salience < ?1)",
            params![min_salience],
        )?;
        let deleted = tx.execute(
            "DELETE FROM memories WHERE salience < ?1",
            params![min_salience],
        )?;
        tx.commit()?;

        let stats = DecayStats { decayed, deleted };
        info!(
            "Decay sweep: {} decayed, {} deleted",
            stats.decayed, stats.deleted
        );
        Ok(stats)
    }

    /// Count memories for an owner
    pub fn count(&self, owner: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM memories WHERE owner = ?1",
            params![owner],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

/// Reduce raw query text to an FTS5 MATCH expression: alphanumeric
/// tokens only, each with a prefix wildcard, OR-joined so any token can
/// contribute to relevance.
fn build_match_query(query: &str) -> Option<String> {
    let sanitized: String = query
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    let tokens: Vec<String> = sanitized
        .split_whitespace()
        .map(|t| format!("{}*", t))
        .collect();

    if tokens.is_empty() {
        None
    } else {
        Some(tokens.join(" OR "))
    }
}

fn row_to_memory(row: &rusqlite::Row<'_>) -> rusqlite::Result<Memory> {
    let sector_str: String = row.get(4)?;
    let sector = sector_str
        .parse::<Sector>()
        .map_err(|_| rusqlite::Error::InvalidQuery)?;

    let created_at = parse_timestamp(&row.get::<_, String>(6)?)?;
    let accessed_at = parse_timestamp(&row.get::<_, String>(7)?)?;

    Ok(Memory {
        id: row.get(0)?,
        owner: row.get(1)?,
        topic_key: row.get(2)?,
        content: row.get(3)?,
        sector,
        salience: row.get(5)?,
        created_at,
        accessed_at,
    })
}

/// Fixed-width RFC 3339 UTC so string comparison in SQL agrees with
/// chronological order.
fn timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| rusqlite::Error::InvalidQuery)
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: &str = "channel-123";

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    impl MemoryStore {
        fn set_salience(&self, id: &str, salience: f64) {
            self.conn
                .execute(
                    "UPDATE memories SET salience = ?1 WHERE id = ?2",
                    params![salience, id],
                )
                .unwrap();
        }

        fn backdate(&self, id: &str, age: Duration) {
            let past = timestamp(Utc::now() - age);
            self.conn
                .execute(
                    "UPDATE memories SET created_at = ?1 WHERE id = ?2",
                    params![past, id],
                )
                .unwrap();
        }

        fn set_accessed(&self, id: &str, age: Duration) {
            let past = timestamp(Utc::now() - age);
            self.conn
                .execute(
                    "UPDATE memories SET accessed_at = ?1 WHERE id = ?2",
                    params![past, id],
                )
                .unwrap();
        }
    }

    #[test]
    fn test_insert_and_get() -> Result<()> {
        let mut store = MemoryStore::in_memory()?;

        let id = store.insert(OWNER, "I prefer dark mode everywhere", Sector::Semantic, None)?;
        let memory = store.get(OWNER, &id)?.expect("memory should exist");

        assert_eq!(memory.owner, OWNER);
        assert_eq!(memory.content, "I prefer dark mode everywhere");
        assert_eq!(memory.sector, Sector::Semantic);
        assert!(approx(memory.salience, INITIAL_SALIENCE));
        assert_eq!(memory.created_at, memory.accessed_at);

        Ok(())
    }

    #[test]
    fn test_get_is_owner_scoped() -> Result<()> {
        let mut store = MemoryStore::in_memory()?;

        let id = store.insert(OWNER, "a memory that belongs to one channel", Sector::Episodic, None)?;
        assert!(store.get(OWNER, &id)?.is_some());
        assert!(store.get("channel-456", &id)?.is_none());

        Ok(())
    }

    #[test]
    fn test_insert_with_topic_key() -> Result<()> {
        let mut store = MemoryStore::in_memory()?;

        let id = store.insert(OWNER, "the project deadline is friday", Sector::Semantic, Some("work"))?;
        let memory = store.get(OWNER, &id)?.unwrap();
        assert_eq!(memory.topic_key.as_deref(), Some("work"));

        Ok(())
    }

    #[test]
    fn test_search_prefix_match() -> Result<()> {
        let mut store = MemoryStore::in_memory()?;

        store.insert(OWNER, "Rust is a systems programming language", Sector::Episodic, None)?;
        store.insert(OWNER, "Python is great for scripting", Sector::Episodic, None)?;

        // "program" should prefix-match "programming"
        let results = store.search(OWNER, "program", 10)?;
        assert_eq!(results.len(), 1);
        assert!(results[0].content.contains("Rust"));

        Ok(())
    }

    #[test]
    fn test_search_is_owner_scoped() -> Result<()> {
        let mut store = MemoryStore::in_memory()?;

        store.insert(OWNER, "the secret plan lives here", Sector::Semantic, None)?;

        let results = store.search("channel-456", "secret plan", 10)?;
        assert!(results.is_empty());

        Ok(())
    }

    #[test]
    fn test_search_garbage_query_is_empty_not_error() -> Result<()> {
        let mut store = MemoryStore::in_memory()?;
        store.insert(OWNER, "something perfectly searchable", Sector::Episodic, None)?;

        assert!(store.search(OWNER, "", 10)?.is_empty());
        assert!(store.search(OWNER, "!!! ??? ---", 10)?.is_empty());
        assert!(store.search(OWNER, "   ", 10)?.is_empty());

        Ok(())
    }

    #[test]
    fn test_search_punctuation_stripped() -> Result<()> {
        let mut store = MemoryStore::in_memory()?;
        store.insert(OWNER, "the weather forecast says rain", Sector::Episodic, None)?;

        let results = store.search(OWNER, "what's the weather?!", 10)?;
        assert_eq!(results.len(), 1);

        Ok(())
    }

    #[test]
    fn test_recent_orders_by_access() -> Result<()> {
        let mut store = MemoryStore::in_memory()?;

        let first = store.insert(OWNER, "first memory inserted", Sector::Episodic, None)?;
        let second = store.insert(OWNER, "second memory inserted", Sector::Episodic, None)?;
        store.set_accessed(&first, Duration::minutes(30));
        store.set_accessed(&second, Duration::hours(1));

        let recent = store.recent(OWNER, 10)?;
        assert_eq!(recent[0].id, first);
        assert_eq!(recent[1].id, second);

        // Reinforcement refreshes recency
        store.touch(&second)?;
        let recent = store.recent(OWNER, 10)?;
        assert_eq!(recent[0].id, second);
        assert_eq!(recent[1].id, first);

        Ok(())
    }

    #[test]
    fn test_touch_bumps_and_caps() -> Result<()> {
        let mut store = MemoryStore::in_memory()?;
        let id = store.insert(OWNER, "a memory worth reinforcing", Sector::Semantic, None)?;

        store.touch(&id)?;
        let memory = store.get(OWNER, &id)?.unwrap();
        assert!(approx(memory.salience, 1.1));
        assert!(memory.accessed_at >= memory.created_at);

        // Repeated touches converge to exactly the cap and stay there
        for _ in 0..60 {
            store.touch(&id)?;
        }
        let memory = store.get(OWNER, &id)?.unwrap();
        assert_eq!(memory.salience, SALIENCE_CAP);

        store.touch(&id)?;
        let memory = store.get(OWNER, &id)?.unwrap();
        assert_eq!(memory.salience, SALIENCE_CAP);

        Ok(())
    }

    #[test]
    fn test_decay_multiplies_salience() -> Result<()> {
        let mut store = MemoryStore::in_memory()?;
        let id = store.insert(OWNER, "a memory left to fade away", Sector::Episodic, None)?;

        let stats = store.decay_sweep(0.98, 0.1, Duration::zero())?;
        assert_eq!(stats.decayed, 1);
        assert_eq!(stats.deleted, 0);

        let memory = store.get(OWNER, &id)?.unwrap();
        assert!(approx(memory.salience, 0.98));

        Ok(())
    }

    #[test]
    fn test_decay_respects_grace_window() -> Result<()> {
        let mut store = MemoryStore::in_memory()?;

        let young = store.insert(OWNER, "a memory created moments ago", Sector::Episodic, None)?;
        let old = store.insert(OWNER, "a memory from two days back", Sector::Episodic, None)?;
        store.backdate(&old, Duration::hours(48));

        let stats = store.decay_sweep(0.5, 0.1, Duration::hours(24))?;
        assert_eq!(stats.decayed, 1);

        assert!(approx(store.get(OWNER, &young)?.unwrap().salience, 1.0));
        assert!(approx(store.get(OWNER, &old)?.unwrap().salience, 0.5));

        Ok(())
    }

    #[test]
    fn test_decay_floor_is_strict() -> Result<()> {
        let mut store = MemoryStore::in_memory()?;

        let at_floor = store.insert(OWNER, "a memory sitting exactly at the floor", Sector::Episodic, None)?;
        let below = store.insert(OWNER, "a memory just under the floor", Sector::Episodic, None)?;
        store.set_salience(&at_floor, 0.1);
        store.set_salience(&below, 0.0999);

        // rate 1.0 leaves salience untouched so the boundary is exact
        let stats = store.decay_sweep(1.0, 0.1, Duration::zero())?;
        assert_eq!(stats.deleted, 1);

        assert!(store.get(OWNER, &at_floor)?.is_some());
        assert!(store.get(OWNER, &below)?.is_none());

        Ok(())
    }

    #[test]
    fn test_prune_removes_row_and_index() -> Result<()> {
        let mut store = MemoryStore::in_memory()?;

        let id = store.insert(OWNER, "an utterly forgettable detail", Sector::Episodic, None)?;
        assert_eq!(store.search(OWNER, "forgettable", 10)?.len(), 1);

        store.set_salience(&id, 0.05);
        store.backdate(&id, Duration::hours(48));
        let stats = store.decay_sweep(0.98, 0.1, Duration::hours(24))?;
        assert_eq!(stats.deleted, 1);

        assert!(store.get(OWNER, &id)?.is_none());
        assert!(store.search(OWNER, "forgettable", 10)?.is_empty());

        Ok(())
    }

    #[test]
    fn test_reinforce_then_decay_end_to_end() -> Result<()> {
        let mut store = MemoryStore::in_memory()?;
        let id = store.insert(OWNER, "an often recalled preference", Sector::Semantic, None)?;

        for _ in 0..3 {
            store.touch(&id)?;
        }
        let memory = store.get(OWNER, &id)?.unwrap();
        assert!(approx(memory.salience, 1.3));

        store.decay_sweep(0.98, 0.1, Duration::zero())?;
        let memory = store.get(OWNER, &id)?.unwrap();
        assert!((memory.salience - 1.3 * 0.98).abs() < 1e-6);

        store.decay_sweep(0.98, 0.1, Duration::zero())?;
        let memory = store.get(OWNER, &id)?.unwrap();
        assert!((memory.salience - 1.3 * 0.98 * 0.98).abs() < 1e-6);

        Ok(())
    }

    #[test]
    fn test_count() -> Result<()> {
        let mut store = MemoryStore::in_memory()?;

        store.insert(OWNER, "one memory for the counter", Sector::Episodic, None)?;
        store.insert(OWNER, "two memories for the counter", Sector::Episodic, None)?;
        store.insert("channel-456", "someone else's memory", Sector::Episodic, None)?;

        assert_eq!(store.count(OWNER)?, 2);
        assert_eq!(store.count("channel-456")?, 1);

        Ok(())
    }

    #[test]
    fn test_on_disk_store_persists() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let db_path = dir.path().join("recall.db");
        let db_path = db_path.to_str().unwrap();

        let id = {
            let mut store = MemoryStore::new(db_path)?;
            store.insert(OWNER, "a memory that survives reopen", Sector::Semantic, None)?
        };

        let store = MemoryStore::new(db_path)?;
        let memory = store.get(OWNER, &id)?.expect("row should persist");
        assert_eq!(memory.content, "a memory that survives reopen");
        assert_eq!(store.search(OWNER, "survives", 10)?.len(), 1);

        Ok(())
    }

    #[test]
    fn test_build_match_query() {
        assert_eq!(
            build_match_query("what's the weather?").as_deref(),
            Some("what* OR s* OR the* OR weather*")
        );
        assert_eq!(build_match_query("").as_deref(), None);
        assert_eq!(build_match_query("?!?!").as_deref(), None);
    }
}
