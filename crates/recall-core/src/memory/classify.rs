//! Sector classification for inbound turns
//!
//! Decides whether a turn is worth persisting at all and, if so,
//! whether it lands in the semantic or episodic sector.

use regex::Regex;
use std::sync::OnceLock;

use crate::memory::Sector;

/// Turns at or under this many characters are noise, not memories
pub const MIN_PERSIST_LEN: usize = 20;

/// First-person preference/fact signals that mark a turn as semantic.
/// Whole-word, case-insensitive.
const SEMANTIC_LEXICON: &str =
    r"(?i)\b(my|i am|i'm|i prefer|i like|i hate|remember|always|never|favorite)\b";

fn semantic_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(SEMANTIC_LEXICON).expect("semantic lexicon regex"))
}

/// Whether a turn should be skipped entirely: too short to carry a
/// fact, or a command addressed to the assistant rather than content.
pub fn is_noise(text: &str, command_prefix: &str) -> bool {
    let trimmed = text.trim();
    trimmed.chars().count() <= MIN_PERSIST_LEN
        || (!command_prefix.is_empty() && trimmed.starts_with(command_prefix))
}

/// Classify a persisted utterance into its sector
pub fn classify(text: &str) -> Sector {
    if semantic_re().is_match(text) {
        Sector::Semantic
    } else {
        Sector::Episodic
    }
}
