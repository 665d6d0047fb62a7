//! Filter Gate - Word-blacklist content filtering.
//!
//! Rejects messages containing a blacklisted word as a whole token.
//! The word set is loaded from a file (one lowercase word per non-empty
//! line) and can be swapped atomically on reload.

use parking_lot::RwLock;
use regex::Regex;
use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, info};

static WORD_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w+").expect("word pattern compiles"));

/// Blacklist of forbidden words with whole-token matching.
pub struct Blacklist {
    words: RwLock<HashSet<String>>,
}

impl Blacklist {
    /// Create an empty blacklist that allows everything.
    pub fn empty() -> Self {
        Self {
            words: RwLock::new(HashSet::new()),
        }
    }

    /// Load the blacklist from a file.
    ///
    /// A missing or unreadable file yields an empty set, not an error.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let blacklist = Self::empty();
        blacklist.reload_from(path);
        blacklist
    }

    /// Re-read the word file and swap the set in a single write.
    ///
    /// Readers never observe a partially updated set. Returns the number
    /// of words loaded.
    pub fn reload_from(&self, path: impl AsRef<Path>) -> usize {
        let words = read_words(path.as_ref());
        let count = words.len();
        *self.words.write() = words;
        info!("Loaded {} blacklist words", count);
        count
    }

    /// Check whether a message passes the filter.
    ///
    /// Tokenizes into word-boundary tokens, lowercases, and rejects on
    /// any exact match. No side effects; runs in O(tokens).
    pub fn allowed(&self, text: &str) -> bool {
        let words = self.words.read();
        if words.is_empty() {
            return true;
        }
        !WORD_PATTERN
            .find_iter(text)
            .any(|token| words.contains(&token.as_str().to_lowercase()))
    }

    /// Number of words currently loaded.
    pub fn len(&self) -> usize {
        self.words.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.read().is_empty()
    }
}

fn read_words(path: &Path) -> HashSet<String> {
    match std::fs::read_to_string(path) {
        Ok(contents) => contents
            .lines()
            .map(|line| line.trim().to_lowercase())
            .filter(|line| !line.is_empty())
            .collect(),
        Err(e) => {
            debug!("Blacklist file {} not readable ({}); using empty set", path.display(), e);
            HashSet::new()
        }
    }
}
