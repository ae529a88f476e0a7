//! In-memory dictionary adapter
//!
//! A JSON object of `token -> Definition`. No content ships with Kavram;
//! hosts point `KAVRAM_DICTIONARY` at their own file.

use std::collections::HashMap;
use std::path::Path;

use kavram_core::{text, Definition, Dictionary, KavramError, KavramResult};

#[derive(Clone, Debug, Default)]
pub struct InMemoryDictionary {
    entries: HashMap<String, Definition>,
}

impl InMemoryDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON object keyed by word
    pub fn load(path: &Path) -> KavramResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let raw: HashMap<String, Definition> = serde_json::from_str(&content)
            .map_err(|e| KavramError::config(format!("{}: {}", path.display(), e)))?;

        let mut dictionary = Self::new();
        for (word, definition) in raw {
            dictionary.insert(&word, definition);
        }
        tracing::info!("Dictionary loaded: {} entries from {}", dictionary.len(), path.display());
        Ok(dictionary)
    }

    /// Add or replace an entry (the key is normalized)
    pub fn insert(&mut self, word: &str, definition: Definition) {
        let key = text::normalize(word);
        if !key.is_empty() {
            self.entries.insert(key, definition);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Dictionary for InMemoryDictionary {
    fn lookup_definition(&self, token: &str) -> Option<Definition> {
        let key = text::normalize(token);
        self.entries
            .get(&key)
            .or_else(|| self.entries.get(text::stem(&key)))
            .cloned()
    }
}
