//! # Traits - Seams to External Collaborators
//!
//! The engine consults two collaborators it does not own:
//!
//! - `Dictionary`: a natural-language definition table
//! - `MemoryLog`: a relevance-decayed note store
//!
//! Both are optional. A missing dictionary entry or an empty memory log
//! is never an error, just a strategy that produced nothing.

use serde::{Deserialize, Serialize};

/// A dictionary entry
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Definition {
    /// Meanings, most common first
    pub meanings: Vec<String>,

    /// Part of speech (noun, verb, isim, fiil...)
    #[serde(default)]
    pub part_of_speech: Option<String>,

    /// Usage examples
    #[serde(default)]
    pub examples: Vec<String>,
}

/// Definition lookup
pub trait Dictionary: Send + Sync {
    /// Look up a normalized token
    fn lookup_definition(&self, token: &str) -> Option<Definition>;
}

/// What a memory-log entry records
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemoryKind {
    /// A pair the host taught
    Lesson,
    /// A question the engine was asked
    Question,
    /// An answer the engine gave
    Answer,
    /// Feedback received on an answer
    Feedback,
}

/// Contextual note store
///
/// The engine treats everything it gets back as opaque text snippets;
/// nothing here feeds the token graph.
pub trait MemoryLog: Send + Sync {
    /// Record a note with the tokens it relates to
    fn record_memory(&self, text: &str, kind: MemoryKind, related_to: &[String]);

    /// Notes relevant to a query, most relevant first
    fn relevant_memories(&self, query_text: &str) -> Vec<String>;
}
