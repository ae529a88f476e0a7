//! Training examples - the recorded (query, response) history
//!
//! Examples are the raw material of the exact and fuzzy answer
//! strategies. They are keyed by their normalized query: retraining the
//! same query with a different response replaces the response (last write
//! wins), retraining with the same response only bumps the usage counter.

use serde::{Deserialize, Serialize};

use crate::text;

/// Who asked for a training pass
///
/// Self-reinforced passes strengthen the graph with a smaller amount and
/// never record or replace an example: only the host teaches answers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrainingSource {
    /// Taught by the host through `train`
    Explicit,
    /// The engine accepting one of its own answers
    SelfReinforced,
}

impl Default for TrainingSource {
    fn default() -> Self {
        TrainingSource::Explicit
    }
}

/// A recorded training pair
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrainingExample {
    /// Query text as given
    pub query: String,

    /// Response text as given
    pub response: String,

    /// Lookup key (lower-cased, punctuation-trimmed, single-spaced)
    pub normalized_query: String,

    /// Unix millis of the last write
    pub timestamp: u64,

    /// How many times this pair was trained or matched
    pub usage: u32,
}

impl TrainingExample {
    pub fn new(query: &str, response: &str, now: u64) -> Self {
        Self {
            query: query.trim().to_string(),
            response: response.trim().to_string(),
            normalized_query: text::normalize(query),
            timestamp: now,
            usage: 1,
        }
    }

    /// Query tokens (recomputed, examples store text only)
    pub fn query_tokens(&self) -> Vec<String> {
        text::tokenize(&self.normalized_query)
    }

    /// Whether `response` is the same answer modulo case and punctuation
    pub fn same_response(&self, response: &str) -> bool {
        text::normalize(&self.response) == text::normalize(response)
    }

    /// Overwrite the response (last write wins)
    pub fn replace_response(&mut self, response: &str, now: u64) {
        self.response = response.trim().to_string();
        self.timestamp = now;
        self.usage = 1;
    }

    pub fn bump_usage(&mut self) {
        self.usage = self.usage.saturating_add(1);
    }
}
