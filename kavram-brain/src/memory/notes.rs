//! Recent notes - a bounded, relevance-decayed memory log
//!
//! Notes are what the engine was taught, asked and told. They are only
//! ever handed back as context snippets next to an answer.

use std::collections::VecDeque;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use kavram_core::{now_ms, text, MemoryKind, MemoryLog};

/// Notes lose half their relevance every this many milliseconds
const HALF_LIFE_MS: f64 = 24.0 * 3_600_000.0;

/// A single note
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Note {
    pub text: String,
    pub kind: MemoryKind,
    /// Tokens the note is about
    pub related: Vec<String>,
    pub timestamp: u64,
}

/// Bounded in-process `MemoryLog`
pub struct RecentMemoryLog {
    notes: Mutex<VecDeque<Note>>,
    capacity: usize,
}

impl RecentMemoryLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            notes: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.notes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.lock().is_empty()
    }

    /// Relevance of one note to a set of query tokens at time `now`
    fn relevance(note: &Note, query_tokens: &[String], now: u64) -> f32 {
        let overlap = text::jaccard(&note.related, query_tokens);
        if overlap <= 0.0 {
            return 0.0;
        }
        let age = now.saturating_sub(note.timestamp) as f64;
        let recency = 0.5f64.powf(age / HALF_LIFE_MS) as f32;
        let weight = match note.kind {
            MemoryKind::Lesson => 1.0,
            MemoryKind::Feedback => 0.9,
            MemoryKind::Answer => 0.7,
            MemoryKind::Question => 0.5,
        };
        overlap * recency * weight
    }
}

impl Default for RecentMemoryLog {
    fn default() -> Self {
        Self::new(256)
    }
}

impl MemoryLog for RecentMemoryLog {
    fn record_memory(&self, text: &str, kind: MemoryKind, related_to: &[String]) {
        let mut notes = self.notes.lock();
        if notes.len() >= self.capacity {
            notes.pop_front();
        }
        notes.push_back(Note {
            text: text.to_string(),
            kind,
            related: related_to.to_vec(),
            timestamp: now_ms(),
        });
    }

    fn relevant_memories(&self, query_text: &str) -> Vec<String> {
        let query_tokens = text::tokenize(query_text);
        if query_tokens.is_empty() {
            return Vec::new();
        }

        let now = now_ms();
        let notes = self.notes.lock();
        let mut scored: Vec<(f32, usize)> = notes
            .iter()
            .enumerate()
            .map(|(i, note)| (Self::relevance(note, &query_tokens, now), i))
            .filter(|(score, _)| *score > 0.0)
            .collect();

        // Most relevant first, newest first on ties
        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(b.1.cmp(&a.1)));

        let mut out: Vec<String> = Vec::new();
        for (_, i) in scored {
            let text = &notes[i].text;
            if !out.contains(text) {
                out.push(text.clone());
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(s: &str) -> Vec<String> {
        text::tokenize(s)
    }

    #[test]
    fn test_bounded() {
        let log = RecentMemoryLog::new(2);
        log.record_memory("bir", MemoryKind::Lesson, &tokens("bir"));
        log.record_memory("iki", MemoryKind::Lesson, &tokens("iki"));
        log.record_memory("üç", MemoryKind::Lesson, &tokens("üç"));
        assert_eq!(log.len(), 2);
        assert!(log.relevant_memories("bir").is_empty());
        assert_eq!(log.relevant_memories("üç"), vec!["üç".to_string()]);
    }

    #[test]
    fn test_relevance_order() {
        let log = RecentMemoryLog::default();
        log.record_memory("elma sordun", MemoryKind::Question, &tokens("elma nedir"));
        log.record_memory("elma bir meyvedir", MemoryKind::Lesson, &tokens("elma"));
        log.record_memory("hava güzel", MemoryKind::Lesson, &tokens("hava"));

        let found = log.relevant_memories("elma");
        assert_eq!(found, vec!["elma bir meyvedir".to_string(), "elma sordun".to_string()]);
    }
}
