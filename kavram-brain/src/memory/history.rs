//! Training history - examples keyed by normalized query

use std::collections::HashMap;

use kavram_core::{text, TrainingExample};

/// What recording an example did
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ExampleOutcome {
    /// First time this query was taught
    Recorded,
    /// Same query, different response (last write wins)
    Replaced,
    /// Same query, same response
    Repeated,
    /// No example was written (self-reinforced pass)
    Skipped,
}

/// Recorded examples in insertion order with an exact-query index
#[derive(Clone, Debug, Default)]
pub struct TrainingHistory {
    examples: Vec<TrainingExample>,
    index: HashMap<String, usize>,
}

impl TrainingHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert by normalized query
    pub fn record(&mut self, query: &str, response: &str, now: u64) -> ExampleOutcome {
        let key = text::normalize(query);
        match self.index.get(&key) {
            Some(&i) => {
                let example = &mut self.examples[i];
                if example.same_response(response) {
                    example.bump_usage();
                    example.timestamp = now;
                    ExampleOutcome::Repeated
                } else {
                    tracing::debug!("Example '{}' now answers '{}'", key, response.trim());
                    example.replace_response(response, now);
                    ExampleOutcome::Replaced
                }
            }
            None => {
                self.index.insert(key, self.examples.len());
                self.examples.push(TrainingExample::new(query, response, now));
                ExampleOutcome::Recorded
            }
        }
    }

    /// Example whose normalized query equals `normalized_query`
    pub fn exact(&self, normalized_query: &str) -> Option<&TrainingExample> {
        self.index.get(normalized_query).map(|&i| &self.examples[i])
    }

    /// Count a confirmed answer; false when `response` is not what the
    /// example currently says
    pub fn confirm(&mut self, query: &str, response: &str) -> bool {
        let key = text::normalize(query);
        match self.index.get(&key) {
            Some(&i) if self.examples[i].same_response(response) => {
                self.examples[i].bump_usage();
                true
            }
            _ => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrainingExample> + '_ {
        self.examples.iter()
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn to_vec(&self) -> Vec<TrainingExample> {
        self.examples.clone()
    }

    /// Rebuild from a snapshot; a repeated query keeps its latest response
    pub fn from_examples(examples: Vec<TrainingExample>) -> Self {
        let mut history = Self::new();
        for example in examples {
            match history.index.get(&example.normalized_query) {
                Some(&i) => {
                    if example.timestamp >= history.examples[i].timestamp {
                        history.examples[i] = example;
                    }
                }
                None => {
                    history.index.insert(example.normalized_query.clone(), history.examples.len());
                    history.examples.push(example);
                }
            }
        }
        history
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_write_wins() {
        let mut history = TrainingHistory::new();
        assert_eq!(history.record("Elma nedir?", "bir sebzedir", 1), ExampleOutcome::Recorded);
        assert_eq!(history.record("elma nedir", "Bir sebzedir.", 2), ExampleOutcome::Repeated);
        assert_eq!(history.record("elma nedir", "bir meyvedir", 3), ExampleOutcome::Replaced);

        assert_eq!(history.len(), 1);
        let example = history.exact("elma nedir").unwrap();
        assert_eq!(example.response, "bir meyvedir");
        assert_eq!(example.usage, 1);

        assert!(history.confirm("Elma nedir", "bir meyvedir"));
        assert!(!history.confirm("elma nedir", "bir sebzedir"));
        assert_eq!(history.exact("elma nedir").unwrap().usage, 2);
    }

    #[test]
    fn test_rebuild_keeps_latest() {
        let older = TrainingExample::new("elma nedir", "bir sebzedir", 1);
        let newer = TrainingExample::new("elma nedir", "bir meyvedir", 2);
        let history = TrainingHistory::from_examples(vec![older, newer]);
        assert_eq!(history.len(), 1);
        assert_eq!(history.exact("elma nedir").unwrap().response, "bir meyvedir");
    }
}
