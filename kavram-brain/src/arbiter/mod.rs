//! # Candidate Arbiter
//!
//! Turns a query, its activation result and the training history into a
//! single ranked answer.
//!
//! Every strategy proposes at most one candidate. Candidates whose texts
//! overlap by more than `cluster_threshold` (token Jaccard) form a cluster;
//! each cluster keeps its best member by
//! `confidence * 0.7 + priority * 0.3` and the best cluster wins. Equal
//! scores go to the higher-priority method.

pub mod strategies;

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use kavram_compute::{ActivationResult, AssociationStore};
use kavram_core::config::ArbiterConfig;
use kavram_core::{text, Dictionary};

use crate::memory::history::TrainingHistory;
use strategies::{default_strategies, Context, Strategy};

const CONFIDENCE_WEIGHT: f32 = 0.7;
const PRIORITY_WEIGHT: f32 = 0.3;

/// Scores closer than this are a tie
const SCORE_EPSILON: f32 = 1e-4;

/// Which strategy produced an answer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Exact,
    Dictionary,
    Reverse,
    Fuzzy,
    Activation,
    /// Nothing matched, fallback text
    None,
}

impl Method {
    /// Weight of the method in the arbitration score
    pub fn priority(self) -> f32 {
        match self {
            Method::Exact => 1.0,
            Method::Dictionary => 0.9,
            Method::Reverse => 0.8,
            Method::Fuzzy => 0.6,
            Method::Activation => 0.4,
            Method::None => 0.0,
        }
    }

    /// Tie-break rank, lower wins
    fn rank(self) -> u8 {
        match self {
            Method::Exact => 0,
            Method::Dictionary => 1,
            Method::Reverse => 2,
            Method::Fuzzy => 3,
            Method::Activation => 4,
            Method::None => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Method::Exact => "exact",
            Method::Dictionary => "dictionary",
            Method::Reverse => "reverse",
            Method::Fuzzy => "fuzzy",
            Method::Activation => "activation",
            Method::None => "none",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One strategy's proposal
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub text: String,
    pub confidence: f32,
    pub method: Method,
}

impl Candidate {
    pub fn new(text: &str, confidence: f32, method: Method) -> Self {
        Self {
            text: text.trim().to_string(),
            confidence: confidence.clamp(0.0, 1.0),
            method,
        }
    }

    pub fn score(&self) -> f32 {
        self.confidence * CONFIDENCE_WEIGHT + self.method.priority() * PRIORITY_WEIGHT
    }

    /// Ordering where `Greater` means "better answer"
    fn compare(&self, other: &Candidate) -> Ordering {
        let diff = self.score() - other.score();
        if diff.abs() > SCORE_EPSILON {
            return diff.total_cmp(&0.0);
        }
        other.method.rank().cmp(&self.method.rank())
    }
}

/// The arbiter's verdict
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub confidence: f32,
    pub method: Method,

    /// Memory-log snippets related to the query (never part of `text`)
    pub context: Vec<String>,

    /// The host should train on this answer at low weight
    pub reinforce: bool,

    /// Set by the engine once the self-reinforcing pass ran
    pub reinforced: bool,

    /// Best candidate of another cluster, if any
    pub runner_up: Option<Candidate>,

    /// Distinct candidate clusters considered
    pub clusters: usize,
}

impl Answer {
    fn from_candidate(candidate: Candidate, config: &ArbiterConfig) -> Self {
        let reinforce = config.self_reinforce
            && !matches!(candidate.method, Method::Exact | Method::Dictionary | Method::None)
            && candidate.confidence >= config.min_reinforce_confidence;
        Self {
            text: candidate.text,
            confidence: candidate.confidence,
            method: candidate.method,
            context: Vec::new(),
            reinforce,
            reinforced: false,
            runner_up: None,
            clusters: 0,
        }
    }

    /// The low-confidence "I don't know" answer
    pub fn fallback(config: &ArbiterConfig) -> Self {
        Self::from_candidate(
            Candidate::new(&config.fallback_text, config.fallback_confidence, Method::None),
            config,
        )
    }

    pub fn is_fallback(&self) -> bool {
        self.method == Method::None
    }
}

/// Runs the strategies and picks one answer
pub struct CandidateArbiter<'a> {
    config: &'a ArbiterConfig,
    strategies: Vec<Box<dyn Strategy>>,
}

impl<'a> CandidateArbiter<'a> {
    pub fn new(config: &'a ArbiterConfig) -> Self {
        Self {
            config,
            strategies: default_strategies(),
        }
    }

    /// Every non-empty proposal, in strategy order
    pub fn candidates(&self, ctx: &Context<'_>) -> Vec<Candidate> {
        self.strategies
            .iter()
            .filter_map(|strategy| {
                let candidate = strategy.propose(ctx)?;
                tracing::trace!(
                    "{} proposed '{}' ({:.2})",
                    strategy.method(),
                    candidate.text,
                    candidate.confidence
                );
                Some(candidate)
            })
            .filter(|c| !c.text.is_empty())
            .collect()
    }

    /// Group candidates by text overlap against each cluster's first member
    pub fn cluster(&self, candidates: Vec<Candidate>) -> Vec<Vec<Candidate>> {
        let mut clusters: Vec<Vec<Candidate>> = Vec::new();
        for candidate in candidates {
            let home = clusters.iter_mut().find(|cluster| {
                text::text_jaccard(&cluster[0].text, &candidate.text) > self.config.cluster_threshold
            });
            match home {
                Some(cluster) => cluster.push(candidate),
                None => clusters.push(vec![candidate]),
            }
        }
        clusters
    }

    /// Choose among candidates; `None` when there are none
    pub fn select(&self, candidates: Vec<Candidate>) -> Option<Answer> {
        let clusters = self.cluster(candidates);
        let count = clusters.len();

        let mut leaders: Vec<Candidate> = clusters
            .into_iter()
            .filter_map(|cluster| cluster.into_iter().max_by(|a, b| a.compare(b)))
            .collect();
        leaders.sort_by(|a, b| b.compare(a));

        let mut leaders = leaders.into_iter();
        let winner = leaders.next()?;
        let mut answer = Answer::from_candidate(winner, self.config);
        answer.runner_up = leaders.next();
        answer.clusters = count;
        Some(answer)
    }

    pub fn answer(
        &self,
        query: &str,
        activation: &ActivationResult,
        history: &TrainingHistory,
        store: &AssociationStore,
        dictionary: Option<&dyn Dictionary>,
    ) -> Answer {
        let ctx = Context::new(query, activation, history, store, dictionary, self.config);
        let candidates = self.candidates(&ctx);
        match self.select(candidates) {
            Some(answer) => answer,
            None => Answer::fallback(self.config),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kavram_core::Definition;
    use std::collections::HashMap;

    struct Words(HashMap<String, Definition>);

    impl Dictionary for Words {
        fn lookup_definition(&self, token: &str) -> Option<Definition> {
            self.0.get(token).cloned()
        }
    }

    fn store_for(pairs: &[(&str, &str)]) -> AssociationStore {
        let mut store = AssociationStore::new();
        for (q, r) in pairs {
            for qt in text::tokenize(q) {
                for (order, rt) in text::tokenize(r).iter().enumerate() {
                    store.upsert(&qt, rt, order as u32, 0);
                }
            }
        }
        store
    }

    #[test]
    fn test_score_and_tie_break() {
        let exact = Candidate::new("a", 0.5, Method::Exact);
        let fuzzy = Candidate::new("b", 0.5, Method::Fuzzy);
        assert!(exact.score() > fuzzy.score());
        assert_eq!(exact.compare(&fuzzy), Ordering::Greater);

        // Equal scores fall back to method rank
        let reverse = Candidate::new("c", 0.4, Method::Reverse);
        let dictionary = Candidate::new("d", 0.4 - 0.1 * PRIORITY_WEIGHT / CONFIDENCE_WEIGHT, Method::Dictionary);
        assert!((reverse.score() - dictionary.score()).abs() < 1e-5);
        assert_eq!(dictionary.compare(&reverse), Ordering::Greater);
    }

    #[test]
    fn test_clusters_keep_best_member() {
        let config = ArbiterConfig::default();
        let arbiter = CandidateArbiter::new(&config);

        let candidates = vec![
            Candidate::new("bir meyvedir", 0.5, Method::Fuzzy),
            Candidate::new("Bir meyvedir.", 0.8, Method::Activation),
            Candidate::new("ankara", 0.4, Method::Reverse),
        ];
        let clusters = arbiter.cluster(candidates.clone());
        assert_eq!(clusters.len(), 2);

        let answer = arbiter.select(candidates).unwrap();
        assert_eq!(answer.clusters, 2);
        // 0.8*0.7 + 0.4*0.3 = 0.68 beats 0.5*0.7 + 0.6*0.3 = 0.53 and 0.52
        assert_eq!(answer.method, Method::Activation);
        assert_eq!(answer.runner_up.unwrap().text, "ankara");
    }

    #[test]
    fn test_exact_wins() {
        let config = ArbiterConfig::default();
        let mut history = TrainingHistory::new();
        history.record("merhaba nasılsın", "iyiyim teşekkürler", 0);
        let store = store_for(&[("merhaba nasılsın", "iyiyim teşekkürler")]);
        let activation = ActivationResult::default();

        let answer = CandidateArbiter::new(&config).answer(
            "Merhaba, nasılsın?",
            &activation,
            &history,
            &store,
            None,
        );
        assert_eq!(answer.text, "iyiyim teşekkürler");
        assert_eq!(answer.confidence, 1.0);
        assert_eq!(answer.method, Method::Exact);
        assert!(!answer.reinforce);
    }

    #[test]
    fn test_fuzzy_and_reverse() {
        let config = ArbiterConfig::default();
        let mut history = TrainingHistory::new();
        history.record("elma nedir", "bir meyvedir", 0);
        history.record("armut nedir", "bir meyvedir", 0);
        let store = store_for(&[("elma nedir", "bir meyvedir"), ("armut nedir", "bir meyvedir")]);
        let activation = ActivationResult::default();
        let arbiter = CandidateArbiter::new(&config);

        let fuzzy = arbiter.answer("elma nedir ki", &activation, &history, &store, None);
        assert_eq!(fuzzy.method, Method::Fuzzy);
        assert_eq!(fuzzy.text, "bir meyvedir");

        let reverse = arbiter.answer("meyve nedir", &activation, &history, &store, None);
        assert_eq!(reverse.method, Method::Reverse);
        assert_eq!(reverse.text, "armut elma");
    }

    #[test]
    fn test_dictionary_strategy() {
        let config = ArbiterConfig::default();
        let mut words = HashMap::new();
        words.insert(
            "elma".to_string(),
            Definition {
                meanings: vec!["bir meyve".to_string()],
                part_of_speech: Some("isim".to_string()),
                examples: Vec::new(),
            },
        );
        let dictionary = Words(words);

        let answer = CandidateArbiter::new(&config).answer(
            "elma ne demek",
            &ActivationResult::default(),
            &TrainingHistory::new(),
            &AssociationStore::new(),
            Some(&dictionary as &dyn Dictionary),
        );
        assert_eq!(answer.method, Method::Dictionary);
        assert_eq!(answer.text, "elma (isim): bir meyve");
        assert!(!answer.reinforce);
    }

    #[test]
    fn test_fallback() {
        let config = ArbiterConfig::default();
        let answer = CandidateArbiter::new(&config).answer(
            "hiç bilinmeyen",
            &ActivationResult::default(),
            &TrainingHistory::new(),
            &AssociationStore::new(),
            None,
        );
        assert!(answer.is_fallback());
        assert_eq!(answer.text, config.fallback_text);
        assert_eq!(answer.confidence, config.fallback_confidence);
        assert_eq!(answer.method.to_string(), "none");
    }
}
