//! # Engine - Kavram's Shared State
//!
//! `EngineState` owns both grids, the association store and the training
//! history. It is the only thing that mutates any of them.
//!
//! Randomness (connection exploration, eviction ties) is drawn from a
//! source derived per training pass from the seed and the persisted pass
//! counters, so a restored engine continues exactly like the saved one.
//!
//! `Engine` is what hosts hold: the state behind a `parking_lot::RwLock`
//! plus a version counter. Training, feedback, decay and restore take the
//! write lock; asking, propagation, snapshots and statistics share the
//! read lock, so a query never sees a half-applied training pair.

mod feedback;
mod training;

pub use feedback::FeedbackReport;
pub use training::TrainingSummary;

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use kavram_compute::{ActivationEngine, ActivationResult, AssociationStore, DecayReport, TokenGrid};
use kavram_core::{
    now_ms, text, Dictionary, KavramConfig, KavramError, KavramResult, MemoryKind, MemoryLog,
    Side, TrainingSource, SNAPSHOT_VERSION,
};

use crate::arbiter::{Answer, CandidateArbiter};
use crate::memory::history::TrainingHistory;
use crate::memory::Snapshot;

/// Lifetime counters (persisted with snapshots)
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct EngineCounters {
    pub trainings: u64,
    pub self_reinforcements: u64,
    pub rejected_inputs: u64,
    pub queries: u64,
    pub no_seed: u64,
    pub feedback_positive: u64,
    pub feedback_negative: u64,
    pub not_found: u64,
    pub decay_passes: u64,
    /// Malformed associations dropped while restoring
    pub healed_associations: u64,
}

/// Point-in-time statistics
#[derive(Serialize, Clone, Debug)]
pub struct EngineStats {
    pub counters: EngineCounters,
    pub examples: usize,
    pub query_nodes: usize,
    pub response_nodes: usize,
    pub associations: usize,
    pub query_evictions: u64,
    pub response_evictions: u64,
    pub avg_query_connections: f32,
    pub avg_response_connections: f32,
    pub version: u64,
}

/// Spreads consecutive pass numbers across the seed space
const PASS_SEED_MIX: u64 = 0x9E37_79B9_7F4A_7C15;

/// Everything the engine knows
pub struct EngineState {
    config: KavramConfig,
    query_grid: TokenGrid,
    response_grid: TokenGrid,
    store: AssociationStore,
    history: TrainingHistory,
    counters: EngineCounters,
}

impl EngineState {
    pub fn new(config: KavramConfig) -> KavramResult<Self> {
        config.validate()?;
        Ok(Self {
            query_grid: TokenGrid::new(Side::Query, &config.grid),
            response_grid: TokenGrid::new(Side::Response, &config.grid),
            store: AssociationStore::new(),
            history: TrainingHistory::new(),
            counters: EngineCounters::default(),
            config,
        })
    }

    /// Rebuild state from a snapshot
    ///
    /// Associations are kept even when their tokens were evicted from the
    /// grids. Only malformed entries (a token that is not a single
    /// normalized token) are dropped, with a warning.
    pub fn from_snapshot(config: KavramConfig, snapshot: Snapshot) -> KavramResult<Self> {
        config.validate()?;
        if snapshot.version > SNAPSHOT_VERSION {
            return Err(KavramError::snapshot(format!(
                "format version {} is newer than {}",
                snapshot.version, SNAPSHOT_VERSION
            )));
        }

        let query_grid = TokenGrid::from_layers(
            Side::Query,
            &config.grid,
            snapshot.query_layers,
            snapshot.query_evictions,
        )?;
        let response_grid = TokenGrid::from_layers(
            Side::Response,
            &config.grid,
            snapshot.response_layers,
            snapshot.response_evictions,
        )?;
        let history = TrainingHistory::from_examples(snapshot.examples);
        let mut store = AssociationStore::from_associations(snapshot.associations);
        let mut counters = snapshot.stats;

        let dropped = store.retain_tokens(is_single_token);
        if dropped > 0 {
            tracing::warn!("Dropped {} malformed association(s) while restoring", dropped);
            counters.healed_associations += dropped as u64;
        }

        Ok(Self {
            config,
            query_grid,
            response_grid,
            store,
            history,
            counters,
        })
    }

    /// Capture everything, with `counters` as the lifetime statistics
    pub fn to_snapshot(&self, counters: EngineCounters) -> Snapshot {
        Snapshot {
            version: SNAPSHOT_VERSION,
            saved_at: now_ms(),
            query_layers: self.query_grid.layers_snapshot(),
            response_layers: self.response_grid.layers_snapshot(),
            query_evictions: self.query_grid.evictions(),
            response_evictions: self.response_grid.evictions(),
            associations: self.store.to_vec(),
            examples: self.history.to_vec(),
            stats: counters,
        }
    }

    pub fn config(&self) -> &KavramConfig {
        &self.config
    }

    /// Random source of the next training pass
    fn pass_rng(&self) -> StdRng {
        let passes = self.counters.trainings + self.counters.self_reinforcements;
        StdRng::seed_from_u64(self.config.seed ^ passes.wrapping_mul(PASS_SEED_MIX))
    }

    pub fn query_grid(&self) -> &TokenGrid {
        &self.query_grid
    }

    pub fn response_grid(&self) -> &TokenGrid {
        &self.response_grid
    }

    pub fn store(&self) -> &AssociationStore {
        &self.store
    }

    pub fn history(&self) -> &TrainingHistory {
        &self.history
    }

    pub fn counters(&self) -> &EngineCounters {
        &self.counters
    }

    pub fn activation(&self) -> ActivationEngine<'_> {
        ActivationEngine::new(
            &self.query_grid,
            &self.response_grid,
            &self.store,
            &self.config.activation,
        )
    }

    /// Activation for a query, then arbitration
    ///
    /// Question words only seed propagation when the query has nothing
    /// else.
    pub fn answer(
        &self,
        query: &str,
        dictionary: Option<&dyn Dictionary>,
    ) -> (Answer, ActivationResult) {
        let tokens = text::tokenize(query);
        let mut seeds: Vec<&str> = tokens
            .iter()
            .map(String::as_str)
            .filter(|t| !text::is_question_word(t))
            .collect();
        if seeds.is_empty() {
            seeds = tokens.iter().map(String::as_str).collect();
        }

        let activation = self.activation().run(&seeds);
        let answer = CandidateArbiter::new(&self.config.arbiter).answer(
            query,
            &activation,
            &self.history,
            &self.store,
            dictionary,
        );
        (answer, activation)
    }
}

/// Whether `token` has the shape tokenization produces: one lowercase
/// word starting with a letter or digit
fn is_single_token(token: &str) -> bool {
    token.chars().next().map_or(false, char::is_alphanumeric)
        && !token.chars().any(char::is_whitespace)
        && token.to_lowercase() == token
}

/// Thread-safe engine handle for hosts
pub struct Engine {
    state: RwLock<EngineState>,
    version: AtomicU64,
    queries: AtomicU64,
    no_seed: AtomicU64,
    dictionary: Option<Arc<dyn Dictionary>>,
    memory_log: Option<Arc<dyn MemoryLog>>,
}

impl Engine {
    pub fn new(config: KavramConfig) -> KavramResult<Self> {
        Ok(Self::from_state(EngineState::new(config)?))
    }

    /// Engine over a snapshot file, empty when the file is missing or unreadable
    pub fn open(config: KavramConfig, path: &Path) -> KavramResult<Self> {
        let snapshot = Snapshot::load_or_create(path);
        Ok(Self::from_state(EngineState::from_snapshot(config, snapshot)?))
    }

    fn from_state(state: EngineState) -> Self {
        let queries = state.counters.queries;
        let no_seed = state.counters.no_seed;
        Self {
            state: RwLock::new(state),
            version: AtomicU64::new(0),
            queries: AtomicU64::new(queries),
            no_seed: AtomicU64::new(no_seed),
            dictionary: None,
            memory_log: None,
        }
    }

    pub fn with_dictionary(mut self, dictionary: Arc<dyn Dictionary>) -> Self {
        self.dictionary = Some(dictionary);
        self
    }

    pub fn with_memory_log(mut self, memory_log: Arc<dyn MemoryLog>) -> Self {
        self.memory_log = Some(memory_log);
        self
    }

    /// Write counter, bumped by every mutation
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    pub fn config(&self) -> KavramConfig {
        self.state.read().config.clone()
    }

    /// Teach a (query, response) pair
    pub fn train(&self, query: &str, response: &str) -> KavramResult<TrainingSummary> {
        let summary = self.train_from(query, response, TrainingSource::Explicit)?;
        if let Some(log) = &self.memory_log {
            let mut related = text::tokenize(query);
            related.extend(text::tokenize(response));
            log.record_memory(&format!("{} => {}", query.trim(), response.trim()), MemoryKind::Lesson, &related);
        }
        Ok(summary)
    }

    fn train_from(
        &self,
        query: &str,
        response: &str,
        source: TrainingSource,
    ) -> KavramResult<TrainingSummary> {
        let summary = self.state.write().train(query, response, source, now_ms())?;
        self.version.fetch_add(1, Ordering::AcqRel);
        Ok(summary)
    }

    /// Answer a query; always produces something
    ///
    /// A confident inferred answer is trained back at low weight when
    /// self-reinforcement is enabled, and `Answer::reinforced` says so.
    pub fn ask(&self, query: &str) -> Answer {
        self.queries.fetch_add(1, Ordering::Relaxed);

        let (mut answer, activation) = {
            let state = self.state.read();
            state.answer(query, self.dictionary.as_deref())
        };
        if activation.no_seed {
            self.no_seed.fetch_add(1, Ordering::Relaxed);
        }

        let tokens = text::tokenize(query);
        if let Some(log) = &self.memory_log {
            let limit = self.state.read().config.arbiter.context_snippets;
            answer.context = log.relevant_memories(query).into_iter().take(limit).collect();
            log.record_memory(query.trim(), MemoryKind::Question, &tokens);
        }

        if answer.reinforce {
            match self.train_from(query, &answer.text, TrainingSource::SelfReinforced) {
                Ok(_) => answer.reinforced = true,
                Err(e) => tracing::debug!("Self-reinforcement skipped: {}", e),
            }
        }

        if let Some(log) = &self.memory_log {
            if !answer.is_fallback() {
                log.record_memory(&answer.text, MemoryKind::Answer, &tokens);
            }
        }

        tracing::debug!(
            "Asked '{}': '{}' via {} ({:.2})",
            query.trim(),
            answer.text,
            answer.method,
            answer.confidence
        );
        answer
    }

    /// Raw propagation with explicit parameters
    pub fn propagate(
        &self,
        seeds: &[&str],
        max_depth: u32,
        decay_rate: f32,
        threshold: f32,
    ) -> ActivationResult {
        self.state.read().activation().propagate(seeds, max_depth, decay_rate, threshold)
    }

    /// Reward or punish an answer
    pub fn feedback(&self, query: &str, response: &str, positive: bool) -> KavramResult<FeedbackReport> {
        let report = self.state.write().feedback(query, response, positive, now_ms())?;
        self.version.fetch_add(1, Ordering::AcqRel);
        if let Some(log) = &self.memory_log {
            let verdict = if positive { "good" } else { "bad" };
            log.record_memory(
                &format!("{} => {} ({})", query.trim(), response.trim(), verdict),
                MemoryKind::Feedback,
                &text::tokenize(query),
            );
        }
        Ok(report)
    }

    /// Decay pass at the current time
    pub fn decay(&self) -> DecayReport {
        self.decay_at(now_ms())
    }

    /// Decay pass at `now`; the version only moves when something weakened
    pub fn decay_at(&self, now: u64) -> DecayReport {
        let report = self.state.write().decay(now);
        if report.decayed > 0 {
            self.version.fetch_add(1, Ordering::AcqRel);
        }
        report
    }

    fn counters(&self, state: &EngineState) -> EngineCounters {
        EngineCounters {
            queries: self.queries.load(Ordering::Relaxed),
            no_seed: self.no_seed.load(Ordering::Relaxed),
            ..state.counters.clone()
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        let state = self.state.read();
        state.to_snapshot(self.counters(&state))
    }

    /// Replace all state with a snapshot's
    pub fn restore(&self, snapshot: Snapshot) -> KavramResult<()> {
        let config = self.config();
        let restored = EngineState::from_snapshot(config, snapshot)?;
        self.queries.store(restored.counters.queries, Ordering::Relaxed);
        self.no_seed.store(restored.counters.no_seed, Ordering::Relaxed);
        *self.state.write() = restored;
        self.version.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    pub fn save(&self, path: &Path) -> KavramResult<()> {
        let snapshot = self.snapshot();
        snapshot.save(path)?;
        tracing::info!(
            "Snapshot saved: {} nodes, {} associations, {} examples",
            snapshot.node_count(),
            snapshot.associations.len(),
            snapshot.examples.len()
        );
        Ok(())
    }

    pub fn stats(&self) -> EngineStats {
        let state = self.state.read();
        let query = state.query_grid.stats();
        let response = state.response_grid.stats();
        EngineStats {
            counters: self.counters(&state),
            examples: state.history.len(),
            query_nodes: query.nodes,
            response_nodes: response.nodes,
            associations: state.store.len(),
            query_evictions: query.evictions,
            response_evictions: response.evictions,
            avg_query_connections: query.avg_connections,
            avg_response_connections: response.avg_connections,
            version: self.version(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::notes::RecentMemoryLog;
    use kavram_core::Association;
    use kavram_core::AssociationId;

    #[test]
    fn test_version_counts_writes() {
        let engine = Engine::new(KavramConfig::default()).unwrap();
        assert_eq!(engine.version(), 0);

        engine.train("elma nedir", "bir meyvedir").unwrap();
        assert_eq!(engine.version(), 1);

        // Rejected input is not a write
        assert!(engine.train("", "x").is_err());
        assert_eq!(engine.version(), 1);

        engine.ask("elma nedir");
        assert_eq!(engine.version(), 1);

        // Nothing old enough to weaken yet
        assert_eq!(engine.decay().decayed, 0);
        assert_eq!(engine.version(), 1);

        let unit = engine.config().association.decay_unit_ms;
        assert_eq!(engine.decay_at(now_ms() + 2 * unit).decayed, 4);
        assert_eq!(engine.version(), 2);
    }

    #[test]
    fn test_self_reinforcement_flag() {
        let mut config = KavramConfig::default();
        config.arbiter.min_reinforce_confidence = 0.1;
        let engine = Engine::new(config).unwrap();
        engine.train("elma nedir", "bir meyvedir").unwrap();

        let answer = engine.ask("elma nedir ki");
        assert_eq!(answer.text, "bir meyvedir");
        assert!(answer.reinforce);
        assert!(answer.reinforced);
        assert_eq!(engine.stats().counters.self_reinforcements, 1);

        // The history still only holds what was taught
        assert_eq!(engine.stats().examples, 1);
    }

    #[test]
    fn test_context_from_memory_log() {
        let log = Arc::new(RecentMemoryLog::default());
        let engine = Engine::new(KavramConfig::default())
            .unwrap()
            .with_memory_log(log.clone());

        engine.train("elma nedir", "bir meyvedir").unwrap();
        let answer = engine.ask("elma nedir");
        assert_eq!(answer.text, "bir meyvedir");
        assert_eq!(answer.context, vec!["elma nedir => bir meyvedir".to_string()]);
        // Lesson, question, answer
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn test_restore_drops_only_malformed() {
        let engine = Engine::new(KavramConfig::default()).unwrap();
        engine.train("elma nedir", "bir meyvedir").unwrap();

        let mut snapshot = engine.snapshot();
        let next = snapshot.associations.len() as u32;
        // Unknown to every grid but well-formed: kept
        snapshot.associations.push(Association::new(AssociationId(next), "hayalet", "meyvedir", 0, 0));
        snapshot.associations.push(Association::new(AssociationId(next + 1), "Hayalet!", "meyvedir", 0, 0));
        snapshot.associations.push(Association::new(AssociationId(next + 2), "iki kelime", "meyvedir", 0, 0));

        engine.restore(snapshot).unwrap();
        let stats = engine.stats();
        assert_eq!(stats.associations, 5);
        assert_eq!(stats.counters.healed_associations, 2);
    }

    #[test]
    fn test_restore_keeps_associations_of_evicted_tokens() {
        let mut config = KavramConfig::default();
        config.grid.layers = 1;
        config.grid.rows = 3;
        config.grid.cols = 3;
        let mut state = EngineState::new(config.clone()).unwrap();

        state.train("elma nedir", "bir meyvedir", TrainingSource::Explicit, 0).unwrap();
        state.train("elma nedir ki", "bir meyvedir", TrainingSource::SelfReinforced, 1).unwrap();
        let before = state.store.lookup("ki").count();
        assert_eq!(before, 2);

        // Crowd "ki" out of the only layer
        let mut filler = 0;
        while state.query_grid.contains_token("ki") && filler < 2_000 {
            let query = format!("dolgu{}", filler);
            state.train(&query, "cevap", TrainingSource::Explicit, 2 + filler).unwrap();
            filler += 1;
        }
        assert!(!state.query_grid.contains_token("ki"));
        assert_eq!(state.store.lookup("ki").count(), before);

        let snapshot = state.to_snapshot(state.counters.clone());
        let restored = EngineState::from_snapshot(config, snapshot).unwrap();
        assert_eq!(restored.store.lookup("ki").count(), before);
        assert_eq!(restored.store.len(), state.store.len());
        assert_eq!(restored.counters.healed_associations, 0);
    }

    #[test]
    fn test_restored_engine_trains_identically() {
        let engine = Engine::new(KavramConfig::default()).unwrap();
        engine.train("elma nedir", "bir meyvedir").unwrap();
        engine.train("armut nedir", "bir meyvedir").unwrap();

        let restored = Engine::new(KavramConfig::default()).unwrap();
        restored.restore(engine.snapshot()).unwrap();

        for (query, response) in [("kiraz nedir", "kırmızı bir meyvedir"), ("elma ne renk", "kırmızı")] {
            engine.train(query, response).unwrap();
            restored.train(query, response).unwrap();
        }

        let (a, b) = (engine.snapshot(), restored.snapshot());
        for (left, right) in a.query_layers.iter().flatten().zip(b.query_layers.iter().flatten()) {
            assert_eq!(left.token, right.token);
            assert_eq!((left.row, left.col), (right.row, right.col));
            assert_eq!(left.connections, right.connections);
        }
        assert_eq!(a.node_count(), b.node_count());
    }

    #[test]
    fn test_stats_count_queries() {
        let engine = Engine::new(KavramConfig::default()).unwrap();
        engine.ask("boş");
        engine.train("elma nedir", "bir meyvedir").unwrap();
        engine.ask("elma nedir");

        let stats = engine.stats();
        assert_eq!(stats.counters.queries, 2);
        assert_eq!(stats.counters.no_seed, 1);
        assert_eq!(stats.counters.trainings, 1);
        assert_eq!(stats.query_nodes, 2 * KavramConfig::default().grid.layers as usize);
    }
}
