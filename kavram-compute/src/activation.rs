//! # Activation Propagation
//!
//! Breadth-first, depth-limited spreading of an activation value from
//! seed nodes in the query grid through:
//!
//! - node connections (same side, same or adjacent layer)
//! - associations, query -> response via `lookup` and response -> query
//!   via `lookup_reverse`
//!
//! A node's value only ever moves up to the best candidate seen in this
//! run (max-accumulation). Frontier items that were overtaken before they
//! were expanded are skipped, so every node is expanded at most once per
//! depth and the walk terminates on any graph.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::time::{Duration, Instant};

use kavram_core::config::ActivationConfig;
use kavram_core::{text, AssociationId, KavramError, NodeId, NodeKey, Side};

use crate::grid::TokenGrid;
use crate::store::AssociationStore;

/// How many activated associations saturate the count factor of confidence
const SATURATING_ASSOCIATIONS: f32 = 8.0;

/// One improvement recorded on the path
#[derive(Clone, Debug, PartialEq)]
pub struct PathStep {
    pub node: NodeKey,
    pub token: String,
    pub activation: f32,
    pub depth: u32,
}

/// How a seed word was matched to the query grid
#[derive(Clone, Debug, PartialEq)]
pub struct SeedMatch {
    pub seed: String,
    pub token: String,
    /// 1.0 for an exact hit, the edit similarity otherwise
    pub similarity: f32,
}

/// Outcome of a single propagation (never persisted)
#[derive(Clone, Debug, Default)]
pub struct ActivationResult {
    /// Every strict improvement in the order it happened
    pub path: Vec<PathStep>,

    /// Best activation per node
    pub activated: BTreeMap<NodeKey, f32>,

    /// Associations whose traversal cleared the threshold
    pub associations: BTreeSet<AssociationId>,

    /// Top response tokens by activation, best first
    pub primary_concepts: Vec<(String, f32)>,

    /// `min(1, n / 8) * mean_strength / 100`
    pub confidence: f32,

    pub seeds: Vec<SeedMatch>,

    /// Frontier items actually expanded
    pub expansions: usize,

    pub elapsed: Duration,

    /// No seed word matched anything
    pub no_seed: bool,

    /// Stopped early on the wall-clock budget
    pub truncated: bool,
}

impl ActivationResult {
    fn empty(no_seed: bool, elapsed: Duration) -> Self {
        Self {
            no_seed,
            elapsed,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.activated.is_empty()
    }

    /// Best activation of a response token across layers
    pub fn response_activation(&self, token: &str) -> Option<f32> {
        self.primary_concepts
            .iter()
            .find(|(t, _)| t == token)
            .map(|(_, a)| *a)
    }
}

struct FrontierItem {
    key: NodeKey,
    activation: f32,
    depth: u32,
}

/// Read-only propagation over a consistent view of both grids and the store
pub struct ActivationEngine<'a> {
    query_grid: &'a TokenGrid,
    response_grid: &'a TokenGrid,
    store: &'a AssociationStore,
    config: &'a ActivationConfig,
}

impl<'a> ActivationEngine<'a> {
    pub fn new(
        query_grid: &'a TokenGrid,
        response_grid: &'a TokenGrid,
        store: &'a AssociationStore,
        config: &'a ActivationConfig,
    ) -> Self {
        Self {
            query_grid,
            response_grid,
            store,
            config,
        }
    }

    /// Propagate with the configured depth, decay and threshold
    pub fn run<S: AsRef<str>>(&self, seeds: &[S]) -> ActivationResult {
        self.propagate(
            seeds,
            self.config.max_depth,
            self.config.decay_rate,
            self.config.threshold,
        )
    }

    /// Match seed words to query-grid tokens
    ///
    /// Exact hits win; otherwise the most similar token at or above
    /// `fuzzy_seed_threshold` is taken. Each grid token is seeded once.
    pub fn resolve_seeds<S: AsRef<str>>(&self, seeds: &[S]) -> Vec<SeedMatch> {
        let mut matches: Vec<SeedMatch> = Vec::new();
        let mut tokens: Option<BTreeSet<&str>> = None;

        for seed in seeds {
            let seed = seed.as_ref();
            if seed.is_empty() {
                continue;
            }

            let resolved = if self.query_grid.contains_token(seed) {
                Some((seed.to_string(), 1.0))
            } else {
                // Built lazily, exact hits are the common case
                let tokens = tokens.get_or_insert_with(|| self.query_grid.tokens());
                let mut best: Option<(&str, f32)> = None;
                for &candidate in tokens.iter() {
                    let score = text::similarity(seed, candidate);
                    if score >= self.config.fuzzy_seed_threshold
                        && best.map_or(true, |(_, s)| score > s)
                    {
                        best = Some((candidate, score));
                    }
                }
                best.map(|(t, s)| (t.to_string(), s))
            };

            if let Some((token, similarity)) = resolved {
                if !matches.iter().any(|m| m.token == token) {
                    matches.push(SeedMatch {
                        seed: seed.to_string(),
                        token,
                        similarity,
                    });
                }
            }
        }

        matches
    }

    pub fn propagate<S: AsRef<str>>(
        &self,
        seeds: &[S],
        max_depth: u32,
        decay_rate: f32,
        threshold: f32,
    ) -> ActivationResult {
        let start = Instant::now();
        let seed_matches = self.resolve_seeds(seeds);

        let mut result = ActivationResult::empty(false, Duration::ZERO);
        let mut frontier: VecDeque<FrontierItem> = VecDeque::new();

        for seed in &seed_matches {
            for id in self.query_grid.find_all(&seed.token) {
                let key = NodeKey::new(Side::Query, id);
                if self.improve(&mut result, key, 1.0, 0) {
                    frontier.push_back(FrontierItem { key, activation: 1.0, depth: 0 });
                }
            }
        }

        if frontier.is_empty() {
            tracing::debug!("{} ({} word(s))", KavramError::NoSeedResolved, seeds.len());
            return ActivationResult::empty(true, start.elapsed());
        }
        result.seeds = seed_matches;

        let retain = (1.0 - decay_rate).clamp(0.0, 1.0);
        let budget = self.config.time_budget_ms.map(Duration::from_millis);
        let max_expansions =
            (self.query_grid.len() + self.response_grid.len()) * max_depth as usize;

        while let Some(item) = frontier.pop_front() {
            if item.depth >= max_depth {
                continue;
            }
            // Overtaken while waiting
            if result.activated.get(&item.key).map_or(false, |&best| item.activation < best) {
                continue;
            }
            if result.expansions >= max_expansions {
                break;
            }
            if let Some(budget) = budget {
                if start.elapsed() >= budget {
                    result.truncated = true;
                    break;
                }
            }
            result.expansions += 1;

            for (target, edge, association) in self.neighbours(item.key) {
                let candidate = item.activation * edge * retain;
                if candidate <= threshold {
                    continue;
                }
                if let Some(id) = association {
                    result.associations.insert(id);
                }
                if self.improve(&mut result, target, candidate, item.depth + 1) {
                    frontier.push_back(FrontierItem {
                        key: target,
                        activation: candidate,
                        depth: item.depth + 1,
                    });
                }
            }
        }

        result.primary_concepts = self.primary_concepts(&result.activated);
        result.confidence = self.confidence(&result.associations);
        result.elapsed = start.elapsed();

        tracing::debug!(
            "Propagated: {} node(s), {} association(s), {} expansion(s), confidence {:.2}",
            result.activated.len(),
            result.associations.len(),
            result.expansions,
            result.confidence
        );

        result
    }

    /// Record `value` if it strictly beats the node's best so far
    fn improve(&self, result: &mut ActivationResult, key: NodeKey, value: f32, depth: u32) -> bool {
        let best = result.activated.entry(key).or_insert(0.0);
        if value <= *best {
            return false;
        }
        *best = value;

        let token = self
            .grid(key.side)
            .node(key.id)
            .map(|n| n.token.clone())
            .unwrap_or_default();
        result.path.push(PathStep {
            node: key,
            token,
            activation: value,
            depth,
        });
        true
    }

    /// Outgoing edges of a node as (target, strength, association)
    fn neighbours(&self, key: NodeKey) -> Vec<(NodeKey, f32, Option<AssociationId>)> {
        let grid = self.grid(key.side);
        let Some(node) = grid.node(key.id) else {
            return Vec::new();
        };

        let mut out: Vec<(NodeKey, f32, Option<AssociationId>)> = node
            .connections
            .iter()
            .map(|(&id, &strength)| (NodeKey::new(key.side, id), strength, None))
            .collect();

        match key.side {
            Side::Query => {
                for association in self.store.lookup(&node.token) {
                    let edge = association.edge_strength();
                    for id in self.counterparts(self.response_grid, node.layer, &association.response_token) {
                        out.push((NodeKey::new(Side::Response, id), edge, Some(association.id)));
                    }
                }
            }
            Side::Response => {
                for association in self.store.lookup_reverse(&node.token) {
                    let mut edge = association.edge_strength();
                    if !association.bidirectional {
                        edge *= self.config.reverse_attenuation;
                    }
                    for id in self.counterparts(self.query_grid, node.layer, &association.query_token) {
                        out.push((NodeKey::new(Side::Query, id), edge, Some(association.id)));
                    }
                }
            }
        }

        out
    }

    /// Nodes of `token` on the other side, preferring the same layer
    fn counterparts(&self, grid: &TokenGrid, layer: u16, token: &str) -> Vec<NodeId> {
        match grid.find(layer, token) {
            Some(id) => vec![id],
            None => grid.find_all(token),
        }
    }

    fn grid(&self, side: Side) -> &TokenGrid {
        match side {
            Side::Query => self.query_grid,
            Side::Response => self.response_grid,
        }
    }

    fn primary_concepts(&self, activated: &BTreeMap<NodeKey, f32>) -> Vec<(String, f32)> {
        let mut best: HashMap<&str, f32> = HashMap::new();
        for (key, &value) in activated.iter().filter(|(k, _)| k.side == Side::Response) {
            if let Some(node) = self.response_grid.node(key.id) {
                let entry = best.entry(node.token.as_str()).or_insert(0.0);
                *entry = entry.max(value);
            }
        }

        let mut concepts: Vec<(String, f32)> =
            best.into_iter().map(|(t, a)| (t.to_string(), a)).collect();
        concepts.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        concepts.truncate(self.config.top_k);
        concepts
    }

    fn confidence(&self, associations: &BTreeSet<AssociationId>) -> f32 {
        let strengths: Vec<f32> = associations
            .iter()
            .filter_map(|&id| self.store.get(id))
            .map(|a| a.association)
            .collect();
        if strengths.is_empty() {
            return 0.0;
        }
        let mean = strengths.iter().sum::<f32>() / strengths.len() as f32;
        let count_factor = (strengths.len() as f32 / SATURATING_ASSOCIATIONS).min(1.0);
        (count_factor * mean / 100.0).clamp(0.0, 1.0)
    }
}
