//! # Configuration - Kavram's Tuning Parameters
//!
//! Every heuristic constant of the engine lives here. None of the exact
//! values is a correctness requirement; they shape how quickly the graph
//! grows, how far activation spreads and how cautious answers are.

use serde::{Deserialize, Serialize};

use crate::error::{KavramError, KavramResult};

/// Master configuration for Kavram
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct KavramConfig {
    /// Token grid layout and node seeding
    pub grid: GridConfig,

    /// Association reinforcement and decay
    pub association: AssociationConfig,

    /// Activation propagation
    pub activation: ActivationConfig,

    /// Candidate generation and arbitration
    pub arbiter: ArbiterConfig,

    /// Training input limits
    pub training: TrainingConfig,

    /// Seed of the pseudo-random source (connection exploration, tie-breaks)
    pub seed: u64,
}

/// Token grid layout
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GridConfig {
    /// Layers per side; every token is placed in every layer
    pub layers: u16,

    /// Layer dimensions (capacity = rows * cols)
    pub rows: u16,
    pub cols: u16,

    /// How far the spiral search looks for a free coordinate
    pub max_search_radius: u16,

    /// Degree cap per node
    pub max_connections: usize,

    /// Chance that a new connection is mirrored back (asymmetric recall)
    pub reverse_probability: f32,

    /// Weight of the random term in neighbour scoring
    pub exploration: f32,

    /// Bonus for neighbours sharing the token category
    pub category_bonus: f32,

    /// Weakest connection ever created
    pub min_connection_strength: f32,

    /// Seeding of new nodes
    pub initial_activation: f32,
    pub initial_importance: f32,

    /// Increments on a repeat occurrence
    pub activation_step: f32,
    pub importance_step: f32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            layers: 3,
            rows: 16,
            cols: 16,
            max_search_radius: 16,
            max_connections: 6,
            reverse_probability: 0.7,
            exploration: 0.1,
            category_bonus: 0.3,
            min_connection_strength: 0.05,
            initial_activation: 0.5,
            initial_importance: 10.0,
            activation_step: 0.1,
            importance_step: 5.0,
        }
    }
}

impl GridConfig {
    /// Nodes a single layer can hold
    pub fn layer_capacity(&self) -> usize {
        self.rows as usize * self.cols as usize
    }
}

/// Association update rules
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssociationConfig {
    /// Reinforcement per repeated co-occurrence
    pub co_occurrence_amount: f32,

    /// Reinforcement per co-occurrence when the engine trains on its own answer
    pub self_reinforce_amount: f32,

    /// Strength change on explicit feedback (applied as +positive / -negative)
    pub positive_feedback: f32,
    pub negative_feedback: f32,

    /// Change of the accumulated feedback score per feedback event
    pub feedback_score: f32,

    /// Fraction of strength lost per elapsed decay unit
    pub decay_rate: f32,

    /// Length of one decay unit in milliseconds
    pub decay_unit_ms: u64,
}

impl Default for AssociationConfig {
    fn default() -> Self {
        Self {
            co_occurrence_amount: 5.0,
            self_reinforce_amount: 1.0,
            positive_feedback: 15.0,
            negative_feedback: 10.0,
            feedback_score: 10.0,
            decay_rate: 0.05,
            decay_unit_ms: 3_600_000, // one hour
        }
    }
}

/// Activation propagation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActivationConfig {
    /// Breadth-first depth limit
    pub max_depth: u32,

    /// Fraction of activation lost per hop
    pub decay_rate: f32,

    /// Activations at or below this are dropped
    pub threshold: f32,

    /// How many response tokens become primary concepts
    pub top_k: usize,

    /// Minimum edit similarity for a fuzzy seed
    pub fuzzy_seed_threshold: f32,

    /// Multiplier for walking a one-way association backwards
    pub reverse_attenuation: f32,

    /// Optional wall-clock budget per propagation
    pub time_budget_ms: Option<u64>,
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self {
            max_depth: 3,
            decay_rate: 0.2,
            threshold: 0.05,
            top_k: 5,
            fuzzy_seed_threshold: 0.5,
            reverse_attenuation: 0.5,
            time_budget_ms: None,
        }
    }
}

/// Candidate generation and arbitration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArbiterConfig {
    /// Minimum token overlap for a fuzzy training match
    pub fuzzy_threshold: f32,

    /// Candidates overlapping more than this are one cluster
    pub cluster_threshold: f32,

    /// How many primary concepts an activation summary uses
    pub activation_concepts: usize,

    /// Answer when no strategy produced anything
    pub fallback_text: String,
    pub fallback_confidence: f32,

    /// Train on accepted answers (low weight)
    pub self_reinforce: bool,

    /// Only answers at least this confident are self-reinforced
    pub min_reinforce_confidence: f32,

    /// How many memory-log snippets to attach to an answer
    pub context_snippets: usize,
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: 0.5,
            cluster_threshold: 0.6,
            activation_concepts: 4,
            fallback_text: "I don't know that yet.".to_string(),
            fallback_confidence: 0.05,
            self_reinforce: true,
            min_reinforce_confidence: 0.5,
            context_snippets: 3,
        }
    }
}

/// Training input limits
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Tokens beyond this per side are ignored (bounds the cross product)
    pub max_tokens_per_side: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            max_tokens_per_side: 64,
        }
    }
}

impl KavramConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &str) -> KavramResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| KavramError::config(format!("{}: {}", path, e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &str) -> KavramResult<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| KavramError::config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Create config from environment variables
    ///
    /// Reads:
    /// - KAVRAM_SEED: Random seed (default: 0)
    /// - KAVRAM_LAYERS: Layers per grid side (default: 3)
    /// - KAVRAM_MAX_DEPTH: Activation depth limit (default: 3)
    /// - KAVRAM_DECAY_RATE: Association decay per unit (default: 0.05)
    /// - KAVRAM_SELF_REINFORCE: "0"/"false" disables self-reinforcement
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(seed) = env_parse("KAVRAM_SEED") {
            config.seed = seed;
        }
        if let Some(layers) = env_parse::<u16>("KAVRAM_LAYERS") {
            config.grid.layers = layers.max(1);
        }
        if let Some(depth) = env_parse("KAVRAM_MAX_DEPTH") {
            config.activation.max_depth = depth;
        }
        if let Some(rate) = env_parse("KAVRAM_DECAY_RATE") {
            config.association.decay_rate = rate;
        }
        if let Ok(val) = std::env::var("KAVRAM_SELF_REINFORCE") {
            let val = val.to_lowercase();
            config.arbiter.self_reinforce = !(val == "0" || val == "false");
        }

        config
    }

    /// Reject values that would break the engine's invariants
    pub fn validate(&self) -> KavramResult<()> {
        if self.grid.layers == 0 {
            return Err(KavramError::config("grid.layers must be at least 1"));
        }
        if self.grid.layer_capacity() == 0 {
            return Err(KavramError::config("grid rows and cols must be non-zero"));
        }
        if !(0.0..=1.0).contains(&self.grid.reverse_probability) {
            return Err(KavramError::config("grid.reverse_probability must be in [0, 1]"));
        }
        if !(0.0..1.0).contains(&self.activation.decay_rate) {
            return Err(KavramError::config("activation.decay_rate must be in [0, 1)"));
        }
        if !(0.0..=1.0).contains(&self.association.decay_rate) {
            return Err(KavramError::config("association.decay_rate must be in [0, 1]"));
        }
        if self.association.positive_feedback < 0.0 || self.association.negative_feedback < 0.0 {
            return Err(KavramError::config("feedback amounts are magnitudes and must be >= 0"));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = KavramConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.grid.layer_capacity(), 256);
    }

    #[test]
    fn test_validate_rejects() {
        let mut config = KavramConfig::default();
        config.grid.layers = 0;
        assert!(matches!(config.validate(), Err(KavramError::Config(_))));

        let mut config = KavramConfig::default();
        config.activation.decay_rate = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_json_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let path = path.to_str().unwrap();

        let mut config = KavramConfig::default();
        config.seed = 42;
        config.arbiter.fallback_text = "Bilmiyorum.".to_string();
        config.save(path).unwrap();

        let loaded = KavramConfig::load(path).unwrap();
        assert_eq!(loaded.seed, 42);
        assert_eq!(loaded.arbiter.fallback_text, "Bilmiyorum.");
    }
}
