//! # Associations - Query Token to Response Token Edges
//!
//! An association is created the first time a query token and a response
//! token appear in the same training pair. After that it only moves
//! through two kinds of explicit events:
//!
//! - **Reinforcement** (co-occurrence, positive feedback) raises strength
//! - **Decay** (maintenance pass, negative feedback) lowers it
//!
//! Every value is clamped to its range and strengths never reach zero:
//! an association weakens toward a floor but is never fully forgotten.

use serde::{Deserialize, Serialize};

/// Stable arena index of an association
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssociationId(pub u32);

impl AssociationId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Strength of a brand new association (dependency and association)
pub const BASE_STRENGTH: f32 = 50.0;

/// Confidence of a brand new association
pub const BASE_CONFIDENCE: f32 = 0.5;

/// Upper bound for dependency/association
pub const MAX_STRENGTH: f32 = 100.0;

/// Floor for dependency/association - strength never reaches zero
pub const MIN_STRENGTH: f32 = 1.0;

/// Floor for confidence
pub const MIN_CONFIDENCE: f32 = 0.01;

/// Bounds of the accumulated feedback score
pub const FEEDBACK_RANGE: f32 = 100.0;

/// Directed weighted edge query token -> response token
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Association {
    pub id: AssociationId,

    pub query_token: String,
    pub response_token: String,

    /// Earliest position at which the response token was seen in a response
    pub order: u32,

    /// How strongly the response depends on the query token (0 to 100)
    pub dependency: f32,

    /// Association strength (0 to 100)
    pub association: f32,

    /// Co-occurrence count (never decreases)
    pub frequency: u64,

    /// Confidence (0.0 to 1.0)
    pub confidence: f32,

    /// Accumulated user feedback (-100 to 100)
    pub feedback: f32,

    /// Number of positive reinforcement events
    pub learning_count: u32,

    /// The reverse pair (response token -> query token) also exists
    pub bidirectional: bool,

    /// Unix millis
    pub last_used: u64,
    pub last_decayed: u64,
    pub created_at: u64,
}

impl Association {
    pub fn new(
        id: AssociationId,
        query_token: &str,
        response_token: &str,
        order: u32,
        now: u64,
    ) -> Self {
        Self {
            id,
            query_token: query_token.to_string(),
            response_token: response_token.to_string(),
            order,
            dependency: BASE_STRENGTH,
            association: BASE_STRENGTH,
            frequency: 1,
            confidence: BASE_CONFIDENCE,
            feedback: 0.0,
            learning_count: 0,
            bidirectional: false,
            last_used: now,
            last_decayed: now,
            created_at: now,
        }
    }

    /// Another training pair in which both tokens appear
    pub fn co_occur(&mut self, order: u32, amount: f32, now: u64) {
        self.frequency = self.frequency.saturating_add(1);
        self.order = self.order.min(order);
        self.reinforce(amount, None, now);
    }

    /// Apply a reinforcement event
    ///
    /// A positive `amount` strengthens the edge and lifts confidence to
    /// `min(1, 0.5 + learning_count / 20)`. A negative `amount` is an
    /// explicit weakening: strengths fall (floored) and confidence shrinks.
    /// `feedback` is added to the accumulated feedback score.
    pub fn reinforce(&mut self, amount: f32, feedback: Option<f32>, now: u64) {
        if amount > 0.0 {
            self.dependency = (self.dependency + amount).min(MAX_STRENGTH).max(self.dependency);
            self.association = (self.association + amount).min(MAX_STRENGTH).max(self.association);
            self.learning_count = self.learning_count.saturating_add(1);
            let target = (BASE_CONFIDENCE + self.learning_count as f32 / 20.0).min(1.0);
            self.confidence = self.confidence.max(target).min(1.0);
        } else if amount < 0.0 {
            self.dependency = weaken(self.dependency, self.dependency + amount, MIN_STRENGTH);
            self.association = weaken(self.association, self.association + amount, MIN_STRENGTH);
            self.confidence = weaken(self.confidence, self.confidence * 0.9, MIN_CONFIDENCE);
        }

        if let Some(delta) = feedback {
            self.feedback = (self.feedback + delta).clamp(-FEEDBACK_RANGE, FEEDBACK_RANGE);
        }

        self.last_used = now;
    }

    /// Time-based decay
    ///
    /// Applies when at least one `unit_ms` has passed since the edge was
    /// last used or last decayed. Strengths are scaled by
    /// `1 - rate * elapsed_units`, never below their floors and never up.
    /// Returns whether anything was decayed.
    pub fn decay(&mut self, now: u64, rate: f32, unit_ms: u64) -> bool {
        let since = self.last_used.max(self.last_decayed);
        if unit_ms == 0 || now <= since {
            return false;
        }

        let elapsed_units = (now - since) as f32 / unit_ms as f32;
        if elapsed_units < 1.0 {
            return false;
        }

        let factor = (1.0 - rate.max(0.0) * elapsed_units).clamp(0.0, 1.0);
        self.dependency = weaken(self.dependency, self.dependency * factor, MIN_STRENGTH);
        self.association = weaken(self.association, self.association * factor, MIN_STRENGTH);
        self.confidence = weaken(self.confidence, self.confidence * factor, MIN_CONFIDENCE);
        self.last_decayed = now;
        true
    }

    /// Edge weight used by activation propagation (0.0 to 1.0)
    pub fn edge_strength(&self) -> f32 {
        (self.association / MAX_STRENGTH).clamp(0.0, 1.0)
    }

    /// Whether every field sits inside its documented range
    pub fn in_bounds(&self) -> bool {
        (0.0..=MAX_STRENGTH).contains(&self.dependency)
            && (0.0..=MAX_STRENGTH).contains(&self.association)
            && (0.0..=1.0).contains(&self.confidence)
            && (-FEEDBACK_RANGE..=FEEDBACK_RANGE).contains(&self.feedback)
            && self.frequency >= 1
    }
}

/// Lower `current` toward `target`, never below `floor`, never upward
fn weaken(current: f32, target: f32, floor: f32) -> f32 {
    target.max(floor).min(current)
}
