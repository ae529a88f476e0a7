//! # Token Nodes - The Units of the Grid
//!
//! A `TokenNode` is one occurrence of a normalized token inside one layer
//! of one side (query or response). Nodes live in a `TokenGrid` arena and
//! are addressed by their `NodeId`; nothing outside the grid holds a
//! reference to a node object.
//!
//! ## Lifecycle
//!
//! - **Created** on the first training occurrence of a token in a layer
//! - **Touched** on every repeat occurrence (usage, importance, activation)
//! - **Reused** when the layer is full and this node is the weakest one:
//!   the slot keeps its id and coordinate but takes a new token

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::text;
use crate::HISTORY_CAPACITY;

/// Stable arena index of a node inside one grid
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Position in the owning arena
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Which side of a training pair a grid holds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Side {
    /// Tokens seen in queries
    Query,
    /// Tokens seen in responses
    Response,
}

/// Globally unique node address: side plus arena id
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeKey {
    pub side: Side,
    pub id: NodeId,
}

impl NodeKey {
    pub fn new(side: Side, id: NodeId) -> Self {
        Self { side, id }
    }
}

/// Coarse token category - the "shared category tag" used when
/// choosing a new node's neighbours
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenCategory {
    /// Interrogative words (ne, nedir, what, where...)
    Question,
    /// Digits
    Number,
    /// Very short tokens (particles, articles)
    Function,
    /// Everything else
    Content,
}

impl Default for TokenCategory {
    fn default() -> Self {
        TokenCategory::Content
    }
}

impl TokenCategory {
    /// Classify a normalized token
    pub fn classify(token: &str) -> Self {
        if text::is_question_word(token) {
            TokenCategory::Question
        } else if !token.is_empty() && token.chars().all(|c| c.is_numeric()) {
            TokenCategory::Number
        } else if token.chars().count() <= 2 {
            TokenCategory::Function
        } else {
            TokenCategory::Content
        }
    }
}

/// One token occurrence in one grid layer
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenNode {
    /// Arena id (stable for the life of the slot)
    pub id: NodeId,

    /// Normalized token
    pub token: String,

    /// Query or response grid
    pub side: Side,

    /// Layer index
    pub layer: u16,

    /// Grid coordinate (locality only, carries no meaning)
    pub row: u16,
    pub col: u16,

    /// Current activation (0.0 to 1.0)
    pub activation: f32,

    /// How many training occurrences hit this node
    pub usage_count: u64,

    /// Unix millis
    pub created_at: u64,
    pub modified_at: u64,

    /// Importance (0 to 100) - protects the node from eviction
    pub importance: f32,

    /// Last activation samples, oldest first
    pub history: VecDeque<f32>,

    /// Coarse category of the token
    pub category: TokenCategory,

    /// Outgoing connections: neighbour id -> strength (0.0 to 1.0)
    pub connections: BTreeMap<NodeId, f32>,
}

impl TokenNode {
    /// Create a fresh node at a coordinate
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: NodeId,
        token: &str,
        side: Side,
        layer: u16,
        row: u16,
        col: u16,
        activation: f32,
        importance: f32,
        now: u64,
    ) -> Self {
        let mut node = Self {
            id,
            token: token.to_string(),
            side,
            layer,
            row,
            col,
            activation: activation.clamp(0.0, 1.0),
            usage_count: 1,
            created_at: now,
            modified_at: now,
            importance: importance.clamp(0.0, 100.0),
            history: VecDeque::with_capacity(HISTORY_CAPACITY),
            category: TokenCategory::classify(token),
            connections: BTreeMap::new(),
        };
        node.record_activation(node.activation);
        node
    }

    /// Take over this slot for a different token (eviction)
    ///
    /// Id, side, layer and coordinate are kept; everything learned about
    /// the previous token is discarded. Callers must prune inbound
    /// connections from other nodes first.
    pub fn reuse(&mut self, token: &str, activation: f32, importance: f32, now: u64) {
        *self = Self::new(
            self.id,
            token,
            self.side,
            self.layer,
            self.row,
            self.col,
            activation,
            importance,
            now,
        );
    }

    /// A repeat occurrence of the same token in the same layer
    pub fn touch(&mut self, activation_step: f32, importance_step: f32, now: u64) {
        self.usage_count += 1;
        self.importance = (self.importance + importance_step).clamp(0.0, 100.0);
        self.activation = (self.activation + activation_step).clamp(0.0, 1.0);
        self.modified_at = now;
        self.record_activation(self.activation);
    }

    /// Append an activation sample, dropping the oldest past capacity
    pub fn record_activation(&mut self, value: f32) {
        if self.history.len() >= HISTORY_CAPACITY {
            self.history.pop_front();
        }
        self.history.push_back(value);
    }

    /// Lower = first to be evicted
    pub fn eviction_score(&self) -> f32 {
        self.importance * self.activation
    }

    /// Add or strengthen an outgoing connection
    pub fn connect(&mut self, other: NodeId, strength: f32) {
        let strength = strength.clamp(0.0, 1.0);
        let entry = self.connections.entry(other).or_insert(0.0);
        *entry = entry.max(strength);
    }

    /// Drop an outgoing connection, returning whether it existed
    pub fn disconnect(&mut self, other: NodeId) -> bool {
        self.connections.remove(&other).is_some()
    }

    pub fn degree(&self) -> usize {
        self.connections.len()
    }

    pub fn key(&self) -> NodeKey {
        NodeKey::new(self.side, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(token: &str) -> TokenNode {
        TokenNode::new(NodeId(0), token, Side::Query, 0, 3, 4, 0.5, 10.0, 1_000)
    }

    #[test]
    fn test_node_creation() {
        let n = node("merhaba");
        assert_eq!(n.usage_count, 1);
        assert_eq!(n.history.len(), 1);
        assert_eq!(n.category, TokenCategory::Content);
        assert_eq!(n.eviction_score(), 5.0);
    }

    #[test]
    fn test_touch_is_clamped() {
        let mut n = node("elma");
        for tick in 0..50 {
            n.touch(0.1, 5.0, 2_000 + tick);
        }
        assert_eq!(n.usage_count, 51);
        assert_eq!(n.activation, 1.0);
        assert_eq!(n.importance, 100.0);
        assert_eq!(n.history.len(), HISTORY_CAPACITY);
        assert_eq!(n.modified_at, 2_049);
    }

    #[test]
    fn test_reuse_keeps_slot() {
        let mut n = node("elma");
        n.connect(NodeId(7), 0.4);
        n.touch(0.1, 5.0, 2_000);

        n.reuse("armut", 0.5, 10.0, 3_000);
        assert_eq!(n.token, "armut");
        assert_eq!(n.id, NodeId(0));
        assert_eq!((n.row, n.col), (3, 4));
        assert_eq!(n.usage_count, 1);
        assert!(n.connections.is_empty());
    }

    #[test]
    fn test_connect_keeps_strongest() {
        let mut n = node("elma");
        n.connect(NodeId(1), 0.3);
        n.connect(NodeId(1), 0.2);
        n.connect(NodeId(2), 1.7);
        assert_eq!(n.connections[&NodeId(1)], 0.3);
        assert_eq!(n.connections[&NodeId(2)], 1.0);
        assert!(n.disconnect(NodeId(1)));
        assert!(!n.disconnect(NodeId(1)));
        assert_eq!(n.degree(), 1);
    }

    #[test]
    fn test_classify() {
        assert_eq!(TokenCategory::classify("nedir"), TokenCategory::Question);
        assert_eq!(TokenCategory::classify("42"), TokenCategory::Number);
        assert_eq!(TokenCategory::classify("de"), TokenCategory::Function);
        assert_eq!(TokenCategory::classify("meyve"), TokenCategory::Content);
    }
}
