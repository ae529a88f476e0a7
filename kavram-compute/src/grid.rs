//! # Token Grid
//!
//! Capacity-bounded, layered 2-D placement store for token nodes. There is
//! one grid per side (query tokens, response tokens).
//!
//! ## How It Works
//!
//! 1. Every layer is a `rows x cols` board of slots
//! 2. A token's preferred coordinate is derived from its shape (length and
//!    characters); a new node takes the nearest free slot found by a
//!    spiral search outward from there
//! 3. When no slot is free within the search radius, the weakest node of
//!    the layer (`importance * activation`) is evicted and its slot reused
//!
//! Coordinates carry no meaning beyond locality: they decide *which* node
//! gets displaced, never what a token means.
//!
//! ## Connections
//!
//! New nodes connect to the most similar existing nodes of the same and
//! the previous layer. The reverse edge is only added with
//! `reverse_probability`, so recall strength is deliberately asymmetric.

use std::collections::{BTreeSet, HashMap};

use rand::Rng;
use serde::Serialize;

use kavram_core::config::GridConfig;
use kavram_core::{text, KavramError, KavramResult, NodeId, Side, TokenNode};

/// What `place_or_update` did
#[derive(Clone, Debug, PartialEq)]
pub enum PlacementKind {
    /// The token already lived in this layer
    Updated,
    /// A free slot was taken
    Created,
    /// The layer was full and a weaker token was displaced
    Evicted { previous: String },
}

/// Result of placing a token
#[derive(Clone, Debug, PartialEq)]
pub struct Placement {
    pub id: NodeId,
    pub kind: PlacementKind,
}

/// One layer of the board
#[derive(Clone, Debug)]
struct Layer {
    /// Row-major slots
    slots: Vec<Option<NodeId>>,
    /// Token -> node living in this layer
    index: HashMap<String, NodeId>,
}

impl Layer {
    fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
            index: HashMap::new(),
        }
    }
}

/// Layered token placement store for one side
#[derive(Clone, Debug)]
pub struct TokenGrid {
    side: Side,
    config: GridConfig,
    /// Node arena, addressed by `NodeId`
    nodes: Vec<TokenNode>,
    layers: Vec<Layer>,
    /// How many times a full layer forced an eviction
    evictions: u64,
}

impl TokenGrid {
    /// Create an empty grid
    pub fn new(side: Side, config: &GridConfig) -> Self {
        let capacity = config.layer_capacity();
        Self {
            side,
            config: config.clone(),
            nodes: Vec::new(),
            layers: (0..config.layers.max(1)).map(|_| Layer::new(capacity)).collect(),
            evictions: 0,
        }
    }

    /// Place a token in a layer, or update it if it is already there
    ///
    /// Never fails: a full layer degrades to evicting its weakest node.
    pub fn place_or_update<R: Rng + ?Sized>(
        &mut self,
        layer: u16,
        token: &str,
        now: u64,
        rng: &mut R,
    ) -> Placement {
        let layer = self.clamp_layer(layer);

        // Repeat occurrence
        if let Some(&id) = self.layers[layer as usize].index.get(token) {
            let (activation_step, importance_step) =
                (self.config.activation_step, self.config.importance_step);
            self.nodes[id.index()].touch(activation_step, importance_step, now);
            return Placement { id, kind: PlacementKind::Updated };
        }

        let preferred = self.preferred_coordinate(token);
        let placement = match self.spiral_search(layer, preferred) {
            Some((row, col)) => {
                let id = NodeId(self.nodes.len() as u32);
                self.nodes.push(TokenNode::new(
                    id,
                    token,
                    self.side,
                    layer,
                    row,
                    col,
                    self.config.initial_activation,
                    self.config.initial_importance,
                    now,
                ));
                let slot = self.slot_index(row, col);
                self.layers[layer as usize].slots[slot] = Some(id);
                Placement { id, kind: PlacementKind::Created }
            }
            None => {
                let id = self.evict_weakest(layer, rng);
                let previous = self.nodes[id.index()].token.clone();
                self.layers[layer as usize].index.remove(&previous);
                self.nodes[id.index()].reuse(
                    token,
                    self.config.initial_activation,
                    self.config.initial_importance,
                    now,
                );
                Placement { id, kind: PlacementKind::Evicted { previous } }
            }
        };

        self.layers[layer as usize].index.insert(token.to_string(), placement.id);
        self.seed_connections(placement.id, rng);
        placement
    }

    /// Node of `token` in `layer`
    pub fn find(&self, layer: u16, token: &str) -> Option<NodeId> {
        self.layers.get(layer as usize)?.index.get(token).copied()
    }

    /// Nodes of `token` across every layer, lowest layer first
    pub fn find_all(&self, token: &str) -> Vec<NodeId> {
        self.layers
            .iter()
            .filter_map(|layer| layer.index.get(token).copied())
            .collect()
    }

    /// Whether any layer holds `token`
    pub fn contains_token(&self, token: &str) -> bool {
        self.layers.iter().any(|layer| layer.index.contains_key(token))
    }

    pub fn node(&self, id: NodeId) -> Option<&TokenNode> {
        self.nodes.get(id.index())
    }

    /// Nodes of one layer in row-major slot order
    pub fn nodes_in_layer(&self, layer: u16) -> impl Iterator<Item = &TokenNode> + '_ {
        self.layers
            .get(layer as usize)
            .into_iter()
            .flat_map(|l| l.slots.iter().flatten())
            .map(move |id| &self.nodes[id.index()])
    }

    /// Every node in arena order
    pub fn nodes(&self) -> impl Iterator<Item = &TokenNode> + '_ {
        self.nodes.iter()
    }

    /// Distinct tokens, sorted
    pub fn tokens(&self) -> BTreeSet<&str> {
        self.nodes.iter().map(|n| n.token.as_str()).collect()
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn layer_count(&self) -> u16 {
        self.layers.len() as u16
    }

    pub fn layer_len(&self, layer: u16) -> usize {
        self.layers.get(layer as usize).map(|l| l.index.len()).unwrap_or(0)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    /// One node array per layer, row-major
    pub fn layers_snapshot(&self) -> Vec<Vec<TokenNode>> {
        (0..self.layer_count())
            .map(|layer| self.nodes_in_layer(layer).cloned().collect())
            .collect()
    }

    /// Rebuild a grid from per-layer node arrays
    ///
    /// Node ids must form a dense arena and every node must fit the
    /// configured board.
    pub fn from_layers(
        side: Side,
        config: &GridConfig,
        layers: Vec<Vec<TokenNode>>,
        evictions: u64,
    ) -> KavramResult<Self> {
        let mut grid = Self::new(side, config);
        if layers.len() > grid.layers.len() {
            return Err(KavramError::snapshot(format!(
                "{:?} grid has {} layers, config allows {}",
                side,
                layers.len(),
                grid.layers.len()
            )));
        }

        let mut nodes: Vec<TokenNode> = layers.into_iter().flatten().collect();
        nodes.sort_by_key(|n| n.id);

        for (index, node) in nodes.iter().enumerate() {
            if node.id.index() != index {
                return Err(KavramError::snapshot(format!(
                    "{:?} grid node ids are not dense (expected #{}, found #{})",
                    side, index, node.id.0
                )));
            }
            if node.side != side
                || node.layer as usize >= grid.layers.len()
                || node.row >= config.rows
                || node.col >= config.cols
            {
                return Err(KavramError::snapshot(format!(
                    "{:?} grid node #{} '{}' does not fit the board",
                    side, node.id.0, node.token
                )));
            }

            let slot = grid.slot_index(node.row, node.col);
            let layer = &mut grid.layers[node.layer as usize];
            if layer.slots[slot].is_some() || layer.index.contains_key(&node.token) {
                return Err(KavramError::snapshot(format!(
                    "{:?} grid layer {} holds '{}' twice or overlaps a slot",
                    side, node.layer, node.token
                )));
            }
            layer.slots[slot] = Some(node.id);
            layer.index.insert(node.token.clone(), node.id);
        }

        // Connections to ids outside the arena cannot be followed
        let count = nodes.len();
        for node in &mut nodes {
            node.connections.retain(|id, _| id.index() < count);
        }

        grid.nodes = nodes;
        grid.evictions = evictions;
        Ok(grid)
    }

    // ------------------------------------------------------------------
    // Placement internals
    // ------------------------------------------------------------------

    fn clamp_layer(&self, layer: u16) -> u16 {
        layer.min(self.layer_count().saturating_sub(1))
    }

    fn slot_index(&self, row: u16, col: u16) -> usize {
        row as usize * self.config.cols as usize + col as usize
    }

    /// Deterministic coordinate from the token's length and characters
    fn preferred_coordinate(&self, token: &str) -> (u16, u16) {
        let len = token.chars().count() as u32;
        let first = token.chars().next().map(|c| c as u32).unwrap_or(0);
        let sum = token.chars().fold(0u32, |acc, c| acc.wrapping_add(c as u32));

        let row = len.wrapping_mul(7).wrapping_add(first) % self.config.rows as u32;
        let col = sum % self.config.cols as u32;
        (row as u16, col as u16)
    }

    /// Nearest free slot, ring by ring, within the search radius
    fn spiral_search(&self, layer: u16, (row, col): (u16, u16)) -> Option<(u16, u16)> {
        let slots = &self.layers[layer as usize].slots;
        let rows = self.config.rows as i32;
        let cols = self.config.cols as i32;
        let (r0, c0) = (row as i32, col as i32);

        for ring in 0..=self.config.max_search_radius as i32 {
            for dr in -ring..=ring {
                for dc in -ring..=ring {
                    if dr.abs().max(dc.abs()) != ring {
                        continue;
                    }
                    let (r, c) = (r0 + dr, c0 + dc);
                    if r < 0 || c < 0 || r >= rows || c >= cols {
                        continue;
                    }
                    if slots[(r * cols + c) as usize].is_none() {
                        return Some((r as u16, c as u16));
                    }
                }
            }
        }
        None
    }

    /// Pick the weakest node of a full layer and detach it from the graph
    fn evict_weakest<R: Rng + ?Sized>(&mut self, layer: u16, rng: &mut R) -> NodeId {
        let candidates: Vec<(NodeId, f32)> = self
            .nodes_in_layer(layer)
            .map(|n| (n.id, n.eviction_score()))
            .collect();

        let lowest = candidates
            .iter()
            .map(|(_, score)| *score)
            .fold(f32::INFINITY, f32::min);
        let weakest: Vec<NodeId> = candidates
            .iter()
            .filter(|(_, score)| (*score - lowest).abs() <= f32::EPSILON)
            .map(|(id, _)| *id)
            .collect();

        // A full layer always has at least one node
        let victim = weakest[rng.gen_range(0..weakest.len())];

        for node in &mut self.nodes {
            node.disconnect(victim);
        }
        self.evictions += 1;

        let err = KavramError::CapacityExceeded { side: self.side, layer };
        tracing::debug!("{} (victim '{}')", err, self.nodes[victim.index()].token);
        victim
    }

    /// Connect a new node to its most similar neighbours
    fn seed_connections<R: Rng + ?Sized>(&mut self, id: NodeId, rng: &mut R) {
        let (token, category, layer) = {
            let node = &self.nodes[id.index()];
            (node.token.clone(), node.category, node.layer)
        };

        let mut neighbours: Vec<NodeId> = self
            .nodes_in_layer(layer)
            .map(|n| n.id)
            .filter(|&other| other != id)
            .collect();
        if layer > 0 {
            neighbours.extend(self.nodes_in_layer(layer - 1).map(|n| n.id));
        }
        if neighbours.is_empty() {
            return;
        }

        let max_score = 1.0 + self.config.category_bonus + self.config.exploration;
        let mut scored: Vec<(NodeId, f32)> = neighbours
            .into_iter()
            .map(|other| {
                let node = &self.nodes[other.index()];
                let mut score = text::similarity(&token, &node.token);
                if node.category == category {
                    score += self.config.category_bonus;
                }
                score += rng.gen::<f32>() * self.config.exploration;
                (other, score)
            })
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(self.config.max_connections);

        for (other, score) in scored {
            let strength = (score / max_score).clamp(self.config.min_connection_strength, 1.0);
            self.nodes[id.index()].connect(other, strength);

            let mirrored = rng.gen_bool(self.config.reverse_probability as f64);
            let target = &mut self.nodes[other.index()];
            if mirrored && target.degree() < self.config.max_connections {
                target.connect(id, strength);
            }
        }
    }
}

/// Statistics about grid occupancy
#[derive(Debug, Default, Clone, Serialize)]
pub struct GridStats {
    /// Nodes across all layers
    pub nodes: usize,

    /// Occupied slots per layer
    pub layer_occupancy: Vec<usize>,

    /// Average outgoing connections per node
    pub avg_connections: f32,

    /// Forced evictions so far
    pub evictions: u64,
}

impl TokenGrid {
    /// Calculate statistics about the grid
    pub fn stats(&self) -> GridStats {
        if self.nodes.is_empty() {
            return GridStats {
                layer_occupancy: vec![0; self.layers.len()],
                evictions: self.evictions,
                ..GridStats::default()
            };
        }

        let total_connections: usize = self.nodes.iter().map(|n| n.degree()).sum();
        GridStats {
            nodes: self.nodes.len(),
            layer_occupancy: self.layers.iter().map(|l| l.index.len()).collect(),
            avg_connections: total_connections as f32 / self.nodes.len() as f32,
            evictions: self.evictions,
        }
    }
}
