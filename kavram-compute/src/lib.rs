//! # Kavram Compute
//!
//! The algorithmic half of Kavram: the structures the training pipeline
//! writes and the propagation that reads them.
//!
//! - **TokenGrid**: capacity-bounded layered 2-D placement of token nodes
//! - **AssociationStore**: query -> response edges with reinforcement and decay
//! - **ActivationEngine**: breadth-first, depth-limited activation spreading
//!
//! ## Randomness
//!
//! Connection exploration and eviction tie-breaks draw from a caller
//! supplied `rand::Rng`. Hosts pass a seeded `StdRng` so that a given
//! training sequence always builds the same graph.

pub mod activation;
pub mod grid;
pub mod store;

pub use activation::{ActivationEngine, ActivationResult, PathStep, SeedMatch};
pub use grid::{GridStats, Placement, PlacementKind, TokenGrid};
pub use store::{AssociationStore, DecayReport, Upsert, UpsertKind};
