//! # Kavram Core
//!
//! Core types and traits for Kavram, an online-learning associative
//! lookup engine.
//!
//! This crate provides the fundamental building blocks:
//! - **TokenNode**: one occurrence of a token inside one grid layer
//! - **Association**: weighted edge from a query token to a response token
//! - **TrainingExample**: a recorded (query, response) pair
//! - **Text heuristics**: normalization, edit distance, overlap, stemming
//!
//! ## Design Philosophy
//!
//! Kavram is not an embedding model. Activation and association strength
//! are bounded numeric heuristics updated by explicit reinforcement and
//! decay events, never by gradient descent.
//!
//! Everything here is plain data: the grids and the association store in
//! `kavram-compute` own these values and address them by stable ids.

pub mod association;
pub mod config;
pub mod error;
pub mod example;
pub mod node;
pub mod text;
pub mod traits;

// Re-export main types at crate root
pub use association::{Association, AssociationId};
pub use config::KavramConfig;
pub use error::{KavramError, KavramResult};
pub use example::{TrainingExample, TrainingSource};
pub use node::{NodeId, NodeKey, Side, TokenCategory, TokenNode};
pub use traits::*;

/// Current version of the snapshot format
pub const SNAPSHOT_VERSION: u32 = 1;

/// Number of activation samples kept per node
pub const HISTORY_CAPACITY: usize = 10;

/// Current wall-clock time in unix milliseconds
pub fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}
