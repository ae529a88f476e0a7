//! # Kavram Brain
//!
//! Engine state, the training pipeline, answer arbitration, persistence
//! and the collaborators hosts plug in.
//!
//! ```text
//! train(q, r) ──▶ TokenGrid ×2 + AssociationStore + TrainingHistory
//! ask(q)      ──▶ ActivationEngine ──▶ CandidateArbiter ──▶ Answer
//! ```

pub mod arbiter;
pub mod command;
pub mod config;
pub mod dictionary;
pub mod engine;
pub mod memory;

pub use arbiter::{Answer, Candidate, CandidateArbiter, Method};
pub use command::Command;
pub use dictionary::InMemoryDictionary;
pub use engine::{Engine, EngineCounters, EngineState, EngineStats, FeedbackReport, TrainingSummary};
pub use memory::history::{ExampleOutcome, TrainingHistory};
pub use memory::notes::RecentMemoryLog;
pub use memory::Snapshot;
