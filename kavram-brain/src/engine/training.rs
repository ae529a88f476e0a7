//! Training pipeline - the sole writer of grids, store and history

use serde::Serialize;

use kavram_compute::{PlacementKind, UpsertKind};
use kavram_core::{text, KavramError, KavramResult, TrainingSource};

use super::EngineState;
use crate::memory::history::ExampleOutcome;

/// What one training call changed
#[derive(Clone, Debug, Serialize)]
pub struct TrainingSummary {
    pub example: ExampleOutcome,
    pub query_tokens: usize,
    pub response_tokens: usize,
    pub nodes_created: usize,
    pub nodes_updated: usize,
    pub evictions: usize,
    pub associations_created: usize,
    pub associations_reinforced: usize,
}

impl TrainingSummary {
    fn new(example: ExampleOutcome, query_tokens: usize, response_tokens: usize) -> Self {
        Self {
            example,
            query_tokens,
            response_tokens,
            nodes_created: 0,
            nodes_updated: 0,
            evictions: 0,
            associations_created: 0,
            associations_reinforced: 0,
        }
    }

    fn count_placement(&mut self, kind: &PlacementKind) {
        match kind {
            PlacementKind::Updated => self.nodes_updated += 1,
            PlacementKind::Created => self.nodes_created += 1,
            PlacementKind::Evicted { .. } => {
                self.nodes_created += 1;
                self.evictions += 1;
            }
        }
    }
}

impl EngineState {
    /// Learn a (query, response) pair
    ///
    /// Either side normalizing to nothing is rejected before any state is
    /// touched.
    pub fn train(
        &mut self,
        query: &str,
        response: &str,
        source: TrainingSource,
        now: u64,
    ) -> KavramResult<TrainingSummary> {
        let mut query_tokens = text::tokenize(query);
        let mut response_tokens = text::tokenize(response);
        if query_tokens.is_empty() || response_tokens.is_empty() {
            self.counters.rejected_inputs += 1;
            return Err(KavramError::EmptyInput);
        }

        let limit = self.config.training.max_tokens_per_side.max(1);
        if query_tokens.len() > limit || response_tokens.len() > limit {
            tracing::debug!("Training pair truncated to {} tokens per side", limit);
            query_tokens.truncate(limit);
            response_tokens.truncate(limit);
        }

        // === 1. Example (explicit teaching only) ===
        let example = match source {
            TrainingSource::Explicit => self.history.record(query, response, now),
            TrainingSource::SelfReinforced => ExampleOutcome::Skipped,
        };
        let mut summary =
            TrainingSummary::new(example, query_tokens.len(), response_tokens.len());

        // === 2. Nodes, every token in every layer ===
        let mut rng = self.pass_rng();
        for layer in 0..self.config.grid.layers {
            for token in &query_tokens {
                let placement = self.query_grid.place_or_update(layer, token, now, &mut rng);
                summary.count_placement(&placement.kind);
            }
            for token in &response_tokens {
                let placement = self.response_grid.place_or_update(layer, token, now, &mut rng);
                summary.count_placement(&placement.kind);
            }
        }

        // === 3. Associations, full cross product ===
        let amount = match source {
            TrainingSource::Explicit => self.config.association.co_occurrence_amount,
            TrainingSource::SelfReinforced => self.config.association.self_reinforce_amount,
        };
        for query_token in &query_tokens {
            for (order, response_token) in response_tokens.iter().enumerate() {
                let upsert =
                    self.store.upsert_weighted(query_token, response_token, order as u32, amount, now);
                match upsert.kind {
                    UpsertKind::Created => summary.associations_created += 1,
                    UpsertKind::Reinforced => summary.associations_reinforced += 1,
                }
                debug_assert!(
                    self.store.get(upsert.id).map_or(false, |a| a.in_bounds()),
                    "association {:?} left its bounds",
                    upsert.id
                );
            }
        }

        match source {
            TrainingSource::Explicit => self.counters.trainings += 1,
            TrainingSource::SelfReinforced => self.counters.self_reinforcements += 1,
        }

        if summary.evictions > 0 {
            tracing::info!(
                "Grid full: {} eviction(s) while learning '{}' (query {}, response {} total)",
                summary.evictions,
                text::normalize(query),
                self.query_grid.evictions(),
                self.response_grid.evictions()
            );
        }
        tracing::debug!(
            "Trained {:?} ({:?}): {} node(s) new, {} updated, {} association(s) new, {} reinforced",
            text::normalize(query),
            summary.example,
            summary.nodes_created,
            summary.nodes_updated,
            summary.associations_created,
            summary.associations_reinforced
        );

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kavram_core::KavramConfig;

    fn state() -> EngineState {
        EngineState::new(KavramConfig::default()).unwrap()
    }

    #[test]
    fn test_empty_side_is_rejected() {
        let mut state = state();
        assert!(matches!(
            state.train("  ", "cevap", TrainingSource::Explicit, 0),
            Err(KavramError::EmptyInput)
        ));
        assert!(matches!(
            state.train("soru", "?!", TrainingSource::Explicit, 0),
            Err(KavramError::EmptyInput)
        ));
        assert!(state.query_grid.is_empty());
        assert!(state.store.is_empty());
        assert!(state.history.is_empty());
        assert_eq!(state.counters.rejected_inputs, 2);
    }

    #[test]
    fn test_summary_counts() {
        let mut state = state();
        let layers = state.config.grid.layers as usize;

        let first = state.train("elma nedir", "bir meyvedir", TrainingSource::Explicit, 0).unwrap();
        assert_eq!(first.example, ExampleOutcome::Recorded);
        assert_eq!(first.nodes_created, 4 * layers);
        assert_eq!(first.associations_created, 4);

        let again = state.train("elma nedir", "bir meyvedir", TrainingSource::Explicit, 1).unwrap();
        assert_eq!(again.example, ExampleOutcome::Repeated);
        assert_eq!(again.nodes_updated, 4 * layers);
        assert_eq!(again.associations_created, 0);
        assert_eq!(again.associations_reinforced, 4);
    }

    #[test]
    fn test_self_reinforcement_is_light() {
        let mut state = state();
        state.train("elma nedir", "bir meyvedir", TrainingSource::Explicit, 0).unwrap();
        let summary = state
            .train("elma nedir", "armut", TrainingSource::SelfReinforced, 1)
            .unwrap();

        assert_eq!(summary.example, ExampleOutcome::Skipped);
        assert_eq!(state.history.exact("elma nedir").unwrap().response, "bir meyvedir");
        assert_eq!(state.counters.self_reinforcements, 1);

        // Existing pair reinforced by the small amount only
        let id = state.store.find("elma", "meyvedir").unwrap();
        state.train("elma", "meyvedir", TrainingSource::SelfReinforced, 2).unwrap();
        assert_eq!(state.store.get(id).unwrap().association, 51.0);
    }

    #[test]
    fn test_token_limit() {
        let mut config = KavramConfig::default();
        config.training.max_tokens_per_side = 2;
        let mut state = EngineState::new(config).unwrap();

        let summary = state.train("a b c d", "x y z", TrainingSource::Explicit, 0).unwrap();
        assert_eq!(summary.query_tokens, 2);
        assert_eq!(summary.associations_created, 4);
        assert!(state.store.find("c", "x").is_none());
    }
}
